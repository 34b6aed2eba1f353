use pennywise_core::CoreError;
use serde_json::Value;

use super::format::field;

pub fn render_error(error: &CoreError) -> String {
    let headline = if error.is_internal() {
        "Pennywise could not complete the command."
    } else {
        "Something went wrong, but it's easy to fix."
    };
    let mut lines = vec![
        headline.to_string(),
        String::new(),
        format!("  Error:    {}", error.code),
        format!("  Details:  {}", error.message),
    ];

    if let Some(failures) = error
        .data
        .as_ref()
        .and_then(|data| data.get("failures"))
        .and_then(Value::as_array)
        .filter(|rows| !rows.is_empty())
    {
        lines.push(String::new());
        lines.push("Failures:".to_string());
        lines.extend(failures.iter().map(render_failure_row));
    }

    lines.push(String::new());
    lines.push("What to do next:".to_string());
    if error.recovery_steps.is_empty() {
        lines.push("  1. Retry the command.".to_string());
    } else {
        for (index, step) in error.recovery_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", index + 1));
        }
    }

    lines.join("\n")
}

/// Batch failures name a rule (recurring) or only a user (weekly insights).
fn render_failure_row(row: &Value) -> String {
    let subject = match row.get("rule_id").and_then(Value::as_str) {
        Some(rule_id) => format!("{rule_id} ({})", field(row, "user_id")),
        None => field(row, "user_id"),
    };
    format!(
        "  - {subject}: {} {}",
        field(row, "code"),
        field(row, "message")
    )
}
