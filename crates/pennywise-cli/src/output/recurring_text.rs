use std::io;

use serde_json::Value;

use super::format::{self, Column, field, rows};
use super::ledger_text::transaction_detail;

pub fn render_rule(command: &str, data: &Value) -> io::Result<String> {
    let headline = match command {
        "recurring add" => Some("Recurring rule created."),
        "recurring edit" => Some("Recurring rule updated."),
        "recurring pause" => Some("Recurring rule paused."),
        "recurring resume" => Some("Recurring rule resumed."),
        _ => None,
    };

    let mut lines = Vec::new();
    if let Some(headline) = headline {
        lines.push(headline.to_string());
        lines.push(String::new());
    }
    lines.extend(rule_detail(data));
    Ok(lines.join("\n"))
}

fn rule_detail(rule: &Value) -> Vec<String> {
    let remaining = match rule.get("remaining_executions") {
        None | Some(Value::Null) => "unlimited".to_string(),
        Some(_) => field(rule, "remaining_executions"),
    };
    let execution = if rule.get("auto_execute").and_then(Value::as_bool) == Some(true) {
        "automatic"
    } else {
        "needs confirmation"
    };

    format::key_value_rows(
        &[
            ("Rule ID:", field(rule, "rule_id")),
            ("State:", field(rule, "state")),
            ("Kind:", field(rule, "kind")),
            ("Amount:", field(rule, "amount")),
            ("Frequency:", field(rule, "frequency")),
            ("Next run:", field(rule, "next_execution_date")),
            ("Last run:", field(rule, "last_execution_date")),
            ("Ends:", field(rule, "end_date")),
            ("Remaining:", remaining),
            ("Execution:", execution.to_string()),
            ("Note:", field(rule, "note")),
        ],
        2,
    )
}

pub fn render_rules(command: &str, data: &Value) -> io::Result<String> {
    let rules = rows(data, "rules")?;
    let as_of = field(data, "as_of");
    if rules.is_empty() {
        return Ok(if command == "recurring due" {
            format!("No recurring rules are due as of {as_of}.")
        } else {
            "No recurring rules yet. See `pennywise recurring add --help`.".to_string()
        });
    }

    let title = if command == "recurring due" {
        format!("Due as of {as_of} ({}):", rules.len())
    } else {
        format!("Recurring rules ({}):", rules.len())
    };

    let columns = [
        Column::left("Rule"),
        Column::left("State"),
        Column::left("Frequency"),
        Column::right("Amount"),
        Column::left("Next"),
        Column::left("Note"),
    ];
    let table_rows = rules
        .iter()
        .map(|row| {
            vec![
                field(row, "rule_id"),
                field(row, "state"),
                field(row, "frequency"),
                field(row, "amount"),
                field(row, "next_execution_date"),
                field(row, "note"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![title, String::new()];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Rule",
    ));
    Ok(lines.join("\n"))
}

pub fn render_run(data: &Value) -> io::Result<String> {
    let transaction = data
        .get("transaction")
        .ok_or_else(|| io::Error::other("recurring run output requires `transaction`"))?;
    let rule = data
        .get("rule")
        .ok_or_else(|| io::Error::other("recurring run output requires `rule`"))?;

    let mut lines = vec!["Recurring rule executed.".to_string(), String::new()];
    lines.extend(transaction_detail(transaction));
    lines.push(String::new());
    if field(rule, "state") == "deactivated" {
        lines.push("The rule has no executions left and is now deactivated.".to_string());
    } else {
        lines.push(format!(
            "Next run: {}",
            field(rule, "next_execution_date")
        ));
    }
    Ok(lines.join("\n"))
}

pub fn render_process_due(data: &Value) -> io::Result<String> {
    let executed = rows(data, "executed")?;
    let pending = rows(data, "pending_confirmation")?;

    let mut lines = vec![
        format!("Processed recurring rules due as of {}.", field(data, "as_of")),
        String::new(),
    ];
    lines.extend(format::key_value_rows(
        &[
            ("Executed:", executed.len().to_string()),
            ("Awaiting confirmation:", pending.len().to_string()),
        ],
        2,
    ));

    if !executed.is_empty() {
        lines.push(String::new());
        lines.push("Executed:".to_string());
        for row in executed {
            let suffix = if row.get("deactivated").and_then(Value::as_bool) == Some(true) {
                " (now deactivated)"
            } else {
                ""
            };
            lines.push(format!(
                "  - {} -> {}{suffix}",
                field(row, "rule_id"),
                field(row, "transaction_id")
            ));
        }
    }

    if !pending.is_empty() {
        lines.push(String::new());
        lines.push("Awaiting confirmation (run each with `pennywise recurring run`):".to_string());
        for row in pending {
            lines.push(format!(
                "  - {} (user {})",
                field(row, "rule_id"),
                field(row, "user_id")
            ));
        }
    }
    Ok(lines.join("\n"))
}

pub fn render_deleted(data: &Value) -> io::Result<String> {
    Ok(format!("Recurring rule {} deleted.", field(data, "rule_id")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render_process_due, render_rule, render_rules, render_run};

    fn rule(state: &str) -> serde_json::Value {
        json!({
            "rule_id": "rec_1",
            "user_id": "usr_1",
            "amount": "1200.00",
            "kind": "expense",
            "note": "rent",
            "frequency": "monthly",
            "next_execution_date": "2024-04-01",
            "last_execution_date": null,
            "end_date": null,
            "auto_execute": true,
            "remaining_executions": null,
            "state": state
        })
    }

    #[test]
    fn rule_detail_spells_out_unlimited_and_automatic() {
        let rendered = render_rule("recurring add", &rule("scheduled"));
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("Recurring rule created."));
            assert!(text.contains("unlimited"));
            assert!(text.contains("automatic"));
        }
    }

    #[test]
    fn edited_rule_gets_its_own_headline() {
        let rendered = render_rule("recurring edit", &rule("scheduled"));
        assert!(matches!(
            rendered.as_deref(),
            Ok(text) if text.starts_with("Recurring rule updated.")
        ));
    }

    #[test]
    fn empty_due_list_names_the_date() {
        let data = json!({"user_id": "usr_1", "as_of": "2024-03-01", "rules": []});
        let rendered = render_rules("recurring due", &data);
        assert!(matches!(
            rendered.as_deref(),
            Ok("No recurring rules are due as of 2024-03-01.")
        ));
    }

    #[test]
    fn run_reports_deactivation() {
        let data = json!({
            "transaction": {"transaction_id": "txn_1", "amount": "1200.00"},
            "rule": rule("deactivated")
        });
        let rendered = render_run(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("txn_1"));
            assert!(text.contains("now deactivated"));
        }
    }

    #[test]
    fn process_due_lists_executed_and_pending() {
        let data = json!({
            "as_of": "2024-03-01",
            "executed": [{"rule_id": "rec_1", "user_id": "usr_1", "transaction_id": "txn_1", "deactivated": false}],
            "pending_confirmation": [{"rule_id": "rec_2", "user_id": "usr_1", "auto_execute": false}],
            "failures": []
        });
        let rendered = render_process_due(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("  - rec_1 -> txn_1"));
            assert!(text.contains("  - rec_2 (user usr_1)"));
        }
    }
}
