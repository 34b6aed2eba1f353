use std::io;

use serde_json::Value;

use super::format::{self, Column, field, rows};

/// Insight cards, one block per insight.
fn insight_cards(insights: &[Value]) -> Vec<String> {
    let mut lines = Vec::new();
    for (index, insight) in insights.iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        let unread = if insight.get("is_read").and_then(Value::as_bool) == Some(false) {
            " *"
        } else {
            ""
        };
        lines.push(format!(
            "  [{}] {}{unread}",
            field(insight, "priority"),
            field(insight, "title")
        ));
        lines.push(format!("    {}", field(insight, "content")));
        if let Some(action) = insight.get("action_text").and_then(Value::as_str) {
            lines.push(format!("    Next: {action}"));
        }
        lines.push(format!(
            "    {}  {}  until {}",
            field(insight, "insight_id"),
            field(insight, "insight_type"),
            field(insight, "valid_until")
        ));
    }
    lines
}

fn render_insight_section(title: &str, empty: &str, insights: &[Value]) -> Vec<String> {
    if insights.is_empty() {
        return vec![empty.to_string()];
    }
    let mut lines = vec![format!("{title} ({}):", insights.len()), String::new()];
    lines.extend(insight_cards(insights));
    lines
}

pub fn render_insights(command: &str, data: &Value) -> io::Result<String> {
    let insights = rows(data, "insights")?;
    let (title, empty) = match command {
        "insights anomalies" => ("Spending anomalies", "No unusual spending this month."),
        "insights savings" => ("Savings opportunities", "No savings opportunities found."),
        "insights budget-alerts" => ("Budget alerts", "All budgets are within limits."),
        _ => ("Insights", "No insights to show."),
    };
    Ok(render_insight_section(title, empty, insights).join("\n"))
}

pub fn render_patterns(data: &Value) -> io::Result<String> {
    let patterns = rows(data, "patterns")?;
    let insights = rows(data, "insights")?;
    let lookback = field(data, "lookback_days");
    if patterns.is_empty() {
        return Ok(format!(
            "No recurring spending habits in the last {lookback} days."
        ));
    }

    let columns = [
        Column::left("Category"),
        Column::left("Day"),
        Column::left("Time"),
        Column::right("Count"),
        Column::right("Average"),
        Column::right("Total"),
    ];
    let table_rows = patterns
        .iter()
        .map(|row| {
            vec![
                field(row, "category_name"),
                field(row, "day_of_week"),
                field(row, "time_of_day"),
                field(row, "frequency"),
                field(row, "average_amount"),
                field(row, "total_amount"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![
        format!("Spending habits over the last {lookback} days:"),
        String::new(),
    ];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Pattern",
    ));
    if !insights.is_empty() {
        lines.push(String::new());
        lines.extend(insight_cards(insights));
    }
    Ok(lines.join("\n"))
}

pub fn render_recommendation(data: &Value) -> io::Result<String> {
    let note = field(data, "note");
    let suggested = data
        .get("suggestion")
        .and_then(|insight| insight.get("payload"))
        .and_then(|payload| payload.get("suggested_categories"))
        .and_then(Value::as_array);

    match suggested {
        Some(categories) if !categories.is_empty() => {
            let names = categories
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<&str>>()
                .join(", ");
            Ok(format!("Suggested categories for \"{note}\": {names}"))
        }
        _ => Ok(format!("No category suggestion for \"{note}\".")),
    }
}

pub fn render_weekly(data: &Value) -> io::Result<String> {
    let mut lines = vec![
        format!("Weekly insights for {}:", field(data, "user_id")),
        String::new(),
    ];
    lines.extend(render_insight_section(
        "Anomalies",
        "Anomalies: none",
        rows(data, "anomalies")?,
    ));
    lines.push(String::new());
    lines.extend(render_insight_section(
        "Habits",
        "Habits: none",
        rows(data, "patterns")?,
    ));
    lines.push(String::new());
    lines.extend(render_insight_section(
        "Savings",
        "Savings: none",
        rows(data, "savings")?,
    ));
    Ok(lines.join("\n"))
}

pub fn render_weekly_all(data: &Value) -> io::Result<String> {
    let mut lines = vec!["Weekly insights generated.".to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Users processed:", field(data, "users_processed")),
            ("Insights generated:", field(data, "insights_generated")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_mark_read(data: &Value) -> io::Result<String> {
    let updated = data.get("updated").and_then(Value::as_u64).unwrap_or(0);
    Ok(match updated {
        0 => "No unread insights.".to_string(),
        1 => "Marked 1 insight as read.".to_string(),
        count => format!("Marked {count} insights as read."),
    })
}

pub fn render_sweep(data: &Value) -> io::Result<String> {
    Ok(format!(
        "Removed {} expired insight(s) as of {}.",
        field(data, "removed"),
        field(data, "before")
    ))
}
