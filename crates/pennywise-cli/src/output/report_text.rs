use std::io;

use serde_json::Value;

use super::format::{self, Column, field, rows};

pub fn render_summary(data: &Value) -> io::Result<String> {
    let mut lines = vec![
        format!("Summary for {}:", field(data, "period")),
        String::new(),
    ];
    lines.extend(format::key_value_rows(
        &[
            ("Income:", field(data, "total_income")),
            ("Expense:", field(data, "total_expense")),
            ("Balance:", field(data, "balance")),
            ("Transactions:", field(data, "transaction_count")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_spending(data: &Value) -> io::Result<String> {
    let categories = rows(data, "categories")?;
    let period = field(data, "period");
    if categories.is_empty() {
        return Ok(format!("No spending recorded for {period}."));
    }

    let columns = [
        Column::left("Category"),
        Column::right("Total"),
        Column::right("Count"),
    ];
    let table_rows = categories
        .iter()
        .map(|row| {
            vec![
                field(row, "category_name"),
                field(row, "total"),
                field(row, "transaction_count"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![
        format!("Spending for {period} (total {}):", field(data, "total")),
        String::new(),
    ];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Category",
    ));
    Ok(lines.join("\n"))
}

pub fn render_budget_progress(data: &Value) -> io::Result<String> {
    let budgets = rows(data, "budgets")?;
    let period = field(data, "period");
    if budgets.is_empty() {
        return Ok(format!("No active budgets to compare for {period}."));
    }

    let columns = [
        Column::left("Category"),
        Column::right("Budget"),
        Column::right("Spent"),
        Column::right("Remaining"),
        Column::right("Used"),
        Column::left("Status"),
    ];
    let table_rows = budgets
        .iter()
        .map(|row| {
            let status = if row.get("is_over_budget").and_then(Value::as_bool) == Some(true) {
                "over"
            } else {
                "ok"
            };
            vec![
                field(row, "category_name"),
                field(row, "budget_amount"),
                field(row, "spent_amount"),
                field(row, "remaining_amount"),
                format!("{}%", field(row, "percentage")),
                status.to_string(),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![format!("Budgets for {period}:"), String::new()];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Budget",
    ));
    Ok(lines.join("\n"))
}
