use std::io;

use serde_json::Value;

use super::format::{self, Column, field, rows};

pub fn render_user(command: &str, data: &Value) -> io::Result<String> {
    let mut lines = Vec::new();
    if command == "user add" {
        lines.push("User created.".to_string());
        lines.push(String::new());
    }
    lines.extend(format::key_value_rows(
        &[
            ("User ID:", field(data, "user_id")),
            ("Name:", field(data, "display_name")),
            ("Email:", field(data, "email")),
            ("Created:", field(data, "created_at")),
        ],
        2,
    ));
    if command == "user add" {
        lines.push(String::new());
        lines.push("Next:".to_string());
        lines.push(format!(
            "  pennywise account add --user {} --name <name>",
            field(data, "user_id")
        ));
    }
    Ok(lines.join("\n"))
}

pub fn render_account_added(data: &Value) -> io::Result<String> {
    let mut lines = vec!["Account created.".to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Account ID:", field(data, "account_id")),
            ("Name:", field(data, "name")),
            ("Type:", field(data, "account_type")),
            ("Currency:", field(data, "currency")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_accounts(data: &Value) -> io::Result<String> {
    let accounts = rows(data, "accounts")?;
    if accounts.is_empty() {
        return Ok("No accounts yet. Add one with `pennywise account add`.".to_string());
    }

    let columns = [
        Column::left("Account"),
        Column::left("Name"),
        Column::left("Type"),
        Column::left("Currency"),
    ];
    let table_rows = accounts
        .iter()
        .map(|row| {
            vec![
                field(row, "account_id"),
                field(row, "name"),
                field(row, "account_type"),
                field(row, "currency"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![format!("Accounts ({}):", accounts.len()), String::new()];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Account",
    ));
    Ok(lines.join("\n"))
}

pub fn render_category_added(data: &Value) -> io::Result<String> {
    let mut lines = vec!["Category created.".to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Category ID:", field(data, "category_id")),
            ("Name:", field(data, "name")),
            ("Kind:", field(data, "kind")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_categories(data: &Value) -> io::Result<String> {
    let categories = rows(data, "categories")?;
    let columns = [
        Column::left("Category"),
        Column::left("Name"),
        Column::left("Kind"),
        Column::left("Source"),
    ];
    let table_rows = categories
        .iter()
        .map(|row| {
            let source = if row.get("user_id").is_none_or(Value::is_null) {
                "system"
            } else {
                "custom"
            };
            vec![
                field(row, "category_id"),
                field(row, "name"),
                field(row, "kind"),
                source.to_string(),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![format!("Categories ({}):", categories.len()), String::new()];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Category",
    ));
    Ok(lines.join("\n"))
}

pub fn render_transaction_added(data: &Value) -> io::Result<String> {
    let mut lines = vec!["Transaction recorded.".to_string(), String::new()];
    lines.extend(transaction_detail(data));
    Ok(lines.join("\n"))
}

/// Detail rows shared with `recurring run`.
pub fn transaction_detail(data: &Value) -> Vec<String> {
    format::key_value_rows(
        &[
            ("Transaction ID:", field(data, "transaction_id")),
            ("Date:", field(data, "transaction_date")),
            ("Kind:", field(data, "kind")),
            ("Amount:", field(data, "amount")),
            ("Category:", field(data, "category_id")),
            ("Account:", field(data, "account_id")),
            ("Note:", field(data, "note")),
        ],
        2,
    )
}

pub fn render_transactions(data: &Value) -> io::Result<String> {
    let transactions = rows(data, "transactions")?;
    if transactions.is_empty() {
        return Ok("No transactions matched.".to_string());
    }

    let columns = [
        Column::left("Date"),
        Column::left("Kind"),
        Column::right("Amount"),
        Column::left("Category"),
        Column::left("Note"),
    ];
    let table_rows = transactions
        .iter()
        .map(|row| {
            vec![
                field(row, "transaction_date"),
                field(row, "kind"),
                field(row, "amount"),
                field(row, "category_id"),
                field(row, "note"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![
        format!("Transactions ({}):", transactions.len()),
        String::new(),
    ];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Transaction",
    ));
    Ok(lines.join("\n"))
}

pub fn render_budget_set(data: &Value) -> io::Result<String> {
    let budget = data
        .get("budget")
        .ok_or_else(|| io::Error::other("budget output requires `budget`"))?;
    let created = data.get("created").and_then(Value::as_bool).unwrap_or(false);
    let headline = if created {
        "Budget created."
    } else {
        "Budget updated."
    };

    let mut lines = vec![headline.to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Budget ID:", field(budget, "budget_id")),
            ("Category:", field(budget, "category_id")),
            ("Monthly amount:", field(budget, "amount")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_budgets(data: &Value) -> io::Result<String> {
    let budgets = rows(data, "budgets")?;
    if budgets.is_empty() {
        return Ok("No active budgets. Set one with `pennywise budget set`.".to_string());
    }

    let columns = [
        Column::left("Budget"),
        Column::left("Category"),
        Column::right("Monthly"),
    ];
    let table_rows = budgets
        .iter()
        .map(|row| {
            vec![
                field(row, "budget_id"),
                field(row, "category_id"),
                field(row, "amount"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![format!("Budgets ({}):", budgets.len()), String::new()];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Budget",
    ));
    Ok(lines.join("\n"))
}
