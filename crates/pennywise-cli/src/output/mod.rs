mod error_text;
mod format;
mod insights_text;
mod json;
mod ledger_text;
mod mode;
mod recurring_text;
mod report_text;

use std::io;

use pennywise_core::{CoreError, SuccessEnvelope};

use crate::stdout_io::write_stdout_line;

pub use mode::{OutputMode, mode_for_cli};

pub fn print_success(success: &SuccessEnvelope, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Text => render_text_success(success)?,
        OutputMode::Json => json::render_success_json(success)?,
    };
    write_stdout_line(&body)
}

pub fn print_failure(error: &CoreError, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Json => json::render_error_json(error)?,
        OutputMode::Text => error_text::render_error(error),
    };
    write_stdout_line(&body)
}

fn render_text_success(success: &SuccessEnvelope) -> io::Result<String> {
    let command = success.command.as_str();
    let data = &success.data;
    match command {
        "user add" | "user show" => ledger_text::render_user(command, data),
        "account add" => ledger_text::render_account_added(data),
        "account list" => ledger_text::render_accounts(data),
        "category add" => ledger_text::render_category_added(data),
        "category list" => ledger_text::render_categories(data),
        "tx add" => ledger_text::render_transaction_added(data),
        "tx list" => ledger_text::render_transactions(data),
        "budget set" => ledger_text::render_budget_set(data),
        "budget list" => ledger_text::render_budgets(data),
        "recurring add" | "recurring show" | "recurring edit" | "recurring pause"
        | "recurring resume" => recurring_text::render_rule(command, data),
        "recurring list" | "recurring due" => recurring_text::render_rules(command, data),
        "recurring run" => recurring_text::render_run(data),
        "recurring process-due" => recurring_text::render_process_due(data),
        "recurring delete" => recurring_text::render_deleted(data),
        "report summary" => report_text::render_summary(data),
        "report spending" => report_text::render_spending(data),
        "report budgets" => report_text::render_budget_progress(data),
        "insights anomalies" | "insights savings" | "insights budget-alerts"
        | "insights list" => insights_text::render_insights(command, data),
        "insights patterns" => insights_text::render_patterns(data),
        "insights recommend" => insights_text::render_recommendation(data),
        "insights weekly" => insights_text::render_weekly(data),
        "insights weekly-all" => insights_text::render_weekly_all(data),
        "insights read" | "insights read-all" => insights_text::render_mark_read(data),
        "insights sweep" => insights_text::render_sweep(data),
        _ => Err(io::Error::other(format!(
            "unsupported text output command `{command}`"
        ))),
    }
}
