use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

pub fn parse_iso_date(value: &str) -> Result<String, String> {
    if value.len() != 10 {
        return Err("date must use YYYY-MM-DD format".to_string());
    }
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err("date must use valid calendar values".to_string());
    }
    Ok(value.to_string())
}

/// `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD`.
pub fn parse_timestamp(value: &str) -> Result<String, String> {
    if NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok() {
        return Ok(value.to_string());
    }
    parse_iso_date(value)
        .map_err(|_| "timestamp must use `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`".to_string())
}

pub fn parse_month(value: &str) -> Result<String, String> {
    let valid = value.len() == 7
        && NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok();
    if !valid {
        return Err("month must use YYYY-MM format".to_string());
    }
    Ok(value.to_string())
}

pub fn parse_kind(value: &str) -> Result<String, String> {
    match value {
        "income" | "expense" => Ok(value.to_string()),
        _ => Err("kind must be one of: income, expense".to_string()),
    }
}

pub fn parse_frequency(value: &str) -> Result<String, String> {
    match value {
        "daily" | "weekly" | "monthly" | "yearly" => Ok(value.to_string()),
        _ => Err("frequency must be one of: daily, weekly, monthly, yearly".to_string()),
    }
}

pub fn parse_insight_type(value: &str) -> Result<String, String> {
    match value {
        "spending_pattern"
        | "budget_alert"
        | "savings_recommendation"
        | "anomaly_detection"
        | "category_recommendation" => Ok(value.to_string()),
        _ => Err(
            "type must be one of: spending_pattern, budget_alert, savings_recommendation, \
             anomaly_detection, category_recommendation"
                .to_string(),
        ),
    }
}

pub fn parse_priority(value: &str) -> Result<String, String> {
    match value {
        "low" | "medium" | "high" => Ok(value.to_string()),
        _ => Err("priority must be one of: low, medium, high".to_string()),
    }
}

pub const RECURRING_ADD_AFTER_HELP: &str = "\
How recurring rules run:
  A rule is due once its next execution date is on or before today.
  `pennywise recurring run --user <id> <rule-id>` records one transaction and moves the
  rule forward. `pennywise recurring process-due` runs every due rule that
  was created with --auto; the others are listed as pending confirmation.

  Monthly and yearly rules keep the day of month of --start. A rule that
  starts on the 31st runs on the last day of shorter months and returns to
  the 31st when the month allows it.

  --end and --times stop a rule. It is deactivated instead of advanced once
  the next date would pass --end or the last allowed execution has run.
";

#[derive(Debug, Parser)]
#[command(
    name = "pennywise",
    version,
    about = "personal finance ledger with recurring transactions and insights",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Emit the JSON envelope instead of text
    #[arg(long, global = true)]
    pub json: bool,
    /// Ledger directory (defaults to PENNYWISE_HOME, then ~/.pennywise)
    #[arg(long, global = true, value_name = "PATH")]
    pub home: Option<PathBuf>,
    /// Evaluate the command as of this moment instead of the local clock
    #[arg(long, global = true, value_parser = parse_timestamp, value_name = "TIMESTAMP")]
    pub now: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create and inspect users
    #[command(arg_required_else_help = true)]
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Manage a user's accounts
    #[command(arg_required_else_help = true)]
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Manage categories (system defaults plus your own)
    #[command(arg_required_else_help = true)]
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    /// Record and query transactions
    #[command(arg_required_else_help = true)]
    Tx {
        #[command(subcommand)]
        command: TxCommand,
    },
    /// Set and list monthly budgets
    #[command(arg_required_else_help = true)]
    Budget {
        #[command(subcommand)]
        command: BudgetCommand,
    },
    /// Schedule and execute recurring transactions
    #[command(arg_required_else_help = true)]
    Recurring {
        #[command(subcommand)]
        command: RecurringCommand,
    },
    /// Monthly summaries, category spending, and budget progress
    #[command(arg_required_else_help = true)]
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
    /// Detect anomalies and habits, raise alerts, and manage insights
    #[command(arg_required_else_help = true)]
    Insights {
        #[command(subcommand)]
        command: InsightsCommand,
    },
}

#[derive(Debug, Clone, Args)]
pub struct UserArg {
    /// Acting user id (e.g. usr_01H...)
    #[arg(long = "user", value_name = "USER_ID")]
    pub user_id: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum UserCommand {
    /// Create a user
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Show one user
    Show { user_id: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AccountCommand {
    /// Open an account for a user
    Add {
        #[command(flatten)]
        user: UserArg,
        #[arg(long)]
        name: String,
        /// Free-form type such as checking, savings, cash
        #[arg(long = "type", default_value = "checking")]
        account_type: String,
        /// 3-letter ISO code
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    /// List a user's accounts
    List {
        #[command(flatten)]
        user: UserArg,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoryCommand {
    /// Create a user-owned category
    Add {
        #[command(flatten)]
        user: UserArg,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: String,
    },
    /// List system categories and the user's own
    List {
        #[command(flatten)]
        user: UserArg,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum TxCommand {
    /// Record one transaction
    Add {
        #[command(flatten)]
        user: UserArg,
        #[arg(long = "account", value_name = "ACCOUNT_ID")]
        account_id: String,
        #[arg(long = "category", value_name = "CATEGORY_ID")]
        category_id: String,
        /// Positive amount with at most 2 decimal places
        #[arg(long)]
        amount: String,
        #[arg(long, value_parser = parse_kind)]
        kind: String,
        #[arg(long)]
        note: Option<String>,
        /// Defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        date: Option<String>,
    },
    /// Query a user's transactions, newest first
    List {
        #[command(flatten)]
        user: UserArg,
        /// Start date filter (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date)]
        from: Option<String>,
        /// End date filter (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date)]
        to: Option<String>,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<String>,
        #[arg(long = "category", value_name = "CATEGORY_ID")]
        category_id: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum BudgetCommand {
    /// Create the monthly budget for a category, or change its amount
    Set {
        #[command(flatten)]
        user: UserArg,
        #[arg(long = "category", value_name = "CATEGORY_ID")]
        category_id: String,
        #[arg(long)]
        amount: String,
    },
    /// List active budgets
    List {
        #[command(flatten)]
        user: UserArg,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RuleArgs {
    #[command(flatten)]
    pub user: UserArg,
    /// The recurring rule id (e.g. rec_01H...)
    pub rule_id: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum RecurringCommand {
    /// Schedule a recurring transaction
    #[command(after_long_help = RECURRING_ADD_AFTER_HELP)]
    Add {
        #[command(flatten)]
        user: UserArg,
        #[arg(long = "account", value_name = "ACCOUNT_ID")]
        account_id: String,
        #[arg(long = "category", value_name = "CATEGORY_ID")]
        category_id: String,
        #[arg(long)]
        amount: String,
        #[arg(long, value_parser = parse_kind)]
        kind: String,
        #[arg(long, value_parser = parse_frequency)]
        frequency: String,
        /// First execution date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date)]
        start: String,
        /// Last date an execution may fall on (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date)]
        end: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Let `process-due` execute this rule without confirmation
        #[arg(long)]
        auto: bool,
        /// Stop after this many executions
        #[arg(long)]
        times: Option<u32>,
    },
    /// List a user's rules with their state today
    List {
        #[command(flatten)]
        user: UserArg,
    },
    /// Show one rule
    Show(RuleArgs),
    /// Change the amount, note, frequency, end date or auto-execute flag of a rule
    Edit {
        #[command(flatten)]
        rule: RuleArgs,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        #[arg(long)]
        clear_note: bool,
        /// Takes effect after the next execution
        #[arg(long, value_parser = parse_frequency)]
        frequency: Option<String>,
        /// Last date an execution may fall on (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date, conflicts_with = "clear_end")]
        end: Option<String>,
        /// Let the rule run with no end date
        #[arg(long)]
        clear_end: bool,
        /// Let `process-due` execute this rule without confirmation
        #[arg(long, conflicts_with = "manual")]
        auto: bool,
        /// Require `recurring run` for every execution
        #[arg(long)]
        manual: bool,
    },
    /// List a user's rules that are due today
    Due {
        #[command(flatten)]
        user: UserArg,
    },
    /// Execute one due rule now
    Run(RuleArgs),
    /// Execute every due auto-execute rule across all users
    ProcessDue,
    /// Stop a rule from coming due
    Pause(RuleArgs),
    /// Re-enable a paused rule
    Resume(RuleArgs),
    /// Delete a rule; its past transactions are kept
    Delete(RuleArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PeriodArgs {
    #[command(flatten)]
    pub user: UserArg,
    /// Calendar month (YYYY-MM); defaults to the current month
    #[arg(long, value_parser = parse_month)]
    pub month: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCommand {
    /// Income, expense, and balance for one month
    Summary(PeriodArgs),
    /// Expense totals per category for one month
    Spending(PeriodArgs),
    /// Spending against each active budget for one month
    Budgets(PeriodArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum InsightsCommand {
    /// Flag categories whose spending this month is far above their history
    Anomalies {
        #[command(flatten)]
        user: UserArg,
        /// History window in months
        #[arg(long)]
        months: Option<u32>,
    },
    /// Find repeated spending by category, weekday, and time of day
    Patterns {
        #[command(flatten)]
        user: UserArg,
        /// Lookback window in days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Suggest cutting back on frequent costly habits
    Savings {
        #[command(flatten)]
        user: UserArg,
        /// Lookback window in days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Suggest categories for a transaction note
    Recommend {
        #[command(flatten)]
        user: UserArg,
        note: String,
    },
    /// Raise alerts for budgets near or over their limit this month
    BudgetAlerts {
        #[command(flatten)]
        user: UserArg,
    },
    /// Run anomalies, patterns, and savings for one user
    Weekly {
        #[command(flatten)]
        user: UserArg,
    },
    /// Run the weekly pass for every user
    WeeklyAll,
    /// List stored insights, highest priority first
    List {
        #[command(flatten)]
        user: UserArg,
        #[arg(long = "type", value_parser = parse_insight_type)]
        insight_type: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<String>,
        /// Only insights not yet marked read
        #[arg(long)]
        unread: bool,
        /// Include insights past their validity
        #[arg(long)]
        all: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Mark one insight as read
    Read {
        #[command(flatten)]
        user: UserArg,
        insight_id: String,
    },
    /// Mark every insight of a user as read
    ReadAll {
        #[command(flatten)]
        user: UserArg,
    },
    /// Delete insights whose validity has ended
    Sweep,
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
