use std::path::Path;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Stable classification for every failure the core reports.
///
/// Callers branch on the kind; `code` stays a finer-grained string for
/// presentation and scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    OwnershipViolation,
    NotActive,
    NotYetDue,
    InvalidFrequency,
    Validation,
    Persistence,
    Cancelled,
    BatchFailed,
    Internal,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            kind,
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `pennywise {cmd} --help` for usage."),
            None => "Run `pennywise --help` for usage.".to_string(),
        };
        let error = Self::new(
            ErrorKind::Validation,
            "invalid_argument",
            message,
            vec![help_hint],
        );
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new(
            ErrorKind::Validation,
            "invalid_argument",
            message,
            recovery_steps,
        )
    }

    pub fn invalid_field(field: &str, message: &str) -> Self {
        Self::new(
            ErrorKind::Validation,
            "invalid_argument",
            message,
            vec![format!("Correct `{field}` and retry.")],
        )
        .with_data(json!({
            "field": field,
        }))
    }

    /// A sum, ratio or projection left the representable decimal range.
    pub fn amount_overflow(operation: &str) -> Self {
        Self::new(
            ErrorKind::Validation,
            "amount_out_of_range",
            &format!("Amounts are too large to compute {operation}."),
            vec!["Correct the oversized amounts recorded in the ledger and retry.".to_string()],
        )
        .with_data(json!({
            "operation": operation,
        }))
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            &format!("{entity}_not_found"),
            &format!("{} `{id}` was not found.", entity_label(entity)),
            vec![lookup_hint(entity)],
        )
        .with_data(json!({
            "entity": entity,
            "id": id,
        }))
    }

    pub fn ownership_violation(entity: &str, id: &str) -> Self {
        Self::new(
            ErrorKind::OwnershipViolation,
            "ownership_violation",
            &format!(
                "{} `{id}` does not belong to the acting user.",
                entity_label(entity)
            ),
            vec![format!(
                "Use a {} owned by the same user.",
                entity_label(entity).to_lowercase()
            )],
        )
        .with_data(json!({
            "entity": entity,
            "id": id,
        }))
    }

    pub fn rule_not_active(rule_id: &str) -> Self {
        Self::new(
            ErrorKind::NotActive,
            "recurring_rule_not_active",
            &format!("Recurring rule `{rule_id}` is deactivated."),
            vec![format!(
                "Run `pennywise recurring resume --user <user-id> {rule_id}` to re-enable it."
            )],
        )
        .with_data(json!({
            "rule_id": rule_id,
        }))
    }

    pub fn rule_not_yet_due(rule_id: &str, next_execution_date: &str) -> Self {
        Self::new(
            ErrorKind::NotYetDue,
            "recurring_rule_not_yet_due",
            &format!("Recurring rule `{rule_id}` is not due until {next_execution_date}."),
            vec!["Run `pennywise recurring due --user <user-id>` to see rules ready to execute.".to_string()],
        )
        .with_data(json!({
            "rule_id": rule_id,
            "next_execution_date": next_execution_date,
        }))
    }

    pub fn invalid_frequency(value: &str) -> Self {
        Self::new(
            ErrorKind::InvalidFrequency,
            "invalid_frequency",
            &format!("Unrecognized frequency `{value}`."),
            vec!["Use one of: daily, weekly, monthly, yearly.".to_string()],
        )
        .with_data(json!({
            "received": value,
            "supported": ["daily", "weekly", "monthly", "yearly"],
        }))
    }

    pub fn cancelled() -> Self {
        Self::new(
            ErrorKind::Cancelled,
            "cancelled",
            "Operation was cancelled before it completed.",
            Vec::new(),
        )
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(
            ErrorKind::Cancelled,
            "deadline_exceeded",
            "Operation exceeded its deadline before it completed.",
            vec!["Retry the command; completed work was committed, partial work was not.".to_string()],
        )
    }

    pub fn batch_failed(command: &str, succeeded: usize, failed: usize) -> Self {
        Self::new(
            ErrorKind::BatchFailed,
            "batch_failed",
            &format!("{command}: {succeeded} succeeded, {failed} failed."),
            vec!["Inspect `failures` in the error data and fix each listed item.".to_string()],
        )
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new(
            ErrorKind::Internal,
            "internal_serialization_error",
            message,
            Vec::new(),
        )
    }

    pub fn ledger_init_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "ledger_init_permission_denied",
            &format!("Cannot initialize ledger at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `PENNYWISE_HOME` to a writable directory."
            )],
        )
    }

    pub fn ledger_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "ledger_locked",
            &format!("Ledger database is locked at `{location}`."),
            vec![
                format!("Close other processes using `{location}` so the lock is released."),
                "Raise `PENNYWISE_BUSY_TIMEOUT_MS` if concurrent writers are expected.".to_string(),
            ],
        )
    }

    pub fn ledger_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "ledger_corrupt",
            &format!("Ledger database appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite ledger file or restore from backup."
            )],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "migration_failed",
            &format!("Ledger migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn ledger_init_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "ledger_init_failed",
            &format!("Ledger initialization failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }

    pub fn ledger_query_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "ledger_query_failed",
            &format!("Ledger query failed at `{location}`: {detail}"),
            vec!["Retry the command.".to_string()],
        )
    }

    pub fn ledger_data_invalid(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::Persistence,
            "ledger_data_invalid",
            &format!("Ledger at `{location}` holds a value that cannot be read: {detail}"),
            vec!["Correct the stored row or restore the ledger from backup.".to_string()],
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal | ErrorKind::Persistence)
    }
}

fn entity_label(entity: &str) -> String {
    let spaced = entity.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn lookup_hint(entity: &str) -> String {
    let group = match entity {
        "recurring_rule" => "recurring",
        "account" => "account",
        "category" => "category",
        "budget" => "budget",
        "insight" => "insights",
        "user" => {
            return "Check the user id, or run `pennywise user add` to create one.".to_string();
        }
        _ => "tx",
    };
    format!("Run `pennywise {group} list --user <user-id>` to find a valid id.")
}

pub type CoreResult<T> = Result<T, CoreError>;
