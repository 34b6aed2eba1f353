use serde_json::json;

use crate::commands::common::{Invocation, open_session, rule_view};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{RecurringDeleteData, RecurringExecuteData, RecurringListData};
use crate::ledger::date::{Frequency, format_iso_date, parse_iso_date};
use crate::ledger::{TransactionKind, parse_amount};
use crate::recurring::engine::{
    create_rule, execute, get_owned_rule, list_due, list_rules, process_all_due, remove_rule,
    set_rule_active, update_rule,
};
use crate::recurring::{NewRecurringRule, RuleUpdate};
use crate::{CoreError, CoreResult};

#[derive(Debug, Default)]
pub struct RecurringInput {
    pub user_id: String,
    pub category_id: String,
    pub account_id: String,
    pub amount: String,
    pub kind: String,
    pub note: Option<String>,
    pub frequency: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub auto_execute: bool,
    pub remaining_executions: Option<u32>,
}

pub fn add(invocation: Invocation<'_>, input: RecurringInput) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let rule = NewRecurringRule {
        amount: parse_amount("amount", &input.amount)?,
        kind: input.kind.parse::<TransactionKind>()?,
        frequency: input.frequency.parse::<Frequency>()?,
        start_date: parse_iso_date(&input.start_date, "start_date")?,
        end_date: input
            .end_date
            .as_deref()
            .map(|raw| parse_iso_date(raw, "end_date"))
            .transpose()?,
        note: input.note.filter(|note| !note.trim().is_empty()),
        category_id: input.category_id,
        account_id: input.account_id,
        auto_execute: input.auto_execute,
        remaining_executions: input.remaining_executions,
    };
    let created = create_rule(&mut session.ledger, &session.ctx, &input.user_id, rule)?;
    success("recurring add", rule_view(created, session.ctx.today()))
}

/// Raw edits for `recurring edit`. The `clear_*` flags drop a stored value
/// and conflict with setting it in the same call.
#[derive(Debug, Default)]
pub struct RecurringEdit {
    pub user_id: String,
    pub rule_id: String,
    pub amount: Option<String>,
    pub note: Option<String>,
    pub clear_note: bool,
    pub frequency: Option<String>,
    pub end_date: Option<String>,
    pub clear_end_date: bool,
    pub auto_execute: Option<bool>,
}

pub fn edit(invocation: Invocation<'_>, input: RecurringEdit) -> CoreResult<SuccessEnvelope> {
    let note = match (input.note, input.clear_note) {
        (Some(_), true) => return Err(conflicting_edit("note")),
        (Some(note), false) => Some(Some(note).filter(|note| !note.trim().is_empty())),
        (None, true) => Some(None),
        (None, false) => None,
    };
    let end_date = match (input.end_date, input.clear_end_date) {
        (Some(_), true) => return Err(conflicting_edit("end-date")),
        (Some(raw), false) => Some(Some(parse_iso_date(&raw, "end_date")?)),
        (None, true) => Some(None),
        (None, false) => None,
    };
    let update = RuleUpdate {
        amount: input
            .amount
            .as_deref()
            .map(|raw| parse_amount("amount", raw))
            .transpose()?,
        note,
        frequency: input
            .frequency
            .as_deref()
            .map(str::parse::<Frequency>)
            .transpose()?,
        end_date,
        auto_execute: input.auto_execute,
    };

    let mut session = open_session(invocation)?;
    let rule = update_rule(
        &mut session.ledger,
        &session.ctx,
        &input.user_id,
        &input.rule_id,
        update,
    )?;
    success("recurring edit", rule_view(rule, session.ctx.today()))
}

fn conflicting_edit(field: &str) -> CoreError {
    CoreError::invalid_argument_for_command(
        &format!("`--{field}` and `--clear-{field}` cannot be combined."),
        Some("recurring edit"),
    )
}

pub fn list(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let today = session.ctx.today();
    let rules = list_rules(&session.ledger, &session.ctx, user_id)?;
    success(
        "recurring list",
        RecurringListData {
            user_id: user_id.to_string(),
            as_of: format_iso_date(&today),
            rules: rules.into_iter().map(|rule| rule_view(rule, today)).collect(),
        },
    )
}

pub fn show(invocation: Invocation<'_>, user_id: &str, rule_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let rule = get_owned_rule(&session.ledger, &session.ctx, user_id, rule_id)?;
    success("recurring show", rule_view(rule, session.ctx.today()))
}

/// Active rules of one user that are due as of today.
pub fn due(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let today = session.ctx.today();
    let rules = list_due(&session.ledger, &session.ctx, user_id, today)?;
    success(
        "recurring due",
        RecurringListData {
            user_id: user_id.to_string(),
            as_of: format_iso_date(&today),
            rules: rules.into_iter().map(|rule| rule_view(rule, today)).collect(),
        },
    )
}

pub fn run(invocation: Invocation<'_>, user_id: &str, rule_id: &str) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let execution = execute(&mut session.ledger, &session.ctx, user_id, rule_id)?;
    success(
        "recurring run",
        RecurringExecuteData {
            transaction: execution.transaction,
            rule: rule_view(execution.rule, session.ctx.today()),
        },
    )
}

/// Sweeps every user's due rules. Any per-rule failure turns the whole
/// command into a `batch_failed` error that still carries the full report.
pub fn process_due(invocation: Invocation<'_>) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let report = process_all_due(&mut session.ledger, &session.ctx)?;
    if report.failed() > 0 {
        return Err(
            CoreError::batch_failed("recurring process-due", report.succeeded(), report.failed())
                .with_data(json!({
                    "as_of": report.as_of,
                    "executed": report.executed,
                    "pending_confirmation": report.pending_confirmation,
                    "failures": report.failures,
                })),
        );
    }
    success("recurring process-due", report)
}

pub fn pause(invocation: Invocation<'_>, user_id: &str, rule_id: &str) -> CoreResult<SuccessEnvelope> {
    toggle(invocation, user_id, rule_id, false, "recurring pause")
}

pub fn resume(
    invocation: Invocation<'_>,
    user_id: &str,
    rule_id: &str,
) -> CoreResult<SuccessEnvelope> {
    toggle(invocation, user_id, rule_id, true, "recurring resume")
}

fn toggle(
    invocation: Invocation<'_>,
    user_id: &str,
    rule_id: &str,
    is_active: bool,
    command: &str,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let rule = set_rule_active(&mut session.ledger, &session.ctx, user_id, rule_id, is_active)?;
    success(command, rule_view(rule, session.ctx.today()))
}

pub fn delete(
    invocation: Invocation<'_>,
    user_id: &str,
    rule_id: &str,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    remove_rule(&mut session.ledger, &session.ctx, user_id, rule_id)?;
    success(
        "recurring delete",
        RecurringDeleteData {
            rule_id: rule_id.to_string(),
            deleted: true,
        },
    )
}
