use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::CallContext;
use crate::ledger::date::{format_iso_date, format_timestamp};
use crate::ledger::store::{
    insert_transaction, require_owned_account, require_usable_category, require_user,
};
use crate::ledger::{MAX_AMOUNT, NewTransaction, Transaction, new_id};
use crate::recurring::store::{
    DueRuleRef, apply_execution, delete_rule, get_rule, insert_rule, list_due_for_user,
    list_due_refs, list_rules_for_user, set_active, update_rule_fields,
};
use crate::recurring::{NewRecurringRule, RecurringRule, RuleUpdate};
use crate::state::Ledger;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub transaction: Transaction,
    pub rule: RecurringRule,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedRule {
    pub rule_id: String,
    pub user_id: String,
    pub transaction_id: String,
    pub deactivated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub rule_id: String,
    pub user_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessDueReport {
    pub as_of: String,
    pub executed: Vec<ExecutedRule>,
    pub pending_confirmation: Vec<DueRuleRef>,
    pub failures: Vec<RuleFailure>,
}

impl ProcessDueReport {
    pub fn succeeded(&self) -> usize {
        self.executed.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub fn create_rule(
    ledger: &mut Ledger,
    ctx: &CallContext,
    user_id: &str,
    input: NewRecurringRule,
) -> CoreResult<RecurringRule> {
    validate_new_rule(&input)?;
    ctx.check()?;

    let stamp = format_timestamp(&ctx.now);
    ledger.atomic(|tx, db_path| {
        require_user(tx, db_path, user_id)?;
        require_usable_category(tx, db_path, user_id, &input.category_id)?;
        require_owned_account(tx, db_path, user_id, &input.account_id)?;
        ctx.check()?;

        let rule = RecurringRule {
            rule_id: new_id("rec"),
            user_id: user_id.to_string(),
            category_id: input.category_id,
            account_id: input.account_id,
            amount: input.amount,
            kind: input.kind,
            note: input.note,
            frequency: input.frequency,
            start_date: input.start_date,
            end_date: input.end_date,
            next_execution_date: input.start_date,
            last_execution_date: None,
            is_active: true,
            auto_execute: input.auto_execute,
            remaining_executions: input.remaining_executions,
        };
        insert_rule(tx, db_path, &rule, &stamp)?;
        debug!(rule_id = %rule.rule_id, frequency = %rule.frequency, "created recurring rule");
        Ok(rule)
    })
}

fn validate_new_rule(input: &NewRecurringRule) -> CoreResult<()> {
    validate_schedule(input.amount, input.start_date, input.end_date)?;
    if input.remaining_executions == Some(0) {
        return Err(CoreError::invalid_field(
            "remaining_executions",
            "`remaining_executions` must be at least 1 when set.",
        ));
    }
    Ok(())
}

/// Checks shared by new and edited rules.
fn validate_schedule(
    amount: Decimal,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::invalid_field(
            "amount",
            "`amount` must be greater than zero.",
        ));
    }
    if amount > MAX_AMOUNT {
        return Err(CoreError::invalid_field(
            "amount",
            &format!("`amount` must not exceed {MAX_AMOUNT}."),
        ));
    }
    if let Some(end) = end_date
        && end < start_date
    {
        return Err(CoreError::invalid_field(
            "end_date",
            "`end_date` must be on or after `start_date`.",
        ));
    }
    Ok(())
}

/// Edits amount, note, frequency, end date or auto-execute on a rule the
/// user owns. The next execution date is left as scheduled.
pub fn update_rule(
    ledger: &mut Ledger,
    ctx: &CallContext,
    user_id: &str,
    rule_id: &str,
    update: RuleUpdate,
) -> CoreResult<RecurringRule> {
    if update.is_empty() {
        return Err(CoreError::invalid_argument_for_command(
            "Nothing to change: pass at least one field to edit.",
            Some("recurring edit"),
        ));
    }
    ctx.check()?;
    let stamp = format_timestamp(&ctx.now);
    ledger.atomic(|tx, db_path| {
        let rule = get_rule(tx, db_path, rule_id)?
            .filter(|rule| rule.user_id == user_id)
            .ok_or_else(|| CoreError::not_found("recurring_rule", rule_id))?;
        let edited = update.apply_to(rule);
        validate_schedule(edited.amount, edited.start_date, edited.end_date)?;
        ctx.check()?;

        update_rule_fields(tx, db_path, &edited, &stamp)?;
        debug!(rule_id, frequency = %edited.frequency, "updated recurring rule");
        Ok(edited)
    })
}

/// Fetches a rule the user owns. Rules owned by someone else are reported as
/// missing so rule ids cannot be probed across users.
pub fn get_owned_rule(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    rule_id: &str,
) -> CoreResult<RecurringRule> {
    ctx.check()?;
    get_rule(ledger.connection(), ledger.db_path(), rule_id)?
        .filter(|rule| rule.user_id == user_id)
        .ok_or_else(|| CoreError::not_found("recurring_rule", rule_id))
}

pub fn list_rules(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
) -> CoreResult<Vec<RecurringRule>> {
    ctx.check()?;
    list_rules_for_user(ledger.connection(), ledger.db_path(), user_id)
}

pub fn list_due(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    as_of: NaiveDate,
) -> CoreResult<Vec<RecurringRule>> {
    ctx.check()?;
    list_due_for_user(ledger.connection(), ledger.db_path(), user_id, as_of)
}

/// Materializes one occurrence of a due rule and advances (or deactivates)
/// the rule, all in one IMMEDIATE transaction.
pub fn execute(
    ledger: &mut Ledger,
    ctx: &CallContext,
    user_id: &str,
    rule_id: &str,
) -> CoreResult<Execution> {
    ctx.check()?;
    let today = ctx.today();
    let stamp = format_timestamp(&ctx.now);

    ledger.atomic(|tx, db_path| {
        let rule = get_rule(tx, db_path, rule_id)?
            .filter(|rule| rule.user_id == user_id)
            .ok_or_else(|| CoreError::not_found("recurring_rule", rule_id))?;
        if !rule.is_active {
            return Err(CoreError::rule_not_active(rule_id));
        }
        if rule.next_execution_date > today {
            return Err(CoreError::rule_not_yet_due(
                rule_id,
                &format_iso_date(&rule.next_execution_date),
            ));
        }
        ctx.check()?;

        let materialized = insert_transaction(
            tx,
            db_path,
            &NewTransaction {
                user_id: rule.user_id.clone(),
                account_id: rule.account_id.clone(),
                category_id: rule.category_id.clone(),
                amount: rule.amount,
                kind: rule.kind,
                note: rule.note.clone(),
                transaction_date: ctx.now,
            },
            Some(rule_id),
            &stamp,
        )?;
        ctx.check()?;

        let advance = rule.advance_after_execution(today);
        let applied = apply_execution(
            tx,
            db_path,
            rule_id,
            rule.next_execution_date,
            &advance,
            &stamp,
        )?;
        if !applied {
            return Err(CoreError::rule_not_yet_due(
                rule_id,
                &format_iso_date(&rule.next_execution_date),
            ));
        }
        ctx.check()?;

        debug!(
            rule_id,
            transaction_id = %materialized.transaction_id,
            next = %advance.next_execution_date,
            active = advance.is_active,
            "executed recurring rule"
        );
        Ok(Execution {
            transaction: materialized,
            rule: rule.with_advance(&advance),
        })
    })
}

/// Sweeps every user's due rules as of `ctx.today()`. Auto-execute rules run;
/// manual rules are only listed. A failing rule is recorded and skipped.
pub fn process_all_due(ledger: &mut Ledger, ctx: &CallContext) -> CoreResult<ProcessDueReport> {
    ctx.check()?;
    let as_of = ctx.today();
    let due = list_due_refs(ledger.connection(), ledger.db_path(), as_of)?;

    let mut report = ProcessDueReport {
        as_of: format_iso_date(&as_of),
        executed: Vec::new(),
        pending_confirmation: Vec::new(),
        failures: Vec::new(),
    };

    for due_rule in due {
        if let Err(error) = ctx.check() {
            return Err(error.with_data(json!({ "partial_report": report })));
        }
        if !due_rule.auto_execute {
            report.pending_confirmation.push(due_rule);
            continue;
        }

        match execute(ledger, ctx, &due_rule.user_id, &due_rule.rule_id) {
            Ok(execution) => report.executed.push(ExecutedRule {
                rule_id: due_rule.rule_id,
                user_id: due_rule.user_id,
                transaction_id: execution.transaction.transaction_id,
                deactivated: !execution.rule.is_active,
            }),
            Err(error) => {
                warn!(
                    rule_id = %due_rule.rule_id,
                    code = %error.code,
                    "recurring rule execution failed"
                );
                report.failures.push(RuleFailure {
                    rule_id: due_rule.rule_id,
                    user_id: due_rule.user_id,
                    code: error.code,
                    message: error.message,
                });
            }
        }
    }

    info!(
        as_of = %report.as_of,
        executed = report.succeeded(),
        pending = report.pending_confirmation.len(),
        failed = report.failed(),
        "processed due recurring rules"
    );
    Ok(report)
}

pub fn set_rule_active(
    ledger: &mut Ledger,
    ctx: &CallContext,
    user_id: &str,
    rule_id: &str,
    is_active: bool,
) -> CoreResult<RecurringRule> {
    ctx.check()?;
    let stamp = format_timestamp(&ctx.now);
    ledger.atomic(|tx, db_path| {
        let rule = get_rule(tx, db_path, rule_id)?
            .filter(|rule| rule.user_id == user_id)
            .ok_or_else(|| CoreError::not_found("recurring_rule", rule_id))?;
        set_active(tx, db_path, rule_id, is_active, &stamp)?;
        Ok(RecurringRule { is_active, ..rule })
    })
}

pub fn remove_rule(
    ledger: &mut Ledger,
    ctx: &CallContext,
    user_id: &str,
    rule_id: &str,
) -> CoreResult<()> {
    ctx.check()?;
    ledger.atomic(|tx, db_path| {
        get_rule(tx, db_path, rule_id)?
            .filter(|rule| rule.user_id == user_id)
            .ok_or_else(|| CoreError::not_found("recurring_rule", rule_id))?;
        delete_rule(tx, db_path, rule_id)
    })
}
