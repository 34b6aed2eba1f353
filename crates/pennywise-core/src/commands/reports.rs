use rust_decimal::Decimal;

use crate::{CoreError, CoreResult};
use crate::aggregate::{budget_progress, monthly_summary, spending_by_category};
use crate::commands::common::{Invocation, open_session, resolve_period};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{BudgetProgressData, SpendingData};
use crate::ledger::store::require_user;

/// `month` is `YYYY-MM`; the current month when unset.
pub fn summary(
    invocation: Invocation<'_>,
    user_id: &str,
    month: Option<&str>,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let window = resolve_period(month, session.ctx.today())?;
    require_user(session.ledger.connection(), session.ledger.db_path(), user_id)?;
    let summary = monthly_summary(
        &session.ledger,
        &session.ctx,
        user_id,
        window.year,
        window.month,
    )?;
    success("report summary", summary)
}

pub fn spending(
    invocation: Invocation<'_>,
    user_id: &str,
    month: Option<&str>,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let window = resolve_period(month, session.ctx.today())?;
    require_user(session.ledger.connection(), session.ledger.db_path(), user_id)?;
    let categories = spending_by_category(
        &session.ledger,
        &session.ctx,
        user_id,
        window.year,
        window.month,
    )?;
    let total = categories
        .iter()
        .try_fold(Decimal::ZERO, |total, entry| total.checked_add(entry.total))
        .ok_or_else(|| CoreError::amount_overflow("the spending total"))?;
    success(
        "report spending",
        SpendingData {
            user_id: user_id.to_string(),
            period: window.period_label(),
            total,
            categories,
        },
    )
}

pub fn budgets(
    invocation: Invocation<'_>,
    user_id: &str,
    month: Option<&str>,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let window = resolve_period(month, session.ctx.today())?;
    require_user(session.ledger.connection(), session.ledger.db_path(), user_id)?;
    let budgets = budget_progress(
        &session.ledger,
        &session.ctx,
        user_id,
        window.year,
        window.month,
    )?;
    success(
        "report budgets",
        BudgetProgressData {
            user_id: user_id.to_string(),
            period: window.period_label(),
            budgets,
        },
    )
}
