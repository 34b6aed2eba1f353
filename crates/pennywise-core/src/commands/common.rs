use std::path::Path;

use chrono::NaiveDate;

use crate::context::CallContext;
use crate::contracts::types::RecurringRuleView;
use crate::ledger::date::{MonthWindow, parse_timestamp};
use crate::recurring::RecurringRule;
use crate::setup::{SetupContext, open_ledger};
use crate::state::Ledger;
use crate::{CoreError, CoreResult};

/// Where and when a command runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Invocation<'a> {
    pub home_override: Option<&'a Path>,
    /// `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`; the local clock when unset.
    pub now: Option<&'a str>,
}

pub(crate) struct Session {
    pub setup: SetupContext,
    pub ledger: Ledger,
    pub ctx: CallContext,
}

pub(crate) fn open_session(invocation: Invocation<'_>) -> CoreResult<Session> {
    let ctx = match invocation.now {
        Some(raw) => CallContext::at(parse_timestamp(raw, "now")?),
        None => CallContext::current(),
    };
    let (setup, ledger) = open_ledger(invocation.home_override)?;
    Ok(Session { setup, ledger, ctx })
}

/// Resolves an optional `YYYY-MM` period, defaulting to the month of `today`.
pub(crate) fn resolve_period(month: Option<&str>, today: NaiveDate) -> CoreResult<MonthWindow> {
    let Some(raw) = month else {
        return MonthWindow::containing(today);
    };
    let invalid = || {
        CoreError::invalid_field(
            "month",
            &format!("`month` must use YYYY-MM format, got `{raw}`."),
        )
    };
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    MonthWindow::new(year, month)
}

pub(crate) fn rule_view(rule: RecurringRule, as_of: NaiveDate) -> RecurringRuleView {
    let state = rule.state(as_of);
    RecurringRuleView { rule, state }
}

pub(crate) fn require_text<'a>(field: &str, value: &'a str) -> CoreResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_field(
            field,
            &format!("`{field}` must not be empty."),
        ));
    }
    Ok(trimmed)
}
