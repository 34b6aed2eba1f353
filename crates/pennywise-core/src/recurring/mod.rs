pub mod engine;
pub mod store;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ledger::TransactionKind;
use crate::ledger::date::Frequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleState {
    /// Active, next execution still ahead.
    Scheduled,
    /// Active and eligible for execution as of the evaluated date.
    Due,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurringRule {
    pub rule_id: String,
    pub user_id: String,
    pub category_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub note: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_execution_date: NaiveDate,
    pub last_execution_date: Option<NaiveDate>,
    pub is_active: bool,
    pub auto_execute: bool,
    /// `None` means unlimited.
    pub remaining_executions: Option<u32>,
}

/// Validated input for a new rule.
#[derive(Debug, Clone)]
pub struct NewRecurringRule {
    pub category_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub note: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub auto_execute: bool,
    pub remaining_executions: Option<u32>,
}

/// Edits to an existing rule. `None` leaves a field as it is; the inner
/// `None` of `note` and `end_date` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub amount: Option<Decimal>,
    pub note: Option<Option<String>>,
    pub frequency: Option<Frequency>,
    pub end_date: Option<Option<NaiveDate>>,
    pub auto_execute: Option<bool>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.note.is_none()
            && self.frequency.is_none()
            && self.end_date.is_none()
            && self.auto_execute.is_none()
    }

    /// The rule with these edits applied. Schedule bookkeeping stays put, so
    /// a new frequency takes effect after the next execution.
    pub fn apply_to(self, rule: RecurringRule) -> RecurringRule {
        RecurringRule {
            amount: self.amount.unwrap_or(rule.amount),
            note: self.note.unwrap_or(rule.note),
            frequency: self.frequency.unwrap_or(rule.frequency),
            end_date: self.end_date.unwrap_or(rule.end_date),
            auto_execute: self.auto_execute.unwrap_or(rule.auto_execute),
            ..rule
        }
    }
}

/// Rule bookkeeping after one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub last_execution_date: NaiveDate,
    pub remaining_executions: Option<u32>,
    pub next_execution_date: NaiveDate,
    pub is_active: bool,
}

impl RecurringRule {
    pub fn anchor_day(&self) -> u32 {
        self.start_date.day()
    }

    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.is_active
            && self.next_execution_date <= as_of
            && self.end_date.is_none_or(|end| end >= as_of)
            && self.remaining_executions.is_none_or(|remaining| remaining > 0)
    }

    pub fn state(&self, as_of: NaiveDate) -> RuleState {
        if !self.is_active {
            RuleState::Deactivated
        } else if self.is_due(as_of) {
            RuleState::Due
        } else {
            RuleState::Scheduled
        }
    }

    /// Records an execution on `executed_on` and picks the next date from it.
    /// The rule deactivates instead of advancing when the candidate passes
    /// `end_date` or the execution budget is spent.
    pub fn advance_after_execution(&self, executed_on: NaiveDate) -> Advance {
        let remaining_executions = self
            .remaining_executions
            .map(|remaining| remaining.saturating_sub(1));
        let base = executed_on.max(self.next_execution_date);
        let candidate = self.frequency.advance(base, self.anchor_day());

        let past_end = self.end_date.is_some_and(|end| candidate > end);
        let exhausted = remaining_executions == Some(0);
        if past_end || exhausted {
            return Advance {
                last_execution_date: executed_on,
                remaining_executions,
                next_execution_date: self.next_execution_date,
                is_active: false,
            };
        }

        Advance {
            last_execution_date: executed_on,
            remaining_executions,
            next_execution_date: candidate,
            is_active: true,
        }
    }

    pub fn with_advance(mut self, advance: &Advance) -> Self {
        self.last_execution_date = Some(advance.last_execution_date);
        self.remaining_executions = advance.remaining_executions;
        self.next_execution_date = advance.next_execution_date;
        self.is_active = advance.is_active;
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{RecurringRule, RuleState};
    use crate::ledger::TransactionKind;
    use crate::ledger::date::Frequency;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
    }

    fn rule(frequency: Frequency, start: NaiveDate) -> RecurringRule {
        RecurringRule {
            rule_id: "rec_1".to_string(),
            user_id: "usr_1".to_string(),
            category_id: "cat_sys_bills".to_string(),
            account_id: "acct_1".to_string(),
            amount: Decimal::new(1500, 2),
            kind: TransactionKind::Expense,
            note: Some("rent".to_string()),
            frequency,
            start_date: start,
            end_date: None,
            next_execution_date: start,
            last_execution_date: None,
            is_active: true,
            auto_execute: true,
            remaining_executions: None,
        }
    }

    #[test]
    fn state_tracks_due_date_and_activity() {
        let base = rule(Frequency::Weekly, date(2024, 3, 10));
        assert_eq!(base.state(date(2024, 3, 9)), RuleState::Scheduled);
        assert_eq!(base.state(date(2024, 3, 10)), RuleState::Due);

        let expired = RecurringRule {
            end_date: Some(date(2024, 3, 12)),
            ..base.clone()
        };
        assert_eq!(expired.state(date(2024, 3, 13)), RuleState::Scheduled);

        let inactive = RecurringRule {
            is_active: false,
            ..base
        };
        assert_eq!(inactive.state(date(2024, 3, 10)), RuleState::Deactivated);
    }

    #[test]
    fn last_remaining_execution_deactivates() {
        let single = RecurringRule {
            remaining_executions: Some(1),
            ..rule(Frequency::Monthly, date(2024, 1, 15))
        };
        let advance = single.advance_after_execution(date(2024, 1, 15));
        assert!(!advance.is_active);
        assert_eq!(advance.remaining_executions, Some(0));
        assert_eq!(advance.last_execution_date, date(2024, 1, 15));
    }

    #[test]
    fn candidate_past_end_date_deactivates() {
        let bounded = RecurringRule {
            end_date: Some(date(2024, 1, 20)),
            ..rule(Frequency::Weekly, date(2024, 1, 15))
        };
        let advance = bounded.advance_after_execution(date(2024, 1, 15));
        assert!(!advance.is_active);
        assert_eq!(advance.next_execution_date, date(2024, 1, 15));

        let inclusive = RecurringRule {
            end_date: Some(date(2024, 1, 22)),
            ..rule(Frequency::Weekly, date(2024, 1, 15))
        };
        let next = inclusive.advance_after_execution(date(2024, 1, 15));
        assert!(next.is_active);
        assert_eq!(next.next_execution_date, date(2024, 1, 22));
    }

    #[test]
    fn month_end_rule_keeps_its_anchor_day() {
        let mut current = rule(Frequency::Monthly, date(2024, 1, 31));
        let mut seen = Vec::new();
        for _ in 0..3 {
            let executed_on = current.next_execution_date;
            let advance = current.advance_after_execution(executed_on);
            current = current.with_advance(&advance);
            seen.push(current.next_execution_date);
        }
        assert_eq!(
            seen,
            vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }

    #[test]
    fn late_execution_advances_from_execution_day() {
        let daily = rule(Frequency::Daily, date(2024, 5, 1));
        let advance = daily.advance_after_execution(date(2024, 5, 4));
        assert_eq!(advance.next_execution_date, date(2024, 5, 5));
        assert!(advance.next_execution_date >= daily.start_date);
    }
}
