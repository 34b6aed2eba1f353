use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::ledger::date::{Frequency, format_iso_date, parse_iso_date};
use crate::ledger::{decimal_column, kind_column};
use crate::recurring::{Advance, RecurringRule};
use crate::state::map_sqlite_error;
use crate::{CoreError, CoreResult};

const RULE_COLUMNS: &str = "rule_id,
                user_id,
                category_id,
                account_id,
                amount,
                kind,
                note,
                frequency,
                start_date,
                end_date,
                next_execution_date,
                last_execution_date,
                is_active,
                auto_execute,
                remaining_executions";

/// Identity of a due rule, read without decoding the rest of the row so one
/// malformed rule cannot hide the others from a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueRuleRef {
    pub rule_id: String,
    pub user_id: String,
    pub auto_execute: bool,
}

pub fn insert_rule(
    connection: &Connection,
    db_path: &Path,
    rule: &RecurringRule,
    created_at: &str,
) -> CoreResult<()> {
    connection
        .execute(
            &format!(
                "INSERT INTO recurring_rules ({RULE_COLUMNS}, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)"
            ),
            params![
                &rule.rule_id,
                &rule.user_id,
                &rule.category_id,
                &rule.account_id,
                rule.amount.to_string(),
                rule.kind.as_str(),
                &rule.note,
                rule.frequency.as_str(),
                format_iso_date(&rule.start_date),
                rule.end_date.as_ref().map(format_iso_date),
                format_iso_date(&rule.next_execution_date),
                rule.last_execution_date.as_ref().map(format_iso_date),
                rule.is_active,
                rule.auto_execute,
                rule.remaining_executions,
                created_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

pub fn get_rule(
    connection: &Connection,
    db_path: &Path,
    rule_id: &str,
) -> CoreResult<Option<RecurringRule>> {
    let raw = connection
        .query_row(
            &format!("SELECT {RULE_COLUMNS} FROM recurring_rules WHERE rule_id = ?1"),
            [rule_id],
            RawRule::from_row,
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    raw.map(|value| value.into_rule(db_path)).transpose()
}

pub fn list_rules_for_user(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
) -> CoreResult<Vec<RecurringRule>> {
    let sql = format!(
        "SELECT {RULE_COLUMNS}
         FROM recurring_rules
         WHERE user_id = ?1
         ORDER BY is_active DESC, next_execution_date ASC, rule_id ASC"
    );
    collect_rules(connection, db_path, &sql, params![user_id])
}

/// Active rules due on `as_of`, earliest first.
pub fn list_due_for_user(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    as_of: NaiveDate,
) -> CoreResult<Vec<RecurringRule>> {
    let sql = format!(
        "SELECT {RULE_COLUMNS}
         FROM recurring_rules
         WHERE user_id = ?1
           AND is_active = 1
           AND next_execution_date <= ?2
           AND (end_date IS NULL OR end_date >= ?2)
           AND (remaining_executions IS NULL OR remaining_executions > 0)
         ORDER BY next_execution_date ASC, rule_id ASC"
    );
    collect_rules(
        connection,
        db_path,
        &sql,
        params![user_id, format_iso_date(&as_of)],
    )
}

/// Due rules across every user.
pub fn list_due_refs(
    connection: &Connection,
    db_path: &Path,
    as_of: NaiveDate,
) -> CoreResult<Vec<DueRuleRef>> {
    let mut statement = connection
        .prepare(
            "SELECT rule_id, user_id, auto_execute
             FROM recurring_rules
             WHERE is_active = 1
               AND next_execution_date <= ?1
               AND (end_date IS NULL OR end_date >= ?1)
               AND (remaining_executions IS NULL OR remaining_executions > 0)
             ORDER BY next_execution_date ASC, rule_id ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([format_iso_date(&as_of)], |row| {
            Ok(DueRuleRef {
                rule_id: row.get(0)?,
                user_id: row.get(1)?,
                auto_execute: row.get(2)?,
            })
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut refs = Vec::new();
    for row in rows_iter {
        refs.push(row.map_err(|error| map_sqlite_error(db_path, &error))?);
    }
    Ok(refs)
}

/// Writes post-execution bookkeeping only if the rule is still active and
/// still scheduled for `observed_next`. Returns `false` when another writer
/// got there first.
pub fn apply_execution(
    connection: &Connection,
    db_path: &Path,
    rule_id: &str,
    observed_next: NaiveDate,
    advance: &Advance,
    updated_at: &str,
) -> CoreResult<bool> {
    let changed = connection
        .execute(
            "UPDATE recurring_rules
             SET last_execution_date = ?3,
                 remaining_executions = ?4,
                 next_execution_date = ?5,
                 is_active = ?6,
                 updated_at = ?7
             WHERE rule_id = ?1
               AND is_active = 1
               AND next_execution_date = ?2",
            params![
                rule_id,
                format_iso_date(&observed_next),
                format_iso_date(&advance.last_execution_date),
                advance.remaining_executions,
                format_iso_date(&advance.next_execution_date),
                advance.is_active,
                updated_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(changed == 1)
}

/// Rewrites the user-editable fields of a rule.
pub fn update_rule_fields(
    connection: &Connection,
    db_path: &Path,
    rule: &RecurringRule,
    updated_at: &str,
) -> CoreResult<()> {
    connection
        .execute(
            "UPDATE recurring_rules
             SET amount = ?2,
                 note = ?3,
                 frequency = ?4,
                 end_date = ?5,
                 auto_execute = ?6,
                 updated_at = ?7
             WHERE rule_id = ?1",
            params![
                &rule.rule_id,
                rule.amount.to_string(),
                &rule.note,
                rule.frequency.as_str(),
                rule.end_date.as_ref().map(format_iso_date),
                rule.auto_execute,
                updated_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

pub fn set_active(
    connection: &Connection,
    db_path: &Path,
    rule_id: &str,
    is_active: bool,
    updated_at: &str,
) -> CoreResult<()> {
    connection
        .execute(
            "UPDATE recurring_rules SET is_active = ?2, updated_at = ?3 WHERE rule_id = ?1",
            params![rule_id, is_active, updated_at],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

pub fn delete_rule(connection: &Connection, db_path: &Path, rule_id: &str) -> CoreResult<()> {
    connection
        .execute("DELETE FROM recurring_rules WHERE rule_id = ?1", [rule_id])
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

fn collect_rules(
    connection: &Connection,
    db_path: &Path,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> CoreResult<Vec<RecurringRule>> {
    let mut statement = connection
        .prepare(sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map(params, RawRule::from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut rules = Vec::new();
    for row in rows_iter {
        let raw = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        rules.push(raw.into_rule(db_path)?);
    }
    Ok(rules)
}

struct RawRule {
    rule_id: String,
    user_id: String,
    category_id: String,
    account_id: String,
    amount: String,
    kind: String,
    note: Option<String>,
    frequency: String,
    start_date: String,
    end_date: Option<String>,
    next_execution_date: String,
    last_execution_date: Option<String>,
    is_active: bool,
    auto_execute: bool,
    remaining_executions: Option<u32>,
}

impl RawRule {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            rule_id: row.get(0)?,
            user_id: row.get(1)?,
            category_id: row.get(2)?,
            account_id: row.get(3)?,
            amount: row.get(4)?,
            kind: row.get(5)?,
            note: row.get(6)?,
            frequency: row.get(7)?,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            next_execution_date: row.get(10)?,
            last_execution_date: row.get(11)?,
            is_active: row.get(12)?,
            auto_execute: row.get(13)?,
            remaining_executions: row.get(14)?,
        })
    }

    /// Frequency errors surface as `InvalidFrequency`; any other undecodable
    /// column is reported as invalid ledger data.
    fn into_rule(self, db_path: &Path) -> CoreResult<RecurringRule> {
        let frequency = self.frequency.parse::<Frequency>()?;
        let date = |value: &str| {
            parse_iso_date(value, "date")
                .map_err(|_| CoreError::ledger_data_invalid(db_path, &format!("date `{value}`")))
        };

        Ok(RecurringRule {
            amount: decimal_column(db_path, &self.amount)?,
            kind: kind_column(db_path, &self.kind)?,
            frequency,
            start_date: date(&self.start_date)?,
            end_date: self.end_date.as_deref().map(date).transpose()?,
            next_execution_date: date(&self.next_execution_date)?,
            last_execution_date: self.last_execution_date.as_deref().map(date).transpose()?,
            rule_id: self.rule_id,
            user_id: self.user_id,
            category_id: self.category_id,
            account_id: self.account_id,
            note: self.note,
            is_active: self.is_active,
            auto_execute: self.auto_execute,
            remaining_executions: self.remaining_executions,
        })
    }
}
