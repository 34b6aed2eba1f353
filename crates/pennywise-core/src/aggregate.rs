use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::context::CallContext;
use crate::ledger::date::{DATETIME_FORMAT, MonthWindow, format_timestamp};
use crate::ledger::{TransactionKind, decimal_column, kind_column};
use crate::state::{Ledger, map_sqlite_error};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub user_id: String,
    pub period: String,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySpending {
    pub category_id: String,
    pub category_name: String,
    pub total: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetProgress {
    pub budget_id: String,
    pub category_id: String,
    pub category_name: String,
    pub budget_amount: Decimal,
    pub spent_amount: Decimal,
    pub remaining_amount: Decimal,
    /// Spent as a percentage of the budget, 2 dp; 0 for a zero budget.
    pub percentage: Decimal,
    pub is_over_budget: bool,
    pub period: String,
}

/// One transaction reduced to what the aggregations need.
#[derive(Debug, Clone)]
pub(crate) struct AmountRow {
    pub category_id: String,
    pub category_name: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub transaction_date: NaiveDateTime,
}

pub fn monthly_summary(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    year: i32,
    month: u32,
) -> CoreResult<MonthlySummary> {
    let window = MonthWindow::new(year, month)?;
    ctx.check()?;
    let rows = load_amount_rows(
        ledger.connection(),
        ledger.db_path(),
        user_id,
        window.start,
        window.end,
        None,
    )?;

    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;
    for row in &rows {
        let total = match row.kind {
            TransactionKind::Income => &mut total_income,
            TransactionKind::Expense => &mut total_expense,
        };
        accumulate(total, row.amount, "the monthly summary")?;
    }

    Ok(MonthlySummary {
        user_id: user_id.to_string(),
        period: window.period_label(),
        total_income,
        total_expense,
        balance: total_income - total_expense,
        transaction_count: rows.len(),
    })
}

/// Expense totals per category, largest first. Categories with nothing spent
/// are left out.
pub fn spending_by_category(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    year: i32,
    month: u32,
) -> CoreResult<Vec<CategorySpending>> {
    let window = MonthWindow::new(year, month)?;
    ctx.check()?;
    let rows = load_amount_rows(
        ledger.connection(),
        ledger.db_path(),
        user_id,
        window.start,
        window.end,
        Some(TransactionKind::Expense),
    )?;

    let mut spending = expense_totals(&rows)?
        .into_values()
        .filter(|entry| entry.total > Decimal::ZERO)
        .collect::<Vec<CategorySpending>>();
    spending.sort_by(|left, right| {
        right
            .total
            .cmp(&left.total)
            .then_with(|| left.category_name.cmp(&right.category_name))
            .then_with(|| left.category_id.cmp(&right.category_id))
    });
    Ok(spending)
}

/// Progress of every active budget in the given month, ordered by category
/// name. Always recomputed from transactions.
pub fn budget_progress(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    year: i32,
    month: u32,
) -> CoreResult<Vec<BudgetProgress>> {
    let window = MonthWindow::new(year, month)?;
    ctx.check()?;
    let budgets = load_active_budgets(ledger.connection(), ledger.db_path(), user_id)?;
    ctx.check()?;
    let rows = load_amount_rows(
        ledger.connection(),
        ledger.db_path(),
        user_id,
        window.start,
        window.end,
        Some(TransactionKind::Expense),
    )?;
    let totals = expense_totals(&rows)?;
    let period = window.period_label();

    let mut progress = budgets
        .into_iter()
        .map(|(budget_id, category_id, category_name, budget_amount)| {
            let spent_amount = totals
                .get(&category_id)
                .map_or(Decimal::ZERO, |entry| entry.total);
            Ok(BudgetProgress {
                budget_id,
                category_id,
                category_name,
                budget_amount,
                spent_amount,
                remaining_amount: budget_amount - spent_amount,
                percentage: percentage_of(spent_amount, budget_amount)?,
                is_over_budget: spent_amount > budget_amount,
                period: period.clone(),
            })
        })
        .collect::<CoreResult<Vec<BudgetProgress>>>()?;
    progress.sort_by(|left, right| {
        left.category_name
            .cmp(&right.category_name)
            .then_with(|| left.budget_id.cmp(&right.budget_id))
    });
    Ok(progress)
}

/// `part` as a percentage of `whole`, 2 dp. Zero when `whole` is zero.
pub fn percentage_of(part: Decimal, whole: Decimal) -> CoreResult<Decimal> {
    if whole.is_zero() {
        return Ok(Decimal::ZERO);
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percentage| percentage.round_dp(2))
        .ok_or_else(|| CoreError::amount_overflow("a percentage"))
}

/// Adds `amount` to `total`, failing instead of overflowing.
pub(crate) fn accumulate(total: &mut Decimal, amount: Decimal, operation: &str) -> CoreResult<()> {
    *total = total
        .checked_add(amount)
        .ok_or_else(|| CoreError::amount_overflow(operation))?;
    Ok(())
}

fn expense_totals(rows: &[AmountRow]) -> CoreResult<BTreeMap<String, CategorySpending>> {
    let mut totals: BTreeMap<String, CategorySpending> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|row| row.kind == TransactionKind::Expense)
    {
        let entry = totals
            .entry(row.category_id.clone())
            .or_insert_with(|| CategorySpending {
                category_id: row.category_id.clone(),
                category_name: row.category_name.clone(),
                total: Decimal::ZERO,
                transaction_count: 0,
            });
        accumulate(&mut entry.total, row.amount, "category totals")?;
        entry.transaction_count += 1;
    }
    Ok(totals)
}

pub(crate) fn load_amount_rows(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    from: NaiveDateTime,
    to: NaiveDateTime,
    kind: Option<TransactionKind>,
) -> CoreResult<Vec<AmountRow>> {
    let mut statement = connection
        .prepare(
            "SELECT t.category_id, c.name, t.kind, t.amount, t.transaction_date
             FROM transactions t
             INNER JOIN categories c ON c.category_id = t.category_id
             WHERE t.user_id = ?1
               AND t.transaction_date >= ?2
               AND t.transaction_date <= ?3
               AND (?4 IS NULL OR t.kind = ?4)
             ORDER BY t.transaction_date ASC, t.transaction_id ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let rows_iter = statement
        .query_map(
            params![
                user_id,
                format_timestamp(&from),
                format_timestamp(&to),
                kind.map(TransactionKind::as_str),
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut rows = Vec::new();
    for row in rows_iter {
        let (category_id, category_name, kind, amount, transaction_date) =
            row.map_err(|error| map_sqlite_error(db_path, &error))?;
        let transaction_date = NaiveDateTime::parse_from_str(&transaction_date, DATETIME_FORMAT)
            .map_err(|_| {
                CoreError::ledger_data_invalid(db_path, &format!("date `{transaction_date}`"))
            })?;
        rows.push(AmountRow {
            category_id,
            category_name,
            kind: kind_column(db_path, &kind)?,
            amount: decimal_column(db_path, &amount)?,
            transaction_date,
        });
    }
    Ok(rows)
}

fn load_active_budgets(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
) -> CoreResult<Vec<(String, String, String, Decimal)>> {
    let mut statement = connection
        .prepare(
            "SELECT b.budget_id, b.category_id, c.name, b.amount
             FROM budgets b
             INNER JOIN categories c ON c.category_id = b.category_id
             WHERE b.user_id = ?1 AND b.is_active = 1",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut budgets = Vec::new();
    for row in rows_iter {
        let (budget_id, category_id, category_name, amount) =
            row.map_err(|error| map_sqlite_error(db_path, &error))?;
        budgets.push((
            budget_id,
            category_id,
            category_name,
            decimal_column(db_path, &amount)?,
        ));
    }
    Ok(budgets)
}
