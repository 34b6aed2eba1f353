use std::collections::BTreeMap;

use chrono::Datelike;
use rust_decimal::{Decimal, MathematicalOps};

use crate::aggregate::{AmountRow, accumulate};
use crate::insights::SpendingAnomaly;
use crate::insights::policy::InsightPolicy;
use crate::ledger::TransactionKind;
use crate::ledger::date::MonthWindow;
use crate::{CoreError, CoreResult};

/// Monthly expense totals of one category: the month under review plus the
/// baseline months that had any spending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryHistory {
    pub category_id: String,
    pub category_name: String,
    pub current: Decimal,
    pub baseline: Vec<Decimal>,
}

/// Groups expense rows into per-category monthly totals. Rows in `current`
/// count toward the month under review; rows in earlier months feed the
/// baseline. Months without spending never appear as zero entries.
pub(crate) fn category_histories(
    rows: &[AmountRow],
    current: &MonthWindow,
) -> CoreResult<Vec<CategoryHistory>> {
    let mut by_category: BTreeMap<&str, (&str, BTreeMap<(i32, u32), Decimal>)> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|row| row.kind == TransactionKind::Expense)
    {
        let (_, months) = by_category
            .entry(row.category_id.as_str())
            .or_insert_with(|| (row.category_name.as_str(), BTreeMap::new()));
        let key = (row.transaction_date.year(), row.transaction_date.month());
        accumulate(
            months.entry(key).or_insert(Decimal::ZERO),
            row.amount,
            "monthly category totals",
        )?;
    }

    let current_key = (current.year, current.month);
    let histories = by_category
        .into_iter()
        .map(|(category_id, (category_name, months))| {
            let current_total = months.get(&current_key).copied().unwrap_or(Decimal::ZERO);
            let baseline = months
                .into_iter()
                .filter(|(key, _)| *key < current_key)
                .map(|(_, total)| total)
                .collect();
            CategoryHistory {
                category_id: category_id.to_string(),
                category_name: category_name.to_string(),
                current: current_total,
                baseline,
            }
        })
        .collect();
    Ok(histories)
}

/// Mean and sample standard deviation. `Ok(None)` for fewer than two values.
pub fn mean_and_sample_std_deviation(
    values: &[Decimal],
) -> CoreResult<Option<(Decimal, Decimal)>> {
    if values.len() < 2 {
        return Ok(None);
    }
    let overflow = || CoreError::amount_overflow("the spending baseline");
    let count = Decimal::from(values.len());
    let mut sum = Decimal::ZERO;
    for value in values {
        accumulate(&mut sum, *value, "the spending baseline")?;
    }
    let mean = sum.checked_div(count).ok_or_else(overflow)?;

    let mut squared = Decimal::ZERO;
    for value in values {
        let deviation = value.checked_sub(mean).ok_or_else(overflow)?;
        let square = deviation.checked_mul(deviation).ok_or_else(overflow)?;
        accumulate(&mut squared, square, "the spending baseline")?;
    }
    let variance = squared
        .checked_div(count - Decimal::ONE)
        .ok_or_else(overflow)?;
    Ok(variance.sqrt().map(|std_deviation| (mean, std_deviation)))
}

/// Categories whose current month stands out from their baseline, largest
/// increase first.
pub fn find_anomalies(
    histories: &[CategoryHistory],
    policy: &InsightPolicy,
) -> CoreResult<Vec<SpendingAnomaly>> {
    let mut anomalies = Vec::new();
    for history in histories
        .iter()
        .filter(|history| history.current > Decimal::ZERO)
        .filter(|history| history.baseline.len() >= policy.anomaly_min_months)
    {
        let Some((mean, std_deviation)) = mean_and_sample_std_deviation(&history.baseline)? else {
            continue;
        };
        if mean <= Decimal::ZERO || !policy.is_anomalous(history.current, mean, std_deviation) {
            continue;
        }
        let percentage_increase = (history.current - mean)
            .checked_div(mean)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| CoreError::amount_overflow("an anomaly increase"))?
            .round_dp(2);
        anomalies.push(SpendingAnomaly {
            category_id: history.category_id.clone(),
            category_name: history.category_name.clone(),
            current_amount: history.current,
            average_amount: mean.round_dp(2),
            std_deviation: std_deviation.round_dp(2),
            percentage_increase,
            months_of_history: history.baseline.len(),
            severity: policy.anomaly_severity(percentage_increase),
        });
    }
    anomalies.sort_by(|left, right| {
        right
            .percentage_increase
            .cmp(&left.percentage_increase)
            .then_with(|| left.category_id.cmp(&right.category_id))
    });
    Ok(anomalies)
}
