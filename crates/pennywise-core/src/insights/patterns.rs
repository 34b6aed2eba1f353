use std::collections::BTreeMap;

use chrono::{Datelike, Timelike, Weekday};
use rust_decimal::Decimal;

use crate::CoreResult;
use crate::aggregate::{AmountRow, accumulate};
use crate::insights::policy::InsightPolicy;
use crate::insights::{SpendingPattern, TimeOfDay};
use crate::ledger::TransactionKind;

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

struct Bucket<'a> {
    category_name: &'a str,
    weekday: Weekday,
    frequency: u32,
    total: Decimal,
}

/// Recurring (category, weekday, time of day) spending habits, most
/// frequent first and capped at the policy limit.
pub(crate) fn find_patterns(
    rows: &[AmountRow],
    policy: &InsightPolicy,
) -> CoreResult<Vec<SpendingPattern>> {
    let mut buckets: BTreeMap<(&str, u32, TimeOfDay), Bucket<'_>> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|row| row.kind == TransactionKind::Expense)
    {
        let key = (
            row.category_id.as_str(),
            row.transaction_date.weekday().num_days_from_monday(),
            TimeOfDay::from_hour(row.transaction_date.hour()),
        );
        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            category_name: row.category_name.as_str(),
            weekday: row.transaction_date.weekday(),
            frequency: 0,
            total: Decimal::ZERO,
        });
        bucket.frequency += 1;
        accumulate(&mut bucket.total, row.amount, "spending patterns")?;
    }

    let mut ranked = buckets
        .into_iter()
        .filter(|(_, bucket)| bucket.frequency >= policy.pattern_min_occurrences)
        .map(|((category_id, weekday_index, time_of_day), bucket)| {
            let average = bucket.total / Decimal::from(bucket.frequency);
            (weekday_index, average, category_id, time_of_day, bucket)
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|left, right| {
        right
            .4
            .frequency
            .cmp(&left.4.frequency)
            .then_with(|| right.1.cmp(&left.1))
            .then_with(|| left.2.cmp(right.2))
            .then_with(|| left.0.cmp(&right.0))
            .then_with(|| left.3.cmp(&right.3))
    });
    ranked.truncate(policy.pattern_limit);

    let patterns = ranked
        .into_iter()
        .map(|(_, average, category_id, time_of_day, bucket)| {
            SpendingPattern {
                category_id: category_id.to_string(),
                category_name: bucket.category_name.to_string(),
                day_of_week: weekday_name(bucket.weekday).to_string(),
                time_of_day,
                frequency: bucket.frequency,
                average_amount: average.round_dp(2),
                total_amount: bucket.total,
            }
        })
        .collect();
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;

    use super::find_patterns;
    use crate::aggregate::AmountRow;
    use crate::insights::TimeOfDay;
    use crate::insights::policy::DEFAULT_POLICY;
    use crate::ledger::TransactionKind;

    fn expense(category: &str, day: NaiveDate, hour: u32, amount: i64) -> AmountRow {
        AmountRow {
            category_id: category.to_string(),
            category_name: category.to_string(),
            kind: TransactionKind::Expense,
            amount: Decimal::from(amount),
            transaction_date: day.and_hms_opt(hour, 15, 0).unwrap_or_default(),
        }
    }

    fn mondays(count: i64) -> Vec<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap_or_default();
        (0..count).map(|week| first + Duration::weeks(week)).collect()
    }

    #[test]
    fn groups_need_three_occurrences() {
        let rows = mondays(2)
            .into_iter()
            .map(|day| expense("coffee", day, 8, 60))
            .collect::<Vec<_>>();
        let patterns = find_patterns(&rows, &DEFAULT_POLICY);
        assert!(matches!(patterns, Ok(found) if found.is_empty()));
    }

    #[test]
    fn habit_reports_weekday_bucket_and_average() {
        let mut rows = mondays(4)
            .into_iter()
            .map(|day| expense("coffee", day, 8, 60))
            .collect::<Vec<_>>();
        rows.push(expense("coffee", mondays(1)[0], 20, 500));

        let patterns = find_patterns(&rows, &DEFAULT_POLICY);
        assert!(patterns.is_ok());
        let Ok(patterns) = patterns else {
            return;
        };
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].day_of_week, "Monday");
        assert_eq!(patterns[0].time_of_day, TimeOfDay::Morning);
        assert_eq!(patterns[0].frequency, 4);
        assert_eq!(patterns[0].average_amount, Decimal::from(60));
        assert_eq!(patterns[0].total_amount, Decimal::from(240));
    }

    #[test]
    fn ties_on_frequency_rank_by_average_amount() {
        let mut rows = Vec::new();
        for day in mondays(3) {
            rows.push(expense("cheap", day, 13, 10));
            rows.push(expense("pricey", day, 13, 90));
        }
        let patterns = find_patterns(&rows, &DEFAULT_POLICY);
        assert!(patterns.is_ok());
        let Ok(patterns) = patterns else {
            return;
        };
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].category_id, "pricey");
        assert_eq!(patterns[1].category_id, "cheap");
    }
}
