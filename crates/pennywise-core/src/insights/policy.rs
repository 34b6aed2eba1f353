use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;

use crate::aggregate::BudgetProgress;
use crate::insights::{BudgetAlertKind, InsightType, Priority};
use crate::{CoreError, CoreResult};

/// Thresholds that decide when spending turns into an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightPolicy {
    /// Baseline months with spending needed before anomalies are judged.
    pub anomaly_min_months: usize,
    pub anomaly_stddev_multiplier: Decimal,
    pub anomaly_min_ratio: Decimal,
    pub anomaly_high_increase: Decimal,
    pub anomaly_medium_increase: Decimal,
    pub pattern_min_occurrences: u32,
    pub pattern_limit: usize,
    pub pattern_insight_min_frequency: u32,
    pub savings_min_frequency: u32,
    pub savings_min_average: Decimal,
    pub savings_reduction: Decimal,
    pub budget_near_limit_percent: Decimal,
}

pub const DEFAULT_POLICY: InsightPolicy = InsightPolicy {
    anomaly_min_months: 3,
    anomaly_stddev_multiplier: Decimal::from_parts(15, 0, 0, false, 1),
    anomaly_min_ratio: Decimal::from_parts(13, 0, 0, false, 1),
    anomaly_high_increase: Decimal::from_parts(100, 0, 0, false, 0),
    anomaly_medium_increase: Decimal::from_parts(50, 0, 0, false, 0),
    pattern_min_occurrences: 3,
    pattern_limit: 20,
    pattern_insight_min_frequency: 5,
    savings_min_frequency: 10,
    savings_min_average: Decimal::from_parts(100, 0, 0, false, 0),
    savings_reduction: Decimal::from_parts(20, 0, 0, false, 2),
    budget_near_limit_percent: Decimal::from_parts(80, 0, 0, false, 0),
};

impl Default for InsightPolicy {
    fn default() -> Self {
        DEFAULT_POLICY
    }
}

impl InsightPolicy {
    /// Current spending is anomalous only when it clears both the deviation
    /// band and the relative floor. A threshold too large to represent is
    /// never cleared.
    pub fn is_anomalous(&self, current: Decimal, mean: Decimal, std_deviation: Decimal) -> bool {
        let band = self
            .anomaly_stddev_multiplier
            .checked_mul(std_deviation)
            .and_then(|spread| mean.checked_add(spread));
        let floor = mean.checked_mul(self.anomaly_min_ratio);
        match (band, floor) {
            (Some(band), Some(floor)) => current > band && current > floor,
            _ => false,
        }
    }

    pub fn anomaly_severity(&self, percentage_increase: Decimal) -> Priority {
        if percentage_increase >= self.anomaly_high_increase {
            Priority::High
        } else if percentage_increase >= self.anomaly_medium_increase {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    /// Near-limit covers `[80, 100)` percent. Spending exactly at the limit
    /// raises nothing; only spending past it counts as over budget.
    pub fn budget_alert(&self, progress: &BudgetProgress) -> Option<BudgetAlertKind> {
        if progress.is_over_budget {
            Some(BudgetAlertKind::OverBudget)
        } else if progress.percentage >= self.budget_near_limit_percent
            && progress.percentage < Decimal::ONE_HUNDRED
        {
            Some(BudgetAlertKind::NearLimit)
        } else {
            None
        }
    }

    pub fn qualifies_for_savings(&self, frequency: u32, average: Decimal) -> bool {
        frequency >= self.savings_min_frequency && average > self.savings_min_average
    }

    /// Projected savings from trimming the average spend on a habit that
    /// happened `frequency` times over the lookback.
    pub fn potential_savings(&self, average: Decimal, frequency: u32) -> CoreResult<Decimal> {
        average
            .checked_mul(self.savings_reduction)
            .and_then(|saved| saved.checked_mul(Decimal::from(frequency)))
            .map(|saved| saved.round_dp(2))
            .ok_or_else(|| CoreError::amount_overflow("potential savings"))
    }

    pub fn reduction_percent(&self) -> Decimal {
        (self.savings_reduction * Decimal::ONE_HUNDRED).normalize()
    }
}

/// How long an insight of each kind stays valid after it is generated.
pub fn validity(insight_type: InsightType, alert: Option<BudgetAlertKind>) -> Duration {
    match (insight_type, alert) {
        (InsightType::AnomalyDetection, _) => Duration::days(7),
        (InsightType::SpendingPattern, _) => Duration::days(14),
        (InsightType::SavingsRecommendation, _) => Duration::days(14),
        (InsightType::CategoryRecommendation, _) => Duration::days(1),
        (InsightType::BudgetAlert, Some(BudgetAlertKind::OverBudget)) => Duration::days(3),
        (InsightType::BudgetAlert, _) => Duration::days(7),
    }
}

pub fn valid_until(
    now: NaiveDateTime,
    insight_type: InsightType,
    alert: Option<BudgetAlertKind>,
) -> NaiveDateTime {
    now + validity(insight_type, alert)
}

pub fn priority_for_alert(alert: BudgetAlertKind) -> Priority {
    match alert {
        BudgetAlertKind::NearLimit => Priority::Medium,
        BudgetAlertKind::OverBudget => Priority::High,
    }
}
