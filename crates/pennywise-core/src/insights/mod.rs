pub mod anomalies;
pub mod engine;
pub mod keywords;
pub mod patterns;
pub mod policy;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::timestamp_serde;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    AnomalyDetection,
    SpendingPattern,
    BudgetAlert,
    SavingsRecommendation,
    CategoryRecommendation,
}

impl InsightType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnomalyDetection => "anomaly_detection",
            Self::SpendingPattern => "spending_pattern",
            Self::BudgetAlert => "budget_alert",
            Self::SavingsRecommendation => "savings_recommendation",
            Self::CategoryRecommendation => "category_recommendation",
        }
    }
}

impl FromStr for InsightType {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "anomaly_detection" => Ok(Self::AnomalyDetection),
            "spending_pattern" => Ok(Self::SpendingPattern),
            "budget_alert" => Ok(Self::BudgetAlert),
            "savings_recommendation" => Ok(Self::SavingsRecommendation),
            "category_recommendation" => Ok(Self::CategoryRecommendation),
            _ => Err(CoreError::invalid_field(
                "type",
                &format!(
                    "Unknown insight type `{value}`; expected one of anomaly_detection, \
                     spending_pattern, budget_alert, savings_recommendation, category_recommendation."
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(CoreError::invalid_field(
                "priority",
                &format!("Priority must be low, medium, or high, got `{value}`."),
            )),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedEntityType {
    Category,
    Budget,
}

impl RelatedEntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Budget => "budget",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Morning [6,12), Afternoon [12,18), Evening [18,23), Night otherwise.
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=22 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingAnomaly {
    pub category_id: String,
    pub category_name: String,
    pub current_amount: Decimal,
    pub average_amount: Decimal,
    pub std_deviation: Decimal,
    pub percentage_increase: Decimal,
    pub months_of_history: usize,
    pub severity: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingPattern {
    pub category_id: String,
    pub category_name: String,
    pub day_of_week: String,
    pub time_of_day: TimeOfDay,
    pub frequency: u32,
    pub average_amount: Decimal,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAlertKind {
    NearLimit,
    OverBudget,
}

impl BudgetAlertKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NearLimit => "near_limit",
            Self::OverBudget => "over_budget",
        }
    }
}

/// Structured detail attached to an insight, one shape per insight type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightPayload {
    Anomaly(SpendingAnomaly),
    Pattern(SpendingPattern),
    BudgetAlert {
        budget_id: String,
        category_name: String,
        alert: BudgetAlertKind,
        budget_amount: Decimal,
        spent_amount: Decimal,
        percentage: Decimal,
        period: String,
    },
    Savings {
        category_name: String,
        current_average: Decimal,
        frequency: u32,
        total_spent: Decimal,
        potential_savings: Decimal,
        reduction_percent: Decimal,
    },
    CategorySuggestion {
        original_note: String,
        suggested_categories: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub insight_id: String,
    pub user_id: String,
    pub insight_type: InsightType,
    pub priority: Priority,
    pub title: String,
    pub content: String,
    pub action_text: Option<String>,
    pub related_entity_id: Option<String>,
    pub related_entity_type: Option<RelatedEntityType>,
    pub payload: Option<InsightPayload>,
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub valid_until: Option<NaiveDateTime>,
    pub is_read: bool,
    #[serde(with = "timestamp_serde")]
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
}

impl Insight {
    pub fn is_valid_at(&self, now: NaiveDateTime) -> bool {
        self.valid_until.is_none_or(|until| until > now)
    }
}

fn serialize_optional_timestamp<S>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(timestamp) => timestamp_serde::serialize(timestamp, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsightFilter {
    pub user_id: String,
    pub insight_type: Option<InsightType>,
    pub priority: Option<Priority>,
    pub is_read: Option<bool>,
    pub valid_only: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub(crate) fn parse_column<T>(db_path: &std::path::Path, column: &str, raw: &str) -> CoreResult<T>
where
    T: FromStr<Err = CoreError>,
{
    raw.parse::<T>()
        .map_err(|_| CoreError::ledger_data_invalid(db_path, &format!("{column} `{raw}`")))
}
