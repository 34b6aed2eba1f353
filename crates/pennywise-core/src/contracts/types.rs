use rust_decimal::Decimal;
use serde::Serialize;

use crate::aggregate::{BudgetProgress, CategorySpending};
use crate::insights::{Insight, SpendingPattern};
use crate::ledger::{Account, Budget, Category, Transaction};
use crate::recurring::{RecurringRule, RuleState};

#[derive(Debug, Clone, Serialize)]
pub struct AccountsData {
    pub user_id: String,
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoriesData {
    pub user_id: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionsData {
    pub user_id: String,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetsData {
    pub user_id: String,
    pub budgets: Vec<Budget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSetData {
    pub budget: Budget,
    pub created: bool,
}

/// A rule together with its state on the evaluation date.
#[derive(Debug, Clone, Serialize)]
pub struct RecurringRuleView {
    #[serde(flatten)]
    pub rule: RecurringRule,
    pub state: RuleState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringListData {
    pub user_id: String,
    pub as_of: String,
    pub rules: Vec<RecurringRuleView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringExecuteData {
    pub transaction: Transaction,
    pub rule: RecurringRuleView,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringDeleteData {
    pub rule_id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingData {
    pub user_id: String,
    pub period: String,
    pub total: Decimal,
    pub categories: Vec<CategorySpending>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetProgressData {
    pub user_id: String,
    pub period: String,
    pub budgets: Vec<BudgetProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsData {
    pub user_id: String,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomaliesData {
    pub user_id: String,
    pub lookback_months: u32,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternsData {
    pub user_id: String,
    pub lookback_days: u32,
    pub patterns: Vec<SpendingPattern>,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsData {
    pub user_id: String,
    pub lookback_days: u32,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationData {
    pub user_id: String,
    pub note: String,
    pub suggestion: Option<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkReadData {
    pub user_id: String,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepData {
    pub before: String,
    pub removed: usize,
}
