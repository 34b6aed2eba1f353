use chrono::{Datelike, Duration};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::aggregate::{budget_progress, load_amount_rows};
use crate::config::EngineConfig;
use crate::context::CallContext;
use crate::insights::anomalies::{category_histories, find_anomalies};
use crate::insights::keywords::suggest_categories;
use crate::insights::patterns::find_patterns;
use crate::insights::policy::{InsightPolicy, priority_for_alert, valid_until};
use crate::insights::store::{
    delete_expired_before, has_valid_with_dedupe_key, insert_insight, list_insights, mark_all_read,
    mark_read,
};
use crate::insights::{
    BudgetAlertKind, Insight, InsightFilter, InsightPayload, InsightType, Priority,
    RelatedEntityType, SpendingAnomaly, SpendingPattern,
};
use crate::ledger::TransactionKind;
use crate::ledger::date::MonthWindow;
use crate::ledger::new_id;
use crate::ledger::store::{list_user_ids, require_user};
use crate::state::Ledger;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub patterns: Vec<SpendingPattern>,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub user_id: String,
    pub anomalies: Vec<Insight>,
    pub patterns: Vec<Insight>,
    pub savings: Vec<Insight>,
}

impl WeeklyReport {
    pub fn insight_count(&self) -> usize {
        self.anomalies.len() + self.patterns.len() + self.savings.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserFailure {
    pub user_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllUsersReport {
    pub users_processed: usize,
    pub insights_generated: usize,
    pub failures: Vec<UserFailure>,
}

/// Per-category anomalies for the month containing `ctx.now`, judged
/// against the `lookback_months` months before it.
pub fn spending_anomalies(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    lookback_months: u32,
) -> CoreResult<Vec<SpendingAnomaly>> {
    ctx.check()?;
    let current = MonthWindow::containing(ctx.today())?;
    let earliest = current.shifted_back(lookback_months)?;
    let rows = load_amount_rows(
        ledger.connection(),
        ledger.db_path(),
        user_id,
        earliest.start,
        current.end,
        Some(TransactionKind::Expense),
    )?;
    find_anomalies(
        &category_histories(&rows, &current)?,
        &InsightPolicy::default(),
    )
}

pub fn detect_anomalies(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    lookback_months: u32,
) -> CoreResult<Vec<Insight>> {
    require_user(ledger.connection(), ledger.db_path(), user_id)?;
    let anomalies = spending_anomalies(ledger, ctx, user_id, lookback_months)?;
    ctx.check()?;

    let insights = anomalies
        .into_iter()
        .map(|anomaly| anomaly_insight(ctx, user_id, anomaly))
        .collect::<Vec<Insight>>();
    persist_all(ledger, &insights);
    debug!(user_id, count = insights.len(), "anomaly detection finished");
    Ok(insights)
}

/// Expense habits over the last `lookback_days` days.
pub fn spending_patterns(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    lookback_days: u32,
) -> CoreResult<Vec<SpendingPattern>> {
    ctx.check()?;
    let from = ctx.now - Duration::days(i64::from(lookback_days));
    let rows = load_amount_rows(
        ledger.connection(),
        ledger.db_path(),
        user_id,
        from,
        ctx.now,
        Some(TransactionKind::Expense),
    )?;
    find_patterns(&rows, &InsightPolicy::default())
}

pub fn detect_patterns(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    lookback_days: u32,
) -> CoreResult<PatternReport> {
    require_user(ledger.connection(), ledger.db_path(), user_id)?;
    let patterns = spending_patterns(ledger, ctx, user_id, lookback_days)?;
    ctx.check()?;

    let policy = InsightPolicy::default();
    let insights = patterns
        .iter()
        .filter(|pattern| pattern.frequency >= policy.pattern_insight_min_frequency)
        .map(|pattern| pattern_insight(ctx, user_id, pattern, lookback_days))
        .collect::<Vec<Insight>>();
    persist_all(ledger, &insights);
    debug!(
        user_id,
        patterns = patterns.len(),
        insights = insights.len(),
        "pattern detection finished"
    );
    Ok(PatternReport { patterns, insights })
}

pub fn savings_recommendations(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    lookback_days: u32,
) -> CoreResult<Vec<Insight>> {
    require_user(ledger.connection(), ledger.db_path(), user_id)?;
    let patterns = spending_patterns(ledger, ctx, user_id, lookback_days)?;
    ctx.check()?;

    let policy = InsightPolicy::default();
    let insights = patterns
        .iter()
        .filter(|pattern| policy.qualifies_for_savings(pattern.frequency, pattern.average_amount))
        .map(|pattern| savings_insight(ctx, user_id, pattern, &policy))
        .collect::<CoreResult<Vec<Insight>>>()?;
    persist_all(ledger, &insights);
    debug!(user_id, count = insights.len(), "savings recommendations finished");
    Ok(insights)
}

/// Suggests categories for a free-text note. `None` when nothing matches.
pub fn recommend_category(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    note: &str,
) -> CoreResult<Option<Insight>> {
    ctx.check()?;
    require_user(ledger.connection(), ledger.db_path(), user_id)?;
    let suggestions = suggest_categories(note);
    if suggestions.is_empty() {
        return Ok(None);
    }

    let joined = suggestions.join(", ");
    let insight = InsightDraft {
        insight_type: InsightType::CategoryRecommendation,
        priority: Priority::Low,
        title: "Suggested category".to_string(),
        content: format!("Based on \"{note}\", consider: {joined}."),
        action_text: None,
        related: None,
        payload: InsightPayload::CategorySuggestion {
            original_note: note.to_string(),
            suggested_categories: suggestions.iter().map(ToString::to_string).collect(),
        },
        alert: None,
    }
    .finish(ctx, user_id);
    persist_all(ledger, std::slice::from_ref(&insight));
    Ok(Some(insight))
}

/// Alerts for budgets at or past 80% in the current month. An alert whose
/// dedupe key still has a valid insight is not raised again.
pub fn check_budget_alerts(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
) -> CoreResult<Vec<Insight>> {
    require_user(ledger.connection(), ledger.db_path(), user_id)?;
    let today = ctx.today();
    let progress = budget_progress(ledger, ctx, user_id, today.year(), today.month())?;
    let policy = InsightPolicy::default();

    let mut insights = Vec::new();
    for entry in progress {
        let Some(alert) = policy.budget_alert(&entry) else {
            continue;
        };
        let dedupe_key = format!(
            "budget_alert:{user_id}:{}:{}:{}",
            entry.budget_id,
            entry.period,
            alert.as_str()
        );
        ctx.check()?;
        if has_valid_with_dedupe_key(ledger.connection(), ledger.db_path(), &dedupe_key, ctx.now)? {
            debug!(%dedupe_key, "budget alert already raised");
            continue;
        }

        let (title, content) = match alert {
            BudgetAlertKind::NearLimit => (
                format!("{} budget at {}%", entry.category_name, entry.percentage),
                format!(
                    "You have spent {} of your {} budget for {} in {}. {} remains.",
                    entry.spent_amount,
                    entry.budget_amount,
                    entry.category_name,
                    entry.period,
                    entry.remaining_amount
                ),
            ),
            BudgetAlertKind::OverBudget => (
                format!("{} budget exceeded", entry.category_name),
                format!(
                    "You have spent {} against a {} budget for {} in {}, {} over.",
                    entry.spent_amount,
                    entry.budget_amount,
                    entry.category_name,
                    entry.period,
                    entry.spent_amount - entry.budget_amount
                ),
            ),
        };
        let mut insight = InsightDraft {
            insight_type: InsightType::BudgetAlert,
            priority: priority_for_alert(alert),
            title,
            content,
            action_text: Some(format!("Review {} spending", entry.category_name)),
            related: Some((entry.budget_id.clone(), RelatedEntityType::Budget)),
            payload: InsightPayload::BudgetAlert {
                budget_id: entry.budget_id.clone(),
                category_name: entry.category_name.clone(),
                alert,
                budget_amount: entry.budget_amount,
                spent_amount: entry.spent_amount,
                percentage: entry.percentage,
                period: entry.period.clone(),
            },
            alert: Some(alert),
        }
        .finish(ctx, user_id);
        insight.dedupe_key = Some(dedupe_key);
        persist_all(ledger, std::slice::from_ref(&insight));
        insights.push(insight);
    }
    Ok(insights)
}

/// Anomalies, then patterns, then savings. The first failing stage stops
/// the run and its error is returned.
pub fn process_weekly(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    config: &EngineConfig,
) -> CoreResult<WeeklyReport> {
    let anomalies = detect_anomalies(ledger, ctx, user_id, config.anomaly_lookback_months)?;
    ctx.check()?;
    let pattern_report = detect_patterns(ledger, ctx, user_id, config.pattern_lookback_days)?;
    ctx.check()?;
    let savings = savings_recommendations(ledger, ctx, user_id, config.pattern_lookback_days)?;

    let report = WeeklyReport {
        user_id: user_id.to_string(),
        anomalies,
        patterns: pattern_report.insights,
        savings,
    };
    debug!(user_id, insights = report.insight_count(), "weekly insights finished");
    Ok(report)
}

/// Runs the weekly pass for every user. One user's failure is recorded and
/// the rest still run; cancellation stops the batch.
pub fn process_all_users(
    ledger: &Ledger,
    ctx: &CallContext,
    config: &EngineConfig,
) -> CoreResult<AllUsersReport> {
    ctx.check()?;
    let user_ids = list_user_ids(ledger.connection(), ledger.db_path())?;

    let mut report = AllUsersReport {
        users_processed: 0,
        insights_generated: 0,
        failures: Vec::new(),
    };
    for user_id in user_ids {
        if let Err(error) = ctx.check() {
            return Err(error.with_data(json!({ "partial_report": report })));
        }
        match process_weekly(ledger, ctx, &user_id, config) {
            Ok(weekly) => {
                report.users_processed += 1;
                report.insights_generated += weekly.insight_count();
            }
            Err(error) => {
                warn!(user_id = %user_id, code = %error.code, "weekly insights failed");
                report.failures.push(UserFailure {
                    user_id,
                    code: error.code,
                    message: error.message,
                });
            }
        }
    }

    info!(
        users = report.users_processed,
        insights = report.insights_generated,
        failed = report.failures.len(),
        "processed weekly insights for all users"
    );
    Ok(report)
}

pub fn list_user_insights(
    ledger: &Ledger,
    ctx: &CallContext,
    filter: &InsightFilter,
) -> CoreResult<Vec<Insight>> {
    ctx.check()?;
    list_insights(ledger.connection(), ledger.db_path(), filter, ctx.now)
}

pub fn mark_insight_read(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
    insight_id: &str,
) -> CoreResult<()> {
    ctx.check()?;
    if mark_read(ledger.connection(), ledger.db_path(), user_id, insight_id)? {
        Ok(())
    } else {
        Err(CoreError::not_found("insight", insight_id))
    }
}

pub fn mark_all_insights_read(
    ledger: &Ledger,
    ctx: &CallContext,
    user_id: &str,
) -> CoreResult<usize> {
    ctx.check()?;
    require_user(ledger.connection(), ledger.db_path(), user_id)?;
    mark_all_read(ledger.connection(), ledger.db_path(), user_id)
}

/// Deletes every insight whose validity ended before `ctx.now`.
pub fn sweep_expired(ledger: &Ledger, ctx: &CallContext) -> CoreResult<usize> {
    ctx.check()?;
    let removed = delete_expired_before(ledger.connection(), ledger.db_path(), ctx.now)?;
    info!(removed, "swept expired insights");
    Ok(removed)
}

fn anomaly_insight(ctx: &CallContext, user_id: &str, anomaly: SpendingAnomaly) -> Insight {
    let category = anomaly.category_name.clone();
    let title = match anomaly.severity {
        Priority::High => format!("Unusual spending on {category}"),
        Priority::Medium => format!("Spending on {category} is up"),
        Priority::Low => format!("Spending on {category} is slightly up"),
    };
    let content = format!(
        "You spent {} on {category} this month, {}% above your {}-month average of {}.",
        anomaly.current_amount,
        anomaly.percentage_increase,
        anomaly.months_of_history,
        anomaly.average_amount
    );
    InsightDraft {
        insight_type: InsightType::AnomalyDetection,
        priority: anomaly.severity,
        title,
        content,
        action_text: Some(format!("Review recent {category} transactions")),
        related: Some((anomaly.category_id.clone(), RelatedEntityType::Category)),
        payload: InsightPayload::Anomaly(anomaly),
        alert: None,
    }
    .finish(ctx, user_id)
}

fn pattern_insight(
    ctx: &CallContext,
    user_id: &str,
    pattern: &SpendingPattern,
    lookback_days: u32,
) -> Insight {
    InsightDraft {
        insight_type: InsightType::SpendingPattern,
        priority: Priority::Low,
        title: format!("Spending habit: {}", pattern.category_name),
        content: format!(
            "You spent on {} {} times on {} {}s in the last {lookback_days} days, {} on average.",
            pattern.category_name,
            pattern.frequency,
            pattern.day_of_week,
            pattern.time_of_day.as_str(),
            pattern.average_amount
        ),
        action_text: None,
        related: Some((pattern.category_id.clone(), RelatedEntityType::Category)),
        payload: InsightPayload::Pattern(pattern.clone()),
        alert: None,
    }
    .finish(ctx, user_id)
}

fn savings_insight(
    ctx: &CallContext,
    user_id: &str,
    pattern: &SpendingPattern,
    policy: &InsightPolicy,
) -> CoreResult<Insight> {
    let potential_savings = policy.potential_savings(pattern.average_amount, pattern.frequency)?;
    let reduction_percent = policy.reduction_percent();
    Ok(InsightDraft {
        insight_type: InsightType::SavingsRecommendation,
        priority: Priority::Medium,
        title: format!("Savings opportunity: {}", pattern.category_name),
        content: format!(
            "You spend on {} often ({} times, {} on average). Cutting back {reduction_percent}% \
             could save about {potential_savings} per month.",
            pattern.category_name, pattern.frequency, pattern.average_amount
        ),
        action_text: Some(format!("Set a budget for {}", pattern.category_name)),
        related: Some((pattern.category_id.clone(), RelatedEntityType::Category)),
        payload: InsightPayload::Savings {
            category_name: pattern.category_name.clone(),
            current_average: pattern.average_amount,
            frequency: pattern.frequency,
            total_spent: pattern.total_amount,
            potential_savings,
            reduction_percent,
        },
        alert: None,
    }
    .finish(ctx, user_id))
}

struct InsightDraft {
    insight_type: InsightType,
    priority: Priority,
    title: String,
    content: String,
    action_text: Option<String>,
    related: Option<(String, RelatedEntityType)>,
    payload: InsightPayload,
    alert: Option<BudgetAlertKind>,
}

impl InsightDraft {
    fn finish(self, ctx: &CallContext, user_id: &str) -> Insight {
        let (related_entity_id, related_entity_type) = match self.related {
            Some((id, kind)) => (Some(id), Some(kind)),
            None => (None, None),
        };
        Insight {
            insight_id: new_id("ins"),
            user_id: user_id.to_string(),
            insight_type: self.insight_type,
            priority: self.priority,
            title: self.title,
            content: self.content,
            action_text: self.action_text,
            related_entity_id,
            related_entity_type,
            payload: Some(self.payload),
            valid_until: Some(valid_until(ctx.now, self.insight_type, self.alert)),
            is_read: false,
            created_at: ctx.now,
            dedupe_key: None,
        }
    }
}

/// Storage failures are logged and skipped; callers still get the insights
/// they asked for.
fn persist_all(ledger: &Ledger, insights: &[Insight]) {
    for insight in insights {
        if let Err(error) = insert_insight(ledger.connection(), ledger.db_path(), insight) {
            warn!(
                insight_id = %insight.insight_id,
                insight_type = insight.insight_type.as_str(),
                code = %error.code,
                "failed to store insight"
            );
        }
    }
}
