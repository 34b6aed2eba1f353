use serde_json::json;

use crate::commands::common::{Invocation, open_session};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{
    AnomaliesData, InsightsData, MarkReadData, PatternsData, RecommendationData, SavingsData,
    SweepData,
};
use crate::insights::engine::{
    check_budget_alerts, detect_anomalies, detect_patterns, list_user_insights,
    mark_all_insights_read, mark_insight_read, process_all_users, process_weekly,
    recommend_category, savings_recommendations, sweep_expired,
};
use crate::insights::{InsightFilter, InsightType, Priority};
use crate::ledger::date::format_timestamp;
use crate::ledger::store::require_user;
use crate::{CoreError, CoreResult};

pub fn anomalies(
    invocation: Invocation<'_>,
    user_id: &str,
    lookback_months: Option<u32>,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let lookback_months = lookback_months.unwrap_or(session.setup.config.anomaly_lookback_months);
    let insights = detect_anomalies(&session.ledger, &session.ctx, user_id, lookback_months)?;
    success(
        "insights anomalies",
        AnomaliesData {
            user_id: user_id.to_string(),
            lookback_months,
            insights,
        },
    )
}

pub fn patterns(
    invocation: Invocation<'_>,
    user_id: &str,
    lookback_days: Option<u32>,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let lookback_days = lookback_days.unwrap_or(session.setup.config.pattern_lookback_days);
    let report = detect_patterns(&session.ledger, &session.ctx, user_id, lookback_days)?;
    success(
        "insights patterns",
        PatternsData {
            user_id: user_id.to_string(),
            lookback_days,
            patterns: report.patterns,
            insights: report.insights,
        },
    )
}

pub fn savings(
    invocation: Invocation<'_>,
    user_id: &str,
    lookback_days: Option<u32>,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let lookback_days = lookback_days.unwrap_or(session.setup.config.pattern_lookback_days);
    let insights = savings_recommendations(&session.ledger, &session.ctx, user_id, lookback_days)?;
    success(
        "insights savings",
        SavingsData {
            user_id: user_id.to_string(),
            lookback_days,
            insights,
        },
    )
}

pub fn recommend(
    invocation: Invocation<'_>,
    user_id: &str,
    note: &str,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let suggestion = recommend_category(&session.ledger, &session.ctx, user_id, note)?;
    success(
        "insights recommend",
        RecommendationData {
            user_id: user_id.to_string(),
            note: note.to_string(),
            suggestion,
        },
    )
}

pub fn budget_alerts(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let insights = check_budget_alerts(&session.ledger, &session.ctx, user_id)?;
    success(
        "insights budget-alerts",
        InsightsData {
            user_id: user_id.to_string(),
            insights,
        },
    )
}

pub fn weekly(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let report = process_weekly(&session.ledger, &session.ctx, user_id, &session.setup.config)?;
    success("insights weekly", report)
}

/// Weekly pass for every user. Per-user failures turn into a `batch_failed`
/// error carrying the full report.
pub fn weekly_all(invocation: Invocation<'_>) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let report = process_all_users(&session.ledger, &session.ctx, &session.setup.config)?;
    if !report.failures.is_empty() {
        return Err(CoreError::batch_failed(
            "insights weekly-all",
            report.users_processed,
            report.failures.len(),
        )
        .with_data(json!({
            "users_processed": report.users_processed,
            "insights_generated": report.insights_generated,
            "failures": report.failures,
        })));
    }
    success("insights weekly-all", report)
}

#[derive(Debug, Default)]
pub struct InsightListInput {
    pub user_id: String,
    pub insight_type: Option<String>,
    pub priority: Option<String>,
    pub unread_only: bool,
    pub include_expired: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub fn list(invocation: Invocation<'_>, input: InsightListInput) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let filter = InsightFilter {
        insight_type: input
            .insight_type
            .as_deref()
            .map(str::parse::<InsightType>)
            .transpose()?,
        priority: input
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?,
        is_read: input.unread_only.then_some(false),
        valid_only: !input.include_expired,
        limit: input.limit,
        offset: input.offset,
        user_id: input.user_id,
    };
    require_user(
        session.ledger.connection(),
        session.ledger.db_path(),
        &filter.user_id,
    )?;
    let insights = list_user_insights(&session.ledger, &session.ctx, &filter)?;
    success(
        "insights list",
        InsightsData {
            user_id: filter.user_id,
            insights,
        },
    )
}

pub fn mark_read(
    invocation: Invocation<'_>,
    user_id: &str,
    insight_id: &str,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    mark_insight_read(&session.ledger, &session.ctx, user_id, insight_id)?;
    success(
        "insights read",
        MarkReadData {
            user_id: user_id.to_string(),
            updated: 1,
        },
    )
}

pub fn mark_all_read(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let updated = mark_all_insights_read(&session.ledger, &session.ctx, user_id)?;
    success(
        "insights read-all",
        MarkReadData {
            user_id: user_id.to_string(),
            updated,
        },
    )
}

pub fn sweep(invocation: Invocation<'_>) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let removed = sweep_expired(&session.ledger, &session.ctx)?;
    success(
        "insights sweep",
        SweepData {
            before: format_timestamp(&session.ctx.now),
            removed,
        },
    )
}
