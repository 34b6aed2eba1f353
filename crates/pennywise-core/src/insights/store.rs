use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{Connection, Row, params};

use crate::insights::{
    Insight, InsightFilter, InsightPayload, InsightType, Priority, RelatedEntityType, parse_column,
};
use crate::ledger::date::{DATETIME_FORMAT, format_timestamp};
use crate::state::map_sqlite_error;
use crate::{CoreError, CoreResult};

const INSIGHT_COLUMNS: &str = "insight_id,
                user_id,
                insight_type,
                priority,
                title,
                content,
                action_text,
                related_entity_id,
                related_entity_type,
                payload,
                valid_until,
                is_read,
                created_at,
                dedupe_key";

pub fn insert_insight(connection: &Connection, db_path: &Path, insight: &Insight) -> CoreResult<()> {
    let payload = insight
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| CoreError::internal_serialization(&error.to_string()))?;

    connection
        .execute(
            &format!(
                "INSERT INTO insights ({INSIGHT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                &insight.insight_id,
                &insight.user_id,
                insight.insight_type.as_str(),
                insight.priority.as_str(),
                &insight.title,
                &insight.content,
                &insight.action_text,
                &insight.related_entity_id,
                insight.related_entity_type.map(RelatedEntityType::as_str),
                payload,
                insight.valid_until.as_ref().map(format_timestamp),
                insight.is_read,
                format_timestamp(&insight.created_at),
                &insight.dedupe_key,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

/// Highest priority first, newest first within a priority.
pub fn list_insights(
    connection: &Connection,
    db_path: &Path,
    filter: &InsightFilter,
    now: NaiveDateTime,
) -> CoreResult<Vec<Insight>> {
    let mut statement = connection
        .prepare(&format!(
            "SELECT {INSIGHT_COLUMNS}
             FROM insights
             WHERE user_id = ?1
               AND (?2 IS NULL OR insight_type = ?2)
               AND (?3 IS NULL OR priority = ?3)
               AND (?4 IS NULL OR is_read = ?4)
               AND (?5 = 0 OR valid_until IS NULL OR valid_until > ?6)
             ORDER BY CASE priority WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END DESC,
                      created_at DESC,
                      insight_id DESC
             LIMIT ?7 OFFSET ?8"
        ))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let limit = filter.limit.map_or(-1_i64, i64::from);
    let offset = filter.offset.map_or(0_i64, i64::from);
    let rows_iter = statement
        .query_map(
            params![
                &filter.user_id,
                filter.insight_type.map(InsightType::as_str),
                filter.priority.map(Priority::as_str),
                filter.is_read,
                filter.valid_only,
                format_timestamp(&now),
                limit,
                offset,
            ],
            RawInsight::from_row,
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut insights = Vec::new();
    for row in rows_iter {
        let raw = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        insights.push(raw.into_insight(db_path)?);
    }
    Ok(insights)
}

/// Returns `false` when no insight with that id belongs to the user.
pub fn mark_read(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    insight_id: &str,
) -> CoreResult<bool> {
    let changed = connection
        .execute(
            "UPDATE insights SET is_read = 1 WHERE insight_id = ?1 AND user_id = ?2",
            params![insight_id, user_id],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(changed == 1)
}

pub fn mark_all_read(connection: &Connection, db_path: &Path, user_id: &str) -> CoreResult<usize> {
    connection
        .execute(
            "UPDATE insights SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            [user_id],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))
}

/// Removes insights whose validity ended strictly before `before`.
pub fn delete_expired_before(
    connection: &Connection,
    db_path: &Path,
    before: NaiveDateTime,
) -> CoreResult<usize> {
    connection
        .execute(
            "DELETE FROM insights WHERE valid_until IS NOT NULL AND valid_until < ?1",
            [format_timestamp(&before)],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))
}

pub fn has_valid_with_dedupe_key(
    connection: &Connection,
    db_path: &Path,
    dedupe_key: &str,
    now: NaiveDateTime,
) -> CoreResult<bool> {
    connection
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM insights
                WHERE dedupe_key = ?1
                  AND (valid_until IS NULL OR valid_until > ?2)
             )",
            params![dedupe_key, format_timestamp(&now)],
            |row| row.get::<_, bool>(0),
        )
        .map_err(|error| map_sqlite_error(db_path, &error))
}

struct RawInsight {
    insight_id: String,
    user_id: String,
    insight_type: String,
    priority: String,
    title: String,
    content: String,
    action_text: Option<String>,
    related_entity_id: Option<String>,
    related_entity_type: Option<String>,
    payload: Option<String>,
    valid_until: Option<String>,
    is_read: bool,
    created_at: String,
    dedupe_key: Option<String>,
}

impl RawInsight {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            insight_id: row.get(0)?,
            user_id: row.get(1)?,
            insight_type: row.get(2)?,
            priority: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            action_text: row.get(6)?,
            related_entity_id: row.get(7)?,
            related_entity_type: row.get(8)?,
            payload: row.get(9)?,
            valid_until: row.get(10)?,
            is_read: row.get(11)?,
            created_at: row.get(12)?,
            dedupe_key: row.get(13)?,
        })
    }

    fn into_insight(self, db_path: &Path) -> CoreResult<Insight> {
        let timestamp = |value: &str| {
            NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
                .map_err(|_| CoreError::ledger_data_invalid(db_path, &format!("timestamp `{value}`")))
        };
        let related_entity_type = match self.related_entity_type.as_deref() {
            None => None,
            Some("category") => Some(RelatedEntityType::Category),
            Some("budget") => Some(RelatedEntityType::Budget),
            Some(other) => {
                return Err(CoreError::ledger_data_invalid(
                    db_path,
                    &format!("related entity type `{other}`"),
                ));
            }
        };
        let payload = self
            .payload
            .as_deref()
            .map(serde_json::from_str::<InsightPayload>)
            .transpose()
            .map_err(|error| {
                CoreError::ledger_data_invalid(db_path, &format!("insight payload: {error}"))
            })?;

        Ok(Insight {
            insight_type: parse_column(db_path, "insight type", &self.insight_type)?,
            priority: parse_column(db_path, "priority", &self.priority)?,
            valid_until: self.valid_until.as_deref().map(timestamp).transpose()?,
            created_at: timestamp(&self.created_at)?,
            related_entity_type,
            payload,
            insight_id: self.insight_id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            action_text: self.action_text,
            related_entity_id: self.related_entity_id,
            is_read: self.is_read,
            dedupe_key: self.dedupe_key,
        })
    }
}
