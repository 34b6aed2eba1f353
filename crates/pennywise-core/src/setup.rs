use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::config::EngineConfig;
use crate::ledger::date::format_timestamp;
use crate::ledger::seed::seed_default_categories;
use crate::migrations::{EXPECTED_USER_VERSION, REQUIRED_META_KEYS, run_pending};
use crate::state::{
    Ledger, ensure_ledger_directory, ledger_db_path, map_sqlite_error, open_connection,
    resolve_ledger_home,
};
use crate::{CoreError, CoreResult};

const REQUIRED_CORE_TABLES: [(&str, &[&str]); 8] = [
    ("internal_meta", &["key", "value"]),
    ("users", &["user_id", "email", "display_name"]),
    (
        "accounts",
        &["account_id", "user_id", "name", "account_type", "currency"],
    ),
    ("categories", &["category_id", "user_id", "name", "kind"]),
    (
        "transactions",
        &[
            "transaction_id",
            "user_id",
            "account_id",
            "category_id",
            "amount",
            "kind",
            "transaction_date",
            "recurring_rule_id",
        ],
    ),
    (
        "budgets",
        &["budget_id", "user_id", "category_id", "amount", "is_active"],
    ),
    (
        "recurring_rules",
        &[
            "rule_id",
            "frequency",
            "next_execution_date",
            "last_execution_date",
            "is_active",
            "auto_execute",
            "remaining_executions",
        ],
    ),
    (
        "insights",
        &[
            "insight_id",
            "insight_type",
            "priority",
            "payload",
            "valid_until",
            "is_read",
            "dedupe_key",
        ],
    ),
];

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub db_path: String,
    pub schema_version: String,
    pub config: EngineConfig,
}

pub fn ensure_initialized() -> CoreResult<SetupContext> {
    ensure_initialized_with_home_override(None)
}

pub fn ensure_initialized_at(home_override: &Path) -> CoreResult<SetupContext> {
    ensure_initialized_with_home_override(Some(home_override))
}

/// Initializes (if needed) and opens the ledger for one command invocation.
pub fn open_ledger(home_override: Option<&Path>) -> CoreResult<(SetupContext, Ledger)> {
    let setup = ensure_initialized_with_home_override(home_override)?;
    let db_path = PathBuf::from(&setup.db_path);
    let connection = open_connection(&db_path, setup.config.busy_timeout)?;
    Ok((setup, Ledger::from_parts(connection, db_path)))
}

/// A fully migrated and seeded ledger that lives only in memory.
pub fn open_in_memory() -> CoreResult<Ledger> {
    let db_path = PathBuf::from(":memory:");
    let mut connection =
        Connection::open_in_memory().map_err(|error| map_sqlite_error(&db_path, &error))?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .map_err(|error| map_sqlite_error(&db_path, &error))?;
    initialize_connection(&mut connection, &db_path)?;
    Ok(Ledger::from_parts(connection, db_path))
}

fn ensure_initialized_with_home_override(
    home_override: Option<&Path>,
) -> CoreResult<SetupContext> {
    let config = EngineConfig::from_env()?;
    let ledger_home = resolve_ledger_home(home_override)?;
    ensure_ledger_directory(&ledger_home)?;

    let db_path = ledger_db_path(&ledger_home);
    let mut connection = open_connection(&db_path, config.busy_timeout)?;
    let schema_version = initialize_connection(&mut connection, &db_path)?;

    Ok(SetupContext {
        db_path: db_path.display().to_string(),
        schema_version,
        config,
    })
}

fn initialize_connection(connection: &mut Connection, db_path: &Path) -> CoreResult<String> {
    run_pending(connection).map_err(|error| map_migration_error(db_path, &error))?;

    verify_core_tables(connection, db_path)?;
    repair_meta_keys(connection, db_path)?;
    verify_post_repair_objects(connection, db_path)?;

    let seeded_at = format_timestamp(&Local::now().naive_local());
    let inserted = seed_default_categories(connection, db_path, &seeded_at)?;
    if inserted > 0 {
        debug!(inserted, "seeded default categories");
    }

    read_schema_version(connection, db_path)
}

fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> CoreError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if mapped.code == "ledger_locked"
                || mapped.code == "ledger_corrupt"
                || mapped.code == "ledger_init_permission_denied"
            {
                mapped
            } else {
                CoreError::migration_failed(db_path, &error.to_string())
            }
        }
        _ => CoreError::migration_failed(db_path, &error.to_string()),
    }
}

fn verify_core_tables(connection: &Connection, db_path: &Path) -> CoreResult<()> {
    for (table_name, required_columns) in REQUIRED_CORE_TABLES {
        if !sqlite_object_exists(connection, "table", table_name, db_path)? {
            return Err(CoreError::ledger_corrupt(db_path));
        }

        let columns = table_columns(connection, table_name, db_path)?;
        for required_column in required_columns {
            if !columns.iter().any(|column| column == required_column) {
                return Err(CoreError::ledger_corrupt(db_path));
            }
        }
    }

    Ok(())
}

fn repair_meta_keys(connection: &Connection, db_path: &Path) -> CoreResult<()> {
    // Insert-only: missing keys are restored, drifted values fail verification.
    for (meta_key, default_value) in REQUIRED_META_KEYS {
        connection
            .execute(
                "INSERT OR IGNORE INTO internal_meta (key, value) VALUES (?1, ?2)",
                params![meta_key, default_value],
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
    }
    Ok(())
}

fn verify_post_repair_objects(connection: &Connection, db_path: &Path) -> CoreResult<()> {
    let user_version = connection
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    if user_version != EXPECTED_USER_VERSION {
        return Err(CoreError::ledger_corrupt(db_path));
    }

    for (meta_key, expected_value) in REQUIRED_META_KEYS {
        let value = connection
            .query_row(
                "SELECT value FROM internal_meta WHERE key = ?1 LIMIT 1",
                [meta_key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|error| map_sqlite_error(db_path, &error))?;

        match value {
            Some(actual) if actual == expected_value => {}
            _ => return Err(CoreError::ledger_corrupt(db_path)),
        }
    }

    Ok(())
}

fn sqlite_object_exists(
    connection: &Connection,
    object_type: &str,
    object_name: &str,
    db_path: &Path,
) -> CoreResult<bool> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            params![object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);

    Ok(exists)
}

fn table_columns(
    connection: &Connection,
    table_name: &str,
    db_path: &Path,
) -> CoreResult<Vec<String>> {
    if !is_required_core_table(table_name) {
        return Err(CoreError::ledger_init_failed(
            db_path,
            "Refused PRAGMA table inspection for non-core table.",
        ));
    }

    // SAFETY: `table_name` comes from the REQUIRED_CORE_TABLES allowlist.
    let sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let column_iter = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut columns: Vec<String> = Vec::new();
    for row in column_iter {
        let column = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        columns.push(column);
    }

    Ok(columns)
}

fn is_required_core_table(table_name: &str) -> bool {
    REQUIRED_CORE_TABLES
        .iter()
        .any(|(required_name, _)| required_name == &table_name)
}

fn read_schema_version(connection: &Connection, db_path: &Path) -> CoreResult<String> {
    let value = connection
        .query_row(
            "SELECT value FROM internal_meta WHERE key = 'schema_version' LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(value.unwrap_or_else(|| "v1".to_string()))
}
