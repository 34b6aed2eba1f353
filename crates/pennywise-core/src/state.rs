use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Error as SqliteError, Transaction, TransactionBehavior, ffi::ErrorCode};

use crate::config::HOME_ENV;
use crate::{CoreError, CoreResult};

pub fn resolve_ledger_home(home_override: Option<&Path>) -> CoreResult<PathBuf> {
    let candidate = match home_override {
        Some(path) => path.to_path_buf(),
        None => {
            if let Some(override_path) = std::env::var_os(HOME_ENV) {
                PathBuf::from(override_path)
            } else if let Some(home_path) = home::home_dir() {
                home_path.join(".pennywise")
            } else {
                return Err(CoreError::ledger_init_failed(
                    Path::new("."),
                    "Could not resolve a home directory for ledger initialization.",
                ));
            }
        }
    };

    absolutize(&candidate)
}

pub fn ensure_ledger_directory(path: &Path) -> CoreResult<()> {
    fs::create_dir_all(path).map_err(|error| map_io_error(path, &error))?;
    set_private_permissions_best_effort(path);
    Ok(())
}

pub fn ledger_db_path(home: &Path) -> PathBuf {
    home.join("ledger.db")
}

pub fn open_connection(db_path: &Path, busy_timeout: Duration) -> CoreResult<Connection> {
    let connection =
        Connection::open(db_path).map_err(|error| map_sqlite_error(db_path, &error))?;
    connection
        .busy_timeout(busy_timeout)
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(connection)
}

pub fn map_io_error(path: &Path, error: &std::io::Error) -> CoreError {
    if error.kind() == std::io::ErrorKind::PermissionDenied {
        return CoreError::ledger_init_permission_denied(path, &error.to_string());
    }

    CoreError::ledger_init_failed(path, &error.to_string())
}

pub fn map_sqlite_error(path: &Path, error: &SqliteError) -> CoreError {
    let error_code = error.sqlite_error_code();

    if matches!(
        error_code,
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    ) {
        return CoreError::ledger_locked(path);
    }

    if matches!(error_code, Some(ErrorCode::NotADatabase)) {
        return CoreError::ledger_corrupt(path);
    }

    if matches!(
        error_code,
        Some(ErrorCode::CannotOpen | ErrorCode::ReadOnly)
    ) {
        return CoreError::ledger_init_permission_denied(path, &error.to_string());
    }

    CoreError::ledger_query_failed(path, &error.to_string())
}

/// An open, migrated ledger database.
#[derive(Debug)]
pub struct Ledger {
    connection: Connection,
    db_path: PathBuf,
}

impl Ledger {
    pub(crate) fn from_parts(connection: Connection, db_path: PathBuf) -> Self {
        Self {
            connection,
            db_path,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `work` inside one IMMEDIATE transaction. The write lock is taken
    /// up front; any error drops the transaction, which rolls it back.
    pub fn atomic<T, F>(&mut self, work: F) -> CoreResult<T>
    where
        F: FnOnce(&Transaction<'_>, &Path) -> CoreResult<T>,
    {
        let db_path = self.db_path.as_path();
        let transaction = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        let result = work(&transaction, db_path)?;
        transaction
            .commit()
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        Ok(result)
    }
}

fn absolutize(path: &Path) -> CoreResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|error| CoreError::ledger_init_failed(path, &error.to_string()))
}

#[cfg(unix)]
fn set_private_permissions_best_effort(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn set_private_permissions_best_effort(_path: &Path) {}
