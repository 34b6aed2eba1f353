use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");
const INSIGHT_DEDUPE_KEY_SQL: &str = include_str!("migrations/0002_insight_dedupe_key.sql");

pub const EXPECTED_USER_VERSION: i64 = 2;

pub const REQUIRED_META_KEYS: [(&str, &str); 2] =
    [("schema_version", "v1"), ("seed_version", "v1")];

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(BOOTSTRAP_SQL), M::up(INSIGHT_DEDUPE_KEY_SQL)])
}

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    migrations().to_latest(conn)
}
