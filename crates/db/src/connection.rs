use std::str::FromStr;
use std::time::Duration;

use cotizador_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

// Writers serialize in sqlite; wait out short lock contention instead of
// surfacing SQLITE_BUSY to the lifecycle service.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the quotation store described by `[database]` in the config:
/// WAL journal, enforced foreign keys, and the file created on first run.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&database.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(database.timeout_secs.max(1)))
        .connect_with(options)
        .await
}
