use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use cotizador_core::config::DatabaseConfig;
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::connect;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1, timeout_secs: 30 }
    }

    const MANAGED_TABLES: &[&str] = &[
        "company",
        "app_user",
        "client",
        "product",
        "quotation",
        "quotation_detail",
        "quotation_history",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect(&memory_config()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|_| panic!("check {table} table"))
            .get::<i64, _>("count");

            assert_eq!(count, 1, "table {table} should exist after migrations");
        }
    }

    #[tokio::test]
    async fn quotation_numbers_are_unique_per_company() {
        let pool = connect(&memory_config()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master
             WHERE type = 'index' AND name = 'idx_quotation_company_number'",
        )
        .fetch_one(&pool)
        .await
        .expect("check unique index")
        .get::<i64, _>("count");

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect(&memory_config()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'quotation'",
        )
        .fetch_one(&pool)
        .await
        .expect("check quotation table removed")
        .get::<i64, _>("count");

        assert_eq!(count, 0);
    }
}
