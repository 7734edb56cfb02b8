pub mod client;
pub mod product;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub use client::SqlClientRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

pub(crate) fn decode_uuid(column: &str, raw: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("{column}: invalid uuid: {error}")))
}

pub(crate) fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("{column}: invalid decimal: {error}")))
}

pub(crate) fn decode_datetime(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: invalid timestamp: {error}")))
}

pub(crate) fn decode_opt_datetime(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| decode_datetime(column, &value)).transpose()
}

#[cfg(test)]
mod tests {
    use super::{decode_datetime, decode_decimal, decode_uuid};

    #[test]
    fn decode_helpers_name_the_offending_column() {
        let error = decode_uuid("quotation.id", "not-a-uuid").expect_err("should fail");
        assert!(error.to_string().contains("quotation.id"));

        let error = decode_decimal("quotation.total", "12,5").expect_err("should fail");
        assert!(error.to_string().contains("quotation.total"));

        let error = decode_datetime("quotation.created_at", "yesterday").expect_err("should fail");
        assert!(error.to_string().contains("quotation.created_at"));
    }
}
