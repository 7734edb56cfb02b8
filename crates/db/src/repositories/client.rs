use sqlx::Row;

use cotizador_core::domain::client::{Client, ClientId};
use cotizador_core::domain::company::CompanyId;

use super::{decode_uuid, RepositoryError};
use crate::DbPool;

/// Read-only access to the client reference data. Every lookup is scoped
/// to a tenant and filters soft-deleted rows in one place, so callers
/// never repeat the tombstone check.
pub struct SqlClientRepository {
    pool: DbPool,
}

pub(crate) fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company_id: String =
        row.try_get("company_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let phone: Option<String> =
        row.try_get("phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tax_id: Option<String> =
        row.try_get("tax_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Client {
        id: ClientId(decode_uuid("client.id", &id)?),
        company_id: CompanyId(decode_uuid("client.company_id", &company_id)?),
        name,
        email,
        phone,
        tax_id,
    })
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a client that exists, is not soft-deleted, and belongs to the
    /// given company. Cross-tenant ids resolve to `None`.
    pub async fn find_active(
        &self,
        id: &ClientId,
        company_id: &CompanyId,
    ) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company_id, name, email, phone, tax_id
             FROM client
             WHERE id = ? AND company_id = ? AND deleted_at IS NULL",
        )
        .bind(id.0.to_string())
        .bind(company_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_client(r)?)),
            None => Ok(None),
        }
    }
}
