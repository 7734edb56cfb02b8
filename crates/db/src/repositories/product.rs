use sqlx::Row;

use cotizador_core::domain::company::CompanyId;
use cotizador_core::domain::product::{Product, ProductId};

use super::{decode_decimal, decode_uuid, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

pub(crate) fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company_id: String =
        row.try_get("company_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sku: String = row.try_get("sku").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tax_percentage: String =
        row.try_get("tax_percentage").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(decode_uuid("product.id", &id)?),
        company_id: CompanyId(decode_uuid("product.company_id", &company_id)?),
        name,
        sku,
        price: decode_decimal("product.price", &price)?,
        tax_percentage: decode_decimal("product.tax_percentage", &tax_percentage)?,
    })
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolve every requested product that exists, is not soft-deleted,
    /// and belongs to the company. Callers compare the returned count
    /// against the distinct requested count to detect missing or foreign
    /// products.
    pub async fn find_active_many(
        &self,
        ids: &[ProductId],
        company_id: &CompanyId,
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, company_id, name, sku, price, tax_percentage
             FROM product
             WHERE company_id = ? AND deleted_at IS NULL AND id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(company_id.0.to_string());
        for id in ids {
            query = query.bind(id.0.to_string());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }
}
