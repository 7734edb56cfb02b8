//! Quotation lifecycle service and query layer.
//!
//! Every write path (create, update, status change, soft delete) commits
//! the quotation row, its detail rows, and its history row as one
//! transaction: readers never observe a status change without its audit
//! entry or a quotation with partially written details.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};
use thiserror::Error;
use uuid::Uuid;

use cotizador_core::domain::client::{Client, ClientId};
use cotizador_core::domain::company::CompanyId;
use cotizador_core::domain::product::{Product, ProductId};
use cotizador_core::domain::quotation::{
    Quotation, QuotationDetail, QuotationHistory, QuotationId, QuotationStatus,
};
use cotizador_core::domain::user::{User, UserId, UserRole};
use cotizador_core::errors::DomainError;
use cotizador_core::numbering;
use cotizador_core::pricing::{self, LineRequest, PricingOutcome};

use crate::repositories::{
    client::row_to_client, decode_datetime, decode_decimal, decode_opt_datetime, decode_uuid,
    RepositoryError, SqlClientRepository, SqlProductRepository,
};
use crate::DbPool;

/// Attempts at minting a document number before giving up. Two concurrent
/// creates can read the same last-issued number; the unique index on
/// `(company_id, number)` rejects the loser, which re-reads and retries.
const MAX_NUMBER_ATTEMPTS: u32 = 3;

const CREATION_REASON: &str = "Cotización creada";

/// Upper bound on `limit`; query parameters arrive unclamped from HTTP.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum QuotationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug)]
pub struct NewQuotation {
    pub client_id: ClientId,
    pub lines: Vec<LineRequest>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update: `None` fields are left unchanged. Supplying `lines`
/// replaces the detail set wholesale and recomputes the totals.
#[derive(Clone, Debug, Default)]
pub struct QuotationUpdate {
    pub client_id: Option<ClientId>,
    pub lines: Option<Vec<LineRequest>>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct StatusChange {
    pub status: QuotationStatus,
    pub rejection_reason: Option<String>,
    pub change_reason: Option<String>,
}

#[derive(Clone, Debug)]
pub struct QuotationFilter {
    pub status: Option<QuotationStatus>,
    pub client_id: Option<ClientId>,
    pub user_id: Option<UserId>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for QuotationFilter {
    fn default() -> Self {
        Self { status: None, client_id: None, user_id: None, search: None, page: 1, limit: 10 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Clone, Debug)]
pub struct QuotationSummary {
    pub quotation: Quotation,
    pub client_name: String,
    pub client_email: String,
}

#[derive(Clone, Debug)]
pub struct QuotationPage {
    pub quotations: Vec<QuotationSummary>,
    pub pagination: Pagination,
}

#[derive(Clone, Debug)]
pub struct DetailWithProduct {
    pub detail: QuotationDetail,
    pub product: Product,
}

/// A quotation with every relation resolved: what `create` and
/// `get_by_id` hand back to callers.
#[derive(Clone, Debug)]
pub struct QuotationView {
    pub quotation: Quotation,
    pub client: Client,
    pub salesperson: User,
    pub details: Vec<DetailWithProduct>,
    pub history: Vec<QuotationHistory>,
}

pub struct QuotationService {
    pool: DbPool,
}

impl QuotationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        input: NewQuotation,
        actor: UserId,
        company_id: CompanyId,
    ) -> Result<QuotationView, QuotationError> {
        let priced = pricing::price_lines(&input.lines)?;
        self.require_client(&input.client_id, &company_id).await?;
        self.require_products(&input.lines, &company_id).await?;

        let now = Utc::now();
        let expires_at = input.expires_at.unwrap_or(now + Duration::days(7));
        let id = QuotationId(Uuid::new_v4());

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .insert_quotation(&id, &input, &priced, actor, company_id, now, expires_at)
                .await
            {
                Ok(()) => break,
                Err(QuotationError::Database(error))
                    if is_unique_violation(&error) && attempt < MAX_NUMBER_ATTEMPTS =>
                {
                    continue;
                }
                Err(error) => return Err(error),
            }
        }

        self.get_by_id(&id, &company_id).await
    }

    pub async fn update(
        &self,
        id: &QuotationId,
        input: QuotationUpdate,
        company_id: CompanyId,
    ) -> Result<QuotationView, QuotationError> {
        let current = self.fetch_quotation(id, &company_id).await?;
        if current.status != QuotationStatus::Sent {
            return Err(DomainError::InvalidState(
                "only sent-status quotations may be updated".to_string(),
            )
            .into());
        }

        if let Some(client_id) = &input.client_id {
            self.require_client(client_id, &company_id).await?;
        }
        let priced = match &input.lines {
            Some(lines) => {
                self.require_products(lines, &company_id).await?;
                Some(pricing::price_lines(lines)?)
            }
            None => None,
        };

        let client_id = input.client_id.unwrap_or(current.client_id);
        let notes = input.notes.or(current.notes);
        let expires_at = input.expires_at.or(current.expires_at);
        let (total, total_tax) = match &priced {
            Some(outcome) => (outcome.total, outcome.total_tax),
            None => (current.total, current.total_tax),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE quotation
             SET client_id = ?, notes = ?, expires_at = ?, total = ?, total_tax = ?
             WHERE id = ?",
        )
        .bind(client_id.0.to_string())
        .bind(notes.as_deref())
        .bind(expires_at.map(|value| value.to_rfc3339()))
        .bind(total.to_string())
        .bind(total_tax.to_string())
        .bind(id.0.to_string())
        .execute(&mut *tx)
        .await?;

        if let Some(outcome) = &priced {
            sqlx::query("DELETE FROM quotation_detail WHERE quotation_id = ?")
                .bind(id.0.to_string())
                .execute(&mut *tx)
                .await?;
            insert_details(&mut tx, id, outcome).await?;
        }

        tx.commit().await?;

        self.get_by_id(id, &company_id).await
    }

    pub async fn update_status(
        &self,
        id: &QuotationId,
        change: StatusChange,
        actor: UserId,
        company_id: CompanyId,
    ) -> Result<QuotationView, QuotationError> {
        let current = self.fetch_quotation(id, &company_id).await?;

        let rejection_reason = change.rejection_reason.as_deref().map(str::trim);
        if change.status == QuotationStatus::Rejected
            && rejection_reason.map(str::is_empty).unwrap_or(true)
        {
            return Err(DomainError::Validation(
                "a rejection reason is required to reject a quotation".to_string(),
            )
            .into());
        }

        if !current.status.can_transition_to(change.status) {
            return Err(
                DomainError::InvalidTransition { from: current.status, to: change.status }.into()
            );
        }

        let now = Utc::now();
        let reason = change
            .change_reason
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Estado cambiado de {} a {}",
                    current.status.as_str(),
                    change.status.as_str()
                )
            });

        let mut tx = self.pool.begin().await?;

        match change.status {
            QuotationStatus::Accepted => {
                sqlx::query("UPDATE quotation SET status = ?, accepted_at = ? WHERE id = ?")
                    .bind(change.status.as_str())
                    .bind(now.to_rfc3339())
                    .bind(id.0.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            QuotationStatus::Rejected => {
                sqlx::query("UPDATE quotation SET status = ?, rejection_reason = ? WHERE id = ?")
                    .bind(change.status.as_str())
                    .bind(rejection_reason)
                    .bind(id.0.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            _ => {
                sqlx::query("UPDATE quotation SET status = ? WHERE id = ?")
                    .bind(change.status.as_str())
                    .bind(id.0.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        insert_history(&mut tx, id, actor, Some(current.status), change.status, &reason, now)
            .await?;

        tx.commit().await?;

        self.get_by_id(id, &company_id).await
    }

    /// Soft delete: sets the tombstone, never cascades. Details and
    /// history stay behind for audit.
    pub async fn delete(
        &self,
        id: &QuotationId,
        company_id: CompanyId,
    ) -> Result<Quotation, QuotationError> {
        let mut current = self.fetch_quotation(id, &company_id).await?;
        if current.status != QuotationStatus::Sent {
            return Err(DomainError::InvalidState(
                "only sent-status quotations may be deleted".to_string(),
            )
            .into());
        }

        let now = Utc::now();
        sqlx::query("UPDATE quotation SET deleted_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;

        current.deleted_at = Some(now);
        Ok(current)
    }

    pub async fn list(
        &self,
        company_id: &CompanyId,
        filter: &QuotationFilter,
    ) -> Result<QuotationPage, QuotationError> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        // i64 keeps hostile page values from overflowing the offset.
        let offset = i64::from(page - 1) * i64::from(limit);

        let mut count_builder = QueryBuilder::new(
            "SELECT COUNT(*) AS count FROM quotation q JOIN client c ON c.id = q.client_id",
        );
        push_list_filters(&mut count_builder, company_id, filter);
        let total: i64 = count_builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let mut builder = QueryBuilder::new(
            "SELECT q.id, q.company_id, q.user_id, q.client_id, q.number, q.total, q.total_tax,
                    q.status, q.notes, q.rejection_reason, q.created_at, q.sent_at,
                    q.accepted_at, q.expires_at, q.deleted_at,
                    c.name AS client_name, c.email AS client_email
             FROM quotation q JOIN client c ON c.id = q.client_id",
        );
        push_list_filters(&mut builder, company_id, filter);
        builder
            .push(" ORDER BY q.created_at DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let quotations = rows
            .iter()
            .map(|row| {
                let quotation = quotation_from_row(row)?;
                let client_name: String = row
                    .try_get("client_name")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let client_email: String = row
                    .try_get("client_email")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(QuotationSummary { quotation, client_name, client_email })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let total = u64::try_from(total).unwrap_or(0);
        let total_pages = total.div_ceil(u64::from(limit));

        Ok(QuotationPage {
            quotations,
            pagination: Pagination { total, page, limit, total_pages },
        })
    }

    pub async fn get_by_id(
        &self,
        id: &QuotationId,
        company_id: &CompanyId,
    ) -> Result<QuotationView, QuotationError> {
        let quotation = self.fetch_quotation(id, company_id).await?;

        let client_row = sqlx::query(
            "SELECT id, company_id, name, email, phone, tax_id FROM client WHERE id = ?",
        )
        .bind(quotation.client_id.0.to_string())
        .fetch_one(&self.pool)
        .await?;
        let client = row_to_client(&client_row)?;

        let user_row = sqlx::query(
            "SELECT id, company_id, name, email, role FROM app_user WHERE id = ?",
        )
        .bind(quotation.user_id.0.to_string())
        .fetch_one(&self.pool)
        .await?;
        let salesperson = user_from_row(&user_row)?;

        let detail_rows = sqlx::query(
            "SELECT d.id, d.quotation_id, d.product_id, d.quantity, d.unit_price, d.subtotal,
                    d.line_tax,
                    p.id AS p_id, p.company_id AS p_company_id, p.name AS p_name,
                    p.sku AS p_sku, p.price AS p_price, p.tax_percentage AS p_tax_percentage
             FROM quotation_detail d JOIN product p ON p.id = d.product_id
             WHERE d.quotation_id = ?",
        )
        .bind(id.0.to_string())
        .fetch_all(&self.pool)
        .await?;
        let details = detail_rows
            .iter()
            .map(detail_with_product_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let history_rows = sqlx::query(
            "SELECT id, quotation_id, user_id, previous_status, new_status, change_reason,
                    changed_at
             FROM quotation_history
             WHERE quotation_id = ?
             ORDER BY changed_at DESC",
        )
        .bind(id.0.to_string())
        .fetch_all(&self.pool)
        .await?;
        let history =
            history_rows.iter().map(history_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(QuotationView { quotation, client, salesperson, details, history })
    }

    async fn fetch_quotation(
        &self,
        id: &QuotationId,
        company_id: &CompanyId,
    ) -> Result<Quotation, QuotationError> {
        let row = sqlx::query(
            "SELECT id, company_id, user_id, client_id, number, total, total_tax, status, notes,
                    rejection_reason, created_at, sent_at, accepted_at, expires_at, deleted_at
             FROM quotation
             WHERE id = ? AND company_id = ? AND deleted_at IS NULL",
        )
        .bind(id.0.to_string())
        .bind(company_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(quotation_from_row(row)?),
            None => Err(DomainError::not_found("quotation").into()),
        }
    }

    async fn require_client(
        &self,
        client_id: &ClientId,
        company_id: &CompanyId,
    ) -> Result<Client, QuotationError> {
        SqlClientRepository::new(self.pool.clone())
            .find_active(client_id, company_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(
                    "client not found or does not belong to this company".to_string(),
                )
                .into()
            })
    }

    async fn require_products(
        &self,
        lines: &[LineRequest],
        company_id: &CompanyId,
    ) -> Result<Vec<Product>, QuotationError> {
        let requested: HashSet<ProductId> = lines.iter().map(|line| line.product_id).collect();
        let ids: Vec<ProductId> = requested.iter().copied().collect();
        let products = SqlProductRepository::new(self.pool.clone())
            .find_active_many(&ids, company_id)
            .await?;

        if products.len() != requested.len() {
            return Err(
                DomainError::Validation("one or more products not found".to_string()).into()
            );
        }

        Ok(products)
    }

    async fn insert_quotation(
        &self,
        id: &QuotationId,
        input: &NewQuotation,
        priced: &PricingOutcome,
        actor: UserId,
        company_id: CompanyId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), QuotationError> {
        let mut tx = self.pool.begin().await?;

        let year = now.year();
        let last: Option<String> = sqlx::query_scalar(
            "SELECT number FROM quotation
             WHERE company_id = ? AND number LIKE ?
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(company_id.0.to_string())
        .bind(format!("{}%", numbering::year_prefix(year)))
        .fetch_optional(&mut *tx)
        .await?;
        let number = numbering::next_number(last.as_deref(), year);

        sqlx::query(
            "INSERT INTO quotation (id, company_id, user_id, client_id, number, total, total_tax,
                                    status, notes, rejection_reason, created_at, sent_at,
                                    accepted_at, expires_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, NULL, ?, NULL)",
        )
        .bind(id.0.to_string())
        .bind(company_id.0.to_string())
        .bind(actor.0.to_string())
        .bind(input.client_id.0.to_string())
        .bind(&number)
        .bind(priced.total.to_string())
        .bind(priced.total_tax.to_string())
        .bind(QuotationStatus::Sent.as_str())
        .bind(input.notes.as_deref())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        insert_details(&mut tx, id, priced).await?;
        insert_history(&mut tx, id, actor, None, QuotationStatus::Sent, CREATION_REASON, now)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn push_list_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    company_id: &CompanyId,
    filter: &QuotationFilter,
) {
    builder.push(" WHERE q.company_id = ");
    builder.push_bind(company_id.0.to_string());
    builder.push(" AND q.deleted_at IS NULL");

    if let Some(status) = filter.status {
        builder.push(" AND q.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(client_id) = filter.client_id {
        builder.push(" AND q.client_id = ");
        builder.push_bind(client_id.0.to_string());
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND q.user_id = ");
        builder.push_bind(user_id.0.to_string());
    }
    if let Some(search) = &filter.search {
        // instr() keeps the match case-sensitive; sqlite LIKE would fold
        // ASCII case.
        builder.push(" AND (instr(q.number, ");
        builder.push_bind(search.clone());
        builder.push(") > 0 OR instr(c.name, ");
        builder.push_bind(search.clone());
        builder.push(") > 0 OR instr(c.email, ");
        builder.push_bind(search.clone());
        builder.push(") > 0)");
    }
}

async fn insert_details(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    quotation_id: &QuotationId,
    priced: &PricingOutcome,
) -> Result<(), sqlx::Error> {
    for line in &priced.lines {
        sqlx::query(
            "INSERT INTO quotation_detail (id, quotation_id, product_id, quantity, unit_price,
                                           subtotal, line_tax)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(quotation_id.0.to_string())
        .bind(line.product_id.0.to_string())
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.to_string())
        .bind(line.subtotal.to_string())
        .bind(line.line_tax.to_string())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_history(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    quotation_id: &QuotationId,
    actor: UserId,
    previous_status: Option<QuotationStatus>,
    new_status: QuotationStatus,
    change_reason: &str,
    changed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quotation_history (id, quotation_id, user_id, previous_status, new_status,
                                        change_reason, changed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(quotation_id.0.to_string())
    .bind(actor.0.to_string())
    .bind(previous_status.map(|status| status.as_str()))
    .bind(new_status.as_str())
    .bind(change_reason)
    .bind(changed_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

fn decode_status(column: &str, raw: &str) -> Result<QuotationStatus, RepositoryError> {
    QuotationStatus::parse(raw)
        .ok_or_else(|| RepositoryError::Decode(format!("{column}: unknown status `{raw}`")))
}

fn quotation_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Quotation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company_id: String =
        row.try_get("company_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let client_id: String =
        row.try_get("client_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let number: String =
        row.try_get("number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total: String =
        row.try_get("total").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_tax: String =
        row.try_get("total_tax").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: Option<String> =
        row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rejection_reason: Option<String> =
        row.try_get("rejection_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sent_at: String =
        row.try_get("sent_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let accepted_at: Option<String> =
        row.try_get("accepted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expires_at: Option<String> =
        row.try_get("expires_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deleted_at: Option<String> =
        row.try_get("deleted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Quotation {
        id: QuotationId(decode_uuid("quotation.id", &id)?),
        company_id: CompanyId(decode_uuid("quotation.company_id", &company_id)?),
        user_id: UserId(decode_uuid("quotation.user_id", &user_id)?),
        client_id: ClientId(decode_uuid("quotation.client_id", &client_id)?),
        number,
        total: decode_decimal("quotation.total", &total)?,
        total_tax: decode_decimal("quotation.total_tax", &total_tax)?,
        status: decode_status("quotation.status", &status)?,
        notes,
        rejection_reason,
        created_at: decode_datetime("quotation.created_at", &created_at)?,
        sent_at: decode_datetime("quotation.sent_at", &sent_at)?,
        accepted_at: decode_opt_datetime("quotation.accepted_at", accepted_at)?,
        expires_at: decode_opt_datetime("quotation.expires_at", expires_at)?,
        deleted_at: decode_opt_datetime("quotation.deleted_at", deleted_at)?,
    })
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company_id: String =
        row.try_get("company_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(User {
        id: UserId(decode_uuid("app_user.id", &id)?),
        company_id: CompanyId(decode_uuid("app_user.company_id", &company_id)?),
        name,
        email,
        role: UserRole::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("app_user.role: unknown `{role}`")))?,
    })
}

fn detail_with_product_from_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<DetailWithProduct, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quotation_id: String =
        row.try_get("quotation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subtotal: String =
        row.try_get("subtotal").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let line_tax: String =
        row.try_get("line_tax").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let p_id: String = row.try_get("p_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let p_company_id: String =
        row.try_get("p_company_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let p_name: String =
        row.try_get("p_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let p_sku: String =
        row.try_get("p_sku").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let p_price: String =
        row.try_get("p_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let p_tax_percentage: String =
        row.try_get("p_tax_percentage").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let detail = QuotationDetail {
        id: decode_uuid("quotation_detail.id", &id)?,
        quotation_id: QuotationId(decode_uuid("quotation_detail.quotation_id", &quotation_id)?),
        product_id: ProductId(decode_uuid("quotation_detail.product_id", &product_id)?),
        quantity: u32::try_from(quantity).map_err(|_| {
            RepositoryError::Decode(format!("quotation_detail.quantity: out of range `{quantity}`"))
        })?,
        unit_price: decode_decimal("quotation_detail.unit_price", &unit_price)?,
        subtotal: decode_decimal("quotation_detail.subtotal", &subtotal)?,
        line_tax: decode_decimal("quotation_detail.line_tax", &line_tax)?,
    };
    let product = Product {
        id: ProductId(decode_uuid("product.id", &p_id)?),
        company_id: CompanyId(decode_uuid("product.company_id", &p_company_id)?),
        name: p_name,
        sku: p_sku,
        price: decode_decimal("product.price", &p_price)?,
        tax_percentage: decode_decimal("product.tax_percentage", &p_tax_percentage)?,
    };

    Ok(DetailWithProduct { detail, product })
}

fn history_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuotationHistory, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quotation_id: String =
        row.try_get("quotation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let previous_status: Option<String> =
        row.try_get("previous_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let new_status: String =
        row.try_get("new_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let change_reason: String =
        row.try_get("change_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let changed_at: String =
        row.try_get("changed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(QuotationHistory {
        id: decode_uuid("quotation_history.id", &id)?,
        quotation_id: QuotationId(decode_uuid("quotation_history.quotation_id", &quotation_id)?),
        user_id: UserId(decode_uuid("quotation_history.user_id", &user_id)?),
        previous_status: previous_status
            .map(|raw| decode_status("quotation_history.previous_status", &raw))
            .transpose()?,
        new_status: decode_status("quotation_history.new_status", &new_status)?,
        change_reason,
        changed_at: decode_datetime("quotation_history.changed_at", &changed_at)?,
    })
}
