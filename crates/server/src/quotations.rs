//! Quotation REST routes.
//!
//! Endpoints (all under `/api`):
//! - `GET    /api/quotations`              — paginated list with filters
//! - `POST   /api/quotations`              — create (fire-and-forget delivery after commit)
//! - `GET    /api/quotations/{id}`         — full view with relations and history
//! - `PUT    /api/quotations/{id}`         — partial update, `sent` status only
//! - `PATCH  /api/quotations/{id}/status`  — guarded status transition
//! - `DELETE /api/quotations/{id}`         — soft delete, admin principal only
//! - `GET    /api/quotations/{id}/document` — rendered PDF (or HTML fallback)
//!
//! Authentication happens upstream; the acting principal arrives in the
//! `x-user-id`, `x-company-id`, and `x-user-role` headers. Every handler
//! still goes through the service's own tenant checks.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use cotizador_core::domain::client::{Client, ClientId};
use cotizador_core::domain::company::CompanyId;
use cotizador_core::domain::product::{Product, ProductId};
use cotizador_core::domain::quotation::{
    Quotation, QuotationDetail, QuotationHistory, QuotationId, QuotationStatus,
};
use cotizador_core::domain::user::{Principal, User, UserId, UserRole};
use cotizador_core::errors::DomainError;
use cotizador_core::pricing::LineRequest;
use cotizador_db::{
    DbPool, NewQuotation, QuotationError, QuotationFilter, QuotationService, QuotationUpdate,
    QuotationView, StatusChange,
};

use crate::mailer::Mailer;
use crate::pdf::{QuotationRenderer, RenderedDocument};

#[derive(Clone)]
pub struct ApiState {
    service: Arc<QuotationService>,
    renderer: Option<Arc<QuotationRenderer>>,
    mailer: Option<Arc<Mailer>>,
}

pub fn router(
    db_pool: DbPool,
    renderer: Option<Arc<QuotationRenderer>>,
    mailer: Option<Arc<Mailer>>,
) -> Router {
    let state =
        ApiState { service: Arc::new(QuotationService::new(db_pool)), renderer, mailer };

    Router::new()
        .route("/api/quotations", get(list_quotations))
        .route("/api/quotations", post(create_quotation))
        .route("/api/quotations/{id}", get(get_quotation))
        .route("/api/quotations/{id}", put(update_quotation))
        .route("/api/quotations/{id}/status", patch(change_status))
        .route("/api/quotations/{id}", delete(delete_quotation))
        .route("/api/quotations/{id}/document", get(download_document))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub client_id: Uuid,
    pub lines: Vec<LineItemRequest>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuotationRequest {
    pub client_id: Option<Uuid>,
    pub lines: Option<Vec<LineItemRequest>>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
    pub rejection_reason: Option<String>,
    pub change_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DetailBody {
    #[serde(flatten)]
    pub detail: QuotationDetail,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct QuotationViewBody {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub is_expired: bool,
    pub client: Client,
    pub salesperson: User,
    pub details: Vec<DetailBody>,
    pub history: Vec<QuotationHistory>,
}

#[derive(Debug, Serialize)]
pub struct SummaryBody {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub is_expired: bool,
    pub client_name: String,
    pub client_email: String,
}

#[derive(Debug, Serialize)]
pub struct PaginationBody {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct PageBody {
    pub quotations: Vec<SummaryBody>,
    pub pagination: PaginationBody,
}

#[derive(Debug, Serialize)]
pub struct DeleteBody {
    pub id: Uuid,
    pub number: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ApiErrorBody>);

fn view_body(view: QuotationView) -> QuotationViewBody {
    let is_expired = view.quotation.is_expired(Utc::now());
    QuotationViewBody {
        is_expired,
        quotation: view.quotation,
        client: view.client,
        salesperson: view.salesperson,
        details: view
            .details
            .into_iter()
            .map(|item| DetailBody { detail: item.detail, product: item.product })
            .collect(),
        history: view.history,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_quotation(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<QuotationViewBody>), ApiError> {
    let principal = principal_from_headers(&headers)?;

    let input = NewQuotation {
        client_id: ClientId(body.client_id),
        lines: body.lines.iter().map(line_request).collect(),
        notes: body.notes,
        expires_at: body.expires_at,
    };

    let view = state
        .service
        .create(input, principal.user_id, principal.company_id)
        .await
        .map_err(map_service_error)?;

    info!(
        event_name = "quotation.created",
        quotation_number = %view.quotation.number,
        company_id = %principal.company_id.0,
        user_id = %principal.user_id.0,
        "quotation created"
    );

    spawn_delivery(&state, view.clone());

    Ok((StatusCode::CREATED, Json(view_body(view))))
}

async fn get_quotation(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QuotationViewBody>, ApiError> {
    let principal = principal_from_headers(&headers)?;

    let view = state
        .service
        .get_by_id(&QuotationId(id), &principal.company_id)
        .await
        .map_err(map_service_error)?;

    Ok(Json(view_body(view)))
}

async fn update_quotation(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateQuotationRequest>,
) -> Result<Json<QuotationViewBody>, ApiError> {
    let principal = principal_from_headers(&headers)?;

    if body.client_id.is_none()
        && body.lines.is_none()
        && body.notes.is_none()
        && body.expires_at.is_none()
    {
        return Err(bad_request(
            "at least one field is required to update a quotation".to_string(),
        ));
    }

    let input = QuotationUpdate {
        client_id: body.client_id.map(ClientId),
        lines: body.lines.as_ref().map(|lines| lines.iter().map(line_request).collect()),
        notes: body.notes,
        expires_at: body.expires_at,
    };

    let view = state
        .service
        .update(&QuotationId(id), input, principal.company_id)
        .await
        .map_err(map_service_error)?;

    Ok(Json(view_body(view)))
}

async fn change_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<QuotationViewBody>, ApiError> {
    let principal = principal_from_headers(&headers)?;

    let status = QuotationStatus::parse(&body.status).ok_or_else(|| {
        bad_request(format!(
            "unknown status `{}` (expected sent|accepted|rejected|expired)",
            body.status
        ))
    })?;

    let change = StatusChange {
        status,
        rejection_reason: body.rejection_reason,
        change_reason: body.change_reason,
    };

    let view = state
        .service
        .update_status(&QuotationId(id), change, principal.user_id, principal.company_id)
        .await
        .map_err(map_service_error)?;

    info!(
        event_name = "quotation.status_changed",
        quotation_number = %view.quotation.number,
        new_status = %view.quotation.status.as_str(),
        user_id = %principal.user_id.0,
        "quotation status changed"
    );

    Ok(Json(view_body(view)))
}

async fn delete_quotation(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteBody>, ApiError> {
    let principal = principal_from_headers(&headers)?;

    if principal.role != UserRole::Admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiErrorBody { error: "only admins may delete quotations".to_string() }),
        ));
    }

    let quotation = state
        .service
        .delete(&QuotationId(id), principal.company_id)
        .await
        .map_err(map_service_error)?;

    info!(
        event_name = "quotation.deleted",
        quotation_number = %quotation.number,
        user_id = %principal.user_id.0,
        "quotation soft-deleted"
    );

    Ok(Json(DeleteBody {
        id: quotation.id.0,
        number: quotation.number,
        deleted_at: quotation.deleted_at,
    }))
}

async fn list_quotations(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageBody>, ApiError> {
    let principal = principal_from_headers(&headers)?;
    let filter = list_filter(&query)?;

    let page = state
        .service
        .list(&principal.company_id, &filter)
        .await
        .map_err(map_service_error)?;

    let now = Utc::now();
    Ok(Json(PageBody {
        quotations: page
            .quotations
            .into_iter()
            .map(|summary| SummaryBody {
                is_expired: summary.quotation.is_expired(now),
                quotation: summary.quotation,
                client_name: summary.client_name,
                client_email: summary.client_email,
            })
            .collect(),
        pagination: PaginationBody {
            total: page.pagination.total,
            page: page.pagination.page,
            limit: page.pagination.limit,
            total_pages: page.pagination.total_pages,
        },
    }))
}

async fn download_document(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let principal = principal_from_headers(&headers)?;

    let renderer = state.renderer.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiErrorBody { error: "document rendering is not available".to_string() }),
        )
    })?;

    let view = state
        .service
        .get_by_id(&QuotationId(id), &principal.company_id)
        .await
        .map_err(map_service_error)?;

    let filename = format!("{}.pdf", view.quotation.number);
    let document = renderer.render(&view).await.map_err(|e| {
        error!(error = %e, quotation_number = %view.quotation.number, "document rendering failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorBody { error: "document rendering failed".to_string() }),
        )
    })?;

    Ok(document.into_response(&filename))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn line_request(line: &LineItemRequest) -> LineRequest {
    LineRequest {
        product_id: ProductId(line.product_id),
        quantity: line.quantity,
        unit_price: line.unit_price,
    }
}

fn list_filter(query: &ListQuery) -> Result<QuotationFilter, ApiError> {
    let status = match &query.status {
        Some(raw) => Some(QuotationStatus::parse(raw).ok_or_else(|| {
            bad_request(format!(
                "unknown status `{raw}` (expected sent|accepted|rejected|expired)"
            ))
        })?),
        None => None,
    };

    let defaults = QuotationFilter::default();
    Ok(QuotationFilter {
        status,
        client_id: query.client_id.map(ClientId),
        user_id: query.user_id.map(UserId),
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
        page: query.page.unwrap_or(defaults.page),
        limit: query.limit.unwrap_or(defaults.limit),
    })
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let user_id = header_uuid(headers, "x-user-id")?;
    let company_id = header_uuid(headers, "x-company-id")?;
    let role_raw = header_value(headers, "x-user-role")?;
    let role = UserRole::parse(&role_raw)
        .ok_or_else(|| unauthorized(format!("unknown role `{role_raw}`")))?;

    Ok(Principal { user_id: UserId(user_id), company_id: CompanyId(company_id), role })
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| unauthorized(format!("missing `{name}` header")))
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
    let raw = header_value(headers, name)?;
    Uuid::parse_str(&raw).map_err(|_| unauthorized(format!("invalid `{name}` header")))
}

fn unauthorized(message: String) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(ApiErrorBody { error: message }))
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ApiErrorBody { error: message }))
}

fn map_service_error(error: QuotationError) -> ApiError {
    match &error {
        QuotationError::Domain(DomainError::NotFound(message)) => {
            (StatusCode::NOT_FOUND, Json(ApiErrorBody { error: message.clone() }))
        }
        QuotationError::Domain(DomainError::InvalidState(message)) => {
            (StatusCode::CONFLICT, Json(ApiErrorBody { error: message.clone() }))
        }
        QuotationError::Domain(DomainError::InvalidTransition { .. }) => {
            (StatusCode::CONFLICT, Json(ApiErrorBody { error: error.to_string() }))
        }
        QuotationError::Domain(DomainError::Validation(message)) => {
            (StatusCode::BAD_REQUEST, Json(ApiErrorBody { error: message.clone() }))
        }
        _ => {
            error!(error = %error, "quotation service error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody { error: "an internal error occurred".to_string() }),
            )
        }
    }
}

/// Deliver the document to the client in the background. Create already
/// committed; nothing here may fail the request.
fn spawn_delivery(state: &ApiState, view: QuotationView) {
    let Some(mailer) = state.mailer.clone() else { return };
    let Some(renderer) = state.renderer.clone() else { return };

    tokio::spawn(async move {
        let html = match renderer.render_html(&view) {
            Ok(html) => html,
            Err(error) => {
                warn!(
                    event_name = "mail.render_failed",
                    quotation_number = %view.quotation.number,
                    error = %error,
                    "skipping delivery, document rendering failed"
                );
                return;
            }
        };

        let pdf = match renderer.render(&view).await {
            Ok(RenderedDocument::Pdf(bytes)) => Some(bytes),
            Ok(RenderedDocument::Html(_)) => None,
            Err(_) => None,
        };

        if let Err(error) = mailer
            .send_quotation(&view.client.email, &view.quotation.number, &html, pdf)
            .await
        {
            warn!(
                event_name = "mail.delivery_failed",
                quotation_number = %view.quotation.number,
                to = %view.client.email,
                error = %error,
                "quotation email delivery failed"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::Json;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use uuid::Uuid;

    use cotizador_core::config::DatabaseConfig;
    use cotizador_db::fixtures::{self, SeedSummary};
    use cotizador_db::{connect, migrations, QuotationService};

    use super::{
        change_status, create_quotation, delete_quotation, get_quotation, list_quotations,
        principal_from_headers, update_quotation, ApiState, CreateQuotationRequest,
        LineItemRequest, ListQuery, StatusChangeRequest, UpdateQuotationRequest,
    };

    async fn setup() -> (ApiState, SeedSummary) {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        let pool = connect(&config).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let seed = fixtures::DemoDataset::load(&pool).await.expect("seed");

        let state = ApiState {
            service: Arc::new(QuotationService::new(pool)),
            renderer: None,
            mailer: None,
        };
        (state, seed)
    }

    fn headers_for(user_id: Uuid, company_id: Uuid, role: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", user_id.to_string().parse().expect("header"));
        headers.insert("x-company-id", company_id.to_string().parse().expect("header"));
        headers.insert("x-user-role", role.parse().expect("header"));
        headers
    }

    fn seller_headers(seed: &SeedSummary) -> HeaderMap {
        headers_for(seed.seller_id.0, seed.company_id.0, "seller")
    }

    fn admin_headers(seed: &SeedSummary) -> HeaderMap {
        headers_for(seed.admin_id.0, seed.company_id.0, "admin")
    }

    fn create_request(seed: &SeedSummary) -> CreateQuotationRequest {
        CreateQuotationRequest {
            client_id: seed.client_ids[0].0,
            lines: vec![
                LineItemRequest {
                    product_id: seed.product_ids[0].0,
                    quantity: 2,
                    unit_price: Decimal::new(100, 0),
                },
                LineItemRequest {
                    product_id: seed.product_ids[1].0,
                    quantity: 1,
                    unit_price: Decimal::new(50, 0),
                },
            ],
            notes: None,
            expires_at: None,
        }
    }

    #[test]
    fn principal_requires_all_three_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", Uuid::new_v4().to_string().parse().expect("header"));

        let error = principal_from_headers(&headers).expect_err("incomplete headers");
        assert_eq!(error.0, StatusCode::UNAUTHORIZED);
        assert!(error.1.error.contains("x-company-id"));
    }

    #[test]
    fn principal_rejects_unknown_roles() {
        let headers = headers_for(Uuid::new_v4(), Uuid::new_v4(), "superuser");
        let error = principal_from_headers(&headers).expect_err("unknown role");
        assert_eq!(error.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_returns_201_with_the_full_view() {
        let (state, seed) = setup().await;

        let (status, Json(body)) = create_quotation(
            State(state),
            seller_headers(&seed),
            Json(create_request(&seed)),
        )
        .await
        .expect("create should succeed");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.quotation.total, Decimal::new(250, 0));
        assert_eq!(body.quotation.total_tax, Decimal::new(475, 1));
        assert_eq!(body.details.len(), 2);
        assert_eq!(body.history.len(), 1);
        assert!(!body.is_expired);
    }

    #[tokio::test]
    async fn get_refuses_a_foreign_company_header() {
        let (state, seed) = setup().await;

        let (_, Json(created)) = create_quotation(
            State(state.clone()),
            seller_headers(&seed),
            Json(create_request(&seed)),
        )
        .await
        .expect("create");

        let foreign = headers_for(seed.seller_id.0, Uuid::new_v4(), "seller");
        let error = get_quotation(State(state), foreign, Path(created.quotation.id.0))
            .await
            .expect_err("foreign tenant should not resolve");
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_requires_the_admin_role() {
        let (state, seed) = setup().await;

        let (_, Json(created)) = create_quotation(
            State(state.clone()),
            seller_headers(&seed),
            Json(create_request(&seed)),
        )
        .await
        .expect("create");

        let error = delete_quotation(
            State(state.clone()),
            seller_headers(&seed),
            Path(created.quotation.id.0),
        )
        .await
        .expect_err("sellers may not delete");
        assert_eq!(error.0, StatusCode::FORBIDDEN);

        let Json(deleted) =
            delete_quotation(State(state), admin_headers(&seed), Path(created.quotation.id.0))
                .await
                .expect("admins may delete");
        assert!(deleted.deleted_at.is_some());
    }

    #[tokio::test]
    async fn update_rejects_an_empty_body() {
        let (state, seed) = setup().await;

        let (_, Json(created)) = create_quotation(
            State(state.clone()),
            seller_headers(&seed),
            Json(create_request(&seed)),
        )
        .await
        .expect("create");

        let error = update_quotation(
            State(state),
            seller_headers(&seed),
            Path(created.quotation.id.0),
            Json(UpdateQuotationRequest::default()),
        )
        .await
        .expect_err("empty update body");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert!(error.1.error.contains("at least one field"));
    }

    #[tokio::test]
    async fn status_change_maps_domain_errors_to_http_codes() {
        let (state, seed) = setup().await;

        let (_, Json(created)) = create_quotation(
            State(state.clone()),
            seller_headers(&seed),
            Json(create_request(&seed)),
        )
        .await
        .expect("create");

        let error = change_status(
            State(state.clone()),
            admin_headers(&seed),
            Path(created.quotation.id.0),
            Json(StatusChangeRequest {
                status: "archived".to_string(),
                rejection_reason: None,
                change_reason: None,
            }),
        )
        .await
        .expect_err("unknown status");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);

        let Json(accepted) = change_status(
            State(state.clone()),
            admin_headers(&seed),
            Path(created.quotation.id.0),
            Json(StatusChangeRequest {
                status: "accepted".to_string(),
                rejection_reason: None,
                change_reason: None,
            }),
        )
        .await
        .expect("accept");
        assert!(accepted.quotation.accepted_at.is_some());

        let error = change_status(
            State(state),
            admin_headers(&seed),
            Path(created.quotation.id.0),
            Json(StatusChangeRequest {
                status: "rejected".to_string(),
                rejection_reason: Some("tarde".to_string()),
                change_reason: None,
            }),
        )
        .await
        .expect_err("terminal quotation");
        assert_eq!(error.0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn list_applies_pagination_defaults() {
        let (state, seed) = setup().await;

        create_quotation(
            State(state.clone()),
            seller_headers(&seed),
            Json(create_request(&seed)),
        )
        .await
        .expect("create");

        let Json(page) =
            list_quotations(State(state), seller_headers(&seed), Query(ListQuery::default()))
                .await
                .expect("list");

        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.limit, 10);
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.quotations.len(), 1);
        assert_eq!(page.quotations[0].client_name, seed.client_name(0));
    }
}
