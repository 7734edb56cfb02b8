//! Readiness endpoint: `GET /health`.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use cotizador_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ready,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct DatabaseProbe {
    pub status: ProbeStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: ProbeStatus,
    pub version: &'static str,
    pub database: DatabaseProbe,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = probe_database(&state.db_pool).await;
    let ready = database.status == ProbeStatus::Ready;

    let payload = HealthResponse {
        status: if ready { ProbeStatus::Ready } else { ProbeStatus::Degraded },
        version: env!("CARGO_PKG_VERSION"),
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(payload))
}

/// Counting quotations checks connectivity and the applied schema in one
/// round trip.
async fn probe_database(pool: &DbPool) -> DatabaseProbe {
    match sqlx::query_scalar::<_, i64>("SELECT count(*) FROM quotation").fetch_one(pool).await {
        Ok(total) => DatabaseProbe {
            status: ProbeStatus::Ready,
            detail: format!("{total} quotations stored"),
        },
        Err(error) => DatabaseProbe {
            status: ProbeStatus::Degraded,
            detail: format!("quotation store unreachable: {error}"),
        },
    }
}
