use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::engine::{Durability, SharedEngine};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub storage: StorageHealth,
    pub moderation: ModerationHealth,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageHealth {
    pub status: String,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub dirty_since: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModerationHealth {
    pub users: u64,
    pub admins: usize,
    pub active_bans: usize,
    pub audit_entries: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    pub start_time: DateTime<Utc>,
}

pub struct HealthService {
    pub router: Router,
}

impl HealthService {
    pub fn new(engine: SharedEngine) -> Self {
        let state = AppState {
            engine,
            start_time: Utc::now(),
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/health/ready", get(readiness_check))
            .route("/health/live", get(liveness_check))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state);

        Self { router }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut engine = state.engine.lock().await;

    let storage = match engine.durability() {
        Durability::Clean { saved_at } => StorageHealth {
            status: "clean".to_string(),
            last_saved_at: *saved_at,
            dirty_since: None,
            error: None,
        },
        Durability::Dirty { since, error } => StorageHealth {
            status: "dirty".to_string(),
            last_saved_at: None,
            dirty_since: Some(*since),
            error: Some(error.clone()),
        },
    };

    // Listing bans applies lazy expiry, so the count is current.
    let active_bans = engine.active_bans().len();
    let moderation = ModerationHealth {
        users: engine.stats().total_users,
        admins: engine.admins().len(),
        active_bans,
        audit_entries: engine.audit_log().len(),
    };
    drop(engine);

    let uptime = Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    // A dirty store is degraded, not down: memory is still authoritative.
    let status = if storage.status == "clean" { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
        moderation,
        uptime_seconds: uptime,
    })
}

async fn readiness_check(State(state): State<AppState>) -> Result<Json<&'static str>, StatusCode> {
    if state.engine.lock().await.durability().is_clean() {
        Ok(Json("ready"))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn liveness_check() -> Json<&'static str> {
    // Simple liveness check - if this endpoint responds, the service is alive
    Json("alive")
}
