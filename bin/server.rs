// Eco Ledger - Web Server
// JSON API over the record store (same data as the TUI)

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use eco_ledger::{
    parse_day, Config, DaySummary, LedgerQuery, LedgerRow, MaterialFilter, RecordKind,
    RecordStore, SortDirection, SortKey, SortSpec, StoreError, TypeFilter,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<RecordStore>>,
}

impl AppState {
    fn lock(&self) -> Result<MutexGuard<'_, RecordStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "record store unavailable"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::InvalidRecord { .. }
            | StoreError::InvalidStock { .. }
            | StoreError::InvalidDate(_)
            | StoreError::UnknownValue { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(ApiResponse::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Ledger row (owned copy for the response)
#[derive(Serialize)]
struct LedgerRowResponse {
    kind: RecordKind,
    id: u64,
    time: String,
    badge: &'static str,
    details: String,
    note: String,
    value: f64,
    value_text: String,
}

impl From<&LedgerRow<'_>> for LedgerRowResponse {
    fn from(row: &LedgerRow<'_>) -> Self {
        Self {
            kind: row.kind(),
            id: row.id(),
            time: row.time().to_string(),
            badge: row.badge().label(),
            details: row.details().to_string(),
            note: row.subtitle(),
            value: row.signed_value(),
            value_text: row.value_text(),
        }
    }
}

#[derive(Serialize)]
struct StockEntry {
    material: String,
    qty: f64,
    label: String,
}

#[derive(Serialize)]
struct DeletedResponse {
    kind: RecordKind,
    id: u64,
}

/// Query string for the ledger view; every field is optional
#[derive(Debug, Default, Deserialize)]
struct LedgerParams {
    #[serde(rename = "type")]
    type_filter: Option<String>,
    material: Option<String>,
    sort: Option<String>,
    dir: Option<String>,
}

impl LedgerParams {
    fn to_query(&self) -> Result<LedgerQuery, StoreError> {
        let defaults = SortSpec::default();
        let type_filter = match &self.type_filter {
            Some(t) => t.parse::<TypeFilter>()?,
            None => TypeFilter::All,
        };
        let key = match &self.sort {
            Some(s) => s.parse::<SortKey>()?,
            None => defaults.key,
        };
        let direction = match &self.dir {
            Some(d) => d.parse::<SortDirection>()?,
            None => defaults.direction,
        };

        Ok(LedgerQuery {
            type_filter,
            material: self
                .material
                .as_deref()
                .map(MaterialFilter::from)
                .unwrap_or_default(),
            sort: SortSpec::new(key, direction),
        })
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/dates - Days with records
async fn get_dates(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let store = state.lock()?;
    Ok(Json(ApiResponse::ok(store.dates())))
}

/// GET /api/days/:date/ledger - Filtered, sorted ledger for one day
async fn get_ledger(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(params): Query<LedgerParams>,
) -> ApiResult<Vec<LedgerRowResponse>> {
    let date = parse_day(&date)?;
    let query = params.to_query()?;

    let store = state.lock()?;
    let rows = store
        .ledger_for(date, &query)
        .iter()
        .map(LedgerRowResponse::from)
        .collect();

    Ok(Json(ApiResponse::ok(rows)))
}

/// GET /api/days/:date/summary - KPIs and ranked totals for one day
async fn get_summary(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<DaySummary> {
    let date = parse_day(&date)?;

    let store = state.lock()?;

    Ok(Json(ApiResponse::ok(store.summary_for(date))))
}

/// GET /api/stock - Materials on hand
async fn get_stock(State(state): State<AppState>) -> ApiResult<Vec<StockEntry>> {
    let store = state.lock()?;
    let entries = eco_ledger::stock::in_stock(store.stock())
        .map(|(material, qty)| StockEntry {
            material: material.to_string(),
            qty,
            label: eco_ledger::stock::format_qty(qty),
        })
        .collect();

    Ok(Json(ApiResponse::ok(entries)))
}

/// DELETE /api/days/:date/:kind/:id - Remove one record
async fn delete_record(
    State(state): State<AppState>,
    Path((date, kind, id)): Path<(String, String, u64)>,
) -> ApiResult<DeletedResponse> {
    let date = parse_day(&date)?;
    let kind = kind.parse::<RecordKind>()?;

    let mut store = state.lock()?;
    store.delete_on(date, kind, id)?;

    Ok(Json(ApiResponse::ok(DeletedResponse { kind, id })))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dates", get(get_dates))
        .route("/stock", get(get_stock))
        .route("/days/:date/ledger", get(get_ledger))
        .route("/days/:date/summary", get(get_summary))
        .route("/days/:date/:kind/:id", delete(delete_record))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🌐 Eco Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load(None).context("Failed to load config")?;
    let backend = config.open_backend().context("Failed to open storage")?;
    println!("✓ Storage: {}", backend.describe());

    // Create shared state
    let state = AppState {
        store: Arc::new(Mutex::new(RecordStore::open(backend))),
    };

    let app = router(state);

    // Start server
    let addr = config.server_addr.as_str();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/health", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use eco_ledger::{Dataset, NewExpense, NewTransaction, PaymentMethod, TradeType};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(parse_day("2025-03-14").unwrap());
        for (trade, material, total) in [
            (TradeType::Sell, "Plastic", 500.0),
            (TradeType::Sell, "Paper", 300.0),
            (TradeType::Buy, "Plastic", 120.0),
        ] {
            store
                .add_transaction(NewTransaction {
                    time: Some("09:00".to_string()),
                    trade,
                    material: material.to_string(),
                    client: String::new(),
                    method: PaymentMethod::Cash,
                    total,
                })
                .unwrap();
        }
        store
            .add_expense(NewExpense {
                time: Some("10:00".to_string()),
                category: "Fuel".to_string(),
                description: "Truck".to_string(),
                amount: 40.0,
            })
            .unwrap();
        store.set_stock("Plastic", 80.0).unwrap();
        store.set_stock("Glass", 0.0).unwrap();

        AppState {
            store: Arc::new(Mutex::new(store)),
        }
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(router(test_state()), Method::GET, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_ledger_filter_and_sort() {
        let uri = "/api/days/2025-03-14/ledger?type=sell&sort=value&dir=asc";
        let (status, body) = call(router(test_state()), Method::GET, uri).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        let materials: Vec<&str> = rows.iter().map(|r| r["details"].as_str().unwrap()).collect();
        assert_eq!(materials, vec!["Paper", "Plastic"]);
        assert_eq!(rows[0]["kind"], "trans");
        assert_eq!(rows[0]["value"], 300.0);
    }

    #[tokio::test]
    async fn test_ledger_default_is_time_descending() {
        let (_, body) = call(router(test_state()), Method::GET, "/api/days/2025-03-14/ledger").await;

        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["kind"], "exp");
    }

    #[tokio::test]
    async fn test_bad_query_is_rejected() {
        let app = router(test_state());

        let (status, body) = call(app.clone(), Method::GET, "/api/days/2025-03-14/ledger?sort=weight").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("weight"));

        let (status, _) = call(app, Method::GET, "/api/days/14.03.2025/summary").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summary_and_stock() {
        let app = router(test_state());

        let (_, body) = call(app.clone(), Method::GET, "/api/days/2025-03-14/summary").await;
        assert_eq!(body["data"]["kpis"]["income"], 800.0);
        assert_eq!(body["data"]["kpis"]["expense"], 160.0);
        assert_eq!(body["data"]["top_sales"][0]["name"], "Plastic");

        let (_, body) = call(app, Method::GET, "/api/stock").await;
        let stock = body["data"].as_array().unwrap();
        assert_eq!(stock.len(), 1, "zero quantities are hidden");
        assert_eq!(stock[0]["label"], "80.0 kg");
    }

    #[tokio::test]
    async fn test_delete_record() {
        let state = test_state();
        let app = router(state.clone());

        let (status, body) = call(app.clone(), Method::DELETE, "/api/days/2025-03-14/exp/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["kind"], "exp");
        assert!(state.store.lock().unwrap().day().expenses.is_empty());

        let (status, _) = call(app.clone(), Method::DELETE, "/api/days/2025-03-14/exp/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(app, Method::DELETE, "/api/days/2025-03-14/stock/1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requests_leave_selected_date_alone() {
        let state = test_state();
        let selected = parse_day("2025-03-20").unwrap();
        state.store.lock().unwrap().select_date(selected);
        let app = router(state.clone());

        let (_, body) = call(app.clone(), Method::GET, "/api/days/2025-03-14/ledger").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 4);
        call(app.clone(), Method::GET, "/api/days/2025-03-14/summary").await;
        let (status, _) = call(app, Method::DELETE, "/api/days/2025-03-14/trans/1").await;
        assert_eq!(status, StatusCode::OK);

        let store = state.store.lock().unwrap();
        assert_eq!(store.date(), selected);
        assert_eq!(store.day_at(parse_day("2025-03-14").unwrap()).transactions.len(), 2);
    }
}
