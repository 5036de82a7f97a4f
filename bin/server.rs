// Expense Reconciliation - Web Server
// REST API with Axum over the in-memory engine

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use expense_recon::{
    confirm_match, fill_missing_ids, init_tracing, reject_match, DuplicateDetector, DuplicateMatch,
    ExpenseRecord, MerchantAliasEntry, MerchantNormalizer, OverrideOutcome, ReconConfig,
    ReconciliationEngine, ReconciliationReport, Record, Transaction,
};

/// Shared application state
///
/// Engine and detector share one alias table, so aliases added through the
/// API apply to the next reconciliation.
#[derive(Clone)]
struct AppState {
    engine: Arc<ReconciliationEngine>,
    detector: Arc<DuplicateDetector>,
}

impl AppState {
    fn new(normalizer: MerchantNormalizer) -> Self {
        Self {
            engine: Arc::new(ReconciliationEngine::new(normalizer.clone())),
            detector: Arc::new(DuplicateDetector::new(normalizer)),
        }
    }

    fn normalizer(&self) -> &MerchantNormalizer {
        self.engine.normalizer()
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Deserialize)]
struct ReconcileRequest {
    transactions: Vec<Transaction>,
    expenses: Vec<ExpenseRecord>,
}

#[derive(Deserialize)]
struct DuplicatesRequest {
    candidate: ExpenseRecord,
    existing: Vec<ExpenseRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest {
    transaction: Transaction,
    expense_id: String,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct RejectRequest {
    transaction: Transaction,
}

#[derive(Serialize)]
struct OverrideResponse {
    transaction: Transaction,
    changed: bool,
}

impl OverrideResponse {
    fn new(transaction: Transaction, outcome: OverrideOutcome) -> Self {
        Self {
            transaction,
            changed: outcome == OverrideOutcome::Applied,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddAliasRequest {
    canonical_name: String,
    alias: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct NormalizeQuery {
    merchant: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeResponse {
    canonical_name: String,
    category: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/reconcile - Match transactions against expenses
async fn reconcile(
    State(state): State<AppState>,
    Json(req): Json<ReconcileRequest>,
) -> Json<ApiResponse<ReconciliationReport>> {
    let report = state.engine.reconcile(&req.transactions, &req.expenses);
    Json(ApiResponse::ok(report))
}

/// POST /api/duplicates - Check a new expense against recorded ones
async fn duplicates(
    State(state): State<AppState>,
    Json(req): Json<DuplicatesRequest>,
) -> Json<ApiResponse<Vec<DuplicateMatch>>> {
    let DuplicatesRequest { mut candidate, mut existing } = req;

    // Id-less records get fingerprint ids so clients can tell matches apart
    fill_missing_ids(&mut existing);
    if candidate.record_id().is_empty() {
        candidate.fill_missing_id(existing.len());
    }

    let matches = state.detector.find_duplicates(&candidate, &existing);
    Json(ApiResponse::ok(matches))
}

/// POST /api/matches/confirm - Force a transaction to "matched"
async fn confirm(Json(req): Json<ConfirmRequest>) -> Json<ApiResponse<OverrideResponse>> {
    let mut transaction = req.transaction;
    let outcome = confirm_match(&mut transaction, &req.expense_id, req.confidence);
    Json(ApiResponse::ok(OverrideResponse::new(transaction, outcome)))
}

/// POST /api/matches/reject - Force a transaction back to "unmatched"
async fn reject(Json(req): Json<RejectRequest>) -> Json<ApiResponse<OverrideResponse>> {
    let mut transaction = req.transaction;
    let outcome = reject_match(&mut transaction);
    Json(ApiResponse::ok(OverrideResponse::new(transaction, outcome)))
}

/// GET /api/aliases - Current alias table
async fn list_aliases(State(state): State<AppState>) -> Json<ApiResponse<Vec<MerchantAliasEntry>>> {
    Json(ApiResponse::ok(state.normalizer().entries()))
}

/// POST /api/aliases - Add an alias (new merchant or extra spelling)
async fn add_alias(State(state): State<AppState>, Json(req): Json<AddAliasRequest>) -> impl IntoResponse {
    let canonical = req.canonical_name.trim();
    let alias = req.alias.trim();

    if canonical.is_empty() || alias.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Vec<MerchantAliasEntry>>::err("canonicalName and alias are required")),
        )
            .into_response();
    }

    state.normalizer().add_alias(canonical, alias, req.category.as_deref());
    tracing::info!(canonical, alias, "alias added");

    (StatusCode::CREATED, Json(ApiResponse::ok(state.normalizer().entries()))).into_response()
}

/// GET /api/normalize?merchant=... - Resolve one merchant
async fn normalize(
    State(state): State<AppState>,
    Query(query): Query<NormalizeQuery>,
) -> Json<ApiResponse<NormalizeResponse>> {
    Json(ApiResponse::ok(NormalizeResponse {
        canonical_name: state.normalizer().normalize(&query.merchant),
        category: state.normalizer().category_of(&query.merchant),
    }))
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/reconcile", post(reconcile))
        .route("/duplicates", post(duplicates))
        .route("/matches/confirm", post(confirm))
        .route("/matches/reject", post(reject))
        .route("/aliases", get(list_aliases).post(add_alias))
        .route("/normalize", get(normalize))
        .with_state(state)
}

fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state))
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(std::path::PathBuf::from);

    let config = ReconConfig::load(config_path.as_deref())?;
    init_tracing(&config.log_filter);

    let normalizer = config.build_normalizer()?;
    tracing::info!(aliases = normalizer.len(), "merchant alias table loaded");

    // Create shared state
    let state = AppState::new(normalizer);

    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    println!("🌐 Expense Reconciliation - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🚀 Listening on http://{}", config.bind_address);
    println!("   API: http://{}/api/reconcile", config.bind_address);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router).await.context("Server error")?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
