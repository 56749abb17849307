use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use crate::ai;
use crate::entitlement::{create_shared_enforcer, Feature, SharedQuotaEnforcer};
use crate::profile::JsonProfileStore;

#[derive(Clone)]
pub struct AppState {
    pub enforcer: SharedQuotaEnforcer,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nutria")
}

fn build_state(data_dir: PathBuf) -> Result<Arc<AppState>> {
    let store = JsonProfileStore::new(data_dir)?;
    let enforcer = create_shared_enforcer(Box::new(store))?;
    Ok(Arc::new(AppState { enforcer }))
}

pub async fn run_http_server(host: &str, port: u16, data_dir: PathBuf) -> Result<()> {
    let state = build_state(data_dir)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/quota/status", get(quota_status))
        .route("/api/quota/remaining/{feature}", get(quota_remaining))
        .route("/api/quota/check", post(quota_check))
        .route("/api/credits/purchase", post(credits_purchase))
        .route("/api/subscription", get(subscription_get))
        .route("/api/subscription", post(subscription_set))
        .route("/api/ai/chat", post(ai_chat))
        .route("/api/plan/daily", post(plan_daily))
        .route("/api/plan/weekly", post(plan_weekly))
        .route("/api/meal/analyze", post(meal_analyze))
        .route("/api/recipes/search", post(recipes_search))
        .route("/rpc", post(json_rpc_handler))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn run_stdio_server(data_dir: PathBuf) -> Result<()> {
    let state = build_state(data_dir)?;

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut stdout = stdout;

    tracing::info!("JSON-RPC server running on stdio");

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_jsonrpc_request(&state, line).await;

        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

fn internal_error(error: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": error.to_string()})),
    )
        .into_response()
}

/// The chokepoint every AI-backed handler goes through before touching the
/// backend. The write lock serializes the read-then-increment.
async fn enforce(state: &AppState, feature: Feature, amount: u32) -> Result<(), Response> {
    let mut enforcer = state.enforcer.write().await;
    match enforcer.check(feature, amount) {
        Ok(gate) => match PaywallResponse::from_gate(gate) {
            None => Ok(()),
            Some(paywall) => Err(paywall.into_response()),
        },
        Err(e) => Err(internal_error(e)),
    }
}

async fn quota_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let enforcer = state.enforcer.read().await;
    (StatusCode::OK, Json(enforcer.status_report()))
}

async fn quota_remaining(
    State(state): State<Arc<AppState>>,
    Path(feature): Path<String>,
) -> Response {
    let Ok(feature) = Feature::from_key(&feature) else {
        // Caller/catalog mismatch: reported as not available, not a crash.
        return PaywallResponse::not_available(&feature, &feature).into_response();
    };

    let enforcer = state.enforcer.read().await;
    (StatusCode::OK, Json(enforcer.remaining_uses(feature))).into_response()
}

async fn quota_check(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuotaCheckRequest>,
) -> Response {
    let Ok(feature) = Feature::from_key(&request.feature) else {
        return PaywallResponse::not_available(&request.feature, &request.feature).into_response();
    };

    match enforce(&state, feature, request.amount.unwrap_or(1)).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "allowed"})),
        )
            .into_response(),
        Err(response) => response,
    }
}

async fn credits_purchase(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreditsPurchaseRequest>,
) -> Response {
    let feature = match Feature::from_key(&request.feature) {
        Ok(feature) => feature,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    let mut enforcer = state.enforcer.write().await;
    match enforcer.purchase_credits(feature, request.pack_size) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "feature": feature.as_key(),
                "balance": enforcer.profile().purchased_credits.get(feature),
            })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn subscription_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let enforcer = state.enforcer.read().await;
    (StatusCode::OK, Json(enforcer.subscription().clone()))
}

async fn subscription_set(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubscriptionUpdateRequest>,
) -> Response {
    let subscription = match request.into_state() {
        Ok(subscription) => subscription,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    let mut enforcer = state.enforcer.write().await;
    match enforcer.set_subscription(subscription) {
        Ok(()) => (StatusCode::OK, Json(enforcer.subscription().clone())).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn ai_chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    if let Err(response) = enforce(&state, Feature::ChatInteractions, 1).await {
        return response;
    }

    match ai::coach_chat(&request).await {
        Ok(response) => (StatusCode::OK, Json(ChatResponse { response })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn plan_daily(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DailyPlanRequest>,
) -> Response {
    if let Err(response) = enforce(&state, Feature::DailyPlanGenerations, 1).await {
        return response;
    }

    match ai::generate_daily_plan(&request).await {
        Ok(plan) => (StatusCode::OK, Json(PlanResponse { plan })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn plan_weekly(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WeeklyPlanRequest>,
) -> Response {
    if let Err(response) = enforce(&state, Feature::WeeklyPlanGenerations, 1).await {
        return response;
    }

    match ai::generate_weekly_plan(&request).await {
        Ok(plan) => (StatusCode::OK, Json(PlanResponse { plan })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn meal_analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MealAnalyzeRequest>,
) -> Response {
    if let Err(response) = enforce(&state, Feature::MealAnalysesImage, 1).await {
        return response;
    }

    match ai::analyze_meal(&request).await {
        Ok(analysis) => (StatusCode::OK, Json(MealAnalyzeResponse { analysis })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn recipes_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecipeSearchRequest>,
) -> Response {
    if let Err(response) = enforce(&state, Feature::RecipeSearches, 1).await {
        return response;
    }

    match ai::search_recipes(&request).await {
        Ok(results) => (StatusCode::OK, Json(RecipeSearchResponse { results })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn json_rpc_handler(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let response = handle_jsonrpc_request(&state, &body).await;
    (StatusCode::OK, response)
}

async fn handle_jsonrpc_request(state: &Arc<AppState>, request: &str) -> String {
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(request);

    match parsed {
        Ok(json) => {
            let method = json.get("method").and_then(|m| m.as_str()).unwrap_or("");
            let params = json
                .get("params")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            let id = json.get("id").cloned().unwrap_or(serde_json::Value::Null);

            let result = dispatch_method(state, method, params).await;

            match result {
                Ok(value) => serde_json::json!({
                    "jsonrpc": "2.0",
                    "result": value,
                    "id": id
                })
                .to_string(),
                Err(e) => serde_json::json!({
                    "jsonrpc": "2.0",
                    "error": {
                        "code": -32000,
                        "message": e.to_string()
                    },
                    "id": id
                })
                .to_string(),
            }
        }
        Err(e) => serde_json::json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32700,
                "message": format!("Parse error: {}", e)
            },
            "id": null
        })
        .to_string(),
    }
}

async fn dispatch_method(
    state: &Arc<AppState>,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value> {
    match method {
        "quota.check" => {
            let request: QuotaCheckRequest = serde_json::from_value(params)?;
            let Ok(feature) = Feature::from_key(&request.feature) else {
                let paywall = PaywallResponse::not_available(&request.feature, &request.feature);
                return Ok(serde_json::to_value(paywall)?);
            };

            let mut enforcer = state.enforcer.write().await;
            let gate = enforcer.check(feature, request.amount.unwrap_or(1))?;
            match PaywallResponse::from_gate(gate) {
                None => Ok(serde_json::json!({"status": "allowed"})),
                Some(paywall) => Ok(serde_json::to_value(paywall)?),
            }
        }
        "quota.status" => {
            let enforcer = state.enforcer.read().await;
            Ok(serde_json::to_value(enforcer.status_report())?)
        }
        "quota.remaining" => {
            let request: QuotaCheckRequest = serde_json::from_value(params)?;
            let feature = Feature::from_key(&request.feature)?;
            let enforcer = state.enforcer.read().await;
            Ok(serde_json::to_value(enforcer.remaining_uses(feature))?)
        }
        "credits.purchase" => {
            let request: CreditsPurchaseRequest = serde_json::from_value(params)?;
            let feature = Feature::from_key(&request.feature)?;
            let mut enforcer = state.enforcer.write().await;
            enforcer.purchase_credits(feature, request.pack_size)?;
            Ok(serde_json::json!({
                "success": true,
                "balance": enforcer.profile().purchased_credits.get(feature),
            }))
        }
        "subscription.get" => {
            let enforcer = state.enforcer.read().await;
            Ok(serde_json::to_value(enforcer.subscription())?)
        }
        "subscription.set" => {
            let request: SubscriptionUpdateRequest = serde_json::from_value(params)?;
            let subscription = request.into_state()?;
            let mut enforcer = state.enforcer.write().await;
            enforcer.set_subscription(subscription)?;
            Ok(serde_json::to_value(enforcer.subscription())?)
        }
        "health.check" => Ok(serde_json::Value::String("ok".to_string())),
        _ => {
            anyhow::bail!("Method not found: {}", method)
        }
    }
}
