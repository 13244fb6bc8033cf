use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use delivery_eta::{
    config::AppConfig,
    tools::{self, Toolbox, DEFAULT_EXPERIENCE_ARG, DEFAULT_TRAFFIC_ARG, TOOL_SPECS},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Serves the delivery tools over HTTP/JSON")]
struct Args {
    /// JSON config file (otherwise DELIVERY_CONFIG or defaults)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides bind_addr from the config
    #[arg(long)]
    bind: Option<String>,
}

// ---------- Request/Response types ----------

fn default_traffic() -> String {
    DEFAULT_TRAFFIC_ARG.to_string()
}

fn default_experience() -> String {
    DEFAULT_EXPERIENCE_ARG.to_string()
}

#[derive(Deserialize, Debug)]
struct DeliveryArgs {
    vehicle_type: String,
    weather: String,
    distance_km: f64,
    #[serde(default = "default_traffic")]
    traffic_level: String,
    #[serde(default = "default_experience")]
    driver_experience: String,
}

#[derive(Deserialize, Debug)]
struct DriftArgs {
    daily_delivery_times: Vec<f64>,
}

#[derive(Deserialize, Debug)]
struct DistanceArgs {
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
}

#[derive(Deserialize, Debug)]
struct DateArgs {
    date_str: String,
}

#[derive(Deserialize, Debug)]
struct TextArgs {
    text: String,
}

#[derive(Serialize)]
struct Out {
    t: i64,
    tool: &'static str,
    result: Value,
}

type ApiError = (StatusCode, Json<Value>);

fn reply(tool: &'static str, result: impl Into<Value>) -> Json<Out> {
    Json(Out {
        t: chrono::Utc::now().timestamp_millis(),
        tool,
        result: result.into(),
    })
}

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    // readers clone the inner Arc and release the lock before doing any work
    tools: Arc<RwLock<Arc<Toolbox>>>,
    cfg: Arc<AppConfig>,
}

impl AppState {
    fn toolbox(&self) -> Arc<Toolbox> {
        self.tools.read().clone()
    }
}

// ---------- Handlers ----------

async fn list_tools() -> Json<Value> {
    Json(json!({ "tools": TOOL_SPECS }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let tb = state.toolbox();
    Json(json!({
        "model_loaded": tb.has_model(),
        "explainer_loaded": tb.has_explainer(),
        "baseline_loaded": tb.has_baseline(),
    }))
}

async fn predict(State(state): State<AppState>, Json(a): Json<DeliveryArgs>) -> Json<Out> {
    tracing::debug!(?a, "predict_delivery_time");
    let text = state
        .toolbox()
        .predict_delivery_time(&a.vehicle_type, &a.weather, a.distance_km, &a.traffic_level, &a.driver_experience);
    reply("predict_delivery_time", text)
}

async fn explain(State(state): State<AppState>, Json(a): Json<DeliveryArgs>) -> Result<Json<Out>, ApiError> {
    tracing::debug!(?a, "explain_delivery_prediction");
    let tb = state.toolbox();
    // 64 coalitions per tree; keep it off the async workers
    let text = tokio::task::spawn_blocking(move || {
        tb.explain_delivery_prediction(&a.vehicle_type, &a.weather, a.distance_km, &a.traffic_level, &a.driver_experience)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(reply("explain_delivery_prediction", text))
}

async fn drift(State(state): State<AppState>, Json(a): Json<DriftArgs>) -> Json<Out> {
    tracing::debug!(n = a.daily_delivery_times.len(), "check_data_drift");
    reply("check_data_drift", state.toolbox().check_data_drift(&a.daily_delivery_times))
}

async fn distance(Json(a): Json<DistanceArgs>) -> Result<Json<Out>, ApiError> {
    let km = tools::calculate_delivery_distance(a.lat1, a.lon1, a.lat2, a.lon2);
    if !km.is_finite() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "coordinates must be finite numbers" })),
        ));
    }
    Ok(reply("calculate_delivery_distance", km))
}

async fn weather(Json(a): Json<DateArgs>) -> Json<Out> {
    reply("get_weather_risk", tools::get_weather_risk(&a.date_str))
}

async fn anonymize(Json(a): Json<TextArgs>) -> Json<Out> {
    reply("anonymize_pii", tools::anonymize_pii(&a.text))
}

/// Re-read model and baseline from disk after a training run and swap them in.
async fn reload(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let cfg = state.cfg.clone();
    let fresh = tokio::task::spawn_blocking(move || Toolbox::load(&cfg))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    let status = json!({
        "model_loaded": fresh.has_model(),
        "explainer_loaded": fresh.has_explainer(),
        "baseline_loaded": fresh.has_baseline(),
    });
    *state.tools.write() = Arc::new(fresh);
    tracing::info!("reloaded artifacts: {}", status);
    Ok(Json(status))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/predict_delivery_time", post(predict))
        .route("/tools/explain_delivery_prediction", post(explain))
        .route("/tools/check_data_drift", post(drift))
        .route("/tools/calculate_delivery_distance", post(distance))
        .route("/tools/get_weather_risk", post(weather))
        .route("/tools/anonymize_pii", post(anonymize))
        .route("/admin/reload", post(reload))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(p) => AppConfig::load(p)?,
        None => AppConfig::from_env()?,
    };
    if let Some(bind) = args.bind {
        cfg.bind_addr = bind;
    }

    let toolbox = Toolbox::load(&cfg);
    if !toolbox.has_model() {
        tracing::warn!("serving without a model; run `train` and POST /admin/reload");
    }

    let state = AppState {
        tools: Arc::new(RwLock::new(Arc::new(toolbox))),
        cfg: Arc::new(cfg.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
