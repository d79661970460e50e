use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use monasca_query::{
    catalog::{DimensionList, MetricCatalog},
    DatasourceStatus, MonascaConfig, MonascaDatasource, MonascaError, QueryOptions, QueryOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

struct ServerState {
    datasource: MonascaDatasource,
    catalog: MetricCatalog,
}

type AppState = Arc<ServerState>;

#[derive(Debug, Deserialize)]
struct SearchParams {
    key: String,
}

#[derive(Debug, Deserialize)]
struct DimensionParams {
    name: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(context: &str, e: MonascaError) -> ApiError {
    error!("{} failed: {}", context, e);
    let status = match e {
        MonascaError::Transport { .. } => StatusCode::BAD_GATEWAY,
        MonascaError::Config { .. } | MonascaError::Query { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Monasca query server");

    let config = MonascaConfig::from_env();
    info!("Monasca API: {}", config.url);
    info!("Bind address: {}", config.bind_address);
    info!("Flatten merged pages: {}", config.flatten_merged_pages);

    let bind_address = config.bind_address.clone();
    let datasource = MonascaDatasource::new(config)?;
    let catalog = datasource.catalog();
    let app_state = Arc::new(ServerState {
        datasource,
        catalog,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/query", post(run_query))
        .route("/search", get(search))
        .route("/metrics/names", get(metric_names))
        .route("/metrics/dimensions", get(metric_dimensions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Result<Json<DatasourceStatus>, ApiError> {
    state
        .datasource
        .test_datasource()
        .await
        .map(Json)
        .map_err(|e| api_error("Health check", e))
}

async fn run_query(
    State(state): State<AppState>,
    Json(options): Json<QueryOptions>,
) -> Json<QueryOutcome> {
    Json(state.datasource.query(&options).await)
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    state
        .datasource
        .metric_find_query(&params.key)
        .await
        .map(Json)
        .map_err(|e| api_error("Metric find", e))
}

async fn metric_names(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    state
        .catalog
        .names()
        .await
        .map(Json)
        .map_err(|e| api_error("Names query", e))
}

async fn metric_dimensions(
    State(state): State<AppState>,
    Query(params): Query<DimensionParams>,
) -> Result<Json<DimensionList>, ApiError> {
    state
        .catalog
        .dimensions(&params.name)
        .await
        .map(Json)
        .map_err(|e| api_error("Dimension query", e))
}
