/// HTTP server setup and routing
use crate::{
    api::middleware::track_requests,
    context::AppContext,
    error::{WorkflowError, WorkflowResult},
    metrics,
};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(crate::auth::PRINCIPAL_HEADER),
        ]);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(crate::api::routes())
        .with_state(ctx)
        .layer(middleware::from_fn(track_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Prometheus scrape endpoint
async fn metrics_handler() -> Response {
    match metrics::render_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> WorkflowResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("CampusConnect workflow service listening on {}", addr);
    info!("   Database: {}", ctx.config.storage.database.display());

    metrics::init();
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WorkflowError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| WorkflowError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
