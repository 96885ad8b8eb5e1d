/// Health check endpoints for liveness and readiness probes
///
/// Supports two types of probes:
/// - Liveness: Is the process alive? (restart if not)
/// - Readiness: Can the service reach its store? (stop routing traffic if not)

use crate::{context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,

    pub version: String,

    pub checks: Vec<ComponentHealth>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    /// Status: "healthy", "degraded", or "unhealthy"
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health/detailed", get(health_detailed))
}

pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe. If we can respond, we're alive.
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 200 when the database answers, 503 otherwise
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = db::test_connection(&ctx.db).await {
        tracing::warn!(error = %e, "readiness probe failed: database check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Detailed health check with all component statuses
pub async fn health_detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let start = Instant::now();
    let checks = vec![check_database_detailed(&ctx).await];
    let overall_status = determine_overall_status(&checks);

    let health = HealthStatus {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
        message: if overall_status == "healthy" {
            None
        } else {
            Some("One or more components are unhealthy".to_string())
        },
    };

    let status_code = match overall_status.as_str() {
        "healthy" | "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    tracing::debug!(
        status = %overall_status,
        duration_ms = start.elapsed().as_millis() as u64,
        "health check completed"
    );

    (status_code, Json(health))
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match db::test_connection(&ctx.db).await {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
            details: Some(serde_json::json!({
                "type": "sqlite",
                "pool_size": ctx.db.size(),
                "idle": ctx.db.num_idle(),
            })),
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: Some(e.to_string()),
            details: None,
        },
    }
}

/// Determine overall health status from individual checks
fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    let unhealthy_count = checks.iter().filter(|c| c.status == "unhealthy").count();
    let degraded_count = checks.iter().filter(|c| c.status == "degraded").count();

    if unhealthy_count > 0 {
        "unhealthy".to_string()
    } else if degraded_count > 0 {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, status: &str) -> ComponentHealth {
        ComponentHealth {
            name: name.to_string(),
            status: status.to_string(),
            response_time_ms: Some(5),
            error: None,
            details: None,
        }
    }

    #[test]
    fn test_determine_overall_status() {
        assert_eq!(determine_overall_status(&[check("database", "healthy")]), "healthy");
        assert_eq!(
            determine_overall_status(&[check("database", "healthy"), check("queue", "degraded")]),
            "degraded"
        );
        assert_eq!(
            determine_overall_status(&[check("database", "unhealthy"), check("queue", "degraded")]),
            "unhealthy"
        );
    }

    #[test]
    fn test_health_status_serialization() {
        let health = HealthStatus {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            checks: vec![check("database", "healthy")],
            message: None,
        };

        let json = serde_json::to_string(&health).unwrap();
        assert!(json.contains("database"));
        assert!(!json.contains("message"));
    }
}
