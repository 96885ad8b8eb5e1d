/// Notification inbox endpoints. Every route acts on the caller's own inbox.
use crate::{
    auth::Principal,
    context::AppContext,
    error::WorkflowResult,
    notify::{InboxPage, InboxQuery, Notification},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/notifications", get(list).delete(clear))
        .route("/api/notifications/read-all", put(mark_all_read))
        .route("/api/notifications/:id/read", put(mark_read))
        .route("/api/notifications/:id", delete(delete_one))
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: u64,
}

async fn list(
    State(ctx): State<AppContext>,
    principal: Principal,
    Query(query): Query<InboxQuery>,
) -> WorkflowResult<Json<InboxPage>> {
    let page = ctx.orchestrator.list_notifications(&principal, query).await?;
    Ok(Json(page))
}

async fn mark_read(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<Notification>> {
    let notification = ctx.orchestrator.mark_read(&principal, id).await?;
    Ok(Json(notification))
}

async fn mark_all_read(
    State(ctx): State<AppContext>,
    principal: Principal,
) -> WorkflowResult<Json<CountResponse>> {
    let count = ctx.orchestrator.mark_all_read(&principal).await?;
    Ok(Json(CountResponse { count }))
}

async fn delete_one(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<StatusCode> {
    ctx.orchestrator.delete_notification(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear(
    State(ctx): State<AppContext>,
    principal: Principal,
) -> WorkflowResult<Json<CountResponse>> {
    let count = ctx.orchestrator.clear_notifications(&principal).await?;
    Ok(Json(CountResponse { count }))
}
