/// Admin API endpoints
/// Approval, visibility moderation, review queues and broadcasts
use crate::{
    auth::Principal,
    content::{ContentItem, ContentKind},
    context::AppContext,
    error::WorkflowResult,
    notify::{FanoutReport, NotificationStats},
    workflow::{Broadcast, ModerationSettings, QueuePage},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        // Approval
        .route("/api/admin/items/:id/approve", post(approve_item))
        .route("/api/admin/items/:id/reject", post(reject_item))
        // Visibility moderation
        .route("/api/admin/moderate/:kind/:id", post(moderate))
        // Queues
        .route("/api/admin/pending", get(pending_queue))
        .route("/api/admin/moderation-queue", get(moderation_queue))
        // Notifications
        .route("/api/admin/broadcast", post(broadcast))
        .route("/api/admin/notifications/stats", get(notification_stats))
        .route("/api/admin/settings", get(settings))
}

async fn approve_item(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<ContentItem>> {
    let item = ctx.orchestrator.approve_item(&principal, id).await?;
    Ok(Json(item))
}

#[derive(Debug, Default, Deserialize)]
struct RejectRequest {
    reason: Option<String>,
}

async fn reject_item(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectRequest>>,
) -> WorkflowResult<StatusCode> {
    let Json(req) = body.unwrap_or_default();
    ctx.orchestrator.reject_item(&principal, id, req.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ModerateRequest {
    action: String,
    reason: Option<String>,
}

async fn moderate(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(req): Json<ModerateRequest>,
) -> WorkflowResult<Json<ContentItem>> {
    let item = ctx
        .orchestrator
        .moderate(&principal, &kind, id, &req.action, req.reason)
        .await?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
struct PendingQuery {
    kind: Option<String>,
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

async fn pending_queue(
    State(ctx): State<AppContext>,
    principal: Principal,
    Query(query): Query<PendingQuery>,
) -> WorkflowResult<Json<Vec<ContentItem>>> {
    let kind = query.kind.as_deref().map(ContentKind::from_str).transpose()?;
    let page = QueuePage {
        limit: query.limit,
        offset: query.offset,
    };
    let items = ctx.orchestrator.pending_queue(&principal, kind, page).await?;
    Ok(Json(items))
}

async fn moderation_queue(
    State(ctx): State<AppContext>,
    principal: Principal,
    Query(page): Query<QueuePage>,
) -> WorkflowResult<Json<Vec<ContentItem>>> {
    let items = ctx.orchestrator.moderation_queue(&principal, page).await?;
    Ok(Json(items))
}

async fn broadcast(
    State(ctx): State<AppContext>,
    principal: Principal,
    Json(input): Json<Broadcast>,
) -> WorkflowResult<Json<FanoutReport>> {
    let report = ctx.orchestrator.broadcast(&principal, input).await?;
    Ok(Json(report))
}

async fn notification_stats(
    State(ctx): State<AppContext>,
    principal: Principal,
) -> WorkflowResult<Json<NotificationStats>> {
    let stats = ctx.orchestrator.notification_stats(&principal).await?;
    Ok(Json(stats))
}

async fn settings(
    State(ctx): State<AppContext>,
    principal: Principal,
) -> WorkflowResult<Json<ModerationSettings>> {
    Ok(Json(ctx.orchestrator.settings(&principal)?))
}
