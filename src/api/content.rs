/// Content item endpoints (events, forum posts, resources)
use crate::{
    auth::Principal,
    content::{ContentItem, NewContent},
    context::AppContext,
    error::WorkflowResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/content", post(create_item))
        .route("/api/content/:id", get(get_item).delete(delete_item))
        .route("/api/content/:id/report", post(report_item))
}

async fn create_item(
    State(ctx): State<AppContext>,
    principal: Principal,
    Json(input): Json<NewContent>,
) -> WorkflowResult<(StatusCode, Json<ContentItem>)> {
    let item = ctx.orchestrator.create_item(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<ContentItem>> {
    let item = ctx.orchestrator.get_item(&principal, id).await?;
    Ok(Json(item))
}

async fn delete_item(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<StatusCode> {
    ctx.orchestrator.delete_item(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    report_count: u32,
}

async fn report_item(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<ReportResponse>> {
    let report_count = ctx.orchestrator.report_item(&principal, id).await?;
    Ok(Json(ReportResponse { report_count }))
}
