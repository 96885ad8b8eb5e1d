/// Event lifecycle and participation endpoints
use crate::{
    auth::Principal,
    content::{ContentItem, EventPhase, EventUpdate},
    context::AppContext,
    error::WorkflowResult,
    workflow::Participant,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/events/:id", patch(update_event))
        .route("/api/events/:id/phase", put(set_phase))
        .route("/api/events/:id/join", post(join_event))
        .route("/api/events/:id/leave", post(leave_event))
        .route("/api/events/:id/participants", get(participants))
}

async fn update_event(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(update): Json<EventUpdate>,
) -> WorkflowResult<Json<ContentItem>> {
    let item = ctx.orchestrator.update_event(&principal, id, update).await?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
struct PhaseRequest {
    phase: EventPhase,
}

async fn set_phase(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<PhaseRequest>,
) -> WorkflowResult<Json<ContentItem>> {
    let item = ctx
        .orchestrator
        .set_event_phase(&principal, id, req.phase)
        .await?;
    Ok(Json(item))
}

async fn join_event(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<(StatusCode, Json<Participant>)> {
    let participant = ctx.orchestrator.join_event(&principal, id).await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

async fn leave_event(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<StatusCode> {
    ctx.orchestrator.leave_event(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn participants(
    State(ctx): State<AppContext>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<Vec<Participant>>> {
    let participants = ctx.orchestrator.participants(id).await?;
    Ok(Json(participants))
}
