/// Forum reply and like endpoints
use crate::{
    auth::Principal,
    content::{ForumReply, LikeStatus, NewReply},
    context::AppContext,
    error::WorkflowResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/forum/:id/replies", post(reply).get(replies))
        .route("/api/forum/:id/like", post(toggle_like))
}

async fn reply(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(input): Json<NewReply>,
) -> WorkflowResult<(StatusCode, Json<ForumReply>)> {
    let reply = ctx.orchestrator.reply_to_post(&principal, id, input).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn replies(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<Vec<ForumReply>>> {
    let replies = ctx.orchestrator.replies(&principal, id).await?;
    Ok(Json(replies))
}

async fn toggle_like(
    State(ctx): State<AppContext>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> WorkflowResult<Json<LikeStatus>> {
    let status = ctx.orchestrator.toggle_like(&principal, id).await?;
    Ok(Json(status))
}
