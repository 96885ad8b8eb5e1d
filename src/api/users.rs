/// User registration and profile endpoints
use crate::{
    auth::{NewUser, Principal, UserRecord},
    content::ContentItem,
    context::AppContext,
    error::WorkflowResult,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users", post(register))
        .route("/api/users/me", get(me))
        .route("/api/users/me/events", get(my_events))
}

/// Register a user. The gateway calls this once per new account.
async fn register(
    State(ctx): State<AppContext>,
    Json(input): Json<NewUser>,
) -> WorkflowResult<(StatusCode, Json<UserRecord>)> {
    let user = ctx.orchestrator.register_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user_id: uuid::Uuid,
    role: &'static str,
    department: Option<String>,
}

async fn me(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: principal.user_id,
        role: principal.role.as_str(),
        department: principal.department,
    })
}

async fn my_events(
    State(ctx): State<AppContext>,
    principal: Principal,
) -> WorkflowResult<Json<Vec<ContentItem>>> {
    let events = ctx.orchestrator.joined_events(principal.user_id).await?;
    Ok(Json(events))
}
