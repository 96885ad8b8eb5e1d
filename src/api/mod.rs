/// API routes and handlers
///
/// Handlers are thin: extract the principal and input, call the
/// orchestrator, serialize the result.
pub mod admin;
pub mod content;
pub mod events;
pub mod forum;
pub mod health;
pub mod middleware;
pub mod notifications;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(users::routes())
        .merge(content::routes())
        .merge(events::routes())
        .merge(forum::routes())
        .merge(admin::routes())
        .merge(notifications::routes())
}
