//! CampusConnect - scoped content-lifecycle workflow
//!
//! Content items (events, forum posts, resources, user accounts) move
//! through approval and visibility moderation under department-scoped
//! administrators, with capacity-bounded event participation and
//! notification fan-out on every transition.

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod store;
pub mod workflow;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{WorkflowError, WorkflowResult};
pub use workflow::WorkflowOrchestrator;
