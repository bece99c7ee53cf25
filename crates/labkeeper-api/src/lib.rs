//! Labkeeper API crate - axum HTTP server, route handlers, SSE notifications.
//!
//! Exposes the chat engine, inventory writes (usage logging, borrowing
//! requests), lecture status updates with a live SSE stream, and a health
//! check.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use notify::{ConnectionRegistry, ScheduleEvent};
pub use routes::{create_router, start_server};
pub use state::AppState;
