//! Conversational interface for the lab inventory.
//!
//! Validates inbound messages, routes them through an ordered intent table,
//! answers from cached, failure-tolerant inventory reads, and keeps a typed
//! per-conversation context so short follow-ups resolve against earlier turns.

pub mod cache;
pub mod context;
pub mod error;
pub mod extract;
pub mod facade;
pub mod handlers;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod testing;

pub use cache::{cache_key, QueryCache};
pub use context::{ChatContext, PendingAction, Topic};
pub use error::{format_error, ChatError, ValidationError};
pub use facade::{Fetched, LabData};
pub use handlers::Reply;
pub use router::{route, Intent, ROUTES};
pub use service::{ChatReply, ChatRequest, ChatService};
