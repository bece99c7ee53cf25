//! Labkeeper core crate - configuration, errors, domain types and the
//! storage traits shared by the storage, chat, and API crates.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::LabConfig;
pub use error::{LabError, Result};
pub use traits::{ConversationStore, LabReader};
pub use types::*;
