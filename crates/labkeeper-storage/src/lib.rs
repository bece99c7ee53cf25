//! Labkeeper storage crate - SQLite persistence for the lab inventory and
//! the chat engine.
//!
//! Provides a WAL-mode SQLite database with migrations, the inventory and
//! conversation repositories behind the core storage traits, FTS5 name
//! search, transactional stock writes, and demo seeding.

pub mod conversations;
pub mod db;
pub mod inventory;
pub mod migrations;
pub mod search;
pub mod seed;
mod transactions;

pub use conversations::ConversationRepository;
pub use db::Database;
pub use inventory::InventoryRepository;
pub use search::{sanitize_fts5_query, FtsSearch};
pub use seed::{seed_demo, SeedSummary};
