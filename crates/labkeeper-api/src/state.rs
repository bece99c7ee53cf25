//! Application state shared across all route handlers.
//!
//! AppState holds the database, the inventory repository, the chat service,
//! and the schedule notification registry. It is passed to handlers via
//! axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use labkeeper_chat::ChatService;
use labkeeper_core::config::LabConfig;
use labkeeper_storage::{ConversationRepository, Database, InventoryRepository};

use crate::notify::ConnectionRegistry;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the lifetime of the server.
    pub config: Arc<LabConfig>,
    /// SQLite database shared by the repositories.
    pub database: Arc<Database>,
    /// Inventory reads and transactional writes.
    pub inventory: Arc<InventoryRepository>,
    /// Chat engine answering `/chat` messages.
    pub chat: Arc<ChatService>,
    /// Open `/schedules/stream` connections.
    pub schedule_clients: Arc<ConnectionRegistry>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: LabConfig, database: Database, api_token: String) -> Self {
        let database = Arc::new(database);
        let inventory = Arc::new(InventoryRepository::new(Arc::clone(&database)));
        let conversations = Arc::new(ConversationRepository::new(Arc::clone(&database)));
        let chat = ChatService::new(inventory.clone(), conversations, &config);
        Self {
            config: Arc::new(config),
            database,
            inventory,
            chat: Arc::new(chat),
            schedule_clients: Arc::new(ConnectionRegistry::new()),
            api_token,
            start_time: Instant::now(),
        }
    }
}
