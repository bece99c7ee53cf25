//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors, runs
//! the blocking SQLite work on the blocking pool, and returns JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use labkeeper_chat::validation::{coerce_user_id, validate_date, validate_quantity};
use labkeeper_chat::{ChatContext, ChatReply, ChatRequest};
use labkeeper_core::traits::LabReader;
use labkeeper_core::types::{AuditEntry, Borrowing, LectureSchedule, NewBorrowing, ScheduleStatus, UsageRecord, User};

use crate::error::ApiError;
use crate::notify::ScheduleEvent;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;
const MAX_PURPOSE_LENGTH: usize = 500;

// =============================================================================
// Query parameter and body types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub user_id: Option<i64>,
    pub limit: Option<usize>,
}

/// Request body for POST /chemicals/{id}/usage.
#[derive(Debug, Deserialize)]
pub struct UsageRequest {
    #[serde(default)]
    pub user_id: Value,
    #[serde(default)]
    pub quantity_used: Value,
    pub purpose: Option<String>,
}

/// Request body for POST /borrowings.
#[derive(Debug, Deserialize)]
pub struct BorrowingRequest {
    #[serde(default)]
    pub borrower_id: Value,
    pub equipment_id: Option<i64>,
    pub chemical_id: Option<i64>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub purpose: String,
    pub start_date: String,
    pub end_date: String,
}

/// Request body for PUT /schedules/{id}/status.
#[derive(Debug, Deserialize)]
pub struct ScheduleStatusRequest {
    pub status: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub chemicals: u64,
    pub equipment: u64,
    pub stream_clients: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextResponse {
    pub user_id: i64,
    pub context: ChatContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: i64,
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleStatusResponse {
    pub schedule: LectureSchedule,
    /// Stream clients that were notified of the change.
    pub notified: usize,
}

// =============================================================================
// Helpers
// =============================================================================

/// Run blocking database work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
}

fn require_user_id(user_id: Option<i64>) -> Result<i64, ApiError> {
    match user_id {
        Some(id) if id > 0 => Ok(id),
        Some(_) => Err(ApiError::BadRequest("'user_id' must be a positive integer".to_string())),
        None => Err(ApiError::BadRequest("'user_id' is required".to_string())),
    }
}

fn existing_user(state: &AppState, id: i64) -> Result<User, ApiError> {
    state
        .inventory
        .user_by_id(id)?
        .ok_or_else(|| ApiError::NotFound(format!("user not found: {}", id)))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - health check with inventory counts.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let clients = state.schedule_clients.len();
    blocking(move || {
        Ok(Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            chemicals: state.inventory.count_chemicals().unwrap_or(0),
            equipment: state.inventory.count_equipment().unwrap_or(0),
            stream_clients: clients,
        }))
    })
    .await
}

/// POST /chat - answer one chat message.
///
/// Always 200: failures come back as a formatted reply with `error` set.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    blocking(move || Ok(Json(state.chat.process_message(&body)))).await
}

/// GET /chat/context - what the bot remembers about the caller's conversation.
pub async fn get_context(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Result<Json<ContextResponse>, ApiError> {
    let user_id = require_user_id(params.user_id)?;
    blocking(move || {
        existing_user(&state, user_id)?;
        let context = state.chat.context(user_id)?;
        Ok(Json(ContextResponse { user_id, context }))
    })
    .await
}

/// DELETE /chat/context - forget the caller's conversation context.
pub async fn clear_context(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user_id(params.user_id)?;
    blocking(move || {
        existing_user(&state, user_id)?;
        state.chat.clear_context(user_id)?;
        tracing::info!(user_id, "Cleared chat context");
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// GET /chat/history - the caller's recent messages and replies.
pub async fn chat_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = require_user_id(params.user_id)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    blocking(move || {
        existing_user(&state, user_id)?;
        let entries = state.chat.history(user_id, limit)?;
        Ok(Json(HistoryResponse { user_id, entries }))
    })
    .await
}

/// POST /chemicals/{id}/usage - record usage and decrement stock.
pub async fn log_usage(
    State(state): State<AppState>,
    Path(chemical_id): Path<i64>,
    Json(body): Json<UsageRequest>,
) -> Result<(StatusCode, Json<UsageRecord>), ApiError> {
    let user_id = coerce_user_id(&body.user_id)?;
    let quantity = validate_quantity(&body.quantity_used)?;
    if quantity == 0.0 {
        return Err(ApiError::BadRequest(
            "Invalid quantity_used: must be greater than zero".to_string(),
        ));
    }
    let purpose = body.purpose.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    if purpose.as_ref().is_some_and(|p| p.chars().count() > MAX_PURPOSE_LENGTH) {
        return Err(ApiError::BadRequest(format!(
            "'purpose' must be at most {} characters",
            MAX_PURPOSE_LENGTH
        )));
    }

    blocking(move || {
        existing_user(&state, user_id)?;
        let record = state
            .inventory
            .log_usage(chemical_id, user_id, quantity, purpose.as_deref())?;
        state.chat.invalidate_cache();
        Ok((StatusCode::CREATED, Json(record)))
    })
    .await
}

/// POST /borrowings - create a pending borrowing request.
pub async fn create_borrowing(
    State(state): State<AppState>,
    Json(body): Json<BorrowingRequest>,
) -> Result<(StatusCode, Json<Borrowing>), ApiError> {
    let borrower_id = coerce_user_id(&body.borrower_id)?;
    let today = today();
    let start_date = validate_date(&body.start_date, today)?;
    let end_date = validate_date(&body.end_date, today)?;
    let quantity = body.quantity.as_ref().map(validate_quantity).transpose()?;
    let purpose = body.purpose.trim().to_string();
    if purpose.is_empty() {
        return Err(ApiError::BadRequest("'purpose' must not be empty".to_string()));
    }
    if purpose.chars().count() > MAX_PURPOSE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "'purpose' must be at most {} characters",
            MAX_PURPOSE_LENGTH
        )));
    }

    let request = NewBorrowing {
        borrower_id,
        equipment_id: body.equipment_id,
        chemical_id: body.chemical_id,
        quantity,
        purpose,
        start_date,
        end_date,
    };
    blocking(move || {
        let borrowing = state.inventory.create_borrowing(&request)?;
        state.chat.invalidate_cache();
        Ok((StatusCode::CREATED, Json(borrowing)))
    })
    .await
}

/// PUT /schedules/{id}/status - change a lecture's status and notify stream clients.
pub async fn update_schedule_status(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
    Json(body): Json<ScheduleStatusRequest>,
) -> Result<Json<ScheduleStatusResponse>, ApiError> {
    let status: ScheduleStatus = body.status.trim().to_lowercase().parse().map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid status '{}': expected pending, approved, rejected, or completed",
            body.status
        ))
    })?;

    let registry = state.schedule_clients.clone();
    let schedule = blocking(move || Ok(state.inventory.update_schedule_status(schedule_id, status)?)).await?;
    let notified = registry.broadcast(&ScheduleEvent::status_changed(&schedule));
    tracing::info!(schedule_id, status = %status, notified, "Schedule status change broadcast");

    Ok(Json(ScheduleStatusResponse { schedule, notified }))
}

/// GET /schedules/stream - SSE stream of schedule status changes.
pub async fn schedule_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let mut registration = state
        .schedule_clients
        .register()
        .ok_or_else(|| ApiError::ServiceUnavailable("server is shutting down".to_string()))?;
    let events = registration
        .take_events()
        .ok_or_else(|| ApiError::Internal("stream registration has no receiver".to_string()))?;

    // The registration moves into the stream and deregisters when the
    // client goes away and axum drops the response body.
    let stream = UnboundedReceiverStream::new(events).map(move |event| {
        let _connection = &registration;
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event("schedule_status").data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
