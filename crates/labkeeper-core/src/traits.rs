//! Storage seams consumed by the chat engine.
//!
//! `labkeeper-storage` implements both traits on SQLite; tests substitute
//! in-memory or failing implementations.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    AuditEntry, Borrowing, Chemical, Conversation, Equipment, LectureSchedule, UsageRecord, User,
};

/// Read-only queries over the lab inventory.
pub trait LabReader: Send + Sync {
    fn user_by_id(&self, id: i64) -> Result<Option<User>>;

    fn list_chemicals(&self) -> Result<Vec<Chemical>>;
    fn count_chemicals(&self) -> Result<u64>;
    fn chemical_by_exact_name(&self, name: &str) -> Result<Option<Chemical>>;
    /// Case-insensitive match on the trimmed name.
    fn chemical_by_name_ci(&self, name: &str) -> Result<Option<Chemical>>;
    /// Relevance-ranked full-text search.
    fn search_chemicals_ranked(&self, query: &str, limit: usize) -> Result<Vec<Chemical>>;
    /// Plain substring/prefix search, used when ranked search fails.
    fn search_chemicals_substring(&self, query: &str, limit: usize) -> Result<Vec<Chemical>>;
    fn low_stock_chemicals(&self, default_threshold: f64) -> Result<Vec<Chemical>>;
    /// Chemicals expiring in `today ..= today + within_days`.
    fn expiring_chemicals(&self, today: NaiveDate, within_days: i64) -> Result<Vec<Chemical>>;
    fn expired_chemicals(&self, today: NaiveDate) -> Result<Vec<Chemical>>;

    fn list_equipment(&self) -> Result<Vec<Equipment>>;
    fn count_equipment(&self) -> Result<u64>;
    fn equipment_by_exact_name(&self, name: &str) -> Result<Option<Equipment>>;
    fn equipment_by_name_ci(&self, name: &str) -> Result<Option<Equipment>>;
    fn search_equipment_ranked(&self, query: &str, limit: usize) -> Result<Vec<Equipment>>;
    fn search_equipment_substring(&self, query: &str, limit: usize) -> Result<Vec<Equipment>>;
    fn maintenance_due_equipment(&self, today: NaiveDate) -> Result<Vec<Equipment>>;
    fn calibration_due_equipment(&self, today: NaiveDate, within_days: i64)
        -> Result<Vec<Equipment>>;
    /// Pending or approved bookings of an item overlapping `from ..= to`.
    fn equipment_conflicts(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Borrowing>>;
    fn recent_bookings(&self, equipment_id: i64, limit: usize) -> Result<Vec<Borrowing>>;

    fn borrowings_by_borrower(&self, borrower_id: i64, limit: usize) -> Result<Vec<Borrowing>>;
    fn pending_borrowings(&self, limit: usize) -> Result<Vec<Borrowing>>;
    /// Pending requests, optionally restricted to one borrower.
    fn count_pending_borrowings(&self, borrower_id: Option<i64>) -> Result<u64>;

    fn schedules_on(&self, date: NaiveDate) -> Result<Vec<LectureSchedule>>;
    fn upcoming_schedules(&self, from: NaiveDate, limit: usize) -> Result<Vec<LectureSchedule>>;

    fn usage_history(&self, user_id: i64, limit: usize) -> Result<Vec<UsageRecord>>;
}

/// Persistence of conversations, their context bags, and the chat audit log.
pub trait ConversationStore: Send + Sync {
    /// Return the user's active bot conversation, creating it if absent.
    fn get_or_create_conversation(&self, user_id: i64) -> Result<Conversation>;
    fn touch_conversation(&self, conversation_id: Uuid) -> Result<()>;
    fn active_conversation(&self, user_id: i64) -> Result<Option<Conversation>>;

    fn get_context(&self, conversation_id: Uuid) -> Result<HashMap<String, String>>;
    /// Insert or overwrite one key.
    fn set_context(&self, conversation_id: Uuid, key: &str, value: &str) -> Result<()>;
    /// Delete one key, or the whole bag when `key` is `None`.
    fn clear_context(&self, conversation_id: Uuid, key: Option<&str>) -> Result<()>;

    fn append_audit(&self, entry: &AuditEntry) -> Result<()>;
    fn recent_audit(&self, user_id: i64, limit: usize) -> Result<Vec<AuditEntry>>;
}
