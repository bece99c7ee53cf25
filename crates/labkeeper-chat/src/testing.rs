//! Test doubles shared by the unit tests in this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use labkeeper_core::error::{LabError, Result};
use labkeeper_core::traits::LabReader;
use labkeeper_core::types::*;
use labkeeper_storage::{ConversationRepository, Database, InventoryRepository};

/// Wraps a real SQLite reader, counting calls and failing on demand.
pub struct FlakyReader {
    inner: InventoryRepository,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FlakyReader {
    pub fn new(inner: InventoryRepository) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inventory(&self) -> &InventoryRepository {
        &self.inner
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(LabError::Storage("database is locked".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A fresh in-memory database behind both storage traits.
pub fn fixtures() -> (Arc<FlakyReader>, Arc<ConversationRepository>) {
    let db = Arc::new(Database::in_memory().expect("in-memory database"));
    let reader = FlakyReader::new(InventoryRepository::new(Arc::clone(&db)));
    (Arc::new(reader), Arc::new(ConversationRepository::new(db)))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

impl LabReader for FlakyReader {
    fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.enter()?;
        self.inner.user_by_id(id)
    }

    fn list_chemicals(&self) -> Result<Vec<Chemical>> {
        self.enter()?;
        self.inner.list_chemicals()
    }

    fn count_chemicals(&self) -> Result<u64> {
        self.enter()?;
        self.inner.count_chemicals()
    }

    fn chemical_by_exact_name(&self, name: &str) -> Result<Option<Chemical>> {
        self.enter()?;
        self.inner.chemical_by_exact_name(name)
    }

    fn chemical_by_name_ci(&self, name: &str) -> Result<Option<Chemical>> {
        self.enter()?;
        self.inner.chemical_by_name_ci(name)
    }

    fn search_chemicals_ranked(&self, query: &str, limit: usize) -> Result<Vec<Chemical>> {
        self.enter()?;
        self.inner.search_chemicals_ranked(query, limit)
    }

    fn search_chemicals_substring(&self, query: &str, limit: usize) -> Result<Vec<Chemical>> {
        self.enter()?;
        self.inner.search_chemicals_substring(query, limit)
    }

    fn low_stock_chemicals(&self, default_threshold: f64) -> Result<Vec<Chemical>> {
        self.enter()?;
        self.inner.low_stock_chemicals(default_threshold)
    }

    fn expiring_chemicals(&self, today: NaiveDate, within_days: i64) -> Result<Vec<Chemical>> {
        self.enter()?;
        self.inner.expiring_chemicals(today, within_days)
    }

    fn expired_chemicals(&self, today: NaiveDate) -> Result<Vec<Chemical>> {
        self.enter()?;
        self.inner.expired_chemicals(today)
    }

    fn list_equipment(&self) -> Result<Vec<Equipment>> {
        self.enter()?;
        self.inner.list_equipment()
    }

    fn count_equipment(&self) -> Result<u64> {
        self.enter()?;
        self.inner.count_equipment()
    }

    fn equipment_by_exact_name(&self, name: &str) -> Result<Option<Equipment>> {
        self.enter()?;
        self.inner.equipment_by_exact_name(name)
    }

    fn equipment_by_name_ci(&self, name: &str) -> Result<Option<Equipment>> {
        self.enter()?;
        self.inner.equipment_by_name_ci(name)
    }

    fn search_equipment_ranked(&self, query: &str, limit: usize) -> Result<Vec<Equipment>> {
        self.enter()?;
        self.inner.search_equipment_ranked(query, limit)
    }

    fn search_equipment_substring(&self, query: &str, limit: usize) -> Result<Vec<Equipment>> {
        self.enter()?;
        self.inner.search_equipment_substring(query, limit)
    }

    fn maintenance_due_equipment(&self, today: NaiveDate) -> Result<Vec<Equipment>> {
        self.enter()?;
        self.inner.maintenance_due_equipment(today)
    }

    fn calibration_due_equipment(&self, today: NaiveDate, within_days: i64) -> Result<Vec<Equipment>> {
        self.enter()?;
        self.inner.calibration_due_equipment(today, within_days)
    }

    fn equipment_conflicts(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Borrowing>> {
        self.enter()?;
        self.inner.equipment_conflicts(equipment_id, from, to)
    }

    fn recent_bookings(&self, equipment_id: i64, limit: usize) -> Result<Vec<Borrowing>> {
        self.enter()?;
        self.inner.recent_bookings(equipment_id, limit)
    }

    fn borrowings_by_borrower(&self, borrower_id: i64, limit: usize) -> Result<Vec<Borrowing>> {
        self.enter()?;
        self.inner.borrowings_by_borrower(borrower_id, limit)
    }

    fn pending_borrowings(&self, limit: usize) -> Result<Vec<Borrowing>> {
        self.enter()?;
        self.inner.pending_borrowings(limit)
    }

    fn count_pending_borrowings(&self, borrower_id: Option<i64>) -> Result<u64> {
        self.enter()?;
        self.inner.count_pending_borrowings(borrower_id)
    }

    fn schedules_on(&self, date: NaiveDate) -> Result<Vec<LectureSchedule>> {
        self.enter()?;
        self.inner.schedules_on(date)
    }

    fn upcoming_schedules(&self, from: NaiveDate, limit: usize) -> Result<Vec<LectureSchedule>> {
        self.enter()?;
        self.inner.upcoming_schedules(from, limit)
    }

    fn usage_history(&self, user_id: i64, limit: usize) -> Result<Vec<UsageRecord>> {
        self.enter()?;
        self.inner.usage_history(user_id, limit)
    }
}
