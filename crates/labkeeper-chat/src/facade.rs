//! Fault-tolerant read access to the lab inventory.
//!
//! Every read returns a [`Fetched`] value: either the loaded result or
//! `Unavailable` when storage failed. Failures are logged here and never
//! propagated, so handlers can tell "nothing matched" apart from "could
//! not check". Listings and searches go through the query caches.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use labkeeper_core::config::{ChatConfig, InventoryConfig};
use labkeeper_core::error::LabError;
use labkeeper_core::traits::LabReader;
use labkeeper_core::types::{Borrowing, Chemical, Equipment, LectureSchedule, UsageRecord};

use crate::cache::{cache_key, QueryCache};

/// Outcome of a read that may have failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Loaded(T),
    Unavailable,
}

impl<T> Fetched<T> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Fetched::Unavailable)
    }

    pub fn loaded(self) -> Option<T> {
        match self {
            Fetched::Loaded(v) => Some(v),
            Fetched::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Loaded(v) => Fetched::Loaded(f(v)),
            Fetched::Unavailable => Fetched::Unavailable,
        }
    }

    /// Loaded value, or `default` when the read failed.
    pub fn unwrap_or(self, default: T) -> T {
        self.loaded().unwrap_or(default)
    }
}

fn fetch<T>(operation: &str, result: Result<T, LabError>) -> Fetched<T> {
    match result {
        Ok(value) => Fetched::Loaded(value),
        Err(e) => {
            warn!(operation, error = %e, "Inventory read failed");
            Fetched::Unavailable
        }
    }
}

/// Cached, failure-tolerant reads over a [`LabReader`].
pub struct LabData {
    reader: Arc<dyn LabReader>,
    chemical_listings: QueryCache<Vec<Chemical>>,
    equipment_listings: QueryCache<Vec<Equipment>>,
    chemical_searches: QueryCache<Vec<Chemical>>,
    equipment_searches: QueryCache<Vec<Equipment>>,
    search_limit: usize,
    low_stock_threshold: f64,
    expiry_warning_days: i64,
    calibration_warning_days: i64,
}

impl LabData {
    pub fn new(reader: Arc<dyn LabReader>, chat: &ChatConfig, inventory: &InventoryConfig) -> Self {
        let listing_ttl = Duration::from_secs(chat.listing_cache_ttl_secs);
        let search_ttl = Duration::from_secs(chat.search_cache_ttl_secs);
        Self {
            reader,
            chemical_listings: QueryCache::new(chat.listing_cache_capacity, listing_ttl),
            equipment_listings: QueryCache::new(chat.listing_cache_capacity, listing_ttl),
            chemical_searches: QueryCache::new(chat.search_cache_capacity, search_ttl),
            equipment_searches: QueryCache::new(chat.search_cache_capacity, search_ttl),
            search_limit: chat.search_limit,
            low_stock_threshold: inventory.default_low_stock_threshold,
            expiry_warning_days: inventory.expiry_warning_days,
            calibration_warning_days: inventory.calibration_warning_days,
        }
    }

    /// The underlying reader, for validation lookups that must not be
    /// softened into `Unavailable`.
    pub fn reader(&self) -> &dyn LabReader {
        self.reader.as_ref()
    }

    pub fn low_stock_threshold(&self) -> f64 {
        self.low_stock_threshold
    }

    /// Drop every cached listing and search result.
    pub fn invalidate(&self) {
        self.chemical_listings.clear();
        self.equipment_listings.clear();
        self.chemical_searches.clear();
        self.equipment_searches.clear();
    }

    // -------------------------------------------------------------------------
    // Chemicals
    // -------------------------------------------------------------------------

    pub fn chemicals(&self) -> Fetched<Vec<Chemical>> {
        let key = cache_key("chemicals:list", &());
        if let Some(hit) = self.chemical_listings.get(&key) {
            debug!(key = %key, "Cache hit");
            return Fetched::Loaded(hit);
        }
        let fetched = fetch("list_chemicals", self.reader.list_chemicals());
        if let Fetched::Loaded(ref list) = fetched {
            self.chemical_listings.set(&key, list.clone());
        }
        fetched
    }

    pub fn count_chemicals(&self) -> Fetched<u64> {
        fetch("count_chemicals", self.reader.count_chemicals())
    }

    /// Two-tier search: ranked full-text first, substring match when the
    /// ranked tier fails or finds nothing.
    pub fn search_chemicals(&self, query: &str) -> Fetched<Vec<Chemical>> {
        let query = query.trim().to_lowercase();
        let key = cache_key("search:chemicals", &(&query, self.search_limit));
        if let Some(hit) = self.chemical_searches.get(&key) {
            debug!(key = %key, "Cache hit");
            return Fetched::Loaded(hit);
        }
        let fetched = two_tier(
            "chemicals",
            || self.reader.search_chemicals_ranked(&query, self.search_limit),
            || self.reader.search_chemicals_substring(&query, self.search_limit),
        );
        if let Fetched::Loaded(ref hits) = fetched {
            self.chemical_searches.set(&key, hits.clone());
        }
        fetched
    }

    /// Resolve a chemical from loosely typed text: exact name, then
    /// case and punctuation variants, then the best search hit.
    pub fn find_chemical(&self, name: &str) -> Fetched<Option<Chemical>> {
        resolve_by_name(
            name,
            |n| self.reader.chemical_by_exact_name(n),
            |n| self.reader.chemical_by_name_ci(n),
            |n| self.search_chemicals(n),
        )
    }

    pub fn low_stock_chemicals(&self) -> Fetched<Vec<Chemical>> {
        fetch(
            "low_stock_chemicals",
            self.reader.low_stock_chemicals(self.low_stock_threshold),
        )
    }

    pub fn expiring_chemicals(&self, today: NaiveDate) -> Fetched<Vec<Chemical>> {
        fetch(
            "expiring_chemicals",
            self.reader.expiring_chemicals(today, self.expiry_warning_days),
        )
    }

    pub fn expired_chemicals(&self, today: NaiveDate) -> Fetched<Vec<Chemical>> {
        fetch("expired_chemicals", self.reader.expired_chemicals(today))
    }

    // -------------------------------------------------------------------------
    // Equipment
    // -------------------------------------------------------------------------

    pub fn equipment(&self) -> Fetched<Vec<Equipment>> {
        let key = cache_key("equipment:list", &());
        if let Some(hit) = self.equipment_listings.get(&key) {
            debug!(key = %key, "Cache hit");
            return Fetched::Loaded(hit);
        }
        let fetched = fetch("list_equipment", self.reader.list_equipment());
        if let Fetched::Loaded(ref list) = fetched {
            self.equipment_listings.set(&key, list.clone());
        }
        fetched
    }

    pub fn count_equipment(&self) -> Fetched<u64> {
        fetch("count_equipment", self.reader.count_equipment())
    }

    pub fn search_equipment(&self, query: &str) -> Fetched<Vec<Equipment>> {
        let query = query.trim().to_lowercase();
        let key = cache_key("search:equipment", &(&query, self.search_limit));
        if let Some(hit) = self.equipment_searches.get(&key) {
            debug!(key = %key, "Cache hit");
            return Fetched::Loaded(hit);
        }
        let fetched = two_tier(
            "equipment",
            || self.reader.search_equipment_ranked(&query, self.search_limit),
            || self.reader.search_equipment_substring(&query, self.search_limit),
        );
        if let Fetched::Loaded(ref hits) = fetched {
            self.equipment_searches.set(&key, hits.clone());
        }
        fetched
    }

    pub fn find_equipment(&self, name: &str) -> Fetched<Option<Equipment>> {
        resolve_by_name(
            name,
            |n| self.reader.equipment_by_exact_name(n),
            |n| self.reader.equipment_by_name_ci(n),
            |n| self.search_equipment(n),
        )
    }

    pub fn maintenance_due(&self, today: NaiveDate) -> Fetched<Vec<Equipment>> {
        fetch(
            "maintenance_due_equipment",
            self.reader.maintenance_due_equipment(today),
        )
    }

    pub fn calibration_due(&self, today: NaiveDate) -> Fetched<Vec<Equipment>> {
        fetch(
            "calibration_due_equipment",
            self.reader
                .calibration_due_equipment(today, self.calibration_warning_days),
        )
    }

    /// Bookings holding an item anywhere in `from ..= to`.
    pub fn equipment_conflicts(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Fetched<Vec<Borrowing>> {
        fetch(
            "equipment_conflicts",
            self.reader.equipment_conflicts(equipment_id, from, to),
        )
    }

    pub fn recent_bookings(&self, equipment_id: i64, limit: usize) -> Fetched<Vec<Borrowing>> {
        fetch(
            "recent_bookings",
            self.reader.recent_bookings(equipment_id, limit),
        )
    }

    // -------------------------------------------------------------------------
    // Borrowings, schedules, history
    // -------------------------------------------------------------------------

    pub fn borrowings_for(&self, borrower_id: i64, limit: usize) -> Fetched<Vec<Borrowing>> {
        fetch(
            "borrowings_by_borrower",
            self.reader.borrowings_by_borrower(borrower_id, limit),
        )
    }

    pub fn pending_borrowings(&self, limit: usize) -> Fetched<Vec<Borrowing>> {
        fetch("pending_borrowings", self.reader.pending_borrowings(limit))
    }

    pub fn count_pending(&self, borrower_id: Option<i64>) -> Fetched<u64> {
        fetch(
            "count_pending_borrowings",
            self.reader.count_pending_borrowings(borrower_id),
        )
    }

    pub fn schedules_on(&self, date: NaiveDate) -> Fetched<Vec<LectureSchedule>> {
        fetch("schedules_on", self.reader.schedules_on(date))
    }

    pub fn upcoming_schedules(&self, from: NaiveDate, limit: usize) -> Fetched<Vec<LectureSchedule>> {
        fetch(
            "upcoming_schedules",
            self.reader.upcoming_schedules(from, limit),
        )
    }

    pub fn usage_history(&self, user_id: i64, limit: usize) -> Fetched<Vec<UsageRecord>> {
        fetch("usage_history", self.reader.usage_history(user_id, limit))
    }
}

fn two_tier<T>(
    what: &str,
    ranked: impl FnOnce() -> Result<Vec<T>, LabError>,
    substring: impl FnOnce() -> Result<Vec<T>, LabError>,
) -> Fetched<Vec<T>> {
    match ranked() {
        Ok(hits) if !hits.is_empty() => return Fetched::Loaded(hits),
        Ok(_) => {}
        Err(e) => debug!(what, error = %e, "Ranked search failed, falling back to substring"),
    }
    match substring() {
        Ok(hits) => Fetched::Loaded(hits),
        Err(e) => {
            warn!(what, error = %e, "Substring search failed");
            Fetched::Unavailable
        }
    }
}

/// Spelling variants tried after the exact name: whitespace collapsed,
/// punctuation turned into spaces, and punctuation dropped altogether.
pub fn name_variants(name: &str) -> Vec<String> {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let spaced = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let squashed: String = name.chars().filter(|c| c.is_alphanumeric()).collect();

    let mut variants = Vec::new();
    for v in [collapsed, spaced, squashed] {
        if !v.is_empty() && !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants
}

fn resolve_by_name<T: Clone>(
    name: &str,
    exact: impl Fn(&str) -> Result<Option<T>, LabError>,
    case_insensitive: impl Fn(&str) -> Result<Option<T>, LabError>,
    search: impl Fn(&str) -> Fetched<Vec<T>>,
) -> Fetched<Option<T>> {
    let name = name.trim();
    if name.is_empty() {
        return Fetched::Loaded(None);
    }

    let mut failed = false;
    match exact(name) {
        Ok(Some(hit)) => return Fetched::Loaded(Some(hit)),
        Ok(None) => {}
        Err(e) => {
            warn!(name, error = %e, "Exact name lookup failed");
            failed = true;
        }
    }
    for variant in name_variants(name) {
        match case_insensitive(&variant) {
            Ok(Some(hit)) => return Fetched::Loaded(Some(hit)),
            Ok(None) => {}
            Err(e) => {
                warn!(name = %variant, error = %e, "Name variant lookup failed");
                failed = true;
            }
        }
    }
    match search(name) {
        Fetched::Loaded(hits) if !hits.is_empty() => Fetched::Loaded(hits.first().cloned()),
        Fetched::Loaded(_) if !failed => Fetched::Loaded(None),
        _ => Fetched::Unavailable,
    }
}
