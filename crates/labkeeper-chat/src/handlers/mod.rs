//! Intent handlers.
//!
//! Each handler reads through the [`LabData`] façade, may update the typed
//! [`ChatContext`], and returns a [`Reply`]. Handlers never write inventory
//! records. A read that fails shows up as `Fetched::Unavailable` and is
//! worded as "couldn't check", never as "nothing found".

mod activity;
mod booking;
mod follow_up;
mod guidance;
mod inventory;

use chrono::NaiveDate;

use labkeeper_core::types::{Chemical, Equipment, LectureSchedule, Role, User};

use crate::context::ChatContext;
use crate::error::ChatError;
use crate::facade::LabData;
use crate::router::Intent;

/// Everything a handler needs to answer one message.
pub struct Turn<'a> {
    /// Lower-cased, sanitized message text.
    pub message: &'a str,
    pub user: &'a User,
    /// Role the caller claims for this message.
    pub role: Role,
    pub today: NaiveDate,
    pub data: &'a LabData,
    /// Days checked for booking conflicts when the message gives no date.
    pub booking_window_days: i64,
}

/// A handler's answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub suggestions: Vec<String>,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
        self.suggestions = suggestions.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Run the handler for `intent`.
pub fn dispatch(intent: Intent, turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    match intent {
        Intent::ChemicalDetails => inventory::chemical_details(turn, ctx),
        Intent::EquipmentDetails => inventory::equipment_details(turn, ctx),
        Intent::ChemicalAvailability => inventory::chemical_availability(turn, ctx),
        Intent::EquipmentAvailability => inventory::equipment_availability(turn, ctx),
        Intent::InventoryAlerts => inventory::alerts(turn, ctx),
        Intent::Maintenance => inventory::maintenance(turn, ctx),
        Intent::EquipmentBooking => booking::equipment_booking(turn, ctx),
        Intent::PurchaseRequest => guidance::purchase_request(turn, ctx),
        Intent::ProtocolSuggestion => guidance::protocol_suggestion(turn, ctx),
        Intent::SafetyCompatibility => guidance::safety_compatibility(turn, ctx),
        Intent::BorrowingCreate => booking::borrowing_create(turn, ctx),
        Intent::BorrowingStatus => booking::borrowing_status(turn, ctx),
        Intent::Schedule => activity::schedule(turn, ctx),
        Intent::SafetyInfo => guidance::safety_info(turn, ctx),
        Intent::History => activity::history(turn, ctx),
        Intent::Help => activity::help(turn, ctx),
        Intent::FollowUp => follow_up::follow_up(turn, ctx),
        Intent::Summary => activity::summary(turn, ctx),
    }
}

// =============================================================================
// Shared wording
// =============================================================================

fn unavailable(what: &str) -> Reply {
    Reply::new(format!(
        "I couldn't check {} just now. Please try again in a moment.",
        what
    ))
}

/// Multi-line description of a chemical.
fn describe_chemical(chemical: &Chemical, default_threshold: f64) -> String {
    let mut lines = vec![
        format!("{} ({})", chemical.name, chemical.category),
        format!("- Quantity: {}", chemical.quantity_label()),
    ];
    if let Some(ref location) = chemical.storage_location {
        lines.push(format!("- Storage location: {}", location));
    }
    if let Some(expiry) = chemical.expiration_date {
        lines.push(format!("- Expires: {}", expiry));
    }
    if let Some(ref hazard) = chemical.hazard_class {
        lines.push(format!("- Hazard class: {}", hazard));
    }
    if chemical.is_low_stock(default_threshold) {
        lines.push("- Stock is low; consider restocking soon.".to_string());
    }
    lines.join("\n")
}

/// Multi-line description of an equipment item.
fn describe_equipment(item: &Equipment) -> String {
    let mut lines = vec![
        format!("{} ({})", item.name, item.category),
        format!("- Status: {}", status_label(item)),
    ];
    if let Some(ref location) = item.location {
        lines.push(format!("- Location: {}", location));
    }
    if let Some(ref serial) = item.serial_number {
        lines.push(format!("- Serial number: {}", serial));
    }
    if let Some(last) = item.last_maintenance {
        lines.push(format!("- Last maintenance: {}", last));
    }
    if let Some(next) = item.next_maintenance() {
        lines.push(format!("- Next maintenance due: {}", next));
    }
    if let Some(calibration) = item.calibration_due {
        lines.push(format!("- Calibration due: {}", calibration));
    }
    lines.join("\n")
}

fn status_label(item: &Equipment) -> String {
    item.status.to_string().replace('_', " ")
}

fn describe_lecture(lecture: &LectureSchedule) -> String {
    format!(
        "- {} {}-{}: {} in {} ({})",
        lecture.lecture_date,
        lecture.start_time.format("%H:%M"),
        lecture.end_time.format("%H:%M"),
        lecture.title,
        lecture.room,
        lecture.status
    )
}

/// One rendered line per item, cut off after `limit` items.
fn bulleted<T>(items: &[T], limit: usize, render: impl Fn(&T) -> String) -> String {
    let mut lines: Vec<String> = items.iter().take(limit).map(render).collect();
    if items.len() > limit {
        lines.push(format!("...and {} more", items.len() - limit));
    }
    lines.join("\n")
}

fn plural(n: u64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}
