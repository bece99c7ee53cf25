use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Role of a lab user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Technician,
    Borrower,
}

impl Role {
    /// Admins and technicians manage inventory; borrowers only request it.
    pub fn manages_inventory(&self) -> bool {
        matches!(self, Role::Admin | Role::Technician)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Technician => write!(f, "technician"),
            Role::Borrower => write!(f, "borrower"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "technician" => Ok(Role::Technician),
            "borrower" => Ok(Role::Borrower),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Kind of conversation a user holds with the lab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    /// Rule-based assistant.
    Bot,
    /// Live chat with lab staff.
    Live,
    /// Support ticket thread.
    Support,
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationType::Bot => write!(f, "bot"),
            ConversationType::Live => write!(f, "live"),
            ConversationType::Support => write!(f, "support"),
        }
    }
}

impl std::str::FromStr for ConversationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot" => Ok(ConversationType::Bot),
            "live" => Ok(ConversationType::Live),
            "support" => Ok(ConversationType::Support),
            _ => Err(format!("Unknown conversation type: {}", s)),
        }
    }
}

/// Lifecycle status of a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Closed,
    Archived,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Closed => write!(f, "closed"),
            ConversationStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConversationStatus::Active),
            "closed" => Ok(ConversationStatus::Closed),
            "archived" => Ok(ConversationStatus::Archived),
            _ => Err(format!("Unknown conversation status: {}", s)),
        }
    }
}

/// Operational status of an equipment item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    InUse,
    Maintenance,
    Retired,
}

impl EquipmentStatus {
    /// Whether the item can be booked at all, ignoring existing bookings.
    pub fn is_bookable(&self) -> bool {
        matches!(self, EquipmentStatus::Available | EquipmentStatus::InUse)
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquipmentStatus::Available => write!(f, "available"),
            EquipmentStatus::InUse => write!(f, "in_use"),
            EquipmentStatus::Maintenance => write!(f, "maintenance"),
            EquipmentStatus::Retired => write!(f, "retired"),
        }
    }
}

impl std::str::FromStr for EquipmentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(EquipmentStatus::Available),
            "in_use" => Ok(EquipmentStatus::InUse),
            "maintenance" => Ok(EquipmentStatus::Maintenance),
            "retired" => Ok(EquipmentStatus::Retired),
            _ => Err(format!("Unknown equipment status: {}", s)),
        }
    }
}

/// Status of a borrowing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowingStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
    Overdue,
}

impl BorrowingStatus {
    /// Pending and approved requests hold their item for the booked window.
    pub fn holds_item(&self) -> bool {
        matches!(self, BorrowingStatus::Pending | BorrowingStatus::Approved)
    }
}

impl fmt::Display for BorrowingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BorrowingStatus::Pending => write!(f, "pending"),
            BorrowingStatus::Approved => write!(f, "approved"),
            BorrowingStatus::Rejected => write!(f, "rejected"),
            BorrowingStatus::Returned => write!(f, "returned"),
            BorrowingStatus::Overdue => write!(f, "overdue"),
        }
    }
}

impl std::str::FromStr for BorrowingStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BorrowingStatus::Pending),
            "approved" => Ok(BorrowingStatus::Approved),
            "rejected" => Ok(BorrowingStatus::Rejected),
            "returned" => Ok(BorrowingStatus::Returned),
            "overdue" => Ok(BorrowingStatus::Overdue),
            _ => Err(format!("Unknown borrowing status: {}", s)),
        }
    }
}

/// Status of a lecture schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Pending => write!(f, "pending"),
            ScheduleStatus::Approved => write!(f, "approved"),
            ScheduleStatus::Rejected => write!(f, "rejected"),
            ScheduleStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "approved" => Ok(ScheduleStatus::Approved),
            "rejected" => Ok(ScheduleStatus::Rejected),
            "completed" => Ok(ScheduleStatus::Completed),
            _ => Err(format!("Unknown schedule status: {}", s)),
        }
    }
}

// =============================================================================
// Inventory records
// =============================================================================

/// A lab user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A chemical held in the lab inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chemical {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    pub storage_location: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub safety_info: Option<String>,
    pub hazard_class: Option<String>,
    pub low_stock_threshold: Option<f64>,
}

impl Chemical {
    /// Quantity rendered with its unit, e.g. `100 g`.
    pub fn quantity_label(&self) -> String {
        format_quantity(self.quantity, &self.unit)
    }

    /// Whether the remaining quantity is at or below the threshold.
    pub fn is_low_stock(&self, default_threshold: f64) -> bool {
        self.quantity <= self.low_stock_threshold.unwrap_or(default_threshold)
    }
}

/// A piece of lab equipment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub status: EquipmentStatus,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub last_maintenance: Option<NaiveDate>,
    pub maintenance_interval_days: Option<i64>,
    pub calibration_due: Option<NaiveDate>,
}

impl Equipment {
    /// Date the next scheduled maintenance falls due, if the item has an interval.
    pub fn next_maintenance(&self) -> Option<NaiveDate> {
        let last = self.last_maintenance?;
        let interval = self.maintenance_interval_days?;
        last.checked_add_signed(chrono::Duration::days(interval))
    }
}

/// A borrowing request for a chemical or an equipment item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Borrowing {
    pub id: i64,
    pub borrower_id: i64,
    pub equipment_id: Option<i64>,
    pub chemical_id: Option<i64>,
    pub quantity: Option<f64>,
    pub status: BorrowingStatus,
    pub purpose: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Display name of the borrowed item, joined in by queries.
    pub item_name: String,
}

/// A lecture requiring lab resources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LectureSchedule {
    pub id: i64,
    pub title: String,
    pub technician_id: Option<i64>,
    pub lecture_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: String,
    pub status: ScheduleStatus,
    pub required_equipment: Option<String>,
    pub required_chemicals: Option<String>,
}

/// A row of the chemical usage log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    pub chemical_id: i64,
    pub user_id: i64,
    pub quantity_used: f64,
    pub remaining_quantity: f64,
    pub purpose: Option<String>,
    pub used_at: DateTime<Utc>,
}

/// A new borrowing request, validated by the storage transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBorrowing {
    pub borrower_id: i64,
    pub equipment_id: Option<i64>,
    pub chemical_id: Option<i64>,
    pub quantity: Option<f64>,
    pub purpose: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A chemical to be added to the inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewChemical {
    pub name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    pub storage_location: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub safety_info: Option<String>,
    pub hazard_class: Option<String>,
    pub low_stock_threshold: Option<f64>,
}

impl NewChemical {
    pub fn new(name: &str, category: &str, quantity: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            quantity,
            unit: unit.to_string(),
            storage_location: None,
            expiration_date: None,
            safety_info: None,
            hazard_class: None,
            low_stock_threshold: None,
        }
    }
}

/// An equipment item to be added to the inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEquipment {
    pub name: String,
    pub category: String,
    pub status: EquipmentStatus,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub last_maintenance: Option<NaiveDate>,
    pub maintenance_interval_days: Option<i64>,
    pub calibration_due: Option<NaiveDate>,
}

impl NewEquipment {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            status: EquipmentStatus::Available,
            location: None,
            serial_number: None,
            last_maintenance: None,
            maintenance_interval_days: None,
            calibration_due: None,
        }
    }
}

/// A lecture to be added to the schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewLectureSchedule {
    pub title: String,
    pub technician_id: Option<i64>,
    pub lecture_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: String,
    pub required_equipment: Option<String>,
    pub required_chemicals: Option<String>,
}

// =============================================================================
// Conversation records
// =============================================================================

/// A chat conversation owned by one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: i64,
    pub conversation_type: ConversationType,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One processed chat message, appended to the audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: i64,
    pub query_text: String,
    pub response_text: String,
    pub query_type: String,
    pub created_at: DateTime<Utc>,
}

/// Render a quantity without trailing zeros, followed by its unit.
pub fn format_quantity(quantity: f64, unit: &str) -> String {
    let number = if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        let s = format!("{:.2}", quantity);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    };
    if unit.is_empty() {
        number
    } else {
        format!("{} {}", number, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chemical(quantity: f64, threshold: Option<f64>) -> Chemical {
        Chemical {
            id: 1,
            name: "Sodium Chloride".to_string(),
            category: "Salt".to_string(),
            quantity,
            unit: "g".to_string(),
            storage_location: None,
            expiration_date: None,
            safety_info: None,
            hazard_class: None,
            low_stock_threshold: threshold,
        }
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Technician ".parse::<Role>().unwrap(), Role::Technician);
        assert_eq!("borrower".parse::<Role>().unwrap(), Role::Borrower);
        assert!("student".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_manages_inventory() {
        assert!(Role::Admin.manages_inventory());
        assert!(Role::Technician.manages_inventory());
        assert!(!Role::Borrower.manages_inventory());
    }

    #[test]
    fn test_status_display_roundtrip() {
        for status in [
            EquipmentStatus::Available,
            EquipmentStatus::InUse,
            EquipmentStatus::Maintenance,
            EquipmentStatus::Retired,
        ] {
            assert_eq!(status.to_string().parse::<EquipmentStatus>().unwrap(), status);
        }
        assert_eq!("in_use".parse::<EquipmentStatus>().unwrap(), EquipmentStatus::InUse);
        assert!("broken".parse::<BorrowingStatus>().is_err());
        assert_eq!(ConversationType::Bot.to_string(), "bot");
        assert_eq!(ConversationStatus::Archived.to_string(), "archived");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(100.0, "g"), "100 g");
        assert_eq!(format_quantity(2.5, "L"), "2.5 L");
        assert_eq!(format_quantity(0.126, "mL"), "0.13 mL");
        assert_eq!(format_quantity(3.0, ""), "3");
    }

    #[test]
    fn test_chemical_low_stock_uses_own_threshold_first() {
        assert!(chemical(5.0, None).is_low_stock(10.0));
        assert!(!chemical(5.0, Some(2.0)).is_low_stock(10.0));
        assert!(chemical(2.0, Some(2.0)).is_low_stock(10.0));
        assert_eq!(chemical(100.0, None).quantity_label(), "100 g");
    }

    #[test]
    fn test_equipment_next_maintenance() {
        let item = Equipment {
            id: 1,
            name: "Centrifuge".to_string(),
            category: "Separation".to_string(),
            status: EquipmentStatus::Available,
            location: None,
            serial_number: None,
            last_maintenance: NaiveDate::from_ymd_opt(2026, 1, 1),
            maintenance_interval_days: Some(90),
            calibration_due: None,
        };
        assert_eq!(item.next_maintenance(), NaiveDate::from_ymd_opt(2026, 4, 1));
        assert!(EquipmentStatus::InUse.is_bookable());
        assert!(!EquipmentStatus::Maintenance.is_bookable());
    }
}
