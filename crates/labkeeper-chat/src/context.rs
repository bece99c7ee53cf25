//! Typed conversation context.
//!
//! The store persists context as a flat key/value bag per conversation;
//! [`ChatContext`] is the typed view handlers read and mutate. After a
//! turn, only the keys that changed are written back.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

const KEY_LAST_TOPIC: &str = "last_topic";
const KEY_LAST_CHEMICAL: &str = "last_chemical";
const KEY_LAST_EQUIPMENT: &str = "last_equipment";
const KEY_PENDING_ACTION: &str = "pending_action";
const KEY_EQUIPMENT_NAME: &str = "equipment_name";
const KEY_ITEM_NAME: &str = "item_name";
const KEY_AWAITING_QUANTITY: &str = "awaiting_quantity";
const KEY_AWAITING_CLARIFICATION: &str = "awaiting_clarification";

/// Every key this module reads or writes.
pub const CONTEXT_KEYS: [&str; 8] = [
    KEY_LAST_TOPIC,
    KEY_LAST_CHEMICAL,
    KEY_LAST_EQUIPMENT,
    KEY_PENDING_ACTION,
    KEY_EQUIPMENT_NAME,
    KEY_ITEM_NAME,
    KEY_AWAITING_QUANTITY,
    KEY_AWAITING_CLARIFICATION,
];

/// What the conversation was last about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Chemicals,
    Equipment,
    Alerts,
    Maintenance,
    Booking,
    Purchase,
    Protocols,
    Safety,
    Borrowing,
    Schedule,
    History,
    Help,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Topic::Chemicals => "chemicals",
            Topic::Equipment => "equipment",
            Topic::Alerts => "alerts",
            Topic::Maintenance => "maintenance",
            Topic::Booking => "booking",
            Topic::Purchase => "purchase",
            Topic::Protocols => "protocols",
            Topic::Safety => "safety",
            Topic::Borrowing => "borrowing",
            Topic::Schedule => "schedule",
            Topic::History => "history",
            Topic::Help => "help",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Topic {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chemicals" => Ok(Topic::Chemicals),
            "equipment" => Ok(Topic::Equipment),
            "alerts" => Ok(Topic::Alerts),
            "maintenance" => Ok(Topic::Maintenance),
            "booking" => Ok(Topic::Booking),
            "purchase" => Ok(Topic::Purchase),
            "protocols" => Ok(Topic::Protocols),
            "safety" => Ok(Topic::Safety),
            "borrowing" => Ok(Topic::Borrowing),
            "schedule" => Ok(Topic::Schedule),
            "history" => Ok(Topic::History),
            "help" => Ok(Topic::Help),
            _ => Err(format!("Unknown topic: {}", s)),
        }
    }
}

/// A multi-step flow waiting for the user's next message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    BookEquipment { equipment_name: String },
    PurchaseRequest { item_name: String },
    BorrowItem { item_name: String },
}

impl PendingAction {
    pub fn kind(&self) -> &'static str {
        match self {
            PendingAction::BookEquipment { .. } => "book_equipment",
            PendingAction::PurchaseRequest { .. } => "purchase_request",
            PendingAction::BorrowItem { .. } => "borrow_item",
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let kind = map.get(KEY_PENDING_ACTION)?;
        match kind.as_str() {
            "book_equipment" => Some(PendingAction::BookEquipment {
                equipment_name: map.get(KEY_EQUIPMENT_NAME)?.clone(),
            }),
            "purchase_request" => Some(PendingAction::PurchaseRequest {
                item_name: map.get(KEY_ITEM_NAME)?.clone(),
            }),
            "borrow_item" => Some(PendingAction::BorrowItem {
                item_name: map.get(KEY_ITEM_NAME)?.clone(),
            }),
            _ => None,
        }
    }
}

/// Typed view over a conversation's context bag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    pub last_topic: Option<Topic>,
    pub last_chemical: Option<String>,
    pub last_equipment: Option<String>,
    pub pending_action: Option<PendingAction>,
    pub awaiting_quantity: bool,
    pub awaiting_clarification: bool,
}

impl ChatContext {
    /// Read the typed context from stored rows. Unknown keys and
    /// unparseable values are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let flag = |key: &str| map.get(key).is_some_and(|v| v == "true");
        Self {
            last_topic: map.get(KEY_LAST_TOPIC).and_then(|t| t.parse().ok()),
            last_chemical: map.get(KEY_LAST_CHEMICAL).cloned(),
            last_equipment: map.get(KEY_LAST_EQUIPMENT).cloned(),
            pending_action: PendingAction::from_map(map),
            awaiting_quantity: flag(KEY_AWAITING_QUANTITY),
            awaiting_clarification: flag(KEY_AWAITING_CLARIFICATION),
        }
    }

    /// Flatten into the key/value rows the store persists.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(topic) = self.last_topic {
            map.insert(KEY_LAST_TOPIC.to_string(), topic.to_string());
        }
        if let Some(ref name) = self.last_chemical {
            map.insert(KEY_LAST_CHEMICAL.to_string(), name.clone());
        }
        if let Some(ref name) = self.last_equipment {
            map.insert(KEY_LAST_EQUIPMENT.to_string(), name.clone());
        }
        if let Some(ref action) = self.pending_action {
            map.insert(KEY_PENDING_ACTION.to_string(), action.kind().to_string());
            match action {
                PendingAction::BookEquipment { equipment_name } => {
                    map.insert(KEY_EQUIPMENT_NAME.to_string(), equipment_name.clone());
                }
                PendingAction::PurchaseRequest { item_name }
                | PendingAction::BorrowItem { item_name } => {
                    map.insert(KEY_ITEM_NAME.to_string(), item_name.clone());
                }
            }
        }
        if self.awaiting_quantity {
            map.insert(KEY_AWAITING_QUANTITY.to_string(), "true".to_string());
        }
        if self.awaiting_clarification {
            map.insert(KEY_AWAITING_CLARIFICATION.to_string(), "true".to_string());
        }
        map
    }

    /// Whether anything here can drive a follow-up.
    pub fn has_state(&self) -> bool {
        self.last_chemical.is_some()
            || self.last_equipment.is_some()
            || self.pending_action.is_some()
            || self.awaiting_quantity
            || self.awaiting_clarification
    }

    /// End any multi-step flow, keeping what was last discussed.
    pub fn clear_pending(&mut self) {
        self.pending_action = None;
        self.awaiting_quantity = false;
        self.awaiting_clarification = false;
    }

    /// Record a resolved chemical as the current subject.
    pub fn remember_chemical(&mut self, name: &str) {
        self.last_chemical = Some(name.to_string());
        self.last_topic = Some(Topic::Chemicals);
    }

    /// Record a resolved equipment item as the current subject.
    pub fn remember_equipment(&mut self, name: &str) {
        self.last_equipment = Some(name.to_string());
        self.last_topic = Some(Topic::Equipment);
    }

    /// Changes needed to turn `before` into `self`: keys to upsert and keys
    /// to delete.
    pub fn diff(&self, before: &ChatContext) -> (Vec<(String, String)>, Vec<String>) {
        let old = before.to_map();
        let new = self.to_map();
        let mut upserts: Vec<(String, String)> = new
            .iter()
            .filter(|(k, v)| old.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut deletes: Vec<String> = old
            .keys()
            .filter(|k| !new.contains_key(*k))
            .cloned()
            .collect();
        upserts.sort();
        deletes.sort();
        (upserts, deletes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_roundtrip() {
        let ctx = ChatContext {
            last_topic: Some(Topic::Booking),
            last_chemical: None,
            last_equipment: Some("Centrifuge".to_string()),
            pending_action: Some(PendingAction::BookEquipment {
                equipment_name: "Centrifuge".to_string(),
            }),
            awaiting_quantity: false,
            awaiting_clarification: true,
        };
        let map = ctx.to_map();
        assert_eq!(map["pending_action"], "book_equipment");
        assert_eq!(map["equipment_name"], "Centrifuge");
        assert!(!map.contains_key("awaiting_quantity"));
        assert_eq!(ChatContext::from_map(&map), ctx);
    }

    #[test]
    fn test_from_map_tolerates_junk() {
        let mut map = HashMap::new();
        map.insert("last_topic".to_string(), "gardening".to_string());
        map.insert("pending_action".to_string(), "purchase_request".to_string());
        map.insert("awaiting_quantity".to_string(), "yes".to_string());
        map.insert("unrelated".to_string(), "x".to_string());

        let ctx = ChatContext::from_map(&map);
        assert_eq!(ctx.last_topic, None);
        // A pending action without its parameter cannot be resumed.
        assert_eq!(ctx.pending_action, None);
        assert!(!ctx.awaiting_quantity);
        assert!(!ctx.has_state());
    }

    #[test]
    fn test_diff_reports_upserts_and_deletes() {
        let mut before = ChatContext::default();
        before.remember_chemical("Ethanol");
        before.pending_action = Some(PendingAction::PurchaseRequest {
            item_name: "Ethanol".to_string(),
        });
        before.awaiting_quantity = true;

        let mut after = before.clone();
        after.clear_pending();
        after.remember_chemical("Acetone");

        let (upserts, deletes) = after.diff(&before);
        assert_eq!(
            upserts,
            vec![("last_chemical".to_string(), "Acetone".to_string())]
        );
        assert_eq!(
            deletes,
            vec!["awaiting_quantity", "item_name", "pending_action"]
        );
    }

    #[test]
    fn test_has_state() {
        let mut ctx = ChatContext::default();
        assert!(!ctx.has_state());
        ctx.last_topic = Some(Topic::Help);
        assert!(!ctx.has_state());
        ctx.remember_equipment("Microscope");
        assert!(ctx.has_state());
        assert_eq!(ctx.last_topic, Some(Topic::Equipment));
    }
}
