//! Intent routing.
//!
//! [`ROUTES`] is an ordered table of `(intent, predicate)` rows evaluated
//! first-match-wins over the lower-cased, sanitized message. Rows that need
//! several keyword groups to agree sit above broader single-keyword rows, so
//! "details of sodium chloride" is a details query even though it also names
//! a chemical.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::ChatContext;
use crate::extract::looks_like_quantity;

/// What a message is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ChemicalDetails,
    EquipmentDetails,
    ChemicalAvailability,
    EquipmentAvailability,
    InventoryAlerts,
    Maintenance,
    EquipmentBooking,
    PurchaseRequest,
    ProtocolSuggestion,
    SafetyCompatibility,
    BorrowingCreate,
    BorrowingStatus,
    Schedule,
    SafetyInfo,
    History,
    Help,
    FollowUp,
    Summary,
}

impl Intent {
    /// Tag recorded in the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ChemicalDetails => "chemical_details",
            Intent::EquipmentDetails => "equipment_details",
            Intent::ChemicalAvailability => "chemical_availability",
            Intent::EquipmentAvailability => "equipment_availability",
            Intent::InventoryAlerts => "inventory_alerts",
            Intent::Maintenance => "maintenance",
            Intent::EquipmentBooking => "equipment_booking",
            Intent::PurchaseRequest => "purchase_request",
            Intent::ProtocolSuggestion => "protocol_suggestion",
            Intent::SafetyCompatibility => "safety_compatibility",
            Intent::BorrowingCreate => "borrowing_create",
            Intent::BorrowingStatus => "borrowing_status",
            Intent::Schedule => "schedule",
            Intent::SafetyInfo => "safety_info",
            Intent::History => "history",
            Intent::Help => "help",
            Intent::FollowUp => "follow_up",
            Intent::Summary => "summary",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Keyword groups (compiled once, reused across calls)
// =============================================================================

/// Matches any of `words` starting at a word boundary, so "chemical" also
/// matches "chemicals".
fn prefixed(words: &[&str]) -> Regex {
    let alts: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"\b(?:{})", alts.join("|"))).expect("Invalid keyword regex")
}

/// Matches any of `words` as whole words only.
fn whole(words: &[&str]) -> Regex {
    let alts: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"\b(?:{})\b", alts.join("|"))).expect("Invalid keyword regex")
}

struct Keywords {
    chemical: Regex,
    equipment: Regex,
    detail: Regex,
    availability: Regex,
    alert: Regex,
    maintenance: Regex,
    booking: Regex,
    purchase: Regex,
    protocol: Regex,
    compatibility: Regex,
    borrow: Regex,
    status: Regex,
    schedule: Regex,
    safety: Regex,
    history: Regex,
    help: Regex,
    affirmative: Regex,
    negative: Regex,
    follow_topic: Regex,
}

static KEYWORDS: LazyLock<Keywords> = LazyLock::new(|| Keywords {
    chemical: prefixed(&[
        "chemical", "reagent", "acid", "chloride", "sodium", "potassium", "calcium",
        "magnesium", "hydroxide", "oxide", "sulfate", "sulphate", "nitrate",
        "carbonate", "phosphate", "ethanol", "methanol", "acetone", "solvent",
        "peroxide", "ammonia", "bleach", "glucose", "buffer", "salt", "hydrochloric",
        "sulfuric", "nitric", "indicator", "solution",
    ]),
    equipment: prefixed(&[
        "equipment", "instrument", "apparatus", "device", "machine", "centrifuge",
        "microscope", "balance", "spectro", "pipette", "burette", "autoclave",
        "incubator", "oven", "hot plate", "hotplate", "stirrer", "fume hood",
        "ph meter", "meter", "thermometer", "thermocycler", "pcr", "vortex", "scale",
    ]),
    detail: prefixed(&[
        "detail", "info", "tell me about", "describe", "propert", "specification",
        "specs", "what is",
    ]),
    availability: prefixed(&[
        "availab", "in stock", "do we have", "do you have", "have any", "inventory",
        "how much", "how many", "list", "show", "left", "remaining", "on hand",
    ]),
    alert: prefixed(&[
        "low stock", "low on", "running low", "running out", "expir", "alert",
        "reorder", "restock", "shortage", "warning", "out of stock",
    ]),
    maintenance: prefixed(&[
        "maintenance", "maintain", "calibrat", "servic", "repair", "broken",
        "out of order", "inspection",
    ]),
    booking: prefixed(&["book", "reserve", "reservation"]),
    purchase: prefixed(&[
        "purchase", "buy", "order", "procure", "requisition", "need more",
    ]),
    protocol: prefixed(&[
        "protocol", "procedure", "experiment", "how to prepare", "how do i prepare",
        "how do i make", "method", "titrat", "recipe", "sop", "standard operating",
    ]),
    compatibility: prefixed(&[
        "compatib", "incompatib", "mix", "react with", "reaction between", "combine",
        "store together", "stored together", "store with",
    ]),
    borrow: prefixed(&["borrow", "request", "lend", "loan", "check out", "checkout"]),
    status: prefixed(&[
        "status", "my request", "my borrow", "track", "pending", "approved", "rejected",
    ]),
    schedule: prefixed(&["schedul", "lecture", "timetable", "calendar", "class"]),
    safety: prefixed(&[
        "safe", "hazard", "danger", "msds", "sds", "precaution", "ppe", "toxic",
        "flammab", "corrosive", "first aid", "spill", "handle", "handling",
        "protective",
    ]),
    history: prefixed(&[
        "history", "past", "previous", "used", "usage", "recent activity",
        "what did i", "my activity", "log",
    ]),
    help: whole(&[
        "help", "hi", "hello", "hey", "what can you do", "commands", "how do i use",
        "guide", "getting started", "good morning", "good afternoon", "menu",
    ]),
    affirmative: whole(&[
        "yes", "yeah", "yep", "sure", "ok", "okay", "confirm", "please do", "go ahead",
        "do it", "sounds good", "correct",
    ]),
    negative: whole(&[
        "no", "nope", "cancel", "stop", "never mind", "nevermind", "not now", "don",
        "dont",
    ]),
    follow_topic: whole(&[
        "more", "details", "where", "location", "stored", "how much", "stock",
        "available", "availability", "bookings", "booked", "when", "it", "its", "that",
        "this", "them", "safety", "hazards",
    ]),
});

/// Replies longer than this are new questions, not follow-ups.
const MAX_FOLLOW_UP_WORDS: usize = 8;

// =============================================================================
// Predicates
// =============================================================================

/// A details keyword is present, with or without a recognised subject.
pub(crate) fn asks_for_details(m: &str) -> bool {
    KEYWORDS.detail.is_match(m)
}

/// A stock or availability keyword is present that is not an alert.
pub(crate) fn asks_about_stock(m: &str) -> bool {
    let k = &*KEYWORDS;
    k.availability.is_match(m) && !k.alert.is_match(m)
}

/// The message contains a confirmation such as "yes" or "sounds good".
pub(crate) fn is_affirmative(m: &str) -> bool {
    KEYWORDS.affirmative.is_match(m)
}

/// The message contains a refusal such as "no" or "not now".
pub(crate) fn is_negative(m: &str) -> bool {
    KEYWORDS.negative.is_match(m)
}

fn chemical_details(m: &str, _: &ChatContext) -> bool {
    let k = &*KEYWORDS;
    k.detail.is_match(m) && k.chemical.is_match(m)
}

fn equipment_details(m: &str, _: &ChatContext) -> bool {
    let k = &*KEYWORDS;
    k.detail.is_match(m) && k.equipment.is_match(m)
}

fn chemical_availability(m: &str, _: &ChatContext) -> bool {
    asks_about_stock(m) && KEYWORDS.chemical.is_match(m)
}

fn equipment_availability(m: &str, _: &ChatContext) -> bool {
    asks_about_stock(m) && KEYWORDS.equipment.is_match(m)
}

fn inventory_alerts(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.alert.is_match(m)
}

fn maintenance(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.maintenance.is_match(m)
}

fn equipment_booking(m: &str, _: &ChatContext) -> bool {
    let k = &*KEYWORDS;
    k.booking.is_match(m) && k.equipment.is_match(m)
}

fn purchase_request(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.purchase.is_match(m)
}

fn protocol_suggestion(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.protocol.is_match(m)
}

fn safety_compatibility(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.compatibility.is_match(m)
}

fn borrowing_create(m: &str, _: &ChatContext) -> bool {
    let k = &*KEYWORDS;
    k.borrow.is_match(m) && !k.status.is_match(m)
}

fn borrowing_status(m: &str, _: &ChatContext) -> bool {
    let k = &*KEYWORDS;
    k.borrow.is_match(m) && k.status.is_match(m)
}

fn schedule(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.schedule.is_match(m)
}

fn safety_info(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.safety.is_match(m)
}

fn history(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.history.is_match(m)
}

fn help(m: &str, _: &ChatContext) -> bool {
    KEYWORDS.help.is_match(m)
}

fn follow_up(m: &str, ctx: &ChatContext) -> bool {
    if !ctx.has_state() {
        return false;
    }
    if ctx.awaiting_quantity && looks_like_quantity(m) {
        return true;
    }
    if m.split_whitespace().count() > MAX_FOLLOW_UP_WORDS {
        return false;
    }
    let k = &*KEYWORDS;
    ctx.awaiting_clarification || is_affirmative(m) || is_negative(m) || k.follow_topic.is_match(m)
}

// =============================================================================
// Route table
// =============================================================================

/// One row of the routing table.
pub struct Route {
    pub intent: Intent,
    pub matches: fn(&str, &ChatContext) -> bool,
}

/// Evaluated top to bottom; the first matching row wins.
pub static ROUTES: &[Route] = &[
    Route { intent: Intent::ChemicalDetails, matches: chemical_details },
    Route { intent: Intent::EquipmentDetails, matches: equipment_details },
    Route { intent: Intent::ChemicalAvailability, matches: chemical_availability },
    Route { intent: Intent::EquipmentAvailability, matches: equipment_availability },
    Route { intent: Intent::InventoryAlerts, matches: inventory_alerts },
    Route { intent: Intent::Maintenance, matches: maintenance },
    Route { intent: Intent::EquipmentBooking, matches: equipment_booking },
    Route { intent: Intent::PurchaseRequest, matches: purchase_request },
    Route { intent: Intent::ProtocolSuggestion, matches: protocol_suggestion },
    Route { intent: Intent::SafetyCompatibility, matches: safety_compatibility },
    Route { intent: Intent::BorrowingCreate, matches: borrowing_create },
    Route { intent: Intent::BorrowingStatus, matches: borrowing_status },
    Route { intent: Intent::Schedule, matches: schedule },
    Route { intent: Intent::SafetyInfo, matches: safety_info },
    Route { intent: Intent::History, matches: history },
    Route { intent: Intent::Help, matches: help },
    Route { intent: Intent::FollowUp, matches: follow_up },
];

/// Classify a message. Falls back to [`Intent::Summary`].
pub fn route(message: &str, ctx: &ChatContext) -> Intent {
    let message = message.to_lowercase();
    ROUTES
        .iter()
        .find(|r| (r.matches)(&message, ctx))
        .map(|r| r.intent)
        .unwrap_or(Intent::Summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PendingAction;

    fn classify(message: &str) -> Intent {
        route(message, &ChatContext::default())
    }

    #[test]
    fn test_each_intent_has_a_representative() {
        let cases = [
            ("what are the details of sodium chloride?", Intent::ChemicalDetails),
            ("tell me about the centrifuge", Intent::EquipmentDetails),
            ("what chemicals are available?", Intent::ChemicalAvailability),
            ("is ethanol in stock", Intent::ChemicalAvailability),
            ("is the microscope available", Intent::EquipmentAvailability),
            ("any low stock alerts?", Intent::InventoryAlerts),
            ("which chemicals are expiring soon", Intent::InventoryAlerts),
            ("when is the balance due for calibration", Intent::Maintenance),
            ("book the centrifuge for tomorrow", Intent::EquipmentBooking),
            ("i need to order more ethanol", Intent::PurchaseRequest),
            ("suggest a protocol for titration", Intent::ProtocolSuggestion),
            ("can i mix bleach and ammonia", Intent::SafetyCompatibility),
            ("i want to borrow the microscope", Intent::BorrowingCreate),
            ("what is the status of my request", Intent::BorrowingStatus),
            ("what lectures are scheduled today", Intent::Schedule),
            ("what about its safety?", Intent::SafetyInfo),
            ("show my usage history", Intent::History),
            ("help", Intent::Help),
            ("good morning", Intent::Help),
            ("summary please", Intent::Summary),
        ];
        for (message, expected) in cases {
            assert_eq!(classify(message), expected, "message: {message}");
        }
    }

    #[test]
    fn test_more_specific_rows_win() {
        // Details beat availability when both keyword groups match.
        assert_eq!(
            classify("show me details of sodium chloride"),
            Intent::ChemicalDetails
        );
        // Alerts are not swallowed by the availability row.
        assert_eq!(
            classify("do we have any low stock chemicals"),
            Intent::InventoryAlerts
        );
        // Booking needs an equipment subject; a bare "book" is not enough.
        assert_ne!(classify("book a meeting"), Intent::EquipmentBooking);
        // "out of order" is maintenance, not a purchase.
        assert_eq!(classify("the centrifuge is out of order"), Intent::Maintenance);
        // Borrowing rows split on "status".
        assert_eq!(classify("request the microscope"), Intent::BorrowingCreate);
        assert_eq!(
            classify("what's the status of my borrow request"),
            Intent::BorrowingStatus
        );
    }

    #[test]
    fn test_details_and_stock_rows_need_a_subject_keyword() {
        assert_eq!(classify("what is the time"), Intent::Summary);
        assert_eq!(classify("tell me about yourself"), Intent::Summary);
        assert_eq!(classify("how much is left?"), Intent::Summary);
        // Named in the keyword tables, so routed directly.
        assert_eq!(classify("tell me about acetone"), Intent::ChemicalDetails);
        assert_eq!(classify("how much ethanol is left?"), Intent::ChemicalAvailability);
    }

    #[test]
    fn test_confirmation_phrases() {
        for reply in ["yes", "sounds good", "please do", "go ahead", "do it"] {
            assert!(is_affirmative(reply), "{reply}");
        }
        for reply in ["no thanks", "not now", "never mind", "cancel", "don&#x27;t"] {
            assert!(is_negative(reply), "{reply}");
        }
        assert!(!is_negative("notebook"));
        assert!(!is_affirmative("okapi"));
    }

    #[test]
    fn test_greeting_words_need_whole_word_match() {
        // "hi" inside "chemicals" or "history" must not route to help.
        assert_eq!(classify("show my history"), Intent::History);
        assert_ne!(classify("this thing"), Intent::Help);
    }

    #[test]
    fn test_follow_up_requires_context_state() {
        assert_eq!(classify("yes"), Intent::Summary);
        assert_eq!(classify("5 l"), Intent::Summary);

        let mut ctx = ChatContext::default();
        ctx.pending_action = Some(PendingAction::BookEquipment {
            equipment_name: "Centrifuge".to_string(),
        });
        assert_eq!(route("yes", &ctx), Intent::FollowUp);
        assert_eq!(route("no thanks", &ctx), Intent::FollowUp);

        ctx.clear_pending();
        ctx.pending_action = Some(PendingAction::PurchaseRequest {
            item_name: "Ethanol".to_string(),
        });
        ctx.awaiting_quantity = true;
        assert_eq!(route("5 L", &ctx), Intent::FollowUp);
    }

    #[test]
    fn test_long_messages_are_not_follow_ups() {
        let mut ctx = ChatContext::default();
        ctx.remember_chemical("Ethanol");
        assert_eq!(route("where is it", &ctx), Intent::FollowUp);
        assert_eq!(
            route("yes but first i would like a general overview of the whole lab", &ctx),
            Intent::Summary
        );
    }

    #[test]
    fn test_topic_rows_still_win_over_follow_up() {
        let mut ctx = ChatContext::default();
        ctx.remember_chemical("Sodium Chloride");
        assert_eq!(route("what about its safety?", &ctx), Intent::SafetyInfo);
    }

    #[test]
    fn test_route_lowercases_input() {
        assert_eq!(classify("BOOK THE CENTRIFUGE"), Intent::EquipmentBooking);
    }

    #[test]
    fn test_intent_tags() {
        assert_eq!(Intent::ChemicalDetails.as_str(), "chemical_details");
        assert_eq!(Intent::FollowUp.to_string(), "follow_up");
        assert_eq!(ROUTES.len(), 17);
        assert_eq!(ROUTES[0].intent, Intent::ChemicalDetails);
        assert_eq!(ROUTES[ROUTES.len() - 1].intent, Intent::FollowUp);
    }
}
