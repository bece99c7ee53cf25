//! Entity and parameter extraction from chat messages.
//!
//! Pulls item names, dates, and quantity replies out of a lower-cased,
//! sanitized message. Extraction is best effort; the façade's flexible name
//! resolution absorbs most of the slack.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::error::ValidationError;
use crate::validation::validate_date;

// =============================================================================
// Word lists
// =============================================================================

// Phrases after which the subject usually follows. Verb markers come first
// so "book the centrifuge for tomorrow" anchors on "book", not "for".
static SUBJECT_MARKERS: &[&str] = &[
    "book", "reserve", "borrow", "order", "buy", "purchase", "restock",
    "details of", "details about", "details on", "details for",
    "information about", "information on", "information for",
    "info about", "info on", "info for", "tell me about", "properties of",
    "safety of", "hazards of", "about", "of", "for",
];

static STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "have", "has", "had",
    "do", "does", "did", "will", "would", "should", "can", "could", "i", "me",
    "my", "we", "our", "us", "you", "your", "it", "its", "they", "them",
    "what", "which", "who", "this", "that", "these", "those", "of", "in", "to",
    "for", "with", "on", "at", "from", "by", "about", "and", "or", "not", "so",
    "any", "some", "how", "when", "where", "there", "here", "please", "tell",
    "show", "give", "get", "need", "want", "like", "more", "much", "many",
    "left", "still", "currently", "now", "all", "list", "know", "let", "see",
    "check", "find", "look", "up", "okay", "ok", "thanks", "thank", "s", "x27",
    "amp", "quot", "lt", "gt", "whats", "hows", "anything", "else",
];

// Domain words that describe the question rather than name the item.
static NOISE_WORDS: &[&str] = &[
    "detail", "details", "information", "info", "properties", "property",
    "describe", "specs", "specification", "specifications", "available",
    "availability", "stock", "inventory", "amount", "quantity", "level",
    "levels", "chemical", "chemicals", "reagent", "reagents", "equipment",
    "instrument", "instruments", "item", "items", "safety", "safe", "hazard",
    "hazards", "hazardous", "danger", "dangerous", "precautions", "msds", "sds",
    "book", "booking", "booked", "reserve", "reservation", "borrow",
    "borrowing", "request", "order", "buy", "purchase", "restock", "more",
    "mix", "mixing", "combine", "compatible", "compatibility", "incompatible",
    "store", "stored", "together", "react", "reaction", "where", "location",
    "located", "free", "use", "using", "handle", "handling",
];

// Words that end a subject once at least one subject word has been seen.
static CUT_WORDS: &[&str] = &[
    "for", "on", "at", "from", "until", "by", "today", "tomorrow", "tonight",
    "next", "this", "since", "between", "during", "because", "so", "to",
    "in", "is", "are", "do", "does", "please",
];

static PAIR_SEPARATORS: &[&str] = &["and", "with", "vs", "versus", "plus"];

// =============================================================================
// Patterns
// =============================================================================

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:#x?[0-9a-f]+|[a-z]+);").expect("Invalid entity regex"));

static MARKER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SUBJECT_MARKERS
        .iter()
        .map(|m| Regex::new(&format!(r"\b{}\b", regex::escape(m))).expect("Invalid marker regex"))
        .collect()
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{1,2}-\d{1,2}\b").expect("Invalid date regex"));

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("Invalid weekday regex")
});

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:about\s+|around\s+|roughly\s+)?(-?\d+(?:\.\d+)?)\s*([a-zµ]{0,12})(?:\s+(?:please|thanks))?\s*[.!]?$",
    )
    .expect("Invalid quantity regex")
});

// =============================================================================
// Subject extraction
// =============================================================================

fn strip_entities(message: &str) -> String {
    // Possessive "'s" arrives as "&#x27;s" after sanitization.
    let without_possessive = message.replace("&#x27;s", "");
    ENTITY_RE.replace_all(&without_possessive, " ").into_owned()
}

fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '.'))
        .map(|t| t.trim_matches(|c: char| c == '.' || c == '-'))
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_filler(token: &str) -> bool {
    STOP_WORDS.contains(&token) || NOISE_WORDS.contains(&token)
}

fn collect_subject(text: &str) -> String {
    let mut words: Vec<&str> = Vec::new();
    for token in tokens(text) {
        if !words.is_empty() && CUT_WORDS.contains(&token) {
            break;
        }
        if is_filler(token) || CUT_WORDS.contains(&token) {
            continue;
        }
        words.push(token);
    }
    words.join(" ")
}

/// Best-effort name of the chemical or equipment item a message is about.
///
/// Returns an empty string when the message names nothing, e.g. "what about
/// its safety?", so callers can fall back to conversation context.
pub fn extract_subject(message: &str) -> String {
    let text = strip_entities(&message.to_lowercase());

    // Earliest marker in list order wins; the text after it is the candidate.
    for re in MARKER_RES.iter() {
        if let Some(m) = re.find(&text) {
            let subject = collect_subject(&text[m.end()..]);
            if !subject.is_empty() {
                return subject;
            }
        }
    }
    collect_subject(&text)
}

/// Two item names from "can I mix X and Y" style questions.
pub fn extract_pair(message: &str) -> Option<(String, String)> {
    let text = strip_entities(&message.to_lowercase());
    let mut groups: Vec<Vec<&str>> = vec![Vec::new()];
    for token in tokens(&text) {
        if PAIR_SEPARATORS.contains(&token) {
            groups.push(Vec::new());
        } else if !is_filler(token) {
            if let Some(group) = groups.last_mut() {
                group.push(token);
            }
        }
    }
    let mut names = groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|g| g.join(" "));
    let first = names.next()?;
    let second = names.next()?;
    Some((first, second))
}

// =============================================================================
// Dates
// =============================================================================

fn weekday_from(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// The date a message refers to, if any.
///
/// Understands "today", "tomorrow", "the day after tomorrow", weekday names
/// (next occurrence after today), "next week" (a week from today), and ISO
/// dates. A malformed ISO date is an error rather than silently ignored.
pub fn date_hint(message: &str, today: NaiveDate) -> Result<Option<NaiveDate>, ValidationError> {
    let text = message.to_lowercase();

    if let Some(m) = ISO_DATE_RE.find(&text) {
        return validate_date(m.as_str(), today).map(Some);
    }
    if text.contains("day after tomorrow") {
        return Ok(Some(today + Duration::days(2)));
    }
    if text.contains("tomorrow") {
        return Ok(Some(today + Duration::days(1)));
    }
    if text.contains("today") || text.contains("tonight") {
        return Ok(Some(today));
    }
    if text.contains("next week") {
        return Ok(Some(today + Duration::days(7)));
    }
    if let Some(caps) = WEEKDAY_RE.captures(&text) {
        if let Some(target) = caps.get(1).and_then(|m| weekday_from(m.as_str())) {
            let current = today.weekday().num_days_from_monday() as i64;
            let wanted = target.num_days_from_monday() as i64;
            let mut ahead = (wanted - current + 7) % 7;
            if ahead == 0 {
                ahead = 7;
            }
            return Ok(Some(today + Duration::days(ahead)));
        }
    }
    Ok(None)
}

// =============================================================================
// Quantity replies
// =============================================================================

/// A bare quantity reply such as "5", "2.5 l" or "about 500 g".
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityReply {
    /// The number as typed, validated separately.
    pub amount: String,
    pub unit: Option<String>,
}

pub fn parse_quantity_reply(message: &str) -> Option<QuantityReply> {
    let text = message.trim().to_lowercase();
    let caps = QUANTITY_RE.captures(&text)?;
    let amount = caps.get(1)?.as_str().to_string();
    let unit = caps
        .get(2)
        .map(|m| m.as_str())
        .filter(|u| !u.is_empty())
        .map(canonical_unit);
    Some(QuantityReply { amount, unit })
}

/// Restore the conventional casing of volume units lost to lower-casing.
fn canonical_unit(unit: &str) -> String {
    match unit {
        "l" => "L".to_string(),
        "ml" => "mL".to_string(),
        "ul" | "µl" => "µL".to_string(),
        other => other.to_string(),
    }
}

pub fn looks_like_quantity(message: &str) -> bool {
    QUANTITY_RE.is_match(message.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_subject_after_detail_marker() {
        assert_eq!(
            extract_subject("what are the details of sodium chloride?"),
            "sodium chloride"
        );
        assert_eq!(extract_subject("tell me about the pH meter"), "ph meter");
    }

    #[test]
    fn test_subject_without_marker() {
        assert_eq!(extract_subject("is ethanol available?"), "ethanol");
        assert_eq!(extract_subject("how much sodium chloride do we have"), "sodium chloride");
        assert_eq!(extract_subject("show me the microscope details"), "microscope");
    }

    #[test]
    fn test_subject_stops_at_time_words() {
        assert_eq!(extract_subject("book the centrifuge for tomorrow"), "centrifuge");
        assert_eq!(
            extract_subject("reserve the analytical balance on friday"),
            "analytical balance"
        );
        assert_eq!(extract_subject("i need to order more ethanol"), "ethanol");
    }

    #[test]
    fn test_subject_empty_when_only_pronouns() {
        assert_eq!(extract_subject("what about its safety?"), "");
        assert_eq!(extract_subject("what chemicals are available?"), "");
    }

    #[test]
    fn test_subject_ignores_sanitized_entities() {
        assert_eq!(
            extract_subject("what&#x27;s the stock of acetone"),
            "acetone"
        );
        assert_eq!(extract_subject("the centrifuge&#x27;s details"), "centrifuge");
    }

    #[test]
    fn test_pair_extraction() {
        assert_eq!(
            extract_pair("can i mix bleach and ammonia?"),
            Some(("bleach".to_string(), "ammonia".to_string()))
        );
        assert_eq!(
            extract_pair("is sodium hydroxide compatible with hydrochloric acid"),
            Some(("sodium hydroxide".to_string(), "hydrochloric acid".to_string()))
        );
        assert_eq!(extract_pair("is ethanol safe to store?"), None);
    }

    #[test]
    fn test_date_hints() {
        // 2026-10-18 is a Sunday.
        let today = day(2026, 10, 18);
        assert_eq!(date_hint("book it for tomorrow", today).unwrap(), Some(day(2026, 10, 19)));
        assert_eq!(
            date_hint("the day after tomorrow", today).unwrap(),
            Some(day(2026, 10, 20))
        );
        assert_eq!(date_hint("anything today?", today).unwrap(), Some(today));
        assert_eq!(date_hint("on friday", today).unwrap(), Some(day(2026, 10, 23)));
        assert_eq!(date_hint("on sunday", today).unwrap(), Some(day(2026, 10, 25)));
        assert_eq!(date_hint("on 2026-11-02", today).unwrap(), Some(day(2026, 11, 2)));
        assert_eq!(date_hint("book the centrifuge", today).unwrap(), None);
        assert_eq!(date_hint("on 2026-02-30", today).unwrap_err().field, "date");
    }

    #[test]
    fn test_quantity_replies() {
        assert_eq!(
            parse_quantity_reply("5 L"),
            Some(QuantityReply {
                amount: "5".to_string(),
                unit: Some("L".to_string())
            })
        );
        assert_eq!(parse_quantity_reply("250 ml").unwrap().unit.as_deref(), Some("mL"));
        assert_eq!(
            parse_quantity_reply("about 2.5").unwrap(),
            QuantityReply {
                amount: "2.5".to_string(),
                unit: None
            }
        );
        assert_eq!(parse_quantity_reply("-3 g").unwrap().amount, "-3");
        assert!(parse_quantity_reply("five litres").is_none());
        assert!(parse_quantity_reply("book 5 microscopes tomorrow").is_none());
        assert!(looks_like_quantity("500 ml"));
    }
}
