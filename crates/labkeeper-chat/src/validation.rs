//! Input validation and sanitization for chat requests.
//!
//! Validators reject malformed input with a [`ValidationError`] naming the
//! field. [`sanitize`] is separate: it escapes rather than rejects, and is
//! applied to the message body before routing.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use labkeeper_core::traits::LabReader;
use labkeeper_core::types::{Role, User};

use crate::error::{ChatError, ValidationError};

/// Default upper bound on message length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;
/// Upper bound on chemical and equipment names, in characters.
pub const MAX_NAME_LENGTH: usize = 100;
/// Largest quantity accepted anywhere in the system.
pub const MAX_QUANTITY: f64 = 999_999.99;
/// How far ahead a date may lie.
pub const MAX_YEARS_AHEAD: i32 = 100;

const DENIED_CHARS: [char; 5] = ['<', '>', '"', '\'', '&'];

/// Validate a chat message and return it trimmed.
pub fn validate_message(message: Option<&str>, max_len: usize) -> Result<&str, ValidationError> {
    let Some(message) = message else {
        return Err(ValidationError::new("message", "is required"));
    };
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("message", "must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(ValidationError::new(
            "message",
            format!("is too long ({} characters, maximum {})", len, max_len),
        ));
    }
    Ok(trimmed)
}

/// Coerce a JSON number or numeric string into a positive user id.
pub fn coerce_user_id(value: &Value) -> Result<i64, ValidationError> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Null => return Err(ValidationError::new("user_id", "is required")),
        _ => None,
    };
    match id {
        Some(id) if id > 0 => Ok(id),
        Some(_) => Err(ValidationError::new("user_id", "must be a positive integer")),
        None => Err(ValidationError::new("user_id", "must be an integer")),
    }
}

/// Validate a user id and confirm the user exists.
///
/// An unknown user is a validation failure. A failed lookup is a database
/// failure: the id may well be valid, it just could not be checked.
pub fn validate_user_id(value: &Value, reader: &dyn LabReader) -> Result<User, ChatError> {
    let id = coerce_user_id(value)?;
    match reader.user_by_id(id) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ValidationError::new("user_id", format!("user {} does not exist", id)).into()),
        Err(e) => Err(ChatError::Database(e.to_string())),
    }
}

/// Validate a role name, case-insensitively.
pub fn validate_role(role: Option<&str>) -> Result<Role, ValidationError> {
    let Some(role) = role else {
        return Err(ValidationError::new("role", "is required"));
    };
    role.parse::<Role>().map_err(|_| {
        ValidationError::new(
            "role",
            format!("'{}' is not one of admin, technician, borrower", role.trim()),
        )
    })
}

/// Validate a chemical or equipment name.
pub fn validate_name<'a>(field: &str, name: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", MAX_NAME_LENGTH),
        ));
    }
    if let Some(bad) = trimmed.chars().find(|c| DENIED_CHARS.contains(c)) {
        return Err(ValidationError::new(
            field,
            format!("contains a forbidden character '{}'", bad),
        ));
    }
    Ok(trimmed)
}

/// Coerce a JSON number or numeric string into a quantity.
pub fn validate_quantity(value: &Value) -> Result<f64, ValidationError> {
    let quantity = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|q| q.is_finite())
    .ok_or_else(|| ValidationError::new("quantity", "must be a number"))?;

    if quantity < 0.0 {
        return Err(ValidationError::new("quantity", "must not be negative"));
    }
    if quantity > MAX_QUANTITY {
        return Err(ValidationError::new(
            "quantity",
            format!("must not exceed {}", MAX_QUANTITY),
        ));
    }
    Ok(quantity)
}

/// Parse a `YYYY-MM-DD` date no more than 100 years after `today`.
pub fn validate_date(value: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::new("date", "must be a valid date (YYYY-MM-DD)"))?;
    let limit = today
        .with_year(today.year() + MAX_YEARS_AHEAD)
        .unwrap_or(NaiveDate::MAX);
    if date > limit {
        return Err(ValidationError::new(
            "date",
            format!("must not be more than {} years in the future", MAX_YEARS_AHEAD),
        ));
    }
    Ok(date)
}

/// Escape HTML-significant characters.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use serde_json::json;

    #[test]
    fn test_message_bounds() {
        assert_eq!(validate_message(Some("  hello  "), 1000).unwrap(), "hello");
        assert_eq!(validate_message(None, 1000).unwrap_err().field, "message");
        assert!(validate_message(Some("   "), 1000)
            .unwrap_err()
            .message
            .contains("empty"));

        let exact = "a".repeat(1000);
        assert!(validate_message(Some(&exact), 1000).is_ok());
        let long = "a".repeat(1001);
        assert!(validate_message(Some(&long), 1000)
            .unwrap_err()
            .message
            .contains("too long"));
    }

    #[test]
    fn test_message_length_counts_characters_not_bytes() {
        let accented = "é".repeat(1000);
        assert!(validate_message(Some(&accented), 1000).is_ok());
    }

    #[test]
    fn test_user_id_coercion() {
        assert_eq!(coerce_user_id(&json!(7)).unwrap(), 7);
        assert_eq!(coerce_user_id(&json!(" 12 ")).unwrap(), 12);
        assert!(coerce_user_id(&json!(0)).is_err());
        assert!(coerce_user_id(&json!(-3)).is_err());
        assert!(coerce_user_id(&json!(1.5)).is_err());
        assert!(coerce_user_id(&json!("abc")).is_err());
        assert!(coerce_user_id(&Value::Null).is_err());
    }

    #[test]
    fn test_user_id_existence_distinguishes_missing_from_unreachable() {
        let (reader, _) = fixtures();
        let ana = reader
            .inventory()
            .add_user("Ana", "ana@lab.test", Role::Borrower)
            .unwrap();

        assert_eq!(validate_user_id(&json!(ana.id), reader.as_ref()).unwrap().name, "Ana");
        assert!(matches!(
            validate_user_id(&json!(ana.id + 1), reader.as_ref()).unwrap_err(),
            ChatError::Validation(_)
        ));

        reader.set_failing(true);
        assert!(matches!(
            validate_user_id(&json!(ana.id), reader.as_ref()).unwrap_err(),
            ChatError::Database(_)
        ));
        // Format problems are caught before the lookup.
        assert!(matches!(
            validate_user_id(&json!("x"), reader.as_ref()).unwrap_err(),
            ChatError::Validation(_)
        ));
    }

    #[test]
    fn test_role_validation() {
        assert_eq!(validate_role(Some("Admin")).unwrap(), Role::Admin);
        assert_eq!(validate_role(Some("TECHNICIAN")).unwrap(), Role::Technician);
        assert_eq!(validate_role(Some("borrower")).unwrap(), Role::Borrower);
        for bad in ["student", "", "root", "admins"] {
            assert_eq!(validate_role(Some(bad)).unwrap_err().field, "role");
        }
        assert!(validate_role(None).is_err());
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_name("chemical_name", " Ethanol ").unwrap(), "Ethanol");
        assert!(validate_name("chemical_name", "").is_err());
        assert!(validate_name("chemical_name", &"x".repeat(101)).is_err());
        assert!(validate_name("equipment_name", "<script>").is_err());
        assert!(validate_name("equipment_name", "Tom's scale").is_err());
        assert!(validate_name("equipment_name", "R&D centrifuge").is_err());
    }

    #[test]
    fn test_quantity_validation() {
        assert_eq!(validate_quantity(&json!(0)).unwrap(), 0.0);
        assert_eq!(validate_quantity(&json!("12.5")).unwrap(), 12.5);
        assert_eq!(validate_quantity(&json!(999_999.99)).unwrap(), 999_999.99);
        assert!(validate_quantity(&json!(1_000_000)).is_err());
        assert!(validate_quantity(&json!(-1)).is_err());
        assert!(validate_quantity(&json!("lots")).is_err());
        assert!(validate_quantity(&json!(null)).is_err());
    }

    #[test]
    fn test_date_validation() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(
            validate_date("2026-12-01", today).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()
        );
        assert!(validate_date("2126-10-18", today).is_ok());
        assert!(validate_date("2126-10-19", today).is_err());
        assert!(validate_date("2026-02-30", today).is_err());
        assert!(validate_date("tomorrow", today).is_err());
    }

    #[test]
    fn test_sanitize_escapes_deny_list() {
        assert_eq!(
            sanitize(r#"<b>"Tom's" & co</b>"#),
            "&lt;b&gt;&quot;Tom&#x27;s&quot; &amp; co&lt;/b&gt;"
        );
        assert_eq!(sanitize("plain text"), "plain text");
    }
}
