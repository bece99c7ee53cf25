//! Contextual follow-ups: confirmations, quantity replies, clarifications,
//! and short questions about the item last discussed.

use serde_json::Value;

use labkeeper_core::types::format_quantity;

use super::booking::{equipment_booking, offer_borrowing};
use super::guidance::{safety_for, start_purchase};
use super::inventory::{chemical_stock, details_for, equipment_status};
use super::{bulleted, unavailable, Reply, Turn};
use crate::context::{ChatContext, PendingAction, Topic};
use crate::error::{ChatError, ValidationError};
use crate::extract::{date_hint, extract_subject, parse_quantity_reply};
use crate::facade::Fetched;
use crate::router;
use crate::validation::validate_quantity;

fn words(message: &str) -> Vec<&str> {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn has_any(message: &str, wanted: &[&str]) -> bool {
    words(message).iter().any(|w| wanted.contains(w))
}

// Same word lists the router uses to send a reply here.
fn is_negative(message: &str) -> bool {
    router::is_negative(message)
}

fn is_affirmative(message: &str) -> bool {
    !is_negative(message) && router::is_affirmative(message)
}

pub(super) fn follow_up(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    match ctx.pending_action.clone() {
        Some(PendingAction::PurchaseRequest { item_name }) => {
            return resume_purchase(turn, ctx, &item_name)
        }
        Some(PendingAction::BookEquipment { equipment_name }) => {
            return resume_booking(turn, ctx, &equipment_name)
        }
        Some(PendingAction::BorrowItem { item_name }) => {
            return Ok(resume_borrowing(turn, ctx, &item_name))
        }
        None => {}
    }

    if ctx.awaiting_clarification {
        return clarify(turn, ctx);
    }
    Ok(about_last_subject(turn, ctx))
}

fn resume_purchase(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
    item_name: &str,
) -> Result<Reply, ChatError> {
    if is_negative(turn.message) {
        ctx.clear_pending();
        return Ok(Reply::new(format!(
            "Okay, I've dropped the purchase request for {}.",
            item_name
        )));
    }
    let Some(reply) = parse_quantity_reply(turn.message) else {
        return Ok(Reply::new(format!(
            "Please reply with a quantity for {}, e.g. \"5 L\", or say \"cancel\".",
            item_name
        )));
    };

    let amount = validate_quantity(&Value::String(reply.amount))?;
    if amount == 0.0 {
        return Err(ValidationError::new("quantity", "must be greater than zero").into());
    }
    let label = format_quantity(amount, reply.unit.as_deref().unwrap_or_default());
    ctx.clear_pending();

    let text = if turn.role.manages_inventory() {
        format!(
            "Noted: a purchase request for {} of {}. Submit it through the purchasing \
             form so it can be approved.",
            label, item_name
        )
    } else {
        format!(
            "Here is your note for a lab technician: please order {} of {}.",
            label, item_name
        )
    };
    Ok(Reply::new(text))
}

fn resume_booking(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
    equipment_name: &str,
) -> Result<Reply, ChatError> {
    if is_negative(turn.message) {
        ctx.clear_pending();
        return Ok(Reply::new(format!(
            "Okay, I've cancelled the booking of {}.",
            equipment_name
        )));
    }
    if let Some(date) = date_hint(turn.message, turn.today)? {
        let item = match turn.data.find_equipment(equipment_name) {
            Fetched::Loaded(Some(item)) => item,
            Fetched::Loaded(None) => {
                ctx.clear_pending();
                return Ok(Reply::new(format!(
                    "{} is no longer in the inventory.",
                    equipment_name
                )));
            }
            Fetched::Unavailable => return Ok(unavailable(&format!("the bookings for {}", equipment_name))),
        };
        return Ok(match turn.data.equipment_conflicts(item.id, date, date) {
            Fetched::Loaded(conflicts) if conflicts.is_empty() => Reply::new(format!(
                "{} is free on {}. Reply \"yes\" to go ahead with the booking request.",
                item.name, date
            )),
            Fetched::Loaded(conflicts) => Reply::new(format!(
                "{} is already booked on {}:\n{}\nPick another date, or say \"cancel\".",
                item.name,
                date,
                bulleted(&conflicts, 10, |b| format!(
                    "- {} to {} ({})",
                    b.start_date, b.end_date, b.status
                ))
            )),
            Fetched::Unavailable => unavailable(&format!("the bookings for {}", item.name)),
        });
    }
    if is_affirmative(turn.message) {
        ctx.clear_pending();
        return Ok(Reply::new(format!(
            "Great. Submit a borrowing request for {} with your date, start time, and \
             duration; it stays pending until a lab technician approves it.",
            equipment_name
        )));
    }
    Ok(Reply::new(format!(
        "When would you like to book {}? Tell me the date, start time, and duration, \
         or say \"cancel\".",
        equipment_name
    )))
}

fn resume_borrowing(turn: &Turn<'_>, ctx: &mut ChatContext, item_name: &str) -> Reply {
    if is_negative(turn.message) {
        ctx.clear_pending();
        return Reply::new(format!("Okay, I won't request {}.", item_name));
    }
    if is_affirmative(turn.message) {
        ctx.clear_pending();
        return Reply::new(format!(
            "Okay. Submit a borrowing request for {} with the dates and purpose; it stays \
             pending until a lab technician approves it.",
            item_name
        ));
    }
    Reply::new(format!(
        "Would you like to request {}? Reply \"yes\" or \"no\".",
        item_name
    ))
}

/// The previous reply asked "which item?"; treat this message as the answer.
fn clarify(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let mut subject = extract_subject(turn.message);
    if subject.is_empty() {
        subject = turn.message.trim().to_string();
    }
    if is_negative(turn.message) {
        ctx.clear_pending();
        return Ok(Reply::new("Okay. What else can I help you with?"));
    }
    match ctx.last_topic {
        Some(Topic::Purchase) => start_purchase(turn, ctx, &subject),
        Some(Topic::Borrowing) => Ok(offer_borrowing(turn, ctx, &subject)),
        Some(Topic::Booking) => equipment_booking(turn, ctx),
        Some(Topic::Equipment) | Some(Topic::Maintenance) => {
            Ok(details_for(turn, ctx, &subject, false))
        }
        _ => Ok(details_for(turn, ctx, &subject, true)),
    }
}

/// Short questions like "where is it?" about the item last discussed.
fn about_last_subject(turn: &Turn<'_>, ctx: &mut ChatContext) -> Reply {
    let prefer_equipment = matches!(
        ctx.last_topic,
        Some(Topic::Equipment) | Some(Topic::Booking) | Some(Topic::Maintenance)
    );
    let (subject, is_equipment) = match (&ctx.last_chemical, &ctx.last_equipment) {
        (_, Some(e)) if prefer_equipment => (e.clone(), true),
        (Some(c), _) => (c.clone(), false),
        (None, Some(e)) => (e.clone(), true),
        (None, None) => {
            return Reply::new("Okay. What else can I help you with?")
                .with_suggestions(&["help"])
        }
    };

    let m = turn.message;
    if has_any(m, &["safety", "safe", "hazard", "hazards"]) {
        return safety_for(turn, ctx, &subject);
    }
    if has_any(m, &["stock", "available", "availability", "much", "left", "bookings", "booked", "when"]) {
        if is_equipment {
            return match turn.data.find_equipment(&subject) {
                Fetched::Loaded(Some(item)) => equipment_status(turn, ctx, &item),
                Fetched::Loaded(None) => Reply::new(format!("{} is no longer in the inventory.", subject)),
                Fetched::Unavailable => unavailable(&format!("\"{}\"", subject)),
            };
        }
        return chemical_stock(turn, ctx, &subject);
    }
    if is_negative(m) || (is_affirmative(m) && !has_any(m, &["more", "details", "where"])) {
        return Reply::new("Okay. What else can I help you with?");
    }
    details_for(turn, ctx, &subject, !is_equipment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative_and_negative_words() {
        assert!(is_affirmative("yes please"));
        assert!(is_affirmative("ok"));
        assert!(is_affirmative("sounds good"));
        assert!(is_negative("not now"));
        assert!(!is_affirmative("yes, no, cancel that"));
        assert!(is_negative("no thanks"));
        assert!(is_negative("don&#x27;t"));
        assert!(!is_negative("notebook"));
    }
}
