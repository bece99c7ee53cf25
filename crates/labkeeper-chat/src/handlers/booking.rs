//! Equipment booking and borrowing requests.

use chrono::Duration;

use super::inventory::{ask_which, not_found, subject_or};
use super::{bulleted, plural, status_label, unavailable, Reply, Turn};
use crate::context::{ChatContext, PendingAction, Topic};
use crate::error::ChatError;
use crate::extract::{date_hint, extract_subject};
use crate::facade::Fetched;

pub(super) fn equipment_booking(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let subject = subject_or(turn, ctx.last_equipment.as_ref());
    if subject.is_empty() {
        return Ok(ask_which(
            ctx,
            Topic::Booking,
            "Which piece of equipment would you like to book?",
        ));
    }

    let date = date_hint(turn.message, turn.today)?;
    let (from, to, when) = match date {
        Some(d) => (d, d, format!("on {}", d)),
        None => (
            turn.today,
            turn.today + Duration::days(turn.booking_window_days),
            format!("over the next {} days", turn.booking_window_days),
        ),
    };

    let item = match turn.data.find_equipment(&subject) {
        Fetched::Loaded(Some(item)) => item,
        Fetched::Loaded(None) => return Ok(not_found("equipment", &subject)),
        Fetched::Unavailable => return Ok(unavailable(&format!("\"{}\"", subject))),
    };
    ctx.remember_equipment(&item.name);
    ctx.last_topic = Some(Topic::Booking);
    ctx.awaiting_clarification = false;

    if !item.status.is_bookable() {
        let next = item
            .next_maintenance()
            .filter(|d| *d > turn.today)
            .map(|d| format!(" Its next maintenance is due {}.", d))
            .unwrap_or_default();
        return Ok(Reply::new(format!(
            "{} is currently {} and cannot be booked.{}",
            item.name,
            status_label(&item),
            next
        ))
        .with_suggestions(&["What equipment is available?"]));
    }

    let reply = match turn.data.equipment_conflicts(item.id, from, to) {
        Fetched::Loaded(conflicts) if conflicts.is_empty() => {
            ctx.pending_action = Some(PendingAction::BookEquipment {
                equipment_name: item.name.clone(),
            });
            Reply::new(format!(
                "{} is available {}. Please tell me the date, start time, and duration \
                 you need, and confirm with \"yes\" to go ahead with a booking request.",
                item.name, when
            ))
        }
        Fetched::Loaded(conflicts) => Reply::new(format!(
            "{} is already booked {}:\n{}\nWould you like to try a different date?",
            item.name,
            when,
            bulleted(&conflicts, 10, |b| format!(
                "- {} to {} ({})",
                b.start_date, b.end_date, b.status
            ))
        ))
        .with_suggestions(&["Book it for next week"]),
        Fetched::Unavailable => unavailable(&format!("the bookings for {}", item.name)),
    };
    Ok(reply)
}

pub(super) fn borrowing_create(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let subject = extract_subject(turn.message);
    if subject.is_empty() {
        return Ok(ask_which(
            ctx,
            Topic::Borrowing,
            "What would you like to borrow? Tell me the chemical or equipment name.",
        ));
    }
    Ok(offer_borrowing(turn, ctx, &subject))
}

/// Look up `subject` and, if it can be lent, ask for confirmation.
pub(super) fn offer_borrowing(turn: &Turn<'_>, ctx: &mut ChatContext, subject: &str) -> Reply {
    ctx.last_topic = Some(Topic::Borrowing);
    let data = turn.data;

    let chemical = data.find_chemical(subject);
    if let Fetched::Loaded(Some(c)) = &chemical {
        ctx.remember_chemical(&c.name);
        ctx.last_topic = Some(Topic::Borrowing);
        ctx.awaiting_clarification = false;
        if c.quantity <= 0.0 {
            return Reply::new(format!("{} is out of stock, so it can't be borrowed right now.", c.name));
        }
        ctx.pending_action = Some(PendingAction::BorrowItem {
            item_name: c.name.clone(),
        });
        return Reply::new(format!(
            "{} has {} available. Would you like to request some? Reply \"yes\" to continue or \"no\" to cancel.",
            c.name,
            c.quantity_label()
        ));
    }

    let equipment = data.find_equipment(subject);
    match (chemical, equipment) {
        (_, Fetched::Loaded(Some(e))) => {
            ctx.remember_equipment(&e.name);
            ctx.last_topic = Some(Topic::Borrowing);
            ctx.awaiting_clarification = false;
            if !e.status.is_bookable() {
                return Reply::new(format!(
                    "{} is currently {} and can't be borrowed.",
                    e.name,
                    status_label(&e)
                ));
            }
            ctx.pending_action = Some(PendingAction::BorrowItem {
                item_name: e.name.clone(),
            });
            Reply::new(format!(
                "{} is {}. Would you like to request it? Reply \"yes\" to continue or \"no\" to cancel.",
                e.name,
                status_label(&e)
            ))
        }
        (Fetched::Loaded(None), Fetched::Loaded(None)) => not_found("item", subject),
        _ => unavailable(&format!("\"{}\"", subject)),
    }
}

pub(super) fn borrowing_status(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::Borrowing);
    let mine = match turn.data.borrowings_for(turn.user.id, 10) {
        Fetched::Unavailable => return Ok(unavailable("your borrowing requests")),
        Fetched::Loaded(list) if list.is_empty() => {
            "You don't have any borrowing requests.".to_string()
        }
        Fetched::Loaded(list) => format!(
            "Your borrowing requests:\n{}",
            bulleted(&list, 10, |b| format!(
                "- {}: {} to {} ({})",
                b.item_name, b.start_date, b.end_date, b.status
            ))
        ),
    };

    if !turn.role.manages_inventory() {
        return Ok(Reply::new(mine));
    }
    let queue = match turn.data.count_pending(None) {
        Fetched::Loaded(0) => "No requests are waiting for review.".to_string(),
        Fetched::Loaded(n) => format!(
            "{} awaiting review.",
            plural(n, "request is", "requests are")
        ),
        Fetched::Unavailable => "I couldn't check the review queue just now.".to_string(),
    };
    Ok(Reply::new(format!("{}\n{}", mine, queue)))
}
