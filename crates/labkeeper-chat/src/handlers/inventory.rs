//! Details, availability, alerts, and maintenance.

use chrono::Duration;

use labkeeper_core::types::{Chemical, Equipment};

use super::{bulleted, describe_chemical, describe_equipment, status_label, unavailable, Reply, Turn};
use crate::context::{ChatContext, Topic};
use crate::error::ChatError;
use crate::extract::extract_subject;
use crate::facade::Fetched;

const LIST_LIMIT: usize = 10;

/// Subject named in the message, else the one carried in context.
pub(super) fn subject_or(turn: &Turn<'_>, fallback: Option<&String>) -> String {
    let subject = extract_subject(turn.message);
    if subject.is_empty() {
        fallback.cloned().unwrap_or_default()
    } else {
        subject
    }
}

const REFERRING_WORDS: &[&str] = &["it", "its", "that", "this", "them", "left", "remaining"];

/// Whether a subject-less question points at the item last discussed.
pub(super) fn refers_back(message: &str) -> bool {
    message
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| REFERRING_WORDS.contains(&w))
}

pub(super) fn ask_which(ctx: &mut ChatContext, topic: Topic, prompt: &str) -> Reply {
    ctx.awaiting_clarification = true;
    ctx.last_topic = Some(topic);
    Reply::new(prompt)
}

pub(super) fn not_found(kind: &str, name: &str) -> Reply {
    Reply::new(format!(
        "I couldn't find any {} matching \"{}\" in the inventory.",
        kind, name
    ))
    .with_suggestions(&["What chemicals are available?", "What equipment is available?"])
}

pub(super) fn chemical_details(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let subject = subject_or(turn, ctx.last_chemical.as_ref());
    if subject.is_empty() {
        return Ok(ask_which(
            ctx,
            Topic::Chemicals,
            "Which chemical would you like details for?",
        ));
    }
    Ok(details_for(turn, ctx, &subject, true))
}

pub(super) fn equipment_details(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let subject = subject_or(turn, ctx.last_equipment.as_ref());
    if subject.is_empty() {
        return Ok(ask_which(
            ctx,
            Topic::Equipment,
            "Which piece of equipment would you like details for?",
        ));
    }
    Ok(details_for(turn, ctx, &subject, false))
}

/// Resolve `subject` as a chemical or an equipment item, preferred kind
/// first, and describe whichever matches.
pub(super) fn details_for(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
    subject: &str,
    chemical_first: bool,
) -> Reply {
    let data = turn.data;
    let (chemical, equipment) = if chemical_first {
        let chemical = data.find_chemical(subject);
        if let Fetched::Loaded(Some(_)) = chemical {
            (chemical, Fetched::Loaded(None))
        } else {
            (chemical, data.find_equipment(subject))
        }
    } else {
        let equipment = data.find_equipment(subject);
        if let Fetched::Loaded(Some(_)) = equipment {
            (Fetched::Loaded(None), equipment)
        } else {
            (data.find_chemical(subject), equipment)
        }
    };

    match (chemical, equipment) {
        (Fetched::Loaded(Some(c)), _) => {
            ctx.awaiting_clarification = false;
            ctx.remember_chemical(&c.name);
            Reply::new(describe_chemical(&c, data.low_stock_threshold())).with_suggestions(&[
                "What about its safety?",
                "Is it in stock?",
            ])
        }
        (_, Fetched::Loaded(Some(e))) => {
            ctx.awaiting_clarification = false;
            ctx.remember_equipment(&e.name);
            Reply::new(describe_equipment(&e)).with_suggestions(&[
                "Is it available this week?",
                "When is maintenance due?",
            ])
        }
        (Fetched::Loaded(None), Fetched::Loaded(None)) => {
            not_found(if chemical_first { "chemical" } else { "equipment" }, subject)
        }
        _ => unavailable(&format!("the inventory for \"{}\"", subject)),
    }
}

pub(super) fn chemical_availability(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
) -> Result<Reply, ChatError> {
    let subject = extract_subject(turn.message);
    if !subject.is_empty() {
        return Ok(chemical_stock(turn, ctx, &subject));
    }
    // "how much is left?" right after a chemical was discussed.
    if let Some(last) = ctx.last_chemical.clone() {
        if refers_back(turn.message) {
            return Ok(chemical_stock(turn, ctx, &last));
        }
    }

    ctx.last_topic = Some(Topic::Chemicals);
    let reply = match turn.data.chemicals() {
        Fetched::Unavailable => unavailable("the chemical inventory"),
        Fetched::Loaded(list) if list.is_empty() => Reply::new(
            "There are no chemicals in the inventory right now. \
             Consider a restock: ask a lab technician to add stock or submit a purchase request.",
        )
        .with_suggestions(&["I need to order more chemicals"]),
        Fetched::Loaded(list) => {
            let threshold = turn.data.low_stock_threshold();
            let body = bulleted(&list, LIST_LIMIT, |c: &Chemical| {
                let flag = if c.is_low_stock(threshold) { " (low)" } else { "" };
                format!("- {}: {}{}", c.name, c.quantity_label(), flag)
            });
            Reply::new(format!(
                "{} in the inventory:\n{}",
                super::plural(list.len() as u64, "chemical", "chemicals"),
                body
            ))
            .with_suggestions(&["Any low stock alerts?"])
        }
    };
    Ok(reply)
}

/// Stock line for one named chemical, falling back to equipment status.
pub(super) fn chemical_stock(turn: &Turn<'_>, ctx: &mut ChatContext, subject: &str) -> Reply {
    match turn.data.find_chemical(subject) {
        Fetched::Loaded(Some(c)) => {
            ctx.remember_chemical(&c.name);
            let mut text = if c.quantity > 0.0 {
                format!("Yes, {} is available: {} in stock", c.name, c.quantity_label())
            } else {
                format!("{} is out of stock", c.name)
            };
            if let Some(ref location) = c.storage_location {
                text.push_str(&format!(" ({})", location));
            }
            text.push('.');
            if c.is_low_stock(turn.data.low_stock_threshold()) {
                text.push_str(" Stock is low; consider restocking.");
            }
            Reply::new(text)
        }
        Fetched::Loaded(None) => match turn.data.find_equipment(subject) {
            Fetched::Loaded(Some(e)) => equipment_status(turn, ctx, &e),
            Fetched::Loaded(None) => not_found("chemical", subject),
            Fetched::Unavailable => unavailable("the inventory"),
        },
        Fetched::Unavailable => unavailable(&format!("the stock of \"{}\"", subject)),
    }
}

pub(super) fn equipment_availability(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
) -> Result<Reply, ChatError> {
    let subject = extract_subject(turn.message);
    if !subject.is_empty() {
        let reply = match turn.data.find_equipment(subject.as_str()) {
            Fetched::Loaded(Some(e)) => equipment_status(turn, ctx, &e),
            Fetched::Loaded(None) => not_found("equipment", &subject),
            Fetched::Unavailable => unavailable(&format!("\"{}\"", subject)),
        };
        return Ok(reply);
    }

    ctx.last_topic = Some(Topic::Equipment);
    let reply = match turn.data.equipment() {
        Fetched::Unavailable => unavailable("the equipment list"),
        Fetched::Loaded(list) if list.is_empty() => {
            Reply::new("There is no equipment registered in the inventory yet.")
        }
        Fetched::Loaded(list) => {
            let ready = list.iter().filter(|e| e.status.is_bookable()).count();
            let body = bulleted(&list, LIST_LIMIT, |e| {
                format!("- {}: {}", e.name, status_label(e))
            });
            Reply::new(format!(
                "{} of {} equipment items can be booked:\n{}",
                ready,
                list.len(),
                body
            ))
        }
    };
    Ok(reply)
}

/// Status plus upcoming bookings for one item.
pub(super) fn equipment_status(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
    item: &Equipment,
) -> Reply {
    ctx.remember_equipment(&item.name);
    if !item.status.is_bookable() {
        return Reply::new(format!(
            "{} is currently {} and cannot be booked.",
            item.name,
            status_label(item)
        ));
    }
    let until = turn.today + Duration::days(turn.booking_window_days);
    match turn.data.equipment_conflicts(item.id, turn.today, until) {
        Fetched::Loaded(bookings) if bookings.is_empty() => {
            let mut text = format!(
                "{} is {} with no bookings in the next {} days.",
                item.name,
                status_label(item),
                turn.booking_window_days
            );
            if let Fetched::Loaded(recent) = turn.data.recent_bookings(item.id, 1) {
                if let Some(last) = recent.first() {
                    text.push_str(&format!(
                        " Most recent booking: {} to {} ({}).",
                        last.start_date, last.end_date, last.status
                    ));
                }
            }
            Reply::new(text).with_suggestions(&["Book it for tomorrow"])
        }
        Fetched::Loaded(bookings) => Reply::new(format!(
            "{} is {}, with these bookings in the next {} days:\n{}",
            item.name,
            status_label(item),
            turn.booking_window_days,
            bulleted(&bookings, LIST_LIMIT, |b| format!(
                "- {} to {} ({})",
                b.start_date, b.end_date, b.status
            ))
        )),
        Fetched::Unavailable => Reply::new(format!(
            "{} is {}, but I couldn't check its bookings just now.",
            item.name,
            status_label(item)
        )),
    }
}

pub(super) fn alerts(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::Alerts);
    let data = turn.data;
    let low = data.low_stock_chemicals();
    let expiring = data.expiring_chemicals(turn.today);
    let expired = data.expired_chemicals(turn.today);

    if low.is_unavailable() && expiring.is_unavailable() && expired.is_unavailable() {
        return Ok(unavailable("inventory alerts"));
    }

    let mut sections = Vec::new();
    let mut any = false;
    match low {
        Fetched::Loaded(list) if !list.is_empty() => {
            any = true;
            sections.push(format!(
                "Low stock:\n{}",
                bulleted(&list, LIST_LIMIT, |c| format!("- {}: {}", c.name, c.quantity_label()))
            ));
        }
        Fetched::Loaded(_) => {}
        Fetched::Unavailable => sections.push("Low stock: couldn't check.".to_string()),
    }
    match expiring {
        Fetched::Loaded(list) if !list.is_empty() => {
            any = true;
            sections.push(format!(
                "Expiring soon:\n{}",
                bulleted(&list, LIST_LIMIT, |c| format!(
                    "- {}: expires {}",
                    c.name,
                    c.expiration_date.map(|d| d.to_string()).unwrap_or_default()
                ))
            ));
        }
        Fetched::Loaded(_) => {}
        Fetched::Unavailable => sections.push("Expiring soon: couldn't check.".to_string()),
    }
    match expired {
        Fetched::Loaded(list) if !list.is_empty() => {
            any = true;
            sections.push(format!(
                "Expired:\n{}",
                bulleted(&list, LIST_LIMIT, |c| format!(
                    "- {}: expired {}",
                    c.name,
                    c.expiration_date.map(|d| d.to_string()).unwrap_or_default()
                ))
            ));
        }
        Fetched::Loaded(_) => {}
        Fetched::Unavailable => sections.push("Expired: couldn't check.".to_string()),
    }

    if turn.role.manages_inventory() {
        match data.pending_borrowings(LIST_LIMIT) {
            Fetched::Loaded(list) if !list.is_empty() => {
                sections.push(format!(
                    "Awaiting approval:\n{}",
                    bulleted(&list, LIST_LIMIT, |b| format!(
                        "- {}: {} to {}",
                        b.item_name, b.start_date, b.end_date
                    ))
                ));
            }
            Fetched::Loaded(_) => {}
            Fetched::Unavailable => {
                sections.push("Awaiting approval: couldn't check.".to_string())
            }
        }
    }

    if !any && sections.is_empty() {
        return Ok(Reply::new(
            "No inventory alerts: nothing is low on stock, expiring soon, or expired.",
        ));
    }

    let call_to_action = if !any {
        ""
    } else if turn.role.manages_inventory() {
        "\nConsider restocking low items and disposing of expired stock."
    } else {
        "\nPlease let a lab technician know about these items."
    };
    Ok(Reply::new(format!("{}{}", sections.join("\n"), call_to_action))
        .with_suggestions(&["I need to order more of the low items"]))
}

pub(super) fn maintenance(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let data = turn.data;
    let subject = extract_subject(turn.message);
    if !subject.is_empty() {
        if let Fetched::Loaded(Some(item)) = data.find_equipment(&subject) {
            ctx.remember_equipment(&item.name);
            ctx.last_topic = Some(Topic::Maintenance);
            return Ok(Reply::new(describe_equipment(&item)));
        }
    }

    ctx.last_topic = Some(Topic::Maintenance);
    let due = data.maintenance_due(turn.today);
    let calibration = data.calibration_due(turn.today);
    if due.is_unavailable() && calibration.is_unavailable() {
        return Ok(unavailable("the maintenance schedule"));
    }

    let mut sections = Vec::new();
    match due {
        Fetched::Loaded(list) if list.is_empty() => {
            sections.push("No equipment is due for maintenance.".to_string())
        }
        Fetched::Loaded(list) => sections.push(format!(
            "Due for maintenance:\n{}",
            bulleted(&list, LIST_LIMIT, |e| {
                let when = e
                    .next_maintenance()
                    .map(|d| format!(", due {}", d))
                    .unwrap_or_default();
                format!("- {} ({}{})", e.name, status_label(e), when)
            })
        )),
        Fetched::Unavailable => sections.push("Maintenance: couldn't check.".to_string()),
    }
    match calibration {
        Fetched::Loaded(list) if list.is_empty() => {
            sections.push("No calibrations are coming up.".to_string())
        }
        Fetched::Loaded(list) => sections.push(format!(
            "Calibration due:\n{}",
            bulleted(&list, LIST_LIMIT, |e| format!(
                "- {}: {}",
                e.name,
                e.calibration_due.map(|d| d.to_string()).unwrap_or_default()
            ))
        )),
        Fetched::Unavailable => sections.push("Calibration: couldn't check.".to_string()),
    }
    Ok(Reply::new(sections.join("\n")))
}
