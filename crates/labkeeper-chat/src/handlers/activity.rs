//! Schedules, history, help, and the default summary.

use std::collections::HashMap;

use labkeeper_core::types::format_quantity;

use super::inventory::{chemical_stock, details_for, equipment_status};
use super::{bulleted, describe_lecture, plural, unavailable, Reply, Turn};
use crate::context::{ChatContext, Topic};
use crate::error::ChatError;
use crate::extract::{date_hint, extract_subject};
use crate::facade::Fetched;
use crate::router::{asks_about_stock, asks_for_details};

const UPCOMING_LIMIT: usize = 5;
const HISTORY_LIMIT: usize = 10;

pub(super) fn schedule(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::Schedule);
    let reply = match date_hint(turn.message, turn.today)? {
        Some(date) => match turn.data.schedules_on(date) {
            Fetched::Loaded(list) if list.is_empty() => {
                Reply::new(format!("No lectures are scheduled on {}.", date))
            }
            Fetched::Loaded(list) => Reply::new(format!(
                "Lectures on {}:\n{}",
                date,
                bulleted(&list, 20, describe_lecture)
            )),
            Fetched::Unavailable => unavailable("the lecture schedule"),
        },
        None => match turn.data.upcoming_schedules(turn.today, UPCOMING_LIMIT) {
            Fetched::Loaded(list) if list.is_empty() => {
                Reply::new("There are no upcoming lectures on the schedule.")
            }
            Fetched::Loaded(list) => Reply::new(format!(
                "Upcoming lectures:\n{}",
                bulleted(&list, UPCOMING_LIMIT, describe_lecture)
            )),
            Fetched::Unavailable => unavailable("the lecture schedule"),
        },
    };
    Ok(reply)
}

pub(super) fn history(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::History);
    let data = turn.data;

    let usage = data.usage_history(turn.user.id, HISTORY_LIMIT);
    let borrowings = data.borrowings_for(turn.user.id, HISTORY_LIMIT);
    if usage.is_unavailable() && borrowings.is_unavailable() {
        return Ok(unavailable("your history"));
    }

    // Usage rows carry only the chemical id; names come from the cached listing.
    let names: HashMap<i64, (String, String)> = data
        .chemicals()
        .unwrap_or(Vec::new())
        .into_iter()
        .map(|c| (c.id, (c.name, c.unit)))
        .collect();

    let mut sections = Vec::new();
    match usage {
        Fetched::Loaded(list) if list.is_empty() => {
            sections.push("You haven't logged any chemical usage.".to_string())
        }
        Fetched::Loaded(list) => sections.push(format!(
            "Recent chemical usage:\n{}",
            bulleted(&list, HISTORY_LIMIT, |u| {
                let (name, unit) = names
                    .get(&u.chemical_id)
                    .cloned()
                    .unwrap_or_else(|| (format!("chemical #{}", u.chemical_id), String::new()));
                format!(
                    "- {}: used {} on {}{}",
                    name,
                    format_quantity(u.quantity_used, &unit),
                    u.used_at.format("%Y-%m-%d"),
                    u.purpose
                        .as_deref()
                        .map(|p| format!(" ({})", p))
                        .unwrap_or_default()
                )
            })
        )),
        Fetched::Unavailable => sections.push("Chemical usage: couldn't check.".to_string()),
    }
    match borrowings {
        Fetched::Loaded(list) if list.is_empty() => {
            sections.push("You haven't borrowed anything yet.".to_string())
        }
        Fetched::Loaded(list) => sections.push(format!(
            "Recent borrowing requests:\n{}",
            bulleted(&list, HISTORY_LIMIT, |b| format!(
                "- {}: {} to {} ({})",
                b.item_name, b.start_date, b.end_date, b.status
            ))
        )),
        Fetched::Unavailable => sections.push("Borrowing requests: couldn't check.".to_string()),
    }
    Ok(Reply::new(sections.join("\n")))
}

pub(super) fn help(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::Help);
    let mut lines = vec![
        format!("Hi {}! I can help you with:", turn.user.name),
        "- Chemical and equipment details (\"details of sodium chloride\")".to_string(),
        "- Stock and availability (\"is ethanol available?\")".to_string(),
        "- Equipment bookings (\"book the centrifuge for tomorrow\")".to_string(),
        "- Borrowing requests and their status".to_string(),
        "- Safety information and chemical compatibility".to_string(),
        "- Protocols, lecture schedules, and your usage history".to_string(),
    ];
    if turn.role.manages_inventory() {
        lines.push("- Low stock, expiry, maintenance, and calibration alerts".to_string());
        lines.push("- Purchase requests for restocking".to_string());
    } else {
        lines.push("- Inventory alerts and purchase notes for a technician".to_string());
    }
    Ok(Reply::new(lines.join("\n")).with_suggestions(&[
        "What chemicals are available?",
        "Any low stock alerts?",
        "What lectures are scheduled today?",
    ]))
}

/// Default reply: a live overview of the lab.
/// "details of glycerol" or "is the vortex free?" name an item the keyword
/// tables don't know. Answer it when the inventory has it.
fn named_item(turn: &Turn<'_>, ctx: &mut ChatContext) -> Option<Reply> {
    let wants_details = asks_for_details(turn.message);
    let wants_stock = asks_about_stock(turn.message);
    if !wants_details && !wants_stock {
        return None;
    }
    let subject = extract_subject(turn.message);
    if subject.is_empty() {
        return None;
    }

    if let Fetched::Loaded(Some(_)) = turn.data.find_chemical(&subject) {
        return Some(if wants_details {
            details_for(turn, ctx, &subject, true)
        } else {
            chemical_stock(turn, ctx, &subject)
        });
    }
    match turn.data.find_equipment(&subject) {
        Fetched::Loaded(Some(item)) if !wants_details => Some(equipment_status(turn, ctx, &item)),
        Fetched::Loaded(Some(_)) => Some(details_for(turn, ctx, &subject, false)),
        _ => None,
    }
}

pub(super) fn summary(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    if let Some(reply) = named_item(turn, ctx) {
        return Ok(reply);
    }

    let data = turn.data;
    let count = |fetched: Fetched<u64>, one: &str, many: &str| match fetched {
        Fetched::Loaded(n) => plural(n, one, many),
        Fetched::Unavailable => format!("an unknown number of {}", many),
    };

    let chemicals = count(data.count_chemicals(), "chemical", "chemicals");
    let equipment = count(data.count_equipment(), "equipment item", "equipment items");
    let lectures = count(
        data.schedules_on(turn.today).map(|l| l.len() as u64),
        "lecture",
        "lectures",
    );
    let pending = count(
        data.count_pending(Some(turn.user.id)),
        "pending request",
        "pending requests",
    );

    Ok(Reply::new(format!(
        "I'm not sure what you're asking, so here is a quick overview. \
         The lab has {} and {} in the inventory, {} scheduled today, \
         and you have {}. Type \"help\" to see what I can do.",
        chemicals, equipment, lectures, pending
    ))
    .with_suggestions(&["help", "What chemicals are available?"]))
}
