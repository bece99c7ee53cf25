//! Purchase requests, protocol suggestions, and safety guidance.

use super::inventory::{ask_which, subject_or};
use super::{status_label, unavailable, Reply, Turn};
use crate::context::{ChatContext, PendingAction, Topic};
use crate::error::ChatError;
use crate::extract::{extract_pair, extract_subject};
use crate::facade::Fetched;
use crate::validation::validate_name;

// =============================================================================
// Purchase requests
// =============================================================================

pub(super) fn purchase_request(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let subject = extract_subject(turn.message);
    if subject.is_empty() {
        return Ok(ask_which(
            ctx,
            Topic::Purchase,
            "What would you like to order? Tell me the chemical or item name.",
        ));
    }
    start_purchase(turn, ctx, &subject)
}

/// Open a purchase flow for `subject` and ask for the quantity.
pub(super) fn start_purchase(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
    subject: &str,
) -> Result<Reply, ChatError> {
    let subject = validate_name("item_name", subject)?;
    let (item_name, stock) = match turn.data.find_chemical(subject) {
        Fetched::Loaded(Some(c)) => {
            ctx.remember_chemical(&c.name);
            let stock = format!(" You currently have {}.", c.quantity_label());
            (c.name, stock)
        }
        Fetched::Loaded(None) => (subject.to_string(), String::new()),
        Fetched::Unavailable => (
            subject.to_string(),
            " I couldn't check the current stock.".to_string(),
        ),
    };

    ctx.pending_action = Some(PendingAction::PurchaseRequest {
        item_name: item_name.clone(),
    });
    ctx.awaiting_quantity = true;
    ctx.awaiting_clarification = false;
    ctx.last_topic = Some(Topic::Purchase);

    let ask = if turn.role.manages_inventory() {
        format!(
            "How much {} should I note for the purchase request? Reply with a quantity, e.g. \"5 L\".",
            item_name
        )
    } else {
        format!(
            "Purchase requests are placed by lab technicians. Tell me how much {} you need \
             and I'll prepare a note you can pass on to a technician.",
            item_name
        )
    };
    Ok(Reply::new(format!("{}{}", ask.trim_end(), stock)))
}

// =============================================================================
// Protocols
// =============================================================================

struct Protocol {
    name: &'static str,
    keywords: &'static [&'static str],
    chemicals: &'static [&'static str],
    equipment: &'static [&'static str],
    steps: &'static [&'static str],
}

static PROTOCOLS: &[Protocol] = &[
    Protocol {
        name: "Acid-base titration",
        keywords: &["titrat", "acid-base", "acid base", "neutraliz"],
        chemicals: &["Sodium Hydroxide", "Hydrochloric Acid"],
        equipment: &["Analytical Balance"],
        steps: &[
            "Standardize the sodium hydroxide solution.",
            "Pipette a known volume of acid into a flask and add indicator.",
            "Titrate until the indicator changes colour and record the volume.",
        ],
    },
    Protocol {
        name: "Saline solution preparation",
        keywords: &["saline", "salt solution", "sodium chloride solution", "nacl"],
        chemicals: &["Sodium Chloride"],
        equipment: &["Analytical Balance"],
        steps: &[
            "Weigh 9 g of sodium chloride per litre of solution.",
            "Dissolve in distilled water and make up to volume.",
            "Label with concentration and date.",
        ],
    },
    Protocol {
        name: "Sample centrifugation",
        keywords: &["centrifug", "pellet", "separat"],
        chemicals: &[],
        equipment: &["Centrifuge"],
        steps: &[
            "Balance the tubes by mass before loading.",
            "Close the lid and set speed and time.",
            "Wait for the rotor to stop completely before opening.",
        ],
    },
    Protocol {
        name: "Autoclave sterilization",
        keywords: &["steril", "autoclav"],
        chemicals: &[],
        equipment: &["Autoclave"],
        steps: &[
            "Loosen caps and use autoclave tape on every load.",
            "Run at 121 °C for at least 15 minutes.",
            "Let pressure return to zero before opening.",
        ],
    },
    Protocol {
        name: "Microscope slide preparation",
        keywords: &["microscop", "slide", "stain"],
        chemicals: &["Ethanol"],
        equipment: &["Microscope"],
        steps: &[
            "Clean the slide with ethanol and let it dry.",
            "Place the sample and add a cover slip.",
            "Start at the lowest magnification and focus upward.",
        ],
    },
];

pub(super) fn protocol_suggestion(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::Protocols);
    let matched: Vec<&Protocol> = PROTOCOLS
        .iter()
        .filter(|p| p.keywords.iter().any(|k| turn.message.contains(k)))
        .collect();

    if matched.is_empty() {
        let names: Vec<&str> = PROTOCOLS.iter().map(|p| p.name).collect();
        return Ok(Reply::new(format!(
            "I have guidance for these procedures: {}. Which one do you need?",
            names.join(", ")
        )));
    }

    let sections: Vec<String> = matched.iter().map(|p| describe_protocol(turn, p)).collect();
    Ok(Reply::new(sections.join("\n\n")))
}

fn describe_protocol(turn: &Turn<'_>, protocol: &Protocol) -> String {
    let mut lines = vec![format!("{}:", protocol.name)];
    for (i, step) in protocol.steps.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, step));
    }
    if !protocol.chemicals.is_empty() || !protocol.equipment.is_empty() {
        lines.push("Required items:".to_string());
    }
    for name in protocol.chemicals {
        let state = match turn.data.find_chemical(name) {
            Fetched::Loaded(Some(c)) if c.quantity > 0.0 => format!("in stock ({})", c.quantity_label()),
            Fetched::Loaded(Some(_)) => "out of stock".to_string(),
            Fetched::Loaded(None) => "not in the inventory".to_string(),
            Fetched::Unavailable => "couldn't check".to_string(),
        };
        lines.push(format!("- {}: {}", name, state));
    }
    for name in protocol.equipment {
        let state = match turn.data.find_equipment(name) {
            Fetched::Loaded(Some(e)) => status_label(&e),
            Fetched::Loaded(None) => "not in the inventory".to_string(),
            Fetched::Unavailable => "couldn't check".to_string(),
        };
        lines.push(format!("- {}: {}", name, state));
    }
    lines.join("\n")
}

// =============================================================================
// Safety
// =============================================================================

struct Incompatibility {
    first: &'static [&'static str],
    second: &'static [&'static str],
    reason: &'static str,
}

static INCOMPATIBLE: &[Incompatibility] = &[
    Incompatibility {
        first: &["bleach", "hypochlorite"],
        second: &["ammonia"],
        reason: "together they release toxic chloramine gas",
    },
    Incompatibility {
        first: &["bleach", "hypochlorite"],
        second: &["acid"],
        reason: "together they release chlorine gas",
    },
    Incompatibility {
        first: &["acid"],
        second: &["hydroxide", "base", "alkali", "caustic"],
        reason: "acids and bases react violently and release heat",
    },
    Incompatibility {
        first: &["peroxide", "oxidiz", "nitrate", "permanganate"],
        second: &["ethanol", "methanol", "acetone", "flammable", "solvent"],
        reason: "oxidizers can ignite flammable materials",
    },
];

/// Lower-cased name, category and hazard class of a chemical, or just the
/// typed name when it is not in the inventory.
fn hazard_profile(turn: &Turn<'_>, name: &str) -> (String, String) {
    match turn.data.find_chemical(name) {
        Fetched::Loaded(Some(c)) => {
            let profile = format!(
                "{} {} {}",
                c.name,
                c.category,
                c.hazard_class.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            (c.name, profile)
        }
        _ => (name.to_string(), name.to_lowercase()),
    }
}

fn incompatibility(a: &str, b: &str) -> Option<&'static str> {
    let hits = |profile: &str, words: &[&str]| words.iter().any(|w| profile.contains(w));
    INCOMPATIBLE
        .iter()
        .find(|rule| {
            (hits(a, rule.first) && hits(b, rule.second))
                || (hits(b, rule.first) && hits(a, rule.second))
        })
        .map(|rule| rule.reason)
}

pub(super) fn safety_compatibility(
    turn: &Turn<'_>,
    ctx: &mut ChatContext,
) -> Result<Reply, ChatError> {
    ctx.last_topic = Some(Topic::Safety);
    let Some((first, second)) = extract_pair(turn.message) else {
        return Ok(Reply::new(
            "Which two chemicals would you like me to check? For example: \
             \"can I mix bleach and ammonia?\"",
        ));
    };

    let (first_name, first_profile) = hazard_profile(turn, &first);
    let (second_name, second_profile) = hazard_profile(turn, &second);
    let text = match incompatibility(&first_profile, &second_profile) {
        Some(reason) => format!(
            "Warning: do not mix or store {} with {}; {}. Keep them in separate storage areas.",
            first_name, second_name, reason
        ),
        None => format!(
            "I don't know of an incompatibility between {} and {}, but always check both \
             safety data sheets before mixing or storing them together.",
            first_name, second_name
        ),
    };
    Ok(Reply::new(text))
}

const GENERAL_SAFETY: &str = "General lab safety:\n\
- Wear a lab coat, gloves, and eye protection.\n\
- Know where the eyewash station, shower, and fire extinguisher are.\n\
- Label every container and never return unused chemicals to stock bottles.\n\
- Report spills and broken equipment to a lab technician immediately.";

pub(super) fn safety_info(turn: &Turn<'_>, ctx: &mut ChatContext) -> Result<Reply, ChatError> {
    let fallback = ctx.last_chemical.clone().or_else(|| ctx.last_equipment.clone());
    let subject = subject_or(turn, fallback.as_ref());
    if subject.is_empty() {
        ctx.last_topic = Some(Topic::Safety);
        return Ok(Reply::new(GENERAL_SAFETY)
            .with_suggestions(&["What are the safety details of ethanol?"]));
    }
    Ok(safety_for(turn, ctx, &subject))
}

/// Safety notes for a named chemical or equipment item.
pub(super) fn safety_for(turn: &Turn<'_>, ctx: &mut ChatContext, subject: &str) -> Reply {
    let chemical = turn.data.find_chemical(subject);
    if let Fetched::Loaded(Some(c)) = &chemical {
        ctx.remember_chemical(&c.name);
        ctx.last_topic = Some(Topic::Safety);
        let mut lines = vec![format!("Safety information for {}:", c.name)];
        match c.safety_info {
            Some(ref info) => lines.push(format!("- {}", info)),
            None => lines.push(
                "- No specific safety notes are recorded; follow the safety data sheet."
                    .to_string(),
            ),
        }
        if let Some(ref hazard) = c.hazard_class {
            lines.push(format!("- Hazard class: {}", hazard));
        }
        if let Some(ref location) = c.storage_location {
            lines.push(format!("- Stored at: {}", location));
        }
        return Reply::new(lines.join("\n"));
    }

    match (chemical, turn.data.find_equipment(subject)) {
        (_, Fetched::Loaded(Some(e))) => {
            ctx.remember_equipment(&e.name);
            ctx.last_topic = Some(Topic::Safety);
            let mut text = format!(
                "Safety for {}: read the operating instructions before use, wear appropriate \
                 protective equipment, and report any fault to a technician.",
                e.name
            );
            if !e.status.is_bookable() {
                text.push_str(&format!(
                    " It is currently {}; do not use it until it is released.",
                    status_label(&e)
                ));
            }
            Reply::new(text)
        }
        (Fetched::Loaded(None), Fetched::Loaded(None)) => Reply::new(format!(
            "I couldn't find \"{}\" in the inventory.\n{}",
            subject, GENERAL_SAFETY
        )),
        _ => unavailable(&format!("the safety information for \"{}\"", subject)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatibility_rules_are_symmetric() {
        assert!(incompatibility("bleach", "ammonia").is_some());
        assert!(incompatibility("ammonia", "bleach").is_some());
        assert!(incompatibility("hydrochloric acid acid corrosive", "sodium hydroxide base")
            .unwrap()
            .contains("heat"));
        assert!(incompatibility("hydrogen peroxide oxidizer", "ethanol solvent flammable").is_some());
        assert_eq!(incompatibility("sodium chloride salt", "glucose sugar"), None);
    }

    #[test]
    fn test_protocol_keywords_are_lowercase() {
        for p in PROTOCOLS {
            for k in p.keywords {
                assert_eq!(*k, k.to_lowercase(), "protocol {}", p.name);
            }
        }
    }
}
