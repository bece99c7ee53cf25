//! Benchmarks for intent routing.
//!
//! Routing runs on every message before any database work, so it should
//! stay well under a millisecond even for messages that fall through every
//! row of the table to the default summary.

use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};

use labkeeper_chat::context::{ChatContext, PendingAction};
use labkeeper_chat::router::route;

/// Typical messages, lower-cased as the router sees them.
const MESSAGES: &[&str] = &[
    "what are the details of sodium chloride?",
    "is ethanol available?",
    "what equipment is available this week?",
    "any low stock alerts?",
    "when is the centrifuge due for calibration?",
    "book the centrifuge for tomorrow",
    "i need to order more acetone",
    "how do i prepare a buffer solution?",
    "can i mix bleach and ammonia?",
    "i want to borrow the ph meter",
    "what is the status of my borrowing request?",
    "what lectures are scheduled on friday?",
    "what about its safety?",
    "show my usage history",
    "help",
];

/// A long message that matches no row and reaches the default.
fn unmatched_message() -> String {
    "please summarise everything that happened in the teaching laboratory ".repeat(12)
}

fn bench_route(c: &mut Criterion) {
    let empty = ChatContext::default();
    let mut pending = ChatContext::default();
    pending.pending_action = Some(PendingAction::PurchaseRequest {
        item_name: "acetone".to_string(),
    });
    pending.awaiting_quantity = true;
    let fallthrough = unmatched_message();

    // Compile the keyword patterns outside the measurement.
    route("warm up", &empty);

    let mut group = c.benchmark_group("intent_routing");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("typical_messages", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let intent = route(MESSAGES[idx % MESSAGES.len()], &empty);
            idx += 1;
            intent
        });
    });

    group.bench_function("follow_up_with_context", |b| {
        b.iter(|| route("5 l", &pending));
    });

    group.bench_function("fallthrough_to_summary", |b| {
        b.iter(|| route(&fallthrough, &empty));
    });

    group.finish();
}

/// p95 latency check over the typical messages.
fn bench_route_latency(_c: &mut Criterion) {
    let ctx = ChatContext::default();
    let target = Duration::from_micros(1000);

    let mut times = Vec::with_capacity(MESSAGES.len() * 100);
    for _ in 0..100 {
        for message in MESSAGES {
            let start = Instant::now();
            let _intent = route(message, &ctx);
            times.push(start.elapsed());
        }
    }
    times.sort();
    let p95 = times[times.len() * 95 / 100];
    let median = times[times.len() / 2];

    eprintln!("\n=== Intent routing latency ({} calls) ===", times.len());
    eprintln!("Median:  {:?}", median);
    eprintln!("p95:     {:?} (target: {:?})", p95, target);

    assert!(
        p95 < target,
        "Routing p95 {:?} exceeds target {:?}",
        p95,
        target
    );
}

criterion_group!(benches, bench_route, bench_route_latency);
criterion_main!(benches);
