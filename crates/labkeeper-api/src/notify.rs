//! Schedule change notifications for server-sent event clients.
//!
//! Each open `/schedules/stream` connection registers a channel with the
//! [`ConnectionRegistry`]. The registration is dropped together with the
//! response stream, so a closed connection deregisters itself. Shutdown
//! drops every sender, which ends all open streams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use labkeeper_core::types::{LectureSchedule, ScheduleStatus};

/// Payload sent to stream clients when a lecture changes status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub schedule_id: i64,
    pub title: String,
    pub lecture_date: NaiveDate,
    pub room: String,
    pub status: ScheduleStatus,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleEvent {
    pub fn status_changed(schedule: &LectureSchedule) -> Self {
        Self {
            schedule_id: schedule.id,
            title: schedule.title.clone(),
            lecture_date: schedule.lecture_date,
            room: schedule.room.clone(),
            status: schedule.status,
            updated_at: Utc::now(),
        }
    }
}

/// Open stream connections, keyed by a per-connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    clients: Mutex<HashMap<u64, mpsc::UnboundedSender<ScheduleEvent>>>,
    closed: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<ScheduleEvent>>> {
        // The map stays consistent even if a holder panicked.
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a connection. Returns `None` once the registry has shut down.
    pub fn register(self: &Arc<Self>) -> Option<Registration> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients().insert(id, tx);
        debug!(connection_id = id, "Schedule stream client connected");
        Some(Registration {
            id,
            registry: Arc::clone(self),
            events: Some(rx),
        })
    }

    pub fn deregister(&self, id: u64) {
        if self.clients().remove(&id).is_some() {
            debug!(connection_id = id, "Schedule stream client disconnected");
        }
    }

    /// Send `event` to every open connection and return how many received it.
    /// Connections whose receiver is gone are removed.
    pub fn broadcast(&self, event: &ScheduleEvent) -> usize {
        let mut clients = self.clients();
        clients.retain(|_, tx| tx.send(event.clone()).is_ok());
        clients.len()
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every connection and refuse new ones.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = {
            let mut clients = self.clients();
            let n = clients.len();
            clients.clear();
            n
        };
        info!(connections = dropped, "Schedule stream registry shut down");
    }
}

/// A live registration. Dropping it removes the connection from the registry.
pub struct Registration {
    id: u64,
    registry: Arc<ConnectionRegistry>,
    events: Option<mpsc::UnboundedReceiver<ScheduleEvent>>,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take the receiving end of the connection's channel.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ScheduleEvent>> {
        self.events.take()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
