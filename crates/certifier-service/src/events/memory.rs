//! In-memory event log
//!
//! Default backend. Suitable for development and single-instance
//! deployments. Holds a bounded window of the most recent events; older
//! events are dropped, and sequence numbers keep counting. Events are lost
//! on restart.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::debug;

use super::{
    CertificationEvent, EventLog, EventLogError, LoggedEvent, DEFAULT_EVENT_LOG_CAPACITY,
    MAX_RECENT_EVENTS,
};

#[derive(Debug, Default)]
struct Ring {
    events: VecDeque<LoggedEvent>,
    last_sequence: u64,
}

/// In-memory event log implementation
#[derive(Debug)]
pub struct MemoryEventLog {
    ring: RwLock<Ring>,
    capacity: usize,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_LOG_CAPACITY)
    }

    /// Keep at most `capacity` events, never fewer than `MAX_RECENT_EVENTS`
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MAX_RECENT_EVENTS);
        Self {
            ring: RwLock::new(Ring {
                events: VecDeque::with_capacity(capacity),
                last_sequence: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events currently held
    pub fn held(&self) -> usize {
        self.ring.read().unwrap().events.len()
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn record(&self, event: CertificationEvent) -> Result<u64, EventLogError> {
        let mut ring = self.ring.write().unwrap();
        ring.last_sequence += 1;
        let sequence = ring.last_sequence;
        debug!(sequence, outcome = ?event.outcome, message = %event.message, "Recorded event");

        if ring.events.len() == self.capacity {
            ring.events.pop_front();
        }
        ring.events.push_back(LoggedEvent { sequence, event });
        Ok(sequence)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<LoggedEvent>, EventLogError> {
        let ring = self.ring.read().unwrap();
        let start = ring.events.len().saturating_sub(limit);
        Ok(ring.events.range(start..).cloned().collect())
    }

    async fn count(&self) -> Result<u64, EventLogError> {
        Ok(self.ring.read().unwrap().last_sequence)
    }
}
