/*!
 * Tracking Policies
 * Observers for allocation records; none of them can fail the caller
 */

use super::traits::MemoryTracking;
use super::types::{AllocationEvent, AllocationRecord};
use crate::core::limits::{DEFAULT_JOURNAL_CAPACITY, TRACKING_CHANNEL};
use crate::core::types::Channel;
use crate::monitoring::{LogDispatcher, LogLevel};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracking;

impl MemoryTracking for NoTracking {
    #[inline]
    fn record(&mut self, _record: &AllocationRecord) {}
}

/// Emits each record as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracking;

impl MemoryTracking for TracingTracking {
    fn record(&mut self, record: &AllocationRecord) {
        debug!(
            event = %record.event,
            address = record.address,
            end = record.end(),
            payload = record.payload,
            size = record.requested_size,
            internal_size = record.internal_size,
            type_name = record.type_name,
            count = record.count,
            file = record.file,
            line = record.line,
            "allocation record"
        );
    }
}

/// Keeps a copy of the most recent records in memory
#[derive(Debug, Clone)]
pub struct JournalTracking {
    records: VecDeque<AllocationRecord>,
    capacity: Option<usize>,
    dropped: usize,
}

impl JournalTracking {
    /// Journal that never forgets
    ///
    /// Memory grows by one record per allocate/release for as long as the
    /// manager lives. Use `bounded` (or `Default`, capped at
    /// `DEFAULT_JOURNAL_CAPACITY`) for anything long-running.
    pub fn unbounded() -> Self {
        Self {
            records: VecDeque::new(),
            capacity: None,
            dropped: 0,
        }
    }

    /// Journal keeping at most `capacity` records, oldest evicted first
    pub fn bounded(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_JOURNAL_CAPACITY)),
            capacity: Some(capacity),
            dropped: 0,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&AllocationRecord> {
        self.records.back()
    }

    /// Records evicted because the journal was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn count(&self, event: AllocationEvent) -> usize {
        self.records.iter().filter(|r| r.event == event).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for JournalTracking {
    fn default() -> Self {
        Self::bounded(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl MemoryTracking for JournalTracking {
    fn record(&mut self, record: &AllocationRecord) {
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                self.dropped += 1;
                return;
            }
            if self.records.len() == capacity {
                self.records.pop_front();
                self.dropped += 1;
            }
        }
        self.records.push_back(record.clone());
    }
}

/// Writes each record as a free-text line through a `LogDispatcher`
#[derive(Debug, Clone)]
pub struct DispatchTracking {
    dispatcher: Arc<LogDispatcher>,
    channel: Channel,
    level: LogLevel,
}

impl DispatchTracking {
    /// Log on the tracking channel at debug level
    pub fn new(dispatcher: Arc<LogDispatcher>) -> Self {
        Self {
            dispatcher,
            channel: TRACKING_CHANNEL,
            level: LogLevel::Debug,
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn dispatcher(&self) -> &Arc<LogDispatcher> {
        &self.dispatcher
    }
}

impl MemoryTracking for DispatchTracking {
    fn record(&mut self, record: &AllocationRecord) {
        self.dispatcher
            .log(self.channel, self.level, &record.to_string());
    }
}
