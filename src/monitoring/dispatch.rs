/*!
 * Log Dispatcher
 *
 * Explicitly constructed fan-out point for loggers. Create one at startup,
 * share it by reference or `Arc`, and flush it at shutdown (dropping it
 * flushes too). Messages are only delivered on registered channels.
 */

use super::logger::{LogEntry, LogLevel, LogSink};
use crate::core::limits::TRACKING_CHANNEL;
use crate::core::types::Channel;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::warn;

/// Handle returned by `add_logger`, used to remove the logger later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoggerId(u64);

struct DispatcherInner {
    channels: BTreeSet<Channel>,
    loggers: Vec<(LoggerId, Box<dyn LogSink>)>,
    next_id: u64,
}

/// Channel-filtered dispatcher fanning messages out to its loggers
pub struct LogDispatcher {
    inner: Mutex<DispatcherInner>,
}

impl LogDispatcher {
    /// New dispatcher with the tracking channel pre-registered
    pub fn new() -> Self {
        let mut channels = BTreeSet::new();
        channels.insert(TRACKING_CHANNEL);
        Self {
            inner: Mutex::new(DispatcherInner {
                channels,
                loggers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Open a channel for delivery
    ///
    /// Returns `false` (and reports it on the tracking channel) if the
    /// channel was already registered.
    pub fn register_channel(&self, channel: Channel) -> bool {
        let inserted = self.inner.lock().channels.insert(channel);
        if !inserted {
            warn!(channel, "Log channel already registered");
            self.log(
                TRACKING_CHANNEL,
                LogLevel::Error,
                &format!("Channel {} already taken", channel),
            );
        }
        inserted
    }

    pub fn is_registered(&self, channel: Channel) -> bool {
        self.inner.lock().channels.contains(&channel)
    }

    /// Attach a logger; it receives every message from now on
    pub fn add_logger<S: LogSink + 'static>(&self, sink: S) -> LoggerId {
        let mut inner = self.inner.lock();
        let id = LoggerId(inner.next_id);
        inner.next_id += 1;
        inner.loggers.push((id, Box::new(sink)));
        id
    }

    /// Detach a logger, flushing it first
    pub fn remove_logger(&self, id: LoggerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(position) = inner.loggers.iter().position(|(lid, _)| *lid == id) else {
            return false;
        };
        let (_, mut sink) = inner.loggers.remove(position);
        if let Err(e) = sink.flush() {
            warn!(error = %e, "Failed to flush removed logger");
        }
        true
    }

    pub fn logger_count(&self) -> usize {
        self.inner.lock().loggers.len()
    }

    /// Deliver a message to every logger
    ///
    /// Unregistered channels are dropped silently. Logger I/O errors are
    /// reported through `tracing` and never reach the caller.
    pub fn log(&self, channel: Channel, level: LogLevel, message: &str) {
        let mut inner = self.inner.lock();
        if !inner.channels.contains(&channel) {
            return;
        }

        let entry = LogEntry {
            channel,
            level,
            message,
        };
        for (id, sink) in inner.loggers.iter_mut() {
            if let Err(e) = sink.log(&entry) {
                warn!(logger = id.0, error = %e, "Logger failed to write entry");
            }
        }
    }

    /// Flush every logger
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        for (id, sink) in inner.loggers.iter_mut() {
            if let Err(e) = sink.flush() {
                warn!(logger = id.0, error = %e, "Logger failed to flush");
            }
        }
    }
}

impl Default for LogDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LogDispatcher")
            .field("channels", &inner.channels)
            .field("loggers", &inner.loggers.len())
            .finish()
    }
}

impl Drop for LogDispatcher {
    fn drop(&mut self) {
        self.flush();
    }
}
