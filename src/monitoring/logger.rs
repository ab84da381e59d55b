/*!
 * Policy-Based Loggers
 *
 * A logger is a filter, a formatter and an outputter composed as type
 * parameters. Loggers are registered on a `LogDispatcher`, which fans every
 * message out to them.
 */

use crate::core::limits::LOG_MSG_MAX_SIZE;
use crate::core::types::Channel;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Fatal => write!(f, "FATAL"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "err" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// One message travelling through the dispatcher
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LogEntry<'a> {
    pub channel: Channel,
    pub level: LogLevel,
    pub message: &'a str,
}

// =============================================================================
// FILTERS
// =============================================================================

/// Decides whether a logger handles an entry
pub trait Filter: Send {
    fn accept(&self, entry: &LogEntry<'_>) -> bool;
}

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl Filter for NoFilter {
    fn accept(&self, _entry: &LogEntry<'_>) -> bool {
        true
    }
}

/// Accepts entries at or above a minimum level
#[derive(Debug, Clone, Copy)]
pub struct LevelFilter {
    pub min_level: LogLevel,
}

impl LevelFilter {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Filter for LevelFilter {
    fn accept(&self, entry: &LogEntry<'_>) -> bool {
        entry.level >= self.min_level
    }
}

/// Accepts entries on one channel
#[derive(Debug, Clone, Copy)]
pub struct ChannelFilter {
    pub channel: Channel,
}

impl ChannelFilter {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

impl Filter for ChannelFilter {
    fn accept(&self, entry: &LogEntry<'_>) -> bool {
        entry.channel == self.channel
    }
}

// =============================================================================
// FORMATTERS
// =============================================================================

/// Renders an entry as one output line (newline included)
pub trait Formatter: Send {
    fn format(&self, entry: &LogEntry<'_>) -> String;
}

/// Message text followed by a newline, truncated to `LOG_MSG_MAX_SIZE`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFormatter;

impl Formatter for SimpleFormatter {
    fn format(&self, entry: &LogEntry<'_>) -> String {
        let mut line = truncate(entry.message, LOG_MSG_MAX_SIZE).to_string();
        line.push('\n');
        line
    }
}

/// RFC 3339 UTC timestamp, level and channel before the message
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampFormatter;

impl Formatter for TimestampFormatter {
    fn format(&self, entry: &LogEntry<'_>) -> String {
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("????-??-??T??:??:??Z"));
        format!(
            "{} [{}] ch{} {}\n",
            stamp,
            entry.level,
            entry.channel,
            truncate(entry.message, LOG_MSG_MAX_SIZE)
        )
    }
}

/// One JSON object per line
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, entry: &LogEntry<'_>) -> String {
        let mut line = serde_json::to_string(entry).unwrap_or_else(|e| {
            format!(r#"{{"level":"error","message":"unserializable entry: {}"}}"#, e)
        });
        line.push('\n');
        line
    }
}

/// Cut `message` to at most `max` bytes on a char boundary
fn truncate(message: &str, max: usize) -> &str {
    if message.len() <= max {
        return message;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

// =============================================================================
// OUTPUTTERS
// =============================================================================

/// Destination for formatted lines
pub trait Outputter: Send {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Standard output, flushed per line
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutputter;

impl Outputter for ConsoleOutputter {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.flush()
    }
}

/// Buffered file output
#[derive(Debug)]
pub struct FileOutputter {
    writer: BufWriter<File>,
}

impl FileOutputter {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    /// Append to the file at `path`, creating it if needed
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl Outputter for FileOutputter {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// In-memory line buffer shared with whoever holds `lines()`
#[derive(Debug, Clone, Default)]
pub struct MemoryOutputter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryOutputter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the captured lines
    pub fn lines(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.lines)
    }

    /// Copy of everything captured so far
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Outputter for MemoryOutputter {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

// =============================================================================
// LOGGERS
// =============================================================================

/// Anything the dispatcher can deliver entries to
pub trait LogSink: Send {
    fn log(&mut self, entry: &LogEntry<'_>) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Logger composed from a filter, formatter and outputter policy
#[derive(Debug, Default)]
pub struct Logger<F, M, O> {
    filter: F,
    formatter: M,
    outputter: O,
}

impl<F: Filter, M: Formatter, O: Outputter> Logger<F, M, O> {
    pub fn new(filter: F, formatter: M, outputter: O) -> Self {
        Self {
            filter,
            formatter,
            outputter,
        }
    }

    pub fn outputter(&self) -> &O {
        &self.outputter
    }
}

impl<F: Filter, M: Formatter, O: Outputter> LogSink for Logger<F, M, O> {
    fn log(&mut self, entry: &LogEntry<'_>) -> io::Result<()> {
        if !self.filter.accept(entry) {
            return Ok(());
        }
        let line = self.formatter.format(entry);
        self.outputter.write_line(&line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.outputter.flush()
    }
}

pub type ConsoleLogger = Logger<NoFilter, SimpleFormatter, ConsoleOutputter>;
pub type LevelConsoleLogger = Logger<LevelFilter, SimpleFormatter, ConsoleOutputter>;
pub type ChannelConsoleLogger = Logger<ChannelFilter, SimpleFormatter, ConsoleOutputter>;
pub type FileLogger = Logger<NoFilter, SimpleFormatter, FileOutputter>;
pub type TimestampedFileLogger = Logger<LevelFilter, TimestampFormatter, FileOutputter>;
pub type JsonFileLogger = Logger<LevelFilter, JsonFormatter, FileOutputter>;
pub type MemoryLogger = Logger<NoFilter, SimpleFormatter, MemoryOutputter>;
