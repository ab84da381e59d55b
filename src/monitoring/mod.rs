/*!
 * Monitoring Module
 * Tracing setup and the explicitly constructed log dispatcher
 */

pub mod dispatch;
pub mod logger;
pub mod tracer;

// Re-export for convenience
pub use dispatch::{LogDispatcher, LoggerId};
pub use logger::{
    ChannelConsoleLogger, ChannelFilter, ConsoleLogger, ConsoleOutputter, FileLogger,
    FileOutputter, Filter, Formatter, JsonFileLogger, JsonFormatter, LevelConsoleLogger,
    LevelFilter, LogEntry, LogLevel, LogSink, Logger, MemoryLogger, MemoryOutputter, NoFilter,
    Outputter, SimpleFormatter, TimestampFormatter, TimestampedFileLogger,
};
pub use tracer::init_tracing;
