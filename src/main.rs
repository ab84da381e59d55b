/*!
 * Guarded Memory - Demonstration Harness
 *
 * Runs a short allocation session on a linear allocator with guard regions
 * and allocation tracking, then provokes and reports a guard overwrite.
 */

use guarded_memory::core::limits::TRACKING_CHANNEL;
use guarded_memory::memory::{
    Array, Constructed, DefaultBoundsChecking, DispatchTracking, LinearAllocator, MemoryResult,
    Scalar, Trivial, TypedMemoryManager,
};
use guarded_memory::monitoring::{
    ConsoleOutputter, FileOutputter, LevelConsoleLogger, LevelFilter, LogDispatcher, LogLevel,
    SimpleFormatter, TimestampFormatter, TimestampedFileLogger,
};
use guarded_memory::{init_tracing, SessionConfig};
use miette::IntoDiagnostic;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Default, Clone)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
    label: String,
}

type SessionManager = TypedMemoryManager<LinearAllocator, DefaultBoundsChecking, DispatchTracking>;

fn main() -> miette::Result<()> {
    init_tracing();

    let config = SessionConfig::from_env()?;
    info!(
        capacity = config.capacity,
        log_file = ?config.log_file,
        on_corruption = ?config.on_corruption,
        "Guarded memory session starting"
    );

    let dispatcher = Arc::new(LogDispatcher::new());
    dispatcher.add_logger(LevelConsoleLogger::new(
        LevelFilter::new(config.log_level),
        SimpleFormatter,
        ConsoleOutputter,
    ));
    if let Some(path) = &config.log_file {
        let outputter = FileOutputter::create(path).into_diagnostic()?;
        dispatcher.add_logger(TimestampedFileLogger::new(
            LevelFilter::new(config.log_level),
            TimestampFormatter,
            outputter,
        ));
        info!(path = %path.display(), "File logger attached");
    }

    run_session(&config, &dispatcher)?;
    demonstrate_corruption(&config, &dispatcher)?;

    dispatcher.flush();
    info!("Guarded memory session finished");
    Ok(())
}

fn session_manager(config: &SessionConfig, dispatcher: &Arc<LogDispatcher>) -> SessionManager {
    TypedMemoryManager::builder(LinearAllocator::new(config.capacity))
        .bounds_checking(DefaultBoundsChecking::new())
        .tracking(DispatchTracking::new(Arc::clone(dispatcher)))
        .on_corruption(config.on_corruption)
        .build()
}

fn run_session(config: &SessionConfig, dispatcher: &Arc<LogDispatcher>) -> MemoryResult<()> {
    let mut manager = session_manager(config, dispatcher);

    let numbers = manager.allocate_array::<i32, Trivial>(50)?;
    let squares: Vec<i32> = (0..50).map(|i| i * i).collect();
    manager.write_slice(&numbers, &squares)?;

    let particles = manager.allocate_array::<Particle, Constructed>(4)?;
    for index in 0..particles.count() {
        manager.with_element(&particles, index, |p| {
            p.label = format!("particle-{}", index);
            p.velocity = [index as f32, 0.0, 0.0];
        })?;
    }
    let first = manager.get(&particles, 0)?;
    info!(
        label = %first.label,
        position = ?first.position,
        velocity = ?first.velocity,
        "First particle"
    );

    let scratch = manager.allocate_bytes(64)?;
    manager.write_bytes(scratch.address(), &[0xAB; 64])?;

    let stats = manager.stats();
    info!(
        used = stats.used_memory,
        available = stats.available_memory,
        live_blocks = stats.live_blocks,
        pressure = %stats.memory_pressure(),
        "Session allocations complete"
    );

    manager.deallocate_bytes::<Array>(scratch)?;
    manager.deallocate::<Particle, Constructed, Array>(particles)?;
    manager.deallocate::<i32, Trivial, Array>(numbers)?;

    let stats = manager.stats();
    info!(
        allocations = stats.allocation_count,
        frees = stats.free_count,
        live_blocks = stats.live_blocks,
        used = stats.used_memory,
        "Session released every block"
    );
    Ok(())
}

fn demonstrate_corruption(
    config: &SessionConfig,
    dispatcher: &Arc<LogDispatcher>,
) -> miette::Result<()> {
    let mut manager = session_manager(config, dispatcher);

    let value = manager.allocate::<i32, Trivial>()?;
    manager.set(&value, 0, 42)?;

    // One byte before the payload: the last byte of the leading guard.
    manager.write_bytes(value.address() - 1, &[0xFF])?;

    match manager.deallocate::<i32, Trivial, Scalar>(value) {
        Err(err) if err.is_fatal() => {
            error!(error = %err, "Guard overwrite detected");
            dispatcher.log(TRACKING_CHANNEL, LogLevel::Fatal, &err.to_string());
            Ok(())
        }
        Err(err) => Err(err.into()),
        Ok(()) => Err(miette::miette!("guard overwrite went undetected")),
    }
}
