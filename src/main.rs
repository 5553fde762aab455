//! # Telemetry sender
//!
//! Runs the broadcast side end to end: a synthetic detector feeds the shared
//! `TelemetryBuffer`, and the `BroadcastScheduler` drains it every tick into a transport.
//!
//! ## Usage
//! ```text
//! kicker_telemetry [--config sender.toml] [--period-ms 5] [--budget 14]
//!                  [--transport udp|log] [--addr 255.255.255.255:47474]
//!                  [--duration 30] [--queue-capacity 1024]
//!                  [--overflow drop-oldest|drop-newest] [--core N] [--priority]
//!                  [--report-csv data/sender_runs.csv]
//! ```
//!
//! A fatal transport error stops the run early and exits non-zero.

use std::{
    path::Path,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::{error, info, warn};

use kicker_telemetry::{
    sender::{
        buffer::TelemetryBuffer,
        detection::SyntheticDetector,
        scheduler::{BroadcastScheduler, SchedulerReport},
        transport::{LogTransport, Transport, UdpBroadcastTransport},
    },
    utils::{
        config::{Config, Program, TransportKind},
        error::Result,
        export::export_sender_report,
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    env_logger::init();
    info!("=== TELEMETRY SENDER START ===");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(Program::Sender, &args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => {
            info!("=== TELEMETRY SENDER FINISHED ===");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("sender stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config.sender.transport {
        TransportKind::Udp => Arc::new(UdpBroadcastTransport::open(
            config.broadcast_addr()?,
            config.layout(),
            config.transport_timeout(),
        )?),
        TransportKind::Log => Arc::new(LogTransport::new()),
    };
    Ok(transport)
}

fn run(config: &Config) -> Result<()> {
    let buffer = Arc::new(TelemetryBuffer::with_capacity(
        config.sender.queue_capacity,
        config.sender.overflow,
    ));
    let transport = open_transport(config)?;
    let mut scheduler = BroadcastScheduler::new(buffer.clone(), transport, config.scheduler_config());
    scheduler.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let detector = SyntheticDetector::new(config.detector_config(), buffer.clone(), running.clone())
        .spawn()?;

    let duration = Duration::from_secs(config.sender.run_secs);
    println!(
        "Broadcasting as '{}' ({:04x}) for {:?}, budget {}B",
        config.device_name,
        config.source_id,
        duration,
        config.byte_budget()
    );

    let started = Instant::now();
    let mut outcome = Ok(());
    while started.elapsed() < duration {
        if let Err(e) = scheduler.check() {
            outcome = Err(e);
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    running.store(false, Ordering::Release);
    match detector.join() {
        Ok(frames) => info!("[Detector] produced {} frames", frames),
        Err(_) => warn!("[Detector] thread panicked"),
    }

    let report = match outcome {
        Ok(()) => scheduler.stop()?,
        Err(e) => return Err(e),
    };
    print_report(&report, buffer.dropped_bounces(), buffer.pending_bounces());

    if let Some(path) = &config.sender.report_csv {
        export_sender_report(Path::new(path), &report, buffer.dropped_bounces())?;
    }
    Ok(())
}

fn print_report(report: &SchedulerReport, dropped: u64, pending: usize) {
    println!("\n=== SENDER REPORT ===");
    println!("ticks:            {}", report.ticks);
    println!("frames published: {}", report.frames_published);
    println!("bytes published:  {}", report.bytes_published);
    println!("timeouts:         {}", report.timeouts);
    println!("deadline misses:  {}", report.deadline_misses);
    println!("bounces dropped:  {}", dropped);
    println!("bounces pending:  {}", pending);
}
