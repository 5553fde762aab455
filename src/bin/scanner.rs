//! Passive telemetry scanner (scanner binary).
//!
//! Listens for advertisements, prints each distinct payload from our source with the
//! delay since the previous one, and prints reception statistics on Ctrl-C.
//!
//! ```text
//! scanner [--config scanner.toml] [--bind 0.0.0.0:47474] [--raw] [--csv data/reception.csv]
//! ```

use std::{path::Path, process::ExitCode};

use log::{debug, error, info};

use kicker_telemetry::{
    receiver::{scanner::UdpScanner, tracker::ReceptionTracker},
    utils::{
        config::{Config, Program},
        error::Result,
        export::export_reception_summary,
    },
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(Program::Scanner, &args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match scan(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("scanner stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn scan(config: &Config) -> Result<()> {
    let filter = config.source_filter();
    let source_id = filter.source_id();
    let mut scanner = UdpScanner::bind(config.bind_addr()?, filter)?;
    let display = config.display_mode();
    let mut tracker = ReceptionTracker::new();

    info!("[Scanner] listening on {}", scanner.local_addr()?);
    println!("Scanning for '{}' ({:04x}). Ctrl-C to stop.", config.device_name, source_id);

    loop {
        tokio::select! {
            entry = scanner.next_entry() => {
                let entry = entry?;
                if !entry.source_match {
                    debug!("[Scanner] device seen without source data");
                    continue;
                }
                if let Some(obs) = tracker.observe(entry.timestamp, &entry.payload) {
                    let delta = match obs.delay {
                        Some(d) => format!("{:.2}ms", d.as_secs_f64() * 1_000.0),
                        None => "--".to_string(),
                    };
                    println!("{} | delta: {}", display.render(source_id, &entry.payload, &obs.decoded), delta);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("[Scanner] interrupted");
                break;
            }
        }
    }

    let summary = tracker.finalize();
    println!("\n=== RECEPTION SUMMARY ===");
    println!("{}", summary);

    if let Some(path) = &config.scanner.summary_csv {
        export_reception_summary(Path::new(path), &summary)?;
    }
    Ok(())
}
