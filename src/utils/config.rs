//! config.rs
//! Runtime configuration for the sender and the scanner.
//!
//! Works with zero arguments. A TOML file (`--config <path>`) is applied first, then
//! command-line flags override individual values.
//!
//! ```toml
//! device_name = "kikicker"
//! source_id = 4919
//!
//! [sender]
//! tick_period_ms = 5
//! transport = "udp"
//! broadcast_addr = "255.255.255.255:47474"
//! overflow = "drop-oldest"
//!
//! [scanner]
//! bind_addr = "0.0.0.0:47474"
//! raw = false
//! ```

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::codec::advertisement::AdvertisementLayout;
use crate::receiver::scanner::{DisplayMode, SourceFilter};
use crate::sender::{
    buffer::{DEFAULT_QUEUE_CAPACITY, OverflowPolicy},
    detection::DetectorConfig,
    scheduler::SchedulerConfig,
};
use crate::utils::error::{Result, TelemetryError};

pub const DEFAULT_DEVICE_NAME: &str = "kikicker";
pub const DEFAULT_SOURCE_ID: u16 = 0x1337;
pub const DEFAULT_PORT: u16 = 47474;
const DEFAULT_TICK_PERIOD_MS: u64 = 5;
const DEFAULT_TRANSPORT_TIMEOUT_MS: u64 = 50;
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1000;
const DEFAULT_RUN_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Udp,
    /// Log payloads instead of sending them.
    Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub tick_period_ms: u64,
    /// Defaults to whatever the advertisement layout leaves for the payload.
    pub byte_budget: Option<usize>,
    pub transport: TransportKind,
    pub broadcast_addr: String,
    pub transport_timeout_ms: u64,
    pub join_timeout_ms: u64,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    pub run_secs: u64,
    pub core: Option<usize>,
    pub raise_priority: bool,
    pub frame_rate_hz: u32,
    pub bounce_probability: f64,
    pub goal_probability: f64,
    pub report_csv: Option<PathBuf>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            byte_budget: None,
            transport: TransportKind::default(),
            broadcast_addr: format!("255.255.255.255:{}", DEFAULT_PORT),
            transport_timeout_ms: DEFAULT_TRANSPORT_TIMEOUT_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            run_secs: DEFAULT_RUN_SECS,
            core: None,
            raise_priority: false,
            frame_rate_hz: detector.frame_rate_hz,
            bounce_probability: detector.bounce_probability,
            goal_probability: detector.goal_probability,
            report_csv: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub bind_addr: String,
    /// Print raw payload bytes instead of decoded text.
    pub raw: bool,
    pub summary_csv: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            raw: false,
            summary_csv: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device_name: String,
    pub source_id: u16,
    pub sender: SenderConfig,
    pub scanner: ScannerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            source_id: DEFAULT_SOURCE_ID,
            sender: SenderConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

/// Which binary is parsing its arguments. Each accepts only its own flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Sender,
    Scanner,
}

const SENDER_FLAGS: &[&str] = &[
    "--period-ms", "--budget", "--transport", "--addr", "--duration", "--queue-capacity",
    "--overflow", "--core", "--report-csv", "--priority",
];
const SCANNER_FLAGS: &[&str] = &["--bind", "--csv", "--raw"];

impl Program {
    fn name(self) -> &'static str {
        match self {
            Program::Sender => "sender",
            Program::Scanner => "scanner",
        }
    }

    fn foreign_flags(self) -> &'static [&'static str] {
        match self {
            Program::Sender => SCANNER_FLAGS,
            Program::Scanner => SENDER_FLAGS,
        }
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T> {
    let raw = value.ok_or_else(|| TelemetryError::Config(format!("{} requires a value", flag)))?;
    raw.parse::<T>()
        .map_err(|_| TelemetryError::Config(format!("invalid value for {}: {}", flag, raw)))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Build from command-line arguments (program name excluded) and validate.
    ///
    /// `--config` is shared. Flags belonging to the other binary are rejected.
    pub fn from_args(program: Program, args: &[String]) -> Result<Self> {
        let mut config = match args.iter().position(|a| a == "--config") {
            Some(i) => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| TelemetryError::Config("--config requires a path".into()))?;
                Self::load(Path::new(path))?
            }
            None => Self::default(),
        };

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = args.get(i + 1);
            let mut consumed = 2;
            if program.foreign_flags().contains(&flag) {
                return Err(TelemetryError::Config(format!(
                    "{} is not a {} option",
                    flag,
                    program.name()
                )));
            }
            match flag {
                "--config" => {}
                "--period-ms" => config.sender.tick_period_ms = parse_value(flag, value)?,
                "--budget" => config.sender.byte_budget = Some(parse_value(flag, value)?),
                "--transport" => {
                    config.sender.transport = match value.map(String::as_str) {
                        Some("udp") => TransportKind::Udp,
                        Some("log") => TransportKind::Log,
                        other => {
                            return Err(TelemetryError::Config(format!(
                                "--transport expects udp|log, got {:?}",
                                other
                            )));
                        }
                    }
                }
                "--addr" => config.sender.broadcast_addr = parse_value(flag, value)?,
                "--duration" => config.sender.run_secs = parse_value(flag, value)?,
                "--queue-capacity" => config.sender.queue_capacity = parse_value(flag, value)?,
                "--overflow" => {
                    config.sender.overflow = match value.map(String::as_str) {
                        Some("drop-oldest") => OverflowPolicy::DropOldest,
                        Some("drop-newest") => OverflowPolicy::DropNewest,
                        other => {
                            return Err(TelemetryError::Config(format!(
                                "--overflow expects drop-oldest|drop-newest, got {:?}",
                                other
                            )));
                        }
                    }
                }
                "--core" => config.sender.core = Some(parse_value(flag, value)?),
                "--report-csv" => config.sender.report_csv = Some(parse_value(flag, value)?),
                "--priority" => {
                    config.sender.raise_priority = true;
                    consumed = 1;
                }
                "--bind" => config.scanner.bind_addr = parse_value(flag, value)?,
                "--csv" => config.scanner.summary_csv = Some(parse_value(flag, value)?),
                "--raw" => {
                    config.scanner.raw = true;
                    consumed = 1;
                }
                other => {
                    return Err(TelemetryError::Config(format!("unknown argument: {}", other)));
                }
            }
            i += consumed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(TelemetryError::Config("device_name must not be empty".into()));
        }
        if self.sender.tick_period_ms == 0 {
            return Err(TelemetryError::Config("tick_period_ms must be > 0".into()));
        }
        if self.sender.transport_timeout_ms == 0 {
            return Err(TelemetryError::Config("transport_timeout_ms must be > 0".into()));
        }
        if self.sender.queue_capacity == 0 {
            return Err(TelemetryError::Config("queue_capacity must be > 0".into()));
        }
        let max = self.layout().max_payload();
        if let Some(budget) = self.sender.byte_budget {
            if budget > max {
                return Err(TelemetryError::Config(format!(
                    "byte_budget {} exceeds advertisement capacity {}",
                    budget, max
                )));
            }
        }
        if self.sender.frame_rate_hz == 0 {
            return Err(TelemetryError::Config("frame_rate_hz must be > 0".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> AdvertisementLayout {
        AdvertisementLayout::new(&self.device_name, self.source_id)
    }

    pub fn byte_budget(&self) -> usize {
        self.sender
            .byte_budget
            .unwrap_or_else(|| self.layout().max_payload())
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.sender.transport_timeout_ms)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            period: Duration::from_millis(self.sender.tick_period_ms),
            byte_budget: self.byte_budget(),
            join_timeout: Duration::from_millis(self.sender.join_timeout_ms),
            core: self.sender.core,
            raise_priority: self.sender.raise_priority,
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            frame_rate_hz: self.sender.frame_rate_hz,
            bounce_probability: self.sender.bounce_probability,
            goal_probability: self.sender.goal_probability,
            ..DetectorConfig::default()
        }
    }

    pub fn broadcast_addr(&self) -> Result<SocketAddr> {
        self.sender.broadcast_addr.parse().map_err(|_| {
            TelemetryError::Config(format!("invalid broadcast_addr: {}", self.sender.broadcast_addr))
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.scanner.bind_addr.parse().map_err(|_| {
            TelemetryError::Config(format!("invalid bind_addr: {}", self.scanner.bind_addr))
        })
    }

    pub fn source_filter(&self) -> SourceFilter {
        SourceFilter::new(&self.device_name, self.source_id)
    }

    pub fn display_mode(&self) -> DisplayMode {
        if self.scanner.raw { DisplayMode::Raw } else { DisplayMode::Decoded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::from_args(Program::Sender, &[]).unwrap();
        assert_eq!(config.byte_budget(), 14);
        assert_eq!(config.scheduler_config().period, Duration::from_millis(5));
        assert_eq!(config.sender.transport, TransportKind::Udp);
        assert_eq!(config.display_mode(), DisplayMode::Decoded);
        assert!(config.broadcast_addr().is_ok());
        assert!(config.bind_addr().is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::from_args(
            Program::Sender,
            &args(&[
                "--period-ms", "10", "--budget", "9", "--transport", "log",
                "--overflow", "drop-newest", "--priority",
            ]),
        )
        .unwrap();
        assert_eq!(config.sender.tick_period_ms, 10);
        assert_eq!(config.byte_budget(), 9);
        assert_eq!(config.sender.transport, TransportKind::Log);
        assert_eq!(config.sender.overflow, OverflowPolicy::DropNewest);
        assert!(config.sender.raise_priority);
        assert_eq!(config.display_mode(), DisplayMode::Decoded);

        let scanner = Config::from_args(Program::Scanner, &args(&["--raw", "--bind", "127.0.0.1:9"])).unwrap();
        assert_eq!(scanner.display_mode(), DisplayMode::Raw);
        assert_eq!(scanner.bind_addr().unwrap().port(), 9);
    }

    #[test]
    fn flags_of_the_other_binary_are_rejected() {
        assert!(Config::from_args(Program::Scanner, &args(&["--period-ms", "3"])).is_err());
        assert!(Config::from_args(Program::Scanner, &args(&["--priority"])).is_err());
        assert!(Config::from_args(Program::Sender, &args(&["--raw"])).is_err());
        assert!(Config::from_args(Program::Sender, &args(&["--csv", "out.csv"])).is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Config::from_args(Program::Sender, &args(&["--budget", "15"])).is_err());
        assert!(Config::from_args(Program::Sender, &args(&["--period-ms", "0"])).is_err());
        assert!(Config::from_args(Program::Sender, &args(&["--transport", "radio"])).is_err());
        assert!(Config::from_args(Program::Sender, &args(&["--budget"])).is_err());
        assert!(Config::from_args(Program::Sender, &args(&["--what"])).is_err());
    }

    #[test]
    fn toml_sections_use_defaults_for_missing_keys() {
        let config: Config = toml::from_str(
            r#"
            device_name = "table2"

            [sender]
            tick_period_ms = 20
            overflow = "drop-newest"
            transport = "log"

            [scanner]
            raw = true
            "#,
        )
        .unwrap();
        assert_eq!(config.device_name, "table2");
        assert_eq!(config.source_id, DEFAULT_SOURCE_ID);
        assert_eq!(config.sender.tick_period_ms, 20);
        assert_eq!(config.sender.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.sender.transport, TransportKind::Log);
        assert_eq!(config.sender.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.scanner.raw);
        // shorter name leaves room for a longer payload
        assert_eq!(config.byte_budget(), 16);
    }
}
