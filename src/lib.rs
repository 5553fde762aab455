//! # Kicker match telemetry
//!
//! Bit-packed telemetry for a table-football tracker. The sender keeps the latest ball
//! position, a decaying goal flag and a queue of bounce events in a shared
//! [`TelemetryBuffer`]. A [`BroadcastScheduler`] drains it on a fixed period into a
//! frame sized for a connectionless advertisement and hands it to a [`Transport`].
//! On the other end a scanner decodes frames and a [`ReceptionTracker`] estimates
//! timing and loss.
//!
//! ## Layout
//! - `codec`: bit I/O, frame encode/decode, advertisement wrapper.
//! - `sender`: buffer, scheduler, transports, synthetic detector.
//! - `receiver`: UDP scanner and reception statistics.
//! - `utils`: config, errors, stats, CSV export.

pub mod codec;
pub mod receiver;
pub mod sender;
pub mod utils;

pub use codec::{BounceEvent, Coordinate, DecodedFrame, Frame, FrameHeader, decode, encode};
pub use receiver::tracker::{ReceptionSummary, ReceptionTracker};
pub use sender::buffer::{OverflowPolicy, TelemetryBuffer};
pub use sender::scheduler::{BroadcastScheduler, SchedulerConfig, SchedulerReport, SchedulerState};
pub use sender::transport::{LogTransport, Transport, UdpBroadcastTransport};
pub use utils::error::{Result, TelemetryError, TransportError};
