//! tracker.rs
//! Reception statistics for one listening session.
//!
//! The channel repeats an unchanged payload many times per logical update, so only
//! payloads that differ from the immediately preceding one are counted. For each
//! distinct payload the tracker records the delay since the previous distinct payload
//! and an implicit index: the payload bytes read as a little-endian integer. The
//! protocol has no sequence field, so the loss ratio derived from that index is a
//! best-effort figure. Payloads whose index is zero contribute to the count but not to
//! the index range; if no payload ever has a non-zero index only the count is reported.
//!
//! Single-threaded; the caller owns the tracker.

use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::codec::frame::{DecodedFrame, decode};
use crate::utils::metrics::{Stats, duration_stats_ms};

/// Bytes of payload folded into the implicit index.
pub const INDEX_BYTES: usize = 16;

/// Little-endian integer over the first `INDEX_BYTES` bytes, `None` when zero.
pub fn payload_index(payload: &[u8]) -> Option<u128> {
    let mut raw = [0u8; INDEX_BYTES];
    let n = payload.len().min(INDEX_BYTES);
    raw[..n].copy_from_slice(&payload[..n]);
    match u128::from_le_bytes(raw) {
        0 => None,
        v => Some(v),
    }
}

/// A distinct payload as seen by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub decoded: DecodedFrame,
    /// Time since the previous distinct payload; `None` for the first.
    pub delay: Option<Duration>,
    pub index: Option<u128>,
}

#[derive(Debug, Default)]
pub struct ReceptionTracker {
    last_payload: Option<Vec<u8>>,
    last_arrival: Option<Instant>,
    delays: Vec<Duration>,
    distinct: u64,
    repeats: u64,
    min_index: Option<u128>,
    max_index: Option<u128>,
}

impl ReceptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received payload. Returns `None` for an immediate repeat.
    pub fn observe(&mut self, arrival: Instant, payload: &[u8]) -> Option<Observation> {
        if self.last_payload.as_deref() == Some(payload) {
            self.repeats += 1;
            return None;
        }

        let delay = self
            .last_arrival
            .map(|prev| arrival.saturating_duration_since(prev));
        if let Some(d) = delay {
            self.delays.push(d);
        }
        self.last_arrival = Some(arrival);
        self.last_payload = Some(payload.to_vec());
        self.distinct += 1;

        let index = payload_index(payload);
        if let Some(i) = index {
            self.min_index = Some(self.min_index.map_or(i, |m| m.min(i)));
            self.max_index = Some(self.max_index.map_or(i, |m| m.max(i)));
        }

        Some(Observation {
            decoded: decode(payload),
            delay,
            index,
        })
    }

    pub fn distinct(&self) -> u64 {
        self.distinct
    }

    pub fn finalize(&self) -> ReceptionSummary {
        let index_range = self.min_index.zip(self.max_index);
        let total = index_range.map(|(lo, hi)| hi - lo + 1);
        ReceptionSummary {
            distinct: self.distinct,
            repeats: self.repeats,
            delay_ms: duration_stats_ms(&self.delays),
            index_range,
            total,
            loss_ratio: total.map(|t| self.distinct as f64 / t as f64),
        }
    }
}

/// Session totals printed on shutdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceptionSummary {
    pub distinct: u64,
    /// Immediate repeats that were discarded.
    pub repeats: u64,
    pub delay_ms: Option<Stats>,
    pub index_range: Option<(u128, u128)>,
    /// `max - min + 1` over the implicit index, when one was available.
    pub total: Option<u128>,
    /// `distinct / total`, when `total` is known.
    pub loss_ratio: Option<f64>,
}

impl fmt::Display for ReceptionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.delay_ms {
            Some(s) => writeln!(
                f,
                "Delta stats (ms) min={:.2} max={:.2} avg={:.2}",
                s.min, s.max, s.mean
            )?,
            None => writeln!(f, "Fewer than two distinct payloads captured. Delta stats unavailable.")?,
        }
        match (self.total, self.loss_ratio) {
            (Some(total), Some(ratio)) => write!(
                f,
                "Loss (Received/Total): {}/{} ({:.1}% received)",
                self.distinct,
                total,
                ratio * 100.0
            ),
            _ => write!(
                f,
                "Loss (Received/Total): {}/{} (no index available)",
                self.distinct, self.distinct
            ),
        }
    }
}
