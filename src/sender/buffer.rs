//! buffer.rs
//! Shared telemetry state filled by detection and drained by the broadcast scheduler.
//!
//! Every field sits behind one `parking_lot::Mutex`; the methods below are the
//! only way in. `drain` holds the lock only while it pops the records that fit the
//! byte budget, so its hold time is bounded by the budget and not by the queue length.
//! Bit packing happens after the lock is released.

use std::collections::VecDeque;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::codec::frame::{self, BounceEvent, Coordinate, Frame, FrameHeader};

/// Number of drains a pushed goal stays visible for.
pub const GOAL_DECAY_TICKS: u8 = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What to discard once the bounce queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the head of the queue to make room for the new event.
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the new event.
    DropNewest,
}

#[derive(Debug, Default)]
struct BufferState {
    goal_team: u8,
    goal_decay: u8,
    position: Coordinate,
    bounces: VecDeque<BounceEvent>,
    dropped: u64,
}

pub struct TelemetryBuffer {
    state: Mutex<BufferState>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY, OverflowPolicy::default())
    }

    /// `capacity` is clamped to at least one queued event.
    pub fn with_capacity(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Overwrite the last known ball position. Sticky across drains.
    pub fn set_coordinate(&self, x: u8, y: u8) {
        self.state.lock().position = Coordinate::new(x, y);
    }

    /// Report a goal. Restarts the decay window; the latest team wins.
    pub fn push_goal(&self, team: u8) {
        let mut s = self.state.lock();
        s.goal_team = team & 0b11;
        s.goal_decay = GOAL_DECAY_TICKS;
    }

    pub fn enqueue_bounce(&self, event: BounceEvent) {
        let mut s = self.state.lock();
        if s.bounces.len() < self.capacity {
            s.bounces.push_back(event);
            return;
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                s.bounces.pop_front();
                s.bounces.push_back(event);
            }
            OverflowPolicy::DropNewest => {}
        }
        s.dropped += 1;
        if s.dropped == 1 || s.dropped % 1000 == 0 {
            warn!(
                "[Buffer] bounce queue full ({}), policy={:?}, dropped so far={}",
                self.capacity, self.policy, s.dropped
            );
        }
    }

    /// Take one frame's worth of state and pack it into at most `byte_budget` bytes.
    ///
    /// The goal read here is the value before this drain's decrement. Bounces are taken
    /// from the front while the padded frame still fits; the first one that does not fit
    /// ends the scan. A budget below two bytes still yields the bare header.
    pub fn drain(&self, byte_budget: usize) -> Vec<u8> {
        let frame = {
            let mut s = self.state.lock();

            let goal = s.goal_team;
            if s.goal_decay > 0 {
                s.goal_decay -= 1;
                if s.goal_decay == 0 {
                    s.goal_team = 0;
                }
            }

            let take = frame::bounces_within(byte_budget).min(s.bounces.len());
            let bounces: Vec<BounceEvent> = s.bounces.drain(..take).collect();
            Frame::new(FrameHeader::new(goal, s.position), bounces)
        };

        let bytes = frame::encode(&frame);
        debug!(
            "[Buffer] drained {} bounce(s) into {} of {} bytes",
            frame.bounces.len(),
            bytes.len(),
            byte_budget
        );
        bytes
    }

    pub fn pending_bounces(&self) -> usize {
        self.state.lock().bounces.len()
    }

    pub fn dropped_bounces(&self) -> u64 {
        self.state.lock().dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::frame::decode;

    fn bounce(n: u8) -> BounceEvent {
        BounceEvent::new(n, n.wrapping_mul(2), n, n % 16)
    }

    #[test]
    fn fresh_buffer_drains_zeroed_header() {
        let buf = TelemetryBuffer::new();
        assert_eq!(buf.drain(14), vec![0x00, 0x00]);
    }

    #[test]
    fn goal_visible_for_exactly_five_drains() {
        let buf = TelemetryBuffer::new();
        buf.push_goal(1);
        let teams: Vec<u8> = (0..8)
            .map(|_| decode(&buf.drain(14)).frame.header.goal())
            .collect();
        assert_eq!(teams, vec![1, 1, 1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn second_goal_restarts_window_and_replaces_team() {
        let buf = TelemetryBuffer::new();
        buf.push_goal(1);
        buf.drain(2);
        buf.drain(2);
        buf.push_goal(2);
        let teams: Vec<u8> = (0..6)
            .map(|_| decode(&buf.drain(2)).frame.header.goal())
            .collect();
        assert_eq!(teams, vec![2, 2, 2, 2, 2, 0]);
    }

    #[test]
    fn coordinate_is_sticky_and_masked() {
        let buf = TelemetryBuffer::new();
        buf.set_coordinate(200, 70);
        for _ in 0..3 {
            let header = decode(&buf.drain(2)).frame.header;
            assert_eq!((header.position().x(), header.position().y()), (200 & 0x7F, 70 & 0x3F));
        }
    }

    #[test]
    fn drain_takes_fifo_prefix_within_budget() {
        let buf = TelemetryBuffer::new();
        for n in 1..=5 {
            buf.enqueue_bounce(bounce(n));
        }

        let bytes = buf.drain(9);
        assert_eq!(bytes.len(), 9);
        assert_eq!(decode(&bytes).frame.bounces, vec![bounce(1), bounce(2)]);
        assert_eq!(buf.pending_bounces(), 3);

        let rest = decode(&buf.drain(64)).frame.bounces;
        assert_eq!(rest, vec![bounce(3), bounce(4), bounce(5)]);
    }

    #[test]
    fn tiny_budget_still_emits_header() {
        let buf = TelemetryBuffer::new();
        buf.enqueue_bounce(bounce(1));
        assert_eq!(buf.drain(0).len(), 2);
        assert_eq!(buf.drain(5).len(), 2);
        assert_eq!(buf.pending_bounces(), 1);
    }

    #[test]
    fn overflow_drop_oldest_evicts_head() {
        let buf = TelemetryBuffer::with_capacity(2, OverflowPolicy::DropOldest);
        for n in 1..=3 {
            buf.enqueue_bounce(bounce(n));
        }
        assert_eq!(buf.dropped_bounces(), 1);
        assert_eq!(decode(&buf.drain(14)).frame.bounces, vec![bounce(2), bounce(3)]);
    }

    #[test]
    fn overflow_drop_newest_keeps_queue() {
        let buf = TelemetryBuffer::with_capacity(2, OverflowPolicy::DropNewest);
        for n in 1..=3 {
            buf.enqueue_bounce(bounce(n));
        }
        assert_eq!(buf.dropped_bounces(), 1);
        assert_eq!(decode(&buf.drain(14)).frame.bounces, vec![bounce(1), bounce(2)]);
    }
}
