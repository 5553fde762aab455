//! detection.rs
//! Producer side of the buffer: turns ball observations into buffer mutations.
//!
//! The camera pipeline is not part of this crate. `SyntheticDetector` stands in for it
//! with a random walk at a fixed frame rate so the sender can run end to end; the
//! quantisation helpers are what a real detector uses to fit field pixels into the
//! 7 x 6 bit coordinate and the 4 bit quadrant.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, info};
use rand::random_range;
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::codec::frame::{BounceEvent, Coordinate};
use crate::sender::buffer::TelemetryBuffer;

/// Number of equal-width field regions along x.
pub const QUADRANT_COUNT: u8 = 16;

/// Map field-local pixels to the 0..127 / 0..63 coordinate grid, clamping at the edges.
pub fn quantize_position(field_x: f64, field_y: f64, width: f64, height: f64) -> Coordinate {
    let scale = |v: f64, extent: f64, max: f64| -> u8 {
        if extent <= 0.0 || !v.is_finite() {
            return 0;
        }
        ((v / extent) * max).clamp(0.0, max) as u8
    };
    Coordinate::new(scale(field_x, width, 127.0), scale(field_y, height, 63.0))
}

/// 1-based region index along x, clamped to `QUADRANT_COUNT`. Negative x maps to 1.
pub fn quadrant_for(field_x: f64, width: f64) -> u8 {
    if width <= 0.0 || !field_x.is_finite() || field_x < 0.0 {
        return 1;
    }
    let region = (field_x / (width / QUADRANT_COUNT as f64)) as u64 + 1;
    region.min(QUADRANT_COUNT as u64) as u8
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub frame_rate_hz: u32,
    /// Field size in pixels.
    pub field_width: f64,
    pub field_height: f64,
    /// Chance per frame that a bounce is reported.
    pub bounce_probability: f64,
    /// Chance per frame that a goal is reported.
    pub goal_probability: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 120,
            field_width: 384.0,
            field_height: 216.0,
            bounce_probability: 0.05,
            goal_probability: 0.001,
        }
    }
}

/// Random-walk ball feeding a shared `TelemetryBuffer`.
pub struct SyntheticDetector {
    config: DetectorConfig,
    buffer: Arc<TelemetryBuffer>,
    running: Arc<AtomicBool>,
}

impl SyntheticDetector {
    pub fn new(config: DetectorConfig, buffer: Arc<TelemetryBuffer>, running: Arc<AtomicBool>) -> Self {
        Self {
            config,
            buffer,
            running,
        }
    }

    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<u64>> {
        thread::Builder::new()
            .name("detector".to_string())
            .spawn(move || self.run())
    }

    /// Frame loop. Returns the number of frames produced.
    pub fn run(&self) -> u64 {
        let period = Duration::from_secs_f64(1.0 / self.config.frame_rate_hz.max(1) as f64);
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

        let (w, h) = (self.config.field_width, self.config.field_height);
        let (mut x, mut y) = (w / 2.0, h / 2.0);
        let (mut vx, mut vy) = (3.0_f64, 2.0_f64);
        let mut frame: u64 = 0;
        let mut next_release = Instant::now();

        info!("[Detector] synthetic ball at {} fps", self.config.frame_rate_hz);

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            }
            next_release += period;

            vx += random_range(-0.5..0.5);
            vy += random_range(-0.5..0.5);
            x += vx;
            y += vy;
            // reflect off the walls
            if x < 0.0 || x > w {
                vx = -vx;
                x = x.clamp(0.0, w);
            }
            if y < 0.0 || y > h {
                vy = -vy;
                y = y.clamp(0.0, h);
            }

            let pos = quantize_position(x, y, w, h);
            self.buffer.set_coordinate(pos.x(), pos.y());

            if random_range(0.0..1.0) < self.config.bounce_probability {
                let angle = (vy.atan2(vx).rem_euclid(std::f64::consts::TAU) / std::f64::consts::TAU * 255.0) as u8;
                let speed = vx.hypot(vy).min(255.0) as u8;
                let event = BounceEvent::new(angle, speed, (frame % 128) as u8, quadrant_for(x, w));
                debug!("[Detector] bounce {:?}", event);
                self.buffer.enqueue_bounce(event);
            }

            if random_range(0.0..1.0) < self.config.goal_probability {
                let team = if x < w / 2.0 { 2 } else { 1 };
                info!("[Detector] goal for team {}", team);
                self.buffer.push_goal(team);
            }

            frame += 1;
        }

        debug!("[Detector] stopped after {} frames", frame);
        frame
    }
}
