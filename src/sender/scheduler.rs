//! scheduler.rs
//! Periodic broadcast loop: drain the buffer, hand the frame to the transport.
//!
//! - Fixed-period release driven by `SpinSleeper`; a tick that wakes after its release
//!   time counts as a deadline miss and the schedule re-anchors on the current instant.
//! - Every tick issues publish-then-enable, even when the payload did not change. The
//!   broadcast medium does not reliably keep an earlier payload across rapid updates.
//! - Transport timeouts are counted and skipped. Any other transport error ends the loop
//!   and is handed back to the owner through `check()` or `stop()`.
//! - Cancellation is cooperative: the stop flag is read at every tick boundary and again
//!   between publish and enable, so a tick in flight when `stop()` is called never
//!   re-enables broadcasting. The exiting loop issues the final disable itself.
//! - Stop flag, completion flag and counters belong to one run. A thread detached by a
//!   timed-out join keeps its own flags and cannot leak into a later `start()`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use spin_sleep::{SpinSleeper, SpinStrategy};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::sender::{buffer::TelemetryBuffer, transport::Transport};
use crate::utils::error::{Result, TelemetryError, TransportError};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(5);
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub period: Duration,
    pub byte_budget: usize,
    /// Upper bound on how long `stop()` waits for the tick thread.
    pub join_timeout: Duration,
    /// Pin the tick thread to this core, if it exists.
    pub core: Option<usize>,
    pub raise_priority: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_TICK_PERIOD,
            byte_budget: 14,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            core: None,
            raise_priority: false,
        }
    }
}

/// Counters accumulated across one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    pub ticks: u64,
    pub frames_published: u64,
    pub timeouts: u64,
    pub deadline_misses: u64,
    pub bytes_published: u64,
}

#[derive(Default)]
struct TickCounters {
    ticks: AtomicU64,
    frames_published: AtomicU64,
    timeouts: AtomicU64,
    deadline_misses: AtomicU64,
    bytes_published: AtomicU64,
}

impl TickCounters {
    fn snapshot(&self) -> SchedulerReport {
        SchedulerReport {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
        }
    }
}

struct Worker {
    handle: JoinHandle<std::result::Result<(), TransportError>>,
    done_rx: Receiver<()>,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl Worker {
    fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Everything the tick thread owns.
struct TickContext {
    buffer: Arc<TelemetryBuffer>,
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    counters: Arc<TickCounters>,
    done_tx: Sender<()>,
}

enum JoinOutcome {
    Exited(std::result::Result<(), TransportError>),
    Panicked,
    TimedOut,
}

pub struct BroadcastScheduler {
    buffer: Arc<TelemetryBuffer>,
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    counters: Arc<TickCounters>,
    worker: Option<Worker>,
}

impl BroadcastScheduler {
    pub fn new(
        buffer: Arc<TelemetryBuffer>,
        transport: Arc<dyn Transport>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            buffer,
            transport,
            config,
            state: Mutex::new(SchedulerState::Idle),
            counters: Arc::new(TickCounters::default()),
            worker: None,
        }
    }

    /// Current lifecycle state.
    ///
    /// A run whose tick thread ended on a fatal transport error reads as `Stopping`
    /// until `check()` or `stop()` collects the error and returns it to `Idle`.
    pub fn state(&self) -> SchedulerState {
        let state = *self.state.lock();
        match &self.worker {
            Some(worker) if state == SchedulerState::Running && worker.finished() => {
                SchedulerState::Stopping
            }
            _ => state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Counters of the current run, or of the last one once stopped.
    pub fn report(&self) -> SchedulerReport {
        self.counters.snapshot()
    }

    /// Idle → Running. Spawns the tick thread with fresh run state.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != SchedulerState::Idle {
                return Err(TelemetryError::Scheduler(format!(
                    "start requested while {:?}",
                    *state
                )));
            }
            *state = SchedulerState::Running;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        self.counters = Arc::new(TickCounters::default());

        let (done_tx, done_rx) = bounded(1);
        let ctx = TickContext {
            buffer: self.buffer.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
            stop: stop.clone(),
            finished: finished.clone(),
            counters: self.counters.clone(),
            done_tx,
        };

        let builder = thread::Builder::new().name("broadcast-tick".to_string());
        let spawned = if self.config.raise_priority {
            builder.spawn_with_priority(ThreadPriority::Max, move |res| {
                if let Err(e) = res {
                    warn!("[Scheduler] could not raise tick thread priority: {:?}", e);
                }
                tick_loop(ctx)
            })
        } else {
            builder.spawn(move || tick_loop(ctx))
        };

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    done_rx,
                    stop,
                    finished,
                });
                info!(
                    "[Scheduler] started: period={:?} budget={}B",
                    self.config.period, self.config.byte_budget
                );
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = SchedulerState::Idle;
                Err(TelemetryError::Io(e))
            }
        }
    }

    /// Surface a fatal transport failure if the tick thread has already exited.
    ///
    /// Returns `Ok(())` while the loop is healthy. After a failure the scheduler is
    /// back in `Idle` and the error is returned once.
    pub fn check(&mut self) -> Result<()> {
        if self.state() != SchedulerState::Stopping {
            return Ok(());
        }
        self.stop()?;
        Ok(())
    }

    /// Running → Stopping → Idle.
    ///
    /// Waits at most `join_timeout` for the tick thread. A thread that exits disables
    /// broadcasting on its way out; one that does not is detached and disabled from here
    /// on a best-effort basis. A fatal error raised by the loop is returned.
    pub fn stop(&mut self) -> Result<SchedulerReport> {
        {
            let mut state = self.state.lock();
            if *state != SchedulerState::Running {
                return Ok(self.counters.snapshot());
            }
            *state = SchedulerState::Stopping;
        }

        let outcome = match self.worker.take() {
            Some(worker) => {
                worker.stop.store(true, Ordering::Release);
                join_worker(worker, self.config.join_timeout)
            }
            None => JoinOutcome::Exited(Ok(())),
        };

        let result = match outcome {
            JoinOutcome::Exited(res) => res.map_err(TelemetryError::from),
            JoinOutcome::Panicked => {
                disable_best_effort(self.transport.as_ref());
                Err(TelemetryError::Scheduler("tick thread panicked".to_string()))
            }
            JoinOutcome::TimedOut => {
                disable_best_effort(self.transport.as_ref());
                Ok(())
            }
        };

        *self.state.lock() = SchedulerState::Idle;
        let report = self.counters.snapshot();
        info!("[Scheduler] stopped: {:?}", report);
        result.map(|_| report)
    }
}

impl Drop for BroadcastScheduler {
    fn drop(&mut self) {
        if *self.state.lock() == SchedulerState::Running {
            let _ = self.stop();
        }
    }
}

fn disable_best_effort(transport: &dyn Transport) {
    if let Err(e) = transport.set_broadcast_enabled(false) {
        warn!("[Scheduler] disabling broadcast failed: {}", e);
    }
}

fn join_worker(worker: Worker, timeout: Duration) -> JoinOutcome {
    match worker.done_rx.recv_timeout(timeout) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => match worker.handle.join() {
            Ok(result) => JoinOutcome::Exited(result),
            Err(_) => JoinOutcome::Panicked,
        },
        Err(RecvTimeoutError::Timeout) => {
            // The loop still exits at its next stop check; leave it detached.
            warn!("[Scheduler] tick thread did not finish within {:?}", timeout);
            JoinOutcome::TimedOut
        }
    }
}

/// One publish/enable pair. Returns `false` when stop was requested while publishing,
/// in which case enable is skipped.
fn publish_tick(
    transport: &dyn Transport,
    payload: &[u8],
    stop: &AtomicBool,
) -> std::result::Result<bool, TransportError> {
    transport.publish_payload(payload)?;
    if stop.load(Ordering::Acquire) {
        return Ok(false);
    }
    transport.set_broadcast_enabled(true)?;
    Ok(true)
}

fn tick_loop(ctx: TickContext) -> std::result::Result<(), TransportError> {
    if let Some(core) = ctx.config.core {
        let cores = core_affinity::get_core_ids().unwrap_or_default();
        match cores.get(core) {
            Some(id) if core_affinity::set_for_current(*id) => {
                info!("[Scheduler] tick thread pinned to core {}", core);
            }
            _ => warn!("[Scheduler] could not pin tick thread to core {}", core),
        }
    }

    let period = ctx.config.period;
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let mut next_release = Instant::now();

    let result = loop {
        if ctx.stop.load(Ordering::Acquire) {
            break Ok(());
        }

        let payload = ctx.buffer.drain(ctx.config.byte_budget);
        ctx.counters.ticks.fetch_add(1, Ordering::Relaxed);

        match publish_tick(ctx.transport.as_ref(), &payload, &ctx.stop) {
            Ok(true) => {
                ctx.counters.frames_published.fetch_add(1, Ordering::Relaxed);
                ctx.counters
                    .bytes_published
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
            }
            Ok(false) => break Ok(()),
            Err(e) if e.is_timeout() => {
                ctx.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!("[Scheduler] transport timeout, continuing");
            }
            Err(e) => {
                error!("[Scheduler] fatal transport error: {}", e);
                break Err(e);
            }
        }

        next_release += period;
        let now = Instant::now();
        if now < next_release {
            sleeper.sleep(next_release - now);
        } else {
            ctx.counters.deadline_misses.fetch_add(1, Ordering::Relaxed);
            next_release = now;
        }
    };

    disable_best_effort(ctx.transport.as_ref());
    ctx.finished.store(true, Ordering::Release);
    let _ = ctx.done_tx.send(());
    result
}
