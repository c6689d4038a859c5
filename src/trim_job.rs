// Bulk TRIM job
//
// - chunk_plan.rs: units -> display cells and units -> LBA ranges
// - events.rs: TrimEvent stream consumed by progress observers
// - rate.rs: throughput / ETA estimation
//
// A job runs on one dedicated worker thread. The controller only flips
// flags through JobControl; the worker checks them between units.

pub mod chunk_plan;
pub mod events;
pub mod rate;



pub use chunk_plan::{ChunkPlan, LbaRange};
pub use events::{JobOutcome, ProgressReport, TrimEvent, UnitState};
pub use rate::Rate;

use crate::drives::operations::{DiscardError, DiscardPrimitive};
use crate::drives::DeviceDescriptor;
use crate::{DriveError, DriveResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Lifecycle: Idle -> Running <-> Paused -> Completed | Failed | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Execution policy for one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    /// Upper bound on one wait while paused; resume and cancel wake earlier
    pub pause_poll_interval: Duration,
    /// Fail the job once this many units are blocked; `None` never escalates
    pub max_blocked_units: Option<usize>,
    /// Split each unit into discard calls of at most this many blocks
    pub max_blocks_per_call: Option<u64>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            pause_poll_interval: Duration::from_millis(500),
            max_blocked_units: None,
            max_blocks_per_call: None,
        }
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: JobState,
    pub completed: usize,
    pub total: usize,
    pub blocked: usize,
    pub rate: Rate,
    pub started_at: Option<DateTime<Utc>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the controller and the worker
struct Shared {
    id: Uuid,
    total: usize,
    state: Mutex<JobState>,
    wake: Condvar,
    cancel_requested: AtomicBool,
    completed: AtomicUsize,
    blocked: AtomicUsize,
    rate: Mutex<Rate>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl Shared {
    fn new(total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            total,
            state: Mutex::new(JobState::Idle),
            wake: Condvar::new(),
            cancel_requested: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            blocked: AtomicUsize::new(0),
            rate: Mutex::new(Rate::default()),
            started_at: Mutex::new(None),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Block while paused. Returns how long the worker was held.
    fn wait_while_paused(&self, poll: Duration) -> Duration {
        let mut state = lock(&self.state);
        if *state != JobState::Paused {
            return Duration::ZERO;
        }

        let entered = Instant::now();
        tracing::debug!("Paused");
        while *state == JobState::Paused && !self.cancelled() {
            state = self
                .wake
                .wait_timeout(state, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        tracing::debug!(paused_for = ?entered.elapsed(), "Resumed");
        entered.elapsed()
    }

    fn finish(&self, outcome: &JobOutcome) -> JobState {
        let terminal = match outcome {
            JobOutcome::Completed { .. } => JobState::Completed,
            JobOutcome::Failed { .. } => JobState::Failed,
            JobOutcome::Cancelled => JobState::Cancelled,
        };
        *lock(&self.state) = terminal;
        terminal
    }
}

/// Cloneable control handle for a job.
///
/// Safe to use from signal-handling threads while the owner waits on events.
#[derive(Clone)]
pub struct JobControl {
    shared: Arc<Shared>,
}

impl JobControl {
    pub fn job_id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> JobState {
        *lock(&self.shared.state)
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancelled()
    }

    /// Request cancellation at the next unit boundary.
    ///
    /// Idempotent. Before `start` it makes the job end as cancelled without
    /// touching any unit; after the job has ended it does nothing.
    pub fn cancel(&self) {
        {
            let state = lock(&self.shared.state);
            if state.is_terminal() {
                return;
            }
            self.shared.cancel_requested.store(true, Ordering::SeqCst);
        }
        self.shared.wake.notify_all();
    }

    /// Hold the worker before its next unit
    pub fn pause(&self) -> DriveResult<()> {
        let mut state = lock(&self.shared.state);
        match *state {
            JobState::Running => {
                *state = JobState::Paused;
                tracing::info!(job_id = %self.shared.id, "Pause requested");
                Ok(())
            }
            other => Err(DriveError::InvalidState {
                action: "pause",
                state: other,
            }),
        }
    }

    pub fn resume(&self) -> DriveResult<()> {
        {
            let mut state = lock(&self.shared.state);
            if *state != JobState::Paused {
                return Err(DriveError::InvalidState {
                    action: "resume",
                    state: *state,
                });
            }
            *state = JobState::Running;
        }
        tracing::info!(job_id = %self.shared.id, "Resume requested");
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.shared.id,
            state: self.state(),
            completed: self.shared.completed.load(Ordering::SeqCst),
            total: self.shared.total,
            blocked: self.shared.blocked.load(Ordering::SeqCst),
            rate: *lock(&self.shared.rate),
            started_at: *lock(&self.shared.started_at),
        }
    }
}

/// One bulk TRIM over a device, split into the units of a [`ChunkPlan`].
pub struct TrimJob {
    device: Arc<DeviceDescriptor>,
    plan: ChunkPlan,
    primitive: Arc<dyn DiscardPrimitive>,
    options: JobOptions,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TrimJob {
    pub fn new(
        device: Arc<DeviceDescriptor>,
        plan: ChunkPlan,
        primitive: Arc<dyn DiscardPrimitive>,
        options: JobOptions,
    ) -> Self {
        let shared = Arc::new(Shared::new(plan.units()));
        Self {
            device,
            plan,
            primitive,
            options,
            shared,
            worker: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }

    pub fn control(&self) -> JobControl {
        JobControl {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> JobState {
        self.control().state()
    }

    pub fn cancel(&self) {
        self.control().cancel()
    }

    pub fn pause(&self) -> DriveResult<()> {
        self.control().pause()
    }

    pub fn resume(&self) -> DriveResult<()> {
        self.control().resume()
    }

    /// Spawn the worker thread and hand back its event stream.
    ///
    /// Only valid once, from `Idle`.
    pub fn start(&mut self) -> DriveResult<UnboundedReceiver<TrimEvent>> {
        {
            let mut state = lock(&self.shared.state);
            if *state != JobState::Idle {
                return Err(DriveError::InvalidState {
                    action: "start",
                    state: *state,
                });
            }
            *state = JobState::Running;
        }
        *lock(&self.shared.started_at) = Some(Utc::now());

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            device: Arc::clone(&self.device),
            plan: self.plan,
            primitive: Arc::clone(&self.primitive),
            options: self.options.clone(),
            shared: Arc::clone(&self.shared),
            events: tx,
        };

        let spawned = thread::Builder::new()
            .name("trim-worker".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(rx)
            }
            Err(e) => {
                *lock(&self.shared.state) = JobState::Idle;
                Err(DriveError::IoError(e))
            }
        }
    }

    /// Join the worker (if started) and return the resulting state
    pub fn wait(&mut self) -> JobState {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!(job_id = %self.shared.id, "TRIM worker thread panicked outside the unit loop");
            }
        }
        self.state()
    }
}

struct Worker {
    device: Arc<DeviceDescriptor>,
    plan: ChunkPlan,
    primitive: Arc<dyn DiscardPrimitive>,
    options: JobOptions,
    shared: Arc<Shared>,
    events: UnboundedSender<TrimEvent>,
}

impl Worker {
    fn run(self) {
        let span = tracing::info_span!(
            "trim_job",
            job_id = %self.shared.id,
            device = %self.device.device_path
        );
        let _guard = span.enter();

        tracing::info!(
            units = self.plan.units(),
            capacity = self.device.capacity_bytes,
            block_size = self.device.logical_block_size,
            primitive = self.primitive.name(),
            "Starting TRIM job"
        );

        let started = Instant::now();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.process())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(reason = %reason, "TRIM worker panicked");
                JobOutcome::Failed {
                    error: format!("Internal error: {}", reason),
                }
            }
        };

        let state = self.shared.finish(&outcome);
        let elapsed = humantime::format_duration(Duration::from_secs(started.elapsed().as_secs()));
        match &outcome {
            JobOutcome::Completed { message } => tracing::info!(%elapsed, "{}", message),
            JobOutcome::Failed { error } => tracing::error!(%elapsed, error = %error, "TRIM job failed"),
            JobOutcome::Cancelled => tracing::warn!(%elapsed, "TRIM job cancelled"),
        }
        tracing::debug!(%state, "Job finished");

        self.emit(TrimEvent::Finished(outcome));
    }

    fn emit(&self, event: TrimEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }

    fn process(&self) -> JobOutcome {
        let total = self.plan.units();
        let total_lbas = self.device.total_lbas();
        let block_size = self.device.logical_block_size.max(1);

        let run_started = Instant::now();
        let mut paused = Duration::ZERO;
        let mut bytes_done: u64 = 0;
        let mut blocked = 0usize;

        for unit in 0..total {
            paused += self.shared.wait_while_paused(self.options.pause_poll_interval);
            if self.shared.cancelled() {
                tracing::info!(unit, "Cancellation observed");
                return JobOutcome::Cancelled;
            }

            let cells = self.plan.map(unit);
            self.emit(TrimEvent::UnitState {
                unit,
                cells: cells.clone(),
                state: UnitState::Processing,
            });

            let range = self.plan.lba_range(unit, total_lbas);
            let state = match self.discard_unit(range, block_size) {
                Ok(()) => {
                    bytes_done =
                        bytes_done.saturating_add(range.count.saturating_mul(u64::from(block_size)));
                    UnitState::Processed
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(unit, %range, error = %e, "Fatal discard error");
                    return JobOutcome::Failed {
                        error: format!("Unit {} {}: {}", unit, range, e),
                    };
                }
                Err(e) => {
                    blocked += 1;
                    self.shared.blocked.store(blocked, Ordering::SeqCst);
                    tracing::warn!(unit, %range, error = %e, "Discard rejected, unit blocked");
                    UnitState::Blocked
                }
            };
            self.emit(TrimEvent::UnitState { unit, cells, state });

            let completed = unit + 1;
            self.shared.completed.store(completed, Ordering::SeqCst);
            let rate = Rate::compute(
                completed,
                total,
                bytes_done,
                run_started.elapsed().saturating_sub(paused),
            );
            *lock(&self.shared.rate) = rate;
            self.emit(TrimEvent::Progress(ProgressReport {
                completed,
                total,
                throughput_bps: rate.throughput_bps,
                eta: rate.eta,
            }));

            if let Some(limit) = self.options.max_blocked_units {
                if blocked > 0 && blocked >= limit {
                    return JobOutcome::Failed {
                        error: format!(
                            "{} of {} units blocked, giving up (limit {})",
                            blocked, completed, limit
                        ),
                    };
                }
            }
        }

        JobOutcome::Completed {
            message: format!(
                "TRIM completed on {}: {} units processed, {} blocked",
                self.device.device_path,
                total - blocked,
                blocked
            ),
        }
    }

    fn discard_unit(&self, range: LbaRange, block_size: u32) -> Result<(), DiscardError> {
        if range.is_empty() {
            return Ok(());
        }

        let path = &self.device.device_path;
        match self.options.max_blocks_per_call {
            Some(max) => {
                for piece in range.split(max) {
                    self.primitive.discard(path, piece, block_size)?;
                }
                Ok(())
            }
            None => self.primitive.discard(path, range, block_size),
        }
    }
}
