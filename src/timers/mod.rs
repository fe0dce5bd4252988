//! Ambient timer capability
//!
//! Code under test schedules deferred work through [`set_timeout`] and
//! [`queue_microtask`] and lets time pass through [`tick`]. Which backend
//! answers depends on what is installed on the current thread: the real
//! timers by default, a fake clock inside `fake_async`.

use crate::config::ClockConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// A deferred callback
pub type TimerCallback = Box<dyn FnOnce()>;

/// Identifier returned by `set_timeout`
pub type TimerId = u64;

/// What one `tick`/`advance` did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Microtasks run
    pub microtasks_run: usize,
    /// Macrotasks run
    pub macrotasks_run: usize,
    /// Clock reading after the time elapsed, in milliseconds
    pub virtual_time: u64,
}

impl DrainReport {
    /// Total tasks run
    pub fn tasks_run(&self) -> usize {
        self.microtasks_run + self.macrotasks_run
    }
}

/// Something that can schedule deferred callbacks and let time pass
pub trait TimerBackend {
    /// Run `callback` once `delay_ms` have elapsed
    fn set_timeout(&self, callback: TimerCallback, delay_ms: u64) -> TimerId;

    /// Run `callback` before the next macrotask
    fn queue_microtask(&self, callback: TimerCallback);

    /// Let `ms` milliseconds pass, running whatever becomes due
    fn tick(&self, ms: u64) -> Result<DrainReport>;

    /// Milliseconds since the backend started
    fn now_ms(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Real timers
// ---------------------------------------------------------------------------

struct DueTask {
    due: Instant,
    id: TimerId,
    callback: TimerCallback,
}

/// Wall-clock timers for a single-threaded program
///
/// Callbacks run cooperatively: `tick` sleeps, then runs every task whose
/// deadline has passed, microtasks first.
pub struct RealTimers {
    started: Instant,
    max_steps: usize,
    next_id: Cell<TimerId>,
    microtasks: RefCell<VecDeque<TimerCallback>>,
    macrotasks: RefCell<Vec<DueTask>>,
}

impl RealTimers {
    pub fn new() -> Self {
        Self::with_limit(ClockConfig::default().max_drain_steps)
    }

    /// Real timers that give up after `max_steps` tasks per tick
    pub fn with_limit(max_steps: usize) -> Self {
        Self {
            started: Instant::now(),
            max_steps,
            next_id: Cell::new(1),
            microtasks: RefCell::new(VecDeque::new()),
            macrotasks: RefCell::new(Vec::new()),
        }
    }

    /// Pending (micro, macro) task counts
    pub fn pending(&self) -> (usize, usize) {
        (self.microtasks.borrow().len(), self.macrotasks.borrow().len())
    }

    fn next_due(&self, now: Instant) -> Option<TimerCallback> {
        let mut tasks = self.macrotasks.borrow_mut();
        let index = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= now)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;
        Some(tasks.remove(index).callback)
    }
}

impl Default for RealTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerBackend for RealTimers {
    fn set_timeout(&self, callback: TimerCallback, delay_ms: u64) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.macrotasks.borrow_mut().push(DueTask {
            due: Instant::now() + Duration::from_millis(delay_ms),
            id,
            callback,
        });
        id
    }

    fn queue_microtask(&self, callback: TimerCallback) {
        self.microtasks.borrow_mut().push_back(callback);
    }

    fn tick(&self, ms: u64) -> Result<DrainReport> {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }

        let now = Instant::now();
        let mut report = DrainReport::default();
        loop {
            let has_microtask = !self.microtasks.borrow().is_empty();
            let has_due = self.macrotasks.borrow().iter().any(|task| task.due <= now);
            if !has_microtask && !has_due {
                break;
            }
            // Checked before popping so a refused task stays queued.
            if report.tasks_run() >= self.max_steps {
                let (pending_microtasks, pending_macrotasks) = self.pending();
                return Err(Error::DrainLimitExceeded {
                    limit: self.max_steps,
                    pending_microtasks,
                    pending_macrotasks,
                });
            }
            let next = self.microtasks.borrow_mut().pop_front();
            let (callback, micro) = match next {
                Some(callback) => (callback, true),
                None => match self.next_due(now) {
                    Some(callback) => (callback, false),
                    None => break,
                },
            };
            callback();
            if micro {
                report.microtasks_run += 1;
            } else {
                report.macrotasks_run += 1;
            }
        }
        report.virtual_time = self.now_ms();
        Ok(report)
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Installed backend
// ---------------------------------------------------------------------------

thread_local! {
    static REAL: Rc<RealTimers> = Rc::new(RealTimers::new());
    static INSTALLED: RefCell<Vec<Rc<dyn TimerBackend>>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a backend installed; uninstalls it when dropped
///
/// Guards must be dropped in reverse installation order, which scoping
/// guarantees.
pub(crate) struct BackendGuard {
    depth: usize,
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for BackendGuard {
    fn drop(&mut self) {
        let _ = INSTALLED.try_with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

/// Install `backend` as the current thread's timers until the guard drops
pub(crate) fn install(backend: Rc<dyn TimerBackend>) -> BackendGuard {
    let depth = INSTALLED.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(backend);
        stack.len() - 1
    });
    trace!(depth, "timer backend installed");
    BackendGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// The backend currently answering timer calls on this thread
pub fn current() -> Rc<dyn TimerBackend> {
    match INSTALLED.with(|stack| stack.borrow().last().cloned()) {
        Some(backend) => backend,
        None => REAL.with(|real| -> Rc<dyn TimerBackend> { real.clone() }),
    }
}

/// Whether a substitute backend (a fake clock) is installed
pub fn is_faked() -> bool {
    INSTALLED.with(|stack| !stack.borrow().is_empty())
}

/// Schedule `callback` after `delay_ms` on the current backend
pub fn set_timeout(callback: impl FnOnce() + 'static, delay_ms: u64) -> TimerId {
    current().set_timeout(Box::new(callback), delay_ms)
}

/// Queue `callback` as a microtask on the current backend
pub fn queue_microtask(callback: impl FnOnce() + 'static) {
    current().queue_microtask(Box::new(callback));
}

/// Let `ms` pass on the current backend
pub fn tick(ms: u64) -> Result<DrainReport> {
    current().tick(ms)
}

/// Clock reading of the current backend
pub fn now_ms() -> u64 {
    current().now_ms()
}
