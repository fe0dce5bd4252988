//! Fake-clock scheduler
//!
//! Inside [`fake_async`] the ambient timers (`timers::set_timeout`,
//! `timers::queue_microtask`, `timers::tick`) are answered by a
//! [`FakeClock`]: registrations land in a microtask or macrotask queue and
//! run only when the test advances the clock.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use testbench::{fake_async, timers};
//!
//! let fired = Rc::new(Cell::new(false));
//! let flag = fired.clone();
//! fake_async(|clock| {
//!     timers::set_timeout(move || flag.set(true), 1000);
//!     assert!(!fired.get());
//!     clock.advance(1000).unwrap();
//!     assert!(fired.get());
//! });
//! ```

use crate::config::{ClockConfig, WaitMode};
use crate::error::{Error, Result};
use crate::timers::{self, BackendGuard, DrainReport, TimerBackend, TimerCallback, TimerId};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Lifecycle of a fake clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// Created, not installed
    Idle,
    /// Installed; timer registrations are queued
    Intercepting,
    /// Running queued tasks
    Draining,
    /// Uninstalled; the previous timers answer again
    Restored,
}

struct TimerTask {
    id: TimerId,
    delay_ms: u64,
    callback: TimerCallback,
}

struct ClockInner {
    config: ClockConfig,
    state: Cell<ClockState>,
    virtual_time: Cell<u64>,
    next_id: Cell<TimerId>,
    microtasks: RefCell<VecDeque<TimerTask>>,
    macrotasks: RefCell<VecDeque<TimerTask>>,
}

/// Deterministic replacement for real timers
///
/// Cloning yields another handle onto the same queues.
#[derive(Clone)]
pub struct FakeClock {
    inner: Rc<ClockInner>,
}

impl FakeClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            inner: Rc::new(ClockInner {
                config,
                state: Cell::new(ClockState::Idle),
                virtual_time: Cell::new(0),
                next_id: Cell::new(1),
                microtasks: RefCell::new(VecDeque::new()),
                macrotasks: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// Queue `callback` as a macrotask; `delay_ms` is recorded only
    pub fn set_timeout(&self, callback: impl FnOnce() + 'static, delay_ms: u64) -> TimerId {
        let id = self.next_id();
        trace!(id, delay_ms, "macrotask queued");
        self.inner.macrotasks.borrow_mut().push_back(TimerTask {
            id,
            delay_ms,
            callback: Box::new(callback),
        });
        id
    }

    /// Queue `callback` as a microtask
    pub fn queue_microtask(&self, callback: impl FnOnce() + 'static) {
        let id = self.next_id();
        trace!(id, "microtask queued");
        self.inner.microtasks.borrow_mut().push_back(TimerTask {
            id,
            delay_ms: 0,
            callback: Box::new(callback),
        });
    }

    /// Wrap `f` so that each invocation queues a microtask running it
    pub fn callback(&self, f: impl Fn() + 'static) -> impl Fn() + 'static {
        let clock = self.clone();
        let f = Rc::new(f);
        move || {
            let f = f.clone();
            clock.queue_microtask(move || f());
        }
    }

    /// Drain both queues, then let `ms` elapse
    pub fn advance(&self, ms: u64) -> Result<DrainReport> {
        let mut report = self.drain()?;
        if ms > 0 && self.inner.config.wait == WaitMode::RealTime {
            thread::sleep(Duration::from_millis(ms));
        }
        let now = self.inner.virtual_time.get().saturating_add(ms);
        self.inner.virtual_time.set(now);
        report.virtual_time = now;
        debug!(
            ms,
            microtasks = report.microtasks_run,
            macrotasks = report.macrotasks_run,
            "fake clock advanced"
        );
        Ok(report)
    }

    /// Run queued tasks until both queues are empty
    ///
    /// Microtasks go first and are re-checked after every task, so a
    /// microtask queued by a macrotask runs before the next macrotask.
    pub fn drain(&self) -> Result<DrainReport> {
        let previous = self.inner.state.replace(ClockState::Draining);
        let outcome = self.run_queues();
        self.inner.state.set(previous);
        outcome
    }

    fn run_queues(&self) -> Result<DrainReport> {
        let limit = self.inner.config.max_drain_steps;
        let mut report = DrainReport {
            virtual_time: self.inner.virtual_time.get(),
            ..DrainReport::default()
        };
        loop {
            if self.pending_microtasks() + self.pending_macrotasks() == 0 {
                return Ok(report);
            }
            if report.tasks_run() >= limit {
                return Err(Error::DrainLimitExceeded {
                    limit,
                    pending_microtasks: self.pending_microtasks(),
                    pending_macrotasks: self.pending_macrotasks(),
                });
            }

            let micro = self.inner.microtasks.borrow_mut().pop_front();
            let task = match micro {
                Some(task) => {
                    report.microtasks_run += 1;
                    task
                }
                None => match self.inner.macrotasks.borrow_mut().pop_front() {
                    Some(task) => {
                        report.macrotasks_run += 1;
                        task
                    }
                    None => return Ok(report),
                },
            };
            trace!(id = task.id, delay_ms = task.delay_ms, "running task");
            (task.callback)();
        }
    }

    /// Queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    /// Queued macrotasks
    pub fn pending_macrotasks(&self) -> usize {
        self.inner.macrotasks.borrow().len()
    }

    /// Virtual time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.inner.virtual_time.get()
    }

    pub fn state(&self) -> ClockState {
        self.inner.state.get()
    }

    /// Install as the thread's timers until the guard drops
    pub fn intercept(&self) -> InterceptGuard {
        self.inner.state.set(ClockState::Intercepting);
        debug!("fake clock installed");
        let backend = timers::install(Rc::new(self.clone()));
        InterceptGuard {
            clock: self.clone(),
            _backend: backend,
        }
    }

    fn next_id(&self) -> TimerId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }
}

impl TimerBackend for FakeClock {
    fn set_timeout(&self, callback: TimerCallback, delay_ms: u64) -> TimerId {
        FakeClock::set_timeout(self, callback, delay_ms)
    }

    fn queue_microtask(&self, callback: TimerCallback) {
        FakeClock::queue_microtask(self, callback)
    }

    fn tick(&self, ms: u64) -> Result<DrainReport> {
        self.advance(ms)
    }

    fn now_ms(&self) -> u64 {
        FakeClock::now_ms(self)
    }
}

impl fmt::Debug for FakeClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeClock")
            .field("state", &self.state())
            .field("virtual_time", &self.now_ms())
            .field("pending_microtasks", &self.pending_microtasks())
            .field("pending_macrotasks", &self.pending_macrotasks())
            .finish()
    }
}

/// Keeps a fake clock installed
///
/// Dropping it restores the previous timers, whether the body returned,
/// returned an error, or panicked.
pub struct InterceptGuard {
    clock: FakeClock,
    _backend: BackendGuard,
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        self.clock.inner.state.set(ClockState::Restored);
        debug!(
            pending_microtasks = self.clock.pending_microtasks(),
            pending_macrotasks = self.clock.pending_macrotasks(),
            "fake clock restored"
        );
    }
}

/// Run `body` with a default fake clock installed
pub fn fake_async<R>(body: impl FnOnce(&FakeClock) -> R) -> R {
    fake_async_with(ClockConfig::default(), body)
}

/// Run `body` with a fake clock built from `config` installed
pub fn fake_async_with<R>(config: ClockConfig, body: impl FnOnce(&FakeClock) -> R) -> R {
    let clock = FakeClock::new(config);
    let _guard = clock.intercept();
    body(&clock)
}

/// Turn `body` into a runnable that executes it under a fresh fake clock
pub fn fake_async_wrap<R>(body: impl Fn(&FakeClock) -> R) -> impl Fn() -> R {
    move || fake_async(&body)
}

/// Let `ms` pass on whatever timers are installed
pub fn advance_clock(ms: u64) -> Result<DrainReport> {
    timers::tick(ms)
}
