//! Suite-level run context
//!
//! A [`RunContext`] is created per suite invocation and passed explicitly
//! to everything that needs it: cases, matchers, spy factories. Nothing is
//! shared between two suites.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use testbench::{BenchConfig, MemoryReporter, RunContext};
//!
//! let reporter = Rc::new(MemoryReporter::new());
//! let summary = RunContext::describe(BenchConfig::default(), reporter.clone(), "Math", |suite| {
//!     suite.run_case("adds", |t| {
//!         t.expect(1 + 1).to_be(2);
//!         Ok(())
//!     })
//! })
//! .unwrap();
//! assert_eq!(summary.total, 1);
//! assert_eq!(summary.failed, 0);
//! ```

use crate::config::BenchConfig;
use crate::error::{messages, Error, Result, UsageKind};
use crate::fake_async::{fake_async_with, FakeClock};
use crate::matchers::Matcher;
use crate::reporter::{Diagnostic, ExpectationRecord, Reporter, SuiteSummary};
use crate::spy::Spy;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Hook run before every case
pub type SetupHook = Rc<dyn Fn()>;

/// Lifecycle of a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitePhase {
    /// Created, `begin_suite` not called yet
    Created,
    /// Between `begin_suite` and `finish_suite`
    Running,
    /// `finish_suite` was called
    Finished,
}

struct RunState {
    description: RefCell<String>,
    config: BenchConfig,
    reporter: Rc<dyn Reporter>,
    phase: Cell<SuitePhase>,
    case_count: Cell<usize>,
    skipped_count: Cell<usize>,
    total_expectations: Cell<usize>,
    failed_expectations: Cell<usize>,
    current_case_expectations: Cell<usize>,
    active_case: RefCell<Option<String>>,
    setup_hook: RefCell<Option<SetupHook>>,
}

/// Handle onto one suite's counters, hook, config and reporter
///
/// Cloning yields another handle onto the same suite.
#[derive(Clone)]
pub struct RunContext {
    state: Rc<RunState>,
}

impl RunContext {
    /// Create a fresh context for one suite
    pub fn new(config: BenchConfig, reporter: Rc<dyn Reporter>) -> Self {
        Self {
            state: Rc::new(RunState {
                description: RefCell::new(String::new()),
                config,
                reporter,
                phase: Cell::new(SuitePhase::Created),
                case_count: Cell::new(0),
                skipped_count: Cell::new(0),
                total_expectations: Cell::new(0),
                failed_expectations: Cell::new(0),
                current_case_expectations: Cell::new(0),
                active_case: RefCell::new(None),
                setup_hook: RefCell::new(None),
            }),
        }
    }

    /// Run a whole suite: begin, register/run cases, finish
    ///
    /// An error returned by `body` (typically a failing case propagated with
    /// `?`) propagates without a summary.
    pub fn describe(
        config: BenchConfig,
        reporter: Rc<dyn Reporter>,
        description: &str,
        body: impl FnOnce(&RunContext) -> Result<()>,
    ) -> Result<SuiteSummary> {
        let run = RunContext::new(config, reporter);
        run.begin_suite(description);
        body(&run)?;
        Ok(run.finish_suite())
    }

    /// Start the suite
    pub fn begin_suite(&self, description: &str) {
        *self.state.description.borrow_mut() = description.to_string();
        self.state.phase.set(SuitePhase::Running);
        debug!(suite = description, "suite started");
        self.state.reporter.suite_started(description);
    }

    /// Install the hook run before every case; last registration wins
    pub fn before_each(&self, hook: impl Fn() + 'static) {
        *self.state.setup_hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Run one case
    ///
    /// Resets the per-case counter, runs the setup hook, then the body. A
    /// body that evaluates no expectation produces a
    /// [`Diagnostic::NoExpectations`] but does not fail the suite. A body
    /// error propagates as [`Error::CaseFailed`].
    pub fn run_case(
        &self,
        description: &str,
        body: impl FnOnce(&RunContext) -> anyhow::Result<()>,
    ) -> Result<()> {
        if !self.state.config.selects(description) {
            self.state
                .skipped_count
                .set(self.state.skipped_count.get() + 1);
            debug!(case = description, "case skipped by filter");
            self.diagnostic(Diagnostic::Skipped {
                case: description.to_string(),
            });
            return Ok(());
        }

        self.state.case_count.set(self.state.case_count.get() + 1);
        self.state.current_case_expectations.set(0);
        debug!(case = description, "case started");
        self.state.reporter.case_started(description);

        let _case = ActiveCase::enter(self, description);

        let hook = self.state.setup_hook.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }

        body(self).map_err(|source| Error::case_failed(description, source))?;

        if self.state.current_case_expectations.get() == 0 {
            warn!(case = description, "{}", messages::NO_EXPECTATIONS);
            self.diagnostic(Diagnostic::NoExpectations {
                case: description.to_string(),
            });
        }
        Ok(())
    }

    /// Create a matcher reporting into this suite
    pub fn expect(&self, actual: impl Into<Value>) -> Matcher {
        Matcher::new(actual.into(), Some(self.clone()))
    }

    /// Create a spy
    pub fn create_spy(&self, name: Option<&str>) -> Spy {
        Spy::new(name)
    }

    /// Run `body` with a fake clock built from this suite's clock config
    pub fn fake_async<R>(&self, body: impl FnOnce(&FakeClock) -> R) -> R {
        fake_async_with(self.state.config.clock.clone(), body)
    }

    /// Count one evaluated expectation
    pub fn record_expectation(&self) {
        let state = &self.state;
        state.total_expectations.set(state.total_expectations.get() + 1);
        state
            .current_case_expectations
            .set(state.current_case_expectations.get() + 1);
    }

    /// Count one failed expectation
    pub fn record_failure(&self) {
        let state = &self.state;
        state.failed_expectations.set(state.failed_expectations.get() + 1);
    }

    /// Close the suite and report its summary
    pub fn finish_suite(&self) -> SuiteSummary {
        let summary = self.summary();
        if summary.cases == 0 && summary.skipped == 0 {
            warn!(suite = %summary.description, "{}", messages::NO_CASES);
            self.diagnostic(Diagnostic::NoCases {
                suite: summary.description.clone(),
            });
        }
        self.state.phase.set(SuitePhase::Finished);
        info!(
            suite = %summary.description,
            total = summary.total,
            failed = summary.failed,
            "suite finished"
        );
        self.state.reporter.suite_finished(&summary);
        summary
    }

    /// Current counts
    pub fn summary(&self) -> SuiteSummary {
        SuiteSummary {
            description: self.state.description.borrow().clone(),
            cases: self.state.case_count.get(),
            skipped: self.state.skipped_count.get(),
            total: self.state.total_expectations.get(),
            failed: self.state.failed_expectations.get(),
        }
    }

    /// Expectations evaluated by the running (or last) case
    pub fn current_case_expectations(&self) -> usize {
        self.state.current_case_expectations.get()
    }

    /// Description of the running case
    pub fn active_case(&self) -> Option<String> {
        self.state.active_case.borrow().clone()
    }

    /// Lifecycle phase
    pub fn phase(&self) -> SuitePhase {
        self.state.phase.get()
    }

    /// The configuration this suite runs with
    pub fn config(&self) -> &BenchConfig {
        &self.state.config
    }

    /// Whether both handles refer to the same suite
    pub fn same_context(&self, other: &RunContext) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Count and report one evaluated expectation
    ///
    /// Outside a running case the evaluation is a usage error: nothing is
    /// counted.
    pub(crate) fn report_expectation(&self, record: ExpectationRecord) {
        if self.state.active_case.borrow().is_none() {
            self.report_usage(UsageKind::OutsideCase, messages::OUTSIDE_CASE);
            return;
        }

        self.record_expectation();
        if !record.passed {
            self.record_failure();
        }
        self.state.reporter.expectation(&record);
        if let Some(label) = record.context {
            self.diagnostic(Diagnostic::Context { label });
        }
    }

    /// Report framework misuse; never counted
    pub(crate) fn report_usage(&self, usage: UsageKind, message: &str) {
        warn!(%usage, case = ?self.active_case(), "{}", message);
        self.diagnostic(Diagnostic::Usage {
            usage,
            message: message.to_string(),
        });
    }

    fn diagnostic(&self, diagnostic: Diagnostic) {
        self.state.reporter.diagnostic(&diagnostic);
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("summary", &self.summary())
            .field("phase", &self.phase())
            .field("active_case", &self.active_case())
            .finish()
    }
}

/// Marks a case as running; cleared on every exit path
struct ActiveCase<'a> {
    run: &'a RunContext,
}

impl<'a> ActiveCase<'a> {
    fn enter(run: &'a RunContext, description: &str) -> Self {
        *run.state.active_case.borrow_mut() = Some(description.to_string());
        Self { run }
    }
}

impl Drop for ActiveCase<'_> {
    fn drop(&mut self) {
        *self.run.state.active_case.borrow_mut() = None;
    }
}
