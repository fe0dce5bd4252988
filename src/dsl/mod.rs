//! Free-function suite API
//!
//! `describe`/`it`/`expect` read the suite from a thread-local stack that
//! `describe` pushes for the duration of its body. Every `describe` pushes a
//! fresh [`RunContext`]; nested suites restore the outer one on return.
//!
//! ```
//! use testbench::dsl::{before_each, describe_with, expect, it};
//! use testbench::{BenchConfig, MemoryReporter};
//! use std::rc::Rc;
//!
//! let reporter = Rc::new(MemoryReporter::new());
//! let summary = describe_with(BenchConfig::default(), reporter, "Counter", || {
//!     before_each(|| {});
//!     it("starts at zero", || {
//!         expect(0).to_be(0);
//!         Ok(())
//!     })
//! })
//! .unwrap();
//! assert_eq!(summary.to_string(), "1 / 1 tests passed");
//! ```

use crate::config::BenchConfig;
use crate::error::{messages, Result, UsageKind};
use crate::matchers::Matcher;
use crate::reporter::{ConsoleReporter, Reporter, SuiteSummary};
use crate::run_context::RunContext;
use crate::spy::Spy;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

pub use crate::fake_async::{advance_clock, fake_async_wrap};

thread_local! {
    static ACTIVE: RefCell<Vec<RunContext>> = const { RefCell::new(Vec::new()) };
}

/// Pops the suite pushed by `describe` on every exit path
struct ActiveSuite;

impl ActiveSuite {
    fn push(run: RunContext) -> Self {
        ACTIVE.with(|stack| stack.borrow_mut().push(run));
        ActiveSuite
    }
}

impl Drop for ActiveSuite {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|stack| stack.borrow_mut().pop());
    }
}

/// The suite the free functions currently talk to
pub fn current_context() -> Option<RunContext> {
    ACTIVE.with(|stack| stack.borrow().last().cloned())
}

/// Run a suite reporting to stdout
pub fn describe(description: &str, body: impl FnOnce() -> Result<()>) -> Result<SuiteSummary> {
    let config = BenchConfig::default();
    let reporter = Rc::new(ConsoleReporter::stdout(config.verbose));
    describe_with(config, reporter, description, body)
}

/// Run a suite with explicit configuration and reporter
pub fn describe_with(
    config: BenchConfig,
    reporter: Rc<dyn Reporter>,
    description: &str,
    body: impl FnOnce() -> Result<()>,
) -> Result<SuiteSummary> {
    RunContext::describe(config, reporter, description, |run| {
        let _active = ActiveSuite::push(run.clone());
        body()
    })
}

/// Run one case in the current suite
///
/// Outside any suite this is a usage error and the body does not run.
pub fn it(description: &str, body: impl FnOnce() -> anyhow::Result<()>) -> Result<()> {
    match current_context() {
        Some(run) => run.run_case(description, |_| body()),
        None => {
            warn!(usage = %UsageKind::OutsideSuite, case = description, "{}", messages::OUTSIDE_SUITE);
            Ok(())
        }
    }
}

/// Install the setup hook of the current suite
pub fn before_each(hook: impl Fn() + 'static) {
    match current_context() {
        Some(run) => run.before_each(hook),
        None => warn!(usage = %UsageKind::OutsideSuite, "{}", messages::OUTSIDE_SUITE),
    }
}

/// Create a matcher against the current suite
pub fn expect(actual: impl Into<Value>) -> Matcher {
    Matcher::new(actual.into(), current_context())
}

/// Create a spy
pub fn create_spy(name: Option<&str>) -> Spy {
    Spy::new(name)
}
