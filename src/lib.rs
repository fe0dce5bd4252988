//! TestBench: a small unit-testing framework
//!
//! Suites and cases, expectation matchers, call-recording spies, and a fake
//! clock that makes timer-driven code run deterministically. Results are
//! pushed as plain events into a pluggable [`Reporter`].
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use testbench::dsl::{describe_with, expect, it};
//! use testbench::{BenchConfig, MemoryReporter};
//!
//! fn main() -> testbench::Result<()> {
//!     let reporter = Rc::new(MemoryReporter::new());
//!     let summary = describe_with(BenchConfig::default(), reporter, "Math", || {
//!         it("adds", || {
//!             expect(1 + 2).to_be(3);
//!             expect([1, 2, 3]).not().to_equal([3, 2, 1]);
//!             Ok(())
//!         })
//!     })?;
//!     assert!(summary.is_success());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Values** | [`value`] |
//! | **Core** | [`spy`], [`matchers`], [`fake_async`], [`timers`] |
//! | **Suites** | [`run_context`], [`dsl`] |
//! | **Output** | [`reporter`], [`logging`] |
//! | **Setup** | [`config`], [`error`](Error) |
#![allow(clippy::new_without_default)]
#![allow(clippy::should_implement_trait)]

pub mod config;
pub mod dsl;
pub mod error;
pub mod fake_async;
pub mod logging;
pub mod matchers;
pub mod prelude;
pub mod reporter;
pub mod run_context;
pub mod spy;
pub mod timers;
pub mod value;

pub use config::{BenchConfig, ClockConfig, WaitMode};
pub use error::{Error, Result, UsageKind};
pub use fake_async::{advance_clock, fake_async, fake_async_with, fake_async_wrap, ClockState, FakeClock};
pub use matchers::{MatchPattern, Matcher};
pub use reporter::{
    ConsoleReporter, Diagnostic, ExpectationRecord, JsonLinesReporter, MemoryReporter, ReportEvent,
    Reporter, SuiteSummary,
};
pub use run_context::RunContext;
pub use spy::{CallStamp, Spy, SpyLike};
pub use timers::DrainReport;
pub use value::{Callable, Element, Thrown, Value, ValueKind};
