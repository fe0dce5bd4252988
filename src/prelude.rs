//! Prelude module for convenient imports
//!
//! ```
//! use testbench::prelude::*;
//!
//! let spy = create_spy(Some("save"));
//! spy.call(&args!["doc"]);
//! assert_eq!(spy.times_called(), 1);
//! ```

// Suite API
pub use crate::dsl::{before_each, create_spy, describe, describe_with, expect, it};
pub use crate::fake_async::{advance_clock, fake_async, fake_async_wrap, FakeClock};

// Values and spies
pub use crate::spy::{Spy, SpyLike};
pub use crate::value::{Element, Thrown, Value, ValueKind};
pub use crate::{args, obj};

// Configuration, reporting, errors
pub use crate::config::BenchConfig;
pub use crate::error::{Error, Result};
pub use crate::reporter::{ConsoleReporter, MemoryReporter, Reporter, SuiteSummary};
pub use crate::run_context::RunContext;
