//! Error types for TestBench

use std::fmt;
use thiserror::Error;

/// Main error type for TestBench
///
/// Assertion failures are *not* errors: they are recorded as failed
/// expectations and the suite keeps running. This type covers the things
/// that actually stop control flow.
#[derive(Error, Debug)]
pub enum Error {
    /// A case body returned an error; it propagates out of `run_case`
    #[error("CaseFailed: '{case}': {source}")]
    CaseFailed {
        case: String,
        #[source]
        source: anyhow::Error,
    },

    /// Draining the fake clock queues did not settle within the step limit
    #[error(
        "DrainLimitExceeded: drained {limit} tasks without settling \
         (pending microtasks={pending_microtasks}, macrotasks={pending_macrotasks})"
    )]
    DrainLimitExceeded {
        limit: usize,
        pending_microtasks: usize,
        pending_macrotasks: usize,
    },

    /// Reporter output failed
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap a case body error with the case description
    pub fn case_failed(case: impl Into<String>, source: anyhow::Error) -> Self {
        Error::CaseFailed {
            case: case.into(),
            source,
        }
    }
}

/// Result type alias for TestBench
pub type Result<T> = std::result::Result<T, Error>;

/// Kinds of framework misuse
///
/// A usage error is reported to the diagnostic channel and never counted as
/// an expectation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UsageKind {
    /// A spy predicate was applied to something that is not spy-like
    NotASpy,
    /// `to_have_class` was applied to something that is not an element
    NotAnElement,
    /// A throw-family predicate was applied to something that is not callable
    NotAFunction,
    /// An assertion was evaluated while no test case was running
    OutsideCase,
    /// A case was registered while no suite was running
    OutsideSuite,
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageKind::NotASpy => write!(f, "NotASpy"),
            UsageKind::NotAnElement => write!(f, "NotAnElement"),
            UsageKind::NotAFunction => write!(f, "NotAFunction"),
            UsageKind::OutsideCase => write!(f, "OutsideCase"),
            UsageKind::OutsideSuite => write!(f, "OutsideSuite"),
        }
    }
}

/// Standardized diagnostic message templates
pub mod messages {
    pub const NOT_A_SPY: &str = "The specified value to check is not a spy";
    pub const EXPECTED_NOT_A_SPY: &str = "The specified value / expected to check is not a spy";
    pub const NOT_AN_ELEMENT: &str = "The specified value to check is not an element";
    pub const NOT_A_FUNCTION: &str = "The specified value to check is not a function";
    pub const OUTSIDE_CASE: &str = "Expectations have to run inside a test case";
    pub const OUTSIDE_SUITE: &str = "Tests have to run inside a describe block";

    pub const NO_EXPECTATIONS: &str = "No expectations for test case found!";
    pub const NO_CASES: &str = "No test cases found!";
}
