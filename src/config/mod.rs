//! Run configuration

use serde::{Deserialize, Serialize};

/// How `advance` lets the requested milliseconds elapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitMode {
    /// Move the virtual clock forward; never block
    #[default]
    Simulated,
    /// Block the calling thread for the requested real time
    RealTime,
}

/// Configuration for fake clocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// How `advance` treats the requested duration.
    pub wait: WaitMode,
    /// Maximum number of tasks one drain may run before giving up
    /// (a timer that keeps re-registering itself never settles).
    pub max_drain_steps: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            wait: WaitMode::Simulated,
            max_drain_steps: 10_000,
        }
    }
}

/// Configuration for a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Only cases whose description contains the pattern run; the rest are
    /// skipped.
    pub filter: Option<String>,
    /// Report passing expectations too, not only failures.
    pub verbose: bool,
    /// Clock used by `RunContext::fake_async`.
    pub clock: ClockConfig,
}

impl BenchConfig {
    /// Restrict the run to cases containing `pattern`
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Toggle verbose reporting
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the clock configuration
    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a case with this description passes the filter
    pub fn selects(&self, description: &str) -> bool {
        match &self.filter {
            Some(pattern) => description.contains(pattern.as_str()),
            None => true,
        }
    }
}
