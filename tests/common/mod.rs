//! Shared test helpers for integration tests

use std::rc::Rc;
use testbench::dsl::describe_with;
use testbench::{BenchConfig, MemoryReporter, RunContext, SuiteSummary};

/// Run a dsl suite against an in-memory reporter
pub fn run_suite(
    description: &str,
    body: impl FnOnce() -> testbench::Result<()>,
) -> (SuiteSummary, Rc<MemoryReporter>) {
    let reporter = Rc::new(MemoryReporter::new());
    let summary = describe_with(BenchConfig::default(), reporter.clone(), description, body)
        .expect("suite should not error");
    (summary, reporter)
}

/// A running suite with an explicit context, for single-case checks
#[allow(dead_code)]
pub fn explicit_suite(description: &str) -> (RunContext, Rc<MemoryReporter>) {
    let reporter = Rc::new(MemoryReporter::new());
    let run = RunContext::new(BenchConfig::default(), reporter.clone());
    run.begin_suite(description);
    (run, reporter)
}

/// Descriptions of every reported expectation, in order
#[allow(dead_code)]
pub fn descriptions(reporter: &MemoryReporter) -> Vec<String> {
    reporter
        .expectations()
        .into_iter()
        .map(|record| record.description)
        .collect()
}
