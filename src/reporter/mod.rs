//! Reporting sink
//!
//! The run context pushes plain result events into a [`Reporter`]; how they
//! are presented (console text, JSON lines, a DOM, ...) is the reporter's
//! business.

use crate::error::{messages, Result, UsageKind};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};

/// Outcome of one evaluated expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectationRecord {
    /// Final pass/fail after negation.
    pub passed: bool,
    /// Human-readable expectation, e.g. `Expect "3" not to be "4"`.
    pub description: String,
    /// Label attached through `with_context`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Aggregated counts for one suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    /// Suite description from `describe`.
    pub description: String,
    /// Cases that ran.
    pub cases: usize,
    /// Cases excluded by the filter.
    pub skipped: usize,
    /// Evaluated expectations.
    pub total: usize,
    /// Failed expectations.
    pub failed: usize,
}

impl SuiteSummary {
    /// Expectations that passed
    pub fn passed(&self) -> usize {
        self.total - self.failed
    }

    /// No expectation failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} tests passed", self.passed(), self.total)?;
        if self.failed > 0 {
            write!(f, ", {} / {} tests failed", self.failed, self.total)?;
        }
        Ok(())
    }
}

/// Side-channel messages that never count as expectation results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A case finished without evaluating a single expectation
    NoExpectations { case: String },
    /// A suite finished without registering a case
    NoCases { suite: String },
    /// A case was excluded by the configured filter
    Skipped { case: String },
    /// The framework was misused
    Usage { usage: UsageKind, message: String },
    /// Context label of the expectation just reported
    Context { label: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoExpectations { case } => {
                write!(f, "{} ({})", messages::NO_EXPECTATIONS, case)
            }
            Diagnostic::NoCases { suite } => write!(f, "{} ({})", messages::NO_CASES, suite),
            Diagnostic::Skipped { case } => write!(f, "Skipped: {}", case),
            Diagnostic::Usage { usage, message } => write!(f, "{}: {}", usage, message),
            Diagnostic::Context { label } => write!(f, "Context: {}", label),
        }
    }
}

/// Every event a reporter can receive, as one serializable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    SuiteStarted { description: String },
    CaseStarted { description: String },
    Expectation(ExpectationRecord),
    Diagnostic(Diagnostic),
    SuiteFinished(SuiteSummary),
}

/// Consumer of result events
///
/// Methods take `&self`; implementations use interior mutability, like the
/// rest of this single-threaded crate.
pub trait Reporter {
    /// A suite began
    fn suite_started(&self, _description: &str) {}

    /// A case began (after the filter accepted it)
    fn case_started(&self, _description: &str) {}

    /// An expectation was evaluated
    fn expectation(&self, record: &ExpectationRecord);

    /// A diagnostic was emitted
    fn diagnostic(&self, _diagnostic: &Diagnostic) {}

    /// A suite finished
    fn suite_finished(&self, _summary: &SuiteSummary) {}
}

// ---------------------------------------------------------------------------
// MemoryReporter
// ---------------------------------------------------------------------------

/// Collects every event for later inspection
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: RefCell<Vec<ReportEvent>>,
}

impl MemoryReporter {
    /// Create an empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.borrow().clone()
    }

    /// Expectation records so far
    pub fn expectations(&self) -> Vec<ExpectationRecord> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Expectation(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Diagnostics so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Diagnostic(diagnostic) => Some(diagnostic.clone()),
                _ => None,
            })
            .collect()
    }

    /// Suite summaries so far
    pub fn summaries(&self) -> Vec<SuiteSummary> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::SuiteFinished(summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: ReportEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Reporter for MemoryReporter {
    fn suite_started(&self, description: &str) {
        self.push(ReportEvent::SuiteStarted {
            description: description.to_string(),
        });
    }

    fn case_started(&self, description: &str) {
        self.push(ReportEvent::CaseStarted {
            description: description.to_string(),
        });
    }

    fn expectation(&self, record: &ExpectationRecord) {
        self.push(ReportEvent::Expectation(record.clone()));
    }

    fn diagnostic(&self, diagnostic: &Diagnostic) {
        self.push(ReportEvent::Diagnostic(diagnostic.clone()));
    }

    fn suite_finished(&self, summary: &SuiteSummary) {
        self.push(ReportEvent::SuiteFinished(summary.clone()));
    }
}

// ---------------------------------------------------------------------------
// ConsoleReporter
// ---------------------------------------------------------------------------

/// Plain-text reporter
///
/// Write failures do not interrupt the run; the first one is kept and
/// returned by [`finish`](ConsoleReporter::finish).
pub struct ConsoleReporter<W: Write> {
    out: RefCell<W>,
    verbose: bool,
    error: RefCell<Option<io::Error>>,
}

impl ConsoleReporter<io::Stdout> {
    /// Report to standard output
    pub fn stdout(verbose: bool) -> Self {
        Self::new(io::stdout(), verbose)
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Report to an arbitrary writer
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out: RefCell::new(out),
            verbose,
            error: RefCell::new(None),
        }
    }

    /// Flush and hand back the writer, or the first write error
    pub fn finish(self) -> Result<W> {
        if let Some(err) = self.error.into_inner() {
            return Err(err.into());
        }
        let mut out = self.out.into_inner();
        out.flush()?;
        Ok(out)
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        let result = writeln!(self.out.borrow_mut(), "{}", args);
        if let Err(err) = result {
            self.error.borrow_mut().get_or_insert(err);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn suite_started(&self, description: &str) {
        self.line(format_args!("\nTest: {}", description));
    }

    fn case_started(&self, description: &str) {
        self.line(format_args!("\n  {}", description));
    }

    fn expectation(&self, record: &ExpectationRecord) {
        if record.passed {
            if self.verbose {
                self.line(format_args!("    ✓ {} (passed)", record.description));
            }
        } else {
            self.line(format_args!("    ✗ {} (failed)", record.description));
        }
    }

    fn diagnostic(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            // Context only matters next to a line that was printed.
            Diagnostic::Context { .. } if !self.verbose => {}
            _ => self.line(format_args!("      {}", diagnostic)),
        }
    }

    fn suite_finished(&self, summary: &SuiteSummary) {
        self.line(format_args!(
            "\n{} / {} tests passed",
            summary.passed(),
            summary.total
        ));
        if summary.failed > 0 {
            self.line(format_args!(
                "{} / {} tests failed",
                summary.failed, summary.total
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// JsonLinesReporter
// ---------------------------------------------------------------------------

/// One JSON object per event, newline separated
pub struct JsonLinesReporter<W: Write> {
    out: RefCell<W>,
    error: RefCell<Option<io::Error>>,
}

impl<W: Write> JsonLinesReporter<W> {
    /// Report to an arbitrary writer
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
            error: RefCell::new(None),
        }
    }

    /// Flush and hand back the writer, or the first write error
    pub fn finish(self) -> Result<W> {
        if let Some(err) = self.error.into_inner() {
            return Err(err.into());
        }
        let mut out = self.out.into_inner();
        out.flush()?;
        Ok(out)
    }

    fn emit(&self, event: &ReportEvent) {
        let mut out = self.out.borrow_mut();
        let result = serde_json::to_writer(&mut *out, event)
            .map_err(io::Error::from)
            .and_then(|_| out.write_all(b"\n"));
        if let Err(err) = result {
            self.error.borrow_mut().get_or_insert(err);
        }
    }
}

impl<W: Write> Reporter for JsonLinesReporter<W> {
    fn suite_started(&self, description: &str) {
        self.emit(&ReportEvent::SuiteStarted {
            description: description.to_string(),
        });
    }

    fn case_started(&self, description: &str) {
        self.emit(&ReportEvent::CaseStarted {
            description: description.to_string(),
        });
    }

    fn expectation(&self, record: &ExpectationRecord) {
        self.emit(&ReportEvent::Expectation(record.clone()));
    }

    fn diagnostic(&self, diagnostic: &Diagnostic) {
        self.emit(&ReportEvent::Diagnostic(diagnostic.clone()));
    }

    fn suite_finished(&self, summary: &SuiteSummary) {
        self.emit(&ReportEvent::SuiteFinished(summary.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(passed: bool, description: &str) -> ExpectationRecord {
        ExpectationRecord {
            passed,
            description: description.to_string(),
            context: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = SuiteSummary {
            description: "math".into(),
            cases: 2,
            skipped: 0,
            total: 5,
            failed: 2,
        };
        assert_eq!(summary.passed(), 3);
        assert!(!summary.is_success());
        assert_eq!(summary.to_string(), "3 / 5 tests passed, 2 / 5 tests failed");
    }

    #[test]
    fn test_memory_reporter_filters() {
        let reporter = MemoryReporter::new();
        reporter.suite_started("s");
        reporter.expectation(&record(true, "a"));
        reporter.diagnostic(&Diagnostic::NoCases { suite: "s".into() });
        reporter.suite_finished(&SuiteSummary::default());

        assert_eq!(reporter.events().len(), 4);
        assert_eq!(reporter.expectations(), vec![record(true, "a")]);
        assert_eq!(reporter.diagnostics().len(), 1);
        assert_eq!(reporter.summaries().len(), 1);

        reporter.clear();
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_console_reporter_quiet_hides_passes() {
        let reporter = ConsoleReporter::new(Vec::new(), false);
        reporter.suite_started("Math");
        reporter.case_started("adds");
        reporter.expectation(&record(true, "Expect \"2\" to be \"2\""));
        reporter.expectation(&record(false, "Expect \"1\" to be \"2\""));
        reporter.suite_finished(&SuiteSummary {
            description: "Math".into(),
            cases: 1,
            skipped: 0,
            total: 2,
            failed: 1,
        });
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        assert!(text.contains("Test: Math"));
        assert!(!text.contains("(passed)"));
        assert!(text.contains("✗ Expect \"1\" to be \"2\" (failed)"));
        assert!(text.contains("1 / 2 tests passed"));
        assert!(text.contains("1 / 2 tests failed"));
    }

    #[test]
    fn test_console_reporter_verbose_shows_context() {
        let reporter = ConsoleReporter::new(Vec::new(), true);
        reporter.expectation(&record(true, "Expect \"x\" to be truthy"));
        reporter.diagnostic(&Diagnostic::Context {
            label: "login flow".into(),
        });
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        assert!(text.contains("✓ Expect \"x\" to be truthy (passed)"));
        assert!(text.contains("Context: login flow"));
    }

    #[test]
    fn test_json_lines_reporter() {
        let reporter = JsonLinesReporter::new(Vec::new());
        reporter.expectation(&ExpectationRecord {
            passed: false,
            description: "d".into(),
            context: Some("c".into()),
        });
        reporter.diagnostic(&Diagnostic::Usage {
            usage: UsageKind::NotASpy,
            message: "m".into(),
        });
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "expectation");
        assert_eq!(lines[0]["passed"], false);
        assert_eq!(lines[0]["context"], "c");
        assert_eq!(lines[1]["event"], "diagnostic");
        assert_eq!(lines[1]["kind"], "usage");
        assert_eq!(lines[1]["usage"], "NotASpy");
    }
}
