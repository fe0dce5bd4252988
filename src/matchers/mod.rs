//! Matcher engine
//!
//! [`Matcher`] captures a subject once and exposes named predicates. Every
//! predicate computes a raw boolean, flips it when negated, reports the
//! outcome to the run context, and returns the final pass/fail.
//!
//! Spy predicates live in [`spy_matchers`](self::spy_matchers), the throw
//! family in [`throw_matchers`](self::throw_matchers).

mod spy_matchers;
mod throw_matchers;

use crate::error::{messages, UsageKind};
use crate::reporter::ExpectationRecord;
use crate::run_context::RunContext;
use crate::value::{Value, ValueKind};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

/// Decimal places used by `to_be_close_to` when none are given
pub const DEFAULT_PRECISION: u32 = 2;

/// Pattern accepted by [`Matcher::to_match`]
#[derive(Debug, Clone)]
pub enum MatchPattern {
    /// Regular expression search
    Regex(Regex),
    /// Plain substring search
    Substring(String),
}

impl MatchPattern {
    /// Whether `text` matches
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            MatchPattern::Regex(re) => re.is_match(text),
            MatchPattern::Substring(needle) => text.contains(needle.as_str()),
        }
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            MatchPattern::Substring(needle) => write!(f, "{}", needle),
        }
    }
}

impl From<Regex> for MatchPattern {
    fn from(re: Regex) -> Self {
        MatchPattern::Regex(re)
    }
}

impl From<&Regex> for MatchPattern {
    fn from(re: &Regex) -> Self {
        MatchPattern::Regex(re.clone())
    }
}

impl From<&str> for MatchPattern {
    fn from(needle: &str) -> Self {
        MatchPattern::Substring(needle.to_string())
    }
}

impl From<String> for MatchPattern {
    fn from(needle: String) -> Self {
        MatchPattern::Substring(needle)
    }
}

/// An actual value plus polarity and diagnostic context
///
/// Matchers are immutable: [`not`](Matcher::not) and
/// [`with_context`](Matcher::with_context) return new matchers.
#[derive(Clone)]
pub struct Matcher {
    subject: Value,
    negated: bool,
    context_label: Option<String>,
    run: Option<RunContext>,
}

impl Matcher {
    /// Create a matcher reporting to `run`, or to nobody when `None`
    pub fn new(subject: Value, run: Option<RunContext>) -> Self {
        Self {
            subject,
            negated: false,
            context_label: None,
            run,
        }
    }

    /// Same subject and context, opposite polarity
    pub fn not(&self) -> Matcher {
        Matcher {
            negated: !self.negated,
            ..self.clone()
        }
    }

    /// Same subject and polarity, with a context label
    pub fn with_context(&self, message: impl Into<String>) -> Matcher {
        Matcher {
            context_label: Some(message.into()),
            ..self.clone()
        }
    }

    /// The captured subject
    pub fn subject(&self) -> &Value {
        &self.subject
    }

    /// Whether this matcher is negated
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Context label, if any
    pub fn context(&self) -> Option<&str> {
        self.context_label.as_deref()
    }

    // -----------------------------------------------------------------------
    // Equality
    // -----------------------------------------------------------------------

    /// Strict equality
    pub fn to_be(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = self.subject.strict_equals(&expected);
        self.evaluate(result, with_value("to be", &expected))
    }

    /// Deep structural equality
    pub fn to_equal(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = self.subject.deep_equals(&expected);
        self.evaluate(result, with_value("to equal", &expected))
    }

    // -----------------------------------------------------------------------
    // Truthiness and special values
    // -----------------------------------------------------------------------

    pub fn to_be_truthy(&self) -> bool {
        self.evaluate(self.subject.to_boolean(), "to be truthy".into())
    }

    pub fn to_be_falsy(&self) -> bool {
        self.evaluate(!self.subject.to_boolean(), "to be falsy".into())
    }

    pub fn to_be_null(&self) -> bool {
        self.evaluate(self.subject.is_null(), "to be null".into())
    }

    pub fn to_be_undefined(&self) -> bool {
        self.evaluate(self.subject.is_undefined(), "to be undefined".into())
    }

    pub fn to_be_defined(&self) -> bool {
        self.evaluate(!self.subject.is_undefined(), "to be defined".into())
    }

    pub fn to_be_true(&self) -> bool {
        let result = matches!(self.subject, Value::Boolean(true));
        self.evaluate(result, "to be true".into())
    }

    pub fn to_be_false(&self) -> bool {
        let result = matches!(self.subject, Value::Boolean(false));
        self.evaluate(result, "to be false".into())
    }

    /// Subject is a NaN number; no coercion
    pub fn to_be_nan(&self) -> bool {
        let result = matches!(self.subject, Value::Number(n) if n.is_nan());
        self.evaluate(result, "to be NaN".into())
    }

    pub fn to_be_positive_infinity(&self) -> bool {
        let result = matches!(self.subject, Value::Number(n) if n == f64::INFINITY);
        self.evaluate(result, "to be positive infinity".into())
    }

    pub fn to_be_negative_infinity(&self) -> bool {
        let result = matches!(self.subject, Value::Number(n) if n == f64::NEG_INFINITY);
        self.evaluate(result, "to be negative infinity".into())
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    pub fn to_be_greater_than(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = compare(&self.subject, &expected) == Some(Ordering::Greater);
        self.evaluate(result, with_value("to be greater than", &expected))
    }

    pub fn to_be_greater_than_or_equal(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = matches!(
            compare(&self.subject, &expected),
            Some(Ordering::Greater | Ordering::Equal)
        );
        self.evaluate(result, with_value("to be greater than or equal", &expected))
    }

    pub fn to_be_less_than(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = compare(&self.subject, &expected) == Some(Ordering::Less);
        self.evaluate(result, with_value("to be less than", &expected))
    }

    pub fn to_be_less_than_or_equal(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = matches!(
            compare(&self.subject, &expected),
            Some(Ordering::Less | Ordering::Equal)
        );
        self.evaluate(result, with_value("to be less than or equal", &expected))
    }

    /// Both numbers rounded half-up to `precision` decimals are equal
    ///
    /// `None` means [`DEFAULT_PRECISION`]; `Some(0)` rounds to integers.
    pub fn to_be_close_to(
        &self,
        expected: impl Into<Value>,
        precision: impl Into<Option<u32>>,
    ) -> bool {
        let expected = expected.into();
        let precision = precision.into().unwrap_or(DEFAULT_PRECISION);
        let result = close_to(self.subject.to_number(), expected.to_number(), precision);
        self.evaluate(result, with_value("to be close to", &expected))
    }

    // -----------------------------------------------------------------------
    // Collections and text
    // -----------------------------------------------------------------------

    /// Substring, array element, or object key membership
    pub fn to_contain(&self, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        let result = match &self.subject {
            Value::String(haystack) => haystack.contains(expected.to_string().as_str()),
            Value::Array(items) => items.iter().any(|item| item.deep_equals(&expected)),
            Value::Object(map) => map.contains_key(expected.to_string().as_str()),
            _ => false,
        };
        self.evaluate(result, with_value("to contain", &expected))
    }

    /// Number of keys
    pub fn to_have_size(&self, expected: usize) -> bool {
        let result = self.subject.keys().len() == expected;
        self.evaluate(result, with_value("to have size", &Value::from(expected)))
    }

    /// Rendered subject matches a regex or contains a substring
    pub fn to_match(&self, pattern: impl Into<MatchPattern>) -> bool {
        let pattern = pattern.into();
        let result = pattern.is_match(&self.subject.to_string());
        self.evaluate(result, format!("to match \"{}\"", pattern))
    }

    /// Class list membership on an element
    pub fn to_have_class(&self, class_name: &str) -> bool {
        let Value::Element(element) = &self.subject else {
            return self.usage(UsageKind::NotAnElement, messages::NOT_AN_ELEMENT);
        };
        let result = element.has_class(class_name);
        self.evaluate(result, format!("to have class \"{}\"", class_name))
    }

    pub fn to_be_instance_of(&self, kind: ValueKind) -> bool {
        let result = self.subject.kind() == kind;
        self.evaluate(result, format!("to be instance of \"{}\"", kind))
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Apply polarity, report, and return the final outcome
    pub(crate) fn evaluate(&self, result: bool, expectation: String) -> bool {
        let passed = result ^ self.negated;
        let record = ExpectationRecord {
            passed,
            description: self.expectation_text(&expectation),
            context: self.context_label.clone(),
        };
        match &self.run {
            Some(run) => run.report_expectation(record),
            None => warn!(
                expectation = %record.description,
                "{}", messages::OUTSIDE_CASE
            ),
        }
        passed
    }

    /// Report framework misuse; nothing is counted
    pub(crate) fn usage(&self, kind: UsageKind, message: &str) -> bool {
        match &self.run {
            Some(run) => run.report_usage(kind, message),
            None => warn!(usage = %kind, "{}", message),
        }
        false
    }

    fn expectation_text(&self, expectation: &str) -> String {
        let mut parts = vec!["Expect".to_string(), self.subject_label()];
        if self.negated {
            parts.push("not".to_string());
        }
        parts.push(expectation.to_string());
        parts.join(" ")
    }

    fn subject_label(&self) -> String {
        match self.subject.as_spy().and_then(|spy| spy.spy_name()) {
            Some(name) => name,
            None => quoted(&self.subject),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("subject", &self.subject)
            .field("negated", &self.negated)
            .field("context_label", &self.context_label)
            .field("attached", &self.run.is_some())
            .finish()
    }
}

fn quoted(value: &Value) -> String {
    format!("\"{}\"", value)
}

fn with_value(text: &str, expected: &Value) -> String {
    format!("{} {}", text, quoted(expected))
}

/// Strings compare lexicographically, everything else numerically
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => actual.to_number().partial_cmp(&expected.to_number()),
    }
}

fn close_to(actual: f64, expected: f64, precision: u32) -> bool {
    let scale = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    let (scaled_actual, scaled_expected) = (actual * scale, expected * scale);
    // Scaling past f64 range rounds nothing, so compare the raw values.
    if !scaled_actual.is_finite() || !scaled_expected.is_finite() {
        return actual == expected;
    }
    (scaled_actual + 0.5).floor() == (scaled_expected + 0.5).floor()
}
