//! The throw family
//!
//! The subject is called with no arguments inside a caught scope. Both an
//! `Err(Thrown)` return and a panic count as a throw; a panic surfaces as a
//! [`Thrown`] named [`PANIC`].

use super::Matcher;
use crate::error::{messages, UsageKind};
use crate::value::Thrown;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Name given to a panic caught by the throw family
pub const PANIC: &str = "Panic";

impl Matcher {
    /// Calling the subject throws; when `expected` is given, the thrown name
    /// must equal it
    pub fn to_throw<'a>(&self, expected: impl Into<Option<&'a str>>) -> bool {
        let expected = expected.into();
        let Some(outcome) = self.invoke_subject() else {
            return self.usage(UsageKind::NotAFunction, messages::NOT_A_FUNCTION);
        };
        let result = outcome.is_some_and(|thrown| expected.map_or(true, |name| thrown.name == name));
        self.evaluate(result, format!("to throw \"{}\"", expected.unwrap_or_default()))
    }

    /// Calling the subject throws an error matching the given name and/or
    /// message
    pub fn to_throw_error<'a>(
        &self,
        name: impl Into<Option<&'a str>>,
        message: impl Into<Option<&'a str>>,
    ) -> bool {
        let name = name.into();
        let message = message.into();
        let Some(outcome) = self.invoke_subject() else {
            return self.usage(UsageKind::NotAFunction, messages::NOT_A_FUNCTION);
        };
        let result = outcome.is_some_and(|thrown| {
            name.map_or(true, |n| thrown.name == n) && message.map_or(true, |m| thrown.message == m)
        });
        let expected = match (name, message) {
            (Some(n), Some(m)) => format!("{}: {}", n, m),
            (Some(text), None) | (None, Some(text)) => text.to_string(),
            (None, None) => String::new(),
        };
        self.evaluate(result, format!("to throw error \"{}\"", expected))
    }

    /// Calling the subject throws something `predicate` accepts
    pub fn to_throw_matching(&self, predicate: impl Fn(&Thrown) -> bool) -> bool {
        let Some(outcome) = self.invoke_subject() else {
            return self.usage(UsageKind::NotAFunction, messages::NOT_A_FUNCTION);
        };
        let result = outcome.is_some_and(|thrown| predicate(&thrown));
        self.evaluate(result, "to throw matching predicate".into())
    }

    /// `None` when the subject is not callable, `Some(None)` when the call
    /// returned normally
    fn invoke_subject(&self) -> Option<Option<Thrown>> {
        let callable = self.subject().as_callable()?;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| callable.call(&[]))) {
            Ok(Ok(_)) => None,
            Ok(Err(thrown)) => Some(thrown),
            Err(payload) => Some(Thrown::new(PANIC, panic_message(payload.as_ref()))),
        };
        Some(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;
    use crate::reporter::{Diagnostic, MemoryReporter};
    use crate::run_context::RunContext;
    use crate::value::Value;
    use std::rc::Rc;

    fn in_case(body: impl FnOnce(&RunContext)) -> Rc<MemoryReporter> {
        let reporter = Rc::new(MemoryReporter::new());
        let run = RunContext::new(BenchConfig::default(), reporter.clone());
        run.begin_suite("throws");
        run.run_case("case", |t| {
            body(t);
            Ok(())
        })
        .unwrap();
        reporter
    }

    fn throwing() -> Value {
        Value::function("parse", |_| Err(Thrown::type_error("bad input")))
    }

    fn quiet() -> Value {
        Value::function("noop", |_| Ok(Value::Undefined))
    }

    #[test]
    fn test_to_throw() {
        in_case(|t| {
            assert!(t.expect(throwing()).to_throw(None));
            assert!(t.expect(throwing()).to_throw("TypeError"));
            assert!(!t.expect(throwing()).to_throw("RangeError"));
        });
    }

    #[test]
    fn test_no_throw_is_a_failure() {
        let reporter = in_case(|t| {
            assert!(!t.expect(quiet()).to_throw(None));
            assert!(t.expect(quiet()).not().to_throw(None));
        });
        let records = reporter.expectations();
        assert_eq!(records.len(), 2);
        assert!(!records[0].passed);
    }

    #[test]
    fn test_to_throw_error_name_and_message() {
        in_case(|t| {
            assert!(t.expect(throwing()).to_throw_error("TypeError", "bad input"));
            assert!(t.expect(throwing()).to_throw_error(None, "bad input"));
            assert!(!t.expect(throwing()).to_throw_error("TypeError", "other"));
            assert!(t.expect(throwing()).to_throw_error(None, None));
        });
    }

    #[test]
    fn test_to_throw_matching() {
        in_case(|t| {
            assert!(t
                .expect(throwing())
                .to_throw_matching(|e| e.message.starts_with("bad")));
            assert!(!t.expect(throwing()).to_throw_matching(|e| e.name == "Error"));
        });
    }

    #[test]
    fn test_panic_counts_as_throw() {
        in_case(|t| {
            let panicking = Value::function("boom", |_| panic!("kaboom"));
            assert!(t.expect(panicking.clone()).to_throw(PANIC));
            assert!(t
                .expect(panicking)
                .to_throw_matching(|e| e.message == "kaboom"));
        });
    }

    #[test]
    fn test_non_function_is_usage_error() {
        let reporter = in_case(|t| {
            assert!(!t.expect(42).to_throw(None));
        });
        assert!(reporter.expectations().is_empty());
        // Nothing was counted, so the case also reports no expectations.
        assert!(matches!(
            reporter.diagnostics().as_slice(),
            [
                Diagnostic::Usage {
                    usage: UsageKind::NotAFunction,
                    ..
                },
                Diagnostic::NoExpectations { .. }
            ]
        ));
    }

    #[test]
    fn test_spy_subject_is_invoked() {
        in_case(|t| {
            let spy = t.create_spy(Some("cb"));
            assert!(!t.expect(&spy).to_throw(None));
            assert!(t.expect(&spy).to_have_been_called_times(1));
        });
    }
}
