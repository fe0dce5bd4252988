//! Predicates over spy call records

use super::{quoted, Matcher};
use crate::error::{messages, UsageKind};
use crate::value::Value;

impl Matcher {
    /// Spy was invoked at least once
    pub fn to_have_been_called(&self) -> bool {
        let Some(spy) = self.subject().as_spy() else {
            return self.usage(UsageKind::NotASpy, messages::NOT_A_SPY);
        };
        let result = spy.times_called() > 0;
        self.evaluate(result, "to have been called".into())
    }

    /// Spy was invoked exactly `expected` times
    pub fn to_have_been_called_times(&self, expected: usize) -> bool {
        let Some(spy) = self.subject().as_spy() else {
            return self.usage(UsageKind::NotASpy, messages::NOT_A_SPY);
        };
        let result = spy.times_called() == expected;
        self.evaluate(result, format!("to have been called times \"{}\"", expected))
    }

    /// The most recent call received exactly `args`
    pub fn to_have_been_called_with(&self, args: &[Value]) -> bool {
        let Some(spy) = self.subject().as_spy() else {
            return self.usage(UsageKind::NotASpy, messages::NOT_A_SPY);
        };
        let result = spy
            .most_recent_arguments()
            .is_some_and(|recent| recent == args);
        self.evaluate(result, arguments_text("to have been called with", args))
    }

    /// Exactly one call, and it received `args`
    pub fn to_have_been_called_once_with(&self, args: &[Value]) -> bool {
        let Some(spy) = self.subject().as_spy() else {
            return self.usage(UsageKind::NotASpy, messages::NOT_A_SPY);
        };
        let result = match spy.stored_arguments().as_slice() {
            [only] => only.as_slice() == args,
            _ => false,
        };
        self.evaluate(result, arguments_text("to have been called once with", args))
    }

    /// Both spies were called and the subject's first call came strictly
    /// earlier
    pub fn to_have_been_called_before(&self, other: impl Into<Value>) -> bool {
        let other = other.into();
        let (Some(spy), Some(later)) = (self.subject().as_spy(), other.as_spy()) else {
            return self.usage(UsageKind::NotASpy, messages::EXPECTED_NOT_A_SPY);
        };
        let result = match (spy.first_called_at(), later.first_called_at()) {
            (Some(first), Some(second)) => first < second,
            _ => false,
        };
        let label = later.spy_name().unwrap_or_else(|| quoted(&other));
        self.evaluate(result, format!("to have been called before {}", label))
    }
}

fn arguments_text(text: &str, args: &[Value]) -> String {
    format!("{} {}", text, quoted(&Value::Array(args.to_vec())))
}
