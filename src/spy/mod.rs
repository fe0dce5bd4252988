//! Call-recording spies
//!
//! A [`Spy`] stands in for a function: every invocation is recorded
//! (arguments, count, first-call timestamp), optionally forwarded to an
//! original implementation and a fake, and answered with a configured
//! return value.
//!
//! # Example
//!
//! ```
//! use testbench::{args, Spy, SpyLike, Value};
//!
//! let spy = Spy::new(Some("save")).and_return_value(true);
//! assert_eq!(spy.call(&args!["doc.txt"]), Value::Boolean(true));
//! assert_eq!(spy.times_called(), 1);
//! assert_eq!(spy.stored_arguments(), vec![args!["doc.txt"]]);
//! ```

use crate::value::{Callable, Value};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::trace;

/// Side effect run on every invocation (original function or fake)
pub type SideEffect = Rc<dyn Fn(&[Value])>;

static EPOCH: OnceLock<Instant> = OnceLock::new();
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Monotonic invocation timestamp
///
/// Ordered by elapsed time first and by a process-wide logical sequence
/// second, so two invocations landing on the same clock reading are still
/// strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CallStamp {
    nanos: u64,
    sequence: u64,
}

impl CallStamp {
    /// Take a timestamp now
    pub fn now() -> Self {
        let epoch = *EPOCH.get_or_init(Instant::now);
        let nanos = u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Self {
            nanos,
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Time since the process-wide spy epoch
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos)
    }

    /// Logical tie-breaker
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// The inspectable side of a spy
///
/// Spy predicates consult this capability and nothing else.
pub trait SpyLike {
    /// Label given at creation
    fn spy_name(&self) -> Option<String>;

    /// How often the spy was invoked
    fn times_called(&self) -> usize;

    /// Full ordered call history, one argument list per call
    fn stored_arguments(&self) -> Vec<Vec<Value>>;

    /// Timestamp of the first invocation, `None` until called
    fn first_called_at(&self) -> Option<CallStamp>;

    /// Arguments of the most recent call
    fn most_recent_arguments(&self) -> Option<Vec<Value>> {
        self.stored_arguments().pop()
    }
}

struct SpyState {
    name: Option<String>,
    call_count: usize,
    first_called_at: Option<CallStamp>,
    calls: Vec<Vec<Value>>,
    original: Option<SideEffect>,
    fake: Option<SideEffect>,
    return_value: Value,
}

/// A callable, stateful call recorder
///
/// Cloning yields another handle onto the same recorder.
#[derive(Clone)]
pub struct Spy {
    state: Rc<RefCell<SpyState>>,
}

impl Spy {
    /// Create a spy with an optional label
    pub fn new(name: Option<&str>) -> Self {
        Self {
            state: Rc::new(RefCell::new(SpyState {
                name: name.map(str::to_string),
                call_count: 0,
                first_called_at: None,
                calls: Vec::new(),
                original: None,
                fake: None,
                return_value: Value::Undefined,
            })),
        }
    }

    /// Create a spy that forwards every call to `original` for its side effects
    pub fn wrapping(name: Option<&str>, original: impl Fn(&[Value]) + 'static) -> Self {
        let spy = Self::new(name);
        spy.state.borrow_mut().original = Some(Rc::new(original));
        spy
    }

    /// Invoke the spy
    pub fn call(&self, args: &[Value]) -> Value {
        let stamp = CallStamp::now();
        let (original, fake, return_value) = {
            let mut state = self.state.borrow_mut();
            state.calls.push(args.to_vec());
            state.call_count += 1;
            if state.first_called_at.is_none() {
                state.first_called_at = Some(stamp);
            }
            trace!(
                spy = state.name.as_deref().unwrap_or("anonymous"),
                call = state.call_count,
                arity = args.len(),
                "spy invoked"
            );
            (
                state.original.clone(),
                state.fake.clone(),
                state.return_value.clone(),
            )
        };

        // Borrow released: side effects may call back into this spy.
        if let Some(original) = original {
            original(args);
        }
        if let Some(fake) = fake {
            fake(args);
        }
        return_value
    }

    /// Run `fake` on every call; last configuration wins
    pub fn and_call_fake(&self, fake: impl Fn(&[Value]) + 'static) -> Spy {
        self.state.borrow_mut().fake = Some(Rc::new(fake));
        self.clone()
    }

    /// Answer every call with `value`; last configuration wins
    pub fn and_return_value(&self, value: impl Into<Value>) -> Spy {
        self.state.borrow_mut().return_value = value.into();
        self.clone()
    }

    /// A function value that invokes this spy
    pub fn as_callable(&self) -> Callable {
        let spy = self.clone();
        let name = self.spy_name().unwrap_or_else(|| "spy".to_string());
        Callable::named(name, move |args| Ok(spy.call(args)))
    }

    /// Whether both handles record into the same spy
    pub fn same_spy(&self, other: &Spy) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl SpyLike for Spy {
    fn spy_name(&self) -> Option<String> {
        self.state.borrow().name.clone()
    }

    fn times_called(&self) -> usize {
        self.state.borrow().call_count
    }

    fn stored_arguments(&self) -> Vec<Vec<Value>> {
        self.state.borrow().calls.clone()
    }

    fn first_called_at(&self) -> Option<CallStamp> {
        self.state.borrow().first_called_at
    }

    fn most_recent_arguments(&self) -> Option<Vec<Value>> {
        self.state.borrow().calls.last().cloned()
    }
}

impl fmt::Debug for Spy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Spy")
            .field("name", &state.name)
            .field("call_count", &state.call_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use std::cell::Cell;

    #[test]
    fn test_new_spy_is_uncalled() {
        let spy = Spy::new(None);
        assert_eq!(spy.times_called(), 0);
        assert!(spy.first_called_at().is_none());
        assert!(spy.stored_arguments().is_empty());
        assert!(spy.most_recent_arguments().is_none());
    }

    #[test]
    fn test_call_records_history() {
        let spy = Spy::new(Some("log"));
        spy.call(&args![1]);
        spy.call(&args!["a", 2]);
        assert_eq!(spy.times_called(), 2);
        assert_eq!(spy.stored_arguments(), vec![args![1], args!["a", 2]]);
        assert_eq!(spy.most_recent_arguments(), Some(args!["a", 2]));
        assert_eq!(spy.spy_name().as_deref(), Some("log"));
    }

    #[test]
    fn test_first_called_at_is_set_once() {
        let spy = Spy::new(None);
        spy.call(&[]);
        let first = spy.first_called_at();
        spy.call(&[]);
        assert_eq!(spy.first_called_at(), first);
    }

    #[test]
    fn test_return_value_last_wins() {
        let spy = Spy::new(None).and_return_value(1).and_return_value("two");
        assert_eq!(spy.call(&[]), Value::from("two"));
    }

    #[test]
    fn test_default_return_is_undefined() {
        assert!(Spy::new(None).call(&[]).is_undefined());
    }

    #[test]
    fn test_fake_and_original_receive_arguments() {
        let seen = Rc::new(Cell::new(0.0));
        let fake_seen = seen.clone();
        let forwarded = Rc::new(Cell::new(0usize));
        let forwarded_count = forwarded.clone();

        let spy = Spy::wrapping(Some("sum"), move |args| {
            forwarded_count.set(forwarded_count.get() + args.len());
        })
        .and_call_fake(move |args| {
            fake_seen.set(args.iter().map(Value::to_number).sum());
        });

        spy.call(&args![2, 3]);
        assert_eq!(seen.get(), 5.0);
        assert_eq!(forwarded.get(), 2);
    }

    #[test]
    fn test_reentrant_fake() {
        let spy = Spy::new(Some("recurse"));
        let inner = spy.clone();
        spy.and_call_fake(move |args| {
            if args.is_empty() {
                inner.call(&args![1]);
            }
        });
        spy.call(&[]);
        assert_eq!(spy.times_called(), 2);
    }

    #[test]
    fn test_stamps_are_strictly_ordered() {
        let a = CallStamp::now();
        let b = CallStamp::now();
        assert!(a < b);
        assert!(b.sequence() > a.sequence());
    }

    #[test]
    fn test_clones_share_state() {
        let spy = Spy::new(None);
        let handle = spy.clone();
        handle.call(&[]);
        assert_eq!(spy.times_called(), 1);
        assert!(spy.same_spy(&handle));
        assert!(!spy.same_spy(&Spy::new(None)));
    }

    #[test]
    fn test_as_callable_invokes_spy() {
        let spy = Spy::new(Some("cb")).and_return_value(9);
        let callable = spy.as_callable();
        assert_eq!(callable.name(), Some("cb"));
        assert_eq!(callable.call(&args![1]).unwrap(), Value::from(9));
        assert_eq!(spy.times_called(), 1);
    }
}
