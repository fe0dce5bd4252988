//! Integration tests for TestBench
//!
//! Suites driven through the free-function API end to end: matchers, spies,
//! fake clock and reporters working together.
//!
//! NOTE: Clock-specific scenarios live in fake_async_tests.rs, randomized
//! properties in property_tests.rs.

mod common;

use common::{descriptions, explicit_suite, run_suite};
use std::cell::Cell;
use std::rc::Rc;
use testbench::dsl::{before_each, create_spy, describe_with, expect, fake_async_wrap, it};
use testbench::prelude::{args, obj};
use testbench::{
    timers, BenchConfig, ConsoleReporter, Diagnostic, JsonLinesReporter, MemoryReporter, SpyLike,
    UsageKind, Value,
};

mod suites {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arrays_compare_structurally() {
        let (summary, _) = run_suite("Arrays", || {
            it("compares element-wise", || {
                expect([1, 2, 3]).to_equal([1, 2, 3]);
                expect([1, 2, 3]).not().to_equal([3, 2, 1]);
                Ok(())
            })
        });
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_object_contains_key() {
        let (summary, reporter) = run_suite("Objects", || {
            it("contains a key", || {
                expect(obj! { "a" => 1, "b" => 2 }).to_contain("a");
                Ok(())
            })
        });
        assert!(summary.is_success());
        assert_eq!(
            descriptions(&reporter),
            vec![r#"Expect "{"a":1,"b":2}" to contain "a""#.to_string()]
        );
    }

    #[test]
    fn test_empty_case_reports_diagnostic() {
        let (summary, reporter) = run_suite("Empty", || it("does nothing", || Ok(())));
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.cases, 1);
        assert_eq!(
            reporter.diagnostics(),
            vec![Diagnostic::NoExpectations {
                case: "does nothing".into()
            }]
        );
    }

    #[test]
    fn test_suite_without_cases() {
        let (summary, reporter) = run_suite("Nothing", || Ok(()));
        assert_eq!(summary.cases, 0);
        assert_eq!(
            reporter.diagnostics(),
            vec![Diagnostic::NoCases {
                suite: "Nothing".into()
            }]
        );
    }

    #[test]
    fn test_consecutive_suites_are_independent() {
        let (first, _) = run_suite("First", || {
            it("fails", || {
                expect(1).to_be(2);
                Ok(())
            })
        });
        let (second, _) = run_suite("Second", || {
            it("passes", || {
                expect(1).to_be(1);
                Ok(())
            })
        });
        assert_eq!(first.failed, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(second.total, 1);
    }

    #[test]
    fn test_before_each_resets_state() {
        let counter = Rc::new(Cell::new(10));
        let (summary, _) = run_suite("Counter", || {
            let reset = counter.clone();
            before_each(move || reset.set(0));

            let value = counter.clone();
            it("increments once", move || {
                value.set(value.get() + 1);
                expect(value.get()).to_be(1);
                Ok(())
            })?;

            let value = counter.clone();
            it("starts fresh", move || {
                expect(value.get()).to_be(0);
                Ok(())
            })
        });
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn test_failing_body_stops_the_suite() {
        let reporter = Rc::new(MemoryReporter::new());
        let result = describe_with(BenchConfig::default(), reporter.clone(), "Errors", || {
            it("blows up", || anyhow::bail!("database unavailable"))?;
            it("never runs", || {
                expect(true).to_be_true();
                Ok(())
            })
        });
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "CaseFailed: 'blows up': database unavailable"
        );
        assert!(reporter.expectations().is_empty());
        assert!(reporter.summaries().is_empty());
    }

    #[test]
    fn test_filter_runs_matching_cases_only() {
        let reporter = Rc::new(MemoryReporter::new());
        let config = BenchConfig::default().with_filter("parse");
        let summary = describe_with(config, reporter.clone(), "Filtered", || {
            it("parses numbers", || {
                expect("42".parse::<i32>()?).to_be(42);
                Ok(())
            })?;
            it("formats numbers", || {
                expect(1).to_be(2);
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(summary.cases, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_context_labels_are_reported() {
        let (_, reporter) = run_suite("Context", || {
            it("labels", || {
                expect(2 + 2)
                    .with_context("integer addition")
                    .to_be(4);
                Ok(())
            })
        });
        let records = reporter.expectations();
        assert_eq!(records[0].context.as_deref(), Some("integer addition"));
    }
}

mod spies {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_call_order() {
        let (summary, _) = run_suite("Order", || {
            it("tracks first calls", || {
                let load = create_spy(Some("load"));
                let render = create_spy(Some("render"));
                load.call(&[]);
                render.call(&args!["page"]);
                expect(&load).to_have_been_called_before(&render);
                expect(&render).not().to_have_been_called_before(&load);
                expect(&render).to_have_been_called_once_with(&args!["page"]);
                Ok(())
            })
        });
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn test_never_called_spy() {
        let (summary, reporter) = run_suite("Idle", || {
            it("was not called", || {
                let spy = create_spy(Some("idle"));
                expect(&spy).to_have_been_called();
                expect(&spy).not().to_have_been_called();
                Ok(())
            })
        });
        assert_eq!(summary.failed, 1);
        assert_eq!(
            descriptions(&reporter),
            vec![
                "Expect idle to have been called".to_string(),
                "Expect idle not to have been called".to_string(),
            ]
        );
    }

    #[test]
    fn test_spy_as_callback() {
        let (summary, _) = run_suite("Callbacks", || {
            it("forwards to the fake", || {
                let total = Rc::new(Cell::new(0.0));
                let sink = total.clone();
                let spy = create_spy(Some("add"))
                    .and_call_fake(move |args| sink.set(args.iter().map(Value::to_number).sum()))
                    .and_return_value("done");

                let callback = spy.as_callable();
                let result = callback.call(&args![2, 5])?;
                expect(result).to_be("done");
                expect(total.get()).to_be(7);
                expect(&spy).to_have_been_called_with(&args![2, 5]);
                expect(spy.times_called()).to_be(1);
                Ok(())
            })
        });
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_spy_predicate_on_non_spy() {
        let (summary, reporter) = run_suite("Misuse", || {
            it("uses a number", || {
                expect(3).to_have_been_called();
                expect(3).to_be(3);
                Ok(())
            })
        });
        assert_eq!(summary.total, 1);
        assert!(reporter.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::Usage {
                usage: UsageKind::NotASpy,
                ..
            }
        )));
    }
}

mod async_cases {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timer_inside_fake_async() {
        let (summary, _) = run_suite("Timers", || {
            it("fires after one second", || {
                let state = Rc::new(Cell::new("pending"));
                let slot = state.clone();
                let body = fake_async_wrap(move |clock| {
                    let slot = slot.clone();
                    timers::set_timeout(move || slot.set("done"), 1000);
                    clock.advance(1000)
                });
                let report = body()?;
                expect(report.macrotasks_run).to_be(1);
                expect(state.get()).to_be("done");
                Ok(())
            })
        });
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 2);
        assert!(!timers::is_faked());
    }
}

mod reporters {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_console_output() {
        let reporter = Rc::new(ConsoleReporter::new(Vec::new(), false));
        describe_with(BenchConfig::default(), reporter.clone(), "Math", || {
            it("adds", || {
                expect(1 + 1).to_be(2);
                expect(1 + 1).to_be(3);
                Ok(())
            })
        })
        .unwrap();

        let reporter = Rc::try_unwrap(reporter).ok().expect("sole owner");
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        assert!(text.contains("Test: Math"));
        assert!(text.contains(r#"✗ Expect "2" to be "3" (failed)"#));
        assert!(!text.contains("(passed)"));
        assert!(text.contains("1 / 2 tests passed"));
        assert!(text.contains("1 / 2 tests failed"));
    }

    #[test]
    fn test_json_lines_output() {
        let reporter = Rc::new(JsonLinesReporter::new(Vec::new()));
        describe_with(BenchConfig::default(), reporter.clone(), "Json", || {
            it("checks", || {
                expect(true).to_be_truthy();
                Ok(())
            })
        })
        .unwrap();

        let reporter = Rc::try_unwrap(reporter).ok().expect("sole owner");
        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        let events: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let kinds: Vec<_> = events
            .iter()
            .map(|event| event["event"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec!["suite_started", "case_started", "expectation", "suite_finished"]
        );
        assert_eq!(events[3]["total"], 1);
        assert_eq!(events[2]["passed"], true);
    }

    #[test]
    fn test_explicit_context_matches_dsl() {
        let (run, reporter) = explicit_suite("Explicit");
        run.run_case("same text", |t| {
            t.expect(5).not().to_be_less_than(3);
            Ok(())
        })
        .unwrap();
        let summary = run.finish_suite();
        assert_eq!(summary.to_string(), "1 / 1 tests passed");
        assert_eq!(
            descriptions(&reporter),
            vec![r#"Expect "5" not to be less than "3""#.to_string()]
        );
    }
}
