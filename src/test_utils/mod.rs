//! Shared test utilities for skillvet.

pub mod fixtures;
pub mod logging;

pub use logging::{TestLogger, init_test_tracing};

/// Table-driven test case structure.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
}

/// Run table-driven tests, reporting every failing case before panicking.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F)
where
    I: std::fmt::Debug + Clone,
    E: std::fmt::Debug + PartialEq,
    F: Fn(I) -> E,
{
    let mut failures = Vec::new();
    for case in cases {
        let start = std::time::Instant::now();
        let actual = test_fn(case.input.clone());
        let elapsed = start.elapsed();

        if actual == case.expected {
            println!("[TEST] PASSED: {} ({elapsed:?})", case.name);
        } else {
            println!(
                "[TEST] FAILED: {}\n  input: {:?}\n  expected: {:?}\n  actual: {:?}",
                case.name, case.input, case.expected, actual
            );
            failures.push(case.name);
        }
    }
    assert!(failures.is_empty(), "failing cases: {failures:?}");
}
