//! In-kernel self-test harness, compiled only under the `kernel_tests`
//! feature (spec §10.4 / §12).
//!
//! Grounded in `original_source/src/tests/unit_tests.c`'s
//! `struct UnitTestsResult` and its `TEST`/`run_test` macro: each test is a
//! plain function returning an `Option`-style failure reason (made
//! idiomatic here as `Result<(), &'static str>`), counted and reported by
//! name over serial. A test failure never panics the kernel — only a
//! genuine invariant violation elsewhere in the core does that, per spec
//! §7's error model; these are the crate's only tests, since a
//! `no_std`/`no_main` kernel binary has no hosted `#[test]` target and the
//! scenarios in spec §8 (real threads, preemptively scheduled, against a
//! real 100 Hz tick and a real heap) can only be exercised inside the
//! booted kernel itself.

mod sched;
mod sync;

/// Total/failed counts across every test run. Mirrors the original's
/// `UnitTestsResult`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestReport {
    pub total: u32,
    pub failed: u32,
}

pub type TestResult = Result<(), &'static str>;

/// Run `$f`, count it, and print a pass/fail line — the idiomatic
/// equivalent of the original's `TEST`/`run_test` macro pair.
#[macro_export]
macro_rules! run_test {
    ($report:expr, $name:expr, $f:expr) => {{
        $report.total += 1;
        match $f() {
            Ok(()) => crate::serial_println!("  [PASS] {}", $name),
            Err(reason) => {
                $report.failed += 1;
                crate::serial_println!("  [FAIL] {}: {}", $name, reason);
            }
        }
    }};
}

/// Run every self-test and print a summary. Called from `kernel_main` right
/// after subsystem init when the `kernel_tests` feature is enabled.
pub fn run_all() -> TestReport {
    let mut report = TestReport::default();
    crate::serial_println!("running self-tests...");
    crate::serial_println!("-- heap --");
    heap::run(&mut report);
    crate::serial_println!("-- sched (end-to-end sync scenarios) --");
    sched::run(&mut report);
    crate::serial_println!("-- sync (FIFO / recursive-mutex properties) --");
    sync::run(&mut report);
    report
}
