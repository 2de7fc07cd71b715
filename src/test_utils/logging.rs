use std::sync::Once;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness writer.
///
/// Honors `RUST_LOG`; defaults to `skillvet=debug`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skillvet=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Banner-style progress log for long end-to-end scenarios.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
    steps: usize,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        init_test_tracing();
        let separator = "=".repeat(60);
        println!("\n{separator}");
        println!("[TEST START] {test_name}");
        println!("{separator}");
        Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
            steps: 0,
        }
    }

    pub fn step(&mut self, description: &str) {
        self.steps += 1;
        println!(
            "[STEP {}] {description} (+{:?})",
            self.steps,
            self.start_time.elapsed()
        );
    }

    pub fn log_input<T: std::fmt::Debug>(&self, name: &str, value: &T) {
        println!("[INPUT] {name}: {value:?}");
    }

    pub fn log_actual<T: std::fmt::Debug>(&self, value: &T) {
        println!("[ACTUAL] {value:?}");
    }

    pub fn pass(&self) {
        println!(
            "[RESULT] {} PASSED after {} steps in {:?}",
            self.test_name,
            self.steps,
            self.start_time.elapsed()
        );
        println!("{}\n", "=".repeat(60));
    }
}
