//! Progress bars for loads and expansions

use std::sync::Mutex;
use std::time::Duration;

use hive_loader::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar driven by executor and expander events; a fresh bar is
/// drawn for every table or target
pub struct LoadProgress {
    bar: Mutex<ProgressBar>,
    unit: &'static str,
}

impl LoadProgress {
    /// `unit` names what one step is, e.g. "files" or "shards"
    pub fn new(unit: &'static str) -> Self {
        Self {
            bar: Mutex::new(ProgressBar::hidden()),
            unit,
        }
    }

    fn style(&self) -> ProgressStyle {
        ProgressStyle::with_template(&format!(
            "{{spinner:.green}} {{prefix:.bold}} [{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos:>7}}/{{len:7}} {} ({{eta}})",
            self.unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
    }

    fn current(&self) -> ProgressBar {
        self.bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressSink for LoadProgress {
    fn start(&self, label: &str, total: u64) {
        let bar = ProgressBar::new(total);
        bar.set_style(self.style());
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        let mut current = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = bar;
    }

    fn advance(&self, message: &str) {
        let bar = self.current();
        bar.set_message(message.to_string());
        bar.inc(1);
    }

    fn warn(&self, message: &str) {
        let bar = self.current();
        bar.println(format!("  ✗ {}", message));
        bar.inc(1);
    }

    fn finish(&self, message: &str) {
        self.current().finish_and_clear();
        eprintln!("✓ {}", message);
    }
}

/// Spinner for single long-running steps
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(format!("✓ {}", message));
    }
}
