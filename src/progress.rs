//! Progress reporting for batch generation.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over a batch of files, or nothing in quiet mode.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Create a reporter for `total` items.
    #[must_use]
    pub fn new(total: usize, quiet: bool) -> Self {
        if quiet || total < 2 {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    /// Record one finished item.
    pub fn item_done(&self, name: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(name.to_string());
            bar.inc(1);
        }
    }

    /// Print a line without breaking the bar.
    pub fn println(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }

    /// Remove the bar.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Whether a bar is being drawn.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}
