use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use transit_core::pipeline::{PipelineStage, ProgressReporter};

/// Drives a single terminal progress bar through the pipeline stages.
pub struct BarReporter {
    bar: ProgressBar,
    counted: AtomicBool,
}

impl BarReporter {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:28} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self {
            bar,
            counted: AtomicBool::new(false),
        })
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.counted.store(total_items.is_some(), Ordering::Relaxed);
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        if self.counted.load(Ordering::Relaxed) {
            self.bar.set_position(items_done as u64);
        }
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }

    fn skip_stage(&self, stage: PipelineStage) {
        self.bar.println(format!("  {stage}: reusing existing artifact"));
    }
}
