use std::sync::Mutex;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use crate::job::EncodeJob;
use crate::progress::ProgressSample;

const BANNER_WIDTH: usize = 60;
const BAR_TEMPLATE: &str = "📊 Progress: [{bar:40}] {msg}";
const BAR_CHARS: &str = "█░";

/// Receives user-facing events for an encode attempt.
///
/// Durable log entries are written separately through `log`; a reporter only
/// drives what the operator sees on the console.
pub trait Reporter: Send + Sync {
    fn encode_started(&self, job: &EncodeJob);
    fn progress(&self, job: &EncodeJob, sample: &ProgressSample);
    fn encode_succeeded(&self, job: &EncodeJob);
    fn encode_failed(&self, job: &EncodeJob, reason: &str);
    fn input_missing(&self, job: &EncodeJob);
    fn relocated(&self, job: &EncodeJob);
    /// Successful encode whose original could not be moved (or had vanished)
    fn relocation_skipped(&self, job: &EncodeJob, reason: &str);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn encode_started(&self, _job: &EncodeJob) {}
    fn progress(&self, _job: &EncodeJob, _sample: &ProgressSample) {}
    fn encode_succeeded(&self, _job: &EncodeJob) {}
    fn encode_failed(&self, _job: &EncodeJob, _reason: &str) {}
    fn input_missing(&self, _job: &EncodeJob) {}
    fn relocated(&self, _job: &EncodeJob) {}
    fn relocation_skipped(&self, _job: &EncodeJob, _reason: &str) {}
}

type DrawTargetFn = Box<dyn Fn() -> ProgressDrawTarget + Send + Sync>;

/// Console output on stdout: banners plus an in-place progress bar
pub struct ConsoleReporter {
    bar: Mutex<Option<ProgressBar>>,
    draw_target: DrawTargetFn,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stdout)
    }

    /// Draw progress bars somewhere other than stdout
    pub fn with_draw_target(
        draw_target: impl Fn() -> ProgressDrawTarget + Send + Sync + 'static,
    ) -> Self {
        Self { bar: Mutex::new(None), draw_target: Box::new(draw_target) }
    }

    fn new_bar(&self) -> ProgressBar {
        let bar = ProgressBar::with_draw_target(Some(100), (self.draw_target)());
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(BAR_CHARS),
        );
        bar
    }

    fn rule() -> String {
        "=".repeat(BANNER_WIDTH)
    }

    fn finish_bar(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            // Leave the bar where the encode stopped
            if let Some(bar) = bar.take() {
                bar.abandon();
            }
        }
    }

    /// Print a line without tearing the progress bar
    fn println(&self, msg: &str) {
        match self.bar.lock() {
            Ok(bar) => match bar.as_ref() {
                Some(bar) => bar.println(msg),
                None => println!("{}", msg),
            },
            Err(_) => println!("{}", msg),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn encode_started(&self, job: &EncodeJob) {
        println!("\n{}", Self::rule());
        println!("🎬 Encoding: {}", job.input_name());
        println!("{}", Self::rule());
    }

    fn progress(&self, _job: &EncodeJob, sample: &ProgressSample) {
        let Ok(mut guard) = self.bar.lock() else { return };
        let bar = guard.get_or_insert_with(|| self.new_bar());
        bar.set_message(format!("{:.1}% | ETA: {}", sample.percent, sample.eta_or_default()));
        bar.set_position((sample.percent as u64).min(100));
    }

    fn encode_succeeded(&self, _job: &EncodeJob) {
        self.finish_bar();
        println!("✅ Encoding completed successfully!");
    }

    fn encode_failed(&self, _job: &EncodeJob, reason: &str) {
        self.finish_bar();
        println!("❌ Encoding failed: {}", reason);
        println!("{}\n", Self::rule());
    }

    fn input_missing(&self, _job: &EncodeJob) {
        self.println("❌ Error: Input file not found!");
    }

    fn relocated(&self, job: &EncodeJob) {
        println!("📁 Original moved to: {}", job.input_name());
        println!("📤 Encoded file: {}", job.output_name());
        println!("{}\n", Self::rule());
    }

    fn relocation_skipped(&self, job: &EncodeJob, reason: &str) {
        println!("⚠️  Warning: {}", reason);
        println!("📤 Encoded file: {}", job.output_name());
        println!("{}\n", Self::rule());
    }
}
