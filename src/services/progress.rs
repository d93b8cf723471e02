//! Progress reporting service
//!
//! Keeps progress presentation out of the evaluation loop so that library
//! users and the CLI can plug in their own reporters.

use instant::Instant;

/// Stages of a dataset evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStage {
    /// Initializing backend and loading model
    Initialization,
    /// Loading and transforming a sample
    SampleLoading,
    /// Running model inference
    Inference,
    /// Converting output and accumulating areas
    Accumulation,
    /// Deriving metrics
    Completed,
}

impl EvaluationStage {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Initialization => "Initializing model and backend",
            Self::SampleLoading => "Loading sample",
            Self::Inference => "Running inference",
            Self::Accumulation => "Accumulating confusion areas",
            Self::Completed => "Evaluation completed",
        }
    }
}

/// Progress update for one evaluated sample
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: EvaluationStage,
    /// Samples finished so far
    pub completed: usize,
    /// Samples in this run
    pub total: usize,
    /// Human-readable description
    pub description: String,
    /// Elapsed time since evaluation started (milliseconds)
    pub elapsed_ms: u64,
    /// Estimated time remaining (milliseconds, if available)
    pub eta_ms: Option<u64>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: EvaluationStage, completed: usize, total: usize, start_time: Instant) -> Self {
        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        let eta_ms = (completed > 0 && completed < total)
            .then(|| elapsed_ms / completed as u64 * (total - completed) as u64);
        Self {
            stage,
            completed,
            total,
            description: stage.description().to_string(),
            elapsed_ms,
            eta_ms,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Completion percentage (0-100)
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total).min(100) as u8
    }
}

/// Final timings of an evaluation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationTimings {
    pub image_count: usize,
    /// Wall time of the whole run (milliseconds)
    pub total_ms: u64,
    /// Summed inference time (seconds)
    pub inference_secs: f64,
}

/// Receiver of evaluation progress
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    fn report_completion(&self, timings: EvaluationTimings);

    /// Report an error that aborts the evaluation
    fn report_error(&self, stage: EvaluationStage, error: &str);
}

/// Reporter that discards all progress updates
#[derive(Debug, Default)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: EvaluationTimings) {}

    fn report_error(&self, _stage: EvaluationStage, _error: &str) {}
}

/// Reporter that writes progress through the `log` facade
#[derive(Debug)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            match update.eta_ms {
                Some(eta) => log::info!(
                    "[{}/{}] {} ({}ms elapsed, ~{}ms remaining)",
                    update.completed,
                    update.total,
                    update.description,
                    update.elapsed_ms,
                    eta
                ),
                None => log::info!(
                    "[{}/{}] {} ({}ms elapsed)",
                    update.completed,
                    update.total,
                    update.description,
                    update.elapsed_ms
                ),
            }
        } else {
            log::debug!("[{}%] {}", update.percentage(), update.description);
        }
    }

    fn report_completion(&self, timings: EvaluationTimings) {
        log::info!(
            "✅ Evaluated {} images in {}ms",
            timings.image_count,
            timings.total_ms
        );
        if self.verbose {
            log::info!("  • Inference: {:.3}s", timings.inference_secs);
        }
    }

    fn report_error(&self, stage: EvaluationStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Terminal progress bar reporter
#[cfg(feature = "cli")]
pub struct BarProgressReporter {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl BarProgressReporter {
    #[must_use]
    pub fn new(total: usize) -> Self {
        use indicatif::{ProgressBar, ProgressStyle};

        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for BarProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if update.total as u64 != self.bar.length().unwrap_or(0) {
            self.bar.set_length(update.total as u64);
        }
        self.bar.set_position(update.completed as u64);
        self.bar.set_message(update.description);
    }

    fn report_completion(&self, timings: EvaluationTimings) {
        self.bar.finish_with_message(format!(
            "✅ {} images in {}ms",
            timings.image_count, timings.total_ms
        ));
    }

    fn report_error(&self, stage: EvaluationStage, error: &str) {
        self.bar.abandon_with_message(format!("❌ {}", stage.description()));
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Tracks timing and forwards progress to a reporter
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<EvaluationStage>,
    total: usize,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("current_stage", &self.current_stage)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
            total: 0,
        }
    }

    /// Tracker that discards all progress (library default)
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Restart the clock for a run over `total` samples
    pub fn start(&mut self, total: usize) {
        self.start_time = Instant::now();
        self.total = total;
        self.current_stage = None;
    }

    /// Record the current stage without emitting an update
    pub fn enter_stage(&mut self, stage: EvaluationStage) {
        self.current_stage = Some(stage);
    }

    /// Report that `completed` samples are done, the last one being `sample_id`
    pub fn report_sample(&mut self, completed: usize, sample_id: &str) {
        self.current_stage = Some(EvaluationStage::Accumulation);
        let update = ProgressUpdate::new(
            EvaluationStage::Accumulation,
            completed,
            self.total,
            self.start_time,
        )
        .with_description(sample_id);
        self.reporter.report_progress(update);
    }

    pub fn report_completion(&mut self, image_count: usize, inference_secs: f64) {
        self.current_stage = Some(EvaluationStage::Completed);
        self.reporter.report_completion(EvaluationTimings {
            image_count,
            total_ms: self.elapsed_ms(),
            inference_secs,
        });
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self
            .current_stage
            .unwrap_or(EvaluationStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<EvaluationStage> {
        self.current_stage
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::no_op()
    }
}

/// Create the reporter matching the CLI flags
///
/// `--progress` shows a progress bar; otherwise progress goes to the log.
#[must_use]
pub fn create_cli_progress_reporter(
    enable_progress: bool,
    verbose: bool,
    total: usize,
) -> Box<dyn ProgressReporter> {
    #[cfg(feature = "cli")]
    if enable_progress {
        return Box::new(BarProgressReporter::new(total));
    }
    #[cfg(not(feature = "cli"))]
    let _ = (enable_progress, total);

    Box::new(ConsoleProgressReporter::new(verbose))
}
