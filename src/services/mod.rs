//! Services kept separate from the evaluation loop

pub mod progress;

pub use progress::{
    create_cli_progress_reporter, ConsoleProgressReporter, EvaluationStage, EvaluationTimings,
    NoOpProgressReporter, ProgressReporter, ProgressTracker, ProgressUpdate,
};
