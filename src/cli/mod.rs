//! CLI module for the segeval-bench tool
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use config::{CliConfigBuilder, EvaluationPlan};
pub use main_impl::{main, run, Cli, CliLogFormat};
