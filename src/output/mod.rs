//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::analyzer::AnalysisReport;
use crate::models::KeySummary;
use crate::pipeline::RunSummary;

/// Trait for rendering command results to an output format.
pub trait OutputRenderer {
    /// Render a key listing. Never includes key material.
    fn render_keys(&self, keys: &[KeySummary]) -> String;

    fn render_analysis(&self, report: &AnalysisReport) -> String;

    /// Render the outcome of a `generate` run.
    fn render_run(&self, summary: &RunSummary) -> String;
}
