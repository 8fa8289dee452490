//! JSON output renderer.
//!
//! Listings render as `{"keys": [...], "total": N}`; reports and run
//! summaries render as their serialized structs.

use serde::Serialize;

use crate::analyzer::AnalysisReport;
use crate::models::KeySummary;
use crate::output::OutputRenderer;
use crate::pipeline::RunSummary;

/// JSON output renderer.
pub struct JsonRenderer;

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

impl OutputRenderer for JsonRenderer {
    fn render_keys(&self, keys: &[KeySummary]) -> String {
        pretty(&serde_json::json!({
            "keys": keys,
            "total": keys.len(),
        }))
    }

    fn render_analysis(&self, report: &AnalysisReport) -> String {
        pretty(report)
    }

    fn render_run(&self, summary: &RunSummary) -> String {
        pretty(&serde_json::json!({
            "summary": summary,
            "rate": summary.rate(),
        }))
    }
}
