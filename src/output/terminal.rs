//! Terminal renderer: styled flowing text, one key per line.

use colored::Colorize;

use crate::analyzer::{AnalysisReport, CorrelationStrength};
use crate::models::KeySummary;
use crate::output::OutputRenderer;
use crate::pipeline::{RunState, RunSummary};
use crate::repository::ColumnStats;

/// Terminal output renderer with colored text.
pub struct TerminalRenderer;

/// Fingerprint with the scored tail highlighted.
fn highlight(key: &KeySummary) -> String {
    let head = &key.fingerprint[..key.fingerprint.len() - key.suffix.len()];
    format!("{}{}", head.dimmed(), key.suffix.bold())
}

fn stats_line(label: &str, stats: &ColumnStats) -> String {
    format!(
        "   {:<12} mean {:.2}  min {}  max {}\n",
        label,
        stats.mean,
        stats.min,
        stats.max
    )
}

fn rule() -> String {
    format!("{}\n", "───────────────────────────────────".dimmed())
}

impl OutputRenderer for TerminalRenderer {
    fn render_keys(&self, keys: &[KeySummary]) -> String {
        if keys.is_empty() {
            return format!("{}", "  ✔ No keys stored yet.\n".green());
        }

        let mut output = String::new();
        for (rank, key) in keys.iter().enumerate() {
            output.push_str(&format!(
                " {:>3}. {}  score {}  unique {}\n",
                rank + 1,
                highlight(key),
                key.score.to_string().green().bold(),
                key.unique_digit_count.to_string().cyan().bold(),
            ));
            output.push_str(&format!(
                "      {}\n",
                format!(
                    "repeat {} · increasing {} · decreasing {} · magic {}",
                    key.repeat_score, key.increasing_score, key.decreasing_score, key.magic_score
                )
                .dimmed()
            ));
        }
        output.push_str(&rule());
        output.push_str(&format!(
            " {} {}\n",
            keys.len().to_string().bold(),
            if keys.len() == 1 { "key" } else { "keys" }
        ));
        output
    }

    fn render_analysis(&self, report: &AnalysisReport) -> String {
        if report.score.count == 0 {
            return format!("{}", "  ✔ No keys stored yet.\n".green());
        }

        let mut output = String::new();
        output.push_str(&format!(
            " {} {} keys analyzed\n\n",
            "▸".cyan().bold(),
            report.score.count.to_string().bold()
        ));
        output.push_str(&format!(" {}\n", "Distribution".bold()));
        output.push_str(&stats_line("score", &report.score));
        output.push_str(&stats_line("unique", &report.uniqueness));
        output.push('\n');

        let c = &report.components;
        output.push_str(&format!(" {}\n", "Component averages".bold()));
        output.push_str(&format!("   {:<12} {:.2}\n", "repeat", c.repeat));
        output.push_str(&format!("   {:<12} {:.2}\n", "increasing", c.increasing));
        output.push_str(&format!("   {:<12} {:.2}\n", "decreasing", c.decreasing));
        output.push_str(&format!("   {:<12} {:.2}\n", "magic", c.magic));
        output.push('\n');

        let strength = match report.strength {
            CorrelationStrength::Strong => "strong".red().bold(),
            CorrelationStrength::Moderate => "moderate".yellow().bold(),
            CorrelationStrength::Weak => "weak or none".dimmed(),
        };
        output.push_str(&rule());
        output.push_str(&format!(
            " score ~ unique correlation {:.4} ({strength})\n",
            report.correlation
        ));
        output
    }

    fn render_run(&self, summary: &RunSummary) -> String {
        let counts = &summary.counts;
        let (icon, state) = match summary.state {
            RunState::Done => ("✔".green().bold(), "done".green()),
            RunState::Cancelled => ("⚠".yellow().bold(), "cancelled".yellow()),
            other => ("✖".red().bold(), other.to_string().red()),
        };

        let mut output = String::new();
        output.push_str(&format!(
            " {icon} {state} in {:.1}s ({:.0} keys/s)\n",
            summary.elapsed.as_secs_f64(),
            summary.rate()
        ));
        output.push_str(&format!(
            "   generated {}  accepted {}  rejected {}\n",
            counts.generated.to_string().bold(),
            counts.accepted.to_string().green().bold(),
            counts.rejected,
        ));
        output.push_str(&format!(
            "   persisted {} in {} batches\n",
            counts.persisted.to_string().bold(),
            counts.batches_committed
        ));
        let failures = counts.generation_failures + counts.serialization_failures;
        if failures > 0 {
            output.push_str(&format!(
                "   {} {} failures\n",
                failures.to_string().red().bold(),
                "candidate".red()
            ));
        }
        output
    }
}
