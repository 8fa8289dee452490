//! Aggregate analysis over stored keys.

use serde::Serialize;
use strum::Display;

use crate::repository::{ColumnStats, ComponentAverages, KeyQueries, RepositoryError};

/// Coarse reading of a correlation coefficient, by absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CorrelationStrength {
    /// |r| > 0.7
    Strong,
    /// |r| > 0.4
    Moderate,
    Weak,
}

impl CorrelationStrength {
    pub fn classify(r: f64) -> Self {
        let r = r.abs();
        if r > 0.7 {
            Self::Strong
        } else if r > 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub score: ColumnStats,
    pub uniqueness: ColumnStats,
    pub components: ComponentAverages,
    /// Pearson r between total score and unique digit count.
    pub correlation: f64,
    pub strength: CorrelationStrength,
}

/// Runs the aggregate queries and assembles an [`AnalysisReport`].
pub struct Analyzer<'a> {
    queries: &'a mut dyn KeyQueries,
}

impl<'a> Analyzer<'a> {
    pub fn new(queries: &'a mut dyn KeyQueries) -> Self {
        Self { queries }
    }

    pub fn analyze(&mut self) -> Result<AnalysisReport, RepositoryError> {
        let score = self.queries.score_stats()?;
        let uniqueness = self.queries.uniqueness_stats()?;
        let components = self.queries.component_averages()?;
        let correlation = self.queries.score_uniqueness_correlation()?;
        tracing::debug!(keys = score.count, correlation, "analysis complete");
        Ok(AnalysisReport {
            score,
            uniqueness,
            components,
            correlation,
            strength: CorrelationStrength::classify(correlation),
        })
    }
}
