//! Metrics for the fusion pipeline.
//!
//! Recording goes through the `metrics` facade, so every function here is a
//! cheap no-op until [`init`] installs the Prometheus recorder. A batch run has
//! no scrape endpoint; the rendered text is written once at the end of the run.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, info};

use crate::error::{FusionError, Result};

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Run metrics
    RunsTotal,
    RunDuration,

    // Source loading metrics
    SourcesTablesLoaded,
    SourcesTablesFailed,
    SourcesObservationsLoaded,
    SourcesCellsCoerced,

    // Fusion metrics
    FusionObservationsSkipped,
    FusionSignatureMerges,
    FusionFilmsResolved,
    FusionFilmsRetained,
    FusionFilmsDropped,
    FusionDuplicateRows,

    // Normalize metrics
    NormalizeOutliersChanged,
    NormalizeSuperscoresComputed,
    NormalizeFinalRows,

    // Quality Gate metrics
    QualityGateTablesAccepted,
    QualityGateTablesAcceptedWithWarnings,
    QualityGateTablesQuarantined,
    QualityGateQualityScore,
    QualityGateIssuesDetected,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsTotal => "film_fusion_runs_total",
            MetricName::RunDuration => "film_fusion_run_duration_seconds",

            MetricName::SourcesTablesLoaded => "film_fusion_sources_tables_loaded_total",
            MetricName::SourcesTablesFailed => "film_fusion_sources_tables_failed_total",
            MetricName::SourcesObservationsLoaded => "film_fusion_sources_observations_loaded_total",
            MetricName::SourcesCellsCoerced => "film_fusion_sources_cells_coerced_total",

            MetricName::FusionObservationsSkipped => "film_fusion_fusion_observations_skipped_total",
            MetricName::FusionSignatureMerges => "film_fusion_fusion_signature_merges_total",
            MetricName::FusionFilmsResolved => "film_fusion_fusion_films_resolved_total",
            MetricName::FusionFilmsRetained => "film_fusion_fusion_films_retained_total",
            MetricName::FusionFilmsDropped => "film_fusion_fusion_films_dropped_total",
            MetricName::FusionDuplicateRows => "film_fusion_fusion_duplicate_rows_total",

            MetricName::NormalizeOutliersChanged => "film_fusion_normalize_outliers_changed_total",
            MetricName::NormalizeSuperscoresComputed => {
                "film_fusion_normalize_superscores_computed_total"
            }
            MetricName::NormalizeFinalRows => "film_fusion_normalize_final_rows_total",

            MetricName::QualityGateTablesAccepted => "film_fusion_quality_gate_tables_accepted_total",
            MetricName::QualityGateTablesAcceptedWithWarnings => {
                "film_fusion_quality_gate_tables_accepted_with_warnings_total"
            }
            MetricName::QualityGateTablesQuarantined => {
                "film_fusion_quality_gate_tables_quarantined_total"
            }
            MetricName::QualityGateQualityScore => "film_fusion_quality_gate_quality_score",
            MetricName::QualityGateIssuesDetected => "film_fusion_quality_gate_issues_detected_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless; the first
/// recorder stays in place.
pub fn init() -> Result<()> {
    if METRICS_HANDLE.get().is_some() {
        debug!("Metrics recorder already installed");
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| FusionError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;

    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Current snapshot in the Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Write the current snapshot to `path`. Returns whether anything was written.
pub async fn write_snapshot(path: &Path) -> Result<bool> {
    let Some(text) = render() else {
        debug!("No metrics recorder installed; skipping snapshot");
        return Ok(false);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    info!("Metrics snapshot written to {}", path.display());
    Ok(true)
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use super::MetricName;

    pub fn started() {
        ::metrics::counter!(MetricName::RunsTotal.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Source Loading Metrics
// ============================================================================

pub mod sources {
    use super::MetricName;

    pub fn table_loaded(source: &str, observations: usize) {
        ::metrics::counter!(MetricName::SourcesTablesLoaded.as_str(), "source" => source.to_string())
            .increment(1);
        ::metrics::counter!(
            MetricName::SourcesObservationsLoaded.as_str(),
            "source" => source.to_string()
        )
        .increment(observations as u64);
    }

    pub fn table_failed(name: &str) {
        ::metrics::counter!(MetricName::SourcesTablesFailed.as_str(), "table" => name.to_string())
            .increment(1);
    }

    /// Malformed cells turned into nulls while reading
    pub fn cells_coerced(source: &str, count: usize) {
        if count > 0 {
            ::metrics::counter!(
                MetricName::SourcesCellsCoerced.as_str(),
                "source" => source.to_string()
            )
            .increment(count as u64);
        }
    }
}

// ============================================================================
// Fusion Metrics
// ============================================================================

pub mod fusion {
    use super::MetricName;
    use crate::pipeline::processing::fusion::FusionReport;

    pub fn report(report: &FusionReport) {
        ::metrics::counter!(MetricName::FusionObservationsSkipped.as_str())
            .increment(report.skipped_untitled as u64);
        ::metrics::counter!(MetricName::FusionSignatureMerges.as_str())
            .increment(report.signature_merges as u64);
        ::metrics::counter!(MetricName::FusionFilmsResolved.as_str())
            .increment(report.resolved_films as u64);
        ::metrics::counter!(MetricName::FusionFilmsRetained.as_str())
            .increment(report.retained as u64);
        ::metrics::counter!(MetricName::FusionFilmsDropped.as_str())
            .increment(report.dropped_below_threshold as u64);
        ::metrics::counter!(MetricName::FusionDuplicateRows.as_str())
            .increment(report.duplicate_rows as u64);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;
    use crate::pipeline::processing::rating::NormalizationReport;

    pub fn report(report: &NormalizationReport) {
        for (source, changed) in &report.outliers_changed {
            ::metrics::counter!(
                MetricName::NormalizeOutliersChanged.as_str(),
                "source" => source.as_str()
            )
            .increment(*changed as u64);
        }
        ::metrics::counter!(MetricName::NormalizeSuperscoresComputed.as_str())
            .increment(report.superscores_computed as u64);
    }

    pub fn final_rows(count: usize) {
        ::metrics::counter!(MetricName::NormalizeFinalRows.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Quality Gate Metrics
// ============================================================================

pub mod quality_gate {
    use super::MetricName;
    use crate::pipeline::processing::quality_gate::{QualityAssessment, QualityDecision};

    pub fn assessment(assessment: &QualityAssessment) {
        let decision_metric = match assessment.decision {
            QualityDecision::Accept => MetricName::QualityGateTablesAccepted,
            QualityDecision::AcceptWithWarnings => MetricName::QualityGateTablesAcceptedWithWarnings,
            QualityDecision::Quarantine => MetricName::QualityGateTablesQuarantined,
        };
        ::metrics::counter!(decision_metric.as_str()).increment(1);
        ::metrics::histogram!(MetricName::QualityGateQualityScore.as_str())
            .record(assessment.quality_score);
        ::metrics::counter!(MetricName::QualityGateIssuesDetected.as_str())
            .increment(assessment.issues.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::RunsTotal,
            MetricName::FusionFilmsRetained,
            MetricName::QualityGateQualityScore,
        ] {
            assert!(name.as_str().starts_with("film_fusion_"));
            assert_eq!(name.to_string(), name.as_str());
        }
    }

    #[tokio::test]
    async fn test_recording_without_recorder_is_a_no_op() -> anyhow::Result<()> {
        sources::table_loaded("imdb", 3);
        run::started();

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("metrics.prom");
        if render().is_none() {
            assert!(!write_snapshot(&path).await?);
            assert!(!path.exists());
        }
        Ok(())
    }
}
