use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::app::ports::{FusionOutputPort, SourceTablePort, TableKind};
use crate::config::{Config, SourceConfig};
use crate::observability::metrics;
use crate::pipeline::processing::fusion::{FusionConfig, FusionReport, SourceFusionEngine};
use crate::pipeline::processing::quality_gate::{
    DefaultQualityGate, QualityAssessment, QualityDecision, QualityGate,
};
use crate::pipeline::processing::rating::{NormalizationConfig, NormalizationReport, RatingNormalizer};
use crate::types::{FusedFilm, Observation};

/// Counts describing one end-to-end run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub tables_loaded: usize,
    pub tables_failed: usize,
    pub observations: usize,
    pub fusion: FusionReport,
    pub normalization: NormalizationReport,
    /// Rows written to the final table
    pub final_rows: usize,
    pub assessments: Vec<QualityAssessment>,
}

impl RunSummary {
    pub fn quarantined_tables(&self) -> usize {
        self.assessments
            .iter()
            .filter(|a| a.decision == QualityDecision::Quarantine)
            .count()
    }
}

/// Use case driving a full run: load, validate, fuse, normalize, export
pub struct FusionUseCase {
    source_port: Arc<dyn SourceTablePort>,
    output_port: Arc<dyn FusionOutputPort>,
    engine: SourceFusionEngine,
    normalizer: RatingNormalizer,
    quality_gate: Box<dyn QualityGate + Send + Sync>,
}

impl FusionUseCase {
    pub fn new(
        source_port: Arc<dyn SourceTablePort>,
        output_port: Arc<dyn FusionOutputPort>,
        fusion_config: FusionConfig,
        normalization_config: NormalizationConfig,
    ) -> Self {
        Self {
            source_port,
            output_port,
            engine: SourceFusionEngine::new(fusion_config),
            normalizer: RatingNormalizer::new(normalization_config),
            quality_gate: Box::new(DefaultQualityGate::new()),
        }
    }

    /// Create a use case with the stage settings from `config`
    pub fn from_config(
        config: &Config,
        source_port: Arc<dyn SourceTablePort>,
        output_port: Arc<dyn FusionOutputPort>,
    ) -> Self {
        Self::new(
            source_port,
            output_port,
            config.fusion_config(),
            config.normalization_config(),
        )
    }

    pub fn with_quality_gate(mut self, quality_gate: Box<dyn QualityGate + Send + Sync>) -> Self {
        self.quality_gate = quality_gate;
        self
    }

    pub async fn run(&self, sources: &[SourceConfig]) -> Result<RunSummary> {
        let started = Instant::now();
        metrics::run::started();
        let mut summary = RunSummary::default();

        info!("Starting fusion run over {} configured sources", sources.len());

        let mut observations: Vec<Observation> = Vec::new();
        for source in sources {
            let table = match self.source_port.load(source).await {
                Ok(table) => table,
                Err(e) => {
                    error!("Failed to load source table '{}': {:#}", source.name, e);
                    metrics::sources::table_failed(&source.name);
                    summary.tables_failed += 1;
                    continue;
                }
            };

            info!(
                "Loaded {} observations from '{}' ({})",
                table.observations.len(),
                table.name,
                table.source
            );
            metrics::sources::table_loaded(table.source.as_str(), table.observations.len());

            let assessment = self.quality_gate.assess_source(&table);
            self.report_assessment(&assessment);
            summary.assessments.push(assessment);

            summary.tables_loaded += 1;
            observations.extend(table.observations);
        }

        if summary.tables_loaded == 0 {
            bail!("No source table could be loaded ({} configured)", sources.len());
        }
        summary.observations = observations.len();

        let outcome = self.engine.fuse(&observations);
        metrics::fusion::report(&outcome.report);
        summary.fusion = outcome.report;

        self.output_port
            .write_table(TableKind::Unfiltered, &outcome.unfiltered)
            .await?;
        if !outcome.duplicates.is_empty() {
            self.output_port
                .write_table(TableKind::Duplicates, &outcome.duplicates)
                .await?;
        }
        self.output_port.write_table(TableKind::Merged, &outcome.films).await?;

        let mut films = outcome.films;
        let normalization = self.normalizer.apply(&mut films);
        metrics::normalize::report(&normalization);
        summary.normalization = normalization;

        let final_films = self.filter_final(films);
        let assessment = self
            .quality_gate
            .assess_fused(TableKind::Final.as_str(), &final_films);
        self.report_assessment(&assessment);
        summary.assessments.push(assessment);

        self.output_port.write_table(TableKind::Final, &final_films).await?;
        summary.final_rows = final_films.len();
        metrics::normalize::final_rows(final_films.len());

        let elapsed = started.elapsed().as_secs_f64();
        metrics::run::duration(elapsed);
        info!(
            "Fusion run finished in {:.2}s: {} tables, {} observations, {} films in final table",
            elapsed, summary.tables_loaded, summary.observations, summary.final_rows
        );

        Ok(summary)
    }

    /// Keep rows with enough normalized ratings to carry a superscore
    fn filter_final(&self, films: Vec<FusedFilm>) -> Vec<FusedFilm> {
        let min = self.normalizer.config().min_ratings_for_superscore;
        let before = films.len();
        let kept: Vec<FusedFilm> = films
            .into_iter()
            .filter(|film| film.num_available_ratings >= min)
            .collect();

        info!(
            "Final filter kept {} of {} films with >= {} normalized ratings",
            kept.len(),
            before,
            min
        );
        kept
    }

    fn report_assessment(&self, assessment: &QualityAssessment) {
        metrics::quality_gate::assessment(assessment);

        match assessment.decision {
            QualityDecision::Accept => {
                info!("Validation passed for {}", assessment.table);
            }
            QualityDecision::AcceptWithWarnings | QualityDecision::Quarantine => {
                warn!(
                    "Validation of {} finished with {:?} (score {:.2})",
                    assessment.table, assessment.decision, assessment.quality_score
                );
                for issue in &assessment.issues {
                    warn!("  [{:?}] {}", issue.severity, issue.description);
                }
            }
        }
    }
}
