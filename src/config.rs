use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{FusionError, Result};
use crate::pipeline::processing::fusion::FusionConfig;
use crate::pipeline::processing::rating::outlier::{is_valid_iqr_factor, OutlierMethod, OutlierSettings};
use crate::pipeline::processing::rating::NormalizationConfig;
use crate::types::Source;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub sources: Vec<SourceConfig>,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_name: "film_fusion.log".to_string(),
        }
    }
}

/// One canonical per-source table to load
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Adapter label used in logs and metrics
    pub name: String,
    pub path: PathBuf,
    /// Rating source; inferred from the table header when absent
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub min_ratings_for_fusion: usize,
    pub min_ratings_for_superscore: usize,
    pub apply_outlier_treatment: bool,
    pub outlier_treatment: OutlierConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            min_ratings_for_fusion: 2,
            min_ratings_for_superscore: 2,
            apply_outlier_treatment: true,
            outlier_treatment: OutlierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub method: String,
    pub iqr_factor: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: "cap".to_string(),
            iqr_factor: 1.5,
            lower_percentile: 0.05,
            upper_percentile: 0.95,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub merged_csv_path: Option<PathBuf>,
    pub final_filtered_filename: String,
    pub unfiltered_csv_path: Option<PathBuf>,
    pub duplicates_csv_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            merged_csv_path: Some(PathBuf::from("data/processed/merged_movies.csv")),
            final_filtered_filename: "final_filtered_superscore.csv".to_string(),
            unfiltered_csv_path: Some(PathBuf::from(
                "data/processed/all_movies_wide_unfiltered.csv",
            )),
            duplicates_csv_path: Some(PathBuf::from(
                "data/processed/duplicates/merged_duplicates.csv",
            )),
            metrics_path: None,
        }
    }
}

impl OutputConfig {
    /// The final table lives next to the merged table, or under
    /// `data/processed/` when no merged path is configured.
    pub fn final_csv_path(&self) -> PathBuf {
        let dir = self
            .merged_csv_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("data/processed"));
        dir.join(&self.final_filtered_filename)
    }
}

impl Config {
    /// Load configuration from a TOML file, resolving relative paths against
    /// the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FusionError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml_str(&content)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the run cannot start with and warn about knobs
    /// the rating stage will ignore.
    pub fn validate(&self) -> Result<()> {
        for source in &self.sources {
            if let Some(name) = &source.source {
                if Source::from_name(name).is_none() {
                    return Err(FusionError::UnknownSource(name.clone()));
                }
            }
        }

        let outlier = &self.processing.outlier_treatment;
        if let OutlierMethod::Unknown(name) = OutlierMethod::parse(&outlier.method) {
            warn!("Unknown outlier treatment method '{}'; columns will be left untreated", name);
        }
        if !is_valid_iqr_factor(outlier.iqr_factor) {
            warn!(
                "Invalid outlier iqr_factor {}; cap and nan treatment will be skipped",
                outlier.iqr_factor
            );
        }
        if !(0.0..=1.0).contains(&outlier.lower_percentile)
            || !(0.0..=1.0).contains(&outlier.upper_percentile)
            || outlier.lower_percentile >= outlier.upper_percentile
        {
            warn!(
                "Invalid outlier percentiles lower={} upper={}; percentile_cap will be skipped",
                outlier.lower_percentile, outlier.upper_percentile
            );
        }
        if self.processing.min_ratings_for_fusion == 0 {
            warn!("min_ratings_for_fusion is 0; every fused film will be retained");
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        for source in &mut self.sources {
            resolve(&mut source.path);
        }
        if let Some(dir) = self.logging.directory.as_mut() {
            resolve(dir);
        }
        for path in [
            self.output.merged_csv_path.as_mut(),
            self.output.unfiltered_csv_path.as_mut(),
            self.output.duplicates_csv_path.as_mut(),
            self.output.metrics_path.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }

    pub fn fusion_config(&self) -> FusionConfig {
        FusionConfig {
            min_ratings_for_fusion: self.processing.min_ratings_for_fusion,
        }
    }

    pub fn normalization_config(&self) -> NormalizationConfig {
        let outlier = &self.processing.outlier_treatment;
        let method = if self.processing.apply_outlier_treatment {
            OutlierMethod::parse(&outlier.method)
        } else {
            OutlierMethod::None
        };

        NormalizationConfig {
            min_ratings_for_superscore: self.processing.min_ratings_for_superscore,
            outlier: OutlierSettings {
                method,
                iqr_factor: outlier.iqr_factor,
                lower_percentile: outlier.lower_percentile,
                upper_percentile: outlier.upper_percentile,
            },
        }
    }
}
