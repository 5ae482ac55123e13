//! Rating normalization stage: rescale every source onto 0-10, treat
//! outliers per column, then compute superscores.

pub mod outlier;
pub mod registry;
pub mod superscore;

use tracing::{debug, info, warn};

use crate::types::{FusedFilm, Source};
use outlier::{treat_outliers, OutlierMethod, OutlierSettings};
use registry::spec_for;

/// Rescale a source-native rating onto 0-10. Missing and non-finite values
/// come back as `None`.
pub fn normalize_rating(source: Source, raw: Option<f64>) -> Option<f64> {
    raw.filter(|v| v.is_finite())
        .map(|v| spec_for(source).scale.rescale(v))
}

/// Coerce a raw cell into a rating; anything non-numeric becomes `None`
pub fn parse_rating(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationConfig {
    pub min_ratings_for_superscore: usize,
    pub outlier: OutlierSettings,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            min_ratings_for_superscore: 2,
            outlier: OutlierSettings::default(),
        }
    }
}

/// What the normalization stage did to a table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub films: usize,
    /// Values changed by outlier treatment, per source
    pub outliers_changed: Vec<(Source, usize)>,
    pub superscores_computed: usize,
}

pub struct RatingNormalizer {
    config: NormalizationConfig,
}

impl RatingNormalizer {
    pub fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizationConfig {
        &self.config
    }

    /// Normalize, treat outliers and compute superscores in place
    pub fn apply(&self, films: &mut [FusedFilm]) -> NormalizationReport {
        let mut report = NormalizationReport {
            films: films.len(),
            ..NormalizationReport::default()
        };

        for film in films.iter_mut() {
            for source in Source::ALL {
                let normalized = normalize_rating(source, film.ratings_raw.get(source));
                film.ratings_norm.set(source, normalized);
            }
        }

        match &self.config.outlier.method {
            OutlierMethod::None => {
                info!("Outlier treatment skipped (method='none')");
            }
            method => {
                info!("Starting outlier treatment with method '{}'", method.as_str());
                for source in Source::ALL {
                    let changed = self.treat_column(films, source);
                    if changed > 0 {
                        report.outliers_changed.push((source, changed));
                    }
                }
            }
        }

        for film in films.iter_mut() {
            if superscore::apply_superscore(film, self.config.min_ratings_for_superscore) {
                report.superscores_computed += 1;
            }
        }
        info!(
            "Superscores computed for {} of {} films (min ratings {})",
            report.superscores_computed,
            report.films,
            self.config.min_ratings_for_superscore
        );

        report
    }

    fn treat_column(&self, films: &mut [FusedFilm], source: Source) -> usize {
        let column_name = spec_for(source).norm_column;
        let column: Vec<Option<f64>> = films.iter().map(|f| f.ratings_norm.get(source)).collect();

        if column.iter().all(Option::is_none) {
            debug!("Column {} holds no values; no outlier treatment", column_name);
            return 0;
        }

        let treated = treat_outliers(&column, &self.config.outlier);
        if treated.len() != column.len() {
            warn!("Outlier treatment changed the length of {}; keeping original values", column_name);
            return 0;
        }

        let mut changed = 0;
        for (film, (before, after)) in films.iter_mut().zip(column.iter().zip(treated)) {
            if *before != after {
                changed += 1;
                film.ratings_norm.set(source, after);
            }
        }

        if changed > 0 {
            info!("Values in {} changed by outlier treatment: {}", column_name, changed);
        } else {
            debug!("No changes in {} from outlier treatment", column_name);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRatings;
    use std::collections::BTreeMap;

    fn film(raw: &[(Source, f64)]) -> FusedFilm {
        let mut ratings_raw = SourceRatings::default();
        for (source, value) in raw {
            ratings_raw.set(*source, Some(*value));
        }
        FusedFilm {
            norm_title: "film".to_string(),
            title: "Film".to_string(),
            year_cluster: 0,
            resolved_year: None,
            genres: Vec::new(),
            external_ids: BTreeMap::new(),
            ratings_raw,
            ratings_norm: SourceRatings::default(),
            count_ratings: ratings_raw.present_count(),
            num_available_ratings: 0,
            superscore_mean: None,
            superscore_median: None,
        }
    }

    #[test]
    fn test_rescale_round_numbers() {
        assert_eq!(normalize_rating(Source::Movielens, Some(4.0)), Some(8.0));
        assert_eq!(normalize_rating(Source::Metacritic, Some(75.0)), Some(7.5));
        assert_eq!(normalize_rating(Source::RtAudience, Some(90.0)), Some(9.0));
        assert_eq!(normalize_rating(Source::Imdb, Some(7.2)), Some(7.2));
    }

    #[test]
    fn test_missing_and_non_finite_ratings_become_none() {
        assert_eq!(normalize_rating(Source::Imdb, None), None);
        assert_eq!(normalize_rating(Source::Metacritic, Some(f64::NAN)), None);
    }

    #[test]
    fn test_parse_rating_coerces_garbage_to_none() {
        assert_eq!(parse_rating(" 7.5 "), Some(7.5));
        assert_eq!(parse_rating("tbd"), None);
        assert_eq!(parse_rating(""), None);
        assert_eq!(parse_rating("inf"), None);
    }

    #[test]
    fn test_apply_without_outlier_treatment() {
        let mut films = vec![
            film(&[(Source::Imdb, 8.0), (Source::Metacritic, 60.0)]),
            film(&[(Source::Movielens, 4.0)]),
        ];
        let normalizer = RatingNormalizer::new(NormalizationConfig {
            outlier: OutlierSettings {
                method: OutlierMethod::None,
                ..OutlierSettings::default()
            },
            ..NormalizationConfig::default()
        });

        let report = normalizer.apply(&mut films);

        assert_eq!(films[0].ratings_norm.get(Source::Metacritic), Some(6.0));
        assert_eq!(films[0].superscore_mean, Some(7.0));
        assert_eq!(films[1].ratings_norm.get(Source::Movielens), Some(8.0));
        assert_eq!(films[1].superscore_mean, None);
        assert_eq!(report.superscores_computed, 1);
        assert!(report.outliers_changed.is_empty());
    }

    #[test]
    fn test_apply_caps_outlier_column_before_superscore() {
        let mut films: Vec<FusedFilm> = [1.0, 2.0, 2.0, 3.0, 10.0]
            .iter()
            .map(|v| film(&[(Source::Imdb, *v), (Source::Movielens, 2.5)]))
            .collect();

        let report = RatingNormalizer::new(NormalizationConfig::default()).apply(&mut films);

        assert_eq!(films[4].ratings_norm.get(Source::Imdb), Some(4.5));
        assert_eq!(films[4].superscore_mean, Some(4.75));
        assert_eq!(report.outliers_changed, vec![(Source::Imdb, 1)]);
    }
}
