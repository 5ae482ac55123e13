//! Long-to-wide fusion of per-source observations into one row per film.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::pipeline::processing::conflation::{Conflator, KeyedObservation, SignatureConflator};
use crate::pipeline::processing::title::{normalize_title, title_year};
use crate::pipeline::processing::year_cluster::cluster_years;
use crate::types::{FusedFilm, NormalizedKey, Observation, SourceRatings};

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Fused rows with fewer raw ratings than this are dropped
    pub min_ratings_for_fusion: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_ratings_for_fusion: 2,
        }
    }
}

/// Counters describing one fusion pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionReport {
    pub observations: usize,
    /// Observations whose title normalized to nothing
    pub skipped_untitled: usize,
    pub signature_merges: usize,
    pub resolved_films: usize,
    pub retained: usize,
    pub dropped_below_threshold: usize,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    /// Rows passing the retention gate, sorted by rating count then year,
    /// both descending
    pub films: Vec<FusedFilm>,
    /// Every resolved row before the retention gate
    pub unfiltered: Vec<FusedFilm>,
    /// Retained rows sharing `(norm_title, resolved_year)` with another row
    pub duplicates: Vec<FusedFilm>,
    pub report: FusionReport,
}

/// Resolves observations to films and pivots them into wide rows.
///
/// Within one film, observations are ranked by source priority, then raw
/// title, then input position. Every per-source slot takes the first
/// non-null value in that ranking; later same-source duplicates are ignored
/// rather than averaged.
pub struct SourceFusionEngine {
    config: FusionConfig,
    conflator: Box<dyn Conflator + Send + Sync>,
}

impl SourceFusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            conflator: Box::new(SignatureConflator::new()),
        }
    }

    pub fn with_conflator(config: FusionConfig, conflator: Box<dyn Conflator + Send + Sync>) -> Self {
        Self { config, conflator }
    }

    pub fn fuse(&self, observations: &[Observation]) -> FusionOutcome {
        let mut report = FusionReport {
            observations: observations.len(),
            ..FusionReport::default()
        };

        let keyed = assign_keys(observations, &mut report);

        let remap = self.conflator.reconcile(&keyed);
        report.signature_merges = remap.merged_components();
        if remap.merged_components() > 0 {
            info!(
                "Identity signatures coalesced {} key groups ({} keys remapped)",
                remap.merged_components(),
                remap.remapped_keys()
            );
        }

        let mut groups: BTreeMap<NormalizedKey, Vec<&KeyedObservation<'_>>> = BTreeMap::new();
        for entry in &keyed {
            let resolved = remap.resolve(&entry.key).clone();
            groups.entry(resolved).or_default().push(entry);
        }

        let unfiltered: Vec<FusedFilm> = groups
            .into_iter()
            .map(|(key, members)| fuse_group(key, members))
            .collect();
        report.resolved_films = unfiltered.len();

        let mut films: Vec<FusedFilm> = unfiltered
            .iter()
            .filter(|film| film.count_ratings >= self.config.min_ratings_for_fusion)
            .cloned()
            .collect();
        films.sort_by(compare_for_output);
        report.retained = films.len();
        report.dropped_below_threshold = unfiltered.len() - films.len();

        let duplicates = find_duplicates(&films);
        report.duplicate_rows = duplicates.len();
        if !duplicates.is_empty() {
            warn!(
                "{} retained rows share (norm_title, release_year) with another row",
                duplicates.len()
            );
        }

        info!(
            "Fusion resolved {} films from {} observations; {} kept with >= {} ratings",
            report.resolved_films,
            report.observations,
            report.retained,
            self.config.min_ratings_for_fusion
        );

        FusionOutcome {
            films,
            unfiltered,
            duplicates,
            report,
        }
    }
}

/// Normalize titles and cluster years per title group. A missing year falls
/// back to a `(YYYY)` written into the raw title.
fn assign_keys<'a>(observations: &'a [Observation], report: &mut FusionReport) -> Vec<KeyedObservation<'a>> {
    let mut by_title: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (ordinal, observation) in observations.iter().enumerate() {
        let norm_title = normalize_title(&observation.title);
        if norm_title.is_empty() {
            warn!(
                "Skipping {} observation with unusable title {:?}",
                observation.source, observation.title
            );
            report.skipped_untitled += 1;
            continue;
        }
        by_title.entry(norm_title).or_default().push(ordinal);
    }

    let mut keyed = Vec::with_capacity(observations.len() - report.skipped_untitled);
    for (norm_title, ordinals) in by_title {
        let years: Vec<Option<i32>> = ordinals
            .iter()
            .map(|&i| observations[i].year.or_else(|| title_year(&observations[i].title)))
            .collect();
        let clusters = cluster_years(&years);
        for ((&ordinal, cluster), year) in ordinals.iter().zip(clusters).zip(years) {
            keyed.push(KeyedObservation {
                observation: &observations[ordinal],
                key: NormalizedKey::new(norm_title.clone(), cluster),
                year,
                ordinal,
            });
        }
    }
    keyed.sort_by_key(|entry| entry.ordinal);
    keyed
}

fn rank(a: &KeyedObservation<'_>, b: &KeyedObservation<'_>) -> Ordering {
    a.observation
        .source
        .cmp(&b.observation.source)
        .then_with(|| a.observation.title.cmp(&b.observation.title))
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

/// Build one wide row from the observations resolved to `key`
fn fuse_group(key: NormalizedKey, mut members: Vec<&KeyedObservation<'_>>) -> FusedFilm {
    members.sort_by(|a, b| rank(a, b));

    let mut ratings_raw = SourceRatings::default();
    let mut external_ids: BTreeMap<String, String> = BTreeMap::new();
    let mut genres: Option<&Vec<String>> = None;

    for member in &members {
        let observation = member.observation;

        if let Some(rating) = observation.rating.filter(|r| r.is_finite()) {
            if ratings_raw.get(observation.source).is_none() {
                ratings_raw.set(observation.source, Some(rating));
            } else {
                debug!(
                    "Ignoring duplicate {} rating for '{}'",
                    observation.source, key.norm_title
                );
            }
        }

        if genres.is_none() && observation.genres.iter().any(|g| !g.trim().is_empty()) {
            genres = Some(&observation.genres);
        }

        for (column, value) in &observation.external_ids {
            if !value.trim().is_empty() {
                external_ids.entry(column.clone()).or_insert_with(|| value.trim().to_string());
            }
        }
    }

    let resolved_year = members.iter().filter_map(|m| m.year).min();
    let title = members
        .first()
        .map(|m| m.observation.title.trim().to_string())
        .unwrap_or_default();
    let count_ratings = ratings_raw.present_count();

    FusedFilm {
        title,
        year_cluster: key.year_cluster,
        norm_title: key.norm_title,
        resolved_year,
        genres: genres.cloned().unwrap_or_default(),
        external_ids,
        ratings_raw,
        ratings_norm: SourceRatings::default(),
        count_ratings,
        num_available_ratings: 0,
        superscore_mean: None,
        superscore_median: None,
    }
}

/// Rating count descending, then release year descending with unknown years last
fn compare_for_output(a: &FusedFilm, b: &FusedFilm) -> Ordering {
    b.count_ratings
        .cmp(&a.count_ratings)
        .then_with(|| match (a.resolved_year, b.resolved_year) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// All rows whose `(norm_title, resolved_year)` occurs more than once
fn find_duplicates(films: &[FusedFilm]) -> Vec<FusedFilm> {
    let mut counts: HashMap<(&str, Option<i32>), usize> = HashMap::new();
    for film in films {
        *counts.entry((film.norm_title.as_str(), film.resolved_year)).or_default() += 1;
    }

    films
        .iter()
        .filter(|film| counts[&(film.norm_title.as_str(), film.resolved_year)] > 1)
        .cloned()
        .collect()
}
