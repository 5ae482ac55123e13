use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rating catalogs the fusion engine knows about.
///
/// Declaration order is the source priority used wherever the engine has to
/// pick "the first" value across sources (genres, representative title).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Imdb,
    Movielens,
    Metacritic,
    RtAudience,
}

impl Source {
    pub const COUNT: usize = 4;
    pub const ALL: [Source; Source::COUNT] = [
        Source::Imdb,
        Source::Movielens,
        Source::Metacritic,
        Source::RtAudience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Imdb => "imdb",
            Source::Movielens => "movielens",
            Source::Metacritic => "metacritic",
            Source::RtAudience => "rt_audience",
        }
    }

    /// Parse a user-facing source name, accepting a few common aliases
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "imdb" => Some(Source::Imdb),
            "movielens" => Some(Source::Movielens),
            "metacritic" => Some(Source::Metacritic),
            "rt_audience" | "rt" | "rotten_tomatoes" | "rottentomatoes" => Some(Source::RtAudience),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row from one source table, as delivered by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub title: String,
    pub year: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub genres: Vec<String>,
    /// Rating on the source's native scale
    pub rating: Option<f64>,
    pub source: Source,
    /// External id columns present on the row, keyed by column name (`ID_IMDB`)
    pub external_ids: BTreeMap<String, String>,
}

impl Observation {
    pub fn new(title: impl Into<String>, source: Source) -> Self {
        Self {
            title: title.into(),
            year: None,
            release_date: None,
            genres: Vec::new(),
            rating: None,
            source,
            external_ids: BTreeMap::new(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_external_id(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.external_ids.insert(column.into(), value.into());
        self
    }
}

/// A loaded per-source table
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Adapter label (from configuration)
    pub name: String,
    pub source: Source,
    pub observations: Vec<Observation>,
}

/// Identity key of a film: cluster ids are only unique within one `norm_title`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedKey {
    pub norm_title: String,
    pub year_cluster: u32,
}

impl NormalizedKey {
    pub fn new(norm_title: impl Into<String>, year_cluster: u32) -> Self {
        Self {
            norm_title: norm_title.into(),
            year_cluster,
        }
    }
}

/// One optional value per known source
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRatings([Option<f64>; Source::COUNT]);

impl SourceRatings {
    pub fn get(&self, source: Source) -> Option<f64> {
        self.0[source.index()]
    }

    pub fn set(&mut self, source: Source, value: Option<f64>) {
        self.0[source.index()] = value;
    }

    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }

    /// Present values in source order
    pub fn present_values(&self) -> Vec<f64> {
        self.0.iter().flatten().copied().collect()
    }
}

/// One resolved, cross-source film record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedFilm {
    pub norm_title: String,
    /// Representative raw title (first observation in source priority order)
    pub title: String,
    pub year_cluster: u32,
    pub resolved_year: Option<i32>,
    pub genres: Vec<String>,
    pub external_ids: BTreeMap<String, String>,
    pub ratings_raw: SourceRatings,
    pub ratings_norm: SourceRatings,
    pub count_ratings: usize,
    pub num_available_ratings: usize,
    pub superscore_mean: Option<f64>,
    pub superscore_median: Option<f64>,
}
