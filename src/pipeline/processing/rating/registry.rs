//! Static registry of the rating sources the engine understands.

use crate::types::Source;

/// How a source's native rating maps onto the common 0-10 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingScale {
    /// Already 0-10
    Identity,
    Multiply(f64),
    Divide(f64),
}

impl RatingScale {
    pub fn rescale(&self, value: f64) -> f64 {
        match self {
            RatingScale::Identity => value,
            RatingScale::Multiply(factor) => value * factor,
            RatingScale::Divide(divisor) => value / divisor,
        }
    }
}

/// Everything the pipeline needs to know about one source's columns and scale
#[derive(Debug, Clone, Copy)]
pub struct SourceSpec {
    pub source: Source,
    /// Rating column in adapter tables and in the fused output
    pub rating_column: &'static str,
    /// Older column names that imply this source
    pub legacy_rating_columns: &'static [&'static str],
    pub id_column: &'static str,
    /// Inclusive native rating range
    pub native_range: (f64, f64),
    pub scale: RatingScale,
    /// Normalized column in the fused output
    pub norm_column: &'static str,
}

pub const SOURCE_SPECS: [SourceSpec; Source::COUNT] = [
    SourceSpec {
        source: Source::Imdb,
        rating_column: "rating_imdb",
        legacy_rating_columns: &[],
        id_column: "ID_IMDB",
        native_range: (0.0, 10.0),
        scale: RatingScale::Identity,
        norm_column: "imdb_norm",
    },
    SourceSpec {
        source: Source::Movielens,
        rating_column: "rating_movielens",
        legacy_rating_columns: &[],
        id_column: "ID_MOVIELENS",
        native_range: (0.0, 5.0),
        scale: RatingScale::Multiply(2.0),
        norm_column: "movielens_norm",
    },
    SourceSpec {
        source: Source::Metacritic,
        rating_column: "rating_metacritic",
        legacy_rating_columns: &[],
        id_column: "ID_METACRITIC",
        native_range: (0.0, 100.0),
        scale: RatingScale::Divide(10.0),
        norm_column: "metacritic_norm",
    },
    SourceSpec {
        source: Source::RtAudience,
        rating_column: "rating_rt_audience",
        legacy_rating_columns: &["tomatometer_rating"],
        id_column: "ID_RT",
        native_range: (0.0, 100.0),
        scale: RatingScale::Divide(10.0),
        norm_column: "rt_norm",
    },
];

pub fn spec_for(source: Source) -> &'static SourceSpec {
    &SOURCE_SPECS[source.index()]
}

/// Source implied by a rating column name, current or legacy
pub fn source_for_rating_column(column: &str) -> Option<Source> {
    let column = column.trim();
    SOURCE_SPECS
        .iter()
        .find(|spec| spec.rating_column == column || spec.legacy_rating_columns.contains(&column))
        .map(|spec| spec.source)
}

/// First header column that names a known rating source, with its position
pub fn detect_rating_column<'h, I>(headers: I) -> Option<(usize, Source)>
where
    I: IntoIterator<Item = &'h str>,
{
    headers
        .into_iter()
        .enumerate()
        .find_map(|(idx, column)| source_for_rating_column(column).map(|source| (idx, source)))
}

pub fn is_id_column(column: &str) -> bool {
    column.starts_with("ID_") && column.len() > 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_indexed_by_source() {
        for source in Source::ALL {
            assert_eq!(spec_for(source).source, source);
        }
    }

    #[test]
    fn test_legacy_tomatometer_column_maps_to_rt_audience() {
        assert_eq!(source_for_rating_column("tomatometer_rating"), Some(Source::RtAudience));
        assert_eq!(source_for_rating_column("rating_movielens"), Some(Source::Movielens));
        assert_eq!(source_for_rating_column("rating_letterboxd"), None);
    }

    #[test]
    fn test_detect_rating_column_returns_position() {
        let headers = ["ID_IMDB", "title", "year", "genres", "rating_imdb"];
        assert_eq!(detect_rating_column(headers), Some((4, Source::Imdb)));
        assert_eq!(detect_rating_column(["title", "year"]), None);
    }

    #[test]
    fn test_id_column_detection() {
        assert!(is_id_column("ID_RT"));
        assert!(!is_id_column("ID_"));
        assert!(!is_id_column("imdb_id"));
    }
}
