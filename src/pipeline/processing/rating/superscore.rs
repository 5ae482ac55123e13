//! Composite scores over the normalized ratings of one film.

use crate::types::FusedFilm;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Fill `num_available_ratings` and, when at least `min_ratings` normalized
/// ratings are present, the mean and median superscores. Returns whether a
/// superscore was computed.
pub fn apply_superscore(film: &mut FusedFilm, min_ratings: usize) -> bool {
    let available = film.ratings_norm.present_values();
    film.num_available_ratings = available.len();

    if available.len() >= min_ratings && !available.is_empty() {
        film.superscore_mean = mean(&available);
        film.superscore_median = median(&available);
        true
    } else {
        film.superscore_mean = None;
        film.superscore_median = None;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Source, SourceRatings};
    use std::collections::BTreeMap;

    fn film_with_norm(values: &[(Source, f64)]) -> FusedFilm {
        let mut ratings_norm = SourceRatings::default();
        for (source, value) in values {
            ratings_norm.set(*source, Some(*value));
        }
        FusedFilm {
            norm_title: "heat".to_string(),
            title: "Heat".to_string(),
            year_cluster: 0,
            resolved_year: Some(1995),
            genres: Vec::new(),
            external_ids: BTreeMap::new(),
            ratings_raw: SourceRatings::default(),
            ratings_norm,
            count_ratings: values.len(),
            num_available_ratings: 0,
            superscore_mean: None,
            superscore_median: None,
        }
    }

    #[test]
    fn test_two_ratings_produce_mean_and_median() {
        let mut film = film_with_norm(&[(Source::Imdb, 8.0), (Source::Metacritic, 6.0)]);

        assert!(apply_superscore(&mut film, 2));
        assert_eq!(film.num_available_ratings, 2);
        assert_eq!(film.superscore_mean, Some(7.0));
        assert_eq!(film.superscore_median, Some(7.0));
    }

    #[test]
    fn test_single_rating_below_threshold_has_no_superscore() {
        let mut film = film_with_norm(&[(Source::Imdb, 8.0)]);

        assert!(!apply_superscore(&mut film, 2));
        assert_eq!(film.num_available_ratings, 1);
        assert_eq!(film.superscore_mean, None);
        assert_eq!(film.superscore_median, None);
    }

    #[test]
    fn test_median_of_odd_count_is_middle_value() {
        let mut film = film_with_norm(&[
            (Source::Imdb, 9.0),
            (Source::Movielens, 1.0),
            (Source::RtAudience, 6.0),
        ]);

        apply_superscore(&mut film, 2);
        assert_eq!(film.superscore_median, Some(6.0));
        assert_eq!(film.superscore_mean, Some(16.0 / 3.0));
    }

    #[test]
    fn test_zero_threshold_still_needs_a_rating() {
        let mut film = film_with_norm(&[]);
        assert!(!apply_superscore(&mut film, 0));
        assert_eq!(film.superscore_mean, None);
    }
}
