//! Release-year clustering within one normalized-title group.

use std::collections::{BTreeMap, BTreeSet};

/// Years at most this far apart chain into one cluster
pub const YEAR_TOLERANCE: i32 = 1;

/// Assign a cluster id to every position of `years`.
///
/// Distinct present years are sorted and split wherever the gap to the
/// previous year exceeds [`YEAR_TOLERANCE`], so maximal runs of adjacent years
/// share an id. Missing years all receive one extra id that no known year uses.
pub fn cluster_years(years: &[Option<i32>]) -> Vec<u32> {
    let assignments = assign_clusters(years.iter().flatten().copied());
    let unknown_cluster = assignments.values().max().map_or(0, |max| max + 1);

    years
        .iter()
        .map(|year| match year {
            Some(y) => assignments[y],
            None => unknown_cluster,
        })
        .collect()
}

/// Fold the sorted distinct years into a year -> cluster id map
fn assign_clusters(years: impl Iterator<Item = i32>) -> BTreeMap<i32, u32> {
    let distinct: BTreeSet<i32> = years.collect();

    let (assignments, _) = distinct.into_iter().fold(
        (BTreeMap::new(), None::<(i32, u32)>),
        |(mut map, previous), year| {
            let cluster = match previous {
                Some((prev_year, prev_cluster)) if year - prev_year <= YEAR_TOLERANCE => prev_cluster,
                Some((_, prev_cluster)) => prev_cluster + 1,
                None => 0,
            };
            map.insert(year, cluster);
            (map, Some((year, cluster)))
        },
    );

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_years_share_a_cluster() {
        let ids = cluster_years(&[Some(1998), Some(1999), Some(2001)]);

        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn test_gap_of_two_splits_clusters() {
        let ids = cluster_years(&[Some(2002), Some(1999), Some(2000)]);

        assert_eq!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_runs_chain_through_adjacent_years() {
        let ids = cluster_years(&[Some(2000), Some(2001), Some(2002), Some(2003)]);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }

    #[test]
    fn test_duplicate_years_and_input_order() {
        let ids = cluster_years(&[Some(2010), Some(1990), Some(2010), Some(1991)]);

        assert_eq!(ids[0], ids[2]);
        assert_eq!(ids[1], ids[3]);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_missing_years_get_a_private_cluster() {
        let ids = cluster_years(&[Some(2000), None, Some(2001), None]);

        assert_eq!(ids[0], ids[2]);
        assert_eq!(ids[1], ids[3]);
        assert_ne!(ids[1], ids[0]);
    }

    #[test]
    fn test_only_missing_years() {
        assert_eq!(cluster_years(&[None, None]), vec![0, 0]);
        assert!(cluster_years(&[]).is_empty());
    }
}
