use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::types::{NormalizedKey, Observation};

/// An observation together with its `(norm_title, year_cluster)` key
#[derive(Debug, Clone)]
pub struct KeyedObservation<'a> {
    pub observation: &'a Observation,
    pub key: NormalizedKey,
    /// Observed year, or the year embedded in the raw title when absent
    pub year: Option<i32>,
    /// Position in the combined input, used as the final tie-break
    pub ordinal: usize,
}

/// Composite of the external ids on one observation: `"{column}={value}"`
/// pairs sorted lexicographically and joined by `|`. Empty without ids.
pub fn identity_signature(observation: &Observation) -> String {
    let mut pairs: Vec<String> = observation
        .external_ids
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(column, value)| format!("{}={}", column, value.trim()))
        .collect();
    pairs.sort();
    pairs.join("|")
}

/// Mapping from each key to the canonical key it resolves to.
/// Keys that were never merged resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct KeyRemap {
    remap: HashMap<NormalizedKey, NormalizedKey>,
    merged_components: usize,
}

impl KeyRemap {
    pub fn resolve<'a>(&'a self, key: &'a NormalizedKey) -> &'a NormalizedKey {
        self.remap.get(key).unwrap_or(key)
    }

    /// Number of key groups that were coalesced into one
    pub fn merged_components(&self) -> usize {
        self.merged_components
    }

    /// Number of keys that now resolve to a different key
    pub fn remapped_keys(&self) -> usize {
        self.remap.iter().filter(|(from, to)| from != to).count()
    }
}

/// Trait for coalescing keys that identify the same physical film
pub trait Conflator {
    fn reconcile(&self, observations: &[KeyedObservation<'_>]) -> KeyRemap;
}

/// Merges keys of observations that share a non-empty identity signature.
///
/// Every signature occurring on two or more observations links the keys of
/// those observations. Each linked component resolves to the key carrying the
/// most frequent `norm_title` among the colliding observations (ties: longer
/// title, then lexicographically smaller), with the smallest cluster id for
/// that title. The resolved year of the merged film is the group minimum,
/// which the fusion engine computes over the merged group.
#[derive(Debug, Default)]
pub struct SignatureConflator;

impl SignatureConflator {
    pub fn new() -> Self {
        Self
    }
}

impl Conflator for SignatureConflator {
    fn reconcile(&self, observations: &[KeyedObservation<'_>]) -> KeyRemap {
        let mut by_signature: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, keyed) in observations.iter().enumerate() {
            let signature = identity_signature(keyed.observation);
            if !signature.is_empty() {
                by_signature.entry(signature).or_default().push(idx);
            }
        }

        let mut union = KeyUnion::default();
        let mut colliding: BTreeSet<usize> = BTreeSet::new();
        for (signature, members) in &by_signature {
            if members.len() < 2 {
                continue;
            }
            let first = union.insert(&observations[members[0]].key);
            for &member in members {
                let other = union.insert(&observations[member].key);
                union.union(first, other);
                colliding.insert(member);
            }
            debug!("Signature {} links {} observations", signature, members.len());
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in colliding {
            let slot = union.insert(&observations[idx].key);
            components.entry(union.find(slot)).or_default().push(idx);
        }

        let mut remap = KeyRemap::default();
        for members in components.values() {
            let keys: BTreeSet<&NormalizedKey> =
                members.iter().map(|&idx| &observations[idx].key).collect();
            if keys.len() < 2 {
                continue;
            }

            let canonical = canonical_key(members.iter().map(|&idx| &observations[idx].key));
            for key in keys {
                remap.remap.insert(key.clone(), canonical.clone());
            }
            remap.merged_components += 1;
        }

        remap
    }
}

/// Pick the canonical key among the colliding observations' keys
fn canonical_key<'a>(keys: impl Iterator<Item = &'a NormalizedKey>) -> NormalizedKey {
    let keys: Vec<&NormalizedKey> = keys.collect();

    let mut title_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for key in keys.iter().copied() {
        *title_counts.entry(key.norm_title.as_str()).or_default() += 1;
    }

    // BTreeMap iteration is ascending, so strict comparisons keep the
    // lexicographically smallest title on a full tie
    let mut best: Option<(&str, usize)> = None;
    for (title, count) in title_counts {
        let better = match best {
            None => true,
            Some((best_title, best_count)) => {
                count > best_count || (count == best_count && title.len() > best_title.len())
            }
        };
        if better {
            best = Some((title, count));
        }
    }
    let title = best.map(|(title, _)| title).unwrap_or_default();

    keys.into_iter()
        .filter(|key| key.norm_title == title)
        .min()
        .cloned()
        .unwrap_or_else(|| NormalizedKey::new(title, 0))
}

/// Union-find over keys
#[derive(Debug, Default)]
struct KeyUnion {
    slots: HashMap<NormalizedKey, usize>,
    parent: Vec<usize>,
}

impl KeyUnion {
    fn insert(&mut self, key: &NormalizedKey) -> usize {
        if let Some(&slot) = self.slots.get(key) {
            return slot;
        }
        let slot = self.parent.len();
        self.parent.push(slot);
        self.slots.insert(key.clone(), slot);
        slot
    }

    fn find(&mut self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            self.parent[slot] = self.parent[self.parent[slot]];
            slot = self.parent[slot];
        }
        slot
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower slot wins so roots are stable across runs
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn keyed<'a>(observation: &'a Observation, title: &str, cluster: u32, ordinal: usize) -> KeyedObservation<'a> {
        KeyedObservation {
            observation,
            key: NormalizedKey::new(title, cluster),
            year: observation.year,
            ordinal,
        }
    }

    #[test]
    fn test_signature_is_sorted_and_joined() {
        let obs = Observation::new("Heat", Source::Imdb)
            .with_external_id("ID_MOVIELENS", "6")
            .with_external_id("ID_IMDB", "tt0113277");

        assert_eq!(identity_signature(&obs), "ID_IMDB=tt0113277|ID_MOVIELENS=6");
        assert_eq!(identity_signature(&Observation::new("Heat", Source::Imdb)), "");
    }

    #[test]
    fn test_blank_id_values_are_ignored() {
        let obs = Observation::new("Heat", Source::Imdb).with_external_id("ID_IMDB", "  ");
        assert_eq!(identity_signature(&obs), "");
    }

    #[test]
    fn test_shared_signature_merges_spelling_drift() {
        let a = Observation::new("Inception", Source::Imdb).with_external_id("ID_IMDB", "42");
        let b = Observation::new("Inception", Source::Imdb).with_external_id("ID_IMDB", "42");
        let c = Observation::new("Incepton", Source::Imdb).with_external_id("ID_IMDB", "42");
        let observations = vec![
            keyed(&a, "inception", 0, 0),
            keyed(&b, "inception", 0, 1),
            keyed(&c, "incepton", 0, 2),
        ];

        let remap = SignatureConflator::new().reconcile(&observations);

        let canonical = NormalizedKey::new("inception", 0);
        assert_eq!(remap.resolve(&NormalizedKey::new("incepton", 0)), &canonical);
        assert_eq!(remap.resolve(&canonical), &canonical);
        assert_eq!(remap.merged_components(), 1);
        assert_eq!(remap.remapped_keys(), 1);
    }

    #[test]
    fn test_frequency_tie_prefers_longer_title() {
        let a = Observation::new("Se7en", Source::Metacritic).with_external_id("ID_METACRITIC", "7");
        let b = Observation::new("Seven", Source::Metacritic).with_external_id("ID_METACRITIC", "7");
        let observations = vec![keyed(&a, "se7en", 0, 0), keyed(&b, "seven x", 1, 1)];

        let remap = SignatureConflator::new().reconcile(&observations);
        assert_eq!(remap.resolve(&NormalizedKey::new("se7en", 0)), &NormalizedKey::new("seven x", 1));
    }

    #[test]
    fn test_unique_and_empty_signatures_are_untouched() {
        let a = Observation::new("Heat", Source::Imdb).with_external_id("ID_IMDB", "1");
        let b = Observation::new("Heat", Source::Movielens).with_external_id("ID_MOVIELENS", "1");
        let c = Observation::new("Heat 2", Source::Imdb);
        let d = Observation::new("Heat 3", Source::Imdb);
        let observations = vec![
            keyed(&a, "heat", 0, 0),
            keyed(&b, "heat", 1, 1),
            keyed(&c, "heat 2", 0, 2),
            keyed(&d, "heat 3", 0, 3),
        ];

        let remap = SignatureConflator::new().reconcile(&observations);
        assert_eq!(remap.merged_components(), 0);
        assert_eq!(remap.resolve(&NormalizedKey::new("heat", 1)), &NormalizedKey::new("heat", 1));
    }

    #[test]
    fn test_signature_bridges_year_clusters() {
        let a = Observation::new("Dune", Source::Imdb).with_year(1984).with_external_id("ID_IMDB", "9");
        let b = Observation::new("Dune", Source::Imdb).with_year(1987).with_external_id("ID_IMDB", "9");
        let observations = vec![keyed(&a, "dune", 0, 0), keyed(&b, "dune", 1, 1)];

        let remap = SignatureConflator::new().reconcile(&observations);
        assert_eq!(remap.resolve(&NormalizedKey::new("dune", 1)), &NormalizedKey::new("dune", 0));
    }
}
