use std::{cmp::Ordering, collections::BTreeMap};

use macro_sup::set_mlog;
use serde::{Deserialize, Serialize};

use super::utils::{
    duplicatable_record::{DuplicatableRecord, OpticalOrientation, Pair},
    optical_duplicate_finder::OpticalDuplicateFinder,
};

set_mlog!(stringify!(DuplicateGroupResolver));

/// Which examined counter a record feeds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecordKind {
    Unpaired,
    Pair,
    Unmapped,
}

/// Outcome for one record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DuplicateDecision {
    pub(crate) name: String,
    pub(crate) partition_index: usize,
    pub(crate) library_id: i16,
    pub(crate) kind: RecordKind,
    pub(crate) duplicate: bool,
    pub(crate) optical_duplicate: bool,
}

impl DuplicateDecision {
    fn new(record: &DuplicatableRecord, duplicate: bool, optical_duplicate: bool) -> Self {
        let kind = match record.signature().map(|s| s.pairing_class()) {
            Some(p) if p.is_pair() => RecordKind::Pair,
            Some(_) => RecordKind::Unpaired,
            None => RecordKind::Unmapped,
        };

        Self {
            name: record.name().to_string(),
            partition_index: record.partition_index(),
            library_id: record.library_id(),
            kind,
            duplicate,
            optical_duplicate,
        }
    }
}

/// Score descending, then name, then ingestion index. Never depends on arrival order.
fn compare_for_representative(lhs: &DuplicatableRecord, rhs: &DuplicatableRecord) -> Ordering {
    rhs.score()
        .cmp(&lhs.score())
        .then_with(|| lhs.name().cmp(rhs.name()))
        .then_with(|| lhs.partition_index().cmp(&rhs.partition_index()))
}

/// Resolves duplicate groups. Holds no mutable state, so one instance may serve every worker.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(crate) struct DuplicateGroupResolver {
    optical_duplicate_finder: OpticalDuplicateFinder,
}

impl DuplicateGroupResolver {
    pub(crate) fn new(optical_duplicate_finder: OpticalDuplicateFinder) -> Self {
        Self {
            optical_duplicate_finder,
        }
    }

    /// Resolves every record of one shuffle partition.
    ///
    /// Records are bucketed by routing key, and each bucket is split on full signature equality
    /// before resolution so that key collisions never merge unrelated records.
    pub(crate) fn resolve_partition(&self, records: Vec<DuplicatableRecord>) -> Vec<DuplicateDecision> {
        let mut decisions = Vec::with_capacity(records.len());
        let mut buckets: BTreeMap<u32, Vec<DuplicatableRecord>> = BTreeMap::new();

        for record in records {
            if record.signature().is_none() {
                decisions.push(DuplicateDecision::new(&record, false, false));
            } else {
                buckets.entry(record.routing_key()).or_default().push(record);
            }
        }

        let mut collisions = 0;
        for bucket in buckets.into_values() {
            let groups = Self::split_by_signature(bucket);
            collisions += groups.len() - 1;

            for group in groups {
                decisions.extend(self.resolve_group(group));
            }
        }

        if collisions > 0 {
            mlog::debug!("Split {} signature key collisions.", collisions);
        }

        decisions
    }

    /// Splits records sharing a routing key into groups of field-wise equal signatures.
    pub(crate) fn split_by_signature(bucket: Vec<DuplicatableRecord>) -> Vec<Vec<DuplicatableRecord>> {
        let mut groups: Vec<Vec<DuplicatableRecord>> = Vec::new();

        for record in bucket {
            let slot = groups
                .iter_mut()
                .find(|g| g.first().and_then(|f| f.signature()) == record.signature());

            match slot {
                Some(group) => group.push(record),
                None => groups.push(vec![record]),
            }
        }

        groups
    }

    /// Resolves one group of records with equal signatures. The best-scoring record is kept,
    /// every other record is a duplicate, and pair duplicates close to each other on the flowcell
    /// are additionally flagged optical.
    pub(crate) fn resolve_group(&self, mut group: Vec<DuplicatableRecord>) -> Vec<DuplicateDecision> {
        if group.len() == 1 {
            return group
                .iter()
                .map(|r| DuplicateDecision::new(r, false, false))
                .collect();
        }

        group.sort_by(compare_for_representative);

        mlog::debug!(
            "Resolving {} records kept by {} (read 1 {} strand).",
            group.len(),
            group[0].name(),
            if group[0].is_read1_reverse_strand() { "reverse" } else { "forward" }
        );

        let optical = self.optical_flags(&group);

        group
            .iter()
            .zip(optical)
            .enumerate()
            .map(|(i, (record, is_optical))| DuplicateDecision::new(record, i != 0, i != 0 && is_optical))
            .collect()
    }

    /// Optical flags of a sorted group whose first record is the representative.
    fn optical_flags(&self, group: &[DuplicatableRecord]) -> Vec<bool> {
        let mut flags = vec![false; group.len()];

        let pairs = group
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match (r, r.orientation_for_optical_duplicates()) {
                (DuplicatableRecord::Pair(p), Some(o)) => Some((i, o, p)),
                _ => None,
            })
            .collect::<Vec<_>>();

        if pairs.len() < 2 {
            return flags;
        }

        let has_fr = pairs.iter().any(|(_, o, _)| *o == OpticalOrientation::FR);
        let has_rf = pairs.iter().any(|(_, o, _)| *o == OpticalOrientation::RF);

        // FR and RF pairs of one position class come from opposite strands of the template;
        // they are examined as separate sets.
        let subsets: Vec<Vec<(usize, OpticalOrientation, &Pair)>> = if has_fr && has_rf {
            let (fr, rest): (Vec<_>, Vec<_>) = pairs
                .into_iter()
                .partition(|(_, o, _)| *o == OpticalOrientation::FR);
            vec![fr, rest]
        } else {
            vec![pairs]
        };

        for subset in subsets {
            let keeper = subset.iter().position(|(i, _, _)| *i == 0);
            let locations = subset.iter().map(|(_, _, p)| *p).collect::<Vec<_>>();

            let found = self
                .optical_duplicate_finder
                .find_optical_duplicates(&locations, keeper);

            for ((i, _, _), is_optical) in subset.iter().zip(found) {
                flags[*i] = is_optical;
            }
        }

        flags
    }
}
