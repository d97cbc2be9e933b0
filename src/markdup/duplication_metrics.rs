use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hts::metrics::{format_metric_f64, MetricBean};

use super::{
    duplicate_group_resolver::{DuplicateDecision, RecordKind},
    utils::library_id_generator::LibraryIdGenerator,
};

/// Per-library counters, mutated while decisions stream in.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct DuplicationMetrics {
    pub(crate) library: String,
    pub(crate) unpaired_reads_examined: u64,
    pub(crate) read_pairs_examined: u64,
    pub(crate) unmapped_reads: u64,
    pub(crate) unpaired_read_duplicates: u64,
    pub(crate) read_pair_duplicates: u64,
    pub(crate) read_pair_optical_duplicates: u64,
}

impl DuplicationMetrics {
    pub(crate) fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            ..Default::default()
        }
    }

    /// Counts one record: exactly one examined counter, plus the duplicate counter and the optical
    /// counter when flagged.
    pub(crate) fn add_decision(&mut self, decision: &DuplicateDecision) {
        match decision.kind {
            RecordKind::Unmapped => self.unmapped_reads += 1,
            RecordKind::Unpaired => {
                self.unpaired_reads_examined += 1;
                if decision.duplicate {
                    self.unpaired_read_duplicates += 1;
                }
            }
            RecordKind::Pair => {
                self.read_pairs_examined += 1;
                if decision.duplicate {
                    self.read_pair_duplicates += 1;
                    if decision.optical_duplicate {
                        self.read_pair_optical_duplicates += 1;
                    }
                }
            }
        }
    }

    pub(crate) fn merge(&mut self, other: &DuplicationMetrics) {
        self.unpaired_reads_examined += other.unpaired_reads_examined;
        self.read_pairs_examined += other.read_pairs_examined;
        self.unmapped_reads += other.unmapped_reads;
        self.unpaired_read_duplicates += other.unpaired_read_duplicates;
        self.read_pair_duplicates += other.read_pair_duplicates;
        self.read_pair_optical_duplicates += other.read_pair_optical_duplicates;
    }

    /// Computes the derived fields. Consumes the counters so nothing can be added afterwards.
    pub(crate) fn finalize(self, estimator: &LibrarySizeEstimator) -> FinalizedDuplicationMetrics {
        let denominator = self.unpaired_reads_examined + self.read_pairs_examined * 2;

        let percent_duplication = if denominator == 0 {
            f64::NAN
        } else {
            (self.unpaired_read_duplicates + self.read_pair_duplicates * 2) as f64 / denominator as f64
        };

        let estimated_library_size = estimator.estimate_library_size(
            self.read_pairs_examined as i64 - self.read_pair_optical_duplicates as i64,
            self.read_pairs_examined as i64 - self.read_pair_duplicates as i64,
        );

        FinalizedDuplicationMetrics {
            counts: self,
            percent_duplication,
            estimated_library_size,
        }
    }
}

/// A library's metrics row with derived fields. `NaN` and `None` mark undefined values.
#[derive(Clone, Debug)]
pub(crate) struct FinalizedDuplicationMetrics {
    counts: DuplicationMetrics,
    percent_duplication: f64,
    estimated_library_size: Option<i64>,
}

impl FinalizedDuplicationMetrics {
    pub(crate) fn counts(&self) -> &DuplicationMetrics {
        &self.counts
    }

    pub(crate) fn percent_duplication(&self) -> f64 {
        self.percent_duplication
    }

    pub(crate) fn estimated_library_size(&self) -> Option<i64> {
        self.estimated_library_size
    }
}

impl MetricBean for FinalizedDuplicationMetrics {
    fn type_name() -> &'static str {
        "picard.sam.DuplicationMetrics"
    }

    fn column_names() -> &'static [&'static str] {
        &[
            "LIBRARY",
            "UNPAIRED_READS_EXAMINED",
            "READ_PAIRS_EXAMINED",
            "UNMAPPED_READS",
            "UNPAIRED_READ_DUPLICATES",
            "READ_PAIR_DUPLICATES",
            "READ_PAIR_OPTICAL_DUPLICATES",
            "PERCENT_DUPLICATION",
            "ESTIMATED_LIBRARY_SIZE",
        ]
    }

    fn values(&self) -> Vec<String> {
        let c = &self.counts;

        vec![
            c.library.clone(),
            c.unpaired_reads_examined.to_string(),
            c.read_pairs_examined.to_string(),
            c.unmapped_reads.to_string(),
            c.unpaired_read_duplicates.to_string(),
            c.read_pair_duplicates.to_string(),
            c.read_pair_optical_duplicates.to_string(),
            format_metric_f64(self.percent_duplication),
            self.estimated_library_size
                .map(|v| v.to_string())
                .unwrap_or_default(),
        ]
    }
}

/// Bisection solver for the library size given total and unique read pairs.
#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub(crate) struct LibrarySizeEstimator {
    pub(crate) max_iterations: u32,
    pub(crate) initial_upper_multiple: f64,
}

impl Default for LibrarySizeEstimator {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            initial_upper_multiple: Self::DEFAULT_INITIAL_UPPER_MULTIPLE,
        }
    }
}

impl LibrarySizeEstimator {
    pub(crate) const DEFAULT_MAX_ITERATIONS: u32 = 40;
    pub(crate) const DEFAULT_INITIAL_UPPER_MULTIPLE: f64 = 100.0;

    /// Decades the upper bound may grow by before the estimate is given up.
    const MAX_WIDENINGS: u32 = 300;

    /// Parses `--LIBRARY_SIZE_UPPER_MULTIPLE`, which must be a finite number of at least 1.
    pub(crate) fn parse_initial_upper_multiple(s: &str) -> Result<f64, String> {
        let v = s.parse::<f64>().map_err(|e| e.to_string())?;

        if v.is_finite() && v >= 1.0 {
            Ok(v)
        } else {
            Err(format!("{} is not a finite number >= 1", s))
        }
    }

    /**
     * Estimates the size of a library based on the number of paired end molecules observed
     * and the number of unique pairs observed.
     *
     * Based on the Lander-Waterman equation that states:
     *     C/X = 1 - exp( -N/X )
     * where
     *     X = number of distinct molecules in library
     *     N = number of read pairs
     *     C = number of distinct fragments observed in read pairs
     *
     * Returns `None` when there is nothing to estimate from or no finite solution exists.
     */
    pub(crate) fn estimate_library_size(&self, read_pairs: i64, unique_read_pairs: i64) -> Option<i64> {
        let read_pair_duplicates = read_pairs - unique_read_pairs;

        if read_pairs <= 0 || read_pair_duplicates <= 0 || unique_read_pairs <= 0 {
            return None;
        }

        let n = read_pairs as f64;
        let c = unique_read_pairs as f64;

        if !self.initial_upper_multiple.is_finite() {
            return None;
        }

        let mut m = 1.0;
        let mut upper = self.initial_upper_multiple.max(m);

        if f(m * c, c, n) < 0.0 {
            return None;
        }

        let mut widenings = 0;
        while f(upper * c, c, n) > 0.0 {
            if widenings == Self::MAX_WIDENINGS {
                return None;
            }
            upper *= 10.0;
            widenings += 1;
        }

        for _ in 0..self.max_iterations {
            let r = (m + upper) / 2.0;
            let u = f(r * c, c, n);

            if u == 0.0 {
                break;
            } else if u > 0.0 {
                m = r;
            } else {
                upper = r;
            }
        }

        Some((c * (m + upper) / 2.0) as i64)
    }
}

/** Method that is used in the computation of estimated library size. */
fn f(x: f64, c: f64, n: f64) -> f64 {
    c / x - 1.0 + (-n / x).exp()
}

/// Per-library accumulation of decisions.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(crate) struct MetricsAggregator {
    by_library: BTreeMap<i16, DuplicationMetrics>,
}

impl MetricsAggregator {
    /// One empty row per header library, so libraries without reads still report.
    pub(crate) fn new(lib_gen: &LibraryIdGenerator) -> Self {
        let by_library = lib_gen
            .libraries()
            .map(|(id, name)| (id, DuplicationMetrics::new(name)))
            .collect();

        Self { by_library }
    }

    pub(crate) fn add(&mut self, decision: &DuplicateDecision) {
        self.by_library
            .entry(decision.library_id)
            .or_default()
            .add_decision(decision);
    }

    /// Counts are sums, so merge order does not matter.
    pub(crate) fn merge(mut self, other: MetricsAggregator) -> Self {
        for (library_id, metrics) in other.by_library {
            match self.by_library.get_mut(&library_id) {
                Some(m) => m.merge(&metrics),
                None => {
                    self.by_library.insert(library_id, metrics);
                }
            }
        }

        self
    }

    /// Finalized rows ordered by library name.
    pub(crate) fn finalize(self, estimator: &LibrarySizeEstimator) -> Vec<FinalizedDuplicationMetrics> {
        let mut rows = self
            .by_library
            .into_values()
            .map(|m| m.finalize(estimator))
            .collect::<Vec<_>>();

        rows.sort_by(|a, b| a.counts.library.cmp(&b.counts.library));

        rows
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn counts(library: &str, unpaired: u64, pairs: u64, unmapped: u64, unpaired_dups: u64, pair_dups: u64, optical: u64) -> DuplicationMetrics {
        DuplicationMetrics {
            library: library.into(),
            unpaired_reads_examined: unpaired,
            read_pairs_examined: pairs,
            unmapped_reads: unmapped,
            unpaired_read_duplicates: unpaired_dups,
            read_pair_duplicates: pair_dups,
            read_pair_optical_duplicates: optical,
        }
    }

    fn decision(library_id: i16, kind: RecordKind, duplicate: bool, optical_duplicate: bool) -> DuplicateDecision {
        DuplicateDecision {
            name: "r".into(),
            partition_index: 0,
            library_id,
            kind,
            duplicate,
            optical_duplicate,
        }
    }

    #[test]
    fn derived_fields_match_known_libraries() {
        let estimator = LibrarySizeEstimator::default();

        let m = counts("Solexa-16404", 3, 9, 3, 0, 2, 0).finalize(&estimator);
        assert_eq!(format_metric_f64(m.percent_duplication()), "0.190476");
        assert_eq!(m.estimated_library_size(), Some(17));

        let m = counts("Solexa-16412", 3, 6, 3, 0, 1, 0).finalize(&estimator);
        assert_eq!(format_metric_f64(m.percent_duplication()), "0.133333");
        assert_eq!(m.estimated_library_size(), Some(15));
    }

    #[test]
    fn all_optical_duplicates_have_no_library_size() {
        let m = counts("mylib", 0, 2, 0, 0, 1, 1).finalize(&LibrarySizeEstimator::default());

        assert_eq!(m.percent_duplication(), 0.5);
        assert_eq!(m.estimated_library_size(), None);
    }

    #[test]
    fn undefined_values_are_explicit() {
        let m = counts("empty", 0, 0, 5, 0, 0, 0).finalize(&LibrarySizeEstimator::default());

        assert!(m.percent_duplication().is_nan());
        assert_eq!(m.estimated_library_size(), None);

        let values = m.values();
        assert_eq!(values[7], "NaN");
        assert_eq!(values[8], "");
    }

    #[test]
    fn no_duplicates_has_no_library_size() {
        let estimator = LibrarySizeEstimator::default();

        assert_eq!(estimator.estimate_library_size(10, 10), None);
        assert_eq!(estimator.estimate_library_size(0, 0), None);
        assert_eq!(estimator.estimate_library_size(100, 80), Some(215));
    }

    #[test]
    fn degenerate_upper_multiples_terminate() {
        for multiple in [0.0, -5.0, 0.5] {
            let estimator = LibrarySizeEstimator {
                max_iterations: 40,
                initial_upper_multiple: multiple,
            };
            assert_eq!(estimator.estimate_library_size(100, 80), Some(215), "{}", multiple);
        }

        for multiple in [f64::NAN, f64::INFINITY] {
            let estimator = LibrarySizeEstimator {
                max_iterations: 40,
                initial_upper_multiple: multiple,
            };
            assert_eq!(estimator.estimate_library_size(100, 80), None);
        }
    }

    #[test]
    fn upper_multiple_argument_must_be_at_least_one() {
        assert_eq!(LibrarySizeEstimator::parse_initial_upper_multiple("100"), Ok(100.0));
        assert_eq!(LibrarySizeEstimator::parse_initial_upper_multiple("1"), Ok(1.0));

        for bad in ["0", "0.5", "-3", "NaN", "inf", "abc"] {
            assert!(LibrarySizeEstimator::parse_initial_upper_multiple(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn each_decision_hits_one_examined_counter() {
        let mut m = DuplicationMetrics::new("lib");

        m.add_decision(&decision(1, RecordKind::Unpaired, false, false));
        m.add_decision(&decision(1, RecordKind::Unpaired, true, false));
        m.add_decision(&decision(1, RecordKind::Pair, true, true));
        m.add_decision(&decision(1, RecordKind::Pair, true, false));
        m.add_decision(&decision(1, RecordKind::Pair, false, false));
        m.add_decision(&decision(1, RecordKind::Unmapped, false, false));

        assert_eq!(m, counts("lib", 2, 3, 1, 1, 2, 1));
    }

    #[test]
    fn aggregation_is_order_independent() {
        let header = crate::tests::test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();

        let decisions = vec![
            decision(1, RecordKind::Pair, false, false),
            decision(1, RecordKind::Pair, true, true),
            decision(2, RecordKind::Unpaired, true, false),
            decision(2, RecordKind::Unpaired, false, false),
        ];

        let mut left = MetricsAggregator::new(&lib_gen);
        let mut right = MetricsAggregator::new(&lib_gen);
        decisions[..2].iter().for_each(|d| left.add(d));
        decisions[2..].iter().for_each(|d| right.add(d));

        let mut all = MetricsAggregator::new(&lib_gen);
        decisions.iter().rev().for_each(|d| all.add(d));

        let estimator = LibrarySizeEstimator::default();
        let merged = right.merge(left).finalize(&estimator);
        let single = all.finalize(&estimator);

        let libraries = merged.iter().map(|m| m.counts().library.as_str()).collect::<Vec<_>>();
        assert_eq!(libraries, vec!["Solexa-16404", "Solexa-16412", "Unknown Library"]);

        for (a, b) in merged.iter().zip(single.iter()) {
            assert_eq!(a.counts(), b.counts());
        }
        assert_eq!(merged[0].counts().read_pair_optical_duplicates, 1);
    }
}
