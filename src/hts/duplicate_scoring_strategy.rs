use std::fmt::Display;

use clap::ValueEnum;

use super::{utils::murmur3::Murmur3, AlignedRead};

#[allow(non_camel_case_types)]
#[derive(ValueEnum, Clone, Debug, Copy, PartialEq, Eq, Default)]
#[value(rename_all = "verbatim")]
pub(crate) enum ScoringStrategy {
    #[default]
    SUM_OF_BASE_QUALITIES,
    TOTAL_MAPPED_REFERENCE_LENGTH,
    RANDOM,
}

impl Display for ScoringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Scores one read for representative selection; higher wins.
///
/// Implementations must be a pure function of the read so that a read scores the same on every
/// partition and on every retry.
pub(crate) trait DuplicateScorer: Send + Sync {
    fn score(&self, read: &AlignedRead) -> i32;
}

impl<F> DuplicateScorer for F
where
    F: Fn(&AlignedRead) -> i32 + Send + Sync,
{
    fn score(&self, read: &AlignedRead) -> i32 {
        self(read)
    }
}

impl DuplicateScorer for ScoringStrategy {
    fn score(&self, read: &AlignedRead) -> i32 {
        DuplicateScoringStrategy::compute_duplicate_score(read, *self)
    }
}

pub(crate) struct DuplicateScoringStrategy;

impl DuplicateScoringStrategy {
    const MIN_BASE_QUALITY: u8 = 15;
    const HASHER: Murmur3 = Murmur3::new(1);

    /** Calculates a score for the read which is the sum of scores over Q15. */
    fn get_sum_of_base_qualities(read: &AlignedRead) -> i32 {
        read.base_qualities
            .iter()
            .copied()
            .filter(|b| *b >= Self::MIN_BASE_QUALITY)
            .map(i32::from)
            .sum()
    }

    pub(crate) fn compute_duplicate_score(read: &AlignedRead, scoring_strategy: ScoringStrategy) -> i32 {
        // two (very) long reads worth of high-quality bases can go over i16::MAX/2 and the pair
        // score is the sum of both ends, so cap each end.
        let cap = i16::MAX as i32 / 2;

        let mut score = match scoring_strategy {
            ScoringStrategy::SUM_OF_BASE_QUALITIES => Self::get_sum_of_base_qualities(read).min(cap),
            ScoringStrategy::TOTAL_MAPPED_REFERENCE_LENGTH => {
                if read.is_unmapped() {
                    0
                } else {
                    (read.reference_length as i32).min(cap)
                }
            }
            ScoringStrategy::RANDOM => {
                // a number between 0 and i16::MAX/2 derived from the name, then shifted down so
                // that a QC-failing discount can never overflow.
                (Self::HASHER.hash_bytes(read.name.as_bytes()) & 0b11_1111_1111_1111) as i32
                    - i16::MAX as i32 / 4
            }
        };

        // make sure that filter-failing records are heavily discounted.
        if read.is_quality_check_failed() {
            score += i16::MIN as i32 / 2;
        }

        score
    }
}
