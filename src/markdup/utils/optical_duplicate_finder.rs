use macro_sup::set_mlog;
use serde::{Deserialize, Serialize};

use super::physical_location::PhysicalLocation;

set_mlog!(stringify!(OpticalDuplicateFinder));

/// Flags records of one duplicate set that sit next to each other on the flowcell.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct OpticalDuplicateFinder {
    pub(crate) optical_duplicate_pixel_distance: i32,
    max_duplicate_set_size: usize,
}

impl Default for OpticalDuplicateFinder {
    fn default() -> Self {
        Self {
            optical_duplicate_pixel_distance: Self::DEFAULT_OPTICAL_DUPLICATE_DISTANCE,
            max_duplicate_set_size: Self::DEFAULT_MAX_DUPLICATE_SET_SIZE,
        }
    }
}

impl OpticalDuplicateFinder {
    pub(crate) const DEFAULT_OPTICAL_DUPLICATE_DISTANCE: i32 = 100;
    pub(crate) const DEFAULT_MAX_DUPLICATE_SET_SIZE: usize = 300000;

    pub(crate) fn new(optical_duplicate_pixel_distance: i32, max_duplicate_set_size: usize) -> Self {
        Self {
            optical_duplicate_pixel_distance,
            max_duplicate_set_size,
        }
    }

    /**
     * Finds which reads within the list of duplicates are likely to be optical duplicates of
     * one another.
     *
     * `keeper` is the index of the representative in `list`; it is compared first and is never
     * flagged. Returns one flag per element of `list`.
     */
    pub(crate) fn find_optical_duplicates<P: PhysicalLocation>(
        &self,
        list: &[&P],
        keeper: Option<usize>,
    ) -> Vec<bool> {
        let length = list.len();
        let mut optical_duplicate_flags = vec![false; length];

        if length < 2 {
            return optical_duplicate_flags;
        }

        if length > self.max_duplicate_set_size {
            mlog::info!(
                "Skipping optical duplicate detection on a duplicate set of size {} \
                (larger than MAX_OPTICAL_DUPLICATE_SET_SIZE {}).",
                length,
                self.max_duplicate_set_size
            );
            return optical_duplicate_flags;
        }

        // First go through and compare all the reads to the keeper
        if let Some(k) = keeper.filter(|k| *k < length) {
            let actual_keeper = list[k];
            for (i, other) in list.iter().enumerate() {
                optical_duplicate_flags[i] = i != k && self.close_enough(actual_keeper, *other);
            }
        }

        // Now go through and do each pairwise comparison not involving the actualKeeper
        for i in 0..length {
            let lhs = list[i];
            if !lhs.has_location() {
                continue;
            }

            for j in (i + 1)..length {
                if Some(j) == keeper || optical_duplicate_flags[j] {
                    continue;
                }

                if self.close_enough(lhs, list[j]) {
                    optical_duplicate_flags[j] = true;
                }
            }
        }

        optical_duplicate_flags
    }

    /** Simple method to test whether two physical locations are close enough to each other to be deemed optical dupes. */
    fn close_enough<P: PhysicalLocation>(&self, lhs: &P, rhs: &P) -> bool {
        // A negative distance never matches.
        let Ok(distance) = u32::try_from(self.optical_duplicate_pixel_distance) else {
            return false;
        };

        lhs.has_location()
            && lhs.get_read_group() == rhs.get_read_group()
            && lhs.get_tile() == rhs.get_tile()
            && lhs.get_x().abs_diff(rhs.get_x()) <= distance
            && lhs.get_y().abs_diff(rhs.get_y()) <= distance
    }
}
