pub(crate) mod duplicate_scoring_strategy;
pub(crate) mod header;
pub(crate) mod metrics;
pub(crate) mod reads_io;
pub(crate) mod utils;

use bio_types::strand::ReqStrand;
use serde::{Deserialize, Serialize};

/// SAM flag bits used by the duplicate engine.
pub(crate) struct SamFlag;

impl SamFlag {
    pub(crate) const PAIRED: u16 = 0x1;
    pub(crate) const UNMAPPED: u16 = 0x4;
    pub(crate) const MATE_UNMAPPED: u16 = 0x8;
    pub(crate) const REVERSE: u16 = 0x10;
    pub(crate) const FIRST_IN_TEMPLATE: u16 = 0x40;
    pub(crate) const LAST_IN_TEMPLATE: u16 = 0x80;
    pub(crate) const SECONDARY: u16 = 0x100;
    pub(crate) const QC_FAIL: u16 = 0x200;
    pub(crate) const DUPLICATE: u16 = 0x400;
    pub(crate) const SUPPLEMENTARY: u16 = 0x800;
}

/// Mapping quality value meaning "no mapping quality available".
pub(crate) const MAPPING_QUALITY_UNAVAILABLE: u8 = 255;

fn mapping_quality_unavailable() -> u8 {
    MAPPING_QUALITY_UNAVAILABLE
}

/// One alignment as handed over by the reads source. Coordinates are 1-based and inclusive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct AlignedRead {
    pub(crate) name: String,
    pub(crate) flag: u16,
    #[serde(default)]
    pub(crate) contig: Option<String>,
    #[serde(default)]
    pub(crate) start: i64,
    #[serde(default)]
    pub(crate) unclipped_start: i64,
    #[serde(default)]
    pub(crate) unclipped_end: i64,
    #[serde(default = "mapping_quality_unavailable")]
    pub(crate) mapping_quality: u8,
    #[serde(default)]
    pub(crate) base_qualities: Vec<u8>,
    #[serde(default)]
    pub(crate) reference_length: u32,
    #[serde(default)]
    pub(crate) read_group: Option<String>,
}

impl AlignedRead {
    #[inline]
    fn has_flag(&self, bit: u16) -> bool {
        self.flag & bit != 0
    }

    pub(crate) fn is_paired(&self) -> bool {
        self.has_flag(SamFlag::PAIRED)
    }

    pub(crate) fn is_unmapped(&self) -> bool {
        self.has_flag(SamFlag::UNMAPPED) || self.contig.is_none()
    }

    pub(crate) fn is_mate_unmapped(&self) -> bool {
        self.has_flag(SamFlag::MATE_UNMAPPED)
    }

    pub(crate) fn is_reverse(&self) -> bool {
        self.has_flag(SamFlag::REVERSE)
    }

    pub(crate) fn is_first_in_template(&self) -> bool {
        self.has_flag(SamFlag::FIRST_IN_TEMPLATE)
    }

    pub(crate) fn is_last_in_template(&self) -> bool {
        self.has_flag(SamFlag::LAST_IN_TEMPLATE)
    }

    pub(crate) fn is_secondary(&self) -> bool {
        self.has_flag(SamFlag::SECONDARY)
    }

    pub(crate) fn is_supplementary(&self) -> bool {
        self.has_flag(SamFlag::SUPPLEMENTARY)
    }

    pub(crate) fn is_quality_check_failed(&self) -> bool {
        self.has_flag(SamFlag::QC_FAIL)
    }

    pub(crate) fn is_duplicate(&self) -> bool {
        self.has_flag(SamFlag::DUPLICATE)
    }

    /// Primary, non-supplementary alignment.
    pub(crate) fn is_primary(&self) -> bool {
        !self.is_secondary() && !self.is_supplementary()
    }

    /// Paired read whose mate is also aligned.
    pub(crate) fn has_mapped_mate(&self) -> bool {
        self.is_paired() && !self.is_mate_unmapped()
    }

    pub(crate) fn set_duplicate(&mut self, duplicate: bool) {
        if duplicate {
            self.flag |= SamFlag::DUPLICATE;
        } else {
            self.flag &= !SamFlag::DUPLICATE;
        }
    }

    pub(crate) fn strand(&self) -> ReqStrand {
        if self.is_reverse() {
            ReqStrand::Reverse
        } else {
            ReqStrand::Forward
        }
    }

    pub(crate) fn alignment_start(&self) -> i64 {
        self.start
    }

    /// Unclipped 5' position: the unclipped end for reverse-strand reads, the unclipped start
    /// otherwise.
    pub(crate) fn stranded_unclipped_start(&self) -> i64 {
        match self.strand() {
            ReqStrand::Forward => self.unclipped_start,
            ReqStrand::Reverse => self.unclipped_end,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::ReadBuilder;

    #[test]
    fn stranded_unclipped_start_follows_strand() {
        let fwd = ReadBuilder::fragment("q1", "chr1", 100).clipped(5, 3).build();
        assert_eq!(fwd.stranded_unclipped_start(), 95);

        let rev = ReadBuilder::fragment("q1", "chr1", 100)
            .clipped(5, 3)
            .reverse()
            .build();
        assert_eq!(rev.strand(), ReqStrand::Reverse);
        assert_eq!(rev.stranded_unclipped_start(), 100 + 76 - 1 + 3);
    }

    #[test]
    fn duplicate_flag_round_trips() {
        let mut read = ReadBuilder::fragment("q1", "chr1", 100).build();
        assert!(!read.is_duplicate());

        read.set_duplicate(true);
        assert!(read.is_duplicate());
        assert_eq!(read.flag & SamFlag::DUPLICATE, SamFlag::DUPLICATE);

        read.set_duplicate(false);
        assert!(!read.is_duplicate());
    }

    #[test]
    fn missing_mapping_quality_deserializes_as_unavailable() {
        let read: AlignedRead =
            serde_json::from_str(r#"{"name":"q1","flag":4}"#).unwrap();

        assert_eq!(read.mapping_quality, MAPPING_QUALITY_UNAVAILABLE);
        assert!(read.is_unmapped());
        assert!(read.is_primary());
    }
}
