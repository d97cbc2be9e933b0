use crate::hts::{
    header::{ReadGroup, ReadsHeader},
    AlignedRead, SamFlag,
};

/// Reference length of every built read.
pub(crate) const DEFAULT_READ_LENGTH: i64 = 76;

/// chr1, chr2; RG1 -> Solexa-16404, RG2 -> Solexa-16412, RG3 without a library.
pub(crate) fn test_header() -> ReadsHeader {
    ReadsHeader::new(
        vec!["chr1".into(), "chr2".into()],
        vec![
            ReadGroup {
                id: "RG1".into(),
                library: Some("Solexa-16404".into()),
            },
            ReadGroup {
                id: "RG2".into(),
                library: Some("Solexa-16412".into()),
            },
            ReadGroup {
                id: "RG3".into(),
                library: None,
            },
        ],
    )
}

/// Builds reads for tests. Reads are forward, mapped with quality 60, in RG1, and carry ten Q20
/// bases unless told otherwise.
pub(crate) struct ReadBuilder {
    read: AlignedRead,
    left_clip: i64,
    right_clip: i64,
}

impl ReadBuilder {
    pub(crate) fn fragment(name: &str, contig: &str, start: i64) -> Self {
        Self {
            read: AlignedRead {
                name: name.to_string(),
                flag: 0,
                contig: Some(contig.to_string()),
                start,
                unclipped_start: start,
                unclipped_end: start + DEFAULT_READ_LENGTH - 1,
                mapping_quality: 60,
                base_qualities: vec![20; 10],
                reference_length: DEFAULT_READ_LENGTH as u32,
                read_group: Some("RG1".to_string()),
            },
            left_clip: 0,
            right_clip: 0,
        }
    }

    pub(crate) fn unmapped(name: &str) -> Self {
        let mut b = Self::fragment(name, "chr1", 0);
        b.read.flag = SamFlag::UNMAPPED;
        b.read.contig = None;
        b.read.reference_length = 0;
        b
    }

    /// Mate 1 forward at `start1`, mate 2 reverse at `start2`.
    pub(crate) fn pair(name: &str, contig: &str, start1: i64, start2: i64) -> PairBuilder {
        PairBuilder {
            r1: Self::fragment(name, contig, start1)
                .flag(SamFlag::PAIRED | SamFlag::FIRST_IN_TEMPLATE),
            r2: Self::fragment(name, contig, start2)
                .flag(SamFlag::PAIRED | SamFlag::LAST_IN_TEMPLATE | SamFlag::REVERSE),
        }
    }

    pub(crate) fn clipped(mut self, left: i64, right: i64) -> Self {
        self.left_clip = left;
        self.right_clip = right;
        self
    }

    pub(crate) fn reverse(self) -> Self {
        self.flag(SamFlag::REVERSE)
    }

    pub(crate) fn flag(mut self, bits: u16) -> Self {
        self.read.flag |= bits;
        self
    }

    pub(crate) fn base_qualities(mut self, quals: Vec<u8>) -> Self {
        self.read.base_qualities = quals;
        self
    }

    pub(crate) fn mapping_quality(mut self, mq: u8) -> Self {
        self.read.mapping_quality = mq;
        self
    }

    pub(crate) fn read_group(mut self, rg: &str) -> Self {
        self.read.read_group = Some(rg.to_string());
        self
    }

    pub(crate) fn no_read_group(mut self) -> Self {
        self.read.read_group = None;
        self
    }

    pub(crate) fn build(mut self) -> AlignedRead {
        if self.read.contig.is_some() {
            self.read.unclipped_start = self.read.start - self.left_clip;
            self.read.unclipped_end = self.read.start + DEFAULT_READ_LENGTH - 1 + self.right_clip;
        }

        self.read
    }
}

pub(crate) struct PairBuilder {
    r1: ReadBuilder,
    r2: ReadBuilder,
}

impl PairBuilder {
    pub(crate) fn base_qualities(self, quals: Vec<u8>) -> Self {
        Self {
            r1: self.r1.base_qualities(quals.clone()),
            r2: self.r2.base_qualities(quals),
        }
    }

    pub(crate) fn read_group(self, rg: &str) -> Self {
        Self {
            r1: self.r1.read_group(rg),
            r2: self.r2.read_group(rg),
        }
    }

    pub(crate) fn mate_unmapped(self) -> Self {
        Self {
            r1: self.r1.flag(SamFlag::MATE_UNMAPPED),
            r2: self.r2.flag(SamFlag::MATE_UNMAPPED),
        }
    }

    pub(crate) fn build(self) -> [AlignedRead; 2] {
        [self.r1.build(), self.r2.build()]
    }
}
