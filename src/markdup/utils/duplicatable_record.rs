use serde::{Deserialize, Serialize};

use crate::{
    hts::{duplicate_scoring_strategy::DuplicateScorer, header::ReadsHeader, AlignedRead},
    utils::errors::Error,
};

use super::{
    library_id_generator::LibraryIdGenerator,
    physical_location::{impl_physical_location_core, PhysicalLocation, PhysicalLocationInt},
    read_name_parser::ReadNameParser,
    read_signature::{PairingClass, ReadEnd, ReadSignature},
};

/// Strands of read 1 and read 2 in sequencing order.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum OpticalOrientation {
    FF,
    FR,
    RF,
    RR,
}

impl OpticalOrientation {
    /**
     * Returns the orientation of the two reads in a pair.
     */
    pub(crate) fn from_strands(read1_negative_strand: bool, read2_negative_strand: bool) -> Self {
        match (read1_negative_strand, read2_negative_strand) {
            (false, false) => Self::FF,
            (false, true) => Self::FR,
            (true, false) => Self::RF,
            (true, true) => Self::RR,
        }
    }
}

fn read_end(header: &ReadsHeader, read: &AlignedRead) -> Result<ReadEnd, Error> {
    let contig = read.contig.as_deref().unwrap_or_default();

    Ok(ReadEnd {
        contig: header.contig_ordinal(&read.name, contig)?,
        position: read.stranded_unclipped_start(),
        reverse: read.is_reverse(),
    })
}

/// A mapped read without a mapped mate.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct Fragment {
    name: String,
    partition_index: usize,
    score: i32,
    signature: ReadSignature,
}

impl Fragment {
    pub(crate) fn new(
        read: &AlignedRead,
        header: &ReadsHeader,
        partition_index: usize,
        scorer: &dyn DuplicateScorer,
        lib_gen: &LibraryIdGenerator,
    ) -> Result<Self, Error> {
        let library_id = lib_gen.get_library_id(header, read)?;

        let pairing = match (read.is_paired(), read.is_first_in_template()) {
            (false, _) => PairingClass::Fragment,
            (true, true) => PairingClass::FirstOfPair,
            (true, false) => PairingClass::SecondOfPair,
        };

        Ok(Self {
            name: read.name.clone(),
            partition_index,
            score: scorer.score(read),
            signature: ReadSignature::for_fragment(read_end(header, read)?, library_id, pairing),
        })
    }
}

/// Both mates mapped. Carries the physical location of the cluster for optical detection.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct Pair {
    name: String,
    partition_index: usize,
    score: i32,
    signature: ReadSignature,
    optical_orientation: OpticalOrientation,
    location: PhysicalLocationInt,
}

impl Pair {
    /// `a` and `b` are the primary alignments of one template, in any order.
    pub(crate) fn new(
        a: &AlignedRead,
        b: &AlignedRead,
        header: &ReadsHeader,
        partition_index: usize,
        scorer: &dyn DuplicateScorer,
        lib_gen: &LibraryIdGenerator,
        rnp: &mut ReadNameParser,
    ) -> Result<Self, Error> {
        let library_id = lib_gen.get_library_id(header, a)?;

        let (read1, read2) = if b.is_first_in_template() && !a.is_first_in_template() {
            (b, a)
        } else {
            (a, b)
        };

        let mut location = PhysicalLocationInt::default();
        if let Some(rg) = read1.read_group.as_deref().and_then(|rg| header.read_group_ordinal(rg)) {
            location.set_read_group(rg);
        }
        rnp.add_location_information(&read1.name, &mut location);

        Ok(Self {
            name: read1.name.clone(),
            partition_index,
            score: scorer.score(a).saturating_add(scorer.score(b)),
            signature: ReadSignature::for_pair(read_end(header, a)?, read_end(header, b)?, library_id),
            optical_orientation: OpticalOrientation::from_strands(read1.is_reverse(), read2.is_reverse()),
            location,
        })
    }

    pub(crate) fn optical_orientation(&self) -> OpticalOrientation {
        self.optical_orientation
    }
}

impl PhysicalLocation for Pair {
    impl_physical_location_core!(self, self.location);
}

/// An unmapped template. Never grouped; only counted.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct Passthrough {
    name: String,
    partition_index: usize,
    library_id: i16,
}

impl Passthrough {
    pub(crate) fn new(
        read: &AlignedRead,
        header: &ReadsHeader,
        partition_index: usize,
        lib_gen: &LibraryIdGenerator,
    ) -> Result<Self, Error> {
        Ok(Self {
            name: read.name.clone(),
            partition_index,
            library_id: lib_gen.get_library_id(header, read)?,
        })
    }
}

/// The minimal record carried through the shuffle in place of the reads themselves.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) enum DuplicatableRecord {
    Fragment(Fragment),
    Pair(Pair),
    Passthrough(Passthrough),
}

impl DuplicatableRecord {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Fragment(f) => &f.name,
            Self::Pair(p) => &p.name,
            Self::Passthrough(p) => &p.name,
        }
    }

    pub(crate) fn partition_index(&self) -> usize {
        match self {
            Self::Fragment(f) => f.partition_index,
            Self::Pair(p) => p.partition_index,
            Self::Passthrough(p) => p.partition_index,
        }
    }

    pub(crate) fn score(&self) -> i32 {
        match self {
            Self::Fragment(f) => f.score,
            Self::Pair(p) => p.score,
            Self::Passthrough(_) => 0,
        }
    }

    pub(crate) fn signature(&self) -> Option<&ReadSignature> {
        match self {
            Self::Fragment(f) => Some(&f.signature),
            Self::Pair(p) => Some(&p.signature),
            Self::Passthrough(_) => None,
        }
    }

    pub(crate) fn library_id(&self) -> i16 {
        match self {
            Self::Fragment(f) => f.signature.library_id(),
            Self::Pair(p) => p.signature.library_id(),
            Self::Passthrough(p) => p.library_id,
        }
    }

    /// Strand of the canonical first end.
    pub(crate) fn is_read1_reverse_strand(&self) -> bool {
        self.signature()
            .map(|s| s.first_end().reverse)
            .unwrap_or(false)
    }

    pub(crate) fn orientation_for_optical_duplicates(&self) -> Option<OpticalOrientation> {
        match self {
            Self::Pair(p) => Some(p.optical_orientation()),
            _ => None,
        }
    }

    /// Shuffle routing key: the signature key, or the name hash for passthrough records.
    pub(crate) fn routing_key(&self) -> u32 {
        match self.signature() {
            Some(sig) => sig.key(),
            None => ReadSignature::name_key(self.name()),
        }
    }
}

#[cfg(test)]
impl DuplicatableRecord {
    /// A fragment with a chosen score and signature, for resolver tests.
    pub(crate) fn test_fragment(name: &str, partition_index: usize, score: i32, signature: ReadSignature) -> Self {
        Self::Fragment(Fragment {
            name: name.to_string(),
            partition_index,
            score,
            signature,
        })
    }

    /// A pair at a chosen location, for optical tests.
    pub(crate) fn test_pair(
        name: &str,
        partition_index: usize,
        score: i32,
        signature: ReadSignature,
        optical_orientation: OpticalOrientation,
        location: PhysicalLocationInt,
    ) -> Self {
        Self::Pair(Pair {
            name: name.to_string(),
            partition_index,
            score,
            signature,
            optical_orientation,
            location,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hts::duplicate_scoring_strategy::ScoringStrategy;
    use crate::tests::{test_header, ReadBuilder};

    #[test]
    fn orientation_bytes() {
        assert_eq!(OpticalOrientation::from_strands(false, false), OpticalOrientation::FF);
        assert_eq!(OpticalOrientation::from_strands(false, true), OpticalOrientation::FR);
        assert_eq!(OpticalOrientation::from_strands(true, false), OpticalOrientation::RF);
        assert_eq!(OpticalOrientation::from_strands(true, true), OpticalOrientation::RR);
    }

    #[test]
    fn pair_is_independent_of_mate_storage_order() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();
        let mut rnp = ReadNameParser::new();
        let [r1, r2] = ReadBuilder::pair("RUNID:7:1203:2886:82292", "chr1", 100, 300).build();

        let ab = Pair::new(&r1, &r2, &header, 0, &ScoringStrategy::default(), &lib_gen, &mut rnp).unwrap();
        let ba = Pair::new(&r2, &r1, &header, 0, &ScoringStrategy::default(), &lib_gen, &mut rnp).unwrap();

        assert_eq!(ab.signature, ba.signature);
        assert_eq!(ab.score, ba.score);
        assert_eq!(ab.optical_orientation(), OpticalOrientation::FR);
        assert_eq!(ba.optical_orientation(), OpticalOrientation::FR);
        assert_eq!(ab.score, ScoringStrategy::default().score(&r1) * 2);
    }

    #[test]
    fn pair_carries_physical_location() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();
        let mut rnp = ReadNameParser::new();
        let [r1, r2] = ReadBuilder::pair("RUNID:7:1203:2886:82292", "chr1", 100, 300)
            .read_group("RG2")
            .build();

        let pair = Pair::new(&r1, &r2, &header, 0, &ScoringStrategy::default(), &lib_gen, &mut rnp).unwrap();

        assert_eq!(pair.get_read_group(), 1);
        assert_eq!((pair.get_tile(), pair.get_x(), pair.get_y()), (1203, 2886, 82292));

        assert_eq!(pair.optical_orientation(), OpticalOrientation::FR);

        let record = DuplicatableRecord::Pair(pair);
        assert_eq!(record.library_id(), 2);
        assert_eq!(record.routing_key(), record.signature().unwrap().key());
        assert_eq!(record.orientation_for_optical_duplicates(), Some(OpticalOrientation::FR));
        assert!(!record.is_read1_reverse_strand());
    }

    #[test]
    fn fragment_pairing_class_follows_flags() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();
        let scorer = ScoringStrategy::default();

        let single = ReadBuilder::fragment("q1", "chr1", 100).build();
        let frag = Fragment::new(&single, &header, 0, &scorer, &lib_gen).unwrap();
        assert_eq!(frag.signature.pairing_class(), PairingClass::Fragment);

        let [r1, r2] = ReadBuilder::pair("p1", "chr1", 100, 300).mate_unmapped().build();
        let first = Fragment::new(&r1, &header, 0, &scorer, &lib_gen).unwrap();
        let second = Fragment::new(&r2, &header, 0, &scorer, &lib_gen).unwrap();
        assert_eq!(first.signature.pairing_class(), PairingClass::FirstOfPair);
        assert_eq!(second.signature.pairing_class(), PairingClass::SecondOfPair);
    }

    #[test]
    fn unresolvable_library_names_the_read() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();
        let read = ReadBuilder::fragment("orphan", "chr1", 100).read_group("RG9").build();

        let err = Fragment::new(&read, &header, 0, &ScoringStrategy::default(), &lib_gen).unwrap_err();
        assert!(err.to_string().contains("orphan"));
    }
}
