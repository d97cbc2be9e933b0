use serde::{Deserialize, Serialize};

use crate::hts::utils::murmur3::Murmur3;

/// Grouping space of a record. Fragments and pairs never share a group.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum PairingClass {
    /// Unpaired read.
    Fragment,
    /// Paired read whose mate is unmapped or absent, sequenced first.
    FirstOfPair,
    /// Paired read whose mate is unmapped or absent, sequenced second.
    SecondOfPair,
    /// Both mates mapped.
    Pair,
}

impl PairingClass {
    pub(crate) fn is_pair(&self) -> bool {
        matches!(self, PairingClass::Pair)
    }
}

/// Strand-adjusted 5' end of one mate.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ReadEnd {
    pub(crate) contig: i32,
    pub(crate) position: i64,
    pub(crate) reverse: bool,
}

impl ReadEnd {
    fn sort_key(&self) -> (i32, i64, bool) {
        (self.contig, self.position, self.reverse)
    }
}

/// Position class of a read or pair.
///
/// The murmur3 hash is cached at construction and travels with the signature so the shuffle can
/// route on it, but two signatures are only the same class when every field matches.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReadSignature {
    end: ReadEnd,
    mate: Option<ReadEnd>,
    library_id: i16,
    pairing: PairingClass,
    hash: u32,
}

impl ReadSignature {
    const HASHER: Murmur3 = Murmur3::new(1);

    pub(crate) fn for_fragment(end: ReadEnd, library_id: i16, pairing: PairingClass) -> Self {
        Self::with_fields(end, None, library_id, pairing)
    }

    /// Either storage order of the mates yields the same signature: the end on the lower contig,
    /// or the lower 5' position on the same contig, comes first.
    pub(crate) fn for_pair(a: ReadEnd, b: ReadEnd, library_id: i16) -> Self {
        let (first, second) = if a.sort_key() <= b.sort_key() {
            (a, b)
        } else {
            (b, a)
        };

        Self::with_fields(first, Some(second), library_id, PairingClass::Pair)
    }

    fn with_fields(end: ReadEnd, mate: Option<ReadEnd>, library_id: i16, pairing: PairingClass) -> Self {
        let mut sig = Self {
            end,
            mate,
            library_id,
            pairing,
            hash: 0,
        };
        sig.hash = sig.compute_hash();

        sig
    }

    fn compute_hash(&self) -> u32 {
        let mut ints = Vec::with_capacity(10);

        ints.push(self.pairing as i32);
        ints.push(self.library_id as i32);
        push_end(&mut ints, &self.end);
        if let Some(mate) = self.mate.as_ref() {
            push_end(&mut ints, mate);
        }

        Self::HASHER.hash_ints(&ints)
    }

    /// Compact routing key. Equal signatures have equal keys; the converse does not hold.
    pub(crate) fn key(&self) -> u32 {
        self.hash
    }

    /// Routing key for records that carry no signature.
    pub(crate) fn name_key(name: &str) -> u32 {
        Self::HASHER.hash_bytes(name.as_bytes())
    }

    pub(crate) fn first_end(&self) -> &ReadEnd {
        &self.end
    }

    pub(crate) fn library_id(&self) -> i16 {
        self.library_id
    }

    pub(crate) fn pairing_class(&self) -> PairingClass {
        self.pairing
    }

    #[cfg(test)]
    pub(crate) fn with_key(mut self, hash: u32) -> Self {
        self.hash = hash;
        self
    }
}

fn push_end(ints: &mut Vec<i32>, end: &ReadEnd) {
    ints.push(end.contig);
    ints.push(end.position as i32);
    ints.push((end.position >> 32) as i32);
    ints.push(end.reverse as i32);
}
