use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::errors::Error;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReadGroup {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) library: Option<String>,
}

/// The serialized form of a header line.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(crate) struct HeaderRecord {
    #[serde(default)]
    pub(crate) contigs: Vec<String>,
    #[serde(default)]
    pub(crate) read_groups: Vec<ReadGroup>,
}

/// Reference dictionary and read groups of an input, with name-to-ordinal lookups.
///
/// Built once per job and shared read-only by every worker.
#[derive(Debug, Clone)]
pub(crate) struct ReadsHeader {
    record: HeaderRecord,
    contig_ordinals: HashMap<String, i32>,
    read_group_ordinals: HashMap<String, usize>,
}

impl From<HeaderRecord> for ReadsHeader {
    fn from(record: HeaderRecord) -> Self {
        let contig_ordinals = record
            .contigs
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i as i32))
            .collect();

        let read_group_ordinals = record
            .read_groups
            .iter()
            .enumerate()
            .map(|(i, rg)| (rg.id.clone(), i))
            .collect();

        Self {
            record,
            contig_ordinals,
            read_group_ordinals,
        }
    }
}

impl ReadsHeader {
    pub(crate) fn new(contigs: Vec<String>, read_groups: Vec<ReadGroup>) -> Self {
        Self::from(HeaderRecord {
            contigs,
            read_groups,
        })
    }

    pub(crate) fn record(&self) -> &HeaderRecord {
        &self.record
    }

    pub(crate) fn read_groups(&self) -> &[ReadGroup] {
        &self.record.read_groups
    }

    /// Ordinal of `contig` in the reference dictionary.
    pub(crate) fn contig_ordinal(&self, read_name: &str, contig: &str) -> Result<i32, Error> {
        self.contig_ordinals
            .get(contig)
            .copied()
            .ok_or_else(|| Error::UnknownContig {
                read: read_name.to_string(),
                contig: contig.to_string(),
            })
    }

    /// Position of the read group in the header, used as part of the physical location. `None`
    /// for undeclared read groups and for positions past `i16::MAX`.
    pub(crate) fn read_group_ordinal(&self, read_group: &str) -> Option<i16> {
        self.read_group_ordinals
            .get(read_group)
            .and_then(|i| i16::try_from(*i).ok())
    }

    /// Resolves the read group record of a read.
    ///
    /// # Errors
    ///
    /// `ReadMissingReadGroup` if the read has no RG tag, `HeaderMissingReadGroup` if the tag names
    /// a read group the header does not declare.
    pub(crate) fn read_group_of(
        &self,
        read_name: &str,
        read_group: Option<&str>,
    ) -> Result<&ReadGroup, Error> {
        let rg = read_group.ok_or_else(|| Error::ReadMissingReadGroup {
            read: read_name.to_string(),
        })?;

        self.read_group_ordinals
            .get(rg)
            .and_then(|i| self.record.read_groups.get(*i))
            .ok_or_else(|| Error::HeaderMissingReadGroup {
                read: read_name.to_string(),
                read_group: rg.to_string(),
            })
    }
}
