use std::collections::HashMap;

use crate::{
    hts::{
        header::{ReadGroup, ReadsHeader},
        AlignedRead,
    },
    utils::errors::Error,
};

/// Library name to library id table, fixed from the header before any read is seen.
///
/// Ids follow the order in which libraries first appear among the header's read groups and start
/// at 1. The table is immutable once built so every worker sees the same ids.
#[derive(Debug, Clone)]
pub(crate) struct LibraryIdGenerator {
    library_ids: HashMap<String, i16>, // from library string to library id
    libraries: Vec<(i16, String)>,     // in id order
}

impl LibraryIdGenerator {
    pub(crate) const UNKNOWN_LIBRARY: &'static str = "Unknown Library";

    pub(crate) fn from_header(header: &ReadsHeader) -> Result<Self, Error> {
        if header.read_groups().is_empty() {
            return Err(Error::HeaderHasNoReadGroups);
        }

        let mut library_ids = HashMap::new();
        let mut libraries = Vec::new();

        for rg in header.read_groups() {
            let library = Self::get_read_group_library_name(rg);

            if !library_ids.contains_key(library) {
                let id = i16::try_from(libraries.len() + 1).map_err(|_| Error::TooManyLibraries {
                    max: i16::MAX as usize,
                })?;

                libraries.push((id, library.to_string()));
                library_ids.insert(library.to_string(), id);
            }
        }

        Ok(Self {
            library_ids,
            libraries,
        })
    }

    pub(crate) fn get_read_group_library_name(read_group: &ReadGroup) -> &str {
        read_group
            .library
            .as_deref()
            .unwrap_or(Self::UNKNOWN_LIBRARY)
    }

    /**
     * Gets the library name from the header for the record. If the library isn't denoted on the
     * read group, a constant string is returned. A missing or undeclared read group is an error.
     */
    pub(crate) fn get_library_name<'h>(
        header: &'h ReadsHeader,
        read: &AlignedRead,
    ) -> Result<&'h str, Error> {
        let rg = header.read_group_of(&read.name, read.read_group.as_deref())?;

        Ok(Self::get_read_group_library_name(rg))
    }

    /** Get the library ID for the given record. */
    pub(crate) fn get_library_id(&self, header: &ReadsHeader, read: &AlignedRead) -> Result<i16, Error> {
        let library = Self::get_library_name(header, read)?;

        // every read group's library was registered from this header.
        self.library_ids
            .get(library)
            .copied()
            .ok_or_else(|| Error::HeaderMissingReadGroup {
                read: read.name.clone(),
                read_group: read.read_group.clone().unwrap_or_default(),
            })
    }

    /// `(id, name)` of every library, in id order.
    pub(crate) fn libraries(&self) -> impl Iterator<Item = (i16, &str)> + '_ {
        self.libraries.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::{test_header, ReadBuilder};

    #[test]
    fn ids_follow_header_order() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();

        assert_eq!(
            lib_gen.libraries().collect::<Vec<_>>(),
            vec![
                (1, "Solexa-16404"),
                (2, "Solexa-16412"),
                (3, LibraryIdGenerator::UNKNOWN_LIBRARY)
            ]
        );
    }

    #[test]
    fn library_ids_past_i16_are_fatal() {
        let header_with = |n: usize| {
            let read_groups = (0..n)
                .map(|i| ReadGroup {
                    id: format!("RG{}", i),
                    library: Some(format!("lib{}", i)),
                })
                .collect();
            ReadsHeader::new(vec!["chr1".into()], read_groups)
        };

        let lib_gen = LibraryIdGenerator::from_header(&header_with(i16::MAX as usize)).unwrap();
        assert_eq!(lib_gen.libraries().last().map(|(id, _)| id), Some(i16::MAX));

        let err = LibraryIdGenerator::from_header(&header_with(i16::MAX as usize + 1)).unwrap_err();
        assert_eq!(err, Error::TooManyLibraries { max: i16::MAX as usize });
    }

    #[test]
    fn read_group_without_library_is_unknown_library() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();

        let read = ReadBuilder::fragment("q1", "chr1", 100).read_group("RG3").build();

        assert_eq!(
            LibraryIdGenerator::get_library_name(&header, &read).unwrap(),
            LibraryIdGenerator::UNKNOWN_LIBRARY
        );
        assert_eq!(lib_gen.get_library_id(&header, &read).unwrap(), 3);
    }

    #[test]
    fn missing_read_group_is_fatal() {
        let header = test_header();
        let lib_gen = LibraryIdGenerator::from_header(&header).unwrap();

        let read = ReadBuilder::fragment("lonely", "chr1", 100).no_read_group().build();
        let err = lib_gen.get_library_id(&header, &read).unwrap_err();

        assert_eq!(err, Error::ReadMissingReadGroup { read: "lonely".into() });
    }

    #[test]
    fn header_without_read_groups_is_fatal() {
        let header = ReadsHeader::new(vec!["chr1".into()], vec![]);

        assert_eq!(
            LibraryIdGenerator::from_header(&header).unwrap_err(),
            Error::HeaderHasNoReadGroups
        );
    }
}
