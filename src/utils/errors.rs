use thiserror::Error as ErrorDerive;

/// Fatal input conditions. Each one aborts the job and names the offending read, read group,
/// contig or raw value.
#[derive(ErrorDerive, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Error {
    #[error("Read {read} is missing the read group (RG) tag, which is required by MarkDuplicates.")]
    ReadMissingReadGroup { read: String },

    #[error("Read {read} has read group {read_group} which is not present in the header.")]
    HeaderMissingReadGroup { read: String, read_group: String },

    #[error("The header has no read groups. At least one read group with a library is required.")]
    HeaderHasNoReadGroups,

    #[error("The header declares more than {max} libraries.")]
    TooManyLibraries { max: usize },

    #[error("Read {read} is aligned to contig {contig} which is not present in the header.")]
    UnknownContig { read: String, contig: String },

    #[error("malformed {key} annotation: {raw}")]
    MalformedRawAnnotation { key: &'static str, raw: String },
}
