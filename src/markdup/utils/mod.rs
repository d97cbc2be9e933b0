pub(crate) mod duplicatable_record;
pub(crate) mod library_id_generator;
pub(crate) mod optical_duplicate_finder;
pub(crate) mod physical_location;
pub(crate) mod read_name_parser;
pub(crate) mod read_signature;
