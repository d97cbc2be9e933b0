pub(crate) mod rms_mapping_quality;
