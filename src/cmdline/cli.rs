use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::{
    hts::duplicate_scoring_strategy::ScoringStrategy,
    markdup::{
        duplication_metrics::LibrarySizeEstimator,
        utils::{optical_duplicate_finder::OpticalDuplicateFinder, read_name_parser::DEFAULT_READ_NAME_REGEX},
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[allow(non_snake_case)]
pub(crate) struct Cli {
    /// Logging level of the root logger.
    #[arg(long = "LOG_LEVEL", value_name = "LevelFilter", default_value = "info", global = true)]
    pub(crate) LOG_LEVEL: LevelFilter,

    /// Log targets (e.g. DuplicateGroupResolver) to log at debug level regardless of LOG_LEVEL.
    /// This argument may be specified 0 or more times.
    #[arg(long = "VERBOSE_TARGET", value_name = "String", global = true)]
    pub(crate) VERBOSE_TARGET: Vec<String>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Identifies duplicate reads and read pairs, flags them, and writes per-library duplication
    /// metrics.
    #[command(name = "mark-duplicates")]
    MarkDuplicates(MarkDuplicatesArgs),

    /// Combines raw RMS mapping quality values from several shards and finalizes them.
    #[command(name = "combine-mapping-quality")]
    CombineMappingQuality(CombineMappingQualityArgs),
}

#[derive(Args, Debug, Clone)]
#[allow(non_snake_case)]
pub(crate) struct MarkDuplicatesArgs {
    /// One reads file (JSON lines, header first) to check for duplicates.
    #[arg(long = "INPUT", short = 'I', value_name = "File")]
    pub(crate) INPUT: PathBuf,

    /// The output file to write marked records to.
    #[arg(long = "OUTPUT", short = 'O', value_name = "File")]
    pub(crate) OUTPUT: PathBuf,

    /// File to write duplication metrics to.
    #[arg(long = "METRICS_FILE", short = 'M', value_name = "File")]
    pub(crate) METRICS_FILE: PathBuf,

    /// The scoring strategy for choosing the non-duplicate among candidates.
    #[arg(
        long = "DUPLICATE_SCORING_STRATEGY",
        value_name = "ScoringStrategy",
        value_enum,
        default_value_t = ScoringStrategy::SUM_OF_BASE_QUALITIES,
    )]
    pub(crate) DUPLICATE_SCORING_STRATEGY: ScoringStrategy,

    /// The maximum offset between two duplicate clusters in order to consider them optical
    /// duplicates. The default is appropriate for unpatterned versions of the Illumina platform.
    /// For the patterned flowcell models, 2500 is more appropriate.
    #[arg(
        long = "OPTICAL_DUPLICATE_PIXEL_DISTANCE",
        value_name = "Integer",
        default_value_t = OpticalDuplicateFinder::DEFAULT_OPTICAL_DUPLICATE_DISTANCE,
    )]
    pub(crate) OPTICAL_DUPLICATE_PIXEL_DISTANCE: i32,

    /// Regular expression that can be used to parse read names in the incoming file. Read names
    /// are parsed to extract three variables: tile/region, x coordinate and y coordinate. These
    /// values are used to estimate the rate of optical duplication in order to give a more
    /// accurate estimated library size. Set this option to null to disable optical duplicate
    /// detection.
    /// The regular expression should contain three capture groups for the three variables, in
    /// order. It must match the entire read name. The default reads the last three
    /// colon-separated fields of names with 5 or 7 fields.
    #[arg(
        long = "READ_NAME_REGEX",
        value_name = "String",
        default_value = DEFAULT_READ_NAME_REGEX,
    )]
    pub(crate) READ_NAME_REGEX: String,

    /// This number is the maximum size of a set of duplicate reads for which we will attempt to
    /// determine which are optical duplicates.
    #[arg(
        long = "MAX_OPTICAL_DUPLICATE_SET_SIZE",
        value_name = "Long",
        default_value_t = OpticalDuplicateFinder::DEFAULT_MAX_DUPLICATE_SET_SIZE,
    )]
    pub(crate) MAX_OPTICAL_DUPLICATE_SET_SIZE: usize,

    /// Leave unmapped mates of duplicate pairs unflagged.
    #[arg(long = "DO_NOT_MARK_UNMAPPED_MATES")]
    pub(crate) DO_NOT_MARK_UNMAPPED_MATES: bool,

    /// Number of hash partitions records are shuffled into.
    #[arg(long = "NUM_PARTITIONS", value_name = "Integer", default_value_t = 16)]
    pub(crate) NUM_PARTITIONS: usize,

    /// Worker threads. 0 uses every available core.
    #[arg(long = "THREADS", value_name = "Integer", default_value_t = 0)]
    pub(crate) THREADS: usize,

    /// Bisection steps of the library size estimator.
    #[arg(
        long = "LIBRARY_SIZE_MAX_ITERATIONS",
        value_name = "Integer",
        default_value_t = LibrarySizeEstimator::DEFAULT_MAX_ITERATIONS,
    )]
    pub(crate) LIBRARY_SIZE_MAX_ITERATIONS: u32,

    /// Initial upper bound of the library size estimator, as a multiple of the unique pairs.
    #[arg(
        long = "LIBRARY_SIZE_UPPER_MULTIPLE",
        value_name = "Double",
        default_value_t = LibrarySizeEstimator::DEFAULT_INITIAL_UPPER_MULTIPLE,
        value_parser = LibrarySizeEstimator::parse_initial_upper_multiple,
    )]
    pub(crate) LIBRARY_SIZE_UPPER_MULTIPLE: f64,
}

impl MarkDuplicatesArgs {
    /// `None` when optical duplicate detection is disabled.
    pub(crate) fn read_name_regex(&self) -> Option<String> {
        match self.READ_NAME_REGEX.as_str() {
            "null" => None,
            r => Some(r.to_string()),
        }
    }
}

#[derive(Args, Debug, Clone)]
#[allow(non_snake_case)]
pub(crate) struct CombineMappingQualityArgs {
    /// Raw "<sumOfSquares>,<count>" value of one shard. This argument may be specified 0 or more
    /// times, but at least one RAW or MAPPING_QUALITY value is required.
    #[arg(
        long = "RAW",
        value_name = "String",
        required_unless_present = "MAPPING_QUALITY"
    )]
    pub(crate) RAW: Vec<String>,

    /// Mapping qualities of reads at the site, accumulated into one more raw value. 255 means
    /// unavailable and is skipped.
    #[arg(long = "MAPPING_QUALITY", value_name = "Integer", value_delimiter = ',')]
    pub(crate) MAPPING_QUALITY: Vec<u8>,

    /// Site depth (DP). Falls back to the combined read count.
    #[arg(long = "DEPTH", value_name = "Integer", allow_negative_numbers = true)]
    pub(crate) DEPTH: Option<i64>,

    /// Depth of one hom-ref sample, subtracted from DEPTH.
    #[arg(long = "HOM_REF_DEPTH", value_name = "Integer", value_delimiter = ',', requires = "DEPTH")]
    pub(crate) HOM_REF_DEPTH: Vec<i64>,
}
