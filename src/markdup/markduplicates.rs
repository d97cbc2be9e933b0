use std::{collections::HashMap, path::Path, time::Instant};

use anyhow::{anyhow, Context, Error};
use macro_sup::set_mlog;
use rayon::{prelude::*, ThreadPoolBuilder};

use crate::{
    cmdline::cli::MarkDuplicatesArgs,
    hts::{
        duplicate_scoring_strategy::{DuplicateScorer, ScoringStrategy},
        header::ReadsHeader,
        metrics::{MetricsFile, MetricsHeader},
        reads_io::{read_reads_file, write_reads_file},
        utils::{load_byte_file_as_obj, save_as_byte_to_file},
        AlignedRead,
    },
    utils::{human_readable_byte_count, logging::ProgressLogger, mem_stats},
};

use super::{
    duplicate_group_resolver::{DuplicateDecision, DuplicateGroupResolver},
    duplication_metrics::{FinalizedDuplicationMetrics, LibrarySizeEstimator, MetricsAggregator},
    utils::{
        duplicatable_record::{DuplicatableRecord, Fragment, Pair, Passthrough},
        library_id_generator::LibraryIdGenerator,
        optical_duplicate_finder::OpticalDuplicateFinder,
        read_name_parser::{ReadNameParser, DEFAULT_READ_NAME_REGEX},
    },
};

set_mlog!(stringify!(MarkDuplicates));

/// Settings of one run.
#[derive(Clone, Debug)]
pub(crate) struct MarkDuplicatesConfig {
    pub(crate) scoring_strategy: ScoringStrategy,
    pub(crate) optical_duplicate_pixel_distance: i32,
    pub(crate) read_name_regex: Option<String>,
    pub(crate) max_optical_duplicate_set_size: usize,
    pub(crate) mark_unmapped_mates: bool,
    pub(crate) num_partitions: usize,
    pub(crate) threads: usize,
    pub(crate) library_size_estimator: LibrarySizeEstimator,
}

impl Default for MarkDuplicatesConfig {
    fn default() -> Self {
        Self {
            scoring_strategy: ScoringStrategy::default(),
            optical_duplicate_pixel_distance: OpticalDuplicateFinder::DEFAULT_OPTICAL_DUPLICATE_DISTANCE,
            read_name_regex: Some(DEFAULT_READ_NAME_REGEX.to_string()),
            max_optical_duplicate_set_size: OpticalDuplicateFinder::DEFAULT_MAX_DUPLICATE_SET_SIZE,
            mark_unmapped_mates: true,
            num_partitions: 16,
            threads: 0,
            library_size_estimator: LibrarySizeEstimator::default(),
        }
    }
}

impl From<&MarkDuplicatesArgs> for MarkDuplicatesConfig {
    fn from(args: &MarkDuplicatesArgs) -> Self {
        Self {
            scoring_strategy: args.DUPLICATE_SCORING_STRATEGY,
            optical_duplicate_pixel_distance: args.OPTICAL_DUPLICATE_PIXEL_DISTANCE,
            read_name_regex: args.read_name_regex(),
            max_optical_duplicate_set_size: args.MAX_OPTICAL_DUPLICATE_SET_SIZE,
            mark_unmapped_mates: !args.DO_NOT_MARK_UNMAPPED_MATES,
            num_partitions: args.NUM_PARTITIONS,
            threads: args.THREADS,
            library_size_estimator: LibrarySizeEstimator {
                max_iterations: args.LIBRARY_SIZE_MAX_ITERATIONS,
                initial_upper_multiple: args.LIBRARY_SIZE_UPPER_MULTIPLE,
            },
        }
    }
}

/// Primary and other alignments sharing a read name.
struct Template {
    primaries: Vec<usize>,
    others: Vec<usize>,
    /// Index of the read a pair record was built from.
    pair_index: Option<usize>,
}

pub(crate) struct MarkDuplicatesOutput {
    pub(crate) reads: Vec<AlignedRead>,
    pub(crate) metrics: Vec<FinalizedDuplicationMetrics>,
}

pub(crate) struct MarkDuplicates {
    config: MarkDuplicatesConfig,
    scorer: Box<dyn DuplicateScorer>,
}

impl MarkDuplicates {
    const PROGRESS_INTERVAL: usize = 1_000_000;

    pub(crate) fn new(config: MarkDuplicatesConfig) -> Self {
        let scorer = Box::new(config.scoring_strategy);

        Self::with_scorer(config, scorer)
    }

    /// Uses `scorer` in place of the configured scoring strategy. This is the injection point for
    /// custom scorers, closures included.
    pub(crate) fn with_scorer(config: MarkDuplicatesConfig, scorer: Box<dyn DuplicateScorer>) -> Self {
        Self { config, scorer }
    }

    /// Reads `input`, marks duplicates, and writes the flagged reads and the metrics file.
    pub(crate) fn do_work(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        metrics_file: impl AsRef<Path>,
        command_line: &str,
    ) -> Result<(), Error> {
        let start = Instant::now();
        let started_on = chrono::Local::now();

        mlog::info!("Reading input file and constructing read end information.");
        let (header, reads) = read_reads_file(input)?;
        mlog::info!("Read {} records.", reads.len());

        let out = self.mark(&header, reads)?;

        mlog::info!("Writing {} records.", out.reads.len());
        write_reads_file(output, &header, &out.reads)?;

        let mut mf = MetricsFile::new();
        mf.add_header(MetricsHeader::StringHeader(command_line.to_string()));
        mf.add_header(MetricsHeader::StringHeader(format!(
            "Started on: {}",
            started_on.format("%a %b %d %H:%M:%S %Z %Y")
        )));
        out.metrics.into_iter().for_each(|m| mf.add_metric(m));
        mlog::info!("Writing metrics for {} libraries.", mf.get_metrics().len());
        mf.write(metrics_file)?;

        let mem = mem_stats().record();
        mlog::info!(
            "MarkDuplicates done. Elapsed time: {:.2} minutes. Allocated memory: {}, resident memory: {}",
            start.elapsed().as_secs_f64() / 60.0,
            human_readable_byte_count(mem.allocated),
            human_readable_byte_count(mem.resident),
        );

        Ok(())
    }

    /// Flags duplicates on `reads` and computes per-library metrics.
    ///
    /// # Errors
    ///
    /// Fails on the first read whose read group or contig cannot be resolved from `header`.
    pub(crate) fn mark(&self, header: &ReadsHeader, mut reads: Vec<AlignedRead>) -> Result<MarkDuplicatesOutput, Error> {
        let lib_gen = LibraryIdGenerator::from_header(header)?;

        let mut templates = Self::collect_templates(&reads);
        mlog::debug!("Collected {} templates.", templates.len());

        let records = self.build_records(header, &lib_gen, &reads, &mut templates)?;

        let partitions = self.shuffle(records)?;

        let resolver = DuplicateGroupResolver::new(OpticalDuplicateFinder::new(
            self.config.optical_duplicate_pixel_distance,
            self.config.max_optical_duplicate_set_size,
        ));

        let (decisions, aggregator) = self.resolve_partitions(partitions, &resolver, &lib_gen)?;

        let duplicate_count = decisions.iter().filter(|d| d.duplicate).count();
        mlog::info!("Marking {} records as duplicates.", duplicate_count);

        self.apply_decisions(&mut reads, &templates, &decisions);

        Ok(MarkDuplicatesOutput {
            reads,
            metrics: aggregator.finalize(&self.config.library_size_estimator),
        })
    }

    /// Groups reads by name in ingestion order.
    fn collect_templates(reads: &[AlignedRead]) -> Vec<Template> {
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        let mut templates: Vec<Template> = Vec::new();

        for (i, read) in reads.iter().enumerate() {
            let t = *by_name.entry(read.name.as_str()).or_insert_with(|| {
                templates.push(Template {
                    primaries: Vec::new(),
                    others: Vec::new(),
                    pair_index: None,
                });
                templates.len() - 1
            });

            if read.is_primary() {
                templates[t].primaries.push(i);
            } else {
                templates[t].others.push(i);
            }
        }

        templates
    }

    fn build_records(
        &self,
        header: &ReadsHeader,
        lib_gen: &LibraryIdGenerator,
        reads: &[AlignedRead],
        templates: &mut [Template],
    ) -> Result<Vec<DuplicatableRecord>, Error> {
        let mut rnp = ReadNameParser::with_regex(self.config.read_name_regex.clone());
        if !rnp.is_enabled() {
            mlog::info!("READ_NAME_REGEX is null; optical duplicate detection is disabled.");
        }
        let mut progress = ProgressLogger::new(mlog::TARGET, Self::PROGRESS_INTERVAL, "Read", "records");
        let scorer = self.scorer.as_ref();

        let mut records = Vec::with_capacity(reads.len());

        for t in templates.iter_mut() {
            let mapped = t
                .primaries
                .iter()
                .copied()
                .filter(|i| !reads[*i].is_unmapped())
                .collect::<Vec<_>>();

            for i in t.primaries.iter().copied() {
                progress.record(&reads[i]);

                if reads[i].is_unmapped() {
                    records.push(DuplicatableRecord::Passthrough(Passthrough::new(
                        &reads[i], header, i, lib_gen,
                    )?));
                }
            }

            match mapped.as_slice() {
                [a, b] if reads[*a].has_mapped_mate() && reads[*b].has_mapped_mate() => {
                    records.push(DuplicatableRecord::Pair(Pair::new(
                        &reads[*a], &reads[*b], header, *a, scorer, lib_gen, &mut rnp,
                    )?));
                    t.pair_index = Some(*a);
                }
                _ => {
                    for i in mapped.iter().copied() {
                        records.push(DuplicatableRecord::Fragment(Fragment::new(
                            &reads[i], header, i, scorer, lib_gen,
                        )?));
                    }
                }
            }
        }

        mlog::info!(
            "Built {} duplicatable records from {} primary reads.",
            records.len(),
            progress.processed()
        );

        Ok(records)
    }

    /// Routes records to hash partitions and encodes each partition.
    fn shuffle(&self, records: Vec<DuplicatableRecord>) -> Result<Vec<Vec<u8>>, Error> {
        let n = self.config.num_partitions.max(1);

        let mut partitions: Vec<Vec<DuplicatableRecord>> = (0..n).map(|_| Vec::new()).collect();
        for record in records {
            let p = record.routing_key() as usize % n;
            partitions[p].push(record);
        }

        partitions
            .iter()
            .map(|records| {
                let mut buf = Vec::new();
                save_as_byte_to_file(records, &mut buf)?;
                Ok(buf)
            })
            .collect()
    }

    fn resolve_partitions(
        &self,
        partitions: Vec<Vec<u8>>,
        resolver: &DuplicateGroupResolver,
        lib_gen: &LibraryIdGenerator,
    ) -> Result<(Vec<DuplicateDecision>, MetricsAggregator), Error> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|err| anyhow!("failed to initialize rayon thread pool: {err}"))?;

        let resolved = pool.install(|| {
            partitions
                .par_iter()
                .enumerate()
                .map(|(p, bytes)| -> Result<(Vec<DuplicateDecision>, MetricsAggregator), Error> {
                    let records: Vec<DuplicatableRecord> = load_byte_file_as_obj(&mut bytes.as_slice())
                        .with_context(|| format!("Failed to decode partition {}", p))?;

                    let decisions = resolver.resolve_partition(records);

                    let mut aggregator = MetricsAggregator::new(lib_gen);
                    decisions.iter().for_each(|d| aggregator.add(d));

                    Ok((decisions, aggregator))
                })
                .collect::<Result<Vec<_>, Error>>()
        })?;

        let mut all_decisions = Vec::new();
        let mut total = MetricsAggregator::new(lib_gen);

        for (decisions, aggregator) in resolved {
            all_decisions.extend(decisions);
            total = total.merge(aggregator);
        }

        Ok((all_decisions, total))
    }

    /// Writes duplicate flags back onto the reads. Mapped primaries take their own record's flag,
    /// secondary and supplementary alignments take the flag of their template, and unmapped mates
    /// take it only when configured to.
    fn apply_decisions(&self, reads: &mut [AlignedRead], templates: &[Template], decisions: &[DuplicateDecision]) {
        let duplicate_by_index = decisions
            .iter()
            .map(|d| (d.partition_index, d.duplicate))
            .collect::<HashMap<_, _>>();

        let flag_of = |i: &usize| duplicate_by_index.get(i).copied().unwrap_or(false);

        for t in templates {
            let template_duplicate = match t.pair_index {
                Some(p) => flag_of(&p),
                None => t.primaries.iter().any(flag_of),
            };

            for i in t.primaries.iter() {
                let duplicate = if reads[*i].is_unmapped() {
                    self.config.mark_unmapped_mates && template_duplicate
                } else if t.pair_index.is_some() {
                    template_duplicate
                } else {
                    flag_of(i)
                };

                reads[*i].set_duplicate(duplicate);
            }

            for i in t.others.iter() {
                reads[*i].set_duplicate(template_duplicate);
            }
        }
    }
}

pub(crate) fn run(args: &MarkDuplicatesArgs, command_line: &str) -> Result<(), Error> {
    let md = MarkDuplicates::new(MarkDuplicatesConfig::from(args));

    md.do_work(&args.INPUT, &args.OUTPUT, &args.METRICS_FILE, command_line)
}
