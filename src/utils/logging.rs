use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use anyhow::{anyhow, Error};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::runtime::ConfigBuilder;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::hts::AlignedRead;

struct RuntimeLogConfig {
    handle: log4rs::Handle,
    root_level: LevelFilter,
}

const LOG_DEST_STDERR: &str = "stderr";

static RUNTIME_LOG_CONFIG: OnceLock<Mutex<RuntimeLogConfig>> = OnceLock::new();

fn logger_vec() -> &'static Mutex<Vec<Logger>> {
    static LOGGER_VEC: OnceLock<Mutex<Vec<Logger>>> = OnceLock::new();
    LOGGER_VEC.get_or_init(|| Mutex::new(vec![]))
}

pub(crate) fn default_configbuilder() -> ConfigBuilder {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{l:<7} {d(%Y-%m-%d %H:%M:%S)}     {t}  {m}{n}",
        )))
        .build();

    Config::builder().appender(Appender::builder().build(LOG_DEST_STDERR, Box::new(stderr)))
}

/// Installs the stderr logger. Later calls are no-ops; the first level wins.
pub(crate) fn init_global_logger(level: LevelFilter) -> Result<(), Error> {
    if RUNTIME_LOG_CONFIG.get().is_some() {
        return Ok(());
    }

    let config = default_configbuilder()
        .build(Root::builder().appender(LOG_DEST_STDERR).build(level))
        .map_err(|err| anyhow!("Invalid log configuration: {:?}", err))?;

    let handle = log4rs::init_config(config)?;

    RUNTIME_LOG_CONFIG.get_or_init(|| {
        Mutex::new(RuntimeLogConfig {
            handle,
            root_level: level,
        })
    });

    Ok(())
}

/// Registers an extra logger (e.g. a more verbose target) on top of the root configuration.
pub(crate) fn add_logger_and_set_config(logger: Logger) -> Result<(), Error> {
    let runtime_log_config = RUNTIME_LOG_CONFIG
        .get()
        .ok_or_else(|| anyhow!("Global logger is not initialized."))?
        .lock()
        .map_err(|_| anyhow!("Log config lock poisoned."))?;

    let mut logger_vec = logger_vec()
        .lock()
        .map_err(|_| anyhow!("Logger list lock poisoned."))?;
    logger_vec.push(logger);

    let mut config_builder = default_configbuilder();
    for logger in logger_vec.iter() {
        config_builder = config_builder.logger(logger.clone())
    }

    drop(logger_vec); // release lock

    let config = config_builder
        .build(
            Root::builder()
                .appender(LOG_DEST_STDERR)
                .build(runtime_log_config.root_level),
        )
        .map_err(|err| anyhow!("Invalid log configuration: {:?}", err))?;

    runtime_log_config.handle.set_config(config);

    Ok(())
}

pub(crate) struct ProgressLogger {
    log: &'static str,
    n: usize,
    verb: &'static str,
    noun: &'static str,

    last_chrom: String,
    last_pos: i64,
    last_read_name: String,

    start_time: Instant,
    last_start_time: Option<u64>,
    count_non_increasing: i64,

    processed: usize,
}

impl ProgressLogger {
    pub(crate) fn new(log: &'static str, n: usize, verb: &'static str, noun: &'static str) -> Self {
        Self {
            log,
            n: n.max(1),
            verb,
            noun,
            start_time: Instant::now(),
            processed: 0,
            last_start_time: None,
            last_chrom: String::new(),
            last_pos: 0,
            last_read_name: String::new(),
            count_non_increasing: 0,
        }
    }

    pub(crate) fn record(&mut self, read: &AlignedRead) -> bool {
        match read.contig.as_deref() {
            Some(contig) if !read.is_unmapped() => {
                self.check_and_then_record(contig, read.alignment_start(), &read.name)
            }
            _ => self.check_and_then_record("", 0, &read.name),
        }
    }

    pub(crate) fn processed(&self) -> usize {
        self.processed
    }

    fn check_and_then_record(&mut self, chrom: &str, pos: i64, rname: &str) -> bool {
        if !chrom.is_empty() && chrom.eq(&self.last_chrom) && pos < self.last_pos {
            self.count_non_increasing += 1;
        } else {
            self.last_chrom.clear();
            self.last_chrom.push_str(chrom);
        }

        self.last_pos = pos;
        self.last_read_name.clear();
        self.last_read_name.push_str(rname);

        if self.last_start_time.is_none() {
            self.last_start_time = Some(self.start_time.elapsed().as_secs());
        }

        self.processed += 1;
        if self.processed % self.n == 0 {
            self.log_progress();
            true
        } else {
            false
        }
    }

    fn log_progress(&mut self) {
        let seconds = self.start_time.elapsed().as_secs();
        let last_period_seconds = seconds - self.last_start_time.unwrap_or(seconds);

        self.last_start_time = Some(seconds);

        let elapsed = format_elapsed_time(seconds);
        let period = pad(&last_period_seconds.to_string(), 4);
        let processed = pad(&self.processed.to_string(), 13);

        let read_info = if self.last_chrom.is_empty() {
            "*/*".to_string()
        } else {
            format!("{}:{}", self.last_chrom, self.last_pos)
        };

        let rn_info = if !self.last_read_name.is_empty() && self.count_non_increasing > 1000 {
            format!(".  Last read name: {}", self.last_read_name)
        } else {
            String::new()
        };

        log::info!(target: self.log,
            "{} {} {} .  Elapsed time: {}s.  Time for last {}: {}s.  Last read position: {}{}",
            self.verb,
            processed,
            self.noun,
            elapsed,
            self.n,
            period,
            read_info,
            rn_info
        );
    }
}

fn format_elapsed_time(seconds: u64) -> String {
    let s = seconds % 60;
    let all_minutes = seconds / 60;
    let m = all_minutes % 60;
    let h = all_minutes / 60;

    format!("{:0>2}:{:0>2}:{:0>2}", h, m, s)
}

fn pad(s: &str, length: usize) -> String {
    format!("{:>width$}", s, width = length)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::ReadBuilder;

    #[test]
    fn test_add_logger() {
        init_global_logger(LevelFilter::Info).unwrap();

        log::info!(target:"A", "Hey A1 info!");

        add_logger_and_set_config(
            Logger::builder()
                .additive(true)
                .build("A", LevelFilter::Debug),
        )
        .unwrap();

        log::debug!(target:"A", "Hey A2 debug!");
    }

    #[test]
    fn progress_logger_reports_every_n() {
        let mut pl = ProgressLogger::new("A", 2, "Read", "records");

        let read = ReadBuilder::fragment("q1", "chr1", 100).build();

        assert!(!pl.record(&read));
        assert!(pl.record(&read));
        assert!(!pl.record(&read));
        assert_eq!(pl.processed(), 3);
    }

    #[test]
    fn elapsed_time_and_padding() {
        assert_eq!(format_elapsed_time(3725), "01:02:05");
        assert_eq!(pad("12", 4), "  12");
        assert_eq!(pad("12345", 4), "12345");
    }
}
