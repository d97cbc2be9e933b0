use clap::Parser;
use cmdline::cli::{Cli, Command};
use log::LevelFilter;
use log4rs::config::Logger;
use macro_sup::set_mlog;
use utils::logging::{add_logger_and_set_config, init_global_logger};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod annotator;
mod cmdline;
mod hts;
mod markdup;
mod utils;

#[cfg(test)]
mod tests;

set_mlog!(stringify!(main));

fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    init_global_logger(cli.LOG_LEVEL)?;

    for target in cli.VERBOSE_TARGET.iter() {
        add_logger_and_set_config(
            Logger::builder()
                .additive(true)
                .build(target, LevelFilter::Debug),
        )?;
    }

    match &cli.command {
        Command::MarkDuplicates(args) => {
            let command_line = std::env::args().collect::<Vec<_>>().join(" ");
            markdup::markduplicates::run(args, &command_line)
        }
        Command::CombineMappingQuality(args) => annotator::rms_mapping_quality::run(args),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        mlog::error!("{:#}", err);
        eprintln!("Error: {:?}", err);
        std::process::exit(1);
    }
}
