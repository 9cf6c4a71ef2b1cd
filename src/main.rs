mod assembly_map;
mod average;
mod cli;
mod consensus;
mod diff;
mod genome_layout;
mod globals;
mod lift_segments;
mod logger;
mod os_utils;
mod remap;
mod run_stats;
mod segment;
mod split_segments;
mod state_annotation;
mod state_table;
mod summarize;
mod tsv_utils;
mod window_jobs;

#[cfg(test)]
mod test_utils;

use std::{error, process};

use hhmmss::Hhmmss;
use log::{error, info};

use crate::assembly_map::{run_bin_bed, run_reverse_map};
use crate::average::{run_average, run_baseline};
use crate::cli::Commands;
use crate::diff::run_diff;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};
use crate::lift_segments::run_lift_segments;
use crate::logger::setup_output_dir_and_logger;
use crate::remap::run_remap;
use crate::split_segments::run_split_segments;
use crate::summarize::{run_compress, run_summarize};

/// Run system configuration steps prior to starting any other program logic
///
fn system_configuration_prelude() {
    os_utils::attempt_max_open_file_limit();
}

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROGRAM_NAME} {PROGRAM_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!("Running on {} threads", settings.shared.thread_count);

    let start = std::time::Instant::now();

    let shared = &settings.shared;
    match &settings.command {
        Commands::SplitSegments(x) => run_split_segments(shared, x)?,
        Commands::Average(x) => run_average(shared, x)?,
        Commands::Baseline(x) => run_baseline(shared, x)?,
        Commands::Summarize(x) => run_summarize(shared, x)?,
        Commands::Compress(x) => run_compress(shared, x)?,
        Commands::Diff(x) => run_diff(shared, x)?,
        Commands::BinBed(x) => run_bin_bed(shared, x)?,
        Commands::ReverseMap(x) => run_reverse_map(shared, x)?,
        Commands::Remap(x) => run_remap(shared, x)?,
        Commands::LiftSegments(x) => run_lift_segments(shared, x)?,
    }

    info!(
        "{PROGRAM_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    system_configuration_prelude();

    let settings = cli::validate_and_fix_settings(cli::parse_settings());

    // Setup logger, including creation of the output directory for the log file:
    setup_output_dir_and_logger(&settings.get_output_dir(), settings.shared.debug);

    if let Err(err) = run(&settings) {
        error!("{err}");
        process::exit(1);
    }
}
