//! Track stats for each csrep run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use unwrap::unwrap;

use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};

pub const RUN_STATS_FILENAME: &str = "run.stats.json";

/// Stats for the commands producing one state table per window
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WindowRunStats {
    pub sample_count: usize,

    pub discovered_window_count: usize,

    /// Windows skipped because their output was already present
    pub existing_window_count: usize,

    pub completed_window_count: usize,

    /// Windows skipped because some input file was missing
    ///
    /// These windows have no output and are retried on the next run.
    pub missing_input_window_count: usize,

    /// Bins which could not be normalized, see the zero-row policy
    pub degenerate_row_count: usize,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SplitRunStats {
    pub sample_count: usize,
    pub completed_chrom_count: usize,

    /// Chromosomes without segmentation data in at least one sample
    pub missing_chrom_count: usize,

    pub window_count: usize,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SegmentationRunStats {
    pub input_window_count: usize,
    pub input_bin_count: usize,

    /// Bins without any finite state probability
    pub uncalled_bin_count: usize,

    pub segment_count: usize,
}

#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RemapStats {
    pub chrom_count: usize,
    pub window_count: usize,
    pub mapped_bin_count: usize,

    /// Bins in the input tables which have no entry in the assembly map
    pub unmapped_bin_count: usize,

    pub fragment_count: usize,
    pub output_bin_count: usize,
}

impl RemapStats {
    pub fn merge(&mut self, other: &Self) {
        self.chrom_count += other.chrom_count;
        self.window_count += other.window_count;
        self.mapped_bin_count += other.mapped_bin_count;
        self.unmapped_bin_count += other.unmapped_bin_count;
        self.fragment_count += other.fragment_count;
        self.output_bin_count += other.output_bin_count;
    }
}

#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct LiftSegmentsStats {
    pub input_segment_count: usize,
    pub mapped_bin_count: usize,

    /// Origin bins in the assembly map not covered by any input segment
    pub uncovered_bin_count: usize,

    pub output_segment_count: usize,
}

/// Stats for the commands writing assembly map related bin files
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BinFileStats {
    pub chrom_count: usize,
    pub bin_count: usize,
}

#[derive(Serialize)]
struct RunStats<'a, T> {
    program: &'a str,
    version: &'a str,
    command: &'a str,
    stats: &'a T,
}

/// Write run_stats structure out in json format
pub fn write_run_stats<T: Serialize>(output_dir: &Utf8Path, command: &str, stats: &T) {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create run statistics json file: '{}'",
        filename
    );

    let run_stats = RunStats {
        program: PROGRAM_NAME,
        version: PROGRAM_VERSION,
        command,
        stats,
    };
    serde_json::to_writer_pretty(&f, &run_stats).unwrap();
}
