//! Split per-sample genome segmentations into per-window tables of all samples' bin states
//!
//! Each output window file has the header `chrom start_bp_this_window end_bp_this_window` followed
//! by one column per sample, and one row per bin holding each sample's state label.
//!

use std::error;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use thiserror::Error;

use crate::cli::{SharedSettings, SplitSegmentsSettings};
use crate::genome_layout::{COMBINED_SEGMENT_SUFFIX, GenomeLayout, GenomeWindow};
use crate::run_stats::{SplitRunStats, write_run_stats};
use crate::segment::{Segment, SegmentFileError, parse_state_label, read_segment_file, state_label};
use crate::state_table::TableReadError;
use crate::tsv_utils::{OutputFile, list_dir_filenames, open_input, tsv_reader_builder};
use crate::window_jobs::run_partitioned_jobs;

const WINDOW_POSITION_COLUMNS: [&str; 3] = ["chrom", "start_bp_this_window", "end_bp_this_window"];

#[derive(Debug, Error)]
pub enum SplitError {
    #[error(transparent)]
    SegmentFile(#[from] SegmentFileError),

    #[error("Sample '{sample}' segment {chrom}:{start}-{end} is invalid: {message}")]
    InvalidSegment {
        sample: String,
        chrom: String,
        start: u64,
        end: u64,
        message: String,
    },

    #[error(
        "Sample '{sample}' has {bin_count} bins on {chrom}, but other samples have {expected_bin_count}. All samples should have the same chromosome lengths in their segmentation data"
    )]
    BinCountMismatch {
        sample: String,
        chrom: String,
        bin_count: usize,
        expected_bin_count: usize,
    },

    #[error("Can't write window file '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-sample segmentation input file
pub struct SampleSegmentFile {
    pub sample: String,
    pub path: Utf8PathBuf,
}

/// Find all files named `<sample><suffix>` in `dir`, sorted by sample name
///
pub fn discover_sample_files(dir: &Utf8Path, suffix: &str) -> io::Result<Vec<SampleSegmentFile>> {
    Ok(list_dir_filenames(dir)?
        .into_iter()
        .filter_map(|filename| {
            let sample = filename.strip_suffix(suffix)?;
            if sample.is_empty() {
                return None;
            }
            Some(SampleSegmentFile {
                sample: sample.to_string(),
                path: dir.join(&filename),
            })
        })
        .collect())
}

/// Expand the segments of one sample on one chromosome into per-bin 0-indexed states
///
/// Segments must be in order, bin aligned and contiguous from the chromosome start.
///
fn expand_chrom_states(
    layout: &GenomeLayout,
    sample: &str,
    segments: &[&Segment],
) -> Result<Vec<u16>, SplitError> {
    let mut states = Vec::new();
    for segment in segments {
        let invalid = |message: &str| SplitError::InvalidSegment {
            sample: sample.to_string(),
            chrom: segment.chrom.clone(),
            start: segment.start,
            end: segment.end,
            message: message.to_string(),
        };
        let (Some(start_bin), Some(end_bin)) =
            (layout.bin_of(segment.start), layout.bin_of(segment.end))
        else {
            return Err(invalid("segment is not aligned to the bin size"));
        };
        if start_bin != states.len() as u64 {
            return Err(invalid(
                "segments must be sorted and contiguous from the chromosome start",
            ));
        }
        let state = parse_state_label(&segment.state)
            .and_then(|x| u16::try_from(x).ok())
            .ok_or_else(|| invalid("state label must be of the form 'E<k>'"))?;
        states.resize(end_bin as usize, state);
    }
    Ok(states)
}

/// Write the window files of one chromosome
///
/// Returns the number of windows written.
///
fn write_chrom_windows(
    layout: &GenomeLayout,
    chrom: &str,
    samples: &[&str],
    sample_states: &[Vec<u16>],
    output_dir: &Utf8Path,
) -> Result<u64, SplitError> {
    let bin_count = sample_states[0].len() as u64;
    let window_count = layout.window_count(bin_count);
    for window_index in 0..window_count {
        let window = GenomeWindow::new(chrom, window_index);
        let path = output_dir.join(window.filename(COMBINED_SEGMENT_SUFFIX));
        let write_window = || -> io::Result<()> {
            let mut f = OutputFile::create(&path)?;
            let header = WINDOW_POSITION_COLUMNS
                .iter()
                .chain(samples.iter())
                .copied()
                .collect::<Vec<_>>();
            writeln!(f, "{}", header.join("\t"))?;

            let first_bin = layout.absolute_bin(window_index, 0);
            let last_bin = std::cmp::min(first_bin + layout.bins_per_window, bin_count);
            for bin_index in first_bin..last_bin {
                let start =
                    layout.absolute_start_bp(window_index, layout.bin_in_window(bin_index));
                write!(f, "{chrom}\t{start}\t{}", start + layout.bin_size)?;
                for states in sample_states {
                    write!(f, "\t{}", state_label(states[bin_index as usize] as usize))?;
                }
                writeln!(f)?;
            }
            f.commit()
        };
        write_window().map_err(|source| SplitError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(window_count)
}

/// Outcome of splitting one chromosome
#[derive(Debug, PartialEq)]
pub enum ChromSplitOutcome {
    Completed { window_count: u64 },

    /// Some sample has no segmentation data on the chromosome
    MissingSample { sample: String },
}

/// Split all samples' segmentation data for one chromosome into window files
///
pub fn split_chrom(
    layout: &GenomeLayout,
    sample_files: &[SampleSegmentFile],
    chrom: &str,
    output_dir: &Utf8Path,
) -> Result<ChromSplitOutcome, SplitError> {
    let mut sample_states: Vec<Vec<u16>> = Vec::new();
    for sample_file in sample_files {
        let segments = read_segment_file(&sample_file.path, 0)?;
        let chrom_segments = segments
            .iter()
            .filter(|x| x.chrom == chrom)
            .collect::<Vec<_>>();
        let states = expand_chrom_states(layout, &sample_file.sample, &chrom_segments)?;
        if states.is_empty() {
            return Ok(ChromSplitOutcome::MissingSample {
                sample: sample_file.sample.clone(),
            });
        }
        if let Some(first) = sample_states.first() {
            if first.len() != states.len() {
                return Err(SplitError::BinCountMismatch {
                    sample: sample_file.sample.clone(),
                    chrom: chrom.to_string(),
                    bin_count: states.len(),
                    expected_bin_count: first.len(),
                });
            }
        }
        sample_states.push(states);
    }

    if sample_states.is_empty() {
        return Ok(ChromSplitOutcome::Completed { window_count: 0 });
    }
    let samples = sample_files
        .iter()
        .map(|x| x.sample.as_str())
        .collect::<Vec<_>>();
    let window_count = write_chrom_windows(layout, chrom, &samples, &sample_states, output_dir)?;
    Ok(ChromSplitOutcome::Completed { window_count })
}

/// Read the hard state calls of the given samples from one window file
///
/// Returns the 0-indexed states of each sample, in the order of `samples`.
///
pub fn read_window_sample_states(
    path: &Utf8Path,
    samples: &[String],
    state_count: usize,
) -> Result<Vec<Vec<usize>>, TableReadError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            TableReadError::NotFound {
                path: path.to_owned(),
            }
        } else {
            TableReadError::Io {
                path: path.to_owned(),
                source,
            }
        }
    };
    let parse_error = |line: u64, message: String| TableReadError::Parse {
        path: path.to_owned(),
        line,
        message,
    };

    let mut rdr = tsv_reader_builder(true).from_reader(open_input(path).map_err(io_error)?);
    let header = rdr
        .headers()
        .map_err(|e| parse_error(1, e.to_string()))?
        .clone();
    let sample_columns = samples
        .iter()
        .map(|sample| {
            header
                .iter()
                .position(|x| x == sample)
                .ok_or_else(|| TableReadError::Schema {
                    path: path.to_owned(),
                    message: format!("no column for sample '{sample}'"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut sample_states = vec![Vec::new(); samples.len()];
    for record in rdr.records() {
        let record = record.map_err(|e| parse_error(0, e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        for (states, &column) in sample_states.iter_mut().zip(sample_columns.iter()) {
            let field = record.get(column).unwrap_or("");
            let state = parse_state_label(field)
                .filter(|&x| x < state_count)
                .ok_or_else(|| {
                    parse_error(
                        line,
                        format!("invalid state '{field}' for a {state_count} state model"),
                    )
                })?;
            states.push(state);
        }
    }
    Ok(sample_states)
}

pub fn run_split_segments(
    shared_settings: &SharedSettings,
    settings: &SplitSegmentsSettings,
) -> Result<(), Box<dyn error::Error>> {
    let layout = shared_settings.genome_layout();
    let sample_files = discover_sample_files(&settings.input_dir, &settings.input_suffix)?;
    if sample_files.is_empty() {
        return Err(format!(
            "No segmentation files ending in '{}' found in '{}'",
            settings.input_suffix, settings.input_dir
        )
        .into());
    }
    info!(
        "Splitting segmentation data of {} samples: {}",
        sample_files.len(),
        sample_files
            .iter()
            .map(|x| x.sample.as_str())
            .collect::<Vec<_>>()
            .join(",")
    );

    let window_dir = &settings.output_dir;
    let results = run_partitioned_jobs(
        shared_settings.thread_count,
        layout.chrom_labels.clone(),
        |chrom| {
            let outcome = split_chrom(&layout, &sample_files, &chrom, window_dir);
            (chrom, outcome)
        },
    );

    let mut stats = SplitRunStats {
        sample_count: sample_files.len(),
        ..Default::default()
    };
    for (chrom, outcome) in results {
        match outcome? {
            ChromSplitOutcome::Completed { window_count } => {
                stats.completed_chrom_count += 1;
                stats.window_count += window_count as usize;
            }
            ChromSplitOutcome::MissingSample { sample } => {
                warn!(
                    "Skipping chromosome {chrom}: sample '{sample}' has no segmentation data on this chromosome"
                );
                stats.missing_chrom_count += 1;
            }
        }
    }
    info!(
        "Wrote {} windows for {} chromosomes",
        stats.window_count, stats.completed_chrom_count
    );
    write_run_stats(&settings.output_dir, "split-segments", &stats);
    Ok(())
}
