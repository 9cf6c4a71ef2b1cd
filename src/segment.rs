//! Chromatin state segments and run-length compression of per-bin state calls
//!

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, Write};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::genome_layout::{GenomeLayout, GenomeWindow};
use crate::state_annotation::StateAnnotation;
use crate::tsv_utils::{OutputFile, open_input};

#[derive(Debug, Error)]
pub enum SegmentFileError {
    #[error("Can't access segment file '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't parse segment file '{path}' at line {line}: {message}")]
    Parse {
        path: Utf8PathBuf,
        line: usize,
        message: String,
    },

    #[error("State '{state}' has no entry in the state annotation table")]
    UnknownState { state: String },
}

/// Label of a 0-indexed state in segment files, e.g. `E1` for state index 0
pub fn state_label(state_index: usize) -> String {
    format!("E{}", state_index + 1)
}

/// Parse a state label such as `E18` back to its 0-indexed state
pub fn parse_state_label(label: &str) -> Option<usize> {
    let state = label.strip_prefix('E')?.parse::<usize>().ok()?;
    state.checked_sub(1)
}

/// A run of bins on one chromosome sharing a single state label
#[derive(Clone, PartialEq, Eq)]
pub struct Segment {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub state: String,
}

impl Segment {
    pub fn new(chrom: &str, start: u64, end: u64, state: &str) -> Self {
        Self {
            chrom: chrom.to_string(),
            start,
            end,
            state: state.to_string(),
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Segment: {}:{}-{} {}",
            self.chrom, self.start, self.end, self.state
        )
    }
}

/// Merge consecutive segments of one chromosome into maximal runs
///
/// Input must already be sorted by start. Two neighbors merge only when they have the same state
/// and the first ends exactly where the second starts, so a same-state run interrupted by a gap is
/// kept as two segments.
///
pub fn compress_chrom_segments(segments: impl IntoIterator<Item = Segment>) -> Vec<Segment> {
    let mut compressed: Vec<Segment> = Vec::new();
    for segment in segments {
        if let Some(last) = compressed.last_mut() {
            debug_assert_eq!(last.chrom, segment.chrom);
            debug_assert!(last.start <= segment.start);
            if last.state == segment.state && last.end == segment.start {
                last.end = segment.end;
                continue;
            }
        }
        compressed.push(segment);
    }
    compressed
}

/// Sort chromosome labels for output
///
/// Labels are sorted as plain strings (so `chr10` precedes `chr2`), unless `genomic_order` gives
/// the layout whose chromosome list should be followed. Chromosomes missing from that list go last.
///
pub fn sort_chrom_labels(chroms: &mut [String], genomic_order: Option<&GenomeLayout>) {
    chroms.sort();
    if let Some(layout) = genomic_order {
        chroms.sort_by_key(|x| layout.chrom_rank(x).unwrap_or(usize::MAX));
    }
}

/// Group segments by chromosome and compress each chromosome
///
/// The order of segments within each chromosome is kept from the input, see
/// [`compress_chrom_segments`]. Chromosome output order follows [`sort_chrom_labels`].
///
pub fn compress_segments(
    segments: Vec<Segment>,
    genomic_order: Option<&GenomeLayout>,
) -> Vec<Segment> {
    let mut chrom_segments: BTreeMap<String, Vec<Segment>> = BTreeMap::new();
    for segment in segments {
        chrom_segments
            .entry(segment.chrom.clone())
            .or_default()
            .push(segment);
    }

    let mut chroms = chrom_segments.keys().cloned().collect::<Vec<_>>();
    sort_chrom_labels(&mut chroms, genomic_order);

    let mut compressed = Vec::new();
    for chrom in chroms {
        if let Some(x) = chrom_segments.remove(&chrom) {
            compressed.extend(compress_chrom_segments(x));
        }
    }
    compressed
}

/// Convert the per-bin state calls of one window into compressed segments
///
/// `states` is parallel to `bin_indexes`, which gives the window-relative index of each bin. Bins
/// without a state call are left out of the segmentation.
///
pub fn segments_from_window_states(
    layout: &GenomeLayout,
    window: &GenomeWindow,
    bin_indexes: &[usize],
    states: &[Option<usize>],
) -> Vec<Segment> {
    assert_eq!(bin_indexes.len(), states.len());
    let bin_segments = bin_indexes
        .iter()
        .zip(states)
        .filter_map(|(&bin_in_window, state)| {
            let state = (*state)?;
            let start = layout.absolute_start_bp(window.window_index, bin_in_window);
            Some(Segment {
                chrom: window.chrom.clone(),
                start,
                end: start + layout.bin_size,
                state: state_label(state),
            })
        });
    compress_chrom_segments(bin_segments)
}

/// Read the first 4 columns `chrom start end state` of a headerless tab-separated segment file
///
/// The first `skip_rows` lines are skipped, for instance to pass over the track line of a genome
/// browser file.
///
pub fn read_segment_file(
    path: &Utf8Path,
    skip_rows: usize,
) -> Result<Vec<Segment>, SegmentFileError> {
    let io_error = |source| SegmentFileError::Io {
        path: path.to_owned(),
        source,
    };
    let parse_error = |line: usize, message: String| SegmentFileError::Parse {
        path: path.to_owned(),
        line,
        message,
    };

    let mut segments = Vec::new();
    for (line_index, line) in open_input(path).map_err(io_error)?.lines().enumerate() {
        let line = line.map_err(io_error)?;
        let line_number = line_index + 1;
        if line_index < skip_rows || line.trim().is_empty() {
            continue;
        }
        let words = line.split('\t').collect::<Vec<_>>();
        if words.len() < 4 {
            return Err(parse_error(
                line_number,
                format!("expected at least 4 columns, found {}", words.len()),
            ));
        }
        let parse_pos = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| parse_error(line_number, format!("invalid position '{s}'")))
        };
        let start = parse_pos(words[1])?;
        let end = parse_pos(words[2])?;
        if end <= start {
            return Err(parse_error(
                line_number,
                format!("segment end {end} is not after start {start}"),
            ));
        }
        segments.push(Segment::new(words[0], start, end, words[3]));
    }
    Ok(segments)
}

fn write_segments_to(
    path: &Utf8Path,
    write_content: impl FnOnce(&mut OutputFile) -> Result<(), SegmentFileError>,
) -> Result<(), SegmentFileError> {
    let io_error = |source| SegmentFileError::Io {
        path: path.to_owned(),
        source,
    };
    let mut f = OutputFile::create(path).map_err(io_error)?;
    write_content(&mut f)?;
    f.commit().map_err(io_error)
}

/// Write segments as a headerless 4-column BED file `chrom start end state`
///
pub fn write_segment_bed(path: &Utf8Path, segments: &[Segment]) -> Result<(), SegmentFileError> {
    write_segments_to(path, |f| {
        for s in segments {
            writeln!(f, "{}\t{}\t{}\t{}", s.chrom, s.start, s.end, s.state).map_err(|source| {
                SegmentFileError::Io {
                    path: path.to_owned(),
                    source,
                }
            })?;
        }
        Ok(())
    })
}

/// Write segments as a 9-column BED file for genome browsers, with colors from `annotation`
///
/// Segment states must be `E<k>` labels. When `track_name` is given a track definition line is
/// written first.
///
pub fn write_ucsc_bed(
    path: &Utf8Path,
    segments: &[Segment],
    annotation: &StateAnnotation,
    track_name: Option<&str>,
) -> Result<(), SegmentFileError> {
    let io_error = |source| SegmentFileError::Io {
        path: path.to_owned(),
        source,
    };
    write_segments_to(path, |f| {
        if let Some(track_name) = track_name {
            writeln!(
                f,
                "track name=\"{track_name}\" description=\"\" visibility=1 itemRgb=\"On\""
            )
            .map_err(io_error)?;
        }
        for s in segments {
            let unknown_state = || SegmentFileError::UnknownState {
                state: s.state.clone(),
            };
            let state_index = parse_state_label(&s.state).ok_or_else(unknown_state)?;
            let name = annotation
                .state_name(state_index)
                .ok_or_else(unknown_state)?;
            let rgb = &annotation.get(state_index).ok_or_else(unknown_state)?.rgb;
            writeln!(
                f,
                "{}\t{}\t{}\t{name}\t1\t.\t{}\t{}\t{rgb}",
                s.chrom, s.start, s.end, s.start, s.end
            )
            .map_err(io_error)?;
        }
        Ok(())
    })
}
