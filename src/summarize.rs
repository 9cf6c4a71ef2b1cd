//! Summary chromatin state maps
//!
//! The summary map assigns each bin its most probable state in the representative state map, and
//! merges runs of bins with the same state into segments.
//!

use std::error;

use camino::Utf8Path;
use log::info;

use crate::cli::{CompressSettings, SharedSettings, SummarizeSettings};
use crate::consensus::argmax_states;
use crate::genome_layout::{CONSENSUS_SUFFIX, GenomeLayout, GenomeWindow};
use crate::run_stats::{SegmentationRunStats, write_run_stats};
use crate::segment::{
    Segment, compress_segments, read_segment_file, segments_from_window_states,
    write_segment_bed, write_ucsc_bed,
};
use crate::state_annotation::read_state_annotation;
use crate::state_table::{TableReadError, read_window_table};
use crate::window_jobs::{discover_windows, run_partitioned_jobs};

pub struct WindowSegmentation {
    pub segments: Vec<Segment>,
    pub bin_count: usize,

    /// Bins without any finite state probability, which are left out of the segmentation
    pub uncalled_bin_count: usize,
}

/// Segment one window of the representative state map by its most probable state in each bin
pub fn segment_window(
    layout: &GenomeLayout,
    window: &GenomeWindow,
    avg_dir: &Utf8Path,
    state_count: usize,
) -> Result<WindowSegmentation, TableReadError> {
    let table = read_window_table(
        &avg_dir.join(window.filename(CONSENSUS_SUFFIX)),
        state_count,
        layout.bins_per_window,
    )?;
    let states = argmax_states(&table);
    let uncalled_bin_count = states.iter().filter(|x| x.is_none()).count();
    let segments = segments_from_window_states(layout, window, table.bin_indexes(), &states);
    Ok(WindowSegmentation {
        segments,
        bin_count: states.len(),
        uncalled_bin_count,
    })
}

/// Build the compressed summary segmentation from all windows in `avg_dir`
///
pub fn summarize_windows(
    layout: &GenomeLayout,
    avg_dir: &Utf8Path,
    state_count: usize,
    genomic_order: bool,
    worker_count: usize,
) -> Result<(Vec<Segment>, SegmentationRunStats), Box<dyn error::Error>> {
    let windows = discover_windows(avg_dir, CONSENSUS_SUFFIX)?;
    if windows.is_empty() {
        return Err(format!("No representative state map windows found in '{avg_dir}'").into());
    }
    info!("Summarizing {} windows", windows.len());

    let mut stats = SegmentationRunStats {
        input_window_count: windows.len(),
        ..Default::default()
    };

    // Windows are sorted by chromosome and index, so segments stay sorted by start within each
    // chromosome when concatenated
    let results = run_partitioned_jobs(worker_count, windows, |window| {
        segment_window(layout, &window, avg_dir, state_count)
    });
    let mut segments = Vec::new();
    for result in results {
        let window_segmentation = result?;
        stats.input_bin_count += window_segmentation.bin_count;
        stats.uncalled_bin_count += window_segmentation.uncalled_bin_count;
        segments.extend(window_segmentation.segments);
    }

    let segments = compress_segments(segments, genomic_order.then_some(layout));
    stats.segment_count = segments.len();
    Ok((segments, stats))
}

fn report_output(output_filename: &Utf8Path, segment_count: usize) {
    use thousands::Separable;
    info!(
        "Wrote {} segments to '{output_filename}'",
        segment_count.separate_with_commas()
    );
}

pub fn run_summarize(
    shared_settings: &SharedSettings,
    settings: &SummarizeSettings,
) -> Result<(), Box<dyn error::Error>> {
    let layout = shared_settings.genome_layout();

    // Check the annotation before the windows are processed
    let annotation = match &settings.state_annotation {
        Some(path) if settings.ucsc_format => {
            let annotation = read_state_annotation(path)?;
            if annotation.state_count() < settings.state_count {
                return Err(format!(
                    "State annotation file '{path}' describes {} states, but the model has {} states",
                    annotation.state_count(),
                    settings.state_count
                )
                .into());
            }
            Some(annotation)
        }
        _ => None,
    };

    let (segments, stats) = summarize_windows(
        &layout,
        &settings.avg_dir,
        settings.state_count,
        settings.genomic_order,
        shared_settings.thread_count,
    )?;
    if stats.uncalled_bin_count > 0 {
        info!(
            "Left {} bins without a finite state probability out of the summary",
            stats.uncalled_bin_count
        );
    }

    match &annotation {
        Some(annotation) => write_ucsc_bed(
            &settings.output_filename,
            &segments,
            annotation,
            settings.track_name.as_deref(),
        )?,
        None => write_segment_bed(&settings.output_filename, &segments)?,
    }
    report_output(&settings.output_filename, segments.len());

    write_run_stats(&settings.get_output_dir(), "summarize", &stats);
    Ok(())
}

/// Sort each chromosome's segments by start position and merge adjacent runs of the same state
///
pub fn compress_segment_list(
    mut segments: Vec<Segment>,
    genomic_order: Option<&GenomeLayout>,
) -> Vec<Segment> {
    segments.sort_by_key(|x| x.start);
    compress_segments(segments, genomic_order)
}

pub fn run_compress(
    shared_settings: &SharedSettings,
    settings: &CompressSettings,
) -> Result<(), Box<dyn error::Error>> {
    let layout = shared_settings.genome_layout();
    let segments = read_segment_file(&settings.input_filename, settings.skip_rows)?;
    let input_count = segments.len();
    info!(
        "Read {input_count} segments from '{}'",
        settings.input_filename
    );

    let segments = compress_segment_list(segments, settings.genomic_order.then_some(&layout));
    write_segment_bed(&settings.output_filename, &segments)?;
    report_output(&settings.output_filename, segments.len());

    let stats = SegmentationRunStats {
        input_bin_count: input_count,
        segment_count: segments.len(),
        ..Default::default()
    };
    write_run_stats(&settings.get_output_dir(), "compress", &stats);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{TestDir, write_gz};

    fn test_layout() -> GenomeLayout {
        GenomeLayout::new(
            200,
            3,
            ["chr1", "chr2", "chr10"].map(String::from).to_vec(),
        )
    }

    fn write_avg(dir: &Utf8Path, chrom: &str, window_index: u64, content: &str) {
        let window = GenomeWindow::new(chrom, window_index);
        write_gz(&dir.join(window.filename(CONSENSUS_SUFFIX)), content);
    }

    #[test]
    fn test_summarize_windows() {
        let dir = TestDir::new();
        let avg_dir = dir.path();
        let layout = test_layout();

        // Ties go to the lower state, and bins without values are left out
        write_avg(avg_dir, "chr1", 0, "state_1\tstate_2\n0.9\t0.1\n0.2\t0.8\n0.5\t0.5\n");
        write_avg(avg_dir, "chr1", 1, "state_1\tstate_2\n0.1\t0.9\n0.6\t0.4\n");
        write_avg(avg_dir, "chr10", 0, "state_1\tstate_2\n0.1\t0.9\n");
        write_avg(avg_dir, "chr2", 0, "state_1\tstate_2\n\t\n0.3\t0.7\n");

        let (segments, stats) = summarize_windows(&layout, avg_dir, 2, false, 2).unwrap();
        let expected = vec![
            Segment::new("chr1", 0, 200, "E1"),
            Segment::new("chr1", 200, 400, "E2"),
            Segment::new("chr1", 400, 600, "E1"),
            Segment::new("chr1", 600, 800, "E2"),
            Segment::new("chr1", 800, 1000, "E1"),
            Segment::new("chr10", 0, 200, "E2"),
            Segment::new("chr2", 200, 400, "E2"),
        ];
        assert_eq!(segments, expected);
        assert_eq!(stats.input_window_count, 4);
        assert_eq!(stats.input_bin_count, 8);
        assert_eq!(stats.uncalled_bin_count, 1);
        assert_eq!(stats.segment_count, 7);

        let (segments, _) = summarize_windows(&layout, avg_dir, 2, true, 1).unwrap();
        let chroms = segments
            .iter()
            .map(|x| x.chrom.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            chroms,
            vec!["chr1", "chr1", "chr1", "chr1", "chr1", "chr2", "chr10"]
        );
    }

    #[test]
    fn test_summarize_merges_across_windows() {
        let dir = TestDir::new();
        let avg_dir = dir.path();
        let layout = test_layout();

        write_avg(avg_dir, "chr1", 0, "state_1\tstate_2\n0.1\t0.9\n0.1\t0.9\n0.1\t0.9\n");
        write_avg(avg_dir, "chr1", 1, "state_1\tstate_2\n0.1\t0.9\n");

        let (segments, _) = summarize_windows(&layout, avg_dir, 2, false, 1).unwrap();
        assert_eq!(segments, vec![Segment::new("chr1", 0, 800, "E2")]);
    }

    #[test]
    fn test_compress_segment_list() {
        let segments = vec![
            Segment::new("chr2", 200, 400, "E1"),
            Segment::new("chr1", 200, 400, "E5"),
            Segment::new("chr2", 0, 200, "E1"),
            Segment::new("chr1", 0, 200, "E5"),
            Segment::new("chr1", 600, 800, "E5"),
        ];
        let compressed = compress_segment_list(segments, None);
        assert_eq!(
            compressed,
            vec![
                Segment::new("chr1", 0, 400, "E5"),
                Segment::new("chr1", 600, 800, "E5"),
                Segment::new("chr2", 0, 400, "E1"),
            ]
        );
    }

    #[test]
    fn test_summarize_rejects_bin_outside_window() {
        let dir = TestDir::new();
        let avg_dir = dir.path();
        let layout = test_layout();

        write_avg(avg_dir, "chr1", 0, "\tstate_1\tstate_2\n2\t0.1\t0.9\n3\t0.9\t0.1\n");

        let result = summarize_windows(&layout, avg_dir, 2, false, 1);
        assert!(result.is_err());
    }
}
