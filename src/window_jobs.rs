//! Static fan-out of per-window (or per-chromosome) work over a fixed worker pool
//!
//! Work lists are split once into contiguous chunks, one chunk per worker. Each worker processes
//! its chunk sequentially and writes its own output files, so workers never share mutable state.
//! The caller blocks until every worker has finished. There is no timeout or cancellation: a hung
//! worker stalls the join indefinitely.
//!

use std::collections::HashSet;
use std::io;
use std::sync::mpsc::channel;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use thiserror::Error;

use crate::consensus::ConsensusError;
use crate::genome_layout::{GenomeWindow, WindowFilenameMatcher};
use crate::run_stats::WindowRunStats;
use crate::state_table::TableReadError;
use crate::tsv_utils::list_dir_filenames;

/// Result of one window job which did not fail
#[derive(Debug, PartialEq)]
pub enum WindowOutcome {
    Completed { degenerate_row_count: usize },

    /// An input file for the window was missing, so no output was written
    MissingInput { path: Utf8PathBuf },
}

#[derive(Debug, Error)]
pub enum WindowJobError {
    #[error(transparent)]
    Table(#[from] TableReadError),

    #[error("Can't combine state tables for window {window}: {source}")]
    Consensus {
        window: GenomeWindow,
        #[source]
        source: ConsensusError,
    },

    #[error("Can't write output file '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fold the per-window job results into run stats
///
/// Missing-input windows are logged and counted. All windows are accounted for before the first
/// fatal error, if any, is returned.
///
pub fn tally_window_outcomes(
    results: Vec<(GenomeWindow, Result<WindowOutcome, WindowJobError>)>,
    stats: &mut WindowRunStats,
) -> Result<(), WindowJobError> {
    let mut first_error = None;
    let mut error_count = 0;
    for (window, result) in results {
        match result {
            Ok(WindowOutcome::Completed {
                degenerate_row_count,
            }) => {
                stats.completed_window_count += 1;
                stats.degenerate_row_count += degenerate_row_count;
            }
            Ok(WindowOutcome::MissingInput { path }) => {
                warn!("Skipping window {window}: missing input file '{path}'");
                stats.missing_input_window_count += 1;
            }
            Err(e) => {
                error_count += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    info!(
        "Completed {} windows, skipped {} windows with missing input",
        stats.completed_window_count, stats.missing_input_window_count
    );
    if stats.degenerate_row_count > 0 {
        warn!(
            "Found {} bins with zero or undefined total state probability",
            stats.degenerate_row_count
        );
    }
    match first_error {
        Some(e) => {
            if error_count > 1 {
                warn!("{error_count} windows failed, reporting the first failure");
            }
            Err(e)
        }
        None => Ok(()),
    }
}

/// Round `numerator / denominator` to the nearest integer, with ties to even
fn round_half_even_div(numerator: usize, denominator: usize) -> usize {
    let quotient = numerator / denominator;
    let twice_remainder = 2 * (numerator % denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

/// Split `work` into exactly `worker_count` contiguous chunks
///
/// The chunk size is `len / worker_count` rounded to the nearest integer. The first
/// `worker_count - 1` chunks take up to that many items and the last chunk takes the remainder.
/// When the rounded chunk size is zero each item gets its own chunk, followed by empty chunks.
///
/// Concatenating the chunks in order always reproduces `work`.
///
pub fn partition_work_list<T>(work: Vec<T>, worker_count: usize) -> Vec<Vec<T>> {
    assert!(worker_count > 0);

    let chunk_size = round_half_even_div(work.len(), worker_count);
    let mut chunks = Vec::with_capacity(worker_count);
    let mut items = work.into_iter();
    if chunk_size == 0 {
        chunks.extend(items.by_ref().map(|x| vec![x]));
    } else {
        for _ in 0..(worker_count - 1) {
            chunks.push(items.by_ref().take(chunk_size).collect());
        }
        chunks.push(items.by_ref().collect());
    }
    assert!(items.next().is_none());
    chunks.resize_with(worker_count, Vec::new);
    chunks
}

/// Run `job` on every work item over `worker_count` statically partitioned workers
///
/// Returns the job results in the order of the input work list.
///
pub fn run_partitioned_jobs<T, R, F>(worker_count: usize, work: Vec<T>, job: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let work_count = work.len();
    let partitions = partition_work_list(work.into_iter().enumerate().collect(), worker_count);

    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .build()
        .unwrap();

    let job = &job;
    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for (worker_index, partition) in partitions.into_iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                debug!(
                    "Worker {worker_index} starting on {} work items",
                    partition.len()
                );
                for (work_index, item) in partition {
                    tx.send((work_index, job(item))).unwrap();
                }
                debug!("Worker {worker_index} finished");
            });
        }
    });

    let mut results = rx.into_iter().collect::<Vec<_>>();
    assert_eq!(results.len(), work_count);
    results.sort_by_key(|(work_index, _)| *work_index);
    results.into_iter().map(|(_, r)| r).collect()
}

/// Find all windows with a file named `<chrom>_<index><suffix>` in `dir`, sorted
///
pub fn discover_windows(dir: &Utf8Path, suffix: &str) -> io::Result<Vec<GenomeWindow>> {
    let matcher = WindowFilenameMatcher::new(suffix);
    let mut windows = list_dir_filenames(dir)?
        .iter()
        .filter_map(|x| matcher.parse(x))
        .collect::<Vec<_>>();
    windows.sort();
    Ok(windows)
}

/// Select the windows which still need output
///
/// Windows with an existing `<label><output_suffix>` file in `output_dir` are dropped unless
/// `replace_existing` is set. Existing output files are the only record of completed work, which
/// is what allows an interrupted whole-genome run to be resumed.
///
pub fn select_pending_windows(
    discovered: Vec<GenomeWindow>,
    output_dir: &Utf8Path,
    output_suffix: &str,
    replace_existing: bool,
) -> io::Result<Vec<GenomeWindow>> {
    if replace_existing {
        return Ok(discovered);
    }

    let existing = discover_windows(output_dir, output_suffix)?
        .into_iter()
        .collect::<HashSet<_>>();
    let discovered_count = discovered.len();
    let pending = discovered
        .into_iter()
        .filter(|x| !existing.contains(x))
        .collect::<Vec<_>>();
    info!(
        "Skipping {} of {discovered_count} windows with existing output",
        discovered_count - pending.len()
    );
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::genome_layout::{COMBINED_SEGMENT_SUFFIX, CONSENSUS_SUFFIX};
    use crate::test_utils::TestDir;

    #[test]
    fn test_tally_window_outcomes() {
        let results = vec![
            (
                GenomeWindow::new("chr1", 0),
                Ok(WindowOutcome::Completed {
                    degenerate_row_count: 2,
                }),
            ),
            (
                GenomeWindow::new("chr1", 1),
                Ok(WindowOutcome::MissingInput {
                    path: Utf8PathBuf::from("x"),
                }),
            ),
            (
                GenomeWindow::new("chr1", 2),
                Err(WindowJobError::Consensus {
                    window: GenomeWindow::new("chr1", 2),
                    source: ConsensusError::DegenerateRow { bin_index: 7 },
                }),
            ),
            (
                GenomeWindow::new("chr1", 3),
                Ok(WindowOutcome::Completed {
                    degenerate_row_count: 0,
                }),
            ),
        ];
        let mut stats = WindowRunStats::default();
        let result = tally_window_outcomes(results, &mut stats);
        assert!(matches!(result, Err(WindowJobError::Consensus { .. })));
        assert_eq!(stats.completed_window_count, 2);
        assert_eq!(stats.missing_input_window_count, 1);
        assert_eq!(stats.degenerate_row_count, 2);
    }

    #[test]
    fn test_round_half_even_div() {
        assert_eq!(round_half_even_div(6, 4), 2);
        assert_eq!(round_half_even_div(10, 4), 2);
        assert_eq!(round_half_even_div(14, 4), 4);
        assert_eq!(round_half_even_div(7, 4), 2);
        assert_eq!(round_half_even_div(2, 4), 0);
        assert_eq!(round_half_even_div(3, 4), 1);
    }

    #[test]
    fn test_partition_examples() {
        assert_eq!(
            partition_work_list(vec![1, 2, 3, 4], 4),
            vec![vec![1], vec![2], vec![3], vec![4]]
        );
        assert_eq!(
            partition_work_list(vec![1, 2, 3], 4),
            vec![vec![1], vec![2], vec![3], vec![]]
        );
        assert_eq!(
            partition_work_list(vec![1, 2], 4),
            vec![vec![1], vec![2], vec![], vec![]]
        );
        assert_eq!(
            partition_work_list(vec![1, 2, 3, 4, 5, 6], 4),
            vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![]]
        );
        assert_eq!(
            partition_work_list(vec![1, 2, 3, 4, 5, 6, 7], 2),
            vec![vec![1, 2, 3, 4], vec![5, 6, 7]]
        );
        assert_eq!(
            partition_work_list(Vec::<u32>::new(), 3),
            vec![Vec::<u32>::new(); 3]
        );
    }

    #[test]
    fn test_partition_coverage() {
        for len in 0..40usize {
            for worker_count in 1..9 {
                let work = (0..len).collect::<Vec<_>>();
                let chunks = partition_work_list(work.clone(), worker_count);
                assert_eq!(chunks.len(), worker_count);
                assert_eq!(chunks.concat(), work);
            }
        }
    }

    #[test]
    fn test_run_partitioned_jobs_preserves_order() {
        let work = (0..23).collect::<Vec<u64>>();
        let results = run_partitioned_jobs(4, work, |x| x * 10);
        assert_eq!(results, (0..23).map(|x| x * 10).collect::<Vec<_>>());

        let results = run_partitioned_jobs(3, Vec::<u64>::new(), |x| x);
        assert!(results.is_empty());
    }

    fn touch_windows(dir: &Utf8Path, chrom: &str, indexes: std::ops::Range<u64>, suffix: &str) {
        for i in indexes {
            std::fs::write(dir.join(GenomeWindow::new(chrom, i).filename(suffix)), "").unwrap();
        }
    }

    #[test]
    fn test_resume_window_selection() {
        let dir = TestDir::new();
        let segment_dir = dir.subdir("all_ct_segments");
        let output_dir = dir.subdir("avg");
        touch_windows(&segment_dir, "chr22", 0..6, COMBINED_SEGMENT_SUFFIX);
        touch_windows(&output_dir, "chr22", 0..1, CONSENSUS_SUFFIX);

        // Files that do not follow the window naming convention are ignored
        std::fs::write(segment_dir.join("notes.txt"), "").unwrap();
        std::fs::write(output_dir.join("chr22_1_avg_pred.txt.gz.tmp"), "").unwrap();

        let discovered = discover_windows(&segment_dir, COMBINED_SEGMENT_SUFFIX).unwrap();
        assert_eq!(discovered.len(), 6);

        let pending =
            select_pending_windows(discovered.clone(), &output_dir, CONSENSUS_SUFFIX, false)
                .unwrap();
        let expected = (1..6)
            .map(|i| GenomeWindow::new("chr22", i))
            .collect::<Vec<_>>();
        assert_eq!(pending, expected);

        let pending =
            select_pending_windows(discovered, &output_dir, CONSENSUS_SUFFIX, true).unwrap();
        let expected = (0..6)
            .map(|i| GenomeWindow::new("chr22", i))
            .collect::<Vec<_>>();
        assert_eq!(pending, expected);
    }
}
