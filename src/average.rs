//! Whole-genome representative state maps
//!
//! Each window's consensus is computed independently from the per-sample tables of that window and
//! written as `<chrom>_<index>_avg_pred.txt.gz`. The set of windows comes from the combined segment
//! folder, and windows which already have output are skipped, so an interrupted run can be resumed.
//!

use std::collections::BTreeSet;
use std::error;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;

use crate::cli::{AverageSettings, BaselineSettings, SharedSettings};
use crate::consensus::{ZeroRowPolicy, aggregate_tables, one_hot_table};
use crate::genome_layout::{
    COMBINED_SEGMENT_SUFFIX, CONSENSUS_SUFFIX, GenomeWindow, SAMPLE_PREDICTION_SUFFIX,
};
use crate::run_stats::{WindowRunStats, write_run_stats};
use crate::split_segments::read_window_sample_states;
use crate::state_table::{StateProbTable, TableReadError, read_state_table, write_state_table};
use crate::tsv_utils::{list_dir_subdirnames, read_line_list};
use crate::window_jobs::{
    WindowJobError, WindowOutcome, discover_windows, run_partitioned_jobs, select_pending_windows,
    tally_window_outcomes,
};

const SAMPLE_PREDICTION_DIR_PREFIX: &str = "pred_";

/// Per-sample prediction directory `pred_<sample>` under `pred_dir`
pub fn sample_prediction_dir(pred_dir: &Utf8Path, sample: &str) -> Utf8PathBuf {
    pred_dir.join(format!("{SAMPLE_PREDICTION_DIR_PREFIX}{sample}"))
}

/// Check that the prediction directories found under `pred_dir` match the sample list exactly
///
/// Returns the prediction directory of each sample in sample list order.
///
pub fn get_sample_prediction_dirs(
    pred_dir: &Utf8Path,
    samples: &[String],
) -> Result<Vec<Utf8PathBuf>, String> {
    let found = list_dir_subdirnames(pred_dir)
        .map_err(|e| format!("Can't list prediction directory '{pred_dir}': {e}"))?
        .into_iter()
        .filter_map(|x| {
            x.strip_prefix(SAMPLE_PREDICTION_DIR_PREFIX)
                .map(|s| s.to_string())
        })
        .collect::<BTreeSet<_>>();
    let expected = samples.iter().cloned().collect::<BTreeSet<_>>();

    if found != expected {
        let missing = expected.difference(&found).cloned().collect::<Vec<_>>();
        let extra = found.difference(&expected).cloned().collect::<Vec<_>>();
        return Err(format!(
            "Sample prediction directories in '{pred_dir}' do not match the sample list. Missing: [{}] Unexpected: [{}]",
            missing.join(","),
            extra.join(",")
        ));
    }
    Ok(samples
        .iter()
        .map(|x| sample_prediction_dir(pred_dir, x))
        .collect())
}

fn write_window_table(path: &Utf8Path, table: &StateProbTable) -> Result<(), WindowJobError> {
    write_state_table(path, table).map_err(|source| WindowJobError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Average the per-sample prediction tables of one window
///
/// If the window's table is missing for any sample the window is skipped without output.
///
pub fn average_window(
    window: &GenomeWindow,
    sample_dirs: &[Utf8PathBuf],
    state_count: usize,
    zero_row_policy: ZeroRowPolicy,
    output_dir: &Utf8Path,
) -> Result<WindowOutcome, WindowJobError> {
    let filename = window.filename(SAMPLE_PREDICTION_SUFFIX);
    let sample_paths = sample_dirs
        .iter()
        .map(|x| x.join(&filename))
        .collect::<Vec<_>>();
    if let Some(path) = sample_paths.iter().find(|x| !x.exists()) {
        return Ok(WindowOutcome::MissingInput { path: path.clone() });
    }

    let mut tables = Vec::with_capacity(sample_paths.len());
    for path in sample_paths.iter() {
        match read_state_table(path, state_count) {
            Ok(x) => tables.push(x),
            Err(TableReadError::NotFound { path }) => {
                return Ok(WindowOutcome::MissingInput { path });
            }
            Err(e) => return Err(e.into()),
        }
    }

    let consensus =
        aggregate_tables(&tables, zero_row_policy).map_err(|source| WindowJobError::Consensus {
            window: window.clone(),
            source,
        })?;
    write_window_table(
        &output_dir.join(window.filename(CONSENSUS_SUFFIX)),
        &consensus.table,
    )?;
    Ok(WindowOutcome::Completed {
        degenerate_row_count: consensus.degenerate_row_count,
    })
}

/// Baseline map of one window: the fraction of samples assigned to each state in each bin
///
pub fn baseline_window(
    window: &GenomeWindow,
    segment_dir: &Utf8Path,
    samples: &[String],
    state_count: usize,
    output_dir: &Utf8Path,
) -> Result<WindowOutcome, WindowJobError> {
    let path = segment_dir.join(window.filename(COMBINED_SEGMENT_SUFFIX));
    let sample_states = match read_window_sample_states(&path, samples, state_count) {
        Ok(x) => x,
        Err(TableReadError::NotFound { path }) => {
            return Ok(WindowOutcome::MissingInput { path });
        }
        Err(e) => return Err(e.into()),
    };

    let tables = sample_states
        .iter()
        .map(|x| one_hot_table(x, state_count))
        .collect::<Vec<_>>();
    let consensus = aggregate_tables(&tables, ZeroRowPolicy::Error).map_err(|source| {
        WindowJobError::Consensus {
            window: window.clone(),
            source,
        }
    })?;
    write_window_table(
        &output_dir.join(window.filename(CONSENSUS_SUFFIX)),
        &consensus.table,
    )?;
    Ok(WindowOutcome::Completed {
        degenerate_row_count: consensus.degenerate_row_count,
    })
}

/// Windows of the combined segment folder still lacking consensus output
fn get_pending_windows(
    segment_dir: &Utf8Path,
    output_dir: &Utf8Path,
    replace_existing: bool,
    stats: &mut WindowRunStats,
) -> Result<Vec<GenomeWindow>, Box<dyn error::Error>> {
    let discovered = discover_windows(segment_dir, COMBINED_SEGMENT_SUFFIX)?;
    if discovered.is_empty() {
        return Err(format!("No combined segment window files found in '{segment_dir}'").into());
    }
    stats.discovered_window_count = discovered.len();
    let pending = select_pending_windows(
        discovered,
        output_dir,
        CONSENSUS_SUFFIX,
        replace_existing,
    )?;
    stats.existing_window_count = stats.discovered_window_count - pending.len();
    Ok(pending)
}

fn read_sample_list(path: &Utf8Path) -> Result<Vec<String>, Box<dyn error::Error>> {
    let samples = read_line_list(path)
        .map_err(|e| format!("Can't read sample list file '{path}': {e}"))?;
    if samples.is_empty() {
        return Err(format!("Sample list file '{path}' is empty").into());
    }
    Ok(samples)
}

pub fn run_average(
    shared_settings: &SharedSettings,
    settings: &AverageSettings,
) -> Result<(), Box<dyn error::Error>> {
    let samples = read_sample_list(&settings.sample_list)?;
    let sample_dirs = get_sample_prediction_dirs(&settings.pred_dir, &samples)?;
    info!("Averaging state predictions of {} samples", samples.len());

    let mut stats = WindowRunStats {
        sample_count: samples.len(),
        ..Default::default()
    };
    let pending = get_pending_windows(
        &settings.segment_dir,
        &settings.output_dir,
        settings.replace_existing,
        &mut stats,
    )?;
    info!("Processing {} windows", pending.len());

    let results = run_partitioned_jobs(shared_settings.thread_count, pending, |window| {
        let result = average_window(
            &window,
            &sample_dirs,
            settings.state_count,
            settings.zero_row_policy,
            &settings.output_dir,
        );
        (window, result)
    });
    let result = tally_window_outcomes(results, &mut stats);
    write_run_stats(&settings.output_dir, "average", &stats);
    Ok(result?)
}

pub fn run_baseline(
    shared_settings: &SharedSettings,
    settings: &BaselineSettings,
) -> Result<(), Box<dyn error::Error>> {
    let samples = read_sample_list(&settings.sample_list)?;
    info!("Building baseline state map from {} samples", samples.len());

    let mut stats = WindowRunStats {
        sample_count: samples.len(),
        ..Default::default()
    };
    let pending = get_pending_windows(
        &settings.segment_dir,
        &settings.output_dir,
        settings.replace_existing,
        &mut stats,
    )?;
    info!("Processing {} windows", pending.len());

    let results = run_partitioned_jobs(shared_settings.thread_count, pending, |window| {
        let result = baseline_window(
            &window,
            &settings.segment_dir,
            &samples,
            settings.state_count,
            &settings.output_dir,
        );
        (window, result)
    });
    let result = tally_window_outcomes(results, &mut stats);
    write_run_stats(&settings.output_dir, "baseline", &stats);
    Ok(result?)
}
