//! Differential state maps between the representative maps of two sample groups
//!

use std::error;

use camino::Utf8Path;
use log::info;

use crate::cli::{DiffSettings, SharedSettings};
use crate::consensus::difference_tables;
use crate::genome_layout::{CONSENSUS_SUFFIX, GenomeWindow};
use crate::run_stats::{WindowRunStats, write_run_stats};
use crate::state_table::{TableReadError, read_state_table, write_state_table};
use crate::window_jobs::{
    WindowJobError, WindowOutcome, discover_windows, run_partitioned_jobs, select_pending_windows,
    tally_window_outcomes,
};

/// Write `group1 - group2` for one window
///
/// A window present only in group1 is skipped.
///
pub fn diff_window(
    window: &GenomeWindow,
    group1_dir: &Utf8Path,
    group2_dir: &Utf8Path,
    state_count: usize,
    output_dir: &Utf8Path,
) -> Result<WindowOutcome, WindowJobError> {
    let filename = window.filename(CONSENSUS_SUFFIX);
    let group2_path = group2_dir.join(&filename);
    if !group2_path.exists() {
        return Ok(WindowOutcome::MissingInput { path: group2_path });
    }

    let read_table = |path: &Utf8Path| match read_state_table(path, state_count) {
        Ok(x) => Ok(Some(x)),
        Err(TableReadError::NotFound { .. }) => Ok(None),
        Err(e) => Err(WindowJobError::from(e)),
    };
    let Some(group2_table) = read_table(&group2_path)? else {
        return Ok(WindowOutcome::MissingInput { path: group2_path });
    };
    let group1_path = group1_dir.join(&filename);
    let Some(group1_table) = read_table(&group1_path)? else {
        return Ok(WindowOutcome::MissingInput { path: group1_path });
    };

    let diff_table = difference_tables(&group1_table, &group2_table).map_err(|source| {
        WindowJobError::Consensus {
            window: window.clone(),
            source,
        }
    })?;

    let output_path = output_dir.join(&filename);
    write_state_table(&output_path, &diff_table).map_err(|source| WindowJobError::Io {
        path: output_path,
        source,
    })?;
    Ok(WindowOutcome::Completed {
        degenerate_row_count: 0,
    })
}

pub fn run_diff(
    shared_settings: &SharedSettings,
    settings: &DiffSettings,
) -> Result<(), Box<dyn error::Error>> {
    let discovered = discover_windows(&settings.group1_dir, CONSENSUS_SUFFIX)?;
    if discovered.is_empty() {
        return Err(format!(
            "No representative state map windows found in '{}'",
            settings.group1_dir
        )
        .into());
    }
    let group2_window_count = discover_windows(&settings.group2_dir, CONSENSUS_SUFFIX)?.len();
    if group2_window_count != discovered.len() {
        info!(
            "Group1 has {} windows and group2 has {group2_window_count} windows",
            discovered.len()
        );
    }

    let mut stats = WindowRunStats {
        discovered_window_count: discovered.len(),
        ..Default::default()
    };
    let pending = select_pending_windows(
        discovered,
        &settings.output_dir,
        CONSENSUS_SUFFIX,
        settings.replace_existing,
    )?;
    stats.existing_window_count = stats.discovered_window_count - pending.len();
    info!("Computing differential state maps for {} windows", pending.len());

    let results = run_partitioned_jobs(shared_settings.thread_count, pending, |window| {
        let result = diff_window(
            &window,
            &settings.group1_dir,
            &settings.group2_dir,
            settings.state_count,
            &settings.output_dir,
        );
        (window, result)
    });
    let result = tally_window_outcomes(results, &mut stats);
    write_run_stats(&settings.output_dir, "diff", &stats);
    Ok(result?)
}
