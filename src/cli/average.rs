use camino::Utf8PathBuf;
use clap::Args;
use const_format::concatcp;
use simple_error::{SimpleResult, bail};

use super::utils::{check_output_dirname, check_required_dirname, check_required_filename};
use crate::consensus::ZeroRowPolicy;
use crate::state_table::DEFAULT_STATE_COUNT;

#[derive(Args)]
pub struct AverageSettings {
    /// Directory for the representative state map windows
    ///
    /// Windows with output already present in this directory are skipped, unless
    /// --replace-existing is given.
    ///
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_average_output"))]
    pub output_dir: Utf8PathBuf,

    /// File listing the samples to combine, one sample id per line
    #[arg(long = "sample-list", value_name = "FILE")]
    pub sample_list: Utf8PathBuf,

    /// Directory of per-window combined segmentation files, used to enumerate genome windows
    #[arg(long = "segment-dir", value_name = "DIR")]
    pub segment_dir: Utf8PathBuf,

    /// Directory holding one 'pred_<sample>' directory of per-window state predictions for each
    /// sample
    #[arg(long = "pred-dir", value_name = "DIR")]
    pub pred_dir: Utf8PathBuf,

    /// Number of states in the chromatin state model
    #[arg(long, default_value_t = DEFAULT_STATE_COUNT)]
    pub state_count: usize,

    /// Handling of bins where no sample assigns any state probability
    #[arg(long, value_enum, default_value_t = ZeroRowPolicy::Uniform)]
    pub zero_row_policy: ZeroRowPolicy,

    /// Recompute windows which already have output
    #[arg(long)]
    pub replace_existing: bool,
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_average_settings(
    settings: AverageSettings,
) -> SimpleResult<AverageSettings> {
    check_required_filename(&settings.sample_list, "sample list")?;
    check_required_dirname(&settings.segment_dir, "combined segment")?;
    check_required_dirname(&settings.pred_dir, "sample prediction")?;
    check_output_dirname(&settings.output_dir, "output")?;

    if settings.state_count == 0 {
        bail!("--state-count argument must be greater than 0");
    }

    Ok(settings)
}

#[derive(Args)]
pub struct BaselineSettings {
    /// Directory for the baseline state map windows
    ///
    /// Windows with output already present in this directory are skipped, unless
    /// --replace-existing is given.
    ///
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_baseline_output"))]
    pub output_dir: Utf8PathBuf,

    /// File listing the samples to combine, one sample id per line
    #[arg(long = "sample-list", value_name = "FILE")]
    pub sample_list: Utf8PathBuf,

    /// Directory of per-window combined segmentation files, as written by 'split-segments'
    #[arg(long = "segment-dir", value_name = "DIR")]
    pub segment_dir: Utf8PathBuf,

    /// Number of states in the chromatin state model
    #[arg(long, default_value_t = DEFAULT_STATE_COUNT)]
    pub state_count: usize,

    /// Recompute windows which already have output
    #[arg(long)]
    pub replace_existing: bool,
}

pub fn validate_and_fix_baseline_settings(
    settings: BaselineSettings,
) -> SimpleResult<BaselineSettings> {
    check_required_filename(&settings.sample_list, "sample list")?;
    check_required_dirname(&settings.segment_dir, "combined segment")?;
    check_output_dirname(&settings.output_dir, "output")?;

    if settings.state_count == 0 {
        bail!("--state-count argument must be greater than 0");
    }

    Ok(settings)
}
