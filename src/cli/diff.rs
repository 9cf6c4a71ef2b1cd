use camino::Utf8PathBuf;
use clap::Args;
use const_format::concatcp;
use simple_error::{SimpleResult, bail};

use super::utils::{check_output_dirname, check_required_dirname};
use crate::state_table::DEFAULT_STATE_COUNT;

#[derive(Args)]
pub struct DiffSettings {
    /// Directory of the representative state map windows of the first sample group
    #[arg(long = "group1-dir", value_name = "DIR")]
    pub group1_dir: Utf8PathBuf,

    /// Directory of the representative state map windows of the second sample group
    #[arg(long = "group2-dir", value_name = "DIR")]
    pub group2_dir: Utf8PathBuf,

    /// Directory for the differential state map windows, each giving group1 minus group2
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_diff_output"))]
    pub output_dir: Utf8PathBuf,

    /// Number of states in the chromatin state model
    #[arg(long, default_value_t = DEFAULT_STATE_COUNT)]
    pub state_count: usize,

    /// Recompute windows which already have output
    #[arg(long)]
    pub replace_existing: bool,
}

pub fn validate_and_fix_diff_settings(settings: DiffSettings) -> SimpleResult<DiffSettings> {
    check_required_dirname(&settings.group1_dir, "group1")?;
    check_required_dirname(&settings.group2_dir, "group2")?;
    check_output_dirname(&settings.output_dir, "output")?;

    if settings.state_count == 0 {
        bail!("--state-count argument must be greater than 0");
    }
    if settings.output_dir == settings.group1_dir || settings.output_dir == settings.group2_dir {
        bail!("--output-dir must be different from both group directories");
    }

    Ok(settings)
}
