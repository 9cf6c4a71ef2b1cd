use camino::Utf8PathBuf;
use clap::Args;
use const_format::concatcp;
use simple_error::{SimpleResult, bail};

use super::utils::{check_output_dirname, check_required_dirname};

#[derive(Args)]
pub struct SplitSegmentsSettings {
    /// Directory of per-sample segmentation files in 4-column BED format (chrom start end state)
    #[arg(long = "input-dir", value_name = "DIR")]
    pub input_dir: Utf8PathBuf,

    /// Filename suffix of the segmentation files, such as '_18_core_K27ac_segments.bed.gz'
    ///
    /// The sample id is the part of the filename before this suffix.
    ///
    #[arg(long, value_name = "SUFFIX")]
    pub input_suffix: String,

    /// Directory for the per-window combined segmentation files
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_segment_windows"))]
    pub output_dir: Utf8PathBuf,
}

pub fn validate_and_fix_split_segments_settings(
    settings: SplitSegmentsSettings,
) -> SimpleResult<SplitSegmentsSettings> {
    check_required_dirname(&settings.input_dir, "segmentation input")?;
    check_output_dirname(&settings.output_dir, "output")?;

    if settings.input_suffix.is_empty() {
        bail!("--input-suffix argument must not be empty");
    }
    if settings.input_dir == settings.output_dir {
        bail!("--output-dir must be different from --input-dir");
    }

    Ok(settings)
}
