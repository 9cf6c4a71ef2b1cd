use camino::Utf8PathBuf;
use clap::Args;
use simple_error::{SimpleResult, bail};

use super::utils::{
    check_optional_filename, check_output_filename, check_required_dirname,
    check_required_filename, output_file_dir, same_file,
};
use crate::state_table::DEFAULT_STATE_COUNT;

#[derive(Args)]
pub struct SummarizeSettings {
    /// Directory of representative state map windows, as written by 'average' or 'baseline'
    #[arg(long = "avg-dir", value_name = "DIR")]
    pub avg_dir: Utf8PathBuf,

    /// Summary segmentation output file. Output is gzip compressed if the name ends in '.gz'
    #[arg(long = "output", value_name = "FILE")]
    pub output_filename: Utf8PathBuf,

    /// Number of states in the chromatin state model
    #[arg(long, default_value_t = DEFAULT_STATE_COUNT)]
    pub state_count: usize,

    /// Write the 9-column BED format with state names and colors used by genome browsers
    ///
    /// Requires --state-annotation.
    ///
    #[arg(long)]
    pub ucsc_format: bool,

    /// Table of state mnemonics and colors, with columns 'state', 'mnemonic' and 'itemRgb'
    #[arg(long, value_name = "FILE")]
    pub state_annotation: Option<Utf8PathBuf>,

    /// Write a browser track definition line with this track name at the top of the output
    #[arg(long, value_name = "NAME")]
    pub track_name: Option<String>,

    /// Order output chromosomes by the configured chromosome list, instead of by name
    #[arg(long)]
    pub genomic_order: bool,
}

impl SummarizeSettings {
    pub fn get_output_dir(&self) -> Utf8PathBuf {
        output_file_dir(&self.output_filename)
    }
}

pub fn validate_and_fix_summarize_settings(
    settings: SummarizeSettings,
) -> SimpleResult<SummarizeSettings> {
    check_required_dirname(&settings.avg_dir, "representative state map")?;
    check_output_filename(&settings.output_filename, "output")?;
    check_optional_filename(settings.state_annotation.as_ref(), "state annotation")?;

    if settings.state_count == 0 {
        bail!("--state-count argument must be greater than 0");
    }
    if settings.ucsc_format && settings.state_annotation.is_none() {
        bail!("--ucsc-format requires a --state-annotation file");
    }
    if settings.track_name.is_some() && !settings.ucsc_format {
        bail!("--track-name can only be used with --ucsc-format");
    }
    if settings
        .track_name
        .as_ref()
        .is_some_and(|x| x.contains('"'))
    {
        bail!("--track-name must not contain double quotes");
    }

    Ok(settings)
}

#[derive(Args)]
pub struct CompressSettings {
    /// Segmentation file with columns chrom, start, end and state. Columns after the first 4 are
    /// ignored.
    #[arg(long = "input", value_name = "FILE")]
    pub input_filename: Utf8PathBuf,

    /// Compressed segmentation output file. Output is gzip compressed if the name ends in '.gz'
    #[arg(long = "output", value_name = "FILE")]
    pub output_filename: Utf8PathBuf,

    /// Number of header lines to skip at the start of the input file
    #[arg(long, default_value_t = 0)]
    pub skip_rows: usize,

    /// Order output chromosomes by the configured chromosome list, instead of by name
    #[arg(long)]
    pub genomic_order: bool,
}

impl CompressSettings {
    pub fn get_output_dir(&self) -> Utf8PathBuf {
        output_file_dir(&self.output_filename)
    }
}

pub fn validate_and_fix_compress_settings(
    settings: CompressSettings,
) -> SimpleResult<CompressSettings> {
    check_required_filename(&settings.input_filename, "segmentation input")?;
    check_output_filename(&settings.output_filename, "output")?;
    if same_file(&settings.input_filename, &settings.output_filename) {
        bail!("--output must be different from --input");
    }
    Ok(settings)
}
