use camino::Utf8PathBuf;
use clap::Args;
use const_format::concatcp;
use simple_error::{SimpleResult, bail};

use super::utils::{
    check_output_dirname, check_output_filename, check_required_dirname,
    check_required_filename, output_file_dir, same_file,
};
use crate::assembly_map::MapOrientation;
use crate::state_table::DEFAULT_STATE_COUNT;

#[derive(Args)]
pub struct RemapSettings {
    /// Directory of representative state map windows in the origin assembly
    #[arg(long = "input-dir", value_name = "DIR")]
    pub input_dir: Utf8PathBuf,

    /// One-to-one bin map from the origin assembly to the destination assembly
    #[arg(long = "map", value_name = "FILE")]
    pub map_filename: Utf8PathBuf,

    /// Column order of the bin map file
    #[arg(long, value_enum, default_value_t = MapOrientation::DestFirst)]
    pub map_orientation: MapOrientation,

    /// Directory for the per-chromosome state tables in the destination assembly
    ///
    /// Chromosomes with output already present in this directory are skipped, unless
    /// --rewrite-existing-chrom is given.
    ///
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_remap_output"))]
    pub output_dir: Utf8PathBuf,

    /// Number of states in the chromatin state model
    #[arg(long, default_value_t = DEFAULT_STATE_COUNT)]
    pub state_count: usize,

    /// Remap chromosomes which already have output
    #[arg(long)]
    pub rewrite_existing_chrom: bool,
}

pub fn validate_and_fix_remap_settings(settings: RemapSettings) -> SimpleResult<RemapSettings> {
    check_required_dirname(&settings.input_dir, "representative state map")?;
    check_required_filename(&settings.map_filename, "bin map")?;
    check_output_dirname(&settings.output_dir, "output")?;

    if settings.state_count == 0 {
        bail!("--state-count argument must be greater than 0");
    }
    if settings.input_dir == settings.output_dir {
        bail!("--output-dir must be different from --input-dir");
    }

    Ok(settings)
}

#[derive(Args)]
pub struct LiftSegmentsSettings {
    /// Summary segmentation in the origin assembly, with columns chrom, start, end and state
    #[arg(long = "segments", value_name = "FILE")]
    pub segment_filename: Utf8PathBuf,

    /// One-to-one bin map from the origin assembly to the destination assembly
    #[arg(long = "map", value_name = "FILE")]
    pub map_filename: Utf8PathBuf,

    /// Column order of the bin map file
    #[arg(long, value_enum, default_value_t = MapOrientation::DestFirst)]
    pub map_orientation: MapOrientation,

    /// Segmentation output file in the destination assembly. Output is gzip compressed if the name
    /// ends in '.gz'
    #[arg(long = "output", value_name = "FILE")]
    pub output_filename: Utf8PathBuf,

    /// Number of header lines to skip at the start of the segmentation file, such as a browser
    /// track line
    #[arg(long, default_value_t = 0)]
    pub skip_rows: usize,

    /// Order output chromosomes by the configured chromosome list, instead of by name
    #[arg(long)]
    pub genomic_order: bool,
}

impl LiftSegmentsSettings {
    pub fn get_output_dir(&self) -> Utf8PathBuf {
        output_file_dir(&self.output_filename)
    }
}

pub fn validate_and_fix_lift_segments_settings(
    settings: LiftSegmentsSettings,
) -> SimpleResult<LiftSegmentsSettings> {
    check_required_filename(&settings.segment_filename, "segmentation input")?;
    check_required_filename(&settings.map_filename, "bin map")?;
    check_output_filename(&settings.output_filename, "output")?;
    if same_file(&settings.segment_filename, &settings.output_filename) {
        bail!("--output must be different from --segments");
    }
    Ok(settings)
}
