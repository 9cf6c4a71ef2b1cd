use camino::Utf8PathBuf;
use clap::Args;
use simple_error::{SimpleResult, bail};

use super::utils::{check_output_filename, check_required_filename, output_file_dir, same_file};

#[derive(Args)]
pub struct BinBedSettings {
    /// Chromosome sizes of the origin assembly, as 'chrom length' or 'chrom 0 length' lines
    #[arg(long = "chrom-lengths", value_name = "FILE")]
    pub chrom_lengths_filename: Utf8PathBuf,

    /// BED file with one line per complete bin, to be lifted over to the destination assembly
    #[arg(long = "output", value_name = "FILE")]
    pub output_filename: Utf8PathBuf,
}

impl BinBedSettings {
    pub fn get_output_dir(&self) -> Utf8PathBuf {
        output_file_dir(&self.output_filename)
    }
}

pub fn validate_and_fix_bin_bed_settings(settings: BinBedSettings) -> SimpleResult<BinBedSettings> {
    check_required_filename(&settings.chrom_lengths_filename, "chromosome length")?;
    check_output_filename(&settings.output_filename, "output")?;
    Ok(settings)
}

#[derive(Args)]
pub struct ReverseMapSettings {
    /// Lifted bin map, with the destination bin coordinates first and the origin bin id last
    #[arg(long = "map", value_name = "FILE")]
    pub map_filename: Utf8PathBuf,

    /// Bin map output file with the origin bin coordinates first and the destination bin id last
    #[arg(long = "output", value_name = "FILE")]
    pub output_filename: Utf8PathBuf,
}

impl ReverseMapSettings {
    pub fn get_output_dir(&self) -> Utf8PathBuf {
        output_file_dir(&self.output_filename)
    }
}

pub fn validate_and_fix_reverse_map_settings(
    settings: ReverseMapSettings,
) -> SimpleResult<ReverseMapSettings> {
    check_required_filename(&settings.map_filename, "bin map")?;
    check_output_filename(&settings.output_filename, "output")?;
    if same_file(&settings.map_filename, &settings.output_filename) {
        bail!("--output must be different from --map");
    }
    Ok(settings)
}
