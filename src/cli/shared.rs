use clap::Args;
use simple_error::{SimpleResult, bail};

use crate::genome_layout::{
    DEFAULT_BIN_SIZE, DEFAULT_BINS_PER_WINDOW, DEFAULT_CHROM_LABELS, GenomeLayout,
};

/// Worker count used when --threads is not given, if that many logical cpus are available
const DEFAULT_MAX_THREAD_COUNT: usize = 4;

#[derive(Args)]
pub struct SharedSettings {
    /// Number of threads to use. Defaults to 4, or all logical cpus detected if fewer.
    #[arg(long = "threads", global = true, value_name = "THREAD_COUNT")]
    thread_count_option: Option<usize>,

    /// This value will be filled in by thread_count_option
    #[arg(skip)]
    pub thread_count: usize,

    /// Turn on extra debug logging
    ///
    /// This option enables extra logging intended for debugging only.
    ///
    #[arg(long, global = true)]
    pub debug: bool,

    /// Size of each genomic bin in bases
    ///
    /// All input files must follow the same binning. This should only be changed for testing or
    /// for segmentations from a model trained with a different bin size.
    ///
    #[arg(hide = true, long, global = true, default_value_t = DEFAULT_BIN_SIZE)]
    pub bin_size: u64,

    /// Number of bins in each genome window file
    #[arg(hide = true, long, global = true, default_value_t = DEFAULT_BINS_PER_WINDOW)]
    pub bins_per_window: u64,

    /// Chromosomes to process in whole-genome steps, in genomic order
    ///
    /// Defaults to chr1-chr22 and chrX.
    ///
    #[arg(
        hide = true,
        long = "chroms",
        global = true,
        value_delimiter = ',',
        value_name = "CHROM"
    )]
    pub chrom_labels: Vec<String>,
}

impl SharedSettings {
    pub fn genome_layout(&self) -> GenomeLayout {
        let chrom_labels = if self.chrom_labels.is_empty() {
            DEFAULT_CHROM_LABELS.iter().map(|x| x.to_string()).collect()
        } else {
            self.chrom_labels.clone()
        };
        GenomeLayout::new(self.bin_size, self.bins_per_window, chrom_labels)
    }
}

pub fn validate_and_fix_shared_settings(
    mut settings: SharedSettings,
) -> SimpleResult<SharedSettings> {
    settings.thread_count = match settings.thread_count_option {
        Some(count) => {
            if count == 0 {
                bail!("--threads argument must be greater than 0");
            }
            count
        }
        None => std::cmp::min(DEFAULT_MAX_THREAD_COUNT, num_cpus::get()),
    };

    if settings.bin_size == 0 {
        bail!("--bin-size argument must be greater than 0");
    }
    if settings.bins_per_window == 0 {
        bail!("--bins-per-window argument must be greater than 0");
    }
    if settings.chrom_labels.iter().any(|x| x.is_empty()) {
        bail!("--chroms argument contains an empty chromosome name");
    }

    Ok(settings)
}
