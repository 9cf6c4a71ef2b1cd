mod assembly_map;
mod average;
mod diff;
mod remap;
mod shared;
mod split_segments;
mod summarize;
mod utils;

use camino::Utf8PathBuf;
use chrono::Datelike;
use clap::{Parser, Subcommand};
use simple_error::SimpleResult;

use self::assembly_map::{validate_and_fix_bin_bed_settings, validate_and_fix_reverse_map_settings};
pub use self::assembly_map::{BinBedSettings, ReverseMapSettings};
use self::average::{validate_and_fix_average_settings, validate_and_fix_baseline_settings};
pub use self::average::{AverageSettings, BaselineSettings};
use self::diff::validate_and_fix_diff_settings;
pub use self::diff::DiffSettings;
use self::remap::{validate_and_fix_lift_segments_settings, validate_and_fix_remap_settings};
pub use self::remap::{LiftSegmentsSettings, RemapSettings};
use self::shared::validate_and_fix_shared_settings;
pub use self::shared::SharedSettings;
use self::split_segments::validate_and_fix_split_segments_settings;
pub use self::split_segments::SplitSegmentsSettings;
use self::summarize::{validate_and_fix_compress_settings, validate_and_fix_summarize_settings};
pub use self::summarize::{CompressSettings, SummarizeSettings};

#[derive(Subcommand)]
pub enum Commands {
    /// Split per-sample segmentations into per-window files combining all samples
    SplitSegments(SplitSegmentsSettings),

    /// Average per-sample state predictions into a representative state map
    Average(AverageSettings),

    /// Build a representative state map from the fraction of samples in each state
    Baseline(BaselineSettings),

    /// Write the most probable state of a representative state map as a segmentation
    Summarize(SummarizeSettings),

    /// Sort a segmentation and merge adjacent segments with the same state
    Compress(CompressSettings),

    /// Subtract the representative state maps of two sample groups
    Diff(DiffSettings),

    /// Write the one-bin-per-line BED file used to build a bin map between assemblies
    BinBed(BinBedSettings),

    /// Rewrite a lifted bin map with the origin assembly coordinates first
    ReverseMap(ReverseMapSettings),

    /// Transfer a representative state map to another assembly through a bin map
    Remap(RemapSettings),

    /// Transfer a summary segmentation to another assembly through a bin map
    LiftSegments(LiftSegmentsSettings),
}

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    after_help = format!("Copyright (C) 2021-{}     The {} authors.
This program comes with ABSOLUTELY NO WARRANTY.", chrono::Utc::now().year(), env!("CARGO_PKG_NAME")),
    help_template = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
)]
#[clap(propagate_version = true, rename_all = "kebab_case")]
pub struct Settings {
    #[command(flatten)]
    pub shared: SharedSettings,

    #[command(subcommand)]
    pub command: Commands,
}

impl Settings {
    /// Directory for the log file and run statistics
    ///
    /// Commands writing a single output file use the directory of that file.
    ///
    pub fn get_output_dir(&self) -> Utf8PathBuf {
        match &self.command {
            Commands::SplitSegments(x) => x.output_dir.clone(),
            Commands::Average(x) => x.output_dir.clone(),
            Commands::Baseline(x) => x.output_dir.clone(),
            Commands::Summarize(x) => x.get_output_dir(),
            Commands::Compress(x) => x.get_output_dir(),
            Commands::Diff(x) => x.output_dir.clone(),
            Commands::BinBed(x) => x.get_output_dir(),
            Commands::ReverseMap(x) => x.get_output_dir(),
            Commands::Remap(x) => x.output_dir.clone(),
            Commands::LiftSegments(x) => x.get_output_dir(),
        }
    }
}

/// Validate settings and update parameters that can't be processed by clap
///
pub fn validate_and_fix_settings_impl(mut settings: Settings) -> SimpleResult<Settings> {
    settings.shared = validate_and_fix_shared_settings(settings.shared)?;

    settings.command = match settings.command {
        Commands::SplitSegments(x) => {
            Commands::SplitSegments(validate_and_fix_split_segments_settings(x)?)
        }
        Commands::Average(x) => Commands::Average(validate_and_fix_average_settings(x)?),
        Commands::Baseline(x) => Commands::Baseline(validate_and_fix_baseline_settings(x)?),
        Commands::Summarize(x) => Commands::Summarize(validate_and_fix_summarize_settings(x)?),
        Commands::Compress(x) => Commands::Compress(validate_and_fix_compress_settings(x)?),
        Commands::Diff(x) => Commands::Diff(validate_and_fix_diff_settings(x)?),
        Commands::BinBed(x) => Commands::BinBed(validate_and_fix_bin_bed_settings(x)?),
        Commands::ReverseMap(x) => Commands::ReverseMap(validate_and_fix_reverse_map_settings(x)?),
        Commands::Remap(x) => Commands::Remap(validate_and_fix_remap_settings(x)?),
        Commands::LiftSegments(x) => {
            Commands::LiftSegments(validate_and_fix_lift_segments_settings(x)?)
        }
    };

    Ok(settings)
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_settings(settings: Settings) -> Settings {
    match validate_and_fix_settings_impl(settings) {
        Ok(x) => x,
        Err(msg) => {
            eprintln!("Invalid command-line setting: {msg}");
            std::process::exit(1);
        }
    }
}

pub fn parse_settings() -> Settings {
    Settings::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Settings::command().debug_assert();
    }

    #[test]
    fn test_shared_settings_defaults() {
        let settings = Settings::try_parse_from([
            "csrep",
            "--threads",
            "2",
            "diff",
            "--group1-dir",
            "a",
            "--group2-dir",
            "b",
        ])
        .unwrap();
        // Group directories do not exist
        assert!(validate_and_fix_settings_impl(settings).is_err());

        let settings = Settings::try_parse_from([
            "csrep",
            "compress",
            "--input",
            "in.bed",
            "--output",
            "out/out.bed.gz",
            "--chroms",
            "chr2,chr1",
        ])
        .unwrap();
        assert_eq!(settings.get_output_dir(), "out");
        let layout = settings.shared.genome_layout();
        assert_eq!(layout.chrom_labels, vec!["chr2", "chr1"]);
        assert_eq!(layout.bin_size, 200);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let dir = crate::test_utils::TestDir::new();
        let input = dir.path().join("in.bed");
        std::fs::write(&input, "").unwrap();
        let output = dir.path().join("out.bed");

        let args = |threads: &str| {
            vec![
                "csrep".to_string(),
                "--threads".to_string(),
                threads.to_string(),
                "compress".to_string(),
                "--input".to_string(),
                input.to_string(),
                "--output".to_string(),
                output.to_string(),
            ]
        };
        let settings = Settings::try_parse_from(args("0")).unwrap();
        assert!(validate_and_fix_settings_impl(settings).is_err());

        let settings = Settings::try_parse_from(args("3")).unwrap();
        let settings = validate_and_fix_settings_impl(settings).unwrap();
        assert_eq!(settings.shared.thread_count, 3);
    }
}
