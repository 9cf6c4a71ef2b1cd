//! Genome bin and window coordinate arithmetic
//!
//! All conversions between base-pair positions, bins and windows go through [`GenomeLayout`], so
//! that files written by one step are always read back with identical arithmetic by the next.
//!

use std::fmt;
use std::ops::Range;

use regex::Regex;

pub const DEFAULT_BIN_SIZE: u64 = 200;
pub const DEFAULT_BINS_PER_WINDOW: u64 = 50_000;

/// Chromosome Y is excluded by default because it is not present in every sample
pub const DEFAULT_CHROM_LABELS: [&str; 23] = [
    "chr1", "chr2", "chr3", "chr4", "chr5", "chr6", "chr7", "chr8", "chr9", "chr10", "chr11",
    "chr12", "chr13", "chr14", "chr15", "chr16", "chr17", "chr18", "chr19", "chr20", "chr21",
    "chr22", "chrX",
];

pub const COMBINED_SEGMENT_SUFFIX: &str = "_combined_segment.bed.gz";
pub const SAMPLE_PREDICTION_SUFFIX: &str = "_pred_out.txt.gz";
pub const CONSENSUS_SUFFIX: &str = "_avg_pred.txt.gz";

/// Fixed tiling of the genome into bins and windows of bins
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenomeLayout {
    pub bin_size: u64,
    pub bins_per_window: u64,

    /// Chromosomes included in whole-genome runs, in genomic order
    pub chrom_labels: Vec<String>,
}

impl Default for GenomeLayout {
    fn default() -> Self {
        Self::new(
            DEFAULT_BIN_SIZE,
            DEFAULT_BINS_PER_WINDOW,
            DEFAULT_CHROM_LABELS.iter().map(|x| x.to_string()).collect(),
        )
    }
}

impl GenomeLayout {
    pub fn new(bin_size: u64, bins_per_window: u64, chrom_labels: Vec<String>) -> Self {
        assert!(bin_size > 0);
        assert!(bins_per_window > 0);
        Self {
            bin_size,
            bins_per_window,
            chrom_labels,
        }
    }

    pub fn window_bp(&self) -> u64 {
        self.bin_size * self.bins_per_window
    }

    /// Return the bin index of a bin-aligned position
    ///
    /// Positions which are not a multiple of the bin size give None, so that callers reading
    /// positions from input files can report a parse error instead of silently truncating.
    ///
    pub fn bin_of(&self, position_bp: u64) -> Option<u64> {
        if position_bp % self.bin_size != 0 {
            None
        } else {
            Some(position_bp / self.bin_size)
        }
    }

    pub fn window_of(&self, bin_index: u64) -> u64 {
        bin_index / self.bins_per_window
    }

    pub fn bin_in_window(&self, bin_index: u64) -> usize {
        (bin_index % self.bins_per_window) as usize
    }

    pub fn absolute_bin(&self, window_index: u64, bin_in_window: usize) -> u64 {
        assert!(
            (bin_in_window as u64) < self.bins_per_window,
            "Bin index {bin_in_window} is outside of a {} bin window",
            self.bins_per_window
        );
        window_index * self.bins_per_window + bin_in_window as u64
    }

    pub fn absolute_start_bp(&self, window_index: u64, bin_in_window: usize) -> u64 {
        self.absolute_bin(window_index, bin_in_window) * self.bin_size
    }

    pub fn window_start_bp(&self, window_index: u64) -> u64 {
        window_index * self.window_bp()
    }

    pub fn window_bp_range(&self, window_index: u64) -> Range<u64> {
        let start = self.window_start_bp(window_index);
        start..(start + self.window_bp())
    }

    /// Number of windows needed to cover `bin_count` bins
    pub fn window_count(&self, bin_count: u64) -> u64 {
        bin_count.div_ceil(self.bins_per_window)
    }

    /// Rank of the chromosome in the configured list, if present
    pub fn chrom_rank(&self, chrom: &str) -> Option<usize> {
        self.chrom_labels.iter().position(|x| x == chrom)
    }
}

/// One window of the genome, the unit of per-file parallel output
///
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenomeWindow {
    pub chrom: String,
    pub window_index: u64,
}

impl GenomeWindow {
    pub fn new(chrom: &str, window_index: u64) -> Self {
        Self {
            chrom: chrom.to_string(),
            window_index,
        }
    }

    /// Parse a window label such as `chr9_11`
    ///
    /// The chromosome label itself may contain underscores, so the split is on the last one.
    ///
    pub fn from_label(label: &str) -> Option<Self> {
        let (chrom, index) = label.rsplit_once('_')?;
        if chrom.is_empty() {
            return None;
        }
        let window_index = index.parse::<u64>().ok()?;
        Some(Self::new(chrom, window_index))
    }

    pub fn label(&self) -> String {
        format!("{}_{}", self.chrom, self.window_index)
    }

    pub fn filename(&self, suffix: &str) -> String {
        self.label() + suffix
    }
}

impl fmt::Display for GenomeWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.chrom, self.window_index)
    }
}

/// Matches window-keyed file names such as `chr9_11_avg_pred.txt.gz` for a given suffix
///
pub struct WindowFilenameMatcher {
    re: Regex,
}

impl WindowFilenameMatcher {
    pub fn new(suffix: &str) -> Self {
        let pattern = format!(r"^(chr[^/]+)_(\d+){}$", regex::escape(suffix));
        Self {
            re: Regex::new(&pattern).unwrap(),
        }
    }

    pub fn parse(&self, filename: &str) -> Option<GenomeWindow> {
        let caps = self.re.captures(filename)?;
        let window_index = caps[2].parse::<u64>().ok()?;
        Some(GenomeWindow::new(&caps[1], window_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = GenomeLayout::default();
        assert_eq!(layout.window_bp(), 10_000_000);
        assert_eq!(layout.chrom_labels.len(), 23);
        assert_eq!(layout.chrom_rank("chrX"), Some(22));
        assert_eq!(layout.chrom_rank("chrY"), None);
    }

    #[test]
    fn test_bin_window_arithmetic() {
        let layout = GenomeLayout::default();
        assert_eq!(layout.bin_of(0), Some(0));
        assert_eq!(layout.bin_of(400), Some(2));
        assert_eq!(layout.bin_of(401), None);
        assert_eq!(layout.window_of(49_999), 0);
        assert_eq!(layout.window_of(50_000), 1);
        assert_eq!(layout.bin_in_window(50_003), 3);
        assert_eq!(layout.absolute_start_bp(2, 5), (2 * 50_000 + 5) * 200);
        assert_eq!(layout.window_bp_range(1), 10_000_000..20_000_000);
        assert_eq!(layout.window_count(50_001), 2);
        assert_eq!(layout.window_count(50_000), 1);
    }

    #[test]
    fn test_round_trip_position() {
        let layout = GenomeLayout::new(200, 10, vec!["chr1".to_string()]);
        for bin in [0u64, 9, 10, 123] {
            let pos = bin * 200;
            let b = layout.bin_of(pos).unwrap();
            let w = layout.window_of(b);
            let i = layout.bin_in_window(b);
            assert_eq!(layout.absolute_start_bp(w, i), pos);
        }
    }

    #[test]
    #[should_panic]
    fn test_bin_outside_window_panics() {
        let layout = GenomeLayout::new(200, 10, Vec::new());
        layout.absolute_start_bp(0, 10);
    }

    #[test]
    fn test_window_label() {
        let w = GenomeWindow::from_label("chr9_11").unwrap();
        assert_eq!(w, GenomeWindow::new("chr9", 11));
        assert_eq!(w.label(), "chr9_11");
        assert_eq!(w.to_string(), "chr9_11");
        assert_eq!(
            GenomeWindow::from_label("chrUn_gl000220_3"),
            Some(GenomeWindow::new("chrUn_gl000220", 3))
        );
        assert_eq!(GenomeWindow::from_label("chr9"), None);
        assert_eq!(GenomeWindow::from_label("_3"), None);
    }

    #[test]
    fn test_window_filename_matcher() {
        let m = WindowFilenameMatcher::new(CONSENSUS_SUFFIX);
        assert_eq!(
            m.parse("chr22_3_avg_pred.txt.gz"),
            Some(GenomeWindow::new("chr22", 3))
        );
        assert_eq!(m.parse("chr22_3_avg_pred.txt.gz.tmp"), None);
        assert_eq!(m.parse("chr22_3_pred_out.txt.gz"), None);
        assert_eq!(m.parse("x22_3_avg_pred.txt.gz"), None);
    }

    #[test]
    fn test_window_order() {
        let mut windows = vec![
            GenomeWindow::new("chr2", 0),
            GenomeWindow::new("chr10", 1),
            GenomeWindow::new("chr10", 0),
        ];
        windows.sort();
        assert_eq!(
            windows,
            vec![
                GenomeWindow::new("chr10", 0),
                GenomeWindow::new("chr10", 1),
                GenomeWindow::new("chr2", 0),
            ]
        );
    }
}
