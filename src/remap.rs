//! Remap consensus state tables from an origin assembly to a destination assembly
//!
//! Remapping runs in two passes over the chromosome list, each spread over the worker pool:
//!
//! 1. Mapping pass: every origin chromosome's window tables are joined against the assembly map,
//!    and the remapped rows are written as one fragment file per destination chromosome.
//! 2. Merge pass: every destination chromosome's fragments are concatenated and sorted by
//!    destination start into the final per-chromosome table.
//!
//! The merge pass only starts after all mapping pass workers have finished, because a destination
//! chromosome can receive rows from any origin chromosome. Fragment files are left in the output
//! directory, so that a resumed run can still merge fragments produced by an earlier run. Fragments
//! of an origin chromosome which is mapped again are removed before its mapping pass.
//!

use std::collections::BTreeMap;
use std::error;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use thiserror::Error;
use thousands::Separable;

use crate::assembly_map::{AssemblyMap, read_assembly_map};
use crate::cli::{RemapSettings, SharedSettings};
use crate::genome_layout::{CONSENSUS_SUFFIX, GenomeLayout, GenomeWindow};
use crate::run_stats::{RemapStats, write_run_stats};
use crate::state_table::{
    TableReadError, read_window_table, state_column_labels, write_prob_row,
};
use crate::tsv_utils::{OutputFile, list_dir_filenames, open_input, tsv_reader_builder};
use crate::window_jobs::{discover_windows, run_partitioned_jobs};

pub const REMAPPED_CHROM_SUFFIX: &str = "_liftOver_probState.txt.gz";
const FRAGMENT_SUFFIX: &str = "_prob_state_map.txt.gz";

#[derive(Debug, Error)]
pub enum RemapError {
    #[error(transparent)]
    Table(#[from] TableReadError),

    #[error("Can't access remapped table file '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't parse remapped table file '{path}' at line {line}: {message}")]
    Parse {
        path: Utf8PathBuf,
        line: u64,
        message: String,
    },

    #[error("Assembly map origin bin {chrom}:{start} is not aligned to the {bin_size} bp bin size")]
    UnalignedBin {
        chrom: String,
        start: u64,
        bin_size: u64,
    },
}

pub fn remapped_chrom_filename(chrom: &str) -> String {
    format!("{chrom}{REMAPPED_CHROM_SUFFIX}")
}

fn fragment_filename(org_chrom: &str, dest_chrom: &str) -> String {
    format!("{org_chrom}_to_{dest_chrom}{FRAGMENT_SUFFIX}")
}

/// Get the origin and destination chromosomes of a fragment file name
fn parse_fragment_chroms(filename: &str) -> Option<(&str, &str)> {
    let prefix = filename.strip_suffix(FRAGMENT_SUFFIX)?;
    let (org_chrom, dest_chrom) = prefix.split_once("_to_")?;
    if org_chrom.is_empty() || dest_chrom.is_empty() {
        None
    } else {
        Some((org_chrom, dest_chrom))
    }
}

/// Remove fragments left by earlier runs for origin chromosomes which are about to be mapped again
///
/// Returns the number of removed fragments.
///
fn remove_origin_fragments(output_dir: &Utf8Path, origin_chroms: &[String]) -> io::Result<usize> {
    let mut removed_count = 0;
    for filename in list_dir_filenames(output_dir)? {
        let Some((org_chrom, _)) = parse_fragment_chroms(&filename) else {
            continue;
        };
        if origin_chroms.iter().any(|x| x == org_chrom) {
            std::fs::remove_file(output_dir.join(&filename))?;
            removed_count += 1;
        }
    }
    Ok(removed_count)
}

/// State probability rows for bins of a single destination chromosome
///
/// On disk the table has the header `chrom start end state_1..state_K`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct ChromProbTable {
    chrom: String,
    state_count: usize,
    bins: Vec<(u64, u64)>,
    values: Vec<f64>,
}

impl ChromProbTable {
    pub fn new(chrom: &str, state_count: usize) -> Self {
        Self {
            chrom: chrom.to_string(),
            state_count,
            bins: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn push_row(&mut self, start: u64, end: u64, row: &[f64]) {
        assert_eq!(row.len(), self.state_count);
        self.bins.push((start, end));
        self.values.extend_from_slice(row);
    }

    pub fn row_count(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Iterate over (start, end, row) tuples
    pub fn rows(&self) -> impl Iterator<Item = (u64, u64, &[f64])> {
        self.bins
            .iter()
            .zip(self.values.chunks_exact(self.state_count))
            .map(|(&(start, end), row)| (start, end, row))
    }

    pub fn append(&mut self, other: Self) {
        assert_eq!(self.chrom, other.chrom);
        assert_eq!(self.state_count, other.state_count);
        self.bins.extend(other.bins);
        self.values.extend(other.values);
    }

    /// Stable sort of rows by start position
    pub fn sort_by_start(&mut self) {
        let mut order = (0..self.bins.len()).collect::<Vec<_>>();
        order.sort_by_key(|&i| self.bins[i].0);
        let mut sorted = Self::new(&self.chrom, self.state_count);
        for i in order {
            let (start, end) = self.bins[i];
            let begin = i * self.state_count;
            sorted.push_row(start, end, &self.values[begin..begin + self.state_count]);
        }
        *self = sorted;
    }

    pub fn write(&self, path: &Utf8Path) -> io::Result<()> {
        let mut f = OutputFile::create(path)?;
        writeln!(
            f,
            "chrom\tstart\tend\t{}",
            state_column_labels(self.state_count).join("\t")
        )?;
        for (start, end, row) in self.rows() {
            write!(f, "{}\t{start}\t{end}\t", self.chrom)?;
            write_prob_row(&mut f, row)?;
            writeln!(f)?;
        }
        f.commit()
    }

    /// Read a table file, requiring that all rows are on `chrom`
    pub fn read(path: &Utf8Path, chrom: &str, state_count: usize) -> Result<Self, RemapError> {
        let io_error = |source| RemapError::Io {
            path: path.to_owned(),
            source,
        };
        let parse_error = |line: u64, message: String| RemapError::Parse {
            path: path.to_owned(),
            line,
            message,
        };

        let mut rdr = tsv_reader_builder(true).from_reader(open_input(path).map_err(io_error)?);
        let header = rdr
            .headers()
            .map_err(|e| parse_error(1, e.to_string()))?
            .clone();
        let expected_header = ["chrom", "start", "end"]
            .into_iter()
            .map(|x| x.to_string())
            .chain(state_column_labels(state_count));
        if !header.iter().eq(expected_header) {
            return Err(parse_error(
                1,
                format!("expected header 'chrom start end state_1 .. state_{state_count}'"),
            ));
        }

        let mut table = Self::new(chrom, state_count);
        let mut row = vec![0f64; state_count];
        for record in rdr.records() {
            let record = record.map_err(|e| parse_error(0, e.to_string()))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.len() != state_count + 3 {
                return Err(parse_error(
                    line,
                    format!("expected {} fields, found {}", state_count + 3, record.len()),
                ));
            }
            if &record[0] != chrom {
                return Err(parse_error(
                    line,
                    format!("found chromosome '{}', expected '{chrom}'", &record[0]),
                ));
            }
            let parse_pos = |s: &str| {
                s.parse::<u64>()
                    .map_err(|_| parse_error(line, format!("invalid position '{s}'")))
            };
            let start = parse_pos(&record[1])?;
            let end = parse_pos(&record[2])?;
            for (v, field) in row.iter_mut().zip(record.iter().skip(3)) {
                *v = field
                    .parse::<f64>()
                    .map_err(|_| parse_error(line, format!("invalid value '{field}'")))?;
            }
            table.push_row(start, end, &row);
        }
        Ok(table)
    }
}

pub struct RemapJob<'a> {
    pub layout: &'a GenomeLayout,
    pub state_count: usize,
    pub input_dir: &'a Utf8Path,
    pub output_dir: &'a Utf8Path,
    pub worker_count: usize,
}

/// Map all window tables of one origin chromosome, writing one fragment per destination chromosome
///
fn map_origin_chrom(
    job: &RemapJob,
    map: &AssemblyMap,
    chrom: &str,
    window_indexes: &[u64],
) -> Result<RemapStats, RemapError> {
    let layout = job.layout;
    let mut stats = RemapStats {
        window_count: window_indexes.len(),
        ..Default::default()
    };
    let mut dest_tables: BTreeMap<&str, ChromProbTable> = BTreeMap::new();
    for &window_index in window_indexes {
        let window = GenomeWindow::new(chrom, window_index);
        let path = job.input_dir.join(window.filename(CONSENSUS_SUFFIX));
        let table = read_window_table(&path, job.state_count, layout.bins_per_window)?;

        let range = layout.window_bp_range(window_index);
        let mut window_mapped_bin_count = 0;
        for m in map.range_mappings(chrom, range.start, range.end) {
            let bin_index = layout
                .bin_of(m.org_start)
                .ok_or_else(|| RemapError::UnalignedBin {
                    chrom: chrom.to_string(),
                    start: m.org_start,
                    bin_size: layout.bin_size,
                })?;
            debug_assert_eq!(layout.window_of(bin_index), window_index);
            let Some(row_index) = table.find_bin(layout.bin_in_window(bin_index)) else {
                continue;
            };
            let dest_chrom = map.dest_chrom_label(m.dest_chrom_index);
            dest_tables
                .entry(dest_chrom)
                .or_insert_with(|| ChromProbTable::new(dest_chrom, job.state_count))
                .push_row(m.dest_start, m.dest_end, table.row(row_index));
            window_mapped_bin_count += 1;
        }
        stats.mapped_bin_count += window_mapped_bin_count;
        stats.unmapped_bin_count += table.row_count() - window_mapped_bin_count;
    }

    // The same-chromosome fragment is always written, so that the merge pass has an input even
    // when nothing maps back onto this chromosome
    if !dest_tables.contains_key(chrom) {
        dest_tables.insert(chrom, ChromProbTable::new(chrom, job.state_count));
    }

    for (dest_chrom, mut table) in dest_tables {
        if table.is_empty() && dest_chrom != chrom {
            continue;
        }
        if dest_chrom == chrom {
            table.sort_by_start();
        }
        let path = job.output_dir.join(fragment_filename(chrom, dest_chrom));
        table.write(&path).map_err(|source| RemapError::Io { path, source })?;
        stats.fragment_count += 1;
    }
    stats.chrom_count = 1;
    Ok(stats)
}

/// Merge all fragments addressed to one destination chromosome into its final table
///
/// Returns the number of rows in the final table.
///
fn merge_dest_chrom(
    job: &RemapJob,
    chrom: &str,
    fragment_filenames: &[String],
) -> Result<usize, RemapError> {
    let mut merged = ChromProbTable::new(chrom, job.state_count);
    for filename in fragment_filenames {
        let path = job.output_dir.join(filename);
        merged.append(ChromProbTable::read(&path, chrom, job.state_count)?);
    }
    merged.sort_by_start();
    let path = job.output_dir.join(remapped_chrom_filename(chrom));
    merged
        .write(&path)
        .map_err(|source| RemapError::Io { path, source })?;
    Ok(merged.row_count())
}

/// Select chromosomes without a final remapped table, unless `rewrite_existing` is set
///
fn select_pending_chroms(
    layout: &GenomeLayout,
    output_dir: &Utf8Path,
    rewrite_existing: bool,
) -> io::Result<Vec<String>> {
    if rewrite_existing {
        return Ok(layout.chrom_labels.clone());
    }
    let existing = list_dir_filenames(output_dir)?;
    let pending = layout
        .chrom_labels
        .iter()
        .filter(|x| !existing.contains(&remapped_chrom_filename(x)))
        .cloned()
        .collect::<Vec<_>>();
    info!(
        "Skipping {} of {} chromosomes with existing remapped output",
        layout.chrom_labels.len() - pending.len(),
        layout.chrom_labels.len()
    );
    Ok(pending)
}

fn first_error<T>(results: Vec<Result<T, RemapError>>) -> Result<Vec<T>, RemapError> {
    results.into_iter().collect()
}

/// Remap all window tables in `job.input_dir` to per-chromosome tables of the destination
/// assembly in `job.output_dir`
///
pub fn remap_consensus_tables(
    job: &RemapJob,
    map: &AssemblyMap,
    rewrite_existing: bool,
) -> Result<RemapStats, RemapError> {
    let io_error = |path: &Utf8Path| {
        let path = path.to_owned();
        move |source| RemapError::Io { path, source }
    };

    let chroms = select_pending_chroms(job.layout, job.output_dir, rewrite_existing)
        .map_err(io_error(job.output_dir))?;

    let mut chrom_windows: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    let windows =
        discover_windows(job.input_dir, CONSENSUS_SUFFIX).map_err(io_error(job.input_dir))?;
    for window in windows {
        chrom_windows
            .entry(window.chrom)
            .or_default()
            .push(window.window_index);
    }

    let removed_count =
        remove_origin_fragments(job.output_dir, &chroms).map_err(io_error(job.output_dir))?;
    if removed_count > 0 {
        info!("Removed {removed_count} remapped fragments of earlier runs");
    }

    info!("Mapping {} origin chromosomes", chroms.len());
    let mapping_results = run_partitioned_jobs(job.worker_count, chroms.clone(), |chrom| {
        let window_indexes = chrom_windows.get(&chrom).map(|x| x.as_slice()).unwrap_or(&[]);
        map_origin_chrom(job, map, &chrom, window_indexes)
    });
    let mut stats = RemapStats::default();
    for x in first_error(mapping_results)? {
        stats.merge(&x);
    }

    let mut dest_fragments: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for filename in list_dir_filenames(job.output_dir).map_err(io_error(job.output_dir))? {
        if let Some((_, dest_chrom)) = parse_fragment_chroms(&filename) {
            dest_fragments
                .entry(dest_chrom.to_string())
                .or_default()
                .push(filename);
        }
    }
    for dest_chrom in dest_fragments.keys() {
        if !job.layout.chrom_labels.contains(dest_chrom) {
            warn!(
                "Remapped bins on destination chromosome '{dest_chrom}' are not merged because the chromosome is not in the chromosome list"
            );
        }
    }

    info!("Merging remapped fragments for {} chromosomes", chroms.len());
    let merge_results = run_partitioned_jobs(job.worker_count, chroms, |chrom| {
        let filenames = dest_fragments.get(&chrom).map(|x| x.as_slice()).unwrap_or(&[]);
        merge_dest_chrom(job, &chrom, filenames)
    });
    stats.output_bin_count = first_error(merge_results)?.into_iter().sum();

    Ok(stats)
}

pub fn run_remap(
    shared_settings: &SharedSettings,
    settings: &RemapSettings,
) -> Result<(), Box<dyn error::Error>> {
    let layout = shared_settings.genome_layout();

    info!("Reading assembly map from '{}'", settings.map_filename);
    let map = read_assembly_map(&settings.map_filename, settings.map_orientation)?;
    info!(
        "Read {} bin mappings",
        map.mapping_count().separate_with_commas()
    );

    let job = RemapJob {
        layout: &layout,
        state_count: settings.state_count,
        input_dir: &settings.input_dir,
        output_dir: &settings.output_dir,
        worker_count: shared_settings.thread_count,
    };
    let stats = remap_consensus_tables(&job, &map, settings.rewrite_existing_chrom)?;
    info!(
        "Remapped {} bins from {} windows, {} input bins had no mapping",
        stats.mapped_bin_count.separate_with_commas(),
        stats.window_count,
        stats.unmapped_bin_count.separate_with_commas()
    );
    write_run_stats(&settings.output_dir, "remap", &stats);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::assembly_map::MapOrientation;
    use crate::state_table::{StateProbTable, write_state_table};
    use crate::test_utils::{TestDir, write_gz};

    fn test_layout(chroms: &[&str]) -> GenomeLayout {
        GenomeLayout::new(200, 5, chroms.iter().map(|x| x.to_string()).collect())
    }

    /// Write window tables for `bin_count` bins of `chrom`, with values identifying each bin
    fn write_chrom_windows(
        layout: &GenomeLayout,
        dir: &Utf8Path,
        chrom: &str,
        bin_count: u64,
    ) -> Vec<Vec<f64>> {
        let mut all_rows = Vec::new();
        for window_index in 0..layout.window_count(bin_count) {
            let first_bin = window_index * layout.bins_per_window;
            let last_bin = std::cmp::min(first_bin + layout.bins_per_window, bin_count);
            let rows = (first_bin..last_bin)
                .map(|b| {
                    let x = (b + 1) as f64 / 100.0;
                    vec![x, 1.0 - x]
                })
                .collect::<Vec<_>>();
            let window = GenomeWindow::new(chrom, window_index);
            write_state_table(
                &dir.join(window.filename(CONSENSUS_SUFFIX)),
                &StateProbTable::from_rows(2, &rows),
            )
            .unwrap();
            all_rows.extend(rows);
        }
        all_rows
    }

    fn write_map(path: &Utf8Path, lines: &[String]) {
        write_gz(path, &(lines.join("\n") + "\n"));
    }

    fn table_rows(table: &ChromProbTable) -> Vec<(u64, Vec<f64>)> {
        table.rows().map(|(s, _, r)| (s, r.to_vec())).collect()
    }

    #[test]
    fn test_parse_fragment_chroms() {
        assert_eq!(
            parse_fragment_chroms("chr1_to_chr11_prob_state_map.txt.gz"),
            Some(("chr1", "chr11"))
        );
        assert_eq!(parse_fragment_chroms("chr1_liftOver_probState.txt.gz"), None);
        assert_eq!(parse_fragment_chroms("_to_chr1_prob_state_map.txt.gz"), None);
    }

    #[test]
    fn test_identity_remap_round_trip() {
        let dir = TestDir::new();
        let input_dir = dir.subdir("avg");
        let output_dir = dir.subdir("remap");
        let layout = test_layout(&["chr1", "chr2"]);

        let bin_count = 8;
        let input_rows = write_chrom_windows(&layout, &input_dir, "chr1", bin_count);

        // Identity map, listed in reverse order
        let map_path = dir.path().join("map.bed.gz");
        let lines = (0..bin_count)
            .rev()
            .map(|b| {
                let (s, e) = (b * 200, b * 200 + 200);
                format!("chr1\t{s}\t{e}\tchr1_{s}_{e}")
            })
            .collect::<Vec<_>>();
        write_map(&map_path, &lines);
        let map = read_assembly_map(&map_path, MapOrientation::DestFirst).unwrap();

        let job = RemapJob {
            layout: &layout,
            state_count: 2,
            input_dir: &input_dir,
            output_dir: &output_dir,
            worker_count: 2,
        };
        let stats = remap_consensus_tables(&job, &map, false).unwrap();
        assert_eq!(stats.chrom_count, 2);
        assert_eq!(stats.window_count, 2);
        assert_eq!(stats.mapped_bin_count, 8);
        assert_eq!(stats.unmapped_bin_count, 0);
        assert_eq!(stats.output_bin_count, 8);

        let output = ChromProbTable::read(
            &output_dir.join(remapped_chrom_filename("chr1")),
            "chr1",
            2,
        )
        .unwrap();
        let expected = input_rows
            .into_iter()
            .enumerate()
            .map(|(b, row)| (b as u64 * 200, row))
            .collect::<Vec<_>>();
        assert_eq!(table_rows(&output), expected);

        // A chromosome without input still gets an empty final table
        let chr2 = ChromProbTable::read(
            &output_dir.join(remapped_chrom_filename("chr2")),
            "chr2",
            2,
        )
        .unwrap();
        assert!(chr2.is_empty());

        // Everything is skipped on a resumed run
        let stats = remap_consensus_tables(&job, &map, false).unwrap();
        assert_eq!(stats.chrom_count, 0);
    }

    #[test]
    fn test_cross_chrom_fragment_reassembly() {
        let dir = TestDir::new();
        let input_dir = dir.subdir("avg");
        let output_dir = dir.subdir("remap");
        let layout = test_layout(&["chr1", "chrA", "chrB"]);

        let bin_count = 10;
        write_chrom_windows(&layout, &input_dir, "chr1", bin_count);

        // First half of chr1 maps in reverse onto chrA, second half onto chrB
        let map_path = dir.path().join("map.bed.gz");
        let lines = (0..bin_count)
            .map(|b| {
                let (s, e) = (b * 200, b * 200 + 200);
                if b < 5 {
                    let ds = (4 - b) * 200 + 10_000;
                    format!("chrA\t{ds}\t{}\tchr1_{s}_{e}", ds + 200)
                } else {
                    format!("chrB\t{s}\t{e}\tchr1_{s}_{e}")
                }
            })
            .collect::<Vec<_>>();
        write_map(&map_path, &lines);
        let map = read_assembly_map(&map_path, MapOrientation::DestFirst).unwrap();

        let job = RemapJob {
            layout: &layout,
            state_count: 2,
            input_dir: &input_dir,
            output_dir: &output_dir,
            worker_count: 3,
        };
        let stats = remap_consensus_tables(&job, &map, false).unwrap();
        assert_eq!(stats.mapped_bin_count, 10);
        assert_eq!(stats.output_bin_count, 10);

        let mut total_rows = 0;
        for chrom in ["chrA", "chrB"] {
            let table = ChromProbTable::read(
                &output_dir.join(remapped_chrom_filename(chrom)),
                chrom,
                2,
            )
            .unwrap();
            assert_eq!(table.row_count(), 5);
            assert!(table.bins.is_sorted_by_key(|x| x.0));
            total_rows += table.row_count();
        }
        assert_eq!(total_rows, bin_count as usize);

        // Reversed mapping onto chrA: lowest destination start carries the last origin bin
        let chr_a = ChromProbTable::read(
            &output_dir.join(remapped_chrom_filename("chrA")),
            "chrA",
            2,
        )
        .unwrap();
        let (start, _, row) = chr_a.rows().next().unwrap();
        assert_eq!(start, 10_000);
        assert_eq!(row, &[0.05, 1.0 - 0.05]);

        let chr1 = ChromProbTable::read(
            &output_dir.join(remapped_chrom_filename("chr1")),
            "chr1",
            2,
        )
        .unwrap();
        assert!(chr1.is_empty());
    }

    #[test]
    fn test_rewrite_drops_fragments_of_earlier_run() {
        let dir = TestDir::new();
        let input_dir = dir.subdir("avg");
        let output_dir = dir.subdir("remap");
        let layout = test_layout(&["chr1", "chr2"]);

        let bin_count = 4;
        write_chrom_windows(&layout, &input_dir, "chr1", bin_count);
        let map_lines = |dest_chrom: &str| {
            (0..bin_count)
                .map(|b| {
                    let (s, e) = (b * 200, b * 200 + 200);
                    format!("{dest_chrom}\t{s}\t{e}\tchr1_{s}_{e}")
                })
                .collect::<Vec<_>>()
        };
        let job = RemapJob {
            layout: &layout,
            state_count: 2,
            input_dir: &input_dir,
            output_dir: &output_dir,
            worker_count: 2,
        };

        // First run maps all of chr1 onto chr2
        let map_path = dir.path().join("map1.bed.gz");
        write_map(&map_path, &map_lines("chr2"));
        let map = read_assembly_map(&map_path, MapOrientation::DestFirst).unwrap();
        remap_consensus_tables(&job, &map, false).unwrap();
        assert!(output_dir.join(fragment_filename("chr1", "chr2")).exists());

        // Second run with the identity map replaces everything from the first run
        let map_path = dir.path().join("map2.bed.gz");
        write_map(&map_path, &map_lines("chr1"));
        let map = read_assembly_map(&map_path, MapOrientation::DestFirst).unwrap();
        let stats = remap_consensus_tables(&job, &map, true).unwrap();
        assert_eq!(stats.mapped_bin_count, 4);
        assert_eq!(stats.output_bin_count, 4);
        assert!(!output_dir.join(fragment_filename("chr1", "chr2")).exists());

        let read_chrom = |chrom: &str| {
            ChromProbTable::read(&output_dir.join(remapped_chrom_filename(chrom)), chrom, 2)
                .unwrap()
        };
        assert_eq!(read_chrom("chr1").row_count(), 4);
        assert!(read_chrom("chr2").is_empty());
    }

    #[test]
    fn test_unaligned_map_bin() {
        let dir = TestDir::new();
        let input_dir = dir.subdir("avg");
        let output_dir = dir.subdir("remap");
        let layout = test_layout(&["chr1"]);
        write_chrom_windows(&layout, &input_dir, "chr1", 3);

        let map_path = dir.path().join("map.bed.gz");
        write_map(&map_path, &["chr1\t0\t200\tchr1_50_250".to_string()]);
        let map = read_assembly_map(&map_path, MapOrientation::DestFirst).unwrap();

        let job = RemapJob {
            layout: &layout,
            state_count: 2,
            input_dir: &input_dir,
            output_dir: &output_dir,
            worker_count: 1,
        };
        assert!(matches!(
            remap_consensus_tables(&job, &map, false),
            Err(RemapError::UnalignedBin { start: 50, .. })
        ));
    }
}
