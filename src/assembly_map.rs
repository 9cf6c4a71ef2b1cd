//! 1:1 bin coordinate map between two genome assemblies
//!
//! The map is produced outside of this tool by lifting over a one-bin-per-row BED file of the
//! origin assembly (see [`write_bin_bed`]) and removing ambiguous mappings. Each line of the lifted
//! file gives a destination bin and the packed id `chrom_start_end` of its origin bin.
//!

use std::collections::{BTreeMap, HashMap};
use std::error;
use std::io::{self, BufRead, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use log::info;
use thiserror::Error;

use crate::cli::{BinBedSettings, ReverseMapSettings, SharedSettings};
use crate::run_stats::{BinFileStats, write_run_stats};
use crate::segment::sort_chrom_labels;
use crate::tsv_utils::{OutputFile, open_input};

#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("Can't access assembly map file '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't parse assembly map file '{path}' at line {line}: {message}")]
    Parse {
        path: Utf8PathBuf,
        line: usize,
        message: String,
    },

    #[error("Origin bin {chrom}:{start} is mapped more than once in assembly map file '{path}'")]
    DuplicateOriginBin {
        path: Utf8PathBuf,
        chrom: String,
        start: u64,
    },
}

/// Column order of an assembly map file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MapOrientation {
    /// `dest_chrom dest_start dest_end orgChrom_orgStart_orgEnd`, as produced by liftOver
    #[default]
    DestFirst,

    /// `org_chrom org_start org_end destChrom_destStart_destEnd`, as written by `reverse-map`
    OriginFirst,
}

/// Parse a packed bin id such as `chr1_200_400`
///
/// The chromosome label may itself contain underscores, so the id is split from the right.
///
pub fn parse_packed_bin(id: &str) -> Option<(&str, u64, u64)> {
    let mut words = id.rsplitn(3, '_');
    let end = words.next()?.parse::<u64>().ok()?;
    let start = words.next()?.parse::<u64>().ok()?;
    let chrom = words.next()?;
    if chrom.is_empty() || end <= start {
        return None;
    }
    Some((chrom, start, end))
}

fn packed_bin(chrom: &str, start: u64, end: u64) -> String {
    format!("{chrom}_{start}_{end}")
}

/// Mapping of one origin bin to its destination bin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinMapping {
    pub org_start: u64,
    pub org_end: u64,

    /// Index into [`AssemblyMap::dest_chrom_label`]
    pub dest_chrom_index: usize,
    pub dest_start: u64,
    pub dest_end: u64,
}

/// Assembly map indexed on origin chromosome, with each chromosome's mappings sorted by origin
/// start
///
#[derive(Debug, Default)]
pub struct AssemblyMap {
    chrom_mappings: BTreeMap<String, Vec<BinMapping>>,
    dest_chrom_labels: Vec<String>,
}

impl AssemblyMap {
    /// Origin chromosomes present in the map, sorted
    pub fn origin_chroms(&self) -> impl Iterator<Item = &str> {
        self.chrom_mappings.keys().map(|x| x.as_str())
    }

    pub fn dest_chrom_label(&self, dest_chrom_index: usize) -> &str {
        &self.dest_chrom_labels[dest_chrom_index]
    }

    pub fn dest_chrom_count(&self) -> usize {
        self.dest_chrom_labels.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.chrom_mappings.values().map(|x| x.len()).sum()
    }

    pub fn chrom_mappings(&self, chrom: &str) -> &[BinMapping] {
        self.chrom_mappings
            .get(chrom)
            .map(|x| x.as_slice())
            .unwrap_or(&[])
    }

    /// Mappings of origin bins starting in `[start, end)` on `chrom`
    pub fn range_mappings(&self, chrom: &str, start: u64, end: u64) -> &[BinMapping] {
        let mappings = self.chrom_mappings(chrom);
        let begin = mappings.partition_point(|x| x.org_start < start);
        let finish = mappings.partition_point(|x| x.org_start < end);
        &mappings[begin..finish]
    }
}

struct AssemblyMapBuilder {
    chrom_mappings: BTreeMap<String, Vec<BinMapping>>,
    dest_chrom_labels: Vec<String>,
    dest_chrom_indexes: HashMap<String, usize>,
}

impl AssemblyMapBuilder {
    fn new() -> Self {
        Self {
            chrom_mappings: BTreeMap::new(),
            dest_chrom_labels: Vec::new(),
            dest_chrom_indexes: HashMap::new(),
        }
    }

    fn add(&mut self, org: (&str, u64, u64), dest: (&str, u64, u64)) {
        let dest_chrom_index = match self.dest_chrom_indexes.get(dest.0) {
            Some(&x) => x,
            None => {
                let x = self.dest_chrom_labels.len();
                self.dest_chrom_labels.push(dest.0.to_string());
                self.dest_chrom_indexes.insert(dest.0.to_string(), x);
                x
            }
        };
        let mapping = BinMapping {
            org_start: org.1,
            org_end: org.2,
            dest_chrom_index,
            dest_start: dest.1,
            dest_end: dest.2,
        };
        if let Some(x) = self.chrom_mappings.get_mut(org.0) {
            x.push(mapping);
        } else {
            self.chrom_mappings.insert(org.0.to_string(), vec![mapping]);
        }
    }

    fn build(mut self, path: &Utf8Path) -> Result<AssemblyMap, MapFileError> {
        for (chrom, mappings) in self.chrom_mappings.iter_mut() {
            mappings.sort_by_key(|x| x.org_start);
            if let Some(w) = mappings.windows(2).find(|w| w[0].org_start == w[1].org_start) {
                return Err(MapFileError::DuplicateOriginBin {
                    path: path.to_owned(),
                    chrom: chrom.clone(),
                    start: w[0].org_start,
                });
            }
        }
        Ok(AssemblyMap {
            chrom_mappings: self.chrom_mappings,
            dest_chrom_labels: self.dest_chrom_labels,
        })
    }
}

/// Read an assembly map file and index it on the origin assembly
///
/// Only the first 4 columns are used. Each origin bin may appear at most once.
///
pub fn read_assembly_map(
    path: &Utf8Path,
    orientation: MapOrientation,
) -> Result<AssemblyMap, MapFileError> {
    let io_error = |source| MapFileError::Io {
        path: path.to_owned(),
        source,
    };
    let parse_error = |line: usize, message: String| MapFileError::Parse {
        path: path.to_owned(),
        line,
        message,
    };

    let mut builder = AssemblyMapBuilder::new();
    for (line_index, line) in open_input(path).map_err(io_error)?.lines().enumerate() {
        let line = line.map_err(io_error)?;
        let line_number = line_index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let words = line.split('\t').collect::<Vec<_>>();
        if words.len() < 4 {
            return Err(parse_error(
                line_number,
                format!("expected at least 4 columns, found {}", words.len()),
            ));
        }
        let parse_pos = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| parse_error(line_number, format!("invalid position '{s}'")))
        };
        let column_bin = (words[0], parse_pos(words[1])?, parse_pos(words[2])?);
        let id_bin = parse_packed_bin(words[3]).ok_or_else(|| {
            parse_error(
                line_number,
                format!("invalid bin id '{}', expected 'chrom_start_end'", words[3]),
            )
        })?;
        match orientation {
            MapOrientation::DestFirst => builder.add(id_bin, column_bin),
            MapOrientation::OriginFirst => builder.add(column_bin, id_bin),
        }
    }
    builder.build(path)
}

/// Write the map indexed on the origin assembly, as `org_chrom org_start org_end
/// destChrom_destStart_destEnd`, sorted by origin chromosome label and start
///
pub fn write_origin_first_map(path: &Utf8Path, map: &AssemblyMap) -> io::Result<()> {
    let mut f = OutputFile::create(path)?;
    for (chrom, mappings) in map.chrom_mappings.iter() {
        for m in mappings {
            writeln!(
                f,
                "{chrom}\t{}\t{}\t{}",
                m.org_start,
                m.org_end,
                packed_bin(map.dest_chrom_label(m.dest_chrom_index), m.dest_start, m.dest_end)
            )?;
        }
    }
    f.commit()
}

/// Read chromosome lengths from a tab-separated file of either `chrom length` or
/// `chrom 0 length` lines
///
pub fn read_chrom_lengths(path: &Utf8Path) -> Result<Vec<(String, u64)>, MapFileError> {
    let io_error = |source| MapFileError::Io {
        path: path.to_owned(),
        source,
    };
    let mut chrom_lengths = Vec::new();
    for (line_index, line) in open_input(path).map_err(io_error)?.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let words = line.split('\t').collect::<Vec<_>>();
        let length_field = match words.len() {
            0 | 1 => None,
            2 => Some(words[1]),
            _ => Some(words[2]),
        };
        let length = length_field
            .and_then(|x| x.trim().parse::<u64>().ok())
            .ok_or_else(|| MapFileError::Parse {
                path: path.to_owned(),
                line: line_index + 1,
                message: "expected 'chrom length' or 'chrom 0 length'".to_string(),
            })?;
        chrom_lengths.push((words[0].to_string(), length));
    }
    Ok(chrom_lengths)
}

/// Write every complete bin of each chromosome as `chrom start end chrom_start_end`
///
/// Chromosomes are written in plain string order. This is the input to the external liftOver step
/// which produces the assembly map.
///
pub fn write_bin_bed(
    path: &Utf8Path,
    chrom_lengths: &[(String, u64)],
    bin_size: u64,
) -> io::Result<u64> {
    assert!(bin_size > 0);
    let lengths = chrom_lengths.iter().cloned().collect::<BTreeMap<_, _>>();
    let mut chroms = lengths.keys().cloned().collect::<Vec<_>>();
    sort_chrom_labels(&mut chroms, None);

    let mut f = OutputFile::create(path)?;
    let mut bin_count = 0;
    for chrom in chroms {
        let chrom_bin_count = lengths[&chrom] / bin_size;
        for bin_index in 0..chrom_bin_count {
            let start = bin_index * bin_size;
            let end = start + bin_size;
            writeln!(f, "{chrom}\t{start}\t{end}\t{}", packed_bin(&chrom, start, end))?;
        }
        bin_count += chrom_bin_count;
    }
    f.commit()?;
    Ok(bin_count)
}

pub fn run_bin_bed(
    shared_settings: &SharedSettings,
    settings: &BinBedSettings,
) -> Result<(), Box<dyn error::Error>> {
    let bin_size = shared_settings.genome_layout().bin_size;
    let chrom_lengths = read_chrom_lengths(&settings.chrom_lengths_filename)?;
    let bin_count = write_bin_bed(&settings.output_filename, &chrom_lengths, bin_size)
        .map_err(|e| format!("Can't write bin file '{}': {e}", settings.output_filename))?;
    info!(
        "Wrote {bin_count} bins of {bin_size} bp for {} chromosomes to '{}'",
        chrom_lengths.len(),
        settings.output_filename
    );

    let stats = BinFileStats {
        chrom_count: chrom_lengths.len(),
        bin_count: bin_count as usize,
    };
    write_run_stats(&settings.get_output_dir(), "bin-bed", &stats);
    Ok(())
}

pub fn run_reverse_map(
    _shared_settings: &SharedSettings,
    settings: &ReverseMapSettings,
) -> Result<(), Box<dyn error::Error>> {
    let map = read_assembly_map(&settings.map_filename, MapOrientation::DestFirst)?;
    write_origin_first_map(&settings.output_filename, &map)
        .map_err(|e| format!("Can't write map file '{}': {e}", settings.output_filename))?;
    info!(
        "Wrote {} bin mappings indexed on the origin assembly to '{}'",
        map.mapping_count(),
        settings.output_filename
    );

    let stats = BinFileStats {
        chrom_count: map.origin_chroms().count(),
        bin_count: map.mapping_count(),
    };
    write_run_stats(&settings.get_output_dir(), "reverse-map", &stats);
    Ok(())
}
