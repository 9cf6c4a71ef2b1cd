//! Transfer a summary segmentation to another genome assembly through the bin map
//!
//! Each mapped origin bin takes the state of the segment covering it, and the resulting destination
//! bins are compressed back into segments. Where a segment boundary falls inside an origin bin, the
//! bin takes the state of the segment covering its start.
//!

use std::collections::HashMap;
use std::error;

use itertools::Itertools;
use log::info;
use thousands::Separable;

use crate::assembly_map::{AssemblyMap, read_assembly_map};
use crate::cli::{LiftSegmentsSettings, SharedSettings};
use crate::genome_layout::GenomeLayout;
use crate::run_stats::{LiftSegmentsStats, write_run_stats};
use crate::segment::{
    Segment, compress_chrom_segments, compress_segments, read_segment_file, write_segment_bed,
};

/// State labels stored once, with bins referring to them by index
#[derive(Default)]
struct StateLabels {
    labels: Vec<String>,
    indexes: HashMap<String, u32>,
}

impl StateLabels {
    fn intern(&mut self, label: String) -> u32 {
        if let Some(&x) = self.indexes.get(&label) {
            return x;
        }
        let x = self.labels.len() as u32;
        self.labels.push(label.clone());
        self.indexes.insert(label, x);
        x
    }

    fn label(&self, index: u32) -> &str {
        &self.labels[index as usize]
    }
}

/// Interval with an interned state label
#[derive(Clone, Copy)]
struct StateInterval {
    start: u64,
    end: u64,
    state: u32,
}

/// Lift `segments` from the origin assembly to the destination assembly of `map`
///
pub fn lift_segments(
    segments: Vec<Segment>,
    map: &AssemblyMap,
    genomic_order: Option<&GenomeLayout>,
) -> (Vec<Segment>, LiftSegmentsStats) {
    let mut stats = LiftSegmentsStats {
        input_segment_count: segments.len(),
        ..Default::default()
    };

    let mut state_labels = StateLabels::default();
    let mut chrom_intervals = segments
        .into_iter()
        .into_group_map_by(|x| x.chrom.clone())
        .into_iter()
        .map(|(chrom, chrom_segments)| {
            let intervals = chrom_segments
                .into_iter()
                .map(|x| StateInterval {
                    start: x.start,
                    end: x.end,
                    state: state_labels.intern(x.state),
                })
                .collect::<Vec<_>>();
            (chrom, intervals)
        })
        .collect::<HashMap<_, _>>();
    for intervals in chrom_intervals.values_mut() {
        intervals.sort_by_key(|x| x.start);
    }

    let mut dest_bins = vec![Vec::new(); map.dest_chrom_count()];
    for chrom in map.origin_chroms() {
        let mappings = map.chrom_mappings(chrom);
        let Some(intervals) = chrom_intervals.get(chrom) else {
            stats.uncovered_bin_count += mappings.len();
            continue;
        };

        // Mappings and segments are both sorted by origin start
        let mut interval_index = 0;
        for m in mappings {
            while interval_index < intervals.len() && intervals[interval_index].end <= m.org_start
            {
                interval_index += 1;
            }
            match intervals.get(interval_index) {
                Some(x) if x.start < m.org_end => {
                    dest_bins[m.dest_chrom_index].push(StateInterval {
                        start: m.dest_start,
                        end: m.dest_end,
                        state: x.state,
                    });
                    stats.mapped_bin_count += 1;
                }
                _ => {
                    stats.uncovered_bin_count += 1;
                }
            }
        }
    }
    drop(chrom_intervals);

    let mut lifted = Vec::new();
    for (dest_chrom_index, mut bins) in dest_bins.into_iter().enumerate() {
        if bins.is_empty() {
            continue;
        }
        bins.sort_by_key(|x| x.start);
        let dest_chrom = map.dest_chrom_label(dest_chrom_index);
        lifted.extend(compress_chrom_segments(bins.into_iter().map(|x| {
            Segment::new(dest_chrom, x.start, x.end, state_labels.label(x.state))
        })));
    }

    let lifted = compress_segments(lifted, genomic_order);
    stats.output_segment_count = lifted.len();
    (lifted, stats)
}

pub fn run_lift_segments(
    shared_settings: &SharedSettings,
    settings: &LiftSegmentsSettings,
) -> Result<(), Box<dyn error::Error>> {
    let layout = shared_settings.genome_layout();

    let segments = read_segment_file(&settings.segment_filename, settings.skip_rows)?;
    info!(
        "Read {} segments from '{}'",
        segments.len(),
        settings.segment_filename
    );
    let map = read_assembly_map(&settings.map_filename, settings.map_orientation)?;
    info!(
        "Read {} bin mappings from '{}'",
        map.mapping_count().separate_with_commas(),
        settings.map_filename
    );

    let (lifted, stats) =
        lift_segments(segments, &map, settings.genomic_order.then_some(&layout));
    info!(
        "Lifted {} bins into {} segments, {} mapped bins were not covered by any segment",
        stats.mapped_bin_count.separate_with_commas(),
        stats.output_segment_count.separate_with_commas(),
        stats.uncovered_bin_count.separate_with_commas()
    );
    write_segment_bed(&settings.output_filename, &lifted)?;

    write_run_stats(&settings.get_output_dir(), "lift-segments", &stats);
    Ok(())
}
