//! Combine per-sample state tables into one normalized state distribution per bin
//!

use clap::ValueEnum;
use thiserror::Error;

use crate::state_table::StateProbTable;

#[derive(Debug, Error, PartialEq)]
pub enum ConsensusError {
    #[error("Input state tables are not aligned: {0}")]
    Alignment(String),

    #[error("Bin {bin_index} has zero total state probability across all samples")]
    DegenerateRow { bin_index: usize },
}

/// Policy for bins where no sample assigns any state probability, so that row normalization is
/// undefined
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ZeroRowPolicy {
    /// Replace the row with the uniform distribution over states
    #[default]
    Uniform,

    /// Fail the aggregation of the enclosing window
    Error,
}

pub struct ConsensusTable {
    pub table: StateProbTable,

    /// Number of rows which could not be normalized (zero or NaN row sum)
    pub degenerate_row_count: usize,
}

/// Check that all tables share state count and bin indexes
fn check_table_alignment(tables: &[&StateProbTable]) -> Result<(), ConsensusError> {
    let Some(first) = tables.first() else {
        return Err(ConsensusError::Alignment("no input tables".to_string()));
    };
    for (table_index, table) in tables.iter().enumerate().skip(1) {
        if table.state_count() != first.state_count() {
            return Err(ConsensusError::Alignment(format!(
                "table {} has {} states, expected {}",
                table_index + 1,
                table.state_count(),
                first.state_count()
            )));
        }
        if table.row_count() != first.row_count() {
            return Err(ConsensusError::Alignment(format!(
                "table {} has {} bins, expected {}",
                table_index + 1,
                table.row_count(),
                first.row_count()
            )));
        }
        if table.bin_indexes() != first.bin_indexes() {
            return Err(ConsensusError::Alignment(format!(
                "table {} covers different bin indexes than table 1",
                table_index + 1
            )));
        }
    }
    Ok(())
}

/// Divide each entry of the row by the row sum
///
/// Returns false if the row sum is zero or not finite, in which case the row is left as-is
///
fn normalize_row(row: &mut [f64]) -> bool {
    let sum = row.iter().sum::<f64>();
    if sum == 0.0 || !sum.is_finite() {
        return false;
    }
    for v in row.iter_mut() {
        *v /= sum;
    }
    true
}

/// Average the state tables of all samples and normalize every bin to sum to one
///
/// Hard state calls given as one-hot tables go through the same path, in which case each output
/// value is the fraction of samples assigned to the state.
///
/// All tables must cover the identical bins. A bin with zero total probability is handled by
/// `zero_row_policy`; a bin with NaN input stays NaN. Both are counted as degenerate.
///
pub fn aggregate_tables(
    tables: &[StateProbTable],
    zero_row_policy: ZeroRowPolicy,
) -> Result<ConsensusTable, ConsensusError> {
    check_table_alignment(&tables.iter().collect::<Vec<_>>())?;

    let first = &tables[0];
    let state_count = first.state_count();
    let sample_count = tables.len() as f64;

    let mut table = StateProbTable::new(state_count);
    let mut mean_row = vec![0f64; state_count];
    let mut degenerate_row_count = 0;
    for (row_index, &bin_index) in first.bin_indexes().iter().enumerate() {
        mean_row.fill(0.0);
        for sample_table in tables {
            for (m, v) in mean_row.iter_mut().zip(sample_table.row(row_index)) {
                *m += v;
            }
        }
        for m in mean_row.iter_mut() {
            *m /= sample_count;
        }

        if !normalize_row(&mut mean_row) {
            degenerate_row_count += 1;
            let is_zero = mean_row.iter().all(|&x| x == 0.0);
            if is_zero {
                match zero_row_policy {
                    ZeroRowPolicy::Uniform => mean_row.fill(1.0 / state_count as f64),
                    ZeroRowPolicy::Error => {
                        return Err(ConsensusError::DegenerateRow { bin_index });
                    }
                }
            }
        }
        table.push_row(bin_index, &mean_row);
    }

    Ok(ConsensusTable {
        table,
        degenerate_row_count,
    })
}

/// Build the one-hot table for a sequence of 0-indexed hard state calls
///
pub fn one_hot_table(states: &[usize], state_count: usize) -> StateProbTable {
    let mut table = StateProbTable::new(state_count);
    let mut row = vec![0f64; state_count];
    for (bin_index, &state) in states.iter().enumerate() {
        assert!(state < state_count);
        row.fill(0.0);
        row[state] = 1.0;
        table.push_row(bin_index, &row);
    }
    table
}

/// Elementwise difference `a - b` of two aligned tables
///
/// Used to compare the representative maps of two sample groups.
///
pub fn difference_tables(
    a: &StateProbTable,
    b: &StateProbTable,
) -> Result<StateProbTable, ConsensusError> {
    check_table_alignment(&[a, b])?;
    let mut table = StateProbTable::new(a.state_count());
    let mut row = vec![0f64; a.state_count()];
    for (row_index, (bin_index, a_row)) in a.rows().enumerate() {
        for ((r, x), y) in row.iter_mut().zip(a_row).zip(b.row(row_index)) {
            *r = x - y;
        }
        table.push_row(bin_index, &row);
    }
    Ok(table)
}

/// Index of the most probable state in each row
///
/// The lowest state index wins ties. Rows without any finite value give None.
///
pub fn argmax_states(table: &StateProbTable) -> Vec<Option<usize>> {
    table
        .rows()
        .map(|(_, row)| {
            let mut best: Option<(usize, f64)> = None;
            for (state_index, &v) in row.iter().enumerate() {
                if !v.is_finite() {
                    continue;
                }
                match best {
                    Some((_, best_v)) if v <= best_v => {}
                    _ => best = Some((state_index, v)),
                }
            }
            best.map(|(state_index, _)| state_index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    #[test]
    fn test_aggregate_rows_sum_to_one() {
        let t1 = StateProbTable::from_rows(3, &[vec![0.2, 0.3, 0.5], vec![0.9, 0.05, 0.05]]);
        let t2 = StateProbTable::from_rows(3, &[vec![0.6, 0.2, 0.2], vec![0.1, 0.1, 0.8]]);
        let t3 = StateProbTable::from_rows(3, &[vec![0.1, 0.1, 0.7], vec![0.3, 0.3, 0.3]]);

        let result = aggregate_tables(&[t1, t2, t3], ZeroRowPolicy::Uniform).unwrap();
        assert_eq!(result.degenerate_row_count, 0);
        assert_eq!(result.table.row_count(), 2);
        for (_, row) in result.table.rows() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }

        // Mean of the first row is (0.3, 0.2, 0.4667), which sums to less than one
        let row = result.table.row(0);
        assert_abs_diff_eq!(row[0] / row[1], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(row[2], 1.4 / 2.9, epsilon = 1e-12);
    }

    #[test]
    fn test_one_hot_baseline_fractions() {
        let t1 = one_hot_table(&[0, 1, 2, 2], 3);
        let t2 = one_hot_table(&[0, 1, 1, 2], 3);
        let t3 = one_hot_table(&[1, 1, 0, 2], 3);
        let t4 = one_hot_table(&[0, 2, 1, 2], 3);

        let result = aggregate_tables(&[t1, t2, t3, t4], ZeroRowPolicy::Error).unwrap();
        let table = &result.table;
        assert_eq!(table.row(0), &[0.75, 0.25, 0.0]);
        assert_eq!(table.row(1), &[0.0, 0.75, 0.25]);
        assert_eq!(table.row(2), &[0.25, 0.5, 0.25]);
        assert_eq!(table.row(3), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_row_count_mismatch() {
        let t1 = StateProbTable::from_rows(2, &[vec![0.5, 0.5], vec![0.5, 0.5]]);
        let t2 = StateProbTable::from_rows(2, &[vec![0.5, 0.5]]);
        assert!(matches!(
            aggregate_tables(&[t1, t2], ZeroRowPolicy::Uniform),
            Err(ConsensusError::Alignment(_))
        ));
    }

    #[test]
    fn test_bin_index_mismatch() {
        let t1 = StateProbTable::from_rows(2, &[vec![0.5, 0.5]]);
        let mut t2 = StateProbTable::new(2);
        t2.push_row(7, &[0.5, 0.5]);
        assert!(matches!(
            aggregate_tables(&[t1, t2], ZeroRowPolicy::Uniform),
            Err(ConsensusError::Alignment(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            aggregate_tables(&[], ZeroRowPolicy::Uniform),
            Err(ConsensusError::Alignment(_))
        ));
    }

    #[test]
    fn test_zero_row_policy() {
        let t1 = StateProbTable::from_rows(4, &[vec![0.0; 4], vec![1.0, 0.0, 0.0, 0.0]]);
        let t2 = StateProbTable::from_rows(4, &[vec![0.0; 4], vec![0.0, 1.0, 0.0, 0.0]]);

        let result = aggregate_tables(&[t1.clone(), t2.clone()], ZeroRowPolicy::Uniform).unwrap();
        assert_eq!(result.degenerate_row_count, 1);
        assert_eq!(result.table.row(0), &[0.25; 4]);
        assert_eq!(result.table.row(1), &[0.5, 0.5, 0.0, 0.0]);

        assert_eq!(
            aggregate_tables(&[t1, t2], ZeroRowPolicy::Error).err(),
            Some(ConsensusError::DegenerateRow { bin_index: 0 })
        );
    }

    #[test]
    fn test_nan_row_is_counted() {
        let t1 = StateProbTable::from_rows(2, &[vec![f64::NAN, f64::NAN]]);
        let t2 = StateProbTable::from_rows(2, &[vec![0.5, 0.5]]);
        let result = aggregate_tables(&[t1, t2], ZeroRowPolicy::Error).unwrap();
        assert_eq!(result.degenerate_row_count, 1);
        assert!(result.table.row(0)[0].is_nan());
    }

    #[test]
    fn test_difference_tables() {
        let a = StateProbTable::from_rows(2, &[vec![0.75, 0.25]]);
        let b = StateProbTable::from_rows(2, &[vec![0.5, 0.5]]);
        let d = difference_tables(&a, &b).unwrap();
        assert_eq!(d.row(0), &[0.25, -0.25]);

        let c = StateProbTable::from_rows(2, &[vec![0.5, 0.5], vec![0.5, 0.5]]);
        assert!(difference_tables(&a, &c).is_err());
    }

    #[test]
    fn test_argmax_states() {
        let t = StateProbTable::from_rows(
            3,
            &[
                vec![0.1, 0.6, 0.3],
                vec![0.4, 0.2, 0.4],
                vec![f64::NAN, f64::NAN, f64::NAN],
                vec![f64::NAN, 0.1, 0.0],
            ],
        );
        assert_eq!(argmax_states(&t), vec![Some(1), Some(0), None, Some(1)]);
    }
}
