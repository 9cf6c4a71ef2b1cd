//! Per-window bin × state probability tables
//!
//! On disk a table is tab-separated with the header `state_1..state_K` and one row per bin in
//! ascending bin order. Older files may carry an extra leading row-label column, which is detected
//! from the header.
//!

use std::collections::HashSet;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::tsv_utils::{OutputFile, open_input, tsv_reader_builder};

pub const DEFAULT_STATE_COUNT: usize = 18;

#[derive(Debug, Error)]
pub enum TableReadError {
    #[error("Table file does not exist: '{path}'")]
    NotFound { path: Utf8PathBuf },

    #[error("Unexpected column layout in table '{path}': {message}")]
    Schema { path: Utf8PathBuf, message: String },

    #[error("Can't parse table '{path}' at line {line}: {message}")]
    Parse {
        path: Utf8PathBuf,
        line: u64,
        message: String,
    },

    #[error("Can't read table '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Canonical state column labels `state_1..state_K`
pub fn state_column_labels(state_count: usize) -> Vec<String> {
    (1..=state_count).map(|x| format!("state_{x}")).collect()
}

/// Bins × states matrix of state assignment probabilities (or one-hot state calls)
///
/// Each row carries its window-relative bin index explicitly, so that row position is never the
/// only record of genomic position once a table is in memory.
///
#[derive(Clone, Debug, PartialEq)]
pub struct StateProbTable {
    state_count: usize,
    bin_indexes: Vec<usize>,
    values: Vec<f64>,
}

impl StateProbTable {
    pub fn new(state_count: usize) -> Self {
        assert!(state_count > 0);
        Self {
            state_count,
            bin_indexes: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Table with rows at positional bin indexes `0..rows.len()`
    pub fn from_rows(state_count: usize, rows: &[Vec<f64>]) -> Self {
        let mut table = Self::new(state_count);
        for (bin_index, row) in rows.iter().enumerate() {
            table.push_row(bin_index, row);
        }
        table
    }

    pub fn push_row(&mut self, bin_index: usize, row: &[f64]) {
        assert_eq!(row.len(), self.state_count);
        self.bin_indexes.push(bin_index);
        self.values.extend_from_slice(row);
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn row_count(&self) -> usize {
        self.bin_indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bin_indexes.is_empty()
    }

    pub fn bin_indexes(&self) -> &[usize] {
        &self.bin_indexes
    }

    pub fn row(&self, row_index: usize) -> &[f64] {
        let start = row_index * self.state_count;
        &self.values[start..start + self.state_count]
    }

    /// Iterate over (bin_index, row) pairs
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[f64])> {
        self.bin_indexes
            .iter()
            .copied()
            .zip(self.values.chunks_exact(self.state_count))
    }

    /// Find the row of a window-relative bin index
    ///
    /// Uses binary search when bin indexes are sorted, which is the normal case.
    ///
    pub fn find_bin(&self, bin_index: usize) -> Option<usize> {
        if self.bin_indexes.is_sorted() {
            self.bin_indexes.binary_search(&bin_index).ok()
        } else {
            self.bin_indexes.iter().position(|&x| x == bin_index)
        }
    }
}

/// Column layout of a state table, as detected from its header
#[derive(Debug, PartialEq)]
enum TableLayout {
    StatesOnly,
    RowLabelColumn,
}

fn detect_table_layout(
    header: &csv::StringRecord,
    state_count: usize,
) -> Result<TableLayout, String> {
    let expected = state_column_labels(state_count);
    let matches_states =
        |fields: &[&str]| fields.iter().copied().eq(expected.iter().map(|x| x.as_str()));

    let fields = header.iter().collect::<Vec<_>>();
    if matches_states(&fields) {
        Ok(TableLayout::StatesOnly)
    } else if fields.len() == state_count + 1 && matches_states(&fields[1..]) {
        Ok(TableLayout::RowLabelColumn)
    } else {
        Err(format!(
            "expected header 'state_1' .. 'state_{state_count}', optionally after one row label column, but found {} columns starting with '{}'",
            fields.len(),
            fields.first().copied().unwrap_or("")
        ))
    }
}

/// Parse one probability field. Empty fields are the missing value representation used by
/// earlier table writers, and are read as NaN.
fn parse_prob_field(field: &str) -> Option<f64> {
    if field.is_empty() {
        Some(f64::NAN)
    } else {
        field.parse::<f64>().ok()
    }
}

/// Read a state table, validating its columns against `state_count`
///
/// Row order is preserved exactly as found in the file.
///
pub fn read_state_table(
    path: &Utf8Path,
    state_count: usize,
) -> Result<StateProbTable, TableReadError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            TableReadError::NotFound {
                path: path.to_owned(),
            }
        } else {
            TableReadError::Io {
                path: path.to_owned(),
                source,
            }
        }
    };
    let parse_error = |line: u64, message: String| TableReadError::Parse {
        path: path.to_owned(),
        line,
        message,
    };

    let input = open_input(path).map_err(io_error)?;
    let mut rdr = tsv_reader_builder(true).from_reader(input);

    let header = rdr.headers().map_err(|e| parse_error(1, e.to_string()))?.clone();
    let layout = detect_table_layout(&header, state_count).map_err(|message| {
        TableReadError::Schema {
            path: path.to_owned(),
            message,
        }
    })?;

    let first_value_column = match layout {
        TableLayout::StatesOnly => 0,
        TableLayout::RowLabelColumn => 1,
    };

    let mut table = StateProbTable::new(state_count);
    let mut row_labels = Vec::new();
    let mut row = vec![0f64; state_count];
    let mut record = csv::StringRecord::new();
    let mut row_index = 0;
    loop {
        match rdr.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                return Err(parse_error(line, e.to_string()));
            }
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != state_count + first_value_column {
            return Err(parse_error(
                line,
                format!(
                    "expected {} fields but found {}",
                    state_count + first_value_column,
                    record.len()
                ),
            ));
        }
        if layout == TableLayout::RowLabelColumn {
            row_labels.push(record[0].to_string());
        }
        for (state_index, field) in record.iter().skip(first_value_column).enumerate() {
            row[state_index] = parse_prob_field(field)
                .ok_or_else(|| parse_error(line, format!("invalid value '{field}'")))?;
        }
        table.push_row(row_index, &row);
        row_index += 1;
    }

    // Integer row labels are the bin indexes, anything else leaves rows positional
    if !row_labels.is_empty() {
        let label_bins = row_labels
            .iter()
            .map(|x| x.parse::<usize>())
            .collect::<Result<Vec<_>, _>>();
        if let Ok(label_bins) = label_bins {
            let mut seen = HashSet::new();
            if let Some(bin_index) = label_bins.iter().find(|&&x| !seen.insert(x)) {
                return Err(TableReadError::Schema {
                    path: path.to_owned(),
                    message: format!("row label {bin_index} is repeated"),
                });
            }
            table.bin_indexes = label_bins;
        }
    }

    Ok(table)
}

/// Read the table of one genome window, rejecting bin indexes outside of the window
///
pub fn read_window_table(
    path: &Utf8Path,
    state_count: usize,
    bins_per_window: u64,
) -> Result<StateProbTable, TableReadError> {
    let table = read_state_table(path, state_count)?;
    if let Some(bin_index) = table
        .bin_indexes()
        .iter()
        .find(|&&x| x as u64 >= bins_per_window)
    {
        return Err(TableReadError::Schema {
            path: path.to_owned(),
            message: format!("bin index {bin_index} is outside of a {bins_per_window} bin window"),
        });
    }
    Ok(table)
}

/// Write a state table with a `state_1..state_K` header
///
/// Rows at bin indexes `0..n` are written without a row label column. Any other bin indexes are
/// written as a leading row label column, so that they are read back unchanged.
///
pub fn write_state_table(path: &Utf8Path, table: &StateProbTable) -> io::Result<()> {
    let positional = table
        .bin_indexes()
        .iter()
        .enumerate()
        .all(|(i, &b)| i == b);
    let header = state_column_labels(table.state_count()).join("\t");

    let mut f = OutputFile::create(path)?;
    if positional {
        writeln!(f, "{header}")?;
    } else {
        writeln!(f, "\t{header}")?;
    }
    for (bin_index, row) in table.rows() {
        if !positional {
            write!(f, "{bin_index}\t")?;
        }
        write_prob_row(&mut f, row)?;
        writeln!(f)?;
    }
    f.commit()
}

/// Write tab-separated probability values without a trailing newline
pub fn write_prob_row(f: &mut impl Write, row: &[f64]) -> io::Result<()> {
    for (i, v) in row.iter().enumerate() {
        if i > 0 {
            write!(f, "\t")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{TestDir, read_text, write_gz};

    #[test]
    fn test_state_column_labels() {
        assert_eq!(state_column_labels(3), vec!["state_1", "state_2", "state_3"]);
    }

    #[test]
    fn test_read_plain_layout() {
        let dir = TestDir::new();
        let path = dir.path().join("chr1_0_pred_out.txt.gz");
        write_gz(&path, "state_1\tstate_2\n0.25\t0.75\n1\t0\n");

        let table = read_state_table(&path, 2).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.bin_indexes(), &[0, 1]);
        assert_eq!(table.row(0), &[0.25, 0.75]);
        assert_eq!(table.row(1), &[1.0, 0.0]);
    }

    #[test]
    fn test_read_row_label_layout() {
        let dir = TestDir::new();

        // Integer row labels become the bin indexes
        let path = dir.path().join("indexed.txt");
        std::fs::write(&path, "\tstate_1\tstate_2\n4\t0.5\t0.5\n5\t0.1\t0.9\n").unwrap();
        let table = read_state_table(&path, 2).unwrap();
        assert_eq!(table.bin_indexes(), &[4, 5]);
        assert_eq!(table.row(1), &[0.1, 0.9]);
        assert_eq!(table.find_bin(5), Some(1));
        assert_eq!(table.find_bin(0), None);

        // Other labels leave rows positional
        let path = dir.path().join("labeled.txt");
        std::fs::write(&path, "pos\tstate_1\tstate_2\na\t0.5\t0.5\nb\t0.1\t0.9\n").unwrap();
        let table = read_state_table(&path, 2).unwrap();
        assert_eq!(table.bin_indexes(), &[0, 1]);
    }

    #[test]
    fn test_schema_error() {
        let dir = TestDir::new();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "state_2\tstate_1\n0.5\t0.5\n").unwrap();
        assert!(matches!(
            read_state_table(&path, 2),
            Err(TableReadError::Schema { .. })
        ));

        // Correct columns for the wrong state count
        std::fs::write(&path, "state_1\tstate_2\n0.5\t0.5\n").unwrap();
        assert!(matches!(
            read_state_table(&path, 3),
            Err(TableReadError::Schema { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_distinct() {
        let dir = TestDir::new();
        let path = dir.path().join("missing.txt.gz");
        assert!(matches!(
            read_state_table(&path, 2),
            Err(TableReadError::NotFound { .. })
        ));
    }

    #[test]
    fn test_parse_errors() {
        let dir = TestDir::new();
        let path = dir.path().join("ragged.txt");
        std::fs::write(&path, "state_1\tstate_2\n0.5\t0.5\n0.5\n").unwrap();
        match read_state_table(&path, 2) {
            Err(TableReadError::Parse { line, .. }) => assert_eq!(line, 3),
            _ => panic!("expected parse error"),
        }

        std::fs::write(&path, "state_1\tstate_2\n0.5\tx\n").unwrap();
        assert!(matches!(
            read_state_table(&path, 2),
            Err(TableReadError::Parse { .. })
        ));
    }

    #[test]
    fn test_empty_field_is_nan() {
        let dir = TestDir::new();
        let path = dir.path().join("nan.txt");
        std::fs::write(&path, "state_1\tstate_2\n\t\n").unwrap();
        let table = read_state_table(&path, 2).unwrap();
        assert!(table.row(0).iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let dir = TestDir::new();
        let path = dir.path().join("chr1_0_avg_pred.txt.gz");
        let table = StateProbTable::from_rows(
            3,
            &[vec![0.1, 0.2, 0.7], vec![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]],
        );
        write_state_table(&path, &table).unwrap();

        let content = read_text(&path);
        assert!(content.starts_with("state_1\tstate_2\tstate_3\n0.1\t0.2\t0.7\n"));

        let reread = read_state_table(&path, 3).unwrap();
        assert_eq!(reread, table);
    }

    #[test]
    fn test_repeated_row_label_rejected() {
        let dir = TestDir::new();
        let path = dir.path().join("repeated.txt");
        std::fs::write(&path, "\tstate_1\tstate_2\n4\t0.5\t0.5\n4\t0.1\t0.9\n").unwrap();
        assert!(matches!(
            read_state_table(&path, 2),
            Err(TableReadError::Schema { .. })
        ));
    }

    #[test]
    fn test_read_window_table_bin_range() {
        let dir = TestDir::new();
        let path = dir.path().join("chr1_0_avg_pred.txt.gz");
        write_gz(&path, "\tstate_1\tstate_2\n2\t0.5\t0.5\n3\t0.1\t0.9\n");
        assert!(matches!(
            read_window_table(&path, 2, 3),
            Err(TableReadError::Schema { .. })
        ));
        assert_eq!(read_window_table(&path, 2, 4).unwrap().bin_indexes(), &[2, 3]);

        // Positional rows beyond the window are rejected too
        write_gz(&path, "state_1\tstate_2\n1\t0\n1\t0\n1\t0\n");
        assert!(read_window_table(&path, 2, 2).is_err());
    }

    #[test]
    fn test_write_sparse_bin_indexes() {
        let dir = TestDir::new();
        let path = dir.path().join("chr1_0_avg_pred.txt.gz");
        let mut table = StateProbTable::new(2);
        table.push_row(4, &[0.5, 0.5]);
        table.push_row(5, &[0.25, 0.75]);
        write_state_table(&path, &table).unwrap();

        assert!(read_text(&path).starts_with("\tstate_1\tstate_2\n4\t0.5\t0.5\n"));
        assert_eq!(read_state_table(&path, 2).unwrap(), table);
    }
}
