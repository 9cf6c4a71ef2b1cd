//! State annotation table: state index, mnemonic and display color
//!
//! Only used where segments are rendered for a genome browser, never in numeric aggregation.
//!

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::tsv_utils::{open_input, tsv_reader_builder};

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Can't read state annotation file '{path}': {message}")]
    Read { path: Utf8PathBuf, message: String },

    #[error("Invalid state annotation file '{path}': {message}")]
    Format { path: Utf8PathBuf, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateAnnotationEntry {
    pub mnemonic: String,

    /// Color formatted for the BED itemRgb column, e.g. `255,0,0`
    pub rgb: String,
}

/// Annotation of each state, indexed on the 0-based state index
#[derive(Debug)]
pub struct StateAnnotation {
    entries: Vec<StateAnnotationEntry>,
}

impl StateAnnotation {
    pub fn state_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, state_index: usize) -> Option<&StateAnnotationEntry> {
        self.entries.get(state_index)
    }

    /// BED name for the state, e.g. `1_TssA`
    pub fn state_name(&self, state_index: usize) -> Option<String> {
        self.get(state_index)
            .map(|x| format!("{}_{}", state_index + 1, x.mnemonic))
    }
}

/// Convert colors such as `(255, 245, 238)` or `255,245,238` to `255,245,238`
fn normalize_rgb(rgb: &str) -> Option<String> {
    let rgb = rgb.trim().trim_start_matches('(').trim_end_matches(')');
    let values = rgb
        .split(',')
        .map(|x| x.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if values.len() != 3 {
        return None;
    }
    Some(
        values
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Read a tab-separated state annotation table with a header
///
/// Required columns are `state` (1-based index), `mnemonic` (the legacy spelling `mnenomic` is also
/// accepted) and `itemRgb`. Mnemonics may be given either as `TssA` or with the state number
/// prefixed as `1_TssA`, but not a mix of the two.
///
pub fn read_state_annotation(path: &Utf8Path) -> Result<StateAnnotation, AnnotationError> {
    let read_error = |message: String| AnnotationError::Read {
        path: path.to_owned(),
        message,
    };
    let format_error = |message: String| AnnotationError::Format {
        path: path.to_owned(),
        message,
    };

    let input = open_input(path).map_err(|e| read_error(e.to_string()))?;
    let mut rdr = tsv_reader_builder(true).from_reader(input);
    let header = rdr.headers().map_err(|e| read_error(e.to_string()))?.clone();
    let column = |names: &[&str]| {
        header
            .iter()
            .position(|x| names.contains(&x))
            .ok_or_else(|| format_error(format!("missing column '{}'", names[0])))
    };
    let state_col = column(&["state"])?;
    let mnemonic_col = column(&["mnemonic", "mnenomic"])?;
    let rgb_col = column(&["itemRgb"])?;

    let mut raw_entries = BTreeMap::new();
    for (line_index, record) in rdr.records().enumerate() {
        let line = line_index + 2;
        let record = record.map_err(|e| read_error(e.to_string()))?;
        let field = |col: usize| {
            record
                .get(col)
                .ok_or_else(|| format_error(format!("missing field on line {line}")))
        };
        let state = field(state_col)?
            .trim()
            .trim_start_matches('E')
            .parse::<usize>()
            .map_err(|_| format_error(format!("invalid state on line {line}")))?;
        if state == 0 {
            return Err(format_error(format!("state index must be 1 or more on line {line}")));
        }
        let mnemonic = field(mnemonic_col)?.trim().to_string();
        let rgb_field = field(rgb_col)?;
        let rgb = normalize_rgb(rgb_field)
            .ok_or_else(|| format_error(format!("invalid color '{rgb_field}' on line {line}")))?;
        if raw_entries.insert(state, (mnemonic, rgb)).is_some() {
            return Err(format_error(format!("duplicate state {state}")));
        }
    }

    if raw_entries.is_empty() {
        return Err(format_error("no states found".to_string()));
    }
    let state_count = raw_entries.len();
    if raw_entries.keys().copied().ne(1..=state_count) {
        return Err(format_error(format!(
            "states must be numbered 1 to {state_count} without gaps"
        )));
    }

    let component_counts = raw_entries
        .values()
        .map(|(m, _)| m.split('_').count())
        .collect::<std::collections::BTreeSet<_>>();
    if component_counts.len() != 1 {
        return Err(format_error(
            "mnemonics mix the '1_TssA' and 'TssA' forms".to_string(),
        ));
    }
    let strip_prefix = component_counts.first().copied().unwrap_or(1) > 1;

    let entries = raw_entries
        .into_values()
        .map(|(mnemonic, rgb)| {
            let mnemonic = if strip_prefix {
                mnemonic.split('_').skip(1).collect::<String>()
            } else {
                mnemonic
            };
            StateAnnotationEntry { mnemonic, rgb }
        })
        .collect();

    Ok(StateAnnotation { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::TestDir;

    #[test]
    fn test_normalize_rgb() {
        assert_eq!(normalize_rgb("(255, 245, 238)"), Some("255,245,238".to_string()));
        assert_eq!(normalize_rgb("255,0,0"), Some("255,0,0".to_string()));
        assert_eq!(normalize_rgb("255,0"), None);
        assert_eq!(normalize_rgb("red"), None);
    }

    #[test]
    fn test_read_prefixed_mnemonics() {
        let dir = TestDir::new();
        let path = dir.path().join("state_annotation.txt");
        std::fs::write(
            &path,
            "state\tmnenomic\tdescription\titemRgb\n\
             2\t2_TssFlnk\tFlanking TSS\t255,69,0\n\
             1\t1_TssA\tActive TSS\t255,0,0\n",
        )
        .unwrap();

        let annotation = read_state_annotation(&path).unwrap();
        assert_eq!(annotation.state_count(), 2);
        assert_eq!(annotation.state_name(0), Some("1_TssA".to_string()));
        assert_eq!(annotation.state_name(1), Some("2_TssFlnk".to_string()));
        assert_eq!(annotation.get(1).unwrap().rgb, "255,69,0");
        assert_eq!(annotation.state_name(2), None);
    }

    #[test]
    fn test_read_plain_mnemonics() {
        let dir = TestDir::new();
        let path = dir.path().join("state_annotation.txt");
        std::fs::write(&path, "state\tmnemonic\titemRgb\nE1\tTssA\t(255, 0, 0)\n").unwrap();
        let annotation = read_state_annotation(&path).unwrap();
        assert_eq!(annotation.state_name(0), Some("1_TssA".to_string()));
        assert_eq!(annotation.get(0).unwrap().rgb, "255,0,0");
    }

    #[test]
    fn test_invalid_annotation() {
        let dir = TestDir::new();
        let path = dir.path().join("state_annotation.txt");

        std::fs::write(&path, "state\tmnemonic\titemRgb\n1\t1_TssA\t255,0,0\n2\tTx\t0,128,0\n")
            .unwrap();
        assert!(matches!(
            read_state_annotation(&path),
            Err(AnnotationError::Format { .. })
        ));

        std::fs::write(&path, "state\tmnemonic\n1\tTssA\n").unwrap();
        assert!(matches!(
            read_state_annotation(&path),
            Err(AnnotationError::Format { .. })
        ));

        std::fs::write(&path, "state\tmnemonic\titemRgb\n2\tTssA\t255,0,0\n").unwrap();
        assert!(matches!(
            read_state_annotation(&path),
            Err(AnnotationError::Format { .. })
        ));
    }
}
