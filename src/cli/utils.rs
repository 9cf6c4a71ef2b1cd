use camino::{Utf8Path, Utf8PathBuf};
use simple_error::{SimpleResult, bail};

/// Check a required input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_required_filename(filename: &Utf8Path, label: &str) -> SimpleResult<()> {
    if filename.as_str().is_empty() {
        bail!("Must specify {label} file");
    }
    if !filename.exists() {
        bail!("Can't find specified {label} file: '{filename}'");
    }
    if !filename.is_file() {
        bail!("Specified {label} file path does not appear to be a file: '{filename}'");
    }
    Ok(())
}

/// Check an optional input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_optional_filename(
    filename_opt: Option<&Utf8PathBuf>,
    label: &str,
) -> SimpleResult<()> {
    if let Some(filename) = filename_opt {
        check_required_filename(filename, label)?;
    }
    Ok(())
}

/// Check a required input directory
///
/// Assumes no logger has been configured yet
///
pub fn check_required_dirname(dirname: &Utf8Path, label: &str) -> SimpleResult<()> {
    if dirname.as_str().is_empty() {
        bail!("Must specify {label} directory");
    }
    if !dirname.exists() {
        bail!("Can't find specified {label} directory: '{dirname}'");
    }
    if !dirname.is_dir() {
        bail!("Specified {label} directory path does not appear to be a directory: '{dirname}'");
    }
    Ok(())
}

/// Check that an output directory path is not already taken by some other file type
///
pub fn check_output_dirname(dirname: &Utf8Path, label: &str) -> SimpleResult<()> {
    if dirname.as_str().is_empty() {
        bail!("Must specify {label} directory");
    }
    if dirname.exists() && !dirname.is_dir() {
        bail!("Specified {label} directory path already exists as a file: '{dirname}'");
    }
    Ok(())
}

/// Check an output filename, which must not be an existing directory
///
pub fn check_output_filename(filename: &Utf8Path, label: &str) -> SimpleResult<()> {
    if filename.as_str().is_empty() {
        bail!("Must specify {label} file");
    }
    if filename.is_dir() {
        bail!("Specified {label} file path is an existing directory: '{filename}'");
    }
    Ok(())
}

/// Directory receiving the log and run statistics of commands with a single output file
///
pub fn output_file_dir(filename: &Utf8Path) -> Utf8PathBuf {
    match filename.parent() {
        Some(x) if !x.as_str().is_empty() => x.to_owned(),
        _ => Utf8PathBuf::from("."),
    }
}

/// Check if two paths name the same file, for paths which may not exist yet
pub fn same_file(a: &Utf8Path, b: &Utf8Path) -> bool {
    match (a.canonicalize_utf8(), b.canonicalize_utf8()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
