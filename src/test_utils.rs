//! Shared helpers for filesystem tests
//!

use camino::{Utf8Path, Utf8PathBuf};

/// Temporary directory with a utf8 path, removed when dropped
pub struct TestDir {
    _dir: tempfile::TempDir,
    path: Utf8PathBuf,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Create a subdirectory and return its path
    pub fn subdir(&self, name: &str) -> Utf8PathBuf {
        let p = self.path.join(name);
        std::fs::create_dir_all(&p).unwrap();
        p
    }
}

/// Write a gzip compressed text file
pub fn write_gz(path: &Utf8Path, content: &str) {
    use std::io::Write;
    let mut f = crate::tsv_utils::OutputFile::create(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.commit().unwrap();
}

/// Read a plain or gzip compressed text file into a string
pub fn read_text(path: &Utf8Path) -> String {
    use std::io::Read;
    let mut content = String::new();
    crate::tsv_utils::open_input(path)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}
