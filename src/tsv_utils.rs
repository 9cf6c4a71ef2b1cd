//! Plain/gzip tab-separated file input and output
//!

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use csv::ReaderBuilder;
use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a text input file, transparently decompressing gzip content
///
/// Compression is detected from the leading magic bytes rather than the file extension.
///
pub fn open_input(path: &Utf8Path) -> io::Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(path)?);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Reader settings shared by all tab-separated inputs
pub fn tsv_reader_builder(has_headers: bool) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true);
    builder
}

enum OutputStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::Plain(w) => w.write(buf),
            OutputStream::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::Plain(w) => w.flush(),
            OutputStream::Gzip(w) => w.flush(),
        }
    }
}

/// Output file which only appears at its final path once it is completely written
///
/// Content goes to a temporary sibling path and is renamed into place by [`OutputFile::commit`].
/// Output file existence is used to decide which work can be skipped on a resumed run, so a
/// partially written file must never be visible under the final name.
///
/// Output is gzip compressed when the final path ends in `.gz`.
///
pub struct OutputFile {
    path: Utf8PathBuf,
    tmp_path: Utf8PathBuf,
    stream: OutputStream,
}

impl OutputFile {
    pub fn create(path: &Utf8Path) -> io::Result<Self> {
        let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
        let f = BufWriter::new(File::create(&tmp_path)?);
        let stream = if path.extension() == Some("gz") {
            OutputStream::Gzip(GzEncoder::new(f, Compression::default()))
        } else {
            OutputStream::Plain(f)
        };
        Ok(Self {
            path: path.to_owned(),
            tmp_path,
            stream,
        })
    }

    /// Finish the output stream and move the file to its final path
    pub fn commit(self) -> io::Result<()> {
        let mut f = match self.stream {
            OutputStream::Plain(w) => w,
            OutputStream::Gzip(w) => w.finish()?,
        };
        f.flush()?;
        drop(f);
        std::fs::rename(&self.tmp_path, &self.path)
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Read a file with one item per line, skipping blank lines
///
pub fn read_line_list(path: &Utf8Path) -> io::Result<Vec<String>> {
    let mut items = Vec::new();
    for line in open_input(path)?.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            items.push(line.to_string());
        }
    }
    Ok(items)
}

/// List the names of regular files in a directory, sorted
///
pub fn list_dir_filenames(dir: &Utf8Path) -> io::Result<Vec<String>> {
    let mut filenames = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            filenames.push(entry.file_name().to_string());
        }
    }
    filenames.sort();
    Ok(filenames)
}

/// List the names of subdirectories in a directory, sorted
///
pub fn list_dir_subdirnames(dir: &Utf8Path) -> io::Result<Vec<String>> {
    let mut dirnames = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirnames.push(entry.file_name().to_string());
        }
    }
    dirnames.sort();
    Ok(dirnames)
}
