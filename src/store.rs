use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::Builder;

use crate::error::StatsError;

pub fn open_input(path: &Path) -> Result<Box<dyn Read>, StatsError> {
    if !path.exists() {
        return Err(StatsError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path)
        .map_err(|err| StatsError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

/// Iterator over the records of a line-delimited JSON file.
///
/// Blank lines are ignored. A line that is not UTF-8 or fails to parse
/// yields a [`StatsError::MalformedRecord`] and iteration continues with the
/// next line; an I/O failure yields [`StatsError::Filesystem`] and ends it.
pub struct JsonLines<T> {
    path: PathBuf,
    reader: BufReader<Box<dyn Read>>,
    buf: Vec<u8>,
    line_no: usize,
    failed: bool,
    _marker: PhantomData<T>,
}

impl<T> std::fmt::Debug for JsonLines<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLines")
            .field("path", &self.path)
            .field("line_no", &self.line_no)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned> JsonLines<T> {
    pub fn open(path: &Path) -> Result<Self, StatsError> {
        let reader = open_input(path)?;
        Ok(Self::from_reader(path, reader))
    }

    pub fn from_reader(path: &Path, reader: Box<dyn Read>) -> Self {
        Self {
            path: path.to_path_buf(),
            reader: BufReader::new(reader),
            buf: Vec::new(),
            line_no: 0,
            failed: false,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for JsonLines<T> {
    type Item = Result<T, StatsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(StatsError::Filesystem(format!(
                        "read {}: {err}",
                        self.path.display()
                    ))));
                }
            }
            self.line_no += 1;
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line,
                Err(err) => return Some(Err(self.malformed(err.to_string()))),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(trimmed).map_err(|err| self.malformed(err.to_string())),
            );
        }
    }
}

impl<T> JsonLines<T> {
    fn malformed(&self, message: String) -> StatsError {
        StatsError::MalformedRecord {
            path: self.path.clone(),
            line: self.line_no,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Tsv,
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<&'static str>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    pub fn write_to<W: Write>(&self, writer: W, format: TableFormat) -> Result<(), StatsError> {
        let mut builder = csv::WriterBuilder::new();
        if format == TableFormat::Tsv {
            builder
                .delimiter(b'\t')
                .quote_style(csv::QuoteStyle::Never);
        }
        let mut out = builder.from_writer(writer);
        let to_err = |err: csv::Error| StatsError::Filesystem(err.to_string());

        out.write_record(&self.header).map_err(to_err)?;
        for row in &self.rows {
            match format {
                TableFormat::Tsv => out
                    .write_record(row.iter().map(|cell| sanitize_tsv(cell)))
                    .map_err(to_err)?,
                TableFormat::Csv => out.write_record(row).map_err(to_err)?,
            }
        }
        out.flush()
            .map_err(|err| StatsError::Filesystem(err.to_string()))
    }
}

fn sanitize_tsv(cell: &str) -> String {
    cell.replace(['\t', '\n', '\r'], " ")
}

#[derive(Debug, Clone)]
pub struct OutputDir {
    root: Utf8PathBuf,
}

impl OutputDir {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn from_path(root: &Path) -> Result<Self, StatsError> {
        Ok(Self {
            root: utf8_path(root)?,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub fn ensure(&self) -> Result<(), StatsError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| StatsError::Filesystem(err.to_string()))
    }

    pub fn write_jsonl<'a, T, I>(&self, name: &str, items: I) -> Result<Utf8PathBuf, StatsError>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let path = self.path(name);
        write_atomic(&path, |out| {
            for item in items {
                serde_json::to_writer(&mut *out, item)
                    .map_err(|err| StatsError::Serialize(err.to_string()))?;
                out.write_all(b"\n")
                    .map_err(|err| StatsError::Filesystem(err.to_string()))?;
            }
            Ok(())
        })?;
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<Utf8PathBuf, StatsError> {
        let path = self.path(name);
        write_atomic(&path, |out| {
            serde_json::to_writer_pretty(&mut *out, value)
                .map_err(|err| StatsError::Serialize(err.to_string()))?;
            out.write_all(b"\n")
                .map_err(|err| StatsError::Filesystem(err.to_string()))
        })?;
        Ok(path)
    }

    pub fn write_table(
        &self,
        name: &str,
        table: &Table,
        format: TableFormat,
    ) -> Result<Utf8PathBuf, StatsError> {
        let path = self.path(name);
        write_atomic(&path, |out| table.write_to(out, format))?;
        Ok(path)
    }
}

pub fn utf8_path(path: &Path) -> Result<Utf8PathBuf, StatsError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| StatsError::Filesystem(format!("non UTF-8 path {}", path.display())))
}

pub fn write_atomic<F>(path: &Utf8Path, write: F) -> Result<(), StatsError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), StatsError>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| StatsError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".cz-ds")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| StatsError::Filesystem(err.to_string()))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|err| StatsError::Filesystem(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| StatsError::Filesystem(err.to_string()))?;
    Ok(())
}
