//! On-disk dumps. A collection is stored as concatenated BSON documents in natural
//! order; an engine is a directory of `<collection>.bson` files.

use bson::Document as BsonDocument;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::collection::Collection;
use crate::document::{Document, MAX_BSON_SIZE};
use crate::engine::Engine;
use crate::errors::DbError;
use crate::utils::json::document_to_json;

pub const DUMP_EXTENSION: &str = "bson";
const MIN_DOC_LEN: usize = 5;

pub trait DocSink {
    /// # Errors
    /// Returns an I/O or encoding error from the underlying writer.
    fn write_doc(&mut self, doc: &BsonDocument) -> Result<(), DbError>;
    /// # Errors
    /// Returns an I/O error when flushing fails.
    fn finish(&mut self) -> Result<(), DbError>;
}

pub struct NdjsonSink<W: Write> {
    w: BufWriter<W>,
}
impl<W: Write> NdjsonSink<W> {
    pub fn new(inner: W) -> Self {
        Self { w: BufWriter::new(inner) }
    }
}
impl<W: Write> DocSink for NdjsonSink<W> {
    fn write_doc(&mut self, doc: &BsonDocument) -> Result<(), DbError> {
        let s = serde_json::to_string(&document_to_json(doc))?;
        writeln!(self.w, "{s}")?;
        Ok(())
    }
    fn finish(&mut self) -> Result<(), DbError> {
        Ok(self.w.flush()?)
    }
}

pub struct BsonSink<W: Write> {
    w: BufWriter<W>,
}
impl<W: Write> BsonSink<W> {
    pub fn new(inner: W) -> Self {
        Self { w: BufWriter::new(inner) }
    }
}
impl<W: Write> DocSink for BsonSink<W> {
    fn write_doc(&mut self, doc: &BsonDocument) -> Result<(), DbError> {
        doc.to_writer(&mut self.w)?;
        Ok(())
    }
    fn finish(&mut self) -> Result<(), DbError> {
        Ok(self.w.flush()?)
    }
}

fn drain_into(col: &Collection, sink: &mut dyn DocSink) -> Result<usize, DbError> {
    let docs = col.get_all_documents();
    for d in &docs {
        sink.write_doc(&d.data)?;
    }
    sink.finish()?;
    Ok(docs.len())
}

/// Write every document as one relaxed extended JSON line.
///
/// # Errors
/// Returns an error when writing fails.
pub fn export_ndjson<W: Write>(col: &Collection, writer: W) -> Result<usize, DbError> {
    drain_into(col, &mut NdjsonSink::new(writer))
}

/// Write the collection to `path`, replacing it atomically.
///
/// # Errors
/// Returns an error when the file cannot be written.
pub fn dump_collection(col: &Collection, path: &Path) -> Result<usize, DbError> {
    let tmp = path.with_extension(format!("{DUMP_EXTENSION}.tmp"));
    let n = drain_into(col, &mut BsonSink::new(File::create(&tmp)?))?;
    std::fs::rename(&tmp, path)?;
    log::debug!("dumped {n} documents of {} to {}", col.name_str(), path.display());
    Ok(n)
}

/// Read exactly `buf.len()` bytes; `Ok(false)` on a clean end of stream before the
/// first byte.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, DbError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(DbError::Io("truncated BSON stream".into())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Decode a stream of concatenated BSON documents.
///
/// # Errors
/// Returns `Io` for an invalid length prefix or a truncated stream, `Bson` for a
/// malformed document.
pub fn read_bson_stream<R: Read>(mut reader: R) -> Result<Vec<BsonDocument>, DbError> {
    let mut out = Vec::new();
    let mut buf = Vec::with_capacity(4096);
    loop {
        let mut len_buf = [0u8; 4];
        if !read_full(&mut reader, &mut len_buf)? {
            break;
        }
        let len = usize::try_from(i32::from_le_bytes(len_buf))
            .ok()
            .filter(|l| (MIN_DOC_LEN..=MAX_BSON_SIZE).contains(l))
            .ok_or_else(|| DbError::Io("invalid bson size".into()))?;
        buf.clear();
        buf.extend_from_slice(&len_buf);
        buf.resize(len, 0);
        if !read_full(&mut reader, &mut buf[4..])? {
            return Err(DbError::Io("truncated BSON stream".into()));
        }
        out.push(BsonDocument::from_reader(&mut &buf[..])?);
    }
    Ok(out)
}

/// Append the documents stored at `path` to `col`, keeping their `_id`s.
///
/// # Errors
/// Returns an error for unreadable or malformed files and duplicate ids.
pub fn restore_collection(col: &Collection, path: &Path) -> Result<usize, DbError> {
    let docs = read_bson_stream(BufReader::new(File::open(path)?))?;
    let n = docs.len();
    for d in docs {
        col.insert_document(Document::new(d))?;
    }
    log::debug!("restored {n} documents into {} from {}", col.name_str(), path.display());
    Ok(n)
}

fn dump_path(dir: &Path, name: &str) -> Result<PathBuf, DbError> {
    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(DbError::InvalidCollectionName(format!("{name:?} cannot be stored as a file")));
    }
    Ok(dir.join(format!("{name}.{DUMP_EXTENSION}")))
}

fn dump_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, DbError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path.extension().is_some_and(|e| e == DUMP_EXTENSION)
            && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        {
            out.push((stem.to_string(), path.clone()));
        }
    }
    out.sort();
    Ok(out)
}

/// Write every collection to `<dir>/<name>.bson`; dumps of dropped collections are
/// removed. Returns the number of collections written.
///
/// # Errors
/// Returns an error when the directory or a file cannot be written.
pub fn dump_engine(engine: &Engine, dir: &Path) -> Result<usize, DbError> {
    std::fs::create_dir_all(dir)?;
    let names = engine.list_collection_names();
    for name in &names {
        if let Some(col) = engine.get_collection(name) {
            dump_collection(&col, &dump_path(dir, name)?)?;
        }
    }
    for (stem, path) in dump_files(dir)? {
        if !names.contains(&stem) {
            std::fs::remove_file(&path)?;
            log::info!("removed dump of dropped collection {stem}");
        }
    }
    Ok(names.len())
}

/// Load every `<dir>/<name>.bson` into the engine. A missing directory loads nothing.
///
/// # Errors
/// Returns an error for unreadable or malformed dumps.
pub fn restore_engine(engine: &Engine, dir: &Path) -> Result<usize, DbError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let files = dump_files(dir)?;
    for (name, path) in &files {
        let col: Arc<Collection> = engine.get_or_create_collection(name)?;
        restore_collection(&col, path)?;
    }
    log::info!("restored {} collections from {}", files.len(), dir.display());
    Ok(files.len())
}
