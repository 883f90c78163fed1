use crate::errors::DbError;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use std::io::{self, Write};

/// Largest encoded document the engine stores, dumps or restores.
pub const MAX_BSON_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    /// Wrap raw data, taking its `_id` or prepending a fresh `ObjectId` when absent.
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        let (id, data) = ensure_id(data);
        Self { id, data, metadata: Metadata::new() }
    }

    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = new_data;
        self.metadata.updated_at = Utc::now();
    }

    /// Reject shapes the engine refuses to store.
    ///
    /// # Errors
    /// Returns `QueryError` when `_id` is an array, a top-level field name starts with `$`,
    /// or the encoded document exceeds [`MAX_BSON_SIZE`].
    pub fn check_storable(&self) -> Result<(), DbError> {
        if matches!(self.id.as_bson(), Bson::Array(_)) {
            return Err(DbError::QueryError("can't use an array for _id".into()));
        }
        if let Some(k) = self.data.keys().find(|k| k.starts_with('$')) {
            return Err(DbError::QueryError(format!("field name '{k}' must not start with '$'")));
        }
        check_size(&self.data).map_err(DbError::QueryError)
    }
}

struct ByteCounter(usize);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Length of `data` once encoded as BSON.
///
/// # Errors
/// Returns `Bson` when the document cannot be encoded.
pub fn encoded_len(data: &BsonDocument) -> Result<usize, DbError> {
    let mut counter = ByteCounter(0);
    data.to_writer(&mut counter)?;
    Ok(counter.0)
}

/// Size check returning a bare message for the caller to wrap in its own error kind.
pub(crate) fn check_size(data: &BsonDocument) -> Result<(), String> {
    let len = encoded_len(data).map_err(|e| e.to_string())?;
    if len > MAX_BSON_SIZE {
        return Err(format!("document of {len} bytes exceeds the {MAX_BSON_SIZE} byte limit"));
    }
    Ok(())
}

fn ensure_id(data: BsonDocument) -> (DocumentId, BsonDocument) {
    if let Some(id) = data.get("_id") {
        return (DocumentId(id.clone()), data);
    }
    let id = DocumentId::new();
    let mut out = BsonDocument::new();
    out.insert("_id", id.as_bson().clone());
    for (k, v) in data {
        out.insert(k, v);
    }
    (id, out)
}
