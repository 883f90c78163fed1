use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Document not found: {0}")]
    NoSuchDocument(String),

    #[error("E11000 duplicate key error: _id {0}")]
    DuplicateKey(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Update error: {0}")]
    UpdateError(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("bulk write stopped after {inserted} inserts: {message}")]
    BulkWrite { inserted: usize, message: String },

    #[error("script error at {line}:{col}: {msg}")]
    ScriptError { line: usize, col: usize, msg: String },
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl DbError {
    /// Attach a script position unless the error already carries one. Line 0 means
    /// "not yet positioned".
    #[must_use]
    pub fn at(self, line: usize, col: usize) -> Self {
        match self {
            Self::ScriptError { line: 0, msg, .. } => Self::ScriptError { line, col, msg },
            e @ Self::ScriptError { .. } => e,
            other => Self::ScriptError { line, col, msg: other.to_string() },
        }
    }
}
