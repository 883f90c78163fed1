pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod logger;
pub mod persist;
pub mod query;
pub mod shell;
pub mod types;
pub mod utils;

pub use query::telemetry;

use crate::collection::Collection;
use crate::document::Document;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::query::{Cursor, DeleteReport, Filter, FindOptions, UpdateDoc, UpdateReport};
use crate::shell::{OutputEvent, Session};
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The main database struct: an engine, optionally backed by a dump directory.
pub struct Database {
    engine: Arc<Engine>,
    data_dir: Option<PathBuf>,
}

impl Database {
    /// Creates a new in-memory database instance.
    #[must_use]
    pub fn new() -> Self {
        Self { engine: Arc::new(Engine::new()), data_dir: None }
    }

    /// Opens a database backed by `dir`, loading any `<collection>.bson` dumps in it.
    ///
    /// # Errors
    /// Returns an error for unreadable or malformed dumps.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, DbError> {
        let dir = dir.as_ref().to_path_buf();
        let engine = Arc::new(Engine::new());
        let n = persist::restore_engine(&engine, &dir)?;
        log::info!("opened database at {} ({n} collections)", dir.display());
        Ok(Self { engine, data_dir: Some(dir) })
    }

    /// Writes every collection back to the dump directory; a no-op in memory.
    ///
    /// # Errors
    /// Returns an error when a dump cannot be written.
    pub fn save(&self) -> Result<(), DbError> {
        if let Some(dir) = &self.data_dir {
            persist::dump_engine(&self.engine, dir)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// A shell session over this database.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(Arc::clone(&self.engine))
    }

    /// Runs a script in a fresh session and collects what it printed.
    ///
    /// # Errors
    /// Returns `ScriptError` for the first failing statement.
    pub fn run_script(&self, src: &str) -> Result<Vec<OutputEvent>, DbError> {
        let mut out = Vec::new();
        self.session().run_script(src, &mut out)?;
        Ok(out)
    }

    /// # Errors
    /// Returns `InvalidCollectionName` or `CollectionAlreadyExists`.
    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.create_collection(name)
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.engine.delete_collection(name)
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    /// # Errors
    /// Returns `NoSuchCollection`, `InvalidCollectionName` or `CollectionAlreadyExists`.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        self.engine.rename_collection(old, new)
    }

    fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    // --- Query API (façade over query module) ---

    /// Inserts into `collection_name`, creating it when missing.
    ///
    /// # Errors
    /// Returns `DuplicateKey` or a collection name error.
    pub fn insert_one(&self, collection_name: &str, data: BsonDocument) -> Result<DocumentId, DbError> {
        let col = self.engine.get_or_create_collection(collection_name)?;
        query::insert_one(&col, data)
    }

    /// # Errors
    /// Returns `NoSuchCollection` when the collection does not exist.
    pub fn find(&self, collection_name: &str, filter: &Filter, opts: &FindOptions) -> Result<Cursor, DbError> {
        Ok(query::find_docs(&self.collection(collection_name)?, filter, opts))
    }

    /// Looks a document up by `_id`; `1` and `1.0` name the same document.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` or `NoSuchDocument`.
    pub fn find_by_id(&self, collection_name: &str, id: &DocumentId) -> Result<Document, DbError> {
        self.collection(collection_name)?
            .find_document(id)
            .ok_or_else(|| DbError::NoSuchDocument(format!("{collection_name} {id}")))
    }

    /// # Errors
    /// Returns `NoSuchCollection` when the collection does not exist.
    pub fn count(&self, collection_name: &str, filter: &Filter) -> Result<usize, DbError> {
        Ok(query::count_docs(&self.collection(collection_name)?, filter))
    }

    /// # Errors
    /// Returns `NoSuchCollection` or `UpdateError`.
    pub fn update_one(&self, collection_name: &str, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        query::update_one(&self.collection(collection_name)?, filter, update)
    }

    /// # Errors
    /// Returns `NoSuchCollection` or `UpdateError`.
    pub fn update_many(&self, collection_name: &str, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        query::update_many(&self.collection(collection_name)?, filter, update)
    }

    /// # Errors
    /// Returns `NoSuchCollection` when the collection does not exist.
    pub fn delete_one(&self, collection_name: &str, filter: &Filter) -> Result<DeleteReport, DbError> {
        Ok(query::delete_one(&self.collection(collection_name)?, filter))
    }

    /// # Errors
    /// Returns `NoSuchCollection` when the collection does not exist.
    pub fn delete_many(&self, collection_name: &str, filter: &Filter) -> Result<DeleteReport, DbError> {
        Ok(query::delete_many(&self.collection(collection_name)?, filter))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes logging from `NEXUS_SHELL_LOG_*` variables.
///
/// # Errors
/// Returns an error if logging cannot be configured.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::configure_from_env(None, None)
}
