use crate::collection::Collection;
use crate::errors::DbError;
use crate::types::CollectionName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The embedded engine: a registry of named in-memory collections.
#[derive(Default)]
pub struct Engine {
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("collections", &self.list_collection_names()).finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `InvalidCollectionName` or `CollectionAlreadyExists`.
    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        validate_collection_name(name)?;
        let mut map = self.collections.write();
        if map.contains_key(name) {
            return Err(DbError::CollectionAlreadyExists(name.to_string()));
        }
        let col = Arc::new(Collection::new(name.to_string()));
        map.insert(name.to_string(), col.clone());
        drop(map);
        log::info!("created collection {name}");
        Ok(col)
    }

    /// Fetch a collection, creating it on first use the way writes do.
    ///
    /// # Errors
    /// Returns `InvalidCollectionName` when the name cannot be used.
    pub fn get_or_create_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        if let Some(col) = self.get_collection(name) {
            return Ok(col);
        }
        validate_collection_name(name)?;
        let col = self
            .collections
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                log::info!("created collection {name} implicitly");
                Arc::new(Collection::new(name.to_string()))
            })
            .clone();
        Ok(col)
    }

    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name).is_some();
        if removed {
            log::info!("dropped collection {name}");
        }
        removed
    }

    /// # Errors
    /// Returns `NoSuchCollection` when `old` is missing, `CollectionAlreadyExists` when
    /// `new` is taken, or `InvalidCollectionName`.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        validate_collection_name(new)?;
        let mut map = self.collections.write();
        if map.contains_key(new) {
            return Err(DbError::CollectionAlreadyExists(new.to_string()));
        }
        let col = map.remove(old).ok_or_else(|| DbError::NoSuchCollection(old.to_string()))?;
        col.set_name(new.to_string());
        map.insert(new.to_string(), col);
        Ok(())
    }

    /// Collection names, sorted.
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// # Errors
/// Returns `InvalidCollectionName` for empty names, names containing `$` or NUL, and
/// names in the reserved `system.` namespace.
pub fn validate_collection_name(name: &str) -> Result<(), DbError> {
    let reason = if name.is_empty() {
        Some("name must not be empty")
    } else if name.contains('$') {
        Some("name must not contain '$'")
    } else if name.contains('\0') {
        Some("name must not contain NUL")
    } else if name.starts_with("system.") {
        Some("the system. prefix is reserved")
    } else {
        None
    };
    match reason {
        Some(r) => Err(DbError::InvalidCollectionName(format!("{name:?}: {r}"))),
        None => Ok(()),
    }
}
