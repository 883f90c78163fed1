use crate::document::Document;
use parking_lot::RwLock;
use std::sync::Arc;

/// A named set of documents kept in insertion ("natural") order.
pub struct Collection {
    pub name: Arc<RwLock<String>>,
    pub(crate) docs: RwLock<Vec<Document>>,
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self { name: Arc::new(RwLock::new(name)), docs: RwLock::new(Vec::new()) }
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.write() = new_name;
    }

    /// Returns the collection's name as a String (cloned), hiding the `RwLock`.
    pub fn name_str(&self) -> String {
        self.name.read().clone()
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name_str())
            .field("len", &self.docs.read().len())
            .finish()
    }
}
