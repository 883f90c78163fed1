use super::core::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::telemetry;
use crate::types::DocumentId;

impl Collection {
    /// # Errors
    /// Returns `DuplicateKey` when a document with the same `_id` exists, or `QueryError`
    /// when the document cannot be stored.
    pub fn insert_document(&self, document: Document) -> Result<DocumentId, DbError> {
        document.check_storable()?;
        let doc_id = document.id.clone();
        {
            let mut docs = self.docs.write();
            if docs.iter().any(|d| d.id.same_as(&doc_id)) {
                return Err(DbError::DuplicateKey(doc_id.to_string()));
            }
            docs.push(document);
        }
        telemetry::log_audit("insert", &self.name_str(), &doc_id.to_string());
        Ok(doc_id)
    }

    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.docs.read().iter().find(|d| d.id.same_as(id)).cloned()
    }

    /// Replace the data of an existing document, keeping its id and position.
    pub fn update_document(&self, id: &DocumentId, new_document: Document) -> bool {
        let updated = {
            let mut docs = self.docs.write();
            match docs.iter_mut().find(|d| d.id.same_as(id)) {
                Some(slot) => {
                    slot.update(new_document.data);
                    true
                }
                None => false,
            }
        };
        if updated {
            telemetry::log_audit("update", &self.name_str(), &id.to_string());
        }
        updated
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        let removed = {
            let mut docs = self.docs.write();
            let before = docs.len();
            docs.retain(|d| !d.id.same_as(id));
            docs.len() != before
        };
        if removed {
            telemetry::log_audit("delete", &self.name_str(), &id.to_string());
        }
        removed
    }

    pub fn get_all_documents(&self) -> Vec<Document> {
        self.docs.read().clone()
    }

    /// Return only the IDs of all documents, in natural order.
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.docs.read().iter().map(|d| d.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Remove every document; returns how many were dropped.
    pub fn clear(&self) -> usize {
        let n = std::mem::take(&mut *self.docs.write()).len();
        if n > 0 {
            telemetry::log_audit("clear", &self.name_str(), "*");
        }
        n
    }
}
