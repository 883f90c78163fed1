use bson::Bson;
use bson::oid::ObjectId;
use std::fmt;

pub type CollectionName = String;

/// The `_id` of a stored document. Any non-array BSON value is accepted; generated
/// ids are `ObjectId`s.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentId(pub Bson);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(Bson::ObjectId(ObjectId::new()))
    }

    #[must_use]
    pub const fn as_bson(&self) -> &Bson {
        &self.0
    }

    /// Ids are equal when their values are; `1` and `1.0` name the same document.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        crate::query::values_equal(&self.0, &other.0)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Bson::ObjectId(oid) => write!(f, "ObjectId('{}')", oid.to_hex()),
            Bson::String(s) => write!(f, "'{s}'"),
            other => write!(f, "{}", crate::utils::json::bson_to_json(other)),
        }
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        Self(Bson::ObjectId(oid))
    }
}
