use bson::{Bson, Document as BsonDocument};

use crate::errors::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Include,
    Exclude,
}

/// Field selection applied to query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    mode: Mode,
    fields: Vec<String>,
    include_id: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self { mode: Mode::Exclude, fields: Vec::new(), include_id: true }
    }
}

impl Projection {
    /// # Errors
    /// Returns `QueryError` when inclusion and exclusion are mixed or a value is not a
    /// boolean or number.
    pub fn parse(spec: &BsonDocument) -> Result<Self, DbError> {
        let mut mode = None;
        let mut fields = Vec::new();
        let mut include_id = true;
        for (k, v) in spec {
            let on = match v {
                Bson::Boolean(b) => *b,
                Bson::Int32(i) => *i != 0,
                Bson::Int64(i) => *i != 0,
                Bson::Double(f) => *f != 0.0,
                other => {
                    return Err(DbError::QueryError(format!(
                        "unsupported projection value for '{k}': {other}"
                    )));
                }
            };
            if k == "_id" {
                include_id = on;
                continue;
            }
            let m = if on { Mode::Include } else { Mode::Exclude };
            match mode {
                Some(prev) if prev != m => {
                    return Err(DbError::QueryError(format!(
                        "cannot mix inclusion and exclusion in projection (field '{k}')"
                    )));
                }
                _ => mode = Some(m),
            }
            fields.push(k.clone());
        }
        // `{_id: 0}` alone is an exclusion of `_id`; `{_id: 1}` alone keeps just `_id`.
        let mode = mode.unwrap_or(if include_id && !spec.is_empty() { Mode::Include } else { Mode::Exclude });
        Ok(Self { mode, fields, include_id })
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.mode == Mode::Exclude && self.fields.is_empty() && self.include_id
    }

    #[must_use]
    pub fn apply(&self, doc: &BsonDocument) -> BsonDocument {
        if self.is_identity() {
            return doc.clone();
        }
        let paths: Vec<Vec<&str>> = self.fields.iter().map(|f| f.split('.').collect()).collect();
        let mut out = match self.mode {
            Mode::Include => {
                let mut out = BsonDocument::new();
                if self.include_id
                    && let Some(id) = doc.get("_id")
                {
                    out.insert("_id", id.clone());
                }
                for (k, v) in include_doc(doc, &paths) {
                    out.insert(k, v);
                }
                out
            }
            Mode::Exclude => exclude_doc(doc, &paths),
        };
        if !self.include_id {
            out.remove("_id");
        }
        out
    }
}

/// Keep the fields named by `paths`, preserving the document's own field order.
fn include_doc(doc: &BsonDocument, paths: &[Vec<&str>]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (k, v) in doc {
        let here: Vec<&[&str]> =
            paths.iter().filter(|p| p.first() == Some(&k.as_str())).map(|p| &p[1..]).collect();
        if here.is_empty() {
            continue;
        }
        if here.iter().any(|rest| rest.is_empty()) {
            out.insert(k.clone(), v.clone());
            continue;
        }
        let rest: Vec<Vec<&str>> = here.iter().map(|r| r.to_vec()).collect();
        if let Some(sub) = include_value(v, &rest) {
            out.insert(k.clone(), sub);
        }
    }
    out
}

fn include_value(v: &Bson, rest: &[Vec<&str>]) -> Option<Bson> {
    match v {
        Bson::Document(d) => Some(Bson::Document(include_doc(d, rest))),
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .filter(|e| matches!(e, Bson::Document(_) | Bson::Array(_)))
                .filter_map(|e| include_value(e, rest))
                .collect(),
        )),
        _ => None,
    }
}

fn exclude_doc(doc: &BsonDocument, paths: &[Vec<&str>]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (k, v) in doc {
        let here: Vec<&[&str]> =
            paths.iter().filter(|p| p.first() == Some(&k.as_str())).map(|p| &p[1..]).collect();
        if here.iter().any(|rest| rest.is_empty()) {
            continue;
        }
        if here.is_empty() {
            out.insert(k.clone(), v.clone());
            continue;
        }
        let rest: Vec<Vec<&str>> = here.iter().map(|r| r.to_vec()).collect();
        out.insert(k.clone(), exclude_value(v, &rest));
    }
    out
}

fn exclude_value(v: &Bson, rest: &[Vec<&str>]) -> Bson {
    match v {
        Bson::Document(d) => Bson::Document(exclude_doc(d, rest)),
        Bson::Array(items) => Bson::Array(items.iter().map(|e| exclude_value(e, rest)).collect()),
        other => other.clone(),
    }
}
