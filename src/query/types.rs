use bson::Bson;
use bson::spec::ElementType;

use super::projection::Projection;
use crate::types::DocumentId;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 100;
/// Most keys a sort specification may name.
pub const MAX_SORT_FIELDS: usize = 32;
pub(crate) const MAX_ARRAY_PAD: usize = 1_500_000;
pub(crate) const MAX_IN_SET: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A `$type` operand: a concrete BSON element type or the `"number"` alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
    Number,
    Element(ElementType),
}

/// Condition applied to single array elements by `$elemMatch` and `$pull`.
///
/// `object` conditions are filter documents and only consider embedded-document
/// elements; value conditions are operator documents applied to the element itself
/// (their paths are empty).
#[derive(Debug, Clone, PartialEq)]
pub struct ElemCond {
    pub filter: Filter,
    pub object: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Type { path: String, types: Vec<TypeSpec> },
    All { path: String, values: Vec<Bson> },
    Size { path: String, size: usize },
    ElemMatch { path: String, cond: Box<ElemCond> },
    #[cfg(feature = "regex")]
    Regex { path: String, re: RegexCond },
}

/// A `$regex` compiled once at parse time. Compares by pattern and options.
#[cfg(feature = "regex")]
#[derive(Debug, Clone)]
pub struct RegexCond {
    pub pattern: String,
    pub options: String,
    compiled: regex::Regex,
}

#[cfg(feature = "regex")]
impl RegexCond {
    /// # Errors
    /// Returns `QueryError` for an invalid pattern or an option outside `imsx`.
    pub fn new(pattern: &str, options: &str) -> Result<Self, crate::errors::DbError> {
        let qerr = |m: String| crate::errors::DbError::QueryError(m);
        if let Some(bad) = options.chars().find(|c| !"imsx".contains(*c)) {
            return Err(qerr(format!("invalid $options flag '{bad}'")));
        }
        let compiled = regex::RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .dot_matches_new_line(options.contains('s'))
            .ignore_whitespace(options.contains('x'))
            .build()
            .map_err(|e| qerr(format!("invalid $regex '{pattern}': {e}")))?;
        Ok(Self { pattern: pattern.to_string(), options: options.to_string(), compiled })
    }

    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        self.compiled.is_match(s)
    }
}

#[cfg(feature = "regex")]
impl PartialEq for RegexCond {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.options == other.options
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PullCriterion {
    Equals(Bson),
    Matches(ElemCond),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set { path: String, value: Bson },
    Unset { path: String },
    Inc { path: String, by: Bson },
    Rename { from: String, to: String },
    Push { path: String, values: Vec<Bson> },
    AddToSet { path: String, values: Vec<Bson> },
    Pop { path: String, first: bool },
    Pull { path: String, criterion: PullCriterion },
    PullAll { path: String, values: Vec<Bson> },
}

impl UpdateOp {
    /// Every path the operator writes to.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::Rename { from, to } => vec![from.as_str(), to.as_str()],
            Self::Set { path, .. }
            | Self::Unset { path }
            | Self::Inc { path, .. }
            | Self::Push { path, .. }
            | Self::AddToSet { path, .. }
            | Self::Pop { path, .. }
            | Self::Pull { path, .. }
            | Self::PullAll { path, .. } => vec![path.as_str()],
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub ops: Vec<UpdateOp>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InsertManyReport {
    pub inserted: Vec<DocumentId>,
}
