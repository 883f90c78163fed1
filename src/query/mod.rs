// Telemetry is a submodule of query
pub mod telemetry;

mod cursor;
mod eval;
mod exec;
mod parse;
mod projection;
mod types;
mod update;

pub use cursor::Cursor;
pub use eval::{compare_bson, eval_elem, eval_filter, values_equal};
pub use exec::{
    count_docs, delete_many, delete_one, find_docs, find_one, insert_many, insert_one,
    update_many, update_one,
};
pub use parse::{parse_filter, parse_filter_json, parse_update, parse_update_json};
pub use projection::Projection;
pub use types::{
    CmpOp, DeleteReport, ElemCond, Filter, FindOptions, InsertManyReport, MAX_SORT_FIELDS, Order,
    PullCriterion, SortSpec, TypeSpec, UpdateDoc, UpdateOp, UpdateReport,
};
pub use update::apply_update;
#[cfg(feature = "regex")]
pub use types::RegexCond;

pub(crate) use eval::{as_f64, is_num, type_alias};
pub(crate) use parse::{integral, truthy};
