use bson::{Bson, Document as BsonDocument};

use crate::document::{Document, check_size};
use crate::errors::DbError;

use super::eval::{as_f64, eval_elem, is_num, type_alias, values_equal};
use super::types::{MAX_ARRAY_PAD, PullCriterion, UpdateDoc, UpdateOp};

fn uerr(msg: impl Into<String>) -> DbError {
    DbError::UpdateError(msg.into())
}

/// Apply every operator to a copy of `doc.data`; the document is only touched when all
/// of them succeed and the data actually changed. Returns whether it changed.
///
/// # Errors
/// Returns `UpdateError` when an operator meets a value of the wrong type or the result
/// would be too large to store.
pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> Result<bool, DbError> {
    let mut root = Bson::Document(doc.data.clone());
    for op in &upd.ops {
        apply_op(&mut root, op)?;
    }
    let Bson::Document(data) = root else {
        return Err(uerr("update replaced the document root"));
    };
    if data == doc.data {
        return Ok(false);
    }
    check_size(&data).map_err(DbError::UpdateError)?;
    doc.update(data);
    Ok(true)
}

fn segs(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

fn apply_op(root: &mut Bson, op: &UpdateOp) -> Result<(), DbError> {
    match op {
        UpdateOp::Set { path, value } => {
            *lookup_or_create(root, &segs(path))? = value.clone();
        }
        UpdateOp::Unset { path } => {
            take(root, &segs(path), false)?;
        }
        UpdateOp::Inc { path, by } => match lookup_mut(root, &segs(path)) {
            Some(v) if is_num(v) => {
                *v = add_numbers(v, by)
                    .ok_or_else(|| uerr(format!("$inc overflows a 64-bit integer at '{path}'")))?;
            }
            Some(v) => {
                return Err(uerr(format!(
                    "cannot apply $inc to a value of non-numeric type {} at '{path}'",
                    type_alias(v)
                )));
            }
            None => *lookup_or_create(root, &segs(path))? = by.clone(),
        },
        UpdateOp::Rename { from, to } => {
            if let Some(v) = take(root, &segs(from), true)? {
                *lookup_or_create(root, &segs(to))? = v;
            }
        }
        UpdateOp::Push { path, values } => {
            let arr = array_or_create(root, path, "$push")?;
            arr.extend(values.iter().cloned());
        }
        UpdateOp::AddToSet { path, values } => {
            let arr = array_or_create(root, path, "$addToSet")?;
            for v in values {
                if !arr.iter().any(|e| values_equal(e, v)) {
                    arr.push(v.clone());
                }
            }
        }
        UpdateOp::Pop { path, first } => {
            if let Some(arr) = existing_array(root, path, "$pop")? {
                if *first {
                    if !arr.is_empty() {
                        arr.remove(0);
                    }
                } else {
                    arr.pop();
                }
            }
        }
        UpdateOp::Pull { path, criterion } => {
            if let Some(arr) = existing_array(root, path, "$pull")? {
                arr.retain(|e| match criterion {
                    PullCriterion::Equals(v) => !values_equal(e, v),
                    PullCriterion::Matches(cond) => !eval_elem(e, cond),
                });
            }
        }
        UpdateOp::PullAll { path, values } => {
            if let Some(arr) = existing_array(root, path, "$pullAll")? {
                arr.retain(|e| !values.iter().any(|v| values_equal(e, v)));
            }
        }
    }
    Ok(())
}

fn array_or_create<'a>(root: &'a mut Bson, path: &str, op: &str) -> Result<&'a mut Vec<Bson>, DbError> {
    let segs = segs(path);
    if lookup_mut(root, &segs).is_none() {
        *lookup_or_create(root, &segs)? = Bson::Array(Vec::new());
    }
    match lookup_mut(root, &segs) {
        Some(Bson::Array(items)) => Ok(items),
        Some(other) => Err(not_an_array(op, path, other)),
        None => Err(uerr(format!("{op}: could not create '{path}'"))),
    }
}

fn existing_array<'a>(root: &'a mut Bson, path: &str, op: &str) -> Result<Option<&'a mut Vec<Bson>>, DbError> {
    match lookup_mut(root, &segs(path)) {
        None => Ok(None),
        Some(Bson::Array(items)) => Ok(Some(items)),
        Some(other) => Err(not_an_array(op, path, other)),
    }
}

fn not_an_array(op: &str, path: &str, v: &Bson) -> DbError {
    uerr(format!("{op}: the field '{path}' must be an array but is of type {}", type_alias(v)))
}

/// Sum two numbers: `Int32` stays `Int32` until it overflows, integers widen to
/// `Int64`, anything involving a `Double` or `Decimal128` becomes a `Double`.
/// `None` when integer addition overflows 64 bits.
fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    let int = |v: &Bson| match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    };
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => {
            Some(x.checked_add(*y).map_or_else(|| Bson::Int64(i64::from(*x) + i64::from(*y)), Bson::Int32))
        }
        _ => match (int(a), int(b)) {
            (Some(x), Some(y)) => x.checked_add(y).map(Bson::Int64),
            _ => Some(Bson::Double(as_f64(a) + as_f64(b))),
        },
    }
}

/// Step into `seg`; with `create`, missing document fields become empty documents and
/// array indexes past the end are padded with nulls.
fn child_mut<'a>(cur: &'a mut Bson, seg: &str, create: bool) -> Result<Option<&'a mut Bson>, DbError> {
    match cur {
        Bson::Document(d) => {
            if create && !d.contains_key(seg) {
                d.insert(seg, Bson::Document(BsonDocument::new()));
            }
            Ok(d.get_mut(seg))
        }
        Bson::Array(items) => match seg.parse::<usize>() {
            Ok(i) => {
                if create && i >= items.len() {
                    if i > MAX_ARRAY_PAD {
                        return Err(uerr(format!("can't pad array to index {i}")));
                    }
                    items.resize(i, Bson::Null);
                    items.push(Bson::Document(BsonDocument::new()));
                }
                Ok(items.get_mut(i))
            }
            Err(_) if create => Err(uerr(format!("cannot create field '{seg}' in an array"))),
            Err(_) => Ok(None),
        },
        other if create => Err(uerr(format!(
            "cannot create field '{seg}' in element of type {}",
            type_alias(other)
        ))),
        _ => Ok(None),
    }
}

fn lookup_mut<'a>(root: &'a mut Bson, segs: &[&str]) -> Option<&'a mut Bson> {
    let mut cur = root;
    for seg in segs {
        match child_mut(cur, seg, false) {
            Ok(Some(next)) => cur = next,
            _ => return None,
        }
    }
    Some(cur)
}

fn lookup_or_create<'a>(root: &'a mut Bson, segs: &[&str]) -> Result<&'a mut Bson, DbError> {
    let mut cur = root;
    for seg in segs {
        cur = child_mut(cur, seg, true)?.ok_or_else(|| uerr(format!("cannot create field '{seg}'")))?;
    }
    Ok(cur)
}

/// Remove the value at `path` and return it. Array elements are nulled in place unless
/// `strict`, in which case addressing an array element is an error.
fn take(root: &mut Bson, segs: &[&str], strict: bool) -> Result<Option<Bson>, DbError> {
    let Some((last, parents)) = segs.split_last() else { return Ok(None) };
    let Some(parent) = lookup_mut(root, parents) else { return Ok(None) };
    match parent {
        Bson::Document(d) => Ok(d.remove(*last)),
        Bson::Array(_) if strict => Err(uerr("$rename source may not be an array element")),
        Bson::Array(items) => Ok(last
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get_mut(i))
            .map(|slot| std::mem::replace(slot, Bson::Null))),
        _ => Ok(None),
    }
}
