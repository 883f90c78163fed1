use crate::errors::DbError;
use crate::utils::json::parse_json_document;
use bson::{Bson, Document as BsonDocument};

use super::eval::{element_type_for_alias, element_type_for_code, is_num, type_alias};
#[cfg(feature = "regex")]
use super::types::RegexCond;
use super::types::{
    CmpOp, ElemCond, Filter, MAX_IN_SET, MAX_PATH_DEPTH, PullCriterion, TypeSpec, UpdateDoc,
    UpdateOp,
};

fn qerr(msg: impl Into<String>) -> DbError {
    DbError::QueryError(msg.into())
}

/// Parse a filter document into a `Filter` tree.
///
/// # Errors
/// Returns `QueryError` for unknown operators and malformed operands.
pub fn parse_filter(doc: &BsonDocument) -> Result<Filter, DbError> {
    let mut clauses = Vec::new();
    for (k, v) in doc {
        match k.as_str() {
            "$and" | "$or" | "$nor" => {
                let subs = logical_operands(k, v)?;
                clauses.push(match k.as_str() {
                    "$and" => Filter::And(subs),
                    "$or" => Filter::Or(subs),
                    _ => Filter::Nor(subs),
                });
            }
            "$comment" => {}
            op if op.starts_with('$') => return Err(qerr(format!("unknown top level operator: {op}"))),
            path => clauses.push(parse_field(path, v)?),
        }
    }
    Ok(combine(clauses))
}

/// # Errors
/// Returns an error if the JSON string is not a valid filter document.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    parse_filter(&parse_json_document(json)?)
}

fn combine(mut clauses: Vec<Filter>) -> Filter {
    match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    }
}

fn logical_operands(op: &str, v: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = v else {
        return Err(qerr(format!("{op} must be an array")));
    };
    if items.is_empty() {
        return Err(qerr(format!("{op} must be a nonempty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(qerr(format!("{op} argument's entries must be objects"))),
        })
        .collect()
}

fn check_path(path: &str) -> Result<(), DbError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(qerr(format!("invalid field path '{path}'")));
    }
    if path.split('.').count() > MAX_PATH_DEPTH {
        return Err(qerr(format!("field path '{path}' is nested too deeply")));
    }
    Ok(())
}

fn is_operator_doc(d: &BsonDocument) -> Result<bool, DbError> {
    let dollar = d.keys().filter(|k| k.starts_with('$')).count();
    if dollar == 0 {
        return Ok(false);
    }
    if dollar != d.len() {
        return Err(qerr("cannot mix operators and plain fields in one field condition"));
    }
    Ok(true)
}

fn parse_field(path: &str, v: &Bson) -> Result<Filter, DbError> {
    check_path(path)?;
    match v {
        Bson::Document(d) if is_operator_doc(d)? => parse_operators(path, d),
        #[cfg(feature = "regex")]
        Bson::RegularExpression(re) => Ok(Filter::Regex {
            path: path.to_string(),
            re: RegexCond::new(re.pattern.as_str(), re.options.as_str())?,
        }),
        _ => Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: v.clone() }),
    }
}

/// Parse an operator document (`{$gte: 100, $lte: 600}`) applied to `path`. An empty
/// path applies the operators to the value itself.
pub(crate) fn parse_operators(path: &str, d: &BsonDocument) -> Result<Filter, DbError> {
    let p = || path.to_string();
    let mut clauses = Vec::new();
    for (op, arg) in d {
        let cmp = |op: CmpOp| Filter::Cmp { path: p(), op, value: arg.clone() };
        let f = match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$ne" => cmp(CmpOp::Ne),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$in" => Filter::In { path: p(), values: value_list(op, arg)? },
            "$nin" => Filter::Nin { path: p(), values: value_list(op, arg)? },
            "$all" => Filter::All { path: p(), values: value_list(op, arg)? },
            "$exists" => Filter::Exists { path: p(), exists: truthy(arg) },
            "$type" => Filter::Type { path: p(), types: type_specs(arg)? },
            "$size" => {
                let n = integral(arg)
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| qerr("$size needs a non-negative integer"))?;
                Filter::Size { path: p(), size: usize::try_from(n).map_err(|e| qerr(e.to_string()))? }
            }
            "$elemMatch" => match arg {
                Bson::Document(inner) => {
                    Filter::ElemMatch { path: p(), cond: Box::new(parse_elem_cond(inner)?) }
                }
                _ => return Err(qerr("$elemMatch needs an object")),
            },
            "$not" => match arg {
                Bson::Document(inner) if !inner.is_empty() && is_operator_doc(inner)? => {
                    Filter::Not(Box::new(parse_operators(path, inner)?))
                }
                #[cfg(feature = "regex")]
                Bson::RegularExpression(re) => Filter::Not(Box::new(Filter::Regex {
                    path: p(),
                    re: RegexCond::new(re.pattern.as_str(), re.options.as_str())?,
                })),
                _ => return Err(qerr("$not needs a regex or a document of operators")),
            },
            #[cfg(feature = "regex")]
            "$regex" => {
                let (pattern, mut options) = match arg {
                    Bson::String(s) => (s.clone(), String::new()),
                    Bson::RegularExpression(re) => (re.pattern.as_str().to_string(), re.options.as_str().to_string()),
                    _ => return Err(qerr("$regex has to be a string")),
                };
                if let Some(o) = d.get("$options") {
                    let Bson::String(o) = o else { return Err(qerr("$options has to be a string")) };
                    options.push_str(o);
                }
                Filter::Regex { path: p(), re: RegexCond::new(&pattern, &options)? }
            }
            #[cfg(feature = "regex")]
            "$options" if d.contains_key("$regex") => continue,
            "$comment" => continue,
            other => return Err(qerr(format!("unknown operator: {other}"))),
        };
        clauses.push(f);
    }
    Ok(combine(clauses))
}

/// `$elemMatch` and `$pull` conditions: an operator document applies to each element
/// value, anything else is a filter over embedded-document elements.
pub(crate) fn parse_elem_cond(d: &BsonDocument) -> Result<ElemCond, DbError> {
    let value_form = !d.is_empty()
        && d.keys().all(|k| k.starts_with('$') && !matches!(k.as_str(), "$and" | "$or" | "$nor"));
    if value_form {
        Ok(ElemCond { filter: parse_operators("", d)?, object: false })
    } else {
        Ok(ElemCond { filter: parse_filter(d)?, object: true })
    }
}

fn value_list(op: &str, v: &Bson) -> Result<Vec<Bson>, DbError> {
    match v {
        Bson::Array(items) if items.len() <= MAX_IN_SET => Ok(items.clone()),
        Bson::Array(_) => Err(qerr(format!("{op} takes at most {MAX_IN_SET} values"))),
        _ => Err(qerr(format!("{op} needs an array"))),
    }
}

pub(crate) fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        n if is_num(n) => super::eval::as_f64(n) != 0.0,
        _ => true,
    }
}

/// An integral number, whatever its BSON numeric type.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn integral(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

fn type_specs(v: &Bson) -> Result<Vec<TypeSpec>, DbError> {
    let one = |t: &Bson| -> Result<TypeSpec, DbError> {
        match t {
            Bson::String(s) if s == "number" => Ok(TypeSpec::Number),
            Bson::String(s) => element_type_for_alias(s)
                .map(TypeSpec::Element)
                .ok_or_else(|| qerr(format!("unknown type name alias: {s}"))),
            n => integral(n)
                .and_then(element_type_for_code)
                .map(TypeSpec::Element)
                .ok_or_else(|| qerr(format!("invalid $type operand of type {}", type_alias(n)))),
        }
    };
    match v {
        Bson::Array(items) if items.is_empty() => Err(qerr("$type needs at least one type")),
        Bson::Array(items) => items.iter().map(one).collect(),
        single => Ok(vec![one(single)?]),
    }
}

/// Parse an update document made of modifier operators.
///
/// # Errors
/// Returns `QueryError` for replacement documents, unknown operators, bad operands,
/// updates to `_id`, and conflicting paths.
pub fn parse_update(doc: &BsonDocument) -> Result<UpdateDoc, DbError> {
    if doc.is_empty() {
        return Err(qerr("update document must not be empty"));
    }
    let mut ops = Vec::new();
    for (op, arg) in doc {
        if !op.starts_with('$') {
            return Err(qerr(format!(
                "update document requires atomic operators, found field '{op}'"
            )));
        }
        let Bson::Document(fields) = arg else {
            return Err(qerr(format!("modifier {op} expects an object, found {}", type_alias(arg))));
        };
        for (path, v) in fields {
            check_path(path)?;
            if path.split('.').any(|s| s.starts_with('$')) {
                return Err(qerr(format!("field path '{path}' must not start with '$'")));
            }
            let path = path.clone();
            ops.push(match op.as_str() {
                "$set" => UpdateOp::Set { path, value: v.clone() },
                "$unset" => UpdateOp::Unset { path },
                "$inc" if is_num(v) => UpdateOp::Inc { path, by: v.clone() },
                "$inc" => {
                    return Err(qerr(format!("cannot increment with non-numeric argument: {path}")));
                }
                "$rename" => match v {
                    Bson::String(to) if *to == path => {
                        return Err(qerr(format!("$rename source and target are the same: {path}")));
                    }
                    Bson::String(to) => {
                        check_path(to)?;
                        UpdateOp::Rename { from: path, to: to.clone() }
                    }
                    _ => return Err(qerr(format!("$rename target for '{path}' must be a string"))),
                },
                "$push" => UpdateOp::Push { values: each_values(op, v)?, path },
                "$addToSet" => UpdateOp::AddToSet { values: each_values(op, v)?, path },
                "$pop" => match integral(v) {
                    Some(1) => UpdateOp::Pop { path, first: false },
                    Some(-1) => UpdateOp::Pop { path, first: true },
                    _ => return Err(qerr("$pop expects 1 or -1")),
                },
                "$pull" => UpdateOp::Pull {
                    criterion: match v {
                        Bson::Document(d) => PullCriterion::Matches(parse_elem_cond(d)?),
                        other => PullCriterion::Equals(other.clone()),
                    },
                    path,
                },
                "$pullAll" => match v {
                    Bson::Array(items) => UpdateOp::PullAll { path, values: items.clone() },
                    _ => return Err(qerr(format!("$pullAll requires an array argument for '{path}'"))),
                },
                other => return Err(qerr(format!("unknown modifier: {other}"))),
            });
        }
    }
    check_paths(&ops)?;
    Ok(UpdateDoc { ops })
}

/// # Errors
/// Returns an error if the JSON string is not a valid update document.
pub fn parse_update_json(json: &str) -> Result<UpdateDoc, DbError> {
    parse_update(&parse_json_document(json)?)
}

/// `$push`/`$addToSet` operand: a single value, or `{$each: [...]}`.
fn each_values(op: &str, v: &Bson) -> Result<Vec<Bson>, DbError> {
    let Bson::Document(d) = v else { return Ok(vec![v.clone()]) };
    if !d.keys().any(|k| k.starts_with('$')) {
        return Ok(vec![v.clone()]);
    }
    if let Some(k) = d.keys().find(|k| *k != "$each") {
        return Err(qerr(format!("unsupported {op} modifier: {k}")));
    }
    match d.get("$each") {
        Some(Bson::Array(items)) => Ok(items.clone()),
        _ => Err(qerr("$each requires an array")),
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long == short || (long.starts_with(short) && long.as_bytes().get(short.len()) == Some(&b'.'))
}

fn check_paths(ops: &[UpdateOp]) -> Result<(), DbError> {
    let paths: Vec<&str> = ops.iter().flat_map(UpdateOp::paths).collect();
    if let Some(p) = paths.iter().find(|p| overlaps(p, "_id")) {
        return Err(qerr(format!(
            "performing an update on the path '{p}' would modify the immutable field '_id'"
        )));
    }
    for (i, a) in paths.iter().enumerate() {
        if let Some(b) = paths[i + 1..].iter().find(|b| overlaps(a, b)) {
            return Err(qerr(format!("updating the path '{b}' would create a conflict at '{a}'")));
        }
    }
    Ok(())
}
