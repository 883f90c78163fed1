use bson::spec::ElementType;
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, ElemCond, Filter, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, SortSpec, TypeSpec};

/// Where path resolution starts: a whole document, or a single array element.
#[derive(Clone, Copy)]
enum Root<'a> {
    Doc(&'a BsonDocument),
    Value(&'a Bson),
}

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    eval(Root::Doc(doc), filter)
}

/// Evaluate an element condition against one array element.
pub fn eval_elem(elem: &Bson, cond: &ElemCond) -> bool {
    if cond.object && !matches!(elem, Bson::Document(_)) {
        return false;
    }
    eval(Root::Value(elem), &cond.filter)
}

fn eval(root: Root<'_>, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval(root, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval(root, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval(root, f)),
        Filter::Not(f) => !eval(root, f),
        Filter::Exists { path, exists } => resolve(root, path).is_empty() != *exists,
        Filter::Cmp { path, op, value } => cmp_matches(&resolve(root, path), *op, value),
        Filter::In { path, values } => in_matches(&resolve(root, path), values),
        Filter::Nin { path, values } => !in_matches(&resolve(root, path), values),
        Filter::Type { path, types } => resolve(root, path).iter().any(|v| {
            type_matches(v, types)
                || matches!(v, Bson::Array(items) if items.iter().any(|e| type_matches(e, types)))
        }),
        Filter::All { path, values } => {
            let cands = resolve(root, path);
            !values.is_empty() && values.iter().all(|q| eq_matches(&cands, q))
        }
        Filter::Size { path, size } => resolve(root, path)
            .iter()
            .any(|v| matches!(v, Bson::Array(items) if items.len() == *size)),
        Filter::ElemMatch { path, cond } => resolve(root, path)
            .iter()
            .any(|v| matches!(v, Bson::Array(items) if items.iter().any(|e| eval_elem(e, cond)))),
        #[cfg(feature = "regex")]
        Filter::Regex { path, re } => resolve(root, path).iter().any(|v| match v {
            Bson::String(s) => re.is_match(s),
            Bson::Array(items) => items.iter().any(|e| matches!(e, Bson::String(s) if re.is_match(s))),
            _ => false,
        }),
    }
}

/// Collect every value reachable at a dotted path. Intermediate arrays fan out over
/// their embedded documents; numeric segments also index arrays.
fn resolve<'a>(root: Root<'a>, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    if path.is_empty() {
        if let Root::Value(v) = root {
            out.push(v);
        }
        return out;
    }
    let segs: Vec<&str> = path.split('.').collect();
    if segs.len() > MAX_PATH_DEPTH {
        return out;
    }
    match root {
        Root::Doc(d) => walk_doc(d, &segs, &mut out),
        Root::Value(v) => walk_value(v, &segs, &mut out),
    }
    out
}

fn walk_doc<'a>(doc: &'a BsonDocument, segs: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segs.split_first() else { return };
    if let Some(v) = doc.get(*head) {
        walk_value(v, rest, out);
    }
}

fn walk_value<'a>(v: &'a Bson, segs: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segs.split_first() else {
        out.push(v);
        return;
    };
    match v {
        Bson::Document(d) => walk_doc(d, segs, out),
        Bson::Array(items) => {
            if let Ok(i) = head.parse::<usize>()
                && let Some(e) = items.get(i)
            {
                walk_value(e, rest, out);
            }
            for e in items {
                if let Bson::Document(d) = e {
                    walk_doc(d, segs, out);
                }
            }
        }
        _ => {}
    }
}

fn eq_matches(cands: &[&Bson], q: &Bson) -> bool {
    if cands.is_empty() {
        return matches!(q, Bson::Null);
    }
    cands.iter().any(|v| {
        values_equal(v, q)
            || matches!(v, Bson::Array(items) if items.iter().any(|e| values_equal(e, q)))
    })
}

fn in_matches(cands: &[&Bson], set: &[Bson]) -> bool {
    set.iter().any(|q| eq_matches(cands, q))
}

fn cmp_matches(cands: &[&Bson], op: CmpOp, q: &Bson) -> bool {
    match op {
        CmpOp::Eq => eq_matches(cands, q),
        CmpOp::Ne => !eq_matches(cands, q),
        _ => cands.iter().any(|v| {
            ordered(v, op, q)
                || matches!(v, Bson::Array(items) if items.iter().any(|e| ordered(e, op, q)))
        }),
    }
}

/// Range operators only compare values of the same type class.
fn ordered(v: &Bson, op: CmpOp, q: &Bson) -> bool {
    if type_class(v) != type_class(q) {
        return false;
    }
    let ord = compare_bson(v, q);
    match op {
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Gte => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Lte => ord != Ordering::Greater,
        CmpOp::Eq | CmpOp::Ne => false,
    }
}

fn type_matches(v: &Bson, types: &[TypeSpec]) -> bool {
    types.iter().any(|t| match t {
        TypeSpec::Number => is_num(v),
        TypeSpec::Element(et) => v.element_type() == *et,
    })
}

pub(crate) fn is_num(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

pub(crate) fn as_f64(v: &Bson) -> f64 {
    match v {
        Bson::Int32(i) => f64::from(*i),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

const fn int_value(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

fn num_cmp(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (int_value(a), int_value(b)) {
        return x.cmp(&y);
    }
    let (x, y) = (as_f64(a), as_f64(b));
    x.partial_cmp(&y).unwrap_or_else(|| x.total_cmp(&y))
}

/// Value equality: numbers by value across numeric types, containers structurally.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return num_cmp(a, b) == Ordering::Equal;
    }
    match (a, b) {
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        }
        (Bson::Null | Bson::Undefined, Bson::Null | Bson::Undefined) => true,
        _ => a == b,
    }
}

/// Canonical sort bracket of a value's type.
fn type_class(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::JavaScriptCodeWithScope(_) => 14,
        Bson::MaxKey => 255,
    }
}

/// Total order over BSON values used by range operators and sorting.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let (ca, cb) = (type_class(a), type_class(b));
    if ca != cb {
        return ca.cmp(&cb);
    }
    match (a, b) {
        _ if is_num(a) && is_num(b) => num_cmp(a, b),
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
        (Bson::Array(x), Bson::Array(y)) => {
            for (p, q) in x.iter().zip(y) {
                let o = compare_bson(p, q);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Document(x), Bson::Document(y)) => {
            for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                let o = compare_bson(va, vb).then_with(|| ka.cmp(kb));
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ka = sort_key(a, &s.field, s.order);
        let kb = sort_key(b, &s.field, s.order);
        let ord = compare_bson(&ka, &kb);
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Missing fields sort as null; arrays sort by their smallest element ascending and
/// their largest descending.
fn sort_key(doc: &BsonDocument, path: &str, order: Order) -> Bson {
    let mut keys: Vec<&Bson> = Vec::new();
    for v in resolve(Root::Doc(doc), path) {
        match v {
            Bson::Array(items) if !items.is_empty() => keys.extend(items.iter()),
            other => keys.push(other),
        }
    }
    let pick = match order {
        Order::Asc => keys.into_iter().min_by(|x, y| compare_bson(x, y)),
        Order::Desc => keys.into_iter().max_by(|x, y| compare_bson(x, y)),
    };
    pick.cloned().unwrap_or(Bson::Null)
}

/// The `$type` alias of a value, used in error messages.
pub(crate) const fn type_alias(v: &Bson) -> &'static str {
    match v {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::Undefined => "undefined",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::DbPointer(_) => "dbPointer",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Timestamp(_) => "timestamp",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
    }
}

/// Map a `$type` alias to its element type.
pub(crate) fn element_type_for_alias(alias: &str) -> Option<ElementType> {
    Some(match alias {
        "double" => ElementType::Double,
        "string" => ElementType::String,
        "object" => ElementType::EmbeddedDocument,
        "array" => ElementType::Array,
        "binData" => ElementType::Binary,
        "undefined" => ElementType::Undefined,
        "objectId" => ElementType::ObjectId,
        "bool" => ElementType::Boolean,
        "date" => ElementType::DateTime,
        "null" => ElementType::Null,
        "regex" => ElementType::RegularExpression,
        "dbPointer" => ElementType::DbPointer,
        "javascript" => ElementType::JavaScriptCode,
        "symbol" => ElementType::Symbol,
        "javascriptWithScope" => ElementType::JavaScriptCodeWithScope,
        "int" => ElementType::Int32,
        "timestamp" => ElementType::Timestamp,
        "long" => ElementType::Int64,
        "decimal" => ElementType::Decimal128,
        "minKey" => ElementType::MinKey,
        "maxKey" => ElementType::MaxKey,
        _ => return None,
    })
}

/// Map a numeric BSON type code to its element type.
pub(crate) const fn element_type_for_code(code: i64) -> Option<ElementType> {
    Some(match code {
        1 => ElementType::Double,
        2 => ElementType::String,
        3 => ElementType::EmbeddedDocument,
        4 => ElementType::Array,
        5 => ElementType::Binary,
        6 => ElementType::Undefined,
        7 => ElementType::ObjectId,
        8 => ElementType::Boolean,
        9 => ElementType::DateTime,
        10 => ElementType::Null,
        11 => ElementType::RegularExpression,
        12 => ElementType::DbPointer,
        13 => ElementType::JavaScriptCode,
        14 => ElementType::Symbol,
        15 => ElementType::JavaScriptCodeWithScope,
        16 => ElementType::Int32,
        17 => ElementType::Timestamp,
        18 => ElementType::Int64,
        19 => ElementType::Decimal128,
        -1 => ElementType::MinKey,
        127 => ElementType::MaxKey,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn cmp(path: &str, op: CmpOp, value: impl Into<Bson>) -> Filter {
        Filter::Cmp { path: path.into(), op, value: value.into() }
    }

    #[test]
    fn numbers_compare_across_types() {
        let d = doc! {"price": 800, "ratio": 0.5_f64};
        assert!(eval_filter(&d, &cmp("price", CmpOp::Eq, 800.0_f64)));
        assert!(eval_filter(&d, &cmp("price", CmpOp::Gte, 800_i64)));
        assert!(eval_filter(&d, &cmp("ratio", CmpOp::Lt, 1)));
    }

    #[test]
    fn range_operators_stay_within_type_class() {
        let d = doc! {"name": "Laptop"};
        assert!(!eval_filter(&d, &cmp("name", CmpOp::Gt, 1)));
        assert!(eval_filter(&d, &cmp("name", CmpOp::Gt, "A")));
    }

    #[test]
    fn missing_fields() {
        let d = doc! {"a": 1};
        assert!(eval_filter(&d, &cmp("b", CmpOp::Eq, Bson::Null)));
        assert!(eval_filter(&d, &cmp("b", CmpOp::Ne, 3)));
        assert!(!eval_filter(&d, &cmp("b", CmpOp::Gt, 0)));
        assert!(eval_filter(&d, &Filter::Nin { path: "b".into(), values: vec![1.into()] }));
        assert!(eval_filter(&d, &Filter::Exists { path: "b".into(), exists: false }));
    }

    #[test]
    fn not_negates_including_missing_fields() {
        let f = crate::query::parse_filter(&doc! {"a": {"$not": {"$gt": 1}}}).unwrap();
        assert!(matches!(f, Filter::Not(_)));
        assert!(!eval_filter(&doc! {"a": 5}, &f));
        assert!(eval_filter(&doc! {"a": 0}, &f));
        assert!(eval_filter(&doc! {}, &f));
        assert!(eval_filter(&doc! {"a": "text"}, &f));
        let in_range = Filter::Not(Box::new(Filter::And(vec![cmp("a", CmpOp::Gte, 1), cmp("a", CmpOp::Lte, 3)])));
        assert!(!eval_filter(&doc! {"a": 2}, &in_range));
        assert!(eval_filter(&doc! {"a": 4}, &in_range));
    }

    #[test]
    fn nor_matches_when_no_clause_does() {
        let f = Filter::Nor(vec![cmp("a", CmpOp::Eq, 1), cmp("b", CmpOp::Eq, 2)]);
        assert!(!eval_filter(&doc! {"a": 1}, &f));
        assert!(!eval_filter(&doc! {"a": 3, "b": 2}, &f));
        assert!(eval_filter(&doc! {"a": 3, "b": 3}, &f));
        assert!(eval_filter(&doc! {}, &f));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_with_options_in_either_order() {
        let d = doc! {"name": "Laptop", "tags": ["office", "Gaming"]};
        let q = |f: bson::Document| eval_filter(&d, &crate::query::parse_filter(&f).unwrap());
        assert!(!q(doc! {"name": {"$regex": "^lap"}}));
        assert!(q(doc! {"name": {"$regex": "^lap", "$options": "i"}}));
        assert!(q(doc! {"name": {"$options": "i", "$regex": "^lap"}}));
        assert!(q(doc! {"tags": {"$regex": "^gam", "$options": "i"}}));
        assert!(!q(doc! {"missing": {"$regex": "."}}));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn negated_regex() {
        let f = crate::query::parse_filter(&doc! {"name": {"$not": {"$regex": "^t", "$options": "i"}}}).unwrap();
        assert!(eval_filter(&doc! {"name": "Laptop"}, &f));
        assert!(!eval_filter(&doc! {"name": "T-shirt"}, &f));
        assert!(eval_filter(&doc! {}, &f));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn invalid_regex_is_a_query_error() {
        use crate::errors::DbError;
        let err = crate::query::parse_filter(&doc! {"n": {"$regex": "("}}).unwrap_err();
        assert!(matches!(err, DbError::QueryError(ref m) if m.contains("invalid $regex")), "{err}");
        assert!(crate::query::parse_filter(&doc! {"n": {"$regex": "a", "$options": "q"}}).is_err());
        assert!(crate::query::parse_filter(&doc! {"n": {"$options": "i"}}).is_err());
    }

    #[test]
    fn scalar_matches_array_element_or_whole_array() {
        let d = doc! {"tags": ["technology", "office"]};
        assert!(eval_filter(&d, &cmp("tags", CmpOp::Eq, "office")));
        assert!(eval_filter(&d, &cmp("tags", CmpOp::Eq, vec!["technology", "office"])));
        assert!(!eval_filter(&d, &cmp("tags", CmpOp::Eq, vec!["office", "technology"])));
        assert!(!eval_filter(&d, &cmp("tags", CmpOp::Ne, "office")));
    }

    #[test]
    fn dotted_paths_fan_out_over_arrays_of_documents() {
        let d = doc! {"skills": [{"name": "Java"}, {"name": "Kotlin"}], "meta": {"a": {"b": 2}}};
        assert!(eval_filter(&d, &cmp("skills.name", CmpOp::Eq, "Kotlin")));
        assert!(eval_filter(&d, &cmp("skills.1.name", CmpOp::Eq, "Kotlin")));
        assert!(!eval_filter(&d, &cmp("skills.0.name", CmpOp::Eq, "Kotlin")));
        assert!(eval_filter(&d, &cmp("meta.a.b", CmpOp::Gt, 1)));
    }

    #[test]
    fn type_all_size() {
        let d = doc! {"price": 800, "tags": ["a", "b"], "d": 1.5};
        let ty = |p: &str, t: TypeSpec| Filter::Type { path: p.into(), types: vec![t] };
        assert!(!eval_filter(&d, &ty("price", TypeSpec::Element(ElementType::Double))));
        assert!(eval_filter(&d, &ty("price", TypeSpec::Element(ElementType::Int32))));
        assert!(eval_filter(&d, &ty("d", TypeSpec::Number)));
        assert!(eval_filter(&d, &ty("tags", TypeSpec::Element(ElementType::Array))));
        assert!(eval_filter(&d, &ty("tags", TypeSpec::Element(ElementType::String))));
        let all = |v: Vec<&str>| Filter::All {
            path: "tags".into(),
            values: v.into_iter().map(Bson::from).collect(),
        };
        assert!(eval_filter(&d, &all(vec!["b", "a"])));
        assert!(!eval_filter(&d, &all(vec!["a", "z"])));
        assert!(!eval_filter(&d, &all(vec![])));
        assert!(eval_filter(&d, &Filter::Size { path: "tags".into(), size: 2 }));
        assert!(!eval_filter(&d, &Filter::Size { path: "price".into(), size: 1 }));
    }

    #[test]
    fn elem_match_value_and_object_forms() {
        let d = doc! {"tags": ["audio", "tech"], "skills": [{"name": "Java", "level": 3}, 7]};
        let value_form = Filter::ElemMatch {
            path: "tags".into(),
            cond: Box::new(ElemCond { filter: cmp("", CmpOp::Eq, "audio"), object: false }),
        };
        assert!(eval_filter(&d, &value_form));
        let object_form = Filter::ElemMatch {
            path: "skills".into(),
            cond: Box::new(ElemCond {
                filter: Filter::And(vec![cmp("name", CmpOp::Eq, "Java"), cmp("level", CmpOp::Gte, 3)]),
                object: true,
            }),
        };
        assert!(eval_filter(&d, &object_form));
        let scalar_only = Filter::ElemMatch {
            path: "skills".into(),
            cond: Box::new(ElemCond { filter: cmp("name", CmpOp::Ne, "Java"), object: true }),
        };
        assert!(!eval_filter(&d, &scalar_only));
    }

    #[test]
    fn sort_orders_types_then_values() {
        let mut vals = vec![Bson::from("b"), Bson::from(3), Bson::Null, Bson::from(1.5), Bson::from(true)];
        vals.sort_by(compare_bson);
        assert_eq!(
            vals,
            vec![Bson::Null, Bson::from(1.5), Bson::from(3), Bson::from("b"), Bson::from(true)]
        );
    }

    #[test]
    fn compare_docs_with_missing_and_desc() {
        let a = doc! {"price": 10};
        let b = doc! {"name": "no price"};
        let asc = [SortSpec { field: "price".into(), order: Order::Asc }];
        let desc = [SortSpec { field: "price".into(), order: Order::Desc }];
        assert_eq!(compare_docs(&a, &b, &asc), Ordering::Greater);
        assert_eq!(compare_docs(&a, &b, &desc), Ordering::Less);
    }
}
