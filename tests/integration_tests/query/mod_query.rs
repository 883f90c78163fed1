use bson::{Bson, doc};
use nexus_shell::document::Document;
use nexus_shell::errors::DbError;
use nexus_shell::query::{apply_update, eval_filter, parse_filter, parse_filter_json, parse_update_json};
use nexus_shell::telemetry;
use parking_lot::RwLock;
use std::sync::Arc;

fn matches(filter: &str, doc: &bson::Document) -> bool {
    eval_filter(doc, &parse_filter_json(filter).unwrap())
}

#[test]
fn dotted_paths_reach_into_arrays_of_documents() {
    let user = doc! {"skills": [{"name": "Java"}, {"name": "Go"}]};
    assert!(matches(r#"{"skills.name": "Go"}"#, &user));
    assert!(matches(r#"{"skills.name": {"$all": ["Go", "Java"]}}"#, &user));
    assert!(!matches(r#"{"skills": {"$all": ["Go"]}}"#, &user));
    assert!(matches(r#"{"skills": {"$elemMatch": {"name": "Java"}}}"#, &user));
}

#[test]
fn numeric_comparisons_cross_types() {
    let d = doc! {"i": 5, "l": 5_i64, "f": 5.0};
    assert!(matches(r#"{"i": 5.0, "l": 5, "f": 5}"#, &d));
    assert!(matches(r#"{"i": {"$gt": 4.5}}"#, &d));
    assert!(!matches(r#"{"i": {"$gt": "4"}}"#, &d));
}

#[test]
fn missing_fields_and_nulls() {
    let d = doc! {"a": Bson::Null};
    assert!(matches(r#"{"a": null}"#, &d));
    assert!(matches(r#"{"b": null}"#, &d));
    assert!(matches(r#"{"a": {"$exists": true}}"#, &d));
    assert!(!matches(r#"{"b": {"$exists": true}}"#, &d));
    assert!(matches(r#"{"b": {"$nin": [1]}}"#, &d));
}

#[test]
fn invalid_filters_and_updates() {
    assert!(matches!(parse_filter_json(r#"{"$where": 1}"#), Err(DbError::QueryError(_))));
    assert!(matches!(parse_filter_json(r#"{"a": {"$in": 1}}"#), Err(DbError::QueryError(_))));
    assert!(parse_filter(&doc! {"a": {"$size": -1}}).is_err());
    assert!(parse_update_json(r#"{"a": 1}"#).is_err());
    assert!(parse_update_json(r#"{"$set": {"a": 1}, "$unset": {"a": ""}}"#).is_err());
}

#[test]
fn update_operators_on_a_document() {
    let mut d = Document::new(doc! {"_id": 1, "tags": ["a", "b"], "n": 1});
    let u = parse_update_json(
        r#"{"$push": {"tags": "c"}, "$inc": {"n": 2}, "$addToSet": {"set": "x"}, "$pull": {"tags": "a"}}"#,
    );
    // conflicting paths on tags
    assert!(u.is_err());

    let u = parse_update_json(r#"{"$push": {"tags": {"$each": ["c", "d"]}}, "$inc": {"n": 2}, "$addToSet": {"set": "x"}}"#)
        .unwrap();
    assert!(apply_update(&mut d, &u).unwrap());
    assert_eq!(d.data, doc! {"_id": 1, "tags": ["a", "b", "c", "d"], "n": 3, "set": ["x"]});

    let noop = parse_update_json(r#"{"$addToSet": {"set": "x"}, "$pull": {"tags": "zz"}}"#).unwrap();
    assert!(!apply_update(&mut d, &noop).unwrap());
}

#[test]
fn writes_reach_the_audit_sink() {
    let sink = Arc::new(RwLock::new(Vec::new()));
    telemetry::set_audit_enabled(true);
    telemetry::set_audit_sink_for_tests(sink.clone());
    let db = nexus_shell::Database::new();
    db.run_script("db.audited_writes.insertOne({ _id: 'w1' })").unwrap();
    let lines = sink.read().clone();
    assert!(
        lines.iter().any(|l| l.contains("\"collection\":\"audited_writes\"") && l.contains("\"op\":\"insert\"")),
        "{lines:?}"
    );
    assert!(telemetry::metrics_text().contains("nexus_shell_audits_total"));
}

#[cfg(feature = "regex")]
#[test]
fn shell_regex_queries() {
    let db = nexus_shell::Database::new();
    db.run_script("db.rx.insertMany([{ n: 'Laptop' }, { n: 'T-shirt' }])").unwrap();
    let events = db.run_script("db.rx.find({ n: { $regex: 'shirt$' } }, { _id: 0 })").unwrap();
    let nexus_shell::shell::OutputEvent::Result { value, .. } = &events[0] else { panic!("expected a result") };
    assert_eq!(value, &Bson::Array(vec![Bson::Document(doc! {"n": "T-shirt"})]));
    let err = db.run_script("db.rx.find({ n: { $regex: '(' } })").unwrap_err();
    assert!(err.to_string().contains("invalid $regex"), "{err}");
}
