use bson::{Bson, doc};
use nexus_shell::Database;
use nexus_shell::document::MAX_BSON_SIZE;
use nexus_shell::errors::DbError;
use nexus_shell::query::{FindOptions, Order, Projection, SortSpec, parse_filter, parse_update};
use nexus_shell::types::DocumentId;

fn seeded() -> Database {
    let db = Database::new();
    for (i, name) in ["b", "a", "c"].iter().enumerate() {
        db.insert_one("items", doc! {"_id": i64::try_from(i).unwrap(), "name": *name, "qty": 10 * i32::try_from(i).unwrap()})
            .unwrap();
    }
    db
}

#[test]
fn insert_creates_the_collection() {
    let db = seeded();
    assert_eq!(db.list_collection_names(), vec!["items".to_string()]);
    let dup = db.insert_one("items", doc! {"_id": 0_i64});
    assert!(matches!(dup, Err(DbError::DuplicateKey(_))));
}

#[test]
fn find_with_sort_skip_limit_and_projection() {
    let db = seeded();
    let opts = FindOptions {
        projection: Some(Projection::parse(&doc! {"name": 1}).unwrap()),
        sort: Some(vec![SortSpec { field: "name".into(), order: Order::Desc }]),
        limit: Some(2),
        skip: Some(1),
    };
    let docs: Vec<_> = db.find("items", &parse_filter(&doc! {}).unwrap(), &opts).unwrap().map(|d| d.data).collect();
    assert_eq!(docs, vec![doc! {"_id": 0_i64, "name": "b"}, doc! {"_id": 1_i64, "name": "a"}]);
}

#[test]
fn update_and_delete_reports() {
    let db = seeded();
    let all = parse_filter(&doc! {}).unwrap();
    let r = db.update_many("items", &all, &parse_update(&doc! {"$inc": {"qty": 1}}).unwrap()).unwrap();
    assert_eq!((r.matched, r.modified), (3, 3));
    let big = parse_filter(&doc! {"qty": {"$gt": 5}}).unwrap();
    assert_eq!(db.count("items", &big).unwrap(), 2);
    let r = db.update_one("items", &big, &parse_update(&doc! {"$set": {"qty": 11}}).unwrap()).unwrap();
    assert_eq!((r.matched, r.modified), (1, 0));
    assert_eq!(db.delete_one("items", &big).unwrap().deleted, 1);
    assert_eq!(db.delete_many("items", &all).unwrap().deleted, 2);
    assert_eq!(db.count("items", &all).unwrap(), 0);
}

#[test]
fn missing_collections_are_errors_on_the_facade() {
    let db = Database::new();
    let all = parse_filter(&doc! {}).unwrap();
    assert!(matches!(db.count("nope", &all), Err(DbError::NoSuchCollection(_))));
    assert!(matches!(db.find("nope", &all, &FindOptions::default()), Err(DbError::NoSuchCollection(_))));
}

#[test]
fn find_by_id_matches_numerically() {
    let db = seeded();
    let found = db.find_by_id("items", &DocumentId(Bson::Double(1.0))).unwrap();
    assert_eq!(found.data.get_str("name").unwrap(), "a");
    let missing = db.find_by_id("items", &DocumentId(Bson::Int64(9)));
    assert!(matches!(missing, Err(DbError::NoSuchDocument(m)) if m.contains("items")));
    let no_col = db.find_by_id("nope", &DocumentId(Bson::Int64(0)));
    assert!(matches!(no_col, Err(DbError::NoSuchCollection(_))));
}

#[test]
fn collection_admin() {
    let db = Database::new();
    db.create_collection("one").unwrap();
    assert!(matches!(db.create_collection("one"), Err(DbError::CollectionAlreadyExists(_))));
    assert!(matches!(db.create_collection("bad$name"), Err(DbError::InvalidCollectionName(_))));
    db.rename_collection("one", "two").unwrap();
    assert_eq!(db.list_collection_names(), vec!["two".to_string()]);
    assert!(db.delete_collection("two"));
    assert!(!db.delete_collection("two"));
}

#[test]
fn save_and_open_preserve_documents_and_types() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    db.run_script(
        "db.kinds.insertOne({ _id: 'k', i: 1, l: NumberLong(2), d: 2.5, at: ISODate('2024-01-02T03:04:05Z'), arr: [1, 'x'] })",
    )
    .unwrap();
    db.save().unwrap();
    assert!(dir.path().join("kinds.bson").is_file());

    let reopened = Database::open(dir.path()).unwrap();
    let doc = reopened.get_collection("kinds").unwrap().get_all_documents().remove(0).data;
    assert_eq!(doc.get("i"), Some(&Bson::Int32(1)));
    assert_eq!(doc.get("l"), Some(&Bson::Int64(2)));
    assert_eq!(doc.get("d"), Some(&Bson::Double(2.5)));
    assert!(matches!(doc.get("at"), Some(Bson::DateTime(_))));
    assert_eq!(doc.keys().next().map(String::as_str), Some("_id"));
}

#[test]
fn dropped_collections_disappear_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    db.run_script("db.gone.insertOne({}); db.kept.insertOne({})").unwrap();
    db.save().unwrap();
    db.run_script("db.gone.drop()").unwrap();
    db.save().unwrap();
    let reopened = Database::open(dir.path()).unwrap();
    assert_eq!(reopened.list_collection_names(), vec!["kept".to_string()]);
}

#[test]
fn in_memory_save_is_a_no_op() {
    let db = Database::default();
    assert!(db.data_dir().is_none());
    db.save().unwrap();
}

#[test]
fn oversized_writes_are_rejected_and_dumps_stay_readable() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let huge = "x".repeat(MAX_BSON_SIZE + 1);
    assert!(matches!(db.insert_one("big", doc! {"_id": 1, "s": huge.as_str()}), Err(DbError::QueryError(_))));
    db.insert_one("big", doc! {"_id": 2, "s": "fits"}).unwrap();
    db.insert_one("small", doc! {"_id": 3}).unwrap();
    let set_huge = parse_update(&doc! {"$set": {"s": huge.as_str()}}).unwrap();
    let err = db.update_one("big", &parse_filter(&doc! {"_id": 2}).unwrap(), &set_huge).unwrap_err();
    assert!(matches!(err, DbError::UpdateError(_)), "{err}");
    db.save().unwrap();

    let reopened = Database::open(dir.path()).unwrap();
    assert_eq!(reopened.list_collection_names(), vec!["big".to_string(), "small".to_string()]);
    let kept = reopened.get_collection("big").unwrap().get_all_documents().remove(0).data;
    assert_eq!(kept, doc! {"_id": 2, "s": "fits"});
}
