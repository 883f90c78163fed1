use bson::{Bson, doc};
use nexus_shell::Database;
use nexus_shell::shell::OutputEvent;

use crate::integration_tests::support::{array_len, names, results};

const PRODUCTS: &str = include_str!("../../../scripts/products.js");

fn run_products() -> (Database, Vec<Bson>) {
    let db = Database::new();
    let events = db.run_script(PRODUCTS).unwrap();
    assert!(events.iter().all(|e| matches!(e, OutputEvent::Result { .. })));
    (db, results(&events))
}

#[test]
fn every_statement_echoes_in_order() {
    let db = Database::new();
    let events = db.run_script(PRODUCTS).unwrap();
    let stmts: Vec<usize> = events.iter().map(OutputEvent::stmt).collect();
    assert_eq!(stmts, (1..=21).collect::<Vec<_>>());
}

#[test]
fn insert_many_acknowledges_five_ids() {
    let (db, r) = run_products();
    let ack = r[0].as_document().unwrap();
    assert!(ack.get_bool("acknowledged").unwrap());
    let ids = ack.get_document("insertedIds").unwrap();
    assert_eq!(ids.keys().cloned().collect::<Vec<_>>(), vec!["0", "1", "2", "3", "4"]);
    assert!(ids.values().all(|v| matches!(v, Bson::ObjectId(_))));
    assert_eq!(db.get_collection("products").unwrap().len(), 5);
}

#[test]
fn reads_match_the_sample_data() {
    let (_db, r) = run_products();
    assert_eq!(array_len(&r[1]), 5);
    let laptop = r[2].as_document().unwrap();
    assert_eq!(laptop.get_str("name").unwrap(), "Laptop");
    assert_eq!(laptop.get("price"), Some(&Bson::Int32(800)));
    assert!(matches!(laptop.get("_id"), Some(Bson::ObjectId(_))));

    assert_eq!(names(&r[3]), vec!["Smartphone", "Headphones"]);
    assert_eq!(array_len(&r[4]), 5);
    assert_eq!(array_len(&r[5]), 5);
    assert_eq!(names(&r[6]), vec!["Laptop", "Smartphone", "Headphones"]);
    assert_eq!(r[6], r[7]);
    assert_eq!(names(&r[8]), vec!["T-shirt"]);
}

#[test]
fn projection_keeps_id_name_and_price() {
    let (_db, r) = run_products();
    for d in r[9].as_array().unwrap() {
        let keys: Vec<&str> = d.as_document().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "name", "price"]);
    }
}

#[test]
fn existence_type_and_array_operators() {
    let (_db, r) = run_products();
    assert_eq!(array_len(&r[10]), 0, "no discount before the updates");
    assert_eq!(array_len(&r[11]), 0, "integer literals are not doubles");
    assert_eq!(names(&r[12]), vec!["Smartphone"]);
    assert_eq!(names(&r[13]), vec!["Headphones"]);
    assert_eq!(array_len(&r[14]), 5);
}

#[test]
fn update_acknowledgements() {
    let (_db, r) = run_products();
    let counts: Vec<(i32, i32)> = r[15..]
        .iter()
        .map(|a| {
            let a = a.as_document().unwrap();
            (a.get_i32("matchedCount").unwrap(), a.get_i32("modifiedCount").unwrap())
        })
        .collect();
    // $addToSet of an existing tag matches without modifying
    assert_eq!(counts, vec![(1, 1), (1, 1), (1, 0), (1, 1), (1, 1), (1, 1)]);
}

#[test]
fn laptop_ends_with_office_tag_only() {
    let (db, _) = run_products();
    let events = db.run_script("db.products.findOne({ name: 'Laptop' }, { _id: 0 })").unwrap();
    let laptop = results(&events).remove(0);
    assert_eq!(
        laptop,
        Bson::Document(doc! {
            "name": "Laptop", "price": 800, "category": "Electronics", "stock": 50, "tags": ["office"]
        })
    );
}

#[test]
fn other_products_are_untouched() {
    let (db, _) = run_products();
    let events = db.run_script("db.products.find({ name: { $ne: 'Laptop' } }, { tags: 1, _id: 0 })").unwrap();
    assert_eq!(
        results(&events).remove(0),
        Bson::Array(vec![
            Bson::Document(doc! {"tags": ["technology", "portable"]}),
            Bson::Document(doc! {"tags": ["fashion", "casual"]}),
            Bson::Document(doc! {"tags": ["technology", "audio"]}),
            Bson::Document(doc! {"tags": ["fashion", "denim"]}),
        ])
    );
}
