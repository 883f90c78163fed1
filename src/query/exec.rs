use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::types::DocumentId;
use crate::utils::num::{u128_to_u64_saturating, usize_to_u64};
use bson::Document as BsonDocument;
use std::sync::Arc;
use std::time::Instant;

use super::cursor::Cursor;
use super::eval::{compare_docs, eval_filter};
use super::projection::Projection;
use super::telemetry;
use super::types::{
    DeleteReport, Filter, FindOptions, InsertManyReport, MAX_SORT_FIELDS, UpdateDoc, UpdateReport,
};
use super::update::apply_update;

fn elapsed_ms(start: Instant) -> u64 {
    u128_to_u64_saturating(start.elapsed().as_millis())
}

fn matching(col: &Collection, filter: &Filter) -> Vec<Document> {
    col.get_all_documents().into_iter().filter(|d| eval_filter(&d.data, filter)).collect()
}

#[must_use]
pub fn find_docs(col: &Arc<Collection>, filter: &Filter, opts: &FindOptions) -> Cursor {
    let bench_start = Instant::now();
    let mut docs = matching(col, filter);

    if let Some(sort) = &opts.sort {
        if sort.len() > MAX_SORT_FIELDS {
            log::warn!("sort spec too long: {}", sort.len());
        }
        // stable: ties keep natural order
        docs.sort_by(|a, b| compare_docs(&a.data, &b.data, sort));
    }

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
    let mut docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();

    if let Some(p) = opts.projection.as_ref().filter(|p| !p.is_identity()) {
        for d in &mut docs {
            d.data = p.apply(&d.data);
        }
    }

    let dur_ms = elapsed_ms(bench_start);
    crate::dev6!(
        "bench" => "query",
        "op" => "find",
        "collection" => col.name_str(),
        "duration_ms" => dur_ms,
        "result_count" => usize_to_u64(docs.len()),
        "limit" => usize_to_u64(opts.limit.unwrap_or(0)),
        "skip" => usize_to_u64(skip),
    );
    telemetry::log_query(&col.name_str(), &format!("{filter:?}"), u128::from(dur_ms), docs.len());
    Cursor::new(docs)
}

/// First match in natural order, projected.
#[must_use]
pub fn find_one(col: &Arc<Collection>, filter: &Filter, projection: Option<&Projection>) -> Option<Document> {
    let opts = FindOptions { projection: projection.cloned(), limit: Some(1), ..FindOptions::default() };
    find_docs(col, filter, &opts).next()
}

#[must_use]
pub fn count_docs(col: &Arc<Collection>, filter: &Filter) -> usize {
    let start = Instant::now();
    let n = col.get_all_documents().iter().filter(|d| eval_filter(&d.data, filter)).count();
    crate::dev6!(
        "bench" => "query",
        "op" => "count",
        "collection" => col.name_str(),
        "duration_ms" => elapsed_ms(start),
        "result_count" => usize_to_u64(n),
    );
    telemetry::log_query(&col.name_str(), &format!("{filter:?}"), start.elapsed().as_millis(), n);
    n
}

/// # Errors
/// Returns `DuplicateKey` or `QueryError` when the document cannot be stored.
pub fn insert_one(col: &Arc<Collection>, data: BsonDocument) -> Result<DocumentId, DbError> {
    let start = Instant::now();
    let id = col.insert_document(Document::new(data))?;
    crate::dev6!(
        "bench" => "query",
        "op" => "insert_one",
        "collection" => col.name_str(),
        "duration_ms" => elapsed_ms(start),
        "inserted" => 1_u64,
    );
    Ok(id)
}

/// Ordered insert: stops at the first failure.
///
/// # Errors
/// Returns `BulkWrite` carrying how many documents went in before the failure.
pub fn insert_many(col: &Arc<Collection>, docs: Vec<BsonDocument>) -> Result<InsertManyReport, DbError> {
    let start = Instant::now();
    let mut report = InsertManyReport::default();
    for data in docs {
        match col.insert_document(Document::new(data)) {
            Ok(id) => report.inserted.push(id),
            Err(e) => {
                log::warn!("insert_many into {} stopped: {e}", col.name_str());
                return Err(DbError::BulkWrite { inserted: report.inserted.len(), message: e.to_string() });
            }
        }
    }
    crate::dev6!(
        "bench" => "query",
        "op" => "insert_many",
        "collection" => col.name_str(),
        "duration_ms" => elapsed_ms(start),
        "inserted" => usize_to_u64(report.inserted.len()),
    );
    Ok(report)
}

fn update_matching(
    col: &Arc<Collection>,
    filter: &Filter,
    update: &UpdateDoc,
    many: bool,
) -> Result<UpdateReport, DbError> {
    let bench_start = Instant::now();
    let mut report = UpdateReport::default();
    for mut doc in matching(col, filter) {
        report.matched += 1;
        let id = doc.id.clone();
        if apply_update(&mut doc, update)? && col.update_document(&id, doc) {
            report.modified += 1;
        }
        if !many {
            break;
        }
    }
    crate::dev6!(
        "bench" => "query",
        "op" => if many { "update_many" } else { "update_one" },
        "collection" => col.name_str(),
        "duration_ms" => elapsed_ms(bench_start),
        "matched" => report.matched,
        "modified" => report.modified,
    );
    Ok(report)
}

/// # Errors
/// Returns `UpdateError` when an operator cannot be applied to the matched document.
pub fn update_one(col: &Arc<Collection>, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
    update_matching(col, filter, update, false)
}

/// Documents updated before a failing one stay updated.
///
/// # Errors
/// Returns `UpdateError` when an operator cannot be applied to a matched document.
pub fn update_many(col: &Arc<Collection>, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
    update_matching(col, filter, update, true)
}

fn delete_matching(col: &Arc<Collection>, filter: &Filter, many: bool) -> DeleteReport {
    let bench_start = Instant::now();
    let mut deleted = 0u64;
    for doc in matching(col, filter) {
        if col.delete_document(&doc.id) {
            deleted += 1;
        }
        if !many {
            break;
        }
    }
    crate::dev6!(
        "bench" => "query",
        "op" => if many { "delete_many" } else { "delete_one" },
        "collection" => col.name_str(),
        "duration_ms" => elapsed_ms(bench_start),
        "deleted" => deleted,
    );
    DeleteReport { deleted }
}

#[must_use]
pub fn delete_one(col: &Arc<Collection>, filter: &Filter) -> DeleteReport {
    delete_matching(col, filter, false)
}

#[must_use]
pub fn delete_many(col: &Arc<Collection>, filter: &Filter) -> DeleteReport {
    delete_matching(col, filter, true)
}
