//! Bridging between `serde_json` values and BSON, using relaxed extended JSON for the
//! types JSON cannot carry.

use bson::oid::ObjectId;
use bson::{Bson, DateTime, Decimal128, Document as BsonDocument};
use serde_json::{Map, Value, json};

use crate::errors::DbError;

fn invalid(msg: impl Into<String>) -> DbError {
    DbError::QueryError(msg.into())
}

/// Convert JSON to BSON. Integers that fit `i32` become `Int32`, larger ones `Int64`,
/// and other numbers `Double`. Single-key extended JSON wrappers such as `{"$oid": ..}`
/// and `{"$date": ..}` are decoded.
///
/// # Errors
/// Returns `QueryError` for malformed extended JSON wrappers.
pub fn json_to_bson(v: &Value) -> Result<Bson, DbError> {
    Ok(match v {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32)
            } else {
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect::<Result<_, _>>()?),
        Value::Object(map) => match extended(map)? {
            Some(b) => b,
            None => Bson::Document(object_to_document(map)?),
        },
    })
}

fn object_to_document(map: &Map<String, Value>) -> Result<BsonDocument, DbError> {
    let mut out = BsonDocument::new();
    for (k, v) in map {
        out.insert(k.clone(), json_to_bson(v)?);
    }
    Ok(out)
}

fn extended(map: &Map<String, Value>) -> Result<Option<Bson>, DbError> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((k, v)) = map.iter().next() else { return Ok(None) };
    let text = || v.as_str().ok_or_else(|| invalid(format!("{k} expects a string")));
    Ok(Some(match k.as_str() {
        "$oid" => Bson::ObjectId(ObjectId::parse_str(text()?).map_err(|e| invalid(e.to_string()))?),
        "$date" => Bson::DateTime(match v {
            Value::String(s) => parse_date(s)?,
            Value::Number(n) => DateTime::from_millis(n.as_i64().ok_or_else(|| invalid("bad $date"))?),
            Value::Object(inner) => match inner.get("$numberLong").and_then(Value::as_str) {
                Some(s) => DateTime::from_millis(s.parse().map_err(|_| invalid("bad $date"))?),
                None => return Err(invalid("bad $date")),
            },
            _ => return Err(invalid("bad $date")),
        }),
        "$numberInt" => Bson::Int32(text()?.parse().map_err(|_| invalid("bad $numberInt"))?),
        "$numberLong" => Bson::Int64(text()?.parse().map_err(|_| invalid("bad $numberLong"))?),
        "$numberDouble" => Bson::Double(match text()? {
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            s => s.parse().map_err(|_| invalid("bad $numberDouble"))?,
        }),
        "$numberDecimal" => Bson::Decimal128(parse_decimal(text()?)?),
        _ => return Ok(None),
    }))
}

/// Parse an RFC 3339 timestamp into a BSON date.
///
/// # Errors
/// Returns `QueryError` when the text is not a valid timestamp.
pub fn parse_date(s: &str) -> Result<DateTime, DbError> {
    let parsed = chrono::DateTime::parse_from_rfc3339(s)
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(&format!("{s}T00:00:00Z")))
        .map_err(|e| invalid(format!("invalid date '{s}': {e}")))?;
    Ok(DateTime::from_millis(parsed.timestamp_millis()))
}

/// # Errors
/// Returns `QueryError` when the text is not a decimal number.
pub fn parse_decimal(s: &str) -> Result<Decimal128, DbError> {
    s.parse::<Decimal128>().map_err(|e| invalid(format!("invalid decimal '{s}': {e}")))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Render BSON as relaxed extended JSON.
#[must_use]
pub fn bson_to_json(v: &Bson) -> Value {
    match v {
        Bson::Double(f) if f.is_finite() => json!(f),
        Bson::Double(f) => {
            let s = if f.is_nan() { "NaN" } else if *f > 0.0 { "Infinity" } else { "-Infinity" };
            json!({"$numberDouble": s})
        }
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(d) => document_to_json(d),
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Null => Value::Null,
        Bson::Int32(i) => json!(i),
        Bson::Int64(i) => json!(i),
        Bson::ObjectId(oid) => json!({"$oid": oid.to_hex()}),
        Bson::DateTime(dt) => {
            match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(dt.timestamp_millis()) {
                Some(c) => json!({"$date": c.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)}),
                None => json!({"$date": {"$numberLong": dt.timestamp_millis().to_string()}}),
            }
        }
        Bson::Decimal128(d) => json!({"$numberDecimal": d.to_string()}),
        Bson::Binary(b) => json!({"$binary": {"hex": hex(&b.bytes), "subType": format!("{:02x}", u8::from(b.subtype))}}),
        Bson::Timestamp(ts) => json!({"$timestamp": {"t": ts.time, "i": ts.increment}}),
        Bson::RegularExpression(re) => json!({
            "$regularExpression": {"pattern": re.pattern.as_str(), "options": re.options.as_str()}
        }),
        Bson::JavaScriptCode(code) => json!({"$code": code}),
        Bson::JavaScriptCodeWithScope(c) => json!({"$code": c.code, "$scope": document_to_json(&c.scope)}),
        Bson::Symbol(s) => json!({"$symbol": s}),
        Bson::Undefined => json!({"$undefined": true}),
        Bson::MaxKey => json!({"$maxKey": 1}),
        Bson::MinKey => json!({"$minKey": 1}),
        Bson::DbPointer(_) => json!({"$dbPointer": {}}),
    }
}

#[must_use]
pub fn document_to_json(d: &BsonDocument) -> Value {
    Value::Object(d.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect())
}

/// Parse a JSON string into a BSON document. The JSON must be a top-level object.
///
/// # Errors
/// Returns `Json` for malformed JSON and `QueryError` for non-object input.
pub fn parse_json_document(json: &str) -> Result<BsonDocument, DbError> {
    let val: Value = serde_json::from_str(json)?;
    match &val {
        Value::Object(map) => object_to_document(map),
        _ => Err(invalid("expected a JSON object")),
    }
}
