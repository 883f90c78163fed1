use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document as BsonDocument, doc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::engine::{Engine, validate_collection_name};
use crate::errors::DbError;
use crate::query::{
    self, Filter, FindOptions, MAX_SORT_FIELDS, Order, Projection, SortSpec, UpdateReport, as_f64, integral, is_num, truthy, type_alias,
};
use crate::utils::json::{parse_date, parse_decimal};
use crate::utils::num::f64_to_i32_exact;

use super::output::{OutputEvent, OutputSink};
use super::parser::{Expr, ExprKind, Stmt, StmtKind, parse_program};

/// Name the shell reports for `db`.
pub const DB_NAME: &str = "test";

/// A deferred `find`: it runs each time the cursor is printed or read.
#[derive(Debug, Clone)]
pub struct CursorSpec {
    pub collection: String,
    pub filter: Filter,
    pub options: FindOptions,
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Bson(Bson),
    Db,
    Console,
    Collection(String),
    Cursor(Box<CursorSpec>),
}

/// Runtime error without a position yet; the enclosing call or statement fills it in.
fn rt(msg: impl Into<String>) -> DbError {
    DbError::ScriptError { line: 0, col: 0, msg: msg.into() }
}

fn num_to_bson(n: f64) -> Bson {
    f64_to_i32_exact(n).map_or(Bson::Double(n), Bson::Int32)
}

fn count_bson(n: u64) -> Bson {
    i32::try_from(n).map_or_else(|_| Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)), Bson::Int32)
}

fn len_bson(n: usize) -> Bson {
    count_bson(crate::utils::num::usize_to_u64(n))
}

fn negate(v: Bson) -> Result<Bson, DbError> {
    match v {
        Bson::Int32(i) => Ok(i.checked_neg().map_or_else(|| Bson::Int64(-i64::from(i)), Bson::Int32)),
        Bson::Int64(i) => i.checked_neg().map(Bson::Int64).ok_or_else(|| rt("numeric overflow")),
        Bson::Double(d) => Ok(Bson::Double(-d)),
        other => Err(rt(format!("cannot negate a value of type {}", type_alias(&other)))),
    }
}

fn to_number(v: Bson) -> Bson {
    match v {
        n if is_num(&n) => n,
        Bson::String(s) if s.trim().is_empty() => Bson::Int32(0),
        Bson::String(s) => s.trim().parse::<f64>().map_or(Bson::Double(f64::NAN), num_to_bson),
        Bson::Boolean(b) => Bson::Int32(i32::from(b)),
        Bson::Null => Bson::Int32(0),
        _ => Bson::Double(f64::NAN),
    }
}

fn opt_doc(args: &[Bson], i: usize, what: &str) -> Result<BsonDocument, DbError> {
    match args.get(i) {
        None | Some(Bson::Null | Bson::Undefined) => Ok(BsonDocument::new()),
        Some(Bson::Document(d)) => Ok(d.clone()),
        Some(other) => Err(rt(format!("{what} must be an object, got {}", type_alias(other)))),
    }
}

fn req_doc(args: &[Bson], i: usize, what: &str) -> Result<BsonDocument, DbError> {
    match args.get(i) {
        None | Some(Bson::Undefined) => Err(rt(format!("{what} is required"))),
        _ => opt_doc(args, i, what),
    }
}

fn str_arg<'a>(args: &'a [Bson], i: usize, what: &str) -> Result<&'a str, DbError> {
    match args.get(i) {
        Some(Bson::String(s)) => Ok(s.as_str()),
        _ => Err(rt(format!("{what} must be a string"))),
    }
}

fn int_arg(args: &[Bson], i: usize, what: &str) -> Result<i64, DbError> {
    args.get(i).and_then(integral).ok_or_else(|| rt(format!("{what} must be an integer")))
}

fn projection_of(spec: &BsonDocument) -> Result<Option<Projection>, DbError> {
    if spec.is_empty() { Ok(None) } else { Projection::parse(spec).map(Some) }
}

fn object_id(args: &[Bson]) -> Result<Bson, DbError> {
    match args.first() {
        None | Some(Bson::Undefined | Bson::Null) => Ok(Bson::ObjectId(ObjectId::new())),
        Some(Bson::String(s)) => ObjectId::parse_str(s)
            .map(Bson::ObjectId)
            .map_err(|_| rt(format!("invalid ObjectId hex string: {s:?}"))),
        Some(Bson::ObjectId(o)) => Ok(Bson::ObjectId(*o)),
        Some(other) => Err(rt(format!("ObjectId expects a hex string, got {}", type_alias(other)))),
    }
}

fn date(args: &[Bson]) -> Result<Bson, DbError> {
    match args.first() {
        None | Some(Bson::Undefined) => Ok(Bson::DateTime(DateTime::now())),
        Some(Bson::String(s)) => parse_date(s).map(Bson::DateTime),
        Some(Bson::DateTime(d)) => Ok(Bson::DateTime(*d)),
        Some(n) if is_num(n) => integral(n)
            .map(|ms| Bson::DateTime(DateTime::from_millis(ms)))
            .ok_or_else(|| rt("date milliseconds must be an integer")),
        Some(other) => Err(rt(format!("cannot build a date from {}", type_alias(other)))),
    }
}

fn number_int(args: &[Bson]) -> Result<Bson, DbError> {
    let v = match args.first() {
        None => return Ok(Bson::Int32(0)),
        Some(Bson::String(s)) => s.trim().parse::<f64>().map_err(|_| rt(format!("NumberInt: invalid number {s:?}")))?,
        Some(n) if is_num(n) => as_f64(n),
        Some(other) => return Err(rt(format!("NumberInt expects a number, got {}", type_alias(other)))),
    };
    f64_to_i32_exact(v.trunc()).map(Bson::Int32).ok_or_else(|| rt(format!("NumberInt: {v} is out of range")))
}

fn number_long(args: &[Bson]) -> Result<Bson, DbError> {
    match args.first() {
        None => Ok(Bson::Int64(0)),
        Some(Bson::String(s)) => {
            s.trim().parse::<i64>().map(Bson::Int64).map_err(|_| rt(format!("NumberLong: invalid number {s:?}")))
        }
        Some(n @ (Bson::Int32(_) | Bson::Int64(_))) => Ok(Bson::Int64(integral(n).unwrap_or_default())),
        Some(Bson::Double(f)) => integral(&Bson::Double(f.trunc()))
            .map(Bson::Int64)
            .ok_or_else(|| rt(format!("NumberLong: {f} is out of range"))),
        Some(other) => Err(rt(format!("NumberLong expects a number, got {}", type_alias(other)))),
    }
}

fn number_decimal(args: &[Bson]) -> Result<Bson, DbError> {
    let text = match args.first() {
        None => "0".to_string(),
        Some(Bson::String(s)) => s.trim().to_string(),
        Some(Bson::Int32(i)) => i.to_string(),
        Some(Bson::Int64(i)) => i.to_string(),
        Some(Bson::Double(f)) => f.to_string(),
        Some(Bson::Decimal128(d)) => return Ok(Bson::Decimal128(*d)),
        Some(other) => return Err(rt(format!("NumberDecimal expects a number, got {}", type_alias(other)))),
    };
    parse_decimal(&text).map(Bson::Decimal128)
}

fn double(args: &[Bson]) -> Result<Bson, DbError> {
    match args.first() {
        None => Ok(Bson::Double(0.0)),
        Some(Bson::String(s)) => Ok(Bson::Double(s.trim().parse::<f64>().unwrap_or(f64::NAN))),
        Some(n) if is_num(n) => Ok(Bson::Double(as_f64(n))),
        Some(other) => Err(rt(format!("Double expects a number, got {}", type_alias(other)))),
    }
}

/// An interactive or scripted shell session over one engine. Bindings persist across
/// `run_script` calls.
pub struct Session {
    engine: Arc<Engine>,
    vars: HashMap<String, Value>,
    consts: HashSet<String>,
    stmt_no: usize,
    echo: bool,
}

impl Session {
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, vars: HashMap::new(), consts: HashSet::new(), stmt_no: 0, echo: true }
    }

    /// Whether expression statements print their value.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub const fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Statements executed so far in this session.
    #[must_use]
    pub const fn statements_run(&self) -> usize {
        self.stmt_no
    }

    /// Parse and run `src`, stopping at the first failing statement. Statements before it
    /// keep their effects. Returns the number of statements executed.
    ///
    /// # Errors
    /// Returns `ScriptError` with the position of the failing token or statement.
    pub fn run_script(&mut self, src: &str, sink: &mut dyn OutputSink) -> Result<usize, DbError> {
        let program = parse_program(src)?;
        log::debug!("running script with {} statements", program.len());
        for (done, stmt) in program.iter().enumerate() {
            self.stmt_no += 1;
            if let Err(e) = self.exec(stmt, sink) {
                let e = e.at(stmt.line, stmt.col);
                log::warn!("script stopped after {done} statements: {e}");
                return Err(e);
            }
        }
        Ok(program.len())
    }

    fn exec(&mut self, stmt: &Stmt, sink: &mut dyn OutputSink) -> Result<(), DbError> {
        match &stmt.kind {
            StmtKind::Let { name, init, constant } => {
                let v = match init {
                    Some(e) => self.eval(e, sink)?,
                    None => Value::Undefined,
                };
                if *constant {
                    self.consts.insert(name.clone());
                } else {
                    self.consts.remove(name);
                }
                self.vars.insert(name.clone(), v);
            }
            StmtKind::Assign { name, value } => {
                if self.consts.contains(name) {
                    return Err(rt("TypeError: Assignment to constant variable."));
                }
                let v = self.eval(value, sink)?;
                self.vars.insert(name.clone(), v);
            }
            StmtKind::Expr(e) => {
                let v = self.eval(e, sink)?;
                if self.echo && !matches!(v, Value::Undefined) {
                    let value = self.printable(v);
                    sink.emit(OutputEvent::Result { stmt: self.stmt_no, value })?;
                }
            }
        }
        Ok(())
    }

    fn eval(&self, e: &Expr, sink: &mut dyn OutputSink) -> Result<Value, DbError> {
        Ok(match &e.kind {
            ExprKind::Num(n) => Value::Bson(num_to_bson(*n)),
            ExprKind::Str(s) => Value::Bson(Bson::String(s.clone())),
            ExprKind::Bool(b) => Value::Bson(Bson::Boolean(*b)),
            ExprKind::Null => Value::Bson(Bson::Null),
            ExprKind::Undefined => Value::Undefined,
            ExprKind::Object(fields) => {
                let mut d = BsonDocument::new();
                for (k, fe) in fields {
                    let v = self.eval(fe, sink)?;
                    d.insert(k.clone(), self.to_bson(v)?);
                }
                Value::Bson(Bson::Document(d))
            }
            ExprKind::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for ie in items {
                    let v = self.eval(ie, sink)?;
                    out.push(self.to_bson(v)?);
                }
                Value::Bson(Bson::Array(out))
            }
            ExprKind::Ident(name) => self.lookup(name)?,
            ExprKind::Member { object, prop } => {
                let target = self.eval(object, sink)?;
                Self::property(target, prop).map_err(|err| err.at(e.line, e.col))?
            }
            ExprKind::Index { object, index } => {
                let target = self.eval(object, sink)?;
                let idx = self.eval(index, sink)?;
                let idx = self.to_bson(idx)?;
                Self::index(target, &idx).map_err(|err| err.at(e.line, e.col))?
            }
            ExprKind::Call { callee, args } => self.call(callee, args, sink).map_err(|err| err.at(e.line, e.col))?,
            ExprKind::New { callee, args } => {
                let argv = self.bson_args(args, sink)?;
                let built = match callee.as_str() {
                    "Date" => date(&argv),
                    "ObjectId" => object_id(&argv),
                    other => Err(rt(format!("TypeError: {other} is not a constructor"))),
                };
                Value::Bson(built.map_err(|err| err.at(e.line, e.col))?)
            }
            ExprKind::Neg(inner) => {
                if let ExprKind::Num(n) = inner.kind {
                    Value::Bson(num_to_bson(-n))
                } else {
                    let v = self.eval(inner, sink)?;
                    Value::Bson(negate(to_number(self.to_bson(v)?)).map_err(|err| err.at(e.line, e.col))?)
                }
            }
            ExprKind::Pos(inner) => {
                let v = self.eval(inner, sink)?;
                Value::Bson(to_number(self.to_bson(v)?))
            }
        })
    }

    fn lookup(&self, name: &str) -> Result<Value, DbError> {
        if let Some(v) = self.vars.get(name) {
            return Ok(v.clone());
        }
        match name {
            "db" => Ok(Value::Db),
            "console" => Ok(Value::Console),
            _ => Err(rt(format!("ReferenceError: {name} is not defined"))),
        }
    }

    fn property(target: Value, prop: &str) -> Result<Value, DbError> {
        Ok(match target {
            Value::Db => Value::Collection(prop.to_string()),
            Value::Collection(name) => Value::Collection(format!("{name}.{prop}")),
            Value::Bson(Bson::Document(d)) => d.get(prop).cloned().map_or(Value::Undefined, Value::Bson),
            Value::Bson(Bson::Array(a)) if prop == "length" => Value::Bson(len_bson(a.len())),
            Value::Bson(Bson::String(s)) if prop == "length" => Value::Bson(len_bson(s.chars().count())),
            Value::Undefined => {
                return Err(rt(format!("TypeError: Cannot read properties of undefined (reading '{prop}')")));
            }
            Value::Bson(Bson::Null) => {
                return Err(rt(format!("TypeError: Cannot read properties of null (reading '{prop}')")));
            }
            _ => Value::Undefined,
        })
    }

    fn index(target: Value, idx: &Bson) -> Result<Value, DbError> {
        match (target, idx) {
            (Value::Bson(Bson::Array(a)), i) if integral(i).is_some() => Ok(integral(i)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| a.get(i).cloned())
                .map_or(Value::Undefined, Value::Bson)),
            (target, Bson::String(key)) => Self::property(target, key),
            (Value::Undefined, _) => Err(rt("TypeError: Cannot read properties of undefined")),
            _ => Ok(Value::Undefined),
        }
    }

    /// Convert a value for storage or as a query argument. Cursors run and become arrays.
    fn to_bson(&self, v: Value) -> Result<Bson, DbError> {
        match v {
            Value::Undefined => Ok(Bson::Null),
            Value::Bson(b) => Ok(b),
            Value::Cursor(spec) => Ok(Bson::Array(self.run_cursor(&spec))),
            Value::Db => Err(rt("cannot use the database object as a value")),
            Value::Console => Err(rt("cannot use console as a value")),
            Value::Collection(name) => Err(rt(format!("cannot use collection {DB_NAME}.{name} as a value"))),
        }
    }

    fn printable(&self, v: Value) -> Bson {
        match v {
            Value::Undefined => Bson::Undefined,
            Value::Bson(b) => b,
            Value::Db => Bson::String(DB_NAME.to_string()),
            Value::Console => Bson::String("[object console]".to_string()),
            Value::Collection(name) => Bson::String(format!("{DB_NAME}.{name}")),
            Value::Cursor(spec) => Bson::Array(self.run_cursor(&spec)),
        }
    }

    fn run_cursor(&self, spec: &CursorSpec) -> Vec<Bson> {
        self.engine.get_collection(&spec.collection).map_or_else(Vec::new, |col| {
            query::find_docs(&col, &spec.filter, &spec.options).map(|d| Bson::Document(d.data)).collect()
        })
    }

    fn eval_args(&self, args: &[Expr], sink: &mut dyn OutputSink) -> Result<Vec<Value>, DbError> {
        args.iter().map(|a| self.eval(a, sink)).collect()
    }

    fn bson_args(&self, args: &[Expr], sink: &mut dyn OutputSink) -> Result<Vec<Bson>, DbError> {
        let values = self.eval_args(args, sink)?;
        values.into_iter().map(|v| self.to_bson(v)).collect()
    }

    fn call(&self, callee: &Expr, args: &[Expr], sink: &mut dyn OutputSink) -> Result<Value, DbError> {
        match &callee.kind {
            ExprKind::Member { object, prop } => {
                let target = self.eval(object, sink)?;
                let argv = self.eval_args(args, sink)?;
                self.call_method(target, prop, argv, sink)
            }
            ExprKind::Ident(name) if !self.vars.contains_key(name) => {
                let argv = self.eval_args(args, sink)?;
                self.call_builtin(name, argv, sink)
            }
            _ => Err(rt("TypeError: expression is not a function")),
        }
    }

    fn log(&self, argv: Vec<Value>, sink: &mut dyn OutputSink) -> Result<Value, DbError> {
        let args = argv.into_iter().map(|v| self.printable(v)).collect();
        sink.emit(OutputEvent::Log { stmt: self.stmt_no, args })?;
        Ok(Value::Undefined)
    }

    fn call_builtin(&self, name: &str, argv: Vec<Value>, sink: &mut dyn OutputSink) -> Result<Value, DbError> {
        if matches!(name, "print" | "printjson") {
            return self.log(argv, sink);
        }
        let args = argv.into_iter().map(|v| self.to_bson(v)).collect::<Result<Vec<_>, _>>()?;
        let built = match name {
            "ObjectId" => object_id(&args)?,
            "ISODate" | "Date" => date(&args)?,
            "NumberInt" => number_int(&args)?,
            "NumberLong" => number_long(&args)?,
            "NumberDecimal" => number_decimal(&args)?,
            "Double" => double(&args)?,
            "db" | "console" => return Err(rt(format!("TypeError: {name} is not a function"))),
            _ => return Err(rt(format!("ReferenceError: {name} is not defined"))),
        };
        Ok(Value::Bson(built))
    }

    fn call_method(
        &self,
        target: Value,
        method: &str,
        argv: Vec<Value>,
        sink: &mut dyn OutputSink,
    ) -> Result<Value, DbError> {
        match target {
            Value::Console => match method {
                "log" | "info" | "warn" | "error" | "debug" => self.log(argv, sink),
                _ => Err(rt(format!("TypeError: console.{method} is not a function"))),
            },
            Value::Db => {
                let args = self.values_to_bson(argv)?;
                self.db_method(method, &args)
            }
            Value::Collection(name) => {
                let args = self.values_to_bson(argv)?;
                self.collection_method(&name, method, &args)
            }
            Value::Cursor(spec) => {
                let args = self.values_to_bson(argv)?;
                self.cursor_method(*spec, method, &args)
            }
            Value::Undefined => Err(rt(format!("TypeError: Cannot read properties of undefined (reading '{method}')"))),
            Value::Bson(b) => Err(rt(format!("TypeError: {method} is not a function on a value of type {}", type_alias(&b)))),
        }
    }

    fn values_to_bson(&self, argv: Vec<Value>) -> Result<Vec<Bson>, DbError> {
        argv.into_iter().map(|v| self.to_bson(v)).collect()
    }

    fn db_method(&self, method: &str, args: &[Bson]) -> Result<Value, DbError> {
        match method {
            "getCollection" => {
                let name = str_arg(args, 0, "collection name")?;
                validate_collection_name(name)?;
                Ok(Value::Collection(name.to_string()))
            }
            "getCollectionNames" => Ok(Value::Bson(Bson::Array(
                self.engine.list_collection_names().into_iter().map(Bson::String).collect(),
            ))),
            "createCollection" => {
                self.engine.create_collection(str_arg(args, 0, "collection name")?)?;
                Ok(Value::Bson(Bson::Document(doc! {"ok": 1})))
            }
            "dropDatabase" => {
                for name in self.engine.list_collection_names() {
                    self.engine.delete_collection(&name);
                }
                Ok(Value::Bson(Bson::Document(doc! {"ok": 1, "dropped": DB_NAME})))
            }
            "getName" => Ok(Value::Bson(Bson::String(DB_NAME.to_string()))),
            _ => Err(rt(format!("TypeError: db.{method} is not a function"))),
        }
    }

    fn collection_method(&self, name: &str, method: &str, args: &[Bson]) -> Result<Value, DbError> {
        let ack = |d: BsonDocument| Ok(Value::Bson(Bson::Document(d)));
        match method {
            "insertOne" => {
                let data = req_doc(args, 0, "document")?;
                let col = self.engine.get_or_create_collection(name)?;
                let id = query::insert_one(&col, data)?;
                ack(doc! {"acknowledged": true, "insertedId": id.0})
            }
            "insertMany" => {
                let Some(Bson::Array(items)) = args.first() else {
                    return Err(rt("insertMany expects an array of documents"));
                };
                let docs = items
                    .iter()
                    .map(|b| match b {
                        Bson::Document(d) => Ok(d.clone()),
                        other => Err(rt(format!("insertMany: element of type {} is not a document", type_alias(other)))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let col = self.engine.get_or_create_collection(name)?;
                let report = query::insert_many(&col, docs)?;
                let mut ids = BsonDocument::new();
                for (i, id) in report.inserted.into_iter().enumerate() {
                    ids.insert(i.to_string(), id.0);
                }
                ack(doc! {"acknowledged": true, "insertedIds": ids})
            }
            "find" => {
                let filter = query::parse_filter(&opt_doc(args, 0, "filter")?)?;
                let projection = projection_of(&opt_doc(args, 1, "projection")?)?;
                Ok(Value::Cursor(Box::new(CursorSpec {
                    collection: name.to_string(),
                    filter,
                    options: FindOptions { projection, ..FindOptions::default() },
                })))
            }
            "findOne" => {
                let filter = query::parse_filter(&opt_doc(args, 0, "filter")?)?;
                let projection = projection_of(&opt_doc(args, 1, "projection")?)?;
                let found = self
                    .engine
                    .get_collection(name)
                    .and_then(|col| query::find_one(&col, &filter, projection.as_ref()));
                Ok(Value::Bson(found.map_or(Bson::Null, |d| Bson::Document(d.data))))
            }
            "countDocuments" => {
                let filter = query::parse_filter(&opt_doc(args, 0, "filter")?)?;
                let n = self.engine.get_collection(name).map_or(0, |col| query::count_docs(&col, &filter));
                Ok(Value::Bson(len_bson(n)))
            }
            "updateOne" | "updateMany" => {
                let filter = query::parse_filter(&req_doc(args, 0, "filter")?)?;
                let update = query::parse_update(&req_doc(args, 1, "update")?)?;
                let options = opt_doc(args, 2, "options")?;
                if options.get("upsert").is_some_and(truthy) {
                    return Err(rt("upsert is not supported"));
                }
                let report = match self.engine.get_collection(name) {
                    Some(col) if method == "updateMany" => query::update_many(&col, &filter, &update)?,
                    Some(col) => query::update_one(&col, &filter, &update)?,
                    None => UpdateReport::default(),
                };
                ack(doc! {
                    "acknowledged": true,
                    "insertedId": Bson::Null,
                    "matchedCount": count_bson(report.matched),
                    "modifiedCount": count_bson(report.modified),
                    "upsertedCount": 0,
                })
            }
            "deleteOne" | "deleteMany" => {
                let filter = query::parse_filter(&req_doc(args, 0, "filter")?)?;
                let deleted = match self.engine.get_collection(name) {
                    Some(col) if method == "deleteMany" => query::delete_many(&col, &filter).deleted,
                    Some(col) => query::delete_one(&col, &filter).deleted,
                    None => 0,
                };
                ack(doc! {"acknowledged": true, "deletedCount": count_bson(deleted)})
            }
            "drop" => Ok(Value::Bson(Bson::Boolean(self.engine.delete_collection(name)))),
            _ => Err(rt(format!("TypeError: {DB_NAME}.{name}.{method} is not a function"))),
        }
    }

    fn cursor_method(&self, mut spec: CursorSpec, method: &str, args: &[Bson]) -> Result<Value, DbError> {
        match method {
            "sort" => {
                let keys = req_doc(args, 0, "sort specification")?;
                if keys.len() > MAX_SORT_FIELDS {
                    return Err(rt(format!("sort specification has {} keys; at most {MAX_SORT_FIELDS} are allowed", keys.len())));
                }
                let mut sort = Vec::with_capacity(keys.len());
                for (field, dir) in &keys {
                    let order = match integral(dir) {
                        Some(1) => Order::Asc,
                        Some(-1) => Order::Desc,
                        _ => return Err(rt(format!("bad sort direction for '{field}': expected 1 or -1"))),
                    };
                    sort.push(SortSpec { field: field.clone(), order });
                }
                spec.options.sort = Some(sort);
            }
            "limit" => {
                // negative limits behave like their absolute value; 0 means no limit
                let n = int_arg(args, 0, "limit")?.unsigned_abs();
                spec.options.limit = (n > 0).then(|| usize::try_from(n).unwrap_or(usize::MAX));
            }
            "skip" => {
                let n = int_arg(args, 0, "skip")?;
                let n = usize::try_from(n).map_err(|_| rt("skip must be non-negative"))?;
                spec.options.skip = (n > 0).then_some(n);
            }
            "projection" => spec.options.projection = projection_of(&opt_doc(args, 0, "projection")?)?,
            "pretty" => {}
            "toArray" => return Ok(Value::Bson(Bson::Array(self.run_cursor(&spec)))),
            "count" => {
                let n = self.engine.get_collection(&spec.collection).map_or(0, |col| query::count_docs(&col, &spec.filter));
                return Ok(Value::Bson(len_bson(n)));
            }
            _ => return Err(rt(format!("TypeError: cursor.{method} is not a function"))),
        }
        Ok(Value::Cursor(Box::new(spec)))
    }
}
