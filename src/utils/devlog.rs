//! Developer benchmark records ("dev6"). Each record is a flat JSON object logged at
//! TRACE under [`DEV6_TARGET`]. [`capture`] collects the records a closure emits on the
//! current thread, so tests never depend on the global logger.

use serde_json::{Map, Value};
use std::cell::RefCell;

pub const DEV6_TARGET: &str = "nexus_shell::dev6";

thread_local! {
    // one frame per active `capture`; records go to the innermost
    static FRAMES: RefCell<Vec<Vec<Value>>> = const { RefCell::new(Vec::new()) };
}

/// Field-by-field builder behind `dev6!`.
#[derive(Debug, Default)]
pub struct Record(Map<String, Value>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }
}

pub fn emit(record: Record) {
    let value = Value::Object(record.0);
    log::trace!(target: DEV6_TARGET, "{value}");
    FRAMES.with(|f| {
        if let Some(top) = f.borrow_mut().last_mut() {
            top.push(value);
        }
    });
}

struct Frame;

impl Drop for Frame {
    fn drop(&mut self) {
        FRAMES.with(|f| f.borrow_mut().pop());
    }
}

/// Run `f` and return what it produced together with the records it emitted on this
/// thread. Captures nest; an inner capture keeps its records from the outer one.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Value>) {
    FRAMES.with(|frames| frames.borrow_mut().push(Vec::new()));
    let frame = Frame;
    let out = f();
    let records = FRAMES.with(|frames| frames.borrow_mut().last_mut().map(std::mem::take).unwrap_or_default());
    drop(frame);
    (out, records)
}

/// Emit one developer record: `dev6!("op" => "find", "result_count" => n)`.
#[macro_export]
macro_rules! dev6 {
    ($($key:literal => $value:expr),+ $(,)?) => {{
        let mut record = $crate::utils::devlog::Record::new();
        $( record.field($key, $value); )+
        $crate::utils::devlog::emit(record);
    }};
}
