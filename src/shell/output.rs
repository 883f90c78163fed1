use bson::Bson;

use crate::errors::DbError;
use crate::utils::json::bson_to_json;

/// Something a script produced, tagged with the 1-based statement number.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Value of a top-level expression statement.
    Result { stmt: usize, value: Bson },
    /// `console.log`/`print`/`printjson` arguments.
    Log { stmt: usize, args: Vec<Bson> },
}

impl OutputEvent {
    #[must_use]
    pub const fn stmt(&self) -> usize {
        match self {
            Self::Result { stmt, .. } | Self::Log { stmt, .. } => *stmt,
        }
    }
}

pub trait OutputSink {
    /// # Errors
    /// Returns an error when the event cannot be written.
    fn emit(&mut self, event: OutputEvent) -> Result<(), DbError>;
}

impl OutputSink for Vec<OutputEvent> {
    fn emit(&mut self, event: OutputEvent) -> Result<(), DbError> {
        self.push(event);
        Ok(())
    }
}

/// JSON text of a value; strings are printed raw.
#[must_use]
pub fn render_value(v: &Bson, pretty: bool) -> String {
    match v {
        Bson::String(s) => s.clone(),
        Bson::Undefined => "undefined".to_string(),
        other => {
            let json = bson_to_json(other);
            if pretty { format!("{json:#}") } else { json.to_string() }
        }
    }
}

/// Log arguments joined by single spaces.
#[must_use]
pub fn render_log(args: &[Bson], pretty: bool) -> String {
    args.iter().map(|a| render_value(a, pretty)).collect::<Vec<_>>().join(" ")
}
