//! Small shared helpers: developer logging, JSON bridging, numeric conversions.
pub mod devlog;
pub mod json;
pub mod num;
