use bson::Bson;
use nexus_shell::shell::OutputEvent;

/// Values echoed by expression statements, in order.
pub fn results(events: &[OutputEvent]) -> Vec<Bson> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Result { value, .. } => Some(value.clone()),
            OutputEvent::Log { .. } => None,
        })
        .collect()
}

pub fn logs(events: &[OutputEvent]) -> Vec<Vec<Bson>> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Log { args, .. } => Some(args.clone()),
            OutputEvent::Result { .. } => None,
        })
        .collect()
}

pub fn array_len(v: &Bson) -> usize {
    v.as_array().map_or(usize::MAX, Vec::len)
}

pub fn names(v: &Bson) -> Vec<String> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|d| d.as_document().and_then(|d| d.get_str("name").ok()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn script_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts").join(name)
}
