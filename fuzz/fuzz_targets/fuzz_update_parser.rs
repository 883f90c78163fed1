#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(update) = nexus_shell::query::parse_update_json(s)
    {
        let mut doc = nexus_shell::document::Document::new(bson::doc! {"a": 1, "tags": ["x"], "n": {"m": 2}});
        let _ = nexus_shell::query::apply_update(&mut doc, &update);
    }
});
