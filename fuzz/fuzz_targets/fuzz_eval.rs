#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(filter) = nexus_shell::query::parse_filter_json(s)
    {
        let docs = [
            bson::doc! {"name": "Laptop", "price": 800, "tags": ["office", "tech"]},
            bson::doc! {"name": "T-shirt", "price": 15.5, "ratings": [{"score": 5}, {"score": 2}]},
            bson::doc! {"skills": [], "nested": {"z": [1, [2, 3]]}},
        ];
        for d in &docs {
            let _ = nexus_shell::query::eval_filter(d, &filter);
        }
    }
});
