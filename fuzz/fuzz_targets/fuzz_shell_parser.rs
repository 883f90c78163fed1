#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = nexus_shell::shell::needs_more_input(s);
        if nexus_shell::shell::parse_program(s).is_ok() {
            // run against a throwaway engine; errors are fine, panics are not
            let db = nexus_shell::Database::new();
            let _ = db.run_script(s);
        }
    }
});
