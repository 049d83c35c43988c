#![no_main]

use ferrous_whitebox::type_name::{parse_type_name, shorten_paths};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(name) = std::str::from_utf8(data) else {
        return;
    };

    let parts = parse_type_name(name);
    // Shortening never makes a name longer
    assert!(shorten_paths(name).len() <= name.len());
    assert!(parts.short_name.len() <= name.len());
});
