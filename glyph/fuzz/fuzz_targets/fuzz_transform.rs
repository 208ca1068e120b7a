#![no_main]

use glyph::{compact_source, expand_source};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let expanded = expand_source(s);
        let _ = compact_source(&expanded);
    }
});
