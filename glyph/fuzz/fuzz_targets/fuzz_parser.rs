#![no_main]

use glyph::{Interpreter, SyntaxMode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for mode in [SyntaxMode::Compact, SyntaxMode::Expanded] {
            let mut interpreter = Interpreter::new();
            let _ = interpreter.load_source(s, Some("fuzz_input"), mode);
        }
    }
});
