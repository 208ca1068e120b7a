#![no_main]

use glyph::{Interpreter, SyntaxMode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut interpreter = Interpreter::new();
        let code = r#"
const x = 100
const y = 50
func twice(n) {
  > n * 2
}
"#;
        if interpreter
            .load_source(code, Some("fuzz_expr"), SyntaxMode::Compact)
            .is_ok()
        {
            let _ = interpreter.evaluate_source(s);
        }
    }
});
