#![no_main]

use glyph::Interpreter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|depth: u8| {
    let interpreter = Interpreter::new();

    let depth = (depth as usize % 150) + 1;

    let mut expr = String::from("1");
    for _ in 0..depth {
        expr = format!("({} + 1)", expr);
    }

    // Past max_expression_depth this must fail cleanly, never overflow the stack
    let _ = interpreter.evaluate_source(&expr);
});
