#![no_main]

use libfuzzer_sys::fuzz_target;
use lariat_core::parser::parser::parse;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // The parser must never panic: any input either produces a Program or a
    // syntax diagnostic value.
    let _ = parse(source);
});
