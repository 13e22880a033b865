#![no_main]

use libfuzzer_sys::fuzz_target;
use lariat_core::closure::{self, globals, shape};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Classification of arbitrary text must yield a form or an error value.
    // When a form is produced, the full analysis must also complete without
    // panicking (though it may still fail, e.g. on forms whose body text the
    // classifier accepted but the parser rejects).
    if shape::classify(source).is_ok() {
        let _ = closure::analyze(source, globals::is_node_global);
    }
});
