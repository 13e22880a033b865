#![no_main]

use libfuzzer_sys::fuzz_target;
use lariat_core::parser::scanner::{Scanner, TokenKind};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // The scanner must terminate and never panic on arbitrary input; lexical
    // errors are values.  Every produced span must stay within the source
    // and on char boundaries.
    let mut scanner = Scanner::new(source);
    loop {
        match scanner.next_token() {
            Ok(token) => {
                assert!(token.span.start.offset <= token.span.end.offset, "inverted span");
                assert!(token.span.end.offset <= source.len(), "span out of bounds");
                assert!(
                    source.is_char_boundary(token.span.start.offset)
                        && source.is_char_boundary(token.span.end.offset),
                    "span not on char boundary"
                );
                if token.kind == TokenKind::Eof {
                    break;
                }
            }
            Err(_) => break,
        }
    }
});
