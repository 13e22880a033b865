//! The closure analyzer: function-shape classification and free-variable
//! analysis.
//!
//! [`analyze`] is the entry point.  It takes the textual representation of a
//! function (as produced by the host runtime's stringification of function
//! values) and an ambient-global predicate, and produces:
//!
//! - a normalized, re-parseable source form ([`NormalizedForm`]);
//! - the set of identifiers the function captures from its enclosing lexical
//!   environment ([`CaptureRecord`]), split into *required* and merely
//!   *probed* captures, with per-property narrowing;
//! - whether the function needs a receiver at call time
//!   (`uses_non_lexical_this`).
//!
//! The analyzer is a pure function: it executes nothing, resolves no values,
//! and holds no state between calls.

use serde::Serialize;

use crate::error::{LariatError, LariatResult};

/// Free-variable walker and non-lexical-`this` detection.
pub mod captures;
/// Default ambient-global table for Node-style hosts.
pub mod globals;
/// Shape classification and normalization of stringified functions.
pub mod shape;

pub use captures::{CaptureRecord, CaptureSet, CaptureSlot, CapturedProperty};
pub use shape::NormalizedForm;

// ─────────────────────────────────────────────────────────────────────────────
// Result type
// ─────────────────────────────────────────────────────────────────────────────

/// The complete result of analyzing one stringified function.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionAnalysis {
    /// The normalized, re-parseable source form.
    pub normalized: NormalizedForm,
    /// Captured identifiers.
    pub captures: CaptureRecord,
    /// `true` when the function uses `this` or `super` non-lexically and
    /// therefore needs a receiver at call time.  Always `false` for arrows.
    pub uses_non_lexical_this: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

/// Analyze the stringified function `source`.
///
/// `is_global` must return `true` for names that refer to host-runtime
/// ambient globals; those are removed from the capture record (the caller
/// usually passes [`globals::is_node_global`] or its own table).
///
/// On success the analysis is returned.  Classifier rejections surface as
/// the corresponding [`LariatError`] value.  If the walk finishes with
/// `this` in the required captures — which happens exactly when an arrow
/// function captured `this` from its enclosing environment — the analysis is
/// still produced, carried inside [`LariatError::ArrowCapturedThis`] so the
/// caller can inspect it alongside the diagnostic.
pub fn analyze<F>(source: &str, is_global: F) -> LariatResult<FunctionAnalysis>
where
    F: Fn(&str) -> bool,
{
    let normalized = shape::classify(source)?;
    let program = shape::parse_normalized(&normalized)?;

    let captures = captures::compute_captures(&program, &is_global);
    let uses_non_lexical_this = captures::uses_non_lexical_this(&program, normalized.is_arrow);

    let analysis = FunctionAnalysis {
        normalized,
        captures,
        uses_non_lexical_this,
    };

    if analysis.captures.required.contains_key("this") {
        return Err(LariatError::ArrowCapturedThis(Box::new(analysis)));
    }

    Ok(analysis)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn no_globals(_: &str) -> bool {
        false
    }

    fn analyze_ok(source: &str) -> FunctionAnalysis {
        analyze(source, no_globals)
            .unwrap_or_else(|e| panic!("analyze failed for {source:?}: {e}"))
    }

    fn all_names(set: &CaptureSet) -> Vec<&str> {
        set.keys().map(String::as_str).collect()
    }

    // ── End-to-end scenarios ──────────────────────────────────────────────

    #[test]
    fn test_expression_arrow_with_capture() {
        let analysis = analyze_ok("x => x + y");
        assert!(analysis.normalized.is_arrow);
        assert_eq!(analysis.captures.required["y"], CaptureSlot::All);
        assert!(!analysis.uses_non_lexical_this);
    }

    #[test]
    fn test_block_arrow_with_typeof() {
        let analysis = analyze_ok("() => { return typeof maybe; }");
        assert!(analysis.normalized.is_arrow);
        assert!(analysis.captures.required.is_empty());
        assert_eq!(analysis.captures.optional["maybe"], CaptureSlot::All);
    }

    #[test]
    fn test_method_with_invoked_property() {
        let analysis = analyze_ok("foo() { return obj.bar(); }");
        assert!(
            analysis
                .normalized
                .expr_with_name
                .as_deref()
                .unwrap()
                .starts_with("function foo(")
        );
        let CaptureSlot::Properties(props) = &analysis.captures.required["obj"] else {
            panic!("expected property capture");
        };
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "bar");
        assert!(props[0].invoked);
        // The method never mentions `this` or `super`.
        assert!(!analysis.uses_non_lexical_this);
    }

    #[test]
    fn test_generator_with_this() {
        let analysis = analyze_ok("function* gen() { yield this.x; }");
        assert!(!analysis.normalized.is_arrow);
        assert_eq!(analysis.normalized.declaration_name.as_deref(), Some("gen"));
        assert!(analysis.uses_non_lexical_this);
        // `this` belongs to the generator's own scope and is not a capture.
        assert!(!analysis.captures.required.contains_key("this"));
    }

    #[test]
    fn test_class_with_extends_uses_super() {
        let analysis = analyze_ok("class C extends B { }");
        assert_eq!(
            analysis.normalized.expr_with_name.as_deref(),
            Some("function constructor() { super(); }")
        );
        assert!(analysis.uses_non_lexical_this);
        // `super` is not an identifier and never lands in the capture maps.
        assert!(!analysis.captures.required.contains_key("super"));
    }

    #[test]
    fn test_async_wrapper() {
        let analysis = analyze(
            "function outer() { return __awaiter(this, void 0, void 0, \
             function* () { return a; }); }",
            globals::is_node_global,
        )
        .unwrap();
        assert_eq!(analysis.captures.required["a"], CaptureSlot::All);
        // The `this` handed to the wrapper is a lowering artifact.
        assert!(!analysis.captures.required.contains_key("this"));
        assert!(!analysis.uses_non_lexical_this);
    }

    #[test]
    fn test_destructuring_with_default() {
        let analysis = analyze_ok("({ x: y = z } = w) => y");
        assert_eq!(all_names(&analysis.captures.required), vec!["w", "z"]);
    }

    #[test]
    fn test_arrow_capturing_this_is_an_error() {
        let err = analyze("() => this.foo", no_globals).unwrap_err();
        let LariatError::ArrowCapturedThis(analysis) = err else {
            panic!("expected ArrowCapturedThis, got: {err}");
        };
        // The analysis is still fully populated.
        let CaptureSlot::Properties(props) = &analysis.captures.required["this"] else {
            panic!("expected property capture");
        };
        assert_eq!(props[0].name, "foo");
        assert!(!props[0].invoked);
    }

    #[test]
    fn test_arrow_with_class_field_this_is_not_an_error() {
        // The field initializer's `this` is the instance of the returned
        // class, not a lexical capture of the arrow's environment.
        let analysis = analyze_ok("x => class { y = this.z; }");
        assert!(analysis.captures.required.is_empty());
        assert!(!analysis.uses_non_lexical_this);
    }

    #[test]
    fn test_arrow_captured_this_message_suggests_remedy() {
        let err = analyze("() => this.foo", no_globals).unwrap_err();
        assert_eq!(
            err.to_string(),
            "arrow function captured 'this'; assign 'this' to another name \
             outside the function and capture that"
        );
    }

    // ── Universal properties ──────────────────────────────────────────────

    #[test]
    fn test_arrow_invariant() {
        for source in ["x => x", "() => { return this; }", "async () => f()"] {
            match analyze(source, no_globals) {
                Ok(analysis) => {
                    assert!(analysis.normalized.is_arrow);
                    assert!(!analysis.uses_non_lexical_this);
                }
                Err(LariatError::ArrowCapturedThis(analysis)) => {
                    assert!(!analysis.uses_non_lexical_this);
                }
                Err(other) => panic!("unexpected error for {source:?}: {other}"),
            }
        }
    }

    #[test]
    fn test_required_optional_disjoint() {
        let analysis =
            analyze_ok("function () { f(typeof x); g(x.y); return typeof only_probed; }");
        for key in analysis.captures.required.keys() {
            assert!(
                !analysis.captures.optional.contains_key(key),
                "{key} appears in both maps"
            );
        }
        assert!(analysis.captures.optional.contains_key("only_probed"));
    }

    #[test]
    fn test_global_exclusion() {
        let analysis = analyze(
            "function () { console.log(JSON.stringify(payload)); return require('x'); }",
            globals::is_node_global,
        )
        .unwrap();
        assert_eq!(all_names(&analysis.captures.required), vec!["payload"]);
    }

    #[test]
    fn test_idempotence_on_unnamed_form() {
        let sources = [
            "function add(a, b) { return a + b + offset; }",
            "foo() { return obj.bar(); }",
            "function* gen() { yield item.next; }",
            "x => x + y",
        ];
        for source in sources {
            let first = analyze_ok(source);
            let again = analyze_ok(&first.normalized.expr_without_name);
            assert_eq!(
                format!("{:?}", first.captures),
                format!("{:?}", again.captures),
                "capture set changed on re-analysis of {source:?}"
            );
        }
    }

    #[test]
    fn test_absorption_is_stable_end_to_end() {
        let analysis = analyze_ok(
            "function () { use(state.a); use(state.b); send(state); use(state.c); }",
        );
        assert_eq!(analysis.captures.required["state"], CaptureSlot::All);
    }
}
