//! Shape classification of host-stringified functions.
//!
//! A host runtime stringifies callable values into one of a handful of
//! textual shapes (`function f() {…}`, `x => x`, `foo() {…}` for methods,
//! `class C {…}`, …).  [`classify`] recognizes the shape and rebuilds a
//! legal, re-parseable function-expression form from it; every
//! shape-recognition heuristic in the analyzer lives in this module so it
//! can be re-tuned against observed host output as a unit.

use serde::Serialize;

use crate::error::{LariatError, LariatResult};
use crate::parser::ast::{ClassMember, MethodKind, Program, Stmt};
use crate::parser::parser;
use crate::parser::scanner::{is_identifier, is_reserved_word};

// ─────────────────────────────────────────────────────────────────────────────
// NormalizedForm
// ─────────────────────────────────────────────────────────────────────────────

/// A normalized, re-parseable rendering of a stringified function.
///
/// `expr_without_name` always parses when wrapped in parentheses.  The named
/// form, when present, embeds the original name (or a synthetic placeholder)
/// in a legal function-expression position so downstream code can refer to
/// the function for recursion; the unnamed form is for contexts where a
/// declaration name would not be syntactically legal.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedForm {
    /// Function-expression form with the original name commented out.
    pub expr_without_name: String,
    /// Function-expression form with an embedded name; never present for
    /// arrows.
    pub expr_with_name: Option<String>,
    /// The declared name, when the input was a function declaration.
    pub declaration_name: Option<String>,
    /// `true` when the input was an arrow function.
    pub is_arrow: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Classify a stringified function and produce its [`NormalizedForm`].
///
/// Rejected inputs (the host's opaque debug form, intrinsic functions, and
/// text matching no recognized shape) produce an error and no form.
pub fn classify(source: &str) -> LariatResult<NormalizedForm> {
    if source.starts_with("[Function:") {
        return Err(LariatError::UnrecognizedForm);
    }
    if source.contains("[native code]") {
        return Err(LariatError::NativeCode);
    }

    // Arrows are decided by the text before the first `{`: an arrow token
    // there (or anywhere, for expression bodies) means the raw source is
    // already a legal expression.
    match source.find('{') {
        None => {
            if source.contains("=>") {
                return Ok(arrow_form(source));
            }
            return Err(LariatError::UnrecognizedForm);
        }
        Some(open_brace) => {
            if source[..open_brace].contains("=>") {
                return Ok(arrow_form(source));
            }
        }
    }

    // Async functions and methods stringify with a leading `async ` segment;
    // strip it here and carry it through the rebuilt prefix.
    let (is_async, rest) = match source.strip_prefix("async ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, source),
    };

    if let Some(tail) = rest.strip_prefix("function get ") {
        // Accessor stringification: `function get name() {…}`.
        return named_function_form(tail, is_async, false);
    }
    if let Some(tail) = rest.strip_prefix("function set ") {
        return named_function_form(tail, is_async, false);
    }
    if let Some(tail) = rest.strip_prefix("function") {
        return named_function_form(tail, is_async, true);
    }
    if rest.starts_with("class ") || rest == "class" {
        return class_form(rest);
    }

    // Anything else is a method stringification (`foo() {…}`,
    // `*gen() {…}`, `[computed]() {…}`); rebuild the `function` keyword.
    named_function_form(rest, is_async, false)
}

fn arrow_form(source: &str) -> NormalizedForm {
    NormalizedForm {
        expr_without_name: source.to_owned(),
        expr_with_name: None,
        declaration_name: None,
        is_arrow: true,
    }
}

/// Rebuild a function-expression form from a tail that begins with an
/// optional `*`, an optional name segment, and a parameter list.
///
/// An identifier-shaped name is commented out in the unnamed form and, when
/// it is also a legal function-expression name (not a reserved word),
/// embedded verbatim in the named form.  Any other name segment (computed
/// member keys, comment residue from a previous normalization) is dropped —
/// commenting arbitrary text would nest comments and break the guarantee
/// that every emitted form re-parses.  An anonymous tail gets the synthetic
/// `__computed` placeholder as its embedded name.
fn named_function_form(
    tail: &str,
    is_async: bool,
    is_declaration: bool,
) -> LariatResult<NormalizedForm> {
    let mut v = tail.trim_start();
    let mut prefix = if is_async { "async function " } else { "function " };
    if let Some(rest) = v.strip_prefix('*') {
        v = rest.trim_start();
        prefix = if is_async {
            "async function* "
        } else {
            "function* "
        };
    }

    let Some(open_paren) = v.find('(') else {
        return Err(LariatError::UnrecognizedForm);
    };

    if open_paren == 0 {
        // Anonymous.
        return Ok(NormalizedForm {
            expr_without_name: format!("{prefix}{v}"),
            expr_with_name: Some(format!("{prefix}__computed{v}")),
            declaration_name: None,
            is_arrow: false,
        });
    }

    let name_part = &v[..open_paren];
    let rest = &v[open_paren..];
    let commented = if is_identifier(name_part) {
        format!("/*{name_part}*/")
    } else {
        String::new()
    };
    let function_name = (is_identifier(name_part) && !is_reserved_word(name_part))
        .then(|| name_part.to_owned());

    Ok(NormalizedForm {
        expr_without_name: format!("{prefix}{commented}{rest}"),
        expr_with_name: function_name
            .as_deref()
            .map(|name| format!("{prefix}{name}{rest}")),
        declaration_name: if is_declaration { function_name } else { None },
        is_arrow: false,
    })
}

/// Handle a `class …` stringification: re-parse it, extract (or synthesize)
/// the constructor, and normalize that as the function form.
fn class_form(source: &str) -> LariatResult<NormalizedForm> {
    let program = parser::parse(source)
        .map_err(|e| LariatError::ClassUnparseable(e.to_string()))?;

    let class = program
        .body
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::ClassDecl(c) => Some(c),
            _ => None,
        })
        .ok_or_else(|| LariatError::ClassUnrecognized(source.to_owned()))?;

    let constructor = class.members.iter().find_map(|member| match member {
        ClassMember::Method(m) if m.kind == MethodKind::Constructor => Some(m),
        _ => None,
    });

    let constructor_code = match constructor {
        Some(method) => method.loc.text(source).to_owned(),
        None if class.super_class.is_some() => "constructor() { super(); }".to_owned(),
        None => "constructor() { }".to_owned(),
    };

    named_function_form(&constructor_code, false, false)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a [`NormalizedForm`] into a syntax tree rooted at a parenthesized
/// expression statement.
///
/// The preferred source (the named form when available) is wrapped in
/// `(`/`)` before parsing, because many legal function-expression forms are
/// not legal top-level declarations.  The classifier guarantees that every
/// form it emits re-parses, so a failure here surfaces as
/// [`LariatError::NormalizedParse`].
pub fn parse_normalized(form: &NormalizedForm) -> LariatResult<Program> {
    let preferred = form
        .expr_with_name
        .as_deref()
        .unwrap_or(&form.expr_without_name);
    let wrapped = format!("({preferred})");
    parser::parse(&wrapped).map_err(|e| LariatError::NormalizedParse(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
