//! Error types for the Lariat analyzer.

use thiserror::Error;

use crate::closure::FunctionAnalysis;

/// All errors that can be produced by the Lariat analyzer.
///
/// Classifier errors ([`LariatError::UnrecognizedForm`],
/// [`LariatError::NativeCode`], [`LariatError::ClassUnparseable`],
/// [`LariatError::ClassUnrecognized`]) are ordinary returned values: the
/// function text simply was not one of the shapes a host runtime produces.
///
/// [`LariatError::NormalizedParse`] is different: the classifier guarantees
/// that every normalized form it emits re-parses, so a parse failure on a
/// normalized form indicates a bug in the classifier or an unexpected host
/// stringification.
#[derive(Debug, Error)]
pub enum LariatError {
    /// The function text matched none of the recognized stringification
    /// shapes, or a recognized shape was missing its parameter list.
    #[error("the function form was not understood.")]
    UnrecognizedForm,

    /// The function text contained `[native code]`.
    #[error("it was a native code function.")]
    NativeCode,

    /// A class stringification failed to re-parse.
    #[error("the class could not be parsed: {0}")]
    ClassUnparseable(String),

    /// A class stringification parsed but contained no class declaration.
    #[error("the class form was not understood: {0}")]
    ClassUnrecognized(String),

    /// A lexer or parser diagnostic.
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// A normalized form produced by the classifier failed to parse.
    #[error("internal error: normalized function failed to parse: {0}")]
    NormalizedParse(String),

    /// The walker finished with `this` in the required capture set, which
    /// only happens when an arrow function captured `this` from its
    /// enclosing environment.  The otherwise-complete analysis is carried
    /// so callers may still inspect it.
    #[error(
        "arrow function captured 'this'; assign 'this' to another name \
         outside the function and capture that"
    )]
    ArrowCapturedThis(Box<FunctionAnalysis>),
}

/// Convenient `Result` alias for fallible analyzer operations.
pub type LariatResult<T> = Result<T, LariatError>;
