//! `lariat_core` — the function parser and free-variable analyzer behind
//! the Lariat closure serializer.
//!
//! # Crate layout
//!
//! - [`error`] — Analyzer error types and [`error::LariatResult`] alias.
//! - [`parser`] — JavaScript lexer, AST, and recursive-descent parser.
//! - [`closure`] — Shape classifier, free-variable walker, and the
//!   top-level [`closure::analyze`] entry point.
//!
//! # Example
//!
//! ```
//! use lariat_core::closure::{self, CaptureSlot};
//!
//! let analysis = closure::analyze("x => x + y", closure::globals::is_node_global).unwrap();
//! assert!(analysis.normalized.is_arrow);
//! assert_eq!(analysis.captures.required["y"], CaptureSlot::All);
//! ```

/// Shape classification, capture analysis, and the top-level analyzer API.
pub mod closure;
/// Analyzer error types and [`error::LariatResult`] alias.
pub mod error;
/// JavaScript parsing infrastructure (lexer, AST, parser).
pub mod parser;

pub use closure::{analyze, FunctionAnalysis};
pub use error::{LariatError, LariatResult};
