//! Error types for the Ferrite core.

use thiserror::Error;

/// Errors surfaced by the core term and sort stores.
///
/// Search outcomes (conflicts, unsatisfiability, resource exhaustion) are
/// *not* errors; they travel as ordinary values through the solver API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A term was built with an argument of the wrong sort.
    #[error("sort mismatch: expected {expected}, got {got}")]
    SortMismatch {
        /// Name of the expected sort.
        expected: String,
        /// Name of the sort actually supplied.
        got: String,
    },

    /// A function application had the wrong number of arguments.
    #[error("arity mismatch for `{func}`: expected {expected} arguments, got {got}")]
    ArityMismatch {
        /// Function symbol name.
        func: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },

    /// A symbol was referenced before being declared.
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    /// A datatype or constructor name was declared twice.
    #[error("duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    /// A datatype was declared with no constructors.
    #[error("datatype `{0}` has no constructors")]
    EmptyDatatype(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
