//! Ferrite Core - Terms, Sorts, and Shared Infrastructure for the SMT Solver
//!
//! This crate provides the foundational types for the Ferrite SMT solver:
//! - Hash-consed terms with O(1) identity via [`TermId`]
//! - Sort system with algebraic datatypes and a cardinality oracle
//! - The literal layer: SAT-compatible [`Lit`] and term-level [`TermLit`]
//! - A generic backtrackable journal shared by all level-synchronized state
//! - Proof tracing as an append-only step graph
//! - Cooperative resource limits
//!
//! # Examples
//!
//! ## Creating terms
//!
//! ```
//! use ferrite_core::ast::TermManager;
//! use num_bigint::BigInt;
//!
//! let mut tm = TermManager::new();
//!
//! let x = tm.mk_const("x", tm.sorts.int_sort);
//! let five = tm.mk_int(BigInt::from(5));
//! let eq = tm.mk_eq(x, five).unwrap();
//!
//! // Hash-consing: the same term interns to the same id.
//! assert_eq!(eq, tm.mk_eq(five, x).unwrap());
//! ```
//!
//! ## Declaring a recursive datatype
//!
//! ```
//! use ferrite_core::ast::TermManager;
//! use ferrite_core::sort::ConstructorDecl;
//!
//! let mut tm = TermManager::new();
//! let int = tm.sorts.int_sort;
//! let list = tm.declare_datatype_sort("List").unwrap();
//! tm.define_datatype(list, &[
//!     ConstructorDecl::nullary("nil"),
//!     ConstructorDecl::with_fields("cons", &[("head", int), ("tail", list)]),
//! ]).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod backtrack;
pub mod error;
pub mod literal;
pub mod proof;
pub mod resource;
pub mod sort;

pub use ast::{FuncDecl, FuncId, FuncKind, Term, TermId, TermKind, TermManager};
pub use backtrack::{Backtrackable, BacktrackStack};
pub use error::{Error, Result};
pub use literal::{Lit, TermLit, Var};
pub use proof::{NullTracer, ProofTracer, StepId, StepTable, TraceStep};
pub use resource::{LimitStatus, ResourceManager};
pub use sort::{
    Card, ConstructorDecl, ConstructorInfo, DatatypeDecl, DatatypeId, DatatypeInfo, Sort, SortId,
    SortKind, SortStore,
};
