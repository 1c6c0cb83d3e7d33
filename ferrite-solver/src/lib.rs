//! Ferrite Solver - CDCL(T) Driver
//!
//! Couples the [`ferrite_sat`] CDCL engine with the [`ferrite_theories`]
//! congruence closure and datatype theory into one in-process SMT solver for
//! quantifier-free formulas over uninterpreted functions and algebraic
//! datatypes.
//!
//! # Examples
//!
//! ```
//! use ferrite_core::literal::TermLit;
//! use ferrite_solver::{SmtResult, SmtSolver};
//!
//! let mut solver = SmtSolver::new();
//! let tm = solver.terms_mut();
//! let int = tm.sorts.int_sort;
//! let a = tm.mk_const("a", int);
//! let b = tm.mk_const("b", int);
//! let f = tm.declare_fun("f", vec![int], int);
//! let fa = tm.mk_app(f, &[a]).unwrap();
//! let fb = tm.mk_app(f, &[b]).unwrap();
//! let a_eq_b = tm.mk_eq(a, b).unwrap();
//! let fa_eq_fb = tm.mk_eq(fa, fb).unwrap();
//!
//! // a = b together with f(a) != f(b) is unsatisfiable.
//! solver.assert_clause(&[TermLit::positive(a_eq_b)]);
//! solver.assert_clause(&[TermLit::negative(fa_eq_fb)]);
//! assert_eq!(solver.solve(), SmtResult::Unsat);
//! ```

#![deny(unsafe_code)]

mod model;
mod solver;

pub use model::Model;
pub use solver::{SmtConfig, SmtResult, SmtSolver};

pub use ferrite_core::literal::TermLit;
pub use ferrite_theories::ModelValue;
