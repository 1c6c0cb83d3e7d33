//! Ferrite SAT - CDCL Engine with Theory Hooks
//!
//! A conflict-driven clause-learning SAT solver:
//! - Two-watched-literal propagation with blocker caching
//! - First-UIP conflict analysis with clause minimization
//! - EVSIDS decision heuristic with phase saving
//! - Luby restarts and activity-based clause-database reduction
//! - A theory-callback interface for CDCL(T) solving
//!
//! # Examples
//!
//! ```
//! use ferrite_sat::{Lit, Solver, SolverResult};
//!
//! let mut sat = Solver::new();
//! let a = sat.new_var();
//! let b = sat.new_var();
//! sat.add_clause([Lit::pos(a)]);
//! sat.add_clause([Lit::neg(a), Lit::pos(b)]);
//!
//! assert_eq!(sat.solve(), SolverResult::Sat);
//! assert!(sat.model()[b.index()].is_true());
//! ```

#![deny(unsafe_code)]

mod clause;
mod heap;
mod literal;
mod restart;
mod solver;
mod theory;
mod trail;
mod watch;

pub use clause::{ClauseDb, ClauseDbStats, ClauseId};
pub use literal::{LBool, Lit, Var};
pub use restart::{LubySeries, RestartScheduler, RestartStrategy};
pub use solver::{Solver, SolverConfig, SolverResult, SolverStats};
pub use theory::{NullTheory, TheoryActions, TheoryCallback};
pub use trail::{Reason, Trail};
pub use watch::{WatchLists, Watcher};
