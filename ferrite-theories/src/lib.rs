//! Ferrite Theories - Congruence Closure and Theory Plugins
//!
//! This crate provides the theory side of the CDCL(T) loop:
//! - A congruence closure with a proof forest and backtrackable merges
//! - A micro-theory plugin interface over the closure (`on_new_node`,
//!   `on_pre_merge`, partial/final checks)
//! - The theory framework bridging SAT literals and CC merges, with lazy
//!   explanations and model snapshots
//! - The algebraic datatype theory (injectivity, disjointness, selectors,
//!   acyclicity, finite case splits)

#![deny(unsafe_code)]

pub mod cc;
pub mod datatype;
pub mod framework;

pub use cc::{Cc, CcActions, CcConflict, CcPlugin, CcStore, Expl, MergeInfo, ModelHint, NodeId};
pub use datatype::DatatypeTheory;
pub use framework::{FrameworkStats, ModelValue, TheoryFramework};
