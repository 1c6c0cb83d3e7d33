//! The SAT ↔ theory interface.
//!
//! The SAT core drives one [`TheoryCallback`]. After every propagation
//! quiescence the solver streams new trail literals through
//! [`TheoryCallback::on_assume`] and runs a partial check; before declaring
//! satisfiability it runs a final check. In either check the theory reports
//! work through a [`TheoryActions`] buffer: fresh variables, clauses,
//! propagated literals (with lazy explanations), or a conflict clause. Theory
//! levels are kept in lock-step with SAT decision levels via
//! `push_level`/`pop_levels`.

use crate::literal::{Lit, Var};
use ferrite_core::proof::StepId;

/// Work requested by a theory during a check.
///
/// A conflict wins over everything else: once raised, remaining propagations
/// and clauses are dropped by the solver (the theory will re-derive them).
#[derive(Debug)]
pub struct TheoryActions {
    next_var: u32,
    new_var_pols: Vec<bool>,
    propagations: Vec<Lit>,
    clauses: Vec<(Vec<Lit>, StepId)>,
    conflict: Option<(Vec<Lit>, StepId)>,
}

impl TheoryActions {
    /// A buffer whose fresh variables start at `next_var`.
    #[must_use]
    pub fn new(next_var: u32) -> Self {
        Self {
            next_var,
            new_var_pols: Vec::new(),
            propagations: Vec::new(),
            clauses: Vec::new(),
            conflict: None,
        }
    }

    /// Allocate a fresh SAT variable with the given default polarity. The
    /// solver materializes it when the check returns.
    pub fn new_var(&mut self, default_pol: bool) -> Var {
        let v = Var::new(self.next_var);
        self.next_var += 1;
        self.new_var_pols.push(default_pol);
        v
    }

    /// Assert a theory-implied literal. The solver will ask
    /// [`TheoryCallback::explain_propagation`] for the antecedents only if
    /// conflict analysis reaches this literal.
    pub fn propagate(&mut self, lit: Lit) {
        self.propagations.push(lit);
    }

    /// Add a theory clause (lemma). `proof` may be [`StepId::NONE`].
    pub fn add_clause(&mut self, lits: Vec<Lit>, proof: StepId) {
        self.clauses.push((lits, proof));
    }

    /// Raise a theory conflict. `clause` is the conflict clause: the
    /// negations of currently-true literals whose conjunction is
    /// theory-inconsistent, i.e. every literal of `clause` is false under
    /// the current assignment.
    pub fn raise_conflict(&mut self, clause: Vec<Lit>, proof: StepId) {
        if self.conflict.is_none() {
            self.conflict = Some((clause, proof));
        }
    }

    /// Whether a conflict has been raised.
    #[must_use]
    pub fn has_conflict(&self) -> bool {
        self.conflict.is_some()
    }

    /// Whether the theory requested any work at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflict.is_none()
            && self.propagations.is_empty()
            && self.clauses.is_empty()
            && self.new_var_pols.is_empty()
    }

    pub(crate) fn take(
        self,
    ) -> (
        Vec<bool>,
        Vec<Lit>,
        Vec<(Vec<Lit>, StepId)>,
        Option<(Vec<Lit>, StepId)>,
    ) {
        (
            self.new_var_pols,
            self.propagations,
            self.clauses,
            self.conflict,
        )
    }
}

/// Callbacks a theory implements to participate in the CDCL(T) loop.
pub trait TheoryCallback {
    /// Called once per new trail entry, in trail order.
    fn on_assume(&mut self, lit: Lit);

    /// Called after propagation quiesces mid-search.
    fn partial_check(&mut self, acts: &mut TheoryActions);

    /// Called when the SAT core would otherwise declare satisfiability. The
    /// theory must decide any remaining cases; if it adds nothing and raises
    /// no conflict, the result is sat.
    fn final_check(&mut self, acts: &mut TheoryActions);

    /// Antecedents of a theory-propagated literal: a set of literals, all
    /// true at earlier trail positions, that imply `lit`.
    fn explain_propagation(&mut self, lit: Lit) -> Vec<Lit>;

    /// Mirror a SAT decision level.
    fn push_level(&mut self);

    /// Mirror SAT backtracking over `n` levels.
    fn pop_levels(&mut self, n: usize);
}

/// A theory with nothing to say; used by the plain SAT entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTheory;

impl TheoryCallback for NullTheory {
    fn on_assume(&mut self, _lit: Lit) {}

    fn partial_check(&mut self, _acts: &mut TheoryActions) {}

    fn final_check(&mut self, _acts: &mut TheoryActions) {}

    fn explain_propagation(&mut self, _lit: Lit) -> Vec<Lit> {
        Vec::new()
    }

    fn push_level(&mut self) {}

    fn pop_levels(&mut self, _n: usize) {}
}
