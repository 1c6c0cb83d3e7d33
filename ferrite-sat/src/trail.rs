//! Trail and assignment.
//!
//! The trail is the ordered log of assigned literals. Decision levels
//! partition it into contiguous segments delimited by `lim`; the propagation
//! head marks how far unit propagation has advanced. Every entry records why
//! it was assigned: a decision, the clause that propagated it, or a theory
//! propagation whose explanation is produced lazily.

use crate::clause::ClauseId;
use crate::literal::{LBool, Lit, Var};

/// Why a trail entry was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reason {
    /// A decision (or an unassigned variable's placeholder).
    #[default]
    Decision,
    /// Unit propagation from this clause; the clause contains the entry's
    /// literal at position 0 and every other literal is false earlier on
    /// the trail.
    Propagation(ClauseId),
    /// Theory propagation; the explanation is queried from the theory
    /// callback only if conflict analysis needs it.
    Theory,
}

/// Ordered assignment log with per-variable metadata.
#[derive(Debug, Default)]
pub struct Trail {
    assign: Vec<LBool>,
    level: Vec<u32>,
    reason: Vec<Reason>,
    trail: Vec<Lit>,
    lim: Vec<usize>,
    head: usize,
}

impl Trail {
    /// An empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more variable.
    pub fn new_var(&mut self) -> Var {
        let v = Var::new(self.assign.len() as u32);
        self.assign.push(LBool::Undef);
        self.level.push(0);
        self.reason.push(Reason::Decision);
        v
    }

    /// Number of registered variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.assign.len()
    }

    /// Assignment of a variable.
    #[must_use]
    pub fn value_var(&self, v: Var) -> LBool {
        self.assign[v.index()]
    }

    /// Assignment of a literal (sign-adjusted).
    #[must_use]
    pub fn value(&self, lit: Lit) -> LBool {
        let v = self.assign[lit.var().index()];
        if lit.is_positive() {
            v
        } else {
            v.negate()
        }
    }

    /// Decision level at which a variable was assigned.
    #[must_use]
    pub fn level_of(&self, v: Var) -> u32 {
        self.level[v.index()]
    }

    /// Reason of a variable's assignment.
    #[must_use]
    pub fn reason_of(&self, v: Var) -> Reason {
        self.reason[v.index()]
    }

    /// Current decision level.
    #[must_use]
    pub fn decision_level(&self) -> u32 {
        self.lim.len() as u32
    }

    /// Number of trail entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trail.len()
    }

    /// Whether the trail is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    /// Entry at a trail position.
    #[must_use]
    pub fn get(&self, idx: usize) -> Lit {
        self.trail[idx]
    }

    /// The whole trail, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[Lit] {
        &self.trail
    }

    /// Raw per-variable assignments, indexed by variable.
    #[must_use]
    pub fn assignments(&self) -> &[LBool] {
        &self.assign
    }

    /// Append an assignment at the current decision level.
    ///
    /// The caller must have checked that the variable is unassigned.
    pub fn assign(&mut self, lit: Lit, reason: Reason) {
        let v = lit.var();
        debug_assert!(self.assign[v.index()].is_undef());
        self.assign[v.index()] = LBool::from_bool(lit.is_positive());
        self.level[v.index()] = self.decision_level();
        self.reason[v.index()] = reason;
        self.trail.push(lit);
    }

    /// Open a new decision level.
    pub fn push_level(&mut self) {
        self.lim.push(self.trail.len());
    }

    /// Next literal awaiting propagation, advancing the head.
    pub fn next_to_propagate(&mut self) -> Option<Lit> {
        if self.head < self.trail.len() {
            let lit = self.trail[self.head];
            self.head += 1;
            Some(lit)
        } else {
            None
        }
    }

    /// Propagation head position.
    #[must_use]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Skip propagation of everything currently on the trail (used when a
    /// conflict aborts the current round).
    pub fn set_head_to_end(&mut self) {
        self.head = self.trail.len();
    }

    /// Unwind to `target_level`, handing each removed literal to `unassign`
    /// newest first. The per-variable state is cleared here; phase saving is
    /// the caller's business.
    pub fn pop_to(&mut self, target_level: u32, mut unassign: impl FnMut(Lit)) {
        debug_assert!(target_level <= self.decision_level());
        if target_level >= self.decision_level() {
            return;
        }
        let target_len = self.lim[target_level as usize];
        while self.trail.len() > target_len {
            let lit = self.trail.pop().expect("trail underflow");
            let v = lit.var();
            self.assign[v.index()] = LBool::Undef;
            self.reason[v.index()] = Reason::Decision;
            unassign(lit);
        }
        self.lim.truncate(target_level as usize);
        self.head = self.trail.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_value() {
        let mut t = Trail::new();
        let v = t.new_var();
        assert!(t.value_var(v).is_undef());
        t.assign(Lit::neg(v), Reason::Decision);
        assert!(t.value(Lit::neg(v)).is_true());
        assert!(t.value(Lit::pos(v)).is_false());
        assert_eq!(t.level_of(v), 0);
    }

    #[test]
    fn test_pop_to_restores_state() {
        let mut t = Trail::new();
        let a = t.new_var();
        let b = t.new_var();
        t.assign(Lit::pos(a), Reason::Decision);
        t.push_level();
        t.assign(Lit::pos(b), Reason::Decision);
        assert_eq!(t.decision_level(), 1);

        let mut popped = Vec::new();
        t.pop_to(0, |l| popped.push(l));
        assert_eq!(popped, vec![Lit::pos(b)]);
        assert!(t.value_var(b).is_undef());
        assert!(t.value_var(a).is_true());
        assert_eq!(t.decision_level(), 0);
        assert_eq!(t.head(), 1);
    }
}
