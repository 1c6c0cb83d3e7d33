//! Watch lists for two-watched-literal propagation.
//!
//! `watches[l]` holds the clauses currently watching literal `l`. Each entry
//! caches a blocker (the other watched literal) so propagation can skip the
//! clause without touching the arena when the blocker is already true.

use crate::clause::ClauseId;
use crate::literal::Lit;

/// One watch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watcher {
    /// The watching clause.
    pub clause: ClauseId,
    /// The other watched literal, cached.
    pub blocker: Lit,
}

/// Per-literal watcher lists.
#[derive(Debug, Default)]
pub struct WatchLists {
    lists: Vec<Vec<Watcher>>,
}

impl WatchLists {
    /// Empty watch lists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow to cover `num_vars` variables (two lists per variable).
    pub fn grow_to(&mut self, num_vars: usize) {
        self.lists.resize_with(num_vars * 2, Vec::new);
    }

    /// Watchers of a literal.
    #[must_use]
    pub fn get(&self, lit: Lit) -> &[Watcher] {
        &self.lists[lit.index()]
    }

    /// Mutable watcher list of a literal.
    pub fn get_mut(&mut self, lit: Lit) -> &mut Vec<Watcher> {
        &mut self.lists[lit.index()]
    }

    /// Register `clause` as watching `lit`.
    pub fn attach(&mut self, lit: Lit, clause: ClauseId, blocker: Lit) {
        self.lists[lit.index()].push(Watcher { clause, blocker });
    }

    /// Remove `clause` from the watchers of `lit`.
    pub fn detach(&mut self, lit: Lit, clause: ClauseId) {
        self.lists[lit.index()].retain(|w| w.clause != clause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Var;

    #[test]
    fn test_attach_detach() {
        let mut w = WatchLists::new();
        w.grow_to(4);
        let l = Lit::pos(Var::new(1));
        let c0 = ClauseId::new(0);
        let c1 = ClauseId::new(1);
        w.attach(l, c0, Lit::neg(Var::new(2)));
        w.attach(l, c1, Lit::neg(Var::new(3)));
        assert_eq!(w.get(l).len(), 2);
        w.detach(l, c0);
        assert_eq!(w.get(l).len(), 1);
        assert_eq!(w.get(l)[0].clause, c1);
    }
}
