//! Clause arena.
//!
//! Clauses live contiguously in a [`ClauseDb`] and are addressed by
//! [`ClauseId`] handles. The first two literal positions are the watched
//! slots. Deleted slots are recycled through a free list; reduction never
//! frees a clause that is currently the reason of a trail entry (the solver
//! checks this before calling [`ClauseDb::free`]).

use crate::literal::Lit;
use ferrite_core::proof::StepId;
use smallvec::SmallVec;

/// Handle of a clause in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClauseId(u32);

impl ClauseId {
    /// Create from a raw slot index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One stored clause.
#[derive(Debug, Clone)]
pub(crate) struct Clause {
    /// Literals; positions 0 and 1 are the watched slots.
    pub lits: SmallVec<[Lit; 4]>,
    /// Activity for database reduction.
    pub activity: f64,
    /// Literal block distance at learn time.
    pub lbd: u32,
    /// Learned (vs. original) flag.
    pub learned: bool,
    /// Tombstone set by reduction.
    pub deleted: bool,
    /// Proof step that derived this clause.
    pub proof: StepId,
}

/// Statistics kept by the clause arena.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClauseDbStats {
    /// Original clauses currently stored.
    pub num_original: usize,
    /// Learned clauses currently stored.
    pub num_learned: usize,
    /// Clauses removed by reduction.
    pub num_freed: usize,
}

/// Arena of clauses with activity bookkeeping.
#[derive(Debug, Default)]
pub struct ClauseDb {
    clauses: Vec<Clause>,
    free: Vec<ClauseId>,
    stats: ClauseDbStats,
    cla_inc: f64,
    cla_decay: f64,
}

impl ClauseDb {
    /// An empty arena.
    #[must_use]
    pub fn new(cla_decay: f64) -> Self {
        Self {
            clauses: Vec::new(),
            free: Vec::new(),
            stats: ClauseDbStats::default(),
            cla_inc: 1.0,
            cla_decay,
        }
    }

    /// Store a clause and return its handle. Slots freed by reduction are
    /// reused first.
    pub fn alloc(&mut self, lits: SmallVec<[Lit; 4]>, learned: bool, proof: StepId) -> ClauseId {
        debug_assert!(!lits.is_empty());
        if learned {
            self.stats.num_learned += 1;
        } else {
            self.stats.num_original += 1;
        }
        let clause = Clause {
            lits,
            activity: 0.0,
            lbd: 0,
            learned,
            deleted: false,
            proof,
        };
        if let Some(cid) = self.free.pop() {
            self.clauses[cid.index()] = clause;
            cid
        } else {
            let cid = ClauseId::new(self.clauses.len() as u32);
            self.clauses.push(clause);
            cid
        }
    }

    /// Mark a clause deleted and recycle its slot.
    pub fn free(&mut self, cid: ClauseId) {
        let c = &mut self.clauses[cid.index()];
        debug_assert!(!c.deleted);
        if c.learned {
            self.stats.num_learned -= 1;
        } else {
            self.stats.num_original -= 1;
        }
        self.stats.num_freed += 1;
        c.deleted = true;
        c.lits.clear();
        self.free.push(cid);
    }

    /// Literals of a clause.
    #[must_use]
    pub fn lits(&self, cid: ClauseId) -> &[Lit] {
        &self.clauses[cid.index()].lits
    }

    /// Mutable literals (watch maintenance reorders them).
    pub(crate) fn lits_mut(&mut self, cid: ClauseId) -> &mut SmallVec<[Lit; 4]> {
        &mut self.clauses[cid.index()].lits
    }

    /// Whether the slot is a tombstone.
    #[must_use]
    pub fn is_deleted(&self, cid: ClauseId) -> bool {
        self.clauses[cid.index()].deleted
    }

    /// Whether the clause was learned.
    #[must_use]
    pub fn is_learned(&self, cid: ClauseId) -> bool {
        self.clauses[cid.index()].learned
    }

    /// Proof step that derived the clause.
    #[must_use]
    pub fn proof(&self, cid: ClauseId) -> StepId {
        self.clauses[cid.index()].proof
    }

    /// Current activity.
    #[must_use]
    pub fn activity(&self, cid: ClauseId) -> f64 {
        self.clauses[cid.index()].activity
    }

    /// Record the literal block distance of a learned clause.
    pub fn set_lbd(&mut self, cid: ClauseId, lbd: u32) {
        self.clauses[cid.index()].lbd = lbd;
    }

    /// Bump a clause's activity, rescaling everything when it overflows.
    pub fn bump(&mut self, cid: ClauseId) {
        let c = &mut self.clauses[cid.index()];
        c.activity += self.cla_inc;
        if c.activity > 1e20 {
            for c in &mut self.clauses {
                c.activity *= 1e-20;
            }
            self.cla_inc *= 1e-20;
        }
    }

    /// Decay all clause activities (by growing the increment).
    pub fn decay(&mut self) {
        self.cla_inc /= self.cla_decay;
    }

    /// Arena statistics.
    #[must_use]
    pub fn stats(&self) -> ClauseDbStats {
        self.stats
    }

    /// Number of slots (including tombstones).
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.clauses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Var;
    use smallvec::smallvec;

    fn lits(vals: &[i32]) -> SmallVec<[Lit; 4]> {
        vals.iter()
            .map(|&v| {
                let var = Var::new(v.unsigned_abs());
                if v >= 0 {
                    Lit::pos(var)
                } else {
                    Lit::neg(var)
                }
            })
            .collect()
    }

    #[test]
    fn test_alloc_and_free_recycles_slots() {
        let mut db = ClauseDb::new(0.999);
        let a = db.alloc(lits(&[1, 2]), false, StepId::NONE);
        let b = db.alloc(lits(&[2, 3]), true, StepId::NONE);
        assert_ne!(a, b);
        assert_eq!(db.stats().num_original, 1);
        assert_eq!(db.stats().num_learned, 1);

        db.free(b);
        assert!(db.is_deleted(b));
        let c = db.alloc(lits(&[4, 5, 6]), true, StepId::NONE);
        assert_eq!(c, b, "freed slot should be reused");
        assert!(!db.is_deleted(c));
    }

    #[test]
    fn test_bump_rescales() {
        let mut db = ClauseDb::new(0.999);
        let a = db.alloc(smallvec![Lit::pos(Var::new(0))], true, StepId::NONE);
        for _ in 0..4 {
            db.bump(a);
        }
        assert!(db.activity(a) > 0.0);
    }
}
