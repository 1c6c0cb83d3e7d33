//! Proof tracing.
//!
//! The tracer records an append-only graph of proof steps. Each step carries
//! a rule name, ordered references to premise steps, and the literals and
//! terms it mentions. When tracing is disabled every `add_step` call is a
//! no-op returning the [`StepId::NONE`] sentinel, so callers never branch on
//! whether proofs are enabled.

use crate::ast::TermId;
use crate::literal::Lit;
use smallvec::SmallVec;

/// Rule names used by the core derivations.
pub mod rules {
    /// An input clause asserted by the driver.
    pub const INPUT: &str = "input";
    /// First-UIP resolution of a conflict.
    pub const RESOLUTION: &str = "resolution";
    /// A clause supplied by a theory.
    pub const THEORY_LEMMA: &str = "theory-lemma";
    /// A theory propagation explained after the fact.
    pub const THEORY_PROPAGATION: &str = "theory-propagation";
    /// Congruence-closure equality reasoning.
    pub const CONGRUENCE: &str = "congruence";
    /// Datatype constructor disjointness.
    pub const DT_DISJOINT: &str = "dt-disjoint";
    /// Datatype constructor injectivity.
    pub const DT_INJECT: &str = "dt-inject";
    /// Datatype selector reduction.
    pub const DT_SELECT: &str = "dt-select";
    /// Datatype tester reasoning.
    pub const DT_TESTER: &str = "dt-tester";
    /// Datatype acyclicity.
    pub const DT_ACYCLIC: &str = "dt-acyclic";
    /// Datatype exhaustive case split.
    pub const DT_SPLIT: &str = "dt-split";
    /// The final root-level conflict.
    pub const UNSAT: &str = "unsat";
}

/// Identifier of a recorded proof step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u32);

impl StepId {
    /// Sentinel for "no step" (tracing disabled or premise unknown).
    pub const NONE: StepId = StepId(u32::MAX);

    /// Create a step id from a raw index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Index into the step table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this id refers to a recorded step.
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }
}

/// One recorded proof step.
#[derive(Debug, Clone)]
pub struct TraceStep {
    /// Rule name, one of [`rules`].
    pub rule: &'static str,
    /// Premise steps, in order.
    pub premises: SmallVec<[StepId; 2]>,
    /// Literals referenced by the step, in order.
    pub lits: Vec<Lit>,
    /// Terms referenced by the step, in order.
    pub terms: Vec<TermId>,
}

/// Sink for proof steps.
pub trait ProofTracer {
    /// Whether steps are actually recorded. Producers may skip assembling
    /// expensive explanations when this is false.
    fn enabled(&self) -> bool;

    /// Append a step and return its id.
    fn add_step(
        &mut self,
        rule: &'static str,
        premises: &[StepId],
        lits: &[Lit],
        terms: &[TermId],
    ) -> StepId;
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracer;

impl ProofTracer for NullTracer {
    fn enabled(&self) -> bool {
        false
    }

    fn add_step(
        &mut self,
        _rule: &'static str,
        _premises: &[StepId],
        _lits: &[Lit],
        _terms: &[TermId],
    ) -> StepId {
        StepId::NONE
    }
}

/// In-memory append-only step table.
#[derive(Debug, Clone, Default)]
pub struct StepTable {
    steps: Vec<TraceStep>,
}

impl StepTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded steps, in insertion order.
    #[must_use]
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Look up a recorded step.
    #[must_use]
    pub fn get(&self, id: StepId) -> Option<&TraceStep> {
        if id.is_some() {
            self.steps.get(id.index())
        } else {
            None
        }
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ProofTracer for StepTable {
    fn enabled(&self) -> bool {
        true
    }

    fn add_step(
        &mut self,
        rule: &'static str,
        premises: &[StepId],
        lits: &[Lit],
        terms: &[TermId],
    ) -> StepId {
        let id = StepId::new(self.steps.len() as u32);
        self.steps.push(TraceStep {
            rule,
            premises: SmallVec::from_slice(premises),
            lits: lits.to_vec(),
            terms: terms.to_vec(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_tracer_is_inert() {
        let mut t = NullTracer;
        assert!(!t.enabled());
        let id = t.add_step(rules::INPUT, &[], &[Lit::positive(0)], &[]);
        assert!(!id.is_some());
    }

    #[test]
    fn test_step_table_appends() {
        let mut t = StepTable::new();
        let a = t.add_step(rules::INPUT, &[], &[Lit::positive(0)], &[]);
        let b = t.add_step(rules::RESOLUTION, &[a], &[], &[]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(b).unwrap().premises.as_slice(), &[a]);
    }
}
