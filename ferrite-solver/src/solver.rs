//! The CDCL(T) driver.
//!
//! [`SmtSolver`] owns the term manager, the SAT core and the theory
//! framework, and wires them together for a solve: input clauses over term
//! literals are internalized into SAT clauses (registering their atoms with
//! the congruence closure), the SAT core runs with the framework as its
//! theory callback, and on sat the framework's model snapshot becomes the
//! queryable [`Model`].

use crate::model::Model;
use ferrite_core::ast::{TermId, TermManager};
use ferrite_core::error::{Error, Result};
use ferrite_core::literal::TermLit;
use ferrite_core::proof::StepTable;
use ferrite_core::resource::ResourceManager;
use ferrite_sat::{
    Lit, Solver as SatSolver, SolverConfig as SatConfig, SolverResult as SatResult, SolverStats,
    TheoryActions, TheoryCallback,
};
use ferrite_theories::{DatatypeTheory, FrameworkStats, TheoryFramework};
use tracing::debug;

/// Outcome of an SMT query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtResult {
    /// Satisfiable; a model is available.
    Sat,
    /// Unsatisfiable; with assumptions, a core is available.
    Unsat,
    /// Aborted by a resource limit or interrupt.
    Unknown,
}

/// Configuration of the SMT driver.
#[derive(Debug, Clone, Default)]
pub struct SmtConfig {
    /// Parameters of the underlying SAT search.
    pub sat: SatConfig,
    /// Record proof steps.
    pub produce_proofs: bool,
}

/// Adapter giving the SAT core access to the framework together with the
/// term manager it needs.
struct Bridge<'a> {
    tm: &'a mut TermManager,
    fw: &'a mut TheoryFramework,
}

impl TheoryCallback for Bridge<'_> {
    fn on_assume(&mut self, lit: Lit) {
        self.fw.on_assume(self.tm, lit);
    }

    fn partial_check(&mut self, acts: &mut TheoryActions) {
        self.fw.partial_check(self.tm, acts);
    }

    fn final_check(&mut self, acts: &mut TheoryActions) {
        self.fw.final_check(self.tm, acts);
    }

    fn explain_propagation(&mut self, lit: Lit) -> Vec<Lit> {
        self.fw.explain_propagation(lit)
    }

    fn push_level(&mut self) {
        self.fw.push_level();
    }

    fn pop_levels(&mut self, n: usize) {
        self.fw.pop_levels(n);
    }
}

/// An SMT solver over uninterpreted functions and algebraic datatypes.
pub struct SmtSolver {
    tm: TermManager,
    sat: SatSolver,
    fw: TheoryFramework,
    config: SmtConfig,
    resources: ResourceManager,
    /// Assertion log, replayed by [`SmtSolver::pop_levels`].
    asserted: Vec<Vec<TermLit>>,
    scopes: Vec<usize>,
    model: Option<Model>,
    core: Vec<TermLit>,
}

impl SmtSolver {
    /// A solver with default configuration and the datatype theory
    /// installed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SmtConfig::default())
    }

    /// A solver with the given configuration.
    #[must_use]
    pub fn with_config(config: SmtConfig) -> Self {
        let tm = TermManager::new();
        let mut sat = SatSolver::with_config(config.sat.clone());
        if config.produce_proofs {
            sat.enable_proofs();
        }
        let mut fw = TheoryFramework::new(&tm);
        fw.add_plugin(Box::new(DatatypeTheory::new()));
        Self {
            tm,
            sat,
            fw,
            config,
            resources: ResourceManager::new(),
            asserted: Vec::new(),
            scopes: Vec::new(),
            model: None,
            core: Vec::new(),
        }
    }

    /// Install resource limits (time, conflicts, interrupt flag).
    pub fn set_resources(&mut self, resources: ResourceManager) {
        self.sat.set_resources(resources.clone());
        self.resources = resources;
    }

    /// The term manager, for building terms.
    #[must_use]
    pub fn terms(&self) -> &TermManager {
        &self.tm
    }

    /// Mutable access to the term manager.
    pub fn terms_mut(&mut self) -> &mut TermManager {
        &mut self.tm
    }

    /// SAT search statistics.
    #[must_use]
    pub fn sat_stats(&self) -> &SolverStats {
        self.sat.stats()
    }

    /// Theory framework statistics.
    #[must_use]
    pub fn theory_stats(&self) -> &FrameworkStats {
        self.fw.stats()
    }

    /// Recorded proof steps, when proofs are enabled.
    #[must_use]
    pub fn proof(&self) -> Option<&StepTable> {
        self.sat.proof()
    }

    /// Assert one clause of term literals at the root level.
    pub fn assert_clause(&mut self, clause: &[TermLit]) {
        self.asserted.push(clause.to_vec());
        self.install_clause_idx(self.asserted.len() - 1);
    }

    /// Assert a list of clauses.
    pub fn assume(&mut self, clauses: &[Vec<TermLit>]) {
        for c in clauses {
            self.assert_clause(c);
        }
    }

    /// Assert a Boolean term as a unit clause.
    pub fn assert_term(&mut self, t: TermId) -> Result<()> {
        if self.tm.sort(t) != self.tm.sorts.bool_sort {
            return Err(Error::SortMismatch {
                expected: "Bool".to_string(),
                got: self.tm.sorts.name(self.tm.sort(t)).to_string(),
            });
        }
        let lit = TermLit::new(&self.tm, t, true);
        self.assert_clause(&[lit]);
        Ok(())
    }

    fn install_clause_idx(&mut self, idx: usize) {
        let Self {
            tm,
            sat,
            fw,
            asserted,
            ..
        } = self;
        let clause = &asserted[idx];
        let lits: Vec<Lit> = clause
            .iter()
            .map(|&tl| fw.lit_for(tm, tl, &mut |pol| sat.new_var_default(pol)))
            .collect();
        sat.add_clause(lits);
    }

    /// Decide satisfiability of the asserted clauses.
    pub fn solve(&mut self) -> SmtResult {
        self.solve_with_assumptions(&[])
    }

    /// Decide satisfiability under assumptions; on `Unsat`,
    /// [`SmtSolver::unsat_core`] holds the responsible assumption subset.
    pub fn solve_with_assumptions(&mut self, assumptions: &[TermLit]) -> SmtResult {
        self.model = None;
        self.core.clear();
        let Self { tm, sat, fw, .. } = self;
        let sat_assumptions: Vec<Lit> = assumptions
            .iter()
            .map(|&tl| fw.lit_for(tm, tl, &mut |pol| sat.new_var_default(pol)))
            .collect();
        let mut bridge = Bridge { tm, fw };
        let result = sat.solve_with_theory(&mut bridge, &sat_assumptions);
        debug!(?result, "smt solve finished");
        match result {
            SatResult::Sat => {
                let values = self.fw.model().cloned().unwrap_or_default();
                self.model = Some(Model::new(values));
                SmtResult::Sat
            }
            SatResult::Unsat => {
                self.core = self
                    .sat
                    .unsat_core()
                    .iter()
                    .filter_map(|l| {
                        self.fw
                            .term_of_var(l.var())
                            .map(|t| if l.is_positive() {
                                TermLit::positive(t)
                            } else {
                                TermLit::negative(t)
                            })
                    })
                    .collect();
                SmtResult::Unsat
            }
            SatResult::Unknown => SmtResult::Unknown,
        }
    }

    /// The model of the last sat answer.
    #[must_use]
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// The assumption core of the last unsat-under-assumptions answer.
    #[must_use]
    pub fn unsat_core(&self) -> &[TermLit] {
        &self.core
    }

    /// Open an assertion scope.
    pub fn push_level(&mut self) {
        self.scopes.push(self.asserted.len());
    }

    /// Drop the last `n` assertion scopes, retracting their clauses.
    ///
    /// The engine state is rebuilt from the retained assertion log; terms
    /// survive (the manager is append-only).
    pub fn pop_levels(&mut self, n: usize) {
        assert!(n <= self.scopes.len(), "pop_levels: not enough scopes");
        let target = self.scopes.len() - n;
        let keep = self.scopes[target];
        self.scopes.truncate(target);
        self.asserted.truncate(keep);
        self.rebuild();
    }

    /// Current number of open scopes.
    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.scopes.len()
    }

    fn rebuild(&mut self) {
        self.model = None;
        self.core.clear();
        self.sat = SatSolver::with_config(self.config.sat.clone());
        if self.config.produce_proofs {
            self.sat.enable_proofs();
        }
        self.sat.set_resources(self.resources.clone());
        self.fw = TheoryFramework::new(&self.tm);
        self.fw.add_plugin(Box::new(DatatypeTheory::new()));
        for idx in 0..self.asserted.len() {
            self.install_clause_idx(idx);
        }
    }
}

impl Default for SmtSolver {
    fn default() -> Self {
        Self::new()
    }
}
