//! The theory framework: glue between the SAT core and the congruence
//! closure.
//!
//! The framework owns the atom maps (`TermId` ↔ SAT variable), routes
//! asserted literals into CC merges, converts plugin lemmas over term
//! literals into SAT clauses (allocating fresh variables on the way),
//! theory-propagates atoms that joined the `true`/`false` classes, and
//! answers lazy explanation queries during conflict analysis.
//!
//! A model snapshot is taken at every successful final check, because the
//! SAT core unwinds the trail (and with it all CC merges) before the solve
//! call returns.

use crate::cc::{Cc, CcConflict, CcPlugin, Expl, ModelHint, NodeId};
use ferrite_core::ast::{TermId, TermKind, TermManager};
use ferrite_core::literal::TermLit;
use ferrite_core::proof::StepId;
use ferrite_sat::{Lit, TheoryActions, Var};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// A value in a finished model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    /// A Boolean value.
    Bool(bool),
    /// An explicit constructor tree for a datatype value.
    Constructor {
        /// Constructor name.
        name: String,
        /// Argument values, in constructor order.
        args: Vec<ModelValue>,
    },
    /// The class representative, for sorts the theories leave unconstrained.
    Term(TermId),
    /// A fresh value synthesized during model completion.
    Fresh(String),
}

/// Framework statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameworkStats {
    /// Literals routed into the congruence closure.
    pub assumed: u64,
    /// Theory propagations emitted.
    pub propagated: u64,
    /// Conflicts surfaced to the SAT core.
    pub conflicts: u64,
    /// Plugin lemmas converted to SAT clauses.
    pub lemmas: u64,
}

/// SAT ↔ CC bridge state.
pub struct TheoryFramework {
    cc: Cc,
    var_of_term: FxHashMap<TermId, Var>,
    term_of_var: Vec<Option<TermId>>,
    /// Registered Boolean atoms, scanned for theory propagation.
    atoms: Vec<(TermId, Var)>,
    /// Why an atom was theory-propagated: its node and which of the two
    /// Boolean classes it joined. Queried lazily by conflict analysis.
    prop_reason: FxHashMap<usize, (NodeId, bool)>,
    model: Option<FxHashMap<TermId, ModelValue>>,
    stats: FrameworkStats,
}

impl TheoryFramework {
    /// A framework over a fresh congruence closure.
    pub fn new(tm: &TermManager) -> Self {
        Self {
            cc: Cc::new(tm),
            var_of_term: FxHashMap::default(),
            term_of_var: Vec::new(),
            atoms: Vec::new(),
            prop_reason: FxHashMap::default(),
            model: None,
            stats: FrameworkStats::default(),
        }
    }

    /// Install a theory plugin; do this before asserting anything.
    pub fn add_plugin(&mut self, plugin: Box<dyn CcPlugin>) {
        self.cc.add_plugin(plugin);
    }

    /// The congruence closure, for inspection.
    #[must_use]
    pub fn cc(&self) -> &Cc {
        &self.cc
    }

    /// Framework statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameworkStats {
        &self.stats
    }

    /// The SAT variable of a registered atom.
    #[must_use]
    pub fn var_of(&self, t: TermId) -> Option<Var> {
        self.var_of_term.get(&t).copied()
    }

    /// The atom behind a SAT variable.
    #[must_use]
    pub fn term_of_var(&self, v: Var) -> Option<TermId> {
        self.term_of_var.get(v.index()).copied().flatten()
    }

    /// The model snapshot of the last successful final check.
    #[must_use]
    pub fn model(&self) -> Option<&FxHashMap<TermId, ModelValue>> {
        self.model.as_ref()
    }

    /// Map a term literal to a SAT literal, allocating and registering a
    /// fresh variable (via `alloc`) for an unseen atom.
    pub fn lit_for(
        &mut self,
        tm: &mut TermManager,
        tl: TermLit,
        alloc: &mut dyn FnMut(bool) -> Var,
    ) -> Lit {
        let t = tl.term();
        let var = if let Some(&v) = self.var_of_term.get(&t) {
            v
        } else {
            let v = alloc(false);
            self.var_of_term.insert(t, v);
            if self.term_of_var.len() <= v.index() {
                self.term_of_var.resize(v.index() + 1, None);
            }
            self.term_of_var[v.index()] = Some(t);
            self.atoms.push((t, v));
            // Interning cannot itself conflict; hook-requested merges wait
            // in the pending queue for the next check.
            let _ = self.cc.add_term(tm, t);
            trace!(atom = ?tm.display(t), var = v.index(), "atom registered");
            v
        };
        Lit::from_var(var, tl.sign())
    }

    /// Route one asserted trail literal into the congruence closure.
    pub fn on_assume(&mut self, tm: &mut TermManager, lit: Lit) {
        let Some(t) = self
            .term_of_var
            .get(lit.var().index())
            .copied()
            .flatten()
        else {
            return;
        };
        self.stats.assumed += 1;
        let sign = lit.is_positive();
        // Nodes may have been dropped by backtracking; re-intern.
        let Ok(n) = self.cc.add_term(tm, t) else {
            return;
        };
        let store = self.cc.store();
        let (true_node, false_node) = (store.true_node(), store.false_node());
        match tm.kind(t) {
            TermKind::Eq(a, b) if sign => {
                let (a, b) = (*a, *b);
                let _ = self.cc.merge_terms(tm, a, b, Expl::Lit(lit));
                self.cc.merge_nodes(n, true_node, Expl::Lit(lit));
            }
            _ if sign => self.cc.merge_nodes(n, true_node, Expl::Lit(lit)),
            _ => self.cc.merge_nodes(n, false_node, Expl::Lit(lit)),
        }
        self.cc.assume(tm, lit, t, sign);
    }

    /// Mid-search theory check.
    pub fn partial_check(&mut self, tm: &mut TermManager, acts: &mut TheoryActions) {
        self.run_check(tm, acts, false);
    }

    /// Final theory check; snapshots the model when consistent.
    pub fn final_check(&mut self, tm: &mut TermManager, acts: &mut TheoryActions) {
        self.run_check(tm, acts, true);
    }

    fn run_check(&mut self, tm: &mut TermManager, acts: &mut TheoryActions, final_check: bool) {
        let result = if final_check {
            self.cc.final_check(tm)
        } else {
            self.cc.partial_check(tm)
        };
        if let Err(conflict) = result {
            self.raise(acts, conflict);
            return;
        }
        if let Err(conflict) = self.flush_lemmas(tm, acts) {
            self.raise(acts, conflict);
            return;
        }
        self.propagate_bools(acts);
        if final_check {
            self.snapshot_model(tm);
        }
    }

    fn raise(&mut self, acts: &mut TheoryActions, conflict: CcConflict) {
        self.stats.conflicts += 1;
        debug!(rule = conflict.rule, size = conflict.lits.len(), "theory conflict");
        // The conflict holds currently-true literals; the clause is their
        // negation.
        let clause: Vec<Lit> = conflict.lits.iter().map(|l| l.negate()).collect();
        acts.raise_conflict(clause, StepId::NONE);
    }

    /// Convert plugin lemmas (term clauses) into SAT clauses. Conversion
    /// may intern new terms, which may produce further lemmas and pending
    /// merges; iterate until quiet.
    fn flush_lemmas(
        &mut self,
        tm: &mut TermManager,
        acts: &mut TheoryActions,
    ) -> Result<(), CcConflict> {
        loop {
            let lemmas = self.cc.take_lemmas();
            if lemmas.is_empty() {
                return self.cc.check(tm);
            }
            for clause in lemmas {
                self.stats.lemmas += 1;
                let lits: Vec<Lit> = clause
                    .into_iter()
                    .map(|tl| self.lit_for(tm, tl, &mut |pol| acts.new_var(pol)))
                    .collect();
                acts.add_clause(lits, StepId::NONE);
            }
            self.cc.check(tm)?;
        }
    }

    /// Theory-propagate every registered atom sitting in the `true` or
    /// `false` class. The SAT core skips literals it already has.
    fn propagate_bools(&mut self, acts: &mut TheoryActions) {
        let store = self.cc.store();
        let tr = store.find(store.true_node());
        let fr = store.find(store.false_node());
        for &(t, v) in &self.atoms {
            let Some(n) = store.node_of(t) else {
                continue;
            };
            let root = store.find(n);
            if root == tr {
                acts.propagate(Lit::pos(v));
                self.prop_reason.insert(v.index(), (n, true));
                self.stats.propagated += 1;
            } else if root == fr {
                acts.propagate(Lit::neg(v));
                self.prop_reason.insert(v.index(), (n, false));
                self.stats.propagated += 1;
            }
        }
    }

    /// Lazy explanation of a theory-propagated literal: the currently-true
    /// literals implying it.
    pub fn explain_propagation(&mut self, lit: Lit) -> Vec<Lit> {
        let Some(&(n, joined_true)) = self.prop_reason.get(&lit.var().index()) else {
            return Vec::new();
        };
        let store = self.cc.store();
        let target = if joined_true {
            store.true_node()
        } else {
            store.false_node()
        };
        self.cc.explain(n, target)
    }

    /// Mirror a SAT decision level.
    pub fn push_level(&mut self) {
        self.cc.push_level();
    }

    /// Mirror SAT backtracking.
    pub fn pop_levels(&mut self, n: usize) {
        self.cc.pop_levels(n);
    }

    fn snapshot_model(&mut self, tm: &TermManager) {
        let store = self.cc.store();
        let mut values: FxHashMap<TermId, ModelValue> = FxHashMap::default();
        let mut cache: FxHashMap<NodeId, ModelValue> = FxHashMap::default();
        let mut fresh = 0u32;
        for idx in 0..store.num_nodes() {
            let n = NodeId::new(idx as u32);
            let t = store.term_of(n);
            if values.contains_key(&t) {
                continue;
            }
            let value = self.value_of_root(tm, store.find(n), &mut cache, &mut fresh, 0);
            values.insert(t, value);
        }
        self.model = Some(values);
    }

    fn value_of_root(
        &self,
        tm: &TermManager,
        root: NodeId,
        cache: &mut FxHashMap<NodeId, ModelValue>,
        fresh: &mut u32,
        depth: usize,
    ) -> ModelValue {
        if let Some(v) = cache.get(&root) {
            return v.clone();
        }
        if depth > 64 {
            return ModelValue::Fresh(format!("value!{}", next_fresh(fresh)));
        }
        let store = self.cc.store();
        let value = match self.cc.model_hint(tm, root) {
            Some(ModelHint::Constructor(c)) => {
                let name = match tm.kind(store.term_of(c)) {
                    TermKind::Apply { func, .. } => tm.func_name(*func).to_string(),
                    _ => unreachable!("constructor hints are applications"),
                };
                let args = store
                    .children(c)
                    .iter()
                    .map(|&ch| self.value_of_root(tm, store.find(ch), cache, fresh, depth + 1))
                    .collect();
                ModelValue::Constructor { name, args }
            }
            Some(ModelHint::BaseConstructor(dt)) => self.base_value(tm, dt, fresh, depth),
            None => {
                if root == store.find(store.true_node()) {
                    ModelValue::Bool(true)
                } else if root == store.find(store.false_node()) {
                    ModelValue::Bool(false)
                } else {
                    ModelValue::Term(store.term_of(root))
                }
            }
        };
        cache.insert(root, value.clone());
        value
    }

    /// Complete a class that never chose a constructor: apply the base
    /// constructor to synthesized arguments.
    fn base_value(
        &self,
        tm: &TermManager,
        dt: ferrite_core::sort::DatatypeId,
        fresh: &mut u32,
        depth: usize,
    ) -> ModelValue {
        if depth > 64 {
            return ModelValue::Fresh(format!("value!{}", next_fresh(fresh)));
        }
        let info = tm.sorts.datatype(dt);
        let c = &info.constructors[info.base_cstor];
        let args = c
            .field_sorts
            .iter()
            .map(|&s| {
                if let Some(field_dt) = tm.sorts.as_datatype(s) {
                    self.base_value(tm, field_dt, fresh, depth + 1)
                } else if s == tm.sorts.bool_sort {
                    ModelValue::Bool(false)
                } else {
                    ModelValue::Fresh(format!(
                        "{}!{}",
                        tm.sorts.name(s),
                        next_fresh(fresh)
                    ))
                }
            })
            .collect();
        ModelValue::Constructor {
            name: c.name.clone(),
            args,
        }
    }
}

fn next_fresh(fresh: &mut u32) -> u32 {
    let v = *fresh;
    *fresh += 1;
    v
}
