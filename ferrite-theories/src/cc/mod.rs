//! Congruence closure with pluggable micro-theories.
//!
//! The [`Cc`] drives a merge fixpoint over a [`CcStore`]: asserted
//! equalities and plugin-requested merges go through a pending queue; each
//! merge first consults every plugin's `on_pre_merge` hook (which may veto
//! with a conflict or enqueue further work), then performs the physical
//! union, which in turn detects new congruences. Merging the classes of
//! `true` and `false` is the canonical inconsistency.
//!
//! Plugins never hold references into the store: hooks receive the store
//! handle and node indices explicitly.

mod store;

pub use store::{CcConflict, CcStore, Expl, NodeId};

use ferrite_core::ast::{TermId, TermManager};
use ferrite_core::literal::TermLit;
use ferrite_core::sort::DatatypeId;
use ferrite_sat::Lit;
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::trace;

/// The merge about to happen, as seen by `on_pre_merge`.
#[derive(Debug, Clone, Copy)]
pub struct MergeInfo {
    /// Root that survives the union.
    pub big: NodeId,
    /// Root that is absorbed.
    pub sub: NodeId,
    /// The node on `big`'s side that triggered the merge.
    pub t_big: NodeId,
    /// The node on `sub`'s side that triggered the merge.
    pub t_sub: NodeId,
}

/// Work a plugin requests from a hook.
#[derive(Debug, Default)]
pub struct CcActions {
    merges: Vec<(NodeId, NodeId, Expl)>,
    clauses: Vec<Vec<TermLit>>,
}

impl CcActions {
    /// Request a merge, to be processed by the fixpoint.
    pub fn merge(&mut self, a: NodeId, b: NodeId, expl: Expl) {
        self.merges.push((a, b, expl));
    }

    /// Emit a clause over term literals, to be installed in the SAT core.
    pub fn add_clause(&mut self, clause: Vec<TermLit>) {
        self.clauses.push(clause);
    }

    fn is_empty(&self) -> bool {
        self.merges.is_empty() && self.clauses.is_empty()
    }

    fn drain_into(
        self,
        pending: &mut VecDeque<(NodeId, NodeId, Expl)>,
        lemmas: &mut Vec<Vec<TermLit>>,
    ) {
        for m in self.merges {
            pending.push_back(m);
        }
        lemmas.extend(self.clauses);
    }
}

/// Hint a plugin gives the model builder for one class.
#[derive(Debug, Clone, Copy)]
pub enum ModelHint {
    /// The class contains this constructor application.
    Constructor(NodeId),
    /// The class never chose a constructor; complete it with the
    /// datatype's base constructor.
    BaseConstructor(DatatypeId),
}

/// A micro-theory plugged into the congruence closure.
pub trait CcPlugin {
    /// Plugin name, for diagnostics.
    fn name(&self) -> &'static str;

    /// A node was just interned.
    fn on_new_node(
        &mut self,
        tm: &mut TermManager,
        store: &CcStore,
        n: NodeId,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict>;

    /// Two classes are about to merge. Returning a conflict aborts the
    /// merge and surfaces to the SAT core.
    fn on_pre_merge(
        &mut self,
        tm: &TermManager,
        store: &CcStore,
        info: &MergeInfo,
        expl: &Expl,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict>;

    /// A literal was asserted on the trail (already routed into merges by
    /// the framework; plugins may track their own view).
    fn on_assume(&mut self, tm: &TermManager, store: &CcStore, lit: Lit, term: TermId, sign: bool);

    /// Mid-search check, after the merge fixpoint quiesced.
    fn partial_check(
        &mut self,
        tm: &mut TermManager,
        store: &CcStore,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict>;

    /// Final check: decide remaining cases (case splits, acyclicity).
    fn final_check(
        &mut self,
        tm: &mut TermManager,
        store: &CcStore,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict>;

    /// Model hint for a class, if this plugin constrains it.
    fn model_hint(&self, tm: &TermManager, store: &CcStore, root: NodeId) -> Option<ModelHint>;

    /// Mirror a SAT decision level.
    fn push_level(&mut self);

    /// Mirror SAT backtracking.
    fn pop_levels(&mut self, n: usize);
}

/// Congruence closure plus its plugins and pending-merge queue.
pub struct Cc {
    store: CcStore,
    plugins: Vec<Box<dyn CcPlugin>>,
    pending: VecDeque<(NodeId, NodeId, Expl)>,
    /// Term clauses produced by plugin hooks, drained by the framework.
    lemmas: Vec<Vec<TermLit>>,
}

impl Cc {
    /// A congruence closure over the given term manager's `true`/`false`.
    pub fn new(tm: &TermManager) -> Self {
        Self {
            store: CcStore::new(tm),
            plugins: Vec::new(),
            pending: VecDeque::new(),
            lemmas: Vec::new(),
        }
    }

    /// Install a plugin. Plugins see only nodes added after installation,
    /// so install them before asserting anything.
    pub fn add_plugin(&mut self, plugin: Box<dyn CcPlugin>) {
        self.plugins.push(plugin);
    }

    /// Read access to the store.
    #[must_use]
    pub fn store(&self) -> &CcStore {
        &self.store
    }

    /// Intern a term, firing `on_new_node` hooks for each new node.
    pub fn add_term(&mut self, tm: &mut TermManager, t: TermId) -> Result<NodeId, CcConflict> {
        let mut new_nodes = Vec::new();
        let n = self
            .store
            .add_term(tm, t, &mut self.pending, &mut new_nodes);
        let Self {
            plugins,
            store,
            pending,
            lemmas,
        } = self;
        for n in new_nodes {
            for plugin in plugins.iter_mut() {
                let mut acts = CcActions::default();
                let result = plugin.on_new_node(tm, store, n, &mut acts);
                acts.drain_into(pending, lemmas);
                result?;
            }
        }
        Ok(n)
    }

    /// Assert the merge `a = b` justified by `expl`.
    pub fn merge_terms(
        &mut self,
        tm: &mut TermManager,
        a: TermId,
        b: TermId,
        expl: Expl,
    ) -> Result<(), CcConflict> {
        let na = self.add_term(tm, a)?;
        let nb = self.add_term(tm, b)?;
        self.pending.push_back((na, nb, expl));
        Ok(())
    }

    /// Enqueue a merge of two existing nodes.
    pub fn merge_nodes(&mut self, a: NodeId, b: NodeId, expl: Expl) {
        self.pending.push_back((a, b, expl));
    }

    /// Forward an asserted literal to the plugins.
    pub fn assume(&mut self, tm: &TermManager, lit: Lit, term: TermId, sign: bool) {
        for plugin in &mut self.plugins {
            plugin.on_assume(tm, &self.store, lit, term, sign);
        }
    }

    /// Run the merge fixpoint to quiescence.
    pub fn check(&mut self, tm: &mut TermManager) -> Result<(), CcConflict> {
        while let Some((a, b, expl)) = self.pending.pop_front() {
            if let Err(conflict) = self.do_merge(tm, a, b, expl) {
                // Remaining tasks reference state the backtrack will
                // revert; they are re-derived after the conflict.
                self.pending.clear();
                return Err(conflict);
            }
        }
        Ok(())
    }

    fn do_merge(
        &mut self,
        tm: &mut TermManager,
        a: NodeId,
        b: NodeId,
        expl: Expl,
    ) -> Result<(), CcConflict> {
        let ra = self.store.find(a);
        let rb = self.store.find(b);
        if ra == rb {
            return Ok(());
        }
        let tr = self.store.find(self.store.true_node());
        let fr = self.store.find(self.store.false_node());
        if (ra == tr && rb == fr) || (ra == fr && rb == tr) {
            let mut lits = Vec::new();
            self.store.explain_label(&expl, &mut lits);
            let (t_true, t_false) = if ra == tr { (a, b) } else { (b, a) };
            self.store
                .explain_lits(t_true, self.store.true_node(), &mut lits);
            self.store
                .explain_lits(t_false, self.store.false_node(), &mut lits);
            return Err(CcConflict {
                lits,
                rule: "true-false-merge",
            });
        }

        let (big, sub, t_big, t_sub) = if self.store.class_size(ra) >= self.store.class_size(rb) {
            (ra, rb, a, b)
        } else {
            (rb, ra, b, a)
        };
        let info = MergeInfo {
            big,
            sub,
            t_big,
            t_sub,
        };
        {
            let Self {
                plugins,
                store,
                pending,
                lemmas,
            } = self;
            for plugin in plugins.iter_mut() {
                let mut acts = CcActions::default();
                let result = plugin.on_pre_merge(tm, store, &info, &expl, &mut acts);
                acts.drain_into(pending, lemmas);
                result?;
            }
        }
        trace!(big = big.index(), sub = sub.index(), "cc merge");
        self.store
            .union(tm, big, sub, t_big, t_sub, expl, &mut self.pending);
        Ok(())
    }

    /// Run the fixpoint, then every plugin's partial check, to mutual
    /// quiescence.
    pub fn partial_check(&mut self, tm: &mut TermManager) -> Result<(), CcConflict> {
        loop {
            self.check(tm)?;
            let mut any = false;
            {
                let Self {
                    plugins,
                    store,
                    pending,
                    lemmas,
                } = self;
                for plugin in plugins.iter_mut() {
                    let mut acts = CcActions::default();
                    let result = plugin.partial_check(tm, store, &mut acts);
                    any |= !acts.is_empty();
                    acts.drain_into(pending, lemmas);
                    result?;
                }
            }
            if !any && self.pending.is_empty() {
                return Ok(());
            }
        }
    }

    /// Run the fixpoint, then every plugin's final check.
    pub fn final_check(&mut self, tm: &mut TermManager) -> Result<(), CcConflict> {
        self.partial_check(tm)?;
        {
            let Self {
                plugins,
                store,
                pending,
                lemmas,
            } = self;
            for plugin in plugins.iter_mut() {
                let mut acts = CcActions::default();
                let result = plugin.final_check(tm, store, &mut acts);
                acts.drain_into(pending, lemmas);
                result?;
            }
        }
        self.check(tm)
    }

    /// Take the term clauses accumulated by plugin hooks.
    pub fn take_lemmas(&mut self) -> Vec<Vec<TermLit>> {
        std::mem::take(&mut self.lemmas)
    }

    /// Model hint for a class, from the first plugin that has one.
    #[must_use]
    pub fn model_hint(&self, tm: &TermManager, root: NodeId) -> Option<ModelHint> {
        self.plugins
            .iter()
            .find_map(|p| p.model_hint(tm, &self.store, root))
    }

    /// Collect the literals implying `a = b`.
    #[must_use]
    pub fn explain(&self, a: NodeId, b: NodeId) -> Vec<Lit> {
        let mut lits = Vec::new();
        self.store.explain_lits(a, b, &mut lits);
        lits
    }

    /// Open a level in the store and every plugin.
    pub fn push_level(&mut self) {
        self.store.push_level();
        for plugin in &mut self.plugins {
            plugin.push_level();
        }
    }

    /// Revert `n` levels in the store and every plugin.
    pub fn pop_levels(&mut self, n: usize) {
        // Pending tasks reference nodes the pop may remove.
        self.pending.clear();
        self.store.pop_levels(n);
        for plugin in &mut self.plugins {
            plugin.pop_levels(n);
        }
    }

    /// Current level depth.
    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.store.n_levels()
    }
}

/// Build a theory-rule explanation over node pairs.
#[must_use]
pub fn theory_expl(rule: &'static str, pairs: &[(NodeId, NodeId)]) -> Expl {
    Expl::Theory(rule, SmallVec::from_slice(pairs))
}
