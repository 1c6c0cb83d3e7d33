//! Algebraic datatype theory, as a congruence-closure plugin.
//!
//! The plugin maintains, per CC class, the unique constructor application
//! known for the class (if any) and the tester/selector applications whose
//! argument lives in the class. The rules:
//!
//! - **Injectivity**: merging two classes holding the same constructor
//!   merges the constructor arguments pairwise.
//! - **Disjointness**: merging two classes holding different constructors
//!   is a conflict.
//! - **Tester fixing**: once a class has constructor `C`, every `is-D`
//!   application over the class reduces to `C = D`.
//! - **Selector reduction**: `sel_{C,i}` over a class with constructor
//!   `C(a_0, ..)` reduces to `a_i`.
//! - **Selector instantiation** (partial check): an asserted `is-C(t)`
//!   forces `t = C(sel_{C,0}(t), ..)`.
//! - **Acyclicity** (final check): no class may reach itself through
//!   constructor arguments.
//! - **Case split** (final check): a finite-datatype class that never chose
//!   a constructor gets the exhaustive tester clauses.
//!
//! Class-indexed state is journaled and reverts on `pop_levels`; the
//! case-split and instantiation markers are keyed by term and persist, since
//! the emitted clauses are permanent.

use crate::cc::{theory_expl, CcActions, CcConflict, CcPlugin, CcStore, Expl, MergeInfo, ModelHint, NodeId};
use ferrite_core::ast::{FuncKind, TermId, TermKind, TermManager};
use ferrite_core::backtrack::BacktrackStack;
use ferrite_core::literal::TermLit;
use ferrite_core::proof::rules;
use ferrite_core::sort::DatatypeId;
use ferrite_sat::Lit;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
enum DtParentKind {
    Tester { dt: DatatypeId, cstor: usize },
    Selector { dt: DatatypeId, cstor: usize, field: usize },
}

#[derive(Debug, Clone, Copy)]
struct DtParent {
    node: NodeId,
    kind: DtParentKind,
}

enum DtUndo {
    CstorSet { root: NodeId, old: Option<NodeId> },
    ParentPushed { root: NodeId },
    ParentsExtended { root: NodeId, old_len: usize },
    TesterPopped,
}

/// The datatype theory plugin.
pub struct DatatypeTheory {
    /// Representative -> the constructor application known for the class.
    cstors: FxHashMap<NodeId, NodeId>,
    /// Representative -> tester/selector applications over the class.
    parents: FxHashMap<NodeId, Vec<DtParent>>,
    undo: BacktrackStack<DtUndo>,
    /// Positive `is-C(t)` assertions currently on the trail.
    asserted_testers: Vec<TermId>,
    /// Finite-datatype terms awaiting a case split, in insertion order.
    to_decide: Vec<TermId>,
    to_decide_set: FxHashSet<TermId>,
    /// Terms whose exhaustive case-split clauses were already emitted.
    split_done: FxHashSet<TermId>,
    /// Testers whose selector instantiation was already emitted.
    inst_done: FxHashSet<TermId>,
}

impl DatatypeTheory {
    /// An empty datatype theory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cstors: FxHashMap::default(),
            parents: FxHashMap::default(),
            undo: BacktrackStack::new(),
            asserted_testers: Vec::new(),
            to_decide: Vec::new(),
            to_decide_set: FxHashSet::default(),
            split_done: FxHashSet::default(),
            inst_done: FxHashSet::default(),
        }
    }

    fn set_cstor(&mut self, root: NodeId, c: NodeId) {
        let old = self.cstors.insert(root, c);
        self.undo.push(DtUndo::CstorSet { root, old });
    }

    fn push_parent(&mut self, root: NodeId, parent: DtParent) {
        self.parents.entry(root).or_default().push(parent);
        self.undo.push(DtUndo::ParentPushed { root });
    }

    /// Constructor identity of a constructor application node.
    fn cstor_id(tm: &TermManager, store: &CcStore, c: NodeId) -> (DatatypeId, usize) {
        match tm.kind(store.term_of(c)) {
            TermKind::Apply { func, .. } => match tm.func(*func).kind {
                FuncKind::Constructor { dt, cstor } => (dt, cstor),
                _ => unreachable!("class constructor entry is a constructor application"),
            },
            _ => unreachable!("class constructor entry is an application"),
        }
    }

    /// Reductions of one side's tester/selector parents against the other
    /// side's constructor, enqueued for after the union.
    fn apply_parent_rules(
        &self,
        tm: &TermManager,
        store: &CcStore,
        c: NodeId,
        parents_root: NodeId,
        acts: &mut CcActions,
    ) {
        let Some(parents) = self.parents.get(&parents_root) else {
            return;
        };
        let (c_dt, c_idx) = Self::cstor_id(tm, store, c);
        for p in parents {
            let arg = store.children(p.node)[0];
            match p.kind {
                DtParentKind::Tester { dt, cstor } => {
                    if dt != c_dt {
                        continue;
                    }
                    let target = if cstor == c_idx {
                        store.true_node()
                    } else {
                        store.false_node()
                    };
                    acts.merge(p.node, target, theory_expl(rules::DT_TESTER, &[(arg, c)]));
                }
                DtParentKind::Selector { dt, cstor, field } => {
                    if dt != c_dt || cstor != c_idx {
                        continue;
                    }
                    let value = store.children(c)[field];
                    acts.merge(p.node, value, theory_expl(rules::DT_SELECT, &[(arg, c)]));
                }
            }
        }
    }

    /// Emit `t = C(sel_{C,0}(t), ..)` for the datatype constructor `cstor`.
    fn constructor_axiom(
        tm: &mut TermManager,
        dt: DatatypeId,
        cstor: usize,
        t: TermId,
    ) -> TermId {
        let info = tm.sorts.datatype(dt).constructors[cstor].clone();
        let sels: Vec<TermId> = info
            .selectors
            .iter()
            .map(|&sel| tm.mk_app(sel, &[t]).expect("selector is unary over the datatype"))
            .collect();
        let rhs = tm
            .mk_app(info.func, &sels)
            .expect("constructor applied to its own selectors");
        tm.mk_eq(t, rhs).expect("equality over one datatype sort")
    }

    fn cycle_conflict(
        &self,
        store: &CcStore,
        entry_root: NodeId,
        path: &[(NodeId, NodeId, NodeId)],
        closing_cstor: NodeId,
        closing_child: NodeId,
    ) -> CcConflict {
        // The cycle runs from the path entry rooted at `entry_root` to the
        // class currently being expanded, closed by `closing_child` which
        // leads back to `entry_root`. Each step contributes the equality
        // between the child reaching a class and that class's constructor.
        let start = path
            .iter()
            .position(|&(root, _, _)| root == entry_root)
            .expect("cycle entry is on the DFS path");
        let mut lits: Vec<Lit> = Vec::new();
        let cycle = &path[start..];
        for w in cycle.windows(2) {
            let (_, _, child) = w[0];
            let (_, next_cstor, _) = w[1];
            store.explain_lits(child, next_cstor, &mut lits);
        }
        // Edge from the last path entry into the closing class.
        if let Some(&(_, _, last_child)) = cycle.last() {
            store.explain_lits(last_child, closing_cstor, &mut lits);
        }
        // Closing edge back to the entry.
        let (_, entry_cstor, _) = cycle[0];
        store.explain_lits(closing_child, entry_cstor, &mut lits);
        CcConflict {
            lits,
            rule: rules::DT_ACYCLIC,
        }
    }

    /// Three-color DFS over constructor-argument edges.
    fn check_acyclic(&self, tm: &TermManager, store: &CcStore) -> Result<(), CcConflict> {
        let mut color: FxHashMap<NodeId, u8> = FxHashMap::default();
        for root in store.roots() {
            if self.cstors.contains_key(&root) && color.get(&root).copied().unwrap_or(0) == 0 {
                self.dfs(tm, store, root, &mut color, &mut Vec::new())?;
            }
        }
        Ok(())
    }

    fn dfs(
        &self,
        tm: &TermManager,
        store: &CcStore,
        root: NodeId,
        color: &mut FxHashMap<NodeId, u8>,
        path: &mut Vec<(NodeId, NodeId, NodeId)>,
    ) -> Result<(), CcConflict> {
        color.insert(root, 1);
        if let Some(&c) = self.cstors.get(&root) {
            for &child in store.children(c) {
                let child_sort = tm.sort(store.term_of(child));
                if tm.sorts.as_datatype(child_sort).is_none() {
                    continue;
                }
                let cr = store.find(child);
                match color.get(&cr).copied().unwrap_or(0) {
                    0 => {
                        path.push((root, c, child));
                        self.dfs(tm, store, cr, color, path)?;
                        path.pop();
                    }
                    1 => {
                        if cr == root {
                            // Immediate self-loop: the child is its own class.
                            let mut lits = Vec::new();
                            store.explain_lits(child, c, &mut lits);
                            return Err(CcConflict {
                                lits,
                                rule: rules::DT_ACYCLIC,
                            });
                        }
                        return Err(self.cycle_conflict(store, cr, path, c, child));
                    }
                    _ => {}
                }
            }
        }
        color.insert(root, 2);
        Ok(())
    }
}

impl Default for DatatypeTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl CcPlugin for DatatypeTheory {
    fn name(&self) -> &'static str {
        "datatype"
    }

    fn on_new_node(
        &mut self,
        tm: &mut TermManager,
        store: &CcStore,
        n: NodeId,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict> {
        let t = store.term_of(n);
        let sort = tm.sort(t);

        if let TermKind::Apply { func, .. } = tm.kind(t) {
            let func = *func;
            match tm.func(func).kind {
                FuncKind::Constructor { .. } => {
                    let root = store.find(n);
                    if !self.cstors.contains_key(&root) {
                        self.set_cstor(root, n);
                    }
                }
                FuncKind::Tester { dt, cstor } => {
                    let arg = store.children(n)[0];
                    let arg_root = store.find(arg);
                    self.push_parent(
                        arg_root,
                        DtParent {
                            node: n,
                            kind: DtParentKind::Tester { dt, cstor },
                        },
                    );
                    if let Some(&c) = self.cstors.get(&arg_root) {
                        let (c_dt, c_idx) = Self::cstor_id(tm, store, c);
                        if c_dt == dt {
                            let target = if c_idx == cstor {
                                store.true_node()
                            } else {
                                store.false_node()
                            };
                            acts.merge(n, target, theory_expl(rules::DT_TESTER, &[(arg, c)]));
                        }
                    }
                }
                FuncKind::Selector { dt, cstor, field } => {
                    let arg = store.children(n)[0];
                    let arg_root = store.find(arg);
                    self.push_parent(
                        arg_root,
                        DtParent {
                            node: n,
                            kind: DtParentKind::Selector { dt, cstor, field },
                        },
                    );
                    if let Some(&c) = self.cstors.get(&arg_root) {
                        let (c_dt, c_idx) = Self::cstor_id(tm, store, c);
                        if c_dt == dt && c_idx == cstor {
                            let value = store.children(c)[field];
                            acts.merge(n, value, theory_expl(rules::DT_SELECT, &[(arg, c)]));
                        }
                    }
                }
                FuncKind::Uninterpreted => {}
            }
        }

        if let Some(dt) = tm.sorts.as_datatype(sort) {
            if tm.sorts.cardinality(sort).is_finite() && self.to_decide_set.insert(t) {
                self.to_decide.push(t);
            }
            // Single-constructor datatypes are decided by construction:
            // assert t = C(sel(t), ..) once, no case split needed. Selector
            // applications are skipped to keep instantiation depth bounded
            // by the input terms.
            let info = tm.sorts.datatype(dt);
            let single = info.constructors.len() == 1;
            let well_founded = single
                && !info.constructors[0]
                    .field_sorts
                    .contains(&info.sort);
            let is_sel_app = matches!(
                tm.kind(t),
                TermKind::Apply { func, .. }
                    if matches!(tm.func(*func).kind, FuncKind::Selector { .. })
            );
            let is_cstor_app = matches!(
                tm.kind(t),
                TermKind::Apply { func, .. }
                    if matches!(tm.func(*func).kind, FuncKind::Constructor { .. })
            );
            if single && well_founded && !is_sel_app && !is_cstor_app
                && self.split_done.insert(t)
            {
                let eq = Self::constructor_axiom(tm, dt, 0, t);
                trace!(term = ?tm.display(t), "single-constructor expansion");
                acts.add_clause(vec![TermLit::positive(eq)]);
            }
        }
        Ok(())
    }

    fn on_pre_merge(
        &mut self,
        tm: &TermManager,
        store: &CcStore,
        info: &MergeInfo,
        expl: &Expl,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict> {
        let c_big = self.cstors.get(&info.big).copied();
        let c_sub = self.cstors.get(&info.sub).copied();

        if let (Some(cb), Some(cs)) = (c_big, c_sub) {
            let (dt_b, idx_b) = Self::cstor_id(tm, store, cb);
            let (dt_s, idx_s) = Self::cstor_id(tm, store, cs);
            if dt_b == dt_s && idx_b == idx_s {
                // Injectivity: same constructor, equate arguments pairwise.
                for (&x, &y) in store.children(cb).iter().zip(store.children(cs)) {
                    acts.merge(x, y, theory_expl(rules::DT_INJECT, &[(cb, cs)]));
                }
            } else {
                // Disjointness: distinct constructors can never be equal.
                let mut lits = Vec::new();
                store.explain_label(expl, &mut lits);
                store.explain_lits(info.t_big, cb, &mut lits);
                store.explain_lits(info.t_sub, cs, &mut lits);
                debug!(rule = rules::DT_DISJOINT, "datatype conflict");
                return Err(CcConflict {
                    lits,
                    rule: rules::DT_DISJOINT,
                });
            }
        }

        if let Some(cb) = c_big {
            self.apply_parent_rules(tm, store, cb, info.sub, acts);
        }
        if let Some(cs) = c_sub {
            self.apply_parent_rules(tm, store, cs, info.big, acts);
        }

        // Fold the absorbed class's tables into the surviving root.
        if c_big.is_none() {
            if let Some(cs) = c_sub {
                self.set_cstor(info.big, cs);
            }
        }
        let sub_parents = self.parents.get(&info.sub).cloned().unwrap_or_default();
        if !sub_parents.is_empty() {
            let entry = self.parents.entry(info.big).or_default();
            let old_len = entry.len();
            entry.extend_from_slice(&sub_parents);
            self.undo.push(DtUndo::ParentsExtended {
                root: info.big,
                old_len,
            });
        }
        Ok(())
    }

    fn on_assume(
        &mut self,
        tm: &TermManager,
        _store: &CcStore,
        _lit: Lit,
        term: TermId,
        sign: bool,
    ) {
        if !sign {
            return;
        }
        if let TermKind::Apply { func, .. } = tm.kind(term) {
            if matches!(tm.func(*func).kind, FuncKind::Tester { .. }) {
                self.asserted_testers.push(term);
                self.undo.push(DtUndo::TesterPopped);
            }
        }
    }

    fn partial_check(
        &mut self,
        tm: &mut TermManager,
        _store: &CcStore,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict> {
        // Selector instantiation: each asserted is-C(t) forces the tested
        // term to be built from its own selectors.
        for i in 0..self.asserted_testers.len() {
            let tester = self.asserted_testers[i];
            if !self.inst_done.insert(tester) {
                continue;
            }
            let (func, arg) = match tm.kind(tester) {
                TermKind::Apply { func, args } => (*func, args[0]),
                _ => continue,
            };
            let FuncKind::Tester { dt, cstor } = tm.func(func).kind else {
                continue;
            };
            let eq = Self::constructor_axiom(tm, dt, cstor, arg);
            trace!(tester = ?tm.display(tester), "selector instantiation");
            acts.add_clause(vec![TermLit::negative(tester), TermLit::positive(eq)]);
        }
        Ok(())
    }

    fn final_check(
        &mut self,
        tm: &mut TermManager,
        store: &CcStore,
        acts: &mut CcActions,
    ) -> Result<(), CcConflict> {
        self.check_acyclic(tm, store)?;

        // Exhaustive case split for undecided finite-datatype classes.
        for i in 0..self.to_decide.len() {
            let t = self.to_decide[i];
            if self.split_done.contains(&t) {
                continue;
            }
            let Some(root) = store.find_t(t) else {
                continue;
            };
            if self.cstors.contains_key(&root) {
                continue;
            }
            let dt = tm
                .sorts
                .as_datatype(tm.sort(t))
                .expect("to_decide holds datatype terms");
            let testers: Vec<TermId> = {
                let infos = tm.sorts.datatype(dt).constructors.clone();
                infos
                    .iter()
                    .map(|c| tm.mk_app(c.tester, &[t]).expect("tester is unary"))
                    .collect()
            };
            debug!(term = ?tm.display(t), cases = testers.len(), "datatype case split");
            acts.add_clause(testers.iter().map(|&x| TermLit::positive(x)).collect());
            for a in 0..testers.len() {
                for b in (a + 1)..testers.len() {
                    acts.add_clause(vec![
                        TermLit::negative(testers[a]),
                        TermLit::negative(testers[b]),
                    ]);
                }
            }
            self.split_done.insert(t);
        }
        Ok(())
    }

    fn model_hint(&self, tm: &TermManager, store: &CcStore, root: NodeId) -> Option<ModelHint> {
        if let Some(&c) = self.cstors.get(&root) {
            return Some(ModelHint::Constructor(c));
        }
        let sort = tm.sort(store.term_of(root));
        tm.sorts.as_datatype(sort).map(ModelHint::BaseConstructor)
    }

    fn push_level(&mut self) {
        self.undo.push_level();
    }

    fn pop_levels(&mut self, n: usize) {
        let cstors = &mut self.cstors;
        let parents = &mut self.parents;
        let testers = &mut self.asserted_testers;
        self.undo.pop_levels(n, |op| match op {
            DtUndo::CstorSet { root, old } => match old {
                Some(c) => {
                    cstors.insert(root, c);
                }
                None => {
                    cstors.remove(&root);
                }
            },
            DtUndo::ParentPushed { root } => {
                parents.get_mut(&root).expect("journaled parent list").pop();
            }
            DtUndo::ParentsExtended { root, old_len } => {
                parents
                    .get_mut(&root)
                    .expect("journaled parent list")
                    .truncate(old_len);
            }
            DtUndo::TesterPopped => {
                testers.pop();
            }
        });
    }
}
