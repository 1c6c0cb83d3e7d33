//! E-node storage: union-find, signature table, and proof forest.
//!
//! Every mutation is journaled so that `pop_levels` restores the store to
//! the exact state at the matching `push_level`. Path compression is omitted
//! on purpose: `find` walks parent pointers, and undo is a pure LIFO record
//! replay.

use ferrite_core::ast::{FuncId, TermId, TermKind, TermManager};
use ferrite_core::backtrack::BacktrackStack;
use ferrite_sat::Lit;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Index of an e-node in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    const NONE: NodeId = NodeId(u32::MAX);

    /// Create from a raw index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Index into the node table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Label of a proof-forest edge: why two nodes were merged.
#[derive(Debug, Clone)]
pub enum Expl {
    /// A literal on the trail asserted the merge.
    Lit(Lit),
    /// Congruence: the two application nodes have pairwise-equal arguments.
    Congruence(NodeId, NodeId),
    /// A theory rule justified by prior equalities between node pairs.
    Theory(&'static str, SmallVec<[(NodeId, NodeId); 2]>),
}

/// A conflict detected by the congruence closure or a plugin: a set of
/// currently-true literals whose conjunction is inconsistent.
#[derive(Debug, Clone)]
pub struct CcConflict {
    /// The contradicting literals, all true on the trail.
    pub lits: Vec<Lit>,
    /// The rule that detected the inconsistency.
    pub rule: &'static str,
}

/// One e-node.
#[derive(Debug, Clone)]
struct ENode {
    term: TermId,
    /// Union-find parent; self when the node is a representative.
    parent: NodeId,
    /// Class size; meaningful at representatives only.
    size: u32,
    /// Circular linked list through the members of the class.
    next: NodeId,
    /// Child nodes (arguments) for application and equality nodes.
    children: SmallVec<[NodeId; 4]>,
    /// Application nodes having a member of this class as an argument.
    /// Meaningful at representatives; unions concatenate these lists.
    parents: Vec<NodeId>,
    /// Proof-forest edge toward the tree root, with its label.
    forest_parent: NodeId,
    forest_label: Option<Expl>,
}

/// Head of a signature: the applied symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SigHead {
    Fun(FuncId),
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Signature {
    head: SigHead,
    args: SmallVec<[NodeId; 4]>,
}

/// Journaled mutations.
enum UndoOp {
    AddNode(NodeId),
    ParentPushed(NodeId),
    SigInserted(Signature),
    ForestSet {
        node: NodeId,
        old_parent: NodeId,
        old_label: Option<Expl>,
    },
    Union {
        big: NodeId,
        sub: NodeId,
        big_parents_len: usize,
    },
}

/// The congruence-closure state proper.
pub struct CcStore {
    nodes: Vec<ENode>,
    node_of_term: FxHashMap<TermId, NodeId>,
    sigs: FxHashMap<Signature, NodeId>,
    undo: BacktrackStack<UndoOp>,
    true_node: NodeId,
    false_node: NodeId,
}

impl CcStore {
    /// A store with the `true` and `false` nodes interned.
    pub fn new(tm: &TermManager) -> Self {
        let mut store = Self {
            nodes: Vec::new(),
            node_of_term: FxHashMap::default(),
            sigs: FxHashMap::default(),
            undo: BacktrackStack::new(),
            true_node: NodeId::NONE,
            false_node: NodeId::NONE,
        };
        let mut pending = VecDeque::new();
        store.true_node = store.add_term(tm, tm.mk_true(), &mut pending, &mut Vec::new());
        store.false_node = store.add_term(tm, tm.mk_false(), &mut pending, &mut Vec::new());
        debug_assert!(pending.is_empty());
        store
    }

    /// The node of the constant `true`.
    #[must_use]
    pub fn true_node(&self) -> NodeId {
        self.true_node
    }

    /// The node of the constant `false`.
    #[must_use]
    pub fn false_node(&self) -> NodeId {
        self.false_node
    }

    /// The node interning `t`, if present.
    #[must_use]
    pub fn node_of(&self, t: TermId) -> Option<NodeId> {
        self.node_of_term.get(&t).copied()
    }

    /// Term carried by a node.
    #[must_use]
    pub fn term_of(&self, n: NodeId) -> TermId {
        self.nodes[n.index()].term
    }

    /// Child nodes of an application or equality node.
    #[must_use]
    pub fn children(&self, n: NodeId) -> &[NodeId] {
        &self.nodes[n.index()].children
    }

    /// Number of stored nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Representative of a node's class. No path compression: undo stays a
    /// pure record replay.
    #[must_use]
    pub fn find(&self, mut n: NodeId) -> NodeId {
        loop {
            let p = self.nodes[n.index()].parent;
            if p == n {
                return n;
            }
            n = p;
        }
    }

    /// Representative of a term's class.
    #[must_use]
    pub fn find_t(&self, t: TermId) -> Option<NodeId> {
        self.node_of(t).map(|n| self.find(n))
    }

    /// Size of the class rooted at `root`.
    #[must_use]
    pub fn class_size(&self, root: NodeId) -> u32 {
        self.nodes[root.index()].size
    }

    /// Application nodes with an argument in the class of `root`.
    #[must_use]
    pub fn class_parents(&self, root: NodeId) -> &[NodeId] {
        &self.nodes[root.index()].parents
    }

    /// Iterate the members of the class rooted at `root`.
    pub fn class_members(&self, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut cur = root;
        let mut started = false;
        std::iter::from_fn(move || {
            if started && cur == root {
                return None;
            }
            started = true;
            let out = cur;
            cur = self.nodes[cur.index()].next;
            Some(out)
        })
    }

    /// Iterate the current representatives.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32)
            .map(NodeId::new)
            .filter(|&n| self.nodes[n.index()].parent == n)
    }

    /// Intern `t` (and its subterms) as e-nodes. Newly created nodes are
    /// appended to `new_nodes`; signature collisions enqueue congruence
    /// merges onto `pending`.
    pub fn add_term(
        &mut self,
        tm: &TermManager,
        t: TermId,
        pending: &mut VecDeque<(NodeId, NodeId, Expl)>,
        new_nodes: &mut Vec<NodeId>,
    ) -> NodeId {
        if let Some(n) = self.node_of(t) {
            return n;
        }
        let (children_terms, head): (SmallVec<[TermId; 4]>, Option<SigHead>) = match tm.kind(t) {
            TermKind::Apply { func, args } => (args.clone(), Some(SigHead::Fun(*func))),
            TermKind::Eq(a, b) => (SmallVec::from_slice(&[*a, *b]), Some(SigHead::Eq)),
            // Negations only occur below equalities; atoms strip them into
            // the literal sign. Kept opaque here.
            TermKind::Not(x) => (SmallVec::from_slice(&[*x]), None),
            _ => (SmallVec::new(), None),
        };
        let children: SmallVec<[NodeId; 4]> = children_terms
            .iter()
            .map(|&c| self.add_term(tm, c, pending, new_nodes))
            .collect();

        let n = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(ENode {
            term: t,
            parent: n,
            size: 1,
            next: n,
            children: children.clone(),
            parents: Vec::new(),
            forest_parent: NodeId::NONE,
            forest_label: None,
        });
        self.node_of_term.insert(t, n);
        self.undo.push(UndoOp::AddNode(n));

        for &c in &children {
            let root = self.find(c);
            self.nodes[root.index()].parents.push(n);
            self.undo.push(UndoOp::ParentPushed(root));
        }

        if let Some(head) = head {
            let sig = self.signature(head, &children);
            if let Some(&q) = self.sigs.get(&sig) {
                if self.find(q) != self.find(n) {
                    pending.push_back((n, q, Expl::Congruence(n, q)));
                }
            } else {
                self.sigs.insert(sig.clone(), n);
                self.undo.push(UndoOp::SigInserted(sig));
            }
        }

        // An equality whose sides already coincide reduces to true.
        if let TermKind::Eq(..) = tm.kind(t) {
            let (a, b) = (children[0], children[1]);
            if self.find(a) == self.find(b) {
                pending.push_back((
                    n,
                    self.true_node,
                    Expl::Theory("eq-refl", SmallVec::from_slice(&[(a, b)])),
                ));
            }
        }

        new_nodes.push(n);
        n
    }

    fn signature(&self, head: SigHead, children: &[NodeId]) -> Signature {
        Signature {
            head,
            args: children.iter().map(|&c| self.find(c)).collect(),
        }
    }

    /// Physically merge the class of `sub` into the class of `big`,
    /// recording the proof-forest edge `t_sub -- t_big` labeled `expl`.
    /// Parents of the absorbed class are re-signed; newly congruent pairs
    /// and equalities reduced to `true` are enqueued onto `pending`.
    pub fn union(
        &mut self,
        tm: &TermManager,
        big: NodeId,
        sub: NodeId,
        t_big: NodeId,
        t_sub: NodeId,
        expl: Expl,
        pending: &mut VecDeque<(NodeId, NodeId, Expl)>,
    ) {
        debug_assert_eq!(self.find(big), big);
        debug_assert_eq!(self.find(sub), sub);
        debug_assert_ne!(big, sub);
        debug_assert_eq!(self.find(t_big), big);
        debug_assert_eq!(self.find(t_sub), sub);

        // Reorient t_sub's proof tree so the new edge can point from it.
        self.reroot_forest(t_sub);
        self.undo.push(UndoOp::ForestSet {
            node: t_sub,
            old_parent: self.nodes[t_sub.index()].forest_parent,
            old_label: self.nodes[t_sub.index()].forest_label.clone(),
        });
        self.nodes[t_sub.index()].forest_parent = t_big;
        self.nodes[t_sub.index()].forest_label = Some(expl);

        // Splice the circular member lists (swapping next pointers of the
        // two roots merges the cycles; the same swap undoes it).
        let tmp = self.nodes[big.index()].next;
        self.nodes[big.index()].next = self.nodes[sub.index()].next;
        self.nodes[sub.index()].next = tmp;

        let big_parents_len = self.nodes[big.index()].parents.len();
        let sub_parents = self.nodes[sub.index()].parents.clone();
        self.nodes[big.index()].parents.extend_from_slice(&sub_parents);

        self.nodes[sub.index()].parent = big;
        self.nodes[big.index()].size += self.nodes[sub.index()].size;

        self.undo.push(UndoOp::Union {
            big,
            sub,
            big_parents_len,
        });

        // Re-sign the absorbed class's parents under the new representative
        // and detect fresh congruences.
        for p in sub_parents {
            let head = match tm.kind(self.nodes[p.index()].term) {
                TermKind::Apply { func, .. } => SigHead::Fun(*func),
                TermKind::Eq(..) => SigHead::Eq,
                _ => continue,
            };
            let children = self.nodes[p.index()].children.clone();
            let sig = self.signature(head, &children);
            if let Some(&q) = self.sigs.get(&sig) {
                if self.find(q) != self.find(p) {
                    pending.push_back((p, q, Expl::Congruence(p, q)));
                }
            } else {
                self.sigs.insert(sig.clone(), p);
                self.undo.push(UndoOp::SigInserted(sig));
            }
            // An equality parent whose sides just became equal is true.
            if head == SigHead::Eq {
                let (a, b) = (children[0], children[1]);
                if self.find(a) == self.find(b) && self.find(p) != self.find(self.true_node) {
                    pending.push_back((
                        p,
                        self.true_node,
                        Expl::Theory("eq-refl", SmallVec::from_slice(&[(a, b)])),
                    ));
                }
            }
        }
    }

    /// Reverse the proof-forest path from `n` to its tree root, making `n`
    /// the root of its tree.
    fn reroot_forest(&mut self, n: NodeId) {
        // Collect the path n -> root.
        let mut path = Vec::new();
        let mut cur = n;
        while self.nodes[cur.index()].forest_parent != NodeId::NONE {
            path.push(cur);
            cur = self.nodes[cur.index()].forest_parent;
        }
        // Flip each edge, journaling the overwritten state.
        for &x in path.iter().rev() {
            let parent = self.nodes[x.index()].forest_parent;
            let label = self.nodes[x.index()].forest_label.clone();
            self.undo.push(UndoOp::ForestSet {
                node: parent,
                old_parent: self.nodes[parent.index()].forest_parent,
                old_label: self.nodes[parent.index()].forest_label.clone(),
            });
            self.nodes[parent.index()].forest_parent = x;
            self.nodes[parent.index()].forest_label = label;
            self.undo.push(UndoOp::ForestSet {
                node: x,
                old_parent: self.nodes[x.index()].forest_parent,
                old_label: self.nodes[x.index()].forest_label.clone(),
            });
            self.nodes[x.index()].forest_parent = NodeId::NONE;
            self.nodes[x.index()].forest_label = None;
        }
    }

    /// Collect the literals implying `a = b` into `out`.
    ///
    /// The two nodes must currently be in the same class. Congruence edges
    /// recurse into pairwise argument equalities; theory edges expand their
    /// stored pairs.
    pub fn explain_lits(&self, a: NodeId, b: NodeId, out: &mut Vec<Lit>) {
        debug_assert_eq!(self.find(a), self.find(b), "explain of distinct classes");
        let mut queue: VecDeque<(NodeId, NodeId)> = VecDeque::new();
        let mut visited: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
        let mut lits_seen: FxHashSet<Lit> = out.iter().copied().collect();
        queue.push_back((a, b));
        while let Some((x, y)) = queue.pop_front() {
            if x == y || !visited.insert((x.min(y), x.max(y))) {
                continue;
            }
            let lca = self.forest_lca(x, y);
            self.explain_path(x, lca, &mut queue, out, &mut lits_seen);
            self.explain_path(y, lca, &mut queue, out, &mut lits_seen);
        }
    }

    /// Expand a label that is not (or not yet) a forest edge.
    pub fn explain_label(&self, label: &Expl, out: &mut Vec<Lit>) {
        let mut lits_seen: FxHashSet<Lit> = out.iter().copied().collect();
        match label {
            Expl::Lit(l) => {
                if lits_seen.insert(*l) {
                    out.push(*l);
                }
            }
            Expl::Congruence(p, q) => {
                for (&cp, &cq) in self.children(*p).iter().zip(self.children(*q)) {
                    self.explain_lits(cp, cq, out);
                }
            }
            Expl::Theory(_, pairs) => {
                for &(x, y) in pairs {
                    self.explain_lits(x, y, out);
                }
            }
        }
    }

    fn forest_lca(&self, a: NodeId, b: NodeId) -> NodeId {
        let mut ancestors = FxHashSet::default();
        let mut cur = a;
        loop {
            ancestors.insert(cur);
            let p = self.nodes[cur.index()].forest_parent;
            if p == NodeId::NONE {
                break;
            }
            cur = p;
        }
        let mut cur = b;
        loop {
            if ancestors.contains(&cur) {
                return cur;
            }
            let p = self.nodes[cur.index()].forest_parent;
            debug_assert_ne!(p, NodeId::NONE, "nodes share a proof tree");
            cur = p;
        }
    }

    fn explain_path(
        &self,
        mut n: NodeId,
        lca: NodeId,
        queue: &mut VecDeque<(NodeId, NodeId)>,
        out: &mut Vec<Lit>,
        lits_seen: &mut FxHashSet<Lit>,
    ) {
        while n != lca {
            let label = self.nodes[n.index()]
                .forest_label
                .as_ref()
                .expect("edge on a forest path has a label");
            match label {
                Expl::Lit(l) => {
                    if lits_seen.insert(*l) {
                        out.push(*l);
                    }
                }
                Expl::Congruence(p, q) => {
                    for (&cp, &cq) in self.children(*p).iter().zip(self.children(*q)) {
                        queue.push_back((cp, cq));
                    }
                }
                Expl::Theory(_, pairs) => {
                    for &(x, y) in pairs {
                        queue.push_back((x, y));
                    }
                }
            }
            n = self.nodes[n.index()].forest_parent;
        }
    }

    /// Open an undo level.
    pub fn push_level(&mut self) {
        self.undo.push_level();
    }

    /// Current undo depth.
    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.undo.n_levels()
    }

    /// Revert the last `n` levels.
    pub fn pop_levels(&mut self, n: usize) {
        let nodes = &mut self.nodes;
        let node_of_term = &mut self.node_of_term;
        let sigs = &mut self.sigs;
        self.undo.pop_levels(n, |op| match op {
            UndoOp::AddNode(id) => {
                let node = nodes.pop().expect("node table underflow");
                debug_assert_eq!(NodeId::new(nodes.len() as u32), id);
                node_of_term.remove(&node.term);
            }
            UndoOp::ParentPushed(root) => {
                nodes[root.index()].parents.pop();
            }
            UndoOp::SigInserted(sig) => {
                sigs.remove(&sig);
            }
            UndoOp::ForestSet {
                node,
                old_parent,
                old_label,
            } => {
                nodes[node.index()].forest_parent = old_parent;
                nodes[node.index()].forest_label = old_label;
            }
            UndoOp::Union {
                big,
                sub,
                big_parents_len,
            } => {
                nodes[sub.index()].parent = sub;
                let sub_size = nodes[sub.index()].size;
                nodes[big.index()].size -= sub_size;
                nodes[big.index()].parents.truncate(big_parents_len);
                let tmp = nodes[big.index()].next;
                nodes[big.index()].next = nodes[sub.index()].next;
                nodes[sub.index()].next = tmp;
            }
        });
    }
}
