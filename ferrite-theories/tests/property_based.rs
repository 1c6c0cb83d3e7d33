//! Property tests: the congruence closure agrees with a reference
//! union-find, and explanations only cite asserted literals.

use ferrite_core::ast::TermManager;
use ferrite_sat::{Lit, Var};
use ferrite_theories::cc::{Cc, Expl};
use proptest::prelude::*;

/// Plain union-find used as the reference implementation.
struct RefUf {
    parent: Vec<usize>,
}

impl RefUf {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        self.parent[ra] = rb;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn cc_matches_reference_union_find(
        num_consts in 2usize..8,
        merges in prop::collection::vec((0usize..8, 0usize..8), 1..12),
    ) {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let consts: Vec<_> = (0..num_consts)
            .map(|i| tm.mk_const(&format!("c{i}"), int))
            .collect();

        let mut cc = Cc::new(&tm);
        let nodes: Vec<_> = consts
            .iter()
            .map(|&c| cc.add_term(&mut tm, c).unwrap())
            .collect();
        let mut reference = RefUf::new(num_consts);

        let mut asserted = Vec::new();
        for (i, &(a, b)) in merges.iter().enumerate() {
            let (a, b) = (a % num_consts, b % num_consts);
            let lit = Lit::pos(Var::new(i as u32));
            asserted.push(lit);
            cc.merge_terms(&mut tm, consts[a], consts[b], Expl::Lit(lit)).unwrap();
            reference.union(a, b);
        }
        cc.check(&mut tm).unwrap();

        for a in 0..num_consts {
            for b in 0..num_consts {
                let same_ref = reference.find(a) == reference.find(b);
                let same_cc = cc.store().find(nodes[a]) == cc.store().find(nodes[b]);
                prop_assert_eq!(same_ref, same_cc, "classes of c{} and c{}", a, b);
                if same_cc {
                    // Every explanation literal was actually asserted.
                    let expl = cc.explain(nodes[a], nodes[b]);
                    prop_assert!(expl.iter().all(|l| asserted.contains(l)));
                }
            }
        }
    }

    #[test]
    fn push_pop_is_identity(
        num_consts in 2usize..6,
        before in prop::collection::vec((0usize..6, 0usize..6), 0..5),
        after in prop::collection::vec((0usize..6, 0usize..6), 1..5),
    ) {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let consts: Vec<_> = (0..num_consts)
            .map(|i| tm.mk_const(&format!("c{i}"), int))
            .collect();

        let mut cc = Cc::new(&tm);
        let nodes: Vec<_> = consts
            .iter()
            .map(|&c| cc.add_term(&mut tm, c).unwrap())
            .collect();

        let mut next_lit = 0u32;
        for &(a, b) in &before {
            let lit = Lit::pos(Var::new(next_lit));
            next_lit += 1;
            cc.merge_terms(&mut tm, consts[a % num_consts], consts[b % num_consts], Expl::Lit(lit))
                .unwrap();
        }
        cc.check(&mut tm).unwrap();
        let snapshot: Vec<_> = nodes.iter().map(|&n| cc.store().find(n)).collect();

        cc.push_level();
        for &(a, b) in &after {
            let lit = Lit::pos(Var::new(next_lit));
            next_lit += 1;
            cc.merge_terms(&mut tm, consts[a % num_consts], consts[b % num_consts], Expl::Lit(lit))
                .unwrap();
        }
        cc.check(&mut tm).unwrap();
        cc.pop_levels(1);

        let restored: Vec<_> = nodes.iter().map(|&n| cc.store().find(n)).collect();
        prop_assert_eq!(snapshot, restored);
    }
}
