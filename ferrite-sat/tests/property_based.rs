//! Property tests: the solver agrees with brute force on small formulas.

use ferrite_sat::{Lit, Solver, SolverResult, Var};
use proptest::prelude::*;

/// A clause as signed variable indices over `num_vars` variables.
fn arb_clause(num_vars: u32) -> impl Strategy<Value = Vec<(u32, bool)>> {
    prop::collection::vec((0..num_vars, any::<bool>()), 1..=4)
}

fn arb_cnf() -> impl Strategy<Value = (u32, Vec<Vec<(u32, bool)>>)> {
    (2u32..=7).prop_flat_map(|n| {
        prop::collection::vec(arb_clause(n), 1..=24).prop_map(move |cs| (n, cs))
    })
}

fn brute_force_sat(num_vars: u32, clauses: &[Vec<(u32, bool)>]) -> bool {
    for assignment in 0u32..(1 << num_vars) {
        let ok = clauses.iter().all(|c| {
            c.iter()
                .any(|&(v, pos)| ((assignment >> v) & 1 == 1) == pos)
        });
        if ok {
            return true;
        }
    }
    false
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn solver_matches_brute_force((num_vars, clauses) in arb_cnf()) {
        let mut sat = Solver::new();
        let vars: Vec<Var> = (0..num_vars).map(|_| sat.new_var()).collect();
        for c in &clauses {
            sat.add_clause(c.iter().map(|&(v, pos)| Lit::from_var(vars[v as usize], pos)));
        }
        let expected = brute_force_sat(num_vars, &clauses);
        let result = sat.solve();
        prop_assert_eq!(
            result,
            if expected { SolverResult::Sat } else { SolverResult::Unsat }
        );
        if result == SolverResult::Sat {
            // The reported model satisfies every clause.
            for c in &clauses {
                let satisfied = c
                    .iter()
                    .any(|&(v, pos)| sat.model()[vars[v as usize].index()].is_true() == pos);
                prop_assert!(satisfied);
            }
        }
    }

    #[test]
    fn reasserting_a_clause_is_idempotent((num_vars, clauses) in arb_cnf()) {
        let mut once = Solver::new();
        let mut twice = Solver::new();
        for _ in 0..num_vars {
            once.new_var();
            twice.new_var();
        }
        for c in &clauses {
            let mk = |s: &mut Solver| {
                s.add_clause(c.iter().map(|&(v, pos)| Lit::from_var(Var::new(v), pos)));
            };
            mk(&mut once);
            mk(&mut twice);
            mk(&mut twice);
        }
        prop_assert_eq!(once.solve(), twice.solve());
    }

    #[test]
    fn assumptions_agree_with_added_units((num_vars, clauses) in arb_cnf()) {
        let mut direct = Solver::new();
        let mut assumed = Solver::new();
        for _ in 0..num_vars {
            direct.new_var();
            assumed.new_var();
        }
        for c in &clauses {
            direct.add_clause(c.iter().map(|&(v, pos)| Lit::from_var(Var::new(v), pos)));
            assumed.add_clause(c.iter().map(|&(v, pos)| Lit::from_var(Var::new(v), pos)));
        }
        // Pin the first variable both ways; adding a unit clause and
        // assuming the literal must agree.
        let pin = Lit::pos(Var::new(0));
        direct.add_clause([pin]);
        prop_assert_eq!(direct.solve(), assumed.solve_with_assumptions(&[pin]));
    }
}
