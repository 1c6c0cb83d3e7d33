//! The SAT ↔ theory loop, exercised with a miniature theory.
//!
//! The theory below tracks a set of "color" literals and enforces that at
//! most one of them is true, raising conflicts and propagations the same way
//! a real theory plugin does: lazily, with explanations on demand.

use ferrite_sat::{
    Lit, Solver, SolverResult, TheoryActions, TheoryCallback, Var,
};

/// At most one of the tracked variables may be true; once one is true the
/// theory propagates the negation of all the others.
struct AtMostOne {
    tracked: Vec<Var>,
    /// True literals seen on the trail, newest last, with level fences.
    asserted: Vec<Lit>,
    levels: Vec<usize>,
}

impl AtMostOne {
    fn new(tracked: Vec<Var>) -> Self {
        Self {
            tracked,
            asserted: Vec::new(),
            levels: Vec::new(),
        }
    }

    fn true_tracked(&self) -> Vec<Lit> {
        self.asserted
            .iter()
            .copied()
            .filter(|l| l.is_positive() && self.tracked.contains(&l.var()))
            .collect()
    }
}

impl TheoryCallback for AtMostOne {
    fn on_assume(&mut self, lit: Lit) {
        self.asserted.push(lit);
    }

    fn partial_check(&mut self, acts: &mut TheoryActions) {
        let trues = self.true_tracked();
        if trues.len() >= 2 {
            // Conflict clause: not both of the first two.
            acts.raise_conflict(
                vec![trues[0].negate(), trues[1].negate()],
                ferrite_core::proof::StepId::NONE,
            );
            return;
        }
        if let Some(&winner) = trues.first() {
            for &v in &self.tracked {
                if v != winner.var() {
                    acts.propagate(Lit::neg(v));
                }
            }
        }
    }

    fn final_check(&mut self, _acts: &mut TheoryActions) {}

    fn explain_propagation(&mut self, lit: Lit) -> Vec<Lit> {
        // A negative tracked literal was implied by the winner being true.
        let trues = self.true_tracked();
        assert!(!lit.is_positive());
        vec![trues[0]]
    }

    fn push_level(&mut self) {
        self.levels.push(self.asserted.len());
    }

    fn pop_levels(&mut self, n: usize) {
        let target = self.levels[self.levels.len() - n];
        self.levels.truncate(self.levels.len() - n);
        self.asserted.truncate(target);
    }
}

#[test]
fn test_theory_propagation_prunes_choices() {
    let mut sat = Solver::new();
    let colors: Vec<Var> = (0..3).map(|_| sat.new_var()).collect();
    let mut th = AtMostOne::new(colors.clone());

    // At least one color.
    sat.add_clause(colors.iter().map(|&v| Lit::pos(v)));

    assert_eq!(sat.solve_with_theory(&mut th, &[]), SolverResult::Sat);
    let chosen = colors
        .iter()
        .filter(|v| sat.model()[v.index()].is_true())
        .count();
    assert_eq!(chosen, 1, "exactly one color in the model");
}

#[test]
fn test_theory_conflict_forces_unsat() {
    let mut sat = Solver::new();
    let colors: Vec<Var> = (0..2).map(|_| sat.new_var()).collect();
    let mut th = AtMostOne::new(colors.clone());

    // Both colors forced true contradicts the theory.
    sat.add_clause([Lit::pos(colors[0])]);
    sat.add_clause([Lit::pos(colors[1])]);

    assert_eq!(sat.solve_with_theory(&mut th, &[]), SolverResult::Unsat);
}

#[test]
fn test_theory_conflict_under_assumptions() {
    let mut sat = Solver::new();
    let colors: Vec<Var> = (0..2).map(|_| sat.new_var()).collect();
    let mut th = AtMostOne::new(colors.clone());

    let assumptions = [Lit::pos(colors[0]), Lit::pos(colors[1])];
    assert_eq!(
        sat.solve_with_theory(&mut th, &assumptions),
        SolverResult::Unsat
    );

    // Solvable again with a single assumption.
    assert_eq!(
        sat.solve_with_theory(&mut th, &assumptions[..1]),
        SolverResult::Sat
    );
    assert!(sat.model()[colors[0].index()].is_true());
    assert!(sat.model()[colors[1].index()].is_false());
}
