//! End-to-end CDCL(T) scenarios: Boolean search, equality reasoning, and
//! the datatype theory.

use ferrite_core::ast::TermId;
use ferrite_core::literal::TermLit;
use ferrite_core::resource::ResourceManager;
use ferrite_core::sort::{ConstructorDecl, DatatypeDecl, SortId};
use ferrite_solver::{ModelValue, SmtResult, SmtSolver};

fn bool_atom(solver: &mut SmtSolver, name: &str) -> TermId {
    let b = solver.terms().sorts.bool_sort;
    solver.terms_mut().mk_const(name, b)
}

#[test]
fn test_unit_propagation_chain() {
    let mut solver = SmtSolver::new();
    let a = bool_atom(&mut solver, "a");
    let b = bool_atom(&mut solver, "b");
    let c = bool_atom(&mut solver, "c");

    solver.assert_clause(&[TermLit::positive(a)]);
    solver.assert_clause(&[TermLit::negative(a), TermLit::positive(b)]);
    solver.assert_clause(&[TermLit::negative(b), TermLit::positive(c)]);

    assert_eq!(solver.solve(), SmtResult::Sat);
    // The whole chain was forced without a single decision.
    assert_eq!(solver.sat_stats().decisions, 0);
    let model = solver.model().unwrap();
    assert_eq!(model.is_true(a), Some(true));
    assert_eq!(model.is_true(b), Some(true));
    assert_eq!(model.is_true(c), Some(true));
}

#[test]
fn test_binary_conflict_unsat() {
    let mut solver = SmtSolver::new();
    let a = bool_atom(&mut solver, "a");
    let b = bool_atom(&mut solver, "b");

    solver.assert_clause(&[TermLit::positive(a), TermLit::positive(b)]);
    solver.assert_clause(&[TermLit::positive(a), TermLit::negative(b)]);
    solver.assert_clause(&[TermLit::negative(a), TermLit::positive(b)]);
    solver.assert_clause(&[TermLit::negative(a), TermLit::negative(b)]);

    assert_eq!(solver.solve(), SmtResult::Unsat);
}

#[test]
fn test_congruence_unsat() {
    let mut solver = SmtSolver::new();
    let tm = solver.terms_mut();
    let int = tm.sorts.int_sort;
    let a = tm.mk_const("a", int);
    let b = tm.mk_const("b", int);
    let c = tm.mk_const("c", int);
    let f = tm.declare_fun("f", vec![int], int);
    let fa = tm.mk_app(f, &[a]).unwrap();
    let fc = tm.mk_app(f, &[c]).unwrap();
    let fa_eq_b = tm.mk_eq(fa, b).unwrap();
    let a_eq_c = tm.mk_eq(a, c).unwrap();
    let fc_eq_b = tm.mk_eq(fc, b).unwrap();

    solver.assert_clause(&[TermLit::positive(fa_eq_b)]);
    solver.assert_clause(&[TermLit::positive(a_eq_c)]);
    solver.assert_clause(&[TermLit::negative(fc_eq_b)]);

    assert_eq!(solver.solve(), SmtResult::Unsat);
}

fn declare_enum(solver: &mut SmtSolver) -> SortId {
    solver
        .terms_mut()
        .declare_datatype(&DatatypeDecl {
            name: "T".to_string(),
            constructors: vec![
                ConstructorDecl::nullary("A"),
                ConstructorDecl::nullary("B"),
            ],
        })
        .unwrap()
}

#[test]
fn test_datatype_disjointness() {
    let mut solver = SmtSolver::new();
    let t_sort = declare_enum(&mut solver);
    let tm = solver.terms_mut();
    let dt = tm.sorts.as_datatype(t_sort).unwrap();
    let is_a = tm.sorts.datatype(dt).constructors[0].tester;
    let is_b = tm.sorts.datatype(dt).constructors[1].tester;
    let x = tm.mk_const("x", t_sort);
    let is_a_x = tm.mk_app(is_a, &[x]).unwrap();
    let is_b_x = tm.mk_app(is_b, &[x]).unwrap();

    solver.assert_clause(&[TermLit::positive(is_a_x)]);
    solver.assert_clause(&[TermLit::positive(is_b_x)]);

    assert_eq!(solver.solve(), SmtResult::Unsat);
}

fn declare_list(solver: &mut SmtSolver) -> (SortId, usize) {
    let tm = solver.terms_mut();
    let int = tm.sorts.int_sort;
    let list = tm.declare_datatype_sort("List").unwrap();
    tm.define_datatype(
        list,
        &[
            ConstructorDecl::nullary("nil"),
            ConstructorDecl::with_fields("cons", &[("head", int), ("tail", list)]),
        ],
    )
    .unwrap();
    (list, 1)
}

#[test]
fn test_datatype_injectivity_and_selectors() {
    let mut solver = SmtSolver::new();
    let (list, cons_idx) = declare_list(&mut solver);
    let tm = solver.terms_mut();
    let int = tm.sorts.int_sort;
    let dt = tm.sorts.as_datatype(list).unwrap();
    let cons = tm.sorts.datatype(dt).constructors[cons_idx].func;

    let x = tm.mk_const("x", int);
    let y = tm.mk_const("y", list);
    let u = tm.mk_const("u", int);
    let v = tm.mk_const("v", list);
    let cxy = tm.mk_app(cons, &[x, y]).unwrap();
    let cuv = tm.mk_app(cons, &[u, v]).unwrap();
    let cells_eq = tm.mk_eq(cxy, cuv).unwrap();
    let x_eq_u = tm.mk_eq(x, u).unwrap();
    let y_eq_v = tm.mk_eq(y, v).unwrap();

    solver.assert_clause(&[TermLit::positive(cells_eq)]);

    // The component equalities are forced by injectivity.
    assert_eq!(solver.solve(), SmtResult::Sat);
    assert_eq!(
        solver.solve_with_assumptions(&[TermLit::negative(x_eq_u)]),
        SmtResult::Unsat
    );
    assert_eq!(
        solver.solve_with_assumptions(&[TermLit::negative(y_eq_v)]),
        SmtResult::Unsat
    );
    // And consistent to assert positively.
    solver.assert_clause(&[TermLit::positive(x_eq_u)]);
    solver.assert_clause(&[TermLit::positive(y_eq_v)]);
    assert_eq!(solver.solve(), SmtResult::Sat);
}

#[test]
fn test_datatype_acyclicity() {
    let mut solver = SmtSolver::new();
    let tm = solver.terms_mut();
    let tree = tm.declare_datatype_sort("Tree").unwrap();
    tm.define_datatype(
        tree,
        &[
            ConstructorDecl::nullary("leaf"),
            ConstructorDecl::with_fields("node", &[("left", tree), ("right", tree)]),
        ],
    )
    .unwrap();
    let dt = tm.sorts.as_datatype(tree).unwrap();
    let node = tm.sorts.datatype(dt).constructors[1].func;

    let x = tm.mk_const("x", tree);
    let y = tm.mk_const("y", tree);
    let z = tm.mk_const("z", tree);
    let w = tm.mk_const("w", tree);
    let node_yz = tm.mk_app(node, &[y, z]).unwrap();
    let node_xw = tm.mk_app(node, &[x, w]).unwrap();
    let x_is_node = tm.mk_eq(x, node_yz).unwrap();
    let y_is_node = tm.mk_eq(y, node_xw).unwrap();

    solver.assert_clause(&[TermLit::positive(x_is_node)]);
    solver.assert_clause(&[TermLit::positive(y_is_node)]);

    assert_eq!(solver.solve(), SmtResult::Unsat);
}

#[test]
fn test_finite_case_split_produces_constructor_model() {
    let mut solver = SmtSolver::new();
    let t_sort = declare_enum(&mut solver);
    let tm = solver.terms_mut();
    let x = tm.mk_const("x", t_sort);
    let y = tm.mk_const("y", t_sort);
    let x_eq_y = tm.mk_eq(x, y).unwrap();

    // x != y over a two-element type: satisfiable, and the model assigns
    // distinct constructors.
    solver.assert_clause(&[TermLit::negative(x_eq_y)]);
    assert_eq!(solver.solve(), SmtResult::Sat);
    let model = solver.model().unwrap();
    let cx = model.constructor_of(x).expect("x has a constructor");
    let cy = model.constructor_of(y).expect("y has a constructor");
    assert!(cx == "A" || cx == "B");
    assert!(cy == "A" || cy == "B");
    assert_ne!(cx, cy);
}

#[test]
fn test_finite_type_pigeonhole() {
    let mut solver = SmtSolver::new();
    let t_sort = declare_enum(&mut solver);
    let tm = solver.terms_mut();
    let x = tm.mk_const("x", t_sort);
    let y = tm.mk_const("y", t_sort);
    let z = tm.mk_const("z", t_sort);
    let xy = tm.mk_eq(x, y).unwrap();
    let yz = tm.mk_eq(y, z).unwrap();
    let xz = tm.mk_eq(x, z).unwrap();

    // Three pairwise-distinct values in a two-element type.
    solver.assert_clause(&[TermLit::negative(xy)]);
    solver.assert_clause(&[TermLit::negative(yz)]);
    solver.assert_clause(&[TermLit::negative(xz)]);

    assert_eq!(solver.solve(), SmtResult::Unsat);
}

#[test]
fn test_list_model_builds_constructor_tree() {
    let mut solver = SmtSolver::new();
    let (list, cons_idx) = declare_list(&mut solver);
    let tm = solver.terms_mut();
    let int = tm.sorts.int_sort;
    let dt = tm.sorts.as_datatype(list).unwrap();
    let cons = tm.sorts.datatype(dt).constructors[cons_idx].func;
    let nil = tm.sorts.datatype(dt).constructors[0].func;

    let h = tm.mk_const("h", int);
    let nil_t = tm.mk_app(nil, &[]).unwrap();
    let cell = tm.mk_app(cons, &[h, nil_t]).unwrap();
    let l = tm.mk_const("l", list);
    let l_eq_cell = tm.mk_eq(l, cell).unwrap();

    solver.assert_clause(&[TermLit::positive(l_eq_cell)]);
    assert_eq!(solver.solve(), SmtResult::Sat);

    let model = solver.model().unwrap();
    match model.value(l).unwrap() {
        ModelValue::Constructor { name, args } => {
            assert_eq!(name, "cons");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[1], ModelValue::Constructor { name, .. } if name == "nil"));
        }
        other => panic!("expected a constructor tree, got {other:?}"),
    }
}

#[test]
fn test_assumption_core_at_smt_level() {
    let mut solver = SmtSolver::new();
    let tm = solver.terms_mut();
    let int = tm.sorts.int_sort;
    let a = tm.mk_const("a", int);
    let b = tm.mk_const("b", int);
    let a_eq_b = tm.mk_eq(a, b).unwrap();

    let result = solver.solve_with_assumptions(&[
        TermLit::positive(a_eq_b),
        TermLit::negative(a_eq_b),
    ]);
    assert_eq!(result, SmtResult::Unsat);
    assert!(!solver.unsat_core().is_empty());
}

#[test]
fn test_push_pop_restores_satisfiability() {
    let mut solver = SmtSolver::new();
    let t_sort = declare_enum(&mut solver);
    let tm = solver.terms_mut();
    let dt = tm.sorts.as_datatype(t_sort).unwrap();
    let is_a = tm.sorts.datatype(dt).constructors[0].tester;
    let is_b = tm.sorts.datatype(dt).constructors[1].tester;
    let x = tm.mk_const("x", t_sort);
    let is_a_x = tm.mk_app(is_a, &[x]).unwrap();
    let is_b_x = tm.mk_app(is_b, &[x]).unwrap();

    solver.assert_clause(&[TermLit::positive(is_a_x)]);
    assert_eq!(solver.solve(), SmtResult::Sat);

    solver.push_level();
    solver.assert_clause(&[TermLit::positive(is_b_x)]);
    assert_eq!(solver.solve(), SmtResult::Unsat);

    solver.pop_levels(1);
    assert_eq!(solver.solve(), SmtResult::Sat);
    assert_eq!(solver.model().unwrap().constructor_of(x), Some("A"));
}

#[test]
fn test_resource_limit_reports_unknown() {
    let mut solver = SmtSolver::new();
    solver.set_resources(ResourceManager::new().with_conflict_budget(0));
    let a = bool_atom(&mut solver, "a");
    let b = bool_atom(&mut solver, "b");
    solver.assert_clause(&[TermLit::positive(a), TermLit::positive(b)]);
    solver.assert_clause(&[TermLit::negative(a), TermLit::negative(b)]);
    solver.assert_clause(&[TermLit::positive(a), TermLit::negative(b)]);
    solver.assert_clause(&[TermLit::negative(a), TermLit::positive(b)]);
    assert_eq!(solver.solve(), SmtResult::Unknown);
}

#[test]
fn test_proof_trace_on_unsat() {
    let mut solver = SmtSolver::with_config(ferrite_solver::SmtConfig {
        produce_proofs: true,
        ..Default::default()
    });
    let a = bool_atom(&mut solver, "a");
    solver.assert_clause(&[TermLit::positive(a)]);
    solver.assert_clause(&[TermLit::negative(a)]);
    assert_eq!(solver.solve(), SmtResult::Unsat);
    let proof = solver.proof().expect("proofs were enabled");
    assert!(!proof.is_empty());
}
