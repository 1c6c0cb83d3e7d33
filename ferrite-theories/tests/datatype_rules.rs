//! Datatype plugin rules exercised directly over the congruence closure.

use ferrite_core::ast::TermManager;
use ferrite_core::sort::ConstructorDecl;
use ferrite_sat::{Lit, Var};
use ferrite_theories::cc::{Cc, Expl};
use ferrite_theories::datatype::DatatypeTheory;

fn lit(n: u32) -> Lit {
    Lit::pos(Var::new(n))
}

fn enum_ab(tm: &mut TermManager) -> ferrite_core::sort::SortId {
    tm.declare_datatype(&ferrite_core::sort::DatatypeDecl {
        name: "T".to_string(),
        constructors: vec![
            ConstructorDecl::nullary("A"),
            ConstructorDecl::nullary("B"),
        ],
    })
    .unwrap()
}

#[test]
fn test_disjointness_conflict() {
    let mut tm = TermManager::new();
    let t_sort = enum_ab(&mut tm);
    let dt = tm.sorts.as_datatype(t_sort).unwrap();
    let a_func = tm.sorts.datatype(dt).constructors[0].func;
    let b_func = tm.sorts.datatype(dt).constructors[1].func;
    let a = tm.mk_app(a_func, &[]).unwrap();
    let b = tm.mk_app(b_func, &[]).unwrap();
    let x = tm.mk_const("x", t_sort);

    let mut cc = Cc::new(&tm);
    cc.add_plugin(Box::new(DatatypeTheory::new()));

    cc.merge_terms(&mut tm, x, a, Expl::Lit(lit(0))).unwrap();
    cc.check(&mut tm).unwrap();
    cc.merge_terms(&mut tm, x, b, Expl::Lit(lit(1))).unwrap();

    let conflict = cc.check(&mut tm).expect_err("A and B are disjoint");
    assert!(conflict.lits.contains(&lit(0)));
    assert!(conflict.lits.contains(&lit(1)));
}

#[test]
fn test_injectivity_merges_arguments() {
    let mut tm = TermManager::new();
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
    let dt = tm.sorts.as_datatype(list).unwrap();
    let cons = tm.sorts.datatype(dt).constructors[1].func;

    let x = tm.mk_const("x", int);
    let y = tm.mk_const("y", list);
    let u = tm.mk_const("u", int);
    let v = tm.mk_const("v", list);
    let cxy = tm.mk_app(cons, &[x, y]).unwrap();
    let cuv = tm.mk_app(cons, &[u, v]).unwrap();

    let mut cc = Cc::new(&tm);
    cc.add_plugin(Box::new(DatatypeTheory::new()));

    let nx = cc.add_term(&mut tm, x).unwrap();
    let nu = cc.add_term(&mut tm, u).unwrap();
    let ny = cc.add_term(&mut tm, y).unwrap();
    let nv = cc.add_term(&mut tm, v).unwrap();

    cc.merge_terms(&mut tm, cxy, cuv, Expl::Lit(lit(2))).unwrap();
    cc.check(&mut tm).unwrap();

    assert_eq!(cc.store().find(nx), cc.store().find(nu));
    assert_eq!(cc.store().find(ny), cc.store().find(nv));
    // Injectivity traces back to the literal equating the two cells.
    assert_eq!(cc.explain(nx, nu), vec![lit(2)]);
}

#[test]
fn test_selector_reduces_over_constructor() {
    let mut tm = TermManager::new();
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
    let dt = tm.sorts.as_datatype(list).unwrap();
    let cons_info = tm.sorts.datatype(dt).constructors[1].clone();

    let x = tm.mk_const("x", int);
    let y = tm.mk_const("y", list);
    let cell = tm.mk_app(cons_info.func, &[x, y]).unwrap();
    let head_of_cell = tm.mk_app(cons_info.selectors[0], &[cell]).unwrap();

    let mut cc = Cc::new(&tm);
    cc.add_plugin(Box::new(DatatypeTheory::new()));

    let n_head = cc.add_term(&mut tm, head_of_cell).unwrap();
    let n_x = cc.store().node_of(x).unwrap();
    cc.check(&mut tm).unwrap();

    assert_eq!(cc.store().find(n_head), cc.store().find(n_x));
}

#[test]
fn test_tester_fixed_by_constructor() {
    let mut tm = TermManager::new();
    let t_sort = enum_ab(&mut tm);
    let dt = tm.sorts.as_datatype(t_sort).unwrap();
    let a_func = tm.sorts.datatype(dt).constructors[0].func;
    let is_a = tm.sorts.datatype(dt).constructors[0].tester;
    let is_b = tm.sorts.datatype(dt).constructors[1].tester;

    let x = tm.mk_const("x", t_sort);
    let a = tm.mk_app(a_func, &[]).unwrap();
    let is_a_x = tm.mk_app(is_a, &[x]).unwrap();
    let is_b_x = tm.mk_app(is_b, &[x]).unwrap();

    let mut cc = Cc::new(&tm);
    cc.add_plugin(Box::new(DatatypeTheory::new()));

    let n_is_a = cc.add_term(&mut tm, is_a_x).unwrap();
    let n_is_b = cc.add_term(&mut tm, is_b_x).unwrap();
    cc.merge_terms(&mut tm, x, a, Expl::Lit(lit(4))).unwrap();
    cc.check(&mut tm).unwrap();

    let tr = cc.store().true_node();
    let fr = cc.store().false_node();
    assert_eq!(cc.store().find(n_is_a), cc.store().find(tr));
    assert_eq!(cc.store().find(n_is_b), cc.store().find(fr));
}

#[test]
fn test_rules_revert_on_pop() {
    let mut tm = TermManager::new();
    let t_sort = enum_ab(&mut tm);
    let dt = tm.sorts.as_datatype(t_sort).unwrap();
    let a_func = tm.sorts.datatype(dt).constructors[0].func;
    let b_func = tm.sorts.datatype(dt).constructors[1].func;
    let a = tm.mk_app(a_func, &[]).unwrap();
    let b = tm.mk_app(b_func, &[]).unwrap();
    let x = tm.mk_const("x", t_sort);

    let mut cc = Cc::new(&tm);
    cc.add_plugin(Box::new(DatatypeTheory::new()));
    cc.add_term(&mut tm, a).unwrap();
    cc.add_term(&mut tm, b).unwrap();
    cc.add_term(&mut tm, x).unwrap();

    cc.push_level();
    cc.merge_terms(&mut tm, x, a, Expl::Lit(lit(0))).unwrap();
    cc.check(&mut tm).unwrap();
    cc.pop_levels(1);

    // After the pop, x = B is consistent again.
    cc.push_level();
    cc.merge_terms(&mut tm, x, b, Expl::Lit(lit(1))).unwrap();
    cc.check(&mut tm).expect("x = B after undoing x = A");
}
