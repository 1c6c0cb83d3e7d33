//! Hash-consed terms.
//!
//! All terms are owned by a [`TermManager`] and referenced by [`TermId`].
//! Structural equality and hashing are O(1) on the id: building the same
//! term twice returns the same id. Terms are immutable and live for the
//! whole solve.

use crate::error::{Error, Result};
use crate::sort::{ConstructorDecl, ConstructorInfo, DatatypeDecl, DatatypeId, SortId, SortStore};
use lasso::{Rodeo, Spur};
use num_bigint::BigInt;
use num_rational::BigRational;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt::Write as _;

/// Identifier of a hash-consed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    /// Create a term id from a raw index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Index into the term table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a declared function symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(u32);

impl FuncId {
    /// Create a function id from a raw index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Index into the function table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Role of a function symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    /// An ordinary uninterpreted symbol.
    Uninterpreted,
    /// Datatype constructor `C` of `dt`.
    Constructor {
        /// Owning datatype.
        dt: DatatypeId,
        /// Constructor index within the datatype.
        cstor: usize,
    },
    /// Selector `sel_{C,field}` of `dt`.
    Selector {
        /// Owning datatype.
        dt: DatatypeId,
        /// Constructor index within the datatype.
        cstor: usize,
        /// Field index within the constructor.
        field: usize,
    },
    /// Tester `is-C` of `dt`.
    Tester {
        /// Owning datatype.
        dt: DatatypeId,
        /// Constructor index within the datatype.
        cstor: usize,
    },
}

/// A declared function symbol.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    /// Interned symbol name.
    pub name: Spur,
    /// Argument sorts.
    pub args: Vec<SortId>,
    /// Result sort.
    pub ret: SortId,
    /// Role of the symbol.
    pub kind: FuncKind,
}

/// View of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// The Boolean constant `true`.
    True,
    /// The Boolean constant `false`.
    False,
    /// A named constant (nullary uninterpreted symbol).
    Const {
        /// Interned name.
        sym: Spur,
        /// Sort of the constant.
        sort: SortId,
    },
    /// An integer numeral.
    IntConst(BigInt),
    /// A rational numeral.
    RatConst(BigRational),
    /// Application of a declared function symbol.
    Apply {
        /// Applied symbol.
        func: FuncId,
        /// Argument terms.
        args: SmallVec<[TermId; 4]>,
    },
    /// Equality; the two sides are ordered by id (canonical form).
    Eq(TermId, TermId),
    /// Boolean negation; never nested (double negation collapses).
    Not(TermId),
}

/// A hash-consed term: its view plus its sort.
#[derive(Debug, Clone)]
pub struct Term {
    /// View of the term.
    pub kind: TermKind,
    /// Sort of the term.
    pub sort: SortId,
}

/// Owner of all terms, function symbols, and sorts.
pub struct TermManager {
    /// The sort store, exposed for direct access to the built-in sorts.
    pub sorts: SortStore,
    symbols: Rodeo,
    funcs: Vec<FuncDecl>,
    terms: Vec<Term>,
    table: FxHashMap<TermKind, TermId>,
    true_t: TermId,
    false_t: TermId,
}

impl TermManager {
    /// Create a manager with `true` and `false` interned.
    #[must_use]
    pub fn new() -> Self {
        let mut tm = Self {
            sorts: SortStore::new(),
            symbols: Rodeo::default(),
            funcs: Vec::new(),
            terms: Vec::new(),
            table: FxHashMap::default(),
            true_t: TermId::new(0),
            false_t: TermId::new(0),
        };
        let b = tm.sorts.bool_sort;
        tm.true_t = tm.intern(TermKind::True, b);
        tm.false_t = tm.intern(TermKind::False, b);
        tm
    }

    fn intern(&mut self, kind: TermKind, sort: SortId) -> TermId {
        if let Some(&id) = self.table.get(&kind) {
            return id;
        }
        let id = TermId::new(self.terms.len() as u32);
        self.table.insert(kind.clone(), id);
        self.terms.push(Term { kind, sort });
        id
    }

    /// The Boolean constant `true`.
    #[must_use]
    pub fn mk_true(&self) -> TermId {
        self.true_t
    }

    /// The Boolean constant `false`.
    #[must_use]
    pub fn mk_false(&self) -> TermId {
        self.false_t
    }

    /// A named constant of the given sort.
    pub fn mk_const(&mut self, name: &str, sort: SortId) -> TermId {
        let sym = self.symbols.get_or_intern(name);
        self.intern(TermKind::Const { sym, sort }, sort)
    }

    /// An integer numeral.
    pub fn mk_int(&mut self, value: BigInt) -> TermId {
        let sort = self.sorts.int_sort;
        self.intern(TermKind::IntConst(value), sort)
    }

    /// A rational numeral.
    pub fn mk_rat(&mut self, value: BigRational) -> TermId {
        let sort = self.sorts.real_sort;
        self.intern(TermKind::RatConst(value), sort)
    }

    /// Declare an uninterpreted function symbol.
    pub fn declare_fun(&mut self, name: &str, args: Vec<SortId>, ret: SortId) -> FuncId {
        self.declare_fun_kind(name, args, ret, FuncKind::Uninterpreted)
    }

    fn declare_fun_kind(
        &mut self,
        name: &str,
        args: Vec<SortId>,
        ret: SortId,
        kind: FuncKind,
    ) -> FuncId {
        let id = FuncId::new(self.funcs.len() as u32);
        let name = self.symbols.get_or_intern(name);
        self.funcs.push(FuncDecl {
            name,
            args,
            ret,
            kind,
        });
        id
    }

    /// Apply a declared symbol, checking arity and argument sorts.
    pub fn mk_app(&mut self, func: FuncId, args: &[TermId]) -> Result<TermId> {
        let decl = &self.funcs[func.index()];
        if decl.args.len() != args.len() {
            return Err(Error::ArityMismatch {
                func: self.symbols.resolve(&decl.name).to_string(),
                expected: decl.args.len(),
                got: args.len(),
            });
        }
        for (expected, &arg) in decl.args.iter().zip(args) {
            let got = self.terms[arg.index()].sort;
            if got != *expected {
                return Err(Error::SortMismatch {
                    expected: self.sorts.name(*expected).to_string(),
                    got: self.sorts.name(got).to_string(),
                });
            }
        }
        let ret = decl.ret;
        let kind = TermKind::Apply {
            func,
            args: SmallVec::from_slice(args),
        };
        Ok(self.intern(kind, ret))
    }

    /// Equality between two terms of the same sort. The sides are ordered by
    /// id so that `a = b` and `b = a` intern to the same term.
    pub fn mk_eq(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        let sa = self.terms[a.index()].sort;
        let sb = self.terms[b.index()].sort;
        if sa != sb {
            return Err(Error::SortMismatch {
                expected: self.sorts.name(sa).to_string(),
                got: self.sorts.name(sb).to_string(),
            });
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let sort = self.sorts.bool_sort;
        Ok(self.intern(TermKind::Eq(lo, hi), sort))
    }

    /// Boolean negation; `not (not t)` collapses to `t`.
    pub fn mk_not(&mut self, t: TermId) -> Result<TermId> {
        let sort = self.terms[t.index()].sort;
        if sort != self.sorts.bool_sort {
            return Err(Error::SortMismatch {
                expected: "Bool".to_string(),
                got: self.sorts.name(sort).to_string(),
            });
        }
        match self.terms[t.index()].kind {
            TermKind::Not(inner) => Ok(inner),
            TermKind::True => Ok(self.false_t),
            TermKind::False => Ok(self.true_t),
            _ => {
                let b = self.sorts.bool_sort;
                Ok(self.intern(TermKind::Not(t), b))
            }
        }
    }

    /// Reserve a datatype sort so that recursive constructors can mention
    /// it; complete the declaration with [`TermManager::define_datatype`].
    pub fn declare_datatype_sort(&mut self, name: &str) -> Result<SortId> {
        let (sort, _) = self.sorts.reserve_datatype(name)?;
        Ok(sort)
    }

    /// Install the constructors of a previously reserved datatype sort,
    /// registering constructor, selector and tester symbols and completing
    /// the cardinality oracle.
    pub fn define_datatype(
        &mut self,
        sort: SortId,
        constructors: &[ConstructorDecl],
    ) -> Result<()> {
        let dt = self
            .sorts
            .as_datatype(sort)
            .ok_or_else(|| Error::UndefinedSymbol(self.sorts.name(sort).to_string()))?;
        if constructors.is_empty() {
            return Err(Error::EmptyDatatype(self.sorts.name(sort).to_string()));
        }
        if !self.sorts.datatype(dt).constructors.is_empty() {
            return Err(Error::DuplicateDeclaration(
                self.sorts.name(sort).to_string(),
            ));
        }
        let mut infos = Vec::with_capacity(constructors.len());
        for (ci, c) in constructors.iter().enumerate() {
            infos.push(self.register_constructor(dt, sort, ci, c)?);
        }
        self.sorts.install_constructors(dt, infos);
        Ok(())
    }

    /// One-shot declaration for datatypes whose constructors do not mention
    /// the datatype itself.
    pub fn declare_datatype(&mut self, decl: &DatatypeDecl) -> Result<SortId> {
        let sort = self.declare_datatype_sort(&decl.name)?;
        self.define_datatype(sort, &decl.constructors)?;
        Ok(sort)
    }

    fn register_constructor(
        &mut self,
        dt: DatatypeId,
        sort: SortId,
        ci: usize,
        c: &ConstructorDecl,
    ) -> Result<ConstructorInfo> {
        let mut seen = rustc_hash::FxHashSet::default();
        for (fname, _) in &c.fields {
            if !seen.insert(fname.as_str()) {
                return Err(Error::DuplicateDeclaration(fname.clone()));
            }
        }
        let field_sorts: Vec<SortId> = c.fields.iter().map(|(_, s)| *s).collect();
        let func = self.declare_fun_kind(
            &c.name,
            field_sorts.clone(),
            sort,
            FuncKind::Constructor { dt, cstor: ci },
        );
        let selectors = c
            .fields
            .iter()
            .enumerate()
            .map(|(fi, (fname, fsort))| {
                self.declare_fun_kind(
                    fname,
                    vec![sort],
                    *fsort,
                    FuncKind::Selector {
                        dt,
                        cstor: ci,
                        field: fi,
                    },
                )
            })
            .collect();
        let tester = self.declare_fun_kind(
            &format!("is-{}", c.name),
            vec![sort],
            self.sorts.bool_sort,
            FuncKind::Tester { dt, cstor: ci },
        );
        Ok(ConstructorInfo {
            name: c.name.clone(),
            field_sorts,
            func,
            selectors,
            tester,
        })
    }

    /// Look up a term.
    #[must_use]
    pub fn get(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    /// View of a term.
    #[must_use]
    pub fn kind(&self, id: TermId) -> &TermKind {
        &self.terms[id.index()].kind
    }

    /// Sort of a term.
    #[must_use]
    pub fn sort(&self, id: TermId) -> SortId {
        self.terms[id.index()].sort
    }

    /// Look up a function declaration.
    #[must_use]
    pub fn func(&self, id: FuncId) -> &FuncDecl {
        &self.funcs[id.index()]
    }

    /// Printable name of a function symbol.
    #[must_use]
    pub fn func_name(&self, id: FuncId) -> &str {
        self.symbols.resolve(&self.funcs[id.index()].name)
    }

    /// Resolve an interned symbol.
    #[must_use]
    pub fn resolve(&self, sym: Spur) -> &str {
        self.symbols.resolve(&sym)
    }

    /// Number of interned terms.
    #[must_use]
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Render a term for diagnostics.
    #[must_use]
    pub fn display(&self, id: TermId) -> String {
        let mut out = String::new();
        self.write_term(&mut out, id);
        out
    }

    fn write_term(&self, out: &mut String, id: TermId) {
        match &self.terms[id.index()].kind {
            TermKind::True => out.push_str("true"),
            TermKind::False => out.push_str("false"),
            TermKind::Const { sym, .. } => out.push_str(self.symbols.resolve(sym)),
            TermKind::IntConst(n) => {
                let _ = write!(out, "{n}");
            }
            TermKind::RatConst(q) => {
                let _ = write!(out, "{q}");
            }
            TermKind::Apply { func, args } => {
                let _ = write!(out, "({}", self.func_name(*func));
                for &a in args {
                    out.push(' ');
                    self.write_term(out, a);
                }
                out.push(')');
            }
            TermKind::Eq(a, b) => {
                out.push_str("(= ");
                self.write_term(out, *a);
                out.push(' ');
                self.write_term(out, *b);
                out.push(')');
            }
            TermKind::Not(t) => {
                out.push_str("(not ");
                self.write_term(out, *t);
                out.push(')');
            }
        }
    }
}

impl Default for TermManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing() {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let x1 = tm.mk_const("x", int);
        let x2 = tm.mk_const("x", int);
        assert_eq!(x1, x2);

        let f = tm.declare_fun("f", vec![int], int);
        let fx1 = tm.mk_app(f, &[x1]).unwrap();
        let fx2 = tm.mk_app(f, &[x2]).unwrap();
        assert_eq!(fx1, fx2);
    }

    #[test]
    fn test_eq_is_symmetric_under_interning() {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let x = tm.mk_const("x", int);
        let y = tm.mk_const("y", int);
        let e1 = tm.mk_eq(x, y).unwrap();
        let e2 = tm.mk_eq(y, x).unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_double_negation_collapses() {
        let mut tm = TermManager::new();
        let b = tm.sorts.bool_sort;
        let p = tm.mk_const("p", b);
        let np = tm.mk_not(p).unwrap();
        let nnp = tm.mk_not(np).unwrap();
        assert_eq!(nnp, p);
    }

    #[test]
    fn test_sort_check_rejects_bad_app() {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let b = tm.sorts.bool_sort;
        let f = tm.declare_fun("f", vec![int], int);
        let p = tm.mk_const("p", b);
        assert!(tm.mk_app(f, &[p]).is_err());
        assert!(tm.mk_app(f, &[]).is_err());
    }

    #[test]
    fn test_datatype_declaration() {
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
        let info = tm.sorts.datatype(dt);
        assert_eq!(info.constructors.len(), 2);
        assert_eq!(tm.func_name(info.constructors[0].func), "nil");
        assert_eq!(tm.func_name(info.constructors[1].tester), "is-cons");
    }
}
