//! Sort system: built-in sorts, uninterpreted sorts, and algebraic datatypes.
//!
//! Sorts are interned in a [`SortStore`] and referenced by [`SortId`]. The
//! store also owns datatype declarations and the cardinality oracle used by
//! the datatype theory to decide which classes require an exhaustive
//! case-split.

use crate::ast::FuncId;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

/// Identifier of an interned sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortId(u32);

impl SortId {
    /// Create a sort id from a raw index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Index into the sort store.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a declared datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatatypeId(u32);

impl DatatypeId {
    /// Create a datatype id from a raw index.
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Index into the datatype table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Shape of a sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SortKind {
    /// The Boolean sort.
    Bool,
    /// Mathematical integers.
    Int,
    /// Mathematical reals.
    Real,
    /// A user-declared uninterpreted sort.
    Uninterpreted(String),
    /// A declared algebraic datatype.
    Datatype(DatatypeId),
    /// A first-order function space `arg -> ret`.
    Arrow(SortId, SortId),
}

/// An interned sort.
#[derive(Debug, Clone)]
pub struct Sort {
    /// Shape of this sort.
    pub kind: SortKind,
    /// Printable name.
    pub name: String,
}

/// Cardinality classification of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Card {
    /// The sort has finitely many values.
    Finite,
    /// The sort has infinitely many values.
    Infinite,
}

impl Card {
    /// True for [`Card::Finite`].
    #[must_use]
    pub const fn is_finite(self) -> bool {
        matches!(self, Card::Finite)
    }
}

/// Declaration of one datatype constructor, as supplied by the user.
#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    /// Constructor name, e.g. `cons`.
    pub name: String,
    /// Field name and sort for each argument, e.g. `[("head", int), ("tail", list)]`.
    pub fields: Vec<(String, SortId)>,
}

impl ConstructorDecl {
    /// A nullary constructor.
    #[must_use]
    pub fn nullary(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// A constructor with the given named fields.
    #[must_use]
    pub fn with_fields(name: &str, fields: &[(&str, SortId)]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(n, s)| ((*n).to_string(), *s))
                .collect(),
        }
    }
}

/// Declaration of a datatype: a name plus its constructors.
#[derive(Debug, Clone)]
pub struct DatatypeDecl {
    /// Datatype name, e.g. `List`.
    pub name: String,
    /// The constructors, in declaration order.
    pub constructors: Vec<ConstructorDecl>,
}

/// A registered constructor with its associated function symbols.
#[derive(Debug, Clone)]
pub struct ConstructorInfo {
    /// Constructor name.
    pub name: String,
    /// Field sorts in order.
    pub field_sorts: Vec<SortId>,
    /// The constructor function symbol.
    pub func: FuncId,
    /// One selector symbol per field.
    pub selectors: Vec<FuncId>,
    /// The `is-C` tester symbol.
    pub tester: FuncId,
}

/// A registered datatype.
#[derive(Debug, Clone)]
pub struct DatatypeInfo {
    /// Datatype name.
    pub name: String,
    /// The sort backing this datatype.
    pub sort: SortId,
    /// Registered constructors.
    pub constructors: Vec<ConstructorInfo>,
    /// Index of the base constructor used for model completion.
    pub base_cstor: usize,
}

/// Interned sorts plus datatype metadata and the cardinality oracle.
#[derive(Debug)]
pub struct SortStore {
    sorts: Vec<Sort>,
    table: FxHashMap<SortKind, SortId>,
    datatypes: Vec<DatatypeInfo>,
    card: Vec<Card>,
    /// The Boolean sort, always present.
    pub bool_sort: SortId,
    /// The integer sort, always present.
    pub int_sort: SortId,
    /// The real sort, always present.
    pub real_sort: SortId,
}

impl SortStore {
    /// Create a store with the built-in sorts interned.
    #[must_use]
    pub fn new() -> Self {
        let mut store = Self {
            sorts: Vec::new(),
            table: FxHashMap::default(),
            datatypes: Vec::new(),
            card: Vec::new(),
            bool_sort: SortId::new(0),
            int_sort: SortId::new(0),
            real_sort: SortId::new(0),
        };
        store.bool_sort = store.intern(SortKind::Bool, "Bool");
        store.int_sort = store.intern(SortKind::Int, "Int");
        store.real_sort = store.intern(SortKind::Real, "Real");
        store
    }

    fn intern(&mut self, kind: SortKind, name: &str) -> SortId {
        if let Some(&id) = self.table.get(&kind) {
            return id;
        }
        let id = SortId::new(self.sorts.len() as u32);
        self.table.insert(kind.clone(), id);
        self.sorts.push(Sort {
            kind,
            name: name.to_string(),
        });
        self.card.push(Card::Infinite); // recomputed below
        self.recompute_cardinalities();
        id
    }

    /// Declare a new uninterpreted sort.
    pub fn declare_sort(&mut self, name: &str) -> SortId {
        self.intern(SortKind::Uninterpreted(name.to_string()), name)
    }

    /// Intern the function-space sort `arg -> ret`.
    pub fn arrow(&mut self, arg: SortId, ret: SortId) -> SortId {
        let name = format!("({} -> {})", self.name(arg), self.name(ret));
        self.intern(SortKind::Arrow(arg, ret), &name)
    }

    /// Reserve a fresh datatype sort. The datatype's constructors are filled
    /// in by the term manager, which owns the function-symbol table.
    pub(crate) fn reserve_datatype(&mut self, name: &str) -> Result<(SortId, DatatypeId)> {
        if self.datatypes.iter().any(|d| d.name == name) {
            return Err(Error::DuplicateDeclaration(name.to_string()));
        }
        let dt = DatatypeId::new(self.datatypes.len() as u32);
        let sort = self.intern(SortKind::Datatype(dt), name);
        self.datatypes.push(DatatypeInfo {
            name: name.to_string(),
            sort,
            constructors: Vec::new(),
            base_cstor: 0,
        });
        Ok((sort, dt))
    }

    pub(crate) fn install_constructors(
        &mut self,
        dt: DatatypeId,
        cstors: Vec<ConstructorInfo>,
    ) {
        self.datatypes[dt.index()].constructors = cstors;
        self.recompute_cardinalities();
        self.select_base_cstor(dt);
    }

    /// Look up an interned sort.
    #[must_use]
    pub fn get(&self, id: SortId) -> &Sort {
        &self.sorts[id.index()]
    }

    /// Printable name of a sort.
    #[must_use]
    pub fn name(&self, id: SortId) -> &str {
        &self.sorts[id.index()].name
    }

    /// Metadata of a declared datatype.
    #[must_use]
    pub fn datatype(&self, dt: DatatypeId) -> &DatatypeInfo {
        &self.datatypes[dt.index()]
    }

    /// Number of declared datatypes.
    #[must_use]
    pub fn num_datatypes(&self) -> usize {
        self.datatypes.len()
    }

    /// The datatype id backing `sort`, if it is a datatype sort.
    #[must_use]
    pub fn as_datatype(&self, sort: SortId) -> Option<DatatypeId> {
        match self.sorts[sort.index()].kind {
            SortKind::Datatype(dt) => Some(dt),
            _ => None,
        }
    }

    /// Cardinality of a sort, per the oracle's current fixpoint.
    #[must_use]
    pub fn cardinality(&self, sort: SortId) -> Card {
        self.card[sort.index()]
    }

    /// Fixpoint computation of sort cardinalities.
    ///
    /// Bool is finite; Int, Real and uninterpreted sorts are infinite; an
    /// arrow is finite iff both ends are; a datatype is finite iff every
    /// constructor's field sorts are all finite. Datatypes are seeded
    /// `Infinite` so that direct recursion does not misclassify as finite,
    /// then recomputed until nothing changes.
    fn recompute_cardinalities(&mut self) {
        for (i, sort) in self.sorts.iter().enumerate() {
            self.card[i] = match sort.kind {
                SortKind::Bool => Card::Finite,
                SortKind::Int | SortKind::Real | SortKind::Uninterpreted(_) => Card::Infinite,
                // seeded; refined in the loop below
                SortKind::Datatype(_) | SortKind::Arrow(..) => Card::Infinite,
            };
        }
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.sorts.len() {
                let new = match &self.sorts[i].kind {
                    SortKind::Arrow(a, r) => {
                        if self.card[a.index()].is_finite() && self.card[r.index()].is_finite() {
                            Card::Finite
                        } else {
                            Card::Infinite
                        }
                    }
                    SortKind::Datatype(dt) => {
                        let info = &self.datatypes[dt.index()];
                        if info.constructors.is_empty() {
                            // not yet installed; keep the seed
                            Card::Infinite
                        } else {
                            let all_finite = info.constructors.iter().all(|c| {
                                c.field_sorts
                                    .iter()
                                    .all(|s| self.card[s.index()].is_finite())
                            });
                            if all_finite {
                                Card::Finite
                            } else {
                                Card::Infinite
                            }
                        }
                    }
                    _ => continue,
                };
                if new != self.card[i] {
                    self.card[i] = new;
                    changed = true;
                }
            }
        }
    }

    /// Pick a base constructor for model completion: prefer a constructor
    /// whose fields are all finite, else any constructor that does not
    /// directly mention the datatype itself.
    fn select_base_cstor(&mut self, dt: DatatypeId) {
        let own_sort = self.datatypes[dt.index()].sort;
        let mut choice = 0;
        for (i, c) in self.datatypes[dt.index()].constructors.iter().enumerate() {
            let all_finite = c
                .field_sorts
                .iter()
                .all(|s| self.card[s.index()].is_finite());
            if all_finite {
                choice = i;
                break;
            }
            if !c.field_sorts.contains(&own_sort) && choice == 0 {
                choice = i;
            }
        }
        self.datatypes[dt.index()].base_cstor = choice;
    }
}

impl Default for SortStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sorts() {
        let s = SortStore::new();
        assert_eq!(s.cardinality(s.bool_sort), Card::Finite);
        assert_eq!(s.cardinality(s.int_sort), Card::Infinite);
        assert_eq!(s.name(s.real_sort), "Real");
    }

    #[test]
    fn test_arrow_cardinality() {
        let mut s = SortStore::new();
        let bb = s.arrow(s.bool_sort, s.bool_sort);
        assert_eq!(s.cardinality(bb), Card::Finite);
        let bi = s.arrow(s.bool_sort, s.int_sort);
        assert_eq!(s.cardinality(bi), Card::Infinite);
    }

    #[test]
    fn test_interning_is_idempotent() {
        let mut s = SortStore::new();
        let u1 = s.declare_sort("U");
        let u2 = s.declare_sort("U");
        assert_eq!(u1, u2);
    }
}
