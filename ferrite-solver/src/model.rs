//! Models of satisfiable queries.
//!
//! A model is snapshotted by the theory framework at the successful final
//! check (the SAT core unwinds the trail before returning, so values must
//! be captured while the congruence closure still holds them). Datatype
//! terms evaluate to explicit constructor trees.

use ferrite_core::ast::TermId;
use ferrite_theories::ModelValue;
use rustc_hash::FxHashMap;

/// A satisfying assignment, queried by term.
#[derive(Debug, Clone, Default)]
pub struct Model {
    values: FxHashMap<TermId, ModelValue>,
}

impl Model {
    pub(crate) fn new(values: FxHashMap<TermId, ModelValue>) -> Self {
        Self { values }
    }

    /// The value of a term, if the solver saw it.
    #[must_use]
    pub fn value(&self, t: TermId) -> Option<&ModelValue> {
        self.values.get(&t)
    }

    /// The Boolean value of a term, if it evaluates to one.
    #[must_use]
    pub fn is_true(&self, t: TermId) -> Option<bool> {
        match self.values.get(&t) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// The constructor name of a datatype term's value, if it has one.
    #[must_use]
    pub fn constructor_of(&self, t: TermId) -> Option<&str> {
        match self.values.get(&t) {
            Some(ModelValue::Constructor { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Number of valued terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the model is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all valued terms.
    pub fn iter(&self) -> impl Iterator<Item = (TermId, &ModelValue)> {
        self.values.iter().map(|(&t, v)| (t, v))
    }
}
