//! The per-run array heap.
//!
//! Every array a path touches lives here, addressed by an `ArrayRef`. Two
//! references alias exactly when they are equal, which is what lets the
//! eager index mode treat each cell as an independent value.

use crate::expr::{ArrayTerm, Sort, Value};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ArrayRef(usize);

impl ArrayRef {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The sort of the cells of an array.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ElementSort {
    Primitive(Sort),
    /// Cells hold references to arrays of the given element sort.
    Array(Box<ElementSort>),
}

impl ElementSort {
    pub fn array_of(element: ElementSort) -> ElementSort {
        ElementSort::Array(Box::new(element))
    }

    pub fn primitive(&self) -> Option<Sort> {
        match self {
            ElementSort::Primitive(sort) => Some(*sort),
            ElementSort::Array(_) => None,
        }
    }
}

impl From<Sort> for ElementSort {
    fn from(sort: Sort) -> ElementSort {
        ElementSort::Primitive(sort)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Nullness {
    Null,
    NonNull,
    /// Null exactly when the given boolean value is true.
    MaybeNull(Value),
}

/// The content of one array cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Value(Value),
    Array(ArrayRef),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    /// Cells written or read so far, by concrete index.
    Cells(BTreeMap<i64, Element>),
    /// The whole content as an array term, for primitive arrays accessed at
    /// symbolic indices.
    Term(ArrayTerm),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayObject {
    element: ElementSort,
    length: Value,
    nullness: Nullness,
    content: Content,
    free: bool,
    used_indices: Vec<i64>,
}

impl ArrayObject {
    pub fn new(element: ElementSort, length: Value, content: Content, free: bool) -> ArrayObject {
        ArrayObject {
            element,
            length,
            nullness: Nullness::NonNull,
            content,
            free,
            used_indices: Vec::new(),
        }
    }

    /// The null reference of arrays of `element`.
    pub fn null(element: ElementSort) -> ArrayObject {
        ArrayObject {
            element,
            length: Value::from(0),
            nullness: Nullness::Null,
            content: Content::Cells(BTreeMap::new()),
            free: false,
            used_indices: Vec::new(),
        }
    }

    pub fn element(&self) -> &ElementSort {
        &self.element
    }

    pub fn length(&self) -> &Value {
        &self.length
    }

    pub fn nullness(&self) -> &Nullness {
        &self.nullness
    }

    pub fn set_nullness(&mut self, nullness: Nullness) {
        self.nullness = nullness;
    }

    /// Free arrays have unconstrained content. Cells never written read as
    /// fresh values.
    pub fn is_free(&self) -> bool {
        self.free
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn set_term(&mut self, term: ArrayTerm) {
        self.content = Content::Term(term);
    }

    pub fn cell(&self, index: i64) -> Option<&Element> {
        match &self.content {
            Content::Cells(cells) => cells.get(&index),
            Content::Term(_) => None,
        }
    }

    pub fn set_cell(&mut self, index: i64, element: Element) -> Result<(), Error> {
        self.note_use(index);
        match &mut self.content {
            Content::Cells(cells) => {
                cells.insert(index, element);
                Ok(())
            }
            Content::Term(_) => Err(Error::invariant(
                "cell written into an array held as a term",
            )),
        }
    }

    /// Record that `index` was accessed. Indices are kept in first-use order.
    pub fn note_use(&mut self, index: i64) {
        if !self.used_indices.contains(&index) {
            self.used_indices.push(index);
        }
    }

    pub fn used_indices(&self) -> &[i64] {
        &self.used_indices
    }
}

#[derive(Clone, Debug, Default)]
pub struct ArrayHeap {
    objects: Vec<ArrayObject>,
}

impl ArrayHeap {
    pub fn new() -> ArrayHeap {
        ArrayHeap::default()
    }

    pub fn allocate(&mut self, object: ArrayObject) -> ArrayRef {
        self.objects.push(object);
        ArrayRef(self.objects.len() - 1)
    }

    pub fn get(&self, array: ArrayRef) -> Result<&ArrayObject, Error> {
        self.objects
            .get(array.0)
            .ok_or(Error::UnknownArray(array.0))
    }

    pub fn get_mut(&mut self, array: ArrayRef) -> Result<&mut ArrayObject, Error> {
        self.objects
            .get_mut(array.0)
            .ok_or(Error::UnknownArray(array.0))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
