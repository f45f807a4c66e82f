//! Array access.
//!
//! Every access checks the array for null, then the index against the
//! length. A symbolic index is then either concretized (eager mode, and
//! always in concolic mode) or kept symbolic: primitive arrays become array
//! terms, and arrays of arrays resolve the index through a choice over the
//! candidate cells.

use crate::config::{IndexMode, Mode};
use crate::context::{ArrayObject, ArrayRef, Content, Element, ElementSort, Nullness};
use crate::expr::{ArrayTerm, Constant, Expression, Sort, Value};
use crate::region::Signal;
use crate::run::Run;
use crate::{Error, Fault};
use std::collections::BTreeMap;

enum Index {
    Concrete(i64),
    Symbolic(Expression),
}

fn int(index: i64) -> Result<Expression, Error> {
    let index = i32::try_from(index)
        .map_err(|_| Error::Sort(format!("array index {} does not fit an int", index)))?;
    Ok(Expression::int(index))
}

fn primitive(element: &ElementSort) -> Result<Sort, Error> {
    element
        .primitive()
        .ok_or_else(|| Error::Sort("primitive access to an array of arrays".into()))
}

fn inner(element: &ElementSort) -> Result<ElementSort, Error> {
    match element {
        ElementSort::Array(inner) => Ok(inner.as_ref().clone()),
        ElementSort::Primitive(sort) => Err(Error::Sort(format!(
            "reference access to an array of {}",
            sort
        ))),
    }
}

impl<'a> Run<'a> {
    fn uses_terms(&self, element: &ElementSort) -> bool {
        self.mode() == Mode::Symbolic
            && self.config().index_mode() == IndexMode::Symbolic
            && element.primitive().is_some()
    }

    fn object(&self, array: ArrayRef) -> Result<&ArrayObject, Error> {
        self.context.heap().get(array)
    }

    fn object_mut(&mut self, array: ArrayRef) -> Result<&mut ArrayObject, Error> {
        self.context.heap_mut().get_mut(array)
    }

    /// A new array of `length` cells, each holding the default value of its
    /// sort, or a null array for arrays of arrays.
    pub fn new_array<E: Into<ElementSort>>(
        &mut self,
        element: E,
        length: &Value,
    ) -> Result<ArrayRef, Signal> {
        let element = element.into();
        if length.sort() != Sort::Int {
            return Err(Error::Sort(format!("array length of sort {}", length.sort())).into());
        }
        match length.as_constant().and_then(Constant::as_i64) {
            Some(length) if length < 0 => {
                return Err(Signal::Exception(Fault::NegativeArraySize(length)))
            }
            Some(_) => {}
            None => {
                let non_negative = self.ge(length, &Value::from(0))?;
                self.assume(&non_negative)?;
            }
        }

        let content = if self.uses_terms(&element) {
            Content::Term(ArrayTerm::defaults(primitive(&element)?))
        } else {
            Content::Cells(BTreeMap::new())
        };
        let object = ArrayObject::new(element, length.clone(), content, false);
        Ok(self.context.heap_mut().allocate(object))
    }

    /// An array with unconstrained length and content. Its length is at most
    /// `Config::max_free_array_length`.
    pub fn free_array<E: Into<ElementSort>>(&mut self, element: E) -> Result<ArrayRef, Signal> {
        let element = element.into();
        let name = self.context.next_array_name();
        let length = self.fresh(Sort::Int)?;
        let max = Value::from(self.config().max_free_array_length());
        let lower = self.ge(&length, &Value::from(0))?;
        self.assume(&lower)?;
        let upper = self.le(&length, &max)?;
        self.assume(&upper)?;

        let content = if self.uses_terms(&element) {
            Content::Term(ArrayTerm::variable(name, primitive(&element)?))
        } else {
            Content::Cells(BTreeMap::new())
        };
        let mut object = ArrayObject::new(element, length, content, true);
        if self.config().arrays_can_be_null() {
            let is_null = self.fresh(Sort::Bool)?;
            object.set_nullness(Nullness::MaybeNull(is_null));
        }
        Ok(self.context.heap_mut().allocate(object))
    }

    pub fn null_array<E: Into<ElementSort>>(&mut self, element: E) -> ArrayRef {
        self.context
            .heap_mut()
            .allocate(ArrayObject::null(element.into()))
    }

    /// Decide whether `array` is null.
    pub fn is_null(&mut self, array: ArrayRef) -> Result<bool, Signal> {
        let nullness = self.object(array)?.nullness().clone();
        match nullness {
            Nullness::Null => Ok(true),
            Nullness::NonNull => Ok(false),
            Nullness::MaybeNull(is_null) => {
                let null = self.branch(&is_null)?;
                let nullness = if null {
                    Nullness::Null
                } else {
                    Nullness::NonNull
                };
                self.object_mut(array)?.set_nullness(nullness);
                Ok(null)
            }
        }
    }

    fn check_not_null(&mut self, array: ArrayRef) -> Result<(), Signal> {
        if self.is_null(array)? {
            return Err(Signal::Exception(Fault::NullPointer));
        }
        Ok(())
    }

    pub fn length(&mut self, array: ArrayRef) -> Result<Value, Signal> {
        self.check_not_null(array)?;
        Ok(self.object(array)?.length().clone())
    }

    fn check_bounds(&mut self, index: &Value, length: &Value) -> Result<(), Signal> {
        let concrete_index = index.as_constant().and_then(Constant::as_i64);
        let concrete_length = length.as_constant().and_then(Constant::as_i64);
        if let (Some(index), Some(length)) = (concrete_index, concrete_length) {
            if index < 0 || index >= length {
                return Err(Signal::Exception(Fault::IndexOutOfBounds {
                    index: Some(index),
                    length: Some(length),
                }));
            }
            return Ok(());
        }

        let lower = self.le(&Value::from(0), index)?;
        let upper = self.lt(index, length)?;
        let in_bounds = self.and(&lower, &upper)?;
        if self.config().throw_on_out_of_bounds() {
            if !self.branch(&in_bounds)? {
                return Err(Signal::Exception(Fault::IndexOutOfBounds {
                    index: concrete_index,
                    length: concrete_length,
                }));
            }
            Ok(())
        } else {
            self.assume(&in_bounds)
        }
    }

    /// Check `index` against the bounds of `array`, and decide how the access
    /// addresses its cells.
    fn resolve(&mut self, array: ArrayRef, index: &Value) -> Result<Index, Signal> {
        if index.sort() != Sort::Int {
            return Err(Error::Sort(format!("array index of sort {}", index.sort())).into());
        }
        let length = self.object(array)?.length().clone();
        self.check_bounds(index, &length)?;

        match index {
            Value::Concrete(constant) => Ok(Index::Concrete(constant.as_i64().unwrap_or(0))),
            Value::Concolic(concolic) => {
                let index = concolic.shadow().as_i64().unwrap_or(0);
                self.constrain(Expression::eq(concolic.symbolic().clone(), int(index)?)?)?;
                Ok(Index::Concrete(index))
            }
            Value::Symbolic(expression) => {
                if self.config().index_mode() == IndexMode::Symbolic {
                    Ok(Index::Symbolic(expression.clone()))
                } else {
                    let index = self.concretize(array, expression, &length)?;
                    Ok(Index::Concrete(index))
                }
            }
        }
    }

    /// Pick a concrete value for a symbolic index. Indices used before come
    /// first, so repeated accesses with the same index alias one cell.
    fn concretize(
        &mut self,
        array: ArrayRef,
        index: &Expression,
        length: &Value,
    ) -> Result<i64, Signal> {
        let used = self.object(array)?.used_indices().to_vec();
        let length = length.as_constant().and_then(Constant::as_i64).unwrap_or(0);
        let limit = self.config().max_index_probes();
        let candidates = used
            .iter()
            .copied()
            .chain((0..length).filter(|candidate| !used.contains(candidate)))
            .take(limit);

        let mut chosen = None;
        for candidate in candidates {
            let equal = Expression::eq(index.clone(), int(candidate)?)?;
            if self.executor.solver().check_with(&equal)? {
                chosen = Some(candidate);
                break;
            }
        }
        let chosen = match chosen {
            Some(chosen) => chosen,
            None => self
                .executor
                .solver()
                .label(index)?
                .as_i64()
                .ok_or_else(|| Error::Sort("array index is not integral".into()))?,
        };
        self.executor.count("concretized-indices");
        self.constrain(Expression::eq(index.clone(), int(chosen)?)?)?;
        Ok(chosen)
    }

    /// Resolve a symbolic index into an array of arrays with a choice over
    /// the cells it may address.
    fn choose_index(&mut self, array: ArrayRef, index: &Expression) -> Result<i64, Signal> {
        let length = self
            .object(array)?
            .length()
            .as_constant()
            .and_then(Constant::as_i64)
            .unwrap_or(self.config().max_free_array_length() as i64);
        let limit = self.config().max_index_probes().max(1);
        let candidates: Vec<i64> = (0..length).take(limit).collect();
        if candidates.is_empty() {
            return Err(Signal::Backtrack);
        }
        let conditions = candidates
            .iter()
            .map(|candidate| Expression::eq(index.clone(), int(*candidate)?))
            .collect::<Result<Vec<Expression>, Error>>()?;
        let chosen = self.decide_among(conditions)?;
        Ok(candidates[chosen])
    }

    pub fn select(&mut self, array: ArrayRef, index: &Value) -> Result<Value, Signal> {
        self.check_not_null(array)?;
        let sort = primitive(self.object(array)?.element())?;
        match self.resolve(array, index)? {
            Index::Concrete(index) => self.read_cell(array, index, sort),
            Index::Symbolic(index) => match self.object(array)?.content() {
                Content::Term(term) => Ok(Value::symbolic(Expression::select(term.clone(), index)?)),
                Content::Cells(_) => {
                    Err(Error::invariant("symbolic index into an array held as cells").into())
                }
            },
        }
    }

    fn read_cell(&mut self, array: ArrayRef, index: i64, sort: Sort) -> Result<Value, Signal> {
        let object = self.object_mut(array)?;
        object.note_use(index);
        let free = object.is_free();
        match object.content() {
            Content::Term(ArrayTerm::Constant { element }) => return Ok(Value::Concrete(*element)),
            Content::Term(term) => {
                return Ok(Value::symbolic(Expression::select(term.clone(), int(index)?)?))
            }
            Content::Cells(_) => {}
        }
        match object.cell(index) {
            Some(Element::Value(value)) => return Ok(value.clone()),
            Some(Element::Array(_)) => {
                return Err(Error::invariant("array reference in a primitive array").into())
            }
            None => {}
        }

        let value = if free {
            self.fresh(sort)?
        } else {
            Value::Concrete(sort.default_value())
        };
        self.object_mut(array)?
            .set_cell(index, Element::Value(value.clone()))?;
        Ok(value)
    }

    pub fn store(&mut self, array: ArrayRef, index: &Value, value: &Value) -> Result<(), Signal> {
        self.check_not_null(array)?;
        let sort = primitive(self.object(array)?.element())?;
        if value.sort() != sort {
            return Err(Error::Sort(format!(
                "store of a {} into an array of {}",
                value.sort(),
                sort
            ))
            .into());
        }

        let index = match self.resolve(array, index)? {
            Index::Concrete(index) => {
                self.object_mut(array)?.note_use(index);
                int(index)?
            }
            Index::Symbolic(index) => index,
        };
        let object = self.object_mut(array)?;
        let term = match object.content() {
            Content::Term(term) => Some(term.clone()),
            Content::Cells(_) => None,
        };
        match term {
            Some(term) => object.set_term(ArrayTerm::store(term, index, value.to_expression())?),
            None => {
                let index = index
                    .as_constant()
                    .and_then(Constant::as_i64)
                    .ok_or_else(|| Error::invariant("symbolic index into an array held as cells"))?;
                object.set_cell(index, Element::Value(value.clone()))?;
            }
        }
        Ok(())
    }

    pub fn select_ref(&mut self, array: ArrayRef, index: &Value) -> Result<ArrayRef, Signal> {
        self.check_not_null(array)?;
        let inner = inner(self.object(array)?.element())?;
        let index = match self.resolve(array, index)? {
            Index::Concrete(index) => index,
            Index::Symbolic(index) => self.choose_index(array, &index)?,
        };

        let object = self.object_mut(array)?;
        object.note_use(index);
        let free = object.is_free();
        match object.cell(index) {
            Some(Element::Array(reference)) => return Ok(*reference),
            Some(Element::Value(_)) => {
                return Err(Error::invariant("primitive value in an array of arrays").into())
            }
            None => {}
        }

        let reference = if free {
            self.free_array(inner)?
        } else {
            self.null_array(inner)
        };
        self.object_mut(array)?
            .set_cell(index, Element::Array(reference))?;
        Ok(reference)
    }

    pub fn store_ref(
        &mut self,
        array: ArrayRef,
        index: &Value,
        value: ArrayRef,
    ) -> Result<(), Signal> {
        self.check_not_null(array)?;
        let inner = inner(self.object(array)?.element())?;
        if *self.object(value)?.element() != inner {
            return Err(Error::Sort("stored array has the wrong element sort".into()).into());
        }
        let index = match self.resolve(array, index)? {
            Index::Concrete(index) => index,
            Index::Symbolic(index) => self.choose_index(array, &index)?,
        };
        self.object_mut(array)?
            .set_cell(index, Element::Array(value))?;
        Ok(())
    }
}
