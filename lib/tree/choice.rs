//! The append-only tree of choice points.
//!
//! Options and choices live in two arenas and refer to one another by index.
//! Nothing is ever removed from the tree; exploring a path only ever adds a
//! `Choice` below a leaf option, or sets a leaf's terminal state.

use crate::expr::Expression;
use crate::outcome::Outcome;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A handle to a `ChoiceOption` in a `SearchTree`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct OptionId(usize);

/// A handle to a `Choice` in a `SearchTree`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ChoiceId(usize);

impl OptionId {
    #[cfg(test)]
    pub(crate) fn new(index: usize) -> OptionId {
        OptionId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl ChoiceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// A control-flow edge of the explored program, used to steer exploration
/// toward uncovered branches.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CoverageEdge {
    pub site: usize,
    pub branch: usize,
}

impl CoverageEdge {
    pub fn new(site: usize, branch: usize) -> CoverageEdge {
        CoverageEdge { site, branch }
    }
}

/// One alternative of a choice about to be created.
#[derive(Clone, Debug, Default)]
pub struct Alternative {
    pub condition: Option<Expression>,
    pub edge: Option<CoverageEdge>,
}

impl Alternative {
    pub fn new(condition: Option<Expression>, edge: Option<CoverageEdge>) -> Alternative {
        Alternative { condition, edge }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionState {
    Unevaluated,
    /// The path constraint of this option was found unsatisfiable.
    Unsatisfiable,
    Terminal(Outcome),
}

impl OptionState {
    pub fn is_unevaluated(&self) -> bool {
        matches!(self, OptionState::Unevaluated)
    }
}

#[derive(Clone, Debug)]
struct ChoiceOption {
    choice: Option<ChoiceId>,
    index: usize,
    depth: usize,
    constraints: Vec<Expression>,
    edge: Option<CoverageEdge>,
    child: Option<ChoiceId>,
    state: OptionState,
}

impl ChoiceOption {
    fn is_sealed(&self) -> bool {
        self.child.is_some() || !self.state.is_unevaluated()
    }
}

#[derive(Clone, Debug)]
struct Choice {
    parent: OptionId,
    depth: usize,
    options: Vec<OptionId>,
}

/// The tree of every decision made while exploring.
#[derive(Clone, Debug)]
pub struct SearchTree {
    options: Vec<ChoiceOption>,
    choices: Vec<Choice>,
}

impl Default for SearchTree {
    fn default() -> SearchTree {
        SearchTree::new()
    }
}

impl SearchTree {
    /// Create a tree holding only the root option.
    pub fn new() -> SearchTree {
        SearchTree {
            options: vec![ChoiceOption {
                choice: None,
                index: 0,
                depth: 0,
                constraints: Vec::new(),
                edge: None,
                child: None,
                state: OptionState::Unevaluated,
            }],
            choices: Vec::new(),
        }
    }

    pub fn root(&self) -> OptionId {
        OptionId(0)
    }

    pub fn num_options(&self) -> usize {
        self.options.len()
    }

    pub fn num_choices(&self) -> usize {
        self.choices.len()
    }

    fn option(&self, option: OptionId) -> Result<&ChoiceOption, Error> {
        self.options
            .get(option.0)
            .ok_or(Error::UnknownOption(option.0))
    }

    fn option_mut(&mut self, option: OptionId) -> Result<&mut ChoiceOption, Error> {
        self.options
            .get_mut(option.0)
            .ok_or(Error::UnknownOption(option.0))
    }

    fn choice(&self, choice: ChoiceId) -> Result<&Choice, Error> {
        self.choices
            .get(choice.0)
            .ok_or(Error::UnknownChoice(choice.0))
    }

    /// Create a `Choice` below `parent`, with one option per alternative.
    ///
    /// This seals the constraint of `parent`.
    /// # Error
    /// `parent` already has a child choice, or a state other than
    /// `Unevaluated`.
    pub fn add_choice(
        &mut self,
        parent: OptionId,
        alternatives: Vec<Alternative>,
    ) -> Result<ChoiceId, Error> {
        let depth = {
            let parent_option = self.option(parent)?;
            if parent_option.is_sealed() {
                return Err(Error::invariant(format!(
                    "option {} is sealed and cannot receive a choice",
                    parent
                )));
            }
            parent_option.depth + 1
        };

        let choice_id = ChoiceId(self.choices.len());
        let mut options = Vec::with_capacity(alternatives.len());
        for (index, alternative) in alternatives.into_iter().enumerate() {
            let option_id = OptionId(self.options.len());
            self.options.push(ChoiceOption {
                choice: Some(choice_id),
                index,
                depth,
                constraints: alternative.condition.into_iter().collect(),
                edge: alternative.edge,
                child: None,
                state: OptionState::Unevaluated,
            });
            options.push(option_id);
        }

        self.choices.push(Choice {
            parent,
            depth,
            options,
        });
        self.option_mut(parent)?.child = Some(choice_id);

        Ok(choice_id)
    }

    /// Append `constraint` to the path constraint of `option`.
    pub fn append_constraint(
        &mut self,
        option: OptionId,
        constraint: Expression,
    ) -> Result<(), Error> {
        let option_ = self.option_mut(option)?;
        if option_.is_sealed() {
            return Err(Error::invariant(format!(
                "constraint added to sealed option {}",
                option
            )));
        }
        option_.constraints.push(constraint);
        Ok(())
    }

    /// Set the state of `option`. A state may only be set once, and only on a
    /// leaf.
    pub fn set_state(&mut self, option: OptionId, state: OptionState) -> Result<(), Error> {
        let option_ = self.option_mut(option)?;
        if option_.is_sealed() {
            return Err(Error::invariant(format!(
                "state of option {} set twice",
                option
            )));
        }
        option_.state = state;
        Ok(())
    }

    pub fn state(&self, option: OptionId) -> Result<&OptionState, Error> {
        Ok(&self.option(option)?.state)
    }

    pub fn constraints(&self, option: OptionId) -> Result<&[Expression], Error> {
        Ok(&self.option(option)?.constraints)
    }

    pub fn depth(&self, option: OptionId) -> Result<usize, Error> {
        Ok(self.option(option)?.depth)
    }

    /// The position of `option` within its choice.
    pub fn index(&self, option: OptionId) -> Result<usize, Error> {
        Ok(self.option(option)?.index)
    }

    pub fn edge(&self, option: OptionId) -> Result<Option<CoverageEdge>, Error> {
        Ok(self.option(option)?.edge)
    }

    pub fn child(&self, option: OptionId) -> Result<Option<ChoiceId>, Error> {
        Ok(self.option(option)?.child)
    }

    /// The choice `option` belongs to, or `None` for the root.
    pub fn choice_of(&self, option: OptionId) -> Result<Option<ChoiceId>, Error> {
        Ok(self.option(option)?.choice)
    }

    pub fn options_of(&self, choice: ChoiceId) -> Result<&[OptionId], Error> {
        Ok(&self.choice(choice)?.options)
    }

    pub fn parent_option(&self, choice: ChoiceId) -> Result<OptionId, Error> {
        Ok(self.choice(choice)?.parent)
    }

    pub fn choice_depth(&self, choice: ChoiceId) -> Result<usize, Error> {
        Ok(self.choice(choice)?.depth)
    }

    /// The options from the root down to and including `option`.
    pub fn path_to(&self, option: OptionId) -> Result<Vec<OptionId>, Error> {
        let mut path = vec![option];
        let mut current = option;
        while let Some(choice) = self.option(current)?.choice {
            current = self.choice(choice)?.parent;
            path.push(current);
        }
        path.reverse();
        Ok(path)
    }

    /// The siblings of every ancestor of `option`, nearest first, each group
    /// in declaration order. `option` itself and its ancestors are excluded.
    pub fn ancestor_siblings(&self, option: OptionId) -> Result<Vec<Vec<OptionId>>, Error> {
        let mut groups = Vec::new();
        let mut current = option;
        while let Some(choice) = self.option(current)?.choice {
            let siblings = self
                .choice(choice)?
                .options
                .iter()
                .filter(|sibling| **sibling != current)
                .copied()
                .collect::<Vec<OptionId>>();
            groups.push(siblings);
            current = self.choice(choice)?.parent;
        }
        Ok(groups)
    }
}
