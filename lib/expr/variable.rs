use crate::expr::Sort;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A free symbolic variable of a primitive sort.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Variable {
    name: String,
    sort: Sort,
}

impl Variable {
    pub fn new<S: Into<String>>(name: S, sort: Sort) -> Variable {
        Variable {
            name: name.into(),
            sort,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.sort)
    }
}
