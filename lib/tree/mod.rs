//! The choice-point tree and the frontier of unexplored options.

mod choice;
mod frontier;

pub use self::choice::{
    Alternative, ChoiceId, CoverageEdge, OptionId, OptionState, SearchTree,
};
pub use self::frontier::Frontier;
