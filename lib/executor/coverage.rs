//! Steer exploration toward branches no path has taken yet.

use crate::executor::Shared;
use crate::tree::OptionId;
use crate::Error;

/// Mark the edge of `option` covered. Returns true if it was not covered
/// before.
pub(crate) fn cover(shared: &Shared, option: OptionId) -> Result<bool, Error> {
    let edge = shared.tree()?.edge(option)?;
    match edge {
        Some(edge) => Ok(shared.covered()?.insert(edge)),
        None => Ok(false),
    }
}

/// Try up to `limit` ancestor siblings of `position` whose edge has not been
/// covered, nearest first, and claim the first one still on the frontier.
pub(crate) fn probe_uncovered(
    shared: &Shared,
    position: OptionId,
    limit: usize,
) -> Result<Option<OptionId>, Error> {
    if limit == 0 {
        return Ok(None);
    }

    let candidates = {
        let tree = shared.tree()?;
        let covered = shared.covered()?;
        let mut candidates = Vec::new();
        for option in tree.ancestor_siblings(position)?.into_iter().flatten() {
            if candidates.len() >= limit {
                break;
            }
            if let Some(edge) = tree.edge(option)? {
                if !covered.contains(&edge) {
                    candidates.push(option);
                }
            }
        }
        candidates
    };

    let mut frontier = shared.frontier()?;
    Ok(candidates.into_iter().find(|option| frontier.request(*option)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::region::{region, Output};
    use crate::tree::{Alternative, CoverageEdge};
    use std::sync::Arc;

    #[test]
    fn uncovered_siblings_first() {
        let shared = Shared::new(Config::default(), Arc::new(region(|_| Ok(Output::Unit))));
        let options = {
            let mut tree = shared.tree().unwrap();
            let root = tree.root();
            let alternatives = (0..3)
                .map(|branch| Alternative::new(None, Some(CoverageEdge::new(7, branch))))
                .collect();
            let choice = tree.add_choice(root, alternatives).unwrap();
            tree.options_of(choice).unwrap().to_vec()
        };
        shared.frontier().unwrap().insert(1, options.iter().copied());

        assert!(cover(&shared, options[0]).unwrap());
        assert!(!cover(&shared, options[0]).unwrap());
        assert!(cover(&shared, options[1]).unwrap());

        assert_eq!(
            probe_uncovered(&shared, options[0], 4).unwrap(),
            Some(options[2])
        );
        assert_eq!(probe_uncovered(&shared, options[0], 4).unwrap(), None);
        assert_eq!(probe_uncovered(&shared, options[0], 0).unwrap(), None);
    }
}
