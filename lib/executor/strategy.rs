//! Search strategies decide which frontier option is explored next, and
//! whether a path keeps going when it reaches a new choice.

use crate::config::{Config, SearchStrategy};
use crate::executor::Shared;
use crate::tree::OptionId;
use crate::Error;
use log::debug;

pub trait Strategy: Send {
    /// Take the next option to explore off the frontier. `position` is the
    /// option the executor's solver is positioned at.
    fn select_next(&mut self, shared: &Shared, position: OptionId)
        -> Result<Option<OptionId>, Error>;

    /// Whether a path which just opened a choice at `depth` continues into
    /// it, instead of leaving every option of the choice on the frontier.
    fn continue_live(&mut self, shared: &Shared, depth: usize) -> Result<bool, Error>;
}

pub fn for_kind(kind: SearchStrategy, config: &Config) -> Box<dyn Strategy> {
    match kind {
        SearchStrategy::Dfs => Box::new(Dfs),
        SearchStrategy::Bfs => Box::new(Bfs),
        SearchStrategy::Iddfs => Box::new(Iddfs::new(config.iddfs_increment())),
        SearchStrategy::Dsas => Box::new(Dsas),
        SearchStrategy::Iddsas => Box::new(Iddsas::new(config.iddfs_increment())),
    }
}

/// Depth-first: always the newest option.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dfs;

impl Strategy for Dfs {
    fn select_next(&mut self, shared: &Shared, _: OptionId) -> Result<Option<OptionId>, Error> {
        Ok(shared.frontier()?.poll_last())
    }

    fn continue_live(&mut self, _: &Shared, _: usize) -> Result<bool, Error> {
        Ok(true)
    }
}

/// Breadth-first: always the oldest option, and every new choice ends the
/// path that opened it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bfs;

impl Strategy for Bfs {
    fn select_next(&mut self, shared: &Shared, _: OptionId) -> Result<Option<OptionId>, Error> {
        Ok(shared.frontier()?.poll_first())
    }

    fn continue_live(&mut self, _: &Shared, _: usize) -> Result<bool, Error> {
        Ok(false)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Iddfs {
    ceiling: usize,
    increment: usize,
}

impl Iddfs {
    pub fn new(increment: usize) -> Iddfs {
        Iddfs {
            ceiling: increment,
            increment,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

impl Strategy for Iddfs {
    fn select_next(&mut self, shared: &Shared, _: OptionId) -> Result<Option<OptionId>, Error> {
        let mut frontier = shared.frontier()?;
        loop {
            if let Some(option) = frontier.poll_first_within(self.ceiling) {
                return Ok(Some(option));
            }
            match frontier.min_max_depth() {
                Some((min, _)) => {
                    self.ceiling = (self.ceiling + self.increment).max(min);
                    debug!("iddfs ceiling widened to {}", self.ceiling);
                }
                None => return Ok(None),
            }
        }
    }

    fn continue_live(&mut self, _: &Shared, depth: usize) -> Result<bool, Error> {
        Ok(depth <= self.ceiling)
    }
}

/// Take the first frontier sibling of the nearest ancestor, considering only
/// ancestors whose choice is no deeper than `max_depth`.
fn ancestor_sibling(
    shared: &Shared,
    position: OptionId,
    max_depth: usize,
) -> Result<Option<OptionId>, Error> {
    let groups = {
        let tree = shared.tree()?;
        let mut groups = Vec::new();
        for group in tree.ancestor_siblings(position)? {
            let depth = match group.first() {
                Some(option) => tree.depth(*option)?,
                None => continue,
            };
            if depth <= max_depth {
                groups.push(group);
            }
        }
        groups
    };

    let mut frontier = shared.frontier()?;
    for option in groups.into_iter().flatten() {
        if frontier.request(option) {
            return Ok(Some(option));
        }
    }
    Ok(None)
}

/// Depth-first search over ancestor siblings: prefer the untried alternative
/// of the nearest decision above the last explored path.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dsas;

impl Strategy for Dsas {
    fn select_next(
        &mut self,
        shared: &Shared,
        position: OptionId,
    ) -> Result<Option<OptionId>, Error> {
        if let Some(option) = ancestor_sibling(shared, position, usize::MAX)? {
            return Ok(Some(option));
        }
        Ok(shared.frontier()?.poll_first())
    }

    fn continue_live(&mut self, _: &Shared, _: usize) -> Result<bool, Error> {
        Ok(true)
    }
}

/// `Dsas` below a ceiling shared by every executor.
#[derive(Clone, Copy, Debug)]
pub struct Iddsas {
    increment: usize,
}

impl Iddsas {
    pub fn new(increment: usize) -> Iddsas {
        Iddsas { increment }
    }
}

impl Strategy for Iddsas {
    fn select_next(
        &mut self,
        shared: &Shared,
        position: OptionId,
    ) -> Result<Option<OptionId>, Error> {
        loop {
            let observed = *shared.ceiling()?;
            if let Some(option) = ancestor_sibling(shared, position, observed)? {
                return Ok(Some(option));
            }
            if let Some(option) = shared.frontier()?.poll_first_within(observed) {
                return Ok(Some(option));
            }

            let mut ceiling = shared.ceiling()?;
            // another executor widened past what we saw
            if *ceiling != observed {
                continue;
            }
            let min = match shared.frontier()?.min_max_depth() {
                Some((min, _)) => min,
                None => return Ok(None),
            };
            *ceiling = (observed + self.increment).max(min);
            debug!("iddsas ceiling widened to {}", *ceiling);
        }
    }

    fn continue_live(&mut self, shared: &Shared, depth: usize) -> Result<bool, Error> {
        Ok(depth <= *shared.ceiling()?)
    }
}
