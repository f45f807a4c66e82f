use crate::config::Config;
use crate::executor::{Diagnostics, Executor, Shared};
use crate::manager::{panic_message, ExecutorManager};
use crate::outcome::Outcome;
use crate::region::SearchRegion;
use crate::solver::SolverFactory;
use crate::Error;
use log::{info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Runs one executor on the calling thread.
#[derive(Debug)]
pub struct SingleThreadedManager {
    executor: Executor,
    finished: bool,
}

impl SingleThreadedManager {
    pub fn new(
        config: Config,
        region: Arc<dyn SearchRegion>,
        solver_factory: Arc<dyn SolverFactory>,
    ) -> Result<SingleThreadedManager, Error> {
        let strategy = config.strategy();
        let shared = Arc::new(Shared::new(config, region));
        let executor = Executor::new(0, shared, solver_factory.create()?, strategy)?;
        info!("single-threaded exploration with {:?}", strategy);
        Ok(SingleThreadedManager {
            executor,
            finished: false,
        })
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}

impl ExecutorManager for SingleThreadedManager {
    fn next_outcome(&mut self) -> Result<Option<Outcome>, Error> {
        if self.finished {
            return Ok(None);
        }
        let executor = &mut self.executor;
        let result = panic::catch_unwind(AssertUnwindSafe(|| executor.run_for_next_outcome()))
            .unwrap_or_else(|payload| {
                Err(Error::WorkerPanicked(format!(
                    "executor 0: {}",
                    panic_message(&*payload)
                )))
            });
        match result {
            Ok(Some(outcome)) => Ok(Some(outcome)),
            Ok(None) => {
                info!("exploration finished");
                self.finished = true;
                Ok(None)
            }
            Err(error) => {
                warn!("executor 0 failed: {}", error);
                self.finished = true;
                self.executor.shared().terminate();
                Err(error)
            }
        }
    }

    fn diagnostics(&self) -> Diagnostics {
        self.executor.diagnostics().clone()
    }
}
