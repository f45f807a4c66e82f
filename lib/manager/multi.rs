//! Exploration with several executors, each on its own thread.
//!
//! The calling thread drives executor 0. Whenever an executor opens a choice
//! and the frontier holds more options than the activation threshold, an
//! idle worker is woken, or a new one is started while there are threads to
//! spare. Workers which run out of work park themselves until they are woken
//! again or stopped.

use crate::config::{Config, SearchStrategy};
use crate::executor::{merge_diagnostics, Diagnostics, Executor, Listener, Shared};
use crate::manager::{panic_message, ExecutorManager};
use crate::outcome::Outcome;
use crate::region::SearchRegion;
use crate::solver::SolverFactory;
use crate::Error;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

enum Wake {
    Resume,
    Stop,
}

struct Worker {
    wake: Sender<Wake>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct PoolState {
    // strategies for the executors not yet started
    pending: VecDeque<SearchStrategy>,
    workers: Vec<Worker>,
    // indices into `workers`
    idle: Vec<usize>,
    busy: usize,
    errors: Vec<Error>,
    diagnostics: Diagnostics,
}

struct WorkerPool {
    shared: Arc<Shared>,
    solver_factory: Arc<dyn SolverFactory>,
    capacity: usize,
    outcomes: Sender<Outcome>,
    finished: Sender<usize>,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    fn state(&self) -> Result<MutexGuard<PoolState>, Error> {
        self.state.lock().map_err(|_| Error::Poisoned("worker pool"))
    }

    fn listener(self: &Arc<Self>) -> Listener {
        let pool = Arc::downgrade(self);
        Arc::new(move || match pool.upgrade() {
            Some(pool) => pool.activate(),
            None => Ok(()),
        })
    }

    /// Put more executors to work while the frontier holds more options than
    /// the activation threshold.
    fn activate(self: &Arc<Self>) -> Result<(), Error> {
        if self.shared.is_terminated() {
            return Ok(());
        }
        let mut state = self.state()?;
        let waiting = self.shared.frontier()?.len();
        let mut surplus = waiting.saturating_sub(self.shared.config().activation_threshold());
        while surplus > 0 {
            if let Some(index) = state.idle.pop() {
                state.busy += 1;
                if state.workers[index].wake.send(Wake::Resume).is_err() {
                    state.busy -= 1;
                    continue;
                }
                debug!("woke executor {}", index + 1);
            } else if state.workers.len() < self.capacity {
                self.spawn(&mut state)?;
            } else {
                break;
            }
            surplus -= 1;
        }
        Ok(())
    }

    fn spawn(self: &Arc<Self>, state: &mut PoolState) -> Result<(), Error> {
        let id = state.workers.len() + 1;
        let strategy = state
            .pending
            .pop_front()
            .unwrap_or_else(|| self.shared.config().strategy());
        let executor = Executor::new(
            id,
            self.shared.clone(),
            self.solver_factory.create()?,
            strategy,
        )?
        .with_listener(self.listener());

        let (wake, wakes) = unbounded();
        let pool = self.clone();
        let handle = thread::Builder::new()
            .name(format!("mulib-executor-{}", id))
            .spawn(move || pool.work(executor, wakes))?;
        state.workers.push(Worker {
            wake,
            handle: Some(handle),
        });
        state.busy += 1;
        info!("started executor {} with {:?}", id, strategy);
        Ok(())
    }

    /// The body of a worker thread.
    fn work(self: Arc<Self>, mut executor: Executor, wakes: Receiver<Wake>) {
        let id = executor.id();
        loop {
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.explore(&mut executor)));
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error),
                Err(payload) => Some(Error::WorkerPanicked(format!(
                    "executor {}: {}",
                    id,
                    panic_message(&*payload)
                ))),
            };
            let failed = failure.is_some();
            if let Some(error) = &failure {
                warn!("executor {} failed: {}", id, error);
                self.shared.terminate();
            }
            if self
                .park(id, executor.take_diagnostics(), failure)
                .is_err()
                || failed
            {
                break;
            }
            match wakes.recv() {
                Ok(Wake::Resume) => continue,
                Ok(Wake::Stop) | Err(_) => break,
            }
        }
        debug!("executor {} stopped", id);
        let _ = self.finished.send(id);
    }

    fn explore(&self, executor: &mut Executor) -> Result<(), Error> {
        while let Some(outcome) = executor.run_for_next_outcome()? {
            if self.outcomes.send(outcome).is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Mark worker `id` as no longer busy. A worker which failed is not
    /// available for waking.
    fn park(&self, id: usize, diagnostics: Diagnostics, failure: Option<Error>) -> Result<(), Error> {
        let mut state = self.state()?;
        state.busy = state.busy.saturating_sub(1);
        merge_diagnostics(&mut state.diagnostics, &diagnostics);
        match failure {
            Some(error) => state.errors.push(error),
            None => state.idle.push(id - 1),
        }
        Ok(())
    }

    /// True when no worker is busy, and there is nothing left to explore.
    fn is_quiescent(&self) -> Result<bool, Error> {
        let state = self.state()?;
        Ok(state.busy == 0 && self.shared.frontier()?.is_empty())
    }

    fn take_error(&self) -> Result<Option<Error>, Error> {
        let mut state = self.state()?;
        if state.errors.is_empty() {
            Ok(None)
        } else {
            Ok(Some(state.errors.remove(0)))
        }
    }
}

pub struct MultiThreadedManager {
    shared: Arc<Shared>,
    main: Executor,
    pool: Arc<WorkerPool>,
    outcomes: Receiver<Outcome>,
    finished: Receiver<usize>,
    buffered: VecDeque<Outcome>,
    done: bool,
}

impl MultiThreadedManager {
    pub fn new(
        config: Config,
        region: Arc<dyn SearchRegion>,
        solver_factory: Arc<dyn SolverFactory>,
    ) -> Result<MultiThreadedManager, Error> {
        let strategy = config.strategy();
        let pending = config.strategies().iter().skip(1).copied().collect();
        let capacity = config.threads().saturating_sub(1);
        let shared = Arc::new(Shared::new(config, region));

        let (outcome_sender, outcomes) = unbounded();
        let (finished_sender, finished) = unbounded();
        let pool = Arc::new(WorkerPool {
            shared: shared.clone(),
            solver_factory: solver_factory.clone(),
            capacity,
            outcomes: outcome_sender,
            finished: finished_sender,
            state: Mutex::new(PoolState {
                pending,
                ..PoolState::default()
            }),
        });
        let main = Executor::new(0, shared.clone(), solver_factory.create()?, strategy)?
            .with_listener(pool.listener());
        info!(
            "multi-threaded exploration with up to {} executors",
            capacity + 1
        );

        Ok(MultiThreadedManager {
            shared,
            main,
            pool,
            outcomes,
            finished,
            buffered: VecDeque::new(),
            done: false,
        })
    }

    /// Stop every worker and wait for them, up to the shutdown timeout.
    fn shutdown(&mut self) -> Result<(), Error> {
        self.shared.terminate();
        let handles = {
            let mut state = self.pool.state()?;
            for worker in &state.workers {
                let _ = worker.wake.send(Wake::Stop);
            }
            state
                .workers
                .iter_mut()
                .filter_map(|worker| worker.handle.take())
                .collect::<Vec<JoinHandle<()>>>()
        };

        let timeout = self.shared.config().shutdown_timeout();
        let deadline = Instant::now() + timeout;
        for _ in 0..handles.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self.finished.recv_timeout(remaining).is_err() {
                warn!("executors still running after {:?}", timeout);
                return Err(Error::ShutdownTimeout(timeout));
            }
        }
        for handle in handles {
            if handle.join().is_err() {
                return Err(Error::WorkerPanicked("executor thread".into()));
            }
        }
        info!("all executors stopped");
        Ok(())
    }

    /// Stop everything after `error`. A failure recorded by a worker is
    /// reported in preference to the error it caused here.
    fn fail(&mut self, error: Error) -> Error {
        self.done = true;
        if let Err(shutdown) = self.shutdown() {
            warn!("shutdown after failure: {}", shutdown);
        }
        match self.pool.take_error() {
            Ok(Some(worker)) => worker,
            _ => error,
        }
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.done = true;
        self.shutdown()?;
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.buffered.push_back(outcome);
        }
        if let Some(error) = self.pool.take_error()? {
            return Err(error);
        }
        info!("exploration finished");
        Ok(())
    }
}

impl ExecutorManager for MultiThreadedManager {
    fn next_outcome(&mut self) -> Result<Option<Outcome>, Error> {
        loop {
            if let Some(outcome) = self.buffered.pop_front() {
                return Ok(Some(outcome));
            }
            if self.done {
                return Ok(None);
            }
            if let Some(error) = self.pool.take_error()? {
                return Err(self.fail(error));
            }
            if let Ok(outcome) = self.outcomes.try_recv() {
                return Ok(Some(outcome));
            }

            // Busy workers are not waited for past the shutdown timeout once
            // the run is over.
            if self.shared.is_terminated() {
                self.finish()?;
                continue;
            }

            let main = &mut self.main;
            match panic::catch_unwind(AssertUnwindSafe(|| main.run_for_next_outcome())) {
                Ok(Ok(Some(outcome))) => return Ok(Some(outcome)),
                Ok(Ok(None)) => {}
                Ok(Err(error)) => return Err(self.fail(error)),
                Err(payload) => {
                    let error = Error::WorkerPanicked(format!(
                        "executor 0: {}",
                        panic_message(&*payload)
                    ));
                    return Err(self.fail(error));
                }
            }

            if self.pool.is_quiescent()? {
                self.finish()?;
                continue;
            }
            if let Ok(outcome) = self.outcomes.recv_timeout(POLL_INTERVAL) {
                return Ok(Some(outcome));
            }
        }
    }

    fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = self.main.diagnostics().clone();
        if let Ok(state) = self.pool.state() {
            merge_diagnostics(&mut diagnostics, &state.diagnostics);
        }
        diagnostics
    }
}

impl Drop for MultiThreadedManager {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            if let Err(error) = self.shutdown() {
                warn!("shutdown on drop: {}", error);
            }
        }
    }
}
