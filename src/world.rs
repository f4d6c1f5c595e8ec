//! Process-group bootstrap.
//!
//! A [`World`] stands in for the launcher of an MPI job: it starts one worker
//! per rank, each on its own named scoped thread, and tears the group down
//! when every worker has returned.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::exchange::Exchange;

/// Abort code used when a worker panics.
const PANIC_ABORT_CODE: i32 = 134;

/// A fixed-size process group.
///
/// # Example
///
/// ```
/// use gridband::World;
///
/// let world = World::new(3).unwrap();
/// let ranks = world.run(|comm| Ok(comm.rank())).unwrap();
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct World {
    size: usize,
}

impl World {
    /// Create a group description of `size` workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCount`] for an empty group.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidCount(0));
        }
        Ok(World { size })
    }

    /// Number of workers in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` once per rank, each on its own thread, and return every
    /// worker's result in rank order.
    ///
    /// If a worker returns an error or panics, the group is aborted so that
    /// peers blocked in a collective return [`Error::Aborted`] instead of
    /// waiting forever.
    pub fn launch<F, R>(&self, f: F) -> Vec<Result<R>>
    where
        F: Fn(Communicator) -> Result<R> + Sync,
        R: Send,
    {
        let exchange = Arc::new(Exchange::new(self.size));
        info!(size = self.size, "launching process group");

        let results = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.size);
            for rank in 0..self.size {
                let comm = Communicator::new(rank, Arc::clone(&exchange));
                let exchange = &exchange;
                let f = &f;
                let spawned = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        let _guard = AbortOnPanic(exchange);
                        let result = f(comm);
                        if let Err(err) = &result {
                            debug!(rank, error = %err, "worker failed");
                            exchange.abort(err.exit_code());
                        }
                        result
                    });
                match spawned {
                    Ok(handle) => handles.push(Ok(handle)),
                    Err(err) => {
                        exchange.abort(1);
                        handles.push(Err(Error::Io(err)));
                    }
                }
            }

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle.join().unwrap_or(Err(Error::WorkerPanicked(rank))),
                    Err(err) => Err(err),
                })
                .collect::<Vec<_>>()
        });

        match exchange.abort_code() {
            Some(code) => info!(size = self.size, code, "process group finished after abort"),
            None => info!(size = self.size, "process group finished"),
        }
        results
    }

    /// Run `f` once per rank and collect the results.
    ///
    /// # Errors
    ///
    /// Returns the first error that caused the group to fail; errors that are
    /// only a consequence of the abort are reported only when no root cause
    /// exists.
    pub fn run<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(Communicator) -> Result<R> + Sync,
        R: Send,
    {
        let results = self.launch(f);
        if results.iter().all(Result::is_ok) {
            return Ok(results.into_iter().flatten().collect());
        }

        let mut first_abort = None;
        for result in results {
            match result {
                Err(err) if err.is_abort() => {
                    first_abort.get_or_insert(err);
                }
                Err(err) => return Err(err),
                Ok(_) => {}
            }
        }
        Err(first_abort.unwrap_or(Error::Aborted { code: 1 }))
    }
}

struct AbortOnPanic<'a>(&'a Exchange);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort(PANIC_ABORT_CODE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_world_is_rejected() {
        assert!(matches!(World::new(0), Err(Error::InvalidCount(0))));
    }

    #[test]
    fn results_come_back_in_rank_order() {
        let world = World::new(8).unwrap();
        let out = world.run(|comm| Ok(comm.rank() * 2)).unwrap();
        assert_eq!(out, (0..8).map(|r| r * 2).collect::<Vec<_>>());
    }

    #[test]
    fn worker_error_aborts_blocked_peers() {
        let world = World::new(4).unwrap();
        let results = world.launch(|comm| {
            if comm.rank() == 3 {
                return Err(Error::InvalidGrid("boom".into()));
            }
            comm.barrier()
        });
        assert!(matches!(results[3], Err(Error::InvalidGrid(_))));
        for result in &results[..3] {
            assert!(matches!(result, Err(Error::Aborted { code: 1 })));
        }
    }

    #[test]
    fn run_reports_root_cause_over_abort() {
        let world = World::new(3).unwrap();
        let err = world
            .run(|comm| {
                if comm.rank() == 2 {
                    return Err(Error::InvalidCount(42));
                }
                comm.barrier()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCount(42)));
    }

    #[test]
    fn explicit_abort_code_propagates() {
        let world = World::new(3).unwrap();
        let err = world
            .run(|comm| {
                if comm.is_root() {
                    comm.abort(7);
                }
                comm.barrier()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Aborted { code: 7 }));
    }

    #[test]
    fn panicking_worker_releases_group() {
        let world = World::new(2).unwrap();
        let results = world.launch(|comm| {
            if comm.rank() == 1 {
                panic!("worker failure");
            }
            comm.barrier()
        });
        assert!(matches!(
            results[0],
            Err(Error::Aborted {
                code: PANIC_ABORT_CODE
            })
        ));
        assert!(matches!(results[1], Err(Error::WorkerPanicked(1))));
    }
}
