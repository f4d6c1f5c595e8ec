//! Rendezvous core shared by every rank of a group.
//!
//! A collective is one *round*: each rank deposits a [`Contribution`] into its
//! own slot and blocks until all `size` slots are filled. The full set is then
//! published, indexed by rank, and every rank reads it before the next round
//! may begin. Arrival order never affects slot order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::datatype::DatatypeTag;
use crate::error::{Error, Result};
use crate::ReduceOp;

/// Which collective a rank entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectiveKind {
    Barrier,
    Broadcast,
    Scatter,
    Gather,
    Allgather,
    Reduce,
    Allreduce,
}

/// Everything peers must agree on for a round to be valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Signature {
    pub kind: CollectiveKind,
    pub root: Option<usize>,
    pub tag: DatatypeTag,
    pub op: Option<ReduceOp>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}<{:?}>", self.kind, self.tag)?;
        if let Some(root) = self.root {
            write!(f, " root={root}")?;
        }
        if let Some(op) = self.op {
            write!(f, " op={op:?}")?;
        }
        Ok(())
    }
}

/// One rank's deposit for a round.
#[derive(Debug)]
pub(crate) struct Contribution {
    pub signature: Signature,
    pub payload: Box<dyn Any + Send + Sync>,
}

struct State {
    round: u64,
    arrived: usize,
    slots: Vec<Option<Contribution>>,
    published: Option<Arc<Vec<Contribution>>>,
    pending_reads: usize,
    aborted: Option<i32>,
}

/// Shared rendezvous state for a group of `size` ranks.
pub(crate) struct Exchange {
    size: usize,
    state: Mutex<State>,
    cond: Condvar,
}

impl Exchange {
    pub(crate) fn new(size: usize) -> Self {
        Exchange {
            size,
            state: Mutex::new(State {
                round: 0,
                arrived: 0,
                slots: (0..size).map(|_| None).collect(),
                published: None,
                pending_reads: 0,
                aborted: None,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Deposit `contribution` for `rank` and block until every rank has
    /// deposited. Returns all contributions ordered by rank.
    pub(crate) fn exchange(
        &self,
        rank: usize,
        contribution: Contribution,
    ) -> Result<Arc<Vec<Contribution>>> {
        let mut state = self.state.lock();

        // The previous round must be fully read before slots are reused.
        while state.published.is_some() {
            if let Some(code) = state.aborted {
                return Err(Error::Aborted { code });
            }
            self.cond.wait(&mut state);
        }
        if let Some(code) = state.aborted {
            return Err(Error::Aborted { code });
        }

        let round = state.round;
        state.slots[rank] = Some(contribution);
        state.arrived += 1;

        let published = if state.arrived == self.size {
            let all: Vec<Contribution> = state.slots.iter_mut().filter_map(Option::take).collect();
            debug_assert_eq!(all.len(), self.size);
            let published = Arc::new(all);
            state.published = Some(Arc::clone(&published));
            state.pending_reads = self.size;
            state.arrived = 0;
            debug!(round, size = self.size, "collective round complete");
            self.cond.notify_all();
            published
        } else {
            loop {
                if state.round == round {
                    if let Some(published) = &state.published {
                        break Arc::clone(published);
                    }
                }
                if let Some(code) = state.aborted {
                    return Err(Error::Aborted { code });
                }
                self.cond.wait(&mut state);
            }
        };

        state.pending_reads -= 1;
        if state.pending_reads == 0 {
            state.published = None;
            state.round += 1;
            self.cond.notify_all();
        }
        Ok(published)
    }

    /// Abort the group. The first code wins; blocked and future rounds fail.
    pub(crate) fn abort(&self, code: i32) {
        let mut state = self.state.lock();
        if state.aborted.is_none() {
            warn!(code, round = state.round, "process group aborted");
            state.aborted = Some(code);
        }
        self.cond.notify_all();
    }

    pub(crate) fn abort_code(&self) -> Option<i32> {
        self.state.lock().aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn contribution(value: usize) -> Contribution {
        Contribution {
            signature: Signature {
                kind: CollectiveKind::Gather,
                root: Some(0),
                tag: DatatypeTag::U64,
                op: None,
            },
            payload: Box::new(value as u64),
        }
    }

    #[test]
    fn single_rank_round_returns_immediately() {
        let ex = Exchange::new(1);
        let all = ex.exchange(0, contribution(7)).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload.downcast_ref::<u64>(), Some(&7));
    }

    #[test]
    fn slots_are_ordered_by_rank_over_many_rounds() {
        let ex = Exchange::new(4);
        thread::scope(|s| {
            for rank in (0..4).rev() {
                let ex = &ex;
                s.spawn(move || {
                    for round in 0..50 {
                        let all = ex.exchange(rank, contribution(rank * 100 + round)).unwrap();
                        let seen: Vec<u64> = all
                            .iter()
                            .map(|c| *c.payload.downcast_ref::<u64>().unwrap())
                            .collect();
                        let expected: Vec<u64> =
                            (0..4).map(|r| (r * 100 + round) as u64).collect();
                        assert_eq!(seen, expected);
                    }
                });
            }
        });
    }

    #[test]
    fn every_rank_reads_the_same_published_set() {
        let ex = Exchange::new(3);
        let sets: Vec<Arc<Vec<Contribution>>> = thread::scope(|s| {
            let handles: Vec<_> = (0..3)
                .map(|rank| {
                    let ex = &ex;
                    s.spawn(move || ex.exchange(rank, contribution(rank)).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(Arc::ptr_eq(&sets[0], &sets[1]));
        assert!(Arc::ptr_eq(&sets[0], &sets[2]));
        assert_eq!(Arc::strong_count(&sets[0]), 3);
    }

    #[test]
    fn abort_releases_waiting_ranks() {
        let ex = Exchange::new(2);
        thread::scope(|s| {
            let waiter = s.spawn(|| ex.exchange(0, contribution(0)));
            // Rank 1 never arrives; abort instead.
            thread::sleep(std::time::Duration::from_millis(20));
            ex.abort(5);
            let err = waiter.join().unwrap().unwrap_err();
            assert!(matches!(err, Error::Aborted { code: 5 }));
        });
        assert_eq!(ex.abort_code(), Some(5));
        assert!(ex.exchange(1, contribution(1)).is_err());
    }

    #[test]
    fn signature_display() {
        let sig = Signature {
            kind: CollectiveKind::Reduce,
            root: Some(0),
            tag: DatatypeTag::I32,
            op: Some(ReduceOp::Min),
        };
        assert_eq!(sig.to_string(), "Reduce<I32> root=0 op=Min");
    }
}
