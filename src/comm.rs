//! Safe collective operations on a process group.

use std::sync::Arc;

use tracing::debug;

use crate::datatype::{Datatype, Record, Reducible};
use crate::error::{Error, Result};
use crate::exchange::{CollectiveKind, Contribution, Exchange, Signature};
use crate::ReduceOp;

/// A handle to one rank of a process group.
///
/// Every collective is a blocking rendezvous: a call returns only after every
/// rank of the group has issued the matching call. Gathered and reduced data
/// is always combined in rank order. Communicators are created by
/// [`World::launch`](crate::World::launch).
///
/// # Example
///
/// ```
/// use gridband::{ReduceOp, World};
///
/// let world = World::new(4).unwrap();
/// let sums = world
///     .run(|comm| comm.allreduce_scalar(comm.rank() as i32, ReduceOp::Sum))
///     .unwrap();
/// assert_eq!(sums, vec![6, 6, 6, 6]);
/// ```
#[derive(Clone)]
pub struct Communicator {
    rank: usize,
    exchange: Arc<Exchange>,
}

impl Communicator {
    pub(crate) fn new(rank: usize, exchange: Arc<Exchange>) -> Self {
        Communicator { rank, exchange }
    }

    /// Get the rank of the calling worker in this group.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Get the number of workers in this group.
    pub fn size(&self) -> usize {
        self.exchange.size()
    }

    /// Whether this rank is the coordinator (rank 0).
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Abort every member of the group.
    ///
    /// Peers blocked in a collective, and every later collective call,
    /// return [`Error::Aborted`] with `code`. The first abort code wins.
    pub fn abort(&self, code: i32) {
        self.exchange.abort(code);
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Barrier synchronization.
    ///
    /// No worker returns until all workers have entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.round::<u8>(CollectiveKind::Barrier, None, None, Vec::new())?;
        Ok(())
    }

    // ========================================================================
    // Blocking Collectives
    // ========================================================================

    /// Broadcast a slice from root to all workers.
    ///
    /// # Arguments
    ///
    /// * `data` - Buffer to broadcast (input at root, output at others)
    /// * `root` - Rank of the root worker
    pub fn broadcast<T: Datatype>(&self, data: &mut [T], root: usize) -> Result<()> {
        self.check_root(root)?;
        let payload = if self.rank == root {
            data.to_vec()
        } else {
            Vec::new()
        };
        let round = self.round(CollectiveKind::Broadcast, Some(root), None, payload)?;
        let src = round.part::<T>(root)?;
        check_len(data.len(), src.len())?;
        data.copy_from_slice(src);
        Ok(())
    }

    /// Scatter contiguous chunks of the root's buffer, one per worker.
    ///
    /// Root sends `recv.len() * size` elements; worker `i` receives the
    /// `i`-th chunk of `recv.len()` elements and copies nothing else. `send`
    /// is ignored on non-root workers.
    pub fn scatter<T: Datatype>(&self, send: &[T], recv: &mut [T], root: usize) -> Result<()> {
        self.check_root(root)?;
        let payload = if self.rank == root {
            check_len(recv.len() * self.size(), send.len())?;
            send.to_vec()
        } else {
            Vec::new()
        };
        let round = self.round(CollectiveKind::Scatter, Some(root), None, payload)?;
        let chunk = recv.len();
        let start = self.rank * chunk;
        let all = round.part::<T>(root)?;
        let src = all.get(start..start + chunk).ok_or(Error::InvalidBuffer {
            expected: chunk * self.size(),
            actual: all.len(),
        })?;
        recv.copy_from_slice(src);
        Ok(())
    }

    /// Gather equal-size slices from all workers to the root.
    ///
    /// `recv` is only significant at root, where it must hold
    /// `send.len() * size` elements. Chunk `i` of `recv` holds rank `i`'s data.
    pub fn gather<T: Datatype>(&self, send: &[T], recv: &mut [T], root: usize) -> Result<()> {
        self.check_root(root)?;
        if self.rank == root {
            check_len(send.len() * self.size(), recv.len())?;
        }
        let round = self.round(CollectiveKind::Gather, Some(root), None, send.to_vec())?;
        if self.rank == root {
            concat_into(&round, send.len(), recv)?;
        }
        Ok(())
    }

    /// Gather one value per worker to the root.
    ///
    /// Returns `Some` with the values in rank order at root, `None` elsewhere.
    pub fn gather_scalar<T: Datatype>(&self, value: T, root: usize) -> Result<Option<Vec<T>>> {
        self.check_root(root)?;
        let round = self.round(CollectiveKind::Gather, Some(root), None, vec![value])?;
        if self.rank != root {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(round.len());
        for peer in 0..round.len() {
            let part = round.part::<T>(peer)?;
            check_len(1, part.len())?;
            out.push(part[0]);
        }
        Ok(Some(out))
    }

    /// Gather one fixed-layout record per worker to the root.
    ///
    /// The record layout is committed first, so a malformed layout fails on
    /// every worker before any data moves.
    pub fn gather_records<R: Record>(&self, record: R, root: usize) -> Result<Option<Vec<R>>> {
        let layout = R::struct_type()?;
        debug!(
            rank = self.rank,
            record = layout.name(),
            bytes = layout.size(),
            "gathering records"
        );
        self.gather_scalar(record, root)
    }

    /// Gather equal-size slices from all workers to every worker.
    pub fn allgather<T: Datatype>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        check_len(send.len() * self.size(), recv.len())?;
        let round = self.round(CollectiveKind::Allgather, None, None, send.to_vec())?;
        concat_into(&round, send.len(), recv)
    }

    /// Reduce values element-wise to the root.
    ///
    /// # Arguments
    ///
    /// * `send` - Data to send from this worker
    /// * `recv` - Buffer for result (only significant at root)
    /// * `op` - Reduction operation
    /// * `root` - Rank of the root worker
    pub fn reduce<T: Reducible>(
        &self,
        send: &[T],
        recv: &mut [T],
        op: ReduceOp,
        root: usize,
    ) -> Result<()> {
        self.check_root(root)?;
        if self.rank == root {
            check_len(send.len(), recv.len())?;
        }
        let round = self.round(CollectiveKind::Reduce, Some(root), Some(op), send.to_vec())?;
        if self.rank == root {
            fold_into(&round, op, recv)?;
        }
        Ok(())
    }

    /// Reduce a single value to the root.
    ///
    /// Returns `Some(result)` at root, `None` elsewhere.
    pub fn reduce_scalar<T: Reducible>(
        &self,
        value: T,
        op: ReduceOp,
        root: usize,
    ) -> Result<Option<T>> {
        let mut recv = [value];
        self.reduce(&[value], &mut recv, op, root)?;
        Ok((self.rank == root).then_some(recv[0]))
    }

    /// All-reduce values element-wise (reduce and deliver the result to all).
    pub fn allreduce<T: Reducible>(&self, send: &[T], recv: &mut [T], op: ReduceOp) -> Result<()> {
        check_len(send.len(), recv.len())?;
        let round = self.round(CollectiveKind::Allreduce, None, Some(op), send.to_vec())?;
        fold_into(&round, op, recv)
    }

    /// All-reduce a single value.
    pub fn allreduce_scalar<T: Reducible>(&self, value: T, op: ReduceOp) -> Result<T> {
        let mut recv = [value];
        self.allreduce(&[value], &mut recv, op)?;
        Ok(recv[0])
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_root(&self, root: usize) -> Result<()> {
        if root >= self.size() {
            return Err(Error::InvalidRank {
                rank: root,
                size: self.size(),
            });
        }
        Ok(())
    }

    /// Run one round and check that every peer entered the same collective.
    ///
    /// Payloads stay in the shared published set; callers borrow only the
    /// slots they need through [`Round::part`].
    fn round<T: Datatype>(
        &self,
        kind: CollectiveKind,
        root: Option<usize>,
        op: Option<ReduceOp>,
        payload: Vec<T>,
    ) -> Result<Round> {
        let signature = Signature {
            kind,
            root,
            tag: T::TAG,
            op,
        };
        let parts = self.exchange.exchange(
            self.rank,
            Contribution {
                signature,
                payload: Box::new(payload),
            },
        )?;

        let round = Round {
            rank: self.rank,
            signature,
            parts,
        };
        if let Some(peer) = round
            .parts
            .iter()
            .position(|c| c.signature != signature)
        {
            return Err(round.mismatch(peer));
        }
        Ok(round)
    }
}

/// The published contributions of one completed round.
struct Round {
    rank: usize,
    signature: Signature,
    parts: Arc<Vec<Contribution>>,
}

impl Round {
    fn len(&self) -> usize {
        self.parts.len()
    }

    /// Borrow `peer`'s payload without copying it.
    fn part<T: Datatype>(&self, peer: usize) -> Result<&[T]> {
        self.parts
            .get(peer)
            .and_then(|c| c.payload.downcast_ref::<Vec<T>>())
            .map(Vec::as_slice)
            .ok_or_else(|| self.mismatch(peer))
    }

    fn mismatch(&self, peer: usize) -> Error {
        let found = self
            .parts
            .get(peer)
            .map_or_else(|| "nothing".to_string(), |c| c.signature.to_string());
        Error::CollectiveMismatch {
            rank: self.rank,
            expected: self.signature.to_string(),
            peer,
            found,
        }
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::InvalidBuffer { expected, actual });
    }
    Ok(())
}

fn concat_into<T: Datatype>(round: &Round, chunk: usize, recv: &mut [T]) -> Result<()> {
    for (peer, dst) in recv.chunks_mut(chunk.max(1)).enumerate().take(round.len()) {
        let part = round.part::<T>(peer)?;
        check_len(chunk, part.len())?;
        dst.copy_from_slice(part);
    }
    Ok(())
}

fn fold_into<T: Reducible>(round: &Round, op: ReduceOp, recv: &mut [T]) -> Result<()> {
    if round.len() == 0 {
        return Err(Error::InvalidCount(0));
    }
    let first = round.part::<T>(0)?;
    check_len(recv.len(), first.len())?;
    recv.copy_from_slice(first);
    for peer in 1..round.len() {
        let part = round.part::<T>(peer)?;
        check_len(recv.len(), part.len())?;
        for (acc, &value) in recv.iter_mut().zip(part) {
            *acc = acc.combine(value, op);
        }
    }
    Ok(())
}
