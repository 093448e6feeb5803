//! Process groups and collective operations.
//!
//! Every cross-process interaction in the solver goes through the
//! [`Collective`] trait: synchronous, group-scoped operations that every
//! member of the group must reach.  Groups are created by splitting a
//! parent communicator at partition time and are released when the handle
//! is dropped, so group lifetime is tied to the partition that created it.
//!
//! The serial backend is always available and makes the whole crate
//! testable without an MPI installation; the `mpi` feature adds a backend
//! over a system MPI via the `mpi` crate.

mod serial;
pub use serial::SerialComm;

cfg_if::cfg_if! {
    if #[cfg(feature = "mpi")] {
        mod mpi_comm;
        pub use mpi_comm::{MpiComm, MpiEnvironment};
    }
}

use crate::algebra::Scalar;

/// Synchronous collective operations over a fixed group of processes.
///
/// All calls are collective: every member of the group must make the same
/// call in the same order, and each call blocks until the whole group has
/// reached it.  Reductions on scalar values use the fixed-size byte
/// encoding of [`FixedBytes`](crate::algebra::FixedBytes), so they work
/// for any scalar backend.
pub trait Collective: Sized {
    /// This process's rank within the group, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Block until every group member arrives.
    fn barrier(&self);

    /// Elementwise sum across the group; every member receives the result.
    fn sum_all<T: Scalar>(&self, vals: &mut [T]);

    /// Elementwise sum of u64 counters across the group.
    fn sum_all_u64(&self, vals: &mut [u64]);

    /// Maximum across the group; every member receives the result.
    fn max_all<T: Scalar>(&self, val: T) -> T;

    /// Logical-and across the group.
    fn all_agree(&self, val: bool) -> bool;

    /// Broadcast a byte buffer from `root` to the whole group.  The buffer
    /// is resized to the root's length on every other member.
    fn broadcast_bytes(&self, root: usize, buf: &mut Vec<u8>);

    /// Split into disjoint subgroups: members passing the same `color`
    /// land in the same subgroup, ordered by `key`.  The returned handle
    /// owns the subgroup and releases it on drop.
    fn split(&self, color: usize, key: usize) -> Self;
}
