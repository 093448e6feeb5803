use super::Collective;
use crate::algebra::Scalar;
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::*;

/// Owns the MPI runtime for the lifetime of the process.
///
/// Construct exactly once at startup, before any [`MpiComm`] is used;
/// finalization happens when this is dropped.
pub struct MpiEnvironment {
    _universe: Universe,
    world: SimpleCommunicator,
}

impl MpiEnvironment {
    pub fn new() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        Some(Self {
            _universe: universe,
            world,
        })
    }

    pub fn world(&self) -> MpiComm {
        MpiComm {
            comm: self.world.duplicate(),
        }
    }
}

/// Communicator handle over a system MPI.
///
/// Reductions on the opaque scalar type go through its fixed-size byte
/// encoding with an allgather, so no MPI datatype registration is needed
/// for arbitrary-precision backends.
pub struct MpiComm {
    comm: SimpleCommunicator,
}

impl Collective for MpiComm {
    fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn barrier(&self) {
        self.comm.barrier();
    }

    fn sum_all<T: Scalar>(&self, vals: &mut [T]) {
        if self.size() == 1 || vals.is_empty() {
            return;
        }
        let width = T::serialized_size();
        let mut send = vec![0u8; vals.len() * width];
        for (v, chunk) in vals.iter().zip(send.chunks_mut(width)) {
            v.write_bytes(chunk);
        }
        let mut recv = vec![0u8; send.len() * self.size()];
        self.comm.all_gather_into(&send[..], &mut recv[..]);

        for (i, v) in vals.iter_mut().enumerate() {
            let mut acc = T::zero();
            for r in 0..self.size() {
                let at = r * send.len() + i * width;
                acc += T::from_bytes(&recv[at..at + width]);
            }
            *v = acc;
        }
    }

    fn sum_all_u64(&self, vals: &mut [u64]) {
        if self.size() == 1 || vals.is_empty() {
            return;
        }
        let send = vals.to_vec();
        self.comm
            .all_reduce_into(&send[..], &mut vals[..], SystemOperation::sum());
    }

    fn max_all<T: Scalar>(&self, val: T) -> T {
        if self.size() == 1 {
            return val;
        }
        let width = T::serialized_size();
        let mut send = vec![0u8; width];
        val.write_bytes(&mut send);
        let mut recv = vec![0u8; width * self.size()];
        self.comm.all_gather_into(&send[..], &mut recv[..]);

        let mut acc = T::neg_infinity();
        for r in 0..self.size() {
            acc = T::max(acc, T::from_bytes(&recv[r * width..(r + 1) * width]));
        }
        acc
    }

    fn all_agree(&self, val: bool) -> bool {
        let send = [u8::from(val)];
        let mut recv = [0u8];
        self.comm
            .all_reduce_into(&send[..], &mut recv[..], SystemOperation::min());
        recv[0] != 0
    }

    fn broadcast_bytes(&self, root: usize, buf: &mut Vec<u8>) {
        let root_process = self.comm.process_at_rank(root as i32);
        let mut len = [buf.len() as u64];
        root_process.broadcast_into(&mut len[..]);
        buf.resize(len[0] as usize, 0);
        if !buf.is_empty() {
            root_process.broadcast_into(&mut buf[..]);
        }
    }

    fn split(&self, color: usize, key: usize) -> Self {
        let comm = self
            .comm
            .split_by_color_with_key(Color::with_value(color as i32), key as i32)
            .expect("communicator split produced no subgroup for this rank");
        MpiComm { comm }
    }
}
