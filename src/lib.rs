//! __blocksdp__ is a Rust implementation of a primal-dual interior point
//! solver for semidefinite programs whose matrix variables are
//! block-diagonal, distributed across cooperating processes.  It solves
//! problems of the form
//!
//! ```text
//! minimize    b₀ + c·x
//! subject to  X = Σₚ Aₚ xₚ ,    X ⪰ 0,
//!             Bᵀ x = b
//! ```
//!
//! together with the corresponding dual over `(y, Y)`.  The matrix `X` is a
//! direct sum of dense blocks; each block is owned by a subset of the
//! cooperating processes, assigned by a cost-balancing partition of the
//! block list.
//!
//! The solver follows a predictor-corrector scheme.  Each iteration
//! eliminates the block variables through a per-block Schur complement with
//! dynamically stabilized Cholesky factorizations, then closes the system
//! with a small replicated dense solve.  Long multi-process runs survive
//! restarts through a per-process binary checkpoint format.
//!
//! All numeric work is generic over an opaque scalar type; precision is a
//! runtime parameter recorded once per process at startup.

//Rust hates greek characters
#![allow(confusable_idents)]

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod algebra;
pub mod blockinfo;
pub mod checkpoint;
pub mod comm;
pub mod io;
pub mod mapping;
pub mod sdp;
pub mod solver;
pub mod timers;
