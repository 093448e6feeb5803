//! The primal-dual interior point solver.

mod driver;
mod info_print;
mod pairings;
mod residuals;
mod schur;
mod settings;
mod solution;
#[allow(clippy::module_inception)]
mod solver;
mod step;

pub use driver::{solve, SolveOutput};
pub use settings::{
    SettingsError, SolverSettings, SolverSettingsBuilder, WriteSolution,
};
pub use solution::save_solution;
pub use solver::SdpSolver;

#[cfg(feature = "serde")]
pub use settings::SettingsIoError;

use crate::algebra::DenseFactorizationError;
use crate::checkpoint::CheckpointError;
use crate::mapping::ConfigError;
use thiserror::Error;

/// Why a solve stopped.
///
/// Always returned as data; only programming faults and io problems
/// surface as [`SolverError`].  The `Max*` reasons mean "no solution
/// found" and are reported as solve failures to callers, which may relax
/// thresholds and retry.
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminateReason {
    /// Primal and dual errors, the duality gap and the complementarity
    /// all fell below their thresholds.
    Converged,
    /// The primal step length fell below its floor.
    PrimalInfeasible,
    /// The dual step length fell below its floor.
    DualInfeasible,
    /// Iteration limit reached before convergence.
    MaxIterations,
    /// Wall-clock limit reached before convergence.
    MaxRuntime,
    /// The complementarity `mu` exceeded its ceiling.
    MaxComplementarity,
}

impl TerminateReason {
    /// True for the reasons a caller should treat as "no solution found".
    pub fn is_failure(&self) -> bool {
        matches!(
            *self,
            TerminateReason::MaxIterations
                | TerminateReason::MaxRuntime
                | TerminateReason::MaxComplementarity
        )
    }
}

impl std::fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let text = match self {
            TerminateReason::Converged => "found primal-dual optimal solution",
            TerminateReason::PrimalInfeasible => "primal step length too small",
            TerminateReason::DualInfeasible => "dual step length too small",
            TerminateReason::MaxIterations => "maxIterations exceeded",
            TerminateReason::MaxRuntime => "maxRuntime exceeded",
            TerminateReason::MaxComplementarity => "maxComplementarity exceeded",
        };
        write!(f, "{}", text)
    }
}

/// Hard solver failures.
///
/// Numerical non-convergence is not here; that is a
/// [`TerminateReason`].
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Cholesky factorization of {matrix} failed: {source}")]
    Cholesky {
        matrix: &'static str,
        #[source]
        source: DenseFactorizationError,
    },
    #[error("Schur complement block {block} is singular even after stabilization: {source}")]
    SingularSchurBlock {
        block: usize,
        #[source]
        source: DenseFactorizationError,
    },
    #[error("factorization of the Q matrix failed: {source}")]
    SingularQ {
        #[source]
        source: DenseFactorizationError,
    },
    #[error("eigenvalue computation failed during the step length bound: {source}")]
    StepLength {
        #[source]
        source: DenseFactorizationError,
    },
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not write solver output: {0}")]
    Io(#[from] std::io::Error),
}
