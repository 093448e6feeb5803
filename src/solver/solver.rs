#![allow(non_snake_case)]
use super::info_print;
use super::pairings::{sampled_basis_pair, BlockShape};
use super::schur::SchurSolver;
use super::settings::SolverSettings;
use super::{SolverError, TerminateReason};
use crate::algebra::{BlockDiagonalMatrix, Matrix, Scalar};
use crate::blockinfo::BlockInfo;
use crate::checkpoint;
use crate::comm::Collective;
use crate::io::{ConfigurablePrintTarget, PrintTarget, Verbosity};
use crate::sdp::Sdp;
use crate::timers::{notimeit, timeit, Timers};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

// ---------------------------------
// top level solver container type
// ---------------------------------

/// Owns all solver state and the iteration loop.
///
/// Allocated once per solve; every per-iteration structure is reused as
/// working storage.  The state machine runs `Initialized → Iterating` until
/// one of the [`TerminateReason`]s is reached; all processes make every
/// termination decision from globally-reduced quantities, so control flow
/// never diverges between processes.
pub struct SdpSolver<'a, T: Scalar, C: Collective> {
    pub(crate) block_info: &'a BlockInfo<C>,
    pub(crate) sdp: &'a Sdp<T>,
    pub(crate) world: &'a C,
    pub settings: SolverSettings<T>,

    // ----- current point
    /// primal vector, one segment per owned block
    pub x: Vec<Vec<T>>,
    /// primal psd matrix, two blocks per owned block
    pub X: BlockDiagonalMatrix<T>,
    /// free dual vector, replicated on every process
    pub y: Vec<T>,
    /// dual psd matrix, same structure as `X`
    pub Y: BlockDiagonalMatrix<T>,

    // ----- search direction, recomputed twice per iteration
    pub(crate) dx: Vec<Vec<T>>,
    pub(crate) dX: BlockDiagonalMatrix<T>,
    pub(crate) dy: Vec<T>,
    pub(crate) dY: BlockDiagonalMatrix<T>,

    // ----- solver status
    pub primal_objective: T,
    pub dual_objective: T,
    pub duality_gap: T,
    pub primal_error: T,
    pub dual_error: T,
    pub mu: T,
    pub iteration: u64,
    pub terminate_reason: Option<TerminateReason>,
    /// seconds spent in `run`, including any resumed-from time budget
    pub runtime: f64,

    // ----- residues
    pub(crate) primal_residues: BlockDiagonalMatrix<T>,
    pub(crate) dual_residues: Vec<Vec<T>>,

    // ----- per-iteration workspace
    pub(crate) X_cholesky: BlockDiagonalMatrix<T>,
    pub(crate) Y_cholesky: BlockDiagonalMatrix<T>,
    pub(crate) bilinear_pairings_X_inv: Vec<Matrix<T>>,
    pub(crate) bilinear_pairings_Y: Vec<Matrix<T>>,
    pub(crate) R: BlockDiagonalMatrix<T>,
    pub(crate) Z: BlockDiagonalMatrix<T>,
    pub(crate) schur: SchurSolver<T>,
    pub(crate) shapes: Vec<BlockShape>,
    pub(crate) sampled_bases: Vec<[Matrix<T>; 2]>,

    print: PrintTarget,
    timers: Option<Timers>,
}

impl<'a, T: Scalar, C: Collective> SdpSolver<'a, T, C> {
    /// Allocate solver state against a partition and its SDP data.
    ///
    /// The starting point is `x = 0, y = 0, X = Ω_P·I, Y = Ω_D·I`.
    pub fn new(
        block_info: &'a BlockInfo<C>,
        sdp: &'a Sdp<T>,
        world: &'a C,
        settings: SolverSettings<T>,
    ) -> Self {
        T::set_default_precision(settings.precision);

        let shapes: Vec<BlockShape> = block_info
            .block_indices
            .iter()
            .map(|&j| BlockShape::new(j, block_info.dimensions[j], block_info.num_points[j]))
            .collect();
        let schur_sizes = block_info.schur_local_sizes();
        let psd_sizes = block_info.psd_matrix_local_sizes();
        let N = sdp.dual_dim();

        let x: Vec<Vec<T>> = schur_sizes.iter().map(|&n| vec![T::zero(); n]).collect();
        let mut X = BlockDiagonalMatrix::zeros(&psd_sizes);
        X.set_identity_scaled(settings.initial_matrix_scale_primal);
        let mut Y = BlockDiagonalMatrix::zeros(&psd_sizes);
        Y.set_identity_scaled(settings.initial_matrix_scale_dual);

        let sampled_bases = shapes
            .iter()
            .zip(sdp.bilinear_bases.iter())
            .map(|(shape, bases)| sampled_basis_pair(bases, shape.dim))
            .collect();

        let pairing_sizes: Vec<usize> = shapes
            .iter()
            .flat_map(|s| {
                let n = s.dim * s.num_points;
                [n, n]
            })
            .collect();

        Self {
            block_info,
            sdp,
            world,
            x,
            dx: schur_sizes.iter().map(|&n| vec![T::zero(); n]).collect(),
            dX: BlockDiagonalMatrix::zeros(&psd_sizes),
            y: vec![T::zero(); N],
            dy: vec![T::zero(); N],
            dY: BlockDiagonalMatrix::zeros(&psd_sizes),
            primal_objective: T::zero(),
            dual_objective: T::zero(),
            duality_gap: T::zero(),
            primal_error: T::zero(),
            dual_error: T::zero(),
            mu: T::zero(),
            iteration: 1,
            terminate_reason: None,
            runtime: 0.0,
            primal_residues: BlockDiagonalMatrix::zeros(&psd_sizes),
            dual_residues: schur_sizes.iter().map(|&n| vec![T::zero(); n]).collect(),
            X_cholesky: BlockDiagonalMatrix::zeros(&psd_sizes),
            Y_cholesky: BlockDiagonalMatrix::zeros(&psd_sizes),
            bilinear_pairings_X_inv: pairing_sizes
                .iter()
                .map(|&n| Matrix::zeros((n, n)))
                .collect(),
            bilinear_pairings_Y: pairing_sizes
                .iter()
                .map(|&n| Matrix::zeros((n, n)))
                .collect(),
            R: BlockDiagonalMatrix::zeros(&psd_sizes),
            Z: BlockDiagonalMatrix::zeros(&psd_sizes),
            schur: SchurSolver::new(&schur_sizes),
            shapes,
            sampled_bases,
            X,
            Y,
            settings,
            print: PrintTarget::default(),
            timers: Some(Timers::default()),
        }
    }

    /// Run the iteration loop until a terminate condition is reached.
    ///
    /// Numerical non-convergence comes back as a [`TerminateReason`];
    /// `Err` means the solve itself broke (singular systems, io).
    pub fn run(&mut self) -> Result<TerminateReason, SolverError> {
        let mut timers = self.timers.take().unwrap_or_default();
        let start = Instant::now();

        let result = self.iterate(&mut timers, start);

        if let Ok(reason) = &result {
            self.terminate_reason = Some(*reason);
            if !self.settings.no_final_checkpoint {
                if let Some(directory) = self.settings.checkpoint_out.clone() {
                    self.save_checkpoint(&directory)?;
                }
            }
        }
        self.runtime = start.elapsed().as_secs_f64();
        if self.settings.verbosity >= Verbosity::Debug && self.world.rank() == 0 {
            timers.print();
        }
        self.timers.replace(timers);
        result
    }

    fn iterate(
        &mut self,
        timers: &mut Timers,
        start: Instant,
    ) -> Result<TerminateReason, SolverError> {
        if self.is_printing() {
            info_print::print_header(&mut self.print)?;
        }

        timers.start_as_current("solve");
        let outcome = self.iteration_loop(timers, start);
        timers.stop_current();
        outcome
    }

    fn iteration_loop(
        &mut self,
        timers: &mut Timers,
        start: Instant,
    ) -> Result<TerminateReason, SolverError> {
        loop {
            timeit! {timers => "residues"; {
                self.compute_residues()?;
            }}

            // Termination decisions are made from globally agreed
            // quantities, identically on every process.
            if self.is_converged() {
                return Ok(TerminateReason::Converged);
            }
            if self.iteration > self.settings.max_iterations {
                return Ok(TerminateReason::MaxIterations);
            }
            if start.elapsed().as_secs_f64() > self.settings.max_runtime {
                return Ok(TerminateReason::MaxRuntime);
            }
            if self.mu > self.settings.max_complementarity {
                return Ok(TerminateReason::MaxComplementarity);
            }

            if self.checkpoint_due() {
                if let Some(directory) = self.settings.checkpoint_out.clone() {
                    self.save_checkpoint(&directory)?;
                }
            }

            timeit! {timers => "initializeSchurComplementSolver"; {
                let threshold = self.settings.cholesky_stabilize_threshold;
                self.schur.initialize(
                    self.block_info,
                    self.world,
                    self.sdp,
                    &self.shapes,
                    &self.bilinear_pairings_X_inv,
                    &self.bilinear_pairings_Y,
                    threshold,
                    timers,
                )?;
            }}

            let is_primal_feasible = self.primal_error < self.settings.primal_error_threshold;
            let is_dual_feasible = self.dual_error < self.settings.dual_error_threshold;
            let is_feasible = is_primal_feasible && is_dual_feasible;

            // predictor
            let beta_predictor = if is_feasible {
                T::zero()
            } else {
                self.settings.infeasible_centering_parameter
            };
            timeit! {timers => "predictor"; {
                self.compute_search_direction(beta_predictor, false);
            }}

            // corrector
            let beta_corrector = self.corrector_centering_parameter(is_feasible);
            timeit! {timers => "corrector"; {
                self.compute_search_direction(beta_corrector, true);
            }}

            // step lengths preserving positive semidefiniteness
            let mut primal_step = super::step::step_length(
                self.world,
                &self.X_cholesky,
                &self.dX,
                self.settings.step_length_reduction,
            )?;
            let mut dual_step = super::step::step_length(
                self.world,
                &self.Y_cholesky,
                &self.dY,
                self.settings.step_length_reduction,
            )?;
            if is_feasible {
                primal_step = T::min(primal_step, dual_step);
                dual_step = primal_step;
            }

            if primal_step < self.settings.min_primal_step {
                return Ok(TerminateReason::PrimalInfeasible);
            }
            if dual_step < self.settings.min_dual_step {
                return Ok(TerminateReason::DualInfeasible);
            }

            if self.is_printing() {
                notimeit! {timers; {
                    info_print::print_iteration(
                        &mut self.print,
                        self.iteration,
                        start.elapsed().as_secs_f64(),
                        self.mu,
                        self.primal_objective,
                        self.dual_objective,
                        self.duality_gap,
                        self.primal_error,
                        self.dual_error,
                        primal_step,
                        dual_step,
                        beta_corrector,
                    )?;
                }}
            }

            // accept the iterate
            for (x, dx) in self.x.iter_mut().zip(self.dx.iter()) {
                for (xv, dv) in x.iter_mut().zip(dx.iter()) {
                    *xv += primal_step * *dv;
                }
            }
            self.X.axpy(primal_step, &self.dX);
            for (yv, dv) in self.y.iter_mut().zip(self.dy.iter()) {
                *yv += dual_step * *dv;
            }
            self.Y.axpy(dual_step, &self.dY);

            self.iteration += 1;
        }
    }

    fn is_converged(&self) -> bool {
        self.primal_error < self.settings.primal_error_threshold
            && self.dual_error < self.settings.dual_error_threshold
            && self.duality_gap < self.settings.duality_gap_threshold
            && self.mu < self.settings.complementarity_threshold
    }

    fn checkpoint_due(&self) -> bool {
        self.settings.checkpoint_out.is_some()
            && self.settings.checkpoint_interval != u64::MAX
            && self.iteration % self.settings.checkpoint_interval == 0
    }

    fn is_printing(&self) -> bool {
        self.settings.verbosity >= Verbosity::Regular && self.world.rank() == 0
    }

    /// Write this process's `x, X, y, Y` under `directory`.
    pub fn save_checkpoint(&mut self, directory: &Path) -> Result<(), SolverError> {
        checkpoint::save_checkpoint(
            directory,
            self.world.rank(),
            &self.x,
            &self.X,
            &self.y,
            &self.Y,
        )?;
        if self.is_printing() {
            writeln!(self.print, "Saving checkpoint to    : {}", directory.display())?;
        }
        Ok(())
    }

    /// Resume from `directory` if a checkpoint for this rank exists.
    ///
    /// A checkpoint from a different partition is a fatal error, never a
    /// silent partial resume.
    pub fn load_checkpoint(&mut self, directory: &Path) -> Result<bool, SolverError> {
        let loaded = checkpoint::load_checkpoint(
            directory,
            self.world.rank(),
            &mut self.x,
            &mut self.X,
            &mut self.y,
            &mut self.Y,
        )?;
        if loaded && self.is_printing() {
            writeln!(
                self.print,
                "Loading checkpoint from : {}",
                directory.display()
            )?;
        }
        Ok(loaded)
    }

    pub(crate) fn timers(&self) -> Option<&Timers> {
        self.timers.as_ref()
    }
}

impl<T: Scalar, C: Collective> ConfigurablePrintTarget for SdpSolver<'_, T, C> {
    fn print_to_stdout(&mut self) {
        self.print.print_to_stdout();
    }
    fn print_to_file(&mut self, file: std::fs::File) {
        self.print.print_to_file(file);
    }
    fn print_to_stream(&mut self, stream: Box<dyn Write + Send + Sync>) {
        self.print.print_to_stream(stream);
    }
    fn print_to_buffer(&mut self) {
        self.print.print_to_buffer();
    }
    fn get_print_buffer(&mut self) -> std::io::Result<String> {
        self.print.get_print_buffer()
    }
}
