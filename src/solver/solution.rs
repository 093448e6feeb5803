//! Text output of the final solver point.

#![allow(non_snake_case)]

use super::{SdpSolver, SolverError, TerminateReason};
use crate::algebra::{Matrix, Scalar};
use crate::comm::Collective;
use crate::io::Verbosity;
use std::fs;
use std::io::Write;
use std::path::Path;

// enough decimal digits to round-trip the configured binary precision
fn decimal_digits<T: Scalar>() -> usize {
    (T::default_precision() as f64 * std::f64::consts::LOG10_2).ceil() as usize + 1
}

/// Write the solution summary `out.txt` plus the per-block text dumps
/// selected by the `write_solution` setting.
///
/// The scalar fields go to `out.txt` on the root process; each owning
/// group's root writes its own blocks, so no block data ever crosses
/// processes.
pub fn save_solution<T: Scalar, C: Collective>(
    solver: &SdpSolver<T, C>,
    terminate_reason: TerminateReason,
    out_directory: &Path,
) -> Result<(), SolverError> {
    let digits = decimal_digits::<T>();
    let write = solver.settings.write_solution;

    if solver.world.rank() == 0 {
        if solver.settings.verbosity >= Verbosity::Regular {
            println!("Saving solution to      : {}", out_directory.display());
        }
        fs::create_dir_all(out_directory)?;
        let mut out = fs::File::create(out_directory.join("out.txt"))?;
        writeln!(out, "terminateReason = \"{}\";", terminate_reason)?;
        writeln!(out, "primalObjective = {:.digits$e};", solver.primal_objective)?;
        writeln!(out, "dualObjective   = {:.digits$e};", solver.dual_objective)?;
        writeln!(out, "dualityGap      = {:.digits$e};", solver.duality_gap)?;
        writeln!(out, "primalError     = {:.digits$e};", solver.primal_error)?;
        writeln!(out, "dualError       = {:.digits$e};", solver.dual_error)?;
        writeln!(out, "Solver runtime  = {:.3};", solver.runtime)?;
        out.flush()?;

        if write.vector_y {
            let mut out = fs::File::create(out_directory.join("y.txt"))?;
            writeln!(out, "{} {}", solver.y.len(), 1)?;
            for v in &solver.y {
                writeln!(out, "{:.digits$e}", v)?;
            }
            out.flush()?;
        }
    }
    solver.world.barrier();

    if !solver.block_info.is_group_root() {
        return Ok(());
    }
    for (blk, &block_index) in solver.block_info.block_indices.iter().enumerate() {
        if write.vector_x {
            let path = out_directory.join(format!("x_{}.txt", block_index));
            let mut out = fs::File::create(path)?;
            writeln!(out, "{} {}", solver.x[blk].len(), 1)?;
            for v in &solver.x[blk] {
                writeln!(out, "{:.digits$e}", v)?;
            }
            out.flush()?;
        }
        for parity in 0..2 {
            let psd_index = 2 * block_index + parity;
            let block_X = &solver.X.blocks[2 * blk + parity];
            let block_Y = &solver.Y.blocks[2 * blk + parity];
            if write.matrix_x && block_X.m != 0 {
                write_psd_block(
                    &out_directory.join(format!("X_matrix_{}.txt", psd_index)),
                    block_X,
                    digits,
                )?;
            }
            if write.matrix_y && block_Y.m != 0 {
                write_psd_block(
                    &out_directory.join(format!("Y_matrix_{}.txt", psd_index)),
                    block_Y,
                    digits,
                )?;
            }
        }
    }
    Ok(())
}

fn write_psd_block<T: Scalar>(
    path: &Path,
    block: &Matrix<T>,
    digits: usize,
) -> Result<(), SolverError> {
    let mut out = fs::File::create(path)?;
    writeln!(out, "{} {}", block.m, block.n)?;
    for row in 0..block.m {
        for col in 0..block.n {
            if col != 0 {
                write!(out, " ")?;
            }
            write!(out, "{:.digits$e}", block[(row, col)])?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
