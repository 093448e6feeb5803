//! The full solve entry point: partition, optional timing calibration,
//! resume, solve, output.

use super::solution::save_solution;
use super::{SdpSolver, SolverError, SolverSettings, TerminateReason};
use crate::algebra::Scalar;
use crate::blockinfo::{read_block_timings, write_block_timings, BlockInfo};
use crate::checkpoint;
use crate::comm::Collective;
use crate::io::Verbosity;
use crate::mapping::BlockCost;
use crate::sdp::{Sdp, SdpData};
use std::time::Instant;

/// What a solve hands back to the caller.
#[derive(Debug, Clone)]
pub struct SolveOutput<T> {
    pub terminate_reason: TerminateReason,
    pub primal_objective: T,
    pub dual_objective: T,
    pub duality_gap: T,
    pub primal_error: T,
    pub dual_error: T,
    pub iterations: u64,
    pub runtime: f64,
    /// the free dual vector, mapped back through the reduced transform if
    /// one was in use
    pub y: Vec<T>,
}

/// Solve `data` to the configured thresholds.
///
/// On a multi-process world with no prior timing data and no checkpoint,
/// this first runs the two-iteration calibration pass, harvests per-block
/// costs from the timers, writes `block_timings` and repartitions before
/// the real solve.  An existing checkpoint pins the partition, since the
/// checkpoint format is only valid against the partition that wrote it.
pub fn solve<T: Scalar, C: Collective>(
    world: &C,
    data: &SdpData<T>,
    settings: &SolverSettings<T>,
    procs_per_node: usize,
    proc_granularity: usize,
) -> Result<SolveOutput<T>, SolverError> {
    T::set_default_precision(settings.precision);
    let mut settings = settings.clone();

    if settings.verbosity >= Verbosity::Regular && world.rank() == 0 {
        println!(
            "blocksdp {} started on {} process{}",
            crate::VERSION,
            world.size(),
            if world.size() == 1 { "" } else { "es" }
        );
    }

    let timings_path = settings
        .checkpoint_out
        .as_ref()
        .map(|dir| dir.join("block_timings"));
    let have_checkpoint = settings
        .checkpoint_in
        .as_ref()
        .map(|dir| checkpoint::exists(dir, world.rank()))
        .unwrap_or(false);

    let block_info;
    if let Some(path) = timings_path.as_ref().filter(|p| p.is_file()) {
        let costs = read_block_timings(path, data.num_blocks())?;
        block_info = BlockInfo::with_costs(
            world,
            data.dimensions.clone(),
            data.num_points.clone(),
            &costs,
            procs_per_node,
            proc_granularity,
            settings.verbosity,
        )?;
    } else if world.size() > 1 && !have_checkpoint {
        let started = Instant::now();
        let costs = timing_run(world, data, &settings, procs_per_node, proc_granularity)?;
        if world.rank() == 0 {
            if let Some(path) = timings_path.as_ref() {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                write_block_timings(path, &costs)?;
            }
        }
        world.barrier();
        settings.max_runtime -= started.elapsed().as_secs_f64();
        block_info = BlockInfo::with_costs(
            world,
            data.dimensions.clone(),
            data.num_points.clone(),
            &costs,
            procs_per_node,
            proc_granularity,
            settings.verbosity,
        )?;
    } else {
        block_info = BlockInfo::new(
            world,
            data.dimensions.clone(),
            data.num_points.clone(),
            procs_per_node,
            proc_granularity,
            settings.verbosity,
        )?;
    }

    let sdp = Sdp::distribute(data, &block_info);
    let mut solver = SdpSolver::new(&block_info, &sdp, world, settings.clone());
    if let Some(directory) = settings.checkpoint_in.clone() {
        solver.load_checkpoint(&directory)?;
    }

    let terminate_reason = solver.run()?;

    if settings.verbosity >= Verbosity::Regular && world.rank() == 0 {
        println!("-----{}-----", terminate_reason);
    }
    if let Some(out_dir) = settings.out_dir.as_ref() {
        save_solution(&solver, terminate_reason, out_dir)?;
    }

    Ok(SolveOutput {
        terminate_reason,
        primal_objective: solver.primal_objective,
        dual_objective: solver.dual_objective,
        duality_gap: solver.duality_gap,
        primal_error: solver.primal_error,
        dual_error: solver.dual_error,
        iterations: solver.iteration,
        runtime: solver.runtime,
        y: sdp.y_from_yp(&solver.y),
    })
}

// A capped solve whose only purpose is to time each block's share of the
// Schur complement work under the size-heuristic partition.
fn timing_run<T: Scalar, C: Collective>(
    world: &C,
    data: &SdpData<T>,
    settings: &SolverSettings<T>,
    procs_per_node: usize,
    proc_granularity: usize,
) -> Result<Vec<BlockCost>, SolverError> {
    if settings.verbosity >= Verbosity::Regular && world.rank() == 0 {
        println!("Performing a timing run");
    }
    let block_info = BlockInfo::new(
        world,
        data.dimensions.clone(),
        data.num_points.clone(),
        procs_per_node,
        proc_granularity,
        settings.verbosity,
    )?;
    let sdp = Sdp::distribute(data, &block_info);
    let mut solver = SdpSolver::new(&block_info, &sdp, world, settings.timing_run());
    solver.run()?;

    let mut costs_ns = vec![0u64; block_info.num_blocks()];
    if block_info.is_group_root() {
        if let Some(timers) = solver.timers() {
            for (key, elapsed) in timers.elapsed_with_prefix("schur.block_") {
                if let Ok(index) = key["schur.block_".len()..].parse::<usize>() {
                    costs_ns[index] = (elapsed.as_nanos() as u64).max(1);
                }
            }
        }
    }
    world.sum_all_u64(&mut costs_ns);

    Ok(costs_ns
        .into_iter()
        .enumerate()
        .map(|(index, cost)| BlockCost::new(cost.max(1), index))
        .collect())
}
