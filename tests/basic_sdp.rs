#![allow(non_snake_case)]

use blocksdp::algebra::Matrix;
use blocksdp::blockinfo::BlockInfo;
use blocksdp::comm::SerialComm;
use blocksdp::io::{ConfigurablePrintTarget, Verbosity};
use blocksdp::sdp::{Sdp, SdpData};
use blocksdp::solver::{SdpSolver, SolverSettingsBuilder, TerminateReason};

// Two 1×1 blocks with one sample point each and a single free variable:
//
//   minimize  c·x   s.t.  X_j = x_j ≥ 0,  x_0 + x_1 = 1
//
// with c = (1, 2).  The optimum sits at x = (1, 0) with objective 1; the
// dual optimum is y = 1 with Y = c − y = (0, 1).
fn two_block_data() -> SdpData<f64> {
    SdpData::new(
        0.0,
        vec![1, 1],
        vec![1, 1],
        vec![vec![1.0], vec![2.0]],
        vec![
            Matrix::from_rows(&[&[1.0]]),
            Matrix::from_rows(&[&[1.0]]),
        ],
        vec![
            [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))],
            [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))],
        ],
        vec![1.0],
    )
}

fn test_settings() -> blocksdp::solver::SolverSettings<f64> {
    SolverSettingsBuilder::default()
        .precision(128u32)
        .max_iterations(200u64)
        .duality_gap_threshold(1e-11)
        .primal_error_threshold(1e-10)
        .dual_error_threshold(1e-10)
        .complementarity_threshold(1e-10)
        .initial_matrix_scale_primal(1e4)
        .initial_matrix_scale_dual(1e4)
        .verbosity(Verbosity::None)
        .build()
        .unwrap()
}

#[test]
fn basic_sdp_converges() {
    let world = SerialComm::world();
    let data = two_block_data();
    let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
    let sdp = Sdp::distribute(&data, &info);

    let mut solver = SdpSolver::new(&info, &sdp, &world, test_settings());
    let reason = solver.run().unwrap();

    assert_eq!(reason, TerminateReason::Converged);
    assert!(!reason.is_failure());
    assert!(solver.iteration <= 150, "took {} iterations", solver.iteration);
    assert!(solver.duality_gap < 1e-10);

    // objective values at the optimum
    assert!((solver.primal_objective - 1.0).abs() < 1e-8);
    assert!((solver.dual_objective - 1.0).abs() < 1e-8);
    assert!((solver.y[0] - 1.0).abs() < 1e-6);
    assert!((solver.x[0][0] - 1.0).abs() < 1e-6);
    assert!(solver.x[1][0].abs() < 1e-6);

    // the accepted iterate is positive semidefinite within tolerance
    assert!(solver.X.min_eigenvalue_local().unwrap() >= -1e-12);
    assert!(solver.Y.min_eigenvalue_local().unwrap() >= -1e-12);
}

#[test]
fn basic_sdp_diagonal_free_var_matrix() {
    // same block structure, two free variables with B = I: the primal
    // point is pinned to b and both objectives meet at c·b
    let data = SdpData::new(
        0.5,
        vec![1, 1],
        vec![1, 1],
        vec![vec![1.0], vec![2.0]],
        vec![
            Matrix::from_rows(&[&[1.0, 0.0]]),
            Matrix::from_rows(&[&[0.0, 1.0]]),
        ],
        vec![
            [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))],
            [Matrix::from_rows(&[&[1.0]]), Matrix::zeros((0, 1))],
        ],
        vec![0.4, 0.6],
    );
    let world = SerialComm::world();
    let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
    let sdp = Sdp::distribute(&data, &info);

    let mut solver = SdpSolver::new(&info, &sdp, &world, test_settings());
    let reason = solver.run().unwrap();

    assert_eq!(reason, TerminateReason::Converged);
    let expected = 0.5 + 1.0 * 0.4 + 2.0 * 0.6;
    assert!((solver.primal_objective - expected).abs() < 1e-8);
    assert!((solver.dual_objective - expected).abs() < 1e-8);
    assert!((solver.x[0][0] - 0.4).abs() < 1e-6);
    assert!((solver.x[1][0] - 0.6).abs() < 1e-6);
}

#[test]
fn psd_preserved_at_every_accepted_iterate() {
    // run the same solve with successively larger iteration caps; each
    // prefix reproduces the accepted iterates, so checking the final
    // point of each run checks every iterate of the longest run
    let world = SerialComm::world();
    let data = two_block_data();
    let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
    let sdp = Sdp::distribute(&data, &info);

    for cap in 1..12u64 {
        let mut settings = test_settings();
        settings.max_iterations = cap;
        let mut solver = SdpSolver::new(&info, &sdp, &world, settings);
        let _ = solver.run().unwrap();
        assert!(
            solver.X.min_eigenvalue_local().unwrap() >= -1e-12,
            "X lost positive semidefiniteness at iteration {cap}"
        );
        assert!(
            solver.Y.min_eigenvalue_local().unwrap() >= -1e-12,
            "Y lost positive semidefiniteness at iteration {cap}"
        );
    }
}

#[test]
fn iteration_table_prints_to_a_buffer() {
    let world = SerialComm::world();
    let data = two_block_data();
    let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
    let sdp = Sdp::distribute(&data, &info);

    let mut settings = test_settings();
    settings.verbosity = Verbosity::Regular;
    let mut solver = SdpSolver::new(&info, &sdp, &world, settings);
    solver.print_to_buffer();
    solver.run().unwrap();

    let table = solver.get_print_buffer().unwrap();
    assert!(table.contains("P-obj"));
    assert!(table.contains("D-step"));
    assert!(table.lines().count() > 5);
}

#[test]
fn stabilized_schur_direction_solves_cleanly() {
    // block with a nearly dead sample direction: the second basis column
    // is 1e-3, so that direction's Schur pivot sits around 1e-12 of the
    // leading one and falls under a 1e-10 stabilization threshold
    // (exercising the low-rank update columns of Q end to end)
    let data = SdpData::new(
        0.0,
        vec![1],
        vec![2],
        vec![vec![2.0, 0.0]],
        vec![Matrix::from_rows(&[&[1.0], &[0.0]])],
        vec![[
            Matrix::from_rows(&[&[1.0, 1e-3]]),
            Matrix::from_rows(&[&[0.0, 1e-3]]),
        ]],
        vec![1.0],
    );
    let world = SerialComm::world();
    let info = BlockInfo::serial(&world, data.dimensions.clone(), data.num_points.clone());
    let sdp = Sdp::distribute(&data, &info);

    let mut settings = test_settings();
    settings.max_iterations = 2;
    settings.cholesky_stabilize_threshold = 1e-10;
    let mut solver = SdpSolver::new(&info, &sdp, &world, settings);

    // two iterations through the stabilized path must not error out
    let reason = solver.run().unwrap();
    assert_eq!(reason, TerminateReason::MaxIterations);
    assert!(reason.is_failure());
    assert!(solver.X.min_eigenvalue_local().unwrap() >= -1e-12);
}
