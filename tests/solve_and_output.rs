#![allow(non_snake_case)]

use blocksdp::algebra::Matrix;
use blocksdp::comm::SerialComm;
use blocksdp::io::Verbosity;
use blocksdp::sdp::SdpData;
use blocksdp::solver::{solve, SolverSettingsBuilder, TerminateReason, WriteSolution};

fn data() -> SdpData<f64> {
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

fn settings() -> blocksdp::solver::SolverSettings<f64> {
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
fn solve_writes_solution_files() {
    let out = tempfile::tempdir().unwrap();
    let world = SerialComm::world();

    let mut settings = settings();
    settings.out_dir = Some(out.path().to_path_buf());
    settings.write_solution = WriteSolution::parse("x,y,X,Y").unwrap();

    let output = solve(&world, &data(), &settings, 1, 1).unwrap();
    assert_eq!(output.terminate_reason, TerminateReason::Converged);
    assert!(output.duality_gap < 1e-10);
    assert!((output.y[0] - 1.0).abs() < 1e-6);

    let out_txt = std::fs::read_to_string(out.path().join("out.txt")).unwrap();
    assert!(out_txt.contains("terminateReason = \"found primal-dual optimal solution\";"));
    for field in [
        "primalObjective",
        "dualObjective",
        "dualityGap",
        "primalError",
        "dualError",
        "Solver runtime",
    ] {
        assert!(out_txt.contains(field), "missing field {field} in:\n{out_txt}");
    }

    let y_txt = std::fs::read_to_string(out.path().join("y.txt")).unwrap();
    assert!(y_txt.starts_with("1 1\n"));

    for block in 0..2 {
        let x_txt = std::fs::read_to_string(out.path().join(format!("x_{block}.txt"))).unwrap();
        assert!(x_txt.starts_with("1 1\n"));
        // even psd blocks are 1×1; odd ones are empty and skipped
        let X_txt =
            std::fs::read_to_string(out.path().join(format!("X_matrix_{}.txt", 2 * block)))
                .unwrap();
        assert!(X_txt.starts_with("1 1\n"));
        assert!(!out.path().join(format!("X_matrix_{}.txt", 2 * block + 1)).exists());
    }
}

#[test]
fn solve_reports_max_iterations_as_failure() {
    let world = SerialComm::world();
    let mut settings = settings();
    settings.max_iterations = 3;

    let output = solve(&world, &data(), &settings, 1, 1).unwrap();
    assert_eq!(output.terminate_reason, TerminateReason::MaxIterations);
    assert!(output.terminate_reason.is_failure());
}

#[test]
fn solve_honors_runtime_budget() {
    let world = SerialComm::world();
    let mut settings = settings();
    settings.max_runtime = 0.0;

    let output = solve(&world, &data(), &settings, 1, 1).unwrap();
    assert_eq!(output.terminate_reason, TerminateReason::MaxRuntime);
}

#[test]
fn reduced_transform_solve_maps_y_back() {
    // solve in a reduced space that is a scaling of the original: the
    // reported y must come back through the transform
    let reduced = SdpData {
        dual_objective_b: vec![0.5],
        ..data()
    }
    .with_reduced_transform(Matrix::from_rows(&[&[2.0]]), 1.0);

    let world = SerialComm::world();
    let output = solve(&world, &reduced, &settings(), 1, 1).unwrap();
    assert_eq!(output.terminate_reason, TerminateReason::Converged);
    // yp* solves with b* = 0.5 and effective constraint column 2·yp;
    // mapped back, y = 2·yp* must hit the original optimum y = 1
    assert!((output.y[0] - 1.0).abs() < 1e-6, "y = {}", output.y[0]);
}
