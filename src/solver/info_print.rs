//! Iteration table printing.

use crate::algebra::Scalar;
use std::io::Write;

pub(crate) fn print_header(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "\n          time        mu          P-obj         D-obj        gap        \
         P-err       D-err      P-step   D-step   beta"
    )?;
    writeln!(
        out,
        "-----------------------------------------------------------------------\
         -----------------------------------------------"
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn print_iteration<T: Scalar>(
    out: &mut impl Write,
    iteration: u64,
    elapsed_seconds: f64,
    mu: T,
    primal_objective: T,
    dual_objective: T,
    duality_gap: T,
    primal_error: T,
    dual_error: T,
    primal_step: T,
    dual_step: T,
    beta_corrector: T,
) -> std::io::Result<()> {
    writeln!(
        out,
        "{:4} {:9.1} {:11.2e} {:13.4e} {:13.4e} {:10.2e} {:11.2e} {:11.2e}  {:7.4} {:7.4} {:7.4}",
        iteration,
        elapsed_seconds,
        mu,
        primal_objective,
        dual_objective,
        duality_gap,
        primal_error,
        dual_error,
        primal_step,
        dual_step,
        beta_corrector,
    )
}
