use crate::algebra::{AsScalarT, Scalar};
use crate::io::Verbosity;
use derive_builder::Builder;
use std::path::PathBuf;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Error type returned by settings validation
#[derive(Error, Debug)]
pub enum SettingsError {
    /// An error attributable to one of the fields
    #[error("Bad value for field: {0}")]
    BadFieldValue(&'static str),
}

/// Which parts of the solution [`save_solution`](crate::solver::save_solution)
/// writes to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WriteSolution {
    pub vector_x: bool,
    pub vector_y: bool,
    pub matrix_x: bool,
    pub matrix_y: bool,
}

impl Default for WriteSolution {
    fn default() -> Self {
        Self {
            vector_x: true,
            vector_y: true,
            matrix_x: false,
            matrix_y: false,
        }
    }
}

impl WriteSolution {
    /// Parse a comma-separated component list, e.g. `"x,y,X,Y"`.
    pub fn parse(components: &str) -> Result<Self, SettingsError> {
        let mut ws = Self {
            vector_x: false,
            vector_y: false,
            matrix_x: false,
            matrix_y: false,
        };
        for part in components.split(',') {
            match part.trim() {
                "" => {}
                "x" => ws.vector_x = true,
                "y" => ws.vector_y = true,
                "X" => ws.matrix_x = true,
                "Y" => ws.matrix_y = true,
                _ => return Err(SettingsError::BadFieldValue("write_solution")),
            }
        }
        Ok(ws)
    }
}

/// Solver configuration.
///
/// Constructed through [`SolverSettingsBuilder`], which fills defaults and
/// validates on `build()`.  The same structure parameterizes both the full
/// solve and the capped timing calibration run; see
/// [`SolverSettings::timing_run`].
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = "T: Serialize + DeserializeOwned"))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverSettings<T: Scalar> {
    ///working precision in bits, recorded once per process at startup
    #[builder(default = "400")]
    pub precision: u32,

    ///maximum number of iterations
    #[builder(default = "500")]
    pub max_iterations: u64,

    ///maximum solver runtime (seconds)
    #[builder(default = "f64::INFINITY")]
    pub max_runtime: f64,

    ///iterations between checkpoints
    #[builder(default = "100")]
    pub checkpoint_interval: u64,

    ///skip the checkpoint normally written before terminating
    #[builder(default = "false")]
    pub no_final_checkpoint: bool,

    ///directory holding a checkpoint to resume from
    #[builder(default = "None")]
    pub checkpoint_in: Option<PathBuf>,

    ///directory checkpoints are written to
    #[builder(default = "None")]
    pub checkpoint_out: Option<PathBuf>,

    ///directory the solution files are written to
    #[builder(default = "None")]
    pub out_dir: Option<PathBuf>,

    ///duality gap convergence threshold
    #[builder(default = "(1e-30).as_T()")]
    pub duality_gap_threshold: T,

    ///primal error convergence threshold
    #[builder(default = "(1e-30).as_T()")]
    pub primal_error_threshold: T,

    ///dual error convergence threshold
    #[builder(default = "(1e-30).as_T()")]
    pub dual_error_threshold: T,

    ///complementarity convergence threshold on `mu`
    #[builder(default = "(1e-30).as_T()")]
    pub complementarity_threshold: T,

    ///terminate when `mu` exceeds this ceiling
    #[builder(default = "(1e100).as_T()")]
    pub max_complementarity: T,

    ///initial value `Ω_P` on the diagonal of `X`
    #[builder(default = "(1e20).as_T()")]
    pub initial_matrix_scale_primal: T,

    ///initial value `Ω_D` on the diagonal of `Y`
    #[builder(default = "(1e20).as_T()")]
    pub initial_matrix_scale_dual: T,

    ///centering parameter when the current point is primal-dual feasible
    #[builder(default = "(0.1).as_T()")]
    pub feasible_centering_parameter: T,

    ///centering parameter when the current point is infeasible
    #[builder(default = "(0.3).as_T()")]
    pub infeasible_centering_parameter: T,

    ///back off the exact PSD boundary by this factor when stepping
    #[builder(default = "(0.7).as_T()")]
    pub step_length_reduction: T,

    ///pivots below this fraction of the largest diagonal entry are
    ///stabilized during the Schur complement factorization
    #[builder(default = "(1e-40).as_T()")]
    pub cholesky_stabilize_threshold: T,

    ///a primal step below this floor terminates as primal infeasible
    #[builder(default = "T::zero()")]
    pub min_primal_step: T,

    ///a dual step below this floor terminates as dual infeasible
    #[builder(default = "T::zero()")]
    pub min_dual_step: T,

    ///how much to print while running
    #[builder(default = "Verbosity::Regular")]
    pub verbosity: Verbosity,

    ///which solution components to write
    #[builder(default = "WriteSolution::default()")]
    pub write_solution: WriteSolution,
}

impl<T: Scalar> Default for SolverSettings<T> {
    fn default() -> SolverSettings<T> {
        SolverSettingsBuilder::<T>::default().build().unwrap()
    }
}

impl<T: Scalar> SolverSettings<T> {
    /// Checks that the settings are valid.  This only sanity checks
    /// numerical ranges; threshold magnitudes are the caller's business.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.precision < 2 {
            return Err(SettingsError::BadFieldValue("precision"));
        }
        if self.max_iterations == 0 {
            return Err(SettingsError::BadFieldValue("max_iterations"));
        }
        if self.checkpoint_interval == 0 {
            return Err(SettingsError::BadFieldValue("checkpoint_interval"));
        }
        let zero = T::zero();
        let one = T::one();
        if self.step_length_reduction <= zero || self.step_length_reduction > one {
            return Err(SettingsError::BadFieldValue("step_length_reduction"));
        }
        if self.feasible_centering_parameter < zero || self.feasible_centering_parameter > one {
            return Err(SettingsError::BadFieldValue("feasible_centering_parameter"));
        }
        if self.infeasible_centering_parameter < zero || self.infeasible_centering_parameter > one
        {
            return Err(SettingsError::BadFieldValue("infeasible_centering_parameter"));
        }
        if self.cholesky_stabilize_threshold < zero {
            return Err(SettingsError::BadFieldValue("cholesky_stabilize_threshold"));
        }
        Ok(())
    }

    /// The capped configuration used for the block-timing calibration
    /// pass: two iterations, thresholds zeroed so nothing converges early,
    /// checkpointing and printing suppressed.
    pub fn timing_run(&self) -> Self {
        let mut settings = self.clone();
        settings.max_iterations = 2;
        settings.max_runtime = f64::INFINITY;
        settings.checkpoint_interval = u64::MAX;
        settings.no_final_checkpoint = true;
        settings.checkpoint_in = None;
        settings.checkpoint_out = None;
        settings.duality_gap_threshold = T::zero();
        settings.primal_error_threshold = T::zero();
        settings.dual_error_threshold = T::zero();
        settings.complementarity_threshold = T::zero();
        settings.min_primal_step = T::zero();
        settings.min_dual_step = T::zero();
        if settings.verbosity != Verbosity::Debug {
            settings.verbosity = Verbosity::None;
        }
        settings
    }
}

// pre build checker (for auto-validation when using the builder)

impl From<SettingsError> for SolverSettingsBuilderError {
    fn from(e: SettingsError) -> Self {
        SolverSettingsBuilderError::ValidationError(e.to_string())
    }
}

/// Automatic pre-build settings validation
impl<T: Scalar> SolverSettingsBuilder<T> {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if matches!(self.precision, Some(p) if p < 2) {
            return Err(SettingsError::BadFieldValue("precision"));
        }
        if matches!(self.max_iterations, Some(0)) {
            return Err(SettingsError::BadFieldValue("max_iterations"));
        }
        if matches!(self.checkpoint_interval, Some(0)) {
            return Err(SettingsError::BadFieldValue("checkpoint_interval"));
        }
        if let Some(step) = self.step_length_reduction {
            if step <= T::zero() || step > T::one() {
                return Err(SettingsError::BadFieldValue("step_length_reduction"));
            }
        }
        Ok(())
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use std::path::Path;

        /// Errors reading or writing settings files
        #[derive(Error, Debug)]
        pub enum SettingsIoError {
            #[error(transparent)]
            Io(#[from] std::io::Error),
            #[error(transparent)]
            Json(#[from] serde_json::Error),
        }

        impl<T> SolverSettings<T>
        where
            T: Scalar + Serialize + DeserializeOwned,
        {
            /// Read settings from a json file.
            pub fn load_json(path: &Path) -> Result<Self, SettingsIoError> {
                let file = std::fs::File::open(path)?;
                let settings = serde_json::from_reader(std::io::BufReader::new(file))?;
                Ok(settings)
            }

            /// Write settings to a json file.
            pub fn save_json(&self, path: &Path) -> Result<(), SettingsIoError> {
                let file = std::fs::File::create(path)?;
                serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
                Ok(())
            }
        }
    }
}

#[test]
fn test_settings_validate() {
    // all standard settings
    SolverSettingsBuilder::<f64>::default().build().unwrap();

    // fail on zero-iteration budget
    assert!(SolverSettingsBuilder::<f64>::default()
        .max_iterations(0)
        .build()
        .is_err());

    // fail on step length reduction outside (0, 1]
    assert!(SolverSettingsBuilder::<f64>::default()
        .step_length_reduction(1.5)
        .build()
        .is_err());

    // directly construct a bad settings struct and manually check
    let settings = SolverSettings::<f64> {
        checkpoint_interval: 0,
        ..SolverSettings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn test_timing_run_caps() {
    let settings = SolverSettings::<f64>::default();
    let timing = settings.timing_run();
    assert_eq!(timing.max_iterations, 2);
    assert!(timing.no_final_checkpoint);
    assert_eq!(timing.duality_gap_threshold, 0.0);
    assert_eq!(timing.verbosity, Verbosity::None);
}

#[test]
fn test_write_solution_parse() {
    let ws = WriteSolution::parse("x, y,X").unwrap();
    assert!(ws.vector_x && ws.vector_y && ws.matrix_x && !ws.matrix_y);
    assert!(WriteSolution::parse("x,z").is_err());
}
