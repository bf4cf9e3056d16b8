//! Numerical constants shared by the integrators.

/// Default tolerances.
pub mod tolerance {
    /// Default absolute tolerance
    pub const ABS: f64 = 1.0e-6;

    /// Default relative tolerance
    pub const REL: f64 = 1.0e-3;
}

/// Step size controller defaults.
pub mod controller {
    /// Safety factor applied to the optimal step size scaling
    pub const SAFETY_FACTOR: f64 = 0.9;

    /// Maximum factor between two successive steps
    pub const FAC_MAX: f64 = 10.0;

    /// Minimum factor between two successive steps
    pub const FAC_MIN: f64 = 0.2;

    /// Smallest admissible step, in units in the last place of x
    pub const MIN_STEP_ULPS: f64 = 10.0;
}

/// Initial step size computation constants
/// Based on Hairer, Norsett & Wanner, "Solving Ordinary Differential Equations I", Sec. II.4
pub mod initial_step {
    /// Below this scaled norm of y0 the problem is considered near-stationary
    pub const MIN_STATE_NORM: f64 = 1.0e-5;

    /// Below this scaled norm of f(x0, y0) the problem is considered near-stationary
    pub const MIN_DERIVATIVE_NORM: f64 = 1.0e-6;

    /// Initial step used for near-stationary problems
    pub const DEFAULT_INITIAL_STEP: f64 = 1.0e-6;

    /// Fraction of the ratio d0/d1 used as first guess
    pub const SAFETY_FACTOR: f64 = 0.01;

    /// Norms below this value are treated as zero
    pub const NEGLIGIBLE_NORM: f64 = 1.0e-15;
}
