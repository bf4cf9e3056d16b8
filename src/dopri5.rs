//! Explicit Runge-Kutta method with Dormand-Prince coefficients of order 5(4).

use crate::butcher_tableau::dopri54;
use crate::controller::Controller;
use crate::dop_shared::*;
use crate::integrator::Integrator;

use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, OVector, Scalar};
use num_traits::Zero;
use simba::scalar::{ClosedAdd, ClosedMul, SupersetOf};

/// Dormand-Prince 5(4) pair. The 5th order solution is propagated.
///
/// The last stage is the derivative at the new point, but it is recomputed at
/// the start of the next step.
#[derive(Clone, Copy, Debug, Default)]
pub struct DormandPrince;

impl<T, D> EmbeddedRungeKutta<OVector<T, D>> for DormandPrince
where
    T: Scalar + Copy + Zero + ClosedAdd + ClosedMul + SupersetOf<f64>,
    D: Dim,
    DefaultAllocator: Allocator<T, D>,
{
    fn error_order(&self) -> u32 {
        dopri54::ERROR_ORDER
    }

    fn stages(&self) -> usize {
        dopri54::TABLEAU.stages()
    }

    fn step<F: System<OVector<T, D>>>(
        &self,
        f: &F,
        x: f64,
        y: &OVector<T, D>,
        h: f64,
    ) -> (OVector<T, D>, OVector<T, D>) {
        dopri54::TABLEAU.evaluate(f, x, y, h)
    }
}

/// Adaptive integrator using the Dormand-Prince 5(4) pair.
pub type Dopri5<V, F> = Integrator<DormandPrince, V, F>;

impl<T, D: Dim, F> Integrator<DormandPrince, OVector<T, D>, F>
where
    f64: From<T>,
    T: Scalar + Copy + Zero + ClosedAdd + ClosedMul + SupersetOf<f64>,
    F: System<OVector<T, D>>,
    DefaultAllocator: Allocator<T, D>,
{
    /// Default initializer for the structure
    ///
    /// # Arguments
    ///
    /// * `f`       - Structure implementing the System<V> trait
    /// * `x`       - Initial value of the independent variable (usually time)
    /// * `x_end`   - Final value of the independent variable
    /// * `y`       - Initial value of the dependent variable(s)
    /// * `rtol`    - Relative tolerance used in the computation of the adaptive step size
    /// * `atol`    - Absolute tolerance used in the computation of the adaptive step size
    ///
    pub fn new(f: F, x: f64, x_end: f64, y: OVector<T, D>, rtol: f64, atol: f64) -> Self {
        Integrator::with_method(DormandPrince, f, x, x_end, y, Tolerance::new(atol, rtol))
    }

    /// Advanced initializer for the structure.
    ///
    /// # Arguments
    ///
    /// * `f`       - Structure implementing the System<V> trait
    /// * `x`       - Initial value of the independent variable (usually time)
    /// * `x_end`   - Final value of the independent variable
    /// * `y`       - Initial value of the dependent variable(s)
    /// * `rtol`    - Relative tolerance used in the computation of the adaptive step size
    /// * `atol`    - Absolute tolerance used in the computation of the adaptive step size
    /// * `safety_factor`   - Safety factor used in the computation of the adaptive step size. Default is 0.9
    /// * `fac_min` - Minimum factor between two successive steps. Default is 0.2
    /// * `fac_max` - Maximum factor between two successive steps. Default is 10.0
    /// * `h`       - Initial value of the step size. If h = 0.0, the intial value of h is computed automatically
    ///
    #[allow(clippy::too_many_arguments)]
    pub fn from_param(
        f: F,
        x: f64,
        x_end: f64,
        y: OVector<T, D>,
        rtol: f64,
        atol: f64,
        safety_factor: f64,
        fac_min: f64,
        fac_max: f64,
        h: f64,
    ) -> Self {
        Integrator::from_parts(
            DormandPrince,
            f,
            x,
            x_end,
            y,
            Tolerance::new(atol, rtol),
            Controller::new(dopri54::ERROR_ORDER, fac_max, fac_min, safety_factor),
            h,
        )
    }
}
