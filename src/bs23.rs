//! Explicit Runge-Kutta method with Bogacki-Shampine coefficients of order 3(2).

use crate::butcher_tableau::bs32;
use crate::dop_shared::*;
use crate::integrator::Integrator;

use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, OVector, Scalar};
use num_traits::Zero;
use simba::scalar::{ClosedAdd, ClosedMul, SupersetOf};

/// Bogacki-Shampine 3(2) pair. Cheaper per step than Dormand-Prince, suited to loose tolerances.
#[derive(Clone, Copy, Debug, Default)]
pub struct BogackiShampine;

impl<T, D> EmbeddedRungeKutta<OVector<T, D>> for BogackiShampine
where
    T: Scalar + Copy + Zero + ClosedAdd + ClosedMul + SupersetOf<f64>,
    D: Dim,
    DefaultAllocator: Allocator<T, D>,
{
    fn error_order(&self) -> u32 {
        bs32::ERROR_ORDER
    }

    fn stages(&self) -> usize {
        bs32::TABLEAU.stages()
    }

    fn step<F: System<OVector<T, D>>>(
        &self,
        f: &F,
        x: f64,
        y: &OVector<T, D>,
        h: f64,
    ) -> (OVector<T, D>, OVector<T, D>) {
        bs32::TABLEAU.evaluate(f, x, y, h)
    }
}

/// Adaptive integrator using the Bogacki-Shampine 3(2) pair.
pub type Bs23<V, F> = Integrator<BogackiShampine, V, F>;

impl<T, D: Dim, F> Integrator<BogackiShampine, OVector<T, D>, F>
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
        Integrator::with_method(BogackiShampine, f, x, x_end, y, Tolerance::new(atol, rtol))
    }
}
