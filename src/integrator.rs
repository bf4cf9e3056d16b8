//! Adaptive step size driver shared by all embedded Runge-Kutta methods.

use crate::constants::controller::MIN_STEP_ULPS;
use crate::constants::initial_step::{
    DEFAULT_INITIAL_STEP, MIN_DERIVATIVE_NORM, MIN_STATE_NORM, NEGLIGIBLE_NORM, SAFETY_FACTOR,
};
use crate::controller::Controller;
use crate::dop_shared::*;
use crate::dopri5::Dopri5;

use log::{debug, warn};
use nalgebra::{allocator::Allocator, storage::Storage, DefaultAllocator, Dim, OVector, Scalar};
use num_traits::Zero;
use simba::scalar::{ClosedAdd, ClosedMul, SupersetOf};

/// Structure containing the parameters for the numerical integration.
pub struct Integrator<M, V, F>
where
    F: System<V>,
{
    method: M,
    f: F,
    x: f64,
    x_end: f64,
    y: V,
    tol: Tolerance,
    x_out: Vec<f64>,
    y_out: Vec<V>,
    h: f64,
    controller: Controller,
    stats: Stats,
}

impl<M, T, D: Dim, F> Integrator<M, OVector<T, D>, F>
where
    f64: From<T>,
    T: Scalar + Copy + Zero + ClosedAdd + ClosedMul + SupersetOf<f64>,
    M: EmbeddedRungeKutta<OVector<T, D>>,
    F: System<OVector<T, D>>,
    DefaultAllocator: Allocator<T, D>,
{
    /// Creates an integrator for an arbitrary embedded method with the default controller.
    ///
    /// # Arguments
    ///
    /// * `method`  - Embedded Runge-Kutta pair used for each step
    /// * `f`       - Structure implementing the System<V> trait
    /// * `x`       - Initial value of the independent variable (usually time)
    /// * `x_end`   - Final value of the independent variable
    /// * `y`       - Initial value of the dependent variable(s)
    /// * `tolerance`   - Absolute and relative tolerance of the adaptive step size control
    ///
    pub fn with_method(
        method: M,
        f: F,
        x: f64,
        x_end: f64,
        y: OVector<T, D>,
        tolerance: Tolerance,
    ) -> Self {
        let controller = Controller::with_error_order(method.error_order());
        Self::from_parts(method, f, x, x_end, y, tolerance, controller, 0.0)
    }

    /// Creates an integrator from a configured controller.
    ///
    /// If `h` is not strictly positive, the initial step size is computed automatically.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        method: M,
        f: F,
        x: f64,
        x_end: f64,
        y: OVector<T, D>,
        tolerance: Tolerance,
        controller: Controller,
        h: f64,
    ) -> Self {
        Self {
            method,
            f,
            x,
            x_end,
            y,
            tol: tolerance,
            x_out: Vec::new(),
            y_out: Vec::new(),
            h,
            controller,
            stats: Stats::new(),
        }
    }

    /// Compute the initial stepsize
    fn hinit(&self) -> f64 {
        let (rows, cols) = self.y.data.shape();
        let span = self.x_end - self.x;
        let mut f0 = OVector::zeros_generic(rows, cols);
        self.f.system(self.x, &self.y, &mut f0);

        // Compute the norm of y0 and f0
        let dim = rows.value();
        let mut d0 = 0.0;
        let mut d1 = 0.0;
        for i in 0..dim {
            let y_i = f64::from(self.y[i]);
            let sci = self.tol.abs + y_i.abs() * self.tol.rel;
            d0 += (y_i / sci) * (y_i / sci);
            let f0_i = f64::from(f0[i]);
            d1 += (f0_i / sci) * (f0_i / sci);
        }
        let d0 = rms(d0, dim);
        let d1 = rms(d1, dim);

        // Compute h0
        let mut h0 = if d0 < MIN_STATE_NORM || d1 < MIN_DERIVATIVE_NORM {
            DEFAULT_INITIAL_STEP
        } else {
            SAFETY_FACTOR * d0 / d1
        };
        h0 = h0.min(span);

        // Explicit Euler step to estimate the second derivative
        let y1 = &self.y + &f0 * T::from_subset(&h0);
        let mut f1 = OVector::zeros_generic(rows, cols);
        self.f.system(self.x + h0, &y1, &mut f1);

        // Compute the norm of f1-f0 divided by h0
        let mut d2 = 0.0;
        for i in 0..dim {
            let y_i = f64::from(self.y[i]);
            let sci = self.tol.abs + y_i.abs() * self.tol.rel;
            let df_i = (f64::from(f1[i]) - f64::from(f0[i])) / sci;
            d2 += df_i * df_i;
        }
        let d2 = rms(d2, dim) / h0;

        let h1 = if d1 <= NEGLIGIBLE_NORM && d2 <= NEGLIGIBLE_NORM {
            DEFAULT_INITIAL_STEP.max(h0 * 1.0E-3)
        } else {
            let order = self.method.error_order() as f64;
            (SAFETY_FACTOR / d1.max(d2)).powf(1.0 / (order + 1.0))
        };

        (100.0 * h0).min(h1).min(span)
    }

    /// Core integration method.
    ///
    /// On success the output holds every accepted point from the initial value to
    /// `x_end` included. On failure it holds the points accepted before the failure.
    pub fn integrate(&mut self) -> Result<Stats, IntegrationError> {
        // Save initial values
        self.x_out.clear();
        self.y_out.clear();
        self.x_out.push(self.x);
        self.y_out.push(self.y.clone());

        if self.x >= self.x_end {
            return Ok(self.stats);
        }

        if !(self.h > 0.0) {
            self.h = self.hinit();
            self.stats.num_eval += 2;
            debug!("initial step size h = {:e} at x = {}", self.h, self.x);
        }

        // Main loop
        while self.x < self.x_end {
            let (x_next, y_next, h_next) = self.step()?;
            self.stats.accepted_steps += 1;

            self.x_out.push(x_next);
            self.y_out.push(y_next.clone());

            self.x = x_next;
            self.y = y_next;
            self.h = h_next;
        }
        Ok(self.stats)
    }

    /// Attempts steps from the current point until one is accepted.
    ///
    /// Returns the new point and the step size proposed for the next step.
    fn step(&mut self) -> Result<(f64, OVector<T, D>, f64), IntegrationError> {
        let min_step = MIN_STEP_ULPS * ulp(self.x);
        let mut h = self.h;
        loop {
            // Also catches a NaN step size
            if !(h >= min_step) {
                warn!("step size underflow at x = {}: h = {:e}", self.x, h);
                return Err(IntegrationError::StepTooSmall { x: self.x, h });
            }

            // Land exactly on x_end
            let mut x_next = self.x + h;
            if x_next > self.x_end {
                x_next = self.x_end;
                h = x_next - self.x;
            }

            let (y_next, te) = self.method.step(&self.f, self.x, &self.y, h);
            self.stats.num_eval += self.method.stages() as u32;

            let err = self.tol.error_norm(&te, &self.y, &y_next, h);
            let mut h_new = 0.0;
            if self.controller.accept(err, h, &mut h_new) {
                return Ok((x_next, y_next, h_new));
            }

            self.stats.rejected_steps += 1;
            debug!(
                "step rejected at x = {}: h = {:e}, error norm = {:e}",
                self.x, h, err
            );
            h = h_new;
        }
    }

    /// Getter for the independent variable's output.
    pub fn x_out(&self) -> &Vec<f64> {
        &self.x_out
    }

    /// Getter for the dependent variables' output.
    pub fn y_out(&self) -> &Vec<OVector<T, D>> {
        &self.y_out
    }

    /// Getter for the integration statistics.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Consumes the integrator and returns its output.
    pub fn into_solution(self) -> Solution<OVector<T, D>> {
        Solution {
            x: self.x_out,
            y: self.y_out,
            stats: self.stats,
        }
    }
}

/// Adapts a closure to the System<V> trait.
struct FnSystem<G>(G);

impl<V, G> System<V> for FnSystem<G>
where
    G: Fn(f64, &V, &mut V),
{
    fn system(&self, x: f64, y: &V, dy: &mut V) {
        (self.0)(x, y, dy)
    }
}

/// Integrates `dy/dx = f(x, y)` from `x_span.0` to `x_span.1` with the Dormand-Prince 5(4) method.
///
/// `f` writes the derivative at `(x, y)` into its last argument. Without a
/// tolerance, `abs = 1e-6` and `rel = 1e-3` are used. On failure no trajectory is returned.
///
/// # Example
///
/// ```
/// use embedded_rk::{integrate, Vector2};
///
/// let solution = integrate(
///     |_x, y: &Vector2<f64>, dy: &mut Vector2<f64>| {
///         dy[0] = -y[1];
///         dy[1] = y[0];
///     },
///     (0.0, 4.0),
///     Vector2::new(1.0, 1.0),
///     None,
/// )
/// .unwrap();
/// assert_eq!(solution.x.last(), Some(&4.0));
/// ```
pub fn integrate<T, D, G>(
    f: G,
    x_span: (f64, f64),
    y0: OVector<T, D>,
    tolerance: Option<Tolerance>,
) -> Result<Solution<OVector<T, D>>, IntegrationError>
where
    f64: From<T>,
    T: Scalar + Copy + Zero + ClosedAdd + ClosedMul + SupersetOf<f64>,
    D: Dim,
    G: Fn(f64, &OVector<T, D>, &mut OVector<T, D>),
    DefaultAllocator: Allocator<T, D>,
{
    let tol = tolerance.unwrap_or_default();
    let mut stepper = Dopri5::new(FnSystem(f), x_span.0, x_span.1, y0, tol.rel, tol.abs);
    stepper.integrate()?;
    Ok(stepper.into_solution())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dopri5::DormandPrince;
    use crate::{DVector, Vector1, Vector2};
    use approx::assert_relative_eq;
    use std::cell::{Cell, RefCell};

    struct Decay;
    impl System<Vector1<f64>> for Decay {
        fn system(&self, _x: f64, y: &Vector1<f64>, dy: &mut Vector1<f64>) {
            dy[0] = -y[0];
        }
    }

    struct Constant;
    impl System<Vector1<f64>> for Constant {
        fn system(&self, _x: f64, _y: &Vector1<f64>, dy: &mut Vector1<f64>) {
            dy[0] = 0.0;
        }
    }

    struct Stiff;
    impl System<Vector1<f64>> for Stiff {
        fn system(&self, x: f64, y: &Vector1<f64>, dy: &mut Vector1<f64>) {
            dy[0] = -50.0 * (y[0] - x.cos());
        }
    }

    /// Method whose error norms follow a fixed script, recording the step sizes it is asked for.
    struct Scripted {
        norms: Vec<f64>,
        calls: Cell<usize>,
        steps: RefCell<Vec<f64>>,
    }

    impl EmbeddedRungeKutta<Vector1<f64>> for Scripted {
        fn error_order(&self) -> u32 {
            4
        }

        fn stages(&self) -> usize {
            1
        }

        fn step<F: System<Vector1<f64>>>(
            &self,
            _f: &F,
            _x: f64,
            y: &Vector1<f64>,
            h: f64,
        ) -> (Vector1<f64>, Vector1<f64>) {
            let i = self.calls.get();
            self.calls.set(i + 1);
            self.steps.borrow_mut().push(h);
            let norm = self.norms.get(i).copied().unwrap_or(0.0);
            // with abs = 1, rel = 0 the error norm is |te * h|
            (*y, Vector1::new(norm / h))
        }
    }

    fn dopri(f: Decay, x: f64, x_end: f64) -> Integrator<DormandPrince, Vector1<f64>, Decay> {
        Integrator::with_method(DormandPrince, f, x, x_end, Vector1::new(1.0), Tolerance::default())
    }

    #[test]
    fn test_hinit_bounded_by_span() {
        let stepper = dopri(Decay, 0.0, 1e-3);
        let h = stepper.hinit();
        assert!(h > 0.0);
        assert!(h <= 1e-3);
    }

    #[test]
    fn test_hinit_heuristic() {
        // d0 = 1/(1e-6 + 1e-3), d1 = d0, so h0 = 0.01; the Euler probe gives
        // d2 = d1 and h1 = (0.01 / d1)^(1/5)
        let stepper = dopri(Decay, 0.0, 10.0);
        let sc = 1e-6 + 1e-3;
        let d1: f64 = 1.0 / sc;
        let h1 = (0.01 / d1).powf(0.2);
        assert_relative_eq!(stepper.hinit(), h1.min(1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_hinit_stationary_problem() {
        let stepper = Integrator::with_method(
            DormandPrince,
            Constant,
            0.0,
            1.0,
            Vector1::new(0.0),
            Tolerance::default(),
        );
        // h0 = 1e-6 and h1 = max(1e-6, 1e-9)
        assert_relative_eq!(stepper.hinit(), 1e-6);
    }

    #[test]
    fn test_step_sizes_follow_scripted_error_norms() {
        let method = Scripted {
            norms: vec![2.0, 0.5, 1.0 / 32.0, 0.0],
            calls: Cell::new(0),
            steps: RefCell::new(Vec::new()),
        };
        let mut stepper = Integrator::from_parts(
            method,
            Constant,
            0.0,
            1000.0,
            Vector1::new(0.0),
            Tolerance::new(1.0, 0.0),
            Controller::with_error_order(4),
            1.0,
        );
        let stats = stepper.integrate().unwrap();
        assert_eq!(stats.rejected_steps, 1);
        assert_eq!(*stepper.x_out().last().unwrap(), 1000.0);

        let h = stepper.method.steps.borrow().clone();
        // rejected: shrink by 0.9 * 2^(-1/5)
        let h1 = 0.9 * 2.0_f64.powf(-0.2);
        assert_relative_eq!(h[1], h1, epsilon = 1e-12);
        // accepted right after a rejection: no growth
        assert_relative_eq!(h[2], h1, epsilon = 1e-12);
        // accepted with err = 1/32: growth by 1.8
        assert_relative_eq!(h[3], 1.8 * h1, epsilon = 1e-12);
        // accepted with err = 0: growth by fac_max
        assert_relative_eq!(h[4], 18.0 * h1, epsilon = 1e-12);
        assert_eq!(stepper.x_out()[1], h1);
    }

    #[test]
    fn test_empty_span_returns_initial_point() {
        let mut stepper = dopri(Decay, 1.0, 1.0);
        let stats = stepper.integrate().unwrap();
        assert_eq!(stepper.x_out(), &vec![1.0]);
        assert_eq!(stats.num_eval, 0);

        let mut backwards = dopri(Decay, 1.0, 0.0);
        backwards.integrate().unwrap();
        assert_eq!(backwards.x_out().len(), 1);
    }

    #[test]
    fn test_statistics() {
        let mut stepper = dopri(Decay, 0.0, 1.0);
        let stats = stepper.integrate().unwrap();
        let attempts = stats.accepted_steps + stats.rejected_steps;
        assert_eq!(stats.num_eval, 2 + 7 * attempts);
        assert_eq!(stats.accepted_steps as usize, stepper.x_out().len() - 1);
    }

    #[test]
    fn test_user_initial_step_is_used() {
        let mut stepper = Integrator::from_parts(
            DormandPrince,
            Decay,
            0.0,
            1.0,
            Vector1::new(1.0),
            Tolerance::default(),
            Controller::with_error_order(4),
            0.25,
        );
        let stats = stepper.integrate().unwrap();
        assert_eq!(stepper.x_out()[1], 0.25);
        assert_eq!(stats.num_eval, 7 * (stats.accepted_steps + stats.rejected_steps));
    }

    #[test]
    fn test_rejected_steps_recover() {
        let mut stepper = Integrator::from_parts(
            DormandPrince,
            Stiff,
            0.0,
            2.0,
            Vector1::new(0.0),
            Tolerance::default(),
            Controller::with_error_order(4),
            1.0,
        );
        let stats = stepper.integrate().unwrap();
        assert!(stats.rejected_steps > 0);
        assert_eq!(*stepper.x_out().last().unwrap(), 2.0);
    }

    #[test]
    fn test_zero_dimensional_system_terminates() {
        let solution = integrate(
            |_x, _y: &DVector<f64>, _dy: &mut DVector<f64>| {},
            (0.0, 1.0),
            DVector::from_vec(vec![]),
            None,
        )
        .unwrap();
        assert_eq!(*solution.x.last().unwrap(), 1.0);
    }

    #[test]
    fn test_closure_entry_point() {
        let solution = integrate(
            |_x, y: &Vector2<f64>, dy: &mut Vector2<f64>| {
                dy[0] = y[1];
                dy[1] = -y[0];
            },
            (0.0, 1.0),
            Vector2::new(0.0, 1.0),
            Some(Tolerance::new(1e-10, 1e-10)),
        )
        .unwrap();
        let (x, y) = solution.last().unwrap();
        assert_eq!(x, 1.0);
        assert_relative_eq!(y[0], 1.0_f64.sin(), epsilon = 1e-8);
        assert_eq!(solution.len(), solution.y.len());
    }
}
