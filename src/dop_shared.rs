//! Shared traits and structures for the embedded Runge-Kutta integrators.

use crate::constants;

use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, OVector, Scalar};
use std::fmt;
use thiserror::Error;

/// Trait needed to be implemented by the user.
pub trait System<V> {
    /// System of ordinary differential equations.
    ///
    /// May be called several times per step with intermediate, non-monotonic values of `x`.
    fn system(&self, x: f64, y: &V, dy: &mut V);
}

/// An embedded Runge-Kutta pair: one set of stage evaluations yields both the
/// solution of the step and an estimate of its local truncation error.
pub trait EmbeddedRungeKutta<V> {
    /// Order of the embedded error estimate, used in the step size scaling exponent.
    fn error_order(&self) -> u32;

    /// Number of derivative evaluations performed by one call to [`step`](Self::step).
    fn stages(&self) -> usize;

    /// Computes one trial step of size `h` from `(x, y)`.
    ///
    /// Returns the trial state at `x + h` and the local error vector. The error
    /// vector is not yet multiplied by `h`.
    fn step<F: System<V>>(&self, f: &F, x: f64, y: &V, h: f64) -> (V, V);
}

/// Enumeration of the errors that may arise during integration.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum IntegrationError {
    #[error("Stopped at x = {x}. Step size h = {h} is too small to meet the tolerance.")]
    StepTooSmall { x: f64, h: f64 },
}

/// Absolute and relative tolerance used for the adaptive step size control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerance {
    pub fn new(abs: f64, rel: f64) -> Self {
        Tolerance { abs, rel }
    }

    /// Scaled RMS norm of the local error `te * h`.
    ///
    /// Components are scaled by `abs + rel * max(|y_i|, |y_next_i|)`. A step
    /// exactly at the tolerance boundary has a norm of 1. An empty state has a norm of 0.
    pub fn error_norm<T, D>(
        &self,
        te: &OVector<T, D>,
        y: &OVector<T, D>,
        y_next: &OVector<T, D>,
        h: f64,
    ) -> f64
    where
        f64: From<T>,
        T: Scalar + Copy,
        D: Dim,
        DefaultAllocator: Allocator<T, D>,
    {
        let dim = y.len();
        let mut err = 0.0;
        for i in 0..dim {
            let y_i = f64::from(y[i]);
            let y_next_i = f64::from(y_next[i]);
            let sc_i = self.abs + y_i.abs().max(y_next_i.abs()) * self.rel;
            let err_i = f64::from(te[i]) * h / sc_i;
            err += err_i * err_i;
        }
        rms(err, dim)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            abs: constants::tolerance::ABS,
            rel: constants::tolerance::REL,
        }
    }
}

/// Root mean square from a sum of squares over `dim` components.
pub(crate) fn rms(sum_of_squares: f64, dim: usize) -> f64 {
    if dim == 0 {
        0.0
    } else {
        (sum_of_squares / dim as f64).sqrt()
    }
}

/// Distance from `x` to the next larger representable value.
pub(crate) fn ulp(x: f64) -> f64 {
    let next = if x == 0.0 {
        f64::from_bits(1)
    } else if x > 0.0 {
        f64::from_bits(x.to_bits() + 1)
    } else {
        f64::from_bits(x.to_bits() - 1)
    };
    (next - x).abs()
}

/// Contains some statistics of the integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub num_eval: u32,
    pub accepted_steps: u32,
    pub rejected_steps: u32,
}

impl Stats {
    pub(crate) fn new() -> Stats {
        Stats {
            num_eval: 0,
            accepted_steps: 0,
            rejected_steps: 0,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Number of function evaluations: {}", self.num_eval)?;
        writeln!(f, "Number of accepted steps: {}", self.accepted_steps)?;
        write!(f, "Number of rejected steps: {}", self.rejected_steps)
    }
}

/// Accepted trajectory of an integration.
///
/// `x[i]` is strictly increasing and `y[i]` is the state at `x[i]`.
#[derive(Clone, Debug)]
pub struct Solution<V> {
    pub x: Vec<f64>,
    pub y: Vec<V>,
    pub stats: Stats,
}

impl<V> Solution<V> {
    /// Number of points in the trajectory.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Final point of the trajectory.
    pub fn last(&self) -> Option<(f64, &V)> {
        self.x.last().copied().zip(self.y.last())
    }
}
