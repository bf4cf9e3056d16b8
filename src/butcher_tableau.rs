//! Butcher tableaux of the explicit embedded Runge-Kutta pairs and the shared stage evaluation.

use crate::dop_shared::System;

use nalgebra::{allocator::Allocator, storage::Storage, DefaultAllocator, Dim, OVector, Scalar};
use num_traits::Zero;
use simba::scalar::{ClosedAdd, ClosedMul, SupersetOf};

/// Coefficients of an explicit embedded Runge-Kutta pair.
///
/// Row `i` of `a` holds the coefficients `a_ij` for `j < i`. `e` holds the
/// differences `b_j - b*_j` between the propagated and the embedded weights.
#[derive(Debug)]
pub struct Tableau {
    pub c: &'static [f64],
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub e: &'static [f64],
}

impl Tableau {
    /// Number of stages.
    pub fn stages(&self) -> usize {
        self.c.len()
    }

    /// Evaluates all stages of a step of size `h` from `(x, y)`.
    ///
    /// Returns `y + h * sum(b_j k_j)` and the error vector `sum(e_j k_j)`.
    pub fn evaluate<T, D, F>(
        &self,
        f: &F,
        x: f64,
        y: &OVector<T, D>,
        h: f64,
    ) -> (OVector<T, D>, OVector<T, D>)
    where
        T: Scalar + Copy + Zero + ClosedAdd + ClosedMul + SupersetOf<f64>,
        D: Dim,
        F: System<OVector<T, D>>,
        DefaultAllocator: Allocator<T, D>,
    {
        let (rows, cols) = y.data.shape();
        let mut k = vec![OVector::zeros_generic(rows, cols); self.stages()];

        for s in 0..self.stages() {
            let mut y_stage = y.clone();
            for (j, k_value) in k.iter().enumerate().take(s) {
                y_stage += k_value * T::from_subset(&(h * self.a[s][j]));
            }
            f.system(x + self.c[s] * h, &y_stage, &mut k[s]);
        }

        let mut y_next = y.clone();
        let mut te = OVector::zeros_generic(rows, cols);
        for (j, k_value) in k.iter().enumerate() {
            y_next += k_value * T::from_subset(&(h * self.b[j]));
            te += k_value * T::from_subset(&self.e[j]);
        }
        (y_next, te)
    }
}

/// Dormand-Prince 5(4).
pub mod dopri54 {
    use super::Tableau;

    /// Order of the embedded error estimate
    pub const ERROR_ORDER: u32 = 4;

    pub const TABLEAU: Tableau = Tableau {
        c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
        a: &[
            &[],
            &[1.0 / 5.0],
            &[3.0 / 40.0, 9.0 / 40.0],
            &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
            &[
                19372.0 / 6561.0,
                -25360.0 / 2187.0,
                64448.0 / 6561.0,
                -212.0 / 729.0,
            ],
            &[
                9017.0 / 3168.0,
                -355.0 / 33.0,
                46732.0 / 5247.0,
                49.0 / 176.0,
                -5103.0 / 18656.0,
            ],
            &[
                35.0 / 384.0,
                0.0,
                500.0 / 1113.0,
                125.0 / 192.0,
                -2187.0 / 6784.0,
                11.0 / 84.0,
            ],
        ],
        b: &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
            0.0,
        ],
        e: &[
            71.0 / 57600.0,
            0.0,
            -71.0 / 16695.0,
            71.0 / 1920.0,
            -17253.0 / 339200.0,
            22.0 / 525.0,
            -1.0 / 40.0,
        ],
    };
}

/// Bogacki-Shampine 3(2).
pub mod bs32 {
    use super::Tableau;

    /// Order of the embedded error estimate
    pub const ERROR_ORDER: u32 = 2;

    pub const TABLEAU: Tableau = Tableau {
        c: &[0.0, 1.0 / 2.0, 3.0 / 4.0, 1.0],
        a: &[
            &[],
            &[1.0 / 2.0],
            &[0.0, 3.0 / 4.0],
            &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
        ],
        b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
        e: &[-5.0 / 72.0, 1.0 / 12.0, 1.0 / 9.0, -1.0 / 8.0],
    };
}
