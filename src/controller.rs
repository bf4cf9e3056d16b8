//! Adaptive step size control.

use crate::constants::controller::{FAC_MAX, FAC_MIN, SAFETY_FACTOR};

/// Used for adaptive step size control
#[derive(Clone, Debug)]
pub struct Controller {
    exponent: f64,
    fac_max: f64,
    fac_min: f64,
    reject: bool,
    safety_factor: f64,
}

impl Controller {
    /// Creates a controller responsible for adaptive step size control.
    ///
    /// # Arguments
    ///
    /// * `error_order` - Order of the embedded error estimate of the method
    /// * `fac_max` - Maximum factor between two successive steps
    /// * `fac_min` - Minimum factor between two successive steps
    /// * `safety_factor`   - Safety factor applied to the optimal step size
    ///
    pub fn new(error_order: u32, fac_max: f64, fac_min: f64, safety_factor: f64) -> Controller {
        Controller {
            exponent: -1.0 / (f64::from(error_order) + 1.0),
            fac_max,
            fac_min,
            reject: false,
            safety_factor,
        }
    }

    /// Controller with the default safety factor and step factor bounds.
    pub fn with_error_order(error_order: u32) -> Controller {
        Controller::new(error_order, FAC_MAX, FAC_MIN, SAFETY_FACTOR)
    }

    /// Determines if the step must be accepted or rejected and adapts the step size accordingly.
    ///
    /// On acceptance `h_new` is the proposal for the next step, on rejection the
    /// size to retry the current step with. A NaN error norm is a rejection.
    pub fn accept(&mut self, err: f64, h: f64, h_new: &mut f64) -> bool {
        if !err.is_nan() && err < 1.0 {
            // Accept step
            let mut fac = if err == 0.0 {
                self.fac_max
            } else {
                (self.safety_factor * err.powf(self.exponent)).min(self.fac_max)
            };
            // No growth right after a rejection
            if self.reject {
                fac = fac.min(1.0);
            }

            *h_new = h * fac;
            self.reject = false;
            true
        } else {
            // Reject step
            let fac = if err.is_finite() {
                (self.safety_factor * err.powf(self.exponent)).max(self.fac_min)
            } else {
                self.fac_min
            };

            *h_new = h * fac;
            self.reject = true;
            false
        }
    }

    /// Whether the last attempted step was rejected.
    pub fn rejected(&self) -> bool {
        self.reject
    }
}
