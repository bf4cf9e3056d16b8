//! # Embedded Runge-Kutta
//! `embedded_rk` solves initial value problems `dy/dx = f(x, y)` with adaptive step size
//! embedded Runge-Kutta pairs. Dormand-Prince 5(4) is the default method.

// Re-export from external crate
use nalgebra as na;
pub use crate::na::{DVector, OVector, Vector1, Vector2, Vector3, Vector4, Vector5, Vector6};

// Declare modules
pub mod bs23;
pub mod butcher_tableau;
pub mod constants;
pub mod controller;
pub mod dop_shared;
pub mod dopri5;
pub mod integrator;

pub use bs23::{BogackiShampine, Bs23};
pub use dopri5::{Dopri5, DormandPrince};
pub use integrator::{integrate, Integrator};

pub use dop_shared::{EmbeddedRungeKutta, IntegrationError, Solution, Stats, System, Tolerance};
