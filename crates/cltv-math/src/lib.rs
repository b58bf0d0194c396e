//! CLTV math utilities.
//!
//! Special functions, a simplex optimizer and population statistics shared
//! by the BG/NBD and Gamma-Gamma estimators.

pub mod math;

pub use math::hypergeometric::*;
pub use math::optimize::{Minimum, NelderMead};
pub use math::stable::*;
pub use math::stats::*;
