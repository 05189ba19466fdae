/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
pub mod error;
pub mod signal;
pub mod noise;
pub mod prototype;
pub mod design;
pub mod filter;
pub mod lms;
pub mod fft;
pub mod wiener;
pub mod metrics;
pub mod wav;

pub use error::{DspError, Result};

#[cfg(test)]
const _EPSILON: f64 = 1e-12;
