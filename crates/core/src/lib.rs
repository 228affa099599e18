//! Material-response engine for a 2D FDTD solver.
//!
//! A [`MaterialStack`](material::MaterialStack) turns a flux-density pair
//! (D or B) into the matching field pair (E or H) by compositing masked
//! layers of response functions. Lossy responses keep per-cell memory across
//! time steps. Evaluation is delegated to a
//! [`MaterialBackend`](backend::MaterialBackend) so the same stack runs on
//! host arrays or device-resident buffers.

pub mod backend;
pub mod config;
pub mod error;
pub mod field;
pub mod grid;
pub mod mask;
pub mod material;
pub mod reference;
pub mod response;
pub mod units;

pub use error::MaterialError;

#[cfg(test)]
mod _tests_material;
