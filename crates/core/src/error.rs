//! Error taxonomy shared by the stack and every backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("invalid grid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid layer specification: {0}")]
    InvalidLayer(String),

    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),

    #[error("kernel build failed:\n{log}")]
    KernelBuild { log: String },

    #[error("no compute device available")]
    DeviceUnavailable,

    #[error("device error: {0}")]
    Device(String),
}

impl MaterialError {
    pub fn shape_mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::ShapeMismatch { expected, found }
    }
}
