//! Uniform grid helpers.

use serde::{Deserialize, Serialize};

use crate::error::MaterialError;

/// Relative tolerance used when checking that an extent is a whole number of cells.
const CELL_COUNT_TOLERANCE: f64 = 1e-9;

/// Canonical shape and spacing shared by every array of one simulation.
///
/// Cells are stored x-fastest: `idx(ix, iy) = iy * nx + ix`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    pub nx: usize,
    pub ny: usize,
    #[serde(default = "default_spacing")]
    pub dx: f64,
    #[serde(default = "default_spacing")]
    pub dy: f64,
}

impl Grid2D {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Self { nx, ny, dx, dy }
    }

    /// Derive the grid from physical extents and cell spacing.
    ///
    /// `size / delta` must be a positive whole number on both axes.
    pub fn from_extent(size: [f64; 2], delta: [f64; 2]) -> Result<Self, MaterialError> {
        let nx = cell_count("x", size[0], delta[0])?;
        let ny = cell_count("y", size[1], delta[1])?;
        Ok(Self::new(nx, ny, delta[0], delta[1]))
    }

    #[inline]
    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Physical size covered by the grid.
    pub fn extent(&self) -> [f64; 2] {
        [self.nx as f64 * self.dx, self.ny as f64 * self.dy]
    }

    /// Physical position of the lower corner of cell `(ix, iy)`.
    #[inline]
    pub fn cell_position(&self, ix: usize, iy: usize) -> [f64; 2] {
        [ix as f64 * self.dx, iy as f64 * self.dy]
    }

    pub fn same_shape(&self, other: &Grid2D) -> bool {
        self.shape() == other.shape()
    }
}

fn cell_count(axis: &str, size: f64, delta: f64) -> Result<usize, MaterialError> {
    if !(delta.is_finite() && delta > 0.0) {
        return Err(MaterialError::InvalidGeometry(format!(
            "spacing along {axis} must be finite and positive, got {delta}"
        )));
    }
    if !(size.is_finite() && size > 0.0) {
        return Err(MaterialError::InvalidGeometry(format!(
            "extent along {axis} must be finite and positive, got {size}"
        )));
    }
    let ratio = size / delta;
    let rounded = ratio.round();
    if rounded < 1.0 || (ratio - rounded).abs() > CELL_COUNT_TOLERANCE * rounded.max(1.0) {
        return Err(MaterialError::InvalidGeometry(format!(
            "extent {size} along {axis} is not a whole number of cells of size {delta}"
        )));
    }
    Ok(rounded as usize)
}

fn default_spacing() -> f64 {
    1.0
}
