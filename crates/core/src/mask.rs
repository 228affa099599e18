//! Layer masks.
//!
//! A mask is a grid-shaped array of per-cell blend weights. Masks built from
//! ranges are 0/1; masks supplied as arrays or predicates may carry any
//! finite weight, which is how graded boundaries are expressed.

use std::fmt;

use crate::error::MaterialError;
use crate::field::Field2D;
use crate::grid::Grid2D;

/// Half-open interval `[start, stop)` along one axis, in physical units.
///
/// A missing bound extends to the edge of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisRange {
    pub start: Option<f64>,
    pub stop: Option<f64>,
}

impl AxisRange {
    pub fn new(start: f64, stop: f64) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
        }
    }

    pub fn full() -> Self {
        Self::default()
    }

    pub fn starting_at(start: f64) -> Self {
        Self {
            start: Some(start),
            stop: None,
        }
    }

    pub fn ending_at(stop: f64) -> Self {
        Self {
            start: None,
            stop: Some(stop),
        }
    }

    /// Convert to a cell index range on an axis of `n` cells with spacing `delta`.
    ///
    /// A bound within rounding error of a cell boundary snaps to it; any other
    /// bound truncates to the cell that contains it. Indices clamp to `[0, n]`.
    /// A zero bound is a real bound at the origin, not an open edge.
    pub fn to_indices(&self, delta: f64, n: usize) -> Result<(usize, usize), MaterialError> {
        let start = match self.start {
            Some(bound) => scale_bound(bound, delta, n)?,
            None => 0,
        };
        let stop = match self.stop {
            Some(bound) => scale_bound(bound, delta, n)?,
            None => n,
        };
        Ok((start, stop.max(start)))
    }
}

/// Relative distance from a cell boundary still treated as on the boundary.
const BOUND_SNAP_TOLERANCE: f64 = 1e-9;

fn scale_bound(bound: f64, delta: f64, n: usize) -> Result<usize, MaterialError> {
    if !bound.is_finite() || bound < 0.0 {
        return Err(MaterialError::InvalidLayer(format!(
            "range bound must be finite and non-negative, got {bound}"
        )));
    }
    let ratio = bound / delta;
    let nearest = ratio.round();
    let index = if (ratio - nearest).abs() <= BOUND_SNAP_TOLERANCE * nearest.max(1.0) {
        nearest
    } else {
        ratio.floor()
    };
    Ok((index as usize).min(n))
}

pub type MaskPredicate = Box<dyn Fn(f64, f64) -> f64>;

/// How a layer's mask is declared.
pub enum MaskSpec {
    /// Pre-built weights of grid shape, used as is.
    Array(Field2D),
    /// Ones inside the `(x, y)` ranges, zeros elsewhere.
    Range(AxisRange, AxisRange),
    /// Weight evaluated at the physical position of every cell.
    Predicate(MaskPredicate),
}

impl MaskSpec {
    pub fn from_array(weights: Field2D) -> Self {
        Self::Array(weights)
    }

    pub fn from_range(x: AxisRange, y: AxisRange) -> Self {
        Self::Range(x, y)
    }

    pub fn from_predicate<F>(predicate: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + 'static,
    {
        Self::Predicate(Box::new(predicate))
    }

    /// Mask covering the whole grid.
    pub fn full() -> Self {
        Self::Range(AxisRange::full(), AxisRange::full())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Range(..) => "range",
            Self::Predicate(_) => "predicate",
        }
    }

    /// Evaluate the mask on `grid`.
    pub fn build(self, grid: Grid2D) -> Result<Field2D, MaterialError> {
        let mask = match self {
            Self::Array(weights) => {
                if weights.shape() != grid.shape() {
                    return Err(MaterialError::shape_mismatch(grid.shape(), weights.shape()));
                }
                Field2D::from_vec(grid, weights.into())
            }
            Self::Range(x, y) => {
                let (x0, x1) = x.to_indices(grid.dx, grid.nx)?;
                let (y0, y1) = y.to_indices(grid.dy, grid.ny)?;
                let mut mask = Field2D::zeros(grid);
                for iy in y0..y1 {
                    for ix in x0..x1 {
                        mask.set(ix, iy, 1.0);
                    }
                }
                mask
            }
            Self::Predicate(predicate) => Field2D::from_fn(grid, |x, y| predicate(x, y)),
        };

        if let Some(bad) = mask.as_slice().iter().find(|w| !w.is_finite()) {
            return Err(MaterialError::InvalidLayer(format!(
                "mask weights must be finite, found {bad}"
            )));
        }
        Ok(mask)
    }
}

impl fmt::Debug for MaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(weights) => f.debug_tuple("Array").field(&weights.shape()).finish(),
            Self::Range(x, y) => f.debug_tuple("Range").field(x).field(y).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Field2D> for MaskSpec {
    fn from(weights: Field2D) -> Self {
        Self::Array(weights)
    }
}

impl From<(AxisRange, AxisRange)> for MaskSpec {
    fn from((x, y): (AxisRange, AxisRange)) -> Self {
        Self::Range(x, y)
    }
}

/// Fraction of cells with non-zero weight.
pub fn coverage(mask: &Field2D) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    let covered = mask.as_slice().iter().filter(|w| **w != 0.0).count();
    covered as f64 / mask.len() as f64
}
