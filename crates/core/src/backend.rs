//! Backend traits for elementwise material evaluation.
//!
//! A backend owns the storage of every grid-shaped array the material stack
//! works with and supplies the handful of per-cell operations the stack and
//! the built-in responses are written against. Host backends store
//! [`Field2D`] directly; device backends keep their buffers resident and only
//! cross to the host through [`MaterialBackend::upload`] and
//! [`MaterialBackend::download`].
//!
//! Every operation is independent per cell, so a backend is free to
//! evaluate cells in any order or in parallel. Results must agree with
//! [`crate::reference::ReferenceBackend`] up to floating-point rounding.

use crate::error::MaterialError;
use crate::field::Field2D;
use crate::grid::Grid2D;

pub trait MaterialBuffer {
    fn len(&self) -> usize;
    fn grid(&self) -> Grid2D;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self) -> (usize, usize) {
        self.grid().shape()
    }
}

impl MaterialBuffer for Field2D {
    fn len(&self) -> usize {
        self.len()
    }

    fn grid(&self) -> Grid2D {
        self.grid()
    }
}

pub trait MaterialBackend {
    type Buffer: MaterialBuffer;

    /// Short identifier used in log output.
    fn name(&self) -> &'static str;

    /// Allocate a zero-filled buffer of the given grid shape.
    fn alloc_field(&self, grid: Grid2D) -> Result<Self::Buffer, MaterialError>;

    /// Copy a host array into backend storage.
    fn upload(&self, field: &Field2D) -> Result<Self::Buffer, MaterialError>;

    /// Copy backend storage back to a host array.
    fn download(&self, buffer: &Self::Buffer) -> Result<Field2D, MaterialError>;

    /// Set every cell of `buffer` to `value`.
    fn fill(&self, buffer: &mut Self::Buffer, value: f64) -> Result<(), MaterialError>;

    /// `out = alpha * x`
    fn scale(
        &self,
        alpha: f64,
        x: &Self::Buffer,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError>;

    /// One step of the recursive lossy constitutive relation, per cell:
    ///
    /// ```text
    /// out      = inv_denominator * (flux - integral)
    /// integral = integral + sigma_dt * out
    /// ```
    fn lossy_response(
        &self,
        flux: &Self::Buffer,
        integral: &mut Self::Buffer,
        inv_denominator: f64,
        sigma_dt: f64,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError>;

    /// Masked composite, per cell: `output = mask * layer_field + (1 - mask) * output`.
    fn elementwise_blend(
        &self,
        output: &mut Self::Buffer,
        layer_field: &Self::Buffer,
        mask: &Self::Buffer,
    ) -> Result<(), MaterialError>;

    /// Reject `buffer` unless its shape matches `grid`.
    fn check_shape(&self, grid: Grid2D, buffer: &Self::Buffer) -> Result<(), MaterialError> {
        if grid.shape() == buffer.shape() && buffer.len() == grid.len() {
            Ok(())
        } else {
            Err(MaterialError::shape_mismatch(grid.shape(), buffer.shape()))
        }
    }
}

/// Shape check for host-side arrays, shared by backends storing `Field2D`.
pub fn ensure_same_shape(expected: &Field2D, found: &Field2D) -> Result<(), MaterialError> {
    if expected.same_shape(found) && expected.len() == found.len() {
        Ok(())
    } else {
        Err(MaterialError::shape_mismatch(expected.shape(), found.shape()))
    }
}
