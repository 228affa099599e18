//! Serial dense host backend.
//!
//! Every operation is a plain loop over contiguous `Field2D` storage. This is
//! the evaluation every other backend is validated against.

use crate::backend::{ensure_same_shape, MaterialBackend};
use crate::error::MaterialError;
use crate::field::Field2D;
use crate::grid::Grid2D;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MaterialBackend for ReferenceBackend {
    type Buffer = Field2D;

    fn name(&self) -> &'static str {
        "reference"
    }

    fn alloc_field(&self, grid: Grid2D) -> Result<Self::Buffer, MaterialError> {
        Ok(Field2D::zeros(grid))
    }

    fn upload(&self, field: &Field2D) -> Result<Self::Buffer, MaterialError> {
        Ok(field.clone())
    }

    fn download(&self, buffer: &Self::Buffer) -> Result<Field2D, MaterialError> {
        Ok(buffer.clone())
    }

    fn fill(&self, buffer: &mut Self::Buffer, value: f64) -> Result<(), MaterialError> {
        buffer.fill(value);
        Ok(())
    }

    fn scale(
        &self,
        alpha: f64,
        x: &Self::Buffer,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError> {
        ensure_same_shape(out, x)?;
        for (dst, src) in out.as_mut_slice().iter_mut().zip(x.as_slice()) {
            *dst = alpha * src;
        }
        Ok(())
    }

    fn lossy_response(
        &self,
        flux: &Self::Buffer,
        integral: &mut Self::Buffer,
        inv_denominator: f64,
        sigma_dt: f64,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError> {
        ensure_same_shape(out, flux)?;
        ensure_same_shape(out, integral)?;
        for ((dst, d), acc) in out
            .as_mut_slice()
            .iter_mut()
            .zip(flux.as_slice())
            .zip(integral.as_mut_slice())
        {
            let (field, next) = lossy_step(*d, *acc, inv_denominator, sigma_dt);
            *acc = next;
            *dst = field;
        }
        Ok(())
    }

    fn elementwise_blend(
        &self,
        output: &mut Self::Buffer,
        layer_field: &Self::Buffer,
        mask: &Self::Buffer,
    ) -> Result<(), MaterialError> {
        ensure_same_shape(output, layer_field)?;
        ensure_same_shape(output, mask)?;
        for ((dst, value), weight) in output
            .as_mut_slice()
            .iter_mut()
            .zip(layer_field.as_slice())
            .zip(mask.as_slice())
        {
            *dst = blend(*dst, *value, *weight);
        }
        Ok(())
    }
}

/// Per-cell masked composite shared by the host backends.
#[inline]
pub fn blend(output: f64, layer_value: f64, weight: f64) -> f64 {
    weight * layer_value + (1.0 - weight) * output
}

/// Per-cell lossy recursion shared by the host backends. Returns `(field, integral)`.
#[inline]
pub fn lossy_step(flux: f64, integral: f64, inv_denominator: f64, sigma_dt: f64) -> (f64, f64) {
    let field = inv_denominator * (flux - integral);
    (field, integral + sigma_dt * field)
}
