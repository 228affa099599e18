//! Data-parallel host backend built on rayon.
//!
//! Buffers are plain [`Field2D`] arrays, so results can be compared directly
//! with the serial reference backend. Every elementwise operation is
//! dispatched as one parallel pass over the grid once the grid is large
//! enough to amortize the scheduling cost.

use fdtd2d_core::backend::{ensure_same_shape, MaterialBackend};
use fdtd2d_core::field::Field2D;
use fdtd2d_core::grid::Grid2D;
use fdtd2d_core::reference::{blend, lossy_step};
use fdtd2d_core::MaterialError;
use rayon::prelude::*;

/// Grids with fewer cells than this are evaluated serially.
const DEFAULT_MIN_PARALLEL_LEN: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct CpuBackend {
    min_parallel_len: usize,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            min_parallel_len: DEFAULT_MIN_PARALLEL_LEN,
        }
    }

    /// Override the cell count below which operations run serially.
    pub fn with_min_parallel_len(mut self, min_parallel_len: usize) -> Self {
        self.min_parallel_len = min_parallel_len;
        self
    }

    pub fn min_parallel_len(&self) -> usize {
        self.min_parallel_len
    }

    fn parallel(&self, len: usize) -> bool {
        len >= self.min_parallel_len
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialBackend for CpuBackend {
    type Buffer = Field2D;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn alloc_field(&self, grid: Grid2D) -> Result<Self::Buffer, MaterialError> {
        log::trace!(
            "cpu alloc {}x{} (parallel: {})",
            grid.nx,
            grid.ny,
            self.parallel(grid.len())
        );
        Ok(Field2D::zeros(grid))
    }

    fn upload(&self, field: &Field2D) -> Result<Self::Buffer, MaterialError> {
        Ok(field.clone())
    }

    fn download(&self, buffer: &Self::Buffer) -> Result<Field2D, MaterialError> {
        Ok(buffer.clone())
    }

    fn fill(&self, buffer: &mut Self::Buffer, value: f64) -> Result<(), MaterialError> {
        if self.parallel(buffer.len()) {
            buffer.as_mut_slice().par_iter_mut().for_each(|v| *v = value);
        } else {
            buffer.fill(value);
        }
        Ok(())
    }

    fn scale(
        &self,
        alpha: f64,
        x: &Self::Buffer,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError> {
        ensure_same_shape(out, x)?;
        let kernel = |(dst, src): (&mut f64, &f64)| *dst = alpha * src;
        if self.parallel(out.len()) {
            out.as_mut_slice()
                .par_iter_mut()
                .zip(x.as_slice().par_iter())
                .for_each(kernel);
        } else {
            out.as_mut_slice()
                .iter_mut()
                .zip(x.as_slice())
                .for_each(kernel);
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
        let kernel = |((dst, d), acc): ((&mut f64, &f64), &mut f64)| {
            let (field, next) = lossy_step(*d, *acc, inv_denominator, sigma_dt);
            *acc = next;
            *dst = field;
        };
        if self.parallel(out.len()) {
            out.as_mut_slice()
                .par_iter_mut()
                .zip(flux.as_slice().par_iter())
                .zip(integral.as_mut_slice().par_iter_mut())
                .for_each(kernel);
        } else {
            out.as_mut_slice()
                .iter_mut()
                .zip(flux.as_slice())
                .zip(integral.as_mut_slice())
                .for_each(kernel);
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
        let kernel = |((dst, value), weight): ((&mut f64, &f64), &f64)| {
            *dst = blend(*dst, *value, *weight);
        };
        if self.parallel(output.len()) {
            output
                .as_mut_slice()
                .par_iter_mut()
                .zip(layer_field.as_slice().par_iter())
                .zip(mask.as_slice().par_iter())
                .for_each(kernel);
        } else {
            output
                .as_mut_slice()
                .iter_mut()
                .zip(layer_field.as_slice())
                .zip(mask.as_slice())
                .for_each(kernel);
        }
        Ok(())
    }
}
