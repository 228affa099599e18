//! CUDA backend using cudarc when enabled.
//!
//! Masks, memory cells and working fields live on the device for the whole
//! simulation. Host data only crosses the bus through `upload` and
//! `download`; every per-step operation is a kernel launch on one stream.
//!
//! Without the `cuda` feature the crate still builds, but
//! [`CudaBackend::new`] reports [`MaterialError::DeviceUnavailable`].

pub mod kernels;

use fdtd2d_core::MaterialError;

#[cfg(feature = "cuda")]
use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaContext, CudaSlice, CudaStream};
#[cfg(feature = "cuda")]
use fdtd2d_core::backend::{MaterialBackend, MaterialBuffer};
#[cfg(feature = "cuda")]
use fdtd2d_core::field::Field2D;
#[cfg(feature = "cuda")]
use fdtd2d_core::grid::Grid2D;

#[cfg(feature = "cuda")]
use kernels::{device_error, MaterialKernels};

/// CUDA backend for hardware-parallel material evaluation.
pub struct CudaBackend {
    #[cfg(feature = "cuda")]
    _ctx: Arc<CudaContext>,
    #[cfg(feature = "cuda")]
    stream: Arc<CudaStream>,
    #[cfg(feature = "cuda")]
    kernels: Arc<MaterialKernels>,
}

impl CudaBackend {
    /// Create a backend on device `ordinal` and compile the material kernels.
    #[cfg(feature = "cuda")]
    pub fn new(ordinal: usize) -> Result<Self, MaterialError> {
        let ctx = CudaContext::new(ordinal).map_err(|err| {
            log::warn!("CUDA device {ordinal} unavailable: {err:?}");
            MaterialError::DeviceUnavailable
        })?;
        let stream = ctx.default_stream();
        let kernels = MaterialKernels::new(&ctx)?;
        log::info!("CUDA material backend ready on device {ordinal}");
        Ok(Self {
            _ctx: ctx,
            stream,
            kernels: Arc::new(kernels),
        })
    }

    #[cfg(not(feature = "cuda"))]
    pub fn new(_ordinal: usize) -> Result<Self, MaterialError> {
        Err(MaterialError::DeviceUnavailable)
    }

    /// Check if CUDA is available at runtime.
    #[cfg(feature = "cuda")]
    pub fn is_available() -> bool {
        CudaContext::new(0).is_ok()
    }

    #[cfg(not(feature = "cuda"))]
    pub fn is_available() -> bool {
        false
    }

    /// Get a reference to the CUDA stream.
    #[cfg(feature = "cuda")]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    #[cfg(feature = "cuda")]
    fn check_same_shape(&self, expected: &CudaField, found: &CudaField) -> Result<(), MaterialError> {
        if expected.grid.shape() == found.grid.shape() {
            Ok(())
        } else {
            Err(MaterialError::shape_mismatch(
                expected.grid.shape(),
                found.grid.shape(),
            ))
        }
    }
}

impl Clone for CudaBackend {
    fn clone(&self) -> Self {
        #[cfg(feature = "cuda")]
        {
            Self {
                _ctx: Arc::clone(&self._ctx),
                stream: Arc::clone(&self.stream),
                kernels: Arc::clone(&self.kernels),
            }
        }
        #[cfg(not(feature = "cuda"))]
        {
            Self {}
        }
    }
}

// ============================================================================
// GPU Field Buffer
// ============================================================================

/// Device-resident grid-shaped array.
#[cfg(feature = "cuda")]
pub struct CudaField {
    grid: Grid2D,
    data: CudaSlice<f64>,
}

#[cfg(feature = "cuda")]
impl CudaField {
    pub fn device_data(&self) -> &CudaSlice<f64> {
        &self.data
    }
}

#[cfg(feature = "cuda")]
impl MaterialBuffer for CudaField {
    fn len(&self) -> usize {
        self.grid.len()
    }

    fn grid(&self) -> Grid2D {
        self.grid
    }
}

// ============================================================================
// MaterialBackend Implementation
// ============================================================================

#[cfg(feature = "cuda")]
impl MaterialBackend for CudaBackend {
    type Buffer = CudaField;

    fn name(&self) -> &'static str {
        "cuda"
    }

    fn alloc_field(&self, grid: Grid2D) -> Result<Self::Buffer, MaterialError> {
        let data = self
            .stream
            .alloc_zeros::<f64>(grid.len())
            .map_err(device_error)?;
        Ok(CudaField { grid, data })
    }

    fn upload(&self, field: &Field2D) -> Result<Self::Buffer, MaterialError> {
        let data = self
            .stream
            .clone_htod(field.as_slice())
            .map_err(device_error)?;
        Ok(CudaField {
            grid: field.grid(),
            data,
        })
    }

    fn download(&self, buffer: &Self::Buffer) -> Result<Field2D, MaterialError> {
        let data: Vec<f64> = self.stream.clone_dtoh(&buffer.data).map_err(device_error)?;
        Ok(Field2D::from_vec(buffer.grid, data))
    }

    fn fill(&self, buffer: &mut Self::Buffer, value: f64) -> Result<(), MaterialError> {
        let n = buffer.len();
        // Safety: the slice was allocated for exactly `n` cells.
        unsafe { self.kernels.fill(&self.stream, &mut buffer.data, value, n) }
    }

    fn scale(
        &self,
        alpha: f64,
        x: &Self::Buffer,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError> {
        self.check_same_shape(out, x)?;
        let n = out.len();
        // Safety: both slices hold `n` cells, checked above.
        unsafe {
            self.kernels
                .scale(&self.stream, &mut out.data, &x.data, alpha, n)
        }
    }

    fn lossy_response(
        &self,
        flux: &Self::Buffer,
        integral: &mut Self::Buffer,
        inv_denominator: f64,
        sigma_dt: f64,
        out: &mut Self::Buffer,
    ) -> Result<(), MaterialError> {
        self.check_same_shape(out, flux)?;
        self.check_same_shape(out, integral)?;
        let n = out.len();
        // Safety: all three slices hold `n` cells, checked above.
        unsafe {
            self.kernels.lossy_response(
                &self.stream,
                &mut out.data,
                &flux.data,
                &mut integral.data,
                inv_denominator,
                sigma_dt,
                n,
            )
        }
    }

    fn elementwise_blend(
        &self,
        output: &mut Self::Buffer,
        layer_field: &Self::Buffer,
        mask: &Self::Buffer,
    ) -> Result<(), MaterialError> {
        self.check_same_shape(output, layer_field)?;
        self.check_same_shape(output, mask)?;
        let n = output.len();
        // Safety: all three slices hold `n` cells, checked above.
        unsafe {
            self.kernels
                .blend(&self.stream, &mut output.data, &layer_field.data, &mask.data, n)
        }
    }
}
