//! CUDA kernels for per-cell material evaluation.
//!
//! All kernels operate on real `double` arrays of `n` cells laid out like
//! `Field2D` storage, one thread per cell.

#[cfg(feature = "cuda")]
use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, LaunchConfig, PushKernelArg};
#[cfg(feature = "cuda")]
use cudarc::nvrtc::CompileError;
#[cfg(feature = "cuda")]
use fdtd2d_core::MaterialError;

/// CUDA kernel source for the material stack.
///
/// The blend and lossy-response expressions are written exactly as in the
/// host backends so both evaluate the same floating-point operations.
pub const KERNEL_SOURCE: &str = r#"
extern "C" {

/// out[i] = value
__global__ void fill_kernel(
    double* __restrict__ out,
    const double value,
    const size_t n
) {
    size_t i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) {
        out[i] = value;
    }
}

/// out[i] = alpha * x[i]
__global__ void scale_kernel(
    double* __restrict__ out,
    const double* __restrict__ x,
    const double alpha,
    const size_t n
) {
    size_t i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) {
        out[i] = alpha * x[i];
    }
}

/// out[i]      = inv_denominator * (flux[i] - integral[i])
/// integral[i] = integral[i] + sigma_dt * out[i]
__global__ void lossy_response_kernel(
    double* __restrict__ out,
    const double* __restrict__ flux,
    double* __restrict__ integral,
    const double inv_denominator,
    const double sigma_dt,
    const size_t n
) {
    size_t i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) {
        double field = __dmul_rn(inv_denominator, __dsub_rn(flux[i], integral[i]));
        integral[i] = __dadd_rn(integral[i], __dmul_rn(sigma_dt, field));
        out[i] = field;
    }
}

/// output[i] = mask[i] * layer[i] + (1 - mask[i]) * output[i]
__global__ void apply_kernel(
    double* __restrict__ output,
    const double* __restrict__ layer,
    const double* __restrict__ mask,
    const size_t n
) {
    size_t i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) {
        double weight = mask[i];
        output[i] = __dadd_rn(
            __dmul_rn(weight, layer[i]),
            __dmul_rn(__dsub_rn(1.0, weight), output[i])
        );
    }
}

} // extern "C"
"#;

/// Compiled CUDA kernels for the material stack.
#[cfg(feature = "cuda")]
pub struct MaterialKernels {
    _module: Arc<CudaModule>,
    fill: CudaFunction,
    scale: CudaFunction,
    lossy_response: CudaFunction,
    blend: CudaFunction,
}

#[cfg(feature = "cuda")]
impl MaterialKernels {
    /// Compile and load the material kernels.
    ///
    /// On a compile failure the NVRTC build log is logged and returned in the error.
    pub fn new(ctx: &Arc<CudaContext>) -> Result<Self, MaterialError> {
        log::info!("Compiling CUDA material kernels...");

        let ptx = cudarc::nvrtc::compile_ptx(KERNEL_SOURCE).map_err(|err| {
            let log = match &err {
                CompileError::CompileError { log, .. } => log.to_string_lossy().into_owned(),
                other => format!("{other:?}"),
            };
            log::error!("CUDA kernel build failed:\n{log}");
            MaterialError::KernelBuild { log }
        })?;
        let module = ctx.load_module(ptx).map_err(device_error)?;

        let load = |name: &str| module.load_function(name).map_err(device_error);
        let fill = load("fill_kernel")?;
        let scale = load("scale_kernel")?;
        let lossy_response = load("lossy_response_kernel")?;
        let blend = load("apply_kernel")?;

        log::info!("CUDA material kernels compiled successfully");

        Ok(Self {
            _module: module,
            fill,
            scale,
            lossy_response,
            blend,
        })
    }

    /// Get optimal launch configuration for n elements.
    fn launch_config(n: usize) -> LaunchConfig {
        const BLOCK_SIZE: u32 = 256;
        let grid_size = (n as u32).div_ceil(BLOCK_SIZE).max(1);
        LaunchConfig {
            grid_dim: (grid_size, 1, 1),
            block_dim: (BLOCK_SIZE, 1, 1),
            shared_mem_bytes: 0,
        }
    }

    /// out = value
    ///
    /// # Safety
    /// `out` must hold at least `n` elements.
    pub unsafe fn fill(
        &self,
        stream: &CudaStream,
        out: &mut CudaSlice<f64>,
        value: f64,
        n: usize,
    ) -> Result<(), MaterialError> {
        let cfg = Self::launch_config(n);
        stream
            .launch_builder(&self.fill)
            .arg(out)
            .arg(&value)
            .arg(&n)
            .launch(cfg)
            .map_err(device_error)?;
        Ok(())
    }

    /// out = alpha * x
    ///
    /// # Safety
    /// `out` and `x` must hold at least `n` elements.
    pub unsafe fn scale(
        &self,
        stream: &CudaStream,
        out: &mut CudaSlice<f64>,
        x: &CudaSlice<f64>,
        alpha: f64,
        n: usize,
    ) -> Result<(), MaterialError> {
        let cfg = Self::launch_config(n);
        stream
            .launch_builder(&self.scale)
            .arg(out)
            .arg(x)
            .arg(&alpha)
            .arg(&n)
            .launch(cfg)
            .map_err(device_error)?;
        Ok(())
    }

    /// One recursive lossy step, updating `integral` in place.
    ///
    /// # Safety
    /// `out`, `flux` and `integral` must hold at least `n` elements.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn lossy_response(
        &self,
        stream: &CudaStream,
        out: &mut CudaSlice<f64>,
        flux: &CudaSlice<f64>,
        integral: &mut CudaSlice<f64>,
        inv_denominator: f64,
        sigma_dt: f64,
        n: usize,
    ) -> Result<(), MaterialError> {
        let cfg = Self::launch_config(n);
        stream
            .launch_builder(&self.lossy_response)
            .arg(out)
            .arg(flux)
            .arg(integral)
            .arg(&inv_denominator)
            .arg(&sigma_dt)
            .arg(&n)
            .launch(cfg)
            .map_err(device_error)?;
        Ok(())
    }

    /// output = mask * layer + (1 - mask) * output
    ///
    /// # Safety
    /// `output`, `layer` and `mask` must hold at least `n` elements.
    pub unsafe fn blend(
        &self,
        stream: &CudaStream,
        output: &mut CudaSlice<f64>,
        layer: &CudaSlice<f64>,
        mask: &CudaSlice<f64>,
        n: usize,
    ) -> Result<(), MaterialError> {
        let cfg = Self::launch_config(n);
        stream
            .launch_builder(&self.blend)
            .arg(output)
            .arg(layer)
            .arg(mask)
            .arg(&n)
            .launch(cfg)
            .map_err(device_error)?;
        Ok(())
    }
}

#[cfg(feature = "cuda")]
pub(crate) fn device_error(err: impl std::fmt::Debug) -> MaterialError {
    MaterialError::Device(format!("{err:?}"))
}
