//! Material response functions.
//!
//! A response maps a flux density component to the matching field component
//! for one grid, optionally carrying per-cell state across time steps in a
//! [`MemoryCell`] owned by the caller.

use std::fmt;
use std::sync::Arc;

use crate::backend::MaterialBackend;
use crate::error::MaterialError;
use crate::grid::Grid2D;
use crate::units::{EPSILON_0, MU_0};

/// Persistent per-cell state of one response on one axis.
pub struct MemoryCell<Buf> {
    integral: Buf,
}

impl<Buf> MemoryCell<Buf> {
    /// Allocate a zeroed memory cell for `grid` on `backend`.
    pub fn zeros<B>(backend: &B, grid: Grid2D) -> Result<Self, MaterialError>
    where
        B: MaterialBackend<Buffer = Buf>,
    {
        Ok(Self {
            integral: backend.alloc_field(grid)?,
        })
    }

    /// Running integral of the conduction term.
    pub fn integral(&self) -> &Buf {
        &self.integral
    }

    pub fn integral_mut(&mut self) -> &mut Buf {
        &mut self.integral
    }
}

impl<Buf: fmt::Debug> fmt::Debug for MemoryCell<Buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCell")
            .field("integral", &self.integral)
            .finish()
    }
}

pub trait Response<B: MaterialBackend> {
    /// Write the field produced by `flux` into `out`, updating `memory` in place.
    ///
    /// `out` is zeroed before every call. `t` is the simulation time at the
    /// start of the step.
    fn evaluate(
        &self,
        backend: &B,
        flux: &B::Buffer,
        dt: f64,
        t: f64,
        memory: &mut MemoryCell<B::Buffer>,
        out: &mut B::Buffer,
    ) -> Result<(), MaterialError>;
}

impl<B, F> Response<B> for F
where
    B: MaterialBackend,
    F: Fn(
        &B,
        &B::Buffer,
        f64,
        f64,
        &mut MemoryCell<B::Buffer>,
        &mut B::Buffer,
    ) -> Result<(), MaterialError>,
{
    fn evaluate(
        &self,
        backend: &B,
        flux: &B::Buffer,
        dt: f64,
        t: f64,
        memory: &mut MemoryCell<B::Buffer>,
        out: &mut B::Buffer,
    ) -> Result<(), MaterialError> {
        self(backend, flux, dt, t, memory, out)
    }
}

/// `field = factor * flux`. Never touches memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearResponse {
    pub factor: f64,
}

impl LinearResponse {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Like [`new`](Self::new), rejecting a non-finite factor.
    pub fn checked(factor: f64) -> Result<Self, MaterialError> {
        if !factor.is_finite() {
            return Err(MaterialError::InvalidLayer(format!(
                "scalar response must be finite, got {factor}"
            )));
        }
        Ok(Self::new(factor))
    }
}

impl<B: MaterialBackend> Response<B> for LinearResponse {
    fn evaluate(
        &self,
        backend: &B,
        flux: &B::Buffer,
        _dt: f64,
        _t: f64,
        _memory: &mut MemoryCell<B::Buffer>,
        out: &mut B::Buffer,
    ) -> Result<(), MaterialError> {
        backend.scale(self.factor, flux, out)
    }
}

/// Lossy isotropic medium integrated with a first-order recursion:
///
/// ```text
/// field    = (flux - integral) / (vacuum * relative + conductivity * dt)
/// integral = integral + conductivity * dt * field
/// ```
///
/// With zero conductivity the integral stays at zero and the response
/// reduces to `flux / (vacuum * relative)`. With positive conductivity and a
/// constant flux the integral accumulates towards the flux and the field
/// relaxes towards zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossyResponse {
    vacuum: f64,
    relative: f64,
    conductivity: f64,
}

impl LossyResponse {
    /// Dielectric medium, maps D to E.
    pub fn dielectric(
        relative_permittivity: f64,
        conductivity: f64,
    ) -> Result<Self, MaterialError> {
        Self::new(EPSILON_0, relative_permittivity, conductivity)
    }

    /// Magnetic medium, maps B to H.
    pub fn magnetic(relative_permeability: f64, conductivity: f64) -> Result<Self, MaterialError> {
        Self::new(MU_0, relative_permeability, conductivity)
    }

    pub fn vacuum_dielectric() -> Self {
        Self {
            vacuum: EPSILON_0,
            relative: 1.0,
            conductivity: 0.0,
        }
    }

    pub fn vacuum_magnetic() -> Self {
        Self {
            vacuum: MU_0,
            relative: 1.0,
            conductivity: 0.0,
        }
    }

    fn new(vacuum: f64, relative: f64, conductivity: f64) -> Result<Self, MaterialError> {
        if !(relative.is_finite() && relative > 0.0) {
            return Err(MaterialError::InvalidLayer(format!(
                "relative material constant must be finite and positive, got {relative}"
            )));
        }
        if !(conductivity.is_finite() && conductivity >= 0.0) {
            return Err(MaterialError::InvalidLayer(format!(
                "conductivity must be finite and non-negative, got {conductivity}"
            )));
        }
        Ok(Self {
            vacuum,
            relative,
            conductivity,
        })
    }

    pub fn relative(&self) -> f64 {
        self.relative
    }

    pub fn conductivity(&self) -> f64 {
        self.conductivity
    }

    /// Absolute material constant, `vacuum * relative`.
    pub fn absolute(&self) -> f64 {
        self.vacuum * self.relative
    }

    pub fn is_lossless(&self) -> bool {
        self.conductivity == 0.0
    }

    /// Ratio between consecutive fields under a constant flux,
    /// `absolute / (absolute + conductivity * dt)`.
    ///
    /// The integral converges to the flux, so the field decays geometrically
    /// to zero with this ratio. It is one for a lossless medium.
    pub fn decay_factor(&self, dt: f64) -> f64 {
        self.absolute() / (self.absolute() + self.conductivity * dt)
    }

    pub(crate) fn coefficients(&self, dt: f64) -> (f64, f64) {
        let sigma_dt = self.conductivity * dt;
        (1.0 / (self.absolute() + sigma_dt), sigma_dt)
    }
}

impl<B: MaterialBackend> Response<B> for LossyResponse {
    fn evaluate(
        &self,
        backend: &B,
        flux: &B::Buffer,
        dt: f64,
        _t: f64,
        memory: &mut MemoryCell<B::Buffer>,
        out: &mut B::Buffer,
    ) -> Result<(), MaterialError> {
        let (inv_denominator, sigma_dt) = self.coefficients(dt);
        backend.lossy_response(flux, memory.integral_mut(), inv_denominator, sigma_dt, out)
    }
}

/// Dielectric response with relative permittivity `er` and conductivity `sigma`.
pub fn dielectric(er: f64, sigma: f64) -> Result<LossyResponse, MaterialError> {
    LossyResponse::dielectric(er, sigma)
}

/// Magnetic response with relative permeability `mur` and conductivity `sigma`.
pub fn magnetic(mur: f64, sigma: f64) -> Result<LossyResponse, MaterialError> {
    LossyResponse::magnetic(mur, sigma)
}

/// Shared handle to a response, so one function can serve both axes.
pub type SharedResponse<B> = Arc<dyn Response<B>>;

/// How a layer's response functions are declared.
pub enum ResponseSpec<B: MaterialBackend> {
    /// Separate functions for the X and Y components.
    Pair(SharedResponse<B>, SharedResponse<B>),
    /// One function used for both components.
    Single(SharedResponse<B>),
    /// `field = value * flux` on both components.
    Scalar(f64),
}

impl<B: MaterialBackend> ResponseSpec<B> {
    pub fn from_pair<X, Y>(x: X, y: Y) -> Self
    where
        X: Response<B> + 'static,
        Y: Response<B> + 'static,
    {
        Self::Pair(Arc::new(x), Arc::new(y))
    }

    pub fn from_single<F>(f: F) -> Self
    where
        F: Response<B> + 'static,
    {
        Self::Single(Arc::new(f))
    }

    pub fn from_scalar(value: f64) -> Self {
        Self::Scalar(value)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pair(..) => "pair",
            Self::Single(_) => "single",
            Self::Scalar(_) => "scalar",
        }
    }

    /// Resolve into the per-axis functions stored by a layer.
    pub fn resolve(self) -> Result<(SharedResponse<B>, SharedResponse<B>), MaterialError>
    where
        B: 'static,
    {
        match self {
            Self::Pair(x, y) => Ok((x, y)),
            Self::Single(f) => Ok((Arc::clone(&f), f)),
            Self::Scalar(value) => {
                let linear: SharedResponse<B> = Arc::new(LinearResponse::checked(value)?);
                Ok((Arc::clone(&linear), linear))
            }
        }
    }
}

impl<B: MaterialBackend> From<f64> for ResponseSpec<B> {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl<B: MaterialBackend> From<LossyResponse> for ResponseSpec<B> {
    fn from(response: LossyResponse) -> Self {
        Self::from_single(response)
    }
}

impl<B: MaterialBackend> From<LinearResponse> for ResponseSpec<B> {
    fn from(response: LinearResponse) -> Self {
        Self::from_single(response)
    }
}
