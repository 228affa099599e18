//! Material stack: masked layers of response functions composited per step.
//!
//! Layers are evaluated in registration order and blended into the running
//! field with their mask, `field = mask * layer + (1 - mask) * field`. A later
//! layer therefore overrides earlier ones wherever its mask is one.

use log::{debug, trace};

use crate::backend::MaterialBackend;
use crate::error::MaterialError;
use crate::field::Field2D;
use crate::grid::Grid2D;
use crate::mask::{coverage, MaskSpec};
use crate::response::{MemoryCell, ResponseSpec, SharedResponse};

struct MaterialLayer<B: MaterialBackend> {
    response_x: SharedResponse<B>,
    response_y: SharedResponse<B>,
    memory_x: MemoryCell<B::Buffer>,
    memory_y: MemoryCell<B::Buffer>,
    mask: B::Buffer,
}

pub struct MaterialStack<B: MaterialBackend> {
    backend: B,
    grid: Grid2D,
    layers: Vec<MaterialLayer<B>>,
    scratch: B::Buffer,
}

impl<B> MaterialStack<B>
where
    B: MaterialBackend + 'static,
{
    pub fn new(backend: B, grid: Grid2D) -> Result<Self, MaterialError> {
        if grid.is_empty() {
            return Err(MaterialError::InvalidGeometry(format!(
                "grid must have at least one cell, got {:?}",
                grid.shape()
            )));
        }
        let scratch = backend.alloc_field(grid)?;
        debug!(
            "material stack on {} backend, grid {}x{}",
            backend.name(),
            grid.nx,
            grid.ny
        );
        Ok(Self {
            backend,
            grid,
            layers: Vec::new(),
            scratch,
        })
    }

    /// Stack for a domain of physical `size` discretized with spacing `delta`.
    pub fn with_extent(backend: B, size: [f64; 2], delta: [f64; 2]) -> Result<Self, MaterialError> {
        let grid = Grid2D::from_extent(size, delta)?;
        Self::new(backend, grid)
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Append a layer. Layers registered later take priority where masks overlap.
    pub fn define_layer(
        &mut self,
        mask: impl Into<MaskSpec>,
        response: impl Into<ResponseSpec<B>>,
    ) -> Result<(), MaterialError> {
        let mask = mask.into();
        let response = response.into();
        let mask_kind = mask.kind();
        let response_kind = response.kind();

        let host_mask = mask.build(self.grid)?;
        let (response_x, response_y) = response.resolve()?;
        let layer = MaterialLayer {
            response_x,
            response_y,
            memory_x: MemoryCell::zeros(&self.backend, self.grid)?,
            memory_y: MemoryCell::zeros(&self.backend, self.grid)?,
            mask: self.backend.upload(&host_mask)?,
        };
        self.layers.push(layer);

        debug!(
            "layer {}: {} mask ({:.1}% coverage), {} response",
            self.layers.len() - 1,
            mask_kind,
            100.0 * coverage(&host_mask),
            response_kind
        );
        Ok(())
    }

    /// Compute the field pair produced by `flux` over one step of length `dt`
    /// starting at time `t`.
    ///
    /// Every layer's memory advances by one step. Shape and time-step errors
    /// are reported before any memory is touched.
    ///
    /// An error returned by a layer's response aborts the step after earlier
    /// layers have already advanced their memory. The stack is then out of step
    /// and must be discarded.
    pub fn apply(
        &mut self,
        flux: (&B::Buffer, &B::Buffer),
        dt: f64,
        t: f64,
    ) -> Result<(B::Buffer, B::Buffer), MaterialError> {
        let (flux_x, flux_y) = flux;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(MaterialError::InvalidTimeStep(dt));
        }
        self.backend.check_shape(self.grid, flux_x)?;
        self.backend.check_shape(self.grid, flux_y)?;

        let mut field_x = self.backend.alloc_field(self.grid)?;
        let mut field_y = self.backend.alloc_field(self.grid)?;

        let Self {
            backend,
            layers,
            scratch,
            ..
        } = self;
        for layer in layers.iter_mut() {
            backend.fill(scratch, 0.0)?;
            layer
                .response_x
                .evaluate(backend, flux_x, dt, t, &mut layer.memory_x, scratch)?;
            backend.elementwise_blend(&mut field_x, scratch, &layer.mask)?;

            backend.fill(scratch, 0.0)?;
            layer
                .response_y
                .evaluate(backend, flux_y, dt, t, &mut layer.memory_y, scratch)?;
            backend.elementwise_blend(&mut field_y, scratch, &layer.mask)?;
        }

        trace!("applied {} layers at t={t:e}, dt={dt:e}", self.layers.len());
        Ok((field_x, field_y))
    }

    /// [`apply`](Self::apply) for host arrays, transferring through the backend.
    pub fn apply_host(
        &mut self,
        flux_x: &Field2D,
        flux_y: &Field2D,
        dt: f64,
        t: f64,
    ) -> Result<(Field2D, Field2D), MaterialError> {
        for flux in [flux_x, flux_y] {
            if flux.shape() != self.grid.shape() {
                return Err(MaterialError::shape_mismatch(self.grid.shape(), flux.shape()));
            }
        }
        let device_x = self.backend.upload(flux_x)?;
        let device_y = self.backend.upload(flux_y)?;
        let (field_x, field_y) = self.apply((&device_x, &device_y), dt, t)?;
        Ok((
            self.backend.download(&field_x)?,
            self.backend.download(&field_y)?,
        ))
    }

    /// Memory cells `(x, y)` of layer `index`.
    pub fn memory(
        &self,
        index: usize,
    ) -> Option<(&MemoryCell<B::Buffer>, &MemoryCell<B::Buffer>)> {
        self.layers
            .get(index)
            .map(|layer| (&layer.memory_x, &layer.memory_y))
    }

    /// Backend-resident mask of layer `index`.
    pub fn mask(&self, index: usize) -> Option<&B::Buffer> {
        self.layers.get(index).map(|layer| &layer.mask)
    }
}
