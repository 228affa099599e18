//! TOML description of a material stack.
//!
//! # Example TOML
//!
//! ```toml
//! [grid]
//! size = [0.04, 0.04]
//! delta = [0.001, 0.001]
//!
//! # background vacuum
//! [[layers]]
//! region = { type = "full" }
//! material = { type = "dielectric" }
//!
//! # lossy slab, x in [0.01, 0.02)
//! [[layers]]
//! region = { type = "range", x = { start = 0.01, stop = 0.02 } }
//! material = { type = "dielectric", relative_permittivity = 4.0, conductivity = 0.01 }
//! ```
//!
//! `material_y` optionally overrides the response of the Y component.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::MaterialBackend;
use crate::error::MaterialError;
use crate::grid::Grid2D;
use crate::mask::{AxisRange, MaskSpec};
use crate::material::MaterialStack;
use crate::reference::ReferenceBackend;
use crate::response::{LinearResponse, LossyResponse, ResponseSpec, SharedResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub grid: GridConfig,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

/// Physical extents and cell spacing, both `[x, y]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridConfig {
    pub size: [f64; 2],
    pub delta: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub region: RegionConfig,
    pub material: MaterialConfig,
    #[serde(default)]
    pub material_y: Option<MaterialConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegionConfig {
    #[default]
    Full,
    Range {
        #[serde(default)]
        x: RangeConfig,
        #[serde(default)]
        y: RangeConfig,
    },
}

/// Bounds in physical units; an omitted bound extends to the grid edge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RangeConfig {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub stop: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MaterialConfig {
    Scalar {
        value: f64,
    },
    Dielectric {
        #[serde(default = "default_relative")]
        relative_permittivity: f64,
        #[serde(default)]
        conductivity: f64,
    },
    Magnetic {
        #[serde(default = "default_relative")]
        relative_permeability: f64,
        #[serde(default)]
        conductivity: f64,
    },
}

fn default_relative() -> f64 {
    1.0
}

impl From<RangeConfig> for AxisRange {
    fn from(range: RangeConfig) -> Self {
        AxisRange {
            start: range.start,
            stop: range.stop,
        }
    }
}

impl RegionConfig {
    pub fn to_mask(self) -> MaskSpec {
        match self {
            RegionConfig::Full => MaskSpec::full(),
            RegionConfig::Range { x, y } => MaskSpec::from_range(x.into(), y.into()),
        }
    }
}

impl MaterialConfig {
    fn to_response<B>(self) -> Result<SharedResponse<B>, MaterialError>
    where
        B: MaterialBackend + 'static,
    {
        let response: SharedResponse<B> = match self {
            MaterialConfig::Scalar { value } => Arc::new(LinearResponse::checked(value)?),
            MaterialConfig::Dielectric {
                relative_permittivity,
                conductivity,
            } => Arc::new(LossyResponse::dielectric(
                relative_permittivity,
                conductivity,
            )?),
            MaterialConfig::Magnetic {
                relative_permeability,
                conductivity,
            } => Arc::new(LossyResponse::magnetic(
                relative_permeability,
                conductivity,
            )?),
        };
        Ok(response)
    }
}

impl LayerConfig {
    pub fn to_response<B>(&self) -> Result<ResponseSpec<B>, MaterialError>
    where
        B: MaterialBackend + 'static,
    {
        let x = self.material.to_response()?;
        Ok(match self.material_y {
            Some(material_y) => ResponseSpec::Pair(x, material_y.to_response()?),
            None => ResponseSpec::Single(x),
        })
    }
}

impl StackConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid()?;
        for (index, layer) in self.layers.iter().enumerate() {
            for material in std::iter::once(layer.material).chain(layer.material_y) {
                material
                    .to_response::<ReferenceBackend>()
                    .map_err(|err| ConfigError::InvalidLayer {
                        index,
                        reason: match err {
                            MaterialError::InvalidLayer(reason) => reason,
                            other => other.to_string(),
                        },
                    })?;
            }
        }
        Ok(())
    }

    pub fn grid(&self) -> Result<Grid2D, ConfigError> {
        Grid2D::from_extent(self.grid.size, self.grid.delta)
            .map_err(|err| ConfigError::InvalidGrid(err.to_string()))
    }

    /// Build a stack on `backend` with every configured layer registered in order.
    pub fn build<B>(&self, backend: B) -> Result<MaterialStack<B>, MaterialError>
    where
        B: MaterialBackend + 'static,
    {
        let mut stack = MaterialStack::with_extent(backend, self.grid.size, self.grid.delta)?;
        for layer in &self.layers {
            stack.define_layer(layer.region.to_mask(), layer.to_response::<B>()?)?;
        }
        Ok(stack)
    }
}

impl FromStr for StackConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: StackConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid layer {index}: {reason}")]
    InvalidLayer { index: usize, reason: String },
}

impl From<ConfigError> for MaterialError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidGrid(reason) => MaterialError::InvalidGeometry(reason),
            other => MaterialError::InvalidLayer(other.to_string()),
        }
    }
}
