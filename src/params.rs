//! Parameter definitions with physical units and documented semantics.
//!
//! Every tunable of the ocean engine lives here, grouped per subsystem, with:
//! - Physical units (meters, degrees, texels, etc.)
//! - Documented ranges and meanings
//! - A `Default` matching the reference configuration
//!
//! The aggregate [`OceanConfig`] can be deserialized from a TOML file and must
//! be validated before the simulation is constructed.

use std::path::Path;

use serde::Deserialize;

/// A single directional Gerstner wave.
///
/// Immutable once loaded; the active wave set is the collection of these in
/// [`WaveSettings::waves`] (insertion order irrelevant, contributions sum).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WaveParameter {
    /// Wave height in meters. Must be > 0.
    pub amplitude: f32,

    /// Propagation direction in degrees (0° = +Z, measured clockwise).
    pub direction_deg: f32,

    /// Crest-to-crest wavelength in meters. Must be > 0 (wavenumber = 2π/λ).
    pub wavelength: f32,
}

/// Analytic wave field configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveSettings {
    /// Active wave set. Empty set means flat water.
    pub waves: Vec<WaveParameter>,

    /// Fixed crest sharpness constant (`peak` in the steepness factor
    /// `qi = peak / (amplitude · w · N)`). Dimensionless.
    pub peak_sharpness: f32,

    /// Gravitational acceleration magnitude (m/s²), used by the deep-water
    /// dispersion relation `w_speed = sqrt(g · w)`.
    pub gravity: f32,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            waves: vec![
                WaveParameter {
                    amplitude: 0.6,
                    direction_deg: 0.0,
                    wavelength: 32.0,
                },
                WaveParameter {
                    amplitude: 0.4,
                    direction_deg: 35.0,
                    wavelength: 18.0,
                },
                WaveParameter {
                    amplitude: 0.2,
                    direction_deg: -70.0,
                    wavelength: 9.0,
                },
            ],
            peak_sharpness: 0.2,
            gravity: 9.8,
        }
    }
}

/// Clip-map geometry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClipmapParams {
    /// Base edge length of a clip level in meters. Each level doubles it.
    pub length_scale: f32,

    /// Vertex density per level, range 1..=40. Grid resolution is
    /// `k = 4 * vertex_density + 1` cells per patch side.
    pub vertex_density: usize,

    /// Number of nested LOD levels (rings), range 0..=8.
    pub clip_levels: usize,

    /// Outer skirt border scale relative to one grid cell, range 0..=100.
    /// The skirt closes the horizon beyond the outermost ring.
    pub skirt_size: f32,
}

impl Default for ClipmapParams {
    fn default() -> Self {
        Self {
            length_scale: 100.0,
            vertex_density: 30,
            clip_levels: 8,
            skirt_size: 50.0,
        }
    }
}

impl ClipmapParams {
    /// Grid cells per patch side.
    pub fn grid_size(&self) -> usize {
        4 * self.vertex_density + 1
    }
}

/// Dynamic-wave cascade configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CascadeParams {
    /// Number of cascade LOD layers (texture array depth), typically 1..=4.
    pub cascade_count: usize,

    /// Per-layer texture resolution in texels (square). 256/512/1024 are the
    /// intended settings; higher is sharper but heavier to clear and splat.
    pub resolution: u32,

    /// Base world scale of cascade 0 in meters. LOD i covers
    /// `base_scale * 2^i`, so each layer doubles its footprint.
    pub base_scale: f32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            cascade_count: 4,
            resolution: 512,
            base_scale: 10.0,
        }
    }
}

impl CascadeParams {
    /// World scale of a cascade LOD (`base_scale * 2^lod`).
    pub fn lod_scale(&self, lod: usize) -> f32 {
        self.base_scale * 2f32.powi(lod as i32)
    }
}

/// Buoyancy solver configuration (per floating body).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuoyancyParams {
    /// Probe subdivisions per bounding-box axis (candidate probe count is
    /// this value cubed). 2 gives the classic 8-voxel hull.
    pub slices_per_axis: usize,

    /// Upper bound on probes per body after welding.
    pub voxel_limit: usize,

    /// Body material density (kg/m³); displaced volume = mass / density.
    pub body_density: f32,

    /// Water density (kg/m³).
    pub water_density: f32,

    /// Velocity damping coefficient applied at each submerged probe
    /// (dimensionless, multiplied by body mass).
    pub damping: f32,
}

impl Default for BuoyancyParams {
    fn default() -> Self {
        Self {
            slices_per_axis: 2,
            voxel_limit: 16,
            body_density: 500.0,
            water_density: 1000.0,
            damping: 0.1,
        }
    }
}

/// Configuration errors surfaced at load/validation time.
///
/// Runtime simulation paths never raise these; bad values are rejected before
/// the simulation is constructed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("wave {index}: amplitude must be > 0, got {value}")]
    InvalidAmplitude { index: usize, value: f32 },

    #[error("wave {index}: wavelength must be > 0, got {value}")]
    InvalidWavelength { index: usize, value: f32 },

    #[error("clipmap vertex density must be in 1..=40, got {0}")]
    InvalidVertexDensity(usize),

    #[error("clipmap length scale must be > 0, got {0}")]
    InvalidLengthScale(f32),

    #[error("cascade resolution must be > 0")]
    ZeroCascadeResolution,

    #[error("cascade count must be in 1..={max}, got {got}")]
    CascadeCountOutOfRange { got: usize, max: usize },

    #[error("buoyancy slices per axis must be > 0")]
    ZeroSlicesPerAxis,

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Aggregate configuration for the whole ocean engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OceanConfig {
    pub waves: WaveSettings,
    pub clipmap: ClipmapParams,
    pub cascade: CascadeParams,
    pub buoyancy: BuoyancyParams,
}

impl OceanConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all parameters; rejects values that would divide by zero or
    /// degenerate the geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, wave) in self.waves.waves.iter().enumerate() {
            if wave.amplitude <= 0.0 {
                return Err(ConfigError::InvalidAmplitude {
                    index,
                    value: wave.amplitude,
                });
            }
            if wave.wavelength <= 0.0 {
                return Err(ConfigError::InvalidWavelength {
                    index,
                    value: wave.wavelength,
                });
            }
        }

        if !(1..=40).contains(&self.clipmap.vertex_density) {
            return Err(ConfigError::InvalidVertexDensity(
                self.clipmap.vertex_density,
            ));
        }
        if self.clipmap.length_scale <= 0.0 {
            return Err(ConfigError::InvalidLengthScale(self.clipmap.length_scale));
        }

        if self.cascade.resolution == 0 {
            return Err(ConfigError::ZeroCascadeResolution);
        }
        if self.cascade.cascade_count == 0
            || self.cascade.cascade_count > crate::cascade::MAX_LOD_COUNT
        {
            return Err(ConfigError::CascadeCountOutOfRange {
                got: self.cascade.cascade_count,
                max: crate::cascade::MAX_LOD_COUNT,
            });
        }

        if self.buoyancy.slices_per_axis == 0 {
            return Err(ConfigError::ZeroSlicesPerAxis);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(OceanConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_wavelength_rejected() {
        let mut config = OceanConfig::default();
        config.waves.waves[0].wavelength = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWavelength { index: 0, .. })
        ));
    }

    #[test]
    fn test_negative_amplitude_rejected() {
        let mut config = OceanConfig::default();
        config.waves.waves[1].amplitude = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAmplitude { index: 1, .. })
        ));
    }

    #[test]
    fn test_config_from_toml() {
        let config: OceanConfig = toml::from_str(
            r#"
            [[waves.waves]]
            amplitude = 1.0
            direction_deg = 0.0
            wavelength = 10.0

            [clipmap]
            vertex_density = 4
            clip_levels = 3

            [cascade]
            resolution = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.waves.waves.len(), 1);
        assert_eq!(config.clipmap.vertex_density, 4);
        assert_eq!(config.clipmap.grid_size(), 17);
        assert_eq!(config.cascade.resolution, 256);
        // Unspecified sections fall back to defaults
        assert_eq!(config.buoyancy.slices_per_axis, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lod_scale_doubles() {
        let cascade = CascadeParams::default();
        assert_eq!(cascade.lod_scale(0), cascade.base_scale);
        assert_eq!(cascade.lod_scale(3), cascade.base_scale * 8.0);
    }
}
