//! Seaswell - procedural ocean surface engine
//!
//! An analytic Gerstner wave field, an adaptive clip-map mesh generator that
//! keeps an effectively infinite water plane centered on a moving viewer, a
//! cascade system accumulating localized surface disturbances, and a
//! voxel-sampling buoyancy solver.
//!
//! The engine is CPU-side only: it produces vertex streams, transforms and
//! texture layers for a rendering layer, and force/torque requests for an
//! external rigid-body integrator. All state is regenerated every frame from
//! the viewer position and the wave configuration; nothing is persisted.

pub mod buoyancy;
pub mod cascade;
pub mod clipmap;
pub mod params;
pub mod waves;

use glam::{Vec2, Vec3, Vec4};
use std::rc::Rc;

use buoyancy::{Aabb, BuoyancySampler, SurfaceHeight};
use cascade::{CascadeTransform, DisturbanceSource, DynamicWaveCascade};
use clipmap::ClipmapGeometry;
use params::{ConfigError, OceanConfig};
use waves::{WaveField, WaveSample};

/// The ocean engine's composition root.
///
/// Constructed once by the host application and passed by reference to every
/// consumer; there is no ambient global instance. `update` runs once per
/// frame, after which all sampling and published state reflect the new frame.
pub struct OceanSimulation {
    config: OceanConfig,
    wave_field: WaveField,
    clipmap: ClipmapGeometry,
    cascade_transform: CascadeTransform,
    dynamic_cascade: DynamicWaveCascade,
    viewer: Option<Vec3>,
    water_time: f32,
    warned_missing_viewer: bool,
}

impl OceanSimulation {
    /// Build the simulation from a validated configuration.
    pub fn new(config: OceanConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let wave_field = WaveField::new(&config.waves);
        let clipmap = ClipmapGeometry::new(&config.clipmap);
        let cascade_transform = CascadeTransform::new(config.cascade.cascade_count);
        let dynamic_cascade = DynamicWaveCascade::new(&config.cascade);

        Ok(Self {
            config,
            wave_field,
            clipmap,
            cascade_transform,
            dynamic_cascade,
            viewer: None,
            water_time: 0.0,
            warned_missing_viewer: false,
        })
    }

    /// Set the viewer (camera) world position for subsequent updates.
    pub fn set_viewer(&mut self, position: Vec3) {
        self.viewer = Some(position);
    }

    pub fn viewer(&self) -> Option<Vec3> {
        self.viewer
    }

    /// Advance the simulation one frame.
    ///
    /// Order matters: wave data reloads before any sampling, cascade
    /// transforms snap before disturbances rasterize, and geometry moves
    /// last so it reads the same frame's snapped positions.
    pub fn update(&mut self, dt: f32) {
        self.water_time += dt;

        let viewer = match self.viewer {
            Some(position) => position,
            None => {
                if !self.warned_missing_viewer {
                    log::warn!("no viewer set for ocean simulation; anchoring at origin");
                    self.warned_missing_viewer = true;
                }
                Vec3::ZERO
            }
        };

        self.wave_field.update_waves_data(&self.config.waves);
        self.cascade_transform
            .update_transforms(&self.config.cascade, viewer);
        self.dynamic_cascade
            .update(&self.config.cascade, &self.cascade_transform);
        self.clipmap.update(&self.config.clipmap, viewer);
    }

    /// Surface height at world (x, z) for the current frame, including the
    /// cascade's transient disturbance contribution.
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        self.wave_field.sample_height(x, z, self.water_time)
            + self
                .dynamic_cascade
                .sample(&self.cascade_transform, x, z)
    }

    /// Surface displacement and normal at world (x, z), with the cascade's
    /// contribution added to the vertical displacement.
    pub fn sample_displacement(&self, position: Vec2) -> WaveSample {
        let mut sample = self.wave_field.sample_displacement(position, self.water_time);
        sample.displacement.y +=
            self.dynamic_cascade
                .sample(&self.cascade_transform, position.x, position.y);
        sample
    }

    /// Seconds of accumulated water time.
    pub fn time(&self) -> f32 {
        self.water_time
    }

    pub fn config(&self) -> &OceanConfig {
        &self.config
    }

    /// Replace the configuration (out-of-band reconfiguration). Affected
    /// resources rebuild on the next `update`.
    pub fn set_config(&mut self, config: OceanConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Register a gameplay-owned disturbance source (splash, wake).
    pub fn add_disturbance(&mut self, source: &Rc<dyn DisturbanceSource>) {
        self.dynamic_cascade.add_source(source);
    }

    pub fn remove_disturbance(&mut self, source: &Rc<dyn DisturbanceSource>) {
        self.dynamic_cascade.remove_source(source);
    }

    /// Build a buoyancy sampler for a floating body using this simulation's
    /// buoyancy configuration.
    pub fn create_buoyancy_sampler(
        &self,
        bounds: Aabb,
        mass: f32,
        gravity: f32,
        contains: Option<&dyn Fn(Vec3) -> bool>,
    ) -> BuoyancySampler {
        BuoyancySampler::new(bounds, mass, gravity, &self.config.buoyancy, contains)
    }

    // Read-only state published for the rendering layer

    pub fn clipmap(&self) -> &ClipmapGeometry {
        &self.clipmap
    }

    pub fn cascade_transform(&self) -> &CascadeTransform {
        &self.cascade_transform
    }

    pub fn cascade(&self) -> &DynamicWaveCascade {
        &self.dynamic_cascade
    }

    /// Packed per-wave parameters for the rendering layer's vertex stage.
    pub fn wave_data(&self) -> &[Vec4] {
        self.wave_field.wave_data()
    }
}

impl SurfaceHeight for OceanSimulation {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self.sample_height(x, z)
    }
}
