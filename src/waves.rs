//! Analytic wave field: superposition of directional trochoidal (Gerstner)
//! waves, a pure function of world position and time.
//!
//! Consumers batch their queries (one per mesh vertex or buoyancy probe per
//! frame); cost is O(wave count) per sample.

use glam::{Vec2, Vec3, Vec3Swizzles, Vec4};

use crate::params::{WaveParameter, WaveSettings};

/// Displacement and normal of the surface at a sample point.
///
/// Transient, recomputed every query; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSample {
    /// Offset from the flat rest plane (horizontal x/z plus vertical y).
    pub displacement: Vec3,
    /// Surface normal (unit length for a non-empty wave set).
    pub normal: Vec3,
}

impl Default for WaveSample {
    fn default() -> Self {
        Self {
            displacement: Vec3::ZERO,
            normal: Vec3::Y,
        }
    }
}

/// Analytic superposition of Gerstner waves.
pub struct WaveField {
    waves: Vec<WaveParameter>,
    peak_sharpness: f32,
    gravity: f32,
    /// Packed (amplitude, direction_deg, wavelength, 0) per wave, republished
    /// every frame for the rendering layer's vertex shader.
    wave_data: Vec<Vec4>,
}

impl WaveField {
    pub fn new(settings: &WaveSettings) -> Self {
        let mut field = Self {
            waves: Vec::new(),
            peak_sharpness: settings.peak_sharpness,
            gravity: settings.gravity,
            wave_data: Vec::new(),
        };
        field.update_waves_data(settings);
        field
    }

    /// Reload the active wave set from configuration.
    ///
    /// Must run once per frame before any sampling; the wave set may not be
    /// mutated while queries for the same frame are in flight.
    pub fn update_waves_data(&mut self, settings: &WaveSettings) {
        self.waves.clear();
        self.waves.extend_from_slice(&settings.waves);
        self.peak_sharpness = settings.peak_sharpness;
        self.gravity = settings.gravity;

        self.wave_data.clear();
        self.wave_data.extend(self.waves.iter().map(|wave| {
            Vec4::new(wave.amplitude, wave.direction_deg, wave.wavelength, 0.0)
        }));
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// Packed per-wave parameters for the rendering layer.
    pub fn wave_data(&self) -> &[Vec4] {
        &self.wave_data
    }

    /// Surface height overlying world (x, z) at time `time_s`.
    ///
    /// Gerstner waves displace horizontally as well as vertically, so the
    /// displacement at the query point belongs to a different surface column.
    /// Three fixed-point refinements re-evaluate at `position - displacement`
    /// until the result converges on the column actually above (x, z).
    pub fn sample_height(&self, x: f32, z: f32, time_s: f32) -> f32 {
        let position = Vec2::new(x, z);

        let mut displacement = self.sample_displacement(position, time_s).displacement;
        displacement = self
            .sample_displacement(position - displacement.xz(), time_s)
            .displacement;
        displacement = self
            .sample_displacement(position - displacement.xz(), time_s)
            .displacement;

        self.sample_displacement(position - displacement.xz(), time_s)
            .displacement
            .y
    }

    /// Sum displacement and normal contributions of every active wave at a
    /// world (x, z) position.
    ///
    /// Zero active waves yields zero displacement and a default-up normal.
    pub fn sample_displacement(&self, position: Vec2, time_s: f32) -> WaveSample {
        if self.waves.is_empty() {
            return WaveSample::default();
        }

        // Weight distributing the displacement budget across all waves
        let wave_count_multi = 1.0 / self.waves.len() as f32;

        let mut displacement = Vec3::ZERO;
        let mut normal = Vec3::ZERO;
        for wave in &self.waves {
            let sample = self.gerstner_wave(position, wave_count_multi, wave, time_s);
            displacement += sample.displacement;
            normal += sample.normal;
        }

        WaveSample {
            displacement,
            normal,
        }
    }

    /// Single Gerstner wave contribution at a world (x, z) position.
    fn gerstner_wave(
        &self,
        position: Vec2,
        wave_count_multi: f32,
        wave: &WaveParameter,
        time_s: f32,
    ) -> WaveSample {
        // Angular wavenumber and deep-water phase speed
        let w = std::f32::consts::TAU / wave.wavelength;
        let w_speed = (self.gravity * w).sqrt();

        // Steepness factor controlling horizontal displacement. Deliberately
        // unclamped: amplitude and wavelength are validated > 0 upstream.
        let qi = self.peak_sharpness / (wave.amplitude * w * wave_count_multi);

        let direction = wave.direction_deg.to_radians();
        let wind_dir = Vec2::new(direction.sin(), direction.cos());

        // Phase kx - wt along the propagation direction
        let phase = wind_dir.dot(position) * w - time_s * w_speed;
        let cos_phase = phase.cos();
        let sin_phase = phase.sin();

        // Horizontal displacement follows cos, vertical follows sin; height
        // is split evenly across the superposed waves.
        let displacement = Vec3::new(
            qi * wave.amplitude * wind_dir.x * cos_phase,
            sin_phase * wave.amplitude * wave_count_multi,
            qi * wave.amplitude * wind_dir.y * cos_phase,
        );

        // Analytic partial derivatives of the displaced surface
        let normal = Vec3::new(
            -(wind_dir.x * w * wave.amplitude * cos_phase),
            1.0 - qi * w * wave.amplitude * sin_phase,
            -(wind_dir.y * w * wave.amplitude * cos_phase),
        )
        .normalize();

        WaveSample {
            displacement,
            normal: normal * wave_count_multi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::WaveSettings;

    fn single_wave_settings() -> WaveSettings {
        WaveSettings {
            waves: vec![WaveParameter {
                amplitude: 1.0,
                direction_deg: 0.0,
                wavelength: 10.0,
            }],
            ..WaveSettings::default()
        }
    }

    #[test]
    fn test_empty_wave_set_is_flat() {
        let field = WaveField::new(&WaveSettings {
            waves: vec![],
            ..WaveSettings::default()
        });

        let sample = field.sample_displacement(Vec2::new(12.5, -3.0), 4.2);
        assert_eq!(sample.displacement, Vec3::ZERO);
        assert_eq!(sample.normal, Vec3::Y);
        assert_eq!(field.sample_height(12.5, -3.0, 4.2), 0.0);
    }

    #[test]
    fn test_origin_zero_phase() {
        // Single wave, query at origin at t=0: phase is 0, so the sin terms
        // vanish and the surface sits on the rest plane. The cos term leaves
        // a horizontal offset along the propagation direction (+Z for 0°)
        // bounded by qi * amplitude.
        let field = WaveField::new(&single_wave_settings());
        let sample = field.sample_displacement(Vec2::ZERO, 0.0);

        assert!(sample.displacement.y.abs() < 1e-5);
        assert!(sample.displacement.x.abs() < 1e-5);
        let w = std::f32::consts::TAU / 10.0;
        let qi = 0.2 / w;
        assert!((sample.displacement.z - qi).abs() < 1e-4);

        // Normal tilts against the propagation direction but stays upward
        assert!(sample.normal.x.abs() < 1e-5);
        assert!(sample.normal.y > 0.7);
    }

    #[test]
    fn test_sample_height_deterministic() {
        let field = WaveField::new(&WaveSettings::default());
        let a = field.sample_height(37.2, -101.5, 8.125);
        let b = field.sample_height(37.2, -101.5, 8.125);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_height_iteration_converges_at_origin() {
        // With a gentle steepness the horizontal offset at the origin is
        // tiny, so the iterative solve must agree with the single-pass
        // estimate to within a small epsilon.
        let field = WaveField::new(&WaveSettings {
            peak_sharpness: 0.01,
            ..single_wave_settings()
        });

        let single_pass = field.sample_displacement(Vec2::ZERO, 0.0).displacement.y;
        let iterated = field.sample_height(0.0, 0.0, 0.0);
        assert!((iterated - single_pass).abs() < 0.02);
    }

    #[test]
    fn test_height_iteration_fixed_point() {
        // Successive refinements must approach a fixed point: one more
        // iteration past the three performed by sample_height barely moves
        // the result.
        let field = WaveField::new(&single_wave_settings());
        let position = Vec2::new(3.0, 7.0);
        let time_s = 1.5;

        let mut displacement = field.sample_displacement(position, time_s).displacement;
        for _ in 0..3 {
            displacement = field
                .sample_displacement(position - displacement.xz(), time_s)
                .displacement;
        }
        let once_more = field
            .sample_displacement(position - displacement.xz(), time_s)
            .displacement;
        assert!((once_more.y - displacement.y).abs() < 5e-2);
    }

    #[test]
    fn test_wave_data_packing() {
        let field = WaveField::new(&single_wave_settings());
        assert_eq!(field.wave_count(), 1);
        assert_eq!(field.wave_data(), &[Vec4::new(1.0, 0.0, 10.0, 0.0)]);
    }

    #[test]
    fn test_normals_average_to_unit_scale() {
        // Contributions are scaled by 1/count, so a many-wave normal still
        // points broadly upward.
        let field = WaveField::new(&WaveSettings::default());
        let sample = field.sample_displacement(Vec2::new(5.0, 9.0), 1.0);
        assert!(sample.normal.y > 0.0);
    }
}
