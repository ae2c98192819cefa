//! Dynamic-wave cascades: per-LOD texel-snapped anchors and a multi-layer
//! texture array accumulating localized surface disturbances.
//!
//! [`CascadeTransform`] recomputes spatial alignment every frame before any
//! disturbance is rasterized; [`DynamicWaveCascade`] clears and redraws the
//! layers from the registered disturbance sources and publishes the per-LOD
//! parameter arrays consumers use to address the texture by world position.

use std::rc::{Rc, Weak};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::params::CascadeParams;

/// Upper bound on cascade layers (keeps the published parameter arrays a
/// fixed size for shader-side consumers).
pub const MAX_LOD_COUNT: usize = 15;

/// Height of the virtual top-down rasterization camera above the water plane.
const CAMERA_HEIGHT: f32 = 100.0;

/// Per-LOD spatial alignment data, recomputed every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeRenderData {
    /// World width of one texel (meters).
    pub texel_width: f32,
    /// Layer resolution in texels; 0 marks never-written data.
    pub texture_resolution: u32,
    /// Viewer position snapped down to the texel grid on X/Z, Y forced to
    /// the water plane.
    pub pos_snapped: Vec3,
}

impl CascadeRenderData {
    /// XZ rectangle covered by this cascade layer.
    pub fn rect_xz(&self) -> RectXz {
        let width = self.texel_width * self.texture_resolution as f32;
        RectXz {
            min: Vec2::new(
                self.pos_snapped.x - width / 2.0,
                self.pos_snapped.z - width / 2.0,
            ),
            size: width,
        }
    }
}

/// Axis-aligned square region on the water plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectXz {
    pub min: Vec2,
    pub size: f32,
}

impl RectXz {
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.min.x + self.size
            && point.y >= self.min.y
            && point.y <= self.min.y + self.size
    }
}

/// Per-LOD snapped anchors and camera-equivalent view/projection matrices.
pub struct CascadeTransform {
    render_data: Vec<CascadeRenderData>,
    /// Previous frame's data, retained for temporal blending downstream.
    render_data_source: Vec<CascadeRenderData>,
    world_to_camera: Vec<Mat4>,
    projection: Vec<Mat4>,
}

impl CascadeTransform {
    pub fn new(cascade_count: usize) -> Self {
        Self {
            render_data: vec![CascadeRenderData::default(); cascade_count],
            render_data_source: vec![CascadeRenderData::default(); cascade_count],
            world_to_camera: vec![Mat4::IDENTITY; cascade_count],
            projection: vec![Mat4::IDENTITY; cascade_count],
        }
    }

    pub fn cascade_count(&self) -> usize {
        self.render_data.len()
    }

    /// Snap every cascade layer to the texel grid for the current viewer
    /// position and rebuild the top-down view/projection matrix pairs.
    ///
    /// Must run before any disturbance is rasterized in the same frame.
    pub fn update_transforms(&mut self, params: &CascadeParams, viewer_pos: Vec3) {
        if self.render_data.len() != params.cascade_count {
            *self = Self::new(params.cascade_count);
        }

        for lod in 0..self.render_data.len() {
            self.render_data_source[lod] = self.render_data[lod];

            let lod_scale = params.lod_scale(lod);
            let ortho_half = 2.0 * lod_scale;
            let texel_width = 2.0 * ortho_half / params.resolution as f32;

            // Snap down to the texel grid so accumulated disturbances do not
            // slide when the viewer moves a sub-texel distance
            let pos_snapped = Vec3::new(
                viewer_pos.x - viewer_pos.x.rem_euclid(texel_width),
                0.0,
                viewer_pos.z - viewer_pos.z.rem_euclid(texel_width),
            );

            self.render_data[lod] = CascadeRenderData {
                texel_width,
                texture_resolution: params.resolution,
                pos_snapped,
            };

            // First frame: no previous data exists yet
            if self.render_data_source[lod].texture_resolution == 0 {
                self.render_data_source[lod] = self.render_data[lod];
            }

            // Virtual camera above the snapped anchor, looking straight down;
            // world +Z maps to texture up
            let eye = pos_snapped + Vec3::Y * CAMERA_HEIGHT;
            self.world_to_camera[lod] = Mat4::look_at_rh(eye, eye - Vec3::Y, Vec3::Z);
            self.projection[lod] = Mat4::orthographic_rh(
                -ortho_half,
                ortho_half,
                -ortho_half,
                ortho_half,
                1.0,
                200.0,
            );
        }
    }

    pub fn render_data(&self, lod: usize) -> &CascadeRenderData {
        &self.render_data[lod]
    }

    /// Previous frame's alignment for consumers needing temporal continuity.
    pub fn render_data_source(&self, lod: usize) -> &CascadeRenderData {
        &self.render_data_source[lod]
    }

    pub fn world_to_camera(&self, lod: usize) -> Mat4 {
        self.world_to_camera[lod]
    }

    pub fn projection(&self, lod: usize) -> Mat4 {
        self.projection[lod]
    }

    pub fn view_projection(&self, lod: usize) -> Mat4 {
        self.projection[lod] * self.world_to_camera[lod]
    }
}

/// A point-splat disturbance (splash, wake segment) rasterized into the
/// cascade each frame. Implementors are owned by gameplay code; the cascade
/// only holds weak references.
pub trait DisturbanceSource {
    /// World position of the splat center.
    fn world_position(&self) -> Vec3;

    /// Splat radius in meters.
    fn radius(&self) -> f32;

    /// Displacement added at the splat center (meters, fades linearly to the
    /// rim).
    fn strength(&self) -> f32;
}

/// One square f32 layer per cascade LOD.
///
/// Stand-in for the GPU texture array the rendering layer uploads; recreated
/// whole on resolution change, never resized in place, so a mismatched array
/// can never be sampled.
pub struct CascadeTextureArray {
    resolution: u32,
    layers: Vec<Vec<f32>>,
}

impl CascadeTextureArray {
    fn new(cascade_count: usize, resolution: u32) -> Self {
        let texels = (resolution * resolution) as usize;
        Self {
            resolution,
            layers: vec![vec![0.0; texels]; cascade_count],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn layer(&self, lod: usize) -> &[f32] {
        &self.layers[lod]
    }

    fn clear_layer(&mut self, lod: usize) {
        self.layers[lod].fill(0.0);
    }

    fn texel(&self, lod: usize, x: u32, y: u32) -> f32 {
        self.layers[lod][(y * self.resolution + x) as usize]
    }
}

/// Published per-LOD addressing parameters, one row per layer plus a
/// sentinel copy so consumers may read `index + 1` without bounds checks.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CascadeShaderParams {
    /// (pos_snapped.x, pos_snapped.z, lod_scale, 0) per layer.
    pub pos_scales: [[f32; 4]; MAX_LOD_COUNT + 1],
    /// (texel_width, resolution, valid flag, 1/resolution) per layer.
    pub sizes: [[f32; 4]; MAX_LOD_COUNT + 1],
}

impl Default for CascadeShaderParams {
    fn default() -> Self {
        Self {
            pos_scales: [[0.0; 4]; MAX_LOD_COUNT + 1],
            sizes: [[0.0; 4]; MAX_LOD_COUNT + 1],
        }
    }
}

/// Multi-layer accumulator for transient surface disturbances.
pub struct DynamicWaveCascade {
    cascade_count: usize,
    targets: CascadeTextureArray,
    sources: Vec<Weak<dyn DisturbanceSource>>,
    shader_params: CascadeShaderParams,
}

impl DynamicWaveCascade {
    pub fn new(params: &CascadeParams) -> Self {
        let cascade_count = params.cascade_count.min(MAX_LOD_COUNT);
        Self {
            cascade_count,
            targets: CascadeTextureArray::new(cascade_count, params.resolution),
            sources: Vec::new(),
            shader_params: CascadeShaderParams::default(),
        }
    }

    /// Register a disturbance source. The cascade keeps only a weak
    /// reference; a dropped source is skipped and pruned.
    pub fn add_source(&mut self, source: &Rc<dyn DisturbanceSource>) {
        self.sources.push(Rc::downgrade(source));
    }

    pub fn remove_source(&mut self, source: &Rc<dyn DisturbanceSource>) {
        self.sources.retain(|weak| {
            weak.upgrade()
                .map_or(false, |live| !Rc::ptr_eq(&live, source))
        });
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Per-frame rebuild: reallocate on resolution change, refresh the
    /// published parameters, then clear and redraw every layer coarsest to
    /// finest from the live disturbance sources.
    pub fn update(&mut self, params: &CascadeParams, transform: &CascadeTransform) {
        let cascade_count = params.cascade_count.min(MAX_LOD_COUNT);
        if self.targets.resolution != params.resolution || self.cascade_count != cascade_count {
            log::info!(
                "recreating cascade texture array: {} layers at {}x{}",
                cascade_count,
                params.resolution,
                params.resolution
            );
            self.cascade_count = cascade_count;
            self.targets = CascadeTextureArray::new(cascade_count, params.resolution);
        }

        self.update_shader_params(params, transform);

        // Drop references to destroyed sources before drawing
        self.sources.retain(|weak| weak.strong_count() > 0);

        for lod in (0..self.cascade_count).rev() {
            self.targets.clear_layer(lod);
            self.rasterize_layer(lod, transform);
        }
    }

    fn update_shader_params(&mut self, params: &CascadeParams, transform: &CascadeTransform) {
        for lod in 0..self.cascade_count {
            let data = transform.render_data(lod);
            self.shader_params.pos_scales[lod] = [
                data.pos_snapped.x,
                data.pos_snapped.z,
                params.lod_scale(lod),
                0.0,
            ];
            self.shader_params.sizes[lod] = [
                data.texel_width,
                data.texture_resolution as f32,
                1.0,
                1.0 / data.texture_resolution as f32,
            ];
        }

        // Sentinel row: copy of the last layer, flagged invalid, so a
        // consumer reading index + 1 never runs off the arrays
        self.shader_params.pos_scales[self.cascade_count] =
            self.shader_params.pos_scales[self.cascade_count - 1];
        self.shader_params.sizes[self.cascade_count] =
            self.shader_params.sizes[self.cascade_count - 1];
        self.shader_params.sizes[self.cascade_count][2] = 0.0;
    }

    /// Splat every live source into one layer through that LOD's
    /// view/projection pair.
    fn rasterize_layer(&mut self, lod: usize, transform: &CascadeTransform) {
        let view_proj = transform.view_projection(lod);
        let data = *transform.render_data(lod);
        let resolution = self.targets.resolution;

        for weak in &self.sources {
            let Some(source) = weak.upgrade() else {
                continue;
            };

            let clip = view_proj * source.world_position().extend(1.0);
            let ndc = Vec2::new(clip.x, clip.y);

            // Texel coordinates of the splat center
            let center = (ndc * 0.5 + Vec2::splat(0.5)) * resolution as f32;
            let radius_texels = (source.radius() / data.texel_width).max(1.0);

            let min_x = (center.x - radius_texels).floor().max(0.0) as i64;
            let max_x = (center.x + radius_texels).ceil().min(resolution as f32 - 1.0) as i64;
            let min_y = (center.y - radius_texels).floor().max(0.0) as i64;
            let max_y = (center.y + radius_texels).ceil().min(resolution as f32 - 1.0) as i64;
            if min_x > max_x || min_y > max_y {
                continue;
            }

            let layer = &mut self.targets.layers[lod];
            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let texel_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let distance = texel_center.distance(center);
                    let falloff = (1.0 - distance / radius_texels).max(0.0);
                    layer[(y as u32 * resolution + x as u32) as usize] +=
                        source.strength() * falloff;
                }
            }
        }
    }

    /// Published addressing parameters for the rendering layer.
    pub fn shader_params(&self) -> &CascadeShaderParams {
        &self.shader_params
    }

    pub fn texture_array(&self) -> &CascadeTextureArray {
        &self.targets
    }

    /// Additive displacement at a world (x, z) position: bilinear fetch from
    /// the finest layer covering the point. This mirrors the texel mapping
    /// used during rasterization.
    pub fn sample(&self, transform: &CascadeTransform, x: f32, z: f32) -> f32 {
        let point = Vec2::new(x, z);
        for lod in 0..self.cascade_count {
            let data = transform.render_data(lod);
            if data.texture_resolution != self.targets.resolution {
                // Stale alignment from before a reallocation; never sample it
                continue;
            }
            if !data.rect_xz().contains(point) {
                continue;
            }

            let ortho_half = data.texel_width * data.texture_resolution as f32 / 2.0;
            // Same mapping as the ortho view/projection: world +X maps to
            // -ndc.x, world +Z maps to +ndc.y
            let ndc = Vec2::new(
                -(x - data.pos_snapped.x) / ortho_half,
                (z - data.pos_snapped.z) / ortho_half,
            );
            let texel = (ndc * 0.5 + Vec2::splat(0.5)) * data.texture_resolution as f32;
            return self.bilinear(lod, texel);
        }
        0.0
    }

    fn bilinear(&self, lod: usize, texel: Vec2) -> f32 {
        let max_index = (self.targets.resolution - 1) as f32;
        let fx = (texel.x - 0.5).clamp(0.0, max_index);
        let fy = (texel.y - 0.5).clamp(0.0, max_index);

        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.targets.resolution - 1);
        let y1 = (y0 + 1).min(self.targets.resolution - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = self.targets.texel(lod, x0, y0) * (1.0 - tx) + self.targets.texel(lod, x1, y0) * tx;
        let bottom =
            self.targets.texel(lod, x0, y1) * (1.0 - tx) + self.targets.texel(lod, x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}
