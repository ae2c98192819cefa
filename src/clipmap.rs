//! Adaptive clip-map geometry: nested square LOD annuli kept centered on a
//! moving viewer.
//!
//! Meshes are built once and shared read-only across levels; only the
//! per-level transforms move every frame. Positions snap to twice the level
//! scale so the grid never slides by sub-cell amounts, and trim strips rotate
//! into whichever quadrant the viewer shifted toward to close the gap between
//! consecutive ring scales.

pub mod mesh;

use glam::{Quat, Vec3};

use crate::params::ClipmapParams;
use mesh::MeshData;

/// Per-level placement of a shared patch mesh.
///
/// The builder exclusively owns these; the rendering layer reads them for
/// draw submission. `scale` applies to X and Z only (Y stays 1).
#[derive(Debug, Clone, Copy)]
pub struct LevelTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
    pub active: bool,
}

impl Default for LevelTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
            active: true,
        }
    }
}

/// Clip-map mesh hierarchy and per-frame placement.
pub struct ClipmapGeometry {
    center_mesh: MeshData,
    ring_mesh: MeshData,
    trim_mesh: MeshData,
    skirt_mesh: MeshData,

    center: LevelTransform,
    skirt: LevelTransform,
    rings: Vec<LevelTransform>,
    trims: Vec<LevelTransform>,

    // One of four 90-degree orientations, indexed by quadrant shift
    trim_rotations: [Quat; 4],

    previous_vertex_density: usize,
    previous_skirt_size: f32,
}

impl ClipmapGeometry {
    pub fn new(params: &ClipmapParams) -> Self {
        let trim_rotations = [
            Quat::from_rotation_y(180f32.to_radians()),
            Quat::from_rotation_y(90f32.to_radians()),
            Quat::from_rotation_y(270f32.to_radians()),
            Quat::IDENTITY,
        ];

        let mut clipmap = Self {
            center_mesh: MeshData::default(),
            ring_mesh: MeshData::default(),
            trim_mesh: MeshData::default(),
            skirt_mesh: MeshData::default(),
            center: LevelTransform::default(),
            skirt: LevelTransform::default(),
            rings: Vec::new(),
            trims: Vec::new(),
            trim_rotations,
            previous_vertex_density: 0,
            previous_skirt_size: f32::NAN,
        };
        clipmap.build_meshes(params);
        clipmap
    }

    /// Per-frame update: rebuild meshes if resolution parameters changed
    /// (rare, out-of-band reconfiguration), then recompute all transforms
    /// from the viewer position.
    pub fn update(&mut self, params: &ClipmapParams, viewer_pos: Vec3) {
        if self.rings.len() != params.clip_levels
            || self.previous_vertex_density != params.vertex_density
            || self.previous_skirt_size != params.skirt_size
        {
            log::info!(
                "rebuilding clipmap meshes: {} levels, density {}, skirt {}",
                params.clip_levels,
                params.vertex_density,
                params.skirt_size
            );
            self.build_meshes(params);
        }

        self.update_positions(params, viewer_pos);
    }

    /// Tear down and rebuild every patch mesh. Expensive; only runs when
    /// vertex density, skirt size, or level count change.
    fn build_meshes(&mut self, params: &ClipmapParams) {
        let k = params.grid_size();

        self.center_mesh = MeshData::center(k);
        self.ring_mesh = MeshData::ring(k);
        self.trim_mesh = MeshData::trim(k);
        self.skirt_mesh = MeshData::skirt(k, params.skirt_size);

        self.rings = vec![LevelTransform::default(); params.clip_levels];
        self.trims = vec![LevelTransform::default(); params.clip_levels];
        self.center = LevelTransform::default();
        self.skirt = LevelTransform::default();

        self.previous_vertex_density = params.vertex_density;
        self.previous_skirt_size = params.skirt_size;
    }

    /// Number of levels rendered at full ring detail for a viewer at height
    /// `viewer_y`: higher altitude deactivates the finest rings.
    pub fn active_lod_levels(params: &ClipmapParams, viewer_y: f32) -> usize {
        let ratio = (1.7 * viewer_y.abs() + 1.0) / params.length_scale;
        let bias = (ratio.log2() as i32).clamp(0, params.clip_levels as i32);
        params.clip_levels - bias as usize
    }

    /// Scale of a clip level. Level -1 is the center patch.
    fn clip_level_scale(params: &ClipmapParams, level: i32, active_levels: usize) -> f32 {
        let k = params.grid_size() as f32;
        params.length_scale / k
            * 2f32.powi(params.clip_levels as i32 - active_levels as i32 + level + 1)
    }

    /// World offset from the mathematically ideal ring center for a level.
    fn offset_from_center(params: &ClipmapParams, level: i32, active_levels: usize) -> Vec3 {
        let k = params.grid_size() as f32;
        let sum = geometric_progression_sum(
            2.0,
            2.0,
            params.clip_levels as i32 - active_levels as i32 + level + 1,
            params.clip_levels as i32 - 1,
        );
        (2f32.powi(params.clip_levels as i32) + sum) * params.length_scale / k * (k - 1.0) / 2.0
            * Vec3::new(-1.0, 0.0, -1.0)
    }

    /// Snap a world position to a multiple of `step`, flattening Y.
    fn snap(coords: Vec3, step: f32) -> Vec3 {
        let x = if coords.x >= 0.0 {
            (coords.x / step).floor() * step
        } else {
            ((coords.x - step + 1.0) / step).ceil() * step
        };
        let z = if coords.z < 0.0 {
            (coords.z / step).floor() * step
        } else {
            ((coords.z - step + 1.0) / step).ceil() * step
        };
        Vec3::new(x, 0.0, z)
    }

    /// Recompute all level transforms for the current viewer position.
    fn update_positions(&mut self, params: &ClipmapParams, viewer_pos: Vec3) {
        let k = params.grid_size() as f32;
        let active_levels = Self::active_lod_levels(params, viewer_pos.y);

        let mut scale = Self::clip_level_scale(params, -1, active_levels);
        let mut previous_snapped = Self::snap(viewer_pos, scale * 2.0);

        self.center.position = previous_snapped + Self::offset_from_center(params, -1, active_levels);
        self.center.scale = scale;
        self.center.active = true;

        for i in 0..params.clip_levels {
            let active = i < active_levels;
            self.rings[i].active = active;
            self.trims[i].active = active;
            if !active {
                continue;
            }

            scale = Self::clip_level_scale(params, i as i32, active_levels);
            let center_offset = Self::offset_from_center(params, i as i32, active_levels);
            let snapped = Self::snap(viewer_pos, scale * 2.0);

            // Trim sits at the boundary between this ring and the previous
            // scale; the quadrant the viewer shifted into picks which of the
            // four orientations closes the gap.
            let mut trim_position =
                center_offset + snapped + scale * (k - 1.0) / 2.0 * Vec3::new(1.0, 0.0, 1.0);
            let shift_x = usize::from(previous_snapped.x - snapped.x < f32::EPSILON);
            let shift_z = usize::from(previous_snapped.z - snapped.z < f32::EPSILON);
            trim_position += shift_x as f32 * (k + 1.0) * scale * Vec3::X;
            trim_position += shift_z as f32 * (k + 1.0) * scale * Vec3::Z;

            self.trims[i].position = trim_position;
            self.trims[i].rotation = self.trim_rotations[shift_x + 2 * shift_z];
            self.trims[i].scale = scale;

            self.rings[i].position = snapped + center_offset;
            self.rings[i].scale = scale;

            previous_snapped = snapped;
        }

        // Skirt recentered on the outermost snapped position
        let skirt_scale = params.length_scale * 2.0 * 2f32.powi(params.clip_levels as i32);
        self.skirt.position = Vec3::new(-1.0, 0.0, -1.0)
            * skirt_scale
            * (params.skirt_size + 0.5 - 0.5 / k)
            + previous_snapped;
        self.skirt.scale = skirt_scale;
        self.skirt.active = true;
    }

    // Read-only geometry and placement for the rendering layer

    pub fn center_mesh(&self) -> &MeshData {
        &self.center_mesh
    }

    pub fn ring_mesh(&self) -> &MeshData {
        &self.ring_mesh
    }

    pub fn trim_mesh(&self) -> &MeshData {
        &self.trim_mesh
    }

    pub fn skirt_mesh(&self) -> &MeshData {
        &self.skirt_mesh
    }

    pub fn center(&self) -> &LevelTransform {
        &self.center
    }

    pub fn skirt(&self) -> &LevelTransform {
        &self.skirt
    }

    pub fn rings(&self) -> &[LevelTransform] {
        &self.rings
    }

    pub fn trims(&self) -> &[LevelTransform] {
        &self.trims
    }
}

/// Partial sum of a geometric progression, terms n1..n2.
fn geometric_progression_sum(b0: f32, q: f32, n1: i32, n2: i32) -> f32 {
    b0 / (1.0 - q) * (q.powi(n2) - q.powi(n1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> ClipmapParams {
        ClipmapParams {
            length_scale: 100.0,
            vertex_density: 4,
            clip_levels: 3,
            skirt_size: 10.0,
        }
    }

    #[test]
    fn test_active_levels_at_sea_level() {
        let params = test_params();
        assert_eq!(ClipmapGeometry::active_lod_levels(&params, 0.0), 3);
    }

    #[test]
    fn test_active_levels_drop_with_altitude() {
        // (1.7 * 120 + 1) / 100 ≈ 2.05, log2 ≈ 1 → one ring deactivated
        let params = test_params();
        assert_eq!(ClipmapGeometry::active_lod_levels(&params, 120.0), 2);
    }

    #[test]
    fn test_active_levels_monotonic_in_height() {
        let params = test_params();
        let mut previous = params.clip_levels;
        for step in 0..200 {
            let height = step as f32 * 25.0;
            let active = ClipmapGeometry::active_lod_levels(&params, height);
            assert!(
                active <= previous,
                "active levels rose from {} to {} at height {}",
                previous,
                active,
                height
            );
            previous = active;
        }
    }

    #[test]
    fn test_update_activates_levels() {
        let params = test_params();
        let mut clipmap = ClipmapGeometry::new(&params);

        clipmap.update(&params, Vec3::new(3.0, 0.0, -8.0));
        assert!(clipmap.rings().iter().all(|r| r.active));
        assert!(clipmap.trims().iter().all(|t| t.active));

        clipmap.update(&params, Vec3::new(3.0, 120.0, -8.0));
        let active: Vec<bool> = clipmap.rings().iter().map(|r| r.active).collect();
        assert_eq!(active, vec![true, true, false]);
    }

    #[test]
    fn test_positions_snap_to_level_grid() {
        let params = test_params();
        let mut clipmap = ClipmapGeometry::new(&params);
        clipmap.update(&params, Vec3::new(137.3, 0.0, -52.9));

        let active_levels = ClipmapGeometry::active_lod_levels(&params, 0.0);
        for (i, ring) in clipmap.rings().iter().enumerate() {
            let scale = ClipmapGeometry::clip_level_scale(&params, i as i32, active_levels);
            let offset = ClipmapGeometry::offset_from_center(&params, i as i32, active_levels);
            let local = ring.position - offset;
            let step = scale * 2.0;
            assert!(
                (local.x / step - (local.x / step).round()).abs() < 1e-3,
                "ring {} x {} not snapped to {}",
                i,
                local.x,
                step
            );
        }
    }

    #[test]
    fn test_snap_idempotent() {
        let snapped = ClipmapGeometry::snap(Vec3::new(137.3, 40.0, -52.9), 8.0);
        let again = ClipmapGeometry::snap(snapped, 8.0);
        assert_eq!(snapped, again);
        assert_eq!(snapped.y, 0.0);
    }

    #[test]
    fn test_rebuild_on_density_change() {
        let params = test_params();
        let mut clipmap = ClipmapGeometry::new(&params);
        let before = clipmap.center_mesh().vertices.len();

        let mut denser = params.clone();
        denser.vertex_density = 8;
        clipmap.update(&denser, Vec3::ZERO);
        assert!(clipmap.center_mesh().vertices.len() > before);
        assert_eq!(clipmap.rings().len(), denser.clip_levels);
    }

    #[test]
    fn test_center_mesh_counts() {
        let params = test_params();
        let clipmap = ClipmapGeometry::new(&params);
        let k = params.grid_size();

        // Center patch is 2k x 2k cells
        assert_eq!(clipmap.center_mesh().vertices.len(), (2 * k + 1).pow(2));
        assert_eq!(clipmap.center_mesh().indices.len(), (2 * k) * (2 * k) * 6);
    }

    #[test]
    fn test_trim_rotation_selected_by_quadrant() {
        let params = test_params();
        let mut clipmap = ClipmapGeometry::new(&params);
        clipmap.update(&params, Vec3::ZERO);

        // All trim rotations come from the fixed 90-degree table
        for trim in clipmap.trims() {
            let found = clipmap
                .trim_rotations
                .iter()
                .any(|q| q.abs_diff_eq(trim.rotation, 1e-5));
            assert!(found);
        }
    }
}
