//! Voxel-sampling buoyancy: approximates submerged-volume force on a rigid
//! body from a small fixed set of probe points instead of per-triangle
//! integration.
//!
//! The sampler only computes force/torque requests; applying them is the
//! external rigid-body integrator's job.

use glam::{Quat, Vec3};

use crate::params::BuoyancyParams;

/// Anything that can answer "how high is the water at (x, z)".
pub trait SurfaceHeight {
    fn height_at(&self, x: f32, z: f32) -> f32;
}

impl<F: Fn(f32, f32) -> f32> SurfaceHeight for F {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self(x, z)
    }
}

/// Local-space axis-aligned bounds of a body's collision volume.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Rigid-body state snapshot consumed once per physics step.
#[derive(Debug, Clone, Copy)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// A force to apply at a world position (off-center application produces
/// torque in the external integrator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceRequest {
    pub position: Vec3,
    pub force: Vec3,
}

/// Fixed probe set for one floating body.
///
/// Probe count is fixed after construction; per-step work is a height query
/// and a few multiplies per probe.
pub struct BuoyancySampler {
    probes: Vec<Vec3>,
    probe_half_height: f32,
    /// Total buoyant force at full submersion, split evenly across probes.
    archimedes_per_probe: Vec3,
    damping: f32,
    mass: f32,
}

impl BuoyancySampler {
    /// Partition the body's bounds into probes, optionally filtered by a
    /// containment predicate (for non-convex shapes), then welded down to
    /// the configured probe limit.
    ///
    /// `gravity` is the external physics engine's gravitational acceleration
    /// (its sign is irrelevant, only the magnitude is used).
    pub fn new(
        bounds: Aabb,
        mass: f32,
        gravity: f32,
        params: &BuoyancyParams,
        contains: Option<&dyn Fn(Vec3) -> bool>,
    ) -> Self {
        let mut probes = slice_into_voxels(bounds, params.slices_per_axis);
        if let Some(contains) = contains {
            probes.retain(|&point| contains(point));
            if probes.is_empty() {
                // Degenerate filter: fall back to a single probe at the
                // bounds center rather than a force-less body
                log::warn!("containment filter rejected every probe; using bounds center");
                probes.push(bounds.center());
            }
        }
        weld_points(&mut probes, params.voxel_limit);

        let size = bounds.size();
        let probe_half_height =
            size.x.min(size.y).min(size.z) / (2.0 * params.slices_per_axis as f32);

        let volume = mass / params.body_density;
        let archimedes_magnitude = params.water_density * gravity.abs() * volume;
        let archimedes_per_probe = Vec3::Y * archimedes_magnitude / probes.len() as f32;

        Self {
            probes,
            probe_half_height,
            archimedes_per_probe,
            damping: params.damping,
            mass,
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn probes(&self) -> &[Vec3] {
        &self.probes
    }

    pub fn probe_half_height(&self) -> f32 {
        self.probe_half_height
    }

    /// Compute force requests for one physics step.
    ///
    /// Each submerged probe contributes a damping force opposing its local
    /// velocity plus its share of the Archimedes force scaled by the
    /// submersion fraction; probes above water contribute nothing.
    pub fn step(&self, body: &BodyState, surface: &dyn SurfaceHeight) -> Vec<ForceRequest> {
        let mut requests = Vec::with_capacity(self.probes.len());

        for &probe in &self.probes {
            let world_point = body.position + body.rotation * probe;
            let water_level = surface.height_at(world_point.x, world_point.z);

            if world_point.y - self.probe_half_height >= water_level {
                continue;
            }

            // Submersion fraction: 0 at half-height above the line, 1 at
            // half-height below, clamped in between
            let k = ((water_level - world_point.y) / (2.0 * self.probe_half_height) + 0.5)
                .clamp(0.0, 1.0);

            let velocity =
                body.linear_velocity + body.angular_velocity.cross(world_point - body.position);
            let damping_force = -velocity * self.damping * self.mass;
            let force = damping_force + k * self.archimedes_per_probe;

            requests.push(ForceRequest {
                position: world_point,
                force,
            });
        }

        requests
    }
}

/// Keep a decorative prop riding the surface: returns the position with Y
/// snapped to the sampled water height.
pub fn float_position(surface: &dyn SurfaceHeight, position: Vec3) -> Vec3 {
    Vec3::new(
        position.x,
        surface.height_at(position.x, position.z),
        position.z,
    )
}

/// Candidate probes at the centers of a regular `slices³` subdivision of the
/// bounds.
fn slice_into_voxels(bounds: Aabb, slices_per_axis: usize) -> Vec<Vec3> {
    let size = bounds.size();
    let slices = slices_per_axis as f32;
    let mut points = Vec::with_capacity(slices_per_axis.pow(3));

    for ix in 0..slices_per_axis {
        for iy in 0..slices_per_axis {
            for iz in 0..slices_per_axis {
                points.push(Vec3::new(
                    bounds.min.x + size.x / slices * (0.5 + ix as f32),
                    bounds.min.y + size.y / slices * (0.5 + iy as f32),
                    bounds.min.z + size.z / slices * (0.5 + iz as f32),
                ));
            }
        }
    }

    points
}

/// Iteratively replace the two closest points with their midpoint until the
/// set fits the target count. No-op for degenerate targets (< 2) or sets
/// already at or below the limit.
fn weld_points(points: &mut Vec<Vec3>, target_count: usize) {
    if points.len() <= 2 || target_count < 2 {
        return;
    }

    while points.len() > target_count {
        let (first, second) = find_closest_points(points);
        let midpoint = (points[first] + points[second]) * 0.5;
        // Remove the higher index first so the lower stays valid
        points.remove(second);
        points.remove(first);
        points.push(midpoint);
    }
}

/// Indices of the closest pair (first < second). O(n²), setup-only cost.
fn find_closest_points(points: &[Vec3]) -> (usize, usize) {
    let mut min_distance = f32::MAX;
    let mut pair = (0, 1);

    for i in 0..points.len() - 1 {
        for j in i + 1..points.len() {
            let distance = points[i].distance(points[j]);
            if distance < min_distance {
                min_distance = distance;
                pair = (i, j);
            }
        }
    }

    pair
}
