//! Seam-aware mesh construction for the clip-map patches.
//!
//! All patches are grids of unit cells in the XZ plane; per-level scale and
//! placement live in the level transforms, never in the vertex data. Edges
//! flagged as seams snap their vertices to even grid indices so that two
//! adjacent patches of neighbouring LODs produce bit-identical coordinates
//! along the shared boundary.

use std::ops::BitOr;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Vertex data for a clip-map patch (position + rest normal).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Edge flags marking which borders of a plane patch must snap their
/// vertices for seam matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seams(u8);

impl Seams {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1);
    pub const RIGHT: Self = Self(2);
    pub const TOP: Self = Self(4);
    pub const BOTTOM: Self = Self(8);
    pub const ALL: Self = Self(1 | 2 | 4 | 8);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Seams {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Immutable patch geometry, shared read-only across every level that draws
/// the same shape.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Grid plane of `width` x `height` cells with `cell_scale`-sized cells.
    ///
    /// `triangles_shift` flips the checkerboard split phase so adjacent
    /// strips avoid continuous diagonal banding.
    pub fn plane(
        width: usize,
        height: usize,
        cell_scale: f32,
        seams: Seams,
        triangles_shift: usize,
    ) -> Self {
        let mut vertices = Vec::with_capacity((width + 1) * (height + 1));
        let mut indices = Vec::with_capacity(width * height * 6);

        for i in 0..=height {
            for j in 0..=width {
                let mut x = j;
                let mut z = i;

                // Seam snapping: boundary vertices collapse onto even grid
                // indices so a half-resolution neighbour lands on the exact
                // same coordinates along the shared edge.
                if (i == 0 && seams.contains(Seams::BOTTOM))
                    || (i == height && seams.contains(Seams::TOP))
                {
                    x = x / 2 * 2;
                }
                if (j == 0 && seams.contains(Seams::LEFT))
                    || (j == width && seams.contains(Seams::RIGHT))
                {
                    z = z / 2 * 2;
                }

                vertices.push(MeshVertex {
                    position: [x as f32 * cell_scale, 0.0, z as f32 * cell_scale],
                    normal: [0.0, 1.0, 0.0],
                });
            }
        }

        for i in 0..height {
            for j in 0..width {
                let k = (j + i * (width + 1)) as u32;
                let row = (width + 1) as u32;

                // Checkerboard split, phase-shifted by triangles_shift
                if (i + j + triangles_shift) % 2 == 0 {
                    indices.extend_from_slice(&[k, k + row, k + row + 1]);
                    indices.extend_from_slice(&[k, k + row + 1, k + 1]);
                } else {
                    indices.extend_from_slice(&[k, k + row, k + 1]);
                    indices.extend_from_slice(&[k + 1, k + row, k + row + 1]);
                }
            }
        }

        Self { vertices, indices }
    }

    /// Append another patch transformed by `transform` (mesh combine).
    pub fn append(&mut self, other: &MeshData, transform: Mat4) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices.iter().map(|vertex| {
            let position = transform.transform_point3(Vec3::from_array(vertex.position));
            let normal = transform.transform_vector3(Vec3::from_array(vertex.normal));
            MeshVertex {
                position: position.to_array(),
                normal: normal.to_array(),
            }
        }));
        self.indices.extend(other.indices.iter().map(|i| base + i));
    }

    /// Innermost full-detail patch: a `2k` x `2k` plane with every edge seam
    /// snapped so the surrounding ring can meet it at half resolution.
    pub fn center(k: usize) -> Self {
        Self::plane(2 * k, 2 * k, 1.0, Seams::ALL, 0)
    }

    /// Ring annulus: four rectangular bands around a `(k+1)` x `(k+1)` hole,
    /// seam-flagged on the outward edges.
    pub fn ring(k: usize) -> Self {
        let band = (k - 1) / 2;
        let mut mesh = MeshData::default();

        let horizontal = Self::plane(2 * k, band, 1.0, Seams::BOTTOM | Seams::RIGHT | Seams::LEFT, 0);
        mesh.append(&horizontal, Mat4::IDENTITY);

        let top = Self::plane(2 * k, band, 1.0, Seams::TOP | Seams::RIGHT | Seams::LEFT, 0);
        mesh.append(&top, Mat4::from_translation(Vec3::new(0.0, 0.0, (k + 1 + band) as f32)));

        let left = Self::plane(band, k + 1, 1.0, Seams::LEFT, 0);
        mesh.append(&left, Mat4::from_translation(Vec3::new(0.0, 0.0, band as f32)));

        let right = Self::plane(band, k + 1, 1.0, Seams::RIGHT, 0);
        mesh.append(
            &right,
            Mat4::from_translation(Vec3::new((k + 1 + band) as f32, 0.0, band as f32)),
        );

        mesh
    }

    /// L-shaped trim strip closing the gap between two consecutive ring
    /// scales; one of four 90-degree rotations is chosen per frame.
    pub fn trim(k: usize) -> Self {
        let mut mesh = MeshData::default();

        let horizontal = Self::plane(k + 1, 1, 1.0, Seams::NONE, 1);
        mesh.append(
            &horizontal,
            Mat4::from_translation(Vec3::new(-(k as f32) - 1.0, 0.0, -1.0)),
        );

        let vertical = Self::plane(1, k, 1.0, Seams::NONE, 1);
        mesh.append(
            &vertical,
            Mat4::from_translation(Vec3::new(-1.0, 0.0, -(k as f32) - 1.0)),
        );

        mesh
    }

    /// Horizon skirt: 4 corner quads and 4 edge strips combined into a large
    /// flat border beyond the outermost ring.
    pub fn skirt(k: usize, outer_border_scale: f32) -> Self {
        let mut mesh = MeshData::default();

        let quad = Self::plane(1, 1, 1.0, Seams::NONE, 0);
        let h_strip = Self::plane(k, 1, 1.0, Seams::NONE, 0);
        let v_strip = Self::plane(1, k, 1.0, Seams::NONE, 0);

        let corner_scale = Vec3::new(outer_border_scale, 1.0, outer_border_scale);
        let mid_scale_vert = Vec3::new(1.0 / k as f32, 1.0, outer_border_scale);
        let mid_scale_hor = Vec3::new(outer_border_scale, 1.0, 1.0 / k as f32);

        let trs = |translation: Vec3, scale: Vec3| {
            Mat4::from_translation(translation) * Mat4::from_scale(scale)
        };

        mesh.append(&quad, trs(Vec3::ZERO, corner_scale));
        mesh.append(&h_strip, trs(Vec3::X * outer_border_scale, mid_scale_vert));
        mesh.append(&quad, trs(Vec3::X * (outer_border_scale + 1.0), corner_scale));
        mesh.append(&v_strip, trs(Vec3::Z * outer_border_scale, mid_scale_hor));
        mesh.append(
            &v_strip,
            trs(
                Vec3::X * (outer_border_scale + 1.0) + Vec3::Z * outer_border_scale,
                mid_scale_hor,
            ),
        );
        mesh.append(&quad, trs(Vec3::Z * (outer_border_scale + 1.0), corner_scale));
        mesh.append(
            &h_strip,
            trs(
                Vec3::X * outer_border_scale + Vec3::Z * (outer_border_scale + 1.0),
                mid_scale_vert,
            ),
        );
        mesh.append(
            &quad,
            trs(
                Vec3::X * (outer_border_scale + 1.0) + Vec3::Z * (outer_border_scale + 1.0),
                corner_scale,
            ),
        );

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_counts() {
        let plane = MeshData::plane(4, 3, 1.0, Seams::NONE, 0);
        assert_eq!(plane.vertices.len(), 5 * 4);
        assert_eq!(plane.indices.len(), 4 * 3 * 6);
    }

    #[test]
    fn test_seam_edges_snap_to_even_indices() {
        let plane = MeshData::plane(8, 8, 1.0, Seams::BOTTOM | Seams::RIGHT, 0);

        // Bottom row (i == 0): x coordinates must all be even
        for j in 0..=8usize {
            let x = plane.vertices[j].position[0];
            assert_eq!(x as i32 % 2, 0, "bottom-edge x {} not even", x);
        }
        // Right column (j == width): z coordinates must all be even
        for i in 0..=8usize {
            let z = plane.vertices[8 + i * 9].position[2];
            assert_eq!(z as i32 % 2, 0, "right-edge z {} not even", z);
        }
    }

    #[test]
    fn test_adjacent_seam_edges_coincide() {
        // Two patches side by side: A's seam-snapped right edge must produce
        // exactly the same vertex positions as B's seam-snapped left edge
        // once B is translated to A's right border.
        let width = 6;
        let a = MeshData::plane(width, 8, 1.0, Seams::RIGHT, 0);
        let mut b = MeshData::default();
        b.append(
            &MeshData::plane(width, 8, 1.0, Seams::LEFT, 0),
            Mat4::from_translation(Vec3::new(width as f32, 0.0, 0.0)),
        );

        let edge = |mesh: &MeshData, column: usize| -> Vec<[f32; 3]> {
            (0..=8)
                .map(|i| mesh.vertices[column + i * (width + 1)].position)
                .collect()
        };

        let a_edge = edge(&a, width);
        let b_edge = edge(&b, 0);
        assert_eq!(a_edge, b_edge);
    }

    #[test]
    fn test_ring_leaves_center_hole() {
        // k=5: ring spans [0, 2k] on both axes with a (k+1)^2 hole in the
        // middle; no vertex may fall strictly inside the hole interior.
        let k = 5usize;
        let ring = MeshData::ring(k);
        let band = ((k - 1) / 2) as f32;

        for vertex in &ring.vertices {
            let [x, _, z] = vertex.position;
            let inside_hole =
                x > band && x < band + (k + 1) as f32 && z > band && z < band + (k + 1) as f32;
            assert!(!inside_hole, "vertex ({}, {}) inside ring hole", x, z);
        }
    }

    #[test]
    fn test_combine_offsets_indices() {
        let mut mesh = MeshData::plane(2, 2, 1.0, Seams::NONE, 0);
        let before = mesh.vertices.len() as u32;
        mesh.append(
            &MeshData::plane(2, 2, 1.0, Seams::NONE, 0),
            Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        );

        // Second patch's indices all reference the appended vertex range
        assert!(mesh.indices[24..].iter().all(|&i| i >= before));
        assert_eq!(mesh.vertices.len(), 2 * before as usize);
    }

    #[test]
    fn test_skirt_piece_count() {
        // 4 corners (4 verts each) + 2 horizontal strips + 2 vertical strips
        let k = 4usize;
        let skirt = MeshData::skirt(k, 10.0);
        let strip_vertices = (k + 1) * 2;
        assert_eq!(skirt.vertices.len(), 4 * 4 + 4 * strip_vertices);
    }
}
