use glam::Vec3;

use crate::{meshlet::MeshletView, mesh::Vertex};

/// Culling data for one meshlet: a bounding sphere plus a normal cone.
///
/// A meshlet is back-facing from `camera` when
/// `(cone_apex - camera).normalize().dot(cone_axis) >= cone_cutoff`.
/// `cone_cutoff == 1.0` marks a cone too wide to ever cull.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshletBounds {
    pub center: Vec3,
    pub radius: f32,
    pub cone_apex: Vec3,
    pub cone_axis: Vec3,
    pub cone_cutoff: f32,
}

impl MeshletBounds {
    pub fn is_backfacing(&self, camera: Vec3) -> bool {
        self.cone_cutoff < 1.0
            && (self.cone_apex - camera).normalize_or_zero().dot(self.cone_axis) >= self.cone_cutoff
    }
}

/// Approximate bounding sphere: start from the widest pair of axis extrema and
/// grow until every point is inside.
fn bounding_sphere(points: &[Vec3]) -> (Vec3, f32) {
    let Some(&first) = points.first() else {
        return (Vec3::ZERO, 0.0);
    };

    let mut min = [first; 3];
    let mut max = [first; 3];
    for &p in points {
        for axis in 0..3 {
            if p[axis] < min[axis][axis] {
                min[axis] = p;
            }
            if p[axis] > max[axis][axis] {
                max[axis] = p;
            }
        }
    }

    let axis = (0..3)
        .max_by(|&a, &b| {
            min[a]
                .distance_squared(max[a])
                .total_cmp(&min[b].distance_squared(max[b]))
        })
        .unwrap_or(0);

    let mut center = (min[axis] + max[axis]) * 0.5;
    let mut radius = min[axis].distance(max[axis]) * 0.5;

    for &p in points {
        let distance = p.distance(center);
        if distance > radius {
            let k = 0.5 + (radius / distance) * 0.5;
            center = center * k + p * (1.0 - k);
            radius = (radius + distance) * 0.5;
        }
    }

    (center, radius)
}

pub fn compute_meshlet_bounds(meshlet: MeshletView<'_>, vertices: &[Vertex]) -> MeshletBounds {
    let mut corners = Vec::with_capacity(meshlet.triangles.len());
    let mut normals = Vec::with_capacity(meshlet.triangles.len() / 3);

    for triangle in meshlet.triangles.chunks_exact(3) {
        let [p0, p1, p2] = [triangle[0], triangle[1], triangle[2]]
            .map(|local| vertices[meshlet.vertices[local as usize] as usize].position);

        let normal = (p1 - p0).cross(p2 - p0);
        let area = normal.length();
        // degenerate triangles contribute neither to the sphere nor the cone
        if area == 0.0 {
            continue;
        }

        corners.extend_from_slice(&[p0, p1, p2]);
        normals.push(normal / area);
    }

    if normals.is_empty() {
        return MeshletBounds {
            cone_cutoff: 1.0,
            ..Default::default()
        };
    }

    let (center, radius) = bounding_sphere(&corners);

    let (normal_center, _) = bounding_sphere(&normals);
    let axis = normal_center.normalize_or_zero();
    let min_dot = normals
        .iter()
        .map(|n| n.dot(axis))
        .fold(f32::MAX, f32::min);

    // the cone spans more than a hemisphere, culling would be unreliable
    if min_dot <= 0.1 {
        return MeshletBounds {
            center,
            radius,
            cone_apex: Vec3::ZERO,
            cone_axis: Vec3::ZERO,
            cone_cutoff: 1.0,
        };
    }

    // move the apex back along the axis until it is behind every triangle plane
    let max_t = corners
        .chunks_exact(3)
        .zip(&normals)
        .map(|(corner, normal)| (center - corner[0]).dot(*normal) / axis.dot(*normal))
        .fold(0.0, f32::max);

    MeshletBounds {
        center,
        radius,
        cone_apex: center - axis * max_t,
        cone_axis: axis,
        cone_cutoff: (1.0 - min_dot * min_dot).max(0.0).sqrt(),
    }
}
