use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    adjacency::TriangleAdjacency,
    error::{MeshError, MeshletBuildError},
    kdtree::KdTree,
    mesh::Vertex,
    remap::validate_triangles,
    scratch::{try_shrink, try_zeroed},
};

/// Local vertex indices are stored as `u8`, and `0xff` marks a vertex that is
/// not part of the current meshlet.
pub const MESHLET_MAX_VERTICES: usize = 255;
pub const MESHLET_MAX_TRIANGLES: usize = 512;

const UNUSED_LOCAL: u8 = 0xff;

/// GPU-facing meshlet descriptor. `triangle_offset` is a byte offset into the
/// primitive array and is always a multiple of 4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Meshlet {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub triangle_offset: u32,
    pub triangle_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshletConfig {
    pub max_vertices: usize,
    /// Must be divisible by 4 so that padded primitive blocks stay within the
    /// worst-case buffers.
    pub max_triangles: usize,
    /// 0 packs as tightly as possible, 1 favours compact clusters with
    /// coherent normals for cone culling.
    pub cone_weight: f32,
}

impl Default for MeshletConfig {
    fn default() -> Self {
        Self {
            max_vertices: 64,
            max_triangles: 124,
            cone_weight: 0.5,
        }
    }
}

impl MeshletConfig {
    pub fn validate(&self) -> Result<(), MeshletBuildError> {
        if !(3..=MESHLET_MAX_VERTICES).contains(&self.max_vertices) {
            return Err(MeshletBuildError::MaxVertices(self.max_vertices));
        }
        if !(1..=MESHLET_MAX_TRIANGLES).contains(&self.max_triangles)
            || self.max_triangles % 4 != 0
        {
            return Err(MeshletBuildError::MaxTriangles(self.max_triangles));
        }
        if !(0.0..=1.0).contains(&self.cone_weight) {
            return Err(MeshletBuildError::ConeWeight(self.cone_weight));
        }
        Ok(())
    }
}

/// Upper bound on the number of meshlets any build of `index_count` indices
/// can produce. Every sealed meshlet holds at least `max_vertices - 2`
/// vertices or exactly `max_triangles` triangles.
pub fn build_meshlets_bound(index_count: usize, max_vertices: usize, max_triangles: usize) -> usize {
    if max_vertices < 3 || max_triangles == 0 {
        return 0;
    }
    let limit_vertices = index_count.div_ceil(max_vertices - 2);
    let limit_triangles = (index_count / 3).div_ceil(max_triangles);
    limit_vertices.max(limit_triangles)
}

/// Exactly sized output of [`build_meshlets`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshletSet {
    meshlets: Vec<Meshlet>,
    vertices: Vec<u32>,
    triangles: Vec<u8>,
}

/// One meshlet's slice of the shared arrays, without padding.
#[derive(Copy, Clone, Debug)]
pub struct MeshletView<'a> {
    pub vertices: &'a [u32],
    pub triangles: &'a [u8],
}

impl MeshletSet {
    pub fn len(&self) -> usize {
        self.meshlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshlets.is_empty()
    }

    pub fn meshlets(&self) -> &[Meshlet] {
        &self.meshlets
    }

    pub fn vertices(&self) -> &[u32] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[u8] {
        &self.triangles
    }

    pub fn get(&self, idx: usize) -> Option<MeshletView<'_>> {
        self.meshlets.get(idx).map(|meshlet| self.view(meshlet))
    }

    pub fn iter(&self) -> impl Iterator<Item = MeshletView<'_>> {
        self.meshlets.iter().map(|meshlet| self.view(meshlet))
    }

    pub fn into_parts(self) -> (Vec<Meshlet>, Vec<u32>, Vec<u8>) {
        (self.meshlets, self.vertices, self.triangles)
    }

    fn view(&self, meshlet: &Meshlet) -> MeshletView<'_> {
        let vertex_offset = meshlet.vertex_offset as usize;
        let triangle_offset = meshlet.triangle_offset as usize;
        MeshletView {
            vertices: &self.vertices[vertex_offset..vertex_offset + meshlet.vertex_count as usize],
            triangles: &self.triangles
                [triangle_offset..triangle_offset + meshlet.triangle_count as usize * 3],
        }
    }
}

/// Centroid and unit normal of a triangle, or running sums of both while a
/// meshlet is being grown.
#[derive(Clone, Copy, Default)]
struct Cone {
    position: Vec3,
    direction: Vec3,
}

impl Cone {
    fn average(&self, triangle_count: u32) -> Cone {
        let position = if triangle_count == 0 {
            Vec3::ZERO
        } else {
            self.position / triangle_count as f32
        };
        Cone {
            position,
            direction: self.direction.normalize_or_zero(),
        }
    }
}

/// Returns per-triangle cones and the summed doubled area of the mesh.
fn compute_triangle_cones(vertices: &[Vertex], indices: &[u32]) -> (Vec<Cone>, f32) {
    let mut mesh_area = 0.0;
    let cones = indices
        .chunks_exact(3)
        .map(|triangle| {
            let p0 = vertices[triangle[0] as usize].position;
            let p1 = vertices[triangle[1] as usize].position;
            let p2 = vertices[triangle[2] as usize].position;

            let normal = (p1 - p0).cross(p2 - p0);
            let area = normal.length();
            mesh_area += area;

            Cone {
                position: (p0 + p1 + p2) / 3.0,
                direction: if area > 0.0 { normal / area } else { Vec3::ZERO },
            }
        })
        .collect();
    (cones, mesh_area)
}

fn meshlet_score(distance2: f32, spread: f32, cone_weight: f32, expected_radius: f32) -> f32 {
    let cone = (1.0 - spread * cone_weight).max(1e-3);
    let distance = if expected_radius > 0.0 {
        distance2.sqrt() / expected_radius
    } else {
        0.0
    };
    (1.0 + distance * (1.0 - cone_weight)) * cone
}

/// Owns the worst-case scratch buffers and the meshlet being grown.
struct MeshletWriter {
    meshlets: Vec<Meshlet>,
    vertices: Vec<u32>,
    triangles: Vec<u8>,
    /// Local index of each global vertex in the current meshlet.
    used: Vec<u8>,
    current: Meshlet,
    count: usize,
    max_vertices: u32,
    max_triangles: u32,
}

impl MeshletWriter {
    fn new(bound: usize, vertex_count: usize, config: &MeshletConfig) -> Result<Self, MeshError> {
        let meshlets = try_zeroed("meshlets", bound)?;
        // saturate so absurd sizes surface as allocation failures
        let vertices = try_zeroed(
            "meshlet vertices",
            bound.saturating_mul(config.max_vertices),
        )?;
        let triangles = try_zeroed(
            "meshlet primitives",
            bound.saturating_mul(config.max_triangles * 3),
        )?;
        let mut used = try_zeroed("meshlet vertex lookup", vertex_count)?;
        used.fill(UNUSED_LOCAL);

        Ok(Self {
            meshlets,
            vertices,
            triangles,
            used,
            current: Meshlet::default(),
            count: 0,
            max_vertices: config.max_vertices as u32,
            max_triangles: config.max_triangles as u32,
        })
    }

    fn current_vertices(&self) -> &[u32] {
        let start = self.current.vertex_offset as usize;
        &self.vertices[start..start + self.current.vertex_count as usize]
    }

    fn new_vertices(&self, corners: [u32; 3]) -> u32 {
        corners
            .iter()
            .filter(|&&v| self.used[v as usize] == UNUSED_LOCAL)
            .count() as u32
    }

    fn fits(&self, corners: [u32; 3]) -> bool {
        self.current.vertex_count + self.new_vertices(corners) <= self.max_vertices
            && self.current.triangle_count < self.max_triangles
    }

    /// Adds a triangle, sealing the current meshlet first when the triangle
    /// does not fit. Returns whether a meshlet was sealed.
    fn append(&mut self, corners: [u32; 3]) -> Result<bool, MeshletBuildError> {
        let sealed = !self.fits(corners);
        if sealed {
            self.seal()?;
        }

        for &vertex in &corners {
            let local = &mut self.used[vertex as usize];
            if *local == UNUSED_LOCAL {
                *local = self.current.vertex_count as u8;
                self.vertices[(self.current.vertex_offset + self.current.vertex_count) as usize] =
                    vertex;
                self.current.vertex_count += 1;
            }
        }

        let offset = (self.current.triangle_offset + self.current.triangle_count * 3) as usize;
        for (k, &vertex) in corners.iter().enumerate() {
            self.triangles[offset + k] = self.used[vertex as usize];
        }
        self.current.triangle_count += 1;

        Ok(sealed)
    }

    fn seal(&mut self) -> Result<(), MeshletBuildError> {
        // the triangle that triggered sealing still needs a slot after this one
        if self.count + 1 >= self.meshlets.len() {
            return Err(MeshletBuildError::BoundExceeded(self.meshlets.len()));
        }
        self.meshlets[self.count] = self.current;
        self.count += 1;

        let start = self.current.vertex_offset as usize;
        let end = start + self.current.vertex_count as usize;
        for &vertex in &self.vertices[start..end] {
            self.used[vertex as usize] = UNUSED_LOCAL;
        }

        // scratch is zeroed, so the padding after the last triangle already is 0
        self.current = Meshlet {
            vertex_offset: self.current.vertex_offset + self.current.vertex_count,
            vertex_count: 0,
            triangle_offset: self.current.triangle_offset
                + padded_triangle_bytes(self.current.triangle_count),
            triangle_count: 0,
        };
        Ok(())
    }

    fn finish(mut self) -> Result<MeshletSet, MeshError> {
        if self.current.triangle_count > 0 {
            if self.count >= self.meshlets.len() {
                return Err(MeshletBuildError::BoundExceeded(self.meshlets.len()).into());
            }
            self.meshlets[self.count] = self.current;
            self.count += 1;
        }

        let (vertex_len, triangle_len) = match self.meshlets[..self.count].last() {
            Some(last) => (
                (last.vertex_offset + last.vertex_count) as usize,
                (last.triangle_offset + padded_triangle_bytes(last.triangle_count)) as usize,
            ),
            None => (0, 0),
        };

        Ok(MeshletSet {
            meshlets: try_shrink("meshlets", self.meshlets, self.count)?,
            vertices: try_shrink("meshlet vertices", self.vertices, vertex_len)?,
            triangles: try_shrink("meshlet primitives", self.triangles, triangle_len)?,
        })
    }
}

fn padded_triangle_bytes(triangle_count: u32) -> u32 {
    (triangle_count * 3 + 3) & !3
}

/// Picks the next triangle among those adjacent to the current meshlet.
///
/// Triangles adding fewer vertices always win; among equals the geometric
/// score (with `cone`) or the topological score (without) decides.
fn neighbor_triangle(
    writer: &MeshletWriter,
    indices: &[u32],
    adjacency: &TriangleAdjacency,
    live_triangles: &[u32],
    cones: &[Cone],
    cone: Option<(&Cone, f32, f32)>,
) -> Option<usize> {
    let mut best_triangle = None;
    let mut best_extra = 5;
    let mut best_score = f32::MAX;

    for &vertex in writer.current_vertices() {
        for &triangle in adjacency.faces(vertex as usize) {
            let triangle = triangle as usize;
            let [a, b, c] = [
                indices[triangle * 3] as usize,
                indices[triangle * 3 + 1] as usize,
                indices[triangle * 3 + 2] as usize,
            ];

            let mut extra = [a, b, c]
                .iter()
                .filter(|&&v| writer.used[v] == UNUSED_LOCAL)
                .count();

            // triangles that add no vertices get top priority; dangling triangles
            // are next since they are expensive to pick up in a later meshlet
            if extra != 0 {
                if live_triangles[a] == 1 || live_triangles[b] == 1 || live_triangles[c] == 1 {
                    extra = 0;
                }
                extra += 1;
            }

            if extra > best_extra {
                continue;
            }

            let score = match cone {
                Some((meshlet_cone, cone_weight, expected_radius)) => {
                    let triangle_cone = &cones[triangle];
                    let distance2 = triangle_cone
                        .position
                        .distance_squared(meshlet_cone.position);
                    let spread = triangle_cone.direction.dot(meshlet_cone.direction);
                    meshlet_score(distance2, spread, cone_weight, expected_radius)
                }
                // live counts include the triangle itself
                None => (live_triangles[a] + live_triangles[b] + live_triangles[c] - 3) as f32,
            };

            if extra < best_extra || score < best_score {
                best_triangle = Some(triangle);
                best_extra = extra;
                best_score = score;
            }
        }
    }

    best_triangle
}

/// Greedily partitions `indices` into meshlets of at most
/// `config.max_vertices` vertices and `config.max_triangles` triangles.
///
/// Triangles keep their vertex order inside each meshlet. Output buffers are
/// sized exactly to the last meshlet.
pub fn build_meshlets(
    vertices: &[Vertex],
    indices: &[u32],
    config: &MeshletConfig,
) -> Result<MeshletSet, MeshError> {
    config.validate()?;
    validate_triangles(indices, vertices.len())?;

    let face_count = indices.len() / 3;
    if face_count == 0 {
        return Ok(MeshletSet::default());
    }

    let bound = build_meshlets_bound(indices.len(), config.max_vertices, config.max_triangles);
    let mut writer = MeshletWriter::new(bound, vertices.len(), config)?;

    let mut adjacency = TriangleAdjacency::new(indices, vertices.len());
    let mut live_triangles = adjacency.counts.clone();
    let mut emitted = vec![false; face_count];

    let (cones, mesh_area) = compute_triangle_cones(vertices, indices);
    let centroids: Vec<Vec3> = cones.iter().map(|cone| cone.position).collect();
    let kdtree = KdTree::build(&centroids);

    // assuming each meshlet is a square patch, the expected radius is
    // sqrt(expected area) / 2
    let triangle_area_avg = mesh_area / face_count as f32 * 0.5;
    let expected_radius = (triangle_area_avg * config.max_triangles as f32).sqrt() * 0.5;

    let mut cone_acc = Cone::default();
    let mut unemitted_cursor = 0;

    loop {
        let meshlet_cone = cone_acc.average(writer.current.triangle_count);

        let mut best = neighbor_triangle(
            &writer,
            indices,
            &adjacency,
            &live_triangles,
            &cones,
            Some((&meshlet_cone, config.cone_weight, expected_radius)),
        );

        // if the best triangle doesn't fit, the spatial score is not meaningful
        // for the next meshlet; re-select topologically
        if let Some(triangle) = best {
            if !writer.fits(corners(indices, triangle)) {
                best = neighbor_triangle(
                    &writer,
                    indices,
                    &adjacency,
                    &live_triangles,
                    &cones,
                    None,
                );
            }
        }

        // out of connected triangles: continue with the closest one anywhere
        let best = match best.or_else(|| {
            kdtree
                .nearest(&centroids, meshlet_cone.position, |t| emitted[t as usize])
                .map(|t| t as usize)
        }) {
            Some(triangle) => triangle,
            // a NaN query prunes the whole tree; take the next unemitted triangle
            None => match emitted[unemitted_cursor..].iter().position(|&e| !e) {
                Some(offset) => {
                    unemitted_cursor += offset;
                    unemitted_cursor
                }
                None => break,
            },
        };

        let triangle = corners(indices, best);
        if writer.append(triangle)? {
            cone_acc = Cone::default();
        }

        for &vertex in &triangle {
            live_triangles[vertex as usize] -= 1;
            adjacency.remove(vertex as usize, best as u32);
        }

        cone_acc.position += cones[best].position;
        cone_acc.direction += cones[best].direction;
        emitted[best] = true;
    }

    writer.finish()
}

fn corners(indices: &[u32], triangle: usize) -> [u32; 3] {
    [
        indices[triangle * 3],
        indices[triangle * 3 + 1],
        indices[triangle * 3 + 2],
    ]
}
