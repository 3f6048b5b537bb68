use glam::{Mat4, Quat, Vec3};
use gltf::{mesh::Mode, scene::Transform, Document};
use std::path::Path;
use tessel_ecs::{Entity, EntityBuilder, ParentOf, World};
use tessel_mesh::{
    asset::{Assets, Handle},
    error::{MalformedMesh, MeshError},
    mesh::{MeshletMesh, RawMesh},
    pipeline::process_meshes,
    PipelineConfig,
};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to import glTF: {0}")]
    Import(#[from] gltf::Error),

    #[error("the world has no Assets<MeshletMesh> singleton")]
    MissingAssetStore,
}

#[derive(Debug)]
pub struct Gltf {
    pub meshes: Vec<GltfMesh>,
    pub nodes: Vec<GltfNode>,
    pub top_nodes: Vec<usize>,
    /// Primitives that were dropped because processing failed.
    pub failures: Vec<PrimitiveFailure>,
}

#[derive(Debug, Default)]
pub struct GltfMesh {
    pub name: Option<String>,
    /// Processed triangle primitives, in document order.
    pub primitives: Vec<Handle<MeshletMesh>>,
}

#[derive(Debug)]
pub struct GltfNode {
    pub name: Option<String>,
    pub mesh_idx: Option<usize>,
    pub local_transform: Mat4,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug)]
pub struct PrimitiveFailure {
    pub mesh_idx: usize,
    pub primitive_idx: usize,
    pub error: MeshError,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalTransform {
    pub transform: Mat4,
}

/// Meshlet meshes drawn by an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPrimitives(pub Vec<Handle<MeshletMesh>>);

pub fn load_gltf(
    world: &mut World,
    path: &Path,
    config: &PipelineConfig,
) -> Result<Gltf, LoadError> {
    let (document, buffers, _images) = gltf::import(path)?;
    info!("Imported {:?}", path);
    load_document(world, &document, &buffers, config)
}

pub fn load_gltf_slice(
    world: &mut World,
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<Gltf, LoadError> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;
    load_document(world, &document, &buffers, config)
}

fn load_document(
    world: &mut World,
    document: &Document,
    buffers: &[gltf::buffer::Data],
    config: &PipelineConfig,
) -> Result<Gltf, LoadError> {
    let asset_meshes = world
        .get_singleton_mut::<Assets<MeshletMesh>>()
        .ok_or(LoadError::MissingAssetStore)?;

    let mut meshes = Vec::new();
    let mut raws = Vec::new();
    // (mesh, primitive) of every entry in `raws`
    let mut origins = Vec::new();
    let mut failures = Vec::new();

    for gltf_mesh in document.meshes() {
        meshes.push(GltfMesh {
            name: gltf_mesh.name().map(str::to_owned),
            primitives: Vec::new(),
        });

        for primitive in gltf_mesh.primitives() {
            let mode = primitive.mode();
            if !matches!(
                mode,
                Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan
            ) {
                warn!(
                    "Skipping primitive {} of mesh {}: unsupported mode {:?}",
                    primitive.index(),
                    gltf_mesh.index(),
                    mode
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let raw = reader
                .read_positions()
                .ok_or(MalformedMesh::MissingAttribute("POSITION"))
                .and_then(|positions| {
                    let positions = positions.collect::<Vec<_>>();
                    let indices = match reader.read_indices() {
                        Some(indices) => indices.into_u32().collect::<Vec<_>>(),
                        None => {
                            let count = u32::try_from(positions.len())
                                .map_err(|_| MalformedMesh::TooManyVertices(positions.len()))?;
                            (0..count).collect()
                        }
                    };
                    Ok((positions, triangulate(mode, &indices)))
                });

            let (positions, indices) = match raw {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(
                        "Dropped primitive {} of mesh {}: {}",
                        primitive.index(),
                        gltf_mesh.index(),
                        error
                    );
                    failures.push(PrimitiveFailure {
                        mesh_idx: gltf_mesh.index(),
                        primitive_idx: primitive.index(),
                        error: error.into(),
                    });
                    continue;
                }
            };

            let normals = reader
                .read_normals()
                .map(|n| n.collect::<Vec<_>>())
                .unwrap_or_default();
            let tex_coords = reader
                .read_tex_coords(0)
                .map(|u| u.into_f32().collect::<Vec<_>>());

            let name = format!(
                "{}#{}",
                gltf_mesh
                    .name()
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("mesh{}", gltf_mesh.index())),
                primitive.index()
            );
            debug!(
                "Read primitive {}: {} vertices, {} indices",
                name,
                positions.len(),
                indices.len()
            );

            raws.push(RawMesh {
                name,
                positions,
                normals,
                tex_coords,
                indices,
            });
            origins.push((gltf_mesh.index(), primitive.index()));
        }
    }

    let report = process_meshes(&raws, config);

    for (idx, mesh) in report.meshes {
        let (mesh_idx, _) = origins[idx];
        meshes[mesh_idx].primitives.push(asset_meshes.push(mesh));
    }

    for (idx, error) in report.failures {
        let (mesh_idx, primitive_idx) = origins[idx];
        warn!(
            "Dropped primitive {} of mesh {}: {}",
            primitive_idx, mesh_idx, error
        );
        failures.push(PrimitiveFailure {
            mesh_idx,
            primitive_idx,
            error,
        });
    }
    failures.sort_by_key(|failure| (failure.mesh_idx, failure.primitive_idx));

    let mut nodes = Vec::new();
    for gltf_node in document.nodes() {
        let mesh_idx = gltf_node.mesh().map(|m| m.index());
        let transform = match gltf_node.transform() {
            Transform::Matrix { matrix } => Mat4::from_cols_array_2d(&matrix),
            Transform::Decomposed {
                translation,
                rotation,
                scale,
            } => {
                let translation = Vec3::from_array(translation);
                let rotation = Quat::from_array(rotation);
                let scale = Vec3::from_array(scale);
                Mat4::from_scale_rotation_translation(scale, rotation, translation)
            }
        };
        nodes.push(GltfNode {
            name: gltf_node.name().map(str::to_owned),
            mesh_idx,
            local_transform: transform,
            parent: None,
            children: Vec::new(),
        });
    }

    for (i, gltf_node) in document.nodes().enumerate() {
        for child in gltf_node.children() {
            nodes[i].children.push(child.index());
            nodes[child.index()].parent = Some(i);
        }
    }

    let top_nodes = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.parent.is_none())
        .map(|(idx, _)| idx)
        .collect();

    info!(
        "Loaded {} meshes, {} nodes, {} failed primitives",
        meshes.len(),
        nodes.len(),
        failures.len()
    );

    Ok(Gltf {
        meshes,
        nodes,
        top_nodes,
        failures,
    })
}

/// Expands strips and fans into a triangle list with the winding the glTF
/// format defines for them. Strip restarts encoded as degenerate triangles
/// are dropped.
fn triangulate(mode: Mode, indices: &[u32]) -> Vec<u32> {
    match mode {
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    [w[0], w[1], w[2]]
                } else {
                    [w[0], w[2], w[1]]
                }
            })
            .filter(|[a, b, c]| a != b && b != c && a != c)
            .flatten()
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&center, rest)) => rest
                .windows(2)
                .flat_map(|w| [w[0], w[1], center])
                .collect(),
            None => Vec::new(),
        },
        _ => indices.to_vec(),
    }
}

/// Spawns one entity per node and returns the root entities.
pub fn spawn_scene(world: &mut World, gltf: &Gltf) -> Vec<Entity> {
    gltf.top_nodes
        .iter()
        .map(|&idx| spawn_node(world, gltf, idx, None, Mat4::IDENTITY))
        .collect()
}

fn spawn_node(
    world: &mut World,
    gltf: &Gltf,
    idx: usize,
    parent: Option<Entity>,
    parent_transform: Mat4,
) -> Entity {
    let node = &gltf.nodes[idx];
    let transform = parent_transform * node.local_transform;

    let mut builder = EntityBuilder::new();
    builder.add(GlobalTransform { transform });
    if let Some(mesh_idx) = node.mesh_idx {
        builder.add(MeshPrimitives(gltf.meshes[mesh_idx].primitives.clone()));
    }
    if let Some(parent) = parent {
        builder.add(ParentOf(parent));
    }
    let entity = world.spawn(builder.build());

    for &child in &node.children {
        spawn_node(world, gltf, child, Some(entity), transform);
    }
    entity
}
