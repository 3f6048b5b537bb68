mod args;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use tessel_ecs::World;
use tessel_gltf::{load_gltf, spawn_scene, MeshPrimitives};
use tessel_mesh::{
    asset::Assets, bounds::compute_meshlet_bounds, mesh::MeshletMesh,
    optimize::analyze_vertex_cache,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.pipeline_config()?;

    let mut world = World::new();
    world.set_singleton(Assets::<MeshletMesh>::new());

    let gltf = load_gltf(&mut world, &args.path, &config)
        .with_context(|| format!("failed to load {:?}", args.path))?;
    let roots = spawn_scene(&mut world, &gltf);
    let instances = world.query::<&MeshPrimitives>().iter().count();
    info!(
        "Spawned {} root nodes, {} mesh instances",
        roots.len(),
        instances
    );

    for failure in &gltf.failures {
        warn!(
            "mesh {} primitive {} failed: {}",
            failure.mesh_idx, failure.primitive_idx, failure.error
        );
    }

    let assets = world
        .get_singleton::<Assets<MeshletMesh>>()
        .context("mesh assets missing from the world")?;

    let mut total_meshlets = 0;
    for (_, mesh) in assets.iter() {
        let stats = analyze_vertex_cache(
            mesh.indices(),
            mesh.vertices().len(),
            config.vertex_cache_size,
        )?;
        let bytes: usize = mesh.buffers().iter().map(|b| b.bytes.len()).sum();
        info!(
            "{}: {} vertices, {} triangles, {} meshlets, acmr {:.3}, {} bytes",
            mesh.name(),
            mesh.vertices().len(),
            mesh.indices().len() / 3,
            mesh.meshlet_count(),
            stats.acmr,
            bytes
        );

        if args.bounds {
            let cullable = mesh
                .meshlet_set()
                .iter()
                .map(|meshlet| compute_meshlet_bounds(meshlet, mesh.vertices()))
                .filter(|bounds| bounds.cone_cutoff < 1.0)
                .count();
            info!(
                "{}: {}/{} meshlets have a usable normal cone",
                mesh.name(),
                cullable,
                mesh.meshlet_count()
            );
        }

        total_meshlets += mesh.meshlet_count();
    }

    info!(
        "Processed {} meshes into {} meshlets ({} failed)",
        assets.len(),
        total_meshlets,
        gltf.failures.len()
    );

    Ok(())
}
