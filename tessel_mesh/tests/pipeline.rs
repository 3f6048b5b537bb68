use tessel_mesh::{
    process_mesh, process_meshes, MalformedMesh, MeshError, MeshletMesh, PipelineConfig, RawMesh,
};

/// `n` by `n` grid where every quad carries its own four vertices, so shared
/// corners are duplicated.
fn split_grid(n: u32) -> RawMesh {
    let mut raw = RawMesh {
        name: format!("grid{}", n),
        ..Default::default()
    };
    for y in 0..n {
        for x in 0..n {
            let base = raw.positions.len() as u32;
            let (x, y) = (x as f32, y as f32);
            raw.positions.extend_from_slice(&[
                [x, y, 0.0],
                [x + 1.0, y, 0.0],
                [x + 1.0, y + 1.0, 0.0],
                [x, y + 1.0, 0.0],
            ]);
            raw.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }
    raw.normals = vec![[0.0, 0.0, 1.0]; raw.positions.len()];
    raw
}

fn disjoint_triangles(count: u32) -> RawMesh {
    let mut raw = RawMesh::default();
    for i in 0..count {
        let x = i as f32 * 3.0;
        raw.positions
            .extend_from_slice(&[[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]]);
        raw.indices.extend_from_slice(&[i * 3, i * 3 + 1, i * 3 + 2]);
    }
    raw
}

type PositionTriangle = [[u32; 3]; 3];

fn position_bits(p: [f32; 3]) -> [u32; 3] {
    p.map(f32::to_bits)
}

fn input_triangles(raw: &RawMesh) -> Vec<PositionTriangle> {
    let mut triangles: Vec<_> = raw
        .indices
        .chunks_exact(3)
        .map(|t| [0, 1, 2].map(|k| position_bits(raw.positions[t[k] as usize])))
        .collect();
    triangles.sort();
    triangles
}

fn meshlet_triangles(mesh: &MeshletMesh) -> Vec<PositionTriangle> {
    let mut triangles = Vec::new();
    for meshlet in mesh.meshlet_set().iter() {
        for t in meshlet.triangles.chunks_exact(3) {
            triangles.push([0, 1, 2].map(|k| {
                let vertex = meshlet.vertices[t[k] as usize];
                position_bits(mesh.vertices()[vertex as usize].position.to_array())
            }));
        }
    }
    triangles.sort();
    triangles
}

fn index_triangles(mesh: &MeshletMesh) -> Vec<PositionTriangle> {
    let mut triangles: Vec<_> = mesh
        .indices()
        .chunks_exact(3)
        .map(|t| {
            [0, 1, 2].map(|k| position_bits(mesh.vertices()[t[k] as usize].position.to_array()))
        })
        .collect();
    triangles.sort();
    triangles
}

#[test]
fn grid_meshlets_respect_budgets() {
    let raw = split_grid(20);
    let config = PipelineConfig::default();
    let mesh = process_mesh(&raw, &config).unwrap();

    // duplicated corners merged
    assert_eq!(mesh.vertices().len(), 21 * 21);
    assert!(mesh.meshlet_count() > 1);

    let mut triangle_sum = 0;
    let mut next_vertex_offset = 0;
    let mut next_triangle_offset = 0;
    for meshlet in mesh.meshlets() {
        assert!((1..=64).contains(&meshlet.vertex_count));
        assert!((1..=124).contains(&meshlet.triangle_count));
        assert_eq!(meshlet.vertex_offset, next_vertex_offset);
        assert_eq!(meshlet.triangle_offset % 4, 0);
        assert!(meshlet.triangle_offset >= next_triangle_offset);

        next_vertex_offset += meshlet.vertex_count;
        next_triangle_offset = meshlet.triangle_offset + meshlet.triangle_count * 3;
        triangle_sum += meshlet.triangle_count as usize;
    }
    assert_eq!(triangle_sum, raw.indices.len() / 3);

    // exactly sized to the last meshlet
    let last = mesh.meshlets().last().unwrap();
    assert_eq!(
        mesh.meshlet_vertices().len(),
        (last.vertex_offset + last.vertex_count) as usize
    );
    assert_eq!(
        mesh.meshlet_primitives().len(),
        ((last.triangle_offset + last.triangle_count * 3 + 3) & !3) as usize
    );

    for meshlet in mesh.meshlet_set().iter() {
        assert!(meshlet
            .triangles
            .iter()
            .all(|&local| (local as usize) < meshlet.vertices.len()));
    }
}

#[test]
fn pipeline_preserves_triangles() {
    let raw = split_grid(12);
    let mesh = process_mesh(&raw, &PipelineConfig::default()).unwrap();

    let expected = input_triangles(&raw);
    assert_eq!(index_triangles(&mesh), expected);
    assert_eq!(meshlet_triangles(&mesh), expected);
}

#[test]
fn fetch_order_follows_first_use() {
    let raw = split_grid(8);
    let mesh = process_mesh(&raw, &PipelineConfig::default()).unwrap();

    let mut next = 0;
    for &index in mesh.indices() {
        assert!(index <= next);
        if index == next {
            next += 1;
        }
    }
    assert_eq!(next as usize, mesh.vertices().len());
}

#[test]
fn processing_is_deterministic() {
    let raw = split_grid(16);
    let config = PipelineConfig::default();
    let first = process_mesh(&raw, &config).unwrap();
    let second = process_mesh(&raw, &config).unwrap();

    for (a, b) in first.buffers().iter().zip(second.buffers().iter()) {
        assert_eq!(a.binding, b.binding);
        assert_eq!(a.bytes, b.bytes);
    }
}

#[test]
fn single_triangle_yields_one_meshlet() {
    let raw = RawMesh {
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        indices: vec![0, 1, 2],
        ..Default::default()
    };
    let mesh = process_mesh(&raw, &PipelineConfig::default()).unwrap();

    assert_eq!(mesh.meshlet_count(), 1);
    let meshlet = mesh.meshlets()[0];
    assert_eq!(meshlet.vertex_count, 3);
    assert_eq!(meshlet.triangle_count, 1);
    assert_eq!(meshlet.vertex_offset, 0);
    assert_eq!(meshlet.triangle_offset, 0);
    assert_eq!(mesh.properties().meshlet_count, 1);
}

#[test]
fn disjoint_triangles_overflow_one_meshlet() {
    // 65 triangles need 195 vertices, more than one meshlet can hold
    let raw = disjoint_triangles(65);
    let mesh = process_mesh(&raw, &PipelineConfig::default()).unwrap();

    assert!(mesh.meshlet_count() >= 2);
    let triangles: u32 = mesh.meshlets().iter().map(|m| m.triangle_count).sum();
    assert_eq!(triangles, 65);
    assert!(mesh.meshlets().iter().all(|m| m.vertex_count <= 64));
}

#[test]
fn empty_mesh_yields_empty_buffers() {
    let mesh = process_mesh(&RawMesh::default(), &PipelineConfig::default()).unwrap();

    assert_eq!(mesh.meshlet_count(), 0);
    assert_eq!(mesh.properties().meshlet_count, 0);
    let buffers = mesh.buffers();
    for buffer in &buffers[..4] {
        assert!(buffer.bytes.is_empty());
    }
    assert_eq!(buffers[4].bytes.len(), 16);
}

#[test]
fn truncated_index_buffer_is_malformed() {
    let raw = RawMesh {
        positions: vec![[0.0; 3]; 3],
        indices: vec![0, 1, 2, 0],
        ..Default::default()
    };
    assert!(matches!(
        process_mesh(&raw, &PipelineConfig::default()),
        Err(MeshError::Malformed(MalformedMesh::IndexCount(4)))
    ));
}

#[test]
fn out_of_range_index_is_malformed() {
    let raw = RawMesh {
        positions: vec![[0.0; 3]; 3],
        indices: vec![0, 1, 3],
        ..Default::default()
    };
    assert!(matches!(
        process_mesh(&raw, &PipelineConfig::default()),
        Err(MeshError::Malformed(MalformedMesh::IndexOutOfRange {
            index: 3,
            position: 2,
            vertex_count: 3
        }))
    ));
}

#[test]
fn failing_sibling_does_not_abort_batch() {
    let bad = RawMesh {
        name: "bad".into(),
        positions: vec![[0.0; 3]; 3],
        indices: vec![0, 1],
        ..Default::default()
    };
    let raws = [split_grid(4), bad, disjoint_triangles(3)];
    let report = process_meshes(&raws, &PipelineConfig::default());

    let indices: Vec<usize> = report.meshes.iter().map(|(idx, _)| *idx).collect();
    assert_eq!(indices, [0, 2]);
    assert_eq!(report.meshes[0].1.name(), "grid4");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 1);
    assert!(matches!(report.failures[0].1, MeshError::Malformed(_)));
    assert!(!report.is_complete());
}

#[test]
fn smaller_budgets_make_more_meshlets() {
    let raw = split_grid(16);
    let default = process_mesh(&raw, &PipelineConfig::default()).unwrap();

    let mut config = PipelineConfig::default();
    config.meshlet.max_vertices = 16;
    config.meshlet.max_triangles = 16;
    let small = process_mesh(&raw, &config).unwrap();

    assert!(small.meshlet_count() > default.meshlet_count());
    for meshlet in small.meshlets() {
        assert!(meshlet.vertex_count <= 16);
        assert!(meshlet.triangle_count <= 16);
    }
}

fn uv_sphere(rings: u32, segments: u32) -> RawMesh {
    let mut raw = RawMesh {
        name: "sphere".into(),
        ..Default::default()
    };
    for ring in 0..=rings {
        let theta = std::f32::consts::PI * ring as f32 / rings as f32;
        for segment in 0..=segments {
            let phi = std::f32::consts::TAU * segment as f32 / segments as f32;
            raw.positions.push([
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            ]);
        }
    }
    let stride = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let i = ring * stride + segment;
            raw.indices
                .extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
        }
    }
    raw
}

#[test]
fn cone_weight_extremes_keep_budgets() {
    let raw = uv_sphere(24, 48);
    let face_count = raw.indices.len() / 3;

    let mut outputs = Vec::new();
    for cone_weight in [0.0, 1.0] {
        let mut config = PipelineConfig::default();
        config.meshlet.cone_weight = cone_weight;
        let mesh = process_mesh(&raw, &config).unwrap();

        let triangles: u32 = mesh.meshlets().iter().map(|m| m.triangle_count).sum();
        assert_eq!(triangles as usize, face_count);
        for meshlet in mesh.meshlets() {
            assert!((1..=64).contains(&meshlet.vertex_count));
            assert!((1..=124).contains(&meshlet.triangle_count));
        }
        assert_eq!(meshlet_triangles(&mesh), index_triangles(&mesh));
        outputs.push(mesh.meshlet_vertices().to_vec());
    }

    // distance alone and normal spread alone grow different clusters
    assert_ne!(outputs[0], outputs[1]);
}

#[test]
fn extreme_coordinates_keep_every_triangle() {
    let raw = RawMesh {
        positions: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1e20, 0.0, 0.0],
            [1e20, 1.0, 0.0],
            [1e20, 0.0, 1.0],
            [5.0, f32::NAN, 0.0],
            [6.0, 0.0, 0.0],
            [5.0, 1.0, 0.0],
            [f32::INFINITY, 0.0, 0.0],
            [0.0, f32::NEG_INFINITY, 0.0],
            [0.0, 0.0, 2.0],
        ],
        indices: (0..12).collect(),
        ..Default::default()
    };

    for cone_weight in [0.0, 0.5, 1.0] {
        let mut config = PipelineConfig::default();
        config.meshlet.cone_weight = cone_weight;
        config.meshlet.max_triangles = 4;
        config.meshlet.max_vertices = 6;
        let mesh = process_mesh(&raw, &config).unwrap();

        let triangles: u32 = mesh.meshlets().iter().map(|m| m.triangle_count).sum();
        assert_eq!(triangles, 4);
    }
}

#[test]
fn single_far_triangle_yields_one_meshlet() {
    let raw = RawMesh {
        positions: vec![[1e20, 0.0, 0.0], [1e20, 1.0, 0.0], [1e20, 0.0, 1.0]],
        indices: vec![0, 1, 2],
        ..Default::default()
    };
    let mesh = process_mesh(&raw, &PipelineConfig::default()).unwrap();
    assert_eq!(mesh.meshlet_count(), 1);
    assert_eq!(mesh.meshlet_primitives(), &[0, 1, 2, 0]);
}

#[test]
fn parts_hand_over_every_buffer() {
    let raw = split_grid(10);
    let mesh = process_mesh(&raw, &PipelineConfig::default()).unwrap();

    let vertices = mesh.vertices().to_vec();
    let indices = mesh.indices().to_vec();
    let meshlets = mesh.meshlets().to_vec();
    let meshlet_vertices = mesh.meshlet_vertices().to_vec();
    let meshlet_primitives = mesh.meshlet_primitives().to_vec();
    let meshlet_count = mesh.meshlet_count();

    let parts = mesh.into_parts();
    assert_eq!(parts.vertices, vertices);
    assert_eq!(parts.indices, indices);
    assert_eq!(parts.meshlets, meshlets);
    assert_eq!(parts.meshlet_vertices, meshlet_vertices);
    assert_eq!(parts.meshlet_primitives, meshlet_primitives);
    assert_eq!(parts.meshlet_count, meshlet_count);
    assert_eq!(parts.meshlets.len(), parts.meshlet_count);
}
