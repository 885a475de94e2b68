use super::*;
use std::sync::Arc;

use glam::Vec3;

use crate::graphics_device::{IndexType, PrimitiveTopology};
use crate::scene::scene_graph::RootSet;

fn mesh_with_submeshes(name: &str, materials: &[&Arc<Material>]) -> Arc<Mesh> {
    let submeshes = materials
        .iter()
        .enumerate()
        .map(|(i, material)| crate::resource::mesh::Submesh {
            index_count: 3,
            index_offset: i as u32 * 3,
            material: (*material).clone(),
        })
        .collect();
    Arc::new(Mesh::new_dynamic(
        name,
        3,
        (0u16..6).flat_map(|i| i.to_le_bytes()).collect(),
        IndexType::U16,
        submeshes,
        PrimitiveTopology::TriangleList,
    ))
}

#[test]
fn test_entries_follow_traversal_order() {
    let mut graph = SceneGraph::new();
    let material = Arc::new(Material::new("mat", "pbr"));

    let root = graph.create_node("root");
    let child = graph.create_node("child");
    graph.add_root(RootSet::Scene, root);
    graph.add_child(root, child);

    graph
        .node_mut(root)
        .unwrap()
        .add_mesh(mesh_with_submeshes("root_mesh", &[&material]));
    graph
        .node_mut(child)
        .unwrap()
        .add_mesh(mesh_with_submeshes("child_mesh", &[&material]));
    graph.update_world();

    let mut builder = DrawListBuilder::new();
    let entries = builder.build(&graph);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].mesh.name(), "root_mesh");
    assert_eq!(entries[1].mesh.name(), "child_mesh");
}

#[test]
fn test_one_entry_per_submesh() {
    let mut graph = SceneGraph::new();
    let a = Arc::new(Material::new("a", "pbr"));
    let b = Arc::new(Material::new("b", "pbr"));

    let node = graph.create_node("node");
    graph.add_root(RootSet::Scene, node);
    graph
        .node_mut(node)
        .unwrap()
        .add_mesh(mesh_with_submeshes("mesh", &[&a, &b]));
    graph.update_world();

    let mut builder = DrawListBuilder::new();
    let entries = builder.build(&graph);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].submesh_index, 0);
    assert_eq!(entries[1].submesh_index, 1);
    assert_eq!(entries[0].material.name(), "a");
    assert_eq!(entries[1].material.name(), "b");
}

#[test]
fn test_rebuild_discards_previous_entries() {
    let mut graph = SceneGraph::new();
    let material = Arc::new(Material::new("mat", "pbr"));
    let node = graph.create_node("node");
    graph.add_root(RootSet::Scene, node);
    graph
        .node_mut(node)
        .unwrap()
        .add_mesh(mesh_with_submeshes("mesh", &[&material]));
    graph.update_world();

    let mut builder = DrawListBuilder::new();
    assert_eq!(builder.build(&graph).len(), 1);
    // Rebuilt from scratch, not appended.
    assert_eq!(builder.build(&graph).len(), 1);

    graph.remove_subtree(node);
    assert!(builder.build(&graph).is_empty());
}

#[test]
fn test_entries_capture_world_at_build_time() {
    let mut graph = SceneGraph::new();
    let material = Arc::new(Material::new("mat", "pbr"));
    let node = graph.create_node("node");
    graph.add_root(RootSet::Scene, node);
    graph
        .node_mut(node)
        .unwrap()
        .add_mesh(mesh_with_submeshes("mesh", &[&material]));

    graph.node_mut(node).unwrap().translation = Vec3::new(3.0, 0.0, 0.0);
    graph.update_world();

    let mut builder = DrawListBuilder::new();
    let entries = builder.build(&graph);
    assert!(entries[0]
        .world
        .transform_point3(Vec3::ZERO)
        .abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1e-6));
    assert_eq!(entries[0].node_id, graph.node(node).unwrap().id());
}

#[test]
fn test_nodes_without_meshes_produce_no_entries() {
    let mut graph = SceneGraph::new();
    let node = graph.create_node("empty");
    graph.add_root(RootSet::Scene, node);
    graph.update_world();

    let mut builder = DrawListBuilder::new();
    assert!(builder.build(&graph).is_empty());
    assert!(builder.is_empty());
}
