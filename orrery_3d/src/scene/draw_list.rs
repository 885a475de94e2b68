/// DrawListBuilder - the flattened per-frame draw sequence.
///
/// Rebuilt from scratch every frame in traversal order; there is no
/// incremental diffing and no depth sorting. Traversal order is submission
/// order, by design.

use std::sync::Arc;

use glam::Mat4;

use crate::resource::material::Material;
use crate::resource::mesh::Mesh;
use crate::scene::node::NodeKey;
use crate::scene::scene_graph::SceneGraph;

/// One draw: (node, mesh, submesh, material) plus the node's world
/// transform at build time.
pub struct DrawEntry {
    pub node: NodeKey,
    /// Node identity, the key for its per-node constant slot
    pub node_id: u64,
    pub world: Mat4,
    pub mesh: Arc<Mesh>,
    pub submesh_index: usize,
    pub material: Arc<Material>,
}

/// Rebuilds the flat draw list each frame, reusing its storage
pub struct DrawListBuilder {
    entries: Vec<DrawEntry>,
}

impl DrawListBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Flatten the scene into draw entries, in traversal order.
    pub fn build(&mut self, graph: &SceneGraph) -> &[DrawEntry] {
        self.entries.clear();
        graph.traverse(|key, node| {
            for mesh in node.meshes() {
                for (submesh_index, submesh) in mesh.submeshes().iter().enumerate() {
                    self.entries.push(DrawEntry {
                        node: key,
                        node_id: node.id(),
                        world: node.world(),
                        mesh: mesh.clone(),
                        submesh_index,
                        material: submesh.material.clone(),
                    });
                }
            }
        });
        &self.entries
    }

    pub fn entries(&self) -> &[DrawEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DrawListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "draw_list_tests.rs"]
mod tests;
