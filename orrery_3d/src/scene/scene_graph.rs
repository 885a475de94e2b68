/// SceneGraph - a forest of nodes with pre-order world-transform traversal.
///
/// Three independently maintained root collections (background/grid nodes,
/// device overlay nodes, loaded scene nodes) are traversed in that fixed
/// order. Traversal is depth-first pre-order, so a parent's world transform
/// is always computed before its children's; the same order defines draw
/// submission order. No sorting of any kind happens downstream.

use glam::Mat4;
use slotmap::SlotMap;

use crate::render_warn;
use crate::resource::mesh::Skin;
use crate::scene::node::{NodeKey, SceneNode};

/// The three root collections, in traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSet {
    /// Background/grid nodes
    Background,
    /// Device-tracked overlay nodes
    Overlay,
    /// Interchange-loaded scene nodes
    Scene,
}

/// Fixed traversal order of the root collections
pub const ROOT_SET_ORDER: [RootSet; 3] = [RootSet::Background, RootSet::Overlay, RootSet::Scene];

/// Node arena plus the three root collections
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    roots: [Vec<NodeKey>; 3],
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            roots: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Create a detached node; attach it with `add_root` or `add_child`.
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeKey {
        self.nodes.insert(SceneNode::new(name))
    }

    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self, set: RootSet) -> &[NodeKey] {
        &self.roots[set as usize]
    }

    /// Cached world transform of a node
    pub fn world(&self, key: NodeKey) -> Option<Mat4> {
        self.nodes.get(key).map(|node| node.world())
    }

    /// Detach a node from its current parent or root list.
    fn detach(&mut self, key: NodeKey) {
        let parent = match self.nodes.get_mut(key) {
            Some(node) => node.parent(),
            None => return,
        };
        match parent {
            Some(parent_key) => {
                if let Some(parent_node) = self.nodes.get_mut(parent_key) {
                    parent_node.children_mut().retain(|&child| child != key);
                }
                if let Some(node) = self.nodes.get_mut(key) {
                    node.set_parent(None);
                }
            }
            None => {
                for roots in &mut self.roots {
                    roots.retain(|&root| root != key);
                }
            }
        }
    }

    /// Attach a node as a root of the given collection.
    ///
    /// Detaches it from any previous parent or root list first. Returns
    /// false for an invalid key.
    pub fn add_root(&mut self, set: RootSet, key: NodeKey) -> bool {
        if !self.nodes.contains_key(key) {
            return false;
        }
        self.detach(key);
        self.roots[set as usize].push(key);
        true
    }

    /// Whether `ancestor` lies on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent());
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(key).and_then(|n| n.parent());
        }
        false
    }

    /// Attach `child` under `parent`, establishing the back-reference.
    ///
    /// Always detaches the child from its previous parent or root list
    /// first, so the graph stays a forest. Refuses attachments that would
    /// close a cycle. Returns false when nothing was attached.
    pub fn add_child(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        if parent == child || !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return false;
        }
        if self.is_ancestor(child, parent) {
            render_warn!(
                "orrery3d::SceneGraph",
                "refusing add_child: would create a cycle"
            );
            return false;
        }
        self.detach(child);
        self.nodes[child].set_parent(Some(parent));
        self.nodes[parent].children_mut().push(child);
        true
    }

    /// Drop a node and every descendant.
    ///
    /// Subtrees go as a whole; there is no per-node destruction.
    pub fn remove_subtree(&mut self, key: NodeKey) {
        if !self.nodes.contains_key(key) {
            return;
        }
        self.detach(key);
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend_from_slice(node.children());
            }
        }
    }

    /// Recompute every node's world transform, depth-first pre-order over
    /// the three root collections.
    ///
    /// World = parent world * local. Returns the keys of visited nodes
    /// carrying skinned meshes, in traversal order, for the per-frame skin
    /// recompute that follows.
    pub fn update_world(&mut self) -> Vec<NodeKey> {
        let mut skinned = Vec::new();
        for set in ROOT_SET_ORDER {
            let roots = self.roots[set as usize].clone();
            for root in roots {
                self.update_node(root, Mat4::IDENTITY, &mut skinned);
            }
        }
        skinned
    }

    fn update_node(&mut self, key: NodeKey, parent_world: Mat4, skinned: &mut Vec<NodeKey>) {
        let (world, children) = match self.nodes.get_mut(key) {
            Some(node) => {
                let world = parent_world * node.local_matrix();
                node.set_world(world);
                if node.has_skinned_mesh() {
                    skinned.push(key);
                }
                (world, node.children().to_vec())
            }
            None => return,
        };
        for child in children {
            self.update_node(child, world, skinned);
        }
    }

    /// Visit every node depth-first pre-order over the three root
    /// collections - the order that defines the draw list.
    pub fn traverse<F: FnMut(NodeKey, &SceneNode)>(&self, mut visit: F) {
        for set in ROOT_SET_ORDER {
            for &root in &self.roots[set as usize] {
                self.traverse_node(root, &mut visit);
            }
        }
    }

    fn traverse_node<F: FnMut(NodeKey, &SceneNode)>(&self, key: NodeKey, visit: &mut F) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        visit(key, node);
        for &child in node.children() {
            self.traverse_node(child, visit);
        }
    }

    /// Joint matrices for a skin bound to `mesh_node`:
    /// inverse(mesh world) * joint world * inverse bind.
    ///
    /// Joints whose node has gone away contribute identity.
    pub fn compute_joint_matrices(&self, mesh_node: NodeKey, skin: &Skin) -> Vec<Mat4> {
        let mesh_world_inverse = self
            .world(mesh_node)
            .unwrap_or(Mat4::IDENTITY)
            .inverse();
        skin.joints
            .iter()
            .zip(&skin.inverse_bind_matrices)
            .map(|(&joint, &inverse_bind)| {
                let joint_world = self.world(joint).unwrap_or(Mat4::IDENTITY);
                mesh_world_inverse * joint_world * inverse_bind
            })
            .collect()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "scene_graph_tests.rs"]
mod tests;
