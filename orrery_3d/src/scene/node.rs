/// SceneNode - one node of the scene forest.
///
/// Nodes live in a SlotMap arena owned by the SceneGraph. The parent ->
/// child edge is the owning one (children lists); the child -> parent edge
/// is a plain back-key, so dropping a subtree cannot cycle.

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};
use slotmap::new_key_type;

use crate::resource::mesh::Mesh;
use crate::resource::next_entity_id;

new_key_type! {
    /// Stable arena key for a scene node
    pub struct NodeKey;
}

bitflags! {
    /// Per-node behavior flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// Draw an axis gizmo at this node
        const GIZMO = 1 << 0;
    }
}

/// A node: identity, local TRS transform, cached world transform, attached
/// meshes and tree links.
pub struct SceneNode {
    id: u64,
    name: String,
    /// Local translation
    pub translation: Vec3,
    /// Local rotation
    pub rotation: Quat,
    /// Local scale. The interchange loader leaves this at 1; programmatic
    /// scenes may set it.
    pub scale: Vec3,
    world: Mat4,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    meshes: Vec<Arc<Mesh>>,
    flags: NodeFlags,
}

impl SceneNode {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            id: next_entity_id(),
            name: name.into(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
            meshes: Vec::new(),
            flags: NodeFlags::empty(),
        }
    }

    /// Identity id (process-monotonic), the key for per-node descriptor
    /// slots
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local transform matrix composed from TRS
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Cached world transform.
    ///
    /// Valid only after `update_world` has run on the path from the
    /// traversal root to this node in the current frame.
    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub(crate) fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeKey>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeKey> {
        &mut self.children
    }

    pub fn meshes(&self) -> &[Arc<Mesh>] {
        &self.meshes
    }

    pub fn add_mesh(&mut self, mesh: Arc<Mesh>) {
        self.meshes.push(mesh);
    }

    /// Whether any attached mesh carries a skin
    pub fn has_skinned_mesh(&self) -> bool {
        self.meshes.iter().any(|mesh| mesh.skin().is_some())
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn gizmo_enabled(&self) -> bool {
        self.flags.contains(NodeFlags::GIZMO)
    }

    pub fn set_gizmo_enabled(&mut self, enabled: bool) {
        self.flags.set(NodeFlags::GIZMO, enabled);
    }
}
