/// Mesh resource - vertex/index data, submeshes and optional skin.
///
/// Static meshes carry one vertex stream per semantic (position, normal,
/// texcoord) uploaded once through the staged path. Dynamically updated
/// meshes (skinned geometry, gizmos) instead use a single interleaved
/// stream regenerated on the CPU and written into a host-visible buffer
/// every frame.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::error::Result;
use crate::graphics_device::{
    IndexType, PrimitiveTopology, VertexAttribute, VertexBinding, VertexFormat, VertexLayout,
};
use crate::render_bail;
use crate::resource::material::Material;
use crate::resource::next_entity_id;
use crate::scene::NodeKey;

/// Interleaved vertex stride: position (12) + normal (12) + texcoord (8)
pub const INTERLEAVED_STRIDE: u32 = 32;

/// Vertex attribute semantics for static meshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSemantic {
    Position,
    Normal,
    TexCoord,
}

impl VertexSemantic {
    /// Vertex buffer binding index for this semantic
    pub fn binding(&self) -> u32 {
        match self {
            VertexSemantic::Position => 0,
            VertexSemantic::Normal => 1,
            VertexSemantic::TexCoord => 2,
        }
    }

    pub fn format(&self) -> VertexFormat {
        match self {
            VertexSemantic::Position | VertexSemantic::Normal => VertexFormat::R32G32B32_SFLOAT,
            VertexSemantic::TexCoord => VertexFormat::R32G32_SFLOAT,
        }
    }

    /// Tightly packed stride for this semantic
    pub fn stride(&self) -> u32 {
        self.format().size_bytes()
    }
}

/// One per-semantic vertex stream.
///
/// The bytes are shared with any in-flight upload command.
pub struct VertexStream {
    pub semantic: VertexSemantic,
    pub data: Arc<[u8]>,
}

/// A contiguous index range drawn with one material
pub struct Submesh {
    pub index_count: u32,
    pub index_offset: u32,
    pub material: Arc<Material>,
}

/// Skin data: joints, bind poses and per-vertex weights, plus the rest-pose
/// vertex attributes the CPU skinning path reads from.
pub struct Skin {
    /// Joint nodes, indexed by the values in `joint_indices`
    pub joints: Vec<NodeKey>,
    pub inverse_bind_matrices: Vec<Mat4>,
    pub joint_indices: Vec<[u16; 4]>,
    pub joint_weights: Vec<[f32; 4]>,
    pub rest_positions: Vec<Vec3>,
    pub rest_normals: Vec<Vec3>,
    pub rest_texcoords: Vec<Vec2>,
}

/// Which vertex input layout a mesh binds with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshLayoutKind {
    /// One buffer per semantic (static meshes)
    Separate,
    /// Single interleaved buffer (dynamically updated meshes)
    Interleaved,
}

impl MeshLayoutKind {
    /// Vertex input layout for pipeline creation
    pub fn vertex_layout(&self) -> VertexLayout {
        match self {
            MeshLayoutKind::Separate => VertexLayout {
                bindings: vec![
                    VertexBinding { binding: 0, stride: 12 },
                    VertexBinding { binding: 1, stride: 12 },
                    VertexBinding { binding: 2, stride: 8 },
                ],
                attributes: vec![
                    VertexAttribute {
                        location: 0,
                        binding: 0,
                        format: VertexFormat::R32G32B32_SFLOAT,
                        offset: 0,
                    },
                    VertexAttribute {
                        location: 1,
                        binding: 1,
                        format: VertexFormat::R32G32B32_SFLOAT,
                        offset: 0,
                    },
                    VertexAttribute {
                        location: 2,
                        binding: 2,
                        format: VertexFormat::R32G32_SFLOAT,
                        offset: 0,
                    },
                ],
            },
            MeshLayoutKind::Interleaved => VertexLayout {
                bindings: vec![VertexBinding {
                    binding: 0,
                    stride: INTERLEAVED_STRIDE,
                }],
                attributes: vec![
                    VertexAttribute {
                        location: 0,
                        binding: 0,
                        format: VertexFormat::R32G32B32_SFLOAT,
                        offset: 0,
                    },
                    VertexAttribute {
                        location: 1,
                        binding: 0,
                        format: VertexFormat::R32G32B32_SFLOAT,
                        offset: 12,
                    },
                    VertexAttribute {
                        location: 2,
                        binding: 0,
                        format: VertexFormat::R32G32_SFLOAT,
                        offset: 24,
                    },
                ],
            },
        }
    }
}

/// Named collection of vertex streams, an index stream and submeshes
pub struct Mesh {
    id: u64,
    name: String,
    streams: Vec<VertexStream>,
    indices: Arc<[u8]>,
    index_type: IndexType,
    submeshes: Vec<Submesh>,
    skin: Option<Skin>,
    vertex_count: u32,
    topology: PrimitiveTopology,
    dynamic: bool,
}

impl Mesh {
    /// Create a static mesh from per-semantic streams.
    ///
    /// Every stream must hold exactly `vertex_count` elements.
    pub fn new(
        name: impl Into<String>,
        streams: Vec<VertexStream>,
        vertex_count: u32,
        indices: Vec<u8>,
        index_type: IndexType,
        submeshes: Vec<Submesh>,
    ) -> Result<Self> {
        let name = name.into();
        for stream in &streams {
            let expected = vertex_count as usize * stream.semantic.stride() as usize;
            if stream.data.len() != expected {
                render_bail!(
                    "orrery3d::Mesh",
                    "mesh '{}': {:?} stream holds {} bytes, expected {}",
                    name,
                    stream.semantic,
                    stream.data.len(),
                    expected
                );
            }
        }
        if indices.len() % index_type.size_bytes() as usize != 0 {
            render_bail!(
                "orrery3d::Mesh",
                "mesh '{}': index data not a multiple of {:?}",
                name,
                index_type
            );
        }
        Ok(Self {
            id: next_entity_id(),
            name,
            streams,
            indices: indices.into(),
            index_type,
            submeshes,
            skin: None,
            vertex_count,
            topology: PrimitiveTopology::TriangleList,
            dynamic: false,
        })
    }

    /// Create a dynamically updated mesh (single interleaved stream,
    /// regenerated on the CPU every frame).
    pub fn new_dynamic(
        name: impl Into<String>,
        vertex_count: u32,
        indices: Vec<u8>,
        index_type: IndexType,
        submeshes: Vec<Submesh>,
        topology: PrimitiveTopology,
    ) -> Self {
        Self {
            id: next_entity_id(),
            name: name.into(),
            streams: Vec::new(),
            indices: indices.into(),
            index_type,
            submeshes,
            skin: None,
            vertex_count,
            topology,
            dynamic: true,
        }
    }

    /// Attach skin data; the mesh becomes dynamically updated.
    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self.dynamic = true;
        self
    }

    // ===== ACCESSORS =====

    /// Identity id, the cache key for GPU geometry
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn streams(&self) -> &[VertexStream] {
        &self.streams
    }

    pub fn indices(&self) -> &Arc<[u8]> {
        &self.indices
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn index_count(&self) -> u32 {
        (self.indices.len() / self.index_type.size_bytes() as usize) as u32
    }

    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    pub fn skin(&self) -> Option<&Skin> {
        self.skin.as_ref()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Whether the vertex data is regenerated each frame
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn layout_kind(&self) -> MeshLayoutKind {
        if self.dynamic {
            MeshLayoutKind::Interleaved
        } else {
            MeshLayoutKind::Separate
        }
    }

    /// Size in bytes of the interleaved vertex stream
    pub fn interleaved_len(&self) -> u64 {
        self.vertex_count as u64 * INTERLEAVED_STRIDE as u64
    }

    /// CPU-skin the rest pose with the given joint matrices, producing the
    /// interleaved vertex bytes for this frame.
    ///
    /// Returns None for meshes without a skin.
    pub fn skinned_vertices(&self, joint_matrices: &[Mat4]) -> Option<Vec<u8>> {
        let skin = self.skin.as_ref()?;
        let mut out = Vec::with_capacity(self.interleaved_len() as usize);
        for i in 0..self.vertex_count as usize {
            let indices = skin.joint_indices[i];
            let weights = skin.joint_weights[i];
            let mut blended = Mat4::ZERO;
            let mut total_weight = 0.0;
            for j in 0..4 {
                let weight = weights[j];
                if weight == 0.0 {
                    continue;
                }
                if let Some(matrix) = joint_matrices.get(indices[j] as usize) {
                    blended += *matrix * weight;
                    total_weight += weight;
                }
            }
            if total_weight == 0.0 {
                blended = Mat4::IDENTITY;
            }
            let position = blended.transform_point3(skin.rest_positions[i]);
            let normal = blended
                .transform_vector3(skin.rest_normals[i])
                .normalize_or_zero();
            let uv = skin.rest_texcoords[i];
            out.extend_from_slice(bytemuck::bytes_of(&[
                position.x, position.y, position.z, normal.x, normal.y, normal.z, uv.x, uv.y,
            ]));
        }
        Some(out)
    }
}

/// Pack typed vertex attributes into the interleaved layout.
///
/// Missing normals default to +Z, missing texcoords to (0, 0).
pub fn interleave_vertices(positions: &[Vec3], normals: &[Vec3], texcoords: &[Vec2]) -> Vec<u8> {
    let mut out = Vec::with_capacity(positions.len() * INTERLEAVED_STRIDE as usize);
    for (i, position) in positions.iter().enumerate() {
        let normal = normals.get(i).copied().unwrap_or(Vec3::Z);
        let uv = texcoords.get(i).copied().unwrap_or(Vec2::ZERO);
        out.extend_from_slice(bytemuck::bytes_of(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z, uv.x, uv.y,
        ]));
    }
    out
}

/// Interleaved vertex bytes for a three-axis gizmo, regenerated per frame.
///
/// One line per axis; the axis direction doubles as the vertex color in the
/// normal channel.
pub fn axis_gizmo_vertices(scale: f32) -> Vec<u8> {
    let axes = [Vec3::X, Vec3::Y, Vec3::Z];
    let mut positions = Vec::with_capacity(6);
    let mut normals = Vec::with_capacity(6);
    for axis in axes {
        positions.push(Vec3::ZERO);
        positions.push(axis * scale);
        normals.push(axis);
        normals.push(axis);
    }
    interleave_vertices(&positions, &normals, &[])
}

/// Build the dynamic mesh backing a node gizmo (three axis lines)
pub fn axis_gizmo_mesh(material: Arc<Material>) -> Mesh {
    let indices: Vec<u8> = (0u16..6).flat_map(|i| i.to_le_bytes()).collect();
    Mesh::new_dynamic(
        "axis_gizmo",
        6,
        indices,
        IndexType::U16,
        vec![Submesh {
            index_count: 6,
            index_offset: 0,
            material,
        }],
        PrimitiveTopology::LineList,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
