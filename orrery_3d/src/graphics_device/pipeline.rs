/// Pipeline trait and pipeline descriptor

use std::any::Any;
use std::sync::Arc;
use crate::graphics_device::shader::DeviceShader;

/// Vertex attribute data formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl VertexFormat {
    /// Size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            VertexFormat::R32G32_SFLOAT => 8,
            VertexFormat::R32G32B32_SFLOAT => 12,
            VertexFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

/// One vertex buffer binding (slot + stride)
#[derive(Debug, Clone, Copy)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
}

/// One vertex attribute within a binding
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Full vertex input layout for a pipeline
#[derive(Debug, Clone, Default)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive assembly topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    LineList,
}

/// Fixed-function blend state, derived from the material's alpha mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    Alpha,
}

/// Descriptor for creating a graphics pipeline
pub struct PipelineDesc {
    pub vertex_shader: Arc<dyn DeviceShader>,
    pub fragment_shader: Arc<dyn DeviceShader>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub blend: BlendMode,
}

/// Graphics pipeline trait
pub trait DevicePipeline: Send + Sync {
    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
