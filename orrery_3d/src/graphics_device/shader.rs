/// Shader trait and shader descriptor

use std::any::Any;

/// Shader pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Descriptor for creating a shader module.
///
/// `code` is a SPIR-V blob. Backends validate it at creation time; an
/// invalid blob is a recoverable compile failure
/// (`Error::InvalidResource`), not a device fault.
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    /// Shader name, used in logs and diagnostics
    pub name: String,
    pub stage: ShaderStage,
    /// Entry point symbol (e.g. "main")
    pub entry_point: String,
    /// SPIR-V bytes, 4-byte aligned
    pub code: Vec<u8>,
}

/// Shader module trait
pub trait DeviceShader: Send + Sync {
    /// Stage this module was created for
    fn stage(&self) -> ShaderStage;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
