/// Buffer trait and buffer descriptor

use std::any::Any;
use bitflags::bitflags;
use crate::error::Result;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer
        const VERTEX = 1 << 0;
        /// Index buffer
        const INDEX = 1 << 1;
        /// Uniform/constant buffer
        const UNIFORM = 1 << 2;
        /// Source of a GPU copy (staging)
        const TRANSFER_SRC = 1 << 3;
        /// Destination of a GPU copy
        const TRANSFER_DST = 1 << 4;
    }
}

/// Which memory domain the buffer lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// GPU-local memory; reached only through staged copies
    DeviceLocal,
    /// CPU-writable memory, persistently mapped
    HostVisible,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage flags
    pub usage: BufferUsage,
    /// Memory domain
    pub location: MemoryLocation,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g. VulkanDeviceBuffer).
/// The buffer is destroyed when the last reference is dropped.
pub trait DeviceBuffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Write CPU data into the buffer.
    ///
    /// Only valid on `MemoryLocation::HostVisible` buffers; device-local
    /// buffers must go through a staged copy instead.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Raw pointer to persistently mapped memory.
    ///
    /// Returns None if the buffer is not CPU-accessible.
    /// The pointer remains valid for the lifetime of the buffer.
    fn mapped_ptr(&self) -> Option<*mut u8>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
