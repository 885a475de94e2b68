/// GeometryCache - GPU residency for mesh vertex/index data.
///
/// Keyed by mesh identity, first-seen-wins. A cache miss creates the GPU
/// buffers and enqueues uploads for the static streams; nothing blocks.
/// Buffers become drawable over subsequent frames as uploads retire and
/// the recorded transitions execute; until then draw-list entries using
/// them are simply skipped.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{BufferUsage, GraphicsDevice, ResidencyState};
use crate::gpu::command_recorder::CommandRecorder;
use crate::gpu::resource::{GpuResource, UploadState};
use crate::gpu::uploader::Uploader;
use crate::resource::mesh::{Mesh, VertexSemantic, INTERLEAVED_STRIDE};

/// GPU-side buffers for one mesh
pub struct MeshGeometry {
    /// Static per-semantic vertex buffers, in binding order
    pub streams: Vec<(VertexSemantic, Arc<GpuResource>)>,
    /// Host-visible interleaved vertex buffer (dynamic meshes only)
    pub dynamic: Option<Arc<GpuResource>>,
    pub index: Arc<GpuResource>,
}

impl MeshGeometry {
    /// Whether every buffer has reached its drawable state
    pub fn is_drawable(&self) -> bool {
        self.streams.iter().all(|(_, stream)| stream.is_drawable())
            && self.dynamic.as_ref().map_or(true, |d| d.is_drawable())
            && self.index.is_drawable()
    }

    /// Record residency transitions for buffers whose upload has completed
    /// but which still sit in `CopyDestination`.
    ///
    /// The logical states flip once this recording's submission completes,
    /// so the mesh becomes drawable on a later frame.
    pub fn record_pending_transitions(&self, recorder: &mut CommandRecorder) -> Result<()> {
        for (_, stream) in &self.streams {
            if stream.upload_state() == UploadState::Uploaded
                && stream.residency_state() == ResidencyState::CopyDestination
            {
                stream.enqueue_transition(recorder, ResidencyState::VertexBuffer)?;
            }
        }
        if self.index.upload_state() == UploadState::Uploaded
            && self.index.residency_state() == ResidencyState::CopyDestination
        {
            self.index.enqueue_transition(recorder, ResidencyState::IndexBuffer)?;
        }
        Ok(())
    }
}

/// Mesh identity -> GPU geometry. Entries are never evicted.
pub struct GeometryCache {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    entries: FxHashMap<u64, Arc<MeshGeometry>>,
}

impl GeometryCache {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self {
            device,
            entries: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, mesh_id: u64) -> Option<&Arc<MeshGeometry>> {
        self.entries.get(&mesh_id)
    }

    /// Fetch or create the GPU geometry for a mesh.
    ///
    /// On a miss, static streams and the index stream get device-local
    /// buffers with uploads enqueued; dynamic meshes get a host-visible
    /// interleaved buffer filled by the per-frame update instead.
    pub fn get_or_create(&mut self, mesh: &Mesh, uploader: &mut Uploader) -> Result<Arc<MeshGeometry>> {
        if let Some(geometry) = self.entries.get(&mesh.id()) {
            return Ok(geometry.clone());
        }

        let mut streams = Vec::with_capacity(mesh.streams().len());
        for stream in mesh.streams() {
            let stride = stream.semantic.stride();
            let resource = GpuResource::device_local_buffer(
                &self.device,
                stream.data.len() as u64,
                stride,
                BufferUsage::VERTEX,
            )?;
            uploader.enqueue_upload(resource.clone(), stream.data.clone(), stride);
            streams.push((stream.semantic, resource));
        }

        let dynamic = if mesh.is_dynamic() {
            Some(GpuResource::host_visible_buffer(
                &self.device,
                mesh.interleaved_len(),
                INTERLEAVED_STRIDE,
                BufferUsage::VERTEX,
            )?)
        } else {
            None
        };

        let index = GpuResource::device_local_buffer(
            &self.device,
            mesh.indices().len() as u64,
            mesh.index_type().size_bytes(),
            BufferUsage::INDEX,
        )?;
        uploader.enqueue_upload(index.clone(), mesh.indices().clone(), mesh.index_type().size_bytes());

        let geometry = Arc::new(MeshGeometry {
            streams,
            dynamic,
            index,
        });
        self.entries.insert(mesh.id(), geometry.clone());
        Ok(geometry)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "geometry_cache_tests.rs"]
mod tests;
