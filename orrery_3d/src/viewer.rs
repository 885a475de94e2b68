/// Viewer - the frame driver owning the render core.
///
/// One `on_frame` call performs, in order: one uploader tick, the shader
/// hot-reload drain, world-transform update (with skin and gizmo geometry
/// regeneration), draw-list rebuild, constant writes, command recording for
/// every drawable entry, submission, presentation, and the blocking
/// end-of-frame sync that runs all outstanding completion callbacks.
///
/// Entries whose GPU resources are not yet drawable are skipped silently
/// and re-checked next frame; only device errors unwind.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytemuck::Zeroable;
use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{
    AcquiredImage, BindingSpace, BufferUsage, DevicePipeline, GraphicsDevice, Rect2D, Swapchain,
    Viewport,
};
use crate::gpu::command_recorder::CommandRecorder;
use crate::gpu::descriptor_table::{DescriptorPartition, DescriptorTable, PartitionLayout};
use crate::gpu::geometry_cache::{GeometryCache, MeshGeometry};
use crate::gpu::resource::GpuResource;
use crate::gpu::submission_queue::SubmissionQueue;
use crate::gpu::texture_cache::{TextureCache, TextureResidency};
use crate::gpu::uploader::Uploader;
use crate::render_warn;
use crate::resource::image::Image;
use crate::resource::material::Material;
use crate::resource::material_cache::MaterialBindingCache;
use crate::resource::mesh::{axis_gizmo_mesh, axis_gizmo_vertices, Mesh, INTERLEAVED_STRIDE};
use crate::scene::draw_list::DrawListBuilder;
use crate::scene::node::NodeKey;
use crate::scene::scene_graph::SceneGraph;
use crate::shader::registry::{ShaderRegistry, ShaderUpdateQueue};

/// Shader name gizmo materials resolve through the registry
pub const GIZMO_SHADER: &str = "gizmo";

const GIZMO_AXIS_LENGTH: f32 = 0.25;

/// Per-frame constants, written once per frame into slot 1
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameConstants {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4,
    pub time_seconds: f32,
    pub _padding: [f32; 3],
}

/// Per-node constants, one element per node partition slot
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeConstants {
    pub world: Mat4,
    pub normal_matrix: Mat4,
}

/// Per-material constants, one element per material partition slot
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialConstants {
    pub base_color: Vec4,
    pub alpha_cutoff: f32,
    pub alpha_mode: u32,
    pub has_color_texture: u32,
    pub _padding: u32,
}

/// Core-side tunables
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub partitions: PartitionLayout,
    pub clear_color: [f32; 4],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            partitions: PartitionLayout::default(),
            clear_color: [0.05, 0.05, 0.08, 1.0],
        }
    }
}

/// A draw-list entry that survived preparation: everything needed to record
/// its draw call this frame.
struct PreparedDraw {
    entry_index: usize,
    geometry: Arc<MeshGeometry>,
    pipeline: Arc<dyn DevicePipeline>,
    node_slot: u32,
    material_slot: u32,
    texture_slot: u32,
}

/// Owns the render core and drives it once per frame
pub struct Viewer {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    swapchain: Box<dyn Swapchain>,
    submissions: SubmissionQueue,
    uploader: Uploader,
    descriptors: DescriptorTable,
    shaders: ShaderRegistry,
    materials: MaterialBindingCache,
    geometry: GeometryCache,
    textures: TextureCache,
    scene: SceneGraph,
    draw_list: DrawListBuilder,
    recorder: CommandRecorder,

    frame_constants: Arc<GpuResource>,
    frame_slot: u32,
    node_constants: Arc<GpuResource>,
    node_constants_cpu: Vec<NodeConstants>,
    material_constants: Arc<GpuResource>,
    material_constants_cpu: Vec<MaterialConstants>,

    default_texture: Arc<TextureResidency>,
    gizmo_material: Arc<Material>,
    gizmo_meshes: FxHashMap<u64, Arc<Mesh>>,

    view: Mat4,
    projection: Mat4,
    clear_color: [f32; 4],
    started: Instant,
    frame_index: u64,
}

impl Viewer {
    pub fn new(
        device: Arc<Mutex<dyn GraphicsDevice>>,
        swapchain: Box<dyn Swapchain>,
        shaders: ShaderRegistry,
        config: ViewerConfig,
    ) -> Result<Self> {
        let submissions = SubmissionQueue::new(device.clone());
        let mut uploader = Uploader::new(device.clone())?;
        let mut descriptors = DescriptorTable::new(device.clone(), config.partitions)?;
        let recorder = CommandRecorder::new(&device)?;

        // Per-frame constants: single element, slot written once.
        let frame_stride = std::mem::size_of::<FrameConstants>() as u64;
        let frame_constants = GpuResource::host_visible_buffer(
            &device,
            frame_stride,
            frame_stride as u32,
            BufferUsage::UNIFORM,
        )?;
        let frame_slot = descriptors.get_or_create_slot(DescriptorPartition::Frame, 0)?;
        descriptors.write_buffer(frame_slot, &frame_constants, 0, frame_stride)?;

        // Per-node and per-material constant arrays: one element per
        // partition slot, rewritten wholesale each frame. Slot descriptors
        // are written lazily as slots are claimed.
        let node_capacity = config.partitions.node_capacity as usize;
        let node_stride = std::mem::size_of::<NodeConstants>() as u64;
        let node_constants = GpuResource::host_visible_buffer(
            &device,
            node_stride * node_capacity as u64,
            node_stride as u32,
            BufferUsage::UNIFORM,
        )?;

        let material_capacity = config.partitions.material_capacity as usize;
        let material_stride = std::mem::size_of::<MaterialConstants>() as u64;
        let material_constants = GpuResource::host_visible_buffer(
            &device,
            material_stride * material_capacity as u64,
            material_stride as u32,
            BufferUsage::UNIFORM,
        )?;

        // Fallback texture for untextured materials; uploaded like any
        // other image and drawable after its first transition.
        let default_image = Arc::new(Image::new("default_white", 1, 1, vec![255; 4])?);
        let mut textures = TextureCache::new(device.clone());
        let default_texture =
            textures.get_or_create(&default_image, &mut uploader, &mut descriptors)?;

        Ok(Self {
            materials: MaterialBindingCache::new(device.clone()),
            geometry: GeometryCache::new(device.clone()),
            textures,
            scene: SceneGraph::new(),
            draw_list: DrawListBuilder::new(),
            recorder,
            frame_constants,
            frame_slot,
            node_constants,
            node_constants_cpu: vec![NodeConstants::zeroed(); node_capacity],
            material_constants,
            material_constants_cpu: vec![MaterialConstants::zeroed(); material_capacity],
            default_texture,
            gizmo_material: Arc::new(Material::new("gizmo", GIZMO_SHADER)),
            gizmo_meshes: FxHashMap::default(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            clear_color: config.clear_color,
            started: Instant::now(),
            frame_index: 0,
            device,
            swapchain,
            submissions,
            uploader,
            descriptors,
            shaders,
        })
    }

    // ===== EXTERNAL INTERFACES =====

    /// Read-only scene access (inspector panels, file-open UI)
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Mutable scene access for the loader and interaction code
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderRegistry {
        &mut self.shaders
    }

    /// Handle for hot-reload watcher threads
    pub fn shader_update_queue(&self) -> ShaderUpdateQueue {
        self.shaders.update_queue()
    }

    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    /// Frames completed so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Upload requests still waiting in the FIFO
    pub fn pending_uploads(&self) -> usize {
        self.uploader.pending_count()
    }

    // ===== FRAME LOOP =====

    /// Render one frame.
    pub fn on_frame(&mut self) -> Result<()> {
        // (1) drain the uploader one step
        self.uploader.update(&mut self.submissions)?;

        // apply hot-reloaded shader sources
        self.shaders.drain_updates();

        // (2) world transforms, dynamic geometry, draw list
        let skinned_nodes = self.scene.update_world();
        self.ensure_gizmo_meshes()?;
        self.draw_list.build(&self.scene);
        self.update_skinned_meshes(&skinned_nodes)?;
        self.update_gizmo_meshes()?;

        // (3) per-frame constants
        self.write_frame_constants()?;

        let image_index = match self.swapchain.acquire_next_image()? {
            AcquiredImage::Ready(index) => index,
            AcquiredImage::OutOfDate => {
                let (width, height) = (self.swapchain.width(), self.swapchain.height());
                self.flush_and_recreate(width, height)?;
                return Ok(());
            }
        };

        // (4) record barriers and draws for drawable entries
        self.recorder.begin()?;
        let prepared = self.prepare_draws()?;
        self.write_constant_arrays(&prepared)?;
        self.record_draws(image_index, &prepared)?;

        // (5) submit + present
        self.submissions
            .submit_frame(&mut self.recorder, self.swapchain.as_ref(), image_index)?;
        let presented = self.swapchain.present(image_index)?;

        // (6) end-of-frame sync; runs all completion callbacks now safe
        self.submissions.sync_and_run_callbacks(Vec::new())?;

        if !presented {
            let (width, height) = (self.swapchain.width(), self.swapchain.height());
            self.swapchain.recreate(width, height)?;
        }

        self.frame_index += 1;
        Ok(())
    }

    /// Output dimensions changed: fully flush the submission queue before
    /// releasing and recreating surface-bound resources.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.flush_and_recreate(width, height)
    }

    fn flush_and_recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.submissions.sync_and_run_callbacks(Vec::new())?;
        self.swapchain.recreate(width, height)
    }

    // ===== FRAME INTERNALS =====

    /// Attach a dynamic axis mesh to every newly gizmo-flagged node
    fn ensure_gizmo_meshes(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        self.scene.traverse(|key, node| {
            if node.gizmo_enabled() && !self.gizmo_meshes.contains_key(&node.id()) {
                missing.push((key, node.id()));
            }
        });
        for (key, node_id) in missing {
            let mesh = Arc::new(axis_gizmo_mesh(self.gizmo_material.clone()));
            if let Some(node) = self.scene.node_mut(key) {
                node.add_mesh(mesh.clone());
            }
            self.gizmo_meshes.insert(node_id, mesh);
        }
        Ok(())
    }

    /// Rewrite gizmo vertex data for this frame (bounded synchronous copy)
    fn update_gizmo_meshes(&mut self) -> Result<()> {
        if self.gizmo_meshes.is_empty() {
            return Ok(());
        }
        let vertices = axis_gizmo_vertices(GIZMO_AXIS_LENGTH);
        for mesh in self.gizmo_meshes.values() {
            let geometry = self.geometry.get_or_create(mesh, &mut self.uploader)?;
            if let Some(dynamic) = &geometry.dynamic {
                dynamic.map_copy_unmap(&vertices, INTERLEAVED_STRIDE)?;
            }
        }
        Ok(())
    }

    /// Recompute joint matrices and CPU-skin every skinned mesh visited by
    /// this frame's traversal.
    fn update_skinned_meshes(&mut self, skinned_nodes: &[NodeKey]) -> Result<()> {
        for &key in skinned_nodes {
            let meshes: Vec<Arc<Mesh>> = match self.scene.node(key) {
                Some(node) => node.meshes().to_vec(),
                None => continue,
            };
            for mesh in meshes {
                let Some(skin) = mesh.skin() else {
                    continue;
                };
                let joint_matrices = self.scene.compute_joint_matrices(key, skin);
                let Some(vertices) = mesh.skinned_vertices(&joint_matrices) else {
                    continue;
                };
                let geometry = self.geometry.get_or_create(&mesh, &mut self.uploader)?;
                if let Some(dynamic) = &geometry.dynamic {
                    dynamic.map_copy_unmap(&vertices, INTERLEAVED_STRIDE)?;
                }
            }
        }
        Ok(())
    }

    fn write_frame_constants(&mut self) -> Result<()> {
        let constants = FrameConstants {
            view: self.view,
            projection: self.projection,
            view_projection: self.projection * self.view,
            camera_position: self.view.inverse().w_axis,
            time_seconds: self.started.elapsed().as_secs_f32(),
            _padding: [0.0; 3],
        };
        self.frame_constants.map_copy_unmap(
            bytemuck::bytes_of(&constants),
            std::mem::size_of::<FrameConstants>() as u32,
        )
    }

    /// Walk the draw list: record pending transitions, resolve pipelines
    /// and slots, and keep the entries whose resources are drawable.
    fn prepare_draws(&mut self) -> Result<Vec<PreparedDraw>> {
        self.textures.record_pending_transitions(&mut self.recorder)?;

        let mut prepared = Vec::with_capacity(self.draw_list.len());
        for entry_index in 0..self.draw_list.len() {
            let (mesh, material, node_id) = {
                let entry = &self.draw_list.entries()[entry_index];
                (entry.mesh.clone(), entry.material.clone(), entry.node_id)
            };

            // Residency first: misses enqueue uploads, completed uploads
            // get their transitions recorded for later frames.
            let geometry = self.geometry.get_or_create(&mesh, &mut self.uploader)?;
            geometry.record_pending_transitions(&mut self.recorder)?;

            // Recoverable: material without a usable pipeline is skipped
            // and re-evaluated when its shader source changes.
            let Some(pipeline) = self.materials.ensure_compiled(
                &material,
                mesh.layout_kind(),
                mesh.topology(),
                &self.shaders,
            )?
            else {
                continue;
            };

            // Transient: texture still uploading.
            let texture = match material.color_image() {
                Some(image) => {
                    let image = image.clone();
                    self.textures
                        .get_or_create(&image, &mut self.uploader, &mut self.descriptors)?
                }
                None => self.default_texture.clone(),
            };
            if !texture.is_drawable() {
                continue;
            }

            // Transient: vertex/index data still uploading.
            if !geometry.is_drawable() {
                continue;
            }

            let node_slot = self.claim_constant_slot(
                DescriptorPartition::Node,
                node_id,
                std::mem::size_of::<NodeConstants>() as u64,
            )?;
            let material_slot = self.claim_constant_slot(
                DescriptorPartition::Material,
                material.id(),
                std::mem::size_of::<MaterialConstants>() as u64,
            )?;

            prepared.push(PreparedDraw {
                entry_index,
                geometry,
                pipeline,
                node_slot,
                material_slot,
                texture_slot: texture.slot,
            });
        }
        Ok(prepared)
    }

    /// Claim a partition slot for an identity, pointing its descriptor at
    /// the matching element of the partition's constant array on first use.
    fn claim_constant_slot(
        &mut self,
        partition: DescriptorPartition,
        identity: u64,
        stride: u64,
    ) -> Result<u32> {
        let known = self.descriptors.is_assigned(partition, identity);
        let slot = self.descriptors.get_or_create_slot(partition, identity)?;
        if !known {
            let offset = self.descriptors.slot_offset(partition, slot) as u64 * stride;
            let buffer = match partition {
                DescriptorPartition::Node => &self.node_constants,
                DescriptorPartition::Material => &self.material_constants,
                _ => &self.frame_constants,
            };
            self.descriptors.write_buffer(slot, buffer, offset, stride)?;
        }
        Ok(slot)
    }

    /// Fill the node/material constant arrays for the surviving draws and
    /// push them through the bounded synchronous path.
    fn write_constant_arrays(&mut self, prepared: &[PreparedDraw]) -> Result<()> {
        for draw in prepared {
            let entry = &self.draw_list.entries()[draw.entry_index];

            let node_index =
                self.descriptors
                    .slot_offset(DescriptorPartition::Node, draw.node_slot) as usize;
            self.node_constants_cpu[node_index] = NodeConstants {
                world: entry.world,
                normal_matrix: entry.world.inverse().transpose(),
            };

            let material_index = self
                .descriptors
                .slot_offset(DescriptorPartition::Material, draw.material_slot)
                as usize;
            let material = entry.material.as_ref();
            let (alpha_mode, alpha_cutoff) = match material.alpha_mode() {
                crate::resource::material::AlphaMode::Opaque => (0, 0.0),
                crate::resource::material::AlphaMode::Mask { cutoff } => (1, cutoff),
                crate::resource::material::AlphaMode::Blend => (2, 0.0),
            };
            self.material_constants_cpu[material_index] = MaterialConstants {
                base_color: Vec4::from_array(material.base_color()),
                alpha_cutoff,
                alpha_mode,
                has_color_texture: material.color_image().is_some() as u32,
                _padding: 0,
            };
        }

        self.node_constants.map_copy_unmap(
            bytemuck::cast_slice(&self.node_constants_cpu),
            std::mem::size_of::<NodeConstants>() as u32,
        )?;
        self.material_constants.map_copy_unmap(
            bytemuck::cast_slice(&self.material_constants_cpu),
            std::mem::size_of::<MaterialConstants>() as u32,
        )?;
        Ok(())
    }

    /// Record the surface pass and one draw call per prepared entry
    fn record_draws(&mut self, image_index: u32, prepared: &[PreparedDraw]) -> Result<()> {
        let (width, height) = (self.swapchain.width(), self.swapchain.height());
        let cmd = self.recorder.commands_mut();

        cmd.begin_surface_pass(self.swapchain.as_ref(), image_index, self.clear_color)?;
        cmd.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        })?;
        cmd.set_scissor(Rect2D {
            x: 0,
            y: 0,
            width,
            height,
        })?;

        for draw in prepared {
            let entry = &self.draw_list.entries()[draw.entry_index];

            cmd.bind_pipeline(&draw.pipeline)?;
            cmd.bind_descriptor_slot(BindingSpace::Frame, self.frame_slot)?;
            cmd.bind_descriptor_slot(BindingSpace::Node, draw.node_slot)?;
            cmd.bind_descriptor_slot(BindingSpace::Material, draw.material_slot)?;
            cmd.bind_descriptor_slot(BindingSpace::Texture, draw.texture_slot)?;

            if let Some(dynamic) = &draw.geometry.dynamic {
                cmd.bind_vertex_buffer(0, dynamic.buffer().unwrap().as_ref(), 0)?;
            } else {
                for (semantic, stream) in &draw.geometry.streams {
                    cmd.bind_vertex_buffer(semantic.binding(), stream.buffer().unwrap().as_ref(), 0)?;
                }
            }
            cmd.bind_index_buffer(
                draw.geometry.index.buffer().unwrap().as_ref(),
                0,
                entry.mesh.index_type(),
            )?;

            let submesh = &entry.mesh.submeshes()[entry.submesh_index];
            cmd.draw_indexed(submesh.index_count, submesh.index_offset, 0)?;
        }

        cmd.end_surface_pass()
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        // Drain all outstanding work so no callback outlives its targets.
        if let Err(error) = self.submissions.sync_and_run_callbacks(Vec::new()) {
            render_warn!("orrery3d::Viewer", "teardown flush failed: {}", error);
        }
        if let Err(error) = self.device.lock().unwrap().wait_idle() {
            render_warn!("orrery3d::Viewer", "teardown wait_idle failed: {}", error);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "viewer_tests.rs"]
mod tests;
