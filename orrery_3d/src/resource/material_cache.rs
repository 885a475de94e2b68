/// MaterialBindingCache - lazily compiled pipeline state per material.
///
/// Keyed by material identity (plus the vertex layout/topology the mesh
/// binds with). Compilation happens on first use and again exactly when the
/// shader's generation counter has advanced. A compile failure is
/// recoverable: the material is skipped at draw time and re-attempted only
/// once the source changes again, so a broken shader on disk never takes
/// the frame loop down or spams recompiles.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    DevicePipeline, DeviceShader, GraphicsDevice, PipelineDesc, PrimitiveTopology, ShaderDesc,
    ShaderStage,
};
use crate::render_warn;
use crate::resource::material::Material;
use crate::resource::mesh::MeshLayoutKind;
use crate::shader::registry::{ShaderRegistry, ShaderSource};

/// Cache key: material identity plus the mesh-side pipeline inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub material: u64,
    pub layout: MeshLayoutKind,
    pub topology: PrimitiveTopology,
}

struct CompiledMaterial {
    pipeline: Arc<dyn DevicePipeline>,
    /// Shader generation this pipeline was compiled from
    generation: u64,
}

#[derive(Default)]
struct CacheEntry {
    compiled: Option<CompiledMaterial>,
    /// Generation whose source failed to compile; retried only after it
    /// advances again
    failed_generation: Option<u64>,
}

/// Memoizes compiled pipelines per (material, layout, topology)
pub struct MaterialBindingCache {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    entries: FxHashMap<PipelineKey, CacheEntry>,
}

impl MaterialBindingCache {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self {
            device,
            entries: FxHashMap::default(),
        }
    }

    /// Number of cache entries (compiled or failed)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the ready-to-bind pipeline for a material, compiling lazily.
    ///
    /// - `Ok(Some(_))`: pipeline is current for the shader's generation.
    /// - `Ok(None)`: shader missing or failed to compile; the material is
    ///   not drawable this frame and will be re-evaluated when the shader
    ///   source changes (recoverable, nothing unwinds).
    /// - `Err(_)`: fatal device error.
    pub fn ensure_compiled(
        &mut self,
        material: &Material,
        layout: MeshLayoutKind,
        topology: PrimitiveTopology,
        registry: &ShaderRegistry,
    ) -> Result<Option<Arc<dyn DevicePipeline>>> {
        let Some(source) = registry.get(material.shader()) else {
            return Ok(None);
        };

        let key = PipelineKey {
            material: material.id(),
            layout,
            topology,
        };
        let entry = self.entries.entry(key).or_default();

        if let Some(compiled) = &entry.compiled {
            if compiled.generation == source.generation {
                return Ok(Some(compiled.pipeline.clone()));
            }
        }
        if entry.failed_generation == Some(source.generation) {
            return Ok(None);
        }

        match Self::compile(&self.device, material, layout, topology, source)? {
            Some(pipeline) => {
                entry.compiled = Some(CompiledMaterial {
                    pipeline: pipeline.clone(),
                    generation: source.generation,
                });
                entry.failed_generation = None;
                Ok(Some(pipeline))
            }
            None => {
                entry.failed_generation = Some(source.generation);
                Ok(None)
            }
        }
    }

    /// Compile both stages and the pipeline. `Ok(None)` on recoverable
    /// compile failure, `Err` on fatal device errors.
    fn compile(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
        material: &Material,
        layout: MeshLayoutKind,
        topology: PrimitiveTopology,
        source: &ShaderSource,
    ) -> Result<Option<Arc<dyn DevicePipeline>>> {
        let mut device = device.lock().unwrap();

        let vertex = match Self::compile_stage(&mut *device, material, ShaderStage::Vertex, source) {
            Ok(shader) => shader,
            Err(CompileOutcome::Recoverable) => return Ok(None),
            Err(CompileOutcome::Fatal(error)) => return Err(error),
        };
        let fragment =
            match Self::compile_stage(&mut *device, material, ShaderStage::Fragment, source) {
                Ok(shader) => shader,
                Err(CompileOutcome::Recoverable) => return Ok(None),
                Err(CompileOutcome::Fatal(error)) => return Err(error),
            };

        match device.create_pipeline(PipelineDesc {
            vertex_shader: vertex,
            fragment_shader: fragment,
            vertex_layout: layout.vertex_layout(),
            topology,
            blend: material.alpha_mode().blend_mode(),
        }) {
            Ok(pipeline) => Ok(Some(pipeline)),
            Err(Error::InvalidResource(message)) => {
                render_warn!(
                    "orrery3d::MaterialBindingCache",
                    "material '{}': pipeline for shader '{}' generation {} rejected: {}",
                    material.name(),
                    material.shader(),
                    source.generation,
                    message
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn compile_stage(
        device: &mut dyn GraphicsDevice,
        material: &Material,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> std::result::Result<Arc<dyn DeviceShader>, CompileOutcome> {
        let code = match stage {
            ShaderStage::Vertex => source.vertex.as_ref().clone(),
            ShaderStage::Fragment => source.fragment.as_ref().clone(),
        };
        match device.create_shader(ShaderDesc {
            name: format!("{}_{:?}", material.shader(), stage),
            stage,
            entry_point: "main".to_string(),
            code,
        }) {
            Ok(shader) => Ok(shader),
            Err(Error::InvalidResource(message)) => {
                render_warn!(
                    "orrery3d::MaterialBindingCache",
                    "material '{}': {:?} stage of shader '{}' generation {} failed to compile: {}",
                    material.name(),
                    stage,
                    material.shader(),
                    source.generation,
                    message
                );
                Err(CompileOutcome::Recoverable)
            }
            Err(error) => Err(CompileOutcome::Fatal(error)),
        }
    }
}

enum CompileOutcome {
    Recoverable,
    Fatal(Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "material_cache_tests.rs"]
mod tests;
