use super::*;
use std::sync::{Arc, Mutex};

use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockLog};
use crate::graphics_device::GraphicsDevice;
use crate::resource::material::AlphaMode;
use crate::shader::registry::ShaderRegistry;

struct Harness {
    cache: MaterialBindingCache,
    registry: ShaderRegistry,
    created_shaders: MockLog,
    created_pipelines: MockLog,
}

fn harness() -> Harness {
    let mock = MockGraphicsDevice::new();
    let created_shaders = mock.created_shaders.clone();
    let created_pipelines = mock.created_pipelines.clone();
    let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(mock));
    Harness {
        cache: MaterialBindingCache::new(device),
        registry: ShaderRegistry::new(),
        created_shaders,
        created_pipelines,
    }
}

fn valid_spirv() -> Vec<u8> {
    vec![3, 2, 35, 7, 0, 0, 1, 0]
}

/// Three bytes: not word-aligned, rejected by the device as a compile error
fn broken_spirv() -> Vec<u8> {
    vec![1, 2, 3]
}

fn key_inputs() -> (MeshLayoutKind, PrimitiveTopology) {
    (MeshLayoutKind::Separate, PrimitiveTopology::TriangleList)
}

// ============================================================================
// Lazy compilation and memoization
// ============================================================================

#[test]
fn test_first_use_compiles_then_memoizes() {
    let mut h = harness();
    h.registry.register("pbr", valid_spirv(), valid_spirv());
    let material = Material::new("mat", "pbr");
    let (layout, topology) = key_inputs();

    let first = h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap();
    assert!(first.is_some());
    assert_eq!(h.created_pipelines.lock().unwrap().len(), 1);
    assert_eq!(h.created_shaders.lock().unwrap().len(), 2);

    let second = h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap();
    assert!(second.is_some());
    // No recompilation for an unchanged generation.
    assert_eq!(h.created_pipelines.lock().unwrap().len(), 1);
    assert_eq!(h.created_shaders.lock().unwrap().len(), 2);
}

#[test]
fn test_unknown_shader_is_skipped_not_fatal() {
    let mut h = harness();
    let material = Material::new("mat", "not_registered");
    let (layout, topology) = key_inputs();

    let result = h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap();
    assert!(result.is_none());
    assert!(h.cache.is_empty());
}

#[test]
fn test_generation_advance_triggers_recompile() {
    let mut h = harness();
    h.registry.register("pbr", valid_spirv(), valid_spirv());
    let material = Material::new("mat", "pbr");
    let (layout, topology) = key_inputs();

    h.cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap();
    assert_eq!(h.created_pipelines.lock().unwrap().len(), 1);

    // Hot reload: new generation, next lookup recompiles exactly once.
    h.registry.register("pbr", valid_spirv(), valid_spirv());
    h.cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap();
    h.cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap();
    assert_eq!(h.created_pipelines.lock().unwrap().len(), 2);
}

#[test]
fn test_distinct_materials_compile_separately() {
    let mut h = harness();
    h.registry.register("pbr", valid_spirv(), valid_spirv());
    let a = Material::new("a", "pbr");
    let b = Material::new("b", "pbr").with_alpha_mode(AlphaMode::Blend);
    let (layout, topology) = key_inputs();

    h.cache.ensure_compiled(&a, layout, topology, &h.registry).unwrap();
    h.cache.ensure_compiled(&b, layout, topology, &h.registry).unwrap();
    assert_eq!(h.cache.len(), 2);
    let pipelines = h.created_pipelines.lock().unwrap().clone();
    assert!(pipelines.iter().any(|p| p.contains("Opaque")));
    assert!(pipelines.iter().any(|p| p.contains("Alpha")));
}

// ============================================================================
// Scenario D: broken source is recoverable and not re-attempted
// ============================================================================

#[test]
fn test_broken_source_returns_none_without_unwinding() {
    let mut h = harness();
    h.registry.register("pbr", valid_spirv(), valid_spirv());
    let material = Material::new("mat", "pbr");
    let (layout, topology) = key_inputs();

    // Generation 1 compiles.
    assert!(h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap()
        .is_some());

    // Generation 2 is broken: skipped, no error, no panic.
    h.registry.register("pbr", broken_spirv(), valid_spirv());
    assert!(h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap()
        .is_none());

    // Re-evaluating the same broken generation does not recompile.
    let shader_count = h.created_shaders.lock().unwrap().len();
    assert!(h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap()
        .is_none());
    assert_eq!(h.created_shaders.lock().unwrap().len(), shader_count);

    // Corrected source (generation 3) compiles again.
    h.registry.register("pbr", valid_spirv(), valid_spirv());
    assert!(h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap()
        .is_some());
}

#[test]
fn test_broken_fragment_stage_is_also_recoverable() {
    let mut h = harness();
    h.registry.register("pbr", valid_spirv(), broken_spirv());
    let material = Material::new("mat", "pbr");
    let (layout, topology) = key_inputs();

    assert!(h
        .cache
        .ensure_compiled(&material, layout, topology, &h.registry)
        .unwrap()
        .is_none());
}
