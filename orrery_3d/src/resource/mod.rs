/// Resource module - CPU-side scene data produced by the (external) loader.
///
/// Meshes, materials and images carry a process-wide monotonic identity id;
/// every GPU-side cache (geometry, textures, descriptor slots, compiled
/// materials) keys off that identity, never off value equality.

// Module declarations
pub mod image;
pub mod material;
pub mod mesh;
pub mod material_cache;

// Re-exports
pub use image::*;
pub use material::*;
pub use mesh::*;
pub use material_cache::*;

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate the next process-wide entity identity.
///
/// Shared by meshes, materials, images and scene nodes so any of them can
/// key a descriptor partition without collisions.
pub fn next_entity_id() -> u64 {
    NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}
