/*!
# Orrery 3D

Core of the Orrery hierarchical-scene viewer: CPU-side scene updates
overlapped with asynchronous GPU resource upload and fenced command
submission.

The crate is written against a backend trait boundary (similar to C++
virtual inheritance); backend implementations (Vulkan) live in sibling
crates and are chosen by the embedding application.

## Architecture

- **GraphicsDevice**: factory + submission queue + monotonic fence trait
- **GpuResource**: residency/upload state machine per allocation
- **SubmissionQueue / CommandRecorder**: fenced submission with deferred
  completion callbacks
- **Uploader**: single-in-flight staging pipeline
- **DescriptorTable**: fixed-capacity partitioned binding slots
- **MaterialBindingCache / ShaderRegistry**: lazy pipeline compilation with
  hot-reload generations
- **SceneGraph / DrawListBuilder**: pre-order traversal producing the
  per-frame draw list
- **Viewer**: the frame driver tying it all together
*/

// Internal modules
pub mod error;
pub mod log;
pub mod graphics_device;
pub mod gpu;
pub mod shader;
pub mod resource;
pub mod scene;
pub mod viewer;

// Main orrery3d namespace module
pub mod orrery3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Frame driver
    pub use crate::viewer::{
        FrameConstants, MaterialConstants, NodeConstants, Viewer, ViewerConfig, GIZMO_SHADER,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{
            reset_logger, set_logger, CallbackLogger, DefaultLogger, LogEntry, LogSeverity, Logger,
        };
    }

    // Device trait boundary
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // GPU lifecycle sub-module
    pub mod gpu {
        pub use crate::gpu::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Shader registry sub-module
    pub mod shader {
        pub use crate::shader::*;
    }
}

// Re-export math library at crate root
pub use glam;
