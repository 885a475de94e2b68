/// GPU lifecycle module - resource states, command recording, fenced
/// submission, asynchronous upload and descriptor slots.

// Module declarations
pub mod resource;
pub mod command_recorder;
pub mod submission_queue;
pub mod uploader;
pub mod descriptor_table;
pub mod geometry_cache;
pub mod texture_cache;

// Re-exports
pub use resource::*;
pub use command_recorder::*;
pub use submission_queue::*;
pub use uploader::*;
pub use descriptor_table::*;
pub use geometry_cache::*;
pub use texture_cache::*;
