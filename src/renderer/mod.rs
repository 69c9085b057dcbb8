//! GPU side of the shadow pass.
//!
//! - [`uniforms`]: constant layouts shared with the shader
//! - [`buffer`]: upload and default buffer wrappers
//! - [`fence`] / [`frame_ring`]: fence emulation and frame-slot pacing
//! - [`draw`]: draw plans and the recording surface shared by passes and bundles
//! - [`pipeline`]: binding layout and pipeline cache
//! - [`shadow_pass`]: the engine tying them together

pub mod buffer;
pub mod draw;
pub mod fence;
pub mod frame_ring;
pub mod pipeline;
pub mod shadow_pass;
pub mod uniforms;

pub use buffer::{BufferState, DefaultBuffer, StagingArray, UploadBuffer};
pub use fence::{GpuFence, QueueFence};
pub use frame_ring::FrameRing;
pub use shadow_pass::{MeshBuffers, ShadowPass};
pub use uniforms::{FRAME_COUNT, MAX_TEXTURES};
