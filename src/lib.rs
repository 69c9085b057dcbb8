#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod backend;
pub mod errors;
pub mod math;
pub mod plugin;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod worker;

pub use backend::{BackendKind, DeviceContext, DeviceEvent, ShadowBackend, WgpuShadowBackend};
pub use errors::{Result, ShadowError};
pub use plugin::ShadowPlugin;
pub use renderer::{FRAME_COUNT, MAX_TEXTURES, ShadowPass};
pub use scene::{MeshView, ShadowScene};
pub use settings::{RenderMethod, RenderMode, ShadowSettings};
pub use worker::{RenderTimer, RequestOutcome, ShadowWorker};
