//! Shadow Settings & Submission Strategy Configuration
//!
//! The core abstraction is [`RenderMethod`], which selects how draws reach the
//! GPU, and [`RenderMode`], which selects which thread records and submits them.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use async_shadow::settings::{RenderMethod, RenderMode, ShadowSettings};
//!
//! // Default: direct draws, submitted from the worker thread
//! let settings = ShadowSettings::default();
//!
//! // GPU-driven draws recorded inline on the calling thread
//! let settings = ShadowSettings {
//!     render_method: RenderMethod::Indirect,
//!     render_mode: RenderMode::Synchronous,
//!     ..Default::default()
//! };
//! ```

// ---------------------------------------------------------------------------
// RenderMethod
// ---------------------------------------------------------------------------

/// Draw-submission strategy for the shadow pass.
///
/// All three strategies write identical depth; they differ in where the cost
/// lands.
///
/// | Strategy   | CPU cost per frame            | Setup cost                        |
/// |------------|-------------------------------|-----------------------------------|
/// | `Direct`   | one bind + draw per object    | none                              |
/// | `Bundle`   | one bundle replay             | one bundle per frame slot         |
/// | `Indirect` | one multi-draw call           | merged geometry + argument upload |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMethod {
    /// Per-object binds and indexed draws recorded every frame.
    #[default]
    Direct,
    /// Replays the draw loop pre-recorded for the current frame slot.
    Bundle,
    /// Single indirect multi-draw reading GPU-resident argument records.
    Indirect,
}

impl RenderMethod {
    /// Resolves the host's pair of toggles. Indirect wins when both are set.
    #[inline]
    #[must_use]
    pub fn from_flags(use_indirect: bool, use_bundle: bool) -> Self {
        if use_indirect {
            Self::Indirect
        } else if use_bundle {
            Self::Bundle
        } else {
            Self::Direct
        }
    }
}

// ---------------------------------------------------------------------------
// RenderMode
// ---------------------------------------------------------------------------

/// Which thread performs update + record + submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// The caller blocks until the pass has been submitted.
    Synchronous,
    /// The caller signals the worker and returns immediately.
    #[default]
    Asynchronous,
}

impl RenderMode {
    #[inline]
    #[must_use]
    pub fn from_multithreaded(multithreaded: bool) -> Self {
        if multithreaded {
            Self::Asynchronous
        } else {
            Self::Synchronous
        }
    }
}

// ---------------------------------------------------------------------------
// ShadowSettings
// ---------------------------------------------------------------------------

/// Configuration consumed by [`ShadowPlugin::new`](crate::ShadowPlugin::new).
///
/// # Fields
///
/// | Field              | Description                                  | Default            |
/// |--------------------|----------------------------------------------|--------------------|
/// | `render_method`    | Initial submission strategy                  | `Direct`           |
/// | `render_mode`      | Default mode for [`render`] without override | `Asynchronous`     |
/// | `max_anisotropy`   | Cutout sampler anisotropy clamp              | `16`               |
/// | `clear_depth`      | Depth clear value                            | `1.0`              |
/// | `power_preference` | Adapter selection for headless contexts      | `HighPerformance`  |
/// | `force_fallback`   | Request the software fallback adapter        | `false`            |
///
/// [`render`]: crate::ShadowPlugin::render
#[derive(Debug, Clone)]
pub struct ShadowSettings {
    // === Submission ===
    /// Strategy used until the host calls `set_render_method`.
    pub render_method: RenderMethod,

    /// Mode used by [`ShadowPlugin::render`](crate::ShadowPlugin::render).
    pub render_mode: RenderMode,

    // === Pass State ===
    /// Anisotropy clamp of the cutout sampler. Values above 1 require
    /// linear filtering, which the sampler always uses.
    pub max_anisotropy: u16,

    /// Value the depth target is cleared to at the start of every pass.
    pub clear_depth: f32,

    // === GPU / Backend Configuration ===
    /// Adapter preference used by [`DeviceContext::request`](crate::DeviceContext::request).
    pub power_preference: wgpu::PowerPreference,

    /// Ask headless contexts for the fallback (software) adapter.
    pub force_fallback: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            render_method: RenderMethod::default(),
            render_mode: RenderMode::default(),
            max_anisotropy: 16,
            clear_depth: 1.0,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback: false,
        }
    }
}
