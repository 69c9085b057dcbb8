//! Error Types
//!
//! This module defines the error types used throughout the shadow plugin.
//!
//! # Overview
//!
//! The main error type [`ShadowError`] covers every failure the host can observe:
//! - GPU device and adapter failures
//! - Setup-chain failures (pipeline, constant buffers, indirect arguments)
//! - Invalid arguments rejected at the call boundary
//! - Worker thread failures
//!
//! Out-of-range object indices are deliberately *not* errors; the setters
//! ignore them.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, ShadowError>`.
//!
//! ```rust,ignore
//! use async_shadow::errors::Result;
//!
//! fn setup(plugin: &mut ShadowPlugin, target: wgpu::Texture) -> Result<()> {
//!     plugin.create_resources()?;
//!     plugin.set_shadow_texture_data(Some(target))
//! }
//! ```

use thiserror::Error;

/// The main error type for the shadow plugin.
#[derive(Error, Debug)]
pub enum ShadowError {
    // ========================================================================
    // Device Errors
    // ========================================================================
    /// No device has been attached, or `check_device` has not run yet.
    #[error("Graphics device is not ready")]
    DeviceNotReady,

    /// The device lacks features the shadow pass depends on.
    #[error("Device is missing required features: {0:?}")]
    MissingFeatures(wgpu::Features),

    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Blocking on a submission failed.
    #[error("Device poll failed: {0}")]
    DevicePoll(String),

    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// `create_resources` has not been called (or resources were released).
    #[error("Shadow resources have not been created")]
    NotConfigured,

    /// Constant buffers cannot be sized for an empty mesh set.
    #[error("No meshes registered; constant buffers cannot be created")]
    NoMeshes,

    /// Rendering was requested before the shadow target was set up.
    #[error("Shadow pass setup is incomplete: {0}")]
    SetupIncomplete(&'static str),

    /// Meshes can no longer be added once constant buffers are sized.
    #[error("Mesh set is sealed; add meshes before setting the shadow target")]
    MeshSetSealed,

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// A required handle was not supplied.
    #[error("Null handle: {0}")]
    NullHandle(&'static str),

    /// A supplied resource cannot be used the way the pass needs.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Threading Errors
    // ========================================================================
    /// The worker thread could not be started.
    #[error("Failed to spawn shadow worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The worker thread is gone; requests can no longer be delivered.
    #[error("Shadow worker disconnected")]
    WorkerDisconnected,
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<wgpu::PollError> for ShadowError {
    fn from(err: wgpu::PollError) -> Self {
        ShadowError::DevicePoll(err.to_string())
    }
}

/// Alias for `Result<T, ShadowError>`.
pub type Result<T> = std::result::Result<T, ShadowError>;
