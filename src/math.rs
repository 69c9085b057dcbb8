//! Shadow Transform Utilities
//!
//! Pure math used by the host-facing setters:
//! - Object world matrices from position / scale / rotation
//! - Directional light view-projection bounding a sphere around the world origin
//! - Conversion to the host's row-major flat layout
//!
//! All matrices use glam's column-vector convention and a left-handed,
//! depth-[0, 1] clip space.

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// Object Transforms
// ============================================================================

/// Composes scale, then rotation, then translation.
///
/// `rotation` is `[x, y, z, w]` and must be unit length.
#[inline]
#[must_use]
pub fn object_world_matrix(position: [f32; 3], scale: [f32; 3], rotation: [f32; 4]) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        Vec3::from_array(scale),
        Quat::from_array(rotation),
        Vec3::from_array(position),
    )
}

// ============================================================================
// Light Transforms
// ============================================================================

/// Picks an up vector that is not parallel to `dir`.
#[inline]
fn light_up(dir: Vec3) -> Vec3 {
    if dir.y.abs() > 0.99 { Vec3::X } else { Vec3::Y }
}

/// Left-handed view matrix looking from `position` along `direction`.
#[must_use]
pub fn light_view(position: Vec3, direction: Vec3) -> Mat4 {
    let dir = direction.normalize_or(Vec3::Z);
    Mat4::look_at_lh(position, position + dir, light_up(dir))
}

/// Builds the light view-projection for a shadow sphere of `radius`.
///
/// The world origin is mapped into light space; the orthographic box is the
/// axis-aligned bound of the sphere around that point. The origin therefore
/// always lands at clip `(0, 0, 0.5)`.
#[must_use]
pub fn light_view_projection(position: Vec3, direction: Vec3, radius: f32) -> Mat4 {
    let view = light_view(position, direction);
    let center = view.transform_point3(Vec3::ZERO);

    let proj = Mat4::orthographic_lh(
        center.x - radius,
        center.x + radius,
        center.y - radius,
        center.y + radius,
        center.z - radius,
        center.z + radius,
    );

    proj * view
}

// ============================================================================
// Host Layout
// ============================================================================

/// Flattens `m` row by row (`m[row][col]` at `row * 4 + col`).
#[inline]
#[must_use]
pub fn to_row_major(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}
