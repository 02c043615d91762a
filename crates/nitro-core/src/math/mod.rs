// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Math primitives used by the instanced renderer.
//!
//! Only what the renderer needs lives here: small vectors, a column-major
//! 4x4 matrix, an affine transform wrapper able to decompose itself into
//! origin / Euler orientation / scale, and the color types used for glow.
//!
//! Angular functions operate in **radians**, except the orientation produced
//! by [`AffineTransform::rotation_degrees`], which is in degrees because that
//! is the unit the instance shaders consume.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// The factor to convert degrees to radians (PI / 180.0).
pub const DEG_TO_RAD: f32 = PI / 180.0;
/// The factor to convert radians to degrees (180.0 / PI).
pub const RAD_TO_DEG: f32 = 180.0 / PI;

pub mod affine_transform;
pub mod color;
pub mod matrix;
pub mod vector;

pub use self::affine_transform::AffineTransform;
pub use self::color::{LinearRgba, Rgba8};
pub use self::matrix::Mat4;
pub use self::vector::{Vec3, Vec4};

/// Converts an angle from degrees to radians.
///
/// ```
/// use nitro_core::math::{degrees_to_radians, PI};
/// assert_eq!(degrees_to_radians(180.0), PI);
/// ```
#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * DEG_TO_RAD
}

/// Converts an angle from radians to degrees.
#[inline]
pub fn radians_to_degrees(radians: f32) -> f32 {
    radians * RAD_TO_DEG
}
