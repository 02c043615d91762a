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

//! World-space affine transforms and their decomposition.

use super::{Mat4, Vec3, DEG_TO_RAD};

/// Threshold under which the cosine of the Y angle is treated as zero
/// (gimbal lock) during decomposition.
const GIMBAL_EPSILON: f64 = 1e-8;

/// A 3D affine transformation (translation, rotation, scale).
///
/// Semantic wrapper around a [`Mat4`]. Rotations compose as
/// `Rz * Ry * Rx`, which is the convention the instance shaders use to
/// rebuild the model matrix from the Euler angles stored in instance records.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(transparent)]
pub struct AffineTransform(pub Mat4);

impl AffineTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    /// A pure translation.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self(Mat4::from_translation(v))
    }

    /// A pure non-uniform scale.
    #[inline]
    pub fn from_scale(s: Vec3) -> Self {
        Self(Mat4::from_scale(s))
    }

    /// Builds `translation * rotation * scale` from an Euler rotation in
    /// degrees, the inverse of the decomposition accessors below.
    ///
    /// # Example
    ///
    /// ```rust
    /// use nitro_core::math::{AffineTransform, Vec3};
    ///
    /// let t = AffineTransform::from_trs_degrees(
    ///     Vec3::new(1.0, 2.0, 3.0),
    ///     Vec3::new(0.0, 90.0, 0.0),
    ///     Vec3::ONE,
    /// );
    /// assert_eq!(t.translation(), Vec3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn from_trs_degrees(translation: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Self {
        let rotation = Mat4::from_rotation_z(rotation_degrees.z * DEG_TO_RAD)
            * Mat4::from_rotation_y(rotation_degrees.y * DEG_TO_RAD)
            * Mat4::from_rotation_x(rotation_degrees.x * DEG_TO_RAD);
        Self(Mat4::from_translation(translation) * rotation * Mat4::from_scale(scale))
    }

    /// The underlying matrix.
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        self.0
    }

    /// The translation part.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.0.cols[3].truncate()
    }

    /// The scale part: the length of each basis column.
    #[inline]
    pub fn scale(&self) -> Vec3 {
        Vec3::new(
            self.0.cols[0].truncate().length(),
            self.0.cols[1].truncate().length(),
            self.0.cols[2].truncate().length(),
        )
    }

    /// The rotation part as Euler angles in degrees, each in `[0, 360)`.
    ///
    /// The basis is normalized by the scale first. When the Y angle sits at
    /// +/-90 degrees the X angle is folded into Z.
    pub fn rotation_degrees(&self) -> Vec3 {
        let scale = self.scale();
        let inv = |s: f32| if s == 0.0 { 0.0 } else { 1.0 / f64::from(s) };
        let (inv_x, inv_y, inv_z) = (inv(scale.x), inv(scale.y), inv(scale.z));
        let c0 = self.0.cols[0];
        let c1 = self.0.cols[1];
        let c2 = self.0.cols[2];

        let sin_y = (-f64::from(c0.z) * inv_x).clamp(-1.0, 1.0);
        let y = sin_y.asin();
        let cos_y = y.cos();

        let (x, z) = if cos_y.abs() > GIMBAL_EPSILON {
            let inv_c = 1.0 / cos_y;
            let x = (f64::from(c1.z) * inv_c * inv_y).atan2(f64::from(c2.z) * inv_c * inv_z);
            let z = (f64::from(c0.y) * inv_c * inv_x).atan2(f64::from(c0.x) * inv_c * inv_x);
            (x, z)
        } else {
            let z = (-f64::from(c1.x) * inv_y).atan2(f64::from(c1.y) * inv_y);
            (0.0, z)
        };

        Vec3::new(
            wrap_degrees(x.to_degrees()),
            wrap_degrees(y.to_degrees()),
            wrap_degrees(z.to_degrees()),
        )
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Mat4> for AffineTransform {
    fn from(m: Mat4) -> Self {
        Self(m)
    }
}

fn wrap_degrees(angle: f64) -> f32 {
    let wrapped = angle.rem_euclid(360.0) as f32;
    // Tiny negative inputs round up to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_near(actual: Vec3, expected: Vec3) {
        assert_relative_eq!(actual.x, expected.x, epsilon = 1e-3);
        assert_relative_eq!(actual.y, expected.y, epsilon = 1e-3);
        assert_relative_eq!(actual.z, expected.z, epsilon = 1e-3);
    }

    #[test]
    fn test_identity_decomposes_to_zero() {
        let t = AffineTransform::IDENTITY;
        assert_eq!(t.translation(), Vec3::ZERO);
        assert_vec3_near(t.scale(), Vec3::ONE);
        assert_vec3_near(t.rotation_degrees(), Vec3::ZERO);
    }

    #[test]
    fn test_single_axis_rotations() {
        for (axis, expected) in [
            (Vec3::new(45.0, 0.0, 0.0), Vec3::new(45.0, 0.0, 0.0)),
            (Vec3::new(0.0, 30.0, 0.0), Vec3::new(0.0, 30.0, 0.0)),
            (Vec3::new(0.0, 0.0, 120.0), Vec3::new(0.0, 0.0, 120.0)),
        ] {
            let t = AffineTransform::from_trs_degrees(Vec3::ZERO, axis, Vec3::ONE);
            assert_vec3_near(t.rotation_degrees(), expected);
        }
    }

    #[test]
    fn test_negative_angles_wrap_into_positive_range() {
        let t = AffineTransform::from_trs_degrees(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -30.0),
            Vec3::ONE,
        );
        assert_vec3_near(t.rotation_degrees(), Vec3::new(0.0, 0.0, 330.0));
    }

    #[test]
    fn test_combined_rotation_round_trips() {
        let euler = Vec3::new(10.0, 20.0, 30.0);
        let t = AffineTransform::from_trs_degrees(Vec3::ZERO, euler, Vec3::ONE);
        assert_vec3_near(t.rotation_degrees(), euler);
    }

    #[test]
    fn test_scale_does_not_leak_into_rotation() {
        let t = AffineTransform::from_trs_degrees(
            Vec3::new(-4.0, 0.5, 12.0),
            Vec3::new(0.0, 0.0, 60.0),
            Vec3::new(2.0, 3.0, 0.5),
        );
        assert_vec3_near(t.translation(), Vec3::new(-4.0, 0.5, 12.0));
        assert_vec3_near(t.scale(), Vec3::new(2.0, 3.0, 0.5));
        assert_vec3_near(t.rotation_degrees(), Vec3::new(0.0, 0.0, 60.0));
    }

    #[test]
    fn test_gimbal_lock_keeps_y_angle() {
        let t = AffineTransform::from_trs_degrees(
            Vec3::ZERO,
            Vec3::new(0.0, 90.0, 0.0),
            Vec3::ONE,
        );
        let r = t.rotation_degrees();
        assert_relative_eq!(r.y, 90.0, epsilon = 1e-3);
        assert_relative_eq!(r.x, 0.0, epsilon = 1e-3);
    }
}
