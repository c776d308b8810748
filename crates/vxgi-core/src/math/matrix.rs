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

//! Provides the column-major 4x4 matrix used for voxel projections.

use super::vector::{Vec3, Vec4};
use std::ops::Mul;

/// A 4x4 column-major matrix, used for 3D affine transformations and projections.
///
/// The memory layout is column-major, which is what WGSL expects for
/// `mat4x4<f32>` uniforms, so the matrix can be uploaded with
/// [`Mat4::to_cols_array_2d`] without transposition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, v.extend(1.0))
    }

    /// Creates a non-uniform scale matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::W,
        )
    }

    /// Creates a right-handed perspective projection matrix with a [0, 1] depth range (ZO).
    ///
    /// Requires `0 < z_near < z_far`; callers clamp their inputs.
    #[inline]
    pub fn perspective_rh_zo(
        fov_y_radians: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let f = 1.0 / (fov_y_radians / 2.0).tan();
        let cc = z_far / (z_near - z_far);
        let dd = (z_near * z_far) / (z_near - z_far);

        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, cc, -1.0),
            Vec4::new(0.0, 0.0, dd, 0.0),
        )
    }

    /// Creates a right-handed orthographic projection matrix with a [0, 1] depth range (ZO).
    ///
    /// View-space `z = -z_near` maps to depth 0 and `z = -z_far` to depth 1.
    #[inline]
    pub fn orthographic_rh_zo(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let rml = right - left;
        let tmb = top - bottom;
        let fmn = z_far - z_near;

        Self::from_cols(
            Vec4::new(2.0 / rml, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / tmb, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -1.0 / fmn, 0.0),
            Vec4::new(
                -(right + left) / rml,
                -(top + bottom) / tmb,
                -z_near / fmn,
                1.0,
            ),
        )
    }

    /// Creates a right-handed view matrix for a camera looking from `eye` towards `target`.
    ///
    /// Returns `None` if `eye` and `target` coincide or `up` is parallel to the
    /// view direction.
    #[inline]
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let eps_sq = super::EPSILON * super::EPSILON;
        let forward = target - eye;
        if forward.length_squared() < eps_sq {
            return None;
        }
        let f = forward.normalize();
        let s = f.cross(up);
        if s.length_squared() < eps_sq {
            return None;
        }
        let s = s.normalize();
        let u = s.cross(f);

        Some(Self::from_cols(
            Vec4::new(s.x, u.x, -f.x, 0.0),
            Vec4::new(s.y, u.y, -f.y, 0.0),
            Vec4::new(s.z, u.z, -f.z, 0.0),
            Vec4::new(-eye.dot(s), -eye.dot(u), eye.dot(f), 1.0),
        ))
    }

    /// Returns the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(
            self.get_row(0),
            self.get_row(1),
            self.get_row(2),
            self.get_row(3),
        )
    }

    /// Computes the inverse of the matrix with Gauss-Jordan elimination.
    ///
    /// Returns `None` if the matrix is singular. The singularity test is
    /// relative to the largest pivot, so well-conditioned matrices with small
    /// absolute entries (e.g. an orthographic projection over a large scene)
    /// still invert.
    pub fn inverse(&self) -> Option<Self> {
        let mut a = self.transpose().to_cols_array_2d(); // rows of `self`
        let mut inv = Self::IDENTITY.to_cols_array_2d();
        let scale = a
            .iter()
            .flat_map(|row| row.iter())
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        if scale == 0.0 || !scale.is_finite() {
            return None;
        }

        for col in 0..4 {
            let pivot_row = (col..4)
                .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
                .unwrap_or(col);
            if a[pivot_row][col].abs() <= scale * 1e-7 {
                return None;
            }
            a.swap(col, pivot_row);
            inv.swap(col, pivot_row);

            let p = 1.0 / a[col][col];
            for k in 0..4 {
                a[col][k] *= p;
                inv[col][k] *= p;
            }
            for row in 0..4 {
                if row == col {
                    continue;
                }
                let factor = a[row][col];
                if factor == 0.0 {
                    continue;
                }
                for k in 0..4 {
                    a[row][k] -= factor * a[col][k];
                    inv[row][k] -= factor * inv[col][k];
                }
            }
        }

        // `inv` holds rows; transpose back into columns.
        let rows = inv.map(|r| Vec4::new(r[0], r[1], r[2], r[3]));
        Some(Self::from_cols(rows[0], rows[1], rows[2], rows[3]).transpose())
    }

    /// Transforms a point (w = 1) and applies the perspective divide.
    #[inline]
    pub fn project_point3(&self, p: Vec3) -> Vec3 {
        (*self * p.extend(1.0)).project()
    }

    /// Transforms a point (w = 1) ignoring the resulting `w`.
    ///
    /// Suitable for affine matrices such as model transforms.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        (*self * p.extend(1.0)).truncate()
    }

    /// Returns the matrix as a column-major 2D array, ready for GPU upload.
    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        self.cols.map(|c| [c.x, c.y, c.z, c.w])
    }

    /// Returns `true` if every element is finite.
    pub fn is_finite(&self) -> bool {
        self.cols
            .iter()
            .all(|c| c.x.is_finite() && c.y.is_finite() && c.z.is_finite() && c.w.is_finite())
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    /// Multiplies this matrix by another `Mat4`. Note that matrix multiplication is not commutative.
    #[inline]
    fn mul(self, rhs: Mat4) -> Self::Output {
        Self {
            cols: rhs.cols.map(|c| self * c),
        }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    /// Transforms a `Vec4` by this matrix.
    #[inline]
    fn mul(self, rhs: Vec4) -> Self::Output {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_near(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn test_mat4_identity_default() {
        assert_eq!(Mat4::default(), Mat4::IDENTITY);
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m * Mat4::IDENTITY, m);
        assert_eq!(Mat4::IDENTITY * m, m);
    }

    #[test]
    fn test_mat4_translation_and_scale_compose() {
        let m = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0));
        assert_vec3_near(m.transform_point3(Vec3::ONE), Vec3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn test_perspective_depth_range() {
        let m = Mat4::perspective_rh_zo(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 10.0);
        assert_relative_eq!(m.project_point3(Vec3::new(0.0, 0.0, -1.0)).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(m.project_point3(Vec3::new(0.0, 0.0, -10.0)).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mat4_inverse_round_trip() {
        let m = Mat4::from_translation(Vec3::new(4.0, -2.0, 7.0))
            * Mat4::from_scale(Vec3::new(2.0, 0.5, 3.0));
        let inv = m.inverse().expect("invertible");
        let p = Vec3::new(0.3, -1.2, 5.0);
        assert_vec3_near(inv.transform_point3(m.transform_point3(p)), p);
    }

    #[test]
    fn test_mat4_inverse_of_singular_is_none() {
        let m = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(m.inverse().is_none());
    }

    #[test]
    fn test_mat4_inverse_of_large_orthographic() {
        // Tiny absolute entries (2 / 4000) must not be treated as singular.
        let m = Mat4::orthographic_rh_zo(-2000.0, 2000.0, -2000.0, 2000.0, 0.0, 4000.0);
        let inv = m.inverse().expect("well-conditioned");
        let p = Vec3::new(1500.0, -700.0, -3000.0);
        assert_vec3_near(inv.project_point3(m.project_point3(p)), p);
    }

    #[test]
    fn test_orthographic_depth_range_is_zero_to_one() {
        let m = Mat4::orthographic_rh_zo(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0);
        assert_relative_eq!(m.project_point3(Vec3::new(0.0, 0.0, 0.0)).z, 0.0);
        assert_relative_eq!(m.project_point3(Vec3::new(0.0, 0.0, -10.0)).z, 1.0);
        assert_relative_eq!(m.project_point3(Vec3::new(1.0, -1.0, -5.0)).x, 1.0);
    }

    #[test]
    fn test_look_at_rejects_parallel_up() {
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::Y, Vec3::Y).is_none());
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::ZERO, Vec3::Y).is_none());
        let view = Mat4::look_at_rh(Vec3::ZERO, -Vec3::Z, Vec3::Y).expect("valid");
        assert_vec3_near(view.transform_point3(Vec3::new(0.0, 0.0, -3.0)), Vec3::new(0.0, 0.0, -3.0));
    }
}
