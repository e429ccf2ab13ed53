//! Math primitives shared across the pipeline.
//!
//! All vector and matrix arithmetic is delegated to nalgebra; this module
//! pins the concrete single-precision types the renderer works in and adds
//! the handful of matrix constructors the pipeline keeps reaching for.

use nalgebra::{Matrix3, Matrix4, Point3 as NPoint3, Vector2, Vector3, Vector4};

pub type Vec2 = Vector2<f32>;
pub type Vec3 = Vector3<f32>;
pub type Vec4 = Vector4<f32>;

pub type Mat3 = Matrix3<f32>;
pub type Mat4 = Matrix4<f32>;

/// Translation matrix
#[inline]
pub fn translate(v: Vec3) -> Mat4 {
    Mat4::new_translation(&v)
}

/// Non-uniform scaling matrix
#[inline]
pub fn scale(v: Vec3) -> Mat4 {
    Mat4::new_nonuniform_scaling(&v)
}

/// Uniform scaling matrix
#[inline]
pub fn scale_uniform(s: f32) -> Mat4 {
    Mat4::new_scaling(s)
}

/// Rotation about the x axis
#[inline]
pub fn rotate_x(radians: f32) -> Mat4 {
    Mat4::new_rotation(Vec3::x() * radians)
}

/// Rotation about the y axis
#[inline]
pub fn rotate_y(radians: f32) -> Mat4 {
    Mat4::new_rotation(Vec3::y() * radians)
}

/// Rotation about the z axis
#[inline]
pub fn rotate_z(radians: f32) -> Mat4 {
    Mat4::new_rotation(Vec3::z() * radians)
}

/// Right-handed look-at view matrix
#[inline]
pub fn look_at(eye: Vec3, center: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&NPoint3::from(eye), &NPoint3::from(center), &up)
}

/// Right-handed perspective projection with z mapped to [-1, 1]
#[inline]
pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_perspective(aspect, fovy, near, far)
}

/// Right-handed orthographic projection with z mapped to [-1, 1]
#[inline]
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_orthographic(left, right, bottom, top, near, far)
}
