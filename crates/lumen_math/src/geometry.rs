//! Triangle and quad helpers: areas, normals and parametric interpolation.
//!
//! Quads are stored as four vertex indices; a quad whose last two indices
//! coincide is a triangle. Quad parametrization follows the split into
//! triangles (p0, p1, p3) and (p2, p3, p1).

use std::ops::{Add, Mul, Sub};

use crate::Vec3;

pub fn triangle_area(p0: Vec3, p1: Vec3, p2: Vec3) -> f32 {
    (p1 - p0).cross(p2 - p0).length() / 2.0
}

pub fn quad_area(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> f32 {
    triangle_area(p0, p1, p3) + triangle_area(p2, p3, p1)
}

pub fn triangle_normal(p0: Vec3, p1: Vec3, p2: Vec3) -> Vec3 {
    (p1 - p0).cross(p2 - p0).normalize()
}

pub fn quad_normal(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Vec3 {
    (triangle_normal(p0, p1, p3) + triangle_normal(p2, p3, p1)).normalize()
}

/// Barycentric interpolation; `u` weights `p1` and `v` weights `p2`.
pub fn interpolate_triangle<T>(p0: T, p1: T, p2: T, u: f32, v: f32) -> T
where
    T: Copy + Add<Output = T> + Mul<f32, Output = T>,
{
    p0 * (1.0 - u - v) + p1 * u + p2 * v
}

/// Interpolation over a quad in the two-triangle parametrization.
pub fn interpolate_quad<T>(p0: T, p1: T, p2: T, p3: T, u: f32, v: f32) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>,
{
    if u + v <= 1.0 {
        interpolate_triangle(p0, p1, p3, u, v)
    } else {
        interpolate_triangle(p2, p3, p1, 1.0 - u, 1.0 - v)
    }
}
