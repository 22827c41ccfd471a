//! Warping functions and discrete distributions used by the samplers.
//!
//! Every function maps uniform random numbers in `[0, 1)` to a sample; the
//! matching `*_pdf` function returns the density of that sample.

use std::f32::consts::PI;

use crate::{basis_fromz, Vec2, Vec3};

/// Cosine-weighted direction on the hemisphere around `normal`.
pub fn sample_hemisphere_cos(normal: Vec3, ruv: Vec2) -> Vec3 {
    let z = ruv.y.sqrt();
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * ruv.x;
    let local = Vec3::new(r * phi.cos(), r * phi.sin(), z);
    basis_fromz(normal) * local
}

pub fn sample_hemisphere_cos_pdf(normal: Vec3, direction: Vec3) -> f32 {
    let cosw = normal.dot(direction);
    if cosw <= 0.0 {
        0.0
    } else {
        cosw / PI
    }
}

/// Uniform direction on the unit sphere.
pub fn sample_sphere(ruv: Vec2) -> Vec3 {
    let z = 2.0 * ruv.y - 1.0;
    let r = (1.0 - z * z).clamp(0.0, 1.0).sqrt();
    let phi = 2.0 * PI * ruv.x;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn sample_sphere_pdf() -> f32 {
    1.0 / (4.0 * PI)
}

/// Uniform point on the unit disk, returned as (x, y).
pub fn sample_disk(ruv: Vec2) -> Vec2 {
    let r = ruv.y.sqrt();
    let phi = 2.0 * PI * ruv.x;
    Vec2::new(phi.cos() * r, phi.sin() * r)
}

/// Uniform barycentric coordinates on a triangle.
pub fn sample_triangle(ruv: Vec2) -> Vec2 {
    let su = ruv.x.sqrt();
    Vec2::new(1.0 - su, ruv.y * su)
}

/// Uniform index in `0..size`.
pub fn sample_uniform(size: usize, r: f32) -> usize {
    ((r * size as f32) as usize).min(size.saturating_sub(1))
}

pub fn sample_uniform_pdf(size: usize) -> f32 {
    1.0 / size as f32
}

/// Pick an index from an unnormalized cumulative distribution.
///
/// `cdf` must be non-decreasing and non-empty; its last entry is the total.
pub fn sample_discrete(cdf: &[f32], r: f32) -> usize {
    let total = cdf[cdf.len() - 1];
    let target = (r * total).max(0.0);
    // the last element with positive weight
    let last = cdf.partition_point(|&c| c < total);
    cdf.partition_point(|&c| c <= target).min(last)
}

/// Unnormalized probability mass of `idx` in `cdf`.
pub fn sample_discrete_pdf(cdf: &[f32], idx: usize) -> f32 {
    if idx == 0 {
        cdf[0]
    } else {
        cdf[idx] - cdf[idx - 1]
    }
}
