//! Local frames and direction helpers shared by the shading code.

use crate::{Affine3A, Mat3, Vec3};

/// Build an orthonormal basis whose third column is `v`.
///
/// Branchless construction from Duff et al. 2017, "Building an Orthonormal
/// Basis, Revisited".
pub fn basis_fromz(v: Vec3) -> Mat3 {
    let z = v.normalize();
    let sign = 1.0f32.copysign(z.z);
    let a = -1.0 / (sign + z.z);
    let b = z.x * z.y * a;
    let x = Vec3::new(1.0 + sign * z.x * z.x * a, sign * b, -sign * z.x);
    let y = Vec3::new(b, sign + z.y * z.y * a, -z.y);
    Mat3::from_cols(x, y, z)
}

/// Mirror `w` (pointing away from the surface) about `n`.
#[inline]
pub fn reflect(w: Vec3, n: Vec3) -> Vec3 {
    -w + 2.0 * n.dot(w) * n
}

/// Refract `w` (pointing away from the surface) through `n`.
///
/// `inv_eta` is the ratio of the incident to the transmitted index. Returns
/// the zero vector on total internal reflection.
#[inline]
pub fn refract(w: Vec3, n: Vec3, inv_eta: f32) -> Vec3 {
    let cosine = n.dot(w);
    let k = 1.0 + inv_eta * inv_eta * (cosine * cosine - 1.0);
    if k < 0.0 {
        return Vec3::ZERO;
    }
    -w * inv_eta + (inv_eta * cosine - k.sqrt()) * n
}

/// Transform a normal by the inverse transpose of the frame's linear part.
#[inline]
pub fn transform_normal(frame: &Affine3A, n: Vec3) -> Vec3 {
    let linear = Mat3::from(frame.matrix3);
    (linear.inverse().transpose() * n).normalize()
}
