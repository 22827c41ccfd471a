//! Fresnel terms and the GGX microfacet distribution.

use std::f32::consts::PI;

use lumen_math::{basis_fromz, Vec2, Vec3};

/// Unpolarized Fresnel reflectance of a dielectric with relative index `eta`.
pub fn fresnel_dielectric(eta: f32, normal: Vec3, outgoing: Vec3) -> f32 {
    let cosw = normal.dot(outgoing).abs();

    let sin2 = 1.0 - cosw * cosw;
    let eta2 = eta * eta;

    let cos2t = 1.0 - sin2 / eta2;
    // total internal reflection
    if cos2t < 0.0 {
        return 1.0;
    }

    let t0 = cos2t.sqrt();
    let t1 = eta * t0;
    let t2 = eta * cosw;

    let rs = (cosw - t1) / (cosw + t1);
    let rp = (t0 - t2) / (t0 + t2);

    (rs * rs + rp * rp) / 2.0
}

/// Schlick approximation with per-channel reflectance at normal incidence.
pub fn fresnel_schlick(specular: Vec3, normal: Vec3, outgoing: Vec3) -> Vec3 {
    if specular == Vec3::ZERO {
        return Vec3::ZERO;
    }
    let cosine = normal.dot(outgoing).abs();
    specular + (Vec3::ONE - specular) * (1.0 - cosine).clamp(0.0, 1.0).powi(5)
}

/// GGX normal distribution.
pub fn microfacet_distribution(roughness: f32, normal: Vec3, halfway: Vec3) -> f32 {
    let cosine = normal.dot(halfway);
    if cosine <= 0.0 {
        return 0.0;
    }
    let roughness2 = roughness * roughness;
    let cosine2 = cosine * cosine;
    let denom = cosine2 * roughness2 + 1.0 - cosine2;
    roughness2 / (PI * denom * denom)
}

/// Smith masking for one direction.
pub fn microfacet_shadowing1(roughness: f32, normal: Vec3, halfway: Vec3, direction: Vec3) -> f32 {
    let cosine = normal.dot(direction);
    let cosineh = halfway.dot(direction);
    if cosine * cosineh <= 0.0 {
        return 0.0;
    }
    let roughness2 = roughness * roughness;
    let cosine2 = cosine * cosine;
    2.0 * cosine.abs() / (cosine.abs() + (cosine2 - roughness2 * cosine2 + roughness2).sqrt())
}

/// Separable Smith masking-shadowing.
pub fn microfacet_shadowing(
    roughness: f32,
    normal: Vec3,
    halfway: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> f32 {
    microfacet_shadowing1(roughness, normal, halfway, outgoing)
        * microfacet_shadowing1(roughness, normal, halfway, incoming)
}

/// Sample a microfacet normal proportionally to `D(h) * cos(h)`.
pub fn sample_microfacet(roughness: f32, normal: Vec3, rn: Vec2) -> Vec3 {
    let phi = 2.0 * PI * rn.x;
    let theta = (roughness * (rn.y / (1.0 - rn.y)).sqrt()).atan();
    let local = Vec3::new(phi.cos() * theta.sin(), phi.sin() * theta.sin(), theta.cos());
    basis_fromz(normal) * local
}

pub fn sample_microfacet_pdf(roughness: f32, normal: Vec3, halfway: Vec3) -> f32 {
    let cosine = normal.dot(halfway);
    if cosine < 0.0 {
        return 0.0;
    }
    microfacet_distribution(roughness, normal, halfway) * cosine
}
