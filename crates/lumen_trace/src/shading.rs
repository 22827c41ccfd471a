//! Scattering lobes.
//!
//! Every `eval_*` returns the BSDF multiplied by the cosine with the incoming
//! direction. Directions point away from the surface. `sample_*` returns the
//! zero vector when the sample is rejected; `rnl` picks between lobes and
//! `rn` drives the warp of the chosen lobe.

use std::f32::consts::PI;

use lumen_math::sampling::{sample_hemisphere_cos, sample_hemisphere_cos_pdf};
use lumen_math::{mean, reflect, refract, Vec2, Vec3};

use crate::microfacet::{
    fresnel_dielectric, fresnel_schlick, microfacet_distribution, microfacet_shadowing,
    sample_microfacet, sample_microfacet_pdf,
};

/// Below this distance from one, an index of refraction is a pass-through.
const IOR_EPS: f32 = 1e-3;

#[inline]
fn same_hemisphere(normal: Vec3, outgoing: Vec3, incoming: Vec3) -> bool {
    normal.dot(outgoing) * normal.dot(incoming) >= 0.0
}

#[inline]
fn facing(normal: Vec3, outgoing: Vec3) -> Vec3 {
    if normal.dot(outgoing) <= 0.0 {
        -normal
    } else {
        normal
    }
}

/// Cook-Torrance reflection term without Fresnel, times the cosine.
#[inline]
fn microfacet_reflection(roughness: f32, up: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    let halfway = (incoming + outgoing).normalize();
    let d = microfacet_distribution(roughness, up, halfway);
    let g = microfacet_shadowing(roughness, up, halfway, outgoing, incoming);
    d * g / (4.0 * up.dot(outgoing) * up.dot(incoming)) * up.dot(incoming).abs()
}

#[inline]
fn reflection_pdf(roughness: f32, up: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    let halfway = (outgoing + incoming).normalize();
    sample_microfacet_pdf(roughness, up, halfway) / (4.0 * outgoing.dot(halfway).abs())
}

#[inline]
fn sample_reflection(roughness: f32, up: Vec3, outgoing: Vec3, rn: Vec2) -> Vec3 {
    let halfway = sample_microfacet(roughness, up, rn);
    let incoming = reflect(outgoing, halfway);
    if !same_hemisphere(up, outgoing, incoming) {
        return Vec3::ZERO;
    }
    incoming
}

// ============================================================================
// Matte
// ============================================================================

pub fn eval_matte(color: Vec3, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return Vec3::ZERO;
    }
    color / PI * normal.dot(incoming).abs()
}

pub fn sample_matte(normal: Vec3, outgoing: Vec3, rn: Vec2) -> Vec3 {
    sample_hemisphere_cos(facing(normal, outgoing), rn)
}

pub fn sample_matte_pdf(normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return 0.0;
    }
    sample_hemisphere_cos_pdf(facing(normal, outgoing), incoming)
}

// ============================================================================
// Glossy (diffuse base under a dielectric coat)
// ============================================================================

pub fn eval_glossy(
    color: Vec3,
    ior: f32,
    roughness: f32,
    normal: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> Vec3 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return Vec3::ZERO;
    }
    let up = facing(normal, outgoing);
    let f1 = fresnel_dielectric(ior, up, outgoing);
    let halfway = (incoming + outgoing).normalize();
    let f = fresnel_dielectric(ior, halfway, incoming);
    color * (1.0 - f1) / PI * up.dot(incoming).abs()
        + Vec3::splat(f * microfacet_reflection(roughness, up, outgoing, incoming))
}

pub fn sample_glossy(ior: f32, roughness: f32, normal: Vec3, outgoing: Vec3, rnl: f32, rn: Vec2) -> Vec3 {
    let up = facing(normal, outgoing);
    if rnl < fresnel_dielectric(ior, up, outgoing) {
        sample_reflection(roughness, up, outgoing, rn)
    } else {
        sample_hemisphere_cos(up, rn)
    }
}

pub fn sample_glossy_pdf(ior: f32, roughness: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return 0.0;
    }
    let up = facing(normal, outgoing);
    let f = fresnel_dielectric(ior, up, outgoing);
    f * reflection_pdf(roughness, up, outgoing, incoming)
        + (1.0 - f) * sample_hemisphere_cos_pdf(up, incoming)
}

// ============================================================================
// Reflective (conductor)
// ============================================================================

pub fn eval_reflective(color: Vec3, roughness: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return Vec3::ZERO;
    }
    let up = facing(normal, outgoing);
    let halfway = (incoming + outgoing).normalize();
    fresnel_schlick(color, halfway, incoming) * microfacet_reflection(roughness, up, outgoing, incoming)
}

pub fn sample_reflective(roughness: f32, normal: Vec3, outgoing: Vec3, rn: Vec2) -> Vec3 {
    sample_reflection(roughness, facing(normal, outgoing), outgoing, rn)
}

pub fn sample_reflective_pdf(roughness: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return 0.0;
    }
    reflection_pdf(roughness, facing(normal, outgoing), outgoing, incoming)
}

pub fn eval_reflective_delta(color: Vec3, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return Vec3::ZERO;
    }
    fresnel_schlick(color, facing(normal, outgoing), outgoing)
}

pub fn sample_reflective_delta(normal: Vec3, outgoing: Vec3) -> Vec3 {
    reflect(outgoing, facing(normal, outgoing))
}

pub fn sample_reflective_delta_pdf(normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return 0.0;
    }
    1.0
}

// ============================================================================
// Transparent (thin dielectric sheet)
// ============================================================================

pub fn eval_transparent(
    color: Vec3,
    ior: f32,
    roughness: f32,
    normal: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> Vec3 {
    let up = facing(normal, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        let halfway = (incoming + outgoing).normalize();
        let f = fresnel_dielectric(ior, halfway, outgoing);
        Vec3::splat(f * microfacet_reflection(roughness, up, outgoing, incoming))
    } else {
        // mirror the incoming direction back through the sheet
        let reflected = reflect(-incoming, up);
        let halfway = (reflected + outgoing).normalize();
        let f = fresnel_dielectric(ior, halfway, outgoing);
        color * (1.0 - f) * microfacet_reflection(roughness, up, outgoing, reflected)
    }
}

pub fn sample_transparent(
    ior: f32,
    roughness: f32,
    normal: Vec3,
    outgoing: Vec3,
    rnl: f32,
    rn: Vec2,
) -> Vec3 {
    let up = facing(normal, outgoing);
    let halfway = sample_microfacet(roughness, up, rn);
    if rnl < fresnel_dielectric(ior, halfway, outgoing) {
        let incoming = reflect(outgoing, halfway);
        if !same_hemisphere(up, outgoing, incoming) {
            return Vec3::ZERO;
        }
        incoming
    } else {
        let reflected = reflect(outgoing, halfway);
        let incoming = -reflect(reflected, up);
        if same_hemisphere(up, outgoing, incoming) {
            return Vec3::ZERO;
        }
        incoming
    }
}

pub fn sample_transparent_pdf(ior: f32, roughness: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    let up = facing(normal, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        let halfway = (incoming + outgoing).normalize();
        fresnel_dielectric(ior, halfway, outgoing) * reflection_pdf(roughness, up, outgoing, incoming)
    } else {
        let reflected = reflect(-incoming, up);
        let halfway = (reflected + outgoing).normalize();
        let f = fresnel_dielectric(ior, halfway, outgoing);
        (1.0 - f) * reflection_pdf(roughness, up, outgoing, reflected)
    }
}

pub fn eval_transparent_delta(color: Vec3, ior: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    let up = facing(normal, outgoing);
    let f = fresnel_dielectric(ior, up, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        Vec3::splat(f)
    } else {
        color * (1.0 - f)
    }
}

pub fn sample_transparent_delta(ior: f32, normal: Vec3, outgoing: Vec3, rnl: f32) -> Vec3 {
    let up = facing(normal, outgoing);
    if rnl < fresnel_dielectric(ior, up, outgoing) {
        reflect(outgoing, up)
    } else {
        -outgoing
    }
}

pub fn sample_transparent_delta_pdf(ior: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    let up = facing(normal, outgoing);
    let f = fresnel_dielectric(ior, up, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        f
    } else {
        1.0 - f
    }
}

// ============================================================================
// Refractive (rough dielectric interface)
// ============================================================================

/// Relative index seen from the outgoing side, and the normal facing it.
#[inline]
fn interface(ior: f32, normal: Vec3, outgoing: Vec3) -> (bool, Vec3, f32) {
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    (entering, up, rel_ior)
}

pub fn eval_refractive(
    color: Vec3,
    ior: f32,
    roughness: f32,
    normal: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> Vec3 {
    let (entering, up, rel_ior) = interface(ior, normal, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        let halfway = (incoming + outgoing).normalize();
        let f = fresnel_dielectric(rel_ior, halfway, outgoing);
        let d = microfacet_distribution(roughness, up, halfway);
        let g = microfacet_shadowing(roughness, up, halfway, outgoing, incoming);
        Vec3::ONE * f * d * g
            / (4.0 * normal.dot(outgoing) * normal.dot(incoming)).abs()
            * normal.dot(incoming).abs()
    } else {
        let sign = if entering { 1.0 } else { -1.0 };
        let halfway = -(rel_ior * incoming + outgoing).normalize() * sign;
        let f = fresnel_dielectric(rel_ior, halfway, outgoing);
        let d = microfacet_distribution(roughness, up, halfway);
        let g = microfacet_shadowing(roughness, up, halfway, outgoing, incoming);
        let denom = rel_ior * halfway.dot(incoming) + halfway.dot(outgoing);
        // [Walter 2007] equation 21
        color
            * ((outgoing.dot(halfway) * incoming.dot(halfway))
                / (outgoing.dot(normal) * incoming.dot(normal)))
            .abs()
            * (1.0 - f)
            * d
            * g
            / (denom * denom)
            * normal.dot(incoming).abs()
    }
}

pub fn sample_refractive(
    ior: f32,
    roughness: f32,
    normal: Vec3,
    outgoing: Vec3,
    rnl: f32,
    rn: Vec2,
) -> Vec3 {
    let (_, up, rel_ior) = interface(ior, normal, outgoing);
    let halfway = sample_microfacet(roughness, up, rn);
    if rnl < fresnel_dielectric(rel_ior, halfway, outgoing) {
        let incoming = reflect(outgoing, halfway);
        if !same_hemisphere(up, outgoing, incoming) {
            return Vec3::ZERO;
        }
        incoming
    } else {
        let incoming = refract(outgoing, halfway, 1.0 / rel_ior);
        if same_hemisphere(up, outgoing, incoming) {
            return Vec3::ZERO;
        }
        incoming
    }
}

pub fn sample_refractive_pdf(ior: f32, roughness: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    let (entering, up, rel_ior) = interface(ior, normal, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        let halfway = (incoming + outgoing).normalize();
        fresnel_dielectric(rel_ior, halfway, outgoing) * reflection_pdf(roughness, up, outgoing, incoming)
    } else {
        let sign = if entering { 1.0 } else { -1.0 };
        let halfway = -(rel_ior * incoming + outgoing).normalize() * sign;
        let denom = rel_ior * halfway.dot(incoming) + halfway.dot(outgoing);
        // [Walter 2007] equation 17
        (1.0 - fresnel_dielectric(rel_ior, halfway, outgoing))
            * sample_microfacet_pdf(roughness, up, halfway)
            * halfway.dot(incoming).abs()
            / (denom * denom)
    }
}

pub fn eval_refractive_delta(color: Vec3, ior: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if (ior - 1.0).abs() < IOR_EPS {
        return if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
            Vec3::ONE
        } else {
            Vec3::ZERO
        };
    }
    let (_, up, rel_ior) = interface(ior, normal, outgoing);
    let f = fresnel_dielectric(rel_ior, up, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        Vec3::splat(f)
    } else {
        color * (1.0 / (rel_ior * rel_ior)) * (1.0 - f)
    }
}

pub fn sample_refractive_delta(ior: f32, normal: Vec3, outgoing: Vec3, rnl: f32) -> Vec3 {
    if (ior - 1.0).abs() < IOR_EPS {
        return -outgoing;
    }
    let (_, up, rel_ior) = interface(ior, normal, outgoing);
    if rnl < fresnel_dielectric(rel_ior, up, outgoing) {
        reflect(outgoing, up)
    } else {
        refract(outgoing, up, 1.0 / rel_ior)
    }
}

pub fn sample_refractive_delta_pdf(ior: f32, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if (ior - 1.0).abs() < IOR_EPS {
        return if normal.dot(incoming) * normal.dot(outgoing) < 0.0 {
            1.0
        } else {
            0.0
        };
    }
    let (_, up, rel_ior) = interface(ior, normal, outgoing);
    let f = fresnel_dielectric(rel_ior, up, outgoing);
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        f
    } else {
        1.0 - f
    }
}

// ============================================================================
// glTF metallic-roughness
// ============================================================================

#[inline]
fn gltf_reflectivity(color: Vec3, ior: f32, metallic: f32) -> Vec3 {
    let base = ((ior - 1.0) / (ior + 1.0)).powi(2);
    Vec3::splat(base).lerp(color, metallic)
}

pub fn eval_gltfpbr(
    color: Vec3,
    ior: f32,
    roughness: f32,
    metallic: f32,
    normal: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> Vec3 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return Vec3::ZERO;
    }
    let reflectivity = gltf_reflectivity(color, ior, metallic);
    let up = facing(normal, outgoing);
    let f1 = fresnel_schlick(reflectivity, up, outgoing);
    let halfway = (incoming + outgoing).normalize();
    let f = fresnel_schlick(reflectivity, halfway, incoming);
    color * (1.0 - metallic) * (Vec3::ONE - f1) / PI * up.dot(incoming).abs()
        + f * microfacet_reflection(roughness, up, outgoing, incoming)
}

pub fn sample_gltfpbr(
    color: Vec3,
    ior: f32,
    roughness: f32,
    metallic: f32,
    normal: Vec3,
    outgoing: Vec3,
    rnl: f32,
    rn: Vec2,
) -> Vec3 {
    let up = facing(normal, outgoing);
    let reflectivity = gltf_reflectivity(color, ior, metallic);
    if rnl < mean(fresnel_schlick(reflectivity, up, outgoing)) {
        sample_reflection(roughness, up, outgoing, rn)
    } else {
        sample_hemisphere_cos(up, rn)
    }
}

pub fn sample_gltfpbr_pdf(
    color: Vec3,
    ior: f32,
    roughness: f32,
    metallic: f32,
    normal: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> f32 {
    if normal.dot(incoming) * normal.dot(outgoing) <= 0.0 {
        return 0.0;
    }
    let up = facing(normal, outgoing);
    let reflectivity = gltf_reflectivity(color, ior, metallic);
    let f = mean(fresnel_schlick(reflectivity, up, outgoing));
    f * reflection_pdf(roughness, up, outgoing, incoming)
        + (1.0 - f) * sample_hemisphere_cos_pdf(up, incoming)
}

// ============================================================================
// Pass-through
// ============================================================================

/// Medium boundaries transmit unchanged; attenuation happens inside.
pub fn eval_passthrough(normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        Vec3::ZERO
    } else {
        Vec3::ONE
    }
}

pub fn sample_passthrough(outgoing: Vec3) -> Vec3 {
    -outgoing
}

pub fn sample_passthrough_pdf(normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if normal.dot(incoming) * normal.dot(outgoing) >= 0.0 {
        0.0
    } else {
        1.0
    }
}
