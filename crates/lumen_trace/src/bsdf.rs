//! BSDF dispatch over material kinds.
//!
//! Materials with `roughness != 0` use the smooth family (`eval_bsdfcos`,
//! `sample_bsdfcos`, `sample_bsdfcos_pdf`); materials with `roughness == 0`
//! use the delta family. Calling the wrong family, or a kind without a
//! model in that family, yields zero.

use lumen_math::{Vec2, Vec3};
use lumen_scene::{MaterialKind, MaterialPoint};

use crate::shading::*;

/// True when the material scatters only into discrete directions.
pub fn is_delta(material: &MaterialPoint) -> bool {
    match material.kind {
        MaterialKind::Reflective
        | MaterialKind::Transparent
        | MaterialKind::Refractive
        | MaterialKind::Subsurface => material.roughness == 0.0,
        MaterialKind::Volumetric => true,
        _ => false,
    }
}

/// Emitted radiance, counted only on the side the normal faces.
pub fn eval_emission(material: &MaterialPoint, normal: Vec3, outgoing: Vec3) -> Vec3 {
    if normal.dot(outgoing) >= 0.0 {
        material.emission
    } else {
        Vec3::ZERO
    }
}

/// BSDF times cosine for non-delta materials.
pub fn eval_bsdfcos(material: &MaterialPoint, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if material.roughness == 0.0 {
        return Vec3::ZERO;
    }

    let m = material;
    match m.kind {
        MaterialKind::Matte => eval_matte(m.color, normal, outgoing, incoming),
        MaterialKind::Glossy => eval_glossy(m.color, m.ior, m.roughness, normal, outgoing, incoming),
        MaterialKind::Reflective => eval_reflective(m.color, m.roughness, normal, outgoing, incoming),
        MaterialKind::Transparent => {
            eval_transparent(m.color, m.ior, m.roughness, normal, outgoing, incoming)
        }
        MaterialKind::Refractive | MaterialKind::Subsurface => {
            eval_refractive(m.color, m.ior, m.roughness, normal, outgoing, incoming)
        }
        MaterialKind::GltfPbr => eval_gltfpbr(
            m.color,
            m.ior,
            m.roughness,
            m.metallic,
            normal,
            outgoing,
            incoming,
        ),
        MaterialKind::Volumetric => Vec3::ZERO,
    }
}

/// Sample an incoming direction for non-delta materials.
pub fn sample_bsdfcos(
    material: &MaterialPoint,
    normal: Vec3,
    outgoing: Vec3,
    rnl: f32,
    rn: Vec2,
) -> Vec3 {
    if material.roughness == 0.0 {
        return Vec3::ZERO;
    }

    let m = material;
    match m.kind {
        MaterialKind::Matte => sample_matte(normal, outgoing, rn),
        MaterialKind::Glossy => sample_glossy(m.ior, m.roughness, normal, outgoing, rnl, rn),
        MaterialKind::Reflective => sample_reflective(m.roughness, normal, outgoing, rn),
        MaterialKind::Transparent => {
            sample_transparent(m.ior, m.roughness, normal, outgoing, rnl, rn)
        }
        MaterialKind::Refractive | MaterialKind::Subsurface => {
            sample_refractive(m.ior, m.roughness, normal, outgoing, rnl, rn)
        }
        MaterialKind::GltfPbr => sample_gltfpbr(
            m.color,
            m.ior,
            m.roughness,
            m.metallic,
            normal,
            outgoing,
            rnl,
            rn,
        ),
        MaterialKind::Volumetric => Vec3::ZERO,
    }
}

pub fn sample_bsdfcos_pdf(
    material: &MaterialPoint,
    normal: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> f32 {
    if material.roughness == 0.0 {
        return 0.0;
    }

    let m = material;
    match m.kind {
        MaterialKind::Matte => sample_matte_pdf(normal, outgoing, incoming),
        MaterialKind::Glossy => sample_glossy_pdf(m.ior, m.roughness, normal, outgoing, incoming),
        MaterialKind::Reflective => sample_reflective_pdf(m.roughness, normal, outgoing, incoming),
        MaterialKind::Transparent => {
            sample_transparent_pdf(m.ior, m.roughness, normal, outgoing, incoming)
        }
        MaterialKind::Refractive | MaterialKind::Subsurface => {
            sample_refractive_pdf(m.ior, m.roughness, normal, outgoing, incoming)
        }
        MaterialKind::GltfPbr => sample_gltfpbr_pdf(
            m.color,
            m.ior,
            m.roughness,
            m.metallic,
            normal,
            outgoing,
            incoming,
        ),
        MaterialKind::Volumetric => 0.0,
    }
}

/// Delta BSDF weight. Only meaningful for the direction `sample_delta`
/// returned.
pub fn eval_delta(material: &MaterialPoint, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if material.roughness != 0.0 {
        return Vec3::ZERO;
    }

    let m = material;
    match m.kind {
        MaterialKind::Reflective => eval_reflective_delta(m.color, normal, outgoing, incoming),
        MaterialKind::Transparent => eval_transparent_delta(m.color, m.ior, normal, outgoing, incoming),
        MaterialKind::Refractive | MaterialKind::Subsurface => {
            eval_refractive_delta(m.color, m.ior, normal, outgoing, incoming)
        }
        MaterialKind::Volumetric => eval_passthrough(normal, outgoing, incoming),
        _ => Vec3::ZERO,
    }
}

pub fn sample_delta(material: &MaterialPoint, normal: Vec3, outgoing: Vec3, rnl: f32) -> Vec3 {
    if material.roughness != 0.0 {
        return Vec3::ZERO;
    }

    let m = material;
    match m.kind {
        MaterialKind::Reflective => sample_reflective_delta(normal, outgoing),
        MaterialKind::Transparent => sample_transparent_delta(m.ior, normal, outgoing, rnl),
        MaterialKind::Refractive | MaterialKind::Subsurface => {
            sample_refractive_delta(m.ior, normal, outgoing, rnl)
        }
        MaterialKind::Volumetric => sample_passthrough(outgoing),
        _ => Vec3::ZERO,
    }
}

/// Discrete probability of choosing `incoming` among the delta directions.
pub fn sample_delta_pdf(material: &MaterialPoint, normal: Vec3, outgoing: Vec3, incoming: Vec3) -> f32 {
    if material.roughness != 0.0 {
        return 0.0;
    }

    let m = material;
    match m.kind {
        MaterialKind::Reflective => sample_reflective_delta_pdf(normal, outgoing, incoming),
        MaterialKind::Transparent => sample_transparent_delta_pdf(m.ior, normal, outgoing, incoming),
        MaterialKind::Refractive | MaterialKind::Subsurface => {
            sample_refractive_delta_pdf(m.ior, normal, outgoing, incoming)
        }
        MaterialKind::Volumetric => sample_passthrough_pdf(normal, outgoing, incoming),
        _ => 0.0,
    }
}
