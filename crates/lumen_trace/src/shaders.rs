//! Per-ray shaders: the path tracing integrators and the debug views.
//!
//! Naive, path and volumetric path tracing share one bounce loop and differ
//! only in how the next direction is chosen and whether media are tracked.
//! Every shader returns RGBA radiance with alpha set when the camera ray
//! hit geometry.

use std::f32::consts::PI;

use lumen_math::{is_finite3, Ray, Vec2, Vec3, Vec4};
use lumen_scene::{MaterialPoint, Scene};
use rand::Rng;
use rand_pcg::Pcg32;

use crate::bsdf::{
    eval_bsdfcos, eval_delta, eval_emission, is_delta, sample_bsdfcos, sample_bsdfcos_pdf,
    sample_delta, sample_delta_pdf,
};
use crate::bvh::{Intersection, Intersector};
use crate::lights::{sample_lights, sample_lights_pdf, LightSet};
use crate::medium::{
    eval_scattering, eval_transmittance, sample_phasefunction, sample_phasefunction_pdf,
    sample_transmittance, sample_transmittance_pdf, VolumeStack,
};
use crate::params::{Params, ShaderKind};
use crate::sdf::{eval_sdf_normal, spheretrace};

/// Signature shared by every shader.
pub type ShaderFn = fn(&Scene, &dyn Intersector, &LightSet, &Ray, &mut Pcg32, &Params) -> Vec4;

/// Consecutive transparent surfaces a ray may skip before it is dropped.
const MAX_OPACITY_BOUNCES: u32 = 128;

/// Offset applied when a ray skips a transparent surface.
const OPACITY_OFFSET: f32 = 1e-2;

/// Bounce index after which paths are subject to Russian roulette.
const RR_START: u32 = 3;

/// Shader implementing `kind`.
pub fn get_shader(kind: ShaderKind) -> ShaderFn {
    match kind {
        ShaderKind::Volpathtrace => shade_volpathtrace,
        ShaderKind::Pathtrace => shade_pathtrace,
        ShaderKind::Naive => shade_naive,
        ShaderKind::Eyelight => shade_eyelight,
        ShaderKind::Normal => shade_normal,
        ShaderKind::Texcoord => shade_texcoord,
        ShaderKind::Color => shade_color,
        ShaderKind::Implicit => shade_implicit,
        ShaderKind::ImplicitNormal => shade_implicit_normal,
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

#[inline]
fn rand2(rng: &mut Pcg32) -> Vec2 {
    Vec2::new(rng.gen(), rng.gen())
}

/// Stochastic path termination past the first few bounces.
///
/// Returns the reweighted throughput of a surviving path, `None` when the
/// path is terminated.
pub fn russian_roulette(weight: Vec3, bounce: u32, rng: &mut Pcg32) -> Option<Vec3> {
    if bounce <= RR_START {
        return Some(weight);
    }
    let survival = weight.max_element().min(0.99);
    if rng.gen::<f32>() >= survival {
        return None;
    }
    Some(weight / survival)
}

/// Throughput that can no longer contribute.
#[inline]
pub fn is_dead_weight(weight: Vec3) -> bool {
    weight == Vec3::ZERO || !is_finite3(weight)
}

#[inline]
fn with_alpha(radiance: Vec3, hit: bool) -> Vec4 {
    radiance.extend(if hit { 1.0 } else { 0.0 })
}

/// Surface data needed to scatter at a hit.
#[derive(Clone, Copy, Debug)]
struct ShadingPoint {
    position: Vec3,
    normal: Vec3,
    material: MaterialPoint,
}

impl ShadingPoint {
    fn at_surface(scene: &Scene, isec: &Intersection, outgoing: Vec3) -> Self {
        Self {
            position: scene.eval_position(isec.instance, isec.element, isec.uv),
            normal: scene.eval_shading_normal(isec.instance, isec.element, isec.uv, outgoing),
            material: scene.eval_material(isec.instance, isec.element, isec.uv),
        }
    }

    /// Ray that skips this surface, or `None` when the surface is accepted.
    fn opacity_skip(&self, ray: &Ray, rng: &mut Pcg32) -> Option<Ray> {
        if self.material.opacity < 1.0 && rng.gen::<f32>() >= self.material.opacity {
            Some(Ray::new(
                self.position + ray.direction * OPACITY_OFFSET,
                ray.direction,
            ))
        } else {
            None
        }
    }
}

/// How non-delta surfaces pick the next direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mixture {
    /// BSDF importance sampling only
    Bsdf,
    /// Even mix of BSDF and light sampling, weighted by the mixture pdf
    BsdfAndLights,
}

/// Read-only scene state the integrators sample from.
struct PathContext<'a> {
    scene: &'a Scene,
    bvh: &'a dyn Intersector,
    lights: &'a LightSet,
}

impl PathContext<'_> {
    /// Next direction at a surface and the throughput factor it carries.
    fn scatter_surface(
        &self,
        point: &ShadingPoint,
        outgoing: Vec3,
        mixture: Mixture,
        rng: &mut Pcg32,
    ) -> Option<(Vec3, Vec3)> {
        let ShadingPoint {
            position,
            normal,
            material,
        } = *point;

        if is_delta(&material) {
            let incoming = sample_delta(&material, normal, outgoing, rng.gen());
            if incoming == Vec3::ZERO {
                return None;
            }
            let factor = eval_delta(&material, normal, outgoing, incoming)
                / sample_delta_pdf(&material, normal, outgoing, incoming);
            return Some((incoming, factor));
        }

        let incoming = match mixture {
            Mixture::Bsdf => sample_bsdfcos(&material, normal, outgoing, rng.gen(), rand2(rng)),
            Mixture::BsdfAndLights => {
                if rng.gen::<f32>() < 0.5 {
                    sample_bsdfcos(&material, normal, outgoing, rng.gen(), rand2(rng))
                } else {
                    sample_lights(self.scene, self.lights, position, rng.gen(), rng.gen(), rand2(rng))
                }
            }
        };
        if incoming == Vec3::ZERO {
            return None;
        }

        let bsdf_pdf = sample_bsdfcos_pdf(&material, normal, outgoing, incoming);
        let pdf = match mixture {
            Mixture::Bsdf => bsdf_pdf,
            Mixture::BsdfAndLights => {
                0.5 * bsdf_pdf
                    + 0.5 * sample_lights_pdf(self.scene, self.bvh, self.lights, position, incoming)
            }
        };
        Some((incoming, eval_bsdfcos(&material, normal, outgoing, incoming) / pdf))
    }

    /// Next direction inside a medium, mixing phase and light sampling.
    fn scatter_volume(
        &self,
        medium: &MaterialPoint,
        position: Vec3,
        outgoing: Vec3,
        rng: &mut Pcg32,
    ) -> Option<(Vec3, Vec3)> {
        let incoming = if rng.gen::<f32>() < 0.5 {
            sample_phasefunction(medium.scanisotropy, outgoing, rand2(rng))
        } else {
            sample_lights(self.scene, self.lights, position, rng.gen(), rng.gen(), rand2(rng))
        };
        if incoming == Vec3::ZERO {
            return None;
        }

        let pdf = 0.5 * sample_phasefunction_pdf(medium.scanisotropy, outgoing, incoming)
            + 0.5 * sample_lights_pdf(self.scene, self.bvh, self.lights, position, incoming);
        Some((incoming, eval_scattering(medium, outgoing, incoming) / pdf))
    }
}

// ============================================================================
// Bounce loop
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathMode {
    Naive,
    Surface,
    Volumetric,
}

impl PathMode {
    fn mixture(self) -> Mixture {
        match self {
            PathMode::Naive => Mixture::Bsdf,
            PathMode::Surface | PathMode::Volumetric => Mixture::BsdfAndLights,
        }
    }
}

fn trace_path(ctx: &PathContext, camera_ray: &Ray, rng: &mut Pcg32, bounces: u32, mode: PathMode) -> Vec4 {
    let mut radiance = Vec3::ZERO;
    let mut weight = Vec3::ONE;
    let mut ray = *camera_ray;
    let mut volume_stack = VolumeStack::new();
    let mut hit = false;
    let mut bounce = 0;
    let mut opbounce = 0;

    loop {
        let mut isec = ctx.bvh.intersect(&ray);
        if !isec.hit {
            radiance += weight * ctx.scene.eval_environment(ray.direction);
            break;
        }

        // free flight through the innermost medium
        let mut in_volume = false;
        if let Some(medium) = volume_stack.top() {
            let distance = sample_transmittance(medium.density, isec.distance, rng.gen(), rng.gen());
            weight *= eval_transmittance(medium.density, distance)
                / sample_transmittance_pdf(medium.density, distance, isec.distance);
            in_volume = distance < isec.distance;
            isec.distance = distance;
        }

        let outgoing = -ray.direction;
        let (position, incoming) = if !in_volume {
            let point = ShadingPoint::at_surface(ctx.scene, &isec, outgoing);
            if let Some(skip) = point.opacity_skip(&ray, rng) {
                opbounce += 1;
                if opbounce > MAX_OPACITY_BOUNCES {
                    break;
                }
                ray = skip;
                continue;
            }

            if bounce == 0 {
                hit = true;
            }
            if bounces > 0 {
                radiance += weight * eval_emission(&point.material, point.normal, outgoing);
            }
            if bounce >= bounces {
                break;
            }

            let Some((incoming, factor)) = ctx.scatter_surface(&point, outgoing, mode.mixture(), rng)
            else {
                break;
            };
            weight *= factor;

            if mode == PathMode::Volumetric
                && ctx.scene.is_volumetric(isec.instance)
                && point.normal.dot(outgoing) * point.normal.dot(incoming) < 0.0
            {
                volume_stack.cross(point.material);
            }
            (point.position, incoming)
        } else {
            let Some(medium) = volume_stack.top().copied() else {
                break;
            };
            radiance += weight * medium.emission;
            if bounce >= bounces {
                break;
            }
            let position = ray.at(isec.distance);

            let Some((incoming, factor)) = ctx.scatter_volume(&medium, position, outgoing, rng) else {
                break;
            };
            weight *= factor;
            (position, incoming)
        };

        if is_dead_weight(weight) {
            break;
        }
        match russian_roulette(weight, bounce, rng) {
            Some(survived) => weight = survived,
            None => break,
        }

        ray = Ray::new(position, incoming);
        bounce += 1;
    }

    with_alpha(radiance, hit)
}

/// Path tracing with nested participating media.
pub fn shade_volpathtrace(
    scene: &Scene,
    bvh: &dyn Intersector,
    lights: &LightSet,
    ray: &Ray,
    rng: &mut Pcg32,
    params: &Params,
) -> Vec4 {
    let ctx = PathContext { scene, bvh, lights };
    trace_path(&ctx, ray, rng, params.bounces, PathMode::Volumetric)
}

/// Path tracing with multiple importance sampling of lights.
pub fn shade_pathtrace(
    scene: &Scene,
    bvh: &dyn Intersector,
    lights: &LightSet,
    ray: &Ray,
    rng: &mut Pcg32,
    params: &Params,
) -> Vec4 {
    let ctx = PathContext { scene, bvh, lights };
    trace_path(&ctx, ray, rng, params.bounces, PathMode::Surface)
}

/// Path tracing with BSDF sampling only.
pub fn shade_naive(
    scene: &Scene,
    bvh: &dyn Intersector,
    lights: &LightSet,
    ray: &Ray,
    rng: &mut Pcg32,
    params: &Params,
) -> Vec4 {
    let ctx = PathContext { scene, bvh, lights };
    trace_path(&ctx, ray, rng, params.bounces, PathMode::Naive)
}

// ============================================================================
// Preview and implicit shaders
// ============================================================================

/// Headlight preview: emission plus the BSDF lit from the eye, followed
/// through delta surfaces only.
pub fn shade_eyelight(
    scene: &Scene,
    bvh: &dyn Intersector,
    _lights: &LightSet,
    ray: &Ray,
    rng: &mut Pcg32,
    params: &Params,
) -> Vec4 {
    let cap = if params.bounces == 0 {
        0
    } else {
        params.bounces.max(4)
    };

    let mut radiance = Vec3::ZERO;
    let mut weight = Vec3::ONE;
    let mut ray = *ray;
    let mut hit = false;
    let mut bounce = 0;
    let mut opbounce = 0;

    loop {
        let isec = bvh.intersect(&ray);
        if !isec.hit {
            radiance += weight * scene.eval_environment(ray.direction);
            break;
        }

        let outgoing = -ray.direction;
        let point = ShadingPoint::at_surface(scene, &isec, outgoing);
        if let Some(skip) = point.opacity_skip(&ray, rng) {
            opbounce += 1;
            if opbounce > MAX_OPACITY_BOUNCES {
                break;
            }
            ray = skip;
            continue;
        }

        if bounce == 0 {
            hit = true;
        }
        let ShadingPoint {
            position,
            normal,
            material,
        } = point;
        if cap > 0 {
            radiance += weight * eval_emission(&material, normal, outgoing);
        }
        if bounce >= cap {
            break;
        }
        radiance += weight * PI * eval_bsdfcos(&material, normal, outgoing, outgoing);

        if !is_delta(&material) {
            break;
        }
        let incoming = sample_delta(&material, normal, outgoing, rng.gen());
        if incoming == Vec3::ZERO {
            break;
        }
        weight *= eval_delta(&material, normal, outgoing, incoming)
            / sample_delta_pdf(&material, normal, outgoing, incoming);
        if is_dead_weight(weight) {
            break;
        }

        ray = Ray::new(position, incoming);
        bounce += 1;
    }

    with_alpha(radiance, hit)
}

/// Path tracing against the scene's implicit field with BSDF sampling.
pub fn shade_implicit(
    scene: &Scene,
    bvh: &dyn Intersector,
    lights: &LightSet,
    ray: &Ray,
    rng: &mut Pcg32,
    params: &Params,
) -> Vec4 {
    let Some(sdf) = scene.implicit.as_ref() else {
        return Vec4::ZERO;
    };
    let ctx = PathContext { scene, bvh, lights };

    let mut radiance = Vec3::ZERO;
    let mut weight = Vec3::ONE;
    let mut ray = *ray;
    let mut hit = false;
    let mut bounce = 0;
    let mut opbounce = 0;

    loop {
        let isec = spheretrace(sdf, &ray);
        if !isec.hit || isec.material >= scene.materials.len() {
            radiance += weight * scene.eval_environment(ray.direction);
            break;
        }

        let outgoing = -ray.direction;
        let position = ray.at(isec.distance);
        let point = ShadingPoint {
            position,
            normal: eval_sdf_normal(sdf, position),
            material: scene.eval_material_at(isec.material, Vec2::ZERO),
        };
        if let Some(skip) = point.opacity_skip(&ray, rng) {
            opbounce += 1;
            if opbounce > MAX_OPACITY_BOUNCES {
                break;
            }
            ray = skip;
            continue;
        }

        if bounce == 0 {
            hit = true;
        }
        if params.bounces > 0 {
            radiance += weight * eval_emission(&point.material, point.normal, outgoing);
        }
        if bounce >= params.bounces {
            break;
        }

        let Some((incoming, factor)) = ctx.scatter_surface(&point, outgoing, Mixture::Bsdf, rng) else {
            break;
        };
        weight *= factor;
        if is_dead_weight(weight) {
            break;
        }
        match russian_roulette(weight, bounce, rng) {
            Some(survived) => weight = survived,
            None => break,
        }

        ray = Ray::new(position, incoming);
        bounce += 1;
    }

    with_alpha(radiance, hit)
}

// ============================================================================
// Debug views
// ============================================================================

pub fn shade_normal(
    scene: &Scene,
    bvh: &dyn Intersector,
    _lights: &LightSet,
    ray: &Ray,
    _rng: &mut Pcg32,
    _params: &Params,
) -> Vec4 {
    let isec = bvh.intersect(ray);
    if !isec.hit {
        return Vec4::ZERO;
    }
    let normal = scene.eval_shading_normal(isec.instance, isec.element, isec.uv, -ray.direction);
    normal.extend(1.0)
}

pub fn shade_texcoord(
    scene: &Scene,
    bvh: &dyn Intersector,
    _lights: &LightSet,
    ray: &Ray,
    _rng: &mut Pcg32,
    _params: &Params,
) -> Vec4 {
    let isec = bvh.intersect(ray);
    if !isec.hit {
        return Vec4::ZERO;
    }
    let texcoord = scene.eval_texcoord(isec.instance, isec.element, isec.uv);
    Vec4::new(texcoord.x, texcoord.y, 0.0, 1.0)
}

pub fn shade_color(
    scene: &Scene,
    bvh: &dyn Intersector,
    _lights: &LightSet,
    ray: &Ray,
    _rng: &mut Pcg32,
    _params: &Params,
) -> Vec4 {
    let isec = bvh.intersect(ray);
    if !isec.hit {
        return Vec4::ZERO;
    }
    let material = scene.eval_material(isec.instance, isec.element, isec.uv);
    material.color.extend(1.0)
}

pub fn shade_implicit_normal(
    scene: &Scene,
    _bvh: &dyn Intersector,
    _lights: &LightSet,
    ray: &Ray,
    _rng: &mut Pcg32,
    _params: &Params,
) -> Vec4 {
    let Some(sdf) = scene.implicit.as_ref() else {
        return Vec4::ZERO;
    };
    let isec = spheretrace(sdf, ray);
    if !isec.hit {
        return Vec4::ZERO;
    }
    eval_sdf_normal(sdf, ray.at(isec.distance)).extend(1.0)
}
