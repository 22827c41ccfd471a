//! Sphere tracing against the scene's implicit field.

use lumen_math::{Ray, Vec3};
use lumen_scene::Implicit;

const MAX_STEPS: usize = 170;

/// Hit tolerance relative to the marched distance.
const HIT_EPSILON: f32 = 1e-5;

/// Finite difference offset of the normal estimator.
const NORMAL_OFFSET: f32 = 1e-4;

/// Result of marching a ray through an implicit field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SdfHit {
    pub hit: bool,
    pub distance: f32,
    pub material: usize,
}

/// March `ray` from `tmin` by the field's distance until the surface is
/// within tolerance, the step budget runs out, or `tmax` is passed.
///
/// Steps are taken with the signed value, so a ray starting inside a solid
/// moves backwards.
pub fn spheretrace(sdf: &Implicit, ray: &Ray) -> SdfHit {
    let mut t = ray.tmin;
    for _ in 0..MAX_STEPS {
        if t >= ray.tmax {
            break;
        }
        let sample = sdf.eval(ray.at(t));
        if sample.distance.abs() < HIT_EPSILON * t {
            return SdfHit {
                hit: true,
                distance: t,
                material: sample.material,
            };
        }
        t += sample.distance;
    }
    SdfHit {
        hit: false,
        distance: t,
        material: 0,
    }
}

/// Field gradient by a tetrahedral finite difference, normalized.
pub fn eval_sdf_normal(sdf: &Implicit, position: Vec3) -> Vec3 {
    const TAPS: [Vec3; 4] = [
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ];
    TAPS.iter()
        .map(|&k| k * sdf.distance(position + k * NORMAL_OFFSET))
        .sum::<Vec3>()
        .normalize_or_zero()
}
