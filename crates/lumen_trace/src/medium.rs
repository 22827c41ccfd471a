//! Participating media: Henyey-Greenstein phase function, free-flight
//! sampling and the stack of media a path is currently inside.

use std::f32::consts::PI;

use lumen_math::{basis_fromz, mean, Vec2, Vec3};
use lumen_scene::MaterialPoint;
use smallvec::SmallVec;

// ============================================================================
// Phase function
// ============================================================================

/// Henyey-Greenstein phase function with anisotropy `g`.
pub fn eval_phasefunction(anisotropy: f32, outgoing: Vec3, incoming: Vec3) -> f32 {
    let cosine = -outgoing.dot(incoming);
    let g2 = anisotropy * anisotropy;
    let denom = 1.0 + g2 - 2.0 * anisotropy * cosine;
    (1.0 - g2) / (4.0 * PI * denom * denom.sqrt())
}

pub fn sample_phasefunction(anisotropy: f32, outgoing: Vec3, rn: Vec2) -> Vec3 {
    let cos_theta = if anisotropy.abs() < 1e-3 {
        1.0 - 2.0 * rn.y
    } else {
        let g = anisotropy;
        let square = (1.0 - g * g) / (1.0 + g - 2.0 * g * rn.y);
        (1.0 + g * g - square * square) / (2.0 * g)
    };

    let sin_theta = (1.0 - cos_theta * cos_theta).clamp(0.0, 1.0).sqrt();
    let phi = 2.0 * PI * rn.x;
    let local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
    basis_fromz(-outgoing) * local
}

pub fn sample_phasefunction_pdf(anisotropy: f32, outgoing: Vec3, incoming: Vec3) -> f32 {
    eval_phasefunction(anisotropy, outgoing, incoming)
}

/// Scattered radiance weight of an in-volume event.
pub fn eval_scattering(material: &MaterialPoint, outgoing: Vec3, incoming: Vec3) -> Vec3 {
    if material.density == Vec3::ZERO {
        return Vec3::ZERO;
    }
    material.scattering
        * material.density
        * eval_phasefunction(material.scanisotropy, outgoing, incoming)
}

// ============================================================================
// Transmittance
// ============================================================================

/// Sample a free-flight distance through a medium of the given density,
/// clamped to `max_distance`. One channel is chosen with `rl`.
pub fn sample_transmittance(density: Vec3, max_distance: f32, rl: f32, rd: f32) -> f32 {
    let channel = ((rl * 3.0) as usize).min(2);
    let sigma = density[channel];
    let distance = if sigma == 0.0 {
        f32::MAX
    } else {
        -(1.0 - rd).ln() / sigma
    };
    distance.min(max_distance)
}

/// Density of `sample_transmittance` averaged over the channel choice.
pub fn sample_transmittance_pdf(density: Vec3, distance: f32, max_distance: f32) -> f32 {
    if distance < max_distance {
        mean(density * exp3(-density * distance))
    } else {
        mean(exp3(-density * max_distance))
    }
}

pub fn eval_transmittance(density: Vec3, distance: f32) -> Vec3 {
    exp3(-density * distance)
}

#[inline]
fn exp3(v: Vec3) -> Vec3 {
    Vec3::new(v.x.exp(), v.y.exp(), v.z.exp())
}

// ============================================================================
// Volume stack
// ============================================================================

/// Media the current path segment is inside, innermost last.
///
/// Crossing a volumetric boundary pushes when the stack is empty and pops
/// otherwise, so nesting is one level deep along any path.
#[derive(Clone, Debug, Default)]
pub struct VolumeStack {
    media: SmallVec<[MaterialPoint; 4]>,
}

impl VolumeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }

    /// Innermost medium.
    pub fn top(&self) -> Option<&MaterialPoint> {
        self.media.last()
    }

    /// Record a transmission through a volumetric boundary.
    pub fn cross(&mut self, medium: MaterialPoint) {
        if self.media.is_empty() {
            self.media.push(medium);
        } else {
            self.media.pop();
        }
    }
}
