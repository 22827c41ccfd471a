use crate::Vec3;

/// Default offset used to keep secondary rays off the surface they leave.
pub const RAY_EPS: f32 = 1e-4;

/// A ray in 3D space with origin, direction and a parametric range.
///
/// Only points `origin + t * direction` with `tmin <= t <= tmax` are
/// considered by intersection queries. Rays are cheap values; integrators
/// build a new one at every bounce instead of mutating the old one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub tmin: f32,
    pub tmax: f32,
}

impl Ray {
    /// Create a ray with the default `[RAY_EPS, f32::MAX]` range.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            tmin: RAY_EPS,
            tmax: f32::MAX,
        }
    }

    /// Create a ray restricted to `[tmin, tmax]`.
    pub fn with_range(origin: Vec3, direction: Vec3, tmin: f32, tmax: f32) -> Self {
        Self {
            origin,
            direction,
            tmin,
            tmax,
        }
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_creation() {
        let origin = Vec3::new(1.0, 2.0, 3.0);
        let direction = Vec3::new(0.0, 1.0, 0.0);
        let ray = Ray::new(origin, direction);

        assert_eq!(ray.origin, origin);
        assert_eq!(ray.direction, direction);
        assert_eq!(ray.tmin, RAY_EPS);
        assert_eq!(ray.tmax, f32::MAX);
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_range() {
        let ray = Ray::with_range(Vec3::ZERO, Vec3::Y, 0.5, 2.0);
        assert_eq!(ray.tmin, 0.5);
        assert_eq!(ray.tmax, 2.0);
    }
}
