// Re-export glam for convenience
pub use glam::*;

// lumen math types
mod aabb;
mod frame;
mod ray;

pub mod geometry;
pub mod sampling;

pub use aabb::Aabb;
pub use frame::{basis_fromz, reflect, refract, transform_normal};
pub use ray::{Ray, RAY_EPS};

/// Luminance of a linear RGB color (Rec. 709).
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
}

/// Average of the three channels.
#[inline]
pub fn mean(c: Vec3) -> f32 {
    (c.x + c.y + c.z) / 3.0
}

/// True when every channel is finite.
#[inline]
pub fn is_finite3(c: Vec3) -> bool {
    c.x.is_finite() && c.y.is_finite() && c.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_of_white() {
        assert!((luminance(Vec3::ONE) - 1.0).abs() < 1e-4);
        assert_eq!(luminance(Vec3::ZERO), 0.0);
    }

    #[test]
    fn test_mean_and_finite() {
        assert!((mean(Vec3::new(1.0, 2.0, 3.0)) - 2.0).abs() < 1e-6);
        assert!(is_finite3(Vec3::new(1.0, 0.0, -4.0)));
        assert!(!is_finite3(Vec3::new(f32::NAN, 0.0, 0.0)));
        assert!(!is_finite3(Vec3::new(0.0, f32::INFINITY, 0.0)));
    }
}
