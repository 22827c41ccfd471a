//! Signed distance fields as a tree of primitives and CSG combinators.
//!
//! Distances are negative inside a solid. Each leaf carries a material id
//! that indexes `Scene::materials`; combinators forward the id of the
//! operand that determines the result.

use lumen_math::{Vec2, Vec3};

/// Distance to the nearest surface and the material there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdfSample {
    pub distance: f32,
    pub material: usize,
}

/// Primitive distance functions, defined around the origin.
#[derive(Clone, Debug, PartialEq)]
pub enum SdfShape {
    /// Half-space below the y = 0 plane
    Plane,
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    BoxFrame { half_extents: Vec3, edge: f32 },
    Torus { outer: f32, inner: f32 },
    CappedCone { height: f32, r1: f32, r2: f32 },
}

impl SdfShape {
    pub fn distance(&self, p: Vec3) -> f32 {
        match *self {
            SdfShape::Plane => p.y,
            SdfShape::Sphere { radius } => p.length() - radius,
            SdfShape::Box { half_extents } => sd_box(p, half_extents),
            SdfShape::BoxFrame { half_extents, edge } => sd_box_frame(p, half_extents, edge),
            SdfShape::Torus { outer, inner } => {
                let q = Vec2::new(Vec2::new(p.x, p.z).length() - outer, p.y);
                q.length() - inner
            }
            SdfShape::CappedCone { height, r1, r2 } => sd_capped_cone(p, height, r1, r2),
        }
    }
}

/// A scene-wide implicit field.
#[derive(Clone, Debug, PartialEq)]
pub enum Implicit {
    Primitive {
        shape: SdfShape,
        center: Vec3,
        material: usize,
    },
    Union(Box<Implicit>, Box<Implicit>),
    /// `base` with `cut` carved out
    Subtraction {
        cut: Box<Implicit>,
        base: Box<Implicit>,
    },
    Intersection(Box<Implicit>, Box<Implicit>),
}

impl Implicit {
    pub fn primitive(shape: SdfShape, center: Vec3, material: usize) -> Self {
        Implicit::Primitive {
            shape,
            center,
            material,
        }
    }

    pub fn union(self, other: Implicit) -> Self {
        Implicit::Union(Box::new(self), Box::new(other))
    }

    pub fn subtract(self, cut: Implicit) -> Self {
        Implicit::Subtraction {
            cut: Box::new(cut),
            base: Box::new(self),
        }
    }

    pub fn intersect(self, other: Implicit) -> Self {
        Implicit::Intersection(Box::new(self), Box::new(other))
    }

    /// Evaluate the field at `p`.
    pub fn eval(&self, p: Vec3) -> SdfSample {
        match self {
            Implicit::Primitive {
                shape,
                center,
                material,
            } => SdfSample {
                distance: shape.distance(p - *center),
                material: *material,
            },
            Implicit::Union(a, b) => {
                let (a, b) = (a.eval(p), b.eval(p));
                if a.distance < b.distance {
                    a
                } else {
                    b
                }
            }
            Implicit::Subtraction { cut, base } => {
                let (cut, base) = (cut.eval(p), base.eval(p));
                if -cut.distance > base.distance {
                    SdfSample {
                        distance: -cut.distance,
                        material: cut.material,
                    }
                } else {
                    base
                }
            }
            Implicit::Intersection(a, b) => {
                let (a, b) = (a.eval(p), b.eval(p));
                if a.distance > b.distance {
                    a
                } else {
                    b
                }
            }
        }
    }

    #[inline]
    pub fn distance(&self, p: Vec3) -> f32 {
        self.eval(p).distance
    }
}

// ============================================================================
// Primitive distance functions
// ============================================================================

fn sd_box(p: Vec3, b: Vec3) -> f32 {
    let q = p.abs() - b;
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

fn sd_box_frame(p: Vec3, b: Vec3, e: f32) -> f32 {
    let p = p.abs() - b;
    let q = (p + Vec3::splat(e)).abs() - Vec3::splat(e);
    let edge = |v: Vec3| v.max(Vec3::ZERO).length() + v.max_element().min(0.0);
    edge(Vec3::new(p.x, q.y, q.z))
        .min(edge(Vec3::new(q.x, p.y, q.z)))
        .min(edge(Vec3::new(q.x, q.y, p.z)))
}

fn sd_capped_cone(p: Vec3, h: f32, r1: f32, r2: f32) -> f32 {
    let q = Vec2::new(Vec2::new(p.x, p.z).length(), p.y);
    let k1 = Vec2::new(r2, h);
    let k2 = Vec2::new(r2 - r1, 2.0 * h);
    let ca = Vec2::new(
        q.x - q.x.min(if q.y < 0.0 { r1 } else { r2 }),
        q.y.abs() - h,
    );
    let cb = q - k1 + k2 * ((k1 - q).dot(k2) / k2.length_squared()).clamp(0.0, 1.0);
    let s = if cb.x < 0.0 && ca.y < 0.0 { -1.0 } else { 1.0 };
    s * ca.length_squared().min(cb.length_squared()).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_distance() {
        let s = Implicit::primitive(SdfShape::Sphere { radius: 1.0 }, Vec3::new(0.0, 2.0, 0.0), 3);
        let hit = s.eval(Vec3::new(0.0, 2.0, 3.0));
        assert!((hit.distance - 2.0).abs() < 1e-6);
        assert_eq!(hit.material, 3);
        assert!(s.distance(Vec3::new(0.0, 2.0, 0.0)) < 0.0);
    }

    #[test]
    fn test_box_distance() {
        let b = SdfShape::Box {
            half_extents: Vec3::ONE,
        };
        assert!((b.distance(Vec3::new(3.0, 0.0, 0.0)) - 2.0).abs() < 1e-6);
        assert!((b.distance(Vec3::ZERO) + 1.0).abs() < 1e-6);
        let corner = b.distance(Vec3::new(2.0, 2.0, 1.0));
        assert!((corner - 2f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_torus_and_cone() {
        let t = SdfShape::Torus {
            outer: 1.0,
            inner: 0.25,
        };
        assert!(t.distance(Vec3::new(1.0, 0.0, 0.0)) < 0.0);
        assert!((t.distance(Vec3::ZERO) - 0.75).abs() < 1e-6);

        let c = SdfShape::CappedCone {
            height: 1.0,
            r1: 1.0,
            r2: 0.5,
        };
        assert!(c.distance(Vec3::ZERO) < 0.0);
        assert!((c.distance(Vec3::new(0.0, 2.0, 0.0)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_box_frame_is_hollow() {
        let f = SdfShape::BoxFrame {
            half_extents: Vec3::ONE,
            edge: 0.1,
        };
        assert!(f.distance(Vec3::ZERO) > 0.5);
        assert!(f.distance(Vec3::new(0.95, 0.95, 0.0)) < 0.0);
    }

    #[test]
    fn test_combinators() {
        let floor = Implicit::primitive(SdfShape::Plane, Vec3::ZERO, 0);
        let ball = Implicit::primitive(SdfShape::Sphere { radius: 0.5 }, Vec3::new(0.0, 1.0, 0.0), 1);

        let scene = floor.clone().union(ball.clone());
        assert_eq!(scene.eval(Vec3::new(0.0, 1.2, 0.0)).material, 1);
        assert_eq!(scene.eval(Vec3::new(5.0, 0.1, 0.0)).material, 0);

        let dent = Implicit::primitive(SdfShape::Sphere { radius: 0.5 }, Vec3::ZERO, 2);
        let carved = floor.clone().subtract(dent);
        let s = carved.eval(Vec3::new(0.0, -0.4, 0.0));
        assert!((s.distance - 0.1).abs() < 1e-5);
        assert_eq!(s.material, 2);
        assert_eq!(carved.eval(Vec3::new(3.0, -0.4, 0.0)).material, 0);

        let lens = floor.intersect(ball);
        let s = lens.eval(Vec3::new(0.0, 1.0, 0.0));
        assert!((s.distance - 1.0).abs() < 1e-6);
    }
}
