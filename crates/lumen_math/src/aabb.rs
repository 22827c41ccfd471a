use crate::{Ray, Vec3};

/// Axis-aligned bounding box used by the BVH.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty box (min > max, contains nothing).
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box from two corner points in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box enclosing all `points`.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| acc.expand(p))
    }

    /// Grow the box to contain `p`.
    pub fn expand(&self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Create a box that surrounds two other boxes.
    pub fn surrounding(a: &Aabb, b: &Aabb) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Index of the longest axis (0=X, 1=Y, 2=Z).
    pub fn longest_axis(&self) -> usize {
        let size = self.max - self.min;
        if size.x > size.y && size.x > size.z {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        }
    }

    /// Slab test against the ray range `[ray.tmin, tmax]`.
    ///
    /// `inv_dir` is the componentwise reciprocal of the ray direction, hoisted
    /// by callers that test many boxes against the same ray.
    #[inline]
    pub fn hit(&self, ray: &Ray, inv_dir: Vec3, tmax: f32) -> bool {
        let t0 = (self.min - ray.origin) * inv_dir;
        let t1 = (self.max - ray.origin) * inv_dir;
        let tnear = t0.min(t1).max_element().max(ray.tmin);
        let tfar = t0.max(t1).min_element().min(tmax);
        // widen slightly so rays grazing flat boxes are not dropped
        tnear <= tfar * 1.000_000_24
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
