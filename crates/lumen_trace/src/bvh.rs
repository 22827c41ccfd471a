//! Two-level bounding volume hierarchy.
//!
//! Each shape gets one BVH over its elements in local space; a top-level
//! BVH over world-space instance bounds dispatches rays to them. Rays are
//! moved into instance space with the inverse frame and an unnormalized
//! direction, so hit distances stay in world units.

use lumen_math::{Aabb, Affine3A, Ray, Vec2, Vec3};
use lumen_scene::{Scene, Shape};
use rayon::prelude::*;

use crate::params::Params;

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Result of a ray query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    pub hit: bool,
    pub instance: usize,
    pub element: usize,
    pub uv: Vec2,
    pub distance: f32,
}

impl Default for Intersection {
    fn default() -> Self {
        Self {
            hit: false,
            instance: 0,
            element: 0,
            uv: Vec2::ZERO,
            distance: f32::MAX,
        }
    }
}

/// Ray queries the integrators need from an acceleration structure.
pub trait Intersector: Send + Sync {
    /// Closest hit along the ray.
    fn intersect(&self, ray: &Ray) -> Intersection;

    /// Closest hit along the ray against one instance only.
    fn intersect_instance(&self, instance: usize, ray: &Ray) -> Intersection;
}

// ============================================================================
// Generic BVH over indexed bounds
// ============================================================================

/// BVH node - either a branch with two children or a leaf with item ids.
enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        items: Vec<u32>,
        bbox: Aabb,
    },
    Empty,
}

impl BvhNode {
    fn new(bounds: &[Aabb]) -> Self {
        let items: Vec<u32> = (0..bounds.len() as u32)
            .filter(|&i| !bounds[i as usize].is_empty())
            .collect();
        if items.is_empty() {
            return BvhNode::Empty;
        }
        Self::build(items, bounds)
    }

    /// Median split on the longest axis of the centroid bounds.
    fn build(mut items: Vec<u32>, bounds: &[Aabb]) -> Self {
        let bbox = items
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| Aabb::surrounding(&acc, &bounds[i as usize]));

        if items.len() <= LEAF_MAX_SIZE {
            return BvhNode::Leaf { items, bbox };
        }

        let centroid_bounds = Aabb::enclosing(items.iter().map(|&i| bounds[i as usize].centroid()));
        let axis = centroid_bounds.longest_axis();

        items.sort_unstable_by(|&a, &b| {
            let ca = bounds[a as usize].centroid()[axis];
            let cb = bounds[b as usize].centroid()[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let right = items.split_off(items.len() / 2);
        BvhNode::Branch {
            left: Box::new(Self::build(items, bounds)),
            right: Box::new(Self::build(right, bounds)),
            bbox,
        }
    }

    fn bounds(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    /// Visit items whose boxes the ray reaches before `*tmax`. `hit` returns
    /// the new closest distance when the item is hit closer.
    fn traverse<F>(&self, ray: &Ray, inv_dir: Vec3, tmax: &mut f32, hit: &mut F)
    where
        F: FnMut(u32, f32) -> Option<f32>,
    {
        match self {
            BvhNode::Empty => {}
            BvhNode::Leaf { items, bbox } => {
                if !bbox.hit(ray, inv_dir, *tmax) {
                    return;
                }
                for &item in items {
                    if let Some(t) = hit(item, *tmax) {
                        *tmax = t;
                    }
                }
            }
            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, inv_dir, *tmax) {
                    return;
                }
                left.traverse(ray, inv_dir, tmax, hit);
                right.traverse(ray, inv_dir, tmax, hit);
            }
        }
    }
}

// ============================================================================
// Element intersection
// ============================================================================

const BARY_EPS: f32 = 1e-5;

/// Möller-Trumbore ray-triangle intersection. Returns distance and the
/// barycentric coordinates weighting `p1` and `p2`.
#[inline]
pub fn intersect_triangle(ray: &Ray, p0: Vec3, p1: Vec3, p2: Vec3, tmax: f32) -> Option<(f32, Vec2)> {
    let edge1 = p1 - p0;
    let edge2 = p2 - p0;

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < 1e-12 {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - p0;
    // Edges get a sliver of slack so rays along a shared edge (a quad's
    // split diagonal) hit at least one side.
    let u = f * s.dot(h);
    if !(-BARY_EPS..=1.0 + BARY_EPS).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < -BARY_EPS || u + v > 1.0 + BARY_EPS {
        return None;
    }

    let t = f * edge2.dot(q);
    if t < ray.tmin || t > tmax {
        return None;
    }
    Some((t, Vec2::new(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))))
}

/// Quad as triangles (p0, p1, p3) and (p2, p3, p1); the uv of the second
/// half is mirrored so both halves share one parametrization.
#[inline]
pub fn intersect_quad(
    ray: &Ray,
    p0: Vec3,
    p1: Vec3,
    p2: Vec3,
    p3: Vec3,
    tmax: f32,
) -> Option<(f32, Vec2)> {
    if p2 == p3 {
        return intersect_triangle(ray, p0, p1, p3, tmax);
    }
    let mut best = intersect_triangle(ray, p0, p1, p3, tmax);
    let limit = best.map_or(tmax, |(t, _)| t);
    if let Some((t, uv)) = intersect_triangle(ray, p2, p3, p1, limit) {
        best = Some((t, Vec2::ONE - uv));
    }
    best
}

fn intersect_element(shape: &Shape, element: usize, ray: &Ray, tmax: f32) -> Option<(f32, Vec2)> {
    let p = |i: u32| shape.positions[i as usize];
    if !shape.triangles.is_empty() {
        let [a, b, c] = shape.triangles[element];
        intersect_triangle(ray, p(a), p(b), p(c), tmax)
    } else {
        let [a, b, c, d] = shape.quads[element];
        intersect_quad(ray, p(a), p(b), p(c), p(d), tmax)
    }
}

fn element_bounds(shape: &Shape) -> Vec<Aabb> {
    // pad thin dimensions to avoid degenerate boxes
    let pad = |b: Aabb| Aabb::from_points(b.min - Vec3::splat(1e-4), b.max + Vec3::splat(1e-4));
    let p = |i: u32| shape.positions[i as usize];
    if !shape.triangles.is_empty() {
        shape
            .triangles
            .iter()
            .map(|&[a, b, c]| pad(Aabb::enclosing([p(a), p(b), p(c)])))
            .collect()
    } else {
        shape
            .quads
            .iter()
            .map(|&[a, b, c, d]| pad(Aabb::enclosing([p(a), p(b), p(c), p(d)])))
            .collect()
    }
}

fn transform_aabb(frame: &Affine3A, b: &Aabb) -> Aabb {
    if b.is_empty() {
        return Aabb::EMPTY;
    }
    Aabb::enclosing((0..8).map(|corner| {
        let p = Vec3::new(
            if corner & 1 == 0 { b.min.x } else { b.max.x },
            if corner & 2 == 0 { b.min.y } else { b.max.y },
            if corner & 4 == 0 { b.min.z } else { b.max.z },
        );
        frame.transform_point3(p)
    }))
}

#[inline]
fn inverse_direction(d: Vec3) -> Vec3 {
    Vec3::ONE / d
}

// ============================================================================
// Scene BVH
// ============================================================================

/// BVH over one shape's elements in local space.
struct ShapeBvh {
    root: BvhNode,
}

impl ShapeBvh {
    fn new(shape: &Shape) -> Self {
        Self {
            root: BvhNode::new(&element_bounds(shape)),
        }
    }

    fn intersect(&self, shape: &Shape, ray: &Ray, tmax: &mut f32) -> Option<(usize, Vec2)> {
        let inv_dir = inverse_direction(ray.direction);
        let mut found = None;
        self.root.traverse(ray, inv_dir, tmax, &mut |element, limit| {
            let (t, uv) = intersect_element(shape, element as usize, ray, limit)?;
            found = Some((element as usize, uv));
            Some(t)
        });
        found
    }
}

/// Two-level BVH over a scene. Holds its own copy of the geometry so it can
/// be shared across render threads independently of the scene borrow.
pub struct SceneBvh {
    shapes: Vec<Shape>,
    shape_bvhs: Vec<ShapeBvh>,
    instance_shapes: Vec<usize>,
    inv_frames: Vec<Affine3A>,
    top: BvhNode,
}

/// Build the acceleration structure for a scene.
///
/// Shape BVHs are built in parallel unless `params.noparallel` is set.
pub fn make_bvh(scene: &Scene, params: &Params) -> SceneBvh {
    let shape_bvhs: Vec<ShapeBvh> = if params.noparallel {
        scene.shapes.iter().map(ShapeBvh::new).collect()
    } else {
        scene.shapes.par_iter().map(ShapeBvh::new).collect()
    };

    let instance_bounds: Vec<Aabb> = scene
        .instances
        .iter()
        .map(|instance| transform_aabb(&instance.frame, &shape_bvhs[instance.shape].root.bounds()))
        .collect();

    let bvh = SceneBvh {
        shapes: scene.shapes.clone(),
        shape_bvhs,
        instance_shapes: scene.instances.iter().map(|i| i.shape).collect(),
        inv_frames: scene.instances.iter().map(|i| i.frame.inverse()).collect(),
        top: BvhNode::new(&instance_bounds),
    };

    log::info!(
        "Built BVH: {} shapes, {} instances, {} elements",
        scene.shapes.len(),
        scene.instances.len(),
        scene.total_element_count()
    );
    bvh
}

impl SceneBvh {
    /// Ray in the instance's local space, with the same parametrization.
    #[inline]
    fn local_ray(&self, instance: usize, ray: &Ray) -> Ray {
        let inv = &self.inv_frames[instance];
        Ray::with_range(
            inv.transform_point3(ray.origin),
            inv.transform_vector3(ray.direction),
            ray.tmin,
            ray.tmax,
        )
    }

    fn intersect_one(&self, instance: usize, ray: &Ray, tmax: &mut f32) -> Option<(usize, Vec2)> {
        let shape = self.instance_shapes[instance];
        let local = self.local_ray(instance, ray);
        self.shape_bvhs[shape].intersect(&self.shapes[shape], &local, tmax)
    }
}

impl Intersector for SceneBvh {
    fn intersect(&self, ray: &Ray) -> Intersection {
        let inv_dir = inverse_direction(ray.direction);
        let mut tmax = ray.tmax;
        let mut isec = Intersection::default();

        self.top.traverse(ray, inv_dir, &mut tmax, &mut |instance, limit| {
            let mut t = limit;
            let (element, uv) = self.intersect_one(instance as usize, ray, &mut t)?;
            isec = Intersection {
                hit: true,
                instance: instance as usize,
                element,
                uv,
                distance: t,
            };
            Some(t)
        });
        isec
    }

    fn intersect_instance(&self, instance: usize, ray: &Ray) -> Intersection {
        if instance >= self.inv_frames.len() {
            return Intersection::default();
        }
        let mut t = ray.tmax;
        match self.intersect_one(instance, ray, &mut t) {
            Some((element, uv)) => Intersection {
                hit: true,
                instance,
                element,
                uv,
                distance: t,
            },
            None => Intersection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Quat;
    use lumen_scene::{presets, Instance, Material};

    fn grid_scene() -> Scene {
        let mut scene = Scene::new("grid");
        let quad = scene.add_shape(Shape::quad_xz(Vec2::splat(0.8)));
        let material = scene.add_material(Material::matte(Vec3::splat(0.5)));
        for i in 0..10 {
            for j in 0..10 {
                scene.add_instance(Instance {
                    frame: Affine3A::from_translation(Vec3::new(i as f32, 0.0, j as f32)),
                    shape: quad,
                    material,
                });
            }
        }
        scene
    }

    #[test]
    fn test_triangle_hit_and_miss() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z);
        let (t, uv) = intersect_triangle(&ray, Vec3::ZERO, Vec3::X, Vec3::Y, f32::MAX).unwrap();
        assert!((t - 1.0).abs() < 1e-6);
        assert!((uv - Vec2::new(0.25, 0.25)).length() < 1e-6);

        let ray = Ray::new(Vec3::new(0.75, 0.75, 1.0), Vec3::NEG_Z);
        assert!(intersect_triangle(&ray, Vec3::ZERO, Vec3::X, Vec3::Y, f32::MAX).is_none());
    }

    #[test]
    fn test_quad_uv_matches_interpolation() {
        let shape = Shape::quad_xz(Vec2::splat(2.0));
        for target in [Vec2::new(0.2, 0.3), Vec2::new(0.8, 0.7)] {
            let p = shape.eval_position(0, target);
            let ray = Ray::new(p + Vec3::Y, Vec3::NEG_Y);
            let (_, uv) = intersect_element(&shape, 0, &ray, f32::MAX).unwrap();
            assert!((uv - target).length() < 1e-5, "{:?} vs {:?}", uv, target);
        }
    }

    #[test]
    fn test_quad_diagonal_is_watertight() {
        let shape = Shape::quad_xz(Vec2::splat(2.0));
        let rays = [
            Ray::new(Vec3::new(0.3, 1.0, 0.3), Vec3::NEG_Y),
            Ray::new(Vec3::new(0.0, 4.9, 0.0), Vec3::new(-0.13, -0.98, -0.13).normalize()),
        ];
        for ray in rays {
            let (t, uv) = intersect_element(&shape, 0, &ray, f32::MAX).expect("diagonal leak");
            assert!(t > 0.0);
            assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
        }
    }

    #[test]
    fn test_bvh_finds_closest_instance() {
        let scene = grid_scene();
        let bvh = make_bvh(&scene, &Params::default());

        let ray = Ray::new(Vec3::new(5.1, 3.0, 7.2), Vec3::NEG_Y);
        let isec = bvh.intersect(&ray);
        assert!(isec.hit);
        assert_eq!(isec.instance, 5 * 10 + 7);
        assert!((isec.distance - 3.0).abs() < 1e-5);

        let miss = Ray::new(Vec3::new(5.5, 3.0, 7.5), Vec3::NEG_Y);
        assert!(!bvh.intersect(&miss).hit);
    }

    #[test]
    fn test_scaled_instance_keeps_world_distance() {
        let mut scene = Scene::new("scaled");
        scene.add_object(
            Shape::cube(Vec3::splat(0.5)),
            Material::matte(Vec3::ONE),
            Affine3A::from_scale_rotation_translation(
                Vec3::splat(4.0),
                Quat::from_rotation_y(0.3),
                Vec3::new(0.0, 0.0, -10.0),
            ),
        );
        let bvh = make_bvh(&scene, &Params::default());
        let isec = bvh.intersect(&Ray::new(Vec3::ZERO, Vec3::NEG_Z));
        assert!(isec.hit);
        let p = scene.eval_position(isec.instance, isec.element, isec.uv);
        assert!((p.length() - isec.distance).abs() < 1e-3);
        assert!(isec.distance > 7.0 && isec.distance < 8.5);
    }

    #[test]
    fn test_intersect_instance_ignores_others() {
        let scene = grid_scene();
        let bvh = make_bvh(&scene, &Params::default());
        let ray = Ray::new(Vec3::new(0.1, 3.0, 0.1), Vec3::NEG_Y);
        assert!(bvh.intersect_instance(0, &ray).hit);
        assert!(!bvh.intersect_instance(1, &ray).hit);
        assert!(!bvh.intersect_instance(1000, &ray).hit);
    }

    #[test]
    fn test_serial_and_parallel_builds_agree() {
        let scene = presets::cornell_box();
        let serial = make_bvh(
            &scene,
            &Params {
                noparallel: true,
                ..Default::default()
            },
        );
        let parallel = make_bvh(&scene, &Params::default());
        let camera = &scene.cameras[0];
        for i in 0..8 {
            for j in 0..8 {
                let uv = Vec2::new((i as f32 + 0.5) / 8.0, (j as f32 + 0.5) / 8.0);
                let ray = camera.eval_camera(uv, Vec2::ZERO);
                let a = serial.intersect(&ray);
                let b = parallel.intersect(&ray);
                assert!(a.hit && b.hit);
                assert_eq!(a.instance, b.instance);
                assert!((a.distance - b.distance).abs() < 1e-6);
            }
        }
    }
}
