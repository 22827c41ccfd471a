//! Indexed shapes made of triangles or quads, stored in local space.

use lumen_math::geometry::{interpolate_quad, interpolate_triangle, quad_normal, triangle_normal};
use lumen_math::{Aabb, Vec2, Vec3};

/// An indexed mesh. A shape holds either triangles or quads.
///
/// `normals` and `texcoords` are optional per-vertex attributes; when empty
/// the element normal and the element uv are used instead.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub triangles: Vec<[u32; 3]>,
    pub quads: Vec<[u32; 4]>,
}

impl Shape {
    /// Number of primitive elements.
    pub fn num_elements(&self) -> usize {
        if !self.triangles.is_empty() {
            self.triangles.len()
        } else {
            self.quads.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.quads.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::enclosing(self.positions.iter().copied())
    }

    /// Local-space position at (element, uv).
    pub fn eval_position(&self, element: usize, uv: Vec2) -> Vec3 {
        if !self.triangles.is_empty() {
            let [a, b, c] = self.triangles[element];
            interpolate_triangle(
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
                uv.x,
                uv.y,
            )
        } else if !self.quads.is_empty() {
            let [a, b, c, d] = self.quads[element];
            interpolate_quad(
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
                self.positions[d as usize],
                uv.x,
                uv.y,
            )
        } else {
            Vec3::ZERO
        }
    }

    /// Local-space geometric normal of an element.
    pub fn element_normal(&self, element: usize) -> Vec3 {
        if !self.triangles.is_empty() {
            let [a, b, c] = self.triangles[element];
            triangle_normal(
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
            )
        } else if !self.quads.is_empty() {
            let [a, b, c, d] = self.quads[element];
            quad_normal(
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
                self.positions[d as usize],
            )
        } else {
            Vec3::ZERO
        }
    }

    /// Local-space interpolated normal, falling back to the element normal.
    pub fn eval_normal(&self, element: usize, uv: Vec2) -> Vec3 {
        if self.normals.is_empty() {
            return self.element_normal(element);
        }
        let n = if !self.triangles.is_empty() {
            let [a, b, c] = self.triangles[element];
            interpolate_triangle(
                self.normals[a as usize],
                self.normals[b as usize],
                self.normals[c as usize],
                uv.x,
                uv.y,
            )
        } else if !self.quads.is_empty() {
            let [a, b, c, d] = self.quads[element];
            interpolate_quad(
                self.normals[a as usize],
                self.normals[b as usize],
                self.normals[c as usize],
                self.normals[d as usize],
                uv.x,
                uv.y,
            )
        } else {
            return Vec3::ZERO;
        };
        n.normalize_or_zero()
    }

    /// Interpolated texture coordinates, or the element uv when absent.
    pub fn eval_texcoord(&self, element: usize, uv: Vec2) -> Vec2 {
        if self.texcoords.is_empty() {
            return uv;
        }
        if !self.triangles.is_empty() {
            let [a, b, c] = self.triangles[element];
            interpolate_triangle(
                self.texcoords[a as usize],
                self.texcoords[b as usize],
                self.texcoords[c as usize],
                uv.x,
                uv.y,
            )
        } else if !self.quads.is_empty() {
            let [a, b, c, d] = self.quads[element];
            interpolate_quad(
                self.texcoords[a as usize],
                self.texcoords[b as usize],
                self.texcoords[c as usize],
                self.texcoords[d as usize],
                uv.x,
                uv.y,
            )
        } else {
            uv
        }
    }

    // ========================================================================
    // Procedural shapes
    // ========================================================================

    /// Axis-aligned quad in the XZ plane centred at the origin, facing +Y.
    pub fn quad_xz(size: Vec2) -> Self {
        let (hx, hz) = (size.x * 0.5, size.y * 0.5);
        Self {
            positions: vec![
                Vec3::new(-hx, 0.0, hz),
                Vec3::new(hx, 0.0, hz),
                Vec3::new(hx, 0.0, -hz),
                Vec3::new(-hx, 0.0, -hz),
            ],
            normals: vec![Vec3::Y; 4],
            texcoords: vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ],
            quads: vec![[0, 1, 2, 3]],
            ..Default::default()
        }
    }

    /// Axis-aligned box centred at the origin, outward-facing quads.
    pub fn cube(half: Vec3) -> Self {
        let corners = |face: [[f32; 3]; 4]| face.map(|c| Vec3::from(c) * half);
        let faces = [
            corners([[-1., -1., 1.], [1., -1., 1.], [1., 1., 1.], [-1., 1., 1.]]),
            corners([[1., -1., -1.], [-1., -1., -1.], [-1., 1., -1.], [1., 1., -1.]]),
            corners([[1., -1., 1.], [1., -1., -1.], [1., 1., -1.], [1., 1., 1.]]),
            corners([[-1., -1., -1.], [-1., -1., 1.], [-1., 1., 1.], [-1., 1., -1.]]),
            corners([[-1., 1., 1.], [1., 1., 1.], [1., 1., -1.], [-1., 1., -1.]]),
            corners([[1., -1., 1.], [-1., -1., 1.], [-1., -1., -1.], [1., -1., -1.]]),
        ];

        let mut shape = Shape::default();
        for face in faces {
            let base = shape.positions.len() as u32;
            shape.positions.extend_from_slice(&face);
            shape.texcoords.extend_from_slice(&[
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ]);
            shape.quads.push([base, base + 1, base + 2, base + 3]);
        }
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_faces_up() {
        let q = Shape::quad_xz(Vec2::new(2.0, 2.0));
        assert_eq!(q.num_elements(), 1);
        assert!((q.element_normal(0) - Vec3::Y).length() < 1e-6);
        let c = q.eval_position(0, Vec2::new(0.5, 0.5));
        assert!(c.length() < 1e-6);
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = Shape::cube(Vec3::splat(0.5));
        assert_eq!(cube.quads.len(), 6);
        for e in 0..cube.num_elements() {
            let centre = cube.eval_position(e, Vec2::splat(0.5));
            let n = cube.element_normal(e);
            assert!(n.dot(centre) > 0.0, "face {} faces inward", e);
        }
    }

    #[test]
    fn test_texcoord_falls_back_to_uv() {
        let mut q = Shape::quad_xz(Vec2::ONE);
        q.texcoords.clear();
        let uv = Vec2::new(0.3, 0.6);
        assert_eq!(q.eval_texcoord(0, uv), uv);
    }

    #[test]
    fn test_triangle_interpolation() {
        let shape = Shape {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            triangles: vec![[0, 1, 2]],
            ..Default::default()
        };
        let p = shape.eval_position(0, Vec2::new(0.25, 0.5));
        assert!((p - Vec3::new(0.25, 0.5, 0.0)).length() < 1e-6);
        assert!((shape.eval_normal(0, Vec2::ZERO) - Vec3::Z).length() < 1e-6);
    }
}
