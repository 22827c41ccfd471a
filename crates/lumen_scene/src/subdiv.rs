//! Catmull-Clark subdivision surfaces and displacement.
//!
//! A `Subdiv` holds face-varying quads (separate topology for positions and
//! texture coordinates). Tessellation refines it, splits it into a single
//! indexed mesh and writes the triangulated result into its target shape.
//! Triangles are encoded as quads whose last two indices coincide.

use std::collections::HashMap;
use std::ops::{Add, Mul, Sub};

use lumen_math::geometry::{quad_area, quad_normal, triangle_area, triangle_normal};
use lumen_math::{mean, Vec2, Vec3};

use crate::error::{SceneError, SceneResult};
use crate::scene::Scene;
use crate::shape::Shape;
use crate::texture::Texture;

/// A subdivision surface tessellated into `Scene::shapes[shape]`.
#[derive(Clone, Debug, Default)]
pub struct Subdiv {
    /// Target shape index
    pub shape: usize,

    pub quadspos: Vec<[u32; 4]>,
    pub quadstexcoord: Vec<[u32; 4]>,
    pub positions: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,

    /// Number of Catmull-Clark levels
    pub subdivisions: u32,

    /// Emit per-vertex normals
    pub smooth: bool,

    /// Displacement scale along the normal
    pub displacement: f32,
    pub displacement_tex: Option<usize>,
}

impl Subdiv {
    /// Refine, split and triangulate this surface.
    pub fn tessellate(&self, displacement_tex: Option<&Texture>) -> Shape {
        let mut quadspos = self.quadspos.clone();
        let mut positions = self.positions.clone();
        let mut quadstexcoord = self.quadstexcoord.clone();
        let mut texcoords = self.texcoords.clone();
        let mut quadsnorm = Vec::new();
        let mut normals = Vec::new();

        if self.subdivisions > 0 {
            for _ in 0..self.subdivisions {
                catmull_clark(&mut quadspos, &mut positions, false);
            }
            for _ in 0..self.subdivisions {
                catmull_clark(&mut quadstexcoord, &mut texcoords, true);
            }
            if self.smooth {
                normals = quads_normals(&quadspos, &positions);
                quadsnorm = quadspos.clone();
            }
        }

        let mut shape = split_facevarying(
            &quadspos,
            &quadsnorm,
            &quadstexcoord,
            &positions,
            &normals,
            &texcoords,
        );
        shape.triangles = quads_to_triangles(&shape.quads);
        shape.quads.clear();

        if let Some(texture) = displacement_tex {
            if self.displacement != 0.0 && !shape.triangles.is_empty() {
                displace(&mut shape, texture, self.displacement, self.smooth);
            }
        }

        shape
    }
}

/// Tessellate every subdivision surface of the scene into its target shape.
pub fn tessellate_surfaces(scene: &mut Scene) -> SceneResult<()> {
    for (idx, subdiv) in scene.subdivs.iter().enumerate() {
        if subdiv.shape >= scene.shapes.len() {
            return Err(SceneError::MissingShape {
                subdiv: idx,
                shape: subdiv.shape,
            });
        }
        let displacement_tex = match subdiv.displacement_tex {
            Some(t) => Some(scene.textures.get(t).ok_or(SceneError::MissingTexture {
                subdiv: idx,
                texture: t,
            })?),
            None => None,
        };

        let shape = subdiv.tessellate(displacement_tex);
        log::debug!(
            "Tessellated subdiv {} into {} triangles ({} levels)",
            idx,
            shape.triangles.len(),
            subdiv.subdivisions
        );
        scene.shapes[subdiv.shape] = shape;
    }

    if !scene.subdivs.is_empty() {
        log::info!("Tessellated {} subdivision surfaces", scene.subdivs.len());
    }
    Ok(())
}

fn displace(shape: &mut Shape, texture: &Texture, scale: f32, smooth: bool) {
    if shape.normals.is_empty() {
        shape.normals = triangles_normals(&shape.triangles, &shape.positions);
    }
    for (idx, position) in shape.positions.iter_mut().enumerate() {
        let uv = shape.texcoords.get(idx).copied().unwrap_or(Vec2::ZERO);
        let mut disp = mean(texture.eval(uv).truncate());
        if !texture.hdr {
            disp -= 0.5;
        }
        *position += shape.normals[idx] * scale * disp;
    }
    if smooth {
        shape.normals = triangles_normals(&shape.triangles, &shape.positions);
    } else {
        shape.normals.clear();
    }
}

// ============================================================================
// Edge map
// ============================================================================

/// Undirected edges of a quad mesh with the number of adjacent faces.
struct EdgeMap {
    index: HashMap<(u32, u32), usize>,
    edges: Vec<[u32; 2]>,
    faces: Vec<u32>,
}

impl EdgeMap {
    fn new(quads: &[[u32; 4]]) -> Self {
        let mut map = Self {
            index: HashMap::new(),
            edges: Vec::new(),
            faces: Vec::new(),
        };
        for q in quads {
            for i in 0..4 {
                let (a, b) = (q[i], q[(i + 1) % 4]);
                if a != b {
                    map.insert(a, b);
                }
            }
        }
        map
    }

    fn insert(&mut self, a: u32, b: u32) {
        let key = (a.min(b), a.max(b));
        match self.index.get(&key) {
            Some(&idx) => self.faces[idx] += 1,
            None => {
                self.index.insert(key, self.edges.len());
                self.edges.push([key.0, key.1]);
                self.faces.push(1);
            }
        }
    }

    fn edge_index(&self, a: u32, b: u32) -> u32 {
        self.index[&(a.min(b), a.max(b))] as u32
    }

    fn boundary(&self) -> Vec<[u32; 2]> {
        self.edges
            .iter()
            .zip(&self.faces)
            .filter(|(_, n)| **n < 2)
            .map(|(e, _)| *e)
            .collect()
    }
}

// ============================================================================
// Catmull-Clark
// ============================================================================

/// One level of Catmull-Clark subdivision.
///
/// With `lock_boundary` the boundary vertices stay in place (used for
/// texture coordinates); otherwise boundaries are smoothed as creases.
pub fn catmull_clark<T>(quads: &mut Vec<[u32; 4]>, verts: &mut Vec<T>, lock_boundary: bool)
where
    T: Copy + Default + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>,
{
    if quads.is_empty() {
        return;
    }

    let emap = EdgeMap::new(quads);
    let boundary = emap.boundary();
    let nv = verts.len() as u32;
    let ne = emap.edges.len() as u32;

    // vertices, then edge midpoints, then face centroids
    let mut tverts = verts.clone();
    tverts.extend(
        emap.edges
            .iter()
            .map(|&[a, b]| (verts[a as usize] + verts[b as usize]) * 0.5),
    );
    tverts.extend(quads.iter().map(|q| {
        let [a, b, c, d] = q.map(|i| verts[i as usize]);
        if q[2] != q[3] {
            (a + b + c + d) * 0.25
        } else {
            (a + b + c) * (1.0 / 3.0)
        }
    }));

    let edge_vert = |a: u32, b: u32| nv + emap.edge_index(a, b);
    let mut tquads = Vec::with_capacity(quads.len() * 4);
    for (i, q) in quads.iter().enumerate() {
        let f = nv + ne + i as u32;
        let corners: &[u32] = if q[2] != q[3] { &q[..] } else { &q[..3] };
        let n = corners.len();
        for k in 0..n {
            let v = corners[k];
            let next = corners[(k + 1) % n];
            let prev = corners[(k + n - 1) % n];
            tquads.push([v, edge_vert(v, next), f, edge_vert(prev, v)]);
        }
    }

    let mut tboundary = Vec::with_capacity(boundary.len() * 2);
    for &[a, b] in &boundary {
        let m = edge_vert(a, b);
        tboundary.push([a, m]);
        tboundary.push([m, b]);
    }

    // valence class: 0 locked, 1 crease, 2 interior
    let mut valence = vec![2u8; tverts.len()];
    for &[a, b] in &tboundary {
        let class = if lock_boundary { 0 } else { 1 };
        valence[a as usize] = class;
        valence[b as usize] = class;
    }

    let mut avert = vec![T::default(); tverts.len()];
    let mut acount = vec![0u32; tverts.len()];
    if lock_boundary {
        for &[a, b] in &tboundary {
            for v in [a as usize, b as usize] {
                avert[v] = avert[v] + tverts[v];
                acount[v] += 1;
            }
        }
    } else {
        for &[a, b] in &tboundary {
            let c = (tverts[a as usize] + tverts[b as usize]) * 0.5;
            for v in [a as usize, b as usize] {
                if valence[v] == 1 {
                    avert[v] = avert[v] + c;
                    acount[v] += 1;
                }
            }
        }
    }
    for q in &tquads {
        let [a, b, c, d] = q.map(|i| tverts[i as usize]);
        let centroid = (a + b + c + d) * 0.25;
        for &v in q {
            let v = v as usize;
            if valence[v] == 2 {
                avert[v] = avert[v] + centroid;
                acount[v] += 1;
            }
        }
    }

    for (i, v) in avert.iter_mut().enumerate() {
        if acount[i] == 0 {
            *v = tverts[i];
            continue;
        }
        let count = acount[i] as f32;
        *v = *v * (1.0 / count);
        if valence[i] == 2 {
            *v = tverts[i] + (*v - tverts[i]) * (4.0 / count);
        }
    }

    *verts = avert;
    *quads = tquads;
}

// ============================================================================
// Mesh utilities
// ============================================================================

/// Area-weighted vertex normals of a quad mesh.
pub fn quads_normals(quads: &[[u32; 4]], positions: &[Vec3]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for q in quads {
        let [a, b, c, d] = q.map(|i| positions[i as usize]);
        let weighted = if q[2] != q[3] {
            quad_normal(a, b, c, d) * quad_area(a, b, c, d)
        } else {
            triangle_normal(a, b, c) * triangle_area(a, b, c)
        };
        let corners: &[u32] = if q[2] != q[3] { &q[..] } else { &q[..3] };
        for &v in corners {
            normals[v as usize] += weighted;
        }
    }
    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

/// Area-weighted vertex normals of a triangle mesh.
pub fn triangles_normals(triangles: &[[u32; 3]], positions: &[Vec3]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for t in triangles {
        let [a, b, c] = t.map(|i| positions[i as usize]);
        let weighted = (b - a).cross(c - a);
        for &v in t {
            normals[v as usize] += weighted;
        }
    }
    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

/// Split each quad into two triangles; degenerate quads yield one.
pub fn quads_to_triangles(quads: &[[u32; 4]]) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity(quads.len() * 2);
    for &[x, y, z, w] in quads {
        triangles.push([x, y, w]);
        if z != w {
            triangles.push([z, w, y]);
        }
    }
    triangles
}

/// Merge face-varying topologies into one indexed shape with quads.
///
/// Empty index arrays mean the attribute is absent.
pub fn split_facevarying(
    quadspos: &[[u32; 4]],
    quadsnorm: &[[u32; 4]],
    quadstexcoord: &[[u32; 4]],
    positions: &[Vec3],
    normals: &[Vec3],
    texcoords: &[Vec2],
) -> Shape {
    let mut shape = Shape::default();
    let mut vertex_ids: HashMap<(u32, Option<u32>, Option<u32>), u32> = HashMap::new();

    for (fid, qpos) in quadspos.iter().enumerate() {
        let mut quad = [0u32; 4];
        for c in 0..4 {
            let key = (
                qpos[c],
                quadsnorm.get(fid).map(|q| q[c]),
                quadstexcoord.get(fid).map(|q| q[c]),
            );
            quad[c] = *vertex_ids.entry(key).or_insert_with(|| {
                let id = shape.positions.len() as u32;
                shape.positions.push(positions[key.0 as usize]);
                if let Some(n) = key.1 {
                    shape.normals.push(normals[n as usize]);
                }
                if let Some(t) = key.2 {
                    shape.texcoords.push(texcoords[t as usize]);
                }
                id
            });
        }
        shape.quads.push(quad);
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_cube() -> (Vec<[u32; 4]>, Vec<Vec3>) {
        crate::presets::cube_cage(1.0)
    }

    #[test]
    fn test_edge_map_counts() {
        let (quads, _) = shared_cube();
        let emap = EdgeMap::new(&quads);
        assert_eq!(emap.edges.len(), 12);
        assert!(emap.boundary().is_empty());

        let open = EdgeMap::new(&quads[..1]);
        assert_eq!(open.boundary().len(), 4);
    }

    #[test]
    fn test_catmull_clark_cube_corner() {
        let (mut quads, mut positions) = shared_cube();
        catmull_clark(&mut quads, &mut positions, false);

        assert_eq!(quads.len(), 24);
        assert_eq!(positions.len(), 8 + 12 + 6);
        // classic rule for a valence-3 corner of a cube: 5/9 of the original
        let expected = Vec3::new(-1.0, -1.0, 1.0) * (5.0 / 9.0);
        assert!((positions[0] - expected).length() < 1e-5);
        for p in &positions {
            assert!(p.length() < 3f32.sqrt());
        }
    }

    #[test]
    fn test_locked_boundary_stays_put() {
        let mut quads = vec![[0, 1, 2, 3]];
        let mut uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        catmull_clark(&mut quads, &mut uvs, true);
        assert_eq!(quads.len(), 4);
        assert_eq!(uvs[2], Vec2::new(1.0, 1.0));
        // face centre
        assert!((uvs[8] - Vec2::splat(0.5)).length() < 1e-6);
    }

    #[test]
    fn test_quads_to_triangles() {
        let tris = quads_to_triangles(&[[0, 1, 2, 3], [4, 5, 6, 6]]);
        assert_eq!(tris, vec![[0, 1, 3], [2, 3, 1], [4, 5, 6]]);
    }

    #[test]
    fn test_split_facevarying_dedups() {
        let quads = vec![[0, 1, 2, 3], [1, 4, 5, 2]];
        let positions = vec![Vec3::ZERO; 6];
        let shape = split_facevarying(&quads, &[], &[], &positions, &[], &[]);
        assert_eq!(shape.positions.len(), 6);
        assert!(shape.normals.is_empty());

        // distinct texcoords on the shared edge split the vertices
        let uvq = vec![[0, 1, 2, 3], [4, 5, 6, 7]];
        let uvs = vec![Vec2::ZERO; 8];
        let shape = split_facevarying(&quads, &[], &uvq, &positions, &[], &uvs);
        assert_eq!(shape.positions.len(), 8);
        assert_eq!(shape.texcoords.len(), 8);
    }

    #[test]
    fn test_tessellate_surfaces_smooth_cube() {
        let (quadspos, positions) = shared_cube();
        let mut scene = Scene::new("subdiv");
        let target = scene.add_shape(Shape::default());
        scene.subdivs.push(Subdiv {
            shape: target,
            quadspos,
            positions,
            subdivisions: 2,
            smooth: true,
            ..Default::default()
        });

        tessellate_surfaces(&mut scene).expect("tessellation");
        let shape = &scene.shapes[target];
        assert_eq!(shape.triangles.len(), 6 * 16 * 2);
        assert!(shape.quads.is_empty());
        assert_eq!(shape.normals.len(), shape.positions.len());
        for (p, n) in shape.positions.iter().zip(&shape.normals) {
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.dot(*p) > 0.0);
        }
    }

    #[test]
    fn test_displacement_moves_along_normal() {
        let mut scene = Scene::new("disp");
        let target = scene.add_shape(Shape::default());
        let tex = scene.add_texture(Texture::solid_color(lumen_math::Vec4::ONE));
        scene.subdivs.push(Subdiv {
            shape: target,
            quadspos: vec![[0, 1, 2, 3]],
            quadstexcoord: vec![[0, 1, 2, 3]],
            positions: vec![
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
            ],
            texcoords: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
            displacement: 0.1,
            displacement_tex: Some(tex),
            ..Default::default()
        });

        tessellate_surfaces(&mut scene).expect("tessellation");
        let shape = &scene.shapes[target];
        assert_eq!(shape.triangles.len(), 2);
        for p in &shape.positions {
            assert!((p.y - 0.1).abs() < 1e-6);
        }
        assert!(shape.normals.is_empty());
    }

    #[test]
    fn test_missing_shape_is_an_error() {
        let mut scene = Scene::new("broken");
        scene.subdivs.push(Subdiv {
            shape: 3,
            ..Default::default()
        });
        assert!(matches!(
            tessellate_surfaces(&mut scene),
            Err(SceneError::MissingShape { shape: 3, .. })
        ));
    }
}
