//! Scene container and the geometry/material accessors used while shading.
//!
//! All accessors are keyed by (instance, element, uv) as reported by an
//! intersection, and return world-space quantities.

use std::f32::consts::PI;

use lumen_math::{transform_normal, Affine3A, Vec2, Vec3, Vec4};

use crate::camera::Camera;
use crate::implicit::Implicit;
use crate::material::{Material, MaterialKind, MaterialPoint};
use crate::shape::Shape;
use crate::subdiv::Subdiv;
use crate::texture::Texture;

/// A placed shape with a material.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Local-to-world transform
    pub frame: Affine3A,

    /// Index into `Scene::shapes`
    pub shape: usize,

    /// Index into `Scene::materials`
    pub material: usize,
}

/// Distant emitter surrounding the scene, optionally textured with an
/// equirectangular map.
#[derive(Clone, Debug)]
pub struct Environment {
    pub frame: Affine3A,
    pub emission: Vec3,
    pub emission_tex: Option<usize>,
}

impl Environment {
    pub fn constant(emission: Vec3) -> Self {
        Self {
            frame: Affine3A::IDENTITY,
            emission,
            emission_tex: None,
        }
    }

    /// Equirectangular coordinates of a world direction.
    pub fn eval_texcoord(&self, direction: Vec3) -> Vec2 {
        let wl = self.frame.inverse().transform_vector3(direction).normalize();
        let mut u = wl.z.atan2(wl.x) / (2.0 * PI);
        if u < 0.0 {
            u += 1.0;
        }
        Vec2::new(u, wl.y.clamp(-1.0, 1.0).acos() / PI)
    }

    /// World direction of equirectangular coordinates.
    pub fn eval_direction(&self, uv: Vec2) -> Vec3 {
        let (phi, theta) = (2.0 * PI * uv.x, PI * uv.y);
        let local = Vec3::new(phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
        self.frame.transform_vector3(local).normalize()
    }
}

/// A complete scene.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Scene name (usually the preset name)
    pub name: String,

    pub cameras: Vec<Camera>,
    pub instances: Vec<Instance>,
    pub shapes: Vec<Shape>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub environments: Vec<Environment>,

    /// Surfaces tessellated into `shapes` before rendering
    pub subdivs: Vec<Subdiv>,

    /// Scene-wide signed distance field for the implicit shaders
    pub implicit: Option<Implicit>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    pub fn add_shape(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    pub fn add_instance(&mut self, instance: Instance) -> usize {
        self.instances.push(instance);
        self.instances.len() - 1
    }

    pub fn add_environment(&mut self, environment: Environment) -> usize {
        self.environments.push(environment);
        self.environments.len() - 1
    }

    /// Add a shape and a material and place one instance of them.
    pub fn add_object(&mut self, shape: Shape, material: Material, frame: Affine3A) -> usize {
        let shape = self.add_shape(shape);
        let material = self.add_material(material);
        self.add_instance(Instance {
            frame,
            shape,
            material,
        })
    }

    /// Get total element count across all instances.
    pub fn total_element_count(&self) -> usize {
        self.instances
            .iter()
            .filter_map(|i| self.shapes.get(i.shape))
            .map(Shape::num_elements)
            .sum()
    }

    // ========================================================================
    // Surface accessors
    // ========================================================================

    fn shape_of(&self, instance: usize) -> (&Instance, &Shape) {
        let inst = &self.instances[instance];
        (inst, &self.shapes[inst.shape])
    }

    pub fn eval_position(&self, instance: usize, element: usize, uv: Vec2) -> Vec3 {
        let (inst, shape) = self.shape_of(instance);
        inst.frame.transform_point3(shape.eval_position(element, uv))
    }

    pub fn eval_element_normal(&self, instance: usize, element: usize) -> Vec3 {
        let (inst, shape) = self.shape_of(instance);
        transform_normal(&inst.frame, shape.element_normal(element))
    }

    pub fn eval_normal(&self, instance: usize, element: usize, uv: Vec2) -> Vec3 {
        let (inst, shape) = self.shape_of(instance);
        transform_normal(&inst.frame, shape.eval_normal(element, uv))
    }

    pub fn eval_texcoord(&self, instance: usize, element: usize, uv: Vec2) -> Vec2 {
        let (_, shape) = self.shape_of(instance);
        shape.eval_texcoord(element, uv)
    }

    /// Normal used for shading, facing `outgoing`.
    ///
    /// Dielectrics keep the geometric orientation so that the BSDF can tell
    /// entering from exiting.
    pub fn eval_shading_normal(
        &self,
        instance: usize,
        element: usize,
        uv: Vec2,
        outgoing: Vec3,
    ) -> Vec3 {
        let normal = self.eval_normal(instance, element, uv);
        let kind = self.materials[self.instances[instance].material].kind;
        if matches!(kind, MaterialKind::Refractive | MaterialKind::Subsurface) {
            normal
        } else if normal.dot(outgoing) >= 0.0 {
            normal
        } else {
            -normal
        }
    }

    /// Material point at a surface hit, with textures applied.
    pub fn eval_material(&self, instance: usize, element: usize, uv: Vec2) -> MaterialPoint {
        let texcoord = self.eval_texcoord(instance, element, uv);
        self.eval_material_at(self.instances[instance].material, texcoord)
    }

    /// Material point of a material id at the given texture coordinates.
    pub fn eval_material_at(&self, material: usize, texcoord: Vec2) -> MaterialPoint {
        let material = &self.materials[material];
        let color_tex = self.eval_texture(material.color_tex, texcoord);
        let emission_tex = self.eval_texture(material.emission_tex, texcoord);
        let roughness_tex = self.eval_texture(material.roughness_tex, texcoord);
        let scattering_tex = self.eval_texture(material.scattering_tex, texcoord);

        MaterialPoint::from_values(
            material,
            material.color * color_tex.truncate(),
            color_tex.w,
            material.emission * emission_tex.truncate(),
            roughness_tex.y,
            material.scattering * scattering_tex.truncate(),
        )
    }

    /// Whether crossing the instance's surface enters a medium.
    pub fn is_volumetric(&self, instance: usize) -> bool {
        self.materials[self.instances[instance].material]
            .kind
            .has_volume()
    }

    /// Radiance arriving from the environments along `direction`.
    pub fn eval_environment(&self, direction: Vec3) -> Vec3 {
        self.environments
            .iter()
            .map(|env| {
                let tex = env
                    .emission_tex
                    .map(|t| self.eval_texture(Some(t), env.eval_texcoord(direction)));
                env.emission * tex.unwrap_or(Vec4::ONE).truncate()
            })
            .sum()
    }

    fn eval_texture(&self, texture: Option<usize>, uv: Vec2) -> Vec4 {
        texture
            .and_then(|t| self.textures.get(t))
            .map_or(Vec4::ONE, |t| t.eval(uv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_scene() -> Scene {
        let mut scene = Scene::new("floor");
        scene.add_object(
            Shape::quad_xz(Vec2::splat(2.0)),
            Material::matte(Vec3::splat(0.5)),
            Affine3A::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        );
        scene
    }

    #[test]
    fn test_scene_creation() {
        let mut scene = floor_scene();
        let cube = scene.add_shape(Shape::cube(Vec3::ONE));
        let index = scene.add_instance(Instance {
            frame: Affine3A::from_translation(Vec3::new(3.0, 0.0, 0.0)),
            shape: cube,
            material: 0,
        });

        assert_eq!(index, 1);
        assert_eq!(scene.instances.len(), 2);
        assert_eq!(scene.total_element_count(), 7);
        let p = scene.eval_position(1, 0, Vec2::splat(0.5));
        assert!(p.x >= 2.0 - 1e-6 && p.x <= 4.0 + 1e-6, "{:?}", p);
    }

    #[test]
    fn test_world_space_accessors() {
        let scene = floor_scene();
        let p = scene.eval_position(0, 0, Vec2::splat(0.5));
        assert!((p - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);
        assert!((scene.eval_element_normal(0, 0) - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_shading_normal_faces_outgoing() {
        let mut scene = floor_scene();
        let n = scene.eval_shading_normal(0, 0, Vec2::splat(0.5), Vec3::NEG_Y);
        assert!((n - Vec3::NEG_Y).length() < 1e-6);

        scene.materials[0] = Material::refractive(Vec3::ONE, 0.0, 1.5);
        let n = scene.eval_shading_normal(0, 0, Vec2::splat(0.5), Vec3::NEG_Y);
        assert!((n - Vec3::Y).length() < 1e-6);
        assert!(scene.is_volumetric(0));
    }

    #[test]
    fn test_material_textures_modulate() {
        let mut scene = floor_scene();
        let tex = scene.add_texture(Texture::solid_color(Vec4::new(0.5, 1.0, 0.0, 0.25)));
        scene.materials[0].color = Vec3::ONE;
        scene.materials[0].color_tex = Some(tex);

        let mp = scene.eval_material(0, 0, Vec2::splat(0.5));
        assert!((mp.color - Vec3::new(0.5, 1.0, 0.0)).length() < 1e-6);
        assert!((mp.opacity - 0.25).abs() < 1e-6);
        assert_eq!(mp.kind, MaterialKind::Matte);
    }

    #[test]
    fn test_environment_lookup() {
        let mut scene = Scene::new("env");
        assert_eq!(scene.eval_environment(Vec3::Y), Vec3::ZERO);

        scene.add_environment(Environment::constant(Vec3::splat(2.0)));
        assert!((scene.eval_environment(Vec3::X) - Vec3::splat(2.0)).length() < 1e-6);

        let env = &scene.environments[0];
        for d in [Vec3::Y * 0.999 + Vec3::X * 0.04, Vec3::new(0.3, -0.2, 0.9)] {
            let d = d.normalize();
            let back = env.eval_direction(env.eval_texcoord(d));
            assert!((back - d).length() < 1e-4);
        }
    }

    #[test]
    fn test_environment_texture_orientation() {
        let mut scene = Scene::new("sky");
        // top row bright, bottom row dark
        let tex = scene.add_texture(Texture::new(
            1,
            2,
            vec![Vec4::ONE, Vec4::new(0.0, 0.0, 0.0, 1.0)],
            true,
        ));
        scene.add_environment(Environment {
            frame: Affine3A::IDENTITY,
            emission: Vec3::ONE,
            emission_tex: Some(tex),
        });
        let up = scene.eval_environment(Vec3::Y);
        let horizon = scene.eval_environment(Vec3::X);
        assert!((up.x - 1.0).abs() < 1e-5);
        assert!(horizon.x.abs() < 1e-5);
    }
}
