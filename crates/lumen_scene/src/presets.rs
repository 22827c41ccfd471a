//! Small scenes built in code.
//!
//! These stand in for scene files: the CLI renders them and the integrator
//! tests use `floor_under_light` as an analytic reference.

use std::f32::consts::{FRAC_PI_2, PI};

use lumen_math::{Affine3A, Quat, Vec2, Vec3};

use crate::camera::Camera;
use crate::implicit::{Implicit, SdfShape};
use crate::material::{Material, MaterialKind};
use crate::scene::{Environment, Scene};
use crate::shape::Shape;
use crate::subdiv::Subdiv;
use crate::texture::Texture;

fn placed(rotation: Quat, translation: Vec3) -> Affine3A {
    Affine3A::from_rotation_translation(rotation, translation)
}

/// Walls and ceiling light of a unit Cornell box spanning x,z in [-1, 1]
/// and y in [0, 2].
fn cornell_shell(scene: &mut Scene) {
    let white = Vec3::splat(0.725);
    let wall = Shape::quad_xz(Vec2::splat(2.0));

    scene.add_object(wall.clone(), Material::matte(white), Affine3A::IDENTITY);
    scene.add_object(
        wall.clone(),
        Material::matte(white),
        placed(Quat::from_rotation_x(PI), Vec3::new(0.0, 2.0, 0.0)),
    );
    scene.add_object(
        wall.clone(),
        Material::matte(white),
        placed(Quat::from_rotation_x(FRAC_PI_2), Vec3::new(0.0, 1.0, -1.0)),
    );
    scene.add_object(
        wall.clone(),
        Material::matte(Vec3::new(0.63, 0.065, 0.05)),
        placed(Quat::from_rotation_z(-FRAC_PI_2), Vec3::new(-1.0, 1.0, 0.0)),
    );
    scene.add_object(
        wall,
        Material::matte(Vec3::new(0.14, 0.45, 0.091)),
        placed(Quat::from_rotation_z(FRAC_PI_2), Vec3::new(1.0, 1.0, 0.0)),
    );
    scene.add_object(
        Shape::quad_xz(Vec2::splat(0.5)),
        Material::emissive(Vec3::new(17.0, 12.0, 4.0)),
        placed(Quat::from_rotation_x(PI), Vec3::new(0.0, 1.99, 0.0)),
    );

    scene.add_camera(Camera::look_at(
        Vec3::new(0.0, 1.0, 3.9),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::Y,
        39.0,
        1.0,
    ));
}

/// The classic Cornell box with two diffuse blocks.
pub fn cornell_box() -> Scene {
    let mut scene = Scene::new("cornell");
    cornell_shell(&mut scene);

    let white = Vec3::splat(0.725);
    scene.add_object(
        Shape::cube(Vec3::new(0.3, 0.6, 0.3)),
        Material::matte(white),
        placed(Quat::from_rotation_y(0.3), Vec3::new(-0.35, 0.6, -0.3)),
    );
    scene.add_object(
        Shape::cube(Vec3::splat(0.3)),
        Material::matte(white),
        placed(Quat::from_rotation_y(-0.3), Vec3::new(0.35, 0.3, 0.3)),
    );
    scene
}

/// Cornell box holding participating media: a scattering fog block, a
/// subsurface block and a clear glass block.
pub fn volume_box() -> Scene {
    let mut scene = Scene::new("volume");
    cornell_shell(&mut scene);

    scene.add_object(
        Shape::cube(Vec3::new(0.3, 0.6, 0.3)),
        Material::volumetric(Vec3::splat(0.5), Vec3::splat(0.9), 0.5),
        placed(Quat::from_rotation_y(0.3), Vec3::new(-0.4, 0.6, -0.3)),
    );
    scene.add_object(
        Shape::cube(Vec3::splat(0.25)),
        Material {
            kind: MaterialKind::Subsurface,
            color: Vec3::new(0.8, 0.35, 0.2),
            scattering: Vec3::new(0.9, 0.6, 0.4),
            trdepth: 0.1,
            roughness: 0.1,
            ior: 1.4,
            ..Default::default()
        },
        placed(Quat::from_rotation_y(-0.3), Vec3::new(0.45, 0.25, 0.35)),
    );
    scene.add_object(
        Shape::cube(Vec3::splat(0.2)),
        Material::refractive(Vec3::ONE, 0.0, 1.5),
        placed(Quat::from_rotation_y(0.6), Vec3::new(0.1, 0.2, 0.6)),
    );
    scene
}

/// Signed distance field scene lit by a constant sky.
pub fn implicit_scene() -> Scene {
    let mut scene = Scene::new("implicit");
    let floor = scene.add_material(Material::matte(Vec3::splat(0.6)));
    let red = scene.add_material(Material::glossy(Vec3::new(0.7, 0.1, 0.1), 0.2));
    let gold = scene.add_material(Material::reflective(Vec3::new(1.0, 0.78, 0.34), 0.15));
    let blue = scene.add_material(Material::gltfpbr(Vec3::new(0.2, 0.3, 0.8), 0.4, 0.5));
    let white = scene.add_material(Material::matte(Vec3::splat(0.8)));

    let carved_box = Implicit::primitive(
        SdfShape::Box {
            half_extents: Vec3::splat(0.3),
        },
        Vec3::new(0.0, 0.3, -1.2),
        white,
    )
    .subtract(Implicit::primitive(
        SdfShape::Sphere { radius: 0.38 },
        Vec3::new(0.0, 0.3, -1.2),
        red,
    ));

    let lens = Implicit::primitive(SdfShape::Sphere { radius: 0.4 }, Vec3::new(1.0, 0.4, -1.0), blue)
        .intersect(Implicit::primitive(
            SdfShape::Sphere { radius: 0.4 },
            Vec3::new(1.3, 0.4, -1.0),
            blue,
        ));

    let field = Implicit::primitive(SdfShape::Plane, Vec3::ZERO, floor)
        .union(Implicit::primitive(
            SdfShape::Sphere { radius: 0.5 },
            Vec3::new(0.0, 0.5, 0.0),
            red,
        ))
        .union(Implicit::primitive(
            SdfShape::Torus {
                outer: 0.4,
                inner: 0.15,
            },
            Vec3::new(1.3, 0.15, 0.2),
            gold,
        ))
        .union(Implicit::primitive(
            SdfShape::BoxFrame {
                half_extents: Vec3::splat(0.4),
                edge: 0.05,
            },
            Vec3::new(-1.3, 0.4, 0.0),
            blue,
        ))
        .union(Implicit::primitive(
            SdfShape::CappedCone {
                height: 0.4,
                r1: 0.35,
                r2: 0.1,
            },
            Vec3::new(-1.0, 0.4, -1.3),
            gold,
        ))
        .union(carved_box)
        .union(lens);

    scene.implicit = Some(field);
    scene.add_environment(Environment::constant(Vec3::splat(1.0)));
    scene.add_camera(Camera::look_at(
        Vec3::new(0.0, 1.6, 4.0),
        Vec3::new(0.0, 0.3, -0.3),
        Vec3::Y,
        40.0,
        1.5,
    ));
    scene
}

/// Equirectangular sky: a white-to-blue gradient plus a small sun disk.
pub fn sky_texture(width: usize, height: usize, sun: Vec3, sun_radiance: f32) -> Texture {
    let frame = Environment::constant(Vec3::ONE);
    let sun = sun.normalize();
    let cos_sun = (2.5f32).to_radians().cos();

    let mut pixels = Vec::with_capacity(width * height);
    for j in 0..height {
        for i in 0..width {
            let uv = Vec2::new(
                (i as f32 + 0.5) / width as f32,
                (j as f32 + 0.5) / height as f32,
            );
            let d = frame.eval_direction(uv);
            let a = 0.5 * (d.y + 1.0);
            let mut color = Vec3::ONE * (1.0 - a) + Vec3::new(0.5, 0.7, 1.0) * a;
            if d.dot(sun) > cos_sun {
                color += Vec3::new(1.0, 0.9, 0.7) * sun_radiance;
            }
            pixels.push(color.extend(1.0));
        }
    }
    Texture::new(width, height, pixels, true)
}

/// Control cage of a cube centred at the origin, shared vertices.
pub fn cube_cage(half: f32) -> (Vec<[u32; 4]>, Vec<Vec3>) {
    let positions = [
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [1.0, 1.0, -1.0],
    ]
    .map(|p| Vec3::from(p) * half)
    .to_vec();
    let quads = vec![
        [0, 1, 2, 3],
        [4, 5, 6, 7],
        [1, 4, 7, 2],
        [5, 0, 3, 6],
        [3, 2, 7, 6],
        [1, 0, 5, 4],
    ];
    (quads, positions)
}

/// Objects under a textured sky: a smoothed subdivision blob, a glossy
/// floor and a translucent sheet.
pub fn envlight_scene() -> Scene {
    let mut scene = Scene::new("envlight");

    let sky = scene.add_texture(sky_texture(128, 64, Vec3::new(0.4, 0.8, 0.3), 40.0));
    scene.add_environment(Environment {
        frame: Affine3A::IDENTITY,
        emission: Vec3::ONE,
        emission_tex: Some(sky),
    });

    scene.add_object(
        Shape::quad_xz(Vec2::splat(8.0)),
        Material::glossy(Vec3::splat(0.4), 0.3),
        Affine3A::IDENTITY,
    );

    // the blob's shape slot is filled by tessellation
    let (quadspos, positions) = cube_cage(0.6);
    let blob = scene.add_object(
        Shape::default(),
        Material::gltfpbr(Vec3::new(0.9, 0.6, 0.2), 0.25, 1.0),
        Affine3A::from_translation(Vec3::new(-0.6, 0.6, 0.0)),
    );
    scene.subdivs.push(Subdiv {
        shape: scene.instances[blob].shape,
        quadspos,
        positions,
        subdivisions: 3,
        smooth: true,
        ..Default::default()
    });

    scene.add_object(
        Shape::cube(Vec3::splat(0.4)),
        Material::reflective(Vec3::splat(0.9), 0.0),
        Affine3A::from_translation(Vec3::new(0.9, 0.4, -0.5)),
    );
    scene.add_object(
        Shape::quad_xz(Vec2::new(1.2, 1.6)),
        Material {
            kind: MaterialKind::Transparent,
            color: Vec3::new(0.6, 0.9, 0.6),
            roughness: 0.0,
            opacity: 0.6,
            ..Default::default()
        },
        placed(Quat::from_rotation_x(FRAC_PI_2), Vec3::new(0.6, 0.8, 0.9)),
    );

    scene.add_camera(Camera::look_at(
        Vec3::new(0.0, 1.4, 4.5),
        Vec3::new(0.0, 0.5, 0.0),
        Vec3::Y,
        35.0,
        1.5,
    ));
    scene
}

/// A large matte floor at y = 0 under a downward-facing 1x1 quad light at
/// `height`, seen by a narrow camera one unit above the floor looking
/// straight down.
pub fn floor_under_light(albedo: f32, radiance: f32, height: f32) -> Scene {
    let mut scene = Scene::new("floor");
    scene.add_object(
        Shape::quad_xz(Vec2::splat(20.0)),
        Material::matte(Vec3::splat(albedo)),
        Affine3A::IDENTITY,
    );
    scene.add_object(
        Shape::quad_xz(Vec2::ONE),
        Material::emissive(Vec3::splat(radiance)),
        placed(Quat::from_rotation_x(PI), Vec3::new(0.0, height, 0.0)),
    );
    scene.add_camera(Camera::look_at(
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::ZERO,
        Vec3::NEG_Z,
        2.0,
        1.0,
    ));
    scene
}

/// Names accepted by `by_name`.
pub const PRESETS: [&str; 5] = ["cornell", "volume", "implicit", "envlight", "floor"];

/// Look up a preset by name.
pub fn by_name(name: &str) -> Option<Scene> {
    match name {
        "cornell" => Some(cornell_box()),
        "volume" => Some(volume_box()),
        "implicit" => Some(implicit_scene()),
        "envlight" => Some(envlight_scene()),
        "floor" => Some(floor_under_light(0.7, 20.0, 2.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subdiv::tessellate_surfaces;

    #[test]
    fn test_all_presets_build() {
        for name in PRESETS {
            let mut scene = by_name(name).expect("preset");
            tessellate_surfaces(&mut scene).expect("tessellation");
            assert_eq!(scene.cameras.len(), 1, "{}", name);
            for instance in &scene.instances {
                assert!(instance.shape < scene.shapes.len());
                assert!(instance.material < scene.materials.len());
                assert!(!scene.shapes[instance.shape].is_empty(), "{}", name);
            }
        }
        assert!(by_name("missing").is_none());
    }

    #[test]
    fn test_cornell_walls_face_inward() {
        let scene = cornell_box();
        let centre = Vec3::new(0.0, 1.0, 0.0);
        for instance in 0..5 {
            let p = scene.eval_position(instance, 0, Vec2::splat(0.5));
            let n = scene.eval_element_normal(instance, 0);
            assert!(n.dot(centre - p) > 0.0, "wall {} faces out", instance);
        }
    }

    #[test]
    fn test_floor_light_faces_down() {
        let scene = floor_under_light(0.7, 20.0, 2.0);
        let n = scene.eval_element_normal(1, 0);
        assert!((n - Vec3::NEG_Y).length() < 1e-5);
        assert!((scene.eval_position(1, 0, Vec2::splat(0.5)).y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_sky_has_a_sun() {
        // aim the sun at the centre of the first pixel
        let sun = Environment::constant(Vec3::ONE).eval_direction(Vec2::new(0.5 / 32.0, 0.5 / 16.0));
        let tex = sky_texture(32, 16, sun, 100.0);
        let top = tex.lookup(0, 0);
        let horizon = tex.lookup(0, 8);
        assert!(top.x > 50.0);
        assert!(horizon.x < 2.0);
    }
}
