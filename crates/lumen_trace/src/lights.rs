//! Light set construction and light importance sampling.
//!
//! Emissive instances are sampled by area, textured environments by
//! luminance over their pixels. The density of a direction is the sum over
//! every light that can produce it, weighted by the uniform light choice.

use std::f32::consts::PI;

use lumen_math::geometry::{quad_area, triangle_area};
use lumen_math::sampling::{
    sample_discrete, sample_discrete_pdf, sample_sphere, sample_sphere_pdf, sample_triangle,
    sample_uniform, sample_uniform_pdf,
};
use lumen_math::{luminance, Ray, Vec2, Vec3};
use lumen_scene::Scene;
use rayon::prelude::*;

use crate::bvh::Intersector;
use crate::params::Params;

/// Maximum number of surface crossings summed by the instance light pdf.
const MAX_LIGHT_HITS: usize = 100;

/// An emitter the integrators can sample directly.
#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    /// Emissive instance with a cumulative area distribution over its
    /// elements, in world units.
    Instance { instance: usize, cdf: Vec<f32> },

    /// Environment with a cumulative distribution over its texture pixels,
    /// or `None` for a uniform sphere emitter.
    Environment {
        environment: usize,
        cdf: Option<Vec<f32>>,
    },
}

/// Lights of a scene, fixed for the duration of a render.
#[derive(Clone, Debug, Default)]
pub struct LightSet {
    pub lights: Vec<Light>,
}

impl LightSet {
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

fn running_sum(weights: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut total = 0.0;
    weights
        .map(|w| {
            total += w;
            total
        })
        .collect()
}

fn instance_cdf(scene: &Scene, instance: usize) -> Option<Vec<f32>> {
    let inst = &scene.instances[instance];
    if scene.materials[inst.material].emission == Vec3::ZERO {
        return None;
    }
    let shape = &scene.shapes[inst.shape];
    let p = |i: u32| inst.frame.transform_point3(shape.positions[i as usize]);

    let cdf = if !shape.triangles.is_empty() {
        running_sum(
            shape
                .triangles
                .iter()
                .map(|&[a, b, c]| triangle_area(p(a), p(b), p(c))),
        )
    } else if !shape.quads.is_empty() {
        running_sum(
            shape
                .quads
                .iter()
                .map(|&[a, b, c, d]| quad_area(p(a), p(b), p(c), p(d))),
        )
    } else {
        return None;
    };
    Some(cdf)
}

fn environment_cdf(scene: &Scene, environment: usize) -> Option<Option<Vec<f32>>> {
    let env = &scene.environments[environment];
    if env.emission == Vec3::ZERO {
        return None;
    }
    let Some(texture) = env.emission_tex.and_then(|t| scene.textures.get(t)) else {
        return Some(None);
    };
    if texture.pixels.is_empty() {
        return Some(None);
    }

    let (width, height) = (texture.width, texture.height);
    let cdf = running_sum((0..width * height).map(|idx| {
        let (i, j) = (idx % width, idx / width);
        let theta = (j as f32 + 0.5) * PI / height as f32;
        luminance(texture.lookup(i, j).truncate()) * theta.sin()
    }));
    Some(Some(cdf))
}

#[inline]
fn has_mass(cdf: &[f32]) -> bool {
    cdf.last().is_some_and(|&total| total > 0.0)
}

/// Collect the emitters of a scene.
///
/// Instances without emission or without triangles/quads are skipped, as
/// are emitters whose distribution has no mass.
pub fn make_lights(scene: &Scene, params: &Params) -> LightSet {
    let instance_light = |instance: usize| {
        instance_cdf(scene, instance)
            .filter(|cdf| has_mass(cdf))
            .map(|cdf| Light::Instance { instance, cdf })
    };
    let mut lights: Vec<Light> = if params.noparallel {
        (0..scene.instances.len()).filter_map(instance_light).collect()
    } else {
        (0..scene.instances.len())
            .into_par_iter()
            .filter_map(instance_light)
            .collect()
    };

    for environment in 0..scene.environments.len() {
        match environment_cdf(scene, environment) {
            Some(Some(cdf)) if has_mass(&cdf) => lights.push(Light::Environment {
                environment,
                cdf: Some(cdf),
            }),
            Some(Some(_)) => {
                log::warn!("Environment {} has a black emission texture", environment)
            }
            Some(None) => lights.push(Light::Environment {
                environment,
                cdf: None,
            }),
            None => {}
        }
    }

    if lights.is_empty() {
        log::warn!("Scene '{}' has no lights", scene.name);
    } else {
        log::info!("Collected {} lights", lights.len());
    }
    LightSet { lights }
}

/// Sample a direction from `position` towards a light.
///
/// `rl` picks the light, `rel` the element or pixel and `ruv` the point on
/// the element. Returns the zero vector when the set is empty.
pub fn sample_lights(
    scene: &Scene,
    lights: &LightSet,
    position: Vec3,
    rl: f32,
    rel: f32,
    ruv: Vec2,
) -> Vec3 {
    if lights.is_empty() {
        return Vec3::ZERO;
    }

    match &lights.lights[sample_uniform(lights.len(), rl)] {
        Light::Instance { instance, cdf } => {
            let element = sample_discrete(cdf, rel);
            let shape = &scene.shapes[scene.instances[*instance].shape];
            let uv = if !shape.triangles.is_empty() {
                sample_triangle(ruv)
            } else {
                ruv
            };
            let lposition = scene.eval_position(*instance, element, uv);
            (lposition - position).normalize_or_zero()
        }
        Light::Environment {
            environment,
            cdf: Some(cdf),
        } => {
            let env = &scene.environments[*environment];
            let Some(texture) = env.emission_tex.and_then(|t| scene.textures.get(t)) else {
                return sample_sphere(ruv);
            };
            let idx = sample_discrete(cdf, rel);
            let uv = Vec2::new(
                ((idx % texture.width) as f32 + 0.5) / texture.width as f32,
                ((idx / texture.width) as f32 + 0.5) / texture.height as f32,
            );
            env.eval_direction(uv)
        }
        Light::Environment { cdf: None, .. } => sample_sphere(ruv),
    }
}

/// Solid-angle density of `sample_lights` producing `direction`.
pub fn sample_lights_pdf(
    scene: &Scene,
    bvh: &dyn Intersector,
    lights: &LightSet,
    position: Vec3,
    direction: Vec3,
) -> f32 {
    if lights.is_empty() {
        return 0.0;
    }

    let mut pdf = 0.0;
    for light in &lights.lights {
        match light {
            Light::Instance { instance, cdf } => {
                let area = cdf.last().copied().unwrap_or(0.0);
                let mut lpdf = 0.0;
                let mut next = position;
                // every crossing of the emitter along the line contributes
                for _ in 0..MAX_LIGHT_HITS {
                    let isec = bvh.intersect_instance(*instance, &Ray::new(next, direction));
                    if !isec.hit {
                        break;
                    }
                    let lnormal = scene.eval_element_normal(*instance, isec.element);
                    let lposition = scene.eval_position(*instance, isec.element, isec.uv);
                    let cosine = lnormal.dot(direction).abs();
                    if cosine > 0.0 && area > 0.0 {
                        lpdf += lposition.distance_squared(position) / (cosine * area);
                    }
                    next = lposition + direction * 1e-3;
                }
                pdf += lpdf;
            }
            Light::Environment {
                environment,
                cdf: Some(cdf),
            } => {
                let env = &scene.environments[*environment];
                let Some(texture) = env.emission_tex.and_then(|t| scene.textures.get(t)) else {
                    pdf += sample_sphere_pdf();
                    continue;
                };
                let (width, height) = (texture.width, texture.height);
                let texcoord = env.eval_texcoord(direction);
                let i = ((texcoord.x * width as f32) as usize).min(width - 1);
                let j = ((texcoord.y * height as f32) as usize).min(height - 1);
                let total = cdf.last().copied().unwrap_or(1.0);
                let prob = sample_discrete_pdf(cdf, j * width + i) / total;
                let angle = (2.0 * PI / width as f32)
                    * (PI / height as f32)
                    * (PI * (j as f32 + 0.5) / height as f32).sin();
                pdf += prob / angle;
            }
            Light::Environment { cdf: None, .. } => pdf += sample_sphere_pdf(),
        }
    }
    pdf * sample_uniform_pdf(lights.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::make_bvh;
    use lumen_math::Affine3A;
    use lumen_scene::{presets, Environment, Material, Shape, Texture};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    fn rand2(rng: &mut Pcg32) -> Vec2 {
        Vec2::new(rng.gen(), rng.gen())
    }

    /// Integrate the light pdf over the sphere of directions.
    fn integrate_pdf(scene: &Scene, position: Vec3, n: usize) -> f32 {
        let params = Params::default();
        let bvh = make_bvh(scene, &params);
        let lights = make_lights(scene, &params);
        let mut rng = Pcg32::seed_from_u64(1234);
        let mut sum = 0.0;
        for _ in 0..n {
            let direction = sample_sphere(rand2(&mut rng));
            sum += sample_lights_pdf(scene, &bvh, &lights, position, direction) / sample_sphere_pdf();
        }
        sum / n as f32
    }

    #[test]
    fn test_quad_light_cdf_matches_area() {
        let scene = presets::floor_under_light(0.7, 20.0, 2.0);
        let lights = make_lights(&scene, &Params::default());
        assert_eq!(lights.len(), 1);
        match &lights.lights[0] {
            Light::Instance { instance, cdf } => {
                assert_eq!(*instance, 1);
                assert!((cdf.last().copied().unwrap() - 1.0).abs() < 1e-5);
            }
            other => panic!("unexpected light {:?}", other),
        }
    }

    #[test]
    fn test_scaled_light_area_is_world_space() {
        let mut scene = Scene::new("scaled");
        scene.add_object(
            Shape::quad_xz(Vec2::ONE),
            Material::emissive(Vec3::ONE),
            Affine3A::from_scale(Vec3::new(2.0, 1.0, 3.0)),
        );
        let lights = make_lights(&scene, &Params::default());
        let Light::Instance { cdf, .. } = &lights.lights[0] else {
            panic!("expected an instance light");
        };
        assert!((cdf[0] - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_cdf_is_monotonic() {
        let scene = presets::envlight_scene();
        let lights = make_lights(&scene, &Params::default());
        assert!(!lights.is_empty());
        for light in &lights.lights {
            let cdf = match light {
                Light::Instance { cdf, .. } => cdf,
                Light::Environment { cdf: Some(cdf), .. } => cdf,
                Light::Environment { cdf: None, .. } => continue,
            };
            assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
            assert!(*cdf.last().unwrap() > 0.0);
        }
    }

    #[test]
    fn test_dark_geometry_is_not_a_light() {
        let mut scene = Scene::new("dark");
        scene.add_object(
            Shape::quad_xz(Vec2::ONE),
            Material::matte(Vec3::ONE),
            Affine3A::IDENTITY,
        );
        scene.add_object(Shape::default(), Material::emissive(Vec3::ONE), Affine3A::IDENTITY);
        let lights = make_lights(&scene, &Params::default());
        assert!(lights.is_empty());
    }

    #[test]
    fn test_empty_light_set() {
        let scene = Scene::new("empty");
        let params = Params::default();
        let bvh = make_bvh(&scene, &params);
        let lights = make_lights(&scene, &params);
        assert_eq!(
            sample_lights(&scene, &lights, Vec3::ZERO, 0.5, 0.5, Vec2::splat(0.5)),
            Vec3::ZERO
        );
        assert_eq!(sample_lights_pdf(&scene, &bvh, &lights, Vec3::ZERO, Vec3::Y), 0.0);
    }

    #[test]
    fn test_area_light_pdf_integrates_to_one() {
        let scene = presets::floor_under_light(0.7, 20.0, 2.0);
        let integral = integrate_pdf(&scene, Vec3::new(0.1, 0.5, -0.2), 400_000);
        assert!((integral - 1.0).abs() < 0.05, "integral {}", integral);
    }

    #[test]
    fn test_closed_emitter_pdf_sums_every_crossing() {
        // rays through a cube cross a front and a back face
        let mut scene = Scene::new("cube");
        scene.add_object(
            Shape::cube(Vec3::splat(0.5)),
            Material::emissive(Vec3::ONE),
            Affine3A::IDENTITY,
        );
        let integral = integrate_pdf(&scene, Vec3::new(0.2, 1.5, -1.1), 400_000);
        assert!((integral - 1.0).abs() < 0.05, "integral {}", integral);
    }

    #[test]
    fn test_constant_environment_pdf() {
        let mut scene = Scene::new("sky");
        scene.add_environment(Environment::constant(Vec3::ONE));
        let integral = integrate_pdf(&scene, Vec3::ZERO, 1000);
        assert!((integral - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_textured_environment_pdf_integrates_to_one() {
        let mut scene = Scene::new("sky");
        let tex = scene.add_texture(presets::sky_texture(32, 16, Vec3::new(0.3, 0.8, 0.2), 5.0));
        scene.add_environment(Environment {
            frame: Affine3A::IDENTITY,
            emission: Vec3::ONE,
            emission_tex: Some(tex),
        });
        let integral = integrate_pdf(&scene, Vec3::ZERO, 400_000);
        assert!((integral - 1.0).abs() < 0.05, "integral {}", integral);
    }

    #[test]
    fn test_environment_samples_follow_brightness() {
        // one bright pixel in the upper hemisphere
        let (w, h) = (8, 4);
        let mut pixels = vec![lumen_math::Vec4::new(0.01, 0.01, 0.01, 1.0); w * h];
        pixels[w + 3] = lumen_math::Vec4::splat(100.0);
        let mut scene = Scene::new("spot");
        let tex = scene.add_texture(Texture::new(w, h, pixels, true));
        scene.add_environment(Environment {
            frame: Affine3A::IDENTITY,
            emission: Vec3::ONE,
            emission_tex: Some(tex),
        });
        let lights = make_lights(&scene, &Params::default());

        let target = scene.environments[0].eval_direction(Vec2::new(3.5 / w as f32, 1.5 / h as f32));
        let mut rng = Pcg32::seed_from_u64(8);
        let mut close = 0;
        for _ in 0..1000 {
            let d = sample_lights(&scene, &lights, Vec3::ZERO, rng.gen(), rng.gen(), rand2(&mut rng));
            if d.dot(target) > 0.999 {
                close += 1;
            }
        }
        assert!(close > 900, "{} of 1000", close);
    }

    #[test]
    fn test_sampled_directions_hit_the_light() {
        let scene = presets::floor_under_light(0.7, 20.0, 2.0);
        let params = Params::default();
        let bvh = make_bvh(&scene, &params);
        let lights = make_lights(&scene, &params);
        let mut rng = Pcg32::seed_from_u64(4);
        let position = Vec3::new(0.3, 0.0, 0.2);
        for _ in 0..200 {
            let d = sample_lights(&scene, &lights, position, rng.gen(), rng.gen(), rand2(&mut rng));
            let isec = bvh.intersect(&Ray::new(position, d));
            assert!(isec.hit);
            assert_eq!(isec.instance, 1);
            assert!(sample_lights_pdf(&scene, &bvh, &lights, position, d) > 0.0);
        }
    }
}
