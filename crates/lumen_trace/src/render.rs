//! Progressive render driver.
//!
//! A `RenderState` accumulates one sample per pixel per `render_samples`
//! call. Every pixel owns its random stream, so a pass gives the same result
//! whether pixels are visited serially or in parallel.

use lumen_math::{Vec2, Vec4};
use lumen_scene::{Camera, Scene};
use rand::Rng;
use rand_pcg::Pcg32;
use rayon::prelude::*;

use crate::bvh::Intersector;
use crate::error::{TraceError, TraceResult};
use crate::lights::LightSet;
use crate::params::Params;
use crate::shaders::{get_shader, ShaderFn};

const MASTER_SEED: u64 = 1301081;
const MASTER_STREAM: u64 = 0xda3e39cb94b95bdb;
const PIXEL_SEED: u64 = 961748941;

/// Linear RGBA image, row-major from the top-left pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vec4>,
}

impl Image {
    /// Create an image filled with transparent black.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; width * height],
        }
    }

    /// Get the pixel at (i, j).
    pub fn get(&self, i: usize, j: usize) -> Vec4 {
        self.pixels[j * self.width + i]
    }
}

/// Accumulation buffers of a progressive render.
#[derive(Clone, Debug)]
pub struct RenderState {
    pub width: usize,
    pub height: usize,

    /// Passes accumulated so far
    pub samples: u32,

    /// Summed RGBA radiance per pixel
    pub image: Vec<Vec4>,

    /// Samples taken per pixel
    pub hits: Vec<u32>,

    /// One random stream per pixel
    pub rngs: Vec<Pcg32>,
}

/// Allocate the buffers and per-pixel random streams for a render.
///
/// Fails before anything is rendered when the parameters are invalid, the
/// camera does not exist, or an implicit shader is requested for a scene
/// without an implicit field.
pub fn make_state(scene: &Scene, params: &Params) -> TraceResult<RenderState> {
    params.validate()?;
    let camera = scene
        .cameras
        .get(params.camera)
        .ok_or(TraceError::MissingCamera(params.camera))?;
    if params.shader.needs_implicit() && scene.implicit.is_none() {
        return Err(TraceError::MissingImplicit(params.shader));
    }

    let (width, height) = camera.image_size(params.resolution);
    let mut master = Pcg32::new(MASTER_SEED, MASTER_STREAM);
    let rngs = (0..width * height)
        .map(|_| Pcg32::new(PIXEL_SEED, master.gen_range(0..1u64 << 31) / 2 + 1))
        .collect();

    log::info!(
        "Render state {}x{} with shader {}",
        width,
        height,
        params.shader
    );

    Ok(RenderState {
        width,
        height,
        samples: 0,
        image: vec![Vec4::ZERO; width * height],
        hits: vec![0; width * height],
        rngs,
    })
}

/// Everything a pixel sample reads.
struct PassContext<'a> {
    scene: &'a Scene,
    bvh: &'a dyn Intersector,
    lights: &'a LightSet,
    params: &'a Params,
    camera: &'a Camera,
    shader: ShaderFn,
    width: usize,
    height: usize,
}

impl PassContext<'_> {
    /// Radiance of one camera sample through pixel `idx`.
    fn sample_pixel(&self, idx: usize, rng: &mut Pcg32) -> Vec4 {
        let (i, j) = (idx % self.width, idx / self.width);
        let puv = if self.params.samples == 1 {
            Vec2::splat(0.5)
        } else {
            Vec2::new(rng.gen(), rng.gen())
        };
        let luv = Vec2::new(rng.gen(), rng.gen());
        let uv = Vec2::new(
            (i as f32 + puv.x) / self.width as f32,
            (j as f32 + puv.y) / self.height as f32,
        );
        let ray = self.camera.eval_camera(uv, luv);

        let radiance = (self.shader)(self.scene, self.bvh, self.lights, &ray, rng, self.params);
        if radiance.is_finite() {
            radiance
        } else {
            Vec4::ZERO
        }
    }
}

/// Add one sample to every pixel.
///
/// Does nothing once `params.samples` passes have been accumulated.
pub fn render_samples(
    state: &mut RenderState,
    scene: &Scene,
    bvh: &dyn Intersector,
    lights: &LightSet,
    params: &Params,
) {
    if state.samples >= params.samples {
        return;
    }
    let Some(camera) = scene.cameras.get(params.camera) else {
        log::warn!("Camera {} does not exist, skipping pass", params.camera);
        return;
    };

    let ctx = PassContext {
        scene,
        bvh,
        lights,
        params,
        camera,
        shader: get_shader(params.shader),
        width: state.width,
        height: state.height,
    };
    let accumulate = |(idx, ((pixel, hits), rng)): (usize, ((&mut Vec4, &mut u32), &mut Pcg32))| {
        *pixel += ctx.sample_pixel(idx, rng);
        *hits += 1;
    };

    if params.noparallel {
        state
            .image
            .iter_mut()
            .zip(state.hits.iter_mut())
            .zip(state.rngs.iter_mut())
            .enumerate()
            .for_each(accumulate);
    } else {
        state
            .image
            .par_iter_mut()
            .zip(state.hits.par_iter_mut())
            .zip(state.rngs.par_iter_mut())
            .enumerate()
            .for_each(accumulate);
    }

    state.samples += 1;
    log::debug!("Pass {}/{} done", state.samples, params.samples);
}

/// Running average of the accumulated samples.
pub fn get_render(state: &RenderState) -> Image {
    let mut image = Image::new(state.width, state.height);
    if state.samples == 0 {
        return image;
    }
    let scale = 1.0 / state.samples as f32;
    for (out, sum) in image.pixels.iter_mut().zip(&state.image) {
        *out = *sum * scale;
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::make_bvh;
    use crate::lights::make_lights;
    use crate::params::ShaderKind;
    use lumen_scene::{presets, tessellate_surfaces};

    fn render(scene: &Scene, params: &Params) -> RenderState {
        let _ = env_logger::builder().is_test(true).try_init();
        let bvh = make_bvh(scene, params);
        let lights = make_lights(scene, params);
        let mut state = make_state(scene, params).unwrap();
        for _ in 0..params.samples {
            render_samples(&mut state, scene, &bvh, &lights, params);
        }
        state
    }

    #[test]
    fn test_state_dimensions_and_streams() {
        let scene = presets::cornell_box();
        let params = Params {
            resolution: 32,
            ..Default::default()
        };
        let state = make_state(&scene, &params).unwrap();
        let (w, h) = scene.cameras[0].image_size(32);
        assert_eq!((state.width, state.height), (w, h));
        assert_eq!(state.rngs.len(), w * h);
        assert_eq!(state.samples, 0);
        assert!(state.image.iter().all(|p| *p == Vec4::ZERO));

        // streams are distinct
        let mut a = state.rngs[0].clone();
        let mut b = state.rngs[1].clone();
        let sa: Vec<u32> = (0..4).map(|_| a.gen()).collect();
        let sb: Vec<u32> = (0..4).map(|_| b.gen()).collect();
        assert_ne!(sa, sb);

        // and reproducible
        let again = make_state(&scene, &params).unwrap();
        let mut c = again.rngs[0].clone();
        let sc: Vec<u32> = (0..4).map(|_| c.gen()).collect();
        assert_eq!(sa, sc);
    }

    #[test]
    fn test_setup_errors() {
        let scene = presets::cornell_box();
        let missing_camera = Params {
            camera: 3,
            ..Default::default()
        };
        assert!(matches!(
            make_state(&scene, &missing_camera),
            Err(TraceError::MissingCamera(3))
        ));

        let implicit = Params {
            shader: ShaderKind::Implicit,
            ..Default::default()
        };
        assert!(matches!(
            make_state(&scene, &implicit),
            Err(TraceError::MissingImplicit(ShaderKind::Implicit))
        ));

        let no_samples = Params {
            samples: 0,
            ..Default::default()
        };
        assert!(matches!(
            make_state(&scene, &no_samples),
            Err(TraceError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_sample_budget_is_respected() {
        let scene = presets::cornell_box();
        let params = Params {
            resolution: 8,
            samples: 2,
            shader: ShaderKind::Eyelight,
            ..Default::default()
        };
        let bvh = make_bvh(&scene, &params);
        let lights = make_lights(&scene, &params);
        let mut state = make_state(&scene, &params).unwrap();
        for _ in 0..2 {
            render_samples(&mut state, &scene, &bvh, &lights, &params);
        }
        let before = state.image.clone();
        render_samples(&mut state, &scene, &bvh, &lights, &params);
        assert_eq!(state.samples, 2);
        assert_eq!(state.image, before);
        assert!(state.hits.iter().all(|&h| h == 2));
    }

    #[test]
    fn test_accumulation_replays_pixel_streams() {
        let scene = presets::cornell_box();
        let params = Params {
            resolution: 6,
            samples: 3,
            shader: ShaderKind::Pathtrace,
            ..Default::default()
        };
        let bvh = make_bvh(&scene, &params);
        let lights = make_lights(&scene, &params);
        let mut state = make_state(&scene, &params).unwrap();
        let mut replay = state.rngs.clone();
        for _ in 0..params.samples {
            render_samples(&mut state, &scene, &bvh, &lights, &params);
        }

        let ctx = PassContext {
            scene: &scene,
            bvh: &bvh,
            lights: &lights,
            params: &params,
            camera: &scene.cameras[0],
            shader: get_shader(params.shader),
            width: state.width,
            height: state.height,
        };
        for (idx, rng) in replay.iter_mut().enumerate() {
            let mut sum = Vec4::ZERO;
            for _ in 0..params.samples {
                sum += ctx.sample_pixel(idx, rng);
            }
            assert_eq!(sum, state.image[idx], "pixel {}", idx);
        }
        assert_eq!(state.samples, 3);
    }

    #[test]
    fn test_serial_and_parallel_passes_agree() {
        let scene = presets::cornell_box();
        let serial = Params {
            resolution: 10,
            samples: 2,
            noparallel: true,
            ..Default::default()
        };
        let parallel = Params {
            noparallel: false,
            ..serial.clone()
        };
        let a = get_render(&render(&scene, &serial));
        let b = get_render(&render(&scene, &parallel));
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_is_finite_and_non_negative() {
        for name in ["cornell", "volume", "envlight"] {
            let mut scene = presets::by_name(name).unwrap();
            tessellate_surfaces(&mut scene).unwrap();
            let params = Params {
                resolution: 16,
                samples: 4,
                ..Default::default()
            };
            let image = get_render(&render(&scene, &params));
            for p in &image.pixels {
                assert!(p.is_finite(), "{}: {:?}", name, p);
                assert!(p.min_element() >= 0.0, "{}: {:?}", name, p);
            }
        }
    }

    #[test]
    fn test_empty_render_is_black() {
        let scene = presets::cornell_box();
        let params = Params {
            resolution: 4,
            ..Default::default()
        };
        let state = make_state(&scene, &params).unwrap();
        assert!(get_render(&state).pixels.iter().all(|p| *p == Vec4::ZERO));
    }

    #[test]
    fn test_floor_under_quad_light_converges() {
        let (albedo, radiance, height) = (0.7, 20.0, 2.0);
        let scene = presets::floor_under_light(albedo, radiance, height);
        let params = Params {
            resolution: 5,
            samples: 4096,
            bounces: 1,
            shader: ShaderKind::Pathtrace,
            ..Default::default()
        };
        let image = get_render(&render(&scene, &params));

        // irradiance at the origin from the 1x1 emitter overhead
        let n = 400;
        let da = 1.0 / (n * n) as f64;
        let mut irradiance = 0.0;
        for a in 0..n {
            for b in 0..n {
                let x = (a as f64 + 0.5) / n as f64 - 0.5;
                let z = (b as f64 + 0.5) / n as f64 - 0.5;
                let r2 = x * x + z * z + height as f64 * height as f64;
                irradiance += radiance as f64 * (height as f64).powi(2) / (r2 * r2) * da;
            }
        }
        let expected = albedo as f64 / std::f64::consts::PI * irradiance;

        let centre = image.get(2, 2);
        let error = (centre.x as f64 - expected).abs() / expected;
        assert!(error < 0.05, "got {}, expected {}", centre.x, expected);
        assert_eq!(centre.w, 1.0);
    }
}
