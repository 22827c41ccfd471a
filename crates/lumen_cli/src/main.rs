//! lumen - render a built-in scene to a PNG.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use lumen_math::{Affine3A, Vec3, Vec4};
use lumen_scene::{presets, tessellate_surfaces, Environment, Scene, Texture};
use lumen_trace::{
    get_render, make_bvh, make_lights, make_state, render_samples, Image, Params,
    ProgressiveRender, ShaderKind,
};

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Monte Carlo path tracer")]
struct Args {
    /// Built-in scene: cornell, volume, implicit, envlight or floor
    #[arg(long, default_value = "cornell")]
    scene: String,

    /// JSON render parameters; flags below override them
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    shader: Option<ShaderKind>,

    /// Samples per pixel
    #[arg(long)]
    samples: Option<u32>,

    /// Maximum path length
    #[arg(long)]
    bounces: Option<u32>,

    /// Pixels along the longer image side
    #[arg(long)]
    resolution: Option<usize>,

    /// Render on the calling thread only
    #[arg(long)]
    noparallel: bool,

    /// Image used as the environment emission, replacing the scene's
    #[arg(long)]
    envmap: Option<PathBuf>,

    /// Exposure in stops
    #[arg(long, default_value_t = 0.0)]
    exposure: f32,

    #[arg(short, long, default_value = "out.png")]
    output: PathBuf,

    /// Render in a background worker and report progress while it runs
    #[arg(long)]
    progressive: bool,
}

impl Args {
    fn params(&self) -> Result<Params> {
        let mut params = match &self.config {
            Some(path) => Params::load(path)
                .with_context(|| format!("Failed to load parameters from {}", path.display()))?,
            None => Params::default(),
        };
        if let Some(shader) = self.shader {
            params.shader = shader;
        }
        if let Some(samples) = self.samples {
            params.samples = samples;
        }
        if let Some(bounces) = self.bounces {
            params.bounces = bounces;
        }
        if let Some(resolution) = self.resolution {
            params.resolution = resolution;
        }
        params.noparallel |= self.noparallel;
        params.validate()?;
        Ok(params)
    }

    fn scene(&self) -> Result<Scene> {
        let mut scene = presets::by_name(&self.scene).with_context(|| {
            format!(
                "Unknown scene '{}', expected one of {}",
                self.scene,
                presets::PRESETS.join(", ")
            )
        })?;

        if let Some(path) = &self.envmap {
            let texture = Texture::load(path)
                .with_context(|| format!("Failed to load environment {}", path.display()))?;
            let texture = scene.add_texture(texture);
            scene.environments = vec![Environment {
                frame: Affine3A::IDENTITY,
                emission: Vec3::ONE,
                emission_tex: Some(texture),
            }];
        }

        tessellate_surfaces(&mut scene).context("Failed to tessellate subdivision surfaces")?;
        Ok(scene)
    }
}

// ============================================================================
// Output
// ============================================================================

/// Linear to sRGB transfer curve.
#[inline]
fn linear_to_srgb(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        12.92 * linear.max(0.0)
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// Expose, encode and quantize one pixel; alpha is coverage.
fn color_to_rgba(color: Vec4, exposure: f32) -> [u8; 4] {
    let scale = 2f32.powf(exposure);
    let encode = |c: f32| (255.0 * linear_to_srgb(c * scale).clamp(0.0, 1.0)).round() as u8;
    [
        encode(color.x),
        encode(color.y),
        encode(color.z),
        (255.0 * color.w.clamp(0.0, 1.0)).round() as u8,
    ]
}

fn save_png(image: &Image, exposure: f32, path: &Path) -> Result<()> {
    let bytes: Vec<u8> = image
        .pixels
        .iter()
        .flat_map(|&p| color_to_rgba(p, exposure))
        .collect();
    let buffer = image::RgbaImage::from_raw(image.width as u32, image.height as u32, bytes)
        .context("Image buffer does not match its dimensions")?;
    buffer
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Render modes
// ============================================================================

fn render_blocking(scene: &Scene, params: &Params) -> Result<Image> {
    let bvh = make_bvh(scene, params);
    let lights = make_lights(scene, params);
    let mut state = make_state(scene, params)?;

    let report_every = (params.samples / 10).max(1);
    for _ in 0..params.samples {
        render_samples(&mut state, scene, &bvh, &lights, params);
        if state.samples % report_every == 0 {
            log::info!("Rendered {}/{} samples", state.samples, params.samples);
        }
    }
    Ok(get_render(&state))
}

fn render_progressive(scene: Scene, params: &Params) -> Result<Image> {
    let bvh = make_bvh(&scene, params);
    let lights = make_lights(&scene, params);
    let mut render = ProgressiveRender::start(
        Arc::new(scene),
        Arc::new(bvh),
        Arc::new(lights),
        params.clone(),
    )?;

    while !render.is_finished() {
        std::thread::sleep(Duration::from_millis(500));
        log::info!("Published {}/{} samples", render.samples(), params.samples);
    }
    let state = render
        .wait()
        .context("Render worker exited without a result")?;
    Ok(get_render(&state))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let params = args.params()?;
    let scene = args.scene()?;
    log::info!(
        "Rendering '{}' with {} at {} spp, {} bounces",
        scene.name,
        params.shader,
        params.samples,
        params.bounces
    );

    let start = Instant::now();
    let image = if args.progressive {
        render_progressive(scene, &params)?
    } else {
        render_blocking(&scene, &params)?
    };
    log::info!("Render finished in {:.2?}", start.elapsed());

    save_png(&image, args.exposure, &args.output)?;
    log::info!("Saved {}", args.output.display());
    Ok(())
}
