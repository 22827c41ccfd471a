//! lumen trace - Monte Carlo path tracing integrators.
//!
//! Renders a `lumen_scene::Scene` progressively, one sample per pixel per
//! call. The integrator family (volumetric path tracing, path tracing with
//! MIS, naive, eyelight, implicit surfaces and debug views) shares one
//! bounce loop; BSDF dispatch, light sampling and nested media live in
//! their own modules.
//!
//! # Example
//!
//! ```ignore
//! use lumen_trace::{make_bvh, make_lights, make_state, render_samples, get_render, Params};
//!
//! let params = Params::default();
//! let bvh = make_bvh(&scene, &params);
//! let lights = make_lights(&scene, &params);
//! let mut state = make_state(&scene, &params)?;
//! for _ in 0..params.samples {
//!     render_samples(&mut state, &scene, &bvh, &lights, &params);
//! }
//! let image = get_render(&state);
//! ```

pub mod bsdf;
pub mod bvh;
pub mod error;
pub mod lights;
pub mod medium;
pub mod microfacet;
pub mod params;
pub mod progressive;
pub mod render;
pub mod sdf;
pub mod shaders;
pub mod shading;

pub use bvh::{make_bvh, Intersection, Intersector, SceneBvh};
pub use error::{TraceError, TraceResult};
pub use lights::{make_lights, sample_lights, sample_lights_pdf, Light, LightSet};
pub use medium::VolumeStack;
pub use params::{Params, ShaderKind};
pub use progressive::ProgressiveRender;
pub use render::{get_render, make_state, render_samples, Image, RenderState};
pub use sdf::{eval_sdf_normal, spheretrace, SdfHit};
pub use shaders::{get_shader, ShaderFn};
