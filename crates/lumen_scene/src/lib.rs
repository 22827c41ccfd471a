//! lumen scene - in-memory scene model consumed by the path tracer.
//!
//! This crate provides:
//!
//! - **Scene types**: `Scene`, `Camera`, `Shape`, `Instance`, `Material`,
//!   `Texture`, `Environment`
//! - **Accessors**: position, normal, texcoord and `MaterialPoint` evaluation
//!   keyed by (instance, element, uv)
//! - **Implicit fields**: signed distance trees for the sphere tracer
//! - **Tessellation**: Catmull-Clark subdivision with displacement
//! - **Presets**: small scenes built in code for the CLI and the tests
//!
//! # Example
//!
//! ```ignore
//! use lumen_scene::{presets, tessellate_surfaces};
//!
//! let mut scene = presets::cornell_box();
//! tessellate_surfaces(&mut scene)?;
//! println!("{} instances, {} materials", scene.instances.len(), scene.materials.len());
//! ```

pub mod camera;
pub mod error;
pub mod implicit;
pub mod material;
pub mod presets;
pub mod scene;
pub mod shape;
pub mod subdiv;
pub mod texture;

// Re-export commonly used types
pub use camera::Camera;
pub use error::{SceneError, SceneResult};
pub use implicit::{Implicit, SdfSample, SdfShape};
pub use material::{Material, MaterialKind, MaterialPoint};
pub use scene::{Environment, Instance, Scene};
pub use shape::Shape;
pub use subdiv::{tessellate_surfaces, Subdiv};
pub use texture::Texture;
