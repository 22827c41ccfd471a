//! Errors raised while assembling or preparing a scene.

use thiserror::Error;

/// Errors that can occur while loading textures or preparing geometry.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Texture {path} has no pixels")]
    EmptyTexture { path: String },

    #[error("Subdiv {subdiv} references missing shape {shape}")]
    MissingShape { subdiv: usize, shape: usize },

    #[error("Subdiv {subdiv} references missing texture {texture}")]
    MissingTexture { subdiv: usize, texture: usize },
}

pub type SceneResult<T> = Result<T, SceneError>;
