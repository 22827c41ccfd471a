//! Setup errors. Rendering itself never fails: non-finite samples are
//! dropped instead.

use thiserror::Error;

use crate::params::ShaderKind;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Unknown shader '{0}'")]
    UnknownShader(String),

    #[error("Camera {0} does not exist")]
    MissingCamera(usize),

    #[error("Shader {0} needs an implicit field but the scene has none")]
    MissingImplicit(ShaderKind),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;
