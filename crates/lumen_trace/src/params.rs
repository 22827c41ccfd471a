//! Render parameters and shader selection.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};

/// Integrator used to shade camera rays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderKind {
    #[default]
    Volpathtrace,
    Pathtrace,
    Naive,
    Eyelight,
    Normal,
    Texcoord,
    Color,
    Implicit,
    ImplicitNormal,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 9] = [
        ShaderKind::Volpathtrace,
        ShaderKind::Pathtrace,
        ShaderKind::Naive,
        ShaderKind::Eyelight,
        ShaderKind::Normal,
        ShaderKind::Texcoord,
        ShaderKind::Color,
        ShaderKind::Implicit,
        ShaderKind::ImplicitNormal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderKind::Volpathtrace => "volpathtrace",
            ShaderKind::Pathtrace => "pathtrace",
            ShaderKind::Naive => "naive",
            ShaderKind::Eyelight => "eyelight",
            ShaderKind::Normal => "normal",
            ShaderKind::Texcoord => "texcoord",
            ShaderKind::Color => "color",
            ShaderKind::Implicit => "implicit",
            ShaderKind::ImplicitNormal => "implicit_normal",
        }
    }

    /// Shaders that march the scene's implicit field instead of the BVH.
    pub fn needs_implicit(self) -> bool {
        matches!(self, ShaderKind::Implicit | ShaderKind::ImplicitNormal)
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShaderKind {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShaderKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| TraceError::UnknownShader(s.to_string()))
    }
}

/// Render configuration.
///
/// Missing JSON fields take their default values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Index into `Scene::cameras`
    pub camera: usize,

    /// Pixels along the longer image side
    pub resolution: usize,

    pub shader: ShaderKind,

    /// Samples per pixel
    pub samples: u32,

    /// Maximum path length
    pub bounces: u32,

    /// Render passes on the calling thread
    pub noparallel: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            camera: 0,
            resolution: 720,
            shader: ShaderKind::Volpathtrace,
            samples: 512,
            bounces: 8,
            noparallel: false,
        }
    }
}

impl Params {
    pub fn from_json(text: &str) -> TraceResult<Self> {
        let params: Params = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> TraceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject configurations that cannot produce an image.
    pub fn validate(&self) -> TraceResult<()> {
        if self.resolution == 0 {
            return Err(TraceError::InvalidParams("resolution must be positive".into()));
        }
        if self.samples == 0 {
            return Err(TraceError::InvalidParams("samples must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_names_round_trip() {
        for kind in ShaderKind::ALL {
            assert_eq!(kind.name().parse::<ShaderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_shader() {
        let err = "raymarch".parse::<ShaderKind>().unwrap_err();
        assert!(matches!(err, TraceError::UnknownShader(ref s) if s == "raymarch"));
    }

    #[test]
    fn test_json_defaults() {
        let params = Params::from_json(r#"{ "shader": "implicit_normal", "samples": 16 }"#).unwrap();
        assert_eq!(params.shader, ShaderKind::ImplicitNormal);
        assert_eq!(params.samples, 16);
        assert_eq!(params.bounces, Params::default().bounces);
        assert!(!params.noparallel);
    }

    #[test]
    fn test_json_rejects_bad_values() {
        assert!(matches!(
            Params::from_json(r#"{ "resolution": 0 }"#),
            Err(TraceError::InvalidParams(_))
        ));
        assert!(matches!(
            Params::from_json(r#"{ "shader": "bogus" }"#),
            Err(TraceError::Json(_))
        ));
    }

    #[test]
    fn test_implicit_kinds() {
        assert!(ShaderKind::Implicit.needs_implicit());
        assert!(ShaderKind::ImplicitNormal.needs_implicit());
        assert!(!ShaderKind::Pathtrace.needs_implicit());
    }
}
