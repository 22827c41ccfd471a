//! Material assets and the per-hit `MaterialPoint` snapshot.

use lumen_math::Vec3;

/// Roughness below which non-diffuse lobes are treated as delta.
pub const MIN_ROUGHNESS: f32 = 0.03 * 0.03;

/// Scattering model of a material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    #[default]
    Matte,
    Glossy,
    Reflective,
    Transparent,
    Refractive,
    Subsurface,
    Volumetric,
    GltfPbr,
}

impl MaterialKind {
    /// Kinds whose interior is a participating medium.
    pub fn has_volume(self) -> bool {
        matches!(
            self,
            MaterialKind::Refractive | MaterialKind::Volumetric | MaterialKind::Subsurface
        )
    }
}

/// Material asset as stored in the scene.
///
/// Texture fields index `Scene::textures`.
#[derive(Clone, Debug)]
pub struct Material {
    pub kind: MaterialKind,
    pub emission: Vec3,
    pub color: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    pub ior: f32,
    pub scattering: Vec3,
    pub scanisotropy: f32,
    pub trdepth: f32,
    pub opacity: f32,

    pub emission_tex: Option<usize>,
    pub color_tex: Option<usize>,
    pub roughness_tex: Option<usize>,
    pub scattering_tex: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Matte,
            emission: Vec3::ZERO,
            color: Vec3::ZERO,
            roughness: 0.0,
            metallic: 0.0,
            ior: 1.5,
            scattering: Vec3::ZERO,
            scanisotropy: 0.0,
            trdepth: 0.01,
            opacity: 1.0,
            emission_tex: None,
            color_tex: None,
            roughness_tex: None,
            scattering_tex: None,
        }
    }
}

impl Material {
    pub fn matte(color: Vec3) -> Self {
        Self {
            kind: MaterialKind::Matte,
            color,
            ..Default::default()
        }
    }

    pub fn glossy(color: Vec3, roughness: f32) -> Self {
        Self {
            kind: MaterialKind::Glossy,
            color,
            roughness,
            ..Default::default()
        }
    }

    pub fn reflective(color: Vec3, roughness: f32) -> Self {
        Self {
            kind: MaterialKind::Reflective,
            color,
            roughness,
            ..Default::default()
        }
    }

    pub fn refractive(color: Vec3, roughness: f32, ior: f32) -> Self {
        Self {
            kind: MaterialKind::Refractive,
            color,
            roughness,
            ior,
            ..Default::default()
        }
    }

    pub fn volumetric(color: Vec3, scattering: Vec3, trdepth: f32) -> Self {
        Self {
            kind: MaterialKind::Volumetric,
            color,
            scattering,
            trdepth,
            ..Default::default()
        }
    }

    pub fn gltfpbr(color: Vec3, roughness: f32, metallic: f32) -> Self {
        Self {
            kind: MaterialKind::GltfPbr,
            color,
            roughness,
            metallic,
            ..Default::default()
        }
    }

    /// Pure emitter; the surface itself is black matte.
    pub fn emissive(emission: Vec3) -> Self {
        Self {
            kind: MaterialKind::Matte,
            emission,
            ..Default::default()
        }
    }
}

/// Material parameters evaluated at one surface or volume point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialPoint {
    pub kind: MaterialKind,
    pub emission: Vec3,
    pub color: Vec3,
    pub opacity: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub ior: f32,
    pub density: Vec3,
    pub scattering: Vec3,
    pub scanisotropy: f32,
    pub trdepth: f32,
}

impl Default for MaterialPoint {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Matte,
            emission: Vec3::ZERO,
            color: Vec3::ZERO,
            opacity: 1.0,
            roughness: 0.0,
            metallic: 0.0,
            ior: 1.0,
            density: Vec3::ZERO,
            scattering: Vec3::ZERO,
            scanisotropy: 0.0,
            trdepth: 0.01,
        }
    }
}

impl MaterialPoint {
    /// Snapshot of an untextured material.
    pub fn from_material(material: &Material) -> Self {
        Self::from_values(material, material.color, 1.0, material.emission, 1.0, material.scattering)
    }

    /// Build a point from a material and texture-modulated values, applying
    /// the density derivation and roughness clamps.
    pub(crate) fn from_values(
        material: &Material,
        color: Vec3,
        opacity_scale: f32,
        emission: Vec3,
        roughness_scale: f32,
        scattering: Vec3,
    ) -> Self {
        let kind = material.kind;

        let density = if kind.has_volume() {
            let trdepth = material.trdepth.max(f32::EPSILON);
            let c = color.clamp(Vec3::splat(0.0001), Vec3::ONE);
            -Vec3::new(c.x.ln(), c.y.ln(), c.z.ln()) / trdepth
        } else {
            Vec3::ZERO
        };

        let mut roughness = material.roughness * roughness_scale;
        roughness = match kind {
            MaterialKind::Matte | MaterialKind::Glossy | MaterialKind::GltfPbr => {
                roughness.clamp(MIN_ROUGHNESS, 1.0)
            }
            MaterialKind::Volumetric => 0.0,
            _ if roughness < MIN_ROUGHNESS => 0.0,
            _ => roughness,
        };

        Self {
            kind,
            emission,
            color,
            opacity: material.opacity * opacity_scale,
            roughness,
            metallic: material.metallic,
            ior: material.ior,
            density,
            scattering,
            scanisotropy: material.scanisotropy,
            trdepth: material.trdepth,
        }
    }
}
