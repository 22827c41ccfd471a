//! Textures stored as linear RGBA floats.
//!
//! Images are decoded with the `image` crate. 8-bit sources are treated as
//! sRGB and linearized on load; float sources (HDR, EXR) are kept as-is.

use std::path::Path;

use lumen_math::{Vec2, Vec4};

use crate::error::{SceneError, SceneResult};

/// A texture with pixel data in row-major order, row 0 at the top.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Texture width in pixels
    pub width: usize,

    /// Texture height in pixels
    pub height: usize,

    /// Pixel data in linear RGBA
    pub pixels: Vec<Vec4>,

    /// True when the source carried float data. Displacement of 8-bit maps
    /// is centred on 0.5.
    pub hdr: bool,
}

impl Texture {
    /// Create a new texture from linear pixel data.
    pub fn new(width: usize, height: usize, pixels: Vec<Vec4>, hdr: bool) -> Self {
        debug_assert_eq!(width * height, pixels.len());
        Self {
            width,
            height,
            pixels,
            hdr,
        }
    }

    /// Create a solid color texture (1x1).
    pub fn solid_color(color: Vec4) -> Self {
        Self::new(1, 1, vec![color], true)
    }

    /// Load a texture from disk.
    pub fn load(path: impl AsRef<Path>) -> SceneResult<Self> {
        let path = path.as_ref();
        let hdr = matches!(
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .as_deref(),
            Some("hdr") | Some("exr")
        );

        let img = image::open(path)?;
        let texture = Self::from_image(&img, hdr);
        if texture.pixels.is_empty() {
            return Err(SceneError::EmptyTexture {
                path: path.display().to_string(),
            });
        }

        log::info!(
            "Loaded texture {} ({}x{}, {})",
            path.display(),
            texture.width,
            texture.height,
            if hdr { "linear" } else { "sRGB" }
        );
        Ok(texture)
    }

    /// Convert a decoded image. Non-HDR data is linearized.
    pub fn from_image(img: &image::DynamicImage, hdr: bool) -> Self {
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                if hdr {
                    Vec4::new(r, g, b, a)
                } else {
                    Vec4::new(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), a)
                }
            })
            .collect();
        Self::new(width as usize, height as usize, pixels, hdr)
    }

    /// Pixel at integer coordinates.
    #[inline]
    pub fn lookup(&self, i: usize, j: usize) -> Vec4 {
        self.pixels[j * self.width + i]
    }

    /// Bilinear lookup with wrap-around addressing.
    pub fn eval(&self, uv: Vec2) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ONE;
        }

        let s = uv.x.rem_euclid(1.0) * self.width as f32;
        let t = uv.y.rem_euclid(1.0) * self.height as f32;
        let i = (s as usize).min(self.width - 1);
        let j = (t as usize).min(self.height - 1);
        let ii = (i + 1) % self.width;
        let jj = (j + 1) % self.height;
        let u = s - i as f32;
        let v = t - j as f32;

        self.lookup(i, j) * (1.0 - u) * (1.0 - v)
            + self.lookup(i, jj) * (1.0 - u) * v
            + self.lookup(ii, j) * u * (1.0 - v)
            + self.lookup(ii, jj) * u * v
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Vec4>()
    }
}

/// sRGB electro-optical transfer.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
