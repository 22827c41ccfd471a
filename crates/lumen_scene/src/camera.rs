//! Thin-lens camera generating primary rays.
//!
//! The camera looks down its local `-z` axis with `+y` up. Image coordinates
//! run from (0, 0) at the top-left corner to (1, 1) at the bottom-right.

use lumen_math::sampling::sample_disk;
use lumen_math::{Affine3A, Mat3, Ray, Vec2, Vec3};

#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera-to-world transform
    pub frame: Affine3A,
    pub orthographic: bool,
    /// Focal length in meters
    pub lens: f32,
    /// Film width (the longer side) in meters
    pub film: f32,
    /// Width over height
    pub aspect: f32,
    pub focus: f32,
    pub aperture: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            frame: Affine3A::IDENTITY,
            orthographic: false,
            lens: 0.050,
            film: 0.036,
            aspect: 1.5,
            focus: 10000.0,
            aperture: 0.0,
        }
    }
}

impl Camera {
    /// Create a camera at `from` looking at `to`, with the given vertical
    /// field of view in degrees. Focus is set to the target distance.
    pub fn look_at(from: Vec3, to: Vec3, up: Vec3, vfov: f32, aspect: f32) -> Self {
        let w = (from - to).normalize();
        let mut u = up.cross(w);
        if u.length_squared() < 1e-12 {
            // up is parallel to the view direction
            u = Vec3::Z.cross(w);
            if u.length_squared() < 1e-12 {
                u = Vec3::X.cross(w);
            }
        }
        let u = u.normalize();
        let v = w.cross(u).normalize();

        let mut camera = Self {
            frame: Affine3A::from_mat3_translation(Mat3::from_cols(u, v, w), from),
            aspect,
            focus: (from - to).length(),
            ..Default::default()
        };
        let film_height = camera.film_size().y;
        camera.lens = film_height / (2.0 * (vfov.to_radians() * 0.5).tan());
        camera
    }

    /// Film extent in meters as (width, height).
    pub fn film_size(&self) -> Vec2 {
        if self.aspect >= 1.0 {
            Vec2::new(self.film, self.film / self.aspect)
        } else {
            Vec2::new(self.film * self.aspect, self.film)
        }
    }

    /// Image resolution whose longer side is `resolution` pixels.
    pub fn image_size(&self, resolution: usize) -> (usize, usize) {
        if self.aspect >= 1.0 {
            let height = (resolution as f32 / self.aspect).round() as usize;
            (resolution, height.max(1))
        } else {
            let width = (resolution as f32 * self.aspect).round() as usize;
            (width.max(1), resolution)
        }
    }

    /// Ray through `image_uv`, starting at `lens_uv` on the aperture.
    pub fn eval_camera(&self, image_uv: Vec2, lens_uv: Vec2) -> Ray {
        let film = self.film_size();
        let q = Vec3::new(
            film.x * (0.5 - image_uv.x),
            film.y * (image_uv.y - 0.5),
            self.lens,
        );
        let lens_offset = (sample_disk(lens_uv) * self.aperture / 2.0).extend(0.0);

        let (e, d) = if self.orthographic {
            let e = Vec3::new(-q.x, -q.y, 0.0) + lens_offset;
            let p = Vec3::new(-q.x, -q.y, -self.focus);
            (e, (p - e).normalize())
        } else {
            let dc = -q.normalize();
            let p = dc * self.focus / dc.z.abs();
            (lens_offset, (p - lens_offset).normalize())
        };

        Ray::new(
            self.frame.transform_point3(e),
            self.frame.transform_vector3(d).normalize(),
        )
    }
}
