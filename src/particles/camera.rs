//! Perspective camera and the surface it renders onto.

use super::Vec3;

/// Horizontal and vertical sub-cell resolution of a Braille cell.
const DOTS_PER_CELL: (u16, u16) = (2, 4);

/// A drawable surface measured in terminal cells.
///
/// Each cell carries several dots, which plays the role of a device pixel
/// ratio: the camera aspect is computed from dots, not cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
    pub pixel_ratio: (u16, u16),
}

impl Viewport {
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixel_ratio: DOTS_PER_CELL,
        }
    }

    #[must_use]
    pub fn pixel_width(&self) -> u32 {
        u32::from(self.width) * u32::from(self.pixel_ratio.0)
    }

    #[must_use]
    pub fn pixel_height(&self) -> u32 {
        u32::from(self.height) * u32::from(self.pixel_ratio.1)
    }

    /// Width over height in pixels; 1.0 for an empty surface.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        if self.pixel_height() == 0 || self.pixel_width() == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let aspect = self.pixel_width() as f32 / self.pixel_height() as f32;
        aspect
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Perspective camera on the z axis looking toward the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the origin along +z.
    pub z: f32,
    viewport: Viewport,
}

impl Camera {
    pub const FOV: f32 = 75.0;
    pub const NEAR: f32 = 0.1;
    pub const FAR: f32 = 1000.0;
    pub const DISTANCE: f32 = 50.0;

    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            fov: Self::FOV,
            aspect: viewport.aspect(),
            near: Self::NEAR,
            far: Self::FAR,
            z: Self::DISTANCE,
            viewport,
        }
    }

    /// Tracks a new surface size.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.aspect = viewport.aspect();
    }

    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Projects a scene point to normalized device coordinates, `[-1, 1]`
    /// on both axes with +y up.
    ///
    /// Returns `None` for points outside the near/far range. Points outside
    /// the frustum sideways are returned as is; the canvas clips them.
    #[must_use]
    pub fn project(&self, point: Vec3) -> Option<(f64, f64)> {
        let depth = self.z - point.z;
        if depth < self.near || depth > self.far {
            return None;
        }
        let focal = 1.0 / (self.fov.to_radians() / 2.0).tan();
        let x = focal / self.aspect * point.x / depth;
        let y = focal * point.y / depth;
        Some((f64::from(x), f64::from(y)))
    }
}
