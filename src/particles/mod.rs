//! Particle backdrop: drifting points in a cube, joined by lines when close.
//!
//! The simulation is independent of any output surface. A host calls
//! [`ParticleField::step`] once per frame, then draws
//! [`ParticleField::project`] with whatever backend it has.

mod camera;
mod theme;

use std::ops::{Add, Sub};

use rand::Rng;

use crate::config::ParticleConfig;

pub use camera::{Camera, Viewport};
pub use theme::{Palette, Rgb, ThemeAttribute, ThemeMode};

/// A point or direction in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.z.mul_add(self.z, self.x.mul_add(self.x, self.y * self.y)).sqrt()
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Rotates about the x axis, then the y axis.
    #[must_use]
    pub fn rotated(self, rotation: Rotation) -> Self {
        let (sx, cx) = rotation.x.sin_cos();
        let (sy, cy) = rotation.y.sin_cos();

        // Y first, then X: the intrinsic XYZ order applied to a vector.
        let x1 = self.x.mul_add(cy, self.z * sy);
        let z1 = (-self.x).mul_add(sy, self.z * cy);
        let y2 = self.y.mul_add(cx, -(z1 * sx));
        let z2 = self.y.mul_add(sx, z1 * cx);
        Self::new(x1, y2, z2)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Accumulated rotation of the whole particle system, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
}

/// Normalized pointer position: `x` in `[-1, 1]` left to right, `y` in
/// `[-1, 1]` bottom to top. Starts centered.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
}

impl Pointer {
    /// Maps a screen position (origin top-left) to normalized coordinates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_screen(column: u32, row: u32, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::default();
        }
        Self {
            x: (column as f32 / width as f32).mul_add(2.0, -1.0),
            y: -(row as f32 / height as f32).mul_add(2.0, -1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Particle {
    /// Moves one step, then reverses every axis that has left the cube.
    ///
    /// The reversal takes effect from the next step, so a coordinate can
    /// overshoot the bound by at most one velocity step.
    fn advance(&mut self, half_extent: f32) {
        self.position = self.position + self.velocity;
        if self.position.x.abs() > half_extent {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y.abs() > half_extent {
            self.velocity.y = -self.velocity.y;
        }
        if self.position.z.abs() > half_extent {
            self.velocity.z = -self.velocity.z;
        }
    }
}

/// A segment between two particles that are currently close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionLine {
    /// Index of the first particle (`a < b`).
    pub a: usize,
    /// Index of the second particle.
    pub b: usize,
    pub from: Vec3,
    pub to: Vec3,
}

/// Screen-space output of one frame, in normalized device coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedFrame {
    pub points: Vec<(f64, f64)>,
    pub lines: Vec<((f64, f64), (f64, f64))>,
}

/// The full animation state.
#[derive(Debug, Clone)]
pub struct ParticleField {
    config: ParticleConfig,
    particles: Vec<Particle>,
    lines: Vec<ConnectionLine>,
    rotation: Rotation,
}

impl ParticleField {
    /// Scatters `config.count` particles uniformly through the cube.
    pub fn new(config: ParticleConfig, rng: &mut impl Rng) -> Self {
        let extent = config.half_extent;
        let spread = config.velocity_spread;
        let mut coordinate = || (rng.random::<f32>() - 0.5) * 2.0 * extent;
        let positions: Vec<Vec3> = (0..config.count)
            .map(|_| Vec3::new(coordinate(), coordinate(), coordinate()))
            .collect();

        let particles = positions
            .into_iter()
            .map(|position| Particle {
                position,
                velocity: Vec3::new(
                    (rng.random::<f32>() - 0.5) * spread,
                    (rng.random::<f32>() - 0.5) * spread,
                    (rng.random::<f32>() - 0.5) * spread,
                ),
            })
            .collect();

        let mut field = Self {
            config,
            particles,
            lines: Vec::new(),
            rotation: Rotation::default(),
        };
        field.rebuild_lines();
        field
    }

    /// Builds a field from explicit particles.
    #[must_use]
    pub fn from_particles(config: ParticleConfig, particles: Vec<Particle>) -> Self {
        let mut field = Self {
            config,
            particles,
            lines: Vec::new(),
            rotation: Rotation::default(),
        };
        field.rebuild_lines();
        field
    }

    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Lines computed by the last step.
    #[must_use]
    pub fn lines(&self) -> &[ConnectionLine] {
        &self.lines
    }

    #[must_use]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub const fn config(&self) -> &ParticleConfig {
        &self.config
    }

    /// Advances one frame: move, reflect, relink, rotate.
    pub fn step(&mut self, pointer: Pointer) {
        let half_extent = self.config.half_extent;
        for particle in &mut self.particles {
            particle.advance(half_extent);
        }

        self.rebuild_lines();

        let base = self.config.base_rotation;
        let factor = self.config.pointer_rotation;
        self.rotation.y += pointer.x.mul_add(factor, base);
        self.rotation.x += pointer.y.mul_add(factor, base);
    }

    /// Replaces the line set with every pair closer than the link distance.
    // O(n^2) in the particle count.
    fn rebuild_lines(&mut self) {
        let limit = self.config.link_distance;
        self.lines.clear();
        for (a, first) in self.particles.iter().enumerate() {
            for (offset, second) in self.particles[a + 1..].iter().enumerate() {
                if first.position.distance(second.position) < limit {
                    self.lines.push(ConnectionLine {
                        a,
                        b: a + 1 + offset,
                        from: first.position,
                        to: second.position,
                    });
                }
            }
        }
    }

    /// Rotates the system and projects it through `camera`.
    ///
    /// Points behind the camera or beyond its far plane are dropped, as are
    /// lines with such an endpoint.
    #[must_use]
    pub fn project(&self, camera: &Camera) -> ProjectedFrame {
        let rotation = self.rotation;
        let points = self
            .particles
            .iter()
            .filter_map(|p| camera.project(p.position.rotated(rotation)))
            .collect();
        let lines = self
            .lines
            .iter()
            .filter_map(|line| {
                let from = camera.project(line.from.rotated(rotation))?;
                let to = camera.project(line.to.rotated(rotation))?;
                Some((from, to))
            })
            .collect();
        ProjectedFrame { points, lines }
    }
}
