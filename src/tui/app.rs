//! Animation state model.

use rand::Rng;

use crate::config::ParticleConfig;
use crate::particles::{Camera, Palette, ParticleField, Pointer, ThemeMode, Viewport};

use super::event::AnimationEvent;

pub struct App {
    pub field: ParticleField,
    pub camera: Camera,
    pub palette: Palette,
    pub mode: ThemeMode,
    pub pointer: Pointer,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        config: ParticleConfig,
        viewport: Viewport,
        mode: ThemeMode,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            field: ParticleField::new(config, rng),
            camera: Camera::new(viewport),
            palette: Palette::for_mode(mode),
            mode,
            pointer: Pointer::default(),
            should_quit: false,
        }
    }

    pub fn apply(&mut self, event: AnimationEvent) {
        match event {
            AnimationEvent::PointerMoved(pointer) => self.pointer = pointer,
            AnimationEvent::Resized(viewport) => self.camera.resize(viewport),
            AnimationEvent::ThemeChanged(mode) => {
                self.mode = mode;
                self.palette = Palette::for_mode(mode);
            }
            AnimationEvent::Quit => self.should_quit = true,
        }
    }

    /// Advances the simulation by one frame.
    pub fn tick(&mut self) {
        self.field.step(self.pointer);
    }
}
