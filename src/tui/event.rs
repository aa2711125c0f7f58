//! Event types for the particle animation.

use crate::particles::{Pointer, ThemeMode, Viewport};

/// Input delivered to the animation loop and applied between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationEvent {
    /// The mouse moved; already normalized.
    PointerMoved(Pointer),
    /// The terminal was resized.
    Resized(Viewport),
    /// The theme attribute flipped mode.
    ThemeChanged(ThemeMode),
    /// Leave the animation.
    Quit,
}
