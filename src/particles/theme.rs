//! Light/dark theme attribute and the colors it selects.

use std::fmt;

/// Value of the `data-theme` attribute that selects the dark palette.
pub const DARK_ATTRIBUTE: &str = "dark";

/// Binary color mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    Dark,
    #[default]
    Light,
}

impl ThemeMode {
    /// Reads the mode from an attribute value. Only an exact `"dark"` is dark;
    /// anything else, including no attribute, is light.
    #[must_use]
    pub fn from_attribute(value: Option<&str>) -> Self {
        if value == Some(DARK_ATTRIBUTE) {
            Self::Dark
        } else {
            Self::Light
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dark => DARK_ATTRIBUTE,
            Self::Light => "light",
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    #[must_use]
    pub const fn from_hex(hex: u32) -> Self {
        let [_, r, g, b] = hex.to_be_bytes();
        Self(r, g, b)
    }

    /// Composites this color at `opacity` over `background`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn over(self, background: Self, opacity: f32) -> Self {
        let alpha = opacity.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| {
            f32::from(fg)
                .mul_add(alpha, f32::from(bg) * (1.0 - alpha))
                .round() as u8
        };
        Self(
            mix(self.0, background.0),
            mix(self.1, background.1),
            mix(self.2, background.2),
        )
    }
}

/// Colors for one theme mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    /// Shared by points and lines.
    pub color: Rgb,
    pub point_opacity: f32,
    pub line_opacity: f32,
    /// Surface the translucent colors are composited over.
    pub background: Rgb,
}

impl Palette {
    pub const DARK: Self = Self {
        color: Rgb::from_hex(0x0090_e0ef),
        point_opacity: 0.8,
        line_opacity: 0.2,
        background: Rgb::from_hex(0x0012_1212),
    };

    pub const LIGHT: Self = Self {
        color: Rgb::from_hex(0x0057_cc99),
        point_opacity: 0.8,
        line_opacity: 0.2,
        background: Rgb::from_hex(0x00ff_ffff),
    };

    #[must_use]
    pub const fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::DARK,
            ThemeMode::Light => Self::LIGHT,
        }
    }

    #[must_use]
    pub fn point_color(&self) -> Rgb {
        self.color.over(self.background, self.point_opacity)
    }

    #[must_use]
    pub fn line_color(&self) -> Rgb {
        self.color.over(self.background, self.line_opacity)
    }
}

type ThemeHandler = Box<dyn FnMut(ThemeMode) + Send>;

/// An observable theme attribute.
///
/// Handlers registered with [`on_theme_change`](Self::on_theme_change) run
/// synchronously inside [`set_attribute`](Self::set_attribute), and only
/// when the resulting mode differs from the previous one.
pub struct ThemeAttribute {
    value: Option<String>,
    handlers: Vec<ThemeHandler>,
}

impl ThemeAttribute {
    #[must_use]
    pub fn new(value: Option<&str>) -> Self {
        Self {
            value: value.map(str::to_string),
            handlers: Vec::new(),
        }
    }

    /// Raw attribute value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[must_use]
    pub fn current(&self) -> ThemeMode {
        ThemeMode::from_attribute(self.value())
    }

    /// Subscribes to mode changes.
    pub fn on_theme_change(&mut self, handler: impl FnMut(ThemeMode) + Send + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Sets (or with `None`, removes) the attribute. Returns whether the
    /// mode changed.
    pub fn set_attribute(&mut self, value: Option<&str>) -> bool {
        let before = self.current();
        self.value = value.map(str::to_string);
        let after = self.current();
        if before == after {
            return false;
        }
        log::debug!("Theme changed to {after}");
        for handler in &mut self.handlers {
            handler(after);
        }
        true
    }

    /// Flips between dark and light.
    pub fn toggle(&mut self) -> ThemeMode {
        let next = self.current().toggled();
        self.set_attribute(Some(next.as_str()));
        next
    }
}

impl fmt::Debug for ThemeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeAttribute")
            .field("value", &self.value)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
