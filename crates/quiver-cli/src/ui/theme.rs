//! UI Theme - colors, icons and animation constants

use crossterm::style::Color;
use quiver_core::Level;

/// Default theme for quiver output
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
    /// Longest dot run of a working line before it wraps around.
    pub max_dots: usize,
    /// Animation ticks between two dots.
    pub ticks_per_dot: usize,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            icons: Icons::default(),
            max_dots: 3,
            ticks_per_dot: 3,
        }
    }
}

impl Theme {
    /// Color for a status line of the given tone.
    pub fn color(&self, level: Level) -> Color {
        match level {
            Level::Info => self.colors.info,
            Level::Success => self.colors.success,
            Level::Failure => self.colors.error,
            Level::Muted => self.colors.muted,
        }
    }

    /// Leading icon for a status line of the given tone.
    pub fn icon(&self, level: Level) -> &'static str {
        match level {
            Level::Info => self.icons.active,
            Level::Success => self.icons.success,
            Level::Failure => self.icons.error,
            Level::Muted => self.icons.muted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Slot prefixes (package arguments)
    pub prefix: Color,
    pub info: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            prefix: Color::Cyan,
            info: Color::White,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            muted: Color::DarkGrey,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Icons {
    pub active: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub muted: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            active: "●",
            success: "✓",
            error: "✗",
            muted: "○",
            warning: "⚠",
            info: "ℹ",
        }
    }
}
