use ratatui::style::{Color, Style};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeVariant {
    /// Dark theme (default)
    Dark,
    /// Light theme
    Light,
}

impl Default for ThemeVariant {
    fn default() -> Self {
        Self::Dark
    }
}

/// Semantic color roles used by the form renderer.
///
/// Both variants are derived from the Catppuccin palettes (Mocha and Latte),
/// collapsed to the roles the engine actually draws with.
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub link: Color,
    pub text: Color,
    pub muted: Color,
    pub faint: Color,
    pub border: Color,
    pub border_focused: Color,
    pub surface: Color,
    pub surface_alt: Color,
    pub base: Color,
    pub cursor: Color,
}

impl Theme {
    pub fn new(variant: ThemeVariant) -> Self {
        match variant {
            ThemeVariant::Dark => Self::dark(),
            ThemeVariant::Light => Self::light(),
        }
    }

    fn dark() -> Self {
        Self {
            accent: Color::Rgb(0xcb, 0xa6, 0xf7),
            error: Color::Rgb(0xf3, 0x8b, 0xa8),
            warning: Color::Rgb(0xf9, 0xe2, 0xaf),
            success: Color::Rgb(0xa6, 0xe3, 0xa1),
            link: Color::Rgb(0x89, 0xb4, 0xfa),
            text: Color::Rgb(0xcd, 0xd6, 0xf4),
            muted: Color::Rgb(0xa6, 0xad, 0xc8),
            faint: Color::Rgb(0x6c, 0x70, 0x86),
            border: Color::Rgb(0x45, 0x47, 0x5a),
            border_focused: Color::Rgb(0xb4, 0xbe, 0xfe),
            surface: Color::Rgb(0x31, 0x32, 0x44),
            surface_alt: Color::Rgb(0x18, 0x18, 0x25),
            base: Color::Rgb(0x1e, 0x1e, 0x2e),
            cursor: Color::Rgb(0xf5, 0xe0, 0xdc),
        }
    }

    fn light() -> Self {
        Self {
            accent: Color::Rgb(0x88, 0x39, 0xef),
            error: Color::Rgb(0xd2, 0x0f, 0x39),
            warning: Color::Rgb(0xdf, 0x8e, 0x1d),
            success: Color::Rgb(0x40, 0xa0, 0x2b),
            link: Color::Rgb(0x1e, 0x66, 0xf5),
            text: Color::Rgb(0x4c, 0x4f, 0x69),
            muted: Color::Rgb(0x6c, 0x6f, 0x85),
            faint: Color::Rgb(0x9c, 0xa0, 0xb0),
            border: Color::Rgb(0xbc, 0xc0, 0xcc),
            border_focused: Color::Rgb(0x72, 0x87, 0xfd),
            surface: Color::Rgb(0xcc, 0xd0, 0xda),
            surface_alt: Color::Rgb(0xe6, 0xe9, 0xef),
            base: Color::Rgb(0xef, 0xf1, 0xf5),
            cursor: Color::Rgb(0xdc, 0x8a, 0x78),
        }
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn warning_style(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn success_style(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn cursor_style(&self) -> Style {
        Style::default().bg(self.cursor).fg(self.base)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(ThemeVariant::default())
    }
}
