//! Color parsing for token values and rendered swatches
//!
//! Tokens store colors as `rgba(r,g,b,a)`. The host renders swatches with a
//! CSS background such as `rgb(r, g, b)`. Comparison ignores alpha.

use std::fmt;

/// Three-channel color used for comparisons (alpha dropped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse the token encoding `rgba(r,g,b,a)`
    ///
    /// Whitespace around components is tolerated; the alpha channel must be a
    /// number but is otherwise ignored. Returns None for anything else.
    pub fn parse_rgba(value: &str) -> Option<Self> {
        let args = function_args(value.trim(), "rgba")?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let [r, g, b, a] = parts.as_slice() else {
            return None;
        };
        a.parse::<f32>().ok().filter(|a| a.is_finite())?;
        Some(Self::new(r.parse().ok()?, g.parse().ok()?, b.parse().ok()?))
    }

    /// Parse a rendered CSS color, either `rgb(r, g, b)` or `rgba(r, g, b, a)`
    ///
    /// Background shorthands may trail the color with other values
    /// (`rgb(1, 2, 3) none repeat`), so only the leading function is read.
    pub fn parse_css(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with("rgba(") {
            let end = value.find(')')?;
            return Self::parse_rgba(&value[..=end]);
        }
        let end = value.find(')')?;
        let args = function_args(&value[..=end], "rgb")?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return None;
        };
        Some(Self::new(r.parse().ok()?, g.parse().ok()?, b.parse().ok()?))
    }
}

impl fmt::Display for Rgb {
    /// Formats the way browsers serialize computed backgrounds
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}
