use crate::error::GraphError;

// ── Color ─────────────────────────────────────────────────────────────────────

/// Straight (non-premultiplied) RGBA with each channel in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);
    pub const BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    pub const TRANSPARENT: Self = Self([0.0, 0.0, 0.0, 0.0]);

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    pub fn to_array(self) -> [f32; 4] {
        self.0
    }

    /// Parse a CSS-style color string.
    ///
    /// Accepted forms: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
    /// `rgba(r, g, b, a)`, `hsl(h, s%, l%)`, `hsla(h, s%, l%, a)`.
    /// Numeric rgb components are 0–255, alpha is 0–1, hue is degrees.
    /// Anything else fails with [`GraphError::InvalidColor`].
    pub fn parse(s: &str) -> Result<Self, GraphError> {
        let trimmed = s.trim();
        let parsed = if let Some(hex) = trimmed.strip_prefix('#') {
            parse_hex(hex)
        } else if let Some(body) = strip_fn(trimmed, "rgba").or_else(|| strip_fn(trimmed, "rgb")) {
            parse_rgb_fn(body)
        } else if let Some(body) = strip_fn(trimmed, "hsla").or_else(|| strip_fn(trimmed, "hsl")) {
            parse_hsl_fn(body)
        } else {
            None
        };
        parsed.ok_or_else(|| GraphError::InvalidColor { value: s.to_string() })
    }
}

impl From<[f32; 4]> for Color {
    fn from(v: [f32; 4]) -> Self {
        Self(v)
    }
}

// ── ColorSpec ─────────────────────────────────────────────────────────────────

/// A color as it appears in loader input: either a CSS-style string or a
/// ready-made `[r, g, b, a]` array (channels in `[0, 1]`).
#[derive(Clone, Debug)]
pub enum ColorSpec {
    Css(String),
    Rgba([f32; 4]),
}

impl ColorSpec {
    pub fn resolve(&self) -> Result<Color, GraphError> {
        match self {
            ColorSpec::Css(s) => Color::parse(s),
            ColorSpec::Rgba(v) => Ok(Color(v.map(|c| c.clamp(0.0, 1.0)))),
        }
    }
}

impl From<&str> for ColorSpec {
    fn from(s: &str) -> Self {
        ColorSpec::Css(s.to_string())
    }
}

impl From<[f32; 4]> for ColorSpec {
    fn from(v: [f32; 4]) -> Self {
        ColorSpec::Rgba(v)
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

/// Strip `name(` ... `)` and return the argument body.  Case-insensitive on
/// the function name, per CSS.
fn strip_fn<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = s
        .get(..name.len())
        .filter(|head| head.eq_ignore_ascii_case(name))
        .map(|_| &s[name.len()..])?;
    rest.trim_start().strip_prefix('(')?.trim_end().strip_suffix(')')
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as f32);
    let bytes = hex.as_bytes();
    match bytes.len() {
        // #rgb — each nibble doubled.
        3 => {
            let mut ch = [0.0f32; 4];
            ch[3] = 1.0;
            for i in 0..3 {
                ch[i] = nibble(bytes[i])? * 17.0 / 255.0;
            }
            Some(Color(ch))
        }
        6 | 8 => {
            let mut ch = [0.0f32; 4];
            ch[3] = 1.0;
            for i in 0..bytes.len() / 2 {
                let hi = nibble(bytes[2 * i])?;
                let lo = nibble(bytes[2 * i + 1])?;
                ch[i] = (hi * 16.0 + lo) / 255.0;
            }
            Some(Color(ch))
        }
        _ => None,
    }
}

/// `r, g, b[, a]` with rgb in 0–255 (ints or floats) and alpha in 0–1.
fn parse_rgb_fn(body: &str) -> Option<Color> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let r = parts[0].parse::<f32>().ok()?;
    let g = parts[1].parse::<f32>().ok()?;
    let b = parts[2].parse::<f32>().ok()?;
    let a = match parts.get(3) {
        Some(p) => p.parse::<f32>().ok()?,
        None => 1.0,
    };
    Some(Color([
        (r / 255.0).clamp(0.0, 1.0),
        (g / 255.0).clamp(0.0, 1.0),
        (b / 255.0).clamp(0.0, 1.0),
        a.clamp(0.0, 1.0),
    ]))
}

/// `h, s%, l%[, a]` with hue in degrees (wrapping), s/l as percentages.
fn parse_hsl_fn(body: &str) -> Option<Color> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let h = parts[0].parse::<f32>().ok()?.rem_euclid(360.0);
    let s = parts[1].strip_suffix('%')?.trim().parse::<f32>().ok()? / 100.0;
    let l = parts[2].strip_suffix('%')?.trim().parse::<f32>().ok()? / 100.0;
    let a = match parts.get(3) {
        Some(p) => p.parse::<f32>().ok()?,
        None => 1.0,
    };
    let (s, l) = (s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));

    // Standard HSL → RGB (CSS Color 3).
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Some(Color([r1 + m, g1 + m, b1 + m, a.clamp(0.0, 1.0)]))
}
