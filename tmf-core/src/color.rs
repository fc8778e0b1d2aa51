/// sRGB colors and color groups
use crate::error::{Error, Result};
use crate::ResourceId;

/// An 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Channels in `[0, 1]`; out-of-range values are clamped
    pub fn from_floats(r: f32, g: f32, b: f32, a: f32) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgba(channel(r), channel(g), channel(b), channel(a))
    }

    /// `#RRGGBB`, or `#RRGGBBAA` when not fully opaque
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let digits = text
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidColor(text.to_string()))?;
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(Error::InvalidColor(text.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| Error::InvalidColor(text.to_string()))
        };

        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

/// A resource holding an ordered list of colors.
///
/// The property id of a color is its position in the group.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    id: ResourceId,
    colors: Vec<Color>,
}

impl ColorGroup {
    pub(crate) fn new(id: ResourceId) -> Self {
        Self {
            id,
            colors: Vec::new(),
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.id
    }

    /// Append a color and return its property id
    pub fn add_color(&mut self, color: Color) -> u32 {
        self.colors.push(color);
        (self.colors.len() - 1) as u32
    }

    pub fn set_color(&mut self, property_id: u32, color: Color) -> Result<()> {
        let count = self.count();
        let slot = self
            .colors
            .get_mut(property_id as usize)
            .ok_or(Error::IndexOutOfRange {
                what: "color",
                index: property_id,
                count,
            })?;
        *slot = color;
        Ok(())
    }

    pub fn color(&self, property_id: u32) -> Option<Color> {
        self.colors.get(property_id as usize).copied()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn count(&self) -> u32 {
        self.colors.len() as u32
    }
}
