//! RGBA color type used by the framebuffer, materials and lights.

use std::ops::{Add, AddAssign, Mul};

use num_traits::clamp;

/// Linear RGBA color with 32-bit floating point channels.
///
/// Channel values are nominally in `[0, 1]`; intermediate lighting results
/// may exceed that range and are clamped before they reach the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);
    pub const YELLOW: Color = Color::new(1.0, 1.0, 0.0, 1.0);
    pub const CYAN: Color = Color::new(0.0, 1.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::new(1.0, 0.0, 1.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// Opaque grey
    #[inline]
    pub const fn grey(v: f32) -> Color {
        Color::new(v, v, v, 1.0)
    }

    /// Copy of this color with every channel clamped to `[0, 1]`
    #[inline]
    pub fn clamped(self) -> Color {
        Color {
            r: clamp(self.r, 0.0, 1.0),
            g: clamp(self.g, 0.0, 1.0),
            b: clamp(self.b, 0.0, 1.0),
            a: clamp(self.a, 0.0, 1.0),
        }
    }

    /// Copy of this color with the given alpha channel
    #[inline]
    pub fn with_alpha(self, a: f32) -> Color {
        Color { a, ..self }
    }

    /// Component-wise minimum against another color
    #[inline]
    pub fn min(self, rhs: Color) -> Color {
        Color {
            r: self.r.min(rhs.r),
            g: self.g.min(rhs.g),
            b: self.b.min(rhs.b),
            a: self.a.min(rhs.a),
        }
    }
}

impl Add for Color {
    type Output = Color;

    #[inline]
    fn add(self, rhs: Color) -> Color {
        Color {
            r: self.r + rhs.r,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
            a: self.a + rhs.a,
        }
    }
}

impl AddAssign for Color {
    #[inline]
    fn add_assign(&mut self, rhs: Color) {
        *self = *self + rhs;
    }
}

/// Component-wise modulation, alpha included
impl Mul for Color {
    type Output = Color;

    #[inline]
    fn mul(self, rhs: Color) -> Color {
        Color {
            r: self.r * rhs.r,
            g: self.g * rhs.g,
            b: self.b * rhs.b,
            a: self.a * rhs.a,
        }
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    #[inline]
    fn mul(self, rhs: f32) -> Color {
        Color {
            r: self.r * rhs,
            g: self.g * rhs,
            b: self.b * rhs,
            a: self.a * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_limits_channels() {
        let c = Color::new(1.5, -0.25, 0.5, 2.0).clamped();
        assert_eq!(c, Color::new(1.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn modulation_is_component_wise() {
        let c = Color::new(0.5, 1.0, 0.25, 1.0) * Color::new(1.0, 0.5, 0.0, 0.5);
        assert_eq!(c, Color::new(0.5, 0.5, 0.0, 0.5));
    }
}
