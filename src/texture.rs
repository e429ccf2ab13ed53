//! Textures: row-major color grids with wrap and filter modes, plus the
//! loaders that fill them from image files or procedural patterns.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;
use num_traits::clamp;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::math::Vec2;

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Nearest neighbor (pixelated)
    Nearest,
    /// Bilinear interpolation (smooth)
    #[default]
    Bilinear,
}

/// Behavior of UV coordinates outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Tile the texture
    #[default]
    Repeat,
    /// Clamp to the edge pixels
    ClampToEdge,
    /// Tile with mirroring
    MirroredRepeat,
}

/// A sampled image.
///
/// The V axis is flipped at sample time, so v = 0 addresses the bottom row
/// of the source image. Sampling an empty texture yields magenta.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    pixels: Vec<Color>,
    width: usize,
    height: usize,
    filter_mode: FilterMode,
    wrap_mode: WrapMode,
}

impl Texture {
    /// Build a texture from a row-major pixel buffer.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Color>) -> RenderResult<Texture> {
        if pixels.len() != width * height {
            return Err(RenderError::TextureSizeMismatch {
                expected: width * height,
                actual: pixels.len(),
            });
        }

        Ok(Texture {
            pixels,
            width,
            height,
            ..Texture::default()
        })
    }

    /// A single-color texture.
    pub fn solid(width: usize, height: usize, color: Color) -> Texture {
        Texture {
            pixels: vec![color; width * height],
            width,
            height,
            ..Texture::default()
        }
    }

    /// A procedural checkerboard with `squares` squares per axis.
    pub fn checkerboard(width: usize, height: usize, squares: usize, color1: Color, color2: Color) -> Texture {
        let square_w = (width / squares).max(1);
        let square_h = (height / squares).max(1);

        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let even = ((x / square_w) + (y / square_h)) % 2 == 0;
                pixels.push(if even { color1 } else { color2 });
            }
        }

        Texture {
            pixels,
            width,
            height,
            ..Texture::default()
        }
    }

    /// Load a texture, dispatching on the file extension: TGA and PPM are
    /// decoded here, PNG/JPEG/BMP go through the image crate.
    pub fn load<P: AsRef<Path>>(path: P) -> RenderResult<Texture> {
        let path = path.as_ref();

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let texture = match ext.as_str() {
            "tga" => Texture::load_tga(path)?,
            "ppm" => Texture::load_ppm(path)?,
            "png" | "jpg" | "jpeg" | "bmp" => Texture::load_via_image(path)?,
            other => return Err(RenderError::UnsupportedImageFormat(other.to_string())),
        };

        info!(
            "loaded texture {} ({}x{})",
            path.display(),
            texture.width,
            texture.height
        );

        Ok(texture)
    }

    /// Uncompressed true-color or greyscale TGA (types 2 and 3), stored
    /// bottom-to-top in BGR(A) order.
    fn load_tga(path: &Path) -> RenderResult<Texture> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if data.len() < 18 {
            return Err(RenderError::MalformedImage("TGA header truncated".to_string()));
        }

        let id_length = data[0] as usize;
        let color_map_type = data[1];
        let image_type = data[2];
        let width = data[12] as usize | (data[13] as usize) << 8;
        let height = data[14] as usize | (data[15] as usize) << 8;
        let bits_per_pixel = data[16];

        if color_map_type != 0 {
            return Err(RenderError::MalformedImage("color-mapped TGA not supported".to_string()));
        }
        if image_type != 2 && image_type != 3 {
            return Err(RenderError::MalformedImage(format!(
                "only uncompressed TGA is supported (type {})",
                image_type
            )));
        }

        let channels = (bits_per_pixel / 8) as usize;
        let mut offset = 18 + id_length;

        if data.len() < offset + width * height * channels {
            return Err(RenderError::MalformedImage("TGA pixel data truncated".to_string()));
        }

        let mut pixels = vec![Color::BLACK; width * height];
        for y in 0..height {
            // TGA stores rows bottom-to-top by default.
            let row = height - 1 - y;
            for x in 0..width {
                let px = &data[offset..offset + channels];
                offset += channels;

                let b = px[0] as f32 / 255.0;
                let g = if channels > 1 { px[1] as f32 / 255.0 } else { b };
                let r = if channels > 2 { px[2] as f32 / 255.0 } else { b };
                let a = if channels > 3 { px[3] as f32 / 255.0 } else { 1.0 };

                pixels[row * width + x] = Color::new(r, g, b, a);
            }
        }

        Texture::from_pixels(width, height, pixels)
    }

    /// Binary P6 PPM.
    fn load_ppm(path: &Path) -> RenderResult<Texture> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let mut cursor = 0usize;
        let mut next_token = |data: &[u8]| -> RenderResult<String> {
            // Skip whitespace and comment lines between tokens.
            while cursor < data.len() {
                if data[cursor].is_ascii_whitespace() {
                    cursor += 1;
                } else if data[cursor] == b'#' {
                    while cursor < data.len() && data[cursor] != b'\n' {
                        cursor += 1;
                    }
                } else {
                    break;
                }
            }
            let start = cursor;
            while cursor < data.len() && !data[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if start == cursor {
                return Err(RenderError::MalformedImage("PPM header truncated".to_string()));
            }
            Ok(String::from_utf8_lossy(&data[start..cursor]).into_owned())
        };

        let magic = next_token(&data)?;
        if magic != "P6" {
            return Err(RenderError::MalformedImage(format!("expected P6 PPM, got {}", magic)));
        }

        let parse = |s: String| -> RenderResult<usize> {
            s.parse()
                .map_err(|_| RenderError::MalformedImage(format!("bad PPM header field: {}", s)))
        };

        let width = parse(next_token(&data)?)?;
        let height = parse(next_token(&data)?)?;
        let max_val = parse(next_token(&data)?)? as f32;

        // A single whitespace byte separates the header from the pixels.
        cursor += 1;

        if data.len() < cursor + width * height * 3 {
            return Err(RenderError::MalformedImage("PPM pixel data truncated".to_string()));
        }

        let mut pixels = Vec::with_capacity(width * height);
        for _ in 0..width * height {
            let rgb = &data[cursor..cursor + 3];
            cursor += 3;
            pixels.push(Color::new(
                rgb[0] as f32 / max_val,
                rgb[1] as f32 / max_val,
                rgb[2] as f32 / max_val,
                1.0,
            ));
        }

        Texture::from_pixels(width, height, pixels)
    }

    fn load_via_image(path: &Path) -> RenderResult<Texture> {
        let decoded = image::open(path)
            .map_err(|e| RenderError::MalformedImage(format!("{}: {}", path.display(), e)))?
            .to_rgba8();

        let (width, height) = decoded.dimensions();
        let pixels = decoded
            .pixels()
            .map(|p| {
                Color::new(
                    p.0[0] as f32 / 255.0,
                    p.0[1] as f32 / 255.0,
                    p.0[2] as f32 / 255.0,
                    p.0[3] as f32 / 255.0,
                )
            })
            .collect();

        Texture::from_pixels(width as usize, height as usize, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.pixels.is_empty()
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.filter_mode = mode;
    }

    pub fn set_wrap_mode(&mut self, mode: WrapMode) {
        self.wrap_mode = mode;
    }

    fn wrap_coord(&self, coord: f32) -> f32 {
        match self.wrap_mode {
            WrapMode::Repeat => coord - coord.floor(),
            WrapMode::ClampToEdge => clamp(coord, 0.0, 1.0),
            WrapMode::MirroredRepeat => {
                let mut frac = coord.fract();
                let integer = coord.trunc();
                if frac < 0.0 {
                    frac += 1.0;
                }
                let period = integer.abs() as i64;
                if period % 2 == 1 {
                    1.0 - frac
                } else {
                    frac
                }
            }
        }
    }

    /// Texel fetch clamped to the image bounds.
    fn get_pixel(&self, x: i64, y: i64) -> Color {
        let x = clamp(x, 0, self.width as i64 - 1) as usize;
        let y = clamp(y, 0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width + x]
    }

    /// Sample at UV coordinates.
    pub fn sample_uv(&self, uv: Vec2) -> Color {
        self.sample(uv.x, uv.y)
    }

    /// Sample at (u, v) with the configured wrap and filter modes.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        if !self.is_valid() {
            // Missing-texture magenta
            return Color::MAGENTA;
        }

        let u = self.wrap_coord(u);
        let v = self.wrap_coord(v);

        // v = 0 addresses the bottom of the image.
        let v = 1.0 - v;

        let px = u * (self.width - 1) as f32;
        let py = v * (self.height - 1) as f32;

        match self.filter_mode {
            FilterMode::Nearest => self.get_pixel(px.round() as i64, py.round() as i64),
            FilterMode::Bilinear => {
                let x0 = px.floor() as i64;
                let y0 = py.floor() as i64;

                let fx = px - x0 as f32;
                let fy = py - y0 as f32;

                let c00 = self.get_pixel(x0, y0);
                let c10 = self.get_pixel(x0 + 1, y0);
                let c01 = self.get_pixel(x0, y0 + 1);
                let c11 = self.get_pixel(x0 + 1, y0 + 1);

                let top = c00 * (1.0 - fx) + c10 * fx;
                let bottom = c01 * (1.0 - fx) + c11 * fx;
                top * (1.0 - fy) + bottom * fy
            }
        }
    }
}
