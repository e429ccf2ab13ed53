//! Image writers: binary PPM (P6) and uncompressed 32-bit TGA.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use num_traits::clamp;

use crate::error::RenderResult;
use crate::render::framebuffer::Framebuffer;

#[inline]
fn channel(c: f32) -> u8 {
    (clamp(c, 0.0, 1.0) * 255.0).round() as u8
}

/// Write the color buffer as binary PPM: `P6\n{W} {H}\n255\n` followed by
/// RGB triplets, top to bottom.
pub fn save_ppm<P: AsRef<Path>>(framebuffer: &Framebuffer, path: P) -> RenderResult<()> {
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);

    write!(file, "P6\n{} {}\n255\n", framebuffer.width(), framebuffer.height())?;

    let mut data = Vec::with_capacity(framebuffer.width() * framebuffer.height() * 3);
    for color in framebuffer.color_buffer() {
        data.push(channel(color.r));
        data.push(channel(color.g));
        data.push(channel(color.b));
    }
    file.write_all(&data)?;
    file.flush()?;

    info!("wrote {}", path.display());
    Ok(())
}

/// Write the color buffer as uncompressed true-color TGA (type 2): 18-byte
/// header, 32 bits per pixel, BGRA, top-left origin.
pub fn save_tga<P: AsRef<Path>>(framebuffer: &Framebuffer, path: P) -> RenderResult<()> {
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);

    let width = framebuffer.width();
    let height = framebuffer.height();

    let mut header = [0u8; 18];
    header[2] = 2; // uncompressed true-color
    header[12] = (width & 0xff) as u8;
    header[13] = ((width >> 8) & 0xff) as u8;
    header[14] = (height & 0xff) as u8;
    header[15] = ((height >> 8) & 0xff) as u8;
    header[16] = 32; // bits per pixel
    header[17] = 0x28; // top-left origin, 8 alpha bits
    file.write_all(&header)?;

    let mut data = Vec::with_capacity(width * height * 4);
    for color in framebuffer.color_buffer() {
        data.push(channel(color.b));
        data.push(channel(color.g));
        data.push(channel(color.r));
        data.push(channel(color.a));
    }
    file.write_all(&data)?;
    file.flush()?;

    info!("wrote {}", path.display());
    Ok(())
}

/// Save dispatching on the file extension; unknown or missing extensions
/// fall back to PPM.
pub fn save<P: AsRef<Path>>(framebuffer: &Framebuffer, path: P) -> RenderResult<()> {
    let path = path.as_ref();

    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("tga") => save_tga(framebuffer, path),
        Some("ppm") => save_ppm(framebuffer, path),
        Some(_) => save_ppm(framebuffer, path),
        None => save_ppm(framebuffer, path.with_extension("ppm")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use std::fs;

    #[test]
    fn ppm_header_and_pixels() {
        let mut fb = Framebuffer::new(2, 1);
        fb.set_pixel(0, 0, Color::RED);
        fb.set_pixel(1, 0, Color::new(0.0, 0.5, 1.0, 1.0));

        let path = std::env::temp_dir().join("softpipe_test_out.ppm");
        save_ppm(&fb, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::remove_file(&path).ok();

        let header = b"P6\n2 1\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(&bytes[header.len()..], &[255, 0, 0, 0, 128, 255]);
    }

    #[test]
    fn tga_header_and_bgra_order() {
        let mut fb = Framebuffer::new(1, 1);
        fb.set_pixel(0, 0, Color::new(1.0, 0.5, 0.0, 1.0));

        let path = std::env::temp_dir().join("softpipe_test_out.tga");
        save_tga(&fb, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(bytes.len(), 18 + 4);
        assert_eq!(bytes[2], 2);
        assert_eq!(bytes[12], 1);
        assert_eq!(bytes[14], 1);
        assert_eq!(bytes[16], 32);
        assert_eq!(bytes[17], 0x28);
        // BGRA
        assert_eq!(&bytes[18..], &[0, 128, 255, 255]);
    }
}
