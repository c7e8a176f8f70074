//! Conversion of GL ES client pixel encodings into the canonical RGBA8 layout used for every
//! native colour texture.
//!
//! GL addresses texel rows bottom-up while the target addresses them top-down, so every
//! conversion also flips the image vertically.

use thiserror::Error;

use crate::gl::*;

/// Client pixel encodings accepted by `tex_image_2d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb565,
    Rgb888,
    Luminance8,
    LuminanceAlpha88,
    Alpha8,
    Rgba4444,
    Rgba5551,
    Rgba8888,
}

impl PixelFormat {
    /// Map a GL `(format, type)` pair.
    pub fn from_gl(format: GLenum, ty: GLenum) -> Option<Self> {
        Some(match (format, ty) {
            (GL_RGB, GL_UNSIGNED_SHORT_5_6_5) => Self::Rgb565,
            (GL_RGB, GL_UNSIGNED_BYTE) => Self::Rgb888,
            (GL_LUMINANCE, GL_UNSIGNED_BYTE) => Self::Luminance8,
            (GL_LUMINANCE_ALPHA, GL_UNSIGNED_BYTE) => Self::LuminanceAlpha88,
            (GL_ALPHA, GL_UNSIGNED_BYTE) => Self::Alpha8,
            (GL_RGBA, GL_UNSIGNED_SHORT_4_4_4_4) => Self::Rgba4444,
            (GL_RGBA, GL_UNSIGNED_SHORT_5_5_5_1) => Self::Rgba5551,
            (GL_RGBA, GL_UNSIGNED_BYTE) => Self::Rgba8888,
            _ => return None,
        })
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Luminance8 | Self::Alpha8 => 1,
            Self::Rgb565 | Self::LuminanceAlpha88 | Self::Rgba4444 | Self::Rgba5551 => 2,
            Self::Rgb888 => 3,
            Self::Rgba8888 => 4,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PixelError {
    #[error("unsupported pixel format 0x{format:04x} / type 0x{ty:04x}")]
    Unsupported { format: GLenum, ty: GLenum },
    #[error("pixel data too short: expected {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("image size {width}x{height} overflows")]
    Overflow { width: u32, height: u32 },
}

/// Convert a GL upload into flipped RGBA8.
pub fn convert_to_rgba8(
    format: GLenum,
    ty: GLenum,
    width: u32,
    height: u32,
    src: &[u8],
) -> Result<Vec<u8>, PixelError> {
    let pixel_format =
        PixelFormat::from_gl(format, ty).ok_or(PixelError::Unsupported { format, ty })?;
    convert(pixel_format, width, height, src)
}

/// Convert `src` (tightly packed rows, row 0 first) into RGBA8 with row 0 last.
pub fn convert(
    format: PixelFormat,
    width: u32,
    height: u32,
    src: &[u8],
) -> Result<Vec<u8>, PixelError> {
    let overflow = PixelError::Overflow { width, height };
    let w = width as usize;
    let h = height as usize;
    let src_pitch = w
        .checked_mul(format.bytes_per_pixel())
        .ok_or_else(|| overflow.clone())?;
    let expected = src_pitch.checked_mul(h).ok_or_else(|| overflow.clone())?;
    if src.len() < expected {
        return Err(PixelError::TooShort {
            expected,
            actual: src.len(),
        });
    }
    let dst_pitch = w.checked_mul(4).ok_or_else(|| overflow.clone())?;
    let mut out = vec![0u8; dst_pitch.checked_mul(h).ok_or(overflow)?];
    if w == 0 || h == 0 {
        return Ok(out);
    }

    for (y, src_row) in src[..expected].chunks_exact(src_pitch).enumerate() {
        let dst_y = h - 1 - y;
        let dst_row = &mut out[dst_y * dst_pitch..(dst_y + 1) * dst_pitch];
        convert_row(format, src_row, dst_row);
    }
    Ok(out)
}

fn convert_row(format: PixelFormat, src: &[u8], dst: &mut [u8]) {
    if format == PixelFormat::Rgba8888 {
        dst.copy_from_slice(src);
        return;
    }
    let texels = dst.chunks_exact_mut(4);
    match format {
        PixelFormat::Rgba8888 => {}
        PixelFormat::Rgb888 => {
            for (px, texel) in src.chunks_exact(3).zip(texels) {
                texel.copy_from_slice(&[px[0], px[1], px[2], 0xff]);
            }
        }
        PixelFormat::Luminance8 => {
            for (&l, texel) in src.iter().zip(texels) {
                texel.copy_from_slice(&[l, l, l, 0xff]);
            }
        }
        PixelFormat::LuminanceAlpha88 => {
            // The alpha byte is ignored and luminance lands in all four channels; existing
            // content depends on this.
            for (px, texel) in src.chunks_exact(2).zip(texels) {
                let l = px[0];
                texel.copy_from_slice(&[l, l, l, l]);
            }
        }
        PixelFormat::Alpha8 => {
            for (&a, texel) in src.iter().zip(texels) {
                texel.copy_from_slice(&[0, 0, 0, a]);
            }
        }
        PixelFormat::Rgb565 => {
            for (px, texel) in src.chunks_exact(2).zip(texels) {
                texel.copy_from_slice(&unpack_565(u16::from_le_bytes([px[0], px[1]])));
            }
        }
        PixelFormat::Rgba4444 => {
            for (px, texel) in src.chunks_exact(2).zip(texels) {
                texel.copy_from_slice(&unpack_4444(u16::from_le_bytes([px[0], px[1]])));
            }
        }
        PixelFormat::Rgba5551 => {
            for (px, texel) in src.chunks_exact(2).zip(texels) {
                texel.copy_from_slice(&unpack_5551(u16::from_le_bytes([px[0], px[1]])));
            }
        }
    }
}

fn unpack_565(p: u16) -> [u8; 4] {
    let r = (((p & 0xF800) >> 8) | ((p & 0xF800) >> 13)) as u8;
    let g = (((p & 0x07E0) >> 3) | ((p & 0x07E0) >> 9)) as u8;
    let b = (((p & 0x001F) << 3) | ((p & 0x001F) >> 2)) as u8;
    [r, g, b, 0xff]
}

fn unpack_4444(p: u16) -> [u8; 4] {
    let r = (((p & 0xF000) >> 8) | ((p & 0xF000) >> 12)) as u8;
    let g = (((p & 0x0F00) >> 4) | ((p & 0x0F00) >> 8)) as u8;
    let b = ((p & 0x00F0) | ((p & 0x00F0) >> 4)) as u8;
    let a = (((p & 0x000F) << 4) | (p & 0x000F)) as u8;
    [r, g, b, a]
}

fn unpack_5551(p: u16) -> [u8; 4] {
    let r = (((p & 0xF800) >> 8) | ((p & 0xF800) >> 13)) as u8;
    let g = (((p & 0x07C0) >> 3) | ((p & 0x07C0) >> 8)) as u8;
    let b = (((p & 0x003E) << 2) | ((p & 0x003E) >> 3)) as u8;
    let a = if p & 1 != 0 { 0xff } else { 0 };
    [r, g, b, a]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8888_is_flipped_verbatim() {
        let src = [
            1, 2, 3, 4, 5, 6, 7, 8, // row 0
            9, 10, 11, 12, 13, 14, 15, 16, // row 1
        ];
        let out = convert_to_rgba8(GL_RGBA, GL_UNSIGNED_BYTE, 2, 2, &src).unwrap();
        assert_eq!(
            out,
            vec![9, 10, 11, 12, 13, 14, 15, 16, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn rgb565_expands_to_full_range() {
        let white = 0xFFFFu16.to_le_bytes();
        let red = 0xF800u16.to_le_bytes();
        let green = 0x07E0u16.to_le_bytes();
        let blue = 0x001Fu16.to_le_bytes();
        let src = [white, red, green, blue].concat();
        let out = convert(PixelFormat::Rgb565, 4, 1, &src).unwrap();
        assert_eq!(
            out,
            vec![
                255, 255, 255, 255, //
                255, 0, 0, 255, //
                0, 255, 0, 255, //
                0, 0, 255, 255,
            ]
        );
    }

    #[test]
    fn rgba4444_replicates_nibbles() {
        let src = 0x1234u16.to_le_bytes();
        let out = convert(PixelFormat::Rgba4444, 1, 1, &src).unwrap();
        assert_eq!(out, vec![0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn rgba5551_alpha_is_one_bit() {
        let opaque_red = 0xF801u16.to_le_bytes();
        let clear_blue = 0x003Eu16.to_le_bytes();
        let src = [opaque_red, clear_blue].concat();
        let out = convert(PixelFormat::Rgba5551, 2, 1, &src).unwrap();
        assert_eq!(out, vec![255, 0, 0, 255, 0, 0, 255, 0]);
    }

    #[test]
    fn single_channel_formats() {
        let l = convert(PixelFormat::Luminance8, 1, 1, &[0x40]).unwrap();
        assert_eq!(l, vec![0x40, 0x40, 0x40, 0xff]);

        let a = convert(PixelFormat::Alpha8, 1, 1, &[0x80]).unwrap();
        assert_eq!(a, vec![0, 0, 0, 0x80]);

        let rgb = convert(PixelFormat::Rgb888, 1, 1, &[1, 2, 3]).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 0xff]);
    }

    #[test]
    fn luminance_alpha_writes_luminance_everywhere() {
        let out = convert(PixelFormat::LuminanceAlpha88, 2, 1, &[0x10, 0xff, 0x20, 0x00]).unwrap();
        assert_eq!(out, vec![0x10, 0x10, 0x10, 0x10, 0x20, 0x20, 0x20, 0x20]);
    }

    #[test]
    fn rejects_unsupported_and_short_input() {
        assert_eq!(
            convert_to_rgba8(GL_RGBA, GL_FLOAT, 1, 1, &[0; 16]),
            Err(PixelError::Unsupported {
                format: GL_RGBA,
                ty: GL_FLOAT
            })
        );
        assert_eq!(
            convert(PixelFormat::Rgb888, 2, 2, &[0; 11]),
            Err(PixelError::TooShort {
                expected: 12,
                actual: 11
            })
        );
    }

    #[test]
    fn output_is_always_four_bytes_per_texel() {
        let out = convert(PixelFormat::Alpha8, 3, 5, &[0; 15]).unwrap();
        assert_eq!(out.len(), 3 * 5 * 4);
    }
}
