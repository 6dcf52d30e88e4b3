//! RGBA8 image buffer and PNG codec.
//!
//! Every image that crosses the wire is normalised to 8-bit RGBA on decode.
//! Palette, grayscale, low bit depth and 16-bit inputs are expanded, and a
//! missing alpha channel is filled with 0xFF. Encoding always produces an
//! RGBA8 PNG.

use png::{BitDepth, ColorType, Decoder, Encoder, Transformations};

/// Bytes per pixel.
pub const CHANNELS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("failed to decode png: {0}")]
    PngDecode(String),
    #[error("failed to encode png: {0}")]
    PngEncode(String),
    #[error("unsupported png layout {color_type:?} at {bit_depth:?}")]
    UnsupportedLayout {
        color_type: ColorType,
        bit_depth: BitDepth,
    },
}

/// Row-major RGBA8 image. Width and height are always non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Wrap a pixel buffer of exactly `width * height * 4` bytes.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidDimensions { width, height });
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or(ImageError::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(ImageError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image filled with a single pixel value.
    pub fn from_pixel(width: usize, height: usize, pixel: [u8; 4]) -> Result<Self, ImageError> {
        let count = width
            .checked_mul(height)
            .ok_or(ImageError::InvalidDimensions { width, height })?;
        Self::new(width, height, pixel.repeat(count))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes in one row.
    pub fn stride(&self) -> usize {
        self.width * CHANNELS
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at (x, y). Panics when out of bounds, like slice indexing.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let i = y * self.stride() + x * CHANNELS;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Decode a PNG file held in memory.
    pub fn decode_png(bytes: &[u8]) -> Result<Self, ImageError> {
        let mut decoder = Decoder::new(bytes);
        decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| ImageError::PngDecode(e.to_string()))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| ImageError::PngDecode(e.to_string()))?;
        buf.truncate(info.buffer_size());

        if info.bit_depth != BitDepth::Eight {
            return Err(ImageError::UnsupportedLayout {
                color_type: info.color_type,
                bit_depth: info.bit_depth,
            });
        }

        let width = info.width as usize;
        let height = info.height as usize;
        let data = match info.color_type {
            ColorType::Rgba => buf,
            ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 0xFF])
                .collect(),
            ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 0xFF]).collect(),
            other => {
                return Err(ImageError::UnsupportedLayout {
                    color_type: other,
                    bit_depth: info.bit_depth,
                })
            }
        };

        Self::new(width, height, data)
    }

    /// Encode as an RGBA8 PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut out = Vec::new();
        {
            let mut encoder = Encoder::new(&mut out, self.width as u32, self.height as u32);
            encoder.set_color(ColorType::Rgba);
            encoder.set_depth(BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .map_err(|e| ImageError::PngEncode(e.to_string()))?;
            writer
                .write_image_data(&self.data)
                .map_err(|e| ImageError::PngEncode(e.to_string()))?;
            writer
                .finish()
                .map_err(|e| ImageError::PngEncode(e.to_string()))?;
        }
        Ok(out)
    }
}
