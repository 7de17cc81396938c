/// Frame adapter
///
/// Normalizes whatever the host hands us (raw capture buffers, encoded
/// stills, decoded images) into one canonical RGB + luma representation.
/// The adapter is pure: the same input always yields identical buffers.
use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, RgbImage};

use crate::error::{EngineError, Result};

/// Pixel layout of a raw frame buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    /// Native format of most screen/camera capture APIs
    Bgra8,
    Gray8,
    /// Y plane followed by interleaved UV at quarter resolution
    Nv12,
}

impl PixelFormat {
    fn expected_len(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            PixelFormat::Rgb8 => pixels.checked_mul(3),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => pixels.checked_mul(4),
            PixelFormat::Gray8 => Some(pixels),
            PixelFormat::Nv12 => pixels.checked_add(pixels / 2),
        }
    }
}

/// A frame as supplied by the caller, borrowed for the duration of one call
#[derive(Clone, Copy, Debug)]
pub enum FrameInput<'a> {
    Raw {
        data: &'a [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    /// PNG or JPEG bytes
    Encoded(&'a [u8]),
    Image(&'a DynamicImage),
}

impl<'a> From<&'a RgbImage> for FrameInput<'a> {
    fn from(image: &'a RgbImage) -> Self {
        FrameInput::Raw {
            data: image.as_raw(),
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgb8,
        }
    }
}

impl<'a> From<&'a image::RgbaImage> for FrameInput<'a> {
    fn from(image: &'a image::RgbaImage) -> Self {
        FrameInput::Raw {
            data: image.as_raw(),
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgba8,
        }
    }
}

impl<'a> From<&'a DynamicImage> for FrameInput<'a> {
    fn from(image: &'a DynamicImage) -> Self {
        FrameInput::Image(image)
    }
}

/// Canonical frame consumed by every detector
#[derive(Debug, Clone)]
pub struct CanonicalFrame {
    rgb: RgbImage,
    luma: GrayImage,
    /// Multiply canonical coordinates by this to get source coordinates
    scale: f32,
    source_width: u32,
    source_height: u32,
}

impl CanonicalFrame {
    /// Decode and normalize a frame.
    ///
    /// Frames whose longest side exceeds `max_dimension` are downscaled;
    /// `max_dimension == 0` disables the cap.
    pub fn from_input(input: &FrameInput<'_>, max_dimension: u32) -> Result<Self> {
        let rgb = match input {
            FrameInput::Raw {
                data,
                width,
                height,
                format,
            } => raw_to_rgb(data, *width, *height, *format)?,
            FrameInput::Encoded(bytes) => image::load_from_memory(bytes)
                .map_err(|e| {
                    EngineError::UnsupportedFrameFormat(format!("cannot decode image: {}", e))
                })?
                .to_rgb8(),
            FrameInput::Image(image) => image.to_rgb8(),
        };

        let (source_width, source_height) = rgb.dimensions();
        if source_width == 0 || source_height == 0 {
            return Err(EngineError::UnsupportedFrameFormat(
                "zero-sized frame".to_string(),
            ));
        }

        let longest = source_width.max(source_height);
        let (rgb, scale) = if max_dimension > 0 && longest > max_dimension {
            let factor = max_dimension as f32 / longest as f32;
            let w = ((source_width as f32 * factor).round() as u32).max(1);
            let h = ((source_height as f32 * factor).round() as u32).max(1);
            let resized = image::imageops::resize(&rgb, w, h, FilterType::Triangle);
            (resized, source_width as f32 / w as f32)
        } else {
            (rgb, 1.0)
        };

        let luma = rgb_to_luma(&rgb);

        Ok(Self {
            rgb,
            luma,
            scale,
            source_width,
            source_height,
        })
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn luma(&self) -> &GrayImage {
        &self.luma
    }

    /// Canonical (working) width
    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    /// Canonical (working) height
    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }
}

fn raw_to_rgb(data: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(EngineError::UnsupportedFrameFormat(
            "zero-sized frame".to_string(),
        ));
    }
    if format == PixelFormat::Nv12 && (width % 2 != 0 || height % 2 != 0) {
        return Err(EngineError::UnsupportedFrameFormat(
            "NV12 frames need even dimensions".to_string(),
        ));
    }
    let expected = format.expected_len(width, height).ok_or_else(|| {
        EngineError::UnsupportedFrameFormat("frame dimensions overflow".to_string())
    })?;
    if data.len() != expected {
        return Err(EngineError::UnsupportedFrameFormat(format!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            data.len()
        )));
    }

    let buffer = match format {
        PixelFormat::Rgb8 => data.to_vec(),
        PixelFormat::Rgba8 => data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        PixelFormat::Bgra8 => data
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        PixelFormat::Gray8 => data.iter().flat_map(|&v| [v, v, v]).collect(),
        PixelFormat::Nv12 => nv12_to_rgb(data, width as usize, height as usize),
    };

    RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        EngineError::UnsupportedFrameFormat("buffer does not match dimensions".to_string())
    })
}

fn nv12_to_rgb(pixels: &[u8], w: usize, h: usize) -> Vec<u8> {
    let y_plane = w * h;
    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Fixed-point luma: (77*R + 150*G + 29*B) / 256
fn rgb_to_luma(rgb: &RgbImage) -> GrayImage {
    let (width, height) = rgb.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let value = (77 * pixel[0] as u32 + 150 * pixel[1] as u32 + 29 * pixel[2] as u32) >> 8;
        luma.put_pixel(x, y, Luma([value as u8]));
    }
    luma
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    #[test]
    fn test_rgb_pass_through() {
        let img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let frame = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        assert_eq!(frame.rgb(), &img);
        assert_eq!(frame.scale(), 1.0);
        assert_eq!(frame.source_dimensions(), (4, 3));
    }

    #[test]
    fn test_bgra_swaps_channels() {
        let data = [30u8, 20, 10, 255];
        let input = FrameInput::Raw {
            data: &data,
            width: 1,
            height: 1,
            format: PixelFormat::Bgra8,
        };
        let frame = CanonicalFrame::from_input(&input, 0).unwrap();
        assert_eq!(frame.rgb().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_rgba_drops_alpha() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        let frame = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        assert_eq!(frame.rgb().get_pixel(1, 1), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_nv12_gray() {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        let input = FrameInput::Raw {
            data: &nv12,
            width: 2,
            height: 2,
            format: PixelFormat::Nv12,
        };
        let frame = CanonicalFrame::from_input(&input, 0).unwrap();
        assert!(frame.rgb().pixels().all(|p| p == &Rgb([128, 128, 128])));
    }

    #[test]
    fn test_length_mismatch_is_unsupported() {
        let data = vec![0u8; 10];
        let input = FrameInput::Raw {
            data: &data,
            width: 2,
            height: 2,
            format: PixelFormat::Rgb8,
        };
        assert!(matches!(
            CanonicalFrame::from_input(&input, 0),
            Err(EngineError::UnsupportedFrameFormat(_))
        ));
    }

    #[test]
    fn test_zero_size_is_unsupported() {
        let input = FrameInput::Raw {
            data: &[],
            width: 0,
            height: 0,
            format: PixelFormat::Gray8,
        };
        assert!(CanonicalFrame::from_input(&input, 0).is_err());
    }

    #[test]
    fn test_garbage_bytes_are_unsupported() {
        let input = FrameInput::Encoded(b"definitely not a png");
        assert!(matches!(
            CanonicalFrame::from_input(&input, 0),
            Err(EngineError::UnsupportedFrameFormat(_))
        ));
    }

    #[test]
    fn test_downscale_keeps_scale_factor() {
        let img = RgbImage::from_pixel(400, 200, Rgb([0, 0, 0]));
        let frame = CanonicalFrame::from_input(&FrameInput::from(&img), 100).unwrap();
        assert_eq!((frame.width(), frame.height()), (100, 50));
        assert_eq!(frame.scale(), 4.0);
        assert_eq!(frame.source_dimensions(), (400, 200));
    }

    #[test]
    fn test_adapter_is_idempotent() {
        let mut img = RgbImage::from_pixel(32, 16, Rgb([5, 5, 5]));
        img.put_pixel(3, 4, Rgb([200, 100, 0]));
        let a = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        let b = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        assert_eq!(a.rgb(), b.rgb());
        assert_eq!(a.luma(), b.luma());
    }
}
