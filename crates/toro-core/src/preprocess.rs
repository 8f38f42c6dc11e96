//! Receipt image preprocessing
//!
//! Phone photos of receipts are routinely 4000px wide and several megabytes.
//! Before hashing and upload the image is decoded, scaled down to fit a
//! bounding box and re-encoded, which keeps uploads small and gives the
//! fingerprint a stable input.

use std::borrow::Cow;
use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, ImageFormat};
use tracing::debug;

use crate::error::{Error, Result};

/// Encoding used for the re-encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    /// Lossless WebP; `quality` is ignored
    Webp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(Self::Jpeg),
            "png" | "image/png" => Ok(Self::Png),
            "webp" | "image/webp" => Ok(Self::Webp),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Bounding box and encoding settings
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in `0.0..=1.0`
    pub quality: f32,
    pub format: OutputFormat,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
            quality: 0.85,
            format: OutputFormat::Jpeg,
        }
    }
}

/// An uploaded image, either as text (data URI or bare base64) or raw bytes
#[derive(Debug, Clone)]
pub enum ImageInput {
    DataUri(String),
    Bytes(Vec<u8>),
}

impl ImageInput {
    /// Raw image bytes, decoding base64 text if needed
    pub fn to_bytes(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Self::Bytes(b) => Ok(Cow::Borrowed(b.as_slice())),
            Self::DataUri(text) => decode_data_uri(text).map(Cow::Owned),
        }
    }
}

/// A re-encoded image ready for hashing and upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Data URI form, the text the fingerprint is computed over
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn readable_size(&self) -> String {
        readable_size(self.bytes.len() as u64)
    }
}

/// Output of `compress`, with the source dimensions for diagnostics
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub image: EncodedImage,
    pub original_width: u32,
    pub original_height: u32,
    pub original_bytes: usize,
}

impl CompressedImage {
    /// Whether the image was scaled down
    pub fn was_resized(&self) -> bool {
        self.image.width != self.original_width || self.image.height != self.original_height
    }
}

/// Check size and type of an upload before any decoding work
///
/// JPEG, PNG and WebP are accepted. Unrecognizable bytes are a decode error;
/// recognizable but unsupported formats are rejected as an invalid upload.
pub fn validate_upload(bytes: &[u8], max_bytes: usize) -> Result<ImageFormat> {
    if bytes.len() > max_bytes {
        return Err(Error::InvalidUpload(format!(
            "File too large: {} (max {})",
            readable_size(bytes.len() as u64),
            readable_size(max_bytes as u64)
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| Error::Decode(format!("Unrecognized image data: {}", e)))?;

    match format {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP => Ok(format),
        other => Err(Error::InvalidUpload(format!(
            "File type {} not allowed. Allowed: image/jpeg, image/png, image/webp",
            other.to_mime_type()
        ))),
    }
}

/// Scale factor that fits `width`x`height` inside the box without upscaling
pub fn scale_ratio(width: u32, height: u32, max_width: u32, max_height: u32) -> f64 {
    let w_ratio = max_width as f64 / width as f64;
    let h_ratio = max_height as f64 / height as f64;
    w_ratio.min(h_ratio).min(1.0)
}

/// Decode, downscale and re-encode an image
pub fn compress(input: &ImageInput, options: &PreprocessOptions) -> Result<CompressedImage> {
    let bytes = input.to_bytes()?;
    compress_bytes(&bytes, options)
}

/// `compress` for raw image bytes
pub fn compress_bytes(bytes: &[u8], options: &PreprocessOptions) -> Result<CompressedImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::Decode(format!("Failed to load image: {}", e)))?;

    let (width, height) = img.dimensions();
    let ratio = scale_ratio(width, height, options.max_width, options.max_height);
    let target_width = (width as f64 * ratio).floor() as u32;
    let target_height = (height as f64 * ratio).floor() as u32;

    if target_width == 0 || target_height == 0 {
        return Err(Error::RenderSurfaceUnavailable(format!(
            "Cannot render {}x{} image into a {}x{} surface",
            width, height, target_width, target_height
        )));
    }

    let resized = if ratio < 1.0 {
        img.resize_exact(target_width, target_height, FilterType::Lanczos3)
    } else {
        img
    };

    let encoded = encode(&resized, options)?;
    debug!(
        from = %format!("{}x{}", width, height),
        to = %format!("{}x{}", target_width, target_height),
        before = %readable_size(bytes.len() as u64),
        after = %readable_size(encoded.len() as u64),
        "Compressed receipt image"
    );

    Ok(CompressedImage {
        image: EncodedImage {
            bytes: encoded,
            format: options.format,
            width: target_width,
            height: target_height,
        },
        original_width: width,
        original_height: height,
        original_bytes: bytes.len(),
    })
}

fn encode(img: &DynamicImage, options: &PreprocessOptions) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let mut buf = Vec::new();

    let written = match options.format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality(options.quality)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => {
            let rgba = img.to_rgba8();
            PngEncoder::new(&mut buf).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
        }
        OutputFormat::Webp => {
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut buf).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
        }
    };

    written.map_err(|e| {
        Error::RenderSurfaceUnavailable(format!(
            "Failed to encode image as {}: {}",
            options.format.as_str(),
            e
        ))
    })?;
    Ok(buf)
}

fn jpeg_quality(quality: f32) -> u8 {
    ((quality.clamp(0.0, 1.0) * 100.0).round() as u8).max(1)
}

/// Decode a data URI (`data:image/png;base64,...`) or bare base64 text
pub fn decode_data_uri(text: &str) -> Result<Vec<u8>> {
    let payload = match text.trim().strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::Decode("Data URI has no payload".into()))?;
            if !header.ends_with(";base64") {
                return Err(Error::Decode(format!(
                    "Unsupported data URI encoding: {}",
                    header
                )));
            }
            data
        }
        None => text,
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::Decode(format!("Invalid base64 image data: {}", e)))
}

/// Estimate the binary size of a base64 (or data URI) encoded image
///
/// Base64 carries 3 bytes in every 4 characters.
pub fn estimate_size(encoded: &str) -> u64 {
    let payload = encoded
        .split(',')
        .nth(1)
        .filter(|p| !p.is_empty())
        .unwrap_or(encoded);
    (payload.len() as u64 * 3) / 4
}

/// Human-readable size (`"1.50 MB"`)
pub fn readable_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let i = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let i = i.min(UNITS.len() - 1);
    format!("{:.2} {}", bytes as f64 / 1024f64.powi(i as i32), UNITS[i])
}

/// Encode a `DynamicImage` in the given container format (test and CLI helper)
pub fn encode_as(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format)
        .map_err(|e| Error::RenderSurfaceUnavailable(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        encode_as(&DynamicImage::ImageRgb8(img), ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_scale_ratio_never_upscales() {
        assert_eq!(scale_ratio(500, 300, 1024, 1024), 1.0);
        assert_eq!(scale_ratio(2048, 1024, 1024, 1024), 0.5);
        assert_eq!(scale_ratio(1000, 4000, 1024, 1024), 0.256);
    }

    #[test]
    fn test_compress_downscales_preserving_aspect() {
        let input = ImageInput::Bytes(sample_png(2048, 1024));
        let out = compress(&input, &PreprocessOptions::default()).unwrap();
        assert_eq!((out.image.width, out.image.height), (1024, 512));
        assert_eq!((out.original_width, out.original_height), (2048, 1024));
        assert!(out.was_resized());
        assert_eq!(image::guess_format(&out.image.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_compress_keeps_small_images() {
        let input = ImageInput::Bytes(sample_png(300, 200));
        let options = PreprocessOptions {
            format: OutputFormat::Png,
            ..Default::default()
        };
        let out = compress(&input, &options).unwrap();
        assert_eq!((out.image.width, out.image.height), (300, 200));
        assert!(!out.was_resized());
        assert_eq!(image::guess_format(&out.image.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_compress_accepts_data_uri() {
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(sample_png(40, 20))
        );
        let out = compress(&ImageInput::DataUri(uri), &PreprocessOptions::default()).unwrap();
        assert_eq!((out.image.width, out.image.height), (40, 20));
        assert!(out.image.to_data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_compress_rejects_garbage() {
        let err = compress(
            &ImageInput::Bytes(b"not an image".to_vec()),
            &PreprocessOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let err = compress(
            &ImageInput::DataUri("data:image/png;base64,@@@".to_string()),
            &PreprocessOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_zero_sized_box_has_no_surface() {
        let options = PreprocessOptions {
            max_width: 0,
            ..Default::default()
        };
        let err = compress(&ImageInput::Bytes(sample_png(10, 10)), &options).unwrap_err();
        assert!(matches!(err, Error::RenderSurfaceUnavailable(_)));
    }

    #[test]
    fn test_validate_upload() {
        let png = sample_png(8, 8);
        assert_eq!(validate_upload(&png, 1024 * 1024).unwrap(), ImageFormat::Png);
        assert!(matches!(
            validate_upload(&png, 10),
            Err(Error::InvalidUpload(_))
        ));
        assert!(matches!(
            validate_upload(b"GIF89a\x01\x00\x01\x00", 1024),
            Err(Error::InvalidUpload(_))
        ));
        assert!(matches!(
            validate_upload(b"plain text", 1024),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_estimate_size() {
        assert_eq!(estimate_size("data:image/jpeg;base64,AAAA"), 3);
        assert_eq!(estimate_size("AAAAAAAA"), 6);
        assert_eq!(estimate_size(""), 0);
    }

    #[test]
    fn test_readable_size() {
        assert_eq!(readable_size(0), "0 B");
        assert_eq!(readable_size(512), "512.00 B");
        assert_eq!(readable_size(1536), "1.50 KB");
        assert_eq!(readable_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(readable_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JPG".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!("image/webp".parse::<OutputFormat>(), Ok(OutputFormat::Webp));
        assert!("tiff".parse::<OutputFormat>().is_err());
    }
}
