//! Media compressor. Downsizes user-selected images into embeddable
//! `data:` URLs for previews and draft persistence.
//!
//! ## Fallback
//!
//! Compression never hard-fails the preview step: when decoding or
//! re-encoding fails, the original bytes are embedded unchanged via
//! [`raw_data_url`]. Only an unreadable (empty) file is an error.

use std::fmt;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::errors::{Result, WizardError};
use crate::preview::{MediaKind, Preview};

/// A file picked by the user. Only the MIME type is inspected to decide
/// whether compression is attempted.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == "application/pdf"
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }

    /// Two selections refer to the same file when name and size match.
    pub fn same_file(&self, other: &SelectedFile) -> bool {
        self.name == other.name && self.size() == other.size()
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Target bounds and JPEG quality (0–1) for one kind of upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionProfile {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f32,
}

impl CompressionProfile {
    pub const COVER: Self = Self {
        max_width: 800,
        max_height: 600,
        quality: 0.7,
    };
    pub const DOCUMENT: Self = Self {
        max_width: 600,
        max_height: 800,
        quality: 0.6,
    };
    pub const SUPPORTING: Self = Self {
        max_width: 400,
        max_height: 300,
        quality: 0.6,
    };

    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Scale `(width, height)` proportionally to fit inside the bounds.
/// Never upscales and never returns a zero dimension for a non-empty image.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let scaled_w = ((width as f64 * scale).round() as u32).max(1);
    let scaled_h = ((height as f64 * scale).round() as u32).max(1);
    (scaled_w, scaled_h)
}

/// Decode, downscale and re-encode `file` as a JPEG `data:` URL.
///
/// Runs on the blocking pool; the caller is suspended until encoding
/// completes.
pub async fn compress_image(file: &SelectedFile, profile: CompressionProfile) -> Result<String> {
    let bytes = file.bytes.clone();
    tokio::task::spawn_blocking(move || encode_scaled(&bytes, profile))
        .await
        .map_err(|e| WizardError::Compression(format!("compression task failed: {e}")))?
}

fn encode_scaled(bytes: &[u8], profile: CompressionProfile) -> Result<String> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = fit_within(
        img.width(),
        img.height(),
        profile.max_width,
        profile.max_height,
    );
    let resized = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut out), profile.jpeg_quality())
        .encode_image(&rgb)?;

    debug!(
        "Compressed {} bytes into {width}x{height} JPEG of {} bytes",
        bytes.len(),
        out.len()
    );
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&out)))
}

/// Embed the original bytes without compression or resizing.
pub fn raw_data_url(file: &SelectedFile) -> Result<String> {
    if file.bytes.is_empty() {
        return Err(WizardError::Compression(format!(
            "{} could not be read",
            file.name
        )));
    }
    let mime = if file.mime.is_empty() {
        "application/octet-stream"
    } else {
        file.mime.as_str()
    };
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(&file.bytes)))
}

/// Produce the preview shown for `file`.
///
/// Images are compressed (falling back to the raw bytes); PDFs and videos
/// get a non-previewable marker.
pub async fn render_preview(file: &SelectedFile, profile: CompressionProfile) -> Result<Preview> {
    if file.is_image() {
        match compress_image(file, profile).await {
            Ok(data) => return Ok(Preview::Image(data)),
            Err(e) => warn!("Compressing {} failed, embedding original: {e}", file.name),
        }
        return raw_data_url(file).map(Preview::Image);
    }

    if file.bytes.is_empty() {
        return Err(WizardError::Compression(format!(
            "{} could not be read",
            file.name
        )));
    }
    let kind = if file.is_pdf() {
        MediaKind::Pdf
    } else if file.is_video() {
        MediaKind::Video
    } else {
        MediaKind::Other
    };
    Ok(Preview::NonPreviewable(kind))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 120, 40]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Pixel noise, so the compressed preview stays large.
    pub(crate) fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let n = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503)) ^ (x * y);
            image::Rgb([n as u8, (n >> 8) as u8, (n >> 16) as u8])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn decode_data_url(url: &str) -> DynamicImage {
        let (_, b64) = url.split_once(";base64,").unwrap();
        image::load_from_memory(&STANDARD.decode(b64).unwrap()).unwrap()
    }

    #[test]
    fn fit_within_scales_down_preserving_aspect_ratio() {
        assert_eq!(fit_within(1600, 1200, 800, 600), (800, 600));
        assert_eq!(fit_within(1000, 3000, 600, 800), (267, 800));
        assert_eq!(fit_within(4000, 1000, 400, 300), (400, 100));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(320, 200, 800, 600), (320, 200));
        assert_eq!(fit_within(0, 0, 800, 600), (0, 0));
    }

    #[test]
    fn fit_within_keeps_extreme_ratios_visible() {
        assert_eq!(fit_within(10_000, 1, 400, 300), (400, 1));
    }

    #[tokio::test]
    async fn compress_image_downsizes_to_profile() {
        let file = SelectedFile::new("cover.png", "image/png", png(1600, 1200));
        let url = compress_image(&file, CompressionProfile::COVER).await.unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let decoded = decode_data_url(&url);
        assert_eq!((decoded.width(), decoded.height()), (800, 600));
    }

    #[tokio::test]
    async fn corrupt_image_falls_back_to_raw_bytes() {
        let file = SelectedFile::new("broken.png", "image/png", b"not a png".to_vec());
        let preview = render_preview(&file, CompressionProfile::COVER).await.unwrap();
        let expected = format!("data:image/png;base64,{}", STANDARD.encode(b"not a png"));
        assert_eq!(preview, Preview::Image(expected));
    }

    #[tokio::test]
    async fn empty_image_is_an_error() {
        let file = SelectedFile::new("empty.png", "image/png", Vec::new());
        let err = render_preview(&file, CompressionProfile::DOCUMENT).await;
        assert!(matches!(err, Err(WizardError::Compression(_))));
    }

    #[tokio::test]
    async fn pdf_and_video_are_not_previewable() {
        let pdf = SelectedFile::new("id.pdf", "application/pdf", b"%PDF-1.7".to_vec());
        let video = SelectedFile::new("clip.mp4", "video/mp4", vec![0, 0, 0, 24]);
        assert_eq!(
            render_preview(&pdf, CompressionProfile::DOCUMENT).await.unwrap(),
            Preview::NonPreviewable(MediaKind::Pdf)
        );
        assert_eq!(
            render_preview(&video, CompressionProfile::SUPPORTING).await.unwrap(),
            Preview::NonPreviewable(MediaKind::Video)
        );
    }

    #[test]
    fn same_file_compares_name_and_size() {
        let a = SelectedFile::new("a.jpg", "image/jpeg", vec![1, 2, 3]);
        let b = SelectedFile::new("a.jpg", "image/jpeg", vec![9, 9, 9]);
        let c = SelectedFile::new("a.jpg", "image/jpeg", vec![1, 2]);
        assert!(a.same_file(&b));
        assert!(!a.same_file(&c));
    }
}
