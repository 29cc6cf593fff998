//! # Image Normalizer
//!
//! Shrinks uploaded pictures before they are embedded into pending items,
//! so a queued item fits the local storage quota.
//!
//! ## Escalation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   ImagePolicy::embed(raw, pressure)                     │
//! │                                                                         │
//! │  validate_upload ── jpeg/png/gif/webp, ≤ 5 MiB                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  normalize 800×600 @ 70 ──► data URL fits and no pressure? ──► Embedded │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  normalize 400×300 @ 50 ──► data URL ≤ 500 000 chars? ───────► Embedded │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  Dropped (item is queued without its image)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scaling never enlarges and always keeps the aspect ratio.

use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::{debug, info, warn};

use menu_core::ImageRef;

use crate::config::ImageSettings;
use crate::error::{SyncError, SyncResult};

/// Accepted upload MIME types.
pub const SUPPORTED_FORMATS: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Default upload limit (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// Normalization
// =============================================================================

/// A re-encoded JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    /// `data:image/jpeg;base64,...` form used in pending items.
    pub fn to_image_ref(&self) -> ImageRef {
        ImageRef::embedded(
            "image/jpeg",
            &base64::engine::general_purpose::STANDARD.encode(&self.bytes),
        )
    }
}

/// Target size for a `width × height` image within the bounds.
///
/// Width is clamped first, then height.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (mut w, mut h) = (width as f64, height as f64);

    if w > max_width as f64 {
        h = (h * max_width as f64 / w).round();
        w = max_width as f64;
    }
    if h > max_height as f64 {
        w = (w * max_height as f64 / h).round();
        h = max_height as f64;
    }

    ((w as u32).max(1), (h as u32).max(1))
}

/// Decodes, downsizes and re-encodes an image as JPEG.
pub fn normalize(raw: &[u8], max_width: u32, max_height: u32, quality: u8) -> SyncResult<NormalizedImage> {
    if !(1..=100).contains(&quality) {
        return Err(SyncError::ImageFailed(format!(
            "quality must be between 1 and 100, got {}",
            quality
        )));
    }

    let img = image::load_from_memory(raw)?;
    let (width, height) = scaled_dimensions(img.width(), img.height(), max_width, max_height);

    let img = if (width, height) != (img.width(), img.height()) {
        img.resize_exact(width, height, FilterType::Triangle)
    } else {
        img
    };

    let mut bytes = Vec::new();
    {
        let mut cursor = Cursor::new(&mut bytes);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
        img.to_rgb8().write_with_encoder(encoder)?;
    }

    debug!(width, height, quality, bytes = bytes.len(), "Normalized image");
    Ok(NormalizedImage {
        bytes,
        width,
        height,
    })
}

/// Checks type and size of an upload before any decoding work.
pub fn validate_upload(bytes: &[u8], mime: &str, max_bytes: usize) -> SyncResult<()> {
    let mime = mime.trim().to_lowercase();
    let mime = if mime == "image/jpg" { "image/jpeg".to_string() } else { mime };

    if !SUPPORTED_FORMATS.contains(&mime.as_str()) {
        return Err(SyncError::UnsupportedImage(mime));
    }

    if bytes.len() > max_bytes {
        return Err(SyncError::ImageTooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    if bytes.is_empty() {
        return Err(SyncError::ImageFailed("empty image".into()));
    }

    Ok(())
}

/// MIME type for a file extension, if it is one we accept.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// =============================================================================
// Escalation Policy
// =============================================================================

/// Bounds for one normalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

/// What happened to an image on its way into a pending item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedOutcome {
    Embedded {
        image: ImageRef,
        width: u32,
        height: u32,
        /// True if the fallback bounds were used.
        reduced: bool,
    },
    Dropped {
        reason: String,
    },
}

impl EmbedOutcome {
    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            EmbedOutcome::Embedded { image, .. } => Some(image),
            EmbedOutcome::Dropped { .. } => None,
        }
    }

    pub fn into_image(self) -> Option<ImageRef> {
        match self {
            EmbedOutcome::Embedded { image, .. } => Some(image),
            EmbedOutcome::Dropped { .. } => None,
        }
    }
}

/// Primary and fallback bounds plus the embedded size ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePolicy {
    pub primary: ImageBounds,
    pub fallback: ImageBounds,
    pub max_embedded_chars: usize,
    pub max_upload_bytes: usize,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self::from_settings(&ImageSettings::default())
    }
}

impl ImagePolicy {
    pub fn from_settings(settings: &ImageSettings) -> Self {
        ImagePolicy {
            primary: ImageBounds {
                max_width: settings.primary_max_width,
                max_height: settings.primary_max_height,
                quality: settings.primary_quality,
            },
            fallback: ImageBounds {
                max_width: settings.fallback_max_width,
                max_height: settings.fallback_max_height,
                quality: settings.fallback_quality,
            },
            max_embedded_chars: settings.max_embedded_chars,
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    /// Produces the image reference stored on a pending item.
    ///
    /// Upload validation failures are errors. Anything after that degrades
    /// to a smaller image or no image at all.
    pub fn embed(&self, raw: &[u8], mime: &str, under_pressure: bool) -> SyncResult<EmbedOutcome> {
        validate_upload(raw, mime, self.max_upload_bytes)?;

        if !under_pressure {
            let b = self.primary;
            match normalize(raw, b.max_width, b.max_height, b.quality) {
                Ok(img) => {
                    let image = img.to_image_ref();
                    if image.as_str().len() <= self.max_embedded_chars {
                        return Ok(EmbedOutcome::Embedded {
                            image,
                            width: img.width,
                            height: img.height,
                            reduced: false,
                        });
                    }
                    info!(chars = image.as_str().len(), "Image too large after first pass, reducing");
                }
                Err(e) => {
                    warn!(error = %e, "Could not normalize image");
                    return Ok(EmbedOutcome::Dropped {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let b = self.fallback;
        let img = match normalize(raw, b.max_width, b.max_height, b.quality) {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "Could not normalize image");
                return Ok(EmbedOutcome::Dropped {
                    reason: e.to_string(),
                });
            }
        };

        let image = img.to_image_ref();
        let chars = image.as_str().len();
        if chars > self.max_embedded_chars {
            warn!(chars, max = self.max_embedded_chars, "Dropping image from pending item");
            return Ok(EmbedOutcome::Dropped {
                reason: format!(
                    "image is still {} characters after reduction (max {})",
                    chars, self.max_embedded_chars
                ),
            });
        }

        Ok(EmbedOutcome::Embedded {
            image,
            width: img.width,
            height: img.height,
            reduced: true,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(3000, 2000, 800, 600), (800, 533));
        assert_eq!(scaled_dimensions(1000, 2000, 800, 600), (300, 600));
        assert_eq!(scaled_dimensions(640, 480, 800, 600), (640, 480));
        assert_eq!(scaled_dimensions(10_000, 1, 800, 600), (800, 1));
    }

    #[test]
    fn test_scaled_dimensions_fixed_point() {
        for (w, h) in [(3000, 2000), (1234, 5678), (801, 601), (5, 5)] {
            let once = scaled_dimensions(w, h, 800, 600);
            assert_eq!(scaled_dimensions(once.0, once.1, 800, 600), once);
        }
    }

    #[test]
    fn test_normalize_downscales_to_jpeg() {
        let out = normalize(&png(3000, 2000), 800, 600, 70).unwrap();
        assert_eq!((out.width, out.height), (800, 533));
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);

        let again = normalize(&out.bytes, 800, 600, 70).unwrap();
        assert_eq!((again.width, again.height), (800, 533));
    }

    #[test]
    fn test_normalize_keeps_small_images() {
        let out = normalize(&png(120, 90), 800, 600, 70).unwrap();
        assert_eq!((out.width, out.height), (120, 90));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize(b"definitely not an image", 800, 600, 70).is_err());
        assert!(normalize(&png(10, 10), 800, 600, 0).is_err());
    }

    #[test]
    fn test_validate_upload() {
        let bytes = png(4, 4);
        assert!(validate_upload(&bytes, "image/png", MAX_UPLOAD_BYTES).is_ok());
        assert!(validate_upload(&bytes, "IMAGE/JPG", MAX_UPLOAD_BYTES).is_ok());

        assert!(matches!(
            validate_upload(&bytes, "application/pdf", MAX_UPLOAD_BYTES),
            Err(SyncError::UnsupportedImage(_))
        ));
        assert!(matches!(
            validate_upload(&bytes, "image/png", 10),
            Err(SyncError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn test_embed_primary() {
        let outcome = ImagePolicy::default()
            .embed(&png(1600, 1200), "image/png", false)
            .unwrap();
        match outcome {
            EmbedOutcome::Embedded {
                image,
                width,
                height,
                reduced,
            } => {
                assert_eq!((width, height), (800, 600));
                assert!(!reduced);
                assert_eq!(image.embedded_mime(), Some("image/jpeg"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_embed_under_pressure_uses_fallback() {
        let outcome = ImagePolicy::default()
            .embed(&png(1600, 1200), "image/png", true)
            .unwrap();
        assert!(matches!(
            outcome,
            EmbedOutcome::Embedded {
                width: 400,
                height: 300,
                reduced: true,
                ..
            }
        ));
    }

    #[test]
    fn test_embed_drops_oversized() {
        let policy = ImagePolicy {
            max_embedded_chars: 100,
            ..ImagePolicy::default()
        };
        let outcome = policy.embed(&png(200, 200), "image/png", false).unwrap();
        assert!(matches!(outcome, EmbedOutcome::Dropped { .. }));
        assert!(outcome.image().is_none());
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("webp"), Some("image/webp"));
        assert_eq!(mime_for_extension("bmp"), None);
    }
}
