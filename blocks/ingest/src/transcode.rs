//! Rendition encoding: an original-quality JPEG and a watermarked JPEG per file.
//!
//! The source size is probed from the header first, the overlay is synthesized for
//! that size, then the full decode and composite run. All of this is CPU-bound and
//! is meant to run through [`Transcoder::transcode_blocking`].

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use thiserror::Error;

use crate::watermark::{self, Overlay, WatermarkError};

pub const ORIGINAL_QUALITY: u8 = 90;
pub const WATERMARK_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("unreadable image: {0}")]
    Decode(String),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    #[error("overlay rendering failed: {0}")]
    Overlay(String),

    #[error("jpeg encode failed: {0}")]
    Encode(String),

    #[error("transcode worker failed: {0}")]
    Worker(String),
}

/// Both encoded renditions of one source file.
#[derive(Debug, Clone)]
pub struct Renditions {
    pub width: u32,
    pub height: u32,
    pub original: Vec<u8>,
    pub watermark: Vec<u8>,
}

/// Owns the font database used to render overlay text. Clone is cheap.
#[derive(Clone)]
pub struct Transcoder {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

impl Transcoder {
    /// System fonts plus any `.ttf`/`.otf`/`.ttc` files in `font_dir`.
    pub fn new(font_dir: Option<&Path>) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = font_dir {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::info!(faces = db.len(), "overlay font database loaded");
        Self::with_fonts(db)
    }

    pub fn with_fonts(db: usvg::fontdb::Database) -> Self {
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// Pixel size from the image header, without a full decode.
    pub fn probe(bytes: &[u8]) -> Result<(u32, u32), TranscodeError> {
        image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TranscodeError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| TranscodeError::Decode(e.to_string()))
    }

    /// Produce both renditions of `bytes`, stamping `label` on the watermark.
    pub fn transcode(&self, bytes: &[u8], label: &str) -> Result<Renditions, TranscodeError> {
        let (width, height) = Self::probe(bytes)?;
        let overlay = watermark::compose(width, height, label)?;

        let source = image::load_from_memory(bytes)
            .map_err(|e| TranscodeError::Decode(e.to_string()))?
            .to_rgb8();
        if source.dimensions() != (width, height) {
            return Err(TranscodeError::Decode(format!(
                "header says {}x{} but pixels are {}x{}",
                width,
                height,
                source.width(),
                source.height()
            )));
        }

        let original = encode_jpeg(&source, ORIGINAL_QUALITY)?;

        let mut stamped = source;
        let (panel, panel_w, panel_h) = self.rasterize(&overlay)?;
        composite_centered(&mut stamped, &panel, panel_w, panel_h);
        let watermark = encode_jpeg(&stamped, WATERMARK_QUALITY)?;

        Ok(Renditions {
            width,
            height,
            original,
            watermark,
        })
    }

    /// [`Transcoder::transcode`] on the blocking pool.
    pub async fn transcode_blocking(
        &self,
        bytes: Vec<u8>,
        label: String,
    ) -> Result<Renditions, TranscodeError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.transcode(&bytes, &label))
            .await
            .map_err(|e| TranscodeError::Worker(e.to_string()))?
    }

    /// Rasterize the overlay into straight-alpha RGBA.
    fn rasterize(&self, overlay: &Overlay) -> Result<(Vec<[u8; 4]>, u32, u32), TranscodeError> {
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&overlay.svg, &opts)
            .map_err(|e| TranscodeError::Overlay(e.to_string()))?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(overlay.width, overlay.height)
            .ok_or_else(|| TranscodeError::Overlay("failed to allocate overlay pixmap".into()))?;
        resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());

        let pixels = pixmap
            .pixels()
            .iter()
            .map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Ok((pixels, overlay.width, overlay.height))
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, TranscodeError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
        .map_err(|e| TranscodeError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Overlay-blend `panel` onto the centre of `base`, weighted by panel alpha.
fn composite_centered(base: &mut RgbImage, panel: &[[u8; 4]], panel_w: u32, panel_h: u32) {
    let x0 = base.width().saturating_sub(panel_w) / 2;
    let y0 = base.height().saturating_sub(panel_h) / 2;

    for py in 0..panel_h.min(base.height()) {
        for px in 0..panel_w.min(base.width()) {
            let [r, g, b, a] = panel[(py * panel_w + px) as usize];
            if a == 0 {
                continue;
            }
            let alpha = a as f32 / 255.0;
            let dst = base.get_pixel_mut(x0 + px, y0 + py);
            for (channel, src) in dst.0.iter_mut().zip([r, g, b]) {
                let under = *channel as f32 / 255.0;
                let over = src as f32 / 255.0;
                let blended = overlay_blend(under, over);
                let mixed = under * (1.0 - alpha) + blended * alpha;
                *channel = (mixed * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn overlay_blend(under: f32, over: f32) -> f32 {
    if under < 0.5 {
        2.0 * under * over
    } else {
        1.0 - 2.0 * (1.0 - under) * (1.0 - over)
    }
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "font directory not readable");
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        if !matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc") {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping font");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb};

    fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn transcoder() -> Transcoder {
        Transcoder::with_fonts(usvg::fontdb::Database::new())
    }

    #[test]
    fn probe_reads_header_size() {
        assert_eq!(Transcoder::probe(&png(40, 30, 10)).unwrap(), (40, 30));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = transcoder().transcode(b"definitely not an image", "x").unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));
    }

    #[test]
    fn renditions_keep_source_dimensions() {
        let out = transcoder().transcode(&png(120, 80, 128), "© Brand 2025").unwrap();
        assert_eq!((out.width, out.height), (120, 80));

        let original = image::load_from_memory(&out.original).unwrap();
        let stamped = image::load_from_memory(&out.watermark).unwrap();
        assert_eq!((original.width(), original.height()), (120, 80));
        assert_eq!((stamped.width(), stamped.height()), (120, 80));
    }

    #[test]
    fn panel_darkens_centre_band_only() {
        let out = transcoder().transcode(&png(200, 200, 128), "").unwrap();
        let stamped = image::load_from_memory(&out.watermark).unwrap().to_rgb8();

        let edge = stamped.get_pixel(100, 5).0[0] as i32;
        let centre = stamped.get_pixel(100, 100).0[0] as i32;
        assert!((edge - 128).abs() <= 4, "edge pixel changed: {}", edge);
        assert!(centre < edge - 20, "centre {} not darker than edge {}", centre, edge);
    }

    #[test]
    fn overlay_blend_matches_reference_points() {
        assert_eq!(overlay_blend(0.0, 1.0), 0.0);
        assert_eq!(overlay_blend(1.0, 0.0), 1.0);
        assert!((overlay_blend(0.25, 0.5) - 0.25).abs() < 1e-6);
    }
}
