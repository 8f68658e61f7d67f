//! Watermark overlay synthesis.
//!
//! Pure functions: given the source image's pixel size and a label, build an SVG
//! panel that spans the image width and takes a fixed share of its height.

use thiserror::Error;

/// Panel height as a share of the source image height.
pub const PANEL_HEIGHT_RATIO: f64 = 0.15;
/// Label font size as a share of the panel height.
pub const FONT_SIZE_RATIO: f64 = 0.40;
const CORNER_RATIO: f64 = 0.10;
const STROKE_RATIO: f64 = 0.02;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatermarkError {
    #[error("image dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// A synthesized overlay, ready to be rasterized at `width` x `height`.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub width: u32,
    pub height: u32,
    pub font_size: f64,
    pub svg: String,
}

/// Watermark text: `© {brand} {year}`, followed by the title when there is one.
pub fn label(brand: &str, year: i32, title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        format!("© {} {}", brand, year)
    } else {
        format!("© {} {} {}", brand, year, title)
    }
}

/// Overlay panel size for a source image of `width` x `height` pixels.
pub fn panel_size(width: u32, height: u32) -> Result<(u32, u32), WatermarkError> {
    if width == 0 || height == 0 {
        return Err(WatermarkError::InvalidDimensions { width, height });
    }
    let panel_height = ((height as f64) * PANEL_HEIGHT_RATIO).round().max(1.0) as u32;
    Ok((width, panel_height))
}

/// Build the overlay for a source image of `width` x `height` pixels.
pub fn compose(width: u32, height: u32, text: &str) -> Result<Overlay, WatermarkError> {
    let (panel_w, panel_h) = panel_size(width, height)?;
    let h = panel_h as f64;
    let font_size = h * FONT_SIZE_RATIO;
    let corner = h * CORNER_RATIO;
    let stroke = (h * STROKE_RATIO).max(0.5);

    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <defs>
    <linearGradient id="panel" x1="0" y1="0" x2="0" y2="1">
      <stop offset="0" stop-color="#000000" stop-opacity="0.55"/>
      <stop offset="1" stop-color="#000000" stop-opacity="0.35"/>
    </linearGradient>
  </defs>
  <rect width="100%" height="100%" rx="{corner:.2}" ry="{corner:.2}" fill="url(#panel)"/>
  <text x="50%" y="50%" font-family="Arial, sans-serif" font-size="{font_size:.2}" fill="white" fill-opacity="0.9" stroke="#000000" stroke-width="{stroke:.2}" text-anchor="middle" dominant-baseline="middle">{label}</text>
</svg>"##,
        w = panel_w,
        h = panel_h,
        corner = corner,
        font_size = font_size,
        stroke = stroke,
        label = escape_xml(text),
    );

    Ok(Overlay {
        width: panel_w,
        height: panel_h,
        font_size,
        svg,
    })
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
