//! Conversion configuration.
//!
//! Every fixed constant of the pipeline (viewport, supersampling factor, JPEG
//! quality, paper size, waits and timeouts) lives here with its default, so
//! callers and tests can shrink or stretch them without touching the stages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};

/// Viewport width of the render surface: A4 at 96 DPI.
pub const A4_VIEWPORT_WIDTH_PX: u32 = 794;
/// Viewport height of the render surface: A4 at 96 DPI.
pub const A4_VIEWPORT_HEIGHT_PX: u32 = 1123;
/// ISO A4 paper width.
pub const A4_WIDTH_MM: f32 = 210.0;
/// ISO A4 paper height.
pub const A4_HEIGHT_MM: f32 = 297.0;

/// Class names that mark an element as one printed page.
pub const DEFAULT_PAGE_CLASSES: [&str; 2] = ["pdf-page", "report-page"];

/// Physical paper size of the output document, portrait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PaperSize {
    pub const A4: Self = Self {
        width_mm: A4_WIDTH_MM,
        height_mm: A4_HEIGHT_MM,
    };
}

/// Configuration for [`crate::pipeline::Converter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Render surface width in CSS pixels (default: 794).
    pub viewport_width_px: u32,
    /// Render surface height in CSS pixels (default: 1123).
    pub viewport_height_px: u32,
    /// Supersampling factor applied when rasterising pages (default: 2.0).
    pub scale: f32,
    /// JPEG quality, 1–100 (default: 92).
    pub jpeg_quality: u8,
    /// Output paper width in millimetres (default: 210).
    pub paper_width_mm: f32,
    /// Output paper height in millimetres (default: 297).
    pub paper_height_mm: f32,
    /// Delay applied after the surface's load signal (default: 500 ms).
    pub settle_delay_ms: u64,
    /// Upper bound on load + settle (default: 3000 ms).
    pub max_render_wait_ms: u64,
    /// Per-resource fetch timeout (default: 15 s).
    pub fetch_timeout_ms: u64,
    /// Per-page rasterisation timeout (default: 30 s).
    pub raster_timeout_ms: u64,
    /// Page-boundary class names; any one of them marks a page.
    pub page_classes: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            title: "Inspection report".to_string(),
            viewport_width_px: A4_VIEWPORT_WIDTH_PX,
            viewport_height_px: A4_VIEWPORT_HEIGHT_PX,
            scale: 2.0,
            jpeg_quality: 92,
            paper_width_mm: A4_WIDTH_MM,
            paper_height_mm: A4_HEIGHT_MM,
            settle_delay_ms: 500,
            max_render_wait_ms: 3000,
            fetch_timeout_ms: 15_000,
            raster_timeout_ms: 30_000,
            page_classes: DEFAULT_PAGE_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ConvertConfig {
    pub fn paper(&self) -> PaperSize {
        PaperSize {
            width_mm: self.paper_width_mm,
            height_mm: self.paper_height_mm,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn max_render_wait(&self) -> Duration {
        Duration::from_millis(self.max_render_wait_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn raster_timeout(&self) -> Duration {
        Duration::from_millis(self.raster_timeout_ms)
    }

    /// Reject values the stages cannot work with.
    pub fn validate(&self) -> ConvertResult<()> {
        if self.viewport_width_px == 0 || self.viewport_height_px == 0 {
            return Err(ConvertError::InvalidConfig(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport_width_px, self.viewport_height_px
            )));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConvertError::InvalidConfig(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConvertError::InvalidConfig(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if !(self.paper_width_mm > 0.0 && self.paper_height_mm > 0.0) {
            return Err(ConvertError::InvalidConfig(format!(
                "paper size must be positive, got {}x{} mm",
                self.paper_width_mm, self.paper_height_mm
            )));
        }
        if self.page_classes.iter().all(|c| c.trim().is_empty()) {
            return Err(ConvertError::InvalidConfig(
                "at least one page class is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> ConvertResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a4_print_constants() {
        let cfg = ConvertConfig::default();
        assert_eq!(cfg.viewport_width_px, 794);
        assert_eq!(cfg.viewport_height_px, 1123);
        assert_eq!(cfg.scale, 2.0);
        assert_eq!(cfg.jpeg_quality, 92);
        assert_eq!(cfg.paper(), PaperSize::A4);
        assert_eq!(cfg.settle_delay(), Duration::from_millis(500));
        assert_eq!(cfg.max_render_wait(), Duration::from_millis(3000));
        assert_eq!(cfg.page_classes, vec!["pdf-page", "report-page"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ConvertConfig::from_json(r#"{ "title": "Site 14", "settle_delay_ms": 0 }"#)
            .unwrap();
        assert_eq!(cfg.title, "Site 14");
        assert_eq!(cfg.settle_delay_ms, 0);
        assert_eq!(cfg.viewport_width_px, 794);
        assert_eq!(cfg.jpeg_quality, 92);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let cfg = ConvertConfig {
            jpeg_quality: 0,
            ..ConvertConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_page_classes() {
        let err = ConvertConfig::from_json(r#"{ "page_classes": [] }"#).unwrap_err();
        assert!(err.to_string().contains("page class"));
    }

    #[test]
    fn json_roundtrip() {
        let cfg = ConvertConfig {
            scale: 1.0,
            ..ConvertConfig::default()
        };
        let parsed = ConvertConfig::from_json(&cfg.to_json()).unwrap();
        assert_eq!(parsed.scale, 1.0);
        assert_eq!(parsed.page_classes, cfg.page_classes);
    }
}
