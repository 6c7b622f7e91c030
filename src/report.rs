//! Conversion report – a serialisable summary of what a conversion produced.

use serde::{Deserialize, Serialize};

use crate::compose::Placement;
use crate::error::ConvertResult;

/// Per-page capture, raster and placement geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub index: usize,
    /// Page class that marked the element.
    pub class: String,
    /// Captured area in CSS px.
    pub capture_width: f32,
    pub capture_height: f32,
    /// Raster size in device px.
    pub raster_width: u32,
    pub raster_height: u32,
    pub jpeg_bytes: usize,
    pub placement: Placement,
}

/// Summary of a finished conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub title: String,
    pub pages: Vec<PageSummary>,
    /// Resource URLs replaced by data URLs.
    pub embedded: Vec<String>,
    /// Resource URLs left in place because fetching them failed.
    pub unembedded: Vec<String>,
}

impl ConversionReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whether every external resource made it into the document.
    pub fn is_self_contained(&self) -> bool {
        self.unembedded.is_empty()
    }

    pub fn to_json(&self) -> ConvertResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ConvertResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
