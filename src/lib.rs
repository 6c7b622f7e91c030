//! # report-snap – paginated HTML → PDF snapshots
//!
//! This crate converts an HTML document whose pages are marked with a
//! page-boundary class (`pdf-page` or `report-page`) into a portrait A4 PDF,
//! one PDF page per marked element. The pipeline stages are:
//!
//! 1. **Inline** – fetch external images and embed them as data URLs ([`inline`])
//! 2. **Load** – parse, style and lay out the document on an offscreen
//!    794×1123 px surface ([`surface`], built on [`dom`], [`style`],
//!    [`fonts`] and [`layout`])
//! 3. **Segment** – find the page elements in document order ([`segment`])
//! 4. **Rasterise** – paint each page at 2× and encode it as JPEG ([`raster`])
//! 5. **Compose** – place the rasters on A4 pages via printpdf ([`compose`])
//!
//! [`pipeline::Converter`] runs all of them and returns the PDF together with
//! a [`report::ConversionReport`].

pub mod compose;
pub mod config;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod inline;
pub mod layout;
pub mod pipeline;
pub mod raster;
pub mod report;
pub mod segment;
pub mod style;
pub mod surface;
pub mod templates;

// Re-exports for convenience
pub use config::ConvertConfig;
pub use error::{ConvertError, ConvertResult};
pub use inline::{FetchError, FetchedResource, ResourceFetcher};
pub use pipeline::{html_to_pdf, ConversionOutput, Converter};
pub use report::ConversionReport;
