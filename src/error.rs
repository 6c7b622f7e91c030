//! Error types for the conversion pipeline.
//!
//! Only structural problems are errors. A resource that fails to download is
//! not: it is reported through [`crate::report::ConversionReport::unembedded`]
//! and the conversion carries on.

use thiserror::Error;

/// Fatal conditions of a conversion. No partial output is ever produced.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The render surface never produced a laid-out document.
    #[error("render surface document inaccessible: {0}")]
    DocumentInaccessible(String),

    /// The document carries no element with a page-boundary class.
    #[error("no page elements found (looked for class {classes})")]
    NoPagesFound { classes: String },

    #[error("rasterization of page {index} failed: {reason}")]
    Raster { index: usize, reason: String },

    #[error("rasterization of page {index} timed out after {timeout_ms} ms")]
    RasterTimeout { index: usize, timeout_ms: u64 },

    #[error("PDF composition failed: {0}")]
    Compose(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::InvalidConfig(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pages_message_names_classes() {
        let err = ConvertError::NoPagesFound {
            classes: "pdf-page, report-page".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no page elements found (looked for class pdf-page, report-page)"
        );
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: ConvertError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }
}
