//! Pipeline – ties together resource inlining, the render surface, page
//! segmentation, rasterisation and PDF composition into a single call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::compose::compose_pdf;
use crate::config::ConvertConfig;
use crate::error::{ConvertError, ConvertResult};
use crate::fonts::FontManager;
use crate::inline::{embed_external_resources, HttpFetcher, ResourceFetcher};
use crate::raster::{rasterize_page, PageRaster, RasterOptions};
use crate::report::{ConversionReport, PageSummary};
use crate::segment::{find_page_elements, PageElement};
use crate::surface::RenderSurface;

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The finished PDF.
    pub pdf: Vec<u8>,
    pub report: ConversionReport,
}

/// HTML → PDF converter.
///
/// Holds the configuration, the resource fetcher and the font set; all three
/// are shared read-only by every conversion. Concurrent calls to
/// [`convert`](Self::convert) are independent, each with its own surface.
pub struct Converter {
    config: ConvertConfig,
    fetcher: Arc<dyn ResourceFetcher>,
    fonts: Arc<FontManager>,
    live_surfaces: Arc<AtomicUsize>,
}

impl Converter {
    /// Validate `config`, discover system fonts and set up an HTTP fetcher.
    pub fn new(config: ConvertConfig) -> ConvertResult<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout()));
        Ok(Self {
            config,
            fetcher,
            fonts: Arc::new(FontManager::discover()),
            live_surfaces: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Replace the resource fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the discovered font set.
    pub fn with_fonts(mut self, fonts: Arc<FontManager>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Render surfaces currently open across this converter's conversions.
    pub fn live_surfaces(&self) -> usize {
        self.live_surfaces.load(Ordering::SeqCst)
    }

    /// Full pipeline: HTML string → PDF bytes plus a report.
    ///
    /// All-or-nothing: on error no partial document is returned. The render
    /// surface is released on every path.
    pub async fn convert(&self, html: &str) -> ConvertResult<ConversionOutput> {
        // 1. Inline external resources
        let inlined = embed_external_resources(
            html,
            Arc::clone(&self.fetcher),
            self.config.fetch_timeout(),
        )
        .await;

        // 2. Load into an offscreen surface
        let surface = RenderSurface::open(
            inlined.html,
            &self.config,
            Arc::clone(&self.fonts),
            Arc::clone(&self.live_surfaces),
        )
        .await?;

        // 3. Segment into pages
        let pages = find_page_elements(&surface, &self.config.page_classes)?;

        // 4. Rasterise, strictly one page at a time
        let options = RasterOptions::from_config(&self.config);
        let mut rasters = Vec::with_capacity(pages.len());
        let mut classes = Vec::with_capacity(pages.len());
        for page in pages {
            classes.push(page.class.clone());
            rasters.push(self.rasterize(page, options).await?);
        }

        // 5. Compose
        let composed = compose_pdf(&rasters, &self.config.title, self.config.paper())?;
        drop(surface);

        let pages = rasters
            .iter()
            .zip(classes)
            .zip(&composed.placements)
            .map(|((raster, class), placement)| PageSummary {
                index: raster.index,
                class,
                capture_width: raster.capture_width,
                capture_height: raster.capture_height,
                raster_width: raster.width_px,
                raster_height: raster.height_px,
                jpeg_bytes: raster.jpeg.len(),
                placement: *placement,
            })
            .collect();

        log::debug!(
            "Converted {} page(s) into {} PDF bytes",
            rasters.len(),
            composed.bytes.len()
        );
        Ok(ConversionOutput {
            pdf: composed.bytes,
            report: ConversionReport {
                title: self.config.title.clone(),
                pages,
                embedded: inlined.embedded,
                unembedded: inlined.unembedded,
            },
        })
    }

    async fn rasterize(
        &self,
        page: PageElement,
        options: RasterOptions,
    ) -> ConvertResult<PageRaster> {
        let index = page.index;
        let fonts = Arc::clone(&self.fonts);
        let timeout = self.config.raster_timeout();
        let task = tokio::task::spawn_blocking(move || rasterize_page(&page, &options, &fonts));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(raster))) => Ok(raster),
            Ok(Ok(Err(e))) => Err(ConvertError::Raster {
                index,
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(ConvertError::Raster {
                index,
                reason: format!("raster task failed: {e}"),
            }),
            Err(_) => Err(ConvertError::RasterTimeout {
                index,
                timeout_ms: self.config.raster_timeout_ms,
            }),
        }
    }
}

/// Convenience: convert with the default configuration.
pub async fn html_to_pdf(html: &str) -> ConvertResult<Vec<u8>> {
    let output = Converter::new(ConvertConfig::default())?.convert(html).await?;
    Ok(output.pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline::{FetchError, FetchedResource};

    struct NoNetwork;

    impl ResourceFetcher for NoNetwork {
        fn fetch(&self, _url: &str) -> Result<FetchedResource, FetchError> {
            Err(FetchError::Transport("offline".to_string()))
        }
    }

    fn converter(config: ConvertConfig) -> Converter {
        Converter::new(config)
            .unwrap()
            .with_fetcher(Arc::new(NoNetwork))
            .with_fonts(Arc::new(FontManager::default()))
    }

    fn fast() -> ConvertConfig {
        ConvertConfig {
            settle_delay_ms: 0,
            scale: 0.5,
            ..ConvertConfig::default()
        }
    }

    #[tokio::test]
    async fn pipeline_basic() {
        let html = r#"<div class="pdf-page" style="height:1123px"><h1>Hello</h1><p>World</p></div>"#;
        let out = converter(fast()).convert(html).await.unwrap();
        assert_eq!(&out.pdf[0..5], b"%PDF-");
        assert_eq!(out.report.page_count(), 1);
        assert_eq!(out.report.pages[0].raster_width, 397);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = ConvertConfig {
            scale: 0.0,
            ..ConvertConfig::default()
        };
        assert!(matches!(
            Converter::new(config),
            Err(ConvertError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn zero_timeout_fails_rasterisation() {
        let config = ConvertConfig {
            raster_timeout_ms: 0,
            ..fast()
        };
        let conv = converter(config);
        let err = conv
            .convert(r#"<div class="pdf-page" style="height:20000px"></div>"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::RasterTimeout { index: 0, .. }));
        assert_eq!(conv.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn unreachable_resource_is_reported() {
        let html = r#"<div class="report-page"><img src="https://cdn.test/x.png" width="10" height="10"></div>"#;
        let out = converter(fast()).convert(html).await.unwrap();
        assert_eq!(out.report.unembedded, vec!["https://cdn.test/x.png"]);
        assert!(out.report.embedded.is_empty());
    }
}
