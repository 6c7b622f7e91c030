//! Integration tests for the report-snap pipeline.
//!
//! These tests validate:
//! - One PDF page per page element, in document order
//! - Structural failures are fatal and release the render surface
//! - Resource failures degrade the output without failing it
//! - Repeated conversions are deterministic
//! - Tall pages are shrunk to fit, never cropped

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use report_snap::compose::FitMode;
use report_snap::dom::{parse_html, DomNode, Tag};
use report_snap::fonts::FontManager;
use report_snap::layout::PositionedBox;
use report_snap::raster::{rasterize_page, RasterOptions};
use report_snap::segment::find_page_elements;
use report_snap::surface::RenderSurface;
use report_snap::templates;
use report_snap::{
    ConvertConfig, ConvertError, Converter, FetchError, FetchedResource, ResourceFetcher,
};
use sha2::{Digest, Sha256};

// =====================================================================
// Helpers
// =====================================================================

/// Serves canned responses and counts requests per URL.
#[derive(Default)]
struct FakeCdn {
    files: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FakeCdn {
    fn with_file(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl ResourceFetcher for FakeCdn {
    fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        match self.files.get(url) {
            Some(bytes) => Ok(FetchedResource::new(
                bytes.clone(),
                Some("image/png".to_string()),
            )),
            None => Err(FetchError::Status(404)),
        }
    }
}

fn png(color: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::new();
    image::RgbImage::from_pixel(8, 6, image::Rgb(color))
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn config() -> ConvertConfig {
    ConvertConfig {
        title: "Integration".to_string(),
        settle_delay_ms: 0,
        scale: 0.5,
        ..ConvertConfig::default()
    }
}

fn converter_with(config: ConvertConfig, cdn: Arc<FakeCdn>) -> Converter {
    Converter::new(config)
        .unwrap()
        .with_fetcher(cdn)
        .with_fonts(Arc::new(FontManager::default()))
}

fn converter(config: ConvertConfig) -> Converter {
    converter_with(config, Arc::new(FakeCdn::default()))
}

fn pdf_page_count(bytes: &[u8]) -> usize {
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
    lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
}

// =====================================================================
// Page order and count
// =====================================================================

#[tokio::test]
async fn n_page_elements_give_n_pages_in_source_order() {
    let html = r#"<html><body>
        <div class="pdf-page" style="height:300px">one</div>
        <div class="report-page" style="height:600px">two</div>
        <div class="pdf-page" style="height:900px">three</div>
    </body></html>"#;
    let out = converter(config()).convert(html).await.unwrap();

    assert_eq!(pdf_page_count(&out.pdf), 3);
    let heights: Vec<f32> = out.report.pages.iter().map(|p| p.capture_height).collect();
    assert_eq!(heights, vec![300.0, 600.0, 900.0]);
    let classes: Vec<&str> = out.report.pages.iter().map(|p| p.class.as_str()).collect();
    assert_eq!(classes, vec!["pdf-page", "report-page", "pdf-page"]);
}

#[tokio::test]
async fn sample_report_uses_both_class_spellings() {
    let out = converter(config())
        .convert(templates::inspection_report())
        .await
        .unwrap();
    assert_eq!(pdf_page_count(&out.pdf), 2);
    assert_eq!(out.report.pages[1].class, "report-page");
    assert!(out.report.is_self_contained());
}

#[tokio::test]
async fn two_solid_a4_pages_fill_the_sheet() {
    let conv = converter(ConvertConfig {
        scale: 2.0,
        ..config()
    });
    let out = conv
        .convert(&templates::solid_pages(&["#0f766e", "#b91c1c"]))
        .await
        .unwrap();

    assert_eq!(pdf_page_count(&out.pdf), 2);
    for page in &out.report.pages {
        assert_eq!((page.raster_width, page.raster_height), (1588, 2246));
        let p = page.placement;
        assert!(p.width_mm > 209.9 && p.width_mm <= 210.0, "{p:?}");
        assert!((p.height_mm - 297.0).abs() < 0.1, "{p:?}");
        assert!(p.x_mm < 0.01 && p.y_mm == 0.0, "{p:?}");
    }
}

#[tokio::test]
async fn tall_page_is_captured_whole_and_height_fitted() {
    let out = converter(config())
        .convert(templates::tall_page_report())
        .await
        .unwrap();

    assert_eq!(pdf_page_count(&out.pdf), 1);
    let page = &out.report.pages[0];
    assert!(page.capture_height > 1123.0, "got {}", page.capture_height);
    let p = page.placement;
    assert_eq!(p.mode, FitMode::HeightConstrained);
    assert!(p.width_mm < 210.0);
    assert!((p.x_mm - (210.0 - p.width_mm) / 2.0).abs() < 0.01);
    assert_eq!(p.height_mm, 297.0);
}

// =====================================================================
// Failures
// =====================================================================

#[tokio::test]
async fn no_page_elements_is_fatal_and_releases_surface() {
    let conv = converter(config());
    let err = conv
        .convert(templates::unpaginated_document())
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::NoPagesFound { .. }));
    assert!(err.to_string().contains("pdf-page"));
    assert_eq!(conv.live_surfaces(), 0);
}

#[tokio::test]
async fn layout_failure_is_inaccessible_and_releases_surface() {
    let live = Arc::new(AtomicUsize::new(0));
    let result = RenderSurface::open_with(&config(), Arc::clone(&live), || {
        Err::<PositionedBox, _>(taffy::TaffyError::InvalidInputNode(taffy::NodeId::from(0u64)))
    })
    .await;

    let err = result.err().unwrap();
    assert!(matches!(err, ConvertError::DocumentInaccessible(_)));
    assert!(err.to_string().contains("layout failed"));
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_resource_still_produces_pdf() {
    let cdn = Arc::new(FakeCdn::default());
    let conv = converter_with(config(), Arc::clone(&cdn));
    let html = r#"<div class="pdf-page" style="height:400px">
        <img src="https://cdn.test/gone.png" width="100" height="80">
        <p>Caption</p>
    </div>
    <div class="pdf-page" style="height:400px"><p>Second</p></div>"#;

    let out = conv.convert(html).await.unwrap();
    assert_eq!(pdf_page_count(&out.pdf), 2);
    assert_eq!(out.report.unembedded, vec!["https://cdn.test/gone.png"]);
    assert_eq!(cdn.hits("https://cdn.test/gone.png"), 1);
    assert_eq!(conv.live_surfaces(), 0);
}

// =====================================================================
// Resource inlining
// =====================================================================

#[tokio::test]
async fn shared_resource_is_fetched_once() {
    let base = "https://photos.test";
    let cdn = Arc::new(
        FakeCdn::default()
            .with_file(&format!("{base}/ceiling.png"), png([40, 90, 200]))
            .with_file(&format!("{base}/banner.png"), png([230, 200, 40])),
    );
    let conv = converter_with(config(), Arc::clone(&cdn));

    let out = conv.convert(&templates::photo_report(base)).await.unwrap();
    assert_eq!(cdn.hits(&format!("{base}/ceiling.png")), 1);
    assert_eq!(cdn.hits(&format!("{base}/banner.png")), 1);
    assert_eq!(out.report.embedded.len(), 2);
    assert!(out.report.is_self_contained());
    assert_eq!(pdf_page_count(&out.pdf), 1);
}

// =====================================================================
// Determinism and timing
// =====================================================================

#[tokio::test]
async fn repeated_conversion_is_identical() {
    let conv = converter(config());
    let html = templates::inspection_report();
    let a = conv.convert(html).await.unwrap();
    let b = conv.convert(html).await.unwrap();

    assert_eq!(pdf_page_count(&a.pdf), pdf_page_count(&b.pdf));
    assert_eq!(a.report.pages, b.report.pages);
}

#[tokio::test]
async fn repeated_rasters_hash_identically() {
    let cfg = config();
    let fonts = Arc::new(FontManager::default());
    let options = RasterOptions::from_config(&cfg);

    let mut digests = Vec::new();
    for _ in 0..2 {
        let surface = RenderSurface::open(
            templates::inspection_report().to_string(),
            &cfg,
            Arc::clone(&fonts),
            Arc::new(AtomicUsize::new(0)),
        )
        .await
        .unwrap();
        let pages = find_page_elements(&surface, &cfg.page_classes).unwrap();
        let hashes: Vec<Vec<u8>> = pages
            .iter()
            .map(|p| {
                let raster = rasterize_page(p, &options, &fonts).unwrap();
                Sha256::digest(&raster.jpeg).to_vec()
            })
            .collect();
        digests.push(hashes);
    }
    assert_eq!(digests[0].len(), 2);
    assert_eq!(digests[0], digests[1]);
}

#[tokio::test]
async fn settle_wait_is_capped() {
    let conv = converter(ConvertConfig {
        settle_delay_ms: 60_000,
        max_render_wait_ms: 300,
        ..config()
    });
    let started = Instant::now();
    let out = conv
        .convert(r#"<div class="pdf-page" style="height:200px"></div>"#)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(pdf_page_count(&out.pdf), 1);
}

#[tokio::test]
async fn load_slower_than_the_cap_still_converts() {
    let conv = converter(ConvertConfig {
        settle_delay_ms: 60_000,
        max_render_wait_ms: 1,
        ..config()
    });
    let paragraph = "<p>Moisture reading taken at the north wall, sill height.</p>".repeat(200);
    let html: String = (0..4)
        .map(|i| format!(r#"<div class="pdf-page"><h2>Room {i}</h2>{paragraph}</div>"#))
        .collect();

    let out = conv.convert(&html).await.unwrap();
    assert_eq!(pdf_page_count(&out.pdf), 4);
    assert_eq!(conv.live_surfaces(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_conversions_are_independent() {
    let conv = Arc::new(converter(config()));
    let one = templates::solid_pages(&["red"]);
    let three = templates::solid_pages(&["red", "green", "blue"]);

    let (a, b) = tokio::join!(conv.convert(&one), conv.convert(&three));
    assert_eq!(pdf_page_count(&a.unwrap().pdf), 1);
    assert_eq!(pdf_page_count(&b.unwrap().pdf), 3);
    assert_eq!(conv.live_surfaces(), 0);
}

// =====================================================================
// Document model
// =====================================================================

#[test]
fn head_content_is_not_part_of_the_body() {
    let dom = parse_html(templates::inspection_report());
    let html = dom
        .iter()
        .find_map(|n| match n {
            DomNode::Element(e) if e.tag == Tag::Html => Some(e),
            _ => None,
        })
        .unwrap();
    let tags: Vec<&Tag> = html
        .children
        .iter()
        .filter_map(|n| match n {
            DomNode::Element(e) => Some(&e.tag),
            _ => None,
        })
        .collect();
    assert_eq!(tags, vec![&Tag::Head, &Tag::Body]);
}
