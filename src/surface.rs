//! Offscreen render surface.
//!
//! A surface owns one laid-out document at a fixed viewport and is never
//! shown anywhere. Opening it parses, styles and lays out the HTML on the
//! blocking pool; completion of that task is the surface's load signal,
//! after which a settle delay is applied. The settle delay is cut to whatever
//! is left of `max_render_wait_ms`; a load that uses up the whole budget is
//! still awaited and proceeds with no settle at all.
//!
//! Every surface counts itself in a shared live counter from the moment it is
//! created until it is dropped, on success and failure paths alike.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::ConvertConfig;
use crate::dom::{body_children, parse_html};
use crate::error::{ConvertError, ConvertResult};
use crate::fonts::FontManager;
use crate::layout::{compute_layout, PositionedBox};
use crate::style::build_styled_tree;

/// Registration of one surface in the live counter; decrements on drop.
struct SurfaceLease {
    live: Arc<AtomicUsize>,
}

impl SurfaceLease {
    fn acquire(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self { live }
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        log::debug!("Render surface released");
    }
}

/// A loaded document, ready for page segmentation.
pub struct RenderSurface {
    root: PositionedBox,
    viewport_width: f32,
    viewport_height: f32,
    _lease: SurfaceLease,
}

impl RenderSurface {
    /// Create a surface, inject `html` as its whole document and wait for
    /// load + settle.
    ///
    /// Fails with [`ConvertError::DocumentInaccessible`] when the document
    /// could not be laid out.
    pub async fn open(
        html: String,
        config: &ConvertConfig,
        fonts: Arc<FontManager>,
        live: Arc<AtomicUsize>,
    ) -> ConvertResult<Self> {
        let viewport_width = config.viewport_width_px as f32;
        let viewport_height = config.viewport_height_px as f32;
        log::debug!(
            "Loading document into {viewport_width}x{viewport_height} surface ({} bytes)",
            html.len()
        );
        Self::open_with(config, live, move || {
            load_document(&html, viewport_width, viewport_height, &fonts)
        })
        .await
    }

    /// Like [`open`](Self::open), with the document produced by `load` on the
    /// blocking pool instead of parsed from HTML.
    ///
    /// A load that outlasts `max_render_wait_ms` is still awaited; it only
    /// forfeits the settle delay. A layout error or a panicking `load` gives
    /// [`ConvertError::DocumentInaccessible`].
    pub async fn open_with<F>(
        config: &ConvertConfig,
        live: Arc<AtomicUsize>,
        load: F,
    ) -> ConvertResult<Self>
    where
        F: FnOnce() -> taffy::TaffyResult<PositionedBox> + Send + 'static,
    {
        let lease = SurfaceLease::acquire(live);
        let cap = config.max_render_wait();
        let started = Instant::now();

        let root = match tokio::task::spawn_blocking(load).await {
            Ok(Ok(root)) => root,
            Ok(Err(e)) => {
                return Err(ConvertError::DocumentInaccessible(format!(
                    "layout failed: {e}"
                )))
            }
            Err(e) => {
                return Err(ConvertError::DocumentInaccessible(format!(
                    "load task failed: {e}"
                )))
            }
        };

        let loaded_in = started.elapsed();
        if loaded_in >= cap {
            log::debug!(
                "Load took {} ms, past the {} ms cap; skipping settle",
                loaded_in.as_millis(),
                cap.as_millis()
            );
        }
        let settle = config.settle_delay().min(cap.saturating_sub(loaded_in));
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        log::debug!(
            "Surface ready after {} ms (document height {:.0}px)",
            started.elapsed().as_millis(),
            root.height
        );

        Ok(Self {
            root,
            viewport_width: config.viewport_width_px as f32,
            viewport_height: config.viewport_height_px as f32,
            _lease: lease,
        })
    }

    /// Root box of the laid-out document.
    pub fn root(&self) -> &PositionedBox {
        &self.root
    }

    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }
}

fn load_document(
    html: &str,
    viewport_width: f32,
    viewport_height: f32,
    fonts: &FontManager,
) -> taffy::TaffyResult<PositionedBox> {
    let dom = parse_html(html);
    let styled = build_styled_tree(&body_children(&dom), None);
    compute_layout(&styled, viewport_width, viewport_height, fonts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick_config() -> ConvertConfig {
        ConvertConfig {
            settle_delay_ms: 0,
            ..ConvertConfig::default()
        }
    }

    #[tokio::test]
    async fn open_counts_and_drop_releases() {
        let live = Arc::new(AtomicUsize::new(0));
        let surface = RenderSurface::open(
            r#"<div class="pdf-page">Hello</div>"#.to_string(),
            &quick_config(),
            Arc::new(FontManager::default()),
            Arc::clone(&live),
        )
        .await
        .unwrap();

        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert_eq!(surface.viewport_width(), 794.0);
        assert_eq!(surface.root().width, 794.0);
        assert!(surface.root().height >= 1123.0);

        drop(surface);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn settle_is_truncated_to_the_cap() {
        let config = ConvertConfig {
            settle_delay_ms: 60_000,
            max_render_wait_ms: 200,
            ..ConvertConfig::default()
        };
        let started = std::time::Instant::now();
        let surface = RenderSurface::open(
            "<p>x</p>".to_string(),
            &config,
            Arc::new(FontManager::default()),
            Arc::new(AtomicUsize::new(0)),
        )
        .await
        .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(surface);
    }

    #[tokio::test]
    async fn load_slower_than_the_cap_still_opens() {
        let config = ConvertConfig {
            settle_delay_ms: 60_000,
            max_render_wait_ms: 10,
            ..ConvertConfig::default()
        };
        let live = Arc::new(AtomicUsize::new(0));
        let started = std::time::Instant::now();
        let surface = RenderSurface::open_with(&config, Arc::clone(&live), || {
            std::thread::sleep(Duration::from_millis(100));
            load_document("<p>late</p>", 794.0, 1123.0, &FontManager::default())
        })
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!surface.root().children.is_empty());
        assert_eq!(live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_load_is_inaccessible_and_releases() {
        let live = Arc::new(AtomicUsize::new(0));
        let result = RenderSurface::open_with(&quick_config(), Arc::clone(&live), || {
            panic!("layout blew up")
        })
        .await;

        assert!(matches!(result, Err(ConvertError::DocumentInaccessible(_))));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_document_still_loads() {
        let surface = RenderSurface::open(
            String::new(),
            &quick_config(),
            Arc::new(FontManager::default()),
            Arc::new(AtomicUsize::new(0)),
        )
        .await
        .unwrap();
        assert!(surface.root().children.is_empty());
    }
}
