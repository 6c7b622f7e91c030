//! Page segmentation – finds the elements that mark printed pages.
//!
//! A page element is any box carrying one of the configured page classes.
//! Matching is per whole class token, traversal is pre-order (document
//! order), and nested page elements are each reported.

use crate::error::{ConvertError, ConvertResult};
use crate::layout::PositionedBox;
use crate::surface::RenderSurface;

/// One page element, captured from the render surface.
#[derive(Debug, Clone)]
pub struct PageElement {
    /// Position in document order, starting at 0.
    pub index: usize,
    /// The page class that matched.
    pub class: String,
    /// Left edge of the element on the surface (px).
    pub x: f32,
    /// Top edge of the element on the surface (px).
    pub y: f32,
    /// Capture width: the viewport width, starting at `x`.
    pub capture_width: f32,
    /// Own layout height (px).
    pub height: f32,
    /// Full content height including overflow (px); never below `height`.
    pub scroll_height: f32,
    /// The element's subtree.
    pub root: PositionedBox,
}

/// All page elements on the surface, in document order.
pub fn find_page_elements(
    surface: &RenderSurface,
    classes: &[String],
) -> ConvertResult<Vec<PageElement>> {
    let pages = collect_pages(surface.root(), classes, surface.viewport_width());
    if pages.is_empty() {
        return Err(ConvertError::NoPagesFound {
            classes: classes.join(", "),
        });
    }
    log::debug!("Found {} page element(s)", pages.len());
    Ok(pages)
}

fn collect_pages(root: &PositionedBox, classes: &[String], capture_width: f32) -> Vec<PageElement> {
    let mut pages = Vec::new();
    root.walk(&mut |b| {
        let Some(class) = classes.iter().find(|c| b.has_class(c)) else {
            return;
        };
        pages.push(PageElement {
            index: pages.len(),
            class: class.clone(),
            x: b.x,
            y: b.y,
            capture_width,
            height: b.height,
            scroll_height: b.scroll_height(),
            root: b.clone(),
        });
    });
    pages
}
