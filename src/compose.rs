//! PDF composer – places page rasters on portrait paper using `printpdf`
//! (v0.8 ops-based API).
//!
//! Each raster becomes exactly one PDF page. The image is scaled to the page
//! width; when that would overflow the page height it is scaled to the page
//! height instead and centred horizontally. Nothing is ever cropped.

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, XObjectTransform,
};
use serde::{Deserialize, Serialize};

use crate::config::PaperSize;
use crate::error::{ConvertError, ConvertResult};
use crate::raster::PageRaster;

const MM_TO_PT: f32 = 2.834_646;

/// Which dimension limited the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Full paper width; vertical whitespace may remain below.
    WidthConstrained,
    /// Full paper height, centred; horizontal whitespace on both sides.
    HeightConstrained,
}

/// Image rectangle on the paper, in mm from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    pub mode: FitMode,
}

/// Aspect-fit an image of `px_width × px_height` onto `paper`.
pub fn fit_to_page(px_width: u32, px_height: u32, paper: PaperSize) -> Placement {
    let ratio = px_height.max(1) as f32 / px_width.max(1) as f32;
    let height_mm = paper.width_mm * ratio;
    if height_mm <= paper.height_mm {
        return Placement {
            x_mm: 0.0,
            y_mm: 0.0,
            width_mm: paper.width_mm,
            height_mm,
            mode: FitMode::WidthConstrained,
        };
    }

    let width_mm = paper.height_mm / ratio;
    Placement {
        x_mm: (paper.width_mm - width_mm) / 2.0,
        y_mm: 0.0,
        width_mm,
        height_mm: paper.height_mm,
        mode: FitMode::HeightConstrained,
    }
}

/// A finished PDF together with where each page image was placed.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub bytes: Vec<u8>,
    pub placements: Vec<Placement>,
}

/// Assemble `rasters` into a PDF, one page each, in the given order.
pub fn compose_pdf(
    rasters: &[PageRaster],
    title: &str,
    paper: PaperSize,
) -> ConvertResult<ComposedDocument> {
    if rasters.is_empty() {
        return Err(ConvertError::Compose("no page rasters to compose".to_string()));
    }

    let mut doc = PdfDocument::new(title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut pages = Vec::with_capacity(rasters.len());
    let mut placements = Vec::with_capacity(rasters.len());

    for raster in rasters {
        let image = RawImage::decode_from_bytes(&raster.jpeg, &mut warnings).map_err(|e| {
            ConvertError::Compose(format!("page {} image rejected: {e}", raster.index))
        })?;
        let xobj_id = doc.add_image(&image);

        let placement = fit_to_page(raster.width_px, raster.height_px, paper);
        // PDF space has its origin at the bottom-left.
        let bottom_mm = paper.height_mm - placement.y_mm - placement.height_mm;

        // At 72 DPI one image pixel is one point.
        let ops = vec![Op::UseXobject {
            id: xobj_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placement.x_mm * MM_TO_PT)),
                translate_y: Some(Pt(bottom_mm * MM_TO_PT)),
                dpi: Some(72.0),
                scale_x: Some(placement.width_mm * MM_TO_PT / raster.width_px as f32),
                scale_y: Some(placement.height_mm * MM_TO_PT / raster.height_px as f32),
                rotate: None,
            },
        }];

        log::debug!(
            "Page {}: {}x{} px placed at ({:.2}, {:.2}) mm, {:.2}x{:.2} mm ({:?})",
            raster.index,
            raster.width_px,
            raster.height_px,
            placement.x_mm,
            placement.y_mm,
            placement.width_mm,
            placement.height_mm,
            placement.mode
        );
        pages.push(PdfPage::new(Mm(paper.width_mm), Mm(paper.height_mm), ops));
        placements.push(placement);
    }

    for w in &warnings {
        log::debug!("printpdf: {w:?}");
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    Ok(ComposedDocument { bytes, placements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 0.01, "{a} != {b}");
    }

    fn jpeg_raster(index: usize, width_px: u32, height_px: u32) -> PageRaster {
        let mut jpeg = Vec::new();
        image::RgbImage::from_pixel(width_px, height_px, image::Rgb([200, 30, 30]))
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        PageRaster {
            index,
            width_px,
            height_px,
            capture_width: width_px as f32 / 2.0,
            capture_height: height_px as f32 / 2.0,
            jpeg,
        }
    }

    #[test]
    fn short_content_fills_width() {
        let p = fit_to_page(1588, 2000, PaperSize::A4);
        assert_eq!(p.mode, FitMode::WidthConstrained);
        assert_eq!((p.x_mm, p.y_mm, p.width_mm), (0.0, 0.0, 210.0));
        assert_close(p.height_mm, 210.0 * 2000.0 / 1588.0);
    }

    #[test]
    fn tall_content_is_centred_at_full_height() {
        let p = fit_to_page(1588, 4000, PaperSize::A4);
        assert_eq!(p.mode, FitMode::HeightConstrained);
        assert_eq!(p.height_mm, 297.0);
        assert_close(p.width_mm, 297.0 * 1588.0 / 4000.0);
        assert_close(p.x_mm, (210.0 - p.width_mm) / 2.0);
        assert!(p.width_mm < 210.0);
    }

    #[test]
    fn a4_viewport_page_spans_the_sheet() {
        // 2246 / 1588 puts the width fit 0.015 mm over the paper height.
        let p = fit_to_page(1588, 2246, PaperSize::A4);
        assert_eq!(p.mode, FitMode::HeightConstrained);
        assert!(p.width_mm > 209.9 && p.width_mm <= 210.0);
        assert!(p.x_mm < 0.01);
        assert_eq!(p.height_mm, 297.0);
    }

    #[test]
    fn landscape_raster_leaves_space_below() {
        let p = fit_to_page(1588, 1123, PaperSize::A4);
        assert_eq!(p.mode, FitMode::WidthConstrained);
        assert_close(p.height_mm, 210.0 * 1123.0 / 1588.0);
        assert!(p.height_mm < 297.0);
    }

    #[test]
    fn one_pdf_page_per_raster() {
        let rasters = [jpeg_raster(0, 40, 56), jpeg_raster(1, 40, 120)];
        let doc = compose_pdf(&rasters, "Inspection", PaperSize::A4).unwrap();
        assert_eq!(&doc.bytes[..5], b"%PDF-");
        assert_eq!(doc.placements.len(), 2);
        assert_eq!(doc.placements[0].mode, FitMode::WidthConstrained);
        assert_eq!(doc.placements[1].mode, FitMode::HeightConstrained);

        let pdf = lopdf::Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(pdf.get_pages().len(), 2);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = compose_pdf(&[], "x", PaperSize::A4).unwrap_err();
        assert!(matches!(err, ConvertError::Compose(_)));
    }

    #[test]
    fn corrupt_raster_is_a_compose_error() {
        let mut raster = jpeg_raster(3, 8, 8);
        raster.jpeg = b"not a jpeg".to_vec();
        let err = compose_pdf(&[raster], "x", PaperSize::A4).unwrap_err();
        assert!(err.to_string().contains("page 3"));
    }
}
