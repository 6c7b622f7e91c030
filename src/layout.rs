//! Layout engine – builds a Taffy tree from the styled DOM, computes
//! flexbox / grid layout at the viewport width, and converts the result into
//! a tree of absolutely positioned boxes in document coordinates.

use std::collections::HashMap;
use std::io::Cursor;

use taffy::prelude::fr;
use taffy::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style,
    TaffyResult, TaffyTree,
};

use crate::dom::Tag;
use crate::fonts::{wrap_text, FontManager};
use crate::inline::decode_data_url;
use crate::style::{self, ComputedStyle, Edges, StyledNode};

// ---------------------------------------------------------------------------
// Positioned box tree
// ---------------------------------------------------------------------------

/// A laid-out box in document coordinates (px, origin at the top-left of the
/// render surface).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub classes: Vec<String>,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text {
        text: String,
        lines: Vec<String>,
    },
    Image {
        src: String,
    },
    /// List item marker, drawn in the left gutter.
    ListItem {
        marker: String,
    },
}

impl PositionedBox {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Lowest edge reached by this box or anything inside it.
    pub fn content_bottom(&self) -> f32 {
        self.children
            .iter()
            .map(PositionedBox::content_bottom)
            .fold(self.y + self.height, f32::max)
    }

    /// Full height of the box including overflowing descendants.
    pub fn scroll_height(&self) -> f32 {
        self.content_bottom() - self.y
    }

    /// Pre-order walk over this box and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PositionedBox)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

// ---------------------------------------------------------------------------
// Taffy tree construction
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    node_classes: HashMap<NodeId, Vec<String>>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            node_classes: HashMap::new(),
        }
    }

    fn collect_inline_text(node: &StyledNode) -> String {
        match node {
            StyledNode::Text { text, .. } => text.clone(),
            StyledNode::Element { children, .. } => {
                children.iter().map(Self::collect_inline_text).collect()
            }
        }
    }

    /// True when no child is block-level.
    fn all_inline(children: &[StyledNode]) -> bool {
        children.iter().all(|c| match c {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                tag,
                style,
                children,
                ..
            } => {
                *tag != Tag::Img
                    && style.display == style::Display::Inline
                    && Self::all_inline(children)
            }
        })
    }

    fn build_node(&mut self, styled: &StyledNode, parent_width: f32) -> TaffyResult<NodeId> {
        match styled {
            StyledNode::Text { text, style } => self.build_text_leaf(text, style, parent_width),
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => self.build_element(tag, style, children, attrs, parent_width),
        }
    }

    /// An inline run sized to its own wrapped text.
    fn build_text_leaf(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        parent_width: f32,
    ) -> TaffyResult<NodeId> {
        let (lines, text_width, text_height) = self.wrap(text, style, parent_width);
        let node = self.taffy.new_leaf(Style {
            size: Size {
                width: taffy::Dimension::Length(text_width),
                height: taffy::Dimension::Length(text_height),
            },
            flex_shrink: 0.0,
            ..Default::default()
        })?;
        self.node_styles.insert(node, style.clone());
        self.node_content.insert(
            node,
            BoxContent::Text {
                text: text.trim().to_string(),
                lines,
            },
        );
        Ok(node)
    }

    /// A block whose inline content has been merged into one wrapped run
    /// (paragraphs, headings). Keeps the block's box model.
    fn build_text_block(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        classes: Vec<String>,
        parent_width: f32,
    ) -> TaffyResult<NodeId> {
        let horizontal = style.padding.left
            + style.padding.right
            + style.margin.left
            + style.margin.right
            + 2.0 * style.border_width;
        let (lines, _, text_height) = self.wrap(text, style, parent_width - horizontal);

        let mut ts = self.box_style(style);
        ts.size.height = taffy::Dimension::Length(
            text_height + style.padding.top + style.padding.bottom + 2.0 * style.border_width,
        );
        ts.min_size.width = taffy::Dimension::Length(0.0);
        let node = self.taffy.new_leaf(ts)?;

        self.node_styles.insert(node, style.clone());
        self.node_classes.insert(node, classes);
        self.node_content.insert(
            node,
            BoxContent::Text {
                text: text.to_string(),
                lines,
            },
        );
        Ok(node)
    }

    fn wrap(&self, text: &str, style: &ComputedStyle, max_width: f32) -> (Vec<String>, f32, f32) {
        let key = style.font_key();
        let lines = wrap_text(text.trim(), style.font_size, &key, max_width, self.fonts);
        let width = lines
            .iter()
            .map(|l| self.fonts.measure_text_width(l, style.font_size, &key))
            .fold(0.0f32, f32::max);
        let height =
            lines.len() as f32 * self.fonts.line_height_px(style.font_size, style.line_height);
        (lines, width, height)
    }

    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        parent_width: f32,
    ) -> TaffyResult<NodeId> {
        let classes: Vec<String> = attrs
            .get("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let is_text_block = *tag == Tag::P || tag.is_heading();
        if is_text_block && !children.is_empty() && Self::all_inline(children) {
            let raw: String = children.iter().map(Self::collect_inline_text).collect();
            let combined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if !combined.is_empty() {
                return self.build_text_block(&combined, style, classes, parent_width);
            }
        }

        let own_width = match style.width {
            style::Dimension::Px(w) => w,
            style::Dimension::Percent(p) => parent_width * p / 100.0,
            style::Dimension::Auto => parent_width - style.margin.left - style.margin.right,
        };
        let inner_width =
            own_width - style.padding.left - style.padding.right - 2.0 * style.border_width;

        // Children of rows and grids are wrapped to their column width.
        let element_children = children
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { .. }))
            .count()
            .max(1);
        let columns = match (tag, style.display, style.flex_direction) {
            (Tag::Tr, _, _) => element_children,
            (_, style::Display::Flex, style::FlexDirection::Row) => element_children,
            (_, style::Display::Grid, _) => style.grid_columns.max(1),
            _ => 1,
        };
        let child_width = if columns > 1 {
            let gaps = style.gap * (columns - 1) as f32;
            ((inner_width - gaps) / columns as f32).max(1.0)
        } else {
            inner_width
        };

        let mut child_nodes = Vec::with_capacity(children.len());
        let mut list_counter = 0u32;
        for child in children {
            let marker = match child {
                StyledNode::Element { tag: Tag::Li, .. } => {
                    list_counter += 1;
                    Some(if *tag == Tag::Ol {
                        format!("{list_counter}.")
                    } else {
                        "\u{2022}".to_string()
                    })
                }
                _ => None,
            };
            let child_id = self.build_node(child, child_width)?;
            if let Some(marker) = marker {
                self.node_content
                    .insert(child_id, BoxContent::ListItem { marker });
            }
            child_nodes.push(child_id);
        }

        let resolved;
        let effective = if *tag == Tag::Img {
            let src = attrs.get("src").map(String::as_str).unwrap_or("");
            resolved = resolve_img_dimensions(src, attrs, style, parent_width);
            resolved.as_ref().unwrap_or(style)
        } else {
            style
        };

        let ts = self.element_style(effective, tag);
        let node = self.taffy.new_with_children(ts, &child_nodes)?;
        self.node_styles.insert(node, effective.clone());
        self.node_classes.insert(node, classes);
        if *tag == Tag::Img {
            let src = attrs.get("src").cloned().unwrap_or_default();
            self.node_content.insert(node, BoxContent::Image { src });
        }
        Ok(node)
    }

    /// Margin, padding, border, sizing shared by every element kind.
    fn box_style(&self, s: &ComputedStyle) -> Style {
        Style {
            size: Size {
                width: dim_to_taffy(s.width),
                height: dim_to_taffy(s.height),
            },
            min_size: Size {
                width: taffy::Dimension::Auto,
                height: dim_to_taffy(s.min_height),
            },
            max_size: Size {
                width: dim_to_taffy(s.max_width),
                height: taffy::Dimension::Auto,
            },
            margin: edges_auto(s.margin),
            padding: edges(s.padding),
            border: edges(Edges::all(s.border_width)),
            flex_shrink: s.flex_shrink,
            ..Default::default()
        }
    }

    fn element_style(&self, s: &ComputedStyle, tag: &Tag) -> Style {
        let mut ts = self.box_style(s);

        // Table model via flex: rows stack, cells share the row equally.
        match tag {
            Tag::Table => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.min_size.width = taffy::Dimension::Length(0.0);
                return ts;
            }
            Tag::Tr => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
                ts.align_items = Some(taffy::AlignItems::Stretch);
                ts.size.width = taffy::Dimension::Percent(1.0);
                ts.min_size.width = taffy::Dimension::Length(0.0);
                return ts;
            }
            Tag::Td | Tag::Th => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.flex_grow = 1.0;
                ts.flex_shrink = 1.0;
                ts.flex_basis = taffy::Dimension::Length(0.0);
                ts.min_size.width = taffy::Dimension::Length(0.0);
                return ts;
            }
            _ => {}
        }

        match s.display {
            style::Display::Flex => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = match s.flex_direction {
                    style::FlexDirection::Row => taffy::FlexDirection::Row,
                    style::FlexDirection::Column => taffy::FlexDirection::Column,
                };
                ts.flex_wrap = match s.flex_wrap {
                    style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                    style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
                };
                ts.justify_content = Some(match s.justify_content {
                    style::JustifyContent::Start => taffy::JustifyContent::Start,
                    style::JustifyContent::End => taffy::JustifyContent::End,
                    style::JustifyContent::Center => taffy::JustifyContent::Center,
                    style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                    style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                    style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
                });
                ts.align_items = Some(match s.align_items {
                    style::AlignItems::Start => taffy::AlignItems::Start,
                    style::AlignItems::End => taffy::AlignItems::End,
                    style::AlignItems::Center => taffy::AlignItems::Center,
                    style::AlignItems::Stretch => taffy::AlignItems::Stretch,
                });
            }
            style::Display::Grid => {
                ts.display = taffy::Display::Grid;
                ts.grid_template_columns = vec![fr(1.0); s.grid_columns.max(1)];
            }
            style::Display::Block | style::Display::ListItem | style::Display::InlineBlock => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
            }
            style::Display::Inline => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
                ts.flex_wrap = taffy::FlexWrap::Wrap;
            }
            style::Display::None => {
                ts.display = taffy::Display::None;
            }
        }

        if s.flex_shrink > 0.0 || s.flex_grow > 0.0 {
            ts.min_size.width = taffy::Dimension::Length(0.0);
        }
        ts.flex_grow = s.flex_grow;
        ts.flex_shrink = s.flex_shrink;
        ts.gap = Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(s.gap),
        };
        ts
    }

    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> TaffyResult<PositionedBox> {
        let layout = self.taffy.layout(node)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let (width, height) = (layout.size.width, layout.size.height);

        let children = self
            .taffy
            .children(node)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<TaffyResult<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width,
            height,
            style: self.node_styles.get(&node).cloned().unwrap_or_default(),
            content: self
                .node_content
                .get(&node)
                .cloned()
                .unwrap_or(BoxContent::None),
            classes: self.node_classes.get(&node).cloned().unwrap_or_default(),
            children,
        })
    }
}

fn dim_to_taffy(d: style::Dimension) -> taffy::Dimension {
    match d {
        style::Dimension::Auto => taffy::Dimension::Auto,
        style::Dimension::Px(v) => taffy::Dimension::Length(v),
        style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn edges(e: Edges) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(e.top),
        right: LengthPercentage::Length(e.right),
        bottom: LengthPercentage::Length(e.bottom),
        left: LengthPercentage::Length(e.left),
    }
}

fn edges_auto(e: Edges) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(e.top),
        right: LengthPercentageAuto::Length(e.right),
        bottom: LengthPercentageAuto::Length(e.bottom),
        left: LengthPercentageAuto::Length(e.left),
    }
}

// ---------------------------------------------------------------------------
// Image sizing
// ---------------------------------------------------------------------------

/// Replace `Auto` width/height of an `<img>` with concrete px values taken
/// from the `width`/`height` attributes or the intrinsic size of an embedded
/// data URL, keeping the aspect ratio. `None` when nothing needs resolving or
/// the source cannot be decoded; an undecodable image lays out as 0×0.
fn resolve_img_dimensions(
    src: &str,
    attrs: &HashMap<String, String>,
    style: &ComputedStyle,
    parent_width: f32,
) -> Option<ComputedStyle> {
    let attr_px = |name: &str| {
        attrs
            .get(name)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
    };
    let known_w = match style.width {
        style::Dimension::Px(v) => Some(v),
        style::Dimension::Percent(p) => Some(parent_width * p / 100.0),
        style::Dimension::Auto => attr_px("width"),
    };
    let known_h = match style.height {
        style::Dimension::Px(v) => Some(v),
        _ => attr_px("height"),
    };

    let mut s = style.clone();
    if let (Some(w), Some(h)) = (known_w, known_h) {
        if matches!(style.width, style::Dimension::Px(_))
            && matches!(style.height, style::Dimension::Px(_))
        {
            return None;
        }
        s.width = style::Dimension::Px(w);
        s.height = style::Dimension::Px(h);
        return Some(s);
    }

    let (px_w, px_h) = intrinsic_size(src)?;
    let aspect = px_w / px_h;
    match (known_w, known_h) {
        (Some(w), None) => {
            s.width = style::Dimension::Px(w);
            s.height = style::Dimension::Px((w / aspect).max(1.0));
        }
        (None, Some(h)) => {
            s.width = style::Dimension::Px((h * aspect).max(1.0));
            s.height = style::Dimension::Px(h);
        }
        _ => {
            // Intrinsic size, shrunk to fit the container.
            let w = px_w.min(parent_width.max(1.0));
            s.width = style::Dimension::Px(w);
            s.height = style::Dimension::Px(w / aspect);
        }
    }
    Some(s)
}

fn intrinsic_size(src: &str) -> Option<(f32, f32)> {
    let (_, bytes) = decode_data_url(src)?;
    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    (w > 0 && h > 0).then_some((w as f32, h as f32))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a styled document on a surface `viewport_width` px wide. The
/// returned root box spans the whole document and is at least
/// `viewport_height` tall.
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    viewport_width: f32,
    viewport_height: f32,
    fonts: &FontManager,
) -> TaffyResult<PositionedBox> {
    let mut builder = LayoutBuilder::new(fonts);

    let child_ids = styled_nodes
        .iter()
        .map(|node| builder.build_node(node, viewport_width))
        .collect::<TaffyResult<Vec<_>>>()?;

    let root = builder.taffy.new_with_children(
        Style {
            display: taffy::Display::Flex,
            flex_direction: taffy::FlexDirection::Column,
            size: Size {
                width: taffy::Dimension::Length(viewport_width),
                height: taffy::Dimension::Auto,
            },
            min_size: Size {
                width: taffy::Dimension::Auto,
                height: taffy::Dimension::Length(viewport_height),
            },
            ..Default::default()
        },
        &child_ids,
    )?;
    builder.node_styles.insert(
        root,
        ComputedStyle {
            background_color: style::Color::WHITE,
            ..ComputedStyle::default()
        },
    );

    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(viewport_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    builder.extract(root, 0.0, 0.0)
}
