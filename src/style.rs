//! Style resolver – maps inline CSS declarations and Tailwind-like utility
//! classes to a flat [`ComputedStyle`] consumed by layout and painting.
//!
//! Stylesheets (`<style>` blocks, linked CSS) are not applied; reports style
//! their pages through classes and `style` attributes.

use std::collections::HashMap;

use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::FontKey;

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Display / layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,
    pub grid_columns: usize,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,
    pub min_height: Dimension,
    pub max_width: Dimension,

    // Spacing (px)
    pub margin: Edges,
    pub padding: Edges,

    // Border
    pub border_width: f32,
    pub border_color: Color,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_family: String,
    pub font_style: FontStyle,
    pub text_decoration: TextDecoration,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,

    // Background
    pub background_color: Color,
    /// Raw `url(...)` argument of `background-image`.
    pub background_image: Option<String>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            // Blocks are stacked in flex columns; they must overflow, not shrink.
            flex_shrink: 0.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            grid_columns: 0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_height: Dimension::Auto,
            max_width: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 16.0,
            font_weight: FontWeight::Normal,
            font_family: crate::fonts::DEFAULT_FAMILY.to_string(),
            font_style: FontStyle::Normal,
            text_decoration: TextDecoration::None,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            background_color: Color::TRANSPARENT,
            background_image: None,
        }
    }
}

impl ComputedStyle {
    pub fn font_key(&self) -> FontKey {
        FontKey::new(
            &self.font_family,
            self.font_weight == FontWeight::Bold,
            self.font_style == FontStyle::Italic,
        )
    }

    /// Style for an anonymous text run: typography of `self`, no box.
    pub fn text_run(&self) -> Self {
        Self {
            display: Display::Inline,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            background_color: Color::TRANSPARENT,
            background_image: None,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_height: Dimension::Auto,
            max_width: Dimension::Auto,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    InlineBlock,
    ListItem,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

/// Four-sided spacing in px.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn all(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        let doubled = |i: usize| channel(&hex[i..i + 1].repeat(2));
        match hex.len() {
            3 => Some(Self::rgb(doubled(0)?, doubled(1)?, doubled(2)?)),
            6 | 8 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 },
            }),
            _ => None,
        }
    }

    /// Parse a CSS colour value: hex, `rgb()`/`rgba()`, or a basic keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        let lower = value.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 3 {
                return None;
            }
            let channel = |p: &str| -> Option<f32> {
                match p.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok().map(|v| v / 100.0),
                    None => p.parse::<f32>().ok().map(|v| v / 255.0),
                }
            };
            let alpha = match parts.get(3) {
                Some(a) => match a.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                    None => a.parse::<f32>().ok()?,
                },
                None => 1.0,
            };
            return Some(Self {
                r: channel(parts[0])?.clamp(0.0, 1.0),
                g: channel(parts[1])?.clamp(0.0, 1.0),
                b: channel(parts[2])?.clamp(0.0, 1.0),
                a: alpha.clamp(0.0, 1.0),
            });
        }
        named_color(&lower)
    }
}

fn named_color(name: &str) -> Option<Color> {
    let hex = match name {
        "transparent" => return Some(Color::TRANSPARENT),
        "black" => "#000000",
        "white" => "#ffffff",
        "red" => "#ff0000",
        "green" => "#008000",
        "blue" => "#0000ff",
        "yellow" => "#ffff00",
        "orange" => "#ffa500",
        "gray" | "grey" => "#808080",
        "lightgray" | "lightgrey" => "#d3d3d3",
        "darkgray" | "darkgrey" => "#a9a9a9",
        "navy" => "#000080",
        "teal" => "#008080",
        "maroon" => "#800000",
        "silver" => "#c0c0c0",
        "whitesmoke" => "#f5f5f5",
        _ => return None,
    };
    Color::from_hex(hex)
}

/// Tailwind palette subset usable as `text-*`, `bg-*` and `border-*`.
const TAILWIND_COLORS: &[(&str, &str)] = &[
    ("white", "#ffffff"),
    ("black", "#000000"),
    ("gray-50", "#f9fafb"),
    ("gray-100", "#f3f4f6"),
    ("gray-200", "#e5e7eb"),
    ("gray-300", "#d1d5db"),
    ("gray-400", "#9ca3af"),
    ("gray-500", "#6b7280"),
    ("gray-600", "#4b5563"),
    ("gray-700", "#374151"),
    ("gray-800", "#1f2937"),
    ("gray-900", "#111827"),
    ("red-100", "#fee2e2"),
    ("red-500", "#ef4444"),
    ("red-700", "#b91c1c"),
    ("amber-100", "#fef3c7"),
    ("amber-500", "#f59e0b"),
    ("yellow-500", "#eab308"),
    ("green-100", "#dcfce7"),
    ("green-500", "#22c55e"),
    ("green-700", "#15803d"),
    ("blue-100", "#dbeafe"),
    ("blue-500", "#3b82f6"),
    ("blue-700", "#1d4ed8"),
    ("blue-900", "#1e3a8a"),
];

fn tailwind_color(name: &str) -> Option<Color> {
    if name == "transparent" {
        return Some(Color::TRANSPARENT);
    }
    TAILWIND_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, hex)| Color::from_hex(hex))
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting typography from its parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = ComputedStyle::default();

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.font_weight = p.font_weight;
        style.font_family = p.font_family.clone();
        style.font_style = p.font_style;
        style.text_decoration = p.text_decoration;
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
    }

    apply_tag_defaults(&mut style, &element.tag);

    for class in element.classes() {
        apply_tailwind_class(&mut style, class);
    }

    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }

    style
}

/// User-agent defaults for a tag, applied over inherited typography.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    let heading = |s: &mut ComputedStyle, size: f32, margin: f32| {
        s.font_size = size;
        s.font_weight = FontWeight::Bold;
        s.margin.top = margin;
        s.margin.bottom = margin * 0.75;
    };
    match tag {
        Tag::H1 => heading(s, 32.0, 16.0),
        Tag::H2 => heading(s, 24.0, 14.0),
        Tag::H3 => heading(s, 20.0, 12.0),
        Tag::H4 => heading(s, 18.0, 10.0),
        Tag::H5 => heading(s, 16.0, 8.0),
        Tag::H6 => heading(s, 14.0, 8.0),
        Tag::P => s.margin.bottom = 10.0,
        Tag::Ul | Tag::Ol => {
            s.margin.bottom = 10.0;
            s.padding.left = 24.0;
        }
        Tag::Li => {
            s.display = Display::ListItem;
            s.margin.bottom = 4.0;
        }
        Tag::Table => {
            s.border_width = 1.0;
            s.margin.bottom = 10.0;
        }
        Tag::Td | Tag::Th => {
            s.padding = Edges {
                top: 4.0,
                right: 8.0,
                bottom: 4.0,
                left: 8.0,
            };
            s.border_width = 1.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.background_color = Color::rgb(0.93, 0.93, 0.93);
            }
        }
        Tag::Span | Tag::A => s.display = Display::Inline,
        Tag::Strong => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Em => {
            s.display = Display::Inline;
            s.font_style = FontStyle::Italic;
        }
        Tag::U => {
            s.display = Display::Inline;
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::Img => s.display = Display::InlineBlock,
        Tag::Hr => {
            s.height = Dimension::Px(1.0);
            s.margin = Edges {
                top: 8.0,
                right: 0.0,
                bottom: 8.0,
                left: 0.0,
            };
            s.background_color = Color::rgb(0.8, 0.8, 0.8);
        }
        Tag::Head | Tag::Br => s.display = Display::None,
        Tag::Other(name) if matches!(name.as_str(), "meta" | "link" | "base") => {
            s.display = Display::None
        }
        Tag::Html
        | Tag::Body
        | Tag::Div
        | Tag::Section
        | Tag::Article
        | Tag::Header
        | Tag::Footer
        | Tag::Main
        | Tag::Tr
        | Tag::Other(_) => {}
    }
}

/// Apply a single Tailwind utility class.
fn apply_tailwind_class(s: &mut ComputedStyle, class: &str) {
    match class {
        "flex" => s.display = Display::Flex,
        "grid" => s.display = Display::Grid,
        "block" => s.display = Display::Block,
        "inline" => s.display = Display::Inline,
        "inline-block" => s.display = Display::InlineBlock,
        "hidden" => s.display = Display::None,

        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-wrap" => s.flex_wrap = FlexWrap::Wrap,
        "flex-nowrap" => s.flex_wrap = FlexWrap::NoWrap,
        "grow" | "flex-grow" => s.flex_grow = 1.0,
        "shrink" | "flex-shrink" => s.flex_shrink = 1.0,
        "shrink-0" | "flex-shrink-0" => s.flex_shrink = 0.0,
        "flex-1" => {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
        }

        "justify-start" => s.justify_content = JustifyContent::Start,
        "justify-end" => s.justify_content = JustifyContent::End,
        "justify-center" => s.justify_content = JustifyContent::Center,
        "justify-between" => s.justify_content = JustifyContent::SpaceBetween,
        "justify-around" => s.justify_content = JustifyContent::SpaceAround,
        "justify-evenly" => s.justify_content = JustifyContent::SpaceEvenly,

        "items-start" => s.align_items = AlignItems::Start,
        "items-end" => s.align_items = AlignItems::End,
        "items-center" => s.align_items = AlignItems::Center,
        "items-stretch" => s.align_items = AlignItems::Stretch,

        "font-bold" | "font-semibold" => s.font_weight = FontWeight::Bold,
        "font-normal" => s.font_weight = FontWeight::Normal,
        "italic" => s.font_style = FontStyle::Italic,
        "not-italic" => s.font_style = FontStyle::Normal,
        "underline" => s.text_decoration = TextDecoration::Underline,
        "no-underline" => s.text_decoration = TextDecoration::None,

        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,

        "text-xs" => s.font_size = 12.0,
        "text-sm" => s.font_size = 14.0,
        "text-base" => s.font_size = 16.0,
        "text-lg" => s.font_size = 18.0,
        "text-xl" => s.font_size = 20.0,
        "text-2xl" => s.font_size = 24.0,
        "text-3xl" => s.font_size = 30.0,
        "text-4xl" => s.font_size = 36.0,

        "leading-tight" => s.line_height = 1.25,
        "leading-normal" => s.line_height = 1.5,
        "leading-relaxed" => s.line_height = 1.625,

        "w-full" => s.width = Dimension::Percent(100.0),
        "w-auto" => s.width = Dimension::Auto,
        "w-1/2" => s.width = Dimension::Percent(50.0),
        "w-1/3" => s.width = Dimension::Percent(33.333),
        "w-2/3" => s.width = Dimension::Percent(66.666),
        "w-1/4" => s.width = Dimension::Percent(25.0),
        "w-3/4" => s.width = Dimension::Percent(75.0),
        "h-full" => s.height = Dimension::Percent(100.0),

        "border" => s.border_width = 1.0,
        "border-0" => s.border_width = 0.0,
        "border-2" => s.border_width = 2.0,
        "border-4" => s.border_width = 4.0,

        _ => {
            let _ = try_spacing_class(s, class)
                || try_color_class(s, class)
                || try_scaled_class(s, class);
        }
    }
}

/// `p-4`, `mx-2`, `mt-6`… (1 unit = 4px).
fn try_spacing_class(s: &mut ComputedStyle, class: &str) -> bool {
    let Some((prefix, value)) = class.rsplit_once('-') else {
        return false;
    };
    let Ok(units) = value.parse::<f32>() else {
        return false;
    };
    let v = units * 4.0;
    let (edges, sides) = if let Some(sides) = prefix.strip_prefix('p') {
        (&mut s.padding, sides)
    } else if let Some(sides) = prefix.strip_prefix('m') {
        (&mut s.margin, sides)
    } else {
        return false;
    };
    match sides {
        "" => *edges = Edges::all(v),
        "x" => {
            edges.left = v;
            edges.right = v;
        }
        "y" => {
            edges.top = v;
            edges.bottom = v;
        }
        "t" => edges.top = v,
        "r" => edges.right = v,
        "b" => edges.bottom = v,
        "l" => edges.left = v,
        _ => return false,
    }
    true
}

fn try_color_class(s: &mut ComputedStyle, class: &str) -> bool {
    let Some((kind, name)) = class.split_once('-') else {
        return false;
    };
    let Some(color) = tailwind_color(name) else {
        return false;
    };
    match kind {
        "text" => s.color = color,
        "bg" => s.background_color = color,
        "border" => s.border_color = color,
        _ => return false,
    }
    true
}

/// `gap-*`, `w-*`, `h-*`, `min-h-*`, `grid-cols-*`.
fn try_scaled_class(s: &mut ComputedStyle, class: &str) -> bool {
    if let Some(n) = class.strip_prefix("grid-cols-").and_then(|r| r.parse::<usize>().ok()) {
        s.grid_columns = n;
        return true;
    }
    let Some((prefix, value)) = class.rsplit_once('-') else {
        return false;
    };
    let Ok(units) = value.parse::<f32>() else {
        return false;
    };
    let px = units * 4.0;
    match prefix {
        "gap" => s.gap = px,
        "w" => s.width = Dimension::Px(px),
        "h" => s.height = Dimension::Px(px),
        "min-h" => s.min_height = Dimension::Px(px),
        _ => return false,
    }
    true
}

// ---------------------------------------------------------------------------
// Inline style parsing (limited subset)
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in split_declarations(style_str) {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        let val = val.trim().trim_end_matches("!important").trim();
        apply_css_property(s, &prop.trim().to_ascii_lowercase(), val);
    }
}

/// Split on `;` outside quotes and parentheses, so data URLs survive.
fn split_declarations(style_str: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in style_str.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&style_str[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&style_str[start..]);
    out
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "grid" => Display::Grid,
                "block" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "list-item" => Display::ListItem,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "column" => FlexDirection::Column,
                _ => FlexDirection::Row,
            }
        }
        "flex-wrap" => {
            s.flex_wrap = match val {
                "wrap" => FlexWrap::Wrap,
                _ => FlexWrap::NoWrap,
            }
        }
        "flex" => {
            if let Some(grow) = val.split_whitespace().next().and_then(|v| v.parse().ok()) {
                s.flex_grow = grow;
            }
        }
        "justify-content" => {
            s.justify_content = match val {
                "flex-end" | "end" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                "space-evenly" => JustifyContent::SpaceEvenly,
                _ => JustifyContent::Start,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "flex-start" | "start" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                _ => AlignItems::Stretch,
            }
        }
        "font-size" => {
            if let Some(px) = parse_length(val, s.font_size) {
                s.font_size = px;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "background-image" => s.background_image = css_url_argument(val),
        "background" => {
            if let Some(url) = css_url_argument(val) {
                s.background_image = Some(url);
            }
            if let Some(c) = val.split_whitespace().find_map(Color::parse) {
                s.background_color = c;
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.split_whitespace().any(|t| t == "underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "width" => s.width = parse_dimension(val, s.font_size),
        "height" => s.height = parse_dimension(val, s.font_size),
        "min-height" => s.min_height = parse_dimension(val, s.font_size),
        "max-width" => s.max_width = parse_dimension(val, s.font_size),
        "margin" => apply_shorthand_edges(val, s.font_size, &mut s.margin),
        "padding" => apply_shorthand_edges(val, s.font_size, &mut s.padding),
        "margin-top" | "margin-right" | "margin-bottom" | "margin-left" | "padding-top"
        | "padding-right" | "padding-bottom" | "padding-left" => {
            let Some(px) = parse_length(val, s.font_size) else {
                return;
            };
            let (box_prop, side) = prop.split_once('-').unwrap_or((prop, ""));
            let edges = if box_prop == "margin" {
                &mut s.margin
            } else {
                &mut s.padding
            };
            match side {
                "top" => edges.top = px,
                "right" => edges.right = px,
                "bottom" => edges.bottom = px,
                _ => edges.left = px,
            }
        }
        "border" => {
            for token in val.split_whitespace() {
                if let Some(px) = parse_length(token, s.font_size) {
                    s.border_width = px;
                } else if let Some(c) = Color::parse(token) {
                    s.border_color = c;
                } else if token == "none" {
                    s.border_width = 0.0;
                }
            }
        }
        "border-width" => {
            if let Some(px) = parse_length(val, s.font_size) {
                s.border_width = px;
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(px) = parse_length(val, s.font_size) {
                s.line_height = px / s.font_size;
            }
        }
        "gap" => {
            if let Some(px) = parse_length(val, s.font_size) {
                s.gap = px;
            }
        }
        "font-family" => {
            if let Some(first) = val.split(',').next() {
                let family = first.trim().trim_matches(|c| c == '"' || c == '\'');
                if !family.is_empty() {
                    s.font_family = family.to_string();
                }
            }
        }
        _ => {}
    }
}

/// Argument of the first `url(...)` in a CSS value, unquoted.
fn css_url_argument(val: &str) -> Option<String> {
    let start = val.find("url(")? + 4;
    let end = start + val[start..].find(')')?;
    let arg = val[start..end]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    (!arg.is_empty()).then(|| arg.to_string())
}

/// `12px`, `12`, `1.5em`, `1.5rem`, `10pt`.
fn parse_length(val: &str, font_size: f32) -> Option<f32> {
    let val = val.trim();
    if let Some(n) = val.strip_suffix("px") {
        return n.trim().parse().ok();
    }
    if let Some(n) = val.strip_suffix("rem") {
        return n.trim().parse::<f32>().ok().map(|v| v * 16.0);
    }
    if let Some(n) = val.strip_suffix("em") {
        return n.trim().parse::<f32>().ok().map(|v| v * font_size);
    }
    if let Some(n) = val.strip_suffix("pt") {
        return n.trim().parse::<f32>().ok().map(|v| v * 96.0 / 72.0);
    }
    val.parse().ok()
}

fn parse_dimension(val: &str, font_size: f32) -> Dimension {
    let val = val.trim();
    if let Some(pct) = val.strip_suffix('%') {
        return pct
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto);
    }
    parse_length(val, font_size)
        .map(Dimension::Px)
        .unwrap_or(Dimension::Auto)
}

fn apply_shorthand_edges(val: &str, font_size: f32, edges: &mut Edges) {
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| if p == "auto" { Some(0.0) } else { parse_length(p, font_size) })
        .collect::<Option<Vec<f32>>>()
        .unwrap_or_default();
    *edges = match parts[..] {
        [all] => Edges::all(all),
        [vertical, horizontal] => Edges {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        },
        [top, horizontal, bottom] => Edges {
            top,
            right: horizontal,
            bottom,
            left: horizontal,
        },
        [top, right, bottom, left] => Edges {
            top,
            right,
            bottom,
            left,
        },
        _ => return,
    };
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (src, class, width/height hints).
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
/// Whitespace-only text runs are dropped.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
) -> Vec<StyledNode> {
    let inherited = parent_style.cloned().unwrap_or_default();
    nodes
        .iter()
        .filter_map(|node| match node {
            DomNode::Element(e) => {
                let style = resolve_style(e, parent_style);
                let children = build_styled_tree(&e.children, Some(&style));
                Some(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                })
            }
            DomNode::Text(text) if !text.trim().is_empty() => Some(StyledNode::Text {
                text: text.clone(),
                style: inherited.text_run(),
            }),
            DomNode::Text(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn style_of(html: &str) -> ComputedStyle {
        match &build_styled_tree(&parse_html(html), None)[0] {
            StyledNode::Element { style, .. } => style.clone(),
            StyledNode::Text { .. } => panic!("expected element"),
        }
    }

    #[test]
    fn tailwind_padding() {
        let mut s = ComputedStyle::default();
        apply_tailwind_class(&mut s, "p-4");
        assert_eq!(s.padding, Edges::all(16.0));
        apply_tailwind_class(&mut s, "px-2");
        assert_eq!((s.padding.left, s.padding.top), (8.0, 16.0));
    }

    #[test]
    fn inline_style_font_size() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-size: 24px; color: #ff0000");
        assert_eq!(s.font_size, 24.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn color_forms() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("rgb(255, 0, 0)"), Some(Color::rgb(1.0, 0.0, 0.0)));
        let translucent = Color::parse("rgba(0,0,0,0.5)").unwrap();
        assert!((translucent.a - 0.5).abs() < 1e-6);
        assert_eq!(Color::parse("white"), Some(Color::WHITE));
        assert!(Color::parse("transparent").unwrap().is_transparent());
        assert!(Color::parse("not-a-colour").is_none());
    }

    #[test]
    fn background_shorthand_reads_url_and_color() {
        let s = style_of(
            r#"<div style="background: #eeeeee url('data:image/png;base64,AAAA') no-repeat"></div>"#,
        );
        assert_eq!(s.background_image.as_deref(), Some("data:image/png;base64,AAAA"));
        assert!((s.background_color.r - 0.933).abs() < 0.01);
    }

    #[test]
    fn typography_is_inherited_but_box_is_not() {
        let tree = build_styled_tree(
            &parse_html(r#"<div class="text-lg p-4 bg-gray-100"><strong>Note</strong></div>"#),
            None,
        );
        let StyledNode::Element { children, .. } = &tree[0] else {
            panic!("expected element");
        };
        let StyledNode::Element { style, children, .. } = &children[0] else {
            panic!("expected strong");
        };
        assert_eq!(style.font_size, 18.0);
        assert_eq!(style.font_weight, FontWeight::Bold);
        assert_eq!(style.padding, Edges::default());
        let StyledNode::Text { style: run, .. } = &children[0] else {
            panic!("expected text");
        };
        assert!(run.background_color.is_transparent());
    }

    #[test]
    fn shorthand_spacing_and_border() {
        let s = style_of(r#"<div style="margin: 4px 8px; padding: 1px 2px 3px 4px; border: 2px solid #333"></div>"#);
        assert_eq!(s.margin, Edges { top: 4.0, right: 8.0, bottom: 4.0, left: 8.0 });
        assert_eq!(s.padding.left, 4.0);
        assert_eq!(s.border_width, 2.0);
        assert!((s.border_color.r - 0.2).abs() < 0.01);
    }
}
