//! HTML parser – turns the report markup into a small DOM tree.
//!
//! The render surface only needs what inspection reports are built from:
//! - Sectioning: html, body, section, article, header, footer, main, div
//! - Text blocks: p, h1-h6, ul, ol, li, table, tr, td, th
//! - Inline: span, strong, b, em, i, u, a
//! - Replaced: img
//!
//! Void elements never take children. `<style>`, `<script>` and `<title>`
//! bodies are skipped as raw text so their contents never reach layout.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Div,
    Section,
    Article,
    Header,
    Footer,
    Main,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    Em,
    U,
    A,
    Img,
    Br,
    Hr,
    /// Any other tag. Laid out as a block.
    Other(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "article" => Tag::Article,
            "header" => Tag::Header,
            "footer" => Tag::Footer,
            "main" => Tag::Main,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "u" => Tag::U,
            "a" => Tag::A,
            "img" => Tag::Img,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            other => Tag::Other(other.to_string()),
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6)
    }
}

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose body is raw text and never rendered.
const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script", "title", "template", "noscript"];

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whole-token class match; `pdf-page-header` does not match `pdf-page`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    pub fn attr_px(&self, name: &str) -> Option<f32> {
        self.attributes
            .get(name)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an HTML string into a forest of DOM nodes. Never fails: malformed
/// markup degrades into whatever structure could be recovered.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    let mut nodes = parser.parse_nodes();
    // Unmatched closing tags at the top level are dropped.
    while !parser.eof() {
        parser.skip_past(">");
        nodes.extend(parser.parse_nodes());
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_inter_element_whitespace();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        if self.starts_with("<") {
            self.parse_element()
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        let len = self.rest().find('<').unwrap_or(self.rest().len());
        self.pos += len;
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> Option<DomNode> {
        self.pos += 1; // '<'
        let name = self.parse_name();
        if name.is_empty() {
            // A stray '<' in text.
            return Some(DomNode::Text("<".to_string()));
        }
        let lower = name.to_ascii_lowercase();
        let mut elem = ElementNode::new(Tag::from_name(&lower));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Unparseable byte in the tag; step over it.
                self.advance_char();
                continue;
            }
            if !key.is_empty() {
                elem.attributes.entry(key).or_insert(value);
            }
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return Some(DomNode::Element(elem));
        }
        if self.starts_with(">") {
            self.pos += 1;
        }

        if RAW_TEXT_ELEMENTS.contains(&lower.as_str()) {
            self.skip_raw_text(&lower);
            return None;
        }
        if VOID_ELEMENTS.contains(&lower.as_str()) {
            return Some(DomNode::Element(elem));
        }

        elem.children = self.parse_nodes();

        if self.starts_with("</") {
            self.pos += 2;
            self.parse_name();
            self.skip_past(">");
        }
        Some(DomNode::Element(elem))
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance_char();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name().to_ascii_lowercase();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.pos += 1;
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                let len = self.rest().find(quote).unwrap_or(self.rest().len());
                self.pos += len;
                let value = decode_entities(&self.input[start..self.pos]);
                if !self.eof() {
                    self.pos += 1;
                }
                value
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.advance_char();
                }
                decode_entities(&self.input[start..self.pos])
            }
        }
    }

    /// Skip to just past `</name>`, case-insensitively.
    fn skip_raw_text(&mut self, name: &str) {
        let needle = format!("</{name}");
        let haystack = self.rest().to_ascii_lowercase();
        match haystack.find(&needle) {
            Some(offset) => {
                self.pos += offset + needle.len();
                self.skip_past(">");
            }
            None => self.pos = self.input.len(),
        }
    }

    fn skip_past(&mut self, marker: &str) {
        match self.rest().find(marker) {
            Some(offset) => self.pos += offset + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance_char();
        }
    }

    /// Whitespace-only runs between tags are dropped; whitespace leading into
    /// text is kept.
    fn skip_inter_element_whitespace(&mut self) {
        let saved = self.pos;
        self.skip_whitespace();
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&middot;", "\u{00B7}")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Children of `<body>`, or the whole forest when there is no body element.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    find_body(nodes).unwrap_or_else(|| {
        nodes
            .iter()
            .filter(|n| !matches!(n, DomNode::Element(e) if e.tag == Tag::Head))
            .cloned()
            .collect()
    })
}

fn find_body(nodes: &[DomNode]) -> Option<Vec<DomNode>> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if e.tag == Tag::Body => Some(e.children.clone()),
        DomNode::Element(e) if e.tag == Tag::Html => find_body(&e.children).or_else(|| {
            Some(
                e.children
                    .iter()
                    .filter(|n| !matches!(n, DomNode::Element(h) if h.tag == Tag::Head))
                    .cloned()
                    .collect(),
            )
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            DomNode::Text(t) => panic!("expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parses_page_sections() {
        let nodes = parse_html(r#"<section class="pdf-page p-8"><h2>Roof</h2></section>"#);
        assert_eq!(nodes.len(), 1);
        let section = element(&nodes[0]);
        assert_eq!(section.tag, Tag::Section);
        assert!(section.has_class("pdf-page"));
        assert!(!section.has_class("pdf"));
        assert_eq!(element(&section.children[0]).tag, Tag::H2);
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let html = r#"<div><img src="a.png"><br><p>after</p><hr></div>"#;
        let nodes = parse_html(html);
        let div = element(&nodes[0]);
        let tags: Vec<&Tag> = div.children.iter().map(|c| &element(c).tag).collect();
        assert_eq!(tags, vec![&Tag::Img, &Tag::Br, &Tag::P, &Tag::Hr]);
    }

    #[test]
    fn head_content_is_not_rendered() {
        let html = r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>T</title>
            <style>.pdf-page { color: red; } p < b {}</style></head>
            <body><div class="pdf-page">one</div></body></html>"#;
        let body = body_children(&parse_html(html));
        assert_eq!(body.len(), 1);
        assert!(element(&body[0]).has_class("pdf-page"));
    }

    #[test]
    fn script_body_is_skipped() {
        let nodes = parse_html("<div><script>if (a < b) { x('</div>'); }</script><p>kept</p></div>");
        let div = element(&nodes[0]);
        assert_eq!(div.children.len(), 1);
        assert_eq!(element(&div.children[0]).tag, Tag::P);
    }

    #[test]
    fn inline_children_keep_text_order() {
        let nodes = parse_html(r#"<p>Hello <strong>world</strong> &amp; more</p>"#);
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 3);
        match &p.children[2] {
            DomNode::Text(t) => assert_eq!(t, " & more"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn attributes_are_decoded_and_lowercased() {
        let nodes = parse_html(r#"<IMG SRC='x.png?a=1&amp;b=2' width=120>"#);
        let img = element(&nodes[0]);
        assert_eq!(img.tag, Tag::Img);
        assert_eq!(img.src(), Some("x.png?a=1&b=2"));
        assert_eq!(img.attr_px("width"), Some(120.0));
    }
}
