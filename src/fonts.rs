//! Font loading and text measurement using `ttf-parser`.
//!
//! [`FontManager::discover`] picks up a sans-serif family from the system font
//! directories. When none is installed a synthetic face with Helvetica-like
//! metrics keeps measurement deterministic, and the rasteriser paints text as
//! glyph-sized blocks instead of outlines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("failed to parse font: {0}")]
    Parse(#[from] ttf_parser::FaceParsingError),
}

/// A loaded font face with metrics in font units.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes; empty for the synthetic fallback face.
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
}

impl FontData {
    fn synthetic() -> Self {
        Self {
            bytes: Vec::new(),
            units_per_em: 1000.0,
            ascender: 750.0,
            descender: -250.0,
            line_gap: 0.0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
            italic,
        }
    }
}

/// Family name every style falls back to.
pub const DEFAULT_FAMILY: &str = "Helvetica";

/// File names tried per variant, most preferred first.
const REGULAR_CANDIDATES: &[&str] = &[
    "LiberationSans-Regular.ttf",
    "Arimo-Regular.ttf",
    "DejaVuSans.ttf",
    "NotoSans-Regular.ttf",
    "arial.ttf",
    "Arial.ttf",
];
const BOLD_CANDIDATES: &[&str] = &[
    "LiberationSans-Bold.ttf",
    "Arimo-Bold.ttf",
    "DejaVuSans-Bold.ttf",
    "NotoSans-Bold.ttf",
    "arialbd.ttf",
    "Arial Bold.ttf",
];
const ITALIC_CANDIDATES: &[&str] = &[
    "LiberationSans-Italic.ttf",
    "Arimo-Italic.ttf",
    "DejaVuSans-Oblique.ttf",
    "NotoSans-Italic.ttf",
    "ariali.ttf",
    "Arial Italic.ttf",
];

/// Loaded faces keyed by family and variant.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    default_key: FontKey,
}

impl FontManager {
    /// An empty manager. Measurement falls back to heuristics until a face is
    /// loaded or [`ensure_default`](Self::ensure_default) is called.
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            default_key: FontKey::new(DEFAULT_FAMILY, false, false),
        }
    }

    /// Scan the system font directories for a sans-serif family and register
    /// whatever variants are found under [`DEFAULT_FAMILY`].
    pub fn discover() -> Self {
        let mut mgr = Self::new();
        let available = index_font_files(&system_font_dirs());

        let variants = [
            (false, false, REGULAR_CANDIDATES),
            (true, false, BOLD_CANDIDATES),
            (false, true, ITALIC_CANDIDATES),
        ];
        for (bold, italic, candidates) in variants {
            let Some(path) = candidates.iter().find_map(|name| available.get(*name)) else {
                continue;
            };
            match std::fs::read(path) {
                Ok(bytes) => match mgr.load_font(DEFAULT_FAMILY, bold, italic, bytes) {
                    Ok(()) => log::debug!("Loaded system font {}", path.display()),
                    Err(e) => log::warn!("Skipping font {}: {e}", path.display()),
                },
                Err(e) => log::warn!("Could not read font {}: {e}", path.display()),
            }
        }

        if !mgr.has_real_fonts() {
            log::debug!("No system font found, using synthetic metrics");
        }
        mgr.ensure_default();
        mgr
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), FontError> {
        let face = ttf_parser::Face::parse(&bytes, 0)?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            line_gap: face.line_gap() as f32,
            bytes,
        };
        let key = FontKey::new(family, bold, italic);
        if !bold && !italic {
            self.default_key = key.clone();
        }
        self.fonts.insert(key, data);
        Ok(())
    }

    /// Register synthetic regular and bold faces unless a regular face is
    /// already present.
    pub fn ensure_default(&mut self) {
        if self.fonts.contains_key(&self.default_key) {
            return;
        }
        for bold in [false, true] {
            self.fonts
                .entry(FontKey::new(DEFAULT_FAMILY, bold, false))
                .or_insert_with(FontData::synthetic);
        }
        self.default_key = FontKey::new(DEFAULT_FAMILY, false, false);
    }

    /// Face for `key`: exact match, then the same weight upright, then the
    /// default face.
    pub fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts
            .get(key)
            .or_else(|| self.fonts.get(&FontKey::new(&key.family, key.bold, false)))
            .or_else(|| self.fonts.get(&FontKey::new(DEFAULT_FAMILY, key.bold, false)))
            .or_else(|| self.fonts.get(&self.default_key))
    }

    /// Width of `text` in px at `font_size`. Real faces sum glyph advances;
    /// synthetic ones use 0.5 (0.55 bold) of the font size per character.
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: &FontKey) -> f32 {
        let heuristic = |bold: bool| {
            let avg = if bold { 0.55 } else { 0.5 };
            text.chars().count() as f32 * font_size * avg
        };
        let Some(data) = self.get(key).filter(|d| !d.is_synthetic()) else {
            return heuristic(key.bold);
        };
        let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) else {
            return heuristic(key.bold);
        };

        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| match face.glyph_index(ch) {
                Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => font_size * 0.5,
            })
            .sum()
    }

    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    pub fn ascender_px(&self, font_size: f32, key: &FontKey) -> f32 {
        match self.get(key) {
            Some(data) => data.ascender * font_size / data.units_per_em,
            None => font_size * 0.75,
        }
    }

    /// Whether a real face backs the default key.
    pub fn has_real_fonts(&self) -> bool {
        self.fonts
            .get(&self.default_key)
            .is_some_and(|d| !d.is_synthetic())
    }

    /// Outline bytes for `key` after fallback, or `None` for synthetic faces.
    pub fn font_bytes(&self, key: &FontKey) -> Option<&[u8]> {
        self.get(key)
            .filter(|d| !d.is_synthetic())
            .map(|d| d.bytes.as_slice())
    }
}

impl Default for FontManager {
    fn default() -> Self {
        let mut mgr = Self::new();
        mgr.ensure_default();
        mgr
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    if let Ok(extra) = std::env::var("REPORT_SNAP_FONT_DIR") {
        dirs.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }
    dirs
}

/// Map file name to path for every font file under `dirs`, first hit wins.
fn index_font_files(dirs: &[PathBuf]) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in dirs {
        collect_font_files(dir, 0, &mut index);
    }
    index
}

fn collect_font_files(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    const MAX_DEPTH: usize = 4;
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            if depth < MAX_DEPTH {
                collect_font_files(&path, depth + 1, index);
            }
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".ttf") || lower.ends_with(".otf") {
                index.entry(name.to_string()).or_insert(path);
            }
        }
    }
}

/// Word-wrap text to fit within `max_width` px. Explicit newlines are kept as
/// line breaks; a single word wider than the line gets a line of its own.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    key: &FontKey,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if fonts.measure_text_width(&candidate, font_size, key) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular() -> FontKey {
        FontKey::new(DEFAULT_FAMILY, false, false)
    }

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        // 5 chars × 16 × 0.5
        let w = mgr.measure_text_width("Hello", 16.0, &regular());
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn bold_heuristic_is_wider() {
        let mgr = FontManager::default();
        let bold = FontKey::new(DEFAULT_FAMILY, true, false);
        assert!(
            mgr.measure_text_width("Roof", 16.0, &bold)
                > mgr.measure_text_width("Roof", 16.0, &regular())
        );
    }

    #[test]
    fn unknown_family_falls_back_to_default() {
        let mgr = FontManager::default();
        let key = FontKey::new("Comic Sans", false, true);
        assert!(mgr.get(&key).is_some());
        assert!(mgr.font_bytes(&key).is_none());
    }

    #[test]
    fn empty_manager_still_measures() {
        let mgr = FontManager::new();
        assert!(mgr.measure_text_width("ab", 10.0, &regular()) > 0.0);
        assert_eq!(mgr.ascender_px(20.0, &regular()), 15.0);
    }

    #[test]
    fn rejects_garbage_font_bytes() {
        let mut mgr = FontManager::new();
        assert!(mgr.load_font("X", false, false, vec![0, 1, 2, 3]).is_err());
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, &regular(), 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
        assert_eq!(lines.join(" "), "Hello world foo bar");
    }

    #[test]
    fn word_wrap_keeps_explicit_breaks() {
        let mgr = FontManager::default();
        let lines = wrap_text("a\nb", 16.0, &regular(), 500.0, &mgr);
        assert_eq!(lines, vec!["a", "b"]);
    }
}
