//! Vector rendering of codes and the surfaces they are drawn into.
//!
//! The symbology itself comes from the `qrcode` crate. This module turns its
//! module matrix into SVG markup and models the rendering surface an item
//! owns, so the raster converter can look the markup up again later.

use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};

use crate::error::RenderError;

/// Quiet zone used by the terminal preview, in modules.
const PREVIEW_BORDER: usize = 4;

/// Renders a scannable code for a string at a pixel size.
pub trait CodeRenderer: Send + Sync {
    fn render(&self, text: &str, size: f64) -> Result<VectorNode, RenderError>;
}

/// A rendered vector code: SVG markup plus the size it was rendered at.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorNode {
    markup: String,
    size: f64,
}

impl VectorNode {
    pub fn new(markup: String, size: f64) -> Self {
        Self { markup, size }
    }

    /// The textual (serialized) form of the node.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn size(&self) -> f64 {
        self.size
    }
}

/// Dark/light modules of an encoded symbol, row major.
#[derive(Debug, Clone)]
pub struct ModuleGrid {
    width: usize,
    dark: Vec<bool>,
}

impl ModuleGrid {
    /// Encodes `text` at the given error correction level.
    pub fn encode(text: &str, ecc: EcLevel) -> Result<Self, RenderError> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), ecc).map_err(|e| match e {
            QrError::DataTooLong => RenderError::DataTooLong(text.len()),
            other => RenderError::Unencodable(other.to_string()),
        })?;
        let dark = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
        Ok(Self {
            width: code.width(),
            dark,
        })
    }

    /// Width and height of the symbol, in modules.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the module at (x, y); anything outside the symbol is light.
    pub fn is_dark(&self, x: i64, y: i64) -> bool {
        let w = self.width as i64;
        if x < 0 || y < 0 || x >= w || y >= w {
            return false;
        }
        self.dark[(y * w + x) as usize]
    }
}

/// The default renderer: QR code, error correction H, black on white.
#[derive(Debug, Clone)]
pub struct QrSvgRenderer {
    pub ecc: EcLevel,
    pub background: String,
    pub foreground: String,
    /// Quiet zone around the symbol, in modules.
    pub border: usize,
}

impl Default for QrSvgRenderer {
    fn default() -> Self {
        Self {
            ecc: EcLevel::H,
            background: "#FFFFFF".to_string(),
            foreground: "#000000".to_string(),
            border: 0,
        }
    }
}

impl CodeRenderer for QrSvgRenderer {
    fn render(&self, text: &str, size: f64) -> Result<VectorNode, RenderError> {
        let grid = ModuleGrid::encode(text, self.ecc)?;
        let markup = to_svg_string(&grid, self.border, size, text, &self.background, &self.foreground);
        Ok(VectorNode::new(markup, size))
    }
}

/// Returns SVG markup for the given symbol, with `border` modules of quiet
/// zone, scaled to `size` pixels and titled with the encoded text.
/// The string always uses Unix newlines (\n), regardless of the platform.
pub fn to_svg_string(
    grid: &ModuleGrid,
    border: usize,
    size: f64,
    title: &str,
    background: &str,
    foreground: &str,
) -> String {
    let dimension = grid.width() + border * 2;
    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    let _ = writeln!(
        result,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{size}\" height=\"{size}\" viewBox=\"0 0 {dimension} {dimension}\" stroke=\"none\" shape-rendering=\"crispEdges\">"
    );
    let _ = writeln!(result, "\t<title>{}</title>", escape_xml(title));
    let _ = writeln!(result, "\t<rect width=\"100%\" height=\"100%\" fill=\"{background}\"/>");
    result += "\t<path d=\"";
    let mut first = true;
    for y in 0..grid.width() {
        for x in 0..grid.width() {
            if grid.is_dark(x as i64, y as i64) {
                if !first {
                    result += " ";
                }
                first = false;
                let _ = write!(result, "M{},{}h1v1h-1z", x + border, y + border);
            }
        }
    }
    let _ = writeln!(result, "\" fill=\"{foreground}\"/>");
    result += "</svg>\n";
    result
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders `text` as block characters for a terminal, two columns per module.
pub fn preview_string(text: &str) -> Result<String, RenderError> {
    let grid = ModuleGrid::encode(text, EcLevel::H)?;
    let border = PREVIEW_BORDER as i64;
    let width = grid.width() as i64;
    let mut out = String::new();
    for y in -border..width + border {
        for x in -border..width + border {
            let c = if grid.is_dark(x, y) { '█' } else { ' ' };
            out.push(c);
            out.push(c);
        }
        out.push('\n');
    }
    Ok(out)
}

/// A child of a rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceNode {
    /// Header line shown above the code.
    Caption(String),
    Vector(VectorNode),
}

/// Shared handle to the region an item draws its code into.
///
/// A detached surface (the default) is an empty reference. Clones observe
/// the same region.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRef {
    inner: Arc<RwLock<Option<Vec<SurfaceNode>>>>,
}

impl SurfaceRef {
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attaches the surface and replaces its children.
    pub fn mount(&self, nodes: Vec<SurfaceNode>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(nodes);
    }

    pub fn detach(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Copy of the children, or `None` when detached.
    pub fn snapshot(&self) -> Option<Vec<SurfaceNode>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the first vector child. Outer `None` means detached.
    pub fn find_vector(&self) -> Option<Option<VectorNode>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|nodes| {
            nodes.iter().find_map(|node| match node {
                SurfaceNode::Vector(v) => Some(v.clone()),
                SurfaceNode::Caption(_) => None,
            })
        })
    }

    /// Whether two handles refer to the same region.
    pub fn same_surface(&self, other: &SurfaceRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_markup_is_sized_and_titled() {
        let node = QrSvgRenderer::default().render("HELLO WORLD", 128.0).unwrap();
        let svg = node.markup();
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(svg.contains("width=\"128\" height=\"128\""));
        assert!(svg.contains("<title>HELLO WORLD</title>"));
        assert!(svg.contains("fill=\"#FFFFFF\""));
        assert!(svg.contains("fill=\"#000000\""));
    }

    #[test]
    fn title_is_escaped() {
        let node = QrSvgRenderer::default().render("a<b & \"c\"", 64.0).unwrap();
        assert!(node.markup().contains("<title>a&lt;b &amp; &quot;c&quot;</title>"));
    }

    #[test]
    fn viewbox_matches_symbol_width() {
        let grid = ModuleGrid::encode("hello", EcLevel::H).unwrap();
        let svg = to_svg_string(&grid, 2, 100.0, "hello", "#FFFFFF", "#000000");
        let dim = grid.width() + 4;
        assert!(svg.contains(&format!("viewBox=\"0 0 {dim} {dim}\"")));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let text = "x".repeat(4000);
        let err = QrSvgRenderer::default().render(&text, 128.0).unwrap_err();
        assert_eq!(err, RenderError::DataTooLong(4000));
    }

    #[test]
    fn preview_has_quiet_zone() {
        let preview = preview_string("hi").unwrap();
        let first = preview.lines().next().unwrap();
        assert!(first.chars().all(|c| c == ' '));
        assert!(preview.contains('█'));
    }

    #[test]
    fn surface_lifecycle() {
        let surface = SurfaceRef::detached();
        assert!(!surface.is_attached());
        assert_eq!(surface.find_vector(), None);

        surface.mount(vec![SurfaceNode::Caption("header".into())]);
        assert_eq!(surface.find_vector(), Some(None));

        let node = VectorNode::new("<svg/>".into(), 10.0);
        let clone = surface.clone();
        clone.mount(vec![SurfaceNode::Caption("h".into()), SurfaceNode::Vector(node.clone())]);
        assert_eq!(surface.find_vector(), Some(Some(node)));
        assert!(surface.same_surface(&clone));

        surface.detach();
        assert!(!clone.is_attached());
    }
}
