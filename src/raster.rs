//! Conversion of a rendered vector code into a PNG payload.
//!
//! The vector node is serialized, wrapped into a base64 `data:` URI, decoded
//! back into an SVG tree and drawn at `size × size` onto an opaque white
//! pixmap, which is then PNG encoded with `image`. Nothing is cached: every
//! call redoes the whole chain.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;
use tracing::debug;

use crate::error::RasterError;
use crate::render::{SurfaceRef, VectorNode};

/// MIME type of every payload produced here.
pub const PNG_MIME: &str = "image/png";

/// Largest accepted raster size, in pixels per side.
pub const MAX_RASTER_SIZE: f64 = 8192.0;

const SVG_DATA_URI_PREFIX: &str = "data:image/svg+xml;base64,";

/// PNG-encoded image of a code, square, on a white background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPayload {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl RasterPayload {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mime_type(&self) -> &'static str {
        PNG_MIME
    }
}

/// Converts the vector code drawn in `surface` into a PNG of `size × size`.
///
/// Fractional sizes are truncated to whole pixels. Failures are never
/// retried here.
///
/// # Errors
///
/// - [`RasterError::RefInvalid`] if the surface is detached.
/// - [`RasterError::NodeMissing`] if the surface holds no vector node.
/// - [`RasterError::InvalidSize`] unless `size` is a positive number no
///   larger than [`MAX_RASTER_SIZE`].
/// - [`RasterError::ImageDecodeFailed`] if the serialized markup cannot be decoded.
/// - [`RasterError::EncodeFailed`] if no PNG payload could be produced.
pub async fn to_raster(surface: &SurfaceRef, size: f64) -> Result<RasterPayload, RasterError> {
    let node = resolve_vector(surface)?;
    if !size.is_finite() || size <= 0.0 || size > MAX_RASTER_SIZE {
        return Err(RasterError::InvalidSize(size));
    }
    let uri = svg_data_uri(&node);
    let px = size as u32;
    debug!(px, uri_len = uri.len(), "decoding vector code");

    let pixmap = tokio::task::spawn_blocking(move || {
        let tree = decode_data_uri(&uri)?;
        draw(&tree, px)
    })
    .await
    .map_err(|e| RasterError::ImageDecodeFailed(e.to_string()))??;

    let payload = tokio::task::spawn_blocking(move || encode_png(pixmap))
        .await
        .map_err(|e| RasterError::EncodeFailed(e.to_string()))??;
    debug!(bytes = payload.bytes.len(), px, "encoded png payload");
    Ok(payload)
}

fn resolve_vector(surface: &SurfaceRef) -> Result<VectorNode, RasterError> {
    surface
        .find_vector()
        .ok_or(RasterError::RefInvalid)?
        .ok_or(RasterError::NodeMissing)
}

/// Serializes a vector node into a `data:image/svg+xml;base64,` URI.
///
/// The markup is base64-encoded from its UTF-8 bytes, so text outside
/// Latin-1 survives the round trip.
pub fn svg_data_uri(node: &VectorNode) -> String {
    format!("{SVG_DATA_URI_PREFIX}{}", STANDARD.encode(node.markup().as_bytes()))
}

fn decode_data_uri(uri: &str) -> Result<usvg::Tree, RasterError> {
    let encoded = uri
        .strip_prefix(SVG_DATA_URI_PREFIX)
        .ok_or_else(|| RasterError::ImageDecodeFailed("not an svg data uri".to_string()))?;
    let data = STANDARD
        .decode(encoded)
        .map_err(|e| RasterError::ImageDecodeFailed(e.to_string()))?;
    usvg::Tree::from_data(&data, &usvg::Options::default())
        .map_err(|e| RasterError::ImageDecodeFailed(e.to_string()))
}

fn draw(tree: &usvg::Tree, px: u32) -> Result<Pixmap, RasterError> {
    let mut pixmap = Pixmap::new(px, px)
        .ok_or_else(|| RasterError::EncodeFailed(format!("cannot allocate a {px}x{px} raster surface")))?;
    // Vector output is often transparent; codes need an opaque white backing.
    pixmap.fill(Color::WHITE);

    let view = tree.size();
    let transform = Transform::from_scale(px as f32 / view.width(), px as f32 / view.height());
    resvg::render(tree, transform, &mut pixmap.as_mut());
    Ok(pixmap)
}

fn encode_png(pixmap: Pixmap) -> Result<RasterPayload, RasterError> {
    let (width, height) = (pixmap.width(), pixmap.height());
    // Every pixel is opaque, so premultiplied data equals straight RGBA.
    let img = RgbaImage::from_raw(width, height, pixmap.take())
        .ok_or_else(|| RasterError::EncodeFailed("pixel buffer size mismatch".to_string()))?;
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| RasterError::EncodeFailed(e.to_string()))?;
    if bytes.is_empty() {
        return Err(RasterError::EncodeFailed("encoder produced no data".to_string()));
    }
    Ok(RasterPayload { bytes, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{CodeRenderer, QrSvgRenderer, SurfaceNode};

    fn surface_for(text: &str, size: f64) -> SurfaceRef {
        let node = QrSvgRenderer::default().render(text, size).unwrap();
        let surface = SurfaceRef::detached();
        surface.mount(vec![
            SurfaceNode::Caption(format!("--- QR Code for: {text} ---")),
            SurfaceNode::Vector(node),
        ]);
        surface
    }

    #[tokio::test]
    async fn repeated_conversions_match() {
        let surface = surface_for("https://a.example", 128.0);
        let first = to_raster(&surface, 128.0).await.unwrap();
        let second = to_raster(&surface, 128.0).await.unwrap();

        for payload in [&first, &second] {
            assert!(!payload.bytes().is_empty());
            assert_eq!((payload.width(), payload.height()), (128, 128));
            let decoded = image::load_from_memory(payload.bytes()).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (128, 128));
        }
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn transparent_vector_gets_white_background() {
        let surface = SurfaceRef::detached();
        let markup = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"8\" height=\"8\"><rect width=\"8\" height=\"8\" fill=\"none\"/></svg>".to_string();
        surface.mount(vec![SurfaceNode::Vector(VectorNode::new(markup, 8.0))]);

        let payload = to_raster(&surface, 16.0).await.unwrap();
        let img = image::load_from_memory(payload.bytes()).unwrap().to_rgba8();
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn draws_dark_modules() {
        let surface = surface_for("hello", 128.0);
        let payload = to_raster(&surface, 128.0).await.unwrap();
        let img = image::load_from_memory(payload.bytes()).unwrap().to_luma8();
        // No quiet zone: the top-left finder pattern starts at the origin.
        assert!(img.get_pixel(1, 1).0[0] < 64);
    }

    #[tokio::test]
    async fn non_ascii_text_survives_serialization() {
        let surface = surface_for("héllo 世界 🚀", 64.0);
        let payload = to_raster(&surface, 64.0).await.unwrap();
        assert_eq!(payload.width(), 64);
    }

    #[tokio::test]
    async fn fractional_size_is_truncated() {
        let surface = surface_for("hello", 358.4);
        let payload = to_raster(&surface, 358.4).await.unwrap();
        assert_eq!((payload.width(), payload.height()), (358, 358));
        let decoded = image::load_from_memory(&payload.into_bytes()).unwrap();
        assert_eq!(decoded.width(), 358);
    }

    #[tokio::test]
    async fn detached_surface_is_ref_invalid() {
        let err = to_raster(&SurfaceRef::detached(), 128.0).await.unwrap_err();
        assert_eq!(err, RasterError::RefInvalid);
    }

    #[tokio::test]
    async fn surface_without_vector_is_node_missing() {
        let surface = SurfaceRef::detached();
        surface.mount(vec![SurfaceNode::Caption("header".into())]);
        let err = to_raster(&surface, 128.0).await.unwrap_err();
        assert_eq!(err, RasterError::NodeMissing);
    }

    #[tokio::test]
    async fn non_positive_sizes_are_rejected() {
        let surface = surface_for("hello", 128.0);
        for size in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = to_raster(&surface, size).await.unwrap_err();
            assert!(matches!(err, RasterError::InvalidSize(_)), "{size}: {err}");
        }
    }

    #[tokio::test]
    async fn oversized_rasters_are_rejected() {
        let surface = surface_for("hello", 128.0);
        let err = to_raster(&surface, 100_000.0).await.unwrap_err();
        assert_eq!(err, RasterError::InvalidSize(100_000.0));
        let err = to_raster(&surface, MAX_RASTER_SIZE + 1.0).await.unwrap_err();
        assert!(matches!(err, RasterError::InvalidSize(_)));
    }

    #[tokio::test]
    async fn broken_markup_fails_decode() {
        let surface = SurfaceRef::detached();
        surface.mount(vec![SurfaceNode::Vector(VectorNode::new("not svg".into(), 10.0))]);
        let err = to_raster(&surface, 10.0).await.unwrap_err();
        assert!(matches!(err, RasterError::ImageDecodeFailed(_)));
    }

    #[tokio::test]
    async fn sub_pixel_size_yields_no_payload() {
        let surface = surface_for("hello", 0.5);
        let err = to_raster(&surface, 0.5).await.unwrap_err();
        assert!(matches!(err, RasterError::EncodeFailed(_)));
    }

    #[test]
    fn data_uri_round_trips_unicode() {
        let node = VectorNode::new("<svg><title>日本</title></svg>".into(), 1.0);
        let uri = svg_data_uri(&node);
        assert!(uri.starts_with(SVG_DATA_URI_PREFIX));
        let decoded = STANDARD.decode(&uri[SVG_DATA_URI_PREFIX.len()..]).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), node.markup());
    }
}
