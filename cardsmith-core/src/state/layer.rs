//! # Layers
//!
//! A layer is one placeable element of the page: an image or a block of text. Both share a
//! common base of identity, placement and flags, with the variant specific data in [`LayerKind`].

use std::sync::Arc;

use crate::color::Rgb;
use crate::id::ProcessId;
use crate::payload::PayloadKey;
use crate::util::{finite_or, Rect};

use super::group::GroupId;

pub struct LayerMarker;
pub type LayerId = ProcessId<LayerMarker>;

/// Default font size, in canvas pixels.
pub const DEFAULT_FONT_SIZE: f64 = 32.0;
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";
/// Line advance as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.16;
/// Rough advance of one grapheme as a multiple of the font size, used to size new text boxes.
const GRAPHEME_ADVANCE: f64 = 0.6;
pub const MIN_TEXT_WIDTH: f64 = 20.0;
/// Longest layer name derived from text content.
pub const LABEL_GRAPHEMES: usize = 24;

/// Where a layer sits on the canvas. Objects are center-origin: `x, y` name the center of the
/// layer in canvas pixels, and scale, rotation and flips all act about that point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Clockwise, in degrees.
    pub rotation: f64,
    pub flip_x: bool,
    pub flip_y: bool,
    /// In `[0, 1]`.
    pub opacity: f64,
}
impl Placement {
    #[must_use]
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
    /// Replace non-finite values with defaults and clamp opacity.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let default = Self::default();
        Self {
            x: finite_or(self.x, default.x),
            y: finite_or(self.y, default.y),
            scale_x: finite_or(self.scale_x, default.scale_x),
            scale_y: finite_or(self.scale_y, default.scale_y),
            rotation: finite_or(self.rotation, default.rotation),
            opacity: finite_or(self.opacity, default.opacity).clamp(0.0, 1.0),
            ..self
        }
    }
}
impl Default for Placement {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            flip_x: false,
            flip_y: false,
            opacity: 1.0,
        }
    }
}

/// Color adjustments applied by the renderer. Zero is neutral for every field.
#[derive(Copy, Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Adjustments {
    /// `[-1, 1]`
    pub brightness: f64,
    /// `[-1, 1]`
    pub contrast: f64,
    /// `[-1, 1]`
    pub saturation: f64,
    /// Blur radius, as a fraction of the layer's size. Never negative.
    pub blur: f64,
}
impl Adjustments {
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            brightness: finite_or(self.brightness, 0.0).clamp(-1.0, 1.0),
            contrast: finite_or(self.contrast, 0.0).clamp(-1.0, 1.0),
            saturation: finite_or(self.saturation, 0.0).clamp(-1.0, 1.0),
            blur: finite_or(self.blur, 0.0).max(0.0),
        }
    }
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("no image data")]
    Empty,
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("bad inline image data: {0}")]
    DataUrl(#[from] crate::payload::DataUrlError),
}

/// The immutable original bytes behind an image layer.
///
/// Never re-encoded: duplicating a layer or taking a snapshot shares the same allocation.
#[derive(Clone, Debug)]
pub struct ImageSource {
    bytes: Arc<[u8]>,
    key: PayloadKey,
    file_name: String,
    format: image::ImageFormat,
    width: u32,
    height: u32,
}
impl ImageSource {
    /// Check that some encoded image decodes in full. The pixels are thrown away again, only
    /// the original bytes are kept.
    pub fn decode(bytes: Arc<[u8]>, file_name: &str) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let reader =
            image::ImageReader::new(std::io::Cursor::new(&*bytes)).with_guessed_format()?;
        let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
        let decoded = reader.decode()?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }
        Ok(Self {
            key: PayloadKey::of_bytes(&bytes),
            bytes,
            file_name: file_name.to_owned(),
            format,
            width,
            height,
        })
    }
    #[must_use]
    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }
    #[must_use]
    pub fn key(&self) -> &PayloadKey {
        &self.key
    }
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
    #[must_use]
    pub fn format(&self) -> image::ImageFormat {
        self.format
    }
    /// Natural size in pixels.
    #[must_use]
    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}
impl PartialEq for ImageSource {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.file_name == other.file_name
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextData {
    pub content: String,
    pub font_family: String,
    /// Canvas pixels.
    pub font_size: f64,
    pub fill: Rgb,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub align: TextAlign,
    /// Wrapping width of the text box, in unscaled canvas pixels.
    pub width: f64,
}
impl TextData {
    /// Default typography, with the box sized to fit `content`.
    #[must_use]
    pub fn new(content: String) -> Self {
        let width = Self::fit_width(&content, DEFAULT_FONT_SIZE);
        Self {
            content,
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            fill: Rgb::BLACK,
            weight: FontWeight::default(),
            style: FontStyle::default(),
            align: TextAlign::default(),
            width,
        }
    }
    /// Estimated box width for `content`: the longest line's grapheme count times an average
    /// advance. Real metrics belong to the renderer, this only has to be in the right ballpark.
    #[must_use]
    pub fn fit_width(content: &str, font_size: f64) -> f64 {
        content
            .lines()
            .map(|line| Self::line_advance(line, font_size))
            .fold(0.0, f64::max)
            .max(MIN_TEXT_WIDTH)
    }
    fn line_advance(line: &str, font_size: f64) -> f64 {
        use unicode_segmentation::UnicodeSegmentation;
        #[allow(clippy::cast_precision_loss)]
        let graphemes = line.graphemes(true).count() as f64;
        graphemes * font_size * GRAPHEME_ADVANCE
    }
    /// Layer name for this content: the first non-blank line, trimmed and shortened.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        use unicode_segmentation::UnicodeSegmentation;
        let line = self
            .content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())?;
        Some(line.graphemes(true).take(LABEL_GRAPHEMES).collect())
    }
    /// Unscaled height of the text box. Lines longer than `width` wrap, estimated with the
    /// same advance as [`Self::fit_width`].
    #[must_use]
    pub fn height(&self) -> f64 {
        let lines: f64 = self
            .content
            .lines()
            .map(|line| {
                if self.width > 0.0 {
                    let advance = Self::line_advance(line, self.font_size);
                    (advance / self.width - 1e-9).ceil().max(1.0)
                } else {
                    1.0
                }
            })
            .sum();
        lines.max(1.0) * self.font_size * LINE_HEIGHT
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Image(ImageSource),
    Text(TextData),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    id: LayerId,
    pub name: String,
    pub placement: Placement,
    pub visible: bool,
    pub locked: bool,
    pub(crate) group: Option<GroupId>,
    /// `None` when neutral.
    pub adjustments: Option<Adjustments>,
    pub kind: LayerKind,
}
impl Layer {
    /// A fresh, visible and unlocked layer with a new id.
    #[must_use]
    pub fn new(name: String, placement: Placement, kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            name,
            placement: placement.sanitized(),
            visible: true,
            locked: false,
            group: None,
            adjustments: None,
            kind,
        }
    }
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }
    #[must_use]
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }
    /// Whether the surface may select this layer.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        self.visible && !self.locked
    }
    #[must_use]
    pub fn as_text(&self) -> Option<&TextData> {
        match &self.kind {
            LayerKind::Text(text) => Some(text),
            LayerKind::Image(_) => None,
        }
    }
    #[must_use]
    pub fn as_image(&self) -> Option<&ImageSource> {
        match &self.kind {
            LayerKind::Image(image) => Some(image),
            LayerKind::Text(_) => None,
        }
    }
    /// Size before scale and rotation, in canvas pixels.
    #[must_use]
    pub fn natural_size(&self) -> [f64; 2] {
        match &self.kind {
            LayerKind::Image(image) => {
                let [w, h] = image.size();
                [f64::from(w), f64::from(h)]
            }
            LayerKind::Text(text) => [text.width, text.height()],
        }
    }
    /// Axis aligned bounds of the layer after scale and rotation, in canvas pixels.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let [w, h] = self.natural_size();
        let half_w = (w * self.placement.scale_x).abs() / 2.0;
        let half_h = (h * self.placement.scale_y).abs() / 2.0;
        let (sin, cos) = self.placement.rotation.to_radians().sin_cos();
        let extent_x = half_w * cos.abs() + half_h * sin.abs();
        let extent_y = half_w * sin.abs() + half_h * cos.abs();
        Rect::centered(
            [self.placement.x, self.placement.y],
            extent_x * 2.0,
            extent_y * 2.0,
        )
    }
    /// A copy with a fresh id, moved by `offset` on both axes. Image bytes are shared.
    #[must_use]
    pub fn duplicate(&self, offset: f64) -> Self {
        let mut copy = self.clone();
        copy.id = LayerId::next();
        copy.placement.x += offset;
        copy.placement.y += offset;
        copy
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::test::png_bytes;

    fn text_layer(content: &str) -> Layer {
        Layer::new(
            "Text".into(),
            Placement::at(100.0, 100.0),
            LayerKind::Text(TextData::new(content.into())),
        )
    }

    #[test]
    fn decode_reads_dimensions() {
        let source = ImageSource::decode(png_bytes(12, 7).into(), "a.png").unwrap();
        assert_eq!(source.size(), [12, 7]);
        assert_eq!(source.format(), image::ImageFormat::Png);
        assert_eq!(source.key(), &PayloadKey::of_bytes(source.bytes()));
    }
    #[test]
    fn decode_needs_intact_pixels() {
        let bytes = crate::util::test::garbled_png(64, 64);
        // The header alone still looks fine.
        let reader = image::ImageReader::new(std::io::Cursor::new(&bytes))
            .with_guessed_format()
            .unwrap();
        assert_eq!(reader.into_dimensions().unwrap(), (64, 64));
        assert!(matches!(
            ImageSource::decode(bytes.into(), "broken.png"),
            Err(DecodeError::Image(_))
        ));
    }
    #[test]
    fn decode_failures() {
        assert!(matches!(
            ImageSource::decode(Arc::from(&b""[..]), "x"),
            Err(DecodeError::Empty)
        ));
        assert!(matches!(
            ImageSource::decode(Arc::from(&b"definitely not an image"[..]), "x"),
            Err(DecodeError::UnknownFormat)
        ));
    }
    #[test]
    fn text_width_estimate() {
        // Longest line wins, counted in graphemes rather than bytes.
        let width = TextData::fit_width("ab\nnaïve", 10.0);
        assert!((width - 30.0).abs() < 1e-9);
        assert_eq!(TextData::fit_width("", 10.0), MIN_TEXT_WIDTH);
        let text = TextData::new("one\ntwo".into());
        assert!((text.height() - 2.0 * DEFAULT_FONT_SIZE * LINE_HEIGHT).abs() < 1e-9);
    }
    #[test]
    fn long_lines_wrap() {
        let mut text = TextData::new("ab".into());
        let line = DEFAULT_FONT_SIZE * LINE_HEIGHT;
        assert!((text.height() - line).abs() < 1e-9);
        // Twice the box width wraps onto two lines, a bit more onto three.
        text.content = "abcd".into();
        assert!((text.height() - 2.0 * line).abs() < 1e-9);
        text.content = "abcde\nx".into();
        assert!((text.height() - 4.0 * line).abs() < 1e-9);
    }
    #[test]
    fn text_label() {
        assert_eq!(
            TextData::new("\n   \n  Happy birthday!  \nsecond".into()).label(),
            Some("Happy birthday!".to_owned())
        );
        assert_eq!(TextData::new(" \n ".into()).label(), None);
        let long = TextData::new("x".repeat(40)).label().unwrap();
        assert_eq!(long.len(), LABEL_GRAPHEMES);
    }
    #[test]
    fn rotated_bounds() {
        let mut layer = text_layer("abcd");
        let [w, h] = layer.natural_size();
        let straight = layer.bounds();
        assert!((straight.width - w).abs() < 1e-9);
        assert!((straight.height - h).abs() < 1e-9);
        layer.placement.rotation = 90.0;
        let turned = layer.bounds();
        assert!((turned.width - h).abs() < 1e-6);
        assert!((turned.height - w).abs() < 1e-6);
        assert_eq!(turned.center(), [100.0, 100.0]);
    }
    #[test]
    fn duplicate_is_fresh_and_shares_bytes() {
        let source = ImageSource::decode(png_bytes(2, 2).into(), "a.png").unwrap();
        let layer = Layer::new(
            "a.png".into(),
            Placement::at(10.0, 10.0),
            LayerKind::Image(source),
        );
        let copy = layer.duplicate(20.0);
        assert_ne!(copy.id(), layer.id());
        assert_eq!(copy.placement.x, 30.0);
        assert_eq!(copy.placement.y, 30.0);
        assert!(Arc::ptr_eq(
            copy.as_image().unwrap().bytes(),
            layer.as_image().unwrap().bytes()
        ));
    }
    #[test]
    fn sanitize_placement() {
        let placement = Placement {
            x: f64::NAN,
            opacity: 4.0,
            ..Placement::at(1.0, 2.0)
        }
        .sanitized();
        assert_eq!(placement.x, 0.0);
        assert_eq!(placement.y, 2.0);
        assert_eq!(placement.opacity, 1.0);
    }
}
