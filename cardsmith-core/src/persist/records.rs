//! # Records
//!
//! The plain, serde-friendly shape of a page. Autosave, history snapshots and project
//! archives all share these, so a layer written by one can be read by any other.
//!
//! Every field other than the layer's `type` tag has a default, documented on the field, and
//! a record missing it still loads. Layers that cannot be parsed at all are dropped from the
//! page with a warning rather than failing the whole page.

use crate::color::Rgb;
use crate::payload::{decode_data_url, is_data_url, PayloadSource};
use crate::state::group::{Group, GroupId};
use crate::state::layer::{
    Adjustments, DecodeError, FontStyle, FontWeight, ImageSource, Layer, LayerKind, Placement,
    TextAlign, TextData, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE,
};

fn one() -> f64 {
    1.0
}
fn yes() -> bool {
    true
}
fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_owned()
}
fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}
fn default_fill() -> Rgb {
    Rgb::BLACK
}
/// A fill that is not a hex color costs the color, not the whole layer.
fn fill_or_default<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Rgb, D::Error> {
    let text = <Option<String> as serde::Deserialize>::deserialize(deserializer)?;
    let fill = text.and_then(|text| match text.parse() {
        Ok(fill) => Some(fill),
        Err(e) => {
            log::warn!("unreadable text fill {text:?}, using the default: {e}");
            None
        }
    });
    Ok(fill.unwrap_or_else(default_fill))
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Where the bytes live: a payload key, an archive entry path, or an inline `data:` url.
    pub src: String,
    /// Default: empty.
    #[serde(default)]
    pub file_name: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    /// Default: empty.
    #[serde(default)]
    pub text: String,
    /// Default: `sans-serif`.
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Default: 32.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Default: black, also used in place of anything that is not a hex color.
    #[serde(default = "default_fill", deserialize_with = "fill_or_default")]
    pub fill: Rgb,
    /// Default: normal.
    #[serde(default)]
    pub font_weight: FontWeight,
    /// Default: normal.
    #[serde(default)]
    pub font_style: FontStyle,
    /// Default: center.
    #[serde(default)]
    pub text_align: TextAlign,
    /// Default: sized to fit the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerKindRecord {
    Image(ImageRecord),
    Text(TextRecord),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRecord {
    #[serde(flatten)]
    pub kind: LayerKindRecord,
    /// Default: the file name for images, the first line of text for text layers.
    #[serde(default)]
    pub name: String,
    /// Center x in canvas pixels. Default: 0.
    #[serde(default)]
    pub left: f64,
    /// Center y in canvas pixels. Default: 0.
    #[serde(default)]
    pub top: f64,
    /// Default: 1.
    #[serde(default = "one")]
    pub scale_x: f64,
    /// Default: 1.
    #[serde(default = "one")]
    pub scale_y: f64,
    /// Degrees. Default: 0.
    #[serde(default)]
    pub angle: f64,
    /// Default: false.
    #[serde(default)]
    pub flip_x: bool,
    /// Default: false.
    #[serde(default)]
    pub flip_y: bool,
    /// Default: 1.
    #[serde(default = "one")]
    pub opacity: f64,
    /// Default: true.
    #[serde(default = "yes")]
    pub visible: bool,
    /// Default: false.
    #[serde(default)]
    pub locked: bool,
    /// Default: ungrouped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Default: neutral.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Adjustments>,
}
impl LayerRecord {
    /// The payload reference of an image record.
    #[must_use]
    pub fn image_src(&self) -> Option<&str> {
        match &self.kind {
            LayerKindRecord::Image(image) => Some(&image.src),
            LayerKindRecord::Text(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: GroupId,
    /// Default: empty.
    #[serde(default)]
    pub name: String,
    /// Default: true.
    #[serde(default = "yes")]
    pub visible: bool,
    /// Remembered position of an empty group. Default: none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}
impl From<&Group> for GroupRecord {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id(),
            name: group.name.clone(),
            visible: group.visible,
            position: group.position_hint(),
        }
    }
}
impl From<&GroupRecord> for Group {
    fn from(record: &GroupRecord) -> Self {
        let mut group = Group::new(record.id, record.name.clone());
        group.visible = record.visible;
        group.position_hint = record.position;
        group
    }
}

/// One page: its layers front to back, its groups and counters.
#[derive(Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Index 0 is the front-most layer. Default: empty.
    #[serde(default, deserialize_with = "lenient_layers")]
    pub images: Vec<LayerRecord>,
    /// Default: empty.
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    /// Default: 0.
    #[serde(default)]
    pub group_counter: u32,
    /// Default: 0.
    #[serde(default)]
    pub text_counter: u32,
    /// Page override of the global background color. Default: none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Rgb>,
    /// Page override of the global cutting mark color. Default: none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark_color: Option<Rgb>,
}

/// Parse a layer list, dropping the entries that do not parse instead of failing.
pub(crate) fn lenient_layers<'de, D>(deserializer: D) -> Result<Vec<LayerRecord>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <Vec<serde_json::Value> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("dropping unreadable layer record {index}: {err}");
                None
            }
        })
        .collect())
}

#[derive(thiserror::Error, Debug)]
pub enum MaterializeError {
    #[error("image data {0:?} not found")]
    MissingPayload(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Plain record of a layer. Image bytes are referenced by content key.
#[must_use]
pub fn serialize_layer(layer: &Layer) -> LayerRecord {
    let kind = match &layer.kind {
        LayerKind::Image(image) => LayerKindRecord::Image(ImageRecord {
            src: image.key().to_string(),
            file_name: image.file_name().to_owned(),
        }),
        LayerKind::Text(text) => LayerKindRecord::Text(TextRecord {
            text: text.content.clone(),
            font_family: text.font_family.clone(),
            font_size: text.font_size,
            fill: text.fill,
            font_weight: text.weight,
            font_style: text.style,
            text_align: text.align,
            width: Some(text.width),
        }),
    };
    let placement = &layer.placement;
    LayerRecord {
        kind,
        name: layer.name.clone(),
        left: placement.x,
        top: placement.y,
        scale_x: placement.scale_x,
        scale_y: placement.scale_y,
        angle: placement.rotation,
        flip_x: placement.flip_x,
        flip_y: placement.flip_y,
        opacity: placement.opacity,
        visible: layer.visible,
        locked: layer.locked,
        group_id: layer.group(),
        filters: layer.adjustments,
    }
}

/// Rebuild a layer from its record, with a fresh id. Image references are resolved through
/// `payloads` unless they are inline `data:` urls.
pub fn materialize_layer(
    record: &LayerRecord,
    payloads: &impl PayloadSource,
) -> Result<Layer, MaterializeError> {
    let kind = match &record.kind {
        LayerKindRecord::Image(image) => {
            let bytes = if is_data_url(&image.src) {
                decode_data_url(&image.src)
                    .map_err(DecodeError::from)?
                    .into()
            } else {
                payloads
                    .payload(&image.src)
                    .ok_or_else(|| MaterializeError::MissingPayload(image.src.clone()))?
            };
            LayerKind::Image(ImageSource::decode(bytes, &image.file_name)?)
        }
        LayerKindRecord::Text(text) => {
            let font_size = if text.font_size.is_finite() && text.font_size > 0.0 {
                text.font_size
            } else {
                DEFAULT_FONT_SIZE
            };
            let width = match text.width {
                Some(width) if width.is_finite() && width > 0.0 => width,
                _ => TextData::fit_width(&text.text, font_size),
            };
            LayerKind::Text(TextData {
                content: text.text.clone(),
                font_family: text.font_family.clone(),
                font_size,
                fill: text.fill,
                weight: text.font_weight,
                style: text.font_style,
                align: text.text_align,
                width,
            })
        }
    };
    let name = if record.name.is_empty() {
        match &kind {
            LayerKind::Image(image) => image.file_name().to_owned(),
            LayerKind::Text(text) => text.label().unwrap_or_default(),
        }
    } else {
        record.name.clone()
    };
    let placement = Placement {
        x: record.left,
        y: record.top,
        scale_x: record.scale_x,
        scale_y: record.scale_y,
        rotation: record.angle,
        flip_x: record.flip_x,
        flip_y: record.flip_y,
        opacity: record.opacity,
    };
    let mut layer = Layer::new(name, placement, kind);
    layer.visible = record.visible;
    layer.locked = record.locked;
    layer.group = record.group_id;
    layer.adjustments = record
        .filters
        .map(Adjustments::sanitized)
        .filter(|adjustments| !adjustments.is_neutral());
    Ok(layer)
}
