//! Global, per-session settings. Unlike page contents, these are shared by every page.

use crate::color::Rgb;
use crate::geometry::{Axis, Correction, Geometry, DEFAULT_CORRECTION_X, DEFAULT_CORRECTION_Y};

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
pub enum ExportFormat {
    #[default]
    Png,
    Jpg,
}
impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
    #[must_use]
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpg => image::ImageFormat::Jpeg,
        }
    }
}

fn clamped_correction<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = <f64 as serde::Deserialize>::deserialize(deserializer)?;
    Ok(Correction::clamp(value).unwrap_or(1.0))
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // Private, so the clamp cannot be sidestepped.
    #[serde(deserialize_with = "clamped_correction")]
    correction_x: f64,
    #[serde(deserialize_with = "clamped_correction")]
    correction_y: f64,
    pub background_color: Rgb,
    pub mark_color: Rgb,
    pub show_guides: bool,
    pub show_outline: bool,
    pub show_rulers: bool,
    pub export_format: ExportFormat,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            correction_x: DEFAULT_CORRECTION_X,
            correction_y: DEFAULT_CORRECTION_Y,
            background_color: Rgb::WHITE,
            mark_color: Rgb::BLACK,
            show_guides: true,
            show_outline: true,
            show_rulers: true,
            export_format: ExportFormat::default(),
        }
    }
}
impl Settings {
    #[must_use]
    pub fn correction(&self) -> Correction {
        Correction::new(self.correction_x, self.correction_y)
    }
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.correction())
    }
    /// Store a correction factor, clamped. Returns the value stored.
    pub fn set_correction(&mut self, axis: Axis, value: f64) -> f64 {
        let mut correction = self.correction();
        let stored = correction.set(axis, value);
        self.correction_x = correction.get(Axis::X);
        self.correction_y = correction.get(Axis::Y);
        stored
    }
}
