//! # Geometry
//!
//! Three coordinate spaces are in play:
//! * **Paper mm** - physical millimeters on the printed sheet, origin top-left.
//! * **Image mm** - millimeters in the raster sent to the printer. The printer enlarges
//!   its input slightly to print borderless, so anything that must land at a physical
//!   paper location has to be pre-shrunk toward the sheet's center by the correction factor.
//! * **Canvas pixels** - the on-screen editing surface, a fixed scale and offset of image mm.
//!
//! Every derived shape (card subframes, cutting marks, rulers) is a composition of
//! [`Geometry::paper_to_image`] and [`Geometry::image_to_canvas`] over the constants below.

use crate::util::Rect;

pub const PAPER_WIDTH_MM: f64 = 148.0;
pub const PAPER_HEIGHT_MM: f64 = 100.0;
/// ID-1 card, portrait.
pub const CARD_WIDTH_MM: f64 = 54.0;
pub const CARD_HEIGHT_MM: f64 = 85.6;
/// Space between the two cards. The pair is centered on the sheet.
pub const DIVIDER_MM: f64 = 4.0;
pub const MARK_LENGTH_MM: f64 = 3.0;
/// Distance between a card corner and the start of its cutting mark.
pub const MARK_GAP_MM: f64 = 1.0;

/// Display pixels per image millimeter.
pub const PX_PER_MM: f64 = 4.0;
/// Canvas pixel position of image mm (0, 0), on both axes.
pub const ORIGIN_OFFSET_PX: f64 = 40.0;

pub const PRINT_DPI: f64 = 300.0;
pub const MM_PER_IN: f64 = 25.4;

pub const CORRECTION_MIN: f64 = 0.5;
pub const CORRECTION_MAX: f64 = 1.5;
pub const DEFAULT_CORRECTION_X: f64 = 0.96;
pub const DEFAULT_CORRECTION_Y: f64 = 0.97;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
pub enum Axis {
    X,
    Y,
}
impl Axis {
    /// Paper extent along this axis, in mm.
    #[must_use]
    pub fn paper_extent(self) -> f64 {
        match self {
            Self::X => PAPER_WIDTH_MM,
            Self::Y => PAPER_HEIGHT_MM,
        }
    }
}

/// Per-axis zoom compensation. Values are always within [`CORRECTION_MIN`, `CORRECTION_MAX`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Correction {
    x: f64,
    y: f64,
}
impl Correction {
    /// Create from raw values, clamping each into range. Non-finite values fall back to `1.0`.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Self::clamp(x).unwrap_or(1.0),
            y: Self::clamp(y).unwrap_or(1.0),
        }
    }
    /// Clamp a candidate factor into the accepted range. `None` for NaN or infinities.
    #[must_use]
    pub fn clamp(value: f64) -> Option<f64> {
        value
            .is_finite()
            .then(|| value.clamp(CORRECTION_MIN, CORRECTION_MAX))
    }
    #[must_use]
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
    /// Store a new factor for this axis, returning the value actually stored.
    /// Non-finite input leaves the current value untouched.
    pub fn set(&mut self, axis: Axis, value: f64) -> f64 {
        let slot = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        };
        if let Some(clamped) = Self::clamp(value) {
            *slot = clamped;
        }
        *slot
    }
}
impl Default for Correction {
    fn default() -> Self {
        Self {
            x: DEFAULT_CORRECTION_X,
            y: DEFAULT_CORRECTION_Y,
        }
    }
}

/// A line segment in canvas pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub from: [f64; 2],
    pub to: [f64; 2],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickKind {
    /// Every millimeter.
    Minor,
    /// Every 5mm.
    Mid,
    /// Every 10mm, carries a label.
    Major,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RulerTick {
    /// Paper millimeter this tick marks.
    pub paper_mm: u32,
    /// Position along the ruler's axis, in canvas pixels.
    pub position: f64,
    pub kind: TickKind,
}

/// Coordinate transforms under a particular set of correction factors.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Geometry {
    correction: Correction,
}
impl Geometry {
    #[must_use]
    pub fn new(correction: Correction) -> Self {
        Self { correction }
    }
    #[must_use]
    pub fn correction(&self) -> Correction {
        self.correction
    }
    /// See [`Correction::set`].
    pub fn set_correction(&mut self, axis: Axis, value: f64) -> f64 {
        self.correction.set(axis, value)
    }
    /// `(paper - half) * correction + half`, centered on the sheet's midpoint.
    #[must_use]
    pub fn paper_to_image(&self, axis: Axis, paper_mm: f64) -> f64 {
        let half = axis.paper_extent() / 2.0;
        (paper_mm - half) * self.correction.get(axis) + half
    }
    /// Inverse of [`Self::paper_to_image`].
    #[must_use]
    pub fn image_to_paper(&self, axis: Axis, image_mm: f64) -> f64 {
        let half = axis.paper_extent() / 2.0;
        (image_mm - half) / self.correction.get(axis) + half
    }
    #[must_use]
    pub fn image_to_canvas(&self, _axis: Axis, image_mm: f64) -> f64 {
        image_mm * PX_PER_MM + ORIGIN_OFFSET_PX
    }
    #[must_use]
    pub fn canvas_to_image(&self, _axis: Axis, px: f64) -> f64 {
        (px - ORIGIN_OFFSET_PX) / PX_PER_MM
    }
    #[must_use]
    pub fn paper_to_canvas(&self, axis: Axis, paper_mm: f64) -> f64 {
        self.image_to_canvas(axis, self.paper_to_image(axis, paper_mm))
    }
    #[must_use]
    pub fn canvas_to_paper(&self, axis: Axis, px: f64) -> f64 {
        self.image_to_paper(axis, self.canvas_to_image(axis, px))
    }
    fn paper_point(&self, [x, y]: [f64; 2]) -> [f64; 2] {
        [
            self.paper_to_canvas(Axis::X, x),
            self.paper_to_canvas(Axis::Y, y),
        ]
    }
    fn paper_rect(&self, rect: Rect) -> Rect {
        Rect::from_corners(
            self.paper_point([rect.left(), rect.top()]),
            self.paper_point([rect.right(), rect.bottom()]),
        )
    }
    /// Size of the whole editing canvas in pixels, margins included.
    #[must_use]
    pub fn canvas_size(&self) -> [f64; 2] {
        [
            PAPER_WIDTH_MM * PX_PER_MM + 2.0 * ORIGIN_OFFSET_PX,
            PAPER_HEIGHT_MM * PX_PER_MM + 2.0 * ORIGIN_OFFSET_PX,
        ]
    }
    /// The full raster sent to the printer, in canvas pixels. This is the export region.
    #[must_use]
    pub fn image_rect(&self) -> Rect {
        Rect::new(
            ORIGIN_OFFSET_PX,
            ORIGIN_OFFSET_PX,
            PAPER_WIDTH_MM * PX_PER_MM,
            PAPER_HEIGHT_MM * PX_PER_MM,
        )
    }
    /// Where the physical sheet lands after the printer's zoom, in canvas pixels.
    /// New layers are fitted into this frame.
    #[must_use]
    pub fn printable_frame(&self) -> Rect {
        self.paper_rect(Rect::new(0.0, 0.0, PAPER_WIDTH_MM, PAPER_HEIGHT_MM))
    }
    /// Physical card rectangles on the paper, in paper mm. Left card first.
    #[must_use]
    pub fn card_frames_mm() -> [Rect; 2] {
        let left = (PAPER_WIDTH_MM - (2.0 * CARD_WIDTH_MM + DIVIDER_MM)) / 2.0;
        let top = (PAPER_HEIGHT_MM - CARD_HEIGHT_MM) / 2.0;
        [
            Rect::new(left, top, CARD_WIDTH_MM, CARD_HEIGHT_MM),
            Rect::new(
                left + CARD_WIDTH_MM + DIVIDER_MM,
                top,
                CARD_WIDTH_MM,
                CARD_HEIGHT_MM,
            ),
        ]
    }
    /// Card subframes in canvas pixels. Left card first.
    #[must_use]
    pub fn card_frames(&self) -> [Rect; 2] {
        Self::card_frames_mm().map(|card| self.paper_rect(card))
    }
    /// Index into [`Self::card_frames`] of the card whose horizontal center is nearest `x`.
    /// Ties go to the left card.
    #[must_use]
    pub fn nearest_card(&self, x: f64) -> usize {
        let [left, right] = self.card_frames();
        if (right.center_x() - x).abs() < (left.center_x() - x).abs() {
            1
        } else {
            0
        }
    }
    /// Two ticks per card corner, pointing away from the card and starting
    /// [`MARK_GAP_MM`] from the corner.
    #[must_use]
    pub fn cut_marks(&self) -> Vec<Segment> {
        let mut marks = Vec::with_capacity(16);
        for card in Self::card_frames_mm() {
            for (cx, sx) in [(card.left(), -1.0), (card.right(), 1.0)] {
                for (cy, sy) in [(card.top(), -1.0), (card.bottom(), 1.0)] {
                    marks.push(Segment {
                        from: self.paper_point([cx + sx * MARK_GAP_MM, cy]),
                        to: self.paper_point([cx + sx * (MARK_GAP_MM + MARK_LENGTH_MM), cy]),
                    });
                    marks.push(Segment {
                        from: self.paper_point([cx, cy + sy * MARK_GAP_MM]),
                        to: self.paper_point([cx, cy + sy * (MARK_GAP_MM + MARK_LENGTH_MM)]),
                    });
                }
            }
        }
        marks
    }
    /// One tick per whole paper millimeter along `axis`, both ends included.
    #[must_use]
    pub fn ruler_ticks(&self, axis: Axis) -> Vec<RulerTick> {
        // Extents are whole millimeters.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let extent = axis.paper_extent() as u32;
        (0..=extent)
            .map(|mm| RulerTick {
                paper_mm: mm,
                position: self.paper_to_canvas(axis, f64::from(mm)),
                kind: if mm % 10 == 0 {
                    TickKind::Major
                } else if mm % 5 == 0 {
                    TickKind::Mid
                } else {
                    TickKind::Minor
                },
            })
            .collect()
    }
    /// Multiplier from canvas pixels to print raster pixels.
    #[must_use]
    pub fn print_export_scale(&self) -> f64 {
        PRINT_DPI / MM_PER_IN / PX_PER_MM
    }
    #[must_use]
    pub fn layout(&self) -> GuideLayout {
        GuideLayout::compute(self)
    }
}

/// Every guide shape, computed in one go for one set of correction factors.
///
/// Never patch one of these - recompute when either factor changes.
#[derive(Clone, Debug, PartialEq)]
pub struct GuideLayout {
    pub correction: Correction,
    pub image_rect: Rect,
    pub printable_frame: Rect,
    pub cards: [Rect; 2],
    pub cut_marks: Vec<Segment>,
    pub ruler_x: Vec<RulerTick>,
    pub ruler_y: Vec<RulerTick>,
}
impl GuideLayout {
    #[must_use]
    pub fn compute(geometry: &Geometry) -> Self {
        Self {
            correction: geometry.correction(),
            image_rect: geometry.image_rect(),
            printable_frame: geometry.printable_frame(),
            cards: geometry.card_frames(),
            cut_marks: geometry.cut_marks(),
            ruler_x: geometry.ruler_ticks(Axis::X),
            ruler_y: geometry.ruler_ticks(Axis::Y),
        }
    }
    /// Whether this layout is stale for the given geometry.
    #[must_use]
    pub fn is_stale(&self, geometry: &Geometry) -> bool {
        self.correction != geometry.correction()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn clamp_correction() {
        let mut correction = Correction::default();
        assert_eq!(correction.set(Axis::X, 0.1), 0.5);
        assert_eq!(correction.get(Axis::X), 0.5);
        assert_eq!(correction.set(Axis::X, 3.0), 1.5);
        assert_eq!(correction.set(Axis::Y, 0.98), 0.98);
        // Non-finite is ignored, keeping the previous value.
        assert_eq!(correction.set(Axis::Y, f64::NAN), 0.98);
        assert_eq!(Correction::new(f64::INFINITY, 0.0), Correction::new(1.0, 0.5));
    }
    #[test]
    fn center_is_fixed_point() {
        let geometry = Geometry::new(Correction::new(0.9, 0.8));
        assert!(close(geometry.paper_to_image(Axis::X, 74.0), 74.0));
        assert!(close(geometry.paper_to_image(Axis::Y, 50.0), 50.0));
        // Edges are pulled toward the center.
        assert!(close(geometry.paper_to_image(Axis::X, 0.0), 7.4));
        assert!(close(geometry.paper_to_image(Axis::Y, 100.0), 90.0));
    }
    #[test]
    fn inverses() {
        let geometry = Geometry::new(Correction::new(0.93, 1.07));
        for mm in [0.0, 12.5, 74.0, 148.0] {
            let px = geometry.paper_to_canvas(Axis::X, mm);
            assert!(close(geometry.canvas_to_paper(Axis::X, px), mm));
        }
        assert!(close(geometry.image_to_canvas(Axis::Y, 0.0), ORIGIN_OFFSET_PX));
        assert!(close(
            geometry.image_to_canvas(Axis::Y, 10.0),
            ORIGIN_OFFSET_PX + 10.0 * PX_PER_MM
        ));
    }
    #[test]
    fn cards_symmetric_about_center() {
        let geometry = Geometry::new(Correction::new(0.95, 0.95));
        let [left, right] = geometry.card_frames();
        let center = geometry.paper_to_canvas(Axis::X, PAPER_WIDTH_MM / 2.0);
        assert!(close(center - left.left(), right.right() - center));
        assert!(close(left.top(), right.top()));
        assert!(left.right() < right.left());
        assert_eq!(geometry.nearest_card(left.center_x() + 1.0), 0);
        assert_eq!(geometry.nearest_card(right.center_x() - 1.0), 1);
    }
    #[test]
    fn marks_and_rulers() {
        let geometry = Geometry::default();
        let marks = geometry.cut_marks();
        assert_eq!(marks.len(), 16);
        let ruler = geometry.ruler_ticks(Axis::X);
        assert_eq!(ruler.len(), 149);
        assert_eq!(ruler[0].kind, TickKind::Major);
        assert_eq!(ruler[5].kind, TickKind::Mid);
        assert_eq!(ruler[7].kind, TickKind::Minor);
        assert_eq!(geometry.ruler_ticks(Axis::Y).len(), 101);
    }
    #[test]
    fn layout_recomputed_on_correction_change() {
        let mut geometry = Geometry::default();
        let before = geometry.layout();
        geometry.set_correction(Axis::X, 1.2);
        assert!(before.is_stale(&geometry));
        let after = geometry.layout();
        assert!(!after.is_stale(&geometry));
        assert_ne!(before.cards, after.cards);
        assert_ne!(before.ruler_x, after.ruler_x);
        // The Y axis did not change.
        assert_eq!(before.ruler_y, after.ruler_y);
        // Export region does not depend on correction.
        assert_eq!(before.image_rect, after.image_rect);
    }
    #[test]
    fn export_scale_is_300_dpi() {
        let geometry = Geometry::default();
        let px = geometry.image_rect().width * geometry.print_export_scale();
        // 148mm at 300dpi.
        assert!((px - 1748.03).abs() < 0.01);
    }
}
