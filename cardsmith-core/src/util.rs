//! Utility types, used throughout the crate.

/// An axis-aligned rectangle. The space it lives in (paper mm, canvas pixels...)
/// is up to whoever made it.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}
impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
    /// Build from two corners, in any order.
    #[must_use]
    pub fn from_corners(a: [f64; 2], b: [f64; 2]) -> Self {
        let min_x = a[0].min(b[0]);
        let min_y = a[1].min(b[1]);
        Self {
            x: min_x,
            y: min_y,
            width: a[0].max(b[0]) - min_x,
            height: a[1].max(b[1]) - min_y,
        }
    }
    /// A rect of the given size with its center at `center`.
    #[must_use]
    pub fn centered(center: [f64; 2], width: f64, height: f64) -> Self {
        Self {
            x: center[0] - width / 2.0,
            y: center[1] - height / 2.0,
            width,
            height,
        }
    }
    #[must_use]
    pub fn left(&self) -> f64 {
        self.x
    }
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
    #[must_use]
    pub fn top(&self) -> f64 {
        self.y
    }
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }
    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
    #[must_use]
    pub fn center(&self) -> [f64; 2] {
        [self.center_x(), self.center_y()]
    }
    /// Smallest rect containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::from_corners(
            [self.left().min(other.left()), self.top().min(other.top())],
            [
                self.right().max(other.right()),
                self.bottom().max(other.bottom()),
            ],
        )
    }
}

/// Replace non-finite values with `fallback`. Persisted and user-provided numbers
/// pass through here before they reach the store.
#[must_use]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
