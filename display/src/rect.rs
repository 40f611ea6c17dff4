//! Half-open integer rectangles.

/// Axis-aligned rectangle covering `x1..x2` by `y1..y2`.
///
/// A rectangle with `x2 <= x1` or `y2 <= y1` is empty. Empty results of
/// [`Rect::intersect`] are normalized to [`Rect::EMPTY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// The canonical empty rectangle.
    pub const EMPTY: Rect = Rect::new(0, 0, 0, 0);

    /// Create a rectangle from its edges.
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a rectangle from an origin and a size.
    ///
    /// Edges past the end of the coordinate space are pinned to `i32::MAX`.
    pub const fn from_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x.saturating_add(extent(width)),
            y2: y.saturating_add(extent(height)),
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1).max(0)
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1).max(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Check if rectangle contains a point
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Check if this rectangle fully contains another
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (self.x1 <= other.x1
                && self.y1 <= other.y1
                && self.x2 >= other.x2
                && self.y2 >= other.y2)
    }

    /// Check if this rectangle overlaps another
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Overlapping part of both rectangles.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let rect = Rect {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        };

        if rect.is_empty() {
            Rect::EMPTY
        } else {
            rect
        }
    }

    /// Smallest rectangle covering both. Empty inputs are ignored.
    pub fn include(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }

        Rect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Translate by `(dx, dy)`, saturating at the coordinate limits.
    #[inline]
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
            x2: self.x2.saturating_add(dx),
            y2: self.y2.saturating_add(dy),
        }
    }

    /// Translate into the space of an origin at `(x, y)`.
    #[inline]
    pub fn relative_to(&self, x: i32, y: i32) -> Rect {
        Rect {
            x1: self.x1.saturating_sub(x),
            y1: self.y1.saturating_sub(y),
            x2: self.x2.saturating_sub(x),
            y2: self.y2.saturating_sub(y),
        }
    }
}

/// A pixel count as a coordinate distance, pinned to `i32::MAX`.
#[inline]
pub const fn extent(len: u32) -> i32 {
    if len > i32::MAX as u32 {
        i32::MAX
    } else {
        len as i32
    }
}
