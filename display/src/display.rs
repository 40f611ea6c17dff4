//! Display Surfaces
//!
//! A display is an off-screen pixel buffer placed somewhere on the virtual
//! desktop. Its buffer is sized in buffer pixels; on screen every buffer
//! pixel covers `scale x scale` desktop pixels. The solid area, interact
//! area and corner margins are expressed in on-screen (scaled) local
//! coordinates.

use core::fmt;

use crate::buffer::PixelBuffer;
use crate::config::MARGIN_ROWS;
use crate::rect::{extent, Rect};

/// Coarse stacking class. Every display of a higher layer is above every
/// display of a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DisplayLayer {
    Background = 0,
    BottomMost = 32,
    Regular = 64,
    TopMost = 96,
    KernelWindow = 128,
    KernelTopmostWindow = 160,
    Cursor = 192,
    CursorOverlay = 224,
}

impl Default for DisplayLayer {
    fn default() -> Self {
        DisplayLayer::Regular
    }
}

/// A handle to a display in a [`SceneGraph`](crate::SceneGraph).
///
/// Contains both a slot index and a generation counter, so a handle kept
/// after its display was destroyed never reaches a newer display that
/// reused the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl DisplayId {
    /// Raw slot index (for diagnostics only).
    #[inline]
    pub const fn index(self) -> u32 {
        self.idx
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayId({}@gen{})", self.idx, self.generation)
    }
}

/// Identifies the execution context (thread) that owns a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

/// Per-scanline inset for one corner, indexed by distance from the edge.
pub type MarginTable = [u32; MARGIN_ROWS];

/// Corner insets used to approximate rounded corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerMargins {
    pub top_left: MarginTable,
    pub top_right: MarginTable,
    pub bottom_left: MarginTable,
    pub bottom_right: MarginTable,
}

impl CornerMargins {
    /// Square corners.
    pub const NONE: CornerMargins = CornerMargins {
        top_left: [0; MARGIN_ROWS],
        top_right: [0; MARGIN_ROWS],
        bottom_left: [0; MARGIN_ROWS],
        bottom_right: [0; MARGIN_ROWS],
    };

    /// The same table on all four corners.
    pub const fn uniform(table: MarginTable) -> Self {
        Self {
            top_left: table,
            top_right: table,
            bottom_left: table,
            bottom_right: table,
        }
    }

    /// Circular corners of `radius` pixels (at most [`MARGIN_ROWS`]).
    pub fn rounded(radius: u32) -> Self {
        let radius = radius.min(MARGIN_ROWS as u32);
        let r = radius as f64;
        let mut table = [0u32; MARGIN_ROWS];

        for (row, margin) in table.iter_mut().enumerate().take(radius as usize) {
            let dy = r - row as f64 - 0.5;
            let dx = libm::sqrt(r * r - dy * dy);
            *margin = libm::round(r - dx) as u32;
        }

        Self::uniform(table)
    }
}

/// An on-screen surface.
#[derive(Debug)]
pub struct Display {
    /// Handle of this display
    pub(crate) id: DisplayId,
    /// Owning context, destroyed along with it
    pub(crate) owner: Option<OwnerId>,
    /// Stacking class
    pub(crate) layer: DisplayLayer,
    /// Desktop position of the top-left corner
    pub(crate) x: i32,
    pub(crate) y: i32,
    /// Nearest-neighbour upscale factor, at least 1
    pub(crate) scale: u8,
    /// Pixel storage
    pub(crate) buffer: PixelBuffer,
    /// Opaque part, local coordinates
    pub(crate) solid_area: Rect,
    /// Hit-test part, local coordinates
    pub(crate) interact_area: Rect,
    /// Corner insets
    pub(crate) margins: CornerMargins,
    /// Whether the display takes part in compositing
    pub(crate) visible: bool,
}

impl Display {
    pub(crate) fn new(
        id: DisplayId,
        owner: Option<OwnerId>,
        layer: DisplayLayer,
        buffer: PixelBuffer,
        scale: u8,
    ) -> Self {
        let scale = scale.max(1);
        let full = Rect::from_size(
            0,
            0,
            buffer.width() * scale as u32,
            buffer.height() * scale as u32,
        );

        Self {
            id,
            owner,
            layer,
            x: 0,
            y: 0,
            scale,
            buffer,
            solid_area: full,
            interact_area: full,
            margins: CornerMargins::NONE,
            visible: false,
        }
    }

    #[inline]
    pub fn id(&self) -> DisplayId {
        self.id
    }

    #[inline]
    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    #[inline]
    pub fn layer(&self) -> DisplayLayer {
        self.layer
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// On-screen width in desktop pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer.width().saturating_mul(self.scale as u32)
    }

    /// On-screen height in desktop pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer.height().saturating_mul(self.scale as u32)
    }

    #[inline]
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    #[inline]
    pub fn solid_area(&self) -> Rect {
        self.solid_area
    }

    #[inline]
    pub fn interact_area(&self) -> Rect {
        self.interact_area
    }

    #[inline]
    pub fn margins(&self) -> &CornerMargins {
        &self.margins
    }

    /// Full extent in local coordinates.
    #[inline]
    pub fn local_bounds(&self) -> Rect {
        Rect::from_size(0, 0, self.width(), self.height())
    }

    /// Full extent on the desktop.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.x, self.y, self.width(), self.height())
    }

    /// Solid area on the desktop.
    #[inline]
    pub fn screen_solid_area(&self) -> Rect {
        self.solid_area.offset(self.x, self.y)
    }

    /// Pixels excluded at the left end of local row `y`.
    pub fn left_margin(&self, y: i32) -> u32 {
        self.margin(y, &self.margins.top_left, &self.margins.bottom_left)
    }

    /// Pixels excluded at the right end of local row `y`.
    pub fn right_margin(&self, y: i32) -> u32 {
        self.margin(y, &self.margins.top_right, &self.margins.bottom_right)
    }

    fn margin(&self, y: i32, top: &MarginTable, bottom: &MarginTable) -> u32 {
        let height = extent(self.height());
        if y < 0 || y >= height {
            return 0;
        }

        let rows = MARGIN_ROWS as i32;
        let from_bottom = height - 1 - y;
        let margin = if y < rows && y <= from_bottom {
            top[y as usize]
        } else if from_bottom < rows {
            bottom[from_bottom as usize]
        } else {
            0
        };

        margin.min(self.width() / 2)
    }

    /// Desktop x-range `[x1, x2)` this display covers on desktop row
    /// `screen_y`, after corner margins. `None` if hidden or off the row.
    pub fn visible_row_extent(&self, screen_y: i32) -> Option<(i32, i32)> {
        if !self.visible {
            return None;
        }

        let y = screen_y.checked_sub(self.y)?;
        if y < 0 || y >= extent(self.height()) {
            return None;
        }

        let x1 = self.x.saturating_add(extent(self.left_margin(y)));
        let x2 = self
            .x
            .saturating_add(extent(self.width()) - extent(self.right_margin(y)));
        (x1 < x2).then_some((x1, x2))
    }

    /// Whether this display contributes to desktop pixel `(x, y)`.
    pub fn covers(&self, x: i32, y: i32) -> bool {
        self.visible_row_extent(y)
            .is_some_and(|(x1, x2)| x >= x1 && x < x2)
    }

    /// Colour shown at local position `(x, y)` as `0xAARRGGBB`.
    pub fn pixel(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 {
            return 0;
        }
        let scale = self.scale as u32;
        self.buffer
            .get(x as u32 / scale, y as u32 / scale)
            .unwrap_or(0)
    }

    /// Keep the solid and interact areas inside new bounds after a resize.
    pub(crate) fn fit_areas(&mut self, old_bounds: Rect) {
        let bounds = self.local_bounds();

        self.solid_area = if self.solid_area == old_bounds {
            bounds
        } else {
            self.solid_area.intersect(&bounds)
        };
        self.interact_area = if self.interact_area == old_bounds {
            bounds
        } else {
            self.interact_area.intersect(&bounds)
        };
    }
}
