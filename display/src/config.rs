//! Compositor configuration constants.
//!
//! Compile-time limits and pattern parameters. Runtime settings live in
//! [`CompositorConfig`](crate::compositor::CompositorConfig).

/// Number of scanlines at the top and bottom of a display covered by its
/// corner margin tables.
pub const MARGIN_ROWS: usize = 16;

/// Smallest width or height a display is allowed to have.
pub const DEFAULT_MIN_DISPLAY_SIZE: u32 = 16;

/// Largest nearest-neighbour upscale factor.
pub const DEFAULT_MAX_SCALE: u8 = 4;

/// Pixels blended into a stack buffer before being flushed to the framebuffer.
pub const BLEND_CHUNK_PIXELS: usize = 256;

/// Damage rectangles tracked before a deferred repaint falls back to the
/// whole desktop.
pub const MAX_DAMAGE_RECTS: usize = 32;

/// Size of one background grid cell in pixels.
pub const GRID_CELL: i32 = 30;

/// Width of the darkened band at the left and right desktop edges of the
/// grid background.
pub const GRID_EDGE: i32 = 64;

/// Entries in the background strip gradient table.
pub const STRIP_ENTRIES: usize = 256;
