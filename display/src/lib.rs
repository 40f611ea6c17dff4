//! KPIO Display Compositor
//!
//! This crate owns every on-screen surface ("display") of the kernel and keeps
//! the physical framebuffers pixel-accurate as those surfaces move, resize,
//! change stacking order, show, hide, or have their pixels redrawn.
//!
//! # Architecture
//!
//! The compositor is organized into:
//!
//! - `rect`: Half-open integer rectangles
//! - `format`: Framebuffer pixel formats and channel orders
//! - `buffer`: Owned display pixel storage and read-only screen views
//! - `framebuffer`: Registered framebuffers, tiling and hot-plug state
//! - `display`: The display (window surface) record and its corner margins
//! - `scene`: Z-ordered display list used for painting and hit-testing
//! - `background`: Procedural desktop background and its fill pass
//! - `solid`: Occlusion-aware blit of each display's opaque area
//! - `blend`: Per-pixel blending for everything that is not opaque
//! - `damage`: Coalesced repaint tracking for deferred updates
//! - `compositor`: The public API tying the passes together
//! - `shared`: Lock wrapper for sharing one compositor across the kernel
//!
//! # Painting model
//!
//! Every screen pixel is written by exactly one of three passes. The
//! background pass fills pixels no display covers. The solid pass copies a
//! display's opaque area wherever no display above it covers the pixel. The
//! blend pass resolves the rest by walking the stack downward from the
//! topmost display at that pixel and accumulating alpha-weighted colour.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod background;
pub mod blend;
pub mod buffer;
pub mod compositor;
pub mod config;
pub mod damage;
pub mod display;
pub mod format;
pub mod framebuffer;
pub mod rect;
pub mod scene;
pub mod shared;
pub mod solid;
mod span;

use core::fmt;

pub use background::{Background, BackgroundStyle};
pub use buffer::{PixelBuffer, ScreenRegion};
pub use compositor::{Compositor, CompositorConfig, CompositorEvent, CompositorStats, Deferred};
pub use damage::{DamageTracker, RepaintPasses};
pub use display::{CornerMargins, Display, DisplayId, DisplayLayer, MarginTable, OwnerId};
pub use format::{BufferFormat, ChannelLayout, ChannelOrder};
pub use framebuffer::{DriverId, Framebuffer, FramebufferDescriptor, FramebufferRegistry};
pub use rect::Rect;
pub use scene::SceneGraph;
pub use shared::SharedCompositor;

/// Display subsystem error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// No framebuffer is registered (or every one is mid mode-change).
    NoFramebuffer,
    /// Pixel storage could not be allocated.
    OutOfMemory,
    /// A framebuffer descriptor was rejected at registration.
    InvalidFramebuffer,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::NoFramebuffer => write!(f, "no framebuffer available"),
            DisplayError::OutOfMemory => write!(f, "out of memory for display buffer"),
            DisplayError::InvalidFramebuffer => write!(f, "invalid framebuffer descriptor"),
        }
    }
}
