//! Display Compositor
//!
//! Owns the scene graph, the registered framebuffers and the background,
//! and keeps framebuffer memory in sync with every change made to a
//! display. Each mutation repaints only the area it affects, through the
//! background, solid and blend passes. Inside a [`Deferred`] scope the
//! repaints are collected instead and run once when the scope ends.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use crate::background::{paint_background_area, Background, BackgroundStyle};
use crate::blend::paint_area_transparency;
use crate::buffer::{PixelBuffer, ScreenRegion};
use crate::config::{DEFAULT_MAX_SCALE, DEFAULT_MIN_DISPLAY_SIZE};
use crate::damage::{DamageTracker, RepaintPasses};
use crate::display::{CornerMargins, Display, DisplayId, DisplayLayer, OwnerId};
use crate::framebuffer::{DriverId, FramebufferDescriptor, FramebufferRegistry};
use crate::rect::{extent, Rect};
use crate::scene::SceneGraph;
use crate::solid::paint_display_solid;
use crate::DisplayError;

/// Compositor configuration
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Background pattern
    pub background: BackgroundStyle,
    /// Main background colour (`0xRRGGBB`)
    pub background_colour: u32,
    /// Alternate grid colour (`0xRRGGBB`)
    pub background_colour2: u32,
    /// Gradient colour at the top of the desktop
    pub strip_top: u32,
    /// Gradient colour at the bottom of the desktop
    pub strip_bottom: u32,
    /// Smallest display width and height
    pub min_display_size: u32,
    /// Largest display scale factor
    pub max_scale: u8,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            background: BackgroundStyle::Strip,
            background_colour: 0x202020,
            background_colour2: 0x282828,
            strip_top: 0x3c92b3,
            strip_bottom: 0x173045,
            min_display_size: DEFAULT_MIN_DISPLAY_SIZE,
            max_scale: DEFAULT_MAX_SCALE,
        }
    }
}

/// Notifications for the window manager layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorEvent {
    /// Framebuffers were added, removed or changed mode.
    FramebuffersChanged,
}

/// Pixels written to framebuffer memory, per pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub background_pixels: u64,
    pub solid_pixels: u64,
    pub blended_pixels: u64,
    /// Deferred scopes that ended with pending damage
    pub deferred_flushes: u64,
}

impl CompositorStats {
    /// Total framebuffer pixel writes
    pub fn pixels_written(&self) -> u64 {
        self.background_pixels + self.solid_pixels + self.blended_pixels
    }
}

/// The display compositor
pub struct Compositor {
    /// Configuration
    config: CompositorConfig,
    /// Displays in stacking order
    scene: SceneGraph,
    /// Output framebuffers
    framebuffers: FramebufferRegistry,
    /// Desktop background
    background: Background,
    /// Repaints collected while deferred
    damage: DamageTracker,
    /// Number of live [`Deferred`] guards
    defer_depth: u32,
    /// Pending notifications
    events: Vec<CompositorEvent>,
    /// Write statistics
    stats: CompositorStats,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl Compositor {
    /// Create a compositor with no framebuffers and no displays
    pub fn new(config: CompositorConfig) -> Self {
        let background = Background::new(
            config.background,
            config.background_colour,
            config.background_colour2,
            config.strip_top,
            config.strip_bottom,
        );

        Self {
            config,
            scene: SceneGraph::new(),
            framebuffers: FramebufferRegistry::new(),
            background,
            damage: DamageTracker::default(),
            defer_depth: 0,
            events: Vec::new(),
            stats: CompositorStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    #[inline]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    #[inline]
    pub fn framebuffers(&self) -> &FramebufferRegistry {
        &self.framebuffers
    }

    #[inline]
    pub fn damage(&self) -> &DamageTracker {
        &self.damage
    }

    #[inline]
    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CompositorStats::default();
    }

    /// Take all pending notifications.
    pub fn drain_events(&mut self) -> Vec<CompositorEvent> {
        core::mem::take(&mut self.events)
    }

    // ----- Framebuffers -----

    /// A graphics driver started and reports its framebuffers.
    pub fn register_driver(
        &mut self,
        driver: DriverId,
        descriptors: Vec<FramebufferDescriptor>,
    ) -> Result<(), DisplayError> {
        self.framebuffers.add_driver(driver, descriptors)?;
        self.retile();
        self.events.push(CompositorEvent::FramebuffersChanged);
        Ok(())
    }

    /// A graphics driver stopped. Returns `false` if it had nothing registered.
    pub fn unregister_driver(&mut self, driver: DriverId) -> bool {
        if !self.framebuffers.remove_driver(driver) {
            return false;
        }

        log::info!("[KPIO Display] Driver {} removed", driver.0);
        self.retile();
        self.events.push(CompositorEvent::FramebuffersChanged);
        true
    }

    /// The driver is about to change mode. The framebuffer is left alone
    /// until [`framebuffer_changed`](Self::framebuffer_changed).
    pub fn framebuffer_changing(&mut self, driver: DriverId, index: u32) -> bool {
        if !self.framebuffers.invalidate(driver, index) {
            return false;
        }

        log::debug!("[KPIO Display] Framebuffer {}:{} changing", driver.0, index);
        self.events.push(CompositorEvent::FramebuffersChanged);
        true
    }

    /// The driver finished a mode change and supplies new memory.
    pub fn framebuffer_changed(
        &mut self,
        driver: DriverId,
        index: u32,
        descriptor: FramebufferDescriptor,
    ) -> Result<bool, DisplayError> {
        if !self.framebuffers.revalidate(driver, index, descriptor)? {
            return Ok(false);
        }

        log::debug!("[KPIO Display] Framebuffer {}:{} changed", driver.0, index);
        self.retile();
        self.events.push(CompositorEvent::FramebuffersChanged);
        Ok(true)
    }

    /// Re-lay the framebuffers and repaint what moved.
    fn retile(&mut self) {
        let old_total = self.framebuffers.total_area();
        let changed = self.framebuffers.retile();
        let total = self.framebuffers.total_area();
        self.damage.set_bounds(total);

        if total != old_total {
            log::info!(
                "[KPIO Display] Desktop is now {}x{}",
                total.width(),
                total.height()
            );
            // Strip and grid backgrounds depend on the desktop size.
            self.update_screen_area(total, None);
            return;
        }

        for area in changed {
            self.update_screen_area(area, None);
        }
    }

    /// Number of registered framebuffers.
    #[inline]
    pub fn screen_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Desktop placement of a framebuffer.
    pub fn screen_area(&self, framebuffer: usize) -> Option<Rect> {
        self.framebuffers.get(framebuffer).map(|fb| fb.area())
    }

    /// Combined area of all framebuffers.
    #[inline]
    pub fn total_area(&self) -> Rect {
        self.framebuffers.total_area()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.total_area().width() as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.total_area().height() as u32
    }

    /// Read-only view of desktop rectangle `rect` on one framebuffer.
    ///
    /// `None` if the framebuffer does not exist, is changing mode, or does
    /// not overlap `rect`.
    pub fn get_screen_buffer(&self, framebuffer: usize, rect: Rect) -> Option<ScreenRegion<'_>> {
        let fb = self.framebuffers.get(framebuffer)?;
        let area = fb.area();
        let local = rect.intersect(&area).relative_to(area.x1, area.y1);
        if local.is_empty() {
            return None;
        }
        fb.region(local)
    }

    // ----- Displays -----

    /// Allocate a display of `width x height` buffer pixels.
    ///
    /// The display is centred on the first framebuffer and starts hidden;
    /// draw into it and call [`show`](Self::show).
    pub fn create_display(
        &mut self,
        owner: Option<OwnerId>,
        layer: DisplayLayer,
        width: u32,
        height: u32,
        scale: u8,
    ) -> Result<DisplayId, DisplayError> {
        let (format, order, screen) = self
            .framebuffers
            .primary()
            .ok_or(DisplayError::NoFramebuffer)?;

        let width = width.max(self.config.min_display_size);
        let height = height.max(self.config.min_display_size);
        let scale = scale.clamp(1, self.config.max_scale.max(1));

        let buffer = PixelBuffer::try_new(width, height, format, order).map_err(|err| {
            log::warn!(
                "[KPIO Display] Cannot allocate {}x{} display",
                width,
                height
            );
            err
        })?;

        let (w, h) = (
            extent(width.saturating_mul(scale as u32)),
            extent(height.saturating_mul(scale as u32)),
        );
        let x = screen.x1 + (screen.width() - w) / 2;
        let y = screen.y1 + ((screen.height() - h) / 2).max(0);

        let id = self.scene.insert_with(|id| {
            let mut display = Display::new(id, owner, layer, buffer, scale);
            display.x = x;
            display.y = y;
            display
        });

        log::debug!(
            "[KPIO Display] Created {:?} {}x{} x{} on {:?}",
            id,
            width,
            height,
            scale,
            layer
        );
        Ok(id)
    }

    /// Remove a display and repaint what it covered.
    pub fn destroy_display(&mut self, id: DisplayId) -> bool {
        let Some(display) = self.scene.remove(id) else {
            return false;
        };

        log::debug!("[KPIO Display] Destroyed {:?}", id);
        if display.visible {
            self.update_screen_area(display.bounds(), None);
        }
        true
    }

    /// Destroy every display belonging to a terminated owner. Returns the
    /// number destroyed.
    pub fn on_owner_terminated(&mut self, owner: OwnerId) -> usize {
        let ids = self.scene.owned_by(owner);
        if ids.is_empty() {
            return 0;
        }

        log::debug!(
            "[KPIO Display] Owner {} terminated, destroying {} displays",
            owner.0,
            ids.len()
        );

        let mut compositor = self.defer();
        let destroyed = ids.into_iter().filter(|&id| compositor.destroy_display(id)).count();
        destroyed
    }

    #[inline]
    pub fn contains(&self, id: DisplayId) -> bool {
        self.scene.contains(id)
    }

    pub fn display(&self, id: DisplayId) -> Option<&Display> {
        self.scene.get(id)
    }

    /// Pixel storage of a display. Call [`update_area`](Self::update_area)
    /// after drawing.
    pub fn buffer_mut(&mut self, id: DisplayId) -> Option<&mut PixelBuffer> {
        self.scene.get_mut(id).map(Display::buffer_mut)
    }

    /// Move a display's top-left corner to desktop `(x, y)`.
    pub fn move_to(&mut self, id: DisplayId, x: i32, y: i32, update: bool) {
        let Some(display) = self.scene.get_mut(id) else {
            return;
        };
        if display.x == x && display.y == y {
            return;
        }

        let old = display.bounds();
        display.x = x;
        display.y = y;
        let (new, local, visible) = (display.bounds(), display.local_bounds(), display.visible);

        if update && visible {
            self.repaint_display_solid(id, local);
            self.repaint_area_solid(old, Some(id));
            self.repaint_transparency(old.include(&new));
        }
    }

    /// Give a display a new buffer of `width x height` buffer pixels.
    ///
    /// The old content is dropped; the caller redraws. Solid and interact
    /// areas that spanned the whole display keep doing so.
    pub fn resize_to(
        &mut self,
        id: DisplayId,
        width: u32,
        height: u32,
        update: bool,
    ) -> Result<(), DisplayError> {
        let width = width.max(self.config.min_display_size);
        let height = height.max(self.config.min_display_size);

        let Some(display) = self.scene.get_mut(id) else {
            return Ok(());
        };
        if display.buffer.width() == width && display.buffer.height() == height {
            return Ok(());
        }

        let (format, order) = (display.buffer.format(), display.buffer.order());
        let buffer = PixelBuffer::try_new(width, height, format, order).map_err(|err| {
            log::warn!(
                "[KPIO Display] Cannot resize {:?} to {}x{}",
                id,
                width,
                height
            );
            err
        })?;

        let (old, old_local) = (display.bounds(), display.local_bounds());
        display.buffer = buffer;
        display.fit_areas(old_local);
        let (new, local, visible) = (display.bounds(), display.local_bounds(), display.visible);

        if update && visible {
            self.repaint_display_solid(id, local);
            self.repaint_area_solid(old, Some(id));
            self.repaint_transparency(old.include(&new));
        }
        Ok(())
    }

    /// Whether the display is the topmost of its layer.
    pub fn is_top(&self, id: DisplayId) -> bool {
        self.scene.is_top(id)
    }

    /// Bring a display to the top of its layer.
    pub fn raise(&mut self, id: DisplayId) {
        if !self.scene.raise(id) {
            return;
        }
        self.repaint_display(id);
    }

    /// Stack `id` directly above `other`, moving it into `other`'s layer.
    pub fn place_above(&mut self, id: DisplayId, other: DisplayId) {
        if self.scene.place_above(id, other) {
            self.repaint_bounds(id);
        }
    }

    /// Stack `id` directly below `other`, moving it into `other`'s layer.
    pub fn place_below(&mut self, id: DisplayId, other: DisplayId) {
        if self.scene.place_below(id, other) {
            self.repaint_bounds(id);
        }
    }

    /// Move a display into another layer, below the displays already there.
    pub fn set_layer(&mut self, id: DisplayId, layer: DisplayLayer) {
        match self.scene.get(id) {
            Some(display) if display.layer != layer => {}
            _ => return,
        }

        self.scene.set_layer(id, layer);
        log::debug!("[KPIO Display] {:?} moved to {:?}", id, layer);
        self.repaint_bounds(id);
    }

    /// Make a display visible and paint it.
    pub fn show(&mut self, id: DisplayId) {
        match self.scene.get_mut(id) {
            Some(display) if !display.visible => display.visible = true,
            _ => return,
        }
        self.repaint_display(id);
    }

    /// Hide a display and repaint what was beneath it.
    pub fn hide(&mut self, id: DisplayId) {
        let bounds = match self.scene.get_mut(id) {
            Some(display) if display.visible => {
                display.visible = false;
                display.bounds()
            }
            _ => return,
        };

        self.update_screen_area(bounds, Some(id));
    }

    /// Repaint a whole display after drawing into it.
    pub fn update(&mut self, id: DisplayId) {
        self.repaint_display(id);
    }

    /// Repaint local rectangle `rect` of a display after drawing into it.
    pub fn update_area(&mut self, id: DisplayId, rect: Rect) {
        let Some(display) = self.scene.get(id) else {
            return;
        };
        if !display.visible {
            return;
        }

        let local = rect.intersect(&display.local_bounds());
        let screen = local.offset(display.x, display.y);
        self.repaint_display_solid(id, local);
        self.repaint_transparency(screen);
    }

    /// Repaint desktop rectangle `rect` from scratch. With `below`, only
    /// displays under that one have their solid pixels rewritten.
    pub fn update_screen_area(&mut self, rect: Rect, below: Option<DisplayId>) {
        self.repaint_area_solid(rect, below);
        self.repaint_transparency(rect);
    }

    /// Change the opaque part of a display (local coordinates).
    pub fn set_solid_area(&mut self, id: DisplayId, rect: Rect) {
        let Some(display) = self.scene.get_mut(id) else {
            return;
        };
        let rect = rect.intersect(&display.local_bounds());
        if display.solid_area == rect {
            return;
        }
        display.solid_area = rect;
        self.repaint_bounds(id);
    }

    /// Change the hit-test part of a display (local coordinates).
    pub fn set_interact_area(&mut self, id: DisplayId, rect: Rect) {
        if let Some(display) = self.scene.get_mut(id) {
            display.interact_area = rect.intersect(&display.local_bounds());
        }
    }

    /// Change the corner insets of a display.
    pub fn set_corner_margins(&mut self, id: DisplayId, margins: CornerMargins) {
        let Some(display) = self.scene.get_mut(id) else {
            return;
        };
        if display.margins == margins {
            return;
        }
        display.margins = margins;
        self.repaint_bounds(id);
    }

    /// Topmost visible display hit at desktop `(x, y)`, see
    /// [`SceneGraph::display_at`].
    pub fn get_display_at(
        &self,
        x: i32,
        y: i32,
        include_non_interactive: bool,
        below: Option<DisplayId>,
    ) -> Option<DisplayId> {
        self.scene.display_at(x, y, include_non_interactive, below)
    }

    // ----- Background -----

    pub fn set_background_colour(&mut self, colour: u32) {
        if self.background.set_colour(colour) {
            self.update_background();
        }
    }

    pub fn set_background_style(&mut self, style: BackgroundStyle) {
        if self.background.set_style(style) {
            self.update_background();
        }
    }

    /// Repaint the background across the desktop.
    pub fn update_background(&mut self) {
        self.update_background_area(self.total_area());
    }

    /// Repaint the background in `rect`, along with everything blended
    /// against it.
    pub fn update_background_area(&mut self, rect: Rect) {
        if self.defer_depth > 0 {
            self.damage.add_damage(rect, RepaintPasses::BACKGROUND | RepaintPasses::BLEND);
            return;
        }

        log::trace!("[KPIO Display] Background {:?}", rect);
        self.stats.background_pixels +=
            paint_background_area(&self.scene, &mut self.framebuffers, &self.background, rect);
        self.stats.blended_pixels +=
            paint_area_transparency(&self.scene, &mut self.framebuffers, &self.background, rect);
    }

    // ----- Deferral -----

    /// Collect repaints until the returned guard (and any nested one) is
    /// dropped.
    pub fn defer(&mut self) -> Deferred<'_> {
        self.defer_depth += 1;
        Deferred { compositor: self }
    }

    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.defer_depth > 0
    }

    fn flush_damage(&mut self) {
        if !self.damage.has_damage() {
            return;
        }

        self.stats.deferred_flushes += 1;
        for (rect, passes) in self.damage.take() {
            log::trace!("[KPIO Display] Deferred repaint {:?} {:?}", rect, passes);

            if passes.contains(RepaintPasses::BACKGROUND) {
                self.stats.background_pixels += paint_background_area(
                    &self.scene,
                    &mut self.framebuffers,
                    &self.background,
                    rect,
                );
            }
            if passes.contains(RepaintPasses::SOLID) {
                for pos in 0..self.scene.len() {
                    self.stats.solid_pixels +=
                        paint_at(&self.scene, &mut self.framebuffers, pos, rect);
                }
            }
            if passes.contains(RepaintPasses::BLEND) {
                self.stats.blended_pixels += paint_area_transparency(
                    &self.scene,
                    &mut self.framebuffers,
                    &self.background,
                    rect,
                );
            }
        }
    }

    // ----- Repaint plumbing -----

    /// Solid pixels of the whole display, then the blend pass over it.
    fn repaint_display(&mut self, id: DisplayId) {
        let Some(display) = self.scene.get(id) else {
            return;
        };
        if !display.visible {
            return;
        }

        let (local, bounds) = (display.local_bounds(), display.bounds());
        self.repaint_display_solid(id, local);
        self.repaint_transparency(bounds);
    }

    /// Full repaint of a visible display's bounds.
    fn repaint_bounds(&mut self, id: DisplayId) {
        if let Some(bounds) = self.scene.get(id).filter(|d| d.visible).map(Display::bounds) {
            self.update_screen_area(bounds, None);
        }
    }

    fn repaint_display_solid(&mut self, id: DisplayId, local: Rect) {
        let Some(display) = self.scene.get(id) else {
            return;
        };

        if self.defer_depth > 0 {
            let screen = local.intersect(&display.solid_area).offset(display.x, display.y);
            self.damage.add_damage(screen, RepaintPasses::SOLID);
            return;
        }

        let Some(pos) = self.scene.position(id) else {
            return;
        };
        log::trace!("[KPIO Display] Solid {:?} {:?}", id, local);
        self.stats.solid_pixels +=
            paint_display_solid(&self.scene, &mut self.framebuffers, pos, local);
    }

    /// Background and solid passes over a desktop rectangle, for displays
    /// below `below` (or all of them).
    fn repaint_area_solid(&mut self, rect: Rect, below: Option<DisplayId>) {
        if rect.is_empty() {
            return;
        }
        if self.defer_depth > 0 {
            self.damage.add_damage(rect, RepaintPasses::BACKGROUND | RepaintPasses::SOLID);
            return;
        }

        let limit = match below {
            Some(id) => self.scene.position(id).unwrap_or(self.scene.len()),
            None => self.scene.len(),
        };

        log::trace!("[KPIO Display] Area {:?} below {:?}", rect, below);
        self.stats.background_pixels +=
            paint_background_area(&self.scene, &mut self.framebuffers, &self.background, rect);
        for pos in 0..limit {
            self.stats.solid_pixels += paint_at(&self.scene, &mut self.framebuffers, pos, rect);
        }
    }

    fn repaint_transparency(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        if self.defer_depth > 0 {
            self.damage.add_damage(rect, RepaintPasses::BLEND);
            return;
        }

        self.stats.blended_pixels +=
            paint_area_transparency(&self.scene, &mut self.framebuffers, &self.background, rect);
    }
}

/// Solid pass for the display at `pos`, restricted to desktop `rect`.
fn paint_at(
    scene: &SceneGraph,
    framebuffers: &mut FramebufferRegistry,
    pos: usize,
    rect: Rect,
) -> u64 {
    let Some(display) = scene.at(pos) else {
        return 0;
    };
    if !display.visible || !display.bounds().intersects(&rect) {
        return 0;
    }

    let local = rect.relative_to(display.x, display.y);
    paint_display_solid(scene, framebuffers, pos, local)
}

/// Scope in which compositor repaints are collected.
///
/// Dereferences to the [`Compositor`]. Guards nest; the collected damage
/// is repainted when the outermost one drops.
pub struct Deferred<'a> {
    compositor: &'a mut Compositor,
}

impl Deref for Deferred<'_> {
    type Target = Compositor;

    fn deref(&self) -> &Compositor {
        &*self.compositor
    }
}

impl DerefMut for Deferred<'_> {
    fn deref_mut(&mut self) -> &mut Compositor {
        &mut *self.compositor
    }
}

impl Drop for Deferred<'_> {
    fn drop(&mut self) {
        self.compositor.defer_depth -= 1;
        if self.compositor.defer_depth == 0 {
            self.compositor.flush_damage();
        }
    }
}
