//! Deferred Repaint Damage
//!
//! While repaints are deferred, every invalidated region is recorded here
//! together with the passes it needs. Overlapping regions are merged, and
//! once too many distinct regions pile up (or they cover most of the
//! desktop) the tracker falls back to one full repaint.

use alloc::vec::Vec;

use crate::config::MAX_DAMAGE_RECTS;
use crate::rect::Rect;

bitflags::bitflags! {
    /// Compositing passes a damaged region needs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RepaintPasses: u8 {
        /// Uncovered pixels are refilled with the background.
        const BACKGROUND = 0b001;
        /// Opaque display pixels are copied.
        const SOLID = 0b010;
        /// Translucent pixels are recomposited.
        const BLEND = 0b100;
        const ALL = 0b111;
    }
}

/// Counters for tuning the merge heuristics
#[derive(Debug, Clone, Default)]
pub struct DamageStats {
    /// Total damage rects added
    pub total_rects: u64,
    /// Damage rects merged
    pub merged_rects: u64,
    /// Full redraws triggered
    pub full_redraws: u64,
    /// Pixels in last damage set
    pub last_damage_pixels: u64,
}

/// Damage tracking for deferred repaints
#[derive(Debug)]
pub struct DamageTracker {
    /// Damaged rectangles and the passes each needs
    rects: Vec<(Rect, RepaintPasses)>,
    /// Desktop area, used for clipping and full damage
    bounds: Rect,
    /// Rect count above which everything is repainted
    max_rects: usize,
    /// Whether the whole desktop is damaged
    full_damage: bool,
    /// Statistics
    pub stats: DamageStats,
}

impl Default for DamageTracker {
    fn default() -> Self {
        Self::new(Rect::EMPTY)
    }
}

impl DamageTracker {
    /// Create a new damage tracker for the given desktop area
    pub fn new(bounds: Rect) -> Self {
        Self {
            rects: Vec::with_capacity(MAX_DAMAGE_RECTS),
            bounds,
            max_rects: MAX_DAMAGE_RECTS,
            full_damage: false,
            stats: DamageStats::default(),
        }
    }

    /// Add a damaged region
    pub fn add_damage(&mut self, rect: Rect, passes: RepaintPasses) {
        let clipped = rect.intersect(&self.bounds);
        if clipped.is_empty() || passes.is_empty() {
            return;
        }

        self.stats.total_rects += 1;

        // Full damage already covers it
        if self.full_damage {
            return;
        }

        if self
            .rects
            .iter()
            .any(|(existing, have)| existing.contains_rect(&clipped) && have.contains(passes))
        {
            return;
        }

        let mut merged = false;
        for (existing, have) in &mut self.rects {
            if existing.intersects(&clipped) {
                *existing = existing.include(&clipped);
                *have |= passes;
                self.stats.merged_rects += 1;
                merged = true;
                break;
            }
        }

        if !merged {
            if self.rects.len() >= self.max_rects {
                self.mark_full_damage();
                return;
            }
            self.rects.push((clipped, passes));
        }

        self.consolidate();
    }

    /// Mark the entire desktop as damaged
    pub fn mark_full_damage(&mut self) {
        if !self.full_damage {
            self.stats.full_redraws += 1;
        }
        self.full_damage = true;
        self.rects.clear();
    }

    /// Whether a flush would paint anything
    pub fn has_damage(&self) -> bool {
        self.full_damage || !self.rects.is_empty()
    }

    /// Check if full desktop redraw is needed
    pub fn is_full_damage(&self) -> bool {
        self.full_damage
    }

    /// Pending rectangles, empty under full damage
    pub fn rects(&self) -> &[(Rect, RepaintPasses)] {
        if self.full_damage {
            &[]
        } else {
            &self.rects
        }
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Change the desktop area. Pending damage becomes a full repaint.
    pub fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds == bounds {
            return;
        }
        self.bounds = bounds;
        if self.has_damage() {
            self.mark_full_damage();
        }
    }

    /// Pixels covered by pending damage
    pub fn total_damage_area(&self) -> u64 {
        if self.full_damage {
            self.bounds.area()
        } else {
            self.rects.iter().map(|(r, _)| r.area()).sum()
        }
    }

    /// Hand out all pending work and reset.
    pub fn take(&mut self) -> Vec<(Rect, RepaintPasses)> {
        self.stats.last_damage_pixels = self.total_damage_area();

        let work = if self.full_damage {
            alloc::vec![(self.bounds, RepaintPasses::ALL)]
        } else {
            core::mem::take(&mut self.rects)
        };

        self.rects.clear();
        self.full_damage = false;
        work
    }

    /// Merge rectangles that overlap after an insertion
    fn consolidate(&mut self) {
        let mut i = 0;
        while i < self.rects.len() {
            let mut j = i + 1;
            while j < self.rects.len() {
                if self.rects[i].0.intersects(&self.rects[j].0) {
                    let (rect, passes) = self.rects.remove(j);
                    self.rects[i].0 = self.rects[i].0.include(&rect);
                    self.rects[i].1 |= passes;
                    self.stats.merged_rects += 1;
                    // The grown rect may now reach earlier ones
                    j = i + 1;
                    continue;
                }
                j += 1;
            }
            i += 1;
        }

        // Past half the desktop one full repaint is cheaper
        if self.total_damage_area() * 2 > self.bounds.area() {
            self.mark_full_damage();
        }
    }
}
