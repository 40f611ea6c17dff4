//! Shared compositor.
//!
//! The kernel keeps one [`Compositor`] per set of graphics drivers and
//! reaches it from drivers, the window manager and input handling. All of
//! them go through this lock. Work nested inside a locked call (deferred
//! scopes, owner cleanup, destruction repaints) receives the same
//! `&mut Compositor` and never takes the lock a second time.

use spin::Mutex;

use crate::compositor::{Compositor, CompositorConfig};

/// A [`Compositor`] behind a spin lock.
pub struct SharedCompositor {
    inner: Mutex<Compositor>,
}

impl SharedCompositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            inner: Mutex::new(Compositor::new(config)),
        }
    }

    /// Run `f` with the compositor locked.
    ///
    /// The lock is not re-entrant: calling `with` again from inside `f`
    /// deadlocks. Nested work takes the `&mut Compositor` handed to `f`
    /// instead, and [`try_with`](Self::try_with) returns `None` there.
    pub fn with<R>(&self, f: impl FnOnce(&mut Compositor) -> R) -> R {
        let mut compositor = self.inner.lock();
        f(&mut compositor)
    }

    /// Like [`with`](Self::with), but returns `None` instead of spinning if
    /// the compositor is busy.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Compositor) -> R) -> Option<R> {
        let mut compositor = self.inner.try_lock()?;
        Some(f(&mut compositor))
    }

    /// Tear down, handing back the compositor.
    pub fn into_inner(self) -> Compositor {
        self.inner.into_inner()
    }
}

impl Default for SharedCompositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl From<Compositor> for SharedCompositor {
    fn from(compositor: Compositor) -> Self {
        Self {
            inner: Mutex::new(compositor),
        }
    }
}
