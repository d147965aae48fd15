// src/client/shell.rs

use std::sync::atomic::{AtomicBool, Ordering};

/// Methods the host shell exposes to the web client.
pub trait ShellBridge: Send + Sync {
    /// Black the screen out. Despite the name this only ever shows the overlay;
    /// a tap on it is what hides it again.
    fn toggle_blackout(&self);
}

/// Full-screen black overlay used to keep a wall-mounted tablet dark.
#[derive(Debug, Default)]
pub struct BlackoutOverlay {
    visible: AtomicBool,
}

impl BlackoutOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Tap on the overlay. Returns whether it was showing.
    pub fn wake(&self) -> bool {
        self.visible.swap(false, Ordering::AcqRel)
    }
}

impl ShellBridge for BlackoutOverlay {
    fn toggle_blackout(&self) {
        self.visible.store(true, Ordering::Release);
    }
}
