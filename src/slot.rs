//! Single-slot frame queue between the capture producer and the analysis
//! loop. Capacity is exactly one image: analysis latency (two network round
//! trips) dwarfs frame production, so the consumer wants the freshest
//! resident frame, never history. Publishing against an occupied slot drops
//! the incoming frame; both operations are non-blocking.

use std::sync::{Arc, Mutex};

use image::RgbaImage;

/// Shared handle to the slot. Clones refer to the same slot; exactly one
/// producer publishes and exactly one consumer takes.
#[derive(Clone, Debug, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<RgbaImage>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `image` if the slot is empty and returns `true`. If a frame
    /// is already resident, the incoming image is dropped, the resident one
    /// kept, and `false` returned. Never blocks beyond the pointer swap.
    pub fn publish(&self, image: RgbaImage) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            // Occupied: `image` is released when it goes out of scope.
            return false;
        }
        *slot = Some(image);
        true
    }

    /// Removes and returns the resident image, transferring ownership to
    /// the caller. Non-blocking; `None` when the slot is empty.
    pub fn take(&self) -> Option<RgbaImage> {
        self.lock().take()
    }

    /// Empties the slot, releasing any resident image. Used at producer
    /// teardown.
    pub fn drain(&self) {
        drop(self.take());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RgbaImage>> {
        // The slot holds a plain Option with no invariants a panicking
        // holder could break, so a poisoned lock is still usable.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
