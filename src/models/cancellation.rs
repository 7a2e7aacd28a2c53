use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

/// Cooperative cancellation flag shared between the registry, the session
/// that owns it, and the transport reading the stream.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Single slot enforcing "at most one live stream per controller".
///
/// `supersede` triggers the previous handle and bumps the generation
/// counter; writers compare their token against the current generation to
/// drop stale asynchronous writes instead of racing them.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    slot: Mutex<Option<CancelHandle>>,
    generation: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger-and-discard any existing handle, store a fresh one, and bump
    /// the generation. Fire-and-forget: the superseded session observes the
    /// trigger on its own and stops writing.
    pub fn supersede(&self) -> (CancelHandle, u64) {
        let mut slot = self.slot.lock();
        if let Some(old) = slot.take() {
            old.trigger();
            debug!("superseded previous stream handle");
        }
        let handle = CancelHandle::new();
        *slot = Some(handle.clone());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (handle, generation)
    }

    /// Trigger and clear the live handle if present. Safe to call twice; the
    /// generation is not advanced.
    pub fn cancel_current(&self) {
        let mut slot = self.slot.lock();
        if let Some(handle) = slot.take() {
            handle.trigger();
            debug!("cancelled current stream handle");
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Write-time check: does `token` still identify the current session?
    pub fn is_current(&self, token: u64) -> bool {
        self.current_generation() == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supersede_triggers_old_handle_and_bumps_generation() {
        let registry = CancellationRegistry::new();
        let (first, gen1) = registry.supersede();
        let (second, gen2) = registry.supersede();

        assert!(first.is_triggered());
        assert!(!second.is_triggered());
        assert!(gen2 > gen1);
        assert!(registry.is_current(gen2));
        assert!(!registry.is_current(gen1));
    }

    #[test]
    fn test_cancel_current_is_idempotent() {
        let registry = CancellationRegistry::new();
        let (handle, generation) = registry.supersede();

        registry.cancel_current();
        registry.cancel_current();

        assert!(handle.is_triggered());
        // Cancellation does not advance the generation.
        assert!(registry.is_current(generation));
    }

    #[test]
    fn test_cancel_with_empty_slot_is_noop() {
        let registry = CancellationRegistry::new();
        registry.cancel_current();
        assert_eq!(registry.current_generation(), 0);
    }
}
