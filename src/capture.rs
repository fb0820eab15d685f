//! Camera/QR collaborator seam.
//!
//! Decoding happens wherever the camera is (usually the browser). What the
//! check-in flow needs from it is one guarantee: once a payload exists, the
//! capture is stopped, whatever happens next. [`CaptureGuard`] holds the capture
//! for the scanning state and stops it on `release` or on drop.

use tracing::debug;

/// An active camera capture that can be stopped.
pub trait Capture: Send {
    fn stop(&mut self);
}

/// Used when the payload was decoded elsewhere and nothing is held locally.
#[derive(Debug, Default)]
pub struct NoCapture;

impl Capture for NoCapture {
    fn stop(&mut self) {}
}

/// Scoped ownership of a capture: acquired on entering the scanning state,
/// released on every exit path.
#[derive(Debug)]
pub struct CaptureGuard<C: Capture> {
    capture: Option<C>,
}

impl<C: Capture> CaptureGuard<C> {
    #[must_use]
    pub fn new(capture: C) -> Self {
        Self {
            capture: Some(capture),
        }
    }

    /// Stop the capture now. Later calls and the drop are no-ops.
    pub fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
            debug!("capture stopped");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.capture.is_some()
    }
}

impl<C: Capture> Drop for CaptureGuard<C> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    struct CountingCapture(Arc<AtomicUsize>);

    impl Capture for CountingCapture {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn release_stops_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut guard = CaptureGuard::new(CountingCapture(Arc::clone(&stops)));
        assert!(guard.is_active());
        guard.release();
        guard.release();
        assert!(!guard.is_active());
        drop(guard);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_stops_unreleased_capture() {
        let stops = Arc::new(AtomicUsize::new(0));
        {
            let _guard = CaptureGuard::new(CountingCapture(Arc::clone(&stops)));
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
