//! Progress reporting and cooperative cancellation.
//!
//! Long-running computations poll a [`ProgressListener`] at coarse intervals
//! (once per outer loop iteration) and abort with [`OrdoError::Canceled`] as
//! soon as the listener reports a cancel request. Nothing is published on
//! cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{OrdoError, Result};

/// Receives progress updates and signals cancellation.
pub trait ProgressListener {
    /// Whether the caller asked for the computation to stop.
    fn is_canceled(&self) -> bool {
        false
    }

    /// Report that `done` of `total` work units are complete.
    fn set_progress(&self, _done: usize, _total: usize) {}

    /// Return `Err(Canceled)` if a cancel was requested.
    fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(OrdoError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Report progress, then check for cancellation.
    fn step(&self, done: usize, total: usize) -> Result<()> {
        self.set_progress(done, total);
        self.check()
    }
}

/// A listener that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl ProgressListener for Silent {}

/// A cloneable cancel switch.
///
/// Clones share state, so one clone can be handed to a worker thread while
/// another stays with the UI that may call [`CancelFlag::cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    canceled: Arc<AtomicBool>,
    done: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl CancelFlag {
    /// A fresh, un-canceled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancel request so the flag can drive a new run.
    pub fn reset(&self) {
        self.canceled.store(false, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }

    /// Last reported `(done, total)` pair.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.done.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

impl ProgressListener for CancelFlag {
    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn set_progress(&self, done: usize, total: usize) {
        self.done.store(done, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }
}
