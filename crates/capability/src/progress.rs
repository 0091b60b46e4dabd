//! Download progress reporting during instance creation.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One `downloadprogress` notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Fraction downloaded, in `[0, 1]`.
    pub loaded: f64,
}

impl ProgressEvent {
    pub fn new(loaded: f64) -> Self {
        Self {
            loaded: loaded.clamp(0.0, 1.0),
        }
    }

    /// Whole percentage for display. The raw fraction stays in `loaded`.
    pub fn percent(&self) -> u32 {
        (self.loaded * 100.0).round() as u32
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Debug, Default)]
struct MonitorState {
    last: Option<f64>,
    sealed: bool,
}

/// Observer handed to a backend's `create`.
///
/// Backends call [`ProgressMonitor::report`] for every download event. The
/// monitor clamps values into `[0, 1]`, drops values that go backwards and
/// stops forwarding once sealed, so subscribers only ever see a
/// non-decreasing sequence that ends when creation resolves.
#[derive(Clone)]
pub struct ProgressMonitor {
    callback: Option<ProgressCallback>,
    state: Arc<Mutex<MonitorState>>,
}

impl ProgressMonitor {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        Self::from_callback(Some(Arc::new(callback)))
    }

    pub fn from_callback(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            state: Arc::new(Mutex::new(MonitorState::default())),
        }
    }

    /// Monitor that accepts events and forwards nothing.
    pub fn silent() -> Self {
        Self::from_callback(None)
    }

    pub fn report(&self, loaded: f64) {
        if loaded.is_nan() {
            return;
        }
        let event = ProgressEvent::new(loaded);
        {
            let mut state = self.state.lock().expect("progress monitor mutex poisoned");
            if state.sealed {
                tracing::trace!(loaded, "Dropping progress event after creation resolved");
                return;
            }
            if state.last.is_some_and(|last| event.loaded < last) {
                return;
            }
            state.last = Some(event.loaded);
        }
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    /// Stop forwarding. Called once `create` has resolved.
    pub fn seal(&self) {
        self.state
            .lock()
            .expect("progress monitor mutex poisoned")
            .sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.state
            .lock()
            .expect("progress monitor mutex poisoned")
            .sealed
    }

    /// Last fraction forwarded, if any.
    pub fn last_loaded(&self) -> Option<f64> {
        self.state
            .lock()
            .expect("progress monitor mutex poisoned")
            .last
    }
}

impl std::fmt::Debug for ProgressMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMonitor")
            .field("has_callback", &self.callback.is_some())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::silent()
    }
}
