//! Application layer of the SmartNotes popup.
//!
//! [`PopupController`] owns the orchestration context, the note store and
//! the form state, and exposes one async operation per popup action.
//! Results reach the front end as events on an [`EventBus`].
//!
//! [`EventBus`]: smartnotes_events::EventBus

mod config;
mod constants;
mod controller;
mod error;
mod renderer;
mod state;

pub use config::{default_data_dir, PopupConfig};
pub use constants::*;
pub use controller::{DetectionReport, NoteStore, PopupController, ProofreadReport};
pub use error::{PopupError, Result};
pub use renderer::ProgressiveRenderer;
pub use state::PopupState;
