//! Multi-step donation campaign wizard.
//!
//! Collects campaign fields across five steps, keeps a best-effort draft in
//! a quota-bounded key-value store, gates sensitive documents behind an
//! explicit confirmation and submits the finished campaign as a multipart
//! request.

pub mod api;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod errors;
pub mod fields;
pub mod gate;
pub mod media;
pub mod notify;
pub mod preview;
pub mod steps;
pub mod store;
pub mod submit;
pub mod trust;

pub use controller::{Attachments, WizardController, WizardDeps, WizardSettings};
pub use errors::{Result, WizardError};
pub use fields::{CampaignFields, FormDraft};
pub use steps::WizardStep;
