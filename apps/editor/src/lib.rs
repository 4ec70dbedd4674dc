//! Editing-session persistence and live-preview engine for the resume builder.
//!
//! Edits go through [`store::DocumentStore`]; saves are debounced and run one
//! at a time ([`save::SaveScheduler`]) against either the remote record API or
//! the guest's local draft ([`save::PersistenceResolver`]), while
//! [`preview::PreviewBridge`] keeps the rendering surface in step.

pub mod config;
pub mod debounce;
pub mod errors;
pub mod models;
pub mod preview;
pub mod remote;
pub mod save;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;
