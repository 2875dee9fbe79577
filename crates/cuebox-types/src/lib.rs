//! Foundation types and traits for cuebox.
//!
//! This crate contains the types shared by every cuebox crate: the error
//! type, configuration, and the collaborator contracts (engine, media item,
//! frame sink) that the interpreter and the playout coordinator drive.

pub mod backend;
pub mod config;
pub mod error;
