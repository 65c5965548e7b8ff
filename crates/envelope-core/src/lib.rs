//! Core types, configuration, and capabilities for Envelope.
//!
//! This crate provides the building blocks shared by the HTTP envelope layer
//! and the bootstrap binary: environment-driven configuration, the core error
//! type, the [`ContentEncoder`] capability used to encode response bodies, and
//! the [`Library`] registry that hands out named capabilities.

mod config;
mod encoder;
mod error;
mod library;

pub use config::{EnvelopeConfig, Environment};
pub use encoder::{Base64Encoder, ContentEncoder};
pub use error::{CoreError, CoreResult};
pub use library::{Capability, IdGenerator, Library, UuidGenerator};
