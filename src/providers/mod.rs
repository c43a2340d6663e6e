//! AI provider routing.
//!
//! The router is the only place with provider-specific knowledge: it
//! corrects model identifiers for providers that require region-qualified
//! aliases, dispatches to the right family-specific caller, and classifies
//! failures into the pipeline error taxonomy. Pipeline phases only ever
//! supply a logical provider/model reference.

pub mod client;
pub mod router;

pub use client::{HttpModelClient, ModelClient, ModelRequest};
pub use router::{correct_identifier, ErrorLogEntry, ProviderRouter};
