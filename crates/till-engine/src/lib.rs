//! Request routing engine.
//!
//! This crate owns everything between the HTTP boundary and the storage
//! providers:
//!
//! - [`ProviderRegistry`] — the ordered, immutable set of configured
//!   providers with their key whitelists.
//! - [`LifespanRules`] — resolution of the client lifespan input into
//!   concrete seconds.
//! - [`Dispatcher`] — the write protocol (validated, synchronized or
//!   fire-and-forget fan-out) and the read protocol (ordered sequential
//!   first-match scan).

mod dispatcher;
mod error;
mod lifespan;
mod registry;
mod validate;

pub use dispatcher::{
    Dispatcher, ProviderReport, ProviderResult, ProviderStatus, WriteOutcome, WriteRequest,
};
pub use error::ValidationError;
pub use lifespan::{resolve_lifespan, LifespanRules};
pub use registry::{ProviderRegistry, RegisteredProvider};
pub use validate::{validate_key, validate_metadata};
