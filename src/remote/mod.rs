//! remote
//!
//! Abstraction for the remote content backend.
//!
//! # Architecture
//!
//! The [`Connector`], [`Session`] and [`Datastore`] traits define the only
//! operations the facade consumes from the backend. The facade depends on
//! `Arc<dyn Connector>` and never on a concrete implementation.
//!
//! # Modules
//!
//! - `traits`: collaborator traits, [`Branch`], [`Pagination`], [`CmsError`]
//! - [`http`]: REST implementation over reqwest
//! - [`mock`]: in-memory implementation for deterministic testing

pub mod http;
pub mod mock;
mod traits;

pub use traits::*;
