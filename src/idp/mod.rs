//! Identity provider collaborators.
//!
//! Capability traits for the remote identity provider plus the backends this crate
//! ships: a REST client for a live provider and an in-memory registry.

pub mod endpoints;
pub mod inmemory;
pub mod rest;
pub mod traits;

pub use endpoints::OidcEndpoints;
pub use inmemory::MemoryIdentityProvider;
pub use rest::RestIdentityProvider;
pub use traits::{AdminTokenSource, ClientRegistry, IdentityProvider, RequestUriProvider};
