//! OIDC relying-party (rpauth) library crate.
//!
//! Registers implicit-flow clients with an external identity provider and builds the
//! login and logout request URIs a control-plane service hands to its users.

pub mod config;
pub mod errors;
pub mod idp;
pub mod oauth;
