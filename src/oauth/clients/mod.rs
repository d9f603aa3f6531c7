//! OIDC client registration.
//!
//! Registers relying-party clients with the identity provider and recovers existing
//! registrations when the registration call fails.

pub mod registration;

pub use registration::ClientRegistrar;
