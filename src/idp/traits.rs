//! Capability traits for the identity provider.
//!
//! The registrar and URI builder only ever talk to the provider through these
//! interfaces, so the reconciliation logic is independent of the concrete backend.

use crate::errors::IdentityProviderError;
use crate::oauth::types::*;
use async_trait::async_trait;
use url::Url;

pub type Result<T> = std::result::Result<T, IdentityProviderError>;

/// Client registration endpoint of the identity provider
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Register a new client within the tenant
    async fn register_client(&self, tenant: &str, metadata: &OidcClientMetadata)
    -> Result<OidcClient>;

    /// List every client registered within the tenant
    async fn list_clients(&self, tenant: &str) -> Result<Vec<OidcClient>>;
}

/// Issues tokens for the administrative account
#[async_trait]
pub trait AdminTokenSource: Send + Sync {
    async fn admin_tokens(&self, credentials: &AdminCredentials) -> Result<OidcTokens>;
}

/// Assembles protocol request URIs for a registered client
pub trait RequestUriProvider: Send + Sync {
    /// Build the authentication request URI that starts a login
    fn authentication_request_uri(
        &self,
        tenant: &str,
        request: &AuthenticationRequest,
    ) -> Result<Url>;

    /// Build the logout request URI that ends a session
    fn logout_request_uri(&self, tenant: &str, request: &LogoutRequest) -> Result<Url>;
}

/// Combined identity provider capabilities
pub trait IdentityProvider: ClientRegistry + AdminTokenSource + RequestUriProvider {}

impl<T> IdentityProvider for T where T: ClientRegistry + AdminTokenSource + RequestUriProvider {}
