//! Authentication and logout request URI construction for registered clients.

use crate::errors::AuthClientError;
use crate::idp::traits::RequestUriProvider;
use crate::oauth::correlation::{CorrelationSource, FixedCorrelation};
use crate::oauth::redaction::{RedactionStrategy, redact_id_token};
use crate::oauth::types::*;
use std::sync::Arc;
use url::Url;

type Result<T> = std::result::Result<T, AuthClientError>;

/// Builds protocol request URIs for clients registered within one tenant
#[derive(Clone)]
pub struct RequestUriBuilder {
    provider: Arc<dyn RequestUriProvider>,
    tenant: String,
    correlation: Arc<dyn CorrelationSource>,
    redaction: RedactionStrategy,
}

impl RequestUriBuilder {
    /// Create a builder using the fixed correlation values and literal redaction
    pub fn new(provider: Arc<dyn RequestUriProvider>, tenant: impl Into<String>) -> Self {
        Self {
            provider,
            tenant: tenant.into(),
            correlation: Arc::new(FixedCorrelation::default()),
            redaction: RedactionStrategy::default(),
        }
    }

    /// Use a different source of state and nonce values
    pub fn with_correlation(mut self, correlation: Arc<dyn CorrelationSource>) -> Self {
        self.correlation = correlation;
        self
    }

    /// Use a different identity token redaction strategy
    pub fn with_redaction(mut self, redaction: RedactionStrategy) -> Self {
        self.redaction = redaction;
        self
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Build the implicit-flow authentication request URI for the given client.
    ///
    /// Requests both an ID token and an access token, delivered in the redirect URI
    /// fragment. The client is expected to have exactly one redirect URI.
    pub fn build_authentication_request_uri(
        &self,
        client_id: &str,
        redirect_uri: &Url,
    ) -> Result<Url> {
        let request = AuthenticationRequest {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.clone(),
            response_type: ResponseType::IdTokenAccessToken,
            response_mode: ResponseMode::Fragment,
            token_spec: TokenSpec::login(),
            state: self.correlation.login_state(),
            nonce: self.correlation.login_nonce(),
        };

        tracing::debug!(client_id, %redirect_uri, "building authentication request URI");
        self.provider
            .authentication_request_uri(&self.tenant, &request)
            .map_err(|source| AuthClientError::ProtocolBuildFailure {
                operation: "authentication request",
                source,
            })
    }

    /// Build the logout request URI for the given client with the identity token
    /// replaced by a placeholder. The client is expected to have exactly one
    /// post-logout redirect URI.
    pub fn build_logout_request_uri(
        &self,
        client_id: &str,
        id_token: &IdToken,
        post_logout_uri: &Url,
    ) -> Result<Url> {
        let request = LogoutRequest {
            client_id: client_id.to_string(),
            post_logout_redirect_uri: post_logout_uri.clone(),
            id_token: id_token.clone(),
            state: self.correlation.logout_state(),
        };

        tracing::debug!(client_id, %post_logout_uri, "building logout request URI");
        let logout_uri = self
            .provider
            .logout_request_uri(&self.tenant, &request)
            .map_err(|source| AuthClientError::ProtocolBuildFailure {
                operation: "logout request",
                source,
            })?;

        redact_id_token(&logout_uri, self.redaction)
    }
}
