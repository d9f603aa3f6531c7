//! Identity provider endpoint layout and protocol request URI assembly.

use crate::errors::IdentityProviderError;
use crate::oauth::types::*;
use url::Url;

use super::traits::{RequestUriProvider, Result};

const AUTHENTICATION_OPERATION: &str = "build authentication request";
const LOGOUT_OPERATION: &str = "build logout request";

/// Endpoints exposed by the identity provider under a single base URL
#[derive(Debug, Clone)]
pub struct OidcEndpoints {
    base: Url,
}

impl OidcEndpoints {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// `{base}/openidconnect/oidc/authorize/{tenant}`
    pub fn authorization_endpoint(&self, tenant: &str) -> Result<Url> {
        self.endpoint(AUTHENTICATION_OPERATION, &["openidconnect", "oidc", "authorize", tenant])
    }

    /// `{base}/openidconnect/logout/{tenant}`
    pub fn end_session_endpoint(&self, tenant: &str) -> Result<Url> {
        self.endpoint(LOGOUT_OPERATION, &["openidconnect", "logout", tenant])
    }

    /// `{base}/openidconnect/token/{tenant}`
    pub fn token_endpoint(&self, tenant: &str) -> Result<Url> {
        self.endpoint("acquire admin token", &["openidconnect", "token", tenant])
    }

    /// `{base}/idm/tenant/{tenant}/oidcclient`
    pub fn clients_endpoint(&self, tenant: &str) -> Result<Url> {
        self.endpoint("client registry", &["idm", "tenant", tenant, "oidcclient"])
    }

    fn endpoint(&self, operation: &'static str, segments: &[&str]) -> Result<Url> {
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(IdentityProviderError::Protocol {
                operation,
                message: "Endpoint path segments must not be empty".to_string(),
            });
        }

        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| IdentityProviderError::Protocol {
                operation,
                message: format!("Base URL {} cannot carry a path", self.base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl RequestUriProvider for OidcEndpoints {
    fn authentication_request_uri(
        &self,
        tenant: &str,
        request: &AuthenticationRequest,
    ) -> Result<Url> {
        require_non_empty(AUTHENTICATION_OPERATION, "client_id", &request.client_id)?;
        require_non_empty(AUTHENTICATION_OPERATION, "state", &request.state)?;
        require_non_empty(AUTHENTICATION_OPERATION, "nonce", &request.nonce)?;
        validate_redirect_target(AUTHENTICATION_OPERATION, &request.redirect_uri)?;

        let mut url = self.authorization_endpoint(tenant)?;
        url.query_pairs_mut()
            .append_pair("response_type", request.response_type.as_str())
            .append_pair("response_mode", request.response_mode.as_str())
            .append_pair("client_id", &request.client_id)
            .append_pair("redirect_uri", request.redirect_uri.as_str())
            .append_pair("scope", &request.token_spec.scope())
            .append_pair("state", &request.state)
            .append_pair("nonce", &request.nonce);
        Ok(url)
    }

    fn logout_request_uri(&self, tenant: &str, request: &LogoutRequest) -> Result<Url> {
        require_non_empty(LOGOUT_OPERATION, "client_id", &request.client_id)?;
        require_non_empty(LOGOUT_OPERATION, "state", &request.state)?;
        require_non_empty(LOGOUT_OPERATION, "id_token_hint", request.id_token.expose())?;
        validate_redirect_target(LOGOUT_OPERATION, &request.post_logout_redirect_uri)?;

        let mut url = self.end_session_endpoint(tenant)?;
        url.query_pairs_mut()
            .append_pair("id_token_hint", request.id_token.expose())
            .append_pair(
                "post_logout_redirect_uri",
                request.post_logout_redirect_uri.as_str(),
            )
            .append_pair("state", &request.state);
        Ok(url)
    }
}

fn require_non_empty(operation: &'static str, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(IdentityProviderError::Protocol {
            operation,
            message: format!("{} must not be empty", name),
        });
    }
    Ok(())
}

fn validate_redirect_target(operation: &'static str, uri: &Url) -> Result<()> {
    if !matches!(uri.scheme(), "https" | "http") {
        return Err(IdentityProviderError::Protocol {
            operation,
            message: format!("Redirect URI {} must use HTTP or HTTPS", uri),
        });
    }
    if uri.host_str().is_none() {
        return Err(IdentityProviderError::Protocol {
            operation,
            message: format!("Redirect URI {} has no host", uri),
        });
    }
    if uri.fragment().is_some() {
        return Err(IdentityProviderError::Protocol {
            operation,
            message: format!("Redirect URI {} must not contain fragment", uri),
        });
    }
    Ok(())
}
