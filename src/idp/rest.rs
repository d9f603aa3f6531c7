//! REST client for a live identity provider.
//!
//! Talks to the provider's IDM client registry and OIDC token endpoint over HTTP.
//! Registry calls authenticate with an administrative access token obtained through
//! the password grant immediately before each call. Administrative tokens are always
//! issued by the tenant the administrative account belongs to.

use crate::errors::IdentityProviderError;
use crate::oauth::types::*;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use super::endpoints::OidcEndpoints;
use super::traits::*;

const REGISTER_OPERATION: &str = "register client";
const LIST_OPERATION: &str = "list clients";
const TOKEN_OPERATION: &str = "acquire admin token";

/// Token endpoint response (RFC 6749 section 5.1)
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

/// Identity provider reached over HTTP
pub struct RestIdentityProvider {
    http_client: Client,
    endpoints: OidcEndpoints,
    admin: AdminCredentials,
    admin_tenant: String,
}

impl RestIdentityProvider {
    pub fn new(
        http_client: Client,
        base: Url,
        admin: AdminCredentials,
        admin_tenant: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            endpoints: OidcEndpoints::new(base),
            admin,
            admin_tenant: admin_tenant.into(),
        }
    }

    async fn request_tokens(&self, credentials: &AdminCredentials) -> Result<OidcTokens> {
        let token_url = self.endpoints.token_endpoint(&self.admin_tenant)?;
        let scope = format!("openid offline_access {}", RESOURCE_SERVER_ADMIN);
        let form = [
            ("grant_type", "password"),
            ("username", credentials.user.as_str()),
            ("password", credentials.password.as_str()),
            ("scope", scope.as_str()),
        ];

        tracing::debug!(url = %token_url, user = %credentials.user, "requesting admin tokens");
        let response = self
            .http_client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(TOKEN_OPERATION, e))?;
        let response = check_status(TOKEN_OPERATION, response).await?;
        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| protocol_error(TOKEN_OPERATION, e))?;

        body.into_tokens()
    }

    /// Access token used to authenticate registry calls
    async fn registry_access_token(&self) -> Result<String> {
        Ok(self.request_tokens(&self.admin).await?.access_token)
    }
}

impl TokenEndpointResponse {
    fn into_tokens(self) -> Result<OidcTokens> {
        let id_token = self.id_token.ok_or_else(|| IdentityProviderError::Protocol {
            operation: TOKEN_OPERATION,
            message: "Token response does not contain an id_token".to_string(),
        })?;

        let token_type = match self.token_type.as_deref() {
            None => TokenType::Bearer,
            Some(value) if value.eq_ignore_ascii_case("bearer") => TokenType::Bearer,
            Some(value) => {
                return Err(IdentityProviderError::Protocol {
                    operation: TOKEN_OPERATION,
                    message: format!("Unsupported token type: {}", value),
                });
            }
        };

        Ok(OidcTokens {
            access_token: self.access_token,
            id_token: IdToken::new(id_token),
            refresh_token: self.refresh_token,
            token_type,
            expires_at: self
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
        })
    }
}

#[async_trait]
impl ClientRegistry for RestIdentityProvider {
    async fn register_client(
        &self,
        tenant: &str,
        metadata: &OidcClientMetadata,
    ) -> Result<OidcClient> {
        let url = self.endpoints.clients_endpoint(tenant)?;
        let access_token = self.registry_access_token().await?;

        tracing::debug!(%url, redirect_uris = ?metadata.redirect_uris, "registering client");
        let response = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .json(metadata)
            .send()
            .await
            .map_err(|e| transport_error(REGISTER_OPERATION, e))?;
        let response = check_status(REGISTER_OPERATION, response).await?;
        response
            .json::<OidcClient>()
            .await
            .map_err(|e| protocol_error(REGISTER_OPERATION, e))
    }

    async fn list_clients(&self, tenant: &str) -> Result<Vec<OidcClient>> {
        let url = self.endpoints.clients_endpoint(tenant)?;
        let access_token = self.registry_access_token().await?;

        tracing::debug!(%url, "listing clients");
        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(LIST_OPERATION, e))?;
        let response = check_status(LIST_OPERATION, response).await?;
        response
            .json::<Vec<OidcClient>>()
            .await
            .map_err(|e| protocol_error(LIST_OPERATION, e))
    }
}

#[async_trait]
impl AdminTokenSource for RestIdentityProvider {
    async fn admin_tokens(&self, credentials: &AdminCredentials) -> Result<OidcTokens> {
        self.request_tokens(credentials).await
    }
}

impl RequestUriProvider for RestIdentityProvider {
    fn authentication_request_uri(
        &self,
        tenant: &str,
        request: &AuthenticationRequest,
    ) -> Result<Url> {
        self.endpoints.authentication_request_uri(tenant, request)
    }

    fn logout_request_uri(&self, tenant: &str, request: &LogoutRequest) -> Result<Url> {
        self.endpoints.logout_request_uri(tenant, request)
    }
}

async fn check_status(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Err(IdentityProviderError::Api {
        operation,
        status: status.as_u16(),
        message,
    })
}

fn transport_error(operation: &'static str, e: reqwest::Error) -> IdentityProviderError {
    IdentityProviderError::Transport {
        operation,
        message: e.to_string(),
    }
}

fn protocol_error(operation: &'static str, e: reqwest::Error) -> IdentityProviderError {
    IdentityProviderError::Protocol {
        operation,
        message: e.to_string(),
    }
}
