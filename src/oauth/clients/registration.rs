//! OIDC client registration against the identity provider.
//!
//! Registration is a side-effecting remote call without transactional guarantees:
//! the provider may accept the write and lose the acknowledgement, or a concurrent
//! caller may have registered the same client first. The registrar therefore always
//! reconciles with the provider's client list and returns the listed record.

use crate::errors::{AuthClientError, IdentityProviderError};
use crate::idp::traits::{AdminTokenSource, ClientRegistry, IdentityProvider};
use crate::oauth::request_uri::RequestUriBuilder;
use crate::oauth::types::*;
use std::sync::Arc;
use url::Url;

type Result<T> = std::result::Result<T, AuthClientError>;

/// Client Registrar
pub struct ClientRegistrar {
    provider: Arc<dyn IdentityProvider>,
    uri_builder: RequestUriBuilder,
    /// Tenant clients are registered in
    tenant: String,
    /// Administrative account used for logout URI construction
    admin_credentials: AdminCredentials,
}

impl ClientRegistrar {
    /// Create a new registrar for the tenant the URI builder is bound to
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        uri_builder: RequestUriBuilder,
        admin_credentials: AdminCredentials,
    ) -> Self {
        Self {
            provider,
            tenant: uri_builder.tenant().to_string(),
            uri_builder,
            admin_credentials,
        }
    }

    pub fn uri_builder(&self) -> &RequestUriBuilder {
        &self.uri_builder
    }

    /// Register an OAuth client using the same URI for redirect, logout and
    /// post-logout redirect.
    pub async fn register_client(&self, redirect_uri: &Url) -> Result<OidcClient> {
        self.register_client_with_uris(redirect_uri, redirect_uri, redirect_uri)
            .await
    }

    /// Register an OAuth client, or recover the client an earlier or concurrent
    /// registration already created for the redirect URI.
    pub async fn register_client_with_uris(
        &self,
        redirect_uri: &Url,
        logout_uri: &Url,
        post_logout_uri: &Url,
    ) -> Result<OidcClient> {
        let metadata = OidcClientMetadata::public_client(redirect_uri, logout_uri, post_logout_uri);

        let register_error = match self.provider.register_client(&self.tenant, &metadata).await {
            Ok(client) => {
                tracing::debug!(client_id = %client.client_id, %redirect_uri, "client registered");
                None
            }
            Err(err) => {
                tracing::warn!(error = ?err, %redirect_uri, "client registration failed, looking for an existing client");
                Some(err)
            }
        };

        self.find_registered_client(redirect_uri.as_str(), register_error)
            .await
    }

    async fn find_registered_client(
        &self,
        redirect_uri: &str,
        register_error: Option<IdentityProviderError>,
    ) -> Result<OidcClient> {
        let clients = match self.provider.list_clients(&self.tenant).await {
            Ok(clients) => clients,
            Err(err) => {
                tracing::error!(error = ?err, redirect_uri, "listing registered clients failed");
                return Err(AuthClientError::ListingFailed {
                    source: err,
                    register_error,
                });
            }
        };

        if let Some(client) = clients
            .into_iter()
            .find(|client| client.metadata.has_sole_redirect_uri(redirect_uri))
        {
            if register_error.is_some() {
                tracing::info!(client_id = %client.client_id, redirect_uri, "recovered existing client registration");
            }
            return Ok(client);
        }

        tracing::error!(redirect_uri, "client expected to be registered, but not found");
        Err(AuthClientError::RegistrationFailed {
            redirect_uri: redirect_uri.to_string(),
            source: register_error,
        })
    }

    /// Register an implicit-flow client and build its login and logout URIs.
    pub async fn register_implicit_client(
        &self,
        login_redirect_uri: &Url,
        logout_redirect_uri: &Url,
    ) -> Result<ImplicitClient> {
        self.build_implicit_client(login_redirect_uri, logout_redirect_uri)
            .await
            .map_err(|err| AuthClientError::ImplicitClientFailed {
                login_redirect_uri: login_redirect_uri.to_string(),
                logout_redirect_uri: logout_redirect_uri.to_string(),
                source: Box::new(err),
            })
    }

    async fn build_implicit_client(
        &self,
        login_redirect_uri: &Url,
        logout_redirect_uri: &Url,
    ) -> Result<ImplicitClient> {
        let tokens = self
            .provider
            .admin_tokens(&self.admin_credentials)
            .await
            .map_err(AuthClientError::AdminTokenAcquisitionFailed)?;

        let client = self
            .register_client_with_uris(login_redirect_uri, login_redirect_uri, logout_redirect_uri)
            .await?;

        let login_uri = self
            .uri_builder
            .build_authentication_request_uri(&client.client_id, login_redirect_uri)?;
        let logout_uri = self.uri_builder.build_logout_request_uri(
            &client.client_id,
            &tokens.id_token,
            logout_redirect_uri,
        )?;

        Ok(ImplicitClient {
            client_id: client.client_id,
            login_uri: login_uri.to_string(),
            logout_uri: logout_uri.to_string(),
        })
    }
}
