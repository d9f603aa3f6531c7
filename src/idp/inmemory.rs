//! In-memory identity provider implementation
//!
//! This module provides an in-process client registry and token source that behave
//! like a single identity provider instance. Useful for development and tests.

use crate::errors::IdentityProviderError;
use crate::oauth::types::*;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use url::Url;
use uuid::Uuid;

use super::endpoints::OidcEndpoints;
use super::traits::*;

/// In-memory implementation of the identity provider
pub struct MemoryIdentityProvider {
    endpoints: OidcEndpoints,
    admin: AdminCredentials,
    clients: Mutex<HashMap<String, Vec<OidcClient>>>, // tenant -> clients in registration order
    reject_duplicate_redirects: bool,
}

impl MemoryIdentityProvider {
    pub fn new(base: Url, admin: AdminCredentials) -> Self {
        Self {
            endpoints: OidcEndpoints::new(base),
            admin,
            clients: Mutex::new(HashMap::new()),
            reject_duplicate_redirects: false,
        }
    }

    /// Reject a registration whose redirect URIs are already registered in the tenant,
    /// the way a provider with unique redirect URI constraints behaves.
    pub fn reject_duplicate_redirects(mut self) -> Self {
        self.reject_duplicate_redirects = true;
        self
    }

    /// Number of clients registered within the tenant
    pub fn client_count(&self, tenant: &str) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tenant)
            .map_or(0, Vec::len)
    }

    fn lock_error(operation: &'static str, e: impl std::fmt::Display) -> IdentityProviderError {
        IdentityProviderError::Transport {
            operation,
            message: format!("Lock error: {}", e),
        }
    }
}

#[async_trait]
impl ClientRegistry for MemoryIdentityProvider {
    async fn register_client(
        &self,
        tenant: &str,
        metadata: &OidcClientMetadata,
    ) -> Result<OidcClient> {
        const OPERATION: &str = "register client";

        if metadata.redirect_uris.is_empty() {
            return Err(IdentityProviderError::Api {
                operation: OPERATION,
                status: 400,
                message: "redirectUris must not be empty".to_string(),
            });
        }

        let mut clients = self
            .clients
            .lock()
            .map_err(|e| Self::lock_error(OPERATION, e))?;
        let tenant_clients = clients.entry(tenant.to_string()).or_default();

        if self.reject_duplicate_redirects
            && tenant_clients
                .iter()
                .any(|client| client.metadata.redirect_uris == metadata.redirect_uris)
        {
            return Err(IdentityProviderError::Api {
                operation: OPERATION,
                status: 409,
                message: "A client with the same redirect URIs already exists".to_string(),
            });
        }

        let client = OidcClient {
            client_id: Uuid::new_v4().to_string(),
            metadata: metadata.clone(),
        };
        tenant_clients.push(client.clone());
        Ok(client)
    }

    async fn list_clients(&self, tenant: &str) -> Result<Vec<OidcClient>> {
        let clients = self
            .clients
            .lock()
            .map_err(|e| Self::lock_error("list clients", e))?;
        Ok(clients.get(tenant).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl AdminTokenSource for MemoryIdentityProvider {
    async fn admin_tokens(&self, credentials: &AdminCredentials) -> Result<OidcTokens> {
        if credentials.user != self.admin.user || credentials.password != self.admin.password {
            return Err(IdentityProviderError::Api {
                operation: "acquire admin token",
                status: 400,
                message: "invalid_grant: incorrect username or password".to_string(),
            });
        }

        Ok(OidcTokens {
            access_token: generate_token(),
            id_token: IdToken::new(generate_token()),
            refresh_token: Some(generate_token()),
            token_type: TokenType::Bearer,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }
}

impl RequestUriProvider for MemoryIdentityProvider {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MemoryIdentityProvider {
        MemoryIdentityProvider::new(
            Url::parse("https://idp.local").unwrap(),
            AdminCredentials::new("administrator", "secret"),
        )
    }

    fn metadata(redirect: &str) -> OidcClientMetadata {
        let redirect = Url::parse(redirect).unwrap();
        OidcClientMetadata::public_client(&redirect, &redirect, &redirect)
    }

    #[tokio::test]
    async fn test_register_and_list_per_tenant() {
        let provider = provider();
        let client = provider
            .register_client("t1", &metadata("https://host/login"))
            .await
            .unwrap();

        assert_eq!(provider.list_clients("t1").await.unwrap(), vec![client]);
        assert!(provider.list_clients("t2").await.unwrap().is_empty());
        assert_eq!(provider.client_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_duplicate_redirects_rejected_when_enabled() {
        let provider = provider().reject_duplicate_redirects();
        provider
            .register_client("t1", &metadata("https://host/login"))
            .await
            .unwrap();

        let result = provider
            .register_client("t1", &metadata("https://host/login"))
            .await;
        assert!(matches!(
            result,
            Err(IdentityProviderError::Api { status: 409, .. })
        ));
        assert_eq!(provider.client_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_client_count_survives_poisoned_lock() {
        let provider = std::sync::Arc::new(provider());
        provider
            .register_client("t1", &metadata("https://host/login"))
            .await
            .unwrap();

        let poisoner = provider.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.clients.lock().unwrap();
            panic!("poison the client registry");
        })
        .join();

        assert!(provider.clients.is_poisoned());
        assert_eq!(provider.client_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_admin_tokens_require_credentials() {
        let provider = provider();
        assert!(provider
            .admin_tokens(&AdminCredentials::new("administrator", "secret"))
            .await
            .is_ok());
        assert!(provider
            .admin_tokens(&AdminCredentials::new("administrator", "wrong"))
            .await
            .is_err());
    }
}
