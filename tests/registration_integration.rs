//! Client registration integration tests
//!
//! These tests drive the registrar and request URI builder against an in-memory
//! identity provider whose registration and listing calls can be made to fail.

use async_trait::async_trait;
use rpauth::errors::{AuthClientError, IdentityProviderError};
use rpauth::idp::{
    AdminTokenSource, ClientRegistry, MemoryIdentityProvider, RequestUriProvider,
    traits::Result as IdpResult,
};
use rpauth::oauth::{
    AdminCredentials, AuthenticationRequest, ClientAuthMethod, ClientRegistrar, LogoutRequest,
    OidcClient, OidcClientMetadata, OidcTokens, RequestUriBuilder,
};
use std::error::Error as _;
use std::sync::Arc;
use url::Url;

const TENANT: &str = "esxcloud";

#[derive(Clone, Copy)]
enum RegisterBehavior {
    /// Registration succeeds
    Accept,
    /// The provider stores the client but the acknowledgement is lost
    AckLost,
    /// The provider rejects the registration without storing anything
    Reject,
}

/// Identity provider with scripted registration and listing failures
struct ScriptedProvider {
    inner: MemoryIdentityProvider,
    register: RegisterBehavior,
    list_fails: bool,
}

impl ScriptedProvider {
    fn new(register: RegisterBehavior, list_fails: bool) -> Self {
        Self {
            inner: MemoryIdentityProvider::new(
                Url::parse("https://idp.example.com").unwrap(),
                admin(),
            ),
            register,
            list_fails,
        }
    }
}

#[async_trait]
impl ClientRegistry for ScriptedProvider {
    async fn register_client(
        &self,
        tenant: &str,
        metadata: &OidcClientMetadata,
    ) -> IdpResult<OidcClient> {
        match self.register {
            RegisterBehavior::Accept => self.inner.register_client(tenant, metadata).await,
            RegisterBehavior::AckLost => {
                self.inner.register_client(tenant, metadata).await?;
                Err(IdentityProviderError::Transport {
                    operation: "register client",
                    message: "connection reset by peer".to_string(),
                })
            }
            RegisterBehavior::Reject => Err(IdentityProviderError::Api {
                operation: "register client",
                status: 500,
                message: "internal error".to_string(),
            }),
        }
    }

    async fn list_clients(&self, tenant: &str) -> IdpResult<Vec<OidcClient>> {
        if self.list_fails {
            return Err(IdentityProviderError::Transport {
                operation: "list clients",
                message: "connection refused".to_string(),
            });
        }
        self.inner.list_clients(tenant).await
    }
}

#[async_trait]
impl AdminTokenSource for ScriptedProvider {
    async fn admin_tokens(&self, credentials: &AdminCredentials) -> IdpResult<OidcTokens> {
        self.inner.admin_tokens(credentials).await
    }
}

impl RequestUriProvider for ScriptedProvider {
    fn authentication_request_uri(
        &self,
        tenant: &str,
        request: &AuthenticationRequest,
    ) -> IdpResult<Url> {
        self.inner.authentication_request_uri(tenant, request)
    }

    fn logout_request_uri(&self, tenant: &str, request: &LogoutRequest) -> IdpResult<Url> {
        self.inner.logout_request_uri(tenant, request)
    }
}

fn admin() -> AdminCredentials {
    AdminCredentials::new("administrator@esxcloud", "secret")
}

fn registrar(provider: Arc<ScriptedProvider>) -> ClientRegistrar {
    let builder = RequestUriBuilder::new(provider.clone(), TENANT);
    ClientRegistrar::new(provider, builder, admin())
}

fn url(value: &str) -> Url {
    Url::parse(value).unwrap()
}

#[tokio::test]
async fn test_successful_registration_has_single_redirect_uri() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Accept, false));
    let registrar = registrar(provider.clone());

    let client = registrar
        .register_client_with_uris(
            &url("https://host/login"),
            &url("https://host/login"),
            &url("https://host/logout"),
        )
        .await
        .unwrap();

    assert_eq!(client.metadata.redirect_uris, vec!["https://host/login"]);
    assert_eq!(provider.inner.client_count(TENANT), 1);
}

#[tokio::test]
async fn test_lost_acknowledgement_recovers_registered_client() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::AckLost, false));
    let registrar = registrar(provider.clone());

    let client = registrar
        .register_client(&url("https://host/login"))
        .await
        .unwrap();

    let listed = provider.inner.list_clients(TENANT).await.unwrap();
    assert_eq!(listed, vec![client]);
}

#[tokio::test]
async fn test_rejected_registration_recovers_pre_existing_client() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Reject, false));
    let redirect = url("https://host/login");
    let existing = provider
        .inner
        .register_client(
            TENANT,
            &OidcClientMetadata::public_client(&redirect, &redirect, &redirect),
        )
        .await
        .unwrap();

    let client = registrar(provider).register_client(&redirect).await.unwrap();
    assert_eq!(client.client_id, existing.client_id);
}

#[tokio::test]
async fn test_rejected_registration_without_match_reports_cause() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Reject, false));

    let err = registrar(provider)
        .register_client(&url("https://host/login"))
        .await
        .unwrap_err();

    match &err {
        AuthClientError::RegistrationFailed {
            redirect_uri,
            source: Some(IdentityProviderError::Api { status: 500, .. }),
        } => assert_eq!(redirect_uri, "https://host/login"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.source().unwrap().to_string().contains("register client"));
}

#[tokio::test]
async fn test_listing_failure_is_surfaced() {
    for behavior in [RegisterBehavior::Accept, RegisterBehavior::Reject] {
        let provider = Arc::new(ScriptedProvider::new(behavior, true));

        let err = registrar(provider)
            .register_client(&url("https://host/login"))
            .await
            .unwrap_err();

        match &err {
            AuthClientError::ListingFailed { source, .. } => {
                assert_eq!(source.operation(), "list clients")
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let register_operation = err.registration_error().map(|e| e.operation());
        match behavior {
            RegisterBehavior::Reject => {
                assert_eq!(register_operation, Some("register client"));
                assert!(err.to_string().contains("status 500"));
            }
            _ => assert_eq!(register_operation, None),
        }
    }
}

#[tokio::test]
async fn test_implicit_client_listing_failure_keeps_registration_error() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Reject, true));

    let err = registrar(provider)
        .register_implicit_client(&url("https://host/login"), &url("https://host/logout"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthClientError::ImplicitClientFailed { .. }));
    assert!(matches!(
        err.registration_error(),
        Some(IdentityProviderError::Api { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_client_with_several_redirect_uris_is_not_matched() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Reject, false));
    provider
        .inner
        .register_client(
            TENANT,
            &OidcClientMetadata {
                redirect_uris: vec![
                    "https://host/login".to_string(),
                    "https://host/other".to_string(),
                ],
                post_logout_redirect_uris: vec![],
                logout_uri: None,
                token_endpoint_auth_method: ClientAuthMethod::None,
            },
        )
        .await
        .unwrap();

    let err = registrar(provider)
        .register_client(&url("https://host/login"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthClientError::RegistrationFailed { .. }));
}

#[tokio::test]
async fn test_first_matching_client_wins() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Reject, false));
    let redirect = url("https://host/login");
    let metadata = OidcClientMetadata::public_client(&redirect, &redirect, &redirect);
    let first = provider.inner.register_client(TENANT, &metadata).await.unwrap();
    provider.inner.register_client(TENANT, &metadata).await.unwrap();

    let client = registrar(provider).register_client(&redirect).await.unwrap();
    assert_eq!(client.client_id, first.client_id);
}

#[tokio::test]
async fn test_registration_then_login_uri() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Accept, false));
    let registrar = registrar(provider);
    let redirect = url("https://host/login");

    let client = registrar.register_client(&redirect).await.unwrap();
    let login_uri = registrar
        .uri_builder()
        .build_authentication_request_uri(&client.client_id, &redirect)
        .unwrap();

    let value = |key: &str| {
        login_uri
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };
    assert_eq!(value("response_type").as_deref(), Some("id_token token"));
    assert_eq!(value("response_mode").as_deref(), Some("fragment"));
    assert_eq!(value("state").as_deref(), Some("L"));
    assert_eq!(value("nonce").as_deref(), Some("1"));
    assert_eq!(value("client_id"), Some(client.client_id));
    assert_eq!(value("redirect_uri").as_deref(), Some("https://host/login"));
}

#[tokio::test]
async fn test_implicit_client_failure_carries_both_uris() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::Reject, false));
    let login = url("https://host/login");
    let logout = url("https://host/logout");

    let err = registrar(provider)
        .register_implicit_client(&login, &logout)
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("https://host/login"));
    assert!(message.contains("https://host/logout"));
    let cause = err.source().unwrap();
    assert!(cause.to_string().starts_with("error-rpauth-client-1"));
}

#[tokio::test]
async fn test_implicit_client_logout_uri_never_contains_token() {
    let provider = Arc::new(ScriptedProvider::new(RegisterBehavior::AckLost, false));
    let implicit = registrar(provider)
        .register_implicit_client(&url("https://host/login"), &url("https://host/logout"))
        .await
        .unwrap();

    let logout_uri = Url::parse(&implicit.logout_uri).unwrap();
    let pairs: Vec<(String, String)> = logout_uri
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (
                "id_token_hint".to_string(),
                "[ID_TOKEN_PLACEHOLDER]".to_string()
            ),
            (
                "post_logout_redirect_uri".to_string(),
                "https://host/logout".to_string()
            ),
            ("state".to_string(), "E".to_string()),
        ]
    );
}

/// Identity provider that yields to the scheduler before every registry call, so
/// concurrent registrations interleave between their register and list steps
struct InterleavingProvider {
    inner: MemoryIdentityProvider,
}

#[async_trait]
impl ClientRegistry for InterleavingProvider {
    async fn register_client(
        &self,
        tenant: &str,
        metadata: &OidcClientMetadata,
    ) -> IdpResult<OidcClient> {
        tokio::task::yield_now().await;
        self.inner.register_client(tenant, metadata).await
    }

    async fn list_clients(&self, tenant: &str) -> IdpResult<Vec<OidcClient>> {
        tokio::task::yield_now().await;
        self.inner.list_clients(tenant).await
    }
}

#[async_trait]
impl AdminTokenSource for InterleavingProvider {
    async fn admin_tokens(&self, credentials: &AdminCredentials) -> IdpResult<OidcTokens> {
        self.inner.admin_tokens(credentials).await
    }
}

impl RequestUriProvider for InterleavingProvider {
    fn authentication_request_uri(
        &self,
        tenant: &str,
        request: &AuthenticationRequest,
    ) -> IdpResult<Url> {
        self.inner.authentication_request_uri(tenant, request)
    }

    fn logout_request_uri(&self, tenant: &str, request: &LogoutRequest) -> IdpResult<Url> {
        self.inner.logout_request_uri(tenant, request)
    }
}

#[tokio::test]
async fn test_concurrent_registrations_converge() {
    let provider = Arc::new(InterleavingProvider {
        inner: MemoryIdentityProvider::new(Url::parse("https://idp.example.com").unwrap(), admin())
            .reject_duplicate_redirects(),
    });
    let registrar = ClientRegistrar::new(
        provider.clone(),
        RequestUriBuilder::new(provider.clone(), TENANT),
        admin(),
    );
    let redirect = url("https://host/login");

    let results =
        futures::future::join_all((0..8).map(|_| registrar.register_client(&redirect))).await;

    let ids: Vec<String> = results
        .into_iter()
        .map(|result| result.unwrap().client_id)
        .collect();
    assert_eq!(ids.len(), 8);
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(provider.inner.client_count(TENANT), 1);
}
