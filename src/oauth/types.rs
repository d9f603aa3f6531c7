//! OIDC relying-party types and data structures.
//!
//! Defines the client registration records exchanged with the identity provider,
//! the token specification requested at login, and the request shapes handed to the
//! provider's URI assembly.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Resource server every login token is issued for
pub const RESOURCE_SERVER_ESXCLOUD: &str = "rs_esxcloud";

/// Resource server the administrative token is issued for
pub const RESOURCE_SERVER_ADMIN: &str = "rs_admin_server";

/// OAuth 2.0 Client Authentication Methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    None,
    PrivateKeyJwt,
}

/// OAuth 2.0 Token Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Bearer,
}

/// OIDC response types understood by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Implicit flow returning both an ID token and an access token
    IdTokenAccessToken,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::IdTokenAccessToken => "id_token token",
        }
    }
}

/// How the identity provider delivers the authorization response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Values are returned in the redirect URI fragment, never as query parameters
    Fragment,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Fragment => "fragment",
        }
    }
}

/// Group membership claims included in a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMembership {
    None,
    Filtered,
    Full,
}

/// Shape of the tokens requested from the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub token_type: TokenType,
    pub refresh_token: bool,
    pub id_token_groups: GroupMembership,
    pub access_token_groups: GroupMembership,
    pub resource_servers: Vec<String>,
}

impl TokenSpec {
    /// Token specification used for every login request: bearer access token with
    /// full group claims for the esxcloud resource server, no refresh token.
    pub fn login() -> Self {
        Self {
            token_type: TokenType::Bearer,
            refresh_token: false,
            id_token_groups: GroupMembership::None,
            access_token_groups: GroupMembership::Full,
            resource_servers: vec![RESOURCE_SERVER_ESXCLOUD.to_string()],
        }
    }

    /// Render the specification as an OIDC `scope` parameter value
    pub fn scope(&self) -> String {
        let mut scopes = vec!["openid"];
        if self.refresh_token {
            scopes.push("offline_access");
        }
        match self.id_token_groups {
            GroupMembership::None => {}
            GroupMembership::Filtered => scopes.push("id_groups_filtered"),
            GroupMembership::Full => scopes.push("id_groups"),
        }
        match self.access_token_groups {
            GroupMembership::None => {}
            GroupMembership::Filtered => scopes.push("at_groups_filtered"),
            GroupMembership::Full => scopes.push("at_groups"),
        }
        scopes.extend(self.resource_servers.iter().map(String::as_str));
        scopes.join(" ")
    }
}

/// Metadata a client is registered with at the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcClientMetadata {
    /// Redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Post-logout redirect URIs
    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,
    /// Front-channel logout URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_uri: Option<String>,
    /// Client authentication method at the token endpoint
    pub token_endpoint_auth_method: ClientAuthMethod,
}

impl OidcClientMetadata {
    /// Metadata for a public client (no client secret) with one URI per role
    pub fn public_client(redirect_uri: &Url, logout_uri: &Url, post_logout_uri: &Url) -> Self {
        Self {
            redirect_uris: vec![redirect_uri.to_string()],
            post_logout_redirect_uris: vec![post_logout_uri.to_string()],
            logout_uri: Some(logout_uri.to_string()),
            token_endpoint_auth_method: ClientAuthMethod::None,
        }
    }

    /// Whether this client was registered with exactly the given redirect URI.
    ///
    /// `redirect_uri` is expected in `Url` serialized form. A listed URI that was
    /// registered in another spelling (`https://host` for `https://host/`) matches
    /// when it normalizes to the same URL.
    pub fn has_sole_redirect_uri(&self, redirect_uri: &str) -> bool {
        match self.redirect_uris.as_slice() {
            [only] => {
                only == redirect_uri
                    || Url::parse(only).is_ok_and(|listed| listed.as_str() == redirect_uri)
            }
            _ => false,
        }
    }
}

/// A client registered at the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcClient {
    /// Identity provider assigned client identifier
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Metadata the client was registered with
    #[serde(rename = "oidcclientMetadataDTO")]
    pub metadata: OidcClientMetadata,
}

/// Result of registering an implicit-flow client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitClient {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "loginURI")]
    pub login_uri: String,
    #[serde(rename = "logoutURI")]
    pub logout_uri: String,
}

/// A signed identity token. The raw value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct IdToken(String);

impl IdToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw serialized token
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdToken(redacted)")
    }
}

/// Tokens issued by the identity provider
#[derive(Debug, Clone)]
pub struct OidcTokens {
    pub access_token: String,
    pub id_token: IdToken,
    pub refresh_token: Option<String>,
    pub token_type: TokenType,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Administrative account used to obtain tokens
#[derive(Clone)]
pub struct AdminCredentials {
    pub user: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("user", &self.user)
            .field("password", &"redacted")
            .finish()
    }
}

/// Parameters of an authentication request
#[derive(Debug, Clone)]
pub struct AuthenticationRequest {
    pub client_id: String,
    pub redirect_uri: Url,
    pub response_type: ResponseType,
    pub response_mode: ResponseMode,
    pub token_spec: TokenSpec,
    pub state: String,
    pub nonce: String,
}

/// Parameters of a logout request
#[derive(Debug, Clone)]
pub struct LogoutRequest {
    pub client_id: String,
    pub post_logout_redirect_uri: Url,
    pub id_token: IdToken,
    pub state: String,
}

/// Generate a secure random token
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
