//! OIDC relying-party core: client registration, request URI construction and
//! identity token redaction.

pub mod clients;
pub mod correlation;
pub mod redaction;
pub mod request_uri;
pub mod types;

// Re-export frequently used items from each module
pub use clients::ClientRegistrar;
pub use correlation::{CorrelationSource, FixedCorrelation, RandomCorrelation};
pub use redaction::{
    ID_TOKEN_PLACEHOLDER, RedactionStrategy, redact_id_token, replace_id_token_with_placeholder,
    token_collides,
};
pub use request_uri::RequestUriBuilder;
pub use types::{
    AdminCredentials, AuthenticationRequest, ClientAuthMethod, IdToken, ImplicitClient,
    LogoutRequest, OidcClient, OidcClientMetadata, OidcTokens, ResponseMode, ResponseType,
    TokenSpec, TokenType,
};
