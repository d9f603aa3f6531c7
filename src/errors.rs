//! Standardized error types following the `error-rpauth-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-rpauth-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when version information is not available
    #[error("error-rpauth-config-2 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when a URL setting cannot be parsed
    #[error("error-rpauth-config-3 Unable to parse URL '{0}': {1}")]
    UrlParsingFailed(String, url::ParseError),

    /// Error when duration string cannot be parsed
    #[error("error-rpauth-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when an enumerated setting has an unknown value
    #[error("error-rpauth-config-5 Invalid value '{1}' for {0}: expected one of {2}")]
    InvalidChoice(&'static str, String, &'static str),

    /// Error when a setting that must not be empty is empty
    #[error("error-rpauth-config-6 {0} must not be empty")]
    EmptyValue(&'static str),
}

/// Errors reported by the identity provider or its client library.
///
/// Every variant names the remote operation that produced it so a caller can tell a
/// failed registration from a failed listing without inspecting the message.
#[derive(Debug, Error)]
pub enum IdentityProviderError {
    /// The request never produced a usable response (connect, TLS, timeout, I/O)
    #[error("error-rpauth-idp-1 Transport failure during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The request or response violated the protocol (bad parameters, undecodable body)
    #[error("error-rpauth-idp-2 Protocol failure during {operation}: {message}")]
    Protocol {
        operation: &'static str,
        message: String,
    },

    /// The identity provider answered with an error status
    #[error("error-rpauth-idp-3 Identity provider rejected {operation} with status {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },
}

impl IdentityProviderError {
    /// Name of the remote operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            IdentityProviderError::Transport { operation, .. }
            | IdentityProviderError::Protocol { operation, .. }
            | IdentityProviderError::Api { operation, .. } => *operation,
        }
    }
}

/// Client registration and request URI errors
#[derive(Debug, Error)]
pub enum AuthClientError {
    /// No registered client matches the redirect URI after the registration attempt
    #[error(
        "error-rpauth-client-1 Client for redirect URI {redirect_uri} expected to be registered, but not found"
    )]
    RegistrationFailed {
        redirect_uri: String,
        #[source]
        source: Option<IdentityProviderError>,
    },

    /// Listing registered clients failed during recovery
    #[error(
        "error-rpauth-client-2 Failed to list registered clients: {source}{}",
        registration_note(.register_error)
    )]
    ListingFailed {
        #[source]
        source: IdentityProviderError,
        /// Error of the registration attempt that preceded the listing
        register_error: Option<IdentityProviderError>,
    },

    /// The logout URI does not carry a usable id_token_hint parameter
    #[error("error-rpauth-client-3 Logout URI {uri} has invalid format: {reason}")]
    MalformedLogoutUri { uri: String, reason: &'static str },

    /// The identity provider library rejected request URI parameters
    #[error("error-rpauth-client-4 Failed to build {operation} URI: {source}")]
    ProtocolBuildFailure {
        operation: &'static str,
        #[source]
        source: IdentityProviderError,
    },

    /// The administrative token could not be obtained
    #[error("error-rpauth-client-5 Failed to acquire administrative token: {0}")]
    AdminTokenAcquisitionFailed(#[source] IdentityProviderError),

    /// Wraps any failure of the implicit client registration sequence
    #[error(
        "error-rpauth-client-6 Failed to register implicit client with loginRedirectURI {login_redirect_uri} and logoutRedirectURI {logout_redirect_uri}"
    )]
    ImplicitClientFailed {
        login_redirect_uri: String,
        logout_redirect_uri: String,
        #[source]
        source: Box<AuthClientError>,
    },
}

impl AuthClientError {
    /// Error returned by the registration call, when the registrar had to fall back
    /// to the client list because registration failed
    pub fn registration_error(&self) -> Option<&IdentityProviderError> {
        match self {
            AuthClientError::RegistrationFailed { source, .. } => source.as_ref(),
            AuthClientError::ListingFailed { register_error, .. } => register_error.as_ref(),
            AuthClientError::ImplicitClientFailed { source, .. } => source.registration_error(),
            _ => None,
        }
    }
}

fn registration_note(register_error: &Option<IdentityProviderError>) -> String {
    register_error
        .as_ref()
        .map(|e| format!(" (after registration failed: {})", e))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_registration_failure_exposes_cause() {
        let error = AuthClientError::RegistrationFailed {
            redirect_uri: "https://host/login".to_string(),
            source: Some(IdentityProviderError::Api {
                operation: "register client",
                status: 409,
                message: "conflict".to_string(),
            }),
        };

        assert!(error.to_string().starts_with("error-rpauth-client-1"));
        let cause = error.source().expect("cause should be attached");
        assert!(cause.to_string().contains("status 409"));
    }

    #[test]
    fn test_registration_failure_without_cause() {
        let error = AuthClientError::RegistrationFailed {
            redirect_uri: "https://host/login".to_string(),
            source: None,
        };
        assert!(error.source().is_none());
    }

    #[test]
    fn test_listing_failure_keeps_registration_error() {
        let error = AuthClientError::ListingFailed {
            source: IdentityProviderError::Transport {
                operation: "list clients",
                message: "connection refused".to_string(),
            },
            register_error: Some(IdentityProviderError::Api {
                operation: "register client",
                status: 500,
                message: "internal error".to_string(),
            }),
        };

        let message = error.to_string();
        assert!(message.contains("list clients"));
        assert!(message.contains("after registration failed"));
        assert_eq!(
            error.registration_error().map(|e| e.operation()),
            Some("register client")
        );
        assert_eq!(
            error.source().map(|e| e.to_string().contains("list clients")),
            Some(true)
        );
    }

    #[test]
    fn test_operation_name() {
        let error = IdentityProviderError::Transport {
            operation: "list clients",
            message: "connection refused".to_string(),
        };
        assert_eq!(error.operation(), "list clients");
    }
}
