//! Environment-based configuration types for the rpauth runtime settings.

use anyhow::Result;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;
use crate::oauth::correlation::{
    DEFAULT_LOGIN_NONCE, DEFAULT_LOGIN_STATE, DEFAULT_LOGOUT_STATE, FixedCorrelation,
};
use crate::oauth::redaction::RedactionStrategy;
use crate::oauth::types::AdminCredentials;

/// Identity provider base URL configuration
#[derive(Clone, Debug)]
pub struct IdpBaseUrl(Url);

/// Certificate bundles for HTTPS connections
#[derive(Clone, Debug, Default)]
pub struct CertificateBundles(Vec<String>);

/// HTTP client timeout configuration
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(Duration);

/// How state and nonce values are produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorrelationMode {
    Fixed,
    Random,
}

/// Identity token redaction strategy configuration
#[derive(Clone, Copy, Debug)]
pub struct RedactionStrategyConfig(RedactionStrategy);

/// Main application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub idp_base_url: IdpBaseUrl,
    pub idp_tenant: String,
    pub admin_credentials: AdminCredentials,
    pub certificate_bundles: CertificateBundles,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub correlation_mode: CorrelationMode,
    pub fixed_correlation: FixedCorrelation,
    pub redaction_strategy: RedactionStrategyConfig,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let idp_base_url: IdpBaseUrl = require_env("IDP_BASE_URL")?.try_into()?;
        let idp_tenant = non_empty("IDP_TENANT", require_env("IDP_TENANT")?)?;
        let admin_credentials = AdminCredentials::new(
            non_empty("IDP_ADMIN_USER", require_env("IDP_ADMIN_USER")?)?,
            require_env("IDP_ADMIN_PASSWORD")?,
        );
        let certificate_bundles: CertificateBundles =
            optional_env("CERTIFICATE_BUNDLES").try_into()?;
        let default_user_agent = format!("rpauth/{}", version()?);
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let correlation_mode: CorrelationMode =
            default_env("CORRELATION_MODE", "fixed").try_into()?;
        let fixed_correlation = FixedCorrelation {
            login_state: non_empty("LOGIN_STATE", default_env("LOGIN_STATE", DEFAULT_LOGIN_STATE))?,
            login_nonce: non_empty("LOGIN_NONCE", default_env("LOGIN_NONCE", DEFAULT_LOGIN_NONCE))?,
            logout_state: non_empty(
                "LOGOUT_STATE",
                default_env("LOGOUT_STATE", DEFAULT_LOGOUT_STATE),
            )?,
        };
        let redaction_strategy: RedactionStrategyConfig =
            default_env("REDACTION_STRATEGY", "literal").try_into()?;

        Ok(Self {
            version: version()?,
            idp_base_url,
            idp_tenant,
            admin_credentials,
            certificate_bundles,
            user_agent,
            http_client_timeout,
            correlation_mode,
            fixed_correlation,
            redaction_strategy,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn non_empty(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::EmptyValue(name))
    } else {
        Ok(value)
    }
}

impl TryFrom<String> for IdpBaseUrl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let url = Url::parse(&value).map_err(|e| ConfigError::UrlParsingFailed(value.clone(), e))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::UrlParsingFailed(
                value,
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        Ok(Self(url))
    }
}

impl AsRef<Url> for IdpBaseUrl {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<Option<String>> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>(),
        ))
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        duration_str::parse(&value)
            .map(Self)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for CorrelationMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "random" => Ok(Self::Random),
            _ => Err(ConfigError::InvalidChoice(
                "CORRELATION_MODE",
                value,
                "fixed, random",
            )),
        }
    }
}

impl TryFrom<String> for RedactionStrategyConfig {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "literal" => Ok(Self(RedactionStrategy::LiteralReplace)),
            "query" => Ok(Self(RedactionStrategy::QueryRewrite)),
            _ => Err(ConfigError::InvalidChoice(
                "REDACTION_STRATEGY",
                value,
                "literal, query",
            )),
        }
    }
}

impl AsRef<RedactionStrategy> for RedactionStrategyConfig {
    fn as_ref(&self) -> &RedactionStrategy {
        &self.0
    }
}
