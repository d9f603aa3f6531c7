//! Correlation markers attached to login and logout requests.
//!
//! The default source hands out the same literal values on every call, matching what
//! deployed redirect targets expect. A random source is available for deployments
//! that validate state and nonce per request.

use super::types::generate_token;

pub const DEFAULT_LOGIN_STATE: &str = "L";
pub const DEFAULT_LOGOUT_STATE: &str = "E";
pub const DEFAULT_LOGIN_NONCE: &str = "1";

/// Source of `state` and `nonce` values
pub trait CorrelationSource: Send + Sync {
    /// `state` for an authentication request
    fn login_state(&self) -> String;

    /// `nonce` for an authentication request
    fn login_nonce(&self) -> String;

    /// `state` for a logout request
    fn logout_state(&self) -> String;
}

/// Literal correlation values, identical for every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedCorrelation {
    pub login_state: String,
    pub login_nonce: String,
    pub logout_state: String,
}

impl Default for FixedCorrelation {
    fn default() -> Self {
        Self {
            login_state: DEFAULT_LOGIN_STATE.to_string(),
            login_nonce: DEFAULT_LOGIN_NONCE.to_string(),
            logout_state: DEFAULT_LOGOUT_STATE.to_string(),
        }
    }
}

impl CorrelationSource for FixedCorrelation {
    fn login_state(&self) -> String {
        self.login_state.clone()
    }

    fn login_nonce(&self) -> String {
        self.login_nonce.clone()
    }

    fn logout_state(&self) -> String {
        self.logout_state.clone()
    }
}

/// Fresh unpredictable values for every request
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCorrelation;

impl CorrelationSource for RandomCorrelation {
    fn login_state(&self) -> String {
        generate_token()
    }

    fn login_nonce(&self) -> String {
        generate_token()
    }

    fn logout_state(&self) -> String {
        generate_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_defaults() {
        let source = FixedCorrelation::default();
        assert_eq!(source.login_state(), "L");
        assert_eq!(source.login_nonce(), "1");
        assert_eq!(source.logout_state(), "E");
    }

    #[test]
    fn test_random_values_differ() {
        let source = RandomCorrelation;
        assert_ne!(source.login_state(), source.login_state());
        assert_ne!(source.login_nonce(), source.logout_state());
    }
}
