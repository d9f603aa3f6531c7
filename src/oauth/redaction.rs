//! Identity token redaction for logout request URIs.
//!
//! Logout URIs carry the caller's identity token in the `id_token_hint` query
//! parameter. Before such a URI leaves this crate the raw token is replaced by a
//! placeholder so it can be handed to clients and logged.

use crate::errors::AuthClientError;
use url::{Url, form_urlencoded};

pub const ID_TOKEN_HINT_KEY: &str = "id_token_hint";
pub const ID_TOKEN_PLACEHOLDER: &str = "[ID_TOKEN_PLACEHOLDER]";

type Result<T> = std::result::Result<T, AuthClientError>;

/// How the raw token value is swapped for the placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionStrategy {
    /// Replace every occurrence of the raw value in the serialized URI
    #[default]
    LiteralReplace,
    /// Replace only the value of the `id_token_hint` pair, leaving every other pair as-is
    QueryRewrite,
}

/// Replace the `id_token_hint` value of a logout URI with the placeholder.
pub fn replace_id_token_with_placeholder(logout_uri: &Url) -> Result<Url> {
    redact_id_token(logout_uri, RedactionStrategy::LiteralReplace)
}

/// Replace the `id_token_hint` value of a logout URI using the given strategy.
pub fn redact_id_token(logout_uri: &Url, strategy: RedactionStrategy) -> Result<Url> {
    let raw_token = raw_id_token(logout_uri)?;

    match strategy {
        RedactionStrategy::LiteralReplace => {
            let redacted = logout_uri.as_str().replace(raw_token, ID_TOKEN_PLACEHOLDER);
            Url::parse(&redacted).map_err(|_| malformed(logout_uri, "redacted URI does not parse"))
        }
        RedactionStrategy::QueryRewrite => {
            let query = logout_uri.query().unwrap_or_default();
            let mut replaced = false;
            let rewritten = query
                .split('&')
                .map(|pair| match pair.split_once('=') {
                    Some((key, _)) if !replaced && is_id_token_key(key) => {
                        replaced = true;
                        format!("{}={}", key, ID_TOKEN_PLACEHOLDER)
                    }
                    _ => pair.to_string(),
                })
                .collect::<Vec<_>>()
                .join("&");

            let mut redacted = logout_uri.clone();
            redacted.set_query(Some(&rewritten));
            Ok(redacted)
        }
    }
}

/// Whether the raw `id_token_hint` value also appears elsewhere in the URI, in which
/// case the literal strategy would alter more than the token itself.
pub fn token_collides(logout_uri: &Url) -> Result<bool> {
    let raw_token = raw_id_token(logout_uri)?;
    Ok(logout_uri.as_str().matches(raw_token).count() > 1)
}

/// Raw, still percent-encoded value of the first `id_token_hint` pair
fn raw_id_token(logout_uri: &Url) -> Result<&str> {
    let query = logout_uri
        .query()
        .ok_or_else(|| malformed(logout_uri, "missing query"))?;

    let value = query
        .split('&')
        .find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            is_id_token_key(key).then_some(value)
        })
        .ok_or_else(|| malformed(logout_uri, "missing id_token_hint parameter"))?;

    if value.is_empty() {
        return Err(malformed(logout_uri, "empty id_token_hint parameter"));
    }
    Ok(value)
}

fn is_id_token_key(raw_key: &str) -> bool {
    form_urlencoded::parse(raw_key.as_bytes())
        .next()
        .is_some_and(|(key, _)| key == ID_TOKEN_HINT_KEY)
}

fn malformed(logout_uri: &Url, reason: &'static str) -> AuthClientError {
    AuthClientError::MalformedLogoutUri {
        uri: logout_uri.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::generate_token;

    const LOGOUT_BASE: &str = "https://idp.example.com/openidconnect/logout/esxcloud";

    fn logout_uri(query: &str) -> Url {
        Url::parse(&format!("{}?{}", LOGOUT_BASE, query)).unwrap()
    }

    #[test]
    fn test_replaces_token_and_keeps_other_parameters() {
        let redacted =
            replace_id_token_with_placeholder(&logout_uri("id_token_hint=ABC123&state=E")).unwrap();
        assert_eq!(
            redacted.as_str(),
            format!("{}?id_token_hint=[ID_TOKEN_PLACEHOLDER]&state=E", LOGOUT_BASE)
        );
    }

    #[test]
    fn test_token_not_first_parameter() {
        let uri = logout_uri(
            "post_logout_redirect_uri=https%3A%2F%2Fhost%2Flogout&id_token_hint=aaa.bbb.ccc&state=E",
        );
        let redacted = replace_id_token_with_placeholder(&uri).unwrap();
        assert_eq!(
            redacted.query(),
            Some(
                "post_logout_redirect_uri=https%3A%2F%2Fhost%2Flogout&id_token_hint=[ID_TOKEN_PLACEHOLDER]&state=E"
            )
        );
    }

    #[test]
    fn test_missing_query_is_malformed() {
        let result = replace_id_token_with_placeholder(&Url::parse(LOGOUT_BASE).unwrap());
        assert!(matches!(
            result,
            Err(AuthClientError::MalformedLogoutUri { reason: "missing query", .. })
        ));
    }

    #[test]
    fn test_empty_token_is_malformed() {
        for query in ["id_token_hint=&state=E", "id_token_hint&state=E"] {
            let result = replace_id_token_with_placeholder(&logout_uri(query));
            assert!(
                matches!(
                    result,
                    Err(AuthClientError::MalformedLogoutUri {
                        reason: "empty id_token_hint parameter",
                        ..
                    })
                ),
                "query {} should be rejected",
                query
            );
        }
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let result = replace_id_token_with_placeholder(&logout_uri("state=E&id_token=ABC"));
        assert!(matches!(
            result,
            Err(AuthClientError::MalformedLogoutUri {
                reason: "missing id_token_hint parameter",
                ..
            })
        ));
    }

    #[test]
    fn test_first_id_token_hint_wins() {
        let uri = logout_uri("id_token_hint=FIRST&id_token_hint=SECOND");
        let redacted = redact_id_token(&uri, RedactionStrategy::QueryRewrite).unwrap();
        assert_eq!(
            redacted.query(),
            Some("id_token_hint=[ID_TOKEN_PLACEHOLDER]&id_token_hint=SECOND")
        );
    }

    #[test]
    fn test_percent_encoded_key_matches() {
        let redacted =
            replace_id_token_with_placeholder(&logout_uri("id%5Ftoken%5Fhint=ABC123")).unwrap();
        assert_eq!(
            redacted.query(),
            Some("id%5Ftoken%5Fhint=[ID_TOKEN_PLACEHOLDER]")
        );
    }

    #[test]
    fn test_colliding_token_differs_between_strategies() {
        let uri = logout_uri("id_token_hint=E&state=E");
        assert!(token_collides(&uri).unwrap());

        let literal = redact_id_token(&uri, RedactionStrategy::LiteralReplace).unwrap();
        let rewritten = redact_id_token(&uri, RedactionStrategy::QueryRewrite).unwrap();
        assert_eq!(
            rewritten.query(),
            Some("id_token_hint=[ID_TOKEN_PLACEHOLDER]&state=E")
        );
        assert_ne!(literal, rewritten);
    }

    #[test]
    fn test_strategies_agree_for_non_colliding_tokens() {
        for _ in 0..64 {
            let token = generate_token();
            let uri = logout_uri(&format!(
                "id_token_hint={}&post_logout_redirect_uri=https%3A%2F%2Fhost%2Flogout&state=E",
                token
            ));
            if token_collides(&uri).unwrap() {
                continue;
            }

            let literal = redact_id_token(&uri, RedactionStrategy::LiteralReplace).unwrap();
            let rewritten = redact_id_token(&uri, RedactionStrategy::QueryRewrite).unwrap();
            assert_eq!(literal.as_str(), rewritten.as_str());
            assert!(!literal.as_str().contains(&token));
        }
    }

    #[test]
    fn test_redacting_twice_keeps_placeholder() {
        let once =
            replace_id_token_with_placeholder(&logout_uri("id_token_hint=ABC123&state=E")).unwrap();
        let twice = replace_id_token_with_placeholder(&once).unwrap();
        assert_eq!(once, twice);
    }
}
