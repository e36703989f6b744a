//! Client-side token claims reader.
//!
//! This is a claims HINT, not a trust boundary: the signature is never checked
//! here. The identity it produces is only used as an optimistic placeholder
//! until the server answers, and every authorization decision is re-made
//! server-side.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use tracing::debug;

use shared_models::auth::{AuthUser, BearerToken, TokenClaims, UserRole};

/// Account status assumed for a token-derived identity.
pub const PLACEHOLDER_STATUS: &str = "ACTIVE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsOutcome {
    Identity(AuthUser),
    /// `exp` is in the past. The caller must drop the token from storage.
    Expired,
    Malformed,
}

impl ClaimsOutcome {
    pub fn into_user(self) -> Option<AuthUser> {
        match self {
            ClaimsOutcome::Identity(user) => Some(user),
            ClaimsOutcome::Expired | ClaimsOutcome::Malformed => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, ClaimsOutcome::Expired)
    }
}

pub fn read_claims(token: &BearerToken) -> ClaimsOutcome {
    read_claims_at(token, Utc::now().timestamp_millis())
}

/// Same as [`read_claims`] against an explicit clock, in Unix milliseconds.
pub fn read_claims_at(token: &BearerToken, now_millis: i64) -> ClaimsOutcome {
    // Split token into parts
    let parts: Vec<&str> = token.as_str().split('.').collect();
    if parts.len() != 3 {
        debug!("Token has {} segments, expected 3", parts.len());
        return ClaimsOutcome::Malformed;
    }

    let claims = match decode_claims(parts[1]) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Failed to decode token claims: {}", e);
            return ClaimsOutcome::Malformed;
        }
    };

    // Expiry wins over everything else
    if let Some(exp) = claims.exp {
        if exp * 1000.0 < now_millis as f64 {
            debug!("Token expired at {} (now: {})", exp, now_millis / 1000);
            return ClaimsOutcome::Expired;
        }
    }

    let (Some(user_id), Some(email), Some(role)) = (
        non_empty(claims.user_id),
        non_empty(claims.email),
        non_empty(claims.role),
    ) else {
        debug!("Token is missing a required identity claim");
        return ClaimsOutcome::Malformed;
    };

    let role = match role.parse::<UserRole>() {
        Ok(role) => role,
        Err(e) => {
            debug!("Token role claim rejected: {}", e);
            return ClaimsOutcome::Malformed;
        }
    };

    ClaimsOutcome::Identity(AuthUser {
        id: user_id,
        // Placeholder until `me` returns the real name
        full_name: email.clone(),
        email,
        role,
        status: PLACEHOLDER_STATUS.to_string(),
        phone: None,
        avatar_url: None,
        preferred_language: None,
        created_at: None,
    })
}

/// Decode the payload segment. Accepts both base64 alphabets, padded or not.
pub fn decode_claims(segment: &str) -> Result<TokenClaims, String> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| format!("Invalid claims encoding: {}", e))?;

    serde_json::from_slice(&bytes).map_err(|e| format!("Invalid claims format: {}", e))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};
    use assert_matches::assert_matches;
    use serde_json::json;

    const NOW_MILLIS: i64 = 1_700_000_000_000;

    #[test]
    fn test_valid_token_yields_placeholder_identity() {
        let user = TestUser::company_admin("firma@example.com");
        let token = JwtTestUtils::create_test_token(&user, "secret", Some(24));

        let outcome = read_claims(&token);

        assert_matches!(outcome, ClaimsOutcome::Identity(ref identity) => {
            assert_eq!(identity.id, user.id);
            assert_eq!(identity.email, "firma@example.com");
            assert_eq!(identity.full_name, "firma@example.com");
            assert_eq!(identity.role, UserRole::CompanyAdmin);
            assert_eq!(identity.status, "ACTIVE");
        });
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_expired_token(&user, "secret");

        assert_eq!(read_claims(&token), ClaimsOutcome::Expired);
    }

    #[test]
    fn test_expiry_checked_against_supplied_clock() {
        let token = JwtTestUtils::token_from_claims(&json!({
            "user_id": "u-1",
            "email": "a@b.ro",
            "role": "client",
            "exp": NOW_MILLIS / 1000 - 1
        }));
        assert!(read_claims_at(&token, NOW_MILLIS).is_expired());

        let token = JwtTestUtils::token_from_claims(&json!({
            "user_id": "u-1",
            "email": "a@b.ro",
            "role": "client",
            "exp": NOW_MILLIS / 1000 + 60
        }));
        assert_matches!(read_claims_at(&token, NOW_MILLIS), ClaimsOutcome::Identity(_));
    }

    #[test]
    fn test_token_without_exp_is_accepted() {
        let token = JwtTestUtils::token_from_claims(&json!({
            "user_id": "u-1",
            "email": "a@b.ro",
            "role": "global_admin"
        }));

        let user = read_claims_at(&token, NOW_MILLIS).into_user().unwrap();
        assert_eq!(user.role, UserRole::GlobalAdmin);
    }

    #[test]
    fn test_fractional_timestamps_are_accepted() {
        let token = JwtTestUtils::token_from_claims(&json!({
            "user_id": "u-1",
            "email": "a@b.ro",
            "role": "client",
            "exp": 4102444800.0,
            "iat": 1700000000.5
        }));
        assert_matches!(read_claims_at(&token, NOW_MILLIS), ClaimsOutcome::Identity(ref user) => {
            assert_eq!(user.id, "u-1");
        });

        let token = JwtTestUtils::token_from_claims(&json!({
            "user_id": "u-1",
            "email": "a@b.ro",
            "role": "client",
            "exp": NOW_MILLIS as f64 / 1000.0 - 0.5
        }));
        assert!(read_claims_at(&token, NOW_MILLIS).is_expired());
    }

    #[test]
    fn test_non_numeric_exp_is_ignored() {
        let token = JwtTestUtils::token_from_claims(&json!({
            "user_id": "u-1",
            "email": "a@b.ro",
            "role": "cleaner",
            "exp": "tomorrow",
            "iat": null
        }));
        assert_matches!(read_claims_at(&token, NOW_MILLIS), ClaimsOutcome::Identity(_));
    }

    #[test]
    fn test_wrong_segment_count_is_malformed() {
        assert_eq!(read_claims(&BearerToken::new("only.two")), ClaimsOutcome::Malformed);
        assert_eq!(read_claims(&BearerToken::new("a.b.c.d")), ClaimsOutcome::Malformed);
        assert_eq!(read_claims(&BearerToken::new("")), ClaimsOutcome::Malformed);
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let token = JwtTestUtils::create_malformed_token();
        assert_eq!(read_claims(&token), ClaimsOutcome::Malformed);
    }

    #[test]
    fn test_missing_required_claims_are_malformed() {
        for claims in [
            json!({ "email": "a@b.ro", "role": "client" }),
            json!({ "user_id": "u-1", "role": "client" }),
            json!({ "user_id": "u-1", "email": "a@b.ro" }),
            json!({ "user_id": "", "email": "a@b.ro", "role": "client" }),
            json!({ "user_id": "u-1", "email": "a@b.ro", "role": "janitor" }),
        ] {
            let token = JwtTestUtils::token_from_claims(&claims);
            assert_eq!(read_claims_at(&token, NOW_MILLIS), ClaimsOutcome::Malformed, "{}", claims);
        }
    }

    #[test]
    fn test_expired_wins_over_missing_claims() {
        let token = JwtTestUtils::token_from_claims(&json!({ "exp": 1 }));
        assert!(read_claims_at(&token, NOW_MILLIS).is_expired());
    }

    #[test]
    fn test_decode_claims_accepts_padded_standard_alphabet() {
        use base64::engine::general_purpose::STANDARD;

        let payload = json!({ "user_id": "u?>", "email": "x@y.ro", "role": "cleaner" }).to_string();
        let segment = STANDARD.encode(payload);

        let claims = decode_claims(&segment).unwrap();
        assert_eq!(claims.user_id.as_deref(), Some("u?>"));
        assert_eq!(claims.role.as_deref(), Some("cleaner"));
    }
}
