use std::fmt;
use std::str::FromStr;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown user role: {0}")]
pub struct UnknownRole(pub String);

/// Platform role of the authenticated principal.
///
/// Tokens carry the storage form (`company_admin`) while the GraphQL layer
/// answers with the schema form (`COMPANY_ADMIN`); parsing accepts both so
/// role comparisons do not depend on where the value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum UserRole {
    Client,
    CompanyAdmin,
    Cleaner,
    GlobalAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Client => "CLIENT",
            UserRole::CompanyAdmin => "COMPANY_ADMIN",
            UserRole::Cleaner => "CLEANER",
            UserRole::GlobalAdmin => "GLOBAL_ADMIN",
        }
    }

    /// Landing path for the role's own area of the application.
    pub fn home_path(&self) -> &'static str {
        match self {
            UserRole::Client => "/cont",
            UserRole::CompanyAdmin => "/firma",
            UserRole::Cleaner => "/worker",
            UserRole::GlobalAdmin => "/admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        match normalized.as_str() {
            "CLIENT" => Ok(UserRole::Client),
            "COMPANY_ADMIN" => Ok(UserRole::CompanyAdmin),
            "CLEANER" => Ok(UserRole::Cleaner),
            "GLOBAL_ADMIN" => Ok(UserRole::GlobalAdmin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Identity projection of the signed-in user. Replaced wholesale on every
/// successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub status: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub loading: bool,
}

impl AuthState {
    pub fn loading(user: Option<AuthUser>) -> Self {
        Self { user, loading: true }
    }

    pub fn resolved(user: Option<AuthUser>) -> Self {
        Self { user, loading: false }
    }

    pub fn authenticated(user: AuthUser) -> Self {
        Self::resolved(Some(user))
    }

    pub fn unauthenticated() -> Self {
        Self::resolved(None)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Loading has finished, whichever way it went.
    pub fn is_settled(&self) -> bool {
        !self.loading
    }
}

impl Default for AuthState {
    /// Nothing is known before the first fetch, so the session starts loading.
    fn default() -> Self {
        Self::loading(None)
    }
}

/// Opaque bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl From<String> for BearerToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BearerToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Device-local slot holding at most one session token.
///
/// Implementations never fail: an unavailable backing store reads as `None`
/// and writes to it are logged and dropped.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<BearerToken>;
    fn set(&self, token: &BearerToken);
    fn clear(&self);
}

/// Payload segment of a session token. Every field is optional on the wire;
/// the claims reader decides which ones are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Seconds since the epoch. Issuers may write fractions; anything that is
    /// not a number counts as absent.
    #[serde(default, deserialize_with = "lenient_number")]
    pub exp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub iat: Option<f64>,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Claim {
        Number(f64),
        Other(IgnoredAny),
    }

    Ok(match Option::<Claim>::deserialize(deserializer)? {
        Some(Claim::Number(n)) => Some(n),
        Some(Claim::Other(_)) | None => None,
    })
}

/// Answer of `signInWithGoogle` and `refreshToken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default)]
    pub token: Option<BearerToken>,
    #[serde(default)]
    pub user: Option<AuthUser>,
    #[serde(default)]
    pub is_new_user: bool,
}
