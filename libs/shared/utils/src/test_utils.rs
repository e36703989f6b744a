use std::sync::{Arc, Mutex};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, BearerToken, UserRole};
use shared_models::gate::Navigator;

pub struct TestConfig {
    pub graphql_endpoint: String,
    pub token_store_path: String,
    pub sign_in_role: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            graphql_endpoint: "http://localhost:8080/query".to_string(),
            token_store_path: "target/test-session.json".to_string(),
            sign_in_role: "CLIENT".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            graphql_endpoint: endpoint.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            graphql_endpoint: self.graphql_endpoint.clone(),
            token_store_path: self.token_store_path.clone(),
            sign_in_role: self.sign_in_role.clone(),
            empty_retry_delay_ms: 1000,
            error_retry_delay_ms: 2000,
            graphql_timeout_secs: 5,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// A principal as the token issuer sees it. Roles are kept in storage form
/// (`company_admin`), the way they appear inside real tokens.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "client".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn client(email: &str) -> Self {
        Self::new(email, "client")
    }

    pub fn company_admin(email: &str) -> Self {
        Self::new(email, "company_admin")
    }

    pub fn cleaner(email: &str) -> Self {
        Self::new(email, "cleaner")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "global_admin")
    }

    /// The user as the `me` query would return it.
    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: "Test User".to_string(),
            role: self.role.parse().unwrap_or(UserRole::Client),
            status: "ACTIVE".to_string(),
            phone: None,
            avatar_url: None,
            preferred_language: Some("ro".to_string()),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
        }
    }

    /// GraphQL `User` object for this principal.
    pub fn to_graphql(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "email": self.email,
            "fullName": "Test User",
            "role": self.role.to_uppercase(),
            "status": "ACTIVE",
            "phone": null,
            "avatarUrl": null,
            "preferredLanguage": "ro",
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> BearerToken {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let payload = json!({
            "user_id": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        Self::sign(&payload, secret)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> BearerToken {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> BearerToken {
        BearerToken::new("invalid.token.format")
    }

    /// Token carrying exactly the given claims, for edge cases.
    pub fn token_from_claims(claims: &serde_json::Value) -> BearerToken {
        Self::sign(claims, "test-secret")
    }

    fn sign(payload: &serde_json::Value, secret: &str) -> BearerToken {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        BearerToken::new(format!("{}.{}", signing_input, signature_encoded))
    }
}

pub struct MockGraphqlResponses;

impl MockGraphqlResponses {
    pub fn me_response(user: &TestUser) -> serde_json::Value {
        json!({ "data": { "me": user.to_graphql() } })
    }

    pub fn me_null_response() -> serde_json::Value {
        json!({ "data": { "me": null } })
    }

    pub fn sign_in_response(user: &TestUser, token: &BearerToken, is_new_user: bool) -> serde_json::Value {
        json!({
            "data": {
                "signInWithGoogle": {
                    "token": token.as_str(),
                    "user": user.to_graphql(),
                    "isNewUser": is_new_user
                }
            }
        })
    }

    pub fn refresh_response(user: &TestUser, token: &BearerToken) -> serde_json::Value {
        json!({
            "data": {
                "refreshToken": {
                    "token": token.as_str(),
                    "user": user.to_graphql()
                }
            }
        })
    }

    pub fn logout_response() -> serde_json::Value {
        json!({ "data": { "logout": true } })
    }

    pub fn my_company_response(status: &str, documents: &[&str]) -> serde_json::Value {
        let documents: Vec<serde_json::Value> = documents
            .iter()
            .map(|document_type| json!({
                "id": Uuid::new_v4().to_string(),
                "documentType": document_type,
                "fileName": format!("{}.pdf", document_type),
                "status": "PENDING",
                "uploadedAt": "2024-01-01T00:00:00Z"
            }))
            .collect();

        json!({
            "data": {
                "myCompany": {
                    "id": Uuid::new_v4().to_string(),
                    "companyName": "Curat SRL",
                    "cui": "RO12345678",
                    "status": status,
                    "rejectionReason": null,
                    "documents": documents
                }
            }
        })
    }

    pub fn my_cleaner_profile_response(status: &str, documents: &[&str]) -> serde_json::Value {
        let documents: Vec<serde_json::Value> = documents
            .iter()
            .map(|document_type| json!({
                "id": Uuid::new_v4().to_string(),
                "documentType": document_type,
                "fileName": format!("{}.pdf", document_type),
                "status": "PENDING",
                "uploadedAt": "2024-01-01T00:00:00Z"
            }))
            .collect();

        json!({
            "data": {
                "myCleanerProfile": {
                    "id": Uuid::new_v4().to_string(),
                    "fullName": "Ana Pop",
                    "status": status,
                    "avatarUrl": null,
                    "personalityAssessment": null,
                    "documents": documents
                }
            }
        })
    }

    pub fn not_authenticated_response() -> serde_json::Value {
        Self::error_response("not authenticated")
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({
            "data": null,
            "errors": [
                { "message": message, "path": [] }
            ]
        })
    }
}

/// Navigator that remembers every call instead of moving anywhere.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<(String, bool)>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<(String, bool)> {
        self.visits.lock().map(|visits| visits.clone()).unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, to: &str, replace: bool) {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push((to.to_string(), replace));
        }
    }
}
