use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use shared_graphql::{FetchPolicy, GraphqlClient, Operation};
use shared_models::auth::{AuthPayload, AuthUser, UserRole};
use shared_models::error::BackendError;

pub const ME_QUERY: Operation = Operation {
    name: "Me",
    root: "me",
    document: r#"query Me {
  me { id email fullName role status phone avatarUrl preferredLanguage createdAt }
}"#,
};

pub const SIGN_IN_WITH_GOOGLE_MUTATION: Operation = Operation {
    name: "SignInWithGoogle",
    root: "signInWithGoogle",
    document: r#"mutation SignInWithGoogle($idToken: String!, $role: UserRole!) {
  signInWithGoogle(idToken: $idToken, role: $role) {
    token
    isNewUser
    user { id email fullName role status phone avatarUrl preferredLanguage createdAt }
  }
}"#,
};

pub const LOGOUT_MUTATION: Operation = Operation {
    name: "Logout",
    root: "logout",
    document: "mutation Logout { logout }",
};

pub const REFRESH_TOKEN_MUTATION: Operation = Operation {
    name: "RefreshToken",
    root: "refreshToken",
    document: r#"mutation RefreshToken {
  refreshToken {
    token
    user { id email fullName role status phone avatarUrl preferredLanguage createdAt }
  }
}"#,
};

/// The four session calls of the backend RPC surface.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn sign_in_with_google(&self, id_token: &str, role: UserRole) -> Result<AuthPayload, BackendError>;

    /// Live round trip; never answered from a cache.
    async fn me(&self) -> Result<Option<AuthUser>, BackendError>;

    async fn logout(&self) -> Result<(), BackendError>;

    async fn refresh_token(&self) -> Result<Option<AuthPayload>, BackendError>;

    /// Drop any cached query results.
    fn clear_store(&self);
}

#[async_trait]
impl SessionBackend for GraphqlClient {
    #[instrument(skip(self, id_token))]
    async fn sign_in_with_google(&self, id_token: &str, role: UserRole) -> Result<AuthPayload, BackendError> {
        self.mutate(
            &SIGN_IN_WITH_GOOGLE_MUTATION,
            json!({ "idToken": id_token, "role": role.as_str() }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn me(&self) -> Result<Option<AuthUser>, BackendError> {
        self.query(&ME_QUERY, json!({}), FetchPolicy::NetworkOnly).await
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), BackendError> {
        let _: Option<bool> = self.mutate(&LOGOUT_MUTATION, json!({})).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn refresh_token(&self) -> Result<Option<AuthPayload>, BackendError> {
        self.mutate(&REFRESH_TOKEN_MUTATION, json!({})).await
    }

    fn clear_store(&self) {
        GraphqlClient::clear_store(self);
    }
}
