use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::auth::TokenStore;
use shared_models::error::BackendError;

/// A named GraphQL document together with the root field its answer lives
/// under.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub root: &'static str,
    pub document: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Answer from the normalized result cache when possible.
    #[default]
    CacheFirst,
    /// Always hit the network; the answer still refreshes the cache.
    NetworkOnly,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

pub struct GraphqlClient {
    client: Client,
    endpoint: String,
    tokens: Option<Arc<dyn TokenStore>>,
    cache: Mutex<HashMap<String, Value>>,
}

impl GraphqlClient {
    pub fn new(config: &AppConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.graphql_timeout())
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.graphql_endpoint.clone(),
            tokens: None,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Attach the bearer token read from `tokens` to every request.
    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.as_ref().and_then(|tokens| tokens.get()) {
            match HeaderValue::from_str(&token.authorization_header()) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored token is not a valid header value, sending request anonymously"),
            }
        }

        headers
    }

    pub async fn query<T>(&self, operation: &Operation, variables: Value, policy: FetchPolicy) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let key = cache_key(operation, &variables);

        if policy == FetchPolicy::CacheFirst {
            if let Some(cached) = self.lock_cache().get(&key).cloned() {
                debug!("Cache hit for {}", operation.name);
                return decode(operation, cached);
            }
        }

        let value = self.execute(operation, variables).await?;
        self.lock_cache().insert(key, value.clone());

        decode(operation, value)
    }

    /// Mutations always go to the network and are never cached.
    pub async fn mutate<T>(&self, operation: &Operation, variables: Value) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let value = self.execute(operation, variables).await?;
        decode(operation, value)
    }

    /// Drop every cached result.
    pub fn clear_store(&self) {
        let mut cache = self.lock_cache();
        debug!("Clearing {} cached query results", cache.len());
        cache.clear();
    }

    pub fn cached_results(&self) -> usize {
        self.lock_cache().len()
    }

    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, BackendError> {
        debug!("Sending {} to {}", operation.name, self.endpoint);

        let body = json!({
            "operationName": operation.name,
            "query": operation.document,
            "variables": variables,
        });

        let response = self.client
            .post(&self.endpoint)
            .headers(self.get_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response.text().await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED {
            warn!("{} rejected with 401", operation.name);
            return Err(BackendError::Http { status: status.as_u16(), message: text });
        }

        let parsed = serde_json::from_str::<GraphqlResponse>(&text);

        if !status.is_success() {
            error!("GraphQL endpoint error ({}): {}", status, text);
            return Err(match parsed {
                Ok(response) if !response.errors.is_empty() => graphql_errors(response.errors),
                _ => BackendError::Http { status: status.as_u16(), message: text },
            });
        }

        let response = parsed.map_err(|e| BackendError::Decode(format!("Invalid GraphQL response: {}", e)))?;

        if !response.errors.is_empty() {
            let error = graphql_errors(response.errors);
            debug!("{} answered with errors: {}", operation.name, error);
            return Err(error);
        }

        let data = response.data.unwrap_or(Value::Null);
        Ok(data.get(operation.root).cloned().unwrap_or(Value::Null))
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(operation: &Operation, variables: &Value) -> String {
    format!("{}:{}", operation.name, variables)
}

fn graphql_errors(errors: Vec<GraphqlErrorEntry>) -> BackendError {
    BackendError::GraphQl(errors.into_iter().map(|e| e.message).collect())
}

fn decode<T: DeserializeOwned>(operation: &Operation, value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value)
        .map_err(|e| BackendError::Decode(format!("Invalid {} payload: {}", operation.root, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::auth::{AuthUser, BearerToken};
    use shared_utils::test_utils::{MockGraphqlResponses, TestConfig, TestUser};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ME: Operation = Operation {
        name: "Me",
        root: "me",
        document: "query Me { me { id email fullName role status } }",
    };

    struct FixedToken(&'static str);

    impl TokenStore for FixedToken {
        fn get(&self) -> Option<BearerToken> {
            Some(BearerToken::new(self.0))
        }
        fn set(&self, _token: &BearerToken) {}
        fn clear(&self) {}
    }

    async fn client_for(server: &MockServer) -> GraphqlClient {
        let config = TestConfig::with_endpoint(&format!("{}/query", server.uri())).to_app_config();
        GraphqlClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_query_sends_bearer_and_decodes_root_field() {
        let server = MockServer::start().await;
        let user = TestUser::cleaner("ana@example.com");

        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("authorization", "Bearer abc.def.ghi"))
            .and(body_partial_json(json!({ "operationName": "Me" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockGraphqlResponses::me_response(&user)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await.with_token_store(Arc::new(FixedToken("abc.def.ghi")));
        let me: Option<AuthUser> = client.query(&ME, json!({}), FetchPolicy::NetworkOnly).await.unwrap();

        assert_eq!(me, Some(user.to_auth_user()));
    }

    #[tokio::test]
    async fn test_null_root_decodes_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockGraphqlResponses::me_null_response()))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let me: Option<AuthUser> = client.query(&ME, json!({}), FetchPolicy::NetworkOnly).await.unwrap();

        assert!(me.is_none());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockGraphqlResponses::not_authenticated_response()))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.query::<Option<AuthUser>>(&ME, json!({}), FetchPolicy::NetworkOnly).await;

        assert_matches!(result, Err(ref e @ BackendError::GraphQl(_)) if e.is_auth_failure());
    }

    #[tokio::test]
    async fn test_http_401_maps_to_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.query::<Option<AuthUser>>(&ME, json!({}), FetchPolicy::NetworkOnly).await;

        assert_matches!(result, Err(BackendError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client
            .query::<Option<AuthUser>>(&ME, json!({}), FetchPolicy::NetworkOnly)
            .await
            .unwrap_err();

        assert_eq!(error, BackendError::Http { status: 502, message: "bad gateway".to_string() });
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config = TestConfig::with_endpoint("http://127.0.0.1:1/query").to_app_config();
        let client = GraphqlClient::new(&config).unwrap();

        let result = client.query::<Option<AuthUser>>(&ME, json!({}), FetchPolicy::NetworkOnly).await;

        assert_matches!(result, Err(BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_cache_first_reuses_result_until_store_cleared() {
        let server = MockServer::start().await;
        let user = TestUser::default();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockGraphqlResponses::me_response(&user)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        for _ in 0..3 {
            let me: Option<AuthUser> = client.query(&ME, json!({}), FetchPolicy::CacheFirst).await.unwrap();
            assert!(me.is_some());
        }
        assert_eq!(client.cached_results(), 1);

        client.clear_store();
        assert_eq!(client.cached_results(), 0);

        let _: Option<AuthUser> = client.query(&ME, json!({}), FetchPolicy::CacheFirst).await.unwrap();
    }

    #[tokio::test]
    async fn test_mutations_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockGraphqlResponses::logout_response()))
            .expect(2)
            .mount(&server)
            .await;

        const LOGOUT: Operation = Operation {
            name: "Logout",
            root: "logout",
            document: "mutation Logout { logout }",
        };

        let client = client_for(&server).await;
        let first: bool = client.mutate(&LOGOUT, json!({})).await.unwrap();
        let second: bool = client.mutate(&LOGOUT, json!({})).await.unwrap();

        assert!(first && second);
        assert_eq!(client.cached_results(), 0);
    }
}
