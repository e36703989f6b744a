use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use auth_cell::{AuthService, MemoryTokenStore, SessionBackend};
use shared_config::SessionConfig;
use shared_models::auth::{AuthPayload, AuthState, AuthUser, UserRole};
use shared_models::error::BackendError;
use shared_utils::scheduler::TokioScheduler;

/// In-memory backend answering from canned scripts. `me()` answers `None`
/// once its script runs out.
#[derive(Default)]
pub struct ScriptedBackend {
    me_script: Mutex<VecDeque<Result<Option<AuthUser>, BackendError>>>,
    me_latency: Mutex<Duration>,
    sign_in_result: Mutex<Option<Result<AuthPayload, BackendError>>>,
    refresh_result: Mutex<Option<Result<Option<AuthPayload>, BackendError>>>,
    logout_error: Mutex<Option<BackendError>>,
    last_credential: Mutex<Option<(String, UserRole)>>,
    pub me_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub clear_store_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_me(&self, result: Result<Option<AuthUser>, BackendError>) {
        self.me_script.lock().unwrap().push_back(result);
    }

    pub fn set_me_latency(&self, latency: Duration) {
        *self.me_latency.lock().unwrap() = latency;
    }

    pub fn answer_sign_in(&self, result: Result<AuthPayload, BackendError>) {
        *self.sign_in_result.lock().unwrap() = Some(result);
    }

    pub fn answer_refresh(&self, result: Result<Option<AuthPayload>, BackendError>) {
        *self.refresh_result.lock().unwrap() = Some(result);
    }

    pub fn fail_logout(&self, error: BackendError) {
        *self.logout_error.lock().unwrap() = Some(error);
    }

    pub fn last_credential(&self) -> Option<(String, UserRole)> {
        self.last_credential.lock().unwrap().clone()
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn sign_in_with_google(&self, id_token: &str, role: UserRole) -> Result<AuthPayload, BackendError> {
        *self.last_credential.lock().unwrap() = Some((id_token.to_string(), role));
        self.sign_in_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(BackendError::GraphQl(vec!["invalid credential".to_string()])))
    }

    async fn me(&self) -> Result<Option<AuthUser>, BackendError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.me_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.me_script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        match self.logout_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn refresh_token(&self) -> Result<Option<AuthPayload>, BackendError> {
        self.refresh_result.lock().unwrap().clone().unwrap_or(Ok(None))
    }

    fn clear_store(&self) {
        self.clear_store_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn service(tokens: &Arc<MemoryTokenStore>) -> AuthService {
    AuthService::new(
        tokens.clone(),
        Arc::new(TokioScheduler),
        SessionConfig::default(),
        UserRole::Client,
    )
}

/// Every state the service emits from now on.
pub fn record(service: &AuthService) -> Arc<Mutex<Vec<AuthState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    service.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
    seen
}
