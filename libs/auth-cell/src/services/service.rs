use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use shared_config::{AppConfig, SessionConfig};
use shared_models::auth::{AuthPayload, AuthState, AuthUser, BearerToken, TokenStore, UnknownRole, UserRole};
use shared_models::error::{BackendError, SessionError};
use shared_utils::observer::{Broadcaster, Subscription};
use shared_utils::scheduler::{TaskScheduler, TokioScheduler};

use super::backend::SessionBackend;
use super::fetcher::{FetchPhase, SessionFetcher};

/// Prefix of the pseudo-credential accepted by development backends.
pub const DEV_CREDENTIAL_PREFIX: &str = "dev_";

/// Result of a credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub user: AuthUser,
    pub is_new_user: bool,
}

struct Inner {
    tokens: Arc<dyn TokenStore>,
    session: Broadcaster<AuthState>,
    scheduler: Arc<dyn TaskScheduler>,
    config: SessionConfig,
    sign_in_role: UserRole,
    fetcher: OnceLock<Arc<SessionFetcher>>,
}

/// Composition root of the client session. Construct one per process and
/// hand out clones; every clone shares the same state.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl AuthService {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        scheduler: Arc<dyn TaskScheduler>,
        config: SessionConfig,
        sign_in_role: UserRole,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tokens,
                session: Broadcaster::new(AuthState::default()),
                scheduler,
                config,
                sign_in_role,
                fetcher: OnceLock::new(),
            }),
        }
    }

    /// Service with retry delays and surface role taken from `config`,
    /// scheduling retries on the tokio runtime.
    pub fn from_config(tokens: Arc<dyn TokenStore>, config: &AppConfig) -> Result<Self, UnknownRole> {
        let sign_in_role = config.sign_in_role.parse()?;
        Ok(Self::new(tokens, Arc::new(TokioScheduler), config.session_config(), sign_in_role))
    }

    /// Bind the backend and run the first fetch cycle. Only the first call
    /// does anything.
    #[instrument(skip_all)]
    pub async fn initialize(&self, backend: Arc<dyn SessionBackend>) {
        let fetcher = SessionFetcher::new(
            backend,
            Arc::clone(&self.inner.tokens),
            self.inner.session.clone(),
            Arc::clone(&self.inner.scheduler),
            self.inner.config,
        );

        if self.inner.fetcher.set(Arc::clone(&fetcher)).is_err() {
            debug!("AuthService already initialized");
            return;
        }

        // Optimistic identity so a slow network does not look like a logout
        let seed = fetcher.token_identity();
        if let Some(user) = &seed {
            debug!("Seeding session from token claims for user {}", user.id);
        }

        fetcher.run_cycle(seed).await;
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.fetcher.get().is_some()
    }

    pub fn get_state(&self) -> AuthState {
        self.inner.session.get_state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_state().is_authenticated()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.inner.session.subscribe(listener)
    }

    pub fn subscribe_stream(&self) -> broadcast::Receiver<AuthState> {
        self.inner.session.subscribe_stream()
    }

    /// The broadcaster itself, for components that follow the session.
    pub fn session(&self) -> &Broadcaster<AuthState> {
        &self.inner.session
    }

    pub fn token(&self) -> Option<BearerToken> {
        self.inner.tokens.get()
    }

    pub fn sign_in_role(&self) -> UserRole {
        self.inner.sign_in_role
    }

    pub fn fetch_phase(&self) -> FetchPhase {
        self.inner.fetcher.get().map_or(FetchPhase::Idle, |fetcher| fetcher.phase())
    }

    /// Exchange a Google identity token for a session and return the user.
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthUser, SessionError> {
        self.exchange_credential(id_token).await.map(|sign_in| sign_in.user)
    }

    /// Development sign-in through the same mutation, for backends that accept
    /// `dev_<email>` as a credential.
    pub async fn login_dev(&self, email: &str) -> Result<SignIn, SessionError> {
        self.exchange_credential(&format!("{}{}", DEV_CREDENTIAL_PREFIX, email)).await
    }

    #[instrument(skip_all, fields(role = %self.inner.sign_in_role))]
    pub async fn exchange_credential(&self, credential: &str) -> Result<SignIn, SessionError> {
        let fetcher = self.fetcher()?;

        let payload = fetcher
            .backend()
            .sign_in_with_google(credential, self.inner.sign_in_role)
            .await
            .map_err(|e| match e {
                BackendError::GraphQl(_) | BackendError::NotAuthenticated => {
                    SessionError::AuthExchange(e.to_string())
                }
                other => SessionError::Backend(other),
            })?;

        let AuthPayload { token, user, is_new_user } = payload;
        let user = user.ok_or_else(|| {
            SessionError::AuthExchange("sign-in returned no user".to_string())
        })?;

        // Whatever an earlier fetch cycle finds out is now stale
        fetcher.invalidate();

        match token {
            Some(token) if !token.is_empty() => self.inner.tokens.set(&token),
            _ => warn!("Sign-in returned no token, keeping the stored one"),
        }

        info!("Signed in user {} as {}", user.id, user.role);
        self.inner.session.emit(AuthState::authenticated(user.clone()));

        Ok(SignIn { user, is_new_user })
    }

    /// Sign out locally no matter what the backend says.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        let fetcher = self.inner.fetcher.get();

        if let Some(fetcher) = fetcher {
            fetcher.invalidate();

            if let Err(e) = fetcher.backend().logout().await {
                warn!("Server-side logout failed, clearing local session anyway: {}", e);
            }

            // A fetch started while the logout call was in flight must not win
            fetcher.invalidate();
        }

        self.inner.tokens.clear();
        self.inner.session.emit(AuthState::unauthenticated());

        if let Some(fetcher) = fetcher {
            fetcher.backend().clear_store();
        }

        info!("Signed out");
    }

    /// Ask for a fresh token for the current session. Failures are logged
    /// and leave the session as it was.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self) {
        let Some(fetcher) = self.inner.fetcher.get() else {
            debug!("Refresh before initialize, nothing to do");
            return;
        };

        match fetcher.backend().refresh_token().await {
            Ok(Some(payload)) => {
                if let Some(token) = payload.token.filter(|token| !token.is_empty()) {
                    self.inner.tokens.set(&token);
                    debug!("Stored refreshed token");
                }
                if let Some(user) = payload.user {
                    fetcher.invalidate();
                    self.inner.session.emit(AuthState::authenticated(user));
                }
            }
            Ok(None) => debug!("refreshToken returned nothing"),
            Err(e) => error!("Token refresh failed: {}", e),
        }
    }

    /// Re-run the session fetch, e.g. after a profile-changing action.
    pub async fn refetch_user(&self) {
        match self.inner.fetcher.get() {
            Some(fetcher) => fetcher.fetch_current_user().await,
            None => debug!("Refetch before initialize, nothing to do"),
        }
    }

    fn fetcher(&self) -> Result<&Arc<SessionFetcher>, SessionError> {
        self.inner.fetcher.get().ok_or(SessionError::NotInitialized)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("initialized", &self.is_initialized())
            .field("sign_in_role", &self.inner.sign_in_role)
            .field("state", &self.get_state())
            .finish()
    }
}
