//! Authoritative "who am I" resolution with a single-retry policy.
//!
//! A fetch cycle starts with a `loading: true` emit that keeps the last known
//! user, issues `me()`, and settles on exactly one `loading: false` emit. An
//! empty answer while a token is stored, or a transient failure, buys the cycle
//! one delayed retry; after that the cycle falls back to the identity decoded
//! from the stored token. Auth failures never retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use shared_config::SessionConfig;
use shared_models::auth::{AuthState, AuthUser, TokenStore};
use shared_models::error::BackendError;
use shared_utils::jwt::{read_claims, ClaimsOutcome};
use shared_utils::observer::Broadcaster;
use shared_utils::scheduler::{ScheduledTask, TaskScheduler};

use super::backend::SessionBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Fetching,
    RetryScheduled,
    Resolved,
}

struct Cycle {
    phase: FetchPhase,
    retried: bool,
    pending: Option<ScheduledTask>,
    // Bumped whenever a cycle starts or is abandoned; stale results compare unequal.
    epoch: u64,
}

impl Cycle {
    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
    }
}

enum Outcome {
    Settle(Option<AuthUser>),
    Retry(Duration),
}

pub struct SessionFetcher {
    backend: Arc<dyn SessionBackend>,
    tokens: Arc<dyn TokenStore>,
    session: Broadcaster<AuthState>,
    scheduler: Arc<dyn TaskScheduler>,
    config: SessionConfig,
    cycle: Mutex<Cycle>,
    this: Weak<SessionFetcher>,
}

impl SessionFetcher {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        tokens: Arc<dyn TokenStore>,
        session: Broadcaster<AuthState>,
        scheduler: Arc<dyn TaskScheduler>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            backend,
            tokens,
            session,
            scheduler,
            config,
            cycle: Mutex::new(Cycle {
                phase: FetchPhase::Idle,
                retried: false,
                pending: None,
                epoch: 0,
            }),
            this: this.clone(),
        })
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    pub fn phase(&self) -> FetchPhase {
        self.lock().phase
    }

    pub fn retry_pending(&self) -> bool {
        self.lock().pending.as_ref().is_some_and(|task| !task.is_cancelled() && !task.has_fired())
    }

    /// Start a fresh cycle. Any pending retry from an earlier cycle is
    /// cancelled and late answers from it are ignored.
    pub async fn fetch_current_user(&self) {
        let known = self.session.get_state().user;
        self.run_cycle(known).await;
    }

    /// Same as [`fetch_current_user`](Self::fetch_current_user), showing
    /// `known` while the request is in flight.
    pub(crate) async fn run_cycle(&self, known: Option<AuthUser>) {
        let epoch = {
            let mut cycle = self.lock();
            cycle.cancel_pending();
            cycle.retried = false;
            cycle.epoch += 1;
            cycle.phase = FetchPhase::Fetching;
            cycle.epoch
        };

        // Never blank the UI while asking
        self.session.emit(AuthState::loading(known));

        self.attempt(epoch).await;
    }

    /// Abandon the current cycle without emitting anything. Used when a
    /// sign-in or sign-out decides the session on its own.
    pub fn invalidate(&self) {
        let mut cycle = self.lock();
        cycle.cancel_pending();
        cycle.retried = false;
        cycle.epoch += 1;
        cycle.phase = FetchPhase::Idle;
    }

    async fn attempt(&self, epoch: u64) {
        let result = self.backend.me().await;

        let outcome = {
            let mut cycle = self.lock();
            if cycle.epoch != epoch {
                debug!("Discarding me() answer from a superseded fetch cycle");
                return;
            }

            let outcome = self.classify(&mut cycle, result);
            match outcome {
                Outcome::Retry(delay) => {
                    cycle.retried = true;
                    cycle.phase = FetchPhase::RetryScheduled;
                    cycle.pending = Some(self.schedule_retry(epoch, delay));
                }
                Outcome::Settle(_) => {
                    cycle.retried = false;
                    cycle.cancel_pending();
                    cycle.phase = FetchPhase::Resolved;
                }
            }
            outcome
        };

        // Retry leaves the emitted state as it is: loading, last user kept
        if let Outcome::Settle(user) = outcome {
            self.session.emit(AuthState::resolved(user));
        }
    }

    fn classify(&self, cycle: &mut Cycle, result: Result<Option<AuthUser>, BackendError>) -> Outcome {
        match result {
            Ok(Some(user)) => {
                debug!("Session resolved for user {}", user.id);
                Outcome::Settle(Some(user))
            }
            Ok(None) if !cycle.retried && self.tokens.get().is_some() => {
                debug!("me() returned no user while a token is stored, retrying once");
                Outcome::Retry(self.config.empty_retry_delay)
            }
            Ok(None) => Outcome::Settle(self.token_identity()),
            Err(e) if e.is_auth_failure() => {
                info!("Backend rejected the session: {}", e);
                self.tokens.clear();
                Outcome::Settle(None)
            }
            Err(e) if !cycle.retried => {
                warn!("Session fetch failed, retrying once: {}", e);
                Outcome::Retry(self.config.error_retry_delay)
            }
            Err(e) => {
                warn!("Session fetch failed again, falling back to token claims: {}", e);
                Outcome::Settle(self.token_identity())
            }
        }
    }

    fn schedule_retry(&self, epoch: u64, delay: Duration) -> ScheduledTask {
        let fetcher = self.this.clone();

        self.scheduler.schedule(
            delay,
            async move {
                if let Some(fetcher) = fetcher.upgrade() {
                    fetcher.retry(epoch).await;
                }
            }
            .boxed(),
        )
    }

    async fn retry(&self, epoch: u64) {
        {
            let mut cycle = self.lock();
            if cycle.epoch != epoch {
                debug!("Skipping retry for a superseded fetch cycle");
                return;
            }
            cycle.pending = None;
            cycle.phase = FetchPhase::Fetching;
        }

        debug!("Retrying session fetch");
        self.attempt(epoch).await;
    }

    /// Identity decoded from the stored token, or `None`. An expired token is
    /// removed from storage on the way.
    pub fn token_identity(&self) -> Option<AuthUser> {
        let token = self.tokens.get()?;

        match read_claims(&token) {
            ClaimsOutcome::Identity(user) => Some(user),
            ClaimsOutcome::Expired => {
                info!("Stored token has expired, clearing it");
                self.tokens.clear();
                None
            }
            ClaimsOutcome::Malformed => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
