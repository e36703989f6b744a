//! Keeps a status gate's decision current as its inputs change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use shared_models::auth::AuthState;
use shared_models::gate::{GateDecision, GateInput, Navigator, StatusGate};

use crate::observer::{Broadcaster, Subscription};

/// Snapshot of a profile query, as a data-fetching hook would expose it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<P> {
    pub loading: bool,
    pub data: Option<P>,
    pub error: Option<String>,
}

impl<P> QueryState<P> {
    pub fn loading() -> Self {
        Self { loading: true, data: None, error: None }
    }

    pub fn loaded(data: Option<P>) -> Self {
        Self { loading: false, data, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { loading: false, data: None, error: Some(error.into()) }
    }
}

impl<P> Default for QueryState<P> {
    fn default() -> Self {
        Self::loading()
    }
}

struct Inputs<P> {
    is_authenticated: bool,
    query: QueryState<P>,
    path: String,
}

pub struct GateMonitor<G: StatusGate> {
    gate: G,
    inputs: Mutex<Inputs<G::Profile>>,
    // Held from evaluation to emit so concurrent updates publish in order
    publishing: Mutex<()>,
    decisions: Broadcaster<GateDecision>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl<G> GateMonitor<G>
where
    G: StatusGate + 'static,
    G::Profile: Send + 'static,
{
    pub fn new(gate: G, path: impl Into<String>) -> Arc<Self> {
        Self::build(gate, path.into(), None)
    }

    pub fn with_navigator(gate: G, path: impl Into<String>, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        Self::build(gate, path.into(), Some(navigator))
    }

    fn build(gate: G, path: String, navigator: Option<Arc<dyn Navigator>>) -> Arc<Self> {
        let inputs = Inputs {
            is_authenticated: false,
            query: QueryState::loading(),
            path,
        };
        let initial = evaluate(&gate, &inputs);

        Arc::new(Self {
            gate,
            inputs: Mutex::new(inputs),
            publishing: Mutex::new(()),
            decisions: Broadcaster::new(initial),
            navigator,
        })
    }

    pub fn decision(&self) -> GateDecision {
        self.decisions.get_state()
    }

    pub fn decisions(&self) -> &Broadcaster<GateDecision> {
        &self.decisions
    }

    /// Follow the session's authentication flag from now on.
    pub fn watch_session(self: &Arc<Self>, session: &Broadcaster<AuthState>) -> Subscription {
        self.set_authenticated(session.get_state().is_authenticated());

        let monitor = Arc::downgrade(self);
        session.subscribe(move |state| {
            if let Some(monitor) = monitor.upgrade() {
                monitor.set_authenticated(state.is_authenticated());
            }
        })
    }

    /// Signing out also forgets the profile, so the next principal is gated
    /// on its own record.
    pub fn set_authenticated(&self, is_authenticated: bool) {
        {
            let mut inputs = self.lock();
            if inputs.is_authenticated && !is_authenticated {
                inputs.query = QueryState::loading();
            }
            inputs.is_authenticated = is_authenticated;
        }
        self.reevaluate();
    }

    pub fn set_query(&self, query: QueryState<G::Profile>) {
        self.lock().query = query;
        self.reevaluate();
    }

    pub fn set_path(&self, path: impl Into<String>) {
        self.lock().path = path.into();
        self.reevaluate();
    }

    /// Decision listeners run while publishing is held and must not feed
    /// inputs back synchronously. The navigator runs after it is released.
    fn reevaluate(&self) {
        let redirect = {
            let _publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
            let decision = evaluate(&self.gate, &self.lock());

            if decision == self.decisions.get_state() {
                return;
            }

            debug!("Gate decision changed: {:?}", decision);
            self.decisions.emit(decision.clone());
            decision.redirect_target().map(str::to_string)
        };

        if let (Some(to), Some(navigator)) = (redirect, &self.navigator) {
            navigator.navigate(&to, true);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inputs<G::Profile>> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evaluate<G: StatusGate>(gate: &G, inputs: &Inputs<G::Profile>) -> GateDecision {
    gate.evaluate(&GateInput {
        is_authenticated: inputs.is_authenticated,
        profile: inputs.query.data.as_ref(),
        loading: inputs.query.loading,
        failed: inputs.query.error.is_some(),
        path: &inputs.path,
    })
}
