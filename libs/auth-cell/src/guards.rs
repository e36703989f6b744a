//! Route guards over the session state.

use shared_models::auth::{AuthState, UserRole};
use shared_models::gate::GateDecision;

pub const LOGIN_PATH: &str = "/autentificare";

/// Requires any signed-in user. Anonymous visitors go to the login page,
/// which is told where they were heading.
pub fn protected_route(state: &AuthState, path: &str) -> GateDecision {
    if state.loading {
        return GateDecision::Wait;
    }

    if !state.is_authenticated() {
        return GateDecision::redirect(format!("{}?from={}", LOGIN_PATH, path));
    }

    GateDecision::PassThrough
}

/// Requires a user with exactly `role`; anyone else is sent to their own home.
pub fn role_route(state: &AuthState, role: UserRole) -> GateDecision {
    if state.loading {
        return GateDecision::Wait;
    }

    match &state.user {
        Some(user) if user.role == role => GateDecision::PassThrough,
        Some(user) => GateDecision::redirect(user.role.home_path()),
        None => GateDecision::redirect(LOGIN_PATH),
    }
}
