//! Role-gated navigation.
//!
//! The guard decides, from the stored credential alone, whether a screen is rendered or
//! the user is sent elsewhere. It never calls the network and cannot tell an expired
//! credential from a revoked one, so it is a navigation aid and not an access-control
//! boundary: the remote API re-checks every request on its own.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::session::{BearerToken, ClaimedRole, Role, SessionState};

/// Where unauthenticated users are sent.
pub const LOGIN_PATH: &str = "/login";
/// Where authenticated users without the required role are sent.
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

/// Capability
///
/// What a route group requires from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    Admin,
    Professor,
}

impl Capability {
    fn required_role(&self) -> Option<Role> {
        match self {
            Capability::Authenticated => None,
            Capability::Admin => Some(Role::Admin),
            Capability::Professor => Some(Role::Professor),
        }
    }
}

/// GuardOutcome
///
/// Exactly one of these is produced for every (capability, credential) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Render(ClaimedRole),
    RedirectToLogin,
    RedirectToDefault,
}

/// decide
///
/// The pure guard decision:
/// - no credential, or one that cannot be decoded → login
/// - decoded, capability satisfied → render
/// - decoded, wrong role → default landing page (the user is valid, just not allowed here)
pub fn decide(capability: Capability, token: Option<&BearerToken>) -> GuardOutcome {
    let Some(token) = token else {
        return GuardOutcome::RedirectToLogin;
    };

    let role = match token.claimed_role() {
        Ok(role) => role,
        Err(e) => {
            tracing::debug!("guard rejected credential: {}", e);
            return GuardOutcome::RedirectToLogin;
        }
    };

    match capability.required_role() {
        None => GuardOutcome::Render(role),
        Some(required) if role.unverified() == required => GuardOutcome::Render(role),
        Some(_) => GuardOutcome::RedirectToDefault,
    }
}

async fn enforce(capability: Capability, session: SessionState, request: Request, next: Next) -> Response {
    match decide(capability, session.get().as_ref()) {
        GuardOutcome::Render(_) => next.run(request).await,
        GuardOutcome::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
        GuardOutcome::RedirectToDefault => Redirect::to(DEFAULT_LANDING_PATH).into_response(),
    }
}

/// require_authenticated
///
/// Middleware for screens open to any logged-in user.
pub async fn require_authenticated(
    State(session): State<SessionState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(Capability::Authenticated, session, request, next).await
}

/// require_admin
///
/// Middleware for the administration screens.
pub async fn require_admin(
    State(session): State<SessionState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(Capability::Admin, session, request, next).await
}

/// require_professor
///
/// Middleware for the professor screens (exam authoring, grading, course material).
pub async fn require_professor(
    State(session): State<SessionState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(Capability::Professor, session, request, next).await
}

/// PageContext
///
/// What a page handler needs from the session: the credential to scope backend calls
/// and the claimed role for rendering choices.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub token: BearerToken,
    pub role: ClaimedRole,
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
    SessionState: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionState::from_ref(state);
        let token = session.get().ok_or(Redirect::to(LOGIN_PATH))?;
        let role = token
            .claimed_role()
            .map_err(|_| Redirect::to(LOGIN_PATH))?;
        Ok(PageContext { token, role })
    }
}
