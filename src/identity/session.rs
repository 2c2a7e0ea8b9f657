use tracing::debug;

use super::role::{Operation, Role};
use crate::credentials::CredentialStore;
use crate::error::{AuthError, AuthorizationError};

/// Per-connection authentication state.
///
/// A session starts unauthenticated, becomes `Authenticated(identity, role)`
/// after a successful login, and returns to unauthenticated on logout. The
/// role is cached at login time; it is not re-read from the credential store.
/// There is no implicit global session anywhere: each frontend connection owns
/// exactly one `Session` value and passes it through every gated call.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Option<(String, Role)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Username of the authenticated user, if any.
    pub fn identity(&self) -> Option<&str> {
        self.state.as_ref().map(|(u, _)| u.as_str())
    }

    /// Role cached at login time, if authenticated.
    pub fn role(&self) -> Option<Role> {
        self.state.as_ref().map(|(_, r)| *r)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_some()
    }

    /// Authenticate against the credential store. On success the session
    /// transitions to the authenticated state; on failure it is left exactly
    /// as it was.
    pub fn login(&mut self, store: &CredentialStore, username: &str, secret: &str) -> Result<(), AuthError> {
        let role = store.verify(username, secret)?;
        debug!(user = username, role = %role, "session.login");
        self.state = Some((username.to_string(), role));
        Ok(())
    }

    /// Drop the authenticated identity. Idempotent; safe on a session that
    /// never logged in.
    pub fn logout(&mut self) {
        if let Some((user, _)) = self.state.take() {
            debug!(user = %user, "session.logout");
        }
    }

    /// Exact-match-or-admin role check.
    pub fn authorize(&self, required: Role) -> Result<(), AuthorizationError> {
        let Some((_, role)) = &self.state else {
            return Err(AuthorizationError::NotAuthenticated);
        };
        if *role == required || *role == Role::Admin {
            Ok(())
        } else {
            Err(AuthorizationError::InsufficientRole)
        }
    }

    /// Policy-table check; the sole authorization boundary for gated
    /// operations. Admin passes everything, other roles consult
    /// `Role::allows`.
    pub fn permit(&self, op: Operation) -> Result<(), AuthorizationError> {
        let Some((user, role)) = &self.state else {
            return Err(AuthorizationError::NotAuthenticated);
        };
        if role.allows(op) {
            Ok(())
        } else {
            debug!(user = %user, role = %role, op = ?op, "session.permit denied");
            Err(AuthorizationError::InsufficientRole)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_denies_everything() {
        let s = Session::new();
        assert!(!s.is_authenticated());
        assert!(s.identity().is_none());
        for r in Role::ALL {
            assert!(matches!(s.authorize(r), Err(AuthorizationError::NotAuthenticated)));
        }
        assert!(matches!(s.permit(Operation::ViewPatients), Err(AuthorizationError::NotAuthenticated)));
    }

    #[test]
    fn logout_is_idempotent() {
        let mut s = Session::new();
        s.logout();
        s.logout();
        assert!(!s.is_authenticated());
    }
}
