use crate::error::RunError;

/// Consecutive authentication failures tolerated before giving up.
pub const MAX_AUTH_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated { token: String },
    /// No credentials configured; probes run without a token.
    Anonymous,
    /// Absorbing: every later authentication request is refused.
    Failed,
}

/// Per-worker authentication state. Never shared between workers.
#[derive(Debug, Clone)]
pub struct AuthSession {
    state: AuthState,
    failure_count: u32,
    max_failures: u32,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new(MAX_AUTH_FAILURES)
    }
}

impl AuthSession {
    #[must_use]
    pub const fn new(max_failures: u32) -> Self {
        Self {
            state: AuthState::Unauthenticated,
            failure_count: 0,
            max_failures,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &AuthState {
        &self.state
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match &self.state {
            AuthState::Authenticated { token } => Some(token),
            AuthState::Unauthenticated
            | AuthState::Authenticating
            | AuthState::Anonymous
            | AuthState::Failed => None,
        }
    }

    #[must_use]
    pub const fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Enters `Authenticating`.
    ///
    /// # Errors
    ///
    /// Returns `AuthExhausted` once the session has failed; no request may
    /// be made in that case.
    pub fn begin(&mut self) -> Result<(), RunError> {
        if matches!(self.state, AuthState::Failed) {
            return Err(RunError::AuthExhausted {
                attempts: self.failure_count,
            });
        }
        self.state = AuthState::Authenticating;
        Ok(())
    }

    pub fn succeed(&mut self, token: String) {
        self.state = AuthState::Authenticated { token };
        self.failure_count = 0;
    }

    /// Login was skipped for lack of credentials; not counted as a failure.
    pub fn skip(&mut self) {
        self.state = AuthState::Anonymous;
    }

    pub fn fail(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.state = if self.failure_count >= self.max_failures {
            AuthState::Failed
        } else {
            AuthState::Unauthenticated
        };
    }

    /// Drops the held token after the server rejected it.
    pub fn invalidate(&mut self) {
        if matches!(self.state, AuthState::Authenticated { .. }) {
            self.state = AuthState::Unauthenticated;
        }
    }
}
