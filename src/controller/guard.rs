/// Single-flight load guard with a per-session token.
///
/// `begin` refuses while a load is outstanding; the caller drops the request
/// rather than queueing it. `reset` starts a new session: it clears the flag
/// and bumps the token, so a response from the abandoned session can be
/// recognised and discarded when it arrives.
#[derive(Debug, Default)]
pub struct LoadGuard {
    loading: bool,
    token: u64,
}

impl LoadGuard {
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Claim the guard. Returns the session token, or `None` if a load is
    /// already in flight.
    pub fn begin(&mut self) -> Option<u64> {
        if self.loading {
            return None;
        }
        self.loading = true;
        Some(self.token)
    }

    /// Whether a response stamped with `token` belongs to the current session
    pub fn is_current(&self, token: u64) -> bool {
        self.token == token
    }

    /// Release the guard after the current session's response was handled.
    pub fn finish(&mut self) {
        self.loading = false;
    }

    pub fn reset(&mut self) {
        self.loading = false;
        self.token = self.token.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_refused() {
        let mut guard = LoadGuard::default();
        assert_eq!(guard.begin(), Some(0));
        assert_eq!(guard.begin(), None);

        guard.finish();
        assert_eq!(guard.begin(), Some(0));
    }

    #[test]
    fn test_reset_clears_flag_and_invalidates_token() {
        let mut guard = LoadGuard::default();
        let old = guard.begin().unwrap();

        guard.reset();
        assert!(!guard.is_loading());
        assert!(!guard.is_current(old));

        let new = guard.begin().unwrap();
        assert_ne!(old, new);
        assert!(guard.is_current(new));
    }
}
