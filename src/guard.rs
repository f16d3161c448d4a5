use std::time::{Duration, Instant};

/// Debounce policy for page reloads.
///
/// At most one reload is permitted per guard window. The recorded
/// last-reload instant never moves backwards: a denied request leaves
/// it untouched, and a grant records the caller's `now`.
pub struct ReloadGuard {
    window: Duration,
    last_reload: Option<Instant>,
}

impl ReloadGuard {
    /// Create a guard that permits one reload per `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_reload: None,
        }
    }

    /// Whether a reload may be issued at `now`.
    ///
    /// The first request is always granted. A grant records `now` as
    /// the last reload; a denial does not modify state.
    pub fn permit(&mut self, now: Instant) -> bool {
        match self.last_reload {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last_reload = Some(now);
                true
            }
        }
    }

    /// Time left until the next reload would be permitted, measured at `now`.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_reload {
            Some(last) => self.window.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_first_request_always_granted() {
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(Instant::now()));
    }

    #[test]
    fn test_request_inside_window_denied() {
        let base = Instant::now();
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(base));
        assert!(!guard.permit(base + Duration::from_secs(30)));
    }

    #[test]
    fn test_request_after_window_granted() {
        let base = Instant::now();
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(base));
        assert!(!guard.permit(base + Duration::from_secs(30)));
        assert!(guard.permit(base + Duration::from_secs(61)));
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let base = Instant::now();
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(base));
        // Exactly at the boundary the window has elapsed.
        assert!(guard.permit(base + WINDOW));
    }

    #[test]
    fn test_denial_does_not_extend_window() {
        let base = Instant::now();
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(base));
        // Repeated denied requests must not push the window forward.
        for secs in [10, 20, 30, 40, 50, 59] {
            assert!(!guard.permit(base + Duration::from_secs(secs)));
        }
        assert!(guard.permit(base + Duration::from_secs(60)));
    }

    #[test]
    fn test_grant_resets_window_from_grant_time() {
        let base = Instant::now();
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(base));
        assert!(guard.permit(base + Duration::from_secs(61)));
        // Window now runs from t=61, not t=0.
        assert!(!guard.permit(base + Duration::from_secs(90)));
        assert!(guard.permit(base + Duration::from_secs(121)));
    }

    #[test]
    fn test_remaining_before_any_reload_is_zero() {
        let guard = ReloadGuard::new(WINDOW);
        assert_eq!(guard.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_remaining_counts_down() {
        let base = Instant::now();
        let mut guard = ReloadGuard::new(WINDOW);
        assert!(guard.permit(base));
        assert_eq!(
            guard.remaining(base + Duration::from_secs(20)),
            Duration::from_secs(40)
        );
        assert_eq!(
            guard.remaining(base + Duration::from_secs(60)),
            Duration::ZERO
        );
        assert_eq!(
            guard.remaining(base + Duration::from_secs(90)),
            Duration::ZERO
        );
    }
}
