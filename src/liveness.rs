use std::time::{Duration, Instant};

/// Silence longer than this marks a peer dead.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Last-contact bookkeeping for one session.
///
/// The dead flag is only a short-circuit: a live peer is re-checked against
/// the clock on every query, and a dead one comes back as soon as
/// [`Liveness::touch`] sees a new packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct Liveness {
    last_contact: Option<Instant>,
    dead: bool,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted packet.
    pub fn touch(&mut self, now: Instant) {
        self.last_contact = Some(now);
        self.dead = false;
    }

    pub fn is_alive(&mut self, now: Instant) -> bool {
        if self.dead {
            return false;
        }
        let alive = match self.last_contact {
            Some(at) => now.saturating_duration_since(at) <= LIVENESS_TIMEOUT,
            None => false,
        };
        self.dead = !alive;
        alive
    }

    pub fn last_contact(&self) -> Option<Instant> {
        self.last_contact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_contacted_is_dead() {
        let mut l = Liveness::new();
        assert!(!l.is_alive(Instant::now()));
    }

    #[test]
    fn test_timeout_boundary() {
        let t0 = Instant::now();
        let mut l = Liveness::new();
        l.touch(t0);
        assert!(l.is_alive(t0));
        assert!(l.is_alive(t0 + LIVENESS_TIMEOUT));
        assert!(!l.is_alive(t0 + LIVENESS_TIMEOUT + Duration::from_millis(1)));
    }

    #[test]
    fn test_dead_is_cached_until_touch() {
        let t0 = Instant::now();
        let mut l = Liveness::new();
        l.touch(t0);
        assert!(!l.is_alive(t0 + Duration::from_secs(3)));
        // Querying an earlier instant does not resurrect the peer.
        assert!(!l.is_alive(t0 + Duration::from_secs(1)));

        let t1 = t0 + Duration::from_secs(5);
        l.touch(t1);
        assert!(l.is_alive(t1 + Duration::from_millis(500)));
    }

    #[test]
    fn test_sessions_are_independent() {
        let t0 = Instant::now();
        let mut a = Liveness::new();
        let mut b = Liveness::new();
        a.touch(t0);
        b.touch(t0 + Duration::from_secs(2));
        let later = t0 + Duration::from_millis(3500);
        assert!(!a.is_alive(later));
        assert!(b.is_alive(later));
    }
}
