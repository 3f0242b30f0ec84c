#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::{Duration, Instant};

/// Coalesces bursts of statement edits into one rebuild, fired a fixed
/// delay after the last edit.
#[derive(Debug, Clone)]
pub struct StatementDebounce {
    /// Quiet period.
    delay:    Duration,
    /// When the pending rebuild fires, if one is pending.
    deadline: Option<Instant>,
}

impl StatementDebounce {
    /// Nothing pending.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Records an edit at `now`, pushing the deadline back.
    pub fn poke(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// When the pending rebuild is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once per burst: when a rebuild is pending and `now` is past the
    /// deadline. Firing clears it.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_edits_fire_once() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut debounce = StatementDebounce::new(ms(300));

        let mut fired = 0;
        for offset in [0, 50, 100] {
            debounce.poke(start + ms(offset));
            if debounce.fire(start + ms(offset)) {
                fired += 1;
            }
        }
        assert!(!debounce.fire(start + ms(350)));
        for tick in (400..1000).step_by(50) {
            if debounce.fire(start + ms(tick)) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(debounce.deadline(), None);
    }

    #[test]
    fn separate_bursts_fire_separately() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut debounce = StatementDebounce::new(ms(100));

        debounce.poke(start);
        assert!(debounce.fire(start + ms(100)));
        debounce.poke(start + ms(500));
        assert!(!debounce.fire(start + ms(550)));
        assert!(debounce.fire(start + ms(600)));
    }
}
