use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//
// ─── CALENDAR STREAK ──────────────────────────────────────────────────────────
//

/// Consecutive-day completion counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub count: u32,
    pub last_completion_day: Option<NaiveDate>,
}

impl StreakState {
    #[must_use]
    pub fn new(count: u32, last_completion_day: Option<NaiveDate>) -> Self {
        Self {
            count,
            last_completion_day,
        }
    }

    /// Credit a completed session on `today`.
    ///
    /// - already credited today: unchanged
    /// - last credit yesterday: count + 1
    /// - any older gap, or never credited: restart at 1
    ///
    /// Returns true if the state changed.
    pub fn record_completion(&mut self, today: NaiveDate) -> bool {
        let next = match self.last_completion_day {
            Some(last) if last == today => return false,
            Some(last) if today.pred_opt() == Some(last) => self.count.saturating_add(1),
            _ => 1,
        };
        self.count = next;
        self.last_completion_day = Some(today);
        true
    }

    /// Count as it should be displayed on `today`: a streak whose last credit is
    /// older than yesterday is already broken.
    #[must_use]
    pub fn current_on(&self, today: NaiveDate) -> u32 {
        match self.last_completion_day {
            Some(last) if last == today || today.pred_opt() == Some(last) => self.count,
            _ => 0,
        }
    }
}

//
// ─── SESSION STREAK ───────────────────────────────────────────────────────────
//

/// Consecutive-correct counter scoped to one in-progress session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStreak {
    current: u32,
    best: u32,
}

impl SessionStreak {
    /// Record one committed answer.
    pub fn record(&mut self, correct: bool) {
        if correct {
            self.current = self.current.saturating_add(1);
            self.best = self.best.max(self.current);
        } else {
            self.current = 0;
        }
    }

    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[must_use]
    pub fn best(&self) -> u32 {
        self.best
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn completing_day_after_extends_streak() {
        let mut s = StreakState::new(3, Some(day(9)));
        assert!(s.record_completion(day(10)));
        assert_eq!(s, StreakState::new(4, Some(day(10))));
    }

    #[test]
    fn duplicate_completion_same_day_is_idempotent() {
        let mut s = StreakState::new(3, Some(day(9)));
        s.record_completion(day(10));
        assert!(!s.record_completion(day(10)));
        assert_eq!(s, StreakState::new(4, Some(day(10))));
    }

    #[test]
    fn gap_resets_to_one() {
        let mut s = StreakState::new(7, Some(day(5)));
        s.record_completion(day(10));
        assert_eq!(s, StreakState::new(1, Some(day(10))));
    }

    #[test]
    fn first_completion_starts_at_one() {
        let mut s = StreakState::default();
        s.record_completion(day(1));
        assert_eq!(s.count, 1);
    }

    #[test]
    fn month_boundary_counts_as_consecutive() {
        let mut s = StreakState::new(2, NaiveDate::from_ymd_opt(2024, 2, 29));
        s.record_completion(day(1));
        assert_eq!(s.count, 3);
    }

    #[test]
    fn displayed_count_drops_after_gap() {
        let s = StreakState::new(5, Some(day(8)));
        assert_eq!(s.current_on(day(9)), 5);
        assert_eq!(s.current_on(day(10)), 0);
    }

    #[test]
    fn session_streak_resets_on_miss() {
        let mut s = SessionStreak::default();
        s.record(true);
        s.record(true);
        s.record(false);
        s.record(true);
        assert_eq!(s.current(), 1);
        assert_eq!(s.best(), 2);
    }
}
