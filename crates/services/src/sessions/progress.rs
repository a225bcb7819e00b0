use serde::Serialize;

/// Position within a session, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 1-based position, never above `total`.
    pub current: usize,
    pub total: usize,
    /// `current / total` in whole percent, rounded; 0 for an empty session.
    pub percentage: u32,
}

impl Progress {
    #[must_use]
    pub fn at(index: usize, total: usize) -> Self {
        let current = (index + 1).min(total);
        let percentage = if total == 0 {
            0
        } else {
            let scaled = (current * 200 + total) / (total * 2);
            u32::try_from(scaled).unwrap_or(100)
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_clamped_to_total() {
        let p = Progress::at(5, 5);
        assert_eq!(p.current, 5);
        assert_eq!(p.percentage, 100);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(Progress::at(0, 3).percentage, 33);
        assert_eq!(Progress::at(1, 3).percentage, 67);
        assert_eq!(Progress::at(0, 8).percentage, 13);
        assert_eq!(Progress::at(0, 40).percentage, 3);
    }

    #[test]
    fn empty_session_is_zero() {
        assert_eq!(Progress::at(0, 0), Progress { current: 0, total: 0, percentage: 0 });
    }
}
