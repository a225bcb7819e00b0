use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::AttemptId;

/// Process-wide record of attempts whose final score has been submitted.
///
/// Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct FinalizationLedger {
    finalized: Arc<Mutex<HashSet<AttemptId>>>,
}

impl FinalizationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id` for finalization. Returns false if it was already reserved.
    pub fn claim(&self, id: AttemptId) -> bool {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    /// Give back a reservation whose submission failed so a later event can retry.
    pub fn release(&self, id: AttemptId) {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    #[must_use]
    pub fn contains(&self, id: AttemptId) -> bool {
        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_granted_once_across_clones() {
        let ledger = FinalizationLedger::new();
        let other = ledger.clone();
        assert!(ledger.claim(AttemptId::new(1)));
        assert!(!other.claim(AttemptId::new(1)));
        assert!(other.claim(AttemptId::new(2)));
    }

    #[test]
    fn released_claim_can_be_retried() {
        let ledger = FinalizationLedger::new();
        assert!(ledger.claim(AttemptId::new(5)));
        ledger.release(AttemptId::new(5));
        assert!(!ledger.contains(AttemptId::new(5)));
        assert!(ledger.claim(AttemptId::new(5)));
    }
}
