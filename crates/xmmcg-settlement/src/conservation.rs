//! Token conservation invariant.
//!
//! ```text
//! ∀ participant: balance == granted - debited,  reserved <= balance
//! Σ balance == Σ granted - Σ debited
//! ```
//!
//! Checked before every commit touches the ledger, and again after it. A
//! violation means the ledger is corrupt and is surfaced as a consistency
//! error.

use xmmcg_ingress::Ledger;
use xmmcg_types::{CompetitionError, Result, Tokens};

/// Tracks supply-level totals independently of the per-account counters.
#[derive(Debug, Default)]
pub struct TokenConservation {
    granted: Tokens,
    debited: Tokens,
}

impl TokenConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_grant(&mut self, amount: Tokens) {
        self.granted += amount;
    }

    pub fn record_debit(&mut self, amount: Tokens) {
        self.debited += amount;
    }

    #[must_use]
    pub fn expected_supply(&self) -> Tokens {
        self.granted.saturating_sub(self.debited)
    }

    /// Check every account and the supply total.
    pub fn verify(&self, ledger: &Ledger) -> Result<()> {
        let snapshot = ledger.snapshot();
        for (participant, entry) in &snapshot {
            if !entry.is_conserved() {
                return Err(CompetitionError::ConservationViolation {
                    reason: format!(
                        "{participant}: balance {} reserved {} granted {} debited {}",
                        entry.balance, entry.reserved, entry.granted, entry.debited
                    ),
                });
            }
        }
        let actual: Tokens = snapshot.values().map(|e| e.balance).sum();
        let expected = self.expected_supply();
        if actual != expected {
            return Err(CompetitionError::ConservationViolation {
                reason: format!(
                    "supply {actual} != expected {expected} (granted={}, debited={})",
                    self.granted, self.debited
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use xmmcg_types::ParticipantId;

    use super::*;

    #[test]
    fn grants_and_debits_balance_out() {
        let ledger = Ledger::new();
        let mut supply = TokenConservation::new();
        let p = ParticipantId::new();
        ledger.open_account(p, 100).unwrap();
        supply.record_grant(100);
        ledger.debit(p, 30).unwrap();
        supply.record_debit(30);
        supply.verify(&ledger).unwrap();
        assert_eq!(supply.expected_supply(), 70);
    }

    #[test]
    fn untracked_grant_is_detected() {
        let ledger = Ledger::new();
        let supply = TokenConservation::new();
        ledger.open_account(ParticipantId::new(), 100).unwrap();
        assert!(matches!(
            supply.verify(&ledger),
            Err(CompetitionError::ConservationViolation { .. })
        ));
    }
}
