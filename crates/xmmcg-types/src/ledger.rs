//! Ledger entry types for the reservation model.
//!
//! Every participant has a `balance` (tokens owned) and a `reserved` amount
//! (held by open bids). Reservations never move tokens; only a committed
//! allocation debits the balance.

use serde::{Deserialize, Serialize};

use crate::Tokens;

/// One participant's token account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Tokens owned. Never negative.
    pub balance: Tokens,
    /// Sum of open-bid reservations. Never exceeds `balance`.
    pub reserved: Tokens,
    /// Lifetime credits.
    pub granted: Tokens,
    /// Lifetime committed debits.
    pub debited: Tokens,
}

impl LedgerEntry {
    /// A fresh account holding `tokens`.
    #[must_use]
    pub fn with_grant(tokens: Tokens) -> Self {
        Self {
            balance: tokens,
            reserved: 0,
            granted: tokens,
            debited: 0,
        }
    }

    /// Tokens not held by any reservation.
    #[must_use]
    pub fn available(&self) -> Tokens {
        self.balance.saturating_sub(self.reserved)
    }

    /// `balance == granted - debited` and `reserved <= balance`.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.reserved <= self.balance
            && self.debited <= self.granted
            && self.balance == self.granted - self.debited
    }
}
