//! Token ledger with reservation accounting.
//!
//! Each participant's account sits behind its own mutex, so single-account
//! operations from different participants never contend. Operations that
//! touch several accounts go through [`Ledger::apply_batch`], which locks
//! the accounts in ascending `ParticipantId` order, stages every operation
//! on copies, and writes back only if all of them succeed.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use xmmcg_types::{CompetitionError, LedgerEntry, ParticipantId, Result, Tokens};

/// One ledger mutation, for batch application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    /// Hold `amount` against the balance for an open bid.
    Reserve { participant: ParticipantId, amount: Tokens },
    /// Drop a hold without moving tokens.
    Release { participant: ParticipantId, amount: Tokens },
    /// Turn a hold into a debit.
    Commit { participant: ParticipantId, amount: Tokens },
    /// Debit unreserved tokens directly. Used for fallback awards.
    Debit { participant: ParticipantId, amount: Tokens },
}

impl LedgerOp {
    #[must_use]
    pub fn participant(&self) -> ParticipantId {
        match *self {
            Self::Reserve { participant, .. }
            | Self::Release { participant, .. }
            | Self::Commit { participant, .. }
            | Self::Debit { participant, .. } => participant,
        }
    }

    /// Apply to a single entry. The entry is untouched on error.
    pub fn apply(&self, entry: &mut LedgerEntry) -> Result<()> {
        match *self {
            Self::Reserve { amount, .. } => {
                let available = entry.available();
                if amount > available {
                    return Err(CompetitionError::InsufficientFunds {
                        needed: amount,
                        available,
                    });
                }
                entry.reserved += amount;
            }
            Self::Release {
                participant,
                amount,
            } => {
                if amount > entry.reserved {
                    return Err(CompetitionError::ReservationUnderflow {
                        participant,
                        needed: amount,
                        reserved: entry.reserved,
                    });
                }
                entry.reserved -= amount;
            }
            Self::Commit {
                participant,
                amount,
            } => {
                if amount > entry.reserved {
                    return Err(CompetitionError::ReservationUnderflow {
                        participant,
                        needed: amount,
                        reserved: entry.reserved,
                    });
                }
                if amount > entry.balance {
                    return Err(CompetitionError::BalanceUnderflow {
                        participant,
                        needed: amount,
                        balance: entry.balance,
                    });
                }
                entry.reserved -= amount;
                entry.balance -= amount;
                entry.debited += amount;
            }
            Self::Debit {
                participant,
                amount,
            } => {
                if amount > entry.available() {
                    return Err(CompetitionError::BalanceUnderflow {
                        participant,
                        needed: amount,
                        balance: entry.available(),
                    });
                }
                entry.balance -= amount;
                entry.debited += amount;
            }
        }
        Ok(())
    }
}

/// Per-participant token accounts.
///
/// The ledger is the source of truth for balances. Bid admission reserves,
/// the settlement plane commits, releases, and debits.
pub struct Ledger {
    accounts: RwLock<HashMap<ParticipantId, Arc<Mutex<LedgerEntry>>>>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Open an account holding `initial` tokens.
    ///
    /// # Errors
    /// `DuplicateParticipant` if the account already exists.
    pub fn open_account(&self, participant: ParticipantId, initial: Tokens) -> Result<()> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&participant) {
            return Err(CompetitionError::DuplicateParticipant(participant));
        }
        accounts.insert(
            participant,
            Arc::new(Mutex::new(LedgerEntry::with_grant(initial))),
        );
        Ok(())
    }

    /// Grant additional tokens.
    pub fn credit(&self, participant: ParticipantId, amount: Tokens) -> Result<()> {
        self.with_account(participant, |entry| {
            entry.balance += amount;
            entry.granted += amount;
            Ok(())
        })
    }

    /// Hold `amount` for an open bid.
    ///
    /// # Errors
    /// `InsufficientFunds` if the unreserved balance is below `amount`.
    pub fn reserve(&self, participant: ParticipantId, amount: Tokens) -> Result<()> {
        self.apply(LedgerOp::Reserve {
            participant,
            amount,
        })
    }

    pub fn release(&self, participant: ParticipantId, amount: Tokens) -> Result<()> {
        self.apply(LedgerOp::Release {
            participant,
            amount,
        })
    }

    pub fn commit(&self, participant: ParticipantId, amount: Tokens) -> Result<()> {
        self.apply(LedgerOp::Commit {
            participant,
            amount,
        })
    }

    pub fn debit(&self, participant: ParticipantId, amount: Tokens) -> Result<()> {
        self.apply(LedgerOp::Debit {
            participant,
            amount,
        })
    }

    /// Apply one operation under the account's lock.
    pub fn apply(&self, op: LedgerOp) -> Result<()> {
        self.with_account(op.participant(), |entry| op.apply(entry))
    }

    /// Run `f` on a staged copy of the account while holding its lock.
    ///
    /// The copy is written back only if `f` succeeds, so `f` may check,
    /// mutate, and bail out without leaving a partial update behind. Every
    /// caller for the same participant is serialized.
    pub fn with_account<T>(
        &self,
        participant: ParticipantId,
        f: impl FnOnce(&mut LedgerEntry) -> Result<T>,
    ) -> Result<T> {
        let account = self.account(participant)?;
        let mut guard = account.lock();
        let mut staged = *guard;
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }

    /// Apply every operation or none.
    ///
    /// Accounts are locked in ascending id order and held until the batch
    /// is written back.
    pub fn apply_batch(&self, ops: &[LedgerOp]) -> Result<()> {
        let touched: BTreeSet<ParticipantId> = ops.iter().map(LedgerOp::participant).collect();
        let handles = touched
            .iter()
            .map(|p| self.account(*p).map(|a| (*p, a)))
            .collect::<Result<Vec<_>>>()?;

        let mut guards: Vec<_> = handles.iter().map(|(p, a)| (*p, a.lock())).collect();
        let mut staged: BTreeMap<ParticipantId, LedgerEntry> =
            guards.iter().map(|(p, g)| (*p, **g)).collect();

        for op in ops {
            let entry = staged
                .get_mut(&op.participant())
                .ok_or(CompetitionError::UnknownParticipant(op.participant()))?;
            op.apply(entry)?;
        }

        for (participant, guard) in &mut guards {
            if let Some(entry) = staged.get(&*participant) {
                **guard = *entry;
            }
        }
        Ok(())
    }

    /// Snapshot of one account.
    pub fn entry(&self, participant: ParticipantId) -> Result<LedgerEntry> {
        Ok(*self.account(participant)?.lock())
    }

    pub fn balance(&self, participant: ParticipantId) -> Result<Tokens> {
        Ok(self.entry(participant)?.balance)
    }

    #[must_use]
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.accounts.read().contains_key(&participant)
    }

    /// Every account, ordered by participant.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ParticipantId, LedgerEntry> {
        let handles: Vec<_> = self
            .accounts
            .read()
            .iter()
            .map(|(p, a)| (*p, Arc::clone(a)))
            .collect();
        handles.into_iter().map(|(p, a)| (p, *a.lock())).collect()
    }

    /// Sum of every balance.
    #[must_use]
    pub fn total_supply(&self) -> Tokens {
        self.snapshot().values().map(|e| e.balance).sum()
    }

    fn account(&self, participant: ParticipantId) -> Result<Arc<Mutex<LedgerEntry>>> {
        self.accounts
            .read()
            .get(&participant)
            .cloned()
            .ok_or(CompetitionError::UnknownParticipant(participant))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
