//! Globally unique identifiers used throughout XMMCG.
//!
//! Entity IDs created by callers use UUIDv7 for time-ordered sorting.
//! IDs created by the allocation and review passes are derived with SHA-256
//! from the inputs that produced them, so a retried pass yields the same IDs.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash a domain-separated payload down to a UUID.
fn derive_uuid(domain: &[u8], parts: &[&[u8]]) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    Uuid::from_bytes(bytes)
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of a competitor. Supplied by the identity collaborator.
    ParticipantId,
    "participant"
);

uuid_id!(
    /// A song uploaded by a participant; the item auctioned in the first round.
    SongId,
    "song"
);

uuid_id!(
    /// A bid admitted into a round's bid book.
    BidId,
    "bid"
);

uuid_id!(
    /// A committed review score.
    ReviewId,
    "review"
);

// ---------------------------------------------------------------------------
// SubmissionId
// ---------------------------------------------------------------------------

/// A chart submission: a first half registered by a song winner, or a second
/// half materialized when a first half is won in the submission round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The id of the continuation submission created by `allocation`.
    ///
    /// Derived, so re-running a failed commit cannot mint a second id.
    #[must_use]
    pub fn continuation_of(allocation: AllocationId) -> Self {
        Self(derive_uuid(
            b"xmmcg:continuation:v1:",
            &[allocation.0.as_bytes()],
        ))
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "submission:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoundId
// ---------------------------------------------------------------------------

/// Monotonically increasing identifier for an allocation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RoundId(pub u64);

impl RoundId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// Anything a round can auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ItemId {
    Song(SongId),
    Submission(SubmissionId),
}

impl ItemId {
    /// Stable byte encoding used in hashes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 17] {
        let (tag, uuid) = match self {
            Self::Song(id) => (0u8, id.0),
            Self::Submission(id) => (1u8, id.0),
        };
        let mut out = [0u8; 17];
        out[0] = tag;
        out[1..].copy_from_slice(uuid.as_bytes());
        out
    }

    #[must_use]
    pub fn as_song(&self) -> Option<SongId> {
        match self {
            Self::Song(id) => Some(*id),
            Self::Submission(_) => None,
        }
    }

    #[must_use]
    pub fn as_submission(&self) -> Option<SubmissionId> {
        match self {
            Self::Submission(id) => Some(*id),
            Self::Song(_) => None,
        }
    }
}

impl From<SongId> for ItemId {
    fn from(id: SongId) -> Self {
        Self::Song(id)
    }
}

impl From<SubmissionId> for ItemId {
    fn from(id: SubmissionId) -> Self {
        Self::Submission(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Song(id) => write!(f, "{id}"),
            Self::Submission(id) => write!(f, "{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// AllocationId
// ---------------------------------------------------------------------------

/// Identifier of an allocation result. Unique per (round, item).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AllocationId(pub Uuid);

impl AllocationId {
    /// Every pass over the same round derives the same id for the same item.
    #[must_use]
    pub fn deterministic(round: RoundId, item: ItemId) -> Self {
        Self(derive_uuid(
            b"xmmcg:allocation:v1:",
            &[&round.0.to_le_bytes(), &item.to_bytes()],
        ))
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AssignmentId
// ---------------------------------------------------------------------------

/// Identifier of a review assignment. Unique per (round, reviewer, submission).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    #[must_use]
    pub fn deterministic(round: RoundId, reviewer: ParticipantId, submission: SubmissionId) -> Self {
        Self(derive_uuid(
            b"xmmcg:assignment:v1:",
            &[
                &round.0.to_le_bytes(),
                reviewer.0.as_bytes(),
                submission.0.as_bytes(),
            ],
        ))
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assignment:{}", self.0)
    }
}

/// Shorthand for token amounts. Balances are unsigned, so they can never go negative.
pub type Tokens = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_uniqueness_and_ordering() {
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn round_id_next() {
        assert_eq!(RoundId(5).next(), RoundId(6));
    }

    #[test]
    fn allocation_id_deterministic() {
        let item = ItemId::Song(SongId::from_bytes([7; 16]));
        let a = AllocationId::deterministic(RoundId(1), item);
        let b = AllocationId::deterministic(RoundId(1), item);
        assert_eq!(a, b);
        assert_ne!(a, AllocationId::deterministic(RoundId(2), item));
    }

    #[test]
    fn song_and_submission_with_same_uuid_differ() {
        let song = ItemId::Song(SongId::from_bytes([3; 16]));
        let sub = ItemId::Submission(SubmissionId::from_bytes([3; 16]));
        assert_ne!(
            AllocationId::deterministic(RoundId(1), song),
            AllocationId::deterministic(RoundId(1), sub)
        );
    }

    #[test]
    fn assignment_id_depends_on_direction() {
        let p = ParticipantId::from_bytes([1; 16]);
        let s = SubmissionId::from_bytes([2; 16]);
        let q = ParticipantId::from_bytes([2; 16]);
        let t = SubmissionId::from_bytes([1; 16]);
        assert_ne!(
            AssignmentId::deterministic(RoundId(1), p, s),
            AssignmentId::deterministic(RoundId(1), q, t)
        );
    }

    #[test]
    fn continuation_id_is_stable() {
        let item = ItemId::Submission(SubmissionId::from_bytes([9; 16]));
        let alloc = AllocationId::deterministic(RoundId(2), item);
        assert_eq!(
            SubmissionId::continuation_of(alloc),
            SubmissionId::continuation_of(alloc)
        );
    }

    #[test]
    fn display_prefixes() {
        assert!(RoundId(3).to_string().starts_with("round:"));
        assert!(SongId::new().to_string().starts_with("song:"));
        assert!(ParticipantId::new().to_string().starts_with("participant:"));
    }

    #[test]
    fn serde_roundtrips() {
        let item = ItemId::Submission(SubmissionId::new());
        let json = serde_json::to_string(&item).unwrap();
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }
}
