//! Competition service.
//!
//! [`Competition`] wires the admission, allocation, settlement, and review
//! planes together and exposes the operations callers use: bidding,
//! closing a round, registering first halves, building the review matrix,
//! and submitting reviews.
//!
//! ## Locking
//!
//! Each round sits behind its own `RwLock`. Acquisition order is fixed:
//!
//! ```text
//! round → settler → ledger accounts
//! round → submissions
//! board → submission
//! submission_rounds → round index
//! ```
//!
//! Closing a round seals its book under the write lock, runs the engine
//! with only the sealed snapshot, then retakes the write lock to commit.
//! Reads stay available while the engine runs; bids are refused because
//! the book is sealed.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use xmmcg_allocation::{FirstPriceAllocationEngine, SecondRoundAllocationEngine, SeededRandom};
use xmmcg_ingress::{BidAdmission, BidBook, Ledger, RoundSealer};
use xmmcg_review::{PeerReviewMatcher, ReviewBoard, ReviewRules, ScoreAggregator};
use xmmcg_settlement::{RoundSettler, SettlementReceipt};
use xmmcg_types::{
    AllocationPlan, AllocationResult, AnonymousReview, AssignmentId, Bid, CompetitionConfig,
    CompetitionError, ItemId, LedgerEntry, ParticipantId, RankingEntry, Result, Review,
    ReviewAssignment, Round, RoundId, RoundKind, RoundStatus, SealedRound, Song, SongId,
    Submission, SubmissionHalf, SubmissionId, Tokens, validate_title,
};

/// Outcome of `close_round_and_allocate`.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub round_id: RoundId,
    pub kind: RoundKind,
    pub total_bids: usize,
    pub allocated: Vec<AllocationResult>,
    pub unallocated: Vec<ItemId>,
    pub winners: usize,
    pub dropped_bids: usize,
    /// Second halves created by a submission round.
    pub continuations: Vec<SubmissionId>,
    pub total_debited: Tokens,
    /// SHA-256 over the sealed bids, hex.
    pub input_hash: String,
    /// SHA-256 over the awards, hex.
    pub result_root: String,
}

impl AllocationReport {
    fn new(sealed: &SealedRound, plan: &AllocationPlan, receipt: &SettlementReceipt) -> Self {
        Self {
            round_id: plan.round_id,
            kind: plan.kind,
            total_bids: sealed.bids.len(),
            allocated: plan.allocations.clone(),
            unallocated: plan.unallocated.clone(),
            winners: plan.winners_count(),
            dropped_bids: receipt.dropped_bids,
            continuations: receipt.continuations.iter().map(|s| s.id).collect(),
            total_debited: receipt.total_debited(),
            input_hash: hex::encode(plan.input_hash),
            result_root: hex::encode(plan.result_root),
        }
    }
}

#[derive(Debug)]
struct RoundState {
    round: Round,
    /// Created when the round is activated, with its item pool fixed.
    book: Option<BidBook>,
    report: Option<AllocationReport>,
}

type SharedRound = Arc<RwLock<RoundState>>;
type SharedSubmission = Arc<Mutex<Submission>>;

/// The whole competition: participants, songs, rounds, submissions, reviews.
pub struct Competition {
    config: CompetitionConfig,
    admission: BidAdmission,
    first_engine: FirstPriceAllocationEngine,
    second_engine: SecondRoundAllocationEngine,
    matcher: PeerReviewMatcher,
    ledger: Ledger,
    settler: Mutex<RoundSettler>,
    songs: RwLock<BTreeMap<SongId, Song>>,
    rounds: RwLock<BTreeMap<RoundId, SharedRound>>,
    next_round: Mutex<RoundId>,
    /// Song round → the submission round auctioning its halves.
    submission_rounds: Mutex<BTreeMap<RoundId, RoundId>>,
    submissions: RwLock<BTreeMap<SubmissionId, SharedSubmission>>,
    boards: RwLock<BTreeMap<RoundId, Arc<Mutex<ReviewBoard>>>>,
}

impl Competition {
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(config: CompetitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            admission: BidAdmission::from_config(&config),
            first_engine: FirstPriceAllocationEngine::from_config(&config),
            second_engine: SecondRoundAllocationEngine::from_config(&config),
            matcher: PeerReviewMatcher::new(config.reviews_per_participant)?,
            ledger: Ledger::new(),
            settler: Mutex::new(RoundSettler::new()),
            songs: RwLock::new(BTreeMap::new()),
            rounds: RwLock::new(BTreeMap::new()),
            next_round: Mutex::new(RoundId(1)),
            submission_rounds: Mutex::new(BTreeMap::new()),
            submissions: RwLock::new(BTreeMap::new()),
            boards: RwLock::new(BTreeMap::new()),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CompetitionConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Participants and songs
    // ---------------------------------------------------------------------

    /// Open an account with the configured starting grant.
    pub fn register_participant(&self, participant: ParticipantId) -> Result<()> {
        let grant = self.config.initial_tokens;
        let mut settler = self.settler.lock();
        self.ledger.open_account(participant, grant)?;
        settler.record_grant(grant);
        tracing::info!(%participant, grant, "Participant registered");
        Ok(())
    }

    /// Register `owner`'s song. One per participant.
    pub fn register_song(&self, owner: ParticipantId, title: &str) -> Result<Song> {
        self.ensure_participant(owner)?;
        validate_title(title)?;
        let mut songs = self.songs.write();
        if songs.values().any(|s| s.owner == owner) {
            return Err(CompetitionError::DuplicateSong(owner));
        }
        let song = Song::new(owner, title.trim());
        songs.insert(song.id, song.clone());
        tracing::debug!(song = %song.id, %owner, "Song registered");
        Ok(song)
    }

    #[must_use]
    pub fn song(&self, id: SongId) -> Option<Song> {
        self.songs.read().get(&id).cloned()
    }

    // ---------------------------------------------------------------------
    // Round lifecycle
    // ---------------------------------------------------------------------

    /// Create a pending round. A submission round names the song round
    /// whose first halves it auctions; each song round gets at most one.
    pub fn open_round(
        &self,
        name: &str,
        kind: RoundKind,
        parent: Option<RoundId>,
    ) -> Result<RoundId> {
        match (kind, parent) {
            (RoundKind::Song, None) => {}
            (RoundKind::Song, Some(_)) => {
                return Err(CompetitionError::Configuration(
                    "a song round has no parent".to_string(),
                ));
            }
            (RoundKind::Submission, None) => {
                return Err(CompetitionError::Configuration(
                    "a submission round needs a parent song round".to_string(),
                ));
            }
            (RoundKind::Submission, Some(parent)) => {
                self.round_handle(parent)?.read().round.ensure_kind(RoundKind::Song)?;
            }
        }

        let mut children = self.submission_rounds.lock();
        if let Some((parent, existing)) = parent.and_then(|p| children.get(&p).map(|e| (p, *e))) {
            return Err(CompetitionError::SubmissionRoundExists { parent, existing });
        }
        let id = {
            let mut next = self.next_round.lock();
            let id = *next;
            *next = id.next();
            id
        };
        let state = RoundState {
            round: Round::new(id, name, kind, parent),
            book: None,
            report: None,
        };
        self.rounds.write().insert(id, Arc::new(RwLock::new(state)));
        if let Some(parent) = parent {
            children.insert(parent, id);
        }
        drop(children);
        tracing::info!(round = %id, %kind, ?parent, "Round opened");
        Ok(id)
    }

    /// Start accepting bids. The item pool is fixed here: every song
    /// registered so far, or every first half of the parent round that
    /// has no continuation yet.
    pub fn activate_round(&self, round_id: RoundId) -> Result<()> {
        let handle = self.round_handle(round_id)?;
        let mut state = handle.write();
        state.round.ensure_status(RoundStatus::Pending)?;

        let pool: BTreeMap<ItemId, ParticipantId> = match state.round.kind {
            RoundKind::Song => self
                .songs
                .read()
                .values()
                .map(|s| (ItemId::Song(s.id), s.owner))
                .collect(),
            RoundKind::Submission => {
                let parent = state.round.parent.ok_or(CompetitionError::Configuration(
                    "a submission round needs a parent song round".to_string(),
                ))?;
                self.round_handle(parent)?
                    .read()
                    .round
                    .ensure_status(RoundStatus::Completed)?;
                self.open_halves(parent)
                    .into_iter()
                    .map(|s| (ItemId::Submission(s.id), s.owner))
                    .collect()
            }
        };

        state.round.activate()?;
        tracing::info!(round = %round_id, items = pool.len(), "Round activated");
        state.book = Some(BidBook::new(round_id, pool));
        Ok(())
    }

    #[must_use]
    pub fn round(&self, round_id: RoundId) -> Option<Round> {
        let handle = self.rounds.read().get(&round_id).cloned()?;
        let round = handle.read().round.clone();
        Some(round)
    }

    // ---------------------------------------------------------------------
    // Bidding
    // ---------------------------------------------------------------------

    /// Place a bid in a song round.
    pub fn submit_bid(
        &self,
        round_id: RoundId,
        bidder: ParticipantId,
        song: SongId,
        amount: Tokens,
    ) -> Result<Bid> {
        self.place_bid(round_id, RoundKind::Song, bidder, ItemId::Song(song), amount)
    }

    /// Place a bid on a first half in a submission round. Bidding on your
    /// own half is rejected.
    pub fn submit_second_bid(
        &self,
        round_id: RoundId,
        bidder: ParticipantId,
        half: SubmissionId,
        amount: Tokens,
    ) -> Result<Bid> {
        self.place_bid(
            round_id,
            RoundKind::Submission,
            bidder,
            ItemId::Submission(half),
            amount,
        )
    }

    fn place_bid(
        &self,
        round_id: RoundId,
        kind: RoundKind,
        bidder: ParticipantId,
        item: ItemId,
        amount: Tokens,
    ) -> Result<Bid> {
        let handle = self.round_handle(round_id)?;
        let mut guard = handle.write();
        let state = &mut *guard;
        state.round.ensure_kind(kind)?;
        state.round.ensure_status(RoundStatus::Active)?;
        let book = state.book.as_mut().ok_or_else(|| missing_book(round_id))?;

        match self
            .admission
            .admit(&state.round, book, &self.ledger, bidder, item, amount)
        {
            Ok(bid) => {
                tracing::debug!(round = %round_id, bid = %bid.id, %bidder, %item, amount, "Bid admitted");
                Ok(bid)
            }
            Err(err) => {
                tracing::debug!(round = %round_id, %bidder, %item, amount, code = %err, "Bid rejected");
                Err(err)
            }
        }
    }

    /// First halves of `round_id`'s pool that `participant` may bid on.
    pub fn available_halves(
        &self,
        round_id: RoundId,
        participant: ParticipantId,
    ) -> Result<Vec<Submission>> {
        let handle = self.round_handle(round_id)?;
        let state = handle.read();
        state.round.ensure_kind(RoundKind::Submission)?;

        let ids: Vec<SubmissionId> = match &state.book {
            Some(book) => book
                .items()
                .iter()
                .filter(|(_, owner)| **owner != participant)
                .filter_map(|(item, _)| item.as_submission())
                .collect(),
            None => {
                let parent = state.round.parent.ok_or_else(|| missing_book(round_id))?;
                self.open_halves(parent)
                    .into_iter()
                    .filter(|s| s.owner != participant)
                    .map(|s| s.id)
                    .collect()
            }
        };
        let settler = self.settler.lock();
        let halves = ids
            .into_iter()
            .filter(|id| !settler.chain().has_successor(*id))
            .filter_map(|id| self.submission(id))
            .collect();
        Ok(halves)
    }

    /// Bids `participant` placed in a round.
    pub fn bids(&self, round_id: RoundId, participant: ParticipantId) -> Result<Vec<Bid>> {
        let handle = self.round_handle(round_id)?;
        let state = handle.read();
        Ok(state
            .book
            .as_ref()
            .map(|b| b.bids_by(participant).cloned().collect())
            .unwrap_or_default())
    }

    // ---------------------------------------------------------------------
    // Allocation
    // ---------------------------------------------------------------------

    /// Close the round and commit its allocation.
    ///
    /// # Errors
    /// - `RoundAlreadyCompleted` if the round was already allocated
    /// - `WrongRoundStatus` if the round was never activated
    /// - any error from the allocation pass; the round then stays active
    ///   with its book sealed and the call can be retried
    pub fn close_round_and_allocate(&self, round_id: RoundId) -> Result<AllocationReport> {
        let handle = self.round_handle(round_id)?;

        let sealed = {
            let mut guard = handle.write();
            let state = &mut *guard;
            if state.round.is_completed() {
                return Err(CompetitionError::RoundAlreadyCompleted(round_id));
            }
            state.round.ensure_status(RoundStatus::Active)?;
            let book = state.book.as_mut().ok_or_else(|| missing_book(round_id))?;
            RoundSealer::seal(&state.round, book, &self.ledger)?
        };

        // Seeded per round, so a retried pass draws the same numbers.
        let mut rng =
            SeededRandom::from_seed_option(self.config.rng_seed.map(|s| s.wrapping_add(round_id.0)));
        let plan = match sealed.kind {
            RoundKind::Song => self.first_engine.allocate(&sealed, &mut rng)?,
            RoundKind::Submission => self.second_engine.allocate(&sealed, &mut rng)?,
        };
        let predecessors = self.predecessors_of(&plan);

        let mut guard = handle.write();
        let state = &mut *guard;
        if state.round.is_completed() {
            return Err(CompetitionError::RoundAlreadyCompleted(round_id));
        }
        let book = state.book.as_mut().ok_or_else(|| missing_book(round_id))?;
        let receipt =
            self.settler
                .lock()
                .settle(&mut state.round, book, &self.ledger, &plan, &predecessors)?;

        if !receipt.continuations.is_empty() {
            let mut submissions = self.submissions.write();
            for c in &receipt.continuations {
                submissions.insert(c.id, Arc::new(Mutex::new(c.clone())));
            }
        }

        let report = AllocationReport::new(&sealed, &plan, &receipt);
        tracing::info!(
            round = %round_id,
            total_bids = report.total_bids,
            allocated = report.allocated.len(),
            winners = report.winners,
            unallocated = report.unallocated.len(),
            result_root = %report.result_root,
            "Round allocated"
        );
        state.report = Some(report.clone());
        Ok(report)
    }

    /// The committed awards of a round.
    pub fn results(&self, round_id: RoundId) -> Result<Vec<AllocationResult>> {
        let handle = self.round_handle(round_id)?;
        let state = handle.read();
        Ok(state
            .report
            .as_ref()
            .map(|r| r.allocated.clone())
            .unwrap_or_default())
    }

    pub fn report(&self, round_id: RoundId) -> Result<Option<AllocationReport>> {
        Ok(self.round_handle(round_id)?.read().report.clone())
    }

    // ---------------------------------------------------------------------
    // Submissions
    // ---------------------------------------------------------------------

    /// Register the first half for a song `owner` won in `round_id`.
    pub fn submit_first_half(
        &self,
        round_id: RoundId,
        owner: ParticipantId,
        song: SongId,
    ) -> Result<Submission> {
        let handle = self.round_handle(round_id)?;
        let state = handle.read();
        state.round.ensure_kind(RoundKind::Song)?;
        state.round.ensure_status(RoundStatus::Completed)?;
        if !self.songs.read().contains_key(&song) {
            return Err(CompetitionError::UnknownItem(ItemId::Song(song)));
        }

        let allocation = state
            .report
            .as_ref()
            .and_then(|r| r.allocated.iter().find(|a| a.item == ItemId::Song(song)))
            .filter(|a| a.winner == owner)
            .ok_or(CompetitionError::NotAllocated {
                participant: owner,
                song,
                round: round_id,
            })?;

        let mut submissions = self.submissions.write();
        let taken = submissions.values().any(|s| {
            let s = s.lock();
            s.song_id == song && s.half == SubmissionHalf::First
        });
        if taken {
            return Err(CompetitionError::DuplicateSubmission(song));
        }
        let submission = Submission::first_half(round_id, owner, song, Some(allocation.id));
        submissions.insert(submission.id, Arc::new(Mutex::new(submission.clone())));
        tracing::debug!(submission = %submission.id, %owner, %song, "First half registered");
        Ok(submission)
    }

    #[must_use]
    pub fn submission(&self, id: SubmissionId) -> Option<Submission> {
        let handle = self.submissions.read().get(&id).cloned()?;
        let submission = handle.lock().clone();
        Some(submission)
    }

    /// The second half continuing `predecessor`, if it was won.
    #[must_use]
    pub fn continuation_of(&self, predecessor: SubmissionId) -> Option<Submission> {
        let id = self.settler.lock().chain().successor_of(predecessor)?;
        self.submission(id)
    }

    // ---------------------------------------------------------------------
    // Review
    // ---------------------------------------------------------------------

    /// Build the review matrix for a completed song round. Reviewers are
    /// the owners of the round's first halves.
    ///
    /// # Errors
    /// - `ReviewMatrixExists` on a second call for the same round
    /// - `MatrixInfeasible` if there are not more reviewers than reviews
    ///   per reviewer; nothing is stored
    pub fn build_review_matrix(&self, round_id: RoundId) -> Result<Vec<ReviewAssignment>> {
        let handle = self.round_handle(round_id)?;
        let state = handle.read();
        state.round.ensure_kind(RoundKind::Song)?;
        state.round.ensure_status(RoundStatus::Completed)?;

        let board = self
            .boards
            .write()
            .entry(round_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(ReviewBoard::new(
                    round_id,
                    ReviewRules::from_config(&self.config),
                )))
            })
            .clone();
        let mut board = board.lock();
        if board.has_matrix() {
            return Err(CompetitionError::ReviewMatrixExists(round_id));
        }

        let submissions = self.first_halves_of(round_id);
        let reviewers: Vec<ParticipantId> = submissions.iter().map(|s| s.owner).collect();
        let matrix = self
            .matcher
            .build(round_id, &submissions, &reviewers, Utc::now())?;
        board.install(matrix.clone())?;
        Ok(matrix)
    }

    /// Record a review for one of `reviewer`'s assignments.
    pub fn submit_review(
        &self,
        reviewer: ParticipantId,
        assignment: AssignmentId,
        score: u32,
        comment: Option<String>,
    ) -> Result<Review> {
        let board = self
            .board_holding(assignment)
            .ok_or(CompetitionError::UnknownAssignment(assignment))?;
        let mut board = board.lock();
        let target = board
            .assignment(assignment)
            .map(|a| a.submission)
            .ok_or(CompetitionError::UnknownAssignment(assignment))?;
        let handle = self
            .submissions
            .read()
            .get(&target)
            .cloned()
            .ok_or(CompetitionError::UnknownItem(ItemId::Submission(target)))?;
        let mut submission = handle.lock();
        board.record_review(assignment, reviewer, score, comment, &mut submission)
    }

    /// Assignments given to `reviewer` in a round.
    pub fn assignments_for(
        &self,
        round_id: RoundId,
        reviewer: ParticipantId,
    ) -> Result<Vec<ReviewAssignment>> {
        self.round_handle(round_id)?;
        Ok(self
            .boards
            .read()
            .get(&round_id)
            .map(|b| b.lock().assignments_for(reviewer))
            .unwrap_or_default())
    }

    /// Reviews of `owner`'s submission, without reviewer identities.
    pub fn reviews_for_submission(
        &self,
        owner: ParticipantId,
        submission: SubmissionId,
    ) -> Result<Vec<AnonymousReview>> {
        let item = ItemId::Submission(submission);
        let found = self
            .submission(submission)
            .ok_or(CompetitionError::UnknownItem(item))?;
        if found.owner != owner {
            return Err(CompetitionError::UnknownItem(item));
        }
        let boards: Vec<_> = self.boards.read().values().cloned().collect();
        let mut reviews: Vec<Review> = boards
            .iter()
            .flat_map(|b| b.lock().reviews_for(submission))
            .collect();
        reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reviews.iter().map(Review::anonymized).collect())
    }

    /// Ranking of a song round's reviewed first halves.
    pub fn rankings(&self, round_id: RoundId) -> Result<Vec<RankingEntry>> {
        self.round_handle(round_id)?;
        let submissions = self.first_halves_of(round_id);
        Ok(ScoreAggregator::rank(&submissions))
    }

    // ---------------------------------------------------------------------
    // Ledger
    // ---------------------------------------------------------------------

    pub fn balance(&self, participant: ParticipantId) -> Result<Tokens> {
        self.ledger.balance(participant)
    }

    pub fn ledger_entry(&self, participant: ParticipantId) -> Result<LedgerEntry> {
        self.ledger.entry(participant)
    }

    /// Check `balance == granted - debited` for every account and for the
    /// supply as a whole.
    pub fn verify_supply(&self) -> Result<()> {
        self.settler.lock().verify_supply(&self.ledger)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn ensure_participant(&self, participant: ParticipantId) -> Result<()> {
        if self.ledger.contains(participant) {
            Ok(())
        } else {
            Err(CompetitionError::UnknownParticipant(participant))
        }
    }

    fn round_handle(&self, round_id: RoundId) -> Result<SharedRound> {
        self.rounds
            .read()
            .get(&round_id)
            .cloned()
            .ok_or(CompetitionError::UnknownRound(round_id))
    }

    fn first_halves_of(&self, round_id: RoundId) -> Vec<Submission> {
        let submissions = self.submissions.read();
        let mut out: Vec<Submission> = submissions
            .values()
            .map(|s| s.lock().clone())
            .filter(|s| s.round_id == round_id && s.is_first_half())
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// First halves of `parent` that no continuation has claimed.
    fn open_halves(&self, parent: RoundId) -> Vec<Submission> {
        let halves = self.first_halves_of(parent);
        let settler = self.settler.lock();
        halves
            .into_iter()
            .filter(|s| !settler.chain().has_successor(s.id))
            .collect()
    }

    fn predecessors_of(&self, plan: &AllocationPlan) -> BTreeMap<SubmissionId, Submission> {
        plan.continuations
            .iter()
            .filter_map(|c| self.submission(c.predecessor))
            .map(|s| (s.id, s))
            .collect()
    }

    fn board_holding(&self, assignment: AssignmentId) -> Option<Arc<Mutex<ReviewBoard>>> {
        let boards: Vec<Arc<Mutex<ReviewBoard>>> = self.boards.read().values().cloned().collect();
        boards
            .into_iter()
            .find(|b| b.lock().assignment(assignment).is_some())
    }
}

fn missing_book(round: RoundId) -> CompetitionError {
    CompetitionError::Internal(format!("{round} is active without a bid book"))
}
