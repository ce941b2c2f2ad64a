//! Player-side orchestration: read ledger state, prove off-lock, submit, retry when stale.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::card::Card;
use crate::engine::{AggregateKeyEngine, EngineError, RevealEngine, ShuffleEngine};
use crate::field::{Scalar, SecretKey};
use crate::ledger::hash::hash_deck;
use crate::ledger::{
    Address, DeckHash, ErrorKind, Ledger, LedgerError, LobbyId, MutationRequest, SubmitReceipt,
};
use crate::proof_system::{ProofBundle, Prover, RevealMode};
use crate::sampler::{sample_secret_key, MaskingVector, PermutationMatrix};

const LOG_TARGET: &str = "mental_poker::player";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{action} still stale after {attempts} attempts: {last}")]
    RetriesExhausted {
        action: &'static str,
        attempts: usize,
        last: LedgerError,
    },
    #[error("{action} cancelled")]
    Cancelled { action: &'static str },
    #[error("proving task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("slot {slot} produced no plaintext")]
    NoPlaintext { slot: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyOrigin {
    Supplied,
    Sampled,
}

type ProofJob<T> = Box<dyn FnOnce() -> Result<(Option<ProofBundle>, T), EngineError> + Send>;

/// One read of ledger state turned into a proving job.
struct Attempt<T> {
    mutation: MutationRequest,
    job: ProofJob<T>,
}

/// A seated player with a private key share.
///
/// Every crypto operation reads the value it builds on, proves on the blocking pool
/// without holding any ledger lock, and submits. A `StaleState` rejection restarts the
/// cycle from a fresh read.
pub struct PlayerSession {
    address: Address,
    secret: SecretKey,
    key_origin: KeyOrigin,
    ledger: Arc<Ledger>,
    prover: Arc<dyn Prover>,
    max_attempts: usize,
    cancel: CancellationToken,
    rng: Mutex<StdRng>,
}

impl PlayerSession {
    pub fn new(
        address: Address,
        secret: SecretKey,
        ledger: Arc<Ledger>,
        prover: Arc<dyn Prover>,
    ) -> Self {
        Self::build(address, secret, KeyOrigin::Supplied, ledger, prover, StdRng::from_entropy())
    }

    /// Samples the key share; it is resampled if the ledger refuses it as out of range.
    pub fn with_random_key(address: Address, ledger: Arc<Ledger>, prover: Arc<dyn Prover>) -> Self {
        Self::with_rng(address, ledger, prover, StdRng::from_entropy())
    }

    pub fn with_rng(
        address: Address,
        ledger: Arc<Ledger>,
        prover: Arc<dyn Prover>,
        mut rng: StdRng,
    ) -> Self {
        let secret = sample_secret_key(&mut rng);
        Self::build(address, secret, KeyOrigin::Sampled, ledger, prover, rng)
    }

    fn build(
        address: Address,
        secret: SecretKey,
        key_origin: KeyOrigin,
        ledger: Arc<Ledger>,
        prover: Arc<dyn Prover>,
        rng: StdRng,
    ) -> Self {
        let max_attempts = ledger.config().max_submit_attempts.max(1);
        Self {
            address,
            secret,
            key_origin,
            ledger,
            prover,
            max_attempts,
            cancel: CancellationToken::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_share(&self) -> Scalar {
        self.secret.public_share()
    }

    /// Token that abandons in-flight proving when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn prove<T: Send + 'static>(
        &self,
        action: &'static str,
        job: ProofJob<T>,
    ) -> Result<(Option<ProofBundle>, T), SessionError> {
        let handle = tokio::task::spawn_blocking(job);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(target: LOG_TARGET, action, "cancellation token triggered; abandoning proof");
                Err(SessionError::Cancelled { action })
            }
            joined = handle => Ok(joined??),
        }
    }

    /// Read-prove-submit until accepted, a non-stale rejection, or the attempt budget runs out.
    async fn drive<T, P>(
        &self,
        action: &'static str,
        mut prepare: P,
    ) -> Result<(Option<SubmitReceipt>, T), SessionError>
    where
        T: Send + 'static,
        P: FnMut(&Self) -> Result<Attempt<T>, SessionError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled { action });
            }
            let Attempt { mutation, job } = prepare(self)?;
            let (bundle, value) = self.prove(action, job).await?;
            let Some(bundle) = bundle else {
                debug!(target: LOG_TARGET, action, "nothing to submit");
                return Ok((None, value));
            };
            match self.ledger.submit(self.address, &bundle, mutation) {
                Ok(receipt) => {
                    info!(target: LOG_TARGET, player = %self.address, action, attempt, "submission accepted");
                    return Ok((Some(receipt), value));
                }
                Err(err) if err.is_stale() && attempt < self.max_attempts => {
                    warn!(target: LOG_TARGET, player = %self.address, action, attempt, %err, "stale submission; re-reading");
                }
                Err(err) if err.is_stale() => {
                    return Err(SessionError::RetriesExhausted {
                        action,
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn submit_key(&self, lobby: LobbyId) -> Result<Scalar, SessionError> {
        let (_, new_key) = self
            .drive("contribute key", |session| {
                let old = session.ledger.current_aggregate_key(lobby)?;
                let engine = AggregateKeyEngine::new(session.prover.clone());
                let secret = session.secret.clone();
                Ok(Attempt {
                    mutation: MutationRequest::UpdateAggregateKey { lobby },
                    job: Box::new(move || {
                        let update = engine.update_aggregate_key(old, &secret)?;
                        Ok((Some(update.bundle), update.new_aggregate_key))
                    }),
                })
            })
            .await?;
        Ok(new_key)
    }

    /// Folds this player's share into the lobby's aggregate key and returns the new key.
    pub async fn contribute_key(&mut self, lobby: LobbyId) -> Result<Scalar, SessionError> {
        let mut resamples = 0;
        loop {
            match self.submit_key(lobby).await {
                Err(SessionError::Ledger(err))
                    if err.kind() == ErrorKind::InvalidRange
                        && self.key_origin == KeyOrigin::Sampled
                        && resamples < self.max_attempts =>
                {
                    resamples += 1;
                    warn!(target: LOG_TARGET, player = %self.address, %err, "key share refused; resampling");
                    self.secret = sample_secret_key(&mut *self.rng.lock());
                }
                other => return other,
            }
        }
    }

    /// Permutes and re-masks the current deck; returns the new deck hash.
    pub async fn shuffle(&self, lobby: LobbyId) -> Result<DeckHash, SessionError> {
        let (_, deck_hash) = self
            .drive("shuffle", |session| {
                let deck = session.ledger.current_deck(lobby)?;
                let key = session.ledger.current_aggregate_key(lobby)?;
                let (permutation, masking) = {
                    let mut rng = session.rng.lock();
                    (
                        PermutationMatrix::random(&mut *rng),
                        MaskingVector::random(&mut *rng),
                    )
                };
                let engine = ShuffleEngine::new(session.prover.clone());
                Ok(Attempt {
                    mutation: MutationRequest::ApplyShuffle { lobby },
                    job: Box::new(move || {
                        let outcome = engine.shuffle(&deck, key, permutation, masking)?;
                        let hash = hash_deck(&outcome.deck);
                        Ok((Some(outcome.bundle), hash))
                    }),
                })
            })
            .await?;
        Ok(deck_hash)
    }

    async fn reveal(
        &self,
        lobby: LobbyId,
        slot: usize,
        mode: RevealMode,
    ) -> Result<Option<Card>, SessionError> {
        let action = match mode {
            RevealMode::Deal => "deal card",
            RevealMode::Peek => "peek card",
        };
        let (_, card) = self
            .drive(action, |session| {
                let card = session.ledger.masked_card(lobby, slot)?;
                let progress = session.ledger.reveal_progress(lobby, slot)?;
                let seat = session.ledger.player_number(lobby, &session.address)?;
                let seats = session.ledger.lobby_view(lobby)?.players.len();
                let engine = RevealEngine::new(session.prover.clone());
                let secret = session.secret.clone();
                Ok(Attempt {
                    mutation: MutationRequest::RevealCard { lobby, slot },
                    job: Box::new(move || {
                        let outcome = engine.reveal(&card, &progress, seats, seat, &secret, mode)?;
                        Ok(outcome.into_parts())
                    }),
                })
            })
            .await?;
        Ok(card)
    }

    /// Removes this player's share from `slot`; yields the card if it was the last share.
    pub async fn deal_card(&self, lobby: LobbyId, slot: usize) -> Result<Option<Card>, SessionError> {
        self.reveal(lobby, slot, RevealMode::Deal).await
    }

    /// Learns `slot` privately once every other share is off it.
    pub async fn peek_card(&self, lobby: LobbyId, slot: usize) -> Result<Card, SessionError> {
        self.reveal(lobby, slot, RevealMode::Peek)
            .await?
            .ok_or(SessionError::NoPlaintext { slot })
    }

    fn pending_slots(
        &self,
        lobby: LobbyId,
        slots: impl IntoIterator<Item = usize>,
    ) -> Result<Vec<usize>, SessionError> {
        let seat = self.ledger.player_number(lobby, &self.address)?;
        let mut pending = Vec::new();
        for slot in slots {
            if !self.ledger.reveal_progress(lobby, slot)?.has_applied(seat) {
                pending.push(slot);
            }
        }
        Ok(pending)
    }

    /// Applies this player's share to every opponent's hole cards.
    pub async fn deal_hole_cards_to_opponents(&self, lobby: LobbyId) -> Result<(), SessionError> {
        let seat = self.ledger.player_number(lobby, &self.address)?;
        let plan = self.ledger.lobby_snapshot(lobby)?.deal_plan();
        let slots = (0..plan.seats())
            .filter(|other| *other != seat)
            .flat_map(|other| plan.hole_slots(other));
        for slot in self.pending_slots(lobby, slots)? {
            self.deal_card(lobby, slot).await?;
        }
        Ok(())
    }

    /// Privately learns both hole cards without publishing them.
    pub async fn peek_own_hole_cards(&self, lobby: LobbyId) -> Result<[Card; 2], SessionError> {
        let seat = self.ledger.player_number(lobby, &self.address)?;
        let [first, second] = self.ledger.lobby_snapshot(lobby)?.deal_plan().hole_slots(seat);
        Ok([
            self.peek_card(lobby, first).await?,
            self.peek_card(lobby, second).await?,
        ])
    }

    /// Opens both hole cards to the table for showdown.
    pub async fn open_own_hole_cards(&self, lobby: LobbyId) -> Result<[Card; 2], SessionError> {
        let seat = self.ledger.player_number(lobby, &self.address)?;
        let [first, second] = self.ledger.lobby_snapshot(lobby)?.deal_plan().hole_slots(seat);
        Ok([
            self.open_slot(lobby, first).await?,
            self.open_slot(lobby, second).await?,
        ])
    }

    async fn open_slot(&self, lobby: LobbyId, slot: usize) -> Result<Card, SessionError> {
        match self.ledger.opened_card(lobby, slot)? {
            Some(card) => Ok(card),
            None => self
                .deal_card(lobby, slot)
                .await?
                .ok_or(SessionError::NoPlaintext { slot }),
        }
    }

    /// Applies this player's share to every board slot it has not yet touched.
    ///
    /// Returns the board cards that opened as a result of this player's share.
    pub async fn deal_board(&self, lobby: LobbyId) -> Result<Vec<Card>, SessionError> {
        let plan = self.ledger.lobby_snapshot(lobby)?.deal_plan();
        let mut opened = Vec::new();
        for slot in self.pending_slots(lobby, plan.board_slots())? {
            if let Some(card) = self.deal_card(lobby, slot).await? {
                opened.push(card);
            }
        }
        Ok(opened)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;
    use crate::config::{BettingGate, ProtocolConfig};
    use crate::field::FIELD_MODULUS;
    use crate::ledger::{BetState, GamePhase, LedgerEvent};
    use crate::proof_system::{ProverError, SigmaProofSystem, Witness};
    use crate::test_utils::fixtures::{alice, bob, carol, drain};

    const ROUNDS: usize = 3;

    fn table() -> (Arc<Ledger>, PlayerSession, PlayerSession) {
        let config = ProtocolConfig {
            shuffle_rounds: ROUNDS,
            betting_gate: BettingGate::AfterDeal,
            ..ProtocolConfig::default()
        };
        let system = Arc::new(SigmaProofSystem::with_seed(ROUNDS, 23));
        let ledger = Arc::new(Ledger::new(config, system.clone()).unwrap());
        let bob = PlayerSession::with_rng(
            bob(),
            ledger.clone(),
            system.clone(),
            StdRng::seed_from_u64(1),
        );
        let alice = PlayerSession::with_rng(alice(), ledger.clone(), system, StdRng::seed_from_u64(2));
        (ledger, bob, alice)
    }

    #[tokio::test]
    async fn concurrent_key_contributions_both_land() {
        let (ledger, mut bob, mut alice) = table();
        let lobby = ledger.create_new_game(bob.address(), 10).unwrap();
        ledger.join_game(alice.address(), lobby, 10).unwrap();

        let (from_bob, from_alice) =
            tokio::join!(bob.contribute_key(lobby), alice.contribute_key(lobby));
        from_bob.unwrap();
        from_alice.unwrap();

        assert_eq!(
            ledger.current_aggregate_key(lobby).unwrap(),
            bob.public_share() * alice.public_share()
        );
        assert_eq!(
            ledger.public_share(lobby, &alice.address()).unwrap(),
            Some(alice.public_share())
        );
    }

    /// Lands a rival's key share while the wrapped session is still proving its own.
    struct RacingProver {
        inner: Arc<SigmaProofSystem>,
        ledger: Arc<Ledger>,
        lobby: LobbyId,
        rivals: Mutex<Vec<(Address, SecretKey)>>,
    }

    impl Prover for RacingProver {
        fn prove(&self, witness: &Witness) -> Result<ProofBundle, ProverError> {
            let rival = self.rivals.lock().pop();
            if let Some((player, secret)) = rival {
                let old = self.ledger.current_aggregate_key(self.lobby).unwrap();
                let update = AggregateKeyEngine::new(self.inner.clone())
                    .update_aggregate_key(old, &secret)
                    .unwrap();
                let mutation = MutationRequest::UpdateAggregateKey { lobby: self.lobby };
                self.ledger.submit(player, &update.bundle, mutation).unwrap();
            }
            self.inner.prove(witness)
        }
    }

    #[tokio::test]
    async fn always_stale_contribution_exhausts_its_attempts() {
        let config = ProtocolConfig {
            max_players: 3,
            shuffle_rounds: ROUNDS,
            max_submit_attempts: 2,
            ..ProtocolConfig::default()
        };
        let system = Arc::new(SigmaProofSystem::with_seed(ROUNDS, 29));
        let ledger = Arc::new(Ledger::new(config, system.clone()).unwrap());
        let lobby = ledger.create_new_game(bob(), 10).unwrap();
        ledger.join_game(alice(), lobby, 10).unwrap();
        ledger.join_game(carol(), lobby, 10).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let rivals = vec![
            (alice(), sample_secret_key(&mut rng)),
            (carol(), sample_secret_key(&mut rng)),
        ];
        let prover = Arc::new(RacingProver {
            inner: system,
            ledger: ledger.clone(),
            lobby,
            rivals: Mutex::new(rivals),
        });
        let mut session =
            PlayerSession::with_rng(bob(), ledger.clone(), prover, StdRng::seed_from_u64(1));
        assert_eq!(session.max_attempts, 2);

        match session.contribute_key(lobby).await {
            Err(SessionError::RetriesExhausted {
                action,
                attempts,
                last,
            }) => {
                assert_eq!(action, "contribute key");
                assert_eq!(attempts, 2);
                assert!(last.is_stale());
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        let contributors: Vec<Address> = ledger
            .lobby_snapshot(lobby)
            .unwrap()
            .table
            .contributions()
            .iter()
            .map(|c| c.player)
            .collect();
        assert_eq!(contributors, vec![carol(), alice()]);
        assert_eq!(ledger.public_share(lobby, &bob()).unwrap(), None);
    }

    #[tokio::test]
    async fn refused_sampled_share_is_resampled() {
        let (ledger, mut bob, alice) = table();
        let lobby = ledger.create_new_game(bob.address(), 10).unwrap();
        ledger.join_game(alice.address(), lobby, 10).unwrap();

        // g^(R-1) is the identity; the ledger refuses it as a share.
        let identity =
            SecretKey::from_biguint(&(FIELD_MODULUS.clone() - BigUint::from(1u32))).unwrap();
        bob.secret = identity.clone();
        let new_key = bob.contribute_key(lobby).await.unwrap();
        assert_ne!(bob.public_share(), identity.public_share());
        assert_eq!(new_key, bob.public_share());
        assert_eq!(
            ledger.public_share(lobby, &bob.address()).unwrap(),
            Some(bob.public_share())
        );

        let mut supplied =
            PlayerSession::new(alice.address(), identity, ledger.clone(), alice.prover.clone());
        match supplied.contribute_key(lobby).await {
            Err(SessionError::Ledger(err)) => assert_eq!(err.kind(), ErrorKind::InvalidRange),
            other => panic!("expected the supplied share to be refused, got {other:?}"),
        }
        assert_eq!(ledger.public_share(lobby, &alice.address()).unwrap(), None);
    }

    #[tokio::test]
    async fn cancelled_sessions_submit_nothing() {
        let (ledger, mut bob, alice) = table();
        let lobby = ledger.create_new_game(bob.address(), 10).unwrap();
        ledger.join_game(alice.address(), lobby, 10).unwrap();

        bob.cancel_token().cancel();
        assert!(matches!(
            bob.contribute_key(lobby).await,
            Err(SessionError::Cancelled { .. })
        ));
        assert!(ledger.lobby_snapshot(lobby).unwrap().table.contributions().is_empty());
    }

    #[tokio::test]
    async fn premature_peek_is_refused_locally() {
        let (ledger, mut bob, mut alice) = table();
        let lobby = ledger.create_new_game(bob.address(), 10).unwrap();
        ledger.join_game(alice.address(), lobby, 10).unwrap();
        bob.contribute_key(lobby).await.unwrap();
        alice.contribute_key(lobby).await.unwrap();
        ledger.start_game(bob.address(), lobby).unwrap();
        bob.shuffle(lobby).await.unwrap();
        alice.shuffle(lobby).await.unwrap();

        assert!(matches!(
            bob.peek_card(lobby, 0).await,
            Err(SessionError::Engine(EngineError::PrematureReveal { .. }))
        ));
    }

    #[tokio::test]
    async fn sessions_play_a_hand_to_showdown() {
        let (ledger, mut bob, mut alice) = table();
        let mut rx = ledger.subscribe();
        let lobby = ledger.create_new_game(bob.address(), 50).unwrap();
        ledger.join_game(alice.address(), lobby, 50).unwrap();

        bob.contribute_key(lobby).await.unwrap();
        alice.contribute_key(lobby).await.unwrap();
        ledger.start_game(bob.address(), lobby).unwrap();

        let first = bob.shuffle(lobby).await.unwrap();
        let second = alice.shuffle(lobby).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(ledger.deck_hash(lobby).unwrap(), second);

        bob.deal_hole_cards_to_opponents(lobby).await.unwrap();
        alice.deal_hole_cards_to_opponents(lobby).await.unwrap();
        let bob_peek = bob.peek_own_hole_cards(lobby).await.unwrap();
        let alice_peek = alice.peek_own_hole_cards(lobby).await.unwrap();

        ledger.raise(alice.address(), lobby, 25).unwrap();
        ledger.raise(bob.address(), lobby, 25).unwrap();
        assert_eq!(
            ledger.lobby_view(lobby).unwrap().phase,
            GamePhase::Betting(BetState::Matched)
        );

        assert!(bob.deal_board(lobby).await.unwrap().is_empty());
        assert_eq!(alice.deal_board(lobby).await.unwrap().len(), 5);
        assert_eq!(bob.open_own_hole_cards(lobby).await.unwrap(), bob_peek);
        assert_eq!(alice.open_own_hole_cards(lobby).await.unwrap(), alice_peek);

        ledger.settle(lobby).unwrap();
        let settled = drain(&mut rx)
            .into_iter()
            .find_map(|event| match event {
                LedgerEvent::HandSettled { pot, payouts, .. } => Some((pot, payouts)),
                _ => None,
            })
            .expect("hand settled");
        assert_eq!(settled.0, 150);
        assert_eq!(settled.1.iter().map(|p| p.amount).sum::<u128>(), 150);
        assert_eq!(ledger.escrowed(), Some(0));
    }
}
