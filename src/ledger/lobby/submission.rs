//! Admission of proof-carrying mutations against a lobby's cryptographic table.
//!
//! [`Lobby::admit`] checks public signals against current state and returns an
//! [`Admission`]; [`Lobby::commit`] applies it and cannot fail. The ledger runs `admit` once
//! before verifying the proof and again under the write lock right before `commit`.

use ark_ff::{One, Zero};
use serde::{Deserialize, Serialize};

use super::types::{GamePhase, Lobby};
use super::validation::{ensure_phase, ensure_seated};
use crate::card::{Card, CardPoint, NUM_CARDS};
use crate::field::{checked_div, Scalar};
use crate::ledger::error::LedgerError;
use crate::ledger::events::LedgerEvent;
use crate::ledger::hash::hash_deck;
use crate::ledger::table::KeyContribution;
use crate::ledger::types::{Address, DeckHash, LobbyId, PlayerIndex};
use crate::proof_system::{
    CircuitId, KeyAggregateSignals, PublicSignals, RevealMode, RevealSignals, ShuffleSignals,
};
use crate::shuffling::{MaskedCard, MaskedDeck};

const LOG_TARGET: &str = "mental_poker::ledger::submission";

/// What a proof bundle is submitted for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationRequest {
    UpdateAggregateKey { lobby: LobbyId },
    ApplyShuffle { lobby: LobbyId },
    RevealCard { lobby: LobbyId, slot: usize },
}

impl MutationRequest {
    pub fn lobby(&self) -> LobbyId {
        match self {
            MutationRequest::UpdateAggregateKey { lobby }
            | MutationRequest::ApplyShuffle { lobby }
            | MutationRequest::RevealCard { lobby, .. } => *lobby,
        }
    }

    pub fn circuit_id(&self) -> CircuitId {
        match self {
            MutationRequest::UpdateAggregateKey { .. } => CircuitId::KeyAggregate,
            MutationRequest::ApplyShuffle { .. } => CircuitId::Shuffle,
            MutationRequest::RevealCard { .. } => CircuitId::Reveal,
        }
    }
}

/// What an accepted submission changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmitReceipt {
    AggregateKeyUpdated {
        #[serde(with = "crate::crypto_serde::field")]
        new_aggregate_key: Scalar,
    },
    DeckShuffled {
        deck_hash: DeckHash,
        shuffles_remaining: usize,
    },
    ShareApplied {
        slot: usize,
        remaining: usize,
        plaintext: Option<Card>,
    },
    Peeked {
        slot: usize,
    },
}

/// A validated mutation, ready to commit.
#[derive(Clone, Debug)]
pub enum Admission {
    Key(KeyContribution),
    Shuffle {
        deck: MaskedDeck,
    },
    Deal {
        seat: PlayerIndex,
        slot: usize,
        card: MaskedCard,
        plaintext: Option<Card>,
    },
    Peek {
        seat: PlayerIndex,
        slot: usize,
    },
}

impl Lobby {
    pub fn admit(
        &self,
        caller: &Address,
        signals: &PublicSignals,
        mutation: &MutationRequest,
    ) -> Result<Admission, LedgerError> {
        match (mutation, signals) {
            (MutationRequest::UpdateAggregateKey { .. }, PublicSignals::KeyAggregate(s)) => {
                self.admit_key(caller, s)
            }
            (MutationRequest::ApplyShuffle { .. }, PublicSignals::Shuffle(s)) => {
                self.admit_shuffle(caller, s)
            }
            (MutationRequest::RevealCard { slot, .. }, PublicSignals::Reveal(s)) => {
                self.admit_reveal(caller, *slot, s)
            }
            _ => Err(LedgerError::invalid_proof(
                signals.circuit_id(),
                format!("signals do not fit a {} mutation", mutation.circuit_id()),
            )),
        }
    }

    fn admit_key(
        &self,
        caller: &Address,
        signals: &KeyAggregateSignals,
    ) -> Result<Admission, LedgerError> {
        const ACTION: &str = "contribute a key share";
        ensure_seated(self, caller, ACTION)?;
        let current = self.table.aggregate_key();
        if signals.old_aggregate_key != current {
            return Err(LedgerError::stale(
                "aggregate key",
                current,
                signals.old_aggregate_key,
            ));
        }
        ensure_phase(
            self,
            ACTION,
            &[GamePhase::Created, GamePhase::Joined, GamePhase::Started],
        )?;
        if !self.table.shufflers().is_empty() {
            return Err(LedgerError::illegal(ACTION, self.phase, "deck shuffling has begun"));
        }
        if self.table.has_contributed(caller) {
            return Err(LedgerError::illegal(ACTION, self.phase, "share already contributed"));
        }
        let public_share = checked_div(&signals.new_aggregate_key, &current)?;
        if public_share.is_one() || public_share.is_zero() {
            return Err(LedgerError::out_of_range(
                "public share",
                "identity element",
            ));
        }
        Ok(Admission::Key(KeyContribution {
            player: *caller,
            old_aggregate_key: current,
            new_aggregate_key: signals.new_aggregate_key,
            public_share,
        }))
    }

    fn admit_shuffle(
        &self,
        caller: &Address,
        signals: &ShuffleSignals,
    ) -> Result<Admission, LedgerError> {
        const ACTION: &str = "shuffle";
        ensure_seated(self, caller, ACTION)?;
        let table = &self.table;
        if signals.aggregate_key != table.aggregate_key() {
            return Err(LedgerError::stale(
                "aggregate key",
                table.aggregate_key(),
                signals.aggregate_key,
            ));
        }
        let provided = hash_deck(&signals.input_deck);
        if provided != table.deck_hash() {
            return Err(LedgerError::stale("deck hash", table.deck_hash(), provided));
        }
        ensure_phase(self, ACTION, &[GamePhase::Started])?;
        let seats = self.players.len();
        if !table.keys_complete(seats) {
            return Err(LedgerError::illegal(ACTION, self.phase, "aggregate key incomplete"));
        }
        match table.next_shuffler(&self.players) {
            None => Err(LedgerError::illegal(ACTION, self.phase, "every seat has shuffled")),
            Some(next) if next != *caller => Err(LedgerError::illegal(
                ACTION,
                self.phase,
                format!("waiting on {next} to shuffle"),
            )),
            Some(_) => Ok(Admission::Shuffle {
                deck: signals.output_deck.clone(),
            }),
        }
    }

    fn admit_reveal(
        &self,
        caller: &Address,
        slot: usize,
        signals: &RevealSignals,
    ) -> Result<Admission, LedgerError> {
        const ACTION: &str = "reveal";
        let seat = ensure_seated(self, caller, ACTION)?;
        if slot >= NUM_CARDS {
            return Err(LedgerError::out_of_range("slot", slot));
        }
        let table = &self.table;
        let seats = self.players.len();
        if !table.shuffles_complete(seats) {
            return Err(LedgerError::illegal(ACTION, self.phase, "deck not fully shuffled"));
        }
        if self.phase == GamePhase::Completed {
            return Err(LedgerError::illegal(ACTION, self.phase, "game is over"));
        }

        let current = table.deck().cards()[slot];
        if signals.masked_card != current {
            return Err(LedgerError::stale(
                "masked card",
                format!("slot {slot} ciphertext {current:?}"),
                format!("{:?}", signals.masked_card),
            ));
        }
        let recorded = table.public_share_of(caller).ok_or_else(|| {
            LedgerError::illegal(ACTION, self.phase, "caller holds no key share")
        })?;
        if signals.public_share != recorded {
            return Err(LedgerError::stale(
                "public share",
                recorded,
                signals.public_share,
            ));
        }

        let progress = table
            .reveal(slot)
            .ok_or_else(|| LedgerError::out_of_range("slot", slot))?;
        let last_share = progress.all_others_applied(seat, seats);
        match signals.mode() {
            RevealMode::Deal => {
                if progress.has_applied(seat) {
                    return Err(LedgerError::stale(
                        "reveal progress",
                        "share pending",
                        "share already applied",
                    ));
                }
                let card = signals
                    .unmasked()
                    .map_err(|err| LedgerError::invalid_proof(CircuitId::Reveal, err))?
                    .ok_or_else(|| {
                        LedgerError::invalid_proof(CircuitId::Reveal, "deal without disclosure")
                    })?;
                let plaintext = if last_share {
                    let point = CardPoint::from_scalar(&card.c2)
                        .map_err(|err| LedgerError::invalid_proof(CircuitId::Reveal, err))?;
                    Some(point.to_card())
                } else {
                    None
                };
                Ok(Admission::Deal {
                    seat,
                    slot,
                    card,
                    plaintext,
                })
            }
            RevealMode::Peek => {
                if !last_share {
                    return Err(LedgerError::illegal(
                        ACTION,
                        self.phase,
                        format!(
                            "peek needs every other share, {} of {} applied",
                            progress.applied_count(),
                            seats
                        ),
                    ));
                }
                if progress.has_peeked(seat) || progress.has_applied(seat) {
                    return Err(LedgerError::stale(
                        "reveal progress",
                        "peek pending",
                        "peek already recorded",
                    ));
                }
                Ok(Admission::Peek { seat, slot })
            }
        }
    }

    /// Applies an admission. Must follow a successful [`Lobby::admit`] on the same state.
    pub fn commit(&mut self, caller: Address, admission: Admission) -> (SubmitReceipt, LedgerEvent) {
        let lobby = self.id;
        match admission {
            Admission::Key(contribution) => {
                let (old, new) = (contribution.old_aggregate_key, contribution.new_aggregate_key);
                self.table.record_contribution(contribution);
                tracing::info!(target: LOG_TARGET, lobby, %caller, "aggregate key updated");
                (
                    SubmitReceipt::AggregateKeyUpdated {
                        new_aggregate_key: new,
                    },
                    LedgerEvent::AggregateKeyUpdated {
                        lobby,
                        player: caller,
                        old,
                        new,
                    },
                )
            }
            Admission::Shuffle { deck } => {
                self.table.record_shuffle(caller, deck);
                let shuffles_remaining = self.players.len() - self.table.shufflers().len();
                tracing::info!(target: LOG_TARGET, lobby, %caller, shuffles_remaining, "deck masked");
                (
                    SubmitReceipt::DeckShuffled {
                        deck_hash: self.table.deck_hash(),
                        shuffles_remaining,
                    },
                    LedgerEvent::DeckMasked {
                        lobby,
                        shuffler: caller,
                        shuffles_remaining,
                    },
                )
            }
            Admission::Deal {
                seat,
                slot,
                card,
                plaintext,
            } => {
                self.table.record_share(slot, seat, card, plaintext);
                let applied = self
                    .table
                    .reveal(slot)
                    .map_or(0, |progress| progress.applied_count());
                let remaining = self.players.len().saturating_sub(applied);
                tracing::info!(target: LOG_TARGET, lobby, %caller, slot, remaining, "share applied");
                (
                    SubmitReceipt::ShareApplied {
                        slot,
                        remaining,
                        plaintext,
                    },
                    LedgerEvent::CardRevealed {
                        lobby,
                        slot,
                        by: caller,
                        plaintext,
                    },
                )
            }
            Admission::Peek { seat, slot } => {
                self.table.record_peek(slot, seat);
                tracing::info!(target: LOG_TARGET, lobby, %caller, slot, "peek recorded");
                (
                    SubmitReceipt::Peeked { slot },
                    LedgerEvent::CardRevealed {
                        lobby,
                        slot,
                        by: caller,
                        plaintext: None,
                    },
                )
            }
        }
    }
}
