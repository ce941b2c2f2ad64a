//! Monetary lifecycle of a lobby.
//!
//! Every method validates first and mutates only once nothing can fail, so a rejected call
//! leaves the lobby untouched.

use std::collections::BTreeSet;

use super::types::{BetKind, BetRecord, BetState, GamePhase, Lobby, Outcome, PendingRaise};
use super::validation::{ensure_active, ensure_betting_open, ensure_phase, ensure_stake};
use crate::card::Card;
use crate::config::BettingGate;
use crate::ledger::error::LedgerError;
use crate::ledger::events::{LedgerEvent, Payout};
use crate::ledger::types::{Address, Wei};
use crate::showdown::best_hand;

const LOG_TARGET: &str = "mental_poker::ledger::lobby";

/// Events to publish plus balances to credit once the transition commits.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Transition {
    pub events: Vec<LedgerEvent>,
    pub credits: Vec<Payout>,
}

impl Transition {
    fn event(event: LedgerEvent) -> Self {
        Self {
            events: vec![event],
            credits: Vec::new(),
        }
    }
}

impl Lobby {
    /// First mutation of every paying action; an overflowing pot is refused before it.
    fn escrow(&mut self, player: Address, amount: Wei, kind: BetKind) -> Result<(), LedgerError> {
        self.pot = self
            .pot
            .checked_add(amount)
            .ok_or_else(|| LedgerError::out_of_range("stake", amount))?;
        self.bets.push(BetRecord {
            player,
            amount,
            kind,
        });
        Ok(())
    }

    /// Moves the whole pot out of escrow and closes the game.
    fn close(&mut self, outcome: Outcome) -> Wei {
        let pot = std::mem::take(&mut self.pot);
        self.phase = GamePhase::Completed;
        self.pending_raise = None;
        self.outcome = Some(outcome);
        pot
    }

    pub fn join(&mut self, caller: Address, value: Wei) -> Result<Transition, LedgerError> {
        ensure_phase(self, "join", &[GamePhase::Created])?;
        if self.seat_of(&caller).is_some() {
            return Err(LedgerError::illegal("join", self.phase, "already seated"));
        }
        ensure_stake(self.blind, value)?;

        self.escrow(caller, value, BetKind::Blind)?;
        self.players.push(caller);
        if self.is_full() {
            self.phase = GamePhase::Joined;
        }
        tracing::info!(target: LOG_TARGET, lobby = self.id, %caller, seats = self.players.len(), "player joined");
        Ok(Transition::event(LedgerEvent::GameJoined {
            lobby: self.id,
            player: caller,
        }))
    }

    pub fn start(&mut self, caller: Address) -> Result<Transition, LedgerError> {
        if caller != self.creator {
            return Err(LedgerError::Unauthorized {
                caller,
                action: "start the game",
            });
        }
        ensure_phase(self, "start", &[GamePhase::Joined])?;
        self.phase = GamePhase::Started;
        tracing::info!(target: LOG_TARGET, lobby = self.id, "game started");
        Ok(Transition::event(LedgerEvent::GameStarted { lobby: self.id }))
    }

    /// Opens a raise, or matches the outstanding one when `amount` equals it.
    pub fn raise(
        &mut self,
        caller: Address,
        amount: Wei,
        gate: BettingGate,
    ) -> Result<Transition, LedgerError> {
        const ACTION: &str = "raise";
        ensure_active(self, &caller, ACTION)?;
        ensure_phase(
            self,
            ACTION,
            &[GamePhase::Started, GamePhase::Betting(BetState::Raised)],
        )?;
        ensure_betting_open(self, gate, ACTION)?;
        if amount == 0 {
            return Err(LedgerError::out_of_range("raise amount", amount));
        }

        let Some(pending) = &self.pending_raise else {
            let awaiting: BTreeSet<Address> = self
                .active_players()
                .map(|(_, p)| p)
                .filter(|p| *p != caller)
                .collect();
            self.escrow(caller, amount, BetKind::Raise)?;
            self.pending_raise = Some(PendingRaise {
                raiser: caller,
                amount,
                awaiting,
            });
            self.phase = GamePhase::Betting(BetState::Raised);
            tracing::info!(target: LOG_TARGET, lobby = self.id, %caller, amount, "raise opened");
            return Ok(Transition::event(LedgerEvent::GameRaised {
                lobby: self.id,
                amount,
            }));
        };

        if !pending.awaiting.contains(&caller) {
            return Err(LedgerError::illegal(
                ACTION,
                self.phase,
                "caller is not facing the outstanding raise",
            ));
        }
        ensure_stake(pending.amount, amount)?;

        self.escrow(caller, amount, BetKind::Call)?;
        let all_matched = match self.pending_raise.as_mut() {
            Some(pending) => {
                pending.awaiting.remove(&caller);
                pending.awaiting.is_empty()
            }
            None => true,
        };
        if all_matched {
            self.phase = GamePhase::Betting(BetState::Matched);
        }
        tracing::info!(target: LOG_TARGET, lobby = self.id, %caller, amount, all_matched, "raise matched");
        Ok(Transition::event(LedgerEvent::GameMatched {
            lobby: self.id,
            amount,
        }))
    }

    /// Leaves the hand. The last player standing takes the pot.
    pub fn fold(&mut self, caller: Address) -> Result<Transition, LedgerError> {
        const ACTION: &str = "fold";
        ensure_active(self, &caller, ACTION)?;
        ensure_phase(
            self,
            ACTION,
            &[GamePhase::Started, GamePhase::Betting(BetState::Raised)],
        )?;
        if let Some(pending) = &self.pending_raise {
            if !pending.awaiting.contains(&caller) {
                return Err(LedgerError::illegal(
                    ACTION,
                    self.phase,
                    "caller is not facing the outstanding raise",
                ));
            }
        }

        self.folded.insert(caller);
        let remaining: Vec<Address> = self.active_players().map(|(_, p)| p).collect();
        if let [winner] = remaining.as_slice() {
            let winner = *winner;
            let pot = self.close(Outcome::Fold {
                winner,
                loser: caller,
            });
            tracing::info!(target: LOG_TARGET, lobby = self.id, %winner, pot, "game completed by fold");
            return Ok(Transition {
                events: vec![LedgerEvent::GameCompleted {
                    lobby: self.id,
                    pot,
                    loser: caller,
                    winner,
                }],
                credits: vec![Payout {
                    player: winner,
                    amount: pot,
                }],
            });
        }

        if let Some(pending) = self.pending_raise.as_mut() {
            pending.awaiting.remove(&caller);
            if pending.awaiting.is_empty() {
                self.phase = GamePhase::Betting(BetState::Matched);
            }
        }
        tracing::info!(target: LOG_TARGET, lobby = self.id, %caller, "player folded");
        Ok(Transition::event(LedgerEvent::PlayerFolded {
            lobby: self.id,
            player: caller,
        }))
    }

    fn opened_card(&self, slot: usize) -> Result<Card, LedgerError> {
        self.table.opened(slot).ok_or_else(|| {
            LedgerError::illegal("settle", self.phase, format!("slot {slot} is not open"))
        })
    }

    /// Scores every remaining hand and splits the pot between the best ones.
    ///
    /// The odd wei of an uneven split goes to the earliest seat among the winners.
    pub fn settle(&mut self) -> Result<Transition, LedgerError> {
        ensure_phase(self, "settle", &[GamePhase::Betting(BetState::Matched)])?;
        let plan = self.deal_plan();
        let board = plan
            .board_slots()
            .map(|slot| self.opened_card(slot))
            .collect::<Result<Vec<_>, _>>()?;

        let mut scored = Vec::new();
        for (seat, player) in self.active_players() {
            let mut cards = plan
                .hole_slots(seat)
                .into_iter()
                .map(|slot| self.opened_card(slot))
                .collect::<Result<Vec<_>, _>>()?;
            cards.extend_from_slice(&board);
            let hand = best_hand(&cards).ok_or_else(|| {
                LedgerError::illegal("settle", self.phase, "hand does not hold seven cards")
            })?;
            tracing::debug!(target: LOG_TARGET, lobby = self.id, %player, category = %hand.category, score = hand.score, "hand scored");
            scored.push((player, hand.score));
        }

        let top = scored.iter().map(|(_, s)| *s).max().unwrap_or_default();
        let winners: Vec<Address> = scored
            .iter()
            .filter(|(_, s)| *s == top)
            .map(|(p, _)| *p)
            .collect();
        let pot = self.pot;
        let count = winners.len().max(1) as Wei;
        let (share, odd) = (pot / count, pot % count);
        let payouts: Vec<Payout> = winners
            .iter()
            .enumerate()
            .map(|(i, player)| Payout {
                player: *player,
                amount: if i == 0 { share + odd } else { share },
            })
            .collect();

        self.close(Outcome::Showdown {
            payouts: payouts.clone(),
        });
        tracing::info!(target: LOG_TARGET, lobby = self.id, pot, winners = winners.len(), "hand settled");
        Ok(Transition {
            events: vec![LedgerEvent::HandSettled {
                lobby: self.id,
                pot,
                payouts: payouts.clone(),
            }],
            credits: payouts,
        })
    }
}
