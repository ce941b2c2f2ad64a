use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ledger::events::Payout;
use crate::ledger::table::{CryptoTable, DealPlan};
use crate::ledger::types::{Address, LobbyId, PlayerIndex, Wei};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetState {
    /// A raise is outstanding and some players still have to answer it.
    Raised,
    /// Every remaining player has matched; the hand goes to showdown.
    Matched,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", content = "bet", rename_all = "snake_case")]
pub enum GamePhase {
    Created,
    Joined,
    Started,
    Betting(BetState),
    Completed,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GamePhase::Created => "created",
            GamePhase::Joined => "joined",
            GamePhase::Started => "started",
            GamePhase::Betting(BetState::Raised) => "betting (raised)",
            GamePhase::Betting(BetState::Matched) => "betting (matched)",
            GamePhase::Completed => "completed",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetKind {
    Blind,
    Raise,
    Call,
}

/// One escrowed payment; the pot is always the sum of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRecord {
    pub player: Address,
    pub amount: Wei,
    pub kind: BetKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRaise {
    pub raiser: Address,
    pub amount: Wei,
    /// Players that have neither matched nor folded yet.
    pub awaiting: BTreeSet<Address>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Outcome {
    Fold { winner: Address, loser: Address },
    Showdown { payouts: Vec<Payout> },
}

/// Full state of one game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub id: LobbyId,
    pub creator: Address,
    pub blind: Wei,
    pub capacity: usize,
    /// Join order; the index is the seat.
    pub players: Vec<Address>,
    pub folded: BTreeSet<Address>,
    pub phase: GamePhase,
    pub pot: Wei,
    pub bets: Vec<BetRecord>,
    pub pending_raise: Option<PendingRaise>,
    pub outcome: Option<Outcome>,
    pub table: CryptoTable,
}

impl Lobby {
    pub fn new(id: LobbyId, creator: Address, blind: Wei, capacity: usize) -> Self {
        Self {
            id,
            creator,
            blind,
            capacity,
            players: vec![creator],
            folded: BTreeSet::new(),
            phase: GamePhase::Created,
            pot: blind,
            bets: vec![BetRecord {
                player: creator,
                amount: blind,
                kind: BetKind::Blind,
            }],
            pending_raise: None,
            outcome: None,
            table: CryptoTable::new(),
        }
    }

    pub fn seat_of(&self, player: &Address) -> Option<PlayerIndex> {
        self.players.iter().position(|p| p == player)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() == self.capacity
    }

    /// Seated players that have not folded, in seat order.
    pub fn active_players(&self) -> impl Iterator<Item = (PlayerIndex, Address)> + '_ {
        self.players
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| !self.folded.contains(p))
    }

    pub fn deal_plan(&self) -> DealPlan {
        DealPlan::new(self.players.len())
    }

    /// Sum of every accepted bet; `None` if it does not fit in a `Wei`.
    pub fn escrowed(&self) -> Option<Wei> {
        self.bets.iter().try_fold(0, |total: Wei, bet| total.checked_add(bet.amount))
    }

    pub fn view(&self) -> LobbyView {
        LobbyView {
            id: self.id,
            creator: self.creator,
            blind: self.blind,
            capacity: self.capacity,
            players: self.players.clone(),
            folded: self.folded.iter().copied().collect(),
            phase: self.phase,
            pot: self.pot,
            keys_contributed: self.table.contributions().len(),
            shuffles_applied: self.table.shufflers().len(),
            deck_hash: self.table.deck_hash().to_string(),
            outcome: self.outcome.clone(),
        }
    }
}

/// Summary of a lobby without the deck.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyView {
    pub id: LobbyId,
    pub creator: Address,
    pub blind: Wei,
    pub capacity: usize,
    pub players: Vec<Address>,
    pub folded: Vec<Address>,
    pub phase: GamePhase,
    pub pot: Wei,
    pub keys_contributed: usize,
    pub shuffles_applied: usize,
    pub deck_hash: String,
    pub outcome: Option<Outcome>,
}
