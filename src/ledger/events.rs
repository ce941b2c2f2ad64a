use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{Address, LobbyId, Wei};
use crate::card::Card;
use crate::field::Scalar;

const LOG_TARGET: &str = "mental_poker::ledger::events";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub player: Address,
    pub amount: Wei,
}

/// Everything the ledger announces, in commit order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    GameCreated {
        lobby: LobbyId,
        blind: Wei,
        player_count: usize,
    },
    GameJoined {
        lobby: LobbyId,
        player: Address,
    },
    GameStarted {
        lobby: LobbyId,
    },
    GameRaised {
        lobby: LobbyId,
        amount: Wei,
    },
    GameMatched {
        lobby: LobbyId,
        amount: Wei,
    },
    PlayerFolded {
        lobby: LobbyId,
        player: Address,
    },
    GameCompleted {
        lobby: LobbyId,
        pot: Wei,
        loser: Address,
        winner: Address,
    },
    HandSettled {
        lobby: LobbyId,
        pot: Wei,
        payouts: Vec<Payout>,
    },
    AggregateKeyUpdated {
        lobby: LobbyId,
        player: Address,
        #[serde(with = "crate::crypto_serde::field")]
        old: Scalar,
        #[serde(with = "crate::crypto_serde::field")]
        new: Scalar,
    },
    DeckMasked {
        lobby: LobbyId,
        shuffler: Address,
        shuffles_remaining: usize,
    },
    CardRevealed {
        lobby: LobbyId,
        slot: usize,
        by: Address,
        /// Set only when the last share came off in deal mode.
        plaintext: Option<Card>,
    },
    Withdrawal {
        player: Address,
        amount: Wei,
    },
}

impl LedgerEvent {
    pub fn lobby(&self) -> Option<LobbyId> {
        match self {
            LedgerEvent::GameCreated { lobby, .. }
            | LedgerEvent::GameJoined { lobby, .. }
            | LedgerEvent::GameStarted { lobby }
            | LedgerEvent::GameRaised { lobby, .. }
            | LedgerEvent::GameMatched { lobby, .. }
            | LedgerEvent::PlayerFolded { lobby, .. }
            | LedgerEvent::GameCompleted { lobby, .. }
            | LedgerEvent::HandSettled { lobby, .. }
            | LedgerEvent::AggregateKeyUpdated { lobby, .. }
            | LedgerEvent::DeckMasked { lobby, .. }
            | LedgerEvent::CardRevealed { lobby, .. } => Some(*lobby),
            LedgerEvent::Withdrawal { .. } => None,
        }
    }
}

/// Fan-out of committed events to any number of subscribers.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, events: impl IntoIterator<Item = LedgerEvent>) {
        for event in events {
            tracing::info!(target: LOG_TARGET, ?event, "ledger event");
            // No subscribers is not an error.
            let _ = self.sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_in_publish_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish([
            LedgerEvent::GameStarted { lobby: 1 },
            LedgerEvent::GameRaised {
                lobby: 1,
                amount: 10,
            },
        ]);
        assert_eq!(rx.recv().await.unwrap(), LedgerEvent::GameStarted { lobby: 1 });
        assert_eq!(
            rx.recv().await.unwrap(),
            LedgerEvent::GameRaised {
                lobby: 1,
                amount: 10
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(1);
        bus.publish([LedgerEvent::Withdrawal {
            player: Address::from_low_u64(1),
            amount: 3,
        }]);
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(LedgerEvent::GameStarted { lobby: 4 }).unwrap();
        assert_eq!(json["event"], "game_started");
        assert_eq!(json["lobby"], 4);
    }
}
