use std::collections::BTreeMap;

use super::error::LedgerError;
use super::events::Payout;
use super::lobby::Lobby;
use super::types::{Address, LobbyId, Wei};

// ---- Ledger state --------------------------------------------------------------------------

/// Every lobby plus the withdrawable balances of every account.
#[derive(Clone, Debug, Default)]
pub struct LedgerState {
    next_lobby: LobbyId,
    lobbies: BTreeMap<LobbyId, Lobby>,
    balances: BTreeMap<Address, Wei>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lobby(&self, id: LobbyId) -> Result<&Lobby, LedgerError> {
        self.lobbies.get(&id).ok_or(LedgerError::UnknownLobby(id))
    }

    pub fn lobby_mut(&mut self, id: LobbyId) -> Result<&mut Lobby, LedgerError> {
        self.lobbies
            .get_mut(&id)
            .ok_or(LedgerError::UnknownLobby(id))
    }

    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    /// Ids are dense and start at zero.
    pub fn insert_lobby(&mut self, build: impl FnOnce(LobbyId) -> Lobby) -> LobbyId {
        let id = self.next_lobby;
        self.next_lobby += 1;
        self.lobbies.insert(id, build(id));
        id
    }

    pub fn balance(&self, player: &Address) -> Wei {
        self.balances.get(player).copied().unwrap_or_default()
    }

    pub fn credit(&mut self, payouts: &[Payout]) {
        for payout in payouts {
            let balance = self.balances.entry(payout.player).or_default();
            *balance = balance.saturating_add(payout.amount);
        }
    }

    pub fn take_balance(&mut self, player: &Address) -> Wei {
        self.balances.remove(player).unwrap_or_default()
    }

    /// Wei still held in open pots.
    pub fn escrowed(&self) -> Option<Wei> {
        self.lobbies
            .values()
            .try_fold(0, |total: Wei, lobby| total.checked_add(lobby.pot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_ids_are_sequential() {
        let mut state = LedgerState::new();
        let creator = Address::from_low_u64(1);
        let a = state.insert_lobby(|id| Lobby::new(id, creator, 10, 2));
        let b = state.insert_lobby(|id| Lobby::new(id, creator, 20, 2));
        assert_eq!((a, b), (0, 1));
        assert_eq!(state.lobby(b).unwrap().blind, 20);
        assert_eq!(state.escrowed(), Some(30));
        assert_eq!(state.lobby(7).unwrap_err(), LedgerError::UnknownLobby(7));
    }

    #[test]
    fn balances_accumulate_until_taken() {
        let mut state = LedgerState::new();
        let player = Address::from_low_u64(5);
        state.credit(&[
            Payout { player, amount: 3 },
            Payout { player, amount: 4 },
        ]);
        assert_eq!(state.balance(&player), 7);
        assert_eq!(state.take_balance(&player), 7);
        assert_eq!(state.balance(&player), 0);
    }

    #[test]
    fn open_pots_beyond_wei_range_report_no_total() {
        let mut state = LedgerState::new();
        let creator = Address::from_low_u64(1);
        state.insert_lobby(|id| Lobby::new(id, creator, Wei::MAX, 2));
        state.insert_lobby(|id| Lobby::new(id, creator, 1, 2));
        assert_eq!(state.escrowed(), None);
    }

    #[test]
    fn credits_saturate_instead_of_wrapping() {
        let mut state = LedgerState::new();
        let player = Address::from_low_u64(5);
        state.credit(&[
            Payout { player, amount: Wei::MAX },
            Payout { player, amount: 2 },
        ]);
        assert_eq!(state.balance(&player), Wei::MAX);
    }
}
