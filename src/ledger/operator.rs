use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use super::error::LedgerError;
use super::events::{EventBus, LedgerEvent};
use super::lobby::{
    validate_blind, Lobby, LobbyView, MutationRequest, SubmitReceipt, Transition,
};
use super::state::LedgerState;
use super::types::{Address, DeckHash, LobbyId, PlayerIndex, Wei};
use crate::card::Card;
use crate::config::{ConfigError, ProtocolConfig};
use crate::engine::RevealProgress;
use crate::field::Scalar;
use crate::proof_system::{ProofBundle, ProofVerifier};
use crate::shuffling::{MaskedCard, MaskedDeck};

const LOG_TARGET: &str = "mental_poker::ledger::operator";

/// Authoritative single-writer store: lobbies, escrow, balances and the event stream.
///
/// Every mutation either applies completely under the write lock or returns an error
/// without touching state. Proofs are verified outside the lock.
pub struct Ledger {
    config: ProtocolConfig,
    verifier: Arc<dyn ProofVerifier>,
    state: RwLock<LedgerState>,
    events: EventBus,
}

impl Ledger {
    /// Refuses configs whose seat count does not fit the deck.
    pub fn new(
        config: ProtocolConfig,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer);
        Ok(Self {
            config,
            verifier,
            state: RwLock::new(LedgerState::new()),
            events,
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn transition(
        &self,
        lobby: LobbyId,
        apply: impl FnOnce(&mut Lobby) -> Result<Transition, LedgerError>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let transition = apply(state.lobby_mut(lobby)?)?;
        state.credit(&transition.credits);
        // Published under the lock so subscribers observe commit order.
        self.events.publish(transition.events);
        Ok(())
    }

    /// Opens a lobby with the caller seated and `value` escrowed as the blind.
    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn create_new_game(&self, caller: Address, value: Wei) -> Result<LobbyId, LedgerError> {
        validate_blind(value)?;
        let capacity = self.config.max_players;
        let mut state = self.state.write();
        let id = state.insert_lobby(|id| Lobby::new(id, caller, value, capacity));
        info!(target: LOG_TARGET, lobby = id, %caller, blind = value, "game created");
        self.events.publish([LedgerEvent::GameCreated {
            lobby: id,
            blind: value,
            player_count: 1,
        }]);
        Ok(id)
    }

    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn join_game(&self, caller: Address, lobby: LobbyId, value: Wei) -> Result<(), LedgerError> {
        self.transition(lobby, |l| l.join(caller, value))
    }

    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn start_game(&self, caller: Address, lobby: LobbyId) -> Result<(), LedgerError> {
        self.transition(lobby, |l| l.start(caller))
    }

    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn raise(&self, caller: Address, lobby: LobbyId, amount: Wei) -> Result<(), LedgerError> {
        let gate = self.config.betting_gate;
        self.transition(lobby, |l| l.raise(caller, amount, gate))
    }

    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn fold(&self, caller: Address, lobby: LobbyId) -> Result<(), LedgerError> {
        self.transition(lobby, |l| l.fold(caller))
    }

    /// Showdown payout; anyone may trigger it once the cards are open.
    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn settle(&self, lobby: LobbyId) -> Result<(), LedgerError> {
        self.transition(lobby, Lobby::settle)
    }

    /// Pays out and zeroes the caller's balance.
    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn withdraw(&self, caller: Address) -> Result<Wei, LedgerError> {
        let mut state = self.state.write();
        let amount = state.take_balance(&caller);
        if amount > 0 {
            self.events.publish([LedgerEvent::Withdrawal {
                player: caller,
                amount,
            }]);
        }
        Ok(amount)
    }

    /// Checks a proof bundle against current state, verifies it, and applies `mutation`.
    #[instrument(target = LOG_TARGET, skip(self, bundle), fields(circuit = ?mutation.circuit_id()))]
    pub fn submit(
        &self,
        caller: Address,
        bundle: &ProofBundle,
        mutation: MutationRequest,
    ) -> Result<SubmitReceipt, LedgerError> {
        let circuit = bundle.circuit_id()?;
        if circuit != mutation.circuit_id() {
            return Err(LedgerError::invalid_proof(
                circuit,
                format!("bundle submitted for a {} mutation", mutation.circuit_id()),
            ));
        }
        let lobby = mutation.lobby();

        // Cheap rejection before paying for verification.
        self.state
            .read()
            .lobby(lobby)?
            .admit(&caller, &bundle.public_signals, &mutation)
            .inspect_err(|err| warn!(target: LOG_TARGET, %caller, %err, "submission rejected"))?;

        self.verifier.verify(bundle).map_err(|err| {
            warn!(target: LOG_TARGET, %caller, %err, "proof rejected");
            LedgerError::from(err)
        })?;

        let mut state = self.state.write();
        let entry = state.lobby_mut(lobby)?;
        let admission = entry
            .admit(&caller, &bundle.public_signals, &mutation)
            .inspect_err(|err| warn!(target: LOG_TARGET, %caller, %err, "state moved during verification"))?;
        let (receipt, event) = entry.commit(caller, admission);
        self.events.publish([event]);
        Ok(receipt)
    }

    fn read<T>(
        &self,
        lobby: LobbyId,
        f: impl FnOnce(&Lobby) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        f(self.state.read().lobby(lobby)?)
    }

    pub fn lobby_view(&self, lobby: LobbyId) -> Result<LobbyView, LedgerError> {
        self.read(lobby, |l| Ok(l.view()))
    }

    /// Full copy of a lobby, deck and reveal progress included.
    pub fn lobby_snapshot(&self, lobby: LobbyId) -> Result<Lobby, LedgerError> {
        self.read(lobby, |l| Ok(l.clone()))
    }

    pub fn current_aggregate_key(&self, lobby: LobbyId) -> Result<Scalar, LedgerError> {
        self.read(lobby, |l| Ok(l.table.aggregate_key()))
    }

    pub fn current_deck(&self, lobby: LobbyId) -> Result<MaskedDeck, LedgerError> {
        self.read(lobby, |l| Ok(l.table.deck().clone()))
    }

    pub fn deck_hash(&self, lobby: LobbyId) -> Result<DeckHash, LedgerError> {
        self.read(lobby, |l| Ok(l.table.deck_hash()))
    }

    pub fn masked_card(&self, lobby: LobbyId, slot: usize) -> Result<MaskedCard, LedgerError> {
        self.read(lobby, |l| {
            l.table
                .deck()
                .get(slot)
                .copied()
                .ok_or_else(|| LedgerError::out_of_range("slot", slot))
        })
    }

    pub fn reveal_progress(
        &self,
        lobby: LobbyId,
        slot: usize,
    ) -> Result<RevealProgress, LedgerError> {
        self.read(lobby, |l| {
            l.table
                .reveal(slot)
                .cloned()
                .ok_or_else(|| LedgerError::out_of_range("slot", slot))
        })
    }

    pub fn opened_card(&self, lobby: LobbyId, slot: usize) -> Result<Option<Card>, LedgerError> {
        self.read(lobby, |l| Ok(l.table.opened(slot)))
    }

    pub fn public_share(
        &self,
        lobby: LobbyId,
        player: &Address,
    ) -> Result<Option<Scalar>, LedgerError> {
        self.read(lobby, |l| Ok(l.table.public_share_of(player)))
    }

    pub fn bet_size(&self, lobby: LobbyId) -> Result<Wei, LedgerError> {
        self.read(lobby, |l| Ok(l.blind))
    }

    pub fn player_number(&self, lobby: LobbyId, player: &Address) -> Result<PlayerIndex, LedgerError> {
        self.read(lobby, |l| {
            l.seat_of(player).ok_or(LedgerError::Unauthorized {
                caller: *player,
                action: "look up a seat",
            })
        })
    }

    /// Number of lobbies ever created.
    pub fn current_game_counter(&self) -> LobbyId {
        self.state.read().lobbies().count() as LobbyId
    }

    pub fn balance_of(&self, player: &Address) -> Wei {
        self.state.read().balance(player)
    }

    /// Wei held across all open pots; `None` if the total does not fit in a `Wei`.
    pub fn escrowed(&self) -> Option<Wei> {
        self.state.read().escrowed()
    }
}
