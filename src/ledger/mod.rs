//! In-memory authoritative ledger: lobbies, escrow, proof-gated crypto state and events.

pub mod error;
pub mod events;
pub mod hash;
pub mod lobby;
mod operator;
pub mod serialization;
pub mod state;
pub mod table;
pub mod types;

pub use error::{ErrorKind, LedgerError};
pub use events::{EventBus, LedgerEvent, Payout};
pub use lobby::{
    BetKind, BetRecord, BetState, GamePhase, Lobby, LobbyView, MutationRequest, Outcome,
    SubmitReceipt,
};
pub use operator::Ledger;
pub use state::LedgerState;
pub use table::{CryptoTable, DealPlan, KeyContribution};
pub use types::{Address, DeckHash, LobbyId, PlayerIndex, Wei, WEI_PER_ETHER};
