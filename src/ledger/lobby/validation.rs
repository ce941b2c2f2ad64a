use super::types::{GamePhase, Lobby};
use crate::config::BettingGate;
use crate::ledger::error::LedgerError;
use crate::ledger::types::{Address, PlayerIndex, Wei};

pub fn validate_blind(blind: Wei) -> Result<(), LedgerError> {
    if blind == 0 {
        return Err(LedgerError::out_of_range("blind", blind));
    }
    Ok(())
}

pub fn ensure_stake(expected: Wei, provided: Wei) -> Result<(), LedgerError> {
    if expected != provided {
        return Err(LedgerError::InsufficientStake { expected, provided });
    }
    Ok(())
}

pub fn ensure_phase(
    lobby: &Lobby,
    action: &'static str,
    allowed: &[GamePhase],
) -> Result<(), LedgerError> {
    if allowed.contains(&lobby.phase) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ");
    Err(LedgerError::illegal(
        action,
        lobby.phase,
        format!("requires {expected}"),
    ))
}

pub fn ensure_seated(
    lobby: &Lobby,
    caller: &Address,
    action: &'static str,
) -> Result<PlayerIndex, LedgerError> {
    lobby.seat_of(caller).ok_or(LedgerError::Unauthorized {
        caller: *caller,
        action,
    })
}

pub fn ensure_active(
    lobby: &Lobby,
    caller: &Address,
    action: &'static str,
) -> Result<PlayerIndex, LedgerError> {
    let seat = ensure_seated(lobby, caller, action)?;
    if lobby.folded.contains(caller) {
        return Err(LedgerError::illegal(action, lobby.phase, "player has folded"));
    }
    Ok(seat)
}

/// Under [`BettingGate::AfterDeal`] money only moves once every hole card is in its owner's hands.
pub fn ensure_betting_open(
    lobby: &Lobby,
    gate: BettingGate,
    action: &'static str,
) -> Result<(), LedgerError> {
    if gate == BettingGate::Immediate {
        return Ok(());
    }
    let seats = lobby.players.len();
    let table = &lobby.table;
    let reason = if !table.keys_complete(seats) {
        "aggregate key incomplete"
    } else if !table.shuffles_complete(seats) {
        "deck not fully shuffled"
    } else if !table.hole_cards_dealt(&lobby.deal_plan()) {
        "hole cards not yet dealt"
    } else {
        return Ok(());
    };
    Err(LedgerError::illegal(action, lobby.phase, reason))
}
