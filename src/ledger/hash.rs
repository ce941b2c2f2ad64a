use ark_ff::{BigInteger, PrimeField};
use sha2::{Digest, Sha256};

use crate::field::Scalar;
use crate::ledger::types::DeckHash;
use crate::shuffling::data_structures::{ElGamalCiphertext, MaskedDeck};

const DOMAIN_DECK: &[u8] = b"mental-poker/deck/v1";

fn finalize_hash(hasher: Sha256) -> DeckHash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    DeckHash::from(bytes)
}

fn write_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_be_bytes());
}

fn write_scalar(hasher: &mut Sha256, value: &Scalar) {
    let bytes = value.into_bigint().to_bytes_be();
    write_len(hasher, bytes.len());
    hasher.update(&bytes);
}

fn write_ciphertext(hasher: &mut Sha256, card: &ElGamalCiphertext) {
    write_scalar(hasher, &card.c1);
    write_scalar(hasher, &card.c2);
}

/// Digest committing to every slot of a masked deck, in order.
pub fn hash_deck(deck: &MaskedDeck) -> DeckHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_DECK);
    write_len(&mut hasher, deck.len());
    for card in deck.iter() {
        write_ciphertext(&mut hasher, card);
    }
    finalize_hash(hasher)
}
