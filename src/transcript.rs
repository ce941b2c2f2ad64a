//! Fiat-Shamir transcripts over SHA-256.

use ark_ff::{BigInteger, PrimeField};
use sha2::{Digest, Sha256};

use crate::field::{Exponent, Scalar};
use crate::shuffling::data_structures::{ElGamalCiphertext, MaskedDeck};

const DOMAIN_TAG: &[u8] = b"mental-poker/fiat-shamir/v1";

/// Challenges are 128 bits, well below `R - 1`.
const CHALLENGE_BYTES: usize = 16;

/// Builder for domain-separated proof transcripts.
#[derive(Clone)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub fn new(kind: &'static str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        hasher.update((kind.len() as u16).to_be_bytes());
        hasher.update(kind.as_bytes());
        Self { hasher }
    }

    pub fn append_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    pub fn append_u64(&mut self, value: u64) {
        self.hasher.update(value.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u32).to_be_bytes());
        self.hasher.update(bytes);
    }

    pub fn append_scalar(&mut self, value: &Scalar) {
        self.append_bytes(&value.into_bigint().to_bytes_be());
    }

    pub fn append_ciphertext(&mut self, value: &ElGamalCiphertext) {
        self.append_scalar(&value.c1);
        self.append_scalar(&value.c2);
    }

    pub fn append_deck(&mut self, deck: &MaskedDeck) {
        self.append_u64(deck.len() as u64);
        for card in deck.iter() {
            self.append_ciphertext(card);
        }
    }

    fn squeeze(&self, label: &[u8], counter: u32) -> [u8; 32] {
        let mut hasher = self.hasher.clone();
        hasher.update(label);
        hasher.update(counter.to_be_bytes());
        hasher.finalize().into()
    }

    /// Challenge exponent in `[0, 2^128)`.
    pub fn challenge_exponent(&self, label: &[u8]) -> Exponent {
        let digest = self.squeeze(label, 0);
        Exponent::from_bytes_le(&digest[..CHALLENGE_BYTES])
    }

    /// `count` independent challenge bits.
    pub fn challenge_bits(&self, label: &[u8], count: usize) -> Vec<bool> {
        let mut bits = Vec::with_capacity(count);
        let mut counter = 0u32;
        while bits.len() < count {
            let digest = self.squeeze(label, counter);
            for byte in digest {
                for shift in 0..8 {
                    if bits.len() == count {
                        break;
                    }
                    bits.push((byte >> shift) & 1 == 1);
                }
            }
            counter += 1;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenges_are_deterministic_and_domain_separated() {
        let mut a = Transcript::new("proof/a");
        a.append_u64(7);
        let mut b = Transcript::new("proof/a");
        b.append_u64(7);
        let mut c = Transcript::new("proof/b");
        c.append_u64(7);

        assert_eq!(a.challenge_exponent(b"c"), b.challenge_exponent(b"c"));
        assert_ne!(a.challenge_exponent(b"c"), c.challenge_exponent(b"c"));
        assert_ne!(a.challenge_exponent(b"c"), a.challenge_exponent(b"d"));
    }

    #[test]
    fn challenge_bits_span_multiple_blocks() {
        let transcript = Transcript::new("bits");
        let bits = transcript.challenge_bits(b"rounds", 300);
        assert_eq!(bits.len(), 300);
        assert!(bits.iter().any(|b| *b));
        assert!(bits.iter().any(|b| !*b));
        assert_eq!(bits[..40], transcript.challenge_bits(b"rounds", 40)[..]);
    }

    #[test]
    fn length_prefix_separates_byte_strings() {
        let mut a = Transcript::new("bytes");
        a.append_bytes(b"ab");
        a.append_bytes(b"c");
        let mut b = Transcript::new("bytes");
        b.append_bytes(b"a");
        b.append_bytes(b"bc");
        assert_ne!(a.challenge_exponent(b"x"), b.challenge_exponent(b"x"));
    }
}
