//! Conversions between 32-byte big-endian words and BN254 field elements.
//!
//! Words arriving from ABI payloads are *strictly* parsed: a word that is not
//! the canonical encoding of a field element (i.e. `>= modulus`) is rejected
//! rather than reduced, mirroring the scalar-field range check performed by
//! on-chain Groth16 verifiers. Hash inputs that are not public circuit
//! signals (tags, free-form secrets) are reduced modulo the order instead.

use ark_bn254::Fr;
use ark_ff::{BigInt, BigInteger, PrimeField};
use sha3::{Digest, Keccak256};
use zkrecover_types::{EthAddress, Word, WORD_SIZE};

/// Interpret a big-endian word as four little-endian u64 limbs.
pub fn word_to_bigint(word: &Word) -> BigInt<4> {
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let end = WORD_SIZE - i * 8;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&word[end - 8..end]);
        *limb = u64::from_be_bytes(buf);
    }
    BigInt::new(limbs)
}

/// Canonical parse; `None` when the word is outside the field.
pub fn field_from_word<F: PrimeField<BigInt = BigInt<4>>>(word: &Word) -> Option<F> {
    F::from_bigint(word_to_bigint(word))
}

pub fn field_to_word<F: PrimeField>(value: &F) -> Word {
    let bytes = value.into_bigint().to_bytes_be();
    let mut word = [0u8; WORD_SIZE];
    let offset = WORD_SIZE.saturating_sub(bytes.len());
    word[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(WORD_SIZE)..]);
    word
}

/// Reducing parse for values that never travel as public inputs.
pub fn fr_from_word_reduced(word: &Word) -> Fr {
    Fr::from_be_bytes_mod_order(word)
}

pub fn address_to_fr(address: &EthAddress) -> Fr {
    fr_from_word_reduced(&address.to_word())
}

/// keccak-256 of a fixed tag, reduced into the scalar field.
pub fn tag_to_fr(tag: &[u8]) -> Fr {
    let digest = Keccak256::digest(tag);
    Fr::from_be_bytes_mod_order(&digest)
}
