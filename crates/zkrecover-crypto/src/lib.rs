#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod circuits;
pub mod field;
pub mod groth16;
pub mod poseidon;

pub use circuits::CircuitKind;
pub use field::{address_to_fr, field_from_word, field_to_word, fr_from_word_reduced, tag_to_fr};
pub use groth16::{Groth16Verifier, ProofPoints, ProofVerifier};
pub use poseidon::{
    canonical_config, poseidon_hash1_field, poseidon_hash2, poseidon_hash2_fields,
    poseidon_hash3_fields, poseidon_hash_fields, PoseidonMerkleTree,
};

pub use ark_bn254::Fr;
