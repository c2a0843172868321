//! Canonical Poseidon hash for zkrecover.
//!
//! Every commitment, nullifier, event id and registry root is produced by the
//! functions in this module, natively or as an R1CS gadget. The gadget drives
//! the arkworks `PoseidonSpongeVar` with the same configuration as the native
//! sponge, so a value computed off-circuit is exactly the value a circuit
//! constrains.
//!
//! ## Parameters (BN254 scalar field)
//! - Width: 3 (rate=2, capacity=1)
//! - Full rounds: 8
//! - Partial rounds: 57
//! - S-box: x^5
//! - Round constants: Grain LFSR (arkworks standard)
//!
//! ## Output convention
//! All hash functions output the first element squeezed from the sponge.

use crate::field::{field_to_word, fr_from_word_reduced};
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::{constraints::PoseidonSpongeVar, find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use std::sync::OnceLock;
use zkrecover_types::{RecoveryError, RecoveryResult, Word};

static CANONICAL_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Thread-safe singleton initialization.
pub fn canonical_config() -> &'static PoseidonConfig<Fr> {
    CANONICAL_CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = 254;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            field_bits,
            rate,
            full_rounds,
            partial_rounds,
            0, // skip_matrices
        );

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

pub fn poseidon_hash_fields(inputs: &[Fr]) -> Fr {
    let config = canonical_config();
    let mut sponge = PoseidonSponge::new(config);
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output[0]
}

/// Primary operation for Merkle trees and commitments.
pub fn poseidon_hash2_fields(left: Fr, right: Fr) -> Fr {
    poseidon_hash_fields(&[left, right])
}

/// Used for nullifier computation.
pub fn poseidon_hash3_fields(a: Fr, b: Fr, c: Fr) -> Fr {
    poseidon_hash_fields(&[a, b, c])
}

pub fn poseidon_hash1_field(input: Fr) -> Fr {
    poseidon_hash_fields(&[input])
}

/// In-circuit counterpart of [`poseidon_hash_fields`].
pub fn poseidon_hash_vars(
    cs: ConstraintSystemRef<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, canonical_config());
    for input in inputs {
        sponge.absorb(input)?;
    }
    let output = sponge.squeeze_field_elements(1)?;
    Ok(output[0].clone())
}

// ============================================================================
// Word interface (32-byte big-endian)
// ============================================================================

pub fn poseidon_hash2(left: &Word, right: &Word) -> Word {
    let result = poseidon_hash2_fields(fr_from_word_reduced(left), fr_from_word_reduced(right));
    field_to_word(&result)
}

// ============================================================================
// Merkle tree
// ============================================================================

/// Append-only Poseidon Merkle tree of fixed depth.
///
/// Only the occupied prefix of each level is materialised; absent nodes are
/// the precomputed roots of empty subtrees.
pub struct PoseidonMerkleTree {
    leaves: Vec<Fr>,
    depth: usize,
    zero_values: Vec<Fr>,
}

impl PoseidonMerkleTree {
    /// Precomputes zero values for empty nodes.
    pub fn new(depth: usize) -> Self {
        let mut zero_values = Vec::with_capacity(depth + 1);

        // Zero leaf is H(0)
        let zero_leaf = poseidon_hash1_field(Fr::from(0u64));
        zero_values.push(zero_leaf);

        let mut current = zero_leaf;
        for _ in 0..depth {
            current = poseidon_hash2_fields(current, current);
            zero_values.push(current);
        }

        Self {
            leaves: Vec::new(),
            depth,
            zero_values,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Saturates at `usize::MAX` for trees deeper than the pointer width.
    pub fn capacity(&self) -> usize {
        u32::try_from(self.depth)
            .ok()
            .and_then(|depth| 1usize.checked_shl(depth))
            .unwrap_or(usize::MAX)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn insert(&mut self, leaf: Word) -> RecoveryResult<usize> {
        self.insert_field(fr_from_word_reduced(&leaf))
    }

    pub fn insert_field(&mut self, leaf: Fr) -> RecoveryResult<usize> {
        if self.leaves.len() >= self.capacity() {
            return Err(RecoveryError::Crypto("Merkle tree full".into()));
        }
        let index = self.leaves.len();
        self.leaves.push(leaf);
        Ok(index)
    }

    pub fn root(&self) -> Word {
        field_to_word(&self.root_field())
    }

    pub fn root_field(&self) -> Fr {
        if self.leaves.is_empty() {
            return self.zero_values[self.depth];
        }
        let levels = self.levels();
        levels[self.depth][0]
    }

    /// Sibling path for the leaf at `index`. The flag is true when the path
    /// node sits on the left, i.e. the sibling is hashed on the right.
    pub fn proof(&self, index: usize) -> Option<Vec<(Word, bool)>> {
        self.proof_field(index).map(|path| {
            path.into_iter()
                .map(|(sibling, is_left)| (field_to_word(&sibling), is_left))
                .collect()
        })
    }

    pub fn proof_field(&self, index: usize) -> Option<Vec<(Fr, bool)>> {
        if index >= self.leaves.len() {
            return None;
        }

        let levels = self.levels();
        let mut path = Vec::with_capacity(self.depth);
        let mut idx = index;

        for (depth_idx, level) in levels.iter().take(self.depth).enumerate() {
            let is_left = idx % 2 == 0;
            let sibling_idx = idx ^ 1;
            let sibling = level
                .get(sibling_idx)
                .copied()
                .unwrap_or(self.zero_values[depth_idx]);
            path.push((sibling, is_left));
            idx /= 2;
        }

        Some(path)
    }

    pub fn verify_proof(leaf: &Word, proof: &[(Word, bool)], root: &Word) -> bool {
        let proof_fr: Vec<(Fr, bool)> = proof
            .iter()
            .map(|(sibling, is_left)| (fr_from_word_reduced(sibling), *is_left))
            .collect();
        Self::verify_proof_field(fr_from_word_reduced(leaf), &proof_fr, fr_from_word_reduced(root))
    }

    pub fn verify_proof_field(leaf: Fr, proof: &[(Fr, bool)], root: Fr) -> bool {
        let mut current = leaf;

        for (sibling, is_left) in proof {
            if *is_left {
                current = poseidon_hash2_fields(current, *sibling);
            } else {
                current = poseidon_hash2_fields(*sibling, current);
            }
        }

        current == root
    }

    fn levels(&self) -> Vec<Vec<Fr>> {
        let mut levels = Vec::with_capacity(self.depth + 1);
        let mut level = self.leaves.clone();

        for depth_idx in 0..self.depth {
            let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
            for chunk in level.chunks(2) {
                let left = chunk[0];
                let right = if chunk.len() > 1 {
                    chunk[1]
                } else {
                    self.zero_values[depth_idx]
                };
                next_level.push(poseidon_hash2_fields(left, right));
            }
            levels.push(level);
            level = next_level;
        }
        levels.push(level);

        levels
    }
}
