//! Groth16 over BN254: proof-point codec, verifier oracle, prover helpers.
//!
//! Proofs travel as eight 32-byte words in the layout expected by Solidity
//! pairing verifiers: `a = [x, y]`, `b = [[x.c1, x.c0], [y.c1, y.c0]]`,
//! `c = [x, y]`. Decoding never panics; a point that is off-curve or outside
//! the prime-order subgroup makes verification fail.

use crate::field::{field_from_word, field_to_word};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::thread_rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zkrecover_types::{RecoveryError, RecoveryResult, Word, PROOF_POINT_WORDS, WORD_SIZE};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPoints {
    pub a: [Word; 2],
    pub b: [[Word; 2]; 2],
    pub c: [Word; 2],
}

impl ProofPoints {
    pub fn from_proof(proof: &Proof<Bn254>) -> Self {
        let (ax, ay) = g1_coords(&proof.a);
        let (cx, cy) = g1_coords(&proof.c);
        let (bx, by) = match proof.b.xy() {
            Some((x, y)) => (*x, *y),
            None => (Fq2::default(), Fq2::default()),
        };

        Self {
            a: [field_to_word(&ax), field_to_word(&ay)],
            b: [
                [field_to_word(&bx.c1), field_to_word(&bx.c0)],
                [field_to_word(&by.c1), field_to_word(&by.c0)],
            ],
            c: [field_to_word(&cx), field_to_word(&cy)],
        }
    }

    /// `None` when any coordinate is non-canonical or a point is invalid.
    pub fn to_proof(&self) -> Option<Proof<Bn254>> {
        let a = decode_g1(&self.a)?;
        let b = decode_g2(&self.b)?;
        let c = decode_g1(&self.c)?;
        Some(Proof { a, b, c })
    }

    pub fn to_words(&self) -> [Word; PROOF_POINT_WORDS] {
        [
            self.a[0], self.a[1], self.b[0][0], self.b[0][1], self.b[1][0], self.b[1][1], self.c[0],
            self.c[1],
        ]
    }

    pub fn from_words(words: &[Word; PROOF_POINT_WORDS]) -> Self {
        Self {
            a: [words[0], words[1]],
            b: [[words[2], words[3]], [words[4], words[5]]],
            c: [words[6], words[7]],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words().concat()
    }

    pub fn from_bytes(bytes: &[u8]) -> RecoveryResult<Self> {
        if bytes.len() != PROOF_POINT_WORDS * WORD_SIZE {
            return Err(RecoveryError::Encoding(format!(
                "Invalid proof length: {} bytes",
                bytes.len()
            )));
        }
        let mut words = [[0u8; WORD_SIZE]; PROOF_POINT_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
            word.copy_from_slice(chunk);
        }
        Ok(Self::from_words(&words))
    }
}

fn g1_coords(point: &G1Affine) -> (Fq, Fq) {
    match point.xy() {
        Some((x, y)) => (*x, *y),
        None => (Fq::default(), Fq::default()),
    }
}

fn decode_g1(coords: &[Word; 2]) -> Option<G1Affine> {
    let x: Fq = field_from_word(&coords[0])?;
    let y: Fq = field_from_word(&coords[1])?;
    if x == Fq::default() && y == Fq::default() {
        return Some(G1Affine::identity());
    }
    let point = G1Affine::new_unchecked(x, y);
    if point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve() {
        Some(point)
    } else {
        None
    }
}

fn decode_g2(coords: &[[Word; 2]; 2]) -> Option<G2Affine> {
    let x = Fq2::new(field_from_word(&coords[0][1])?, field_from_word(&coords[0][0])?);
    let y = Fq2::new(field_from_word(&coords[1][1])?, field_from_word(&coords[1][0])?);
    if x == Fq2::default() && y == Fq2::default() {
        return Some(G2Affine::identity());
    }
    let point = G2Affine::new_unchecked(x, y);
    if point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve() {
        Some(point)
    } else {
        None
    }
}

// ============================================================================
// Verifier oracle
// ============================================================================

/// Pure check of a proof against public inputs.
pub trait ProofVerifier: Send + Sync {
    fn verify_proof(&self, proof: &ProofPoints, public_inputs: &[Word]) -> bool;
}

pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
    num_public_inputs: usize,
}

impl Groth16Verifier {
    pub fn new(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            num_public_inputs: vk.gamma_abc_g1.len().saturating_sub(1),
            pvk: prepare_verifying_key(vk),
        }
    }

    pub fn from_vk_bytes(bytes: &[u8]) -> RecoveryResult<Self> {
        Ok(Self::new(&vk_from_bytes(bytes)?))
    }

    pub fn num_public_inputs(&self) -> usize {
        self.num_public_inputs
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify_proof(&self, proof: &ProofPoints, public_inputs: &[Word]) -> bool {
        if public_inputs.len() != self.num_public_inputs {
            debug!(
                expected = self.num_public_inputs,
                got = public_inputs.len(),
                "public input count mismatch"
            );
            return false;
        }

        let inputs: Option<Vec<Fr>> = public_inputs.iter().map(field_from_word).collect();
        let Some(inputs) = inputs else {
            debug!("public input outside scalar field");
            return false;
        };

        let Some(proof) = proof.to_proof() else {
            debug!("malformed proof points");
            return false;
        };

        Groth16::<Bn254>::verify_with_processed_vk(&self.pvk, &inputs, &proof).unwrap_or(false)
    }
}

// ============================================================================
// Setup and proving
// ============================================================================

/// Circuit-specific trusted setup with a fresh random toxic waste.
pub fn setup<C: ConstraintSynthesizer<Fr>>(
    circuit: C,
) -> RecoveryResult<(ProvingKey<Bn254>, VerifyingKey<Bn254>)> {
    let mut rng = thread_rng();
    Groth16::<Bn254>::circuit_specific_setup(circuit, &mut rng)
        .map_err(|e| RecoveryError::Crypto(format!("Setup failed: {}", e)))
}

pub fn prove<C: ConstraintSynthesizer<Fr>>(
    pk: &ProvingKey<Bn254>,
    circuit: C,
) -> RecoveryResult<ProofPoints> {
    let mut rng = thread_rng();
    let proof = Groth16::<Bn254>::prove(pk, circuit, &mut rng)
        .map_err(|e| RecoveryError::Crypto(format!("Proof generation failed: {}", e)))?;
    Ok(ProofPoints::from_proof(&proof))
}

pub fn public_inputs_to_words(inputs: &[Fr]) -> Vec<Word> {
    inputs.iter().map(field_to_word).collect()
}

// ============================================================================
// Key serialization
// ============================================================================

pub fn vk_to_bytes(vk: &VerifyingKey<Bn254>) -> RecoveryResult<Vec<u8>> {
    let mut bytes = Vec::new();
    vk.serialize_compressed(&mut bytes)
        .map_err(|e| RecoveryError::Serialization(e.to_string()))?;
    Ok(bytes)
}

pub fn vk_from_bytes(bytes: &[u8]) -> RecoveryResult<VerifyingKey<Bn254>> {
    VerifyingKey::deserialize_compressed(bytes)
        .map_err(|e| RecoveryError::Serialization(format!("Invalid verifying key: {}", e)))
}

pub fn pk_to_bytes(pk: &ProvingKey<Bn254>) -> RecoveryResult<Vec<u8>> {
    let mut bytes = Vec::new();
    pk.serialize_compressed(&mut bytes)
        .map_err(|e| RecoveryError::Serialization(e.to_string()))?;
    Ok(bytes)
}

pub fn pk_from_bytes(bytes: &[u8]) -> RecoveryResult<ProvingKey<Bn254>> {
    ProvingKey::deserialize_compressed(bytes)
        .map_err(|e| RecoveryError::Serialization(format!("Invalid proving key: {}", e)))
}

/// blake3 of the compressed verifying key, hex encoded.
pub fn vk_hash(vk_bytes: &[u8]) -> String {
    hex::encode(blake3::hash(vk_bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
    use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
    use proptest::prelude::*;
    use std::sync::OnceLock;

    /// x * x == y, with y public.
    #[derive(Clone)]
    struct SquareCircuit {
        x: Option<Fr>,
        y: Option<Fr>,
    }

    impl ConstraintSynthesizer<Fr> for SquareCircuit {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
            let y = FpVar::new_input(cs.clone(), || self.y.ok_or(SynthesisError::AssignmentMissing))?;
            let x = FpVar::new_witness(cs, || self.x.ok_or(SynthesisError::AssignmentMissing))?;
            (&x * &x).enforce_equal(&y)
        }
    }

    fn square_keys() -> (ProvingKey<Bn254>, Groth16Verifier) {
        let (pk, vk) = setup(SquareCircuit { x: None, y: None }).unwrap();
        (pk, Groth16Verifier::new(&vk))
    }

    #[test]
    fn test_prove_and_verify() {
        let (pk, verifier) = square_keys();
        assert_eq!(verifier.num_public_inputs(), 1);

        let proof = prove(
            &pk,
            SquareCircuit {
                x: Some(Fr::from(3u64)),
                y: Some(Fr::from(9u64)),
            },
        )
        .unwrap();

        let inputs = public_inputs_to_words(&[Fr::from(9u64)]);
        assert!(verifier.verify_proof(&proof, &inputs));

        let wrong = public_inputs_to_words(&[Fr::from(10u64)]);
        assert!(!verifier.verify_proof(&proof, &wrong));
        assert!(!verifier.verify_proof(&proof, &[]));
    }

    #[test]
    fn test_points_survive_word_layout() {
        let (pk, verifier) = square_keys();
        let proof = prove(
            &pk,
            SquareCircuit {
                x: Some(Fr::from(5u64)),
                y: Some(Fr::from(25u64)),
            },
        )
        .unwrap();

        let restored = ProofPoints::from_bytes(&proof.to_bytes()).unwrap();
        assert_eq!(restored, proof);
        assert!(verifier.verify_proof(&restored, &public_inputs_to_words(&[Fr::from(25u64)])));
        assert!(ProofPoints::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_malformed_points_rejected() {
        let (pk, verifier) = square_keys();
        let proof = prove(
            &pk,
            SquareCircuit {
                x: Some(Fr::from(2u64)),
                y: Some(Fr::from(4u64)),
            },
        )
        .unwrap();
        let inputs = public_inputs_to_words(&[Fr::from(4u64)]);

        let mut off_curve = proof.clone();
        off_curve.a[1][31] ^= 0x01;
        assert!(off_curve.to_proof().is_none());
        assert!(!verifier.verify_proof(&off_curve, &inputs));

        let mut out_of_field = proof.clone();
        out_of_field.c[0] = [0xff; 32];
        assert!(!verifier.verify_proof(&out_of_field, &inputs));

        let mut swapped = proof;
        swapped.b[0].swap(0, 1);
        assert!(!verifier.verify_proof(&swapped, &inputs));
    }

    #[test]
    fn test_non_canonical_input_rejected() {
        let (pk, verifier) = square_keys();
        let proof = prove(
            &pk,
            SquareCircuit {
                x: Some(Fr::from(1u64)),
                y: Some(Fr::from(1u64)),
            },
        )
        .unwrap();
        assert!(!verifier.verify_proof(&proof, &[[0xff; 32]]));
    }

    #[test]
    fn test_vk_serialization() {
        let (_, vk) = setup(SquareCircuit { x: None, y: None }).unwrap();
        let bytes = vk_to_bytes(&vk).unwrap();
        let verifier = Groth16Verifier::from_vk_bytes(&bytes).unwrap();
        assert_eq!(verifier.num_public_inputs(), 1);
        assert_eq!(vk_hash(&bytes).len(), 64);
        assert!(Groth16Verifier::from_vk_bytes(&bytes[1..]).is_err());
    }

    fn shared_verifier() -> &'static Groth16Verifier {
        static VERIFIER: OnceLock<Groth16Verifier> = OnceLock::new();
        VERIFIER.get_or_init(|| square_keys().1)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_arbitrary_points_never_verify(
            bytes in proptest::collection::vec(any::<u8>(), PROOF_POINT_WORDS * WORD_SIZE),
            y in any::<u64>(),
        ) {
            let points = ProofPoints::from_bytes(&bytes).unwrap();
            let inputs = public_inputs_to_words(&[Fr::from(y)]);
            prop_assert!(!shared_verifier().verify_proof(&points, &inputs));
        }
    }
}
