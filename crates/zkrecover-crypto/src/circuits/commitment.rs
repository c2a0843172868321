//! Secret-commitment circuits.
//!
//! `commitment = Poseidon(COMMITMENT_DOMAIN, secret)`. The knowledge circuit
//! proves an opening of a commitment at enrollment time; the recovery circuit
//! proves the same opening while binding a new owner address as a second
//! public input.

use crate::field::{address_to_fr, field_to_word, fr_from_word_reduced};
use crate::groth16::{prove, ProofPoints};
use crate::poseidon::{poseidon_hash2_fields, poseidon_hash_vars};
use ark_bn254::{Bn254, Fr};
use ark_groth16::ProvingKey;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar, fields::FieldVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use zeroize::{Zeroize, ZeroizeOnDrop};
use zkrecover_types::{Commitment, EthAddress, RecoveryResult, Word};

pub const COMMITMENT_DOMAIN: u64 = 1;

pub fn commit_secret(secret: Fr) -> Fr {
    poseidon_hash2_fields(Fr::from(COMMITMENT_DOMAIN), secret)
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecoverySecret {
    bytes: Word,
}

impl RecoverySecret {
    pub fn from_bytes(bytes: Word) -> Self {
        Self { bytes }
    }

    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn to_field(&self) -> Fr {
        fr_from_word_reduced(&self.bytes)
    }

    pub fn commitment(&self) -> Commitment {
        Commitment::from_bytes(field_to_word(&commit_secret(self.to_field())))
    }
}

impl std::fmt::Debug for RecoverySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecoverySecret(..)")
    }
}

fn alloc_opening(
    cs: &ConstraintSystemRef<Fr>,
    secret: Option<Fr>,
    commitment: Option<Fr>,
) -> Result<(), SynthesisError> {
    let commitment_var =
        FpVar::new_input(cs.clone(), || commitment.ok_or(SynthesisError::AssignmentMissing))?;
    let secret_var =
        FpVar::new_witness(cs.clone(), || secret.ok_or(SynthesisError::AssignmentMissing))?;

    let domain = FpVar::constant(Fr::from(COMMITMENT_DOMAIN));
    let computed = poseidon_hash_vars(cs.clone(), &[domain, secret_var])?;
    computed.enforce_equal(&commitment_var)
}

#[derive(Clone, Default)]
pub struct CommitmentKnowledgeCircuit {
    pub secret: Option<Fr>,
    pub commitment: Option<Fr>,
}

impl CommitmentKnowledgeCircuit {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn new(secret: &RecoverySecret) -> Self {
        let value = secret.to_field();
        Self {
            secret: Some(value),
            commitment: Some(commit_secret(value)),
        }
    }
}

impl ConstraintSynthesizer<Fr> for CommitmentKnowledgeCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        alloc_opening(&cs, self.secret, self.commitment)
    }
}

#[derive(Clone, Default)]
pub struct CommitmentRecoveryCircuit {
    pub secret: Option<Fr>,
    pub commitment: Option<Fr>,
    pub new_owner: Option<Fr>,
}

impl CommitmentRecoveryCircuit {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn new(secret: &RecoverySecret, new_owner: &EthAddress) -> Self {
        let value = secret.to_field();
        Self {
            secret: Some(value),
            commitment: Some(commit_secret(value)),
            new_owner: Some(address_to_fr(new_owner)),
        }
    }
}

impl ConstraintSynthesizer<Fr> for CommitmentRecoveryCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        alloc_opening(&cs, self.secret, self.commitment)?;

        let new_owner =
            FpVar::new_input(cs.clone(), || self.new_owner.ok_or(SynthesisError::AssignmentMissing))?;
        // Otherwise unconstrained; squaring ties it into the proof.
        let _ = new_owner.square()?;

        Ok(())
    }
}

pub fn knowledge_public_inputs(commitment: &Commitment) -> Vec<Word> {
    vec![*commitment.as_bytes()]
}

pub fn recovery_public_inputs(commitment: &Commitment, new_owner: &EthAddress) -> Vec<Word> {
    vec![*commitment.as_bytes(), new_owner.to_word()]
}

pub fn prove_knowledge(pk: &ProvingKey<Bn254>, secret: &RecoverySecret) -> RecoveryResult<ProofPoints> {
    prove(pk, CommitmentKnowledgeCircuit::new(secret))
}

pub fn prove_recovery(
    pk: &ProvingKey<Bn254>,
    secret: &RecoverySecret,
    new_owner: &EthAddress,
) -> RecoveryResult<ProofPoints> {
    prove(pk, CommitmentRecoveryCircuit::new(secret, new_owner))
}
