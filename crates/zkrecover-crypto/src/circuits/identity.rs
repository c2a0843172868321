//! Identity query circuit.
//!
//! Proves membership of `leaf = Poseidon(secret, blinding)` in the identity
//! registry tree under a public root, and reveals
//! `nullifier = Poseidon(secret, leaf, eventId)` for the queried event.
//!
//! Public inputs, in order:
//! `[nullifier, eventId, eventData, registrationRoot, selector, currentDate]`.
//!
//! Path directions are private witnesses, so one set of keys serves every
//! leaf position.

use crate::field::{address_to_fr, field_to_word, fr_from_word_reduced, tag_to_fr};
use crate::groth16::{prove, ProofPoints};
use crate::poseidon::{poseidon_hash2_fields, poseidon_hash3_fields, poseidon_hash_vars};
use ark_bn254::{Bn254, Fr};
use ark_groth16::ProvingKey;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
    select::CondSelectGadget,
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use zeroize::{Zeroize, ZeroizeOnDrop};
use zkrecover_types::{EthAddress, Nullifier, RecoveryError, RecoveryResult, RegistrationRoot, Word};

/// Query selector asserting that only the nullifier is disclosed.
pub const IDENTITY_SELECTOR: u64 = 0x1001;

pub const EVENT_DOMAIN_TAG: &[u8] = b"NullifierIdentityProvider";

pub const EVENT_DATA_TAG: &[u8] = b"NullifierIdentityProvider.recovery";

/// Event identifier scoped to one account.
pub fn event_id(account: &EthAddress) -> Fr {
    poseidon_hash2_fields(address_to_fr(account), tag_to_fr(EVENT_DOMAIN_TAG))
}

pub fn event_data() -> Fr {
    tag_to_fr(EVENT_DATA_TAG)
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct IdentitySecret {
    secret: Word,
    blinding: Word,
}

impl IdentitySecret {
    pub fn from_parts(secret: Word, blinding: Word) -> Self {
        Self { secret, blinding }
    }

    pub fn random() -> Self {
        use rand::RngCore;
        let mut rng = rand::thread_rng();
        let mut secret = [0u8; 32];
        let mut blinding = [0u8; 32];
        rng.fill_bytes(&mut secret);
        rng.fill_bytes(&mut blinding);
        Self { secret, blinding }
    }

    fn secret_fr(&self) -> Fr {
        fr_from_word_reduced(&self.secret)
    }

    fn blinding_fr(&self) -> Fr {
        fr_from_word_reduced(&self.blinding)
    }

    /// Registry leaf for this identity.
    pub fn leaf(&self) -> Fr {
        poseidon_hash2_fields(self.secret_fr(), self.blinding_fr())
    }

    pub fn leaf_word(&self) -> Word {
        field_to_word(&self.leaf())
    }

    pub fn nullifier(&self, event_id: Fr) -> Fr {
        poseidon_hash3_fields(self.secret_fr(), self.leaf(), event_id)
    }

    /// Nullifier revealed when recovering `account`.
    pub fn nullifier_for(&self, account: &EthAddress) -> Nullifier {
        Nullifier::from_bytes(field_to_word(&self.nullifier(event_id(account))))
    }
}

impl std::fmt::Debug for IdentitySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdentitySecret(..)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityQueryInputs {
    pub nullifier: Fr,
    pub event_id: Fr,
    pub event_data: Fr,
    pub registration_root: Fr,
    pub selector: Fr,
    pub current_date: Fr,
}

impl IdentityQueryInputs {
    /// Inputs a verifier reconstructs for `account` from its recorded nullifier.
    pub fn for_account(
        account: &EthAddress,
        nullifier: &Nullifier,
        root: &RegistrationRoot,
        current_date: u64,
    ) -> Self {
        Self {
            nullifier: fr_from_word_reduced(nullifier.as_bytes()),
            event_id: event_id(account),
            event_data: event_data(),
            registration_root: fr_from_word_reduced(root.as_bytes()),
            selector: Fr::from(IDENTITY_SELECTOR),
            current_date: Fr::from(current_date),
        }
    }

    pub fn to_vec(&self) -> Vec<Fr> {
        vec![
            self.nullifier,
            self.event_id,
            self.event_data,
            self.registration_root,
            self.selector,
            self.current_date,
        ]
    }

    pub fn to_words(&self) -> Vec<Word> {
        self.to_vec().iter().map(field_to_word).collect()
    }
}

#[derive(Clone)]
pub struct IdentityQueryCircuit {
    depth: usize,
    secret: Option<Fr>,
    blinding: Option<Fr>,
    path: Option<Vec<(Fr, bool)>>,
    inputs: Option<IdentityQueryInputs>,
}

impl IdentityQueryCircuit {
    /// Shape-only instance for key generation.
    pub fn blank(depth: usize) -> Self {
        Self {
            depth,
            secret: None,
            blinding: None,
            path: None,
            inputs: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl ConstraintSynthesizer<Fr> for IdentityQueryCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let inputs = self.inputs;
        let input = |select: fn(&IdentityQueryInputs) -> Fr| {
            FpVar::new_input(cs.clone(), || {
                inputs.as_ref().map(select).ok_or(SynthesisError::AssignmentMissing)
            })
        };

        let nullifier_var = input(|i| i.nullifier)?;
        let event_id_var = input(|i| i.event_id)?;
        let event_data_var = input(|i| i.event_data)?;
        let root_var = input(|i| i.registration_root)?;
        let selector_var = input(|i| i.selector)?;
        let date_var = input(|i| i.current_date)?;

        let secret_var = FpVar::new_witness(cs.clone(), || {
            self.secret.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let blinding_var = FpVar::new_witness(cs.clone(), || {
            self.blinding.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let leaf_var = poseidon_hash_vars(cs.clone(), &[secret_var.clone(), blinding_var])?;

        let mut current = leaf_var.clone();
        for level in 0..self.depth {
            let step = self.path.as_ref().and_then(|p| p.get(level).copied());
            let sibling_var = FpVar::new_witness(cs.clone(), || {
                step.map(|(s, _)| s).ok_or(SynthesisError::AssignmentMissing)
            })?;
            let is_left_var = Boolean::new_witness(cs.clone(), || {
                step.map(|(_, l)| l).ok_or(SynthesisError::AssignmentMissing)
            })?;

            let left = FpVar::conditionally_select(&is_left_var, &current, &sibling_var)?;
            let right = FpVar::conditionally_select(&is_left_var, &sibling_var, &current)?;
            current = poseidon_hash_vars(cs.clone(), &[left, right])?;
        }
        current.enforce_equal(&root_var)?;

        let computed_nullifier = poseidon_hash_vars(cs.clone(), &[secret_var, leaf_var, event_id_var])?;
        computed_nullifier.enforce_equal(&nullifier_var)?;

        // Bind the remaining public signals into the proof.
        let _ = event_data_var.square()?;
        let _ = selector_var.square()?;
        let _ = date_var.square()?;

        Ok(())
    }
}

/// Everything a holder needs to answer an identity query for one account.
pub struct IdentityQueryWitness {
    secret: IdentitySecret,
    path: Vec<(Fr, bool)>,
    inputs: IdentityQueryInputs,
}

impl IdentityQueryWitness {
    pub fn new(
        secret: IdentitySecret,
        path: Vec<(Fr, bool)>,
        root: &RegistrationRoot,
        account: &EthAddress,
        current_date: u64,
    ) -> Self {
        let nullifier = secret.nullifier_for(account);
        let inputs = IdentityQueryInputs::for_account(account, &nullifier, root, current_date);
        Self {
            secret,
            path,
            inputs,
        }
    }

    /// Answers with a non-default selector.
    pub fn with_selector(mut self, selector: u64) -> Self {
        self.inputs.selector = Fr::from(selector);
        self
    }

    pub fn public_inputs(&self) -> &IdentityQueryInputs {
        &self.inputs
    }

    pub fn circuit(&self) -> IdentityQueryCircuit {
        IdentityQueryCircuit {
            depth: self.path.len(),
            secret: Some(self.secret.secret_fr()),
            blinding: Some(self.secret.blinding_fr()),
            path: Some(self.path.clone()),
            inputs: Some(self.inputs),
        }
    }
}

/// Proves with keys generated for a tree of `depth` levels.
pub fn prove_identity_query(
    pk: &ProvingKey<Bn254>,
    depth: usize,
    witness: &IdentityQueryWitness,
) -> RecoveryResult<ProofPoints> {
    if witness.path.len() != depth {
        return Err(RecoveryError::Crypto(format!(
            "Merkle path has {} levels, circuit expects {}",
            witness.path.len(),
            depth
        )));
    }
    prove(pk, witness.circuit())
}
