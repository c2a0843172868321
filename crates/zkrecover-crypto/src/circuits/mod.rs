pub mod commitment;
pub mod identity;

use crate::groth16::setup;
use ark_bn254::Bn254;
use ark_groth16::{ProvingKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zkrecover_types::{RecoveryError, RecoveryResult};

pub use commitment::{
    commit_secret, knowledge_public_inputs, prove_knowledge, prove_recovery,
    recovery_public_inputs, CommitmentKnowledgeCircuit, CommitmentRecoveryCircuit,
    RecoverySecret, COMMITMENT_DOMAIN,
};
pub use identity::{
    event_data, event_id, prove_identity_query, IdentityQueryCircuit, IdentityQueryInputs,
    IdentityQueryWitness, IdentitySecret, EVENT_DATA_TAG, EVENT_DOMAIN_TAG, IDENTITY_SELECTOR,
};

/// The three circuits a deployment needs keys for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    IdentityQuery,
    CommitmentKnowledge,
    CommitmentRecovery,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 3] = [
        CircuitKind::IdentityQuery,
        CircuitKind::CommitmentKnowledge,
        CircuitKind::CommitmentRecovery,
    ];

    /// Prefix of the `.pk.bin`, `.vk.bin`, `.vk.hash` and `.meta.json` files.
    pub fn file_stem(&self) -> &'static str {
        match self {
            CircuitKind::IdentityQuery => "identity_query",
            CircuitKind::CommitmentKnowledge => "commitment_knowledge",
            CircuitKind::CommitmentRecovery => "commitment_recovery",
        }
    }

    pub fn num_public_inputs(&self) -> usize {
        match self {
            CircuitKind::IdentityQuery => 6,
            CircuitKind::CommitmentKnowledge => 1,
            CircuitKind::CommitmentRecovery => 2,
        }
    }

    /// Runs the circuit-specific setup. `tree_depth` only affects the
    /// identity query circuit.
    pub fn setup(&self, tree_depth: usize) -> RecoveryResult<(ProvingKey<Bn254>, VerifyingKey<Bn254>)> {
        match self {
            CircuitKind::IdentityQuery => setup(IdentityQueryCircuit::blank(tree_depth)),
            CircuitKind::CommitmentKnowledge => setup(CommitmentKnowledgeCircuit::blank()),
            CircuitKind::CommitmentRecovery => setup(CommitmentRecoveryCircuit::blank()),
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for CircuitKind {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "identity_query" | "identity" => Ok(CircuitKind::IdentityQuery),
            "commitment_knowledge" | "knowledge" => Ok(CircuitKind::CommitmentKnowledge),
            "commitment_recovery" | "recovery" => Ok(CircuitKind::CommitmentRecovery),
            other => Err(RecoveryError::Config(format!("Unknown circuit: {}", other))),
        }
    }
}
