//! Recovery through knowledge of a secret committed at enrollment.
//!
//! Enrollment carries `commitment = Poseidon(1, secret)` together with a proof
//! that the committer can open it. Recovery proves the same opening with the
//! requested new owner as a public input. Replay protection is left to the
//! account's proof fingerprints.

use crate::abi::{decode_proof_points, decode_subject, CommitmentEnrollment};
use crate::provider::{EventLog, RecoveryProvider};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use zkrecover_crypto::circuits::{knowledge_public_inputs, recovery_public_inputs};
use zkrecover_crypto::ProofVerifier;
use zkrecover_types::{Commitment, EthAddress, ProviderEvent, RecoveryError, RecoveryResult};

struct CommitmentProviderConfig {
    admin: EthAddress,
    knowledge_verifier: Arc<dyn ProofVerifier>,
    recovery_verifier: Arc<dyn ProofVerifier>,
}

pub struct CommitmentSecretProvider {
    address: EthAddress,
    config: OnceLock<CommitmentProviderConfig>,
    commitments: RwLock<HashMap<EthAddress, Commitment>>,
    events: EventLog,
}

impl CommitmentSecretProvider {
    pub fn new(address: EthAddress) -> Self {
        Self {
            address,
            config: OnceLock::new(),
            commitments: RwLock::new(HashMap::new()),
            events: EventLog::default(),
        }
    }

    pub fn initialized(
        address: EthAddress,
        admin: EthAddress,
        knowledge_verifier: Arc<dyn ProofVerifier>,
        recovery_verifier: Arc<dyn ProofVerifier>,
    ) -> RecoveryResult<Self> {
        let provider = Self::new(address);
        provider.initialize(admin, knowledge_verifier, recovery_verifier)?;
        Ok(provider)
    }

    pub fn initialize(
        &self,
        admin: EthAddress,
        knowledge_verifier: Arc<dyn ProofVerifier>,
        recovery_verifier: Arc<dyn ProofVerifier>,
    ) -> RecoveryResult<()> {
        if admin.is_zero() {
            return Err(RecoveryError::ZeroAddress("provider admin".into()));
        }
        self.config
            .set(CommitmentProviderConfig {
                admin,
                knowledge_verifier,
                recovery_verifier,
            })
            .map_err(|_| RecoveryError::AlreadyInitialized("CommitmentSecretProvider".into()))?;
        info!(provider = %self.address, "commitment secret provider initialized");
        Ok(())
    }

    fn config(&self) -> RecoveryResult<&CommitmentProviderConfig> {
        self.config
            .get()
            .ok_or_else(|| RecoveryError::NotInitialized("CommitmentSecretProvider".into()))
    }

    pub fn is_initialized(&self) -> bool {
        self.config.get().is_some()
    }

    pub fn admin(&self) -> RecoveryResult<EthAddress> {
        Ok(self.config()?.admin)
    }

    pub fn knowledge_verifier(&self) -> RecoveryResult<Arc<dyn ProofVerifier>> {
        Ok(self.config()?.knowledge_verifier.clone())
    }

    pub fn recovery_verifier(&self) -> RecoveryResult<Arc<dyn ProofVerifier>> {
        Ok(self.config()?.recovery_verifier.clone())
    }

    /// Stored commitment, zero when the account is not subscribed.
    pub fn commitment_of(&self, account: &EthAddress) -> Commitment {
        self.commitments
            .read()
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<ProviderEvent> {
        self.events.snapshot()
    }
}

impl RecoveryProvider for CommitmentSecretProvider {
    fn address(&self) -> EthAddress {
        self.address
    }

    fn subscribe(&self, account: &EthAddress, enroll_data: &[u8]) -> RecoveryResult<()> {
        let config = self.config()?;
        let enrollment = CommitmentEnrollment::decode(enroll_data)?;

        let inputs = knowledge_public_inputs(&enrollment.commitment);
        if !config.knowledge_verifier.verify_proof(&enrollment.proof, &inputs) {
            warn!(account = %account, "commitment knowledge proof rejected");
            return Err(RecoveryError::InvalidRecoveryProof);
        }

        self.commitments.write().insert(*account, enrollment.commitment);
        self.events.emit(ProviderEvent::AccountSubscribed { account: *account });
        info!(provider = %self.address, account = %account, "account subscribed");
        Ok(())
    }

    fn unsubscribe(&self, account: &EthAddress) -> RecoveryResult<()> {
        self.config()?;
        self.commitments.write().remove(account);
        self.events.emit(ProviderEvent::AccountUnsubscribed { account: *account });
        info!(provider = %self.address, account = %account, "account unsubscribed");
        Ok(())
    }

    fn check_recovery(
        &self,
        account: &EthAddress,
        subject_data: &[u8],
        proof_payload: &[u8],
    ) -> RecoveryResult<bool> {
        let config = self.config()?;
        let new_owner = decode_subject(subject_data)?;
        let proof = decode_proof_points(proof_payload)?;

        let commitment = self.commitment_of(account);
        if commitment.is_zero() {
            debug!(account = %account, "no commitment on record");
            return Ok(false);
        }

        let inputs = recovery_public_inputs(&commitment, &new_owner);
        Ok(config.recovery_verifier.verify_proof(&proof, &inputs))
    }
}
