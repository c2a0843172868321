//! Account recovery registry and executor.
//!
//! The owner manages which providers may recover the account. Recovery is
//! permissionless: the proof is the authorization, so any relay may submit
//! it. Every operation either completes or leaves owner, enrollments and the
//! used-proof set untouched.

use crate::abi::{decode_subject, proof_fingerprint};
use crate::calls::AccountCall;
use crate::directory::ProviderDirectory;
use crate::provider::RecoveryProvider;
use crate::storage::AccountSnapshot;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zkrecover_types::{AccountEvent, EthAddress, ProofFingerprint, RecoveryError, RecoveryResult};

pub struct Account {
    address: EthAddress,
    owner: EthAddress,
    providers: BTreeSet<EthAddress>,
    used_proofs: BTreeSet<ProofFingerprint>,
    directory: Arc<ProviderDirectory>,
    events: Vec<AccountEvent>,
}

impl Account {
    pub fn new(
        address: EthAddress,
        owner: EthAddress,
        directory: Arc<ProviderDirectory>,
    ) -> RecoveryResult<Self> {
        if owner.is_zero() {
            return Err(RecoveryError::ZeroAddress("account owner".into()));
        }
        Ok(Self {
            address,
            owner,
            providers: BTreeSet::new(),
            used_proofs: BTreeSet::new(),
            directory,
            events: Vec::new(),
        })
    }

    pub fn address(&self) -> EthAddress {
        self.address
    }

    pub fn owner(&self) -> EthAddress {
        self.owner
    }

    pub fn recovery_provider_exists(&self, provider: &EthAddress) -> bool {
        self.providers.contains(provider)
    }

    pub fn recovery_providers(&self) -> impl Iterator<Item = &EthAddress> {
        self.providers.iter()
    }

    pub fn is_proof_used(&self, fingerprint: &ProofFingerprint) -> bool {
        self.used_proofs.contains(fingerprint)
    }

    pub fn events(&self) -> &[AccountEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<AccountEvent> {
        std::mem::take(&mut self.events)
    }

    fn only_owner(&self, caller: &EthAddress) -> RecoveryResult<()> {
        if *caller != self.owner {
            return Err(RecoveryError::AccessDenied(format!(
                "{} is not the owner of {}",
                caller, self.address
            )));
        }
        Ok(())
    }

    fn resolve(&self, provider: &EthAddress) -> RecoveryResult<Arc<dyn RecoveryProvider>> {
        self.directory
            .get(provider)
            .ok_or(RecoveryError::UnknownProvider(*provider))
    }

    pub fn add_recovery_provider(
        &mut self,
        caller: &EthAddress,
        provider: &EthAddress,
        enroll_data: &[u8],
    ) -> RecoveryResult<()> {
        self.only_owner(caller)?;
        if provider.is_zero() {
            return Err(RecoveryError::ZeroAddress("recovery provider".into()));
        }
        if self.providers.contains(provider) {
            return Err(RecoveryError::ProviderAlreadyAdded(*provider));
        }

        self.resolve(provider)?.subscribe(&self.address, enroll_data)?;

        self.providers.insert(*provider);
        self.events
            .push(AccountEvent::RecoveryProviderAdded { provider: *provider });
        info!(account = %self.address, provider = %provider, "recovery provider added");
        Ok(())
    }

    pub fn remove_recovery_provider(
        &mut self,
        caller: &EthAddress,
        provider: &EthAddress,
        disenroll_data: &[u8],
    ) -> RecoveryResult<()> {
        self.only_owner(caller)?;
        if !self.providers.contains(provider) {
            return Err(RecoveryError::ProviderNotRegistered(*provider));
        }

        debug!(bytes = disenroll_data.len(), "disenroll data");
        self.resolve(provider)?.unsubscribe(&self.address)?;

        self.providers.remove(provider);
        self.events
            .push(AccountEvent::RecoveryProviderRemoved { provider: *provider });
        info!(account = %self.address, provider = %provider, "recovery provider removed");
        Ok(())
    }

    /// Check, then commit, then act. Returns the new owner.
    pub fn recover_ownership(
        &mut self,
        subject_data: &[u8],
        provider: &EthAddress,
        proof_payload: &[u8],
    ) -> RecoveryResult<EthAddress> {
        if !self.providers.contains(provider) {
            return Err(RecoveryError::ProviderNotRegistered(*provider));
        }

        let fingerprint = proof_fingerprint(provider, proof_payload);
        if self.used_proofs.contains(&fingerprint) {
            warn!(account = %self.address, fingerprint = %fingerprint, "recovery proof replayed");
            return Err(RecoveryError::ProofAlreadyUsed(fingerprint));
        }

        let recovery = self.resolve(provider)?;
        if !recovery.check_recovery(&self.address, subject_data, proof_payload)? {
            warn!(account = %self.address, provider = %provider, "recovery proof rejected");
            return Err(RecoveryError::InvalidRecoveryProof);
        }

        let new_owner = decode_subject(subject_data)?;
        if new_owner.is_zero() {
            return Err(RecoveryError::ZeroAddress("new owner".into()));
        }

        let old_owner = self.owner;
        self.used_proofs.insert(fingerprint);
        self.owner = new_owner;

        self.events.push(AccountEvent::OwnershipRecovered {
            old_owner,
            new_owner,
        });
        self.events.push(AccountEvent::AccessRecovered {
            subject_data: subject_data.to_vec(),
        });
        info!(
            account = %self.address,
            provider = %provider,
            old_owner = %old_owner,
            new_owner = %new_owner,
            "ownership recovered"
        );
        Ok(new_owner)
    }

    /// Entry point for relayed calldata. Recovery is permissionless; the
    /// enrollment calls require `caller` to be the owner.
    pub fn execute(&mut self, caller: &EthAddress, calldata: &[u8]) -> RecoveryResult<()> {
        match AccountCall::decode(calldata)? {
            AccountCall::AddRecoveryProvider {
                provider,
                enroll_data,
            } => self.add_recovery_provider(caller, &provider, &enroll_data),
            AccountCall::RemoveRecoveryProvider {
                provider,
                disenroll_data,
            } => self.remove_recovery_provider(caller, &provider, &disenroll_data),
            AccountCall::RecoverOwnership {
                subject_data,
                provider,
                proof_payload,
            } => self
                .recover_ownership(&subject_data, &provider, &proof_payload)
                .map(|_| ()),
        }
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            address: self.address,
            owner: self.owner,
            providers: self.providers.iter().copied().collect(),
            used_proofs: self.used_proofs.iter().copied().collect(),
        }
    }

    pub fn restore(snapshot: AccountSnapshot, directory: Arc<ProviderDirectory>) -> RecoveryResult<Self> {
        let mut account = Self::new(snapshot.address, snapshot.owner, directory)?;
        account.providers = snapshot.providers.into_iter().collect();
        account.used_proofs = snapshot.used_proofs.into_iter().collect();
        Ok(account)
    }
}
