//! Recovery through an identity-query proof revealing a pre-bound nullifier.
//!
//! An administrator binds each account to the nullifier its owner's identity
//! produces for that account's event. Recovery proves membership in the
//! identity registry under a currently valid root and reveals that nullifier,
//! without disclosing which identity it belongs to.

use crate::abi::{decode_subject, IdentityPayload};
use crate::provider::{EventLog, RecoveryProvider};
use crate::registry::RegistrationRootOracle;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use zkrecover_crypto::circuits::{event_data, event_id, IDENTITY_SELECTOR};
use zkrecover_crypto::{field_to_word, ProofVerifier};
use zkrecover_types::{
    EthAddress, Nullifier, ProviderEvent, RecoveryError, RecoveryResult, Word, WORD_SIZE,
};

struct NullifierProviderConfig {
    admin: EthAddress,
    verifier: Arc<dyn ProofVerifier>,
    registry: Arc<dyn RegistrationRootOracle>,
}

pub struct NullifierIdentityProvider {
    address: EthAddress,
    config: OnceLock<NullifierProviderConfig>,
    nullifiers: RwLock<HashMap<EthAddress, Nullifier>>,
    subscribers: RwLock<HashSet<EthAddress>>,
    events: EventLog,
}

impl NullifierIdentityProvider {
    /// Deployed but not yet initialized.
    pub fn new(address: EthAddress) -> Self {
        Self {
            address,
            config: OnceLock::new(),
            nullifiers: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashSet::new()),
            events: EventLog::default(),
        }
    }

    pub fn initialized(
        address: EthAddress,
        admin: EthAddress,
        verifier: Arc<dyn ProofVerifier>,
        registry: Arc<dyn RegistrationRootOracle>,
    ) -> RecoveryResult<Self> {
        let provider = Self::new(address);
        provider.initialize(admin, verifier, registry)?;
        Ok(provider)
    }

    pub fn initialize(
        &self,
        admin: EthAddress,
        verifier: Arc<dyn ProofVerifier>,
        registry: Arc<dyn RegistrationRootOracle>,
    ) -> RecoveryResult<()> {
        if admin.is_zero() {
            return Err(RecoveryError::ZeroAddress("provider admin".into()));
        }
        self.config
            .set(NullifierProviderConfig {
                admin,
                verifier,
                registry,
            })
            .map_err(|_| RecoveryError::AlreadyInitialized("NullifierIdentityProvider".into()))?;
        info!(provider = %self.address, admin = %admin, "nullifier identity provider initialized");
        Ok(())
    }

    fn config(&self) -> RecoveryResult<&NullifierProviderConfig> {
        self.config
            .get()
            .ok_or_else(|| RecoveryError::NotInitialized("NullifierIdentityProvider".into()))
    }

    pub fn is_initialized(&self) -> bool {
        self.config.get().is_some()
    }

    pub fn admin(&self) -> RecoveryResult<EthAddress> {
        Ok(self.config()?.admin)
    }

    pub fn verifier(&self) -> RecoveryResult<Arc<dyn ProofVerifier>> {
        Ok(self.config()?.verifier.clone())
    }

    pub fn registry(&self) -> RecoveryResult<Arc<dyn RegistrationRootOracle>> {
        Ok(self.config()?.registry.clone())
    }

    /// Admin-only binding of `account` to the nullifier its recovery proof
    /// must reveal.
    pub fn set_nullifier(
        &self,
        caller: &EthAddress,
        account: &EthAddress,
        nullifier: Nullifier,
    ) -> RecoveryResult<()> {
        let config = self.config()?;
        if *caller != config.admin {
            return Err(RecoveryError::AccessDenied(format!(
                "{} is not the provider admin",
                caller
            )));
        }

        self.nullifiers.write().insert(*account, nullifier);
        self.events.emit(ProviderEvent::NullifierBound {
            account: *account,
            nullifier,
        });
        info!(account = %account, "nullifier bound");
        Ok(())
    }

    pub fn nullifier_of(&self, account: &EthAddress) -> Option<Nullifier> {
        self.nullifiers.read().get(account).copied()
    }

    pub fn is_subscribed(&self, account: &EthAddress) -> bool {
        self.subscribers.read().contains(account)
    }

    pub fn event_id(&self, account: &EthAddress) -> Word {
        field_to_word(&event_id(account))
    }

    pub fn event_data(&self) -> Word {
        field_to_word(&event_data())
    }

    pub fn events(&self) -> Vec<ProviderEvent> {
        self.events.snapshot()
    }

    fn public_inputs(&self, account: &EthAddress, nullifier: &Nullifier, payload: &IdentityPayload) -> Vec<Word> {
        let mut selector = [0u8; WORD_SIZE];
        selector[WORD_SIZE - 8..].copy_from_slice(&IDENTITY_SELECTOR.to_be_bytes());

        vec![
            *nullifier.as_bytes(),
            self.event_id(account),
            self.event_data(),
            *payload.registration_root.as_bytes(),
            selector,
            payload.current_date_word(),
        ]
    }
}

impl RecoveryProvider for NullifierIdentityProvider {
    fn address(&self) -> EthAddress {
        self.address
    }

    fn subscribe(&self, account: &EthAddress, _enroll_data: &[u8]) -> RecoveryResult<()> {
        self.config()?;
        self.subscribers.write().insert(*account);
        self.events.emit(ProviderEvent::AccountSubscribed { account: *account });
        info!(provider = %self.address, account = %account, "account subscribed");
        Ok(())
    }

    fn unsubscribe(&self, account: &EthAddress) -> RecoveryResult<()> {
        self.config()?;
        self.subscribers.write().remove(account);
        self.nullifiers.write().remove(account);
        self.events.emit(ProviderEvent::AccountUnsubscribed { account: *account });
        info!(provider = %self.address, account = %account, "account unsubscribed");
        Ok(())
    }

    fn check_recovery(
        &self,
        account: &EthAddress,
        _subject_data: &[u8],
        proof_payload: &[u8],
    ) -> RecoveryResult<bool> {
        let config = self.config()?;
        let payload = IdentityPayload::decode(proof_payload)?;

        if !config.registry.is_root_valid(&payload.registration_root) {
            warn!(root = %payload.registration_root, "registration root not valid");
            return Err(RecoveryError::InvalidRegistrationRoot(payload.registration_root));
        }

        match decode_subject(&payload.encoded_subject) {
            Ok(subject) if subject == *account => {}
            _ => {
                debug!(account = %account, "identity payload bound to another subject");
                return Ok(false);
            }
        }

        let Some(nullifier) = self.nullifier_of(account) else {
            debug!(account = %account, "no nullifier bound");
            return Ok(false);
        };

        let inputs = self.public_inputs(account, &nullifier, &payload);
        Ok(config.verifier.verify_proof(&payload.proof, &inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RootHistory;
    use chrono::Duration;
    use zkrecover_crypto::ProofPoints;
    use zkrecover_types::RegistrationRoot;

    struct AcceptAll;

    impl ProofVerifier for AcceptAll {
        fn verify_proof(&self, _: &ProofPoints, inputs: &[Word]) -> bool {
            inputs.len() == 6
        }
    }

    const ADMIN: EthAddress = EthAddress([0xad; 20]);
    const ACCOUNT: EthAddress = EthAddress([0x0a; 20]);

    fn provider() -> (NullifierIdentityProvider, Arc<RootHistory>) {
        let roots = Arc::new(RootHistory::new(Duration::seconds(60), 8));
        roots.publish_root(RegistrationRoot::from_bytes([0x11; 32]));
        let provider = NullifierIdentityProvider::initialized(
            EthAddress::from_bytes([0x70; 20]),
            ADMIN,
            Arc::new(AcceptAll),
            roots.clone(),
        )
        .unwrap();
        (provider, roots)
    }

    fn payload(root: u8, subject: &EthAddress) -> Vec<u8> {
        IdentityPayload::new(
            RegistrationRoot::from_bytes([root; 32]),
            0x323431323039,
            subject,
            ProofPoints::default(),
        )
        .encode()
    }

    #[test]
    fn test_initialize_once() {
        let (provider, roots) = provider();
        assert_eq!(provider.admin().unwrap(), ADMIN);
        let err = provider
            .initialize(ADMIN, Arc::new(AcceptAll), roots)
            .unwrap_err();
        assert!(matches!(err, RecoveryError::AlreadyInitialized(_)));
    }

    #[test]
    fn test_uninitialized_rejects_use() {
        let provider = NullifierIdentityProvider::new(EthAddress::from_bytes([0x70; 20]));
        assert!(!provider.is_initialized());
        assert!(matches!(
            provider.subscribe(&ACCOUNT, &[]),
            Err(RecoveryError::NotInitialized(_))
        ));
        assert!(matches!(
            provider.check_recovery(&ACCOUNT, &[], &payload(0x11, &ACCOUNT)),
            Err(RecoveryError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_only_admin_binds_nullifiers() {
        let (provider, _) = provider();
        let nullifier = Nullifier::from_bytes([0x33; 32]);

        let err = provider.set_nullifier(&ACCOUNT, &ACCOUNT, nullifier).unwrap_err();
        assert!(matches!(err, RecoveryError::AccessDenied(_)));
        assert_eq!(provider.nullifier_of(&ACCOUNT), None);

        provider.set_nullifier(&ADMIN, &ACCOUNT, nullifier).unwrap();
        assert_eq!(provider.nullifier_of(&ACCOUNT), Some(nullifier));
        assert_eq!(
            provider.events(),
            vec![ProviderEvent::NullifierBound {
                account: ACCOUNT,
                nullifier
            }]
        );
    }

    #[test]
    fn test_stale_root_is_distinct_error() {
        let (provider, _) = provider();
        provider
            .set_nullifier(&ADMIN, &ACCOUNT, Nullifier::from_bytes([0x33; 32]))
            .unwrap();

        assert!(provider.check_recovery(&ACCOUNT, &[], &payload(0x11, &ACCOUNT)).unwrap());

        let err = provider
            .check_recovery(&ACCOUNT, &[], &payload(0x12, &ACCOUNT))
            .unwrap_err();
        assert!(matches!(err, RecoveryError::InvalidRegistrationRoot(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_foreign_subject_and_missing_nullifier() {
        let (provider, _) = provider();
        assert!(!provider.check_recovery(&ACCOUNT, &[], &payload(0x11, &ACCOUNT)).unwrap());

        provider
            .set_nullifier(&ADMIN, &ACCOUNT, Nullifier::from_bytes([0x33; 32]))
            .unwrap();
        let other = EthAddress::from_bytes([0x0b; 20]);
        assert!(!provider.check_recovery(&ACCOUNT, &[], &payload(0x11, &other)).unwrap());
        assert!(provider.check_recovery(&ACCOUNT, &[0xde, 0xad], &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_unsubscribe_clears_binding() {
        let (provider, _) = provider();
        provider.subscribe(&ACCOUNT, &[]).unwrap();
        provider
            .set_nullifier(&ADMIN, &ACCOUNT, Nullifier::from_bytes([0x33; 32]))
            .unwrap();
        assert!(provider.is_subscribed(&ACCOUNT));

        provider.unsubscribe(&ACCOUNT).unwrap();
        assert!(!provider.is_subscribed(&ACCOUNT));
        assert_eq!(provider.nullifier_of(&ACCOUNT), None);
        assert_eq!(
            provider.events().last(),
            Some(&ProviderEvent::AccountUnsubscribed { account: ACCOUNT })
        );
    }

    #[test]
    fn test_event_getters() {
        let (provider, _) = provider();
        let other = EthAddress::from_bytes([0x0b; 20]);
        assert_ne!(provider.event_id(&ACCOUNT), provider.event_id(&other));
        assert_eq!(provider.event_data(), field_to_word(&event_data()));
    }
}
