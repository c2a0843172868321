//! End-to-end recovery flows with real Groth16 proofs.

use crate::abi::{encode_proof_points, encode_subject, proof_fingerprint, CommitmentEnrollment, IdentityPayload};
use crate::account::Account;
use crate::calls::AccountCall;
use crate::commitment_provider::CommitmentSecretProvider;
use crate::directory::ProviderDirectory;
use crate::factory::AccountFactory;
use crate::nullifier_provider::NullifierIdentityProvider;
use crate::provider::RecoveryProvider;
use crate::registry::{IdentityRegistry, RootHistory};
use crate::storage::{AccountStore, SledAccountStore};
use ark_bn254::Bn254;
use ark_groth16::{ProvingKey, VerifyingKey};
use chrono::Duration;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::{Arc, OnceLock};
use zkrecover_crypto::circuits::{
    prove_identity_query, prove_knowledge, prove_recovery, IdentityQueryWitness, IdentitySecret,
    RecoverySecret,
};
use zkrecover_crypto::{CircuitKind, Groth16Verifier};
use zkrecover_types::{AccountEvent, EthAddress, RecoveryError, RegistrationRoot};

const DEPTH: usize = 4;
const DATE: u64 = 0x323431323039; // "241209"

const ADMIN: EthAddress = EthAddress([0xad; 20]);
const OWNER: EthAddress = EthAddress([0x01; 20]);
const U2: EthAddress = EthAddress([0x02; 20]);
const U3: EthAddress = EthAddress([0x03; 20]);
const RELAYER: EthAddress = EthAddress([0x5e; 20]);

const FACTORY: EthAddress = EthAddress([0xfa; 20]);
const IDENTITY_PROVIDER: EthAddress = EthAddress([0x70; 20]);
const COMMITMENT_PROVIDER: EthAddress = EthAddress([0x71; 20]);

type Keys = (ProvingKey<Bn254>, VerifyingKey<Bn254>);

fn keys(kind: CircuitKind) -> &'static Keys {
    static IDENTITY: OnceLock<Keys> = OnceLock::new();
    static KNOWLEDGE: OnceLock<Keys> = OnceLock::new();
    static RECOVERY: OnceLock<Keys> = OnceLock::new();

    let cell = match kind {
        CircuitKind::IdentityQuery => &IDENTITY,
        CircuitKind::CommitmentKnowledge => &KNOWLEDGE,
        CircuitKind::CommitmentRecovery => &RECOVERY,
    };
    cell.get_or_init(|| kind.setup(DEPTH).unwrap())
}

fn verifier(kind: CircuitKind) -> Arc<Groth16Verifier> {
    Arc::new(Groth16Verifier::new(&keys(kind).1))
}

fn identity(seed: u8) -> IdentitySecret {
    IdentitySecret::from_parts([seed; 32], [seed.wrapping_add(0x40); 32])
}

/// Factory-deployed account with both providers deployed but not enrolled.
struct World {
    directory: Arc<ProviderDirectory>,
    registry: Arc<IdentityRegistry>,
    identity_provider: Arc<NullifierIdentityProvider>,
    account: Account,
}

impl World {
    fn new() -> Self {
        let directory = Arc::new(ProviderDirectory::new());
        let roots = Arc::new(RootHistory::new(Duration::seconds(3600), 16));
        let registry = Arc::new(IdentityRegistry::new(DEPTH, roots));

        let identity_provider = Arc::new(
            NullifierIdentityProvider::initialized(
                IDENTITY_PROVIDER,
                ADMIN,
                verifier(CircuitKind::IdentityQuery),
                registry.clone(),
            )
            .unwrap(),
        );
        directory.deploy(identity_provider.clone()).unwrap();

        let commitment_provider = CommitmentSecretProvider::initialized(
            COMMITMENT_PROVIDER,
            ADMIN,
            verifier(CircuitKind::CommitmentKnowledge),
            verifier(CircuitKind::CommitmentRecovery),
        )
        .unwrap();
        directory.deploy(Arc::new(commitment_provider)).unwrap();

        let factory = AccountFactory::new(FACTORY, directory.clone());
        let account = factory.create_account(&OWNER, 0).unwrap();

        Self {
            directory,
            registry,
            identity_provider,
            account,
        }
    }

    fn address(&self) -> EthAddress {
        self.account.address()
    }

    /// Registers `seed`'s identity, enrolls the identity provider and binds
    /// the nullifier of `bound_seed` to the account.
    fn enroll_identity(&mut self, seed: u8, bound_seed: u8) {
        self.registry.register(identity(seed).leaf()).unwrap();
        self.account
            .add_recovery_provider(&OWNER, &IDENTITY_PROVIDER, &[])
            .unwrap();
        let nullifier = identity(bound_seed).nullifier_for(&self.address());
        self.identity_provider
            .set_nullifier(&ADMIN, &self.address(), nullifier)
            .unwrap();
    }

    fn identity_witness(&self, seed: u8) -> (IdentityQueryWitness, RegistrationRoot) {
        let secret = identity(seed);
        let index = self.registry.index_of(secret.leaf()).unwrap();
        let path = self.registry.proof(index).unwrap();
        let root = self.registry.root();
        let witness = IdentityQueryWitness::new(secret, path, &root, &self.address(), DATE);
        (witness, root)
    }

    fn identity_payload(&self, seed: u8) -> Vec<u8> {
        let (witness, root) = self.identity_witness(seed);
        let proof = prove_identity_query(&keys(CircuitKind::IdentityQuery).0, DEPTH, &witness).unwrap();
        IdentityPayload::new(root, DATE, &self.address(), proof).encode()
    }

    fn enroll_commitment(&mut self, secret: &RecoverySecret) {
        let enrollment = CommitmentEnrollment {
            commitment: secret.commitment(),
            proof: prove_knowledge(&keys(CircuitKind::CommitmentKnowledge).0, secret).unwrap(),
        };
        self.account
            .add_recovery_provider(&OWNER, &COMMITMENT_PROVIDER, &enrollment.encode())
            .unwrap();
    }

    fn ownership_events(&self) -> usize {
        self.account
            .events()
            .iter()
            .filter(|e| matches!(e, AccountEvent::OwnershipRecovered { .. }))
            .count()
    }
}

fn commitment_payload(secret: &RecoverySecret, new_owner: &EthAddress) -> Vec<u8> {
    let proof = prove_recovery(&keys(CircuitKind::CommitmentRecovery).0, secret, new_owner).unwrap();
    encode_proof_points(&proof)
}

// ============================================================================
// Identity nullifier flow
// ============================================================================

#[test]
fn test_identity_recovery_succeeds() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let payload = world.identity_payload(0x11);

    let new_owner = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap();

    assert_eq!(new_owner, U2);
    assert_eq!(world.account.owner(), U2);
    assert_eq!(world.ownership_events(), 1);
    assert!(world
        .account
        .is_proof_used(&proof_fingerprint(&IDENTITY_PROVIDER, &payload)));
}

#[test]
fn test_identity_recovery_wrong_nullifier() {
    let mut world = World::new();
    // Account is bound to a different identity's nullifier.
    world.enroll_identity(0x11, 0x12);
    let payload = world.identity_payload(0x11);

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::InvalidRecoveryProof);
    assert_eq!(world.account.owner(), OWNER);
    assert_eq!(world.ownership_events(), 0);
}

#[test]
fn test_identity_recovery_tampered_root() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let (witness, root) = world.identity_witness(0x11);
    let proof = prove_identity_query(&keys(CircuitKind::IdentityQuery).0, DEPTH, &witness).unwrap();

    let mut bumped = *root.as_bytes();
    bumped[31] = bumped[31].wrapping_add(1);
    let bumped = RegistrationRoot::from_bytes(bumped);
    let payload = IdentityPayload::new(bumped, DATE, &world.address(), proof).encode();

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::InvalidRegistrationRoot(bumped));
    assert!(err.is_retryable());
    assert_eq!(world.account.owner(), OWNER);
}

#[test]
fn test_identity_recovery_tampered_selector() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let (witness, root) = world.identity_witness(0x11);
    let witness = witness.with_selector(0x1002);
    let proof = prove_identity_query(&keys(CircuitKind::IdentityQuery).0, DEPTH, &witness).unwrap();
    let payload = IdentityPayload::new(root, DATE, &world.address(), proof).encode();

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::InvalidRecoveryProof);
}

#[test]
fn test_identity_recovery_tampered_date() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let (witness, root) = world.identity_witness(0x11);
    let proof = prove_identity_query(&keys(CircuitKind::IdentityQuery).0, DEPTH, &witness).unwrap();
    let payload = IdentityPayload::new(root, DATE + 1, &world.address(), proof).encode();

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::InvalidRecoveryProof);
    assert_eq!(world.account.owner(), OWNER);
}

#[test]
fn test_identity_replay_with_padded_payload() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let payload = world.identity_payload(0x11);
    world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap();

    let mut padded = payload.clone();
    padded.extend_from_slice(&[0u8; 32]);
    let attacker = EthAddress::from_bytes([0xee; 20]);
    let err = world
        .account
        .recover_ownership(&encode_subject(&attacker), &IDENTITY_PROVIDER, &padded)
        .unwrap_err();
    assert!(matches!(err, RecoveryError::Encoding(_)));
    assert_eq!(world.account.owner(), U2);
    assert_eq!(world.ownership_events(), 1);
}

#[test]
fn test_identity_proof_survives_registry_update() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let payload = world.identity_payload(0x11);

    // A newer registration supersedes the root the proof was made against.
    world.registry.register(identity(0x22).leaf()).unwrap();

    world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap();
    assert_eq!(world.account.owner(), U2);
}

#[test]
fn test_identity_proof_bound_to_other_account() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);

    let other = AccountFactory::new(FACTORY, world.directory.clone())
        .create_account(&OWNER, 1)
        .unwrap();
    let (witness, root) = world.identity_witness(0x11);
    let proof = prove_identity_query(&keys(CircuitKind::IdentityQuery).0, DEPTH, &witness).unwrap();
    let payload = IdentityPayload::new(root, DATE, &other.address(), proof).encode();

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::InvalidRecoveryProof);
}

#[test]
fn test_unenroll_clears_identity_binding() {
    let mut world = World::new();
    world.enroll_identity(0x11, 0x11);
    let payload = world.identity_payload(0x11);

    world
        .account
        .remove_recovery_provider(&OWNER, &IDENTITY_PROVIDER, &[])
        .unwrap();
    assert!(world.identity_provider.nullifier_of(&world.address()).is_none());

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &IDENTITY_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::ProviderNotRegistered(IDENTITY_PROVIDER));
}

// ============================================================================
// Commitment secret flow
// ============================================================================

#[test]
fn test_commitment_recovery_and_replay() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    world.enroll_commitment(&secret);

    let payload = commitment_payload(&secret, &U2);
    world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &payload)
        .unwrap();
    assert_eq!(world.account.owner(), U2);

    let err = world
        .account
        .recover_ownership(&encode_subject(&U3), &COMMITMENT_PROVIDER, &payload)
        .unwrap_err();
    assert!(matches!(err, RecoveryError::ProofAlreadyUsed(_)));
    assert_eq!(world.account.owner(), U2);
    assert_eq!(world.ownership_events(), 1);
}

#[test]
fn test_commitment_replay_with_trailing_byte() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    world.enroll_commitment(&secret);

    let payload = commitment_payload(&secret, &U2);
    world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &payload)
        .unwrap();
    world.account.take_events();

    let mut extended = payload.clone();
    extended.push(0xff);
    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &extended)
        .unwrap_err();
    assert!(matches!(err, RecoveryError::Encoding(_)));
    assert_eq!(world.ownership_events(), 0);
}

#[test]
fn test_commitment_recovery_requires_every_condition() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    world.enroll_commitment(&secret);

    // Wrong secret.
    let wrong = commitment_payload(&RecoverySecret::from_bytes([0x34; 32]), &U2);
    assert_eq!(
        world
            .account
            .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &wrong),
        Err(RecoveryError::InvalidRecoveryProof)
    );

    // Proof made for U2, submitted for U3.
    let payload = commitment_payload(&secret, &U2);
    assert_eq!(
        world
            .account
            .recover_ownership(&encode_subject(&U3), &COMMITMENT_PROVIDER, &payload),
        Err(RecoveryError::InvalidRecoveryProof)
    );

    // Garbage proof bytes.
    let mut forged = payload.clone();
    forged[0] ^= 0x01;
    assert!(world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &forged)
        .is_err());

    // Failed attempts were not consumed.
    assert_eq!(world.account.owner(), OWNER);
    world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &payload)
        .unwrap();
    assert_eq!(world.account.owner(), U2);
}

#[test]
fn test_commitment_enrollment_requires_opening() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    let other = RecoverySecret::from_bytes([0x35; 32]);

    let enrollment = CommitmentEnrollment {
        commitment: secret.commitment(),
        proof: prove_knowledge(&keys(CircuitKind::CommitmentKnowledge).0, &other).unwrap(),
    };
    let err = world
        .account
        .add_recovery_provider(&OWNER, &COMMITMENT_PROVIDER, &enrollment.encode())
        .unwrap_err();
    assert_eq!(err, RecoveryError::InvalidRecoveryProof);
    assert!(!world.account.recovery_provider_exists(&COMMITMENT_PROVIDER));
}

#[test]
fn test_recovery_through_unenrolled_provider() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    // The provider exists in the directory but this account never enrolled.
    let payload = commitment_payload(&secret, &U2);

    let err = world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &payload)
        .unwrap_err();
    assert_eq!(err, RecoveryError::ProviderNotRegistered(COMMITMENT_PROVIDER));
    assert_eq!(world.account.owner(), OWNER);
}

#[test]
fn test_recovery_to_zero_owner() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    world.enroll_commitment(&secret);

    let payload = commitment_payload(&secret, &EthAddress::zero());
    let err = world
        .account
        .recover_ownership(&encode_subject(&EthAddress::zero()), &COMMITMENT_PROVIDER, &payload)
        .unwrap_err();
    assert!(matches!(err, RecoveryError::ZeroAddress(_)));
    assert_eq!(world.account.owner(), OWNER);
    assert!(!world
        .account
        .is_proof_used(&proof_fingerprint(&COMMITMENT_PROVIDER, &payload)));
}

#[test]
fn test_relayed_recovery_calldata() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    world.enroll_commitment(&secret);

    let call = AccountCall::RecoverOwnership {
        subject_data: encode_subject(&U2),
        provider: COMMITMENT_PROVIDER,
        proof_payload: commitment_payload(&secret, &U2),
    };
    world.account.execute(&RELAYER, &call.encode()).unwrap();
    assert_eq!(world.account.owner(), U2);

    // Enrollment changes still need the (new) owner.
    let add = AccountCall::AddRecoveryProvider {
        provider: IDENTITY_PROVIDER,
        enroll_data: vec![],
    };
    assert!(matches!(
        world.account.execute(&RELAYER, &add.encode()),
        Err(RecoveryError::AccessDenied(_))
    ));
    world.account.execute(&U2, &add.encode()).unwrap();
    assert!(world.account.recovery_provider_exists(&IDENTITY_PROVIDER));
}

#[test]
fn test_used_proofs_survive_restart() {
    let mut world = World::new();
    let secret = RecoverySecret::from_bytes([0x33; 32]);
    world.enroll_commitment(&secret);

    let payload = commitment_payload(&secret, &U2);
    world
        .account
        .recover_ownership(&encode_subject(&U2), &COMMITMENT_PROVIDER, &payload)
        .unwrap();

    let store = SledAccountStore::temporary().unwrap();
    store.save(&world.account.snapshot()).unwrap();

    let snapshot = store.load(&world.address()).unwrap().unwrap();
    let mut restored = Account::restore(snapshot, world.directory.clone()).unwrap();
    assert_eq!(restored.owner(), U2);
    assert!(restored.recovery_provider_exists(&COMMITMENT_PROVIDER));

    let err = restored
        .recover_ownership(&encode_subject(&U3), &COMMITMENT_PROVIDER, &payload)
        .unwrap_err();
    assert!(matches!(err, RecoveryError::ProofAlreadyUsed(_)));
}

// ============================================================================
// Properties over arbitrary payloads
// ============================================================================

/// Accepts any payload whose first byte is 0x01.
struct FlagProvider {
    address: EthAddress,
    subscriptions: Mutex<usize>,
}

impl RecoveryProvider for FlagProvider {
    fn address(&self) -> EthAddress {
        self.address
    }

    fn subscribe(&self, _: &EthAddress, _: &[u8]) -> zkrecover_types::RecoveryResult<()> {
        *self.subscriptions.lock() += 1;
        Ok(())
    }

    fn unsubscribe(&self, _: &EthAddress) -> zkrecover_types::RecoveryResult<()> {
        Ok(())
    }

    fn check_recovery(
        &self,
        _: &EthAddress,
        _: &[u8],
        proof_payload: &[u8],
    ) -> zkrecover_types::RecoveryResult<bool> {
        Ok(proof_payload.first() == Some(&0x01))
    }
}

const FLAG_PROVIDER: EthAddress = EthAddress([0x7f; 20]);

fn flag_account() -> (Account, Arc<FlagProvider>) {
    let provider = Arc::new(FlagProvider {
        address: FLAG_PROVIDER,
        subscriptions: Mutex::new(0),
    });
    let directory = Arc::new(ProviderDirectory::new());
    directory.deploy(provider.clone()).unwrap();
    let account = Account::new(EthAddress::from_bytes([0xac; 20]), OWNER, directory).unwrap();
    (account, provider)
}

fn nonzero_address() -> impl Strategy<Value = EthAddress> {
    any::<[u8; 20]>()
        .prop_filter("non-zero address", |b| b.iter().any(|x| *x != 0))
        .prop_map(EthAddress::from_bytes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_double_enroll_rejected(
        first in proptest::collection::vec(any::<u8>(), 0..128),
        second in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let (mut account, provider) = flag_account();
        account.add_recovery_provider(&OWNER, &FLAG_PROVIDER, &first).unwrap();

        let err = account.add_recovery_provider(&OWNER, &FLAG_PROVIDER, &second).unwrap_err();
        prop_assert_eq!(err, RecoveryError::ProviderAlreadyAdded(FLAG_PROVIDER));
        prop_assert_eq!(*provider.subscriptions.lock(), 1);
    }

    #[test]
    fn prop_unenroll_absent_rejected(
        provider in any::<[u8; 20]>().prop_map(EthAddress::from_bytes),
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let (mut account, _) = flag_account();
        let err = account.remove_recovery_provider(&OWNER, &provider, &data).unwrap_err();
        prop_assert_eq!(err, RecoveryError::ProviderNotRegistered(provider));
    }

    #[test]
    fn prop_replay_rejected_for_any_subject(
        tail in proptest::collection::vec(any::<u8>(), 0..256),
        first_owner in nonzero_address(),
        second_owner in nonzero_address(),
    ) {
        let (mut account, _) = flag_account();
        account.add_recovery_provider(&OWNER, &FLAG_PROVIDER, &[]).unwrap();

        let mut payload = vec![0x01];
        payload.extend_from_slice(&tail);

        account
            .recover_ownership(&encode_subject(&first_owner), &FLAG_PROVIDER, &payload)
            .unwrap();
        let err = account
            .recover_ownership(&encode_subject(&second_owner), &FLAG_PROVIDER, &payload)
            .unwrap_err();

        prop_assert_eq!(
            err,
            RecoveryError::ProofAlreadyUsed(proof_fingerprint(&FLAG_PROVIDER, &payload))
        );
        prop_assert_eq!(account.owner(), first_owner);
    }

    #[test]
    fn prop_rejected_attempts_leave_state_untouched(
        payload in proptest::collection::vec(any::<u8>(), 0..256),
        new_owner in nonzero_address(),
    ) {
        prop_assume!(payload.first() != Some(&0x01));
        let (mut account, _) = flag_account();
        account.add_recovery_provider(&OWNER, &FLAG_PROVIDER, &[]).unwrap();
        let before = account.snapshot();

        let err = account
            .recover_ownership(&encode_subject(&new_owner), &FLAG_PROVIDER, &payload)
            .unwrap_err();
        prop_assert_eq!(err, RecoveryError::InvalidRecoveryProof);
        prop_assert_eq!(account.snapshot(), before);
    }
}
