//! Smart-account ownership recovery through pluggable zero-knowledge
//! recovery providers.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod abi;
pub mod account;
pub mod calls;
pub mod commitment_provider;
pub mod config;
pub mod directory;
pub mod factory;
pub mod nullifier_provider;
pub mod provider;
pub mod registry;
pub mod storage;

pub use abi::{
    decode_subject, encode_date, encode_subject, proof_fingerprint, CommitmentEnrollment,
    IdentityPayload, ZERO_DATE,
};
pub use account::Account;
pub use calls::AccountCall;
pub use commitment_provider::CommitmentSecretProvider;
pub use config::{KeysConfig, RecoveryConfig, RegistryConfig, StorageConfig};
pub use directory::ProviderDirectory;
pub use factory::AccountFactory;
pub use nullifier_provider::NullifierIdentityProvider;
pub use provider::{EventLog, RecoveryProvider};
pub use registry::{IdentityRegistry, RegistrationRootOracle, RootHistory};
pub use storage::{AccountSnapshot, AccountStore, MemoryAccountStore, SledAccountStore};

#[cfg(test)]
mod tests;
