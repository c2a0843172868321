use crate::address::EthAddress;
use crate::digest::{ProofFingerprint, RegistrationRoot};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Zero address: {0}")]
    ZeroAddress(String),

    #[error("Recovery provider already added: {0}")]
    ProviderAlreadyAdded(EthAddress),

    #[error("Recovery provider not registered: {0}")]
    ProviderNotRegistered(EthAddress),

    #[error("No recovery provider deployed at {0}")]
    UnknownProvider(EthAddress),

    #[error("Invalid recovery proof")]
    InvalidRecoveryProof,

    #[error("Invalid registration root: {0}")]
    InvalidRegistrationRoot(RegistrationRoot),

    #[error("Recovery proof already used: {0}")]
    ProofAlreadyUsed(ProofFingerprint),

    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Already deployed at {0}")]
    AlreadyDeployed(EthAddress),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by relays to decide how to surface a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Access,
    Configuration,
    Proof,
    Replay,
    Lifecycle,
    Encoding,
    Internal,
}

impl RecoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecoveryError::AccessDenied(_) => ErrorKind::Access,
            RecoveryError::ZeroAddress(_)
            | RecoveryError::ProviderAlreadyAdded(_)
            | RecoveryError::ProviderNotRegistered(_)
            | RecoveryError::UnknownProvider(_) => ErrorKind::Configuration,
            RecoveryError::InvalidRecoveryProof | RecoveryError::InvalidRegistrationRoot(_) => {
                ErrorKind::Proof
            }
            RecoveryError::ProofAlreadyUsed(_) => ErrorKind::Replay,
            RecoveryError::AlreadyInitialized(_)
            | RecoveryError::NotInitialized(_)
            | RecoveryError::AlreadyDeployed(_) => ErrorKind::Lifecycle,
            RecoveryError::Encoding(_) => ErrorKind::Encoding,
            RecoveryError::Crypto(_)
            | RecoveryError::Storage(_)
            | RecoveryError::Serialization(_)
            | RecoveryError::Config(_) => ErrorKind::Internal,
        }
    }

    /// A stale registration root is the only failure worth resubmitting,
    /// and only with a fresh root.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecoveryError::InvalidRegistrationRoot(_))
    }
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;
