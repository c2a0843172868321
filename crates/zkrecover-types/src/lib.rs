#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod address;
pub mod digest;
pub mod error;
pub mod events;

pub use address::EthAddress;
pub use digest::{Commitment, Nullifier, ProofFingerprint, RegistrationRoot};
pub use error::{ErrorKind, RecoveryError, RecoveryResult};
pub use events::{AccountEvent, ProviderEvent};

pub mod constants {
    pub const ETH_ADDRESS_SIZE: usize = 20;

    pub const WORD_SIZE: usize = 32;

    /// Field elements carried by a Groth16 proof: a (2), b (2x2), c (2).
    pub const PROOF_POINT_WORDS: usize = 8;
}

pub use constants::*;

/// 256-bit big-endian word, the unit of every ABI and circuit value.
pub type Word = [u8; WORD_SIZE];
