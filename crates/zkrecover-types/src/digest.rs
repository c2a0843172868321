use crate::constants::WORD_SIZE;
use crate::error::{RecoveryError, RecoveryResult};
use crate::Word;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! word_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Word);

        impl $name {
            pub fn from_bytes(bytes: Word) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &Word {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            pub fn from_hex(s: &str) -> RecoveryResult<Self> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| RecoveryError::Encoding(e.to_string()))?;
                if bytes.len() != WORD_SIZE {
                    return Err(RecoveryError::Encoding(
                        concat!("Invalid ", stringify!($name), " length").into(),
                    ));
                }
                let mut arr = [0u8; WORD_SIZE];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            pub fn zero() -> Self {
                Self([0u8; WORD_SIZE])
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; WORD_SIZE]
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::zero()
            }
        }

        impl From<Word> for $name {
            fn from(bytes: Word) -> Self {
                Self(bytes)
            }
        }
    };
}

word_newtype!(
    /// Root of the identity registry tree at some point in time.
    RegistrationRoot
);

word_newtype!(
    /// Per-identity, per-event value revealed by an identity query proof.
    Nullifier
);

word_newtype!(
    /// Hash binding an account owner to a recovery secret.
    Commitment
);

word_newtype!(
    /// Digest of (provider, proof payload) kept for replay detection.
    ProofFingerprint
);
