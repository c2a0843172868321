use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use zkrecover_types::{EthAddress, ProofFingerprint, RecoveryError, RecoveryResult};

/// Persistent state of one account. The used-proof set is stored in full.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub address: EthAddress,
    pub owner: EthAddress,
    pub providers: Vec<EthAddress>,
    pub used_proofs: Vec<ProofFingerprint>,
}

pub trait AccountStore: Send + Sync {
    fn save(&self, snapshot: &AccountSnapshot) -> RecoveryResult<()>;

    fn load(&self, address: &EthAddress) -> RecoveryResult<Option<AccountSnapshot>>;

    fn delete(&self, address: &EthAddress) -> RecoveryResult<()>;

    fn list(&self) -> RecoveryResult<Vec<EthAddress>>;

    fn exists(&self, address: &EthAddress) -> RecoveryResult<bool> {
        Ok(self.load(address)?.is_some())
    }
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<EthAddress, AccountSnapshot>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn save(&self, snapshot: &AccountSnapshot) -> RecoveryResult<()> {
        self.accounts
            .write()
            .insert(snapshot.address, snapshot.clone());
        Ok(())
    }

    fn load(&self, address: &EthAddress) -> RecoveryResult<Option<AccountSnapshot>> {
        Ok(self.accounts.read().get(address).cloned())
    }

    fn delete(&self, address: &EthAddress) -> RecoveryResult<()> {
        self.accounts.write().remove(address);
        Ok(())
    }

    fn list(&self) -> RecoveryResult<Vec<EthAddress>> {
        let mut addresses: Vec<_> = self.accounts.read().keys().copied().collect();
        addresses.sort();
        Ok(addresses)
    }
}

/// sled-backed store; values are JSON snapshots keyed by account address.
pub struct SledAccountStore {
    db: sled::Db,
}

impl SledAccountStore {
    pub fn open(path: impl AsRef<Path>) -> RecoveryResult<Self> {
        let db = sled::open(path.as_ref())
            .map_err(|e| RecoveryError::Storage(format!("Failed to open account store: {}", e)))?;
        Ok(Self { db })
    }

    /// Store removed when dropped.
    pub fn temporary() -> RecoveryResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| RecoveryError::Storage(format!("Failed to open account store: {}", e)))?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> RecoveryResult<()> {
        self.db
            .flush()
            .map_err(|e| RecoveryError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl AccountStore for SledAccountStore {
    fn save(&self, snapshot: &AccountSnapshot) -> RecoveryResult<()> {
        let value =
            serde_json::to_vec(snapshot).map_err(|e| RecoveryError::Serialization(e.to_string()))?;
        self.db
            .insert(snapshot.address.as_bytes(), value)
            .map_err(|e| RecoveryError::Storage(e.to_string()))?;
        debug!(account = %snapshot.address, "account snapshot saved");
        Ok(())
    }

    fn load(&self, address: &EthAddress) -> RecoveryResult<Option<AccountSnapshot>> {
        let Some(value) = self
            .db
            .get(address.as_bytes())
            .map_err(|e| RecoveryError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&value)
            .map(Some)
            .map_err(|e| RecoveryError::Serialization(format!("Corrupt account snapshot: {}", e)))
    }

    fn delete(&self, address: &EthAddress) -> RecoveryResult<()> {
        self.db
            .remove(address.as_bytes())
            .map_err(|e| RecoveryError::Storage(e.to_string()))?;
        Ok(())
    }

    fn list(&self) -> RecoveryResult<Vec<EthAddress>> {
        let mut addresses = Vec::new();
        for key in self.db.iter().keys() {
            let key = key.map_err(|e| RecoveryError::Storage(e.to_string()))?;
            let bytes: [u8; 20] = key[..]
                .try_into()
                .map_err(|_| RecoveryError::Storage("Malformed account key".into()))?;
            addresses.push(EthAddress::from_bytes(bytes));
        }
        Ok(addresses)
    }
}
