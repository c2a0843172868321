//! Deterministic account deployment.
//!
//! Addresses follow CREATE2: `keccak256(0xff ++ factory ++ salt ++ init_code_hash)[12..]`
//! with `salt = keccak256(abi.encode(owner, userSalt))`, so an owner can learn
//! the account address before it exists.

use crate::abi::{from_h160, to_h160};
use crate::account::Account;
use crate::directory::ProviderDirectory;
use ethers::abi::{self, Token};
use ethers::types::U256;
use ethers::utils::{get_create2_address_from_hash, keccak256};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use zkrecover_types::{EthAddress, RecoveryError, RecoveryResult, Word};

/// Stands in for the hash of the account's creation code.
const ACCOUNT_INIT_CODE_TAG: &[u8] = b"zkrecover.RecoverableAccount.v1";

pub struct AccountFactory {
    address: EthAddress,
    init_code_hash: Word,
    directory: Arc<ProviderDirectory>,
    deployed: Mutex<HashSet<EthAddress>>,
}

impl AccountFactory {
    pub fn new(address: EthAddress, directory: Arc<ProviderDirectory>) -> Self {
        Self {
            address,
            init_code_hash: keccak256(ACCOUNT_INIT_CODE_TAG),
            directory,
            deployed: Mutex::new(HashSet::new()),
        }
    }

    pub fn address(&self) -> EthAddress {
        self.address
    }

    pub fn directory(&self) -> Arc<ProviderDirectory> {
        self.directory.clone()
    }

    pub fn predict_address(&self, owner: &EthAddress, salt: u64) -> EthAddress {
        let salt = keccak256(abi::encode(&[
            Token::Address(to_h160(owner)),
            Token::Uint(U256::from(salt)),
        ]));
        from_h160(get_create2_address_from_hash(
            to_h160(&self.address),
            salt,
            self.init_code_hash,
        ))
    }

    pub fn is_deployed(&self, account: &EthAddress) -> bool {
        self.deployed.lock().contains(account)
    }

    pub fn create_account(&self, owner: &EthAddress, salt: u64) -> RecoveryResult<Account> {
        if owner.is_zero() {
            return Err(RecoveryError::ZeroAddress("account owner".into()));
        }

        let address = self.predict_address(owner, salt);
        let mut deployed = self.deployed.lock();
        if deployed.contains(&address) {
            return Err(RecoveryError::AlreadyDeployed(address));
        }

        let account = Account::new(address, *owner, self.directory.clone())?;
        deployed.insert(address);
        info!(account = %address, owner = %owner, salt, "account deployed");
        Ok(account)
    }
}
