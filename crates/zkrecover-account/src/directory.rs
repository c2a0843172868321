use crate::provider::RecoveryProvider;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use zkrecover_types::{EthAddress, RecoveryError, RecoveryResult};

/// Deployed recovery providers, addressable the way accounts name them.
#[derive(Default)]
pub struct ProviderDirectory {
    providers: RwLock<HashMap<EthAddress, Arc<dyn RecoveryProvider>>>,
}

impl ProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy(&self, provider: Arc<dyn RecoveryProvider>) -> RecoveryResult<EthAddress> {
        let address = provider.address();
        if address.is_zero() {
            return Err(RecoveryError::ZeroAddress("provider".into()));
        }

        let mut providers = self.providers.write();
        if providers.contains_key(&address) {
            return Err(RecoveryError::AlreadyDeployed(address));
        }
        providers.insert(address, provider);
        info!(provider = %address, "recovery provider deployed");
        Ok(address)
    }

    pub fn get(&self, address: &EthAddress) -> Option<Arc<dyn RecoveryProvider>> {
        self.providers.read().get(address).cloned()
    }

    pub fn contains(&self, address: &EthAddress) -> bool {
        self.providers.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}
