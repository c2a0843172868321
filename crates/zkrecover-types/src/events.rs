use crate::address::EthAddress;
use crate::digest::Nullifier;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    RecoveryProviderAdded {
        provider: EthAddress,
    },
    RecoveryProviderRemoved {
        provider: EthAddress,
    },
    OwnershipRecovered {
        old_owner: EthAddress,
        new_owner: EthAddress,
    },
    AccessRecovered {
        subject_data: Vec<u8>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    AccountSubscribed { account: EthAddress },
    AccountUnsubscribed { account: EthAddress },
    NullifierBound { account: EthAddress, nullifier: Nullifier },
}

impl ProviderEvent {
    pub fn account(&self) -> &EthAddress {
        match self {
            ProviderEvent::AccountSubscribed { account }
            | ProviderEvent::AccountUnsubscribed { account }
            | ProviderEvent::NullifierBound { account, .. } => account,
        }
    }
}
