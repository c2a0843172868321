use parking_lot::Mutex;
use zkrecover_types::{EthAddress, ProviderEvent, RecoveryError, RecoveryResult};

/// Pluggable recovery capability invoked by an account.
///
/// Payloads are opaque bytes; every variant owns its enrollment and proof
/// encodings. `account` is always the address of the invoking account.
pub trait RecoveryProvider: Send + Sync {
    fn address(&self) -> EthAddress;

    fn subscribe(&self, account: &EthAddress, enroll_data: &[u8]) -> RecoveryResult<()>;

    fn unsubscribe(&self, account: &EthAddress) -> RecoveryResult<()>;

    /// Pure validation. `Ok(false)` for a proof that does not check out;
    /// `Err` only for malformed payloads or environmental failures such as a
    /// stale registration root.
    fn check_recovery(
        &self,
        account: &EthAddress,
        subject_data: &[u8],
        proof_payload: &[u8],
    ) -> RecoveryResult<bool>;

    fn recover(
        &self,
        account: &EthAddress,
        subject_data: &[u8],
        proof_payload: &[u8],
    ) -> RecoveryResult<()> {
        if self.check_recovery(account, subject_data, proof_payload)? {
            Ok(())
        } else {
            Err(RecoveryError::InvalidRecoveryProof)
        }
    }
}

/// Append-only record of emitted provider events.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<ProviderEvent>>,
}

impl EventLog {
    pub fn emit(&self, event: ProviderEvent) {
        self.events.lock().push(event);
    }

    pub fn snapshot(&self) -> Vec<ProviderEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<ProviderEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}
