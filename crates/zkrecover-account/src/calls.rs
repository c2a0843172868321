//! Calldata for the account's recovery surface, as a relay forwards it.

use crate::abi::{from_h160, to_h160};
use ethers::abi::{self, short_signature, ParamType, Token};
use zkrecover_types::{EthAddress, RecoveryError, RecoveryResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountCall {
    AddRecoveryProvider {
        provider: EthAddress,
        enroll_data: Vec<u8>,
    },
    RemoveRecoveryProvider {
        provider: EthAddress,
        disenroll_data: Vec<u8>,
    },
    RecoverOwnership {
        subject_data: Vec<u8>,
        provider: EthAddress,
        proof_payload: Vec<u8>,
    },
}

const ADD_RECOVERY_PROVIDER: &str = "addRecoveryProvider";
const REMOVE_RECOVERY_PROVIDER: &str = "removeRecoveryProvider";
const RECOVER_OWNERSHIP: &str = "recoverOwnership";

fn provider_params() -> [ParamType; 2] {
    [ParamType::Address, ParamType::Bytes]
}

fn recover_params() -> [ParamType; 3] {
    [ParamType::Bytes, ParamType::Address, ParamType::Bytes]
}

impl AccountCall {
    pub fn selector(&self) -> [u8; 4] {
        match self {
            AccountCall::AddRecoveryProvider { .. } => {
                short_signature(ADD_RECOVERY_PROVIDER, &provider_params())
            }
            AccountCall::RemoveRecoveryProvider { .. } => {
                short_signature(REMOVE_RECOVERY_PROVIDER, &provider_params())
            }
            AccountCall::RecoverOwnership { .. } => short_signature(RECOVER_OWNERSHIP, &recover_params()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let args = match self {
            AccountCall::AddRecoveryProvider {
                provider,
                enroll_data: data,
            }
            | AccountCall::RemoveRecoveryProvider {
                provider,
                disenroll_data: data,
            } => abi::encode(&[Token::Address(to_h160(provider)), Token::Bytes(data.clone())]),
            AccountCall::RecoverOwnership {
                subject_data,
                provider,
                proof_payload,
            } => abi::encode(&[
                Token::Bytes(subject_data.clone()),
                Token::Address(to_h160(provider)),
                Token::Bytes(proof_payload.clone()),
            ]),
        };

        let mut calldata = self.selector().to_vec();
        calldata.extend_from_slice(&args);
        calldata
    }

    pub fn decode(calldata: &[u8]) -> RecoveryResult<Self> {
        if calldata.len() < 4 {
            return Err(RecoveryError::Encoding("Calldata shorter than a selector".into()));
        }
        let (selector, args) = calldata.split_at(4);
        let decode_err = |e: abi::Error| RecoveryError::Encoding(format!("Invalid call arguments: {}", e));

        if selector == short_signature(ADD_RECOVERY_PROVIDER, &provider_params()) {
            let (provider, enroll_data) = decode_provider_args(args).map_err(decode_err)?;
            return Ok(AccountCall::AddRecoveryProvider {
                provider,
                enroll_data,
            });
        }
        if selector == short_signature(REMOVE_RECOVERY_PROVIDER, &provider_params()) {
            let (provider, disenroll_data) = decode_provider_args(args).map_err(decode_err)?;
            return Ok(AccountCall::RemoveRecoveryProvider {
                provider,
                disenroll_data,
            });
        }
        if selector == short_signature(RECOVER_OWNERSHIP, &recover_params()) {
            let mut tokens = abi::decode(&recover_params(), args).map_err(decode_err)?.into_iter();
            let subject_data = tokens.next().and_then(Token::into_bytes);
            let provider = tokens.next().and_then(Token::into_address);
            let proof_payload = tokens.next().and_then(Token::into_bytes);
            return match (subject_data, provider, proof_payload) {
                (Some(subject_data), Some(provider), Some(proof_payload)) => Ok(AccountCall::RecoverOwnership {
                    subject_data,
                    provider: from_h160(provider),
                    proof_payload,
                }),
                _ => Err(RecoveryError::Encoding("Invalid recoverOwnership arguments".into())),
            };
        }

        Err(RecoveryError::Encoding(format!(
            "Unknown selector 0x{}",
            hex::encode(selector)
        )))
    }
}

fn decode_provider_args(args: &[u8]) -> Result<(EthAddress, Vec<u8>), abi::Error> {
    let mut tokens = abi::decode(&provider_params(), args)?.into_iter();
    match (
        tokens.next().and_then(Token::into_address),
        tokens.next().and_then(Token::into_bytes),
    ) {
        (Some(provider), Some(data)) => Ok((from_h160(provider), data)),
        _ => Err(abi::Error::InvalidData),
    }
}
