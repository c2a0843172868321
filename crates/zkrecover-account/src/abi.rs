//! ABI layouts of subject data, proof payloads and enrollment data.
//!
//! Everything here is standard Solidity ABI encoding so payloads produced by
//! off-chain provers and EVM tooling decode unchanged.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};
use ethers::utils::keccak256;
use zkrecover_crypto::ProofPoints;
use zkrecover_types::{
    Commitment, EthAddress, ProofFingerprint, RecoveryError, RecoveryResult, RegistrationRoot, Word,
    WORD_SIZE,
};

/// ASCII "000000".
pub const ZERO_DATE: u64 = 0x303030303030;

pub fn to_h160(address: &EthAddress) -> Address {
    Address::from(*address.as_bytes())
}

pub fn from_h160(address: Address) -> EthAddress {
    EthAddress::from_bytes(address.to_fixed_bytes())
}

pub fn u256_to_word(value: U256) -> Word {
    let mut word = [0u8; WORD_SIZE];
    value.to_big_endian(&mut word);
    word
}

fn abi_err(e: abi::Error) -> RecoveryError {
    RecoveryError::Encoding(format!("ABI decode failed: {}", e))
}

/// `abi::decode` that also rejects trailing bytes, non-canonical offsets and
/// dirty padding: the input must equal the re-encoding of what it decodes to.
fn decode_canonical(types: &[ParamType], data: &[u8]) -> RecoveryResult<Vec<Token>> {
    let tokens = abi::decode(types, data).map_err(abi_err)?;
    if abi::encode(&tokens) != data {
        return Err(RecoveryError::Encoding("Non-canonical ABI encoding".into()));
    }
    Ok(tokens)
}

fn unexpected(what: &str) -> RecoveryError {
    RecoveryError::Encoding(format!("Unexpected ABI token for {}", what))
}

/// `abi.encode(address)`.
pub fn encode_subject(owner: &EthAddress) -> Vec<u8> {
    abi::encode(&[Token::Address(to_h160(owner))])
}

/// Strict `abi.decode(data, (address))`: exactly one word, clean upper bytes.
pub fn decode_subject(data: &[u8]) -> RecoveryResult<EthAddress> {
    if data.len() != WORD_SIZE {
        return Err(RecoveryError::Encoding(format!(
            "Subject data must be one word, got {} bytes",
            data.len()
        )));
    }
    if data[..WORD_SIZE - 20].iter().any(|b| *b != 0) {
        return Err(RecoveryError::Encoding("Dirty address padding".into()));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&data[WORD_SIZE - 20..]);
    Ok(EthAddress::from_bytes(bytes))
}

/// Six ASCII characters (`YYMMDD`) packed big-endian.
pub fn encode_date(date: &str) -> RecoveryResult<u64> {
    if date.len() != 6 || !date.is_ascii() {
        return Err(RecoveryError::Encoding(format!(
            "Date must be exactly 6 ASCII characters (YYMMDD), got {:?}",
            date
        )));
    }
    Ok(date.bytes().fold(0u64, |acc, b| (acc << 8) | u64::from(b)))
}

/// keccak256(abi.encode(provider, payload)).
pub fn proof_fingerprint(provider: &EthAddress, payload: &[u8]) -> ProofFingerprint {
    let encoded = abi::encode(&[Token::Address(to_h160(provider)), Token::Bytes(payload.to_vec())]);
    ProofFingerprint::from_bytes(keccak256(encoded))
}

// ============================================================================
// Proof points
// ============================================================================

fn uint_array(words: &[Word; 2]) -> Token {
    Token::FixedArray(words.iter().map(|w| Token::Uint(U256::from_big_endian(w))).collect())
}

fn proof_tokens(proof: &ProofPoints) -> Vec<Token> {
    vec![
        uint_array(&proof.a),
        Token::FixedArray(vec![uint_array(&proof.b[0]), uint_array(&proof.b[1])]),
        uint_array(&proof.c),
    ]
}

fn proof_param_types() -> Vec<ParamType> {
    let pair = ParamType::FixedArray(Box::new(ParamType::Uint(256)), 2);
    vec![
        pair.clone(),
        ParamType::FixedArray(Box::new(pair.clone()), 2),
        pair,
    ]
}

fn words_from_token(token: Token) -> RecoveryResult<[Word; 2]> {
    match token {
        Token::FixedArray(items) if items.len() == 2 => {
            let mut out = [[0u8; WORD_SIZE]; 2];
            for (slot, item) in out.iter_mut().zip(items) {
                match item {
                    Token::Uint(value) => *slot = u256_to_word(value),
                    _ => return Err(unexpected("uint256")),
                }
            }
            Ok(out)
        }
        _ => Err(unexpected("uint256[2]")),
    }
}

fn proof_from_tokens(tokens: Vec<Token>) -> RecoveryResult<ProofPoints> {
    let [a, b, c]: [Token; 3] = tokens
        .try_into()
        .map_err(|_| unexpected("proof points"))?;

    let b = match b {
        Token::FixedArray(rows) if rows.len() == 2 => {
            let mut rows = rows.into_iter();
            let first = rows.next().ok_or_else(|| unexpected("uint256[2][2]"))?;
            let second = rows.next().ok_or_else(|| unexpected("uint256[2][2]"))?;
            [words_from_token(first)?, words_from_token(second)?]
        }
        _ => return Err(unexpected("uint256[2][2]")),
    };

    Ok(ProofPoints {
        a: words_from_token(a)?,
        b,
        c: words_from_token(c)?,
    })
}

/// `abi.encode(uint256[2] a, uint256[2][2] b, uint256[2] c)`, the
/// commitment-flow recovery payload.
pub fn encode_proof_points(proof: &ProofPoints) -> Vec<u8> {
    abi::encode(&proof_tokens(proof))
}

pub fn decode_proof_points(data: &[u8]) -> RecoveryResult<ProofPoints> {
    let tokens = decode_canonical(&proof_param_types(), data)?;
    proof_from_tokens(tokens)
}

// ============================================================================
// Identity query payload
// ============================================================================

/// `(bytes32 registrationRoot, uint256 currentDate, bytes encodedSubject,
/// (uint256[2], uint256[2][2], uint256[2]) proof)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityPayload {
    pub registration_root: RegistrationRoot,
    pub current_date: U256,
    pub encoded_subject: Vec<u8>,
    pub proof: ProofPoints,
}

impl IdentityPayload {
    pub fn new(
        registration_root: RegistrationRoot,
        current_date: u64,
        subject: &EthAddress,
        proof: ProofPoints,
    ) -> Self {
        Self {
            registration_root,
            current_date: U256::from(current_date),
            encoded_subject: encode_subject(subject),
            proof,
        }
    }

    fn param_types() -> Vec<ParamType> {
        vec![
            ParamType::FixedBytes(32),
            ParamType::Uint(256),
            ParamType::Bytes,
            ParamType::Tuple(proof_param_types()),
        ]
    }

    pub fn encode(&self) -> Vec<u8> {
        abi::encode(&[
            Token::FixedBytes(self.registration_root.as_bytes().to_vec()),
            Token::Uint(self.current_date),
            Token::Bytes(self.encoded_subject.clone()),
            Token::Tuple(proof_tokens(&self.proof)),
        ])
    }

    pub fn decode(data: &[u8]) -> RecoveryResult<Self> {
        let tokens = decode_canonical(&Self::param_types(), data)?;
        let [root, date, subject, proof]: [Token; 4] = tokens
            .try_into()
            .map_err(|_| unexpected("identity payload"))?;

        let registration_root = match root {
            Token::FixedBytes(bytes) if bytes.len() == WORD_SIZE => {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(&bytes);
                RegistrationRoot::from_bytes(word)
            }
            _ => return Err(unexpected("bytes32")),
        };
        let current_date = date.into_uint().ok_or_else(|| unexpected("uint256"))?;
        let encoded_subject = subject.into_bytes().ok_or_else(|| unexpected("bytes"))?;
        let proof = match proof {
            Token::Tuple(items) => proof_from_tokens(items)?,
            _ => return Err(unexpected("proof tuple")),
        };

        Ok(Self {
            registration_root,
            current_date,
            encoded_subject,
            proof,
        })
    }

    pub fn current_date_word(&self) -> Word {
        u256_to_word(self.current_date)
    }
}

// ============================================================================
// Commitment enrollment
// ============================================================================

/// `(bytes32 commitment, (uint256[2], uint256[2][2], uint256[2]) proof)`,
/// the enrollment data of the commitment provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentEnrollment {
    pub commitment: Commitment,
    pub proof: ProofPoints,
}

impl CommitmentEnrollment {
    pub fn encode(&self) -> Vec<u8> {
        abi::encode(&[
            Token::FixedBytes(self.commitment.as_bytes().to_vec()),
            Token::Tuple(proof_tokens(&self.proof)),
        ])
    }

    pub fn decode(data: &[u8]) -> RecoveryResult<Self> {
        let tokens = decode_canonical(
            &[ParamType::FixedBytes(32), ParamType::Tuple(proof_param_types())],
            data,
        )?;
        let [commitment, proof]: [Token; 2] = tokens
            .try_into()
            .map_err(|_| unexpected("commitment enrollment"))?;

        let commitment = match commitment {
            Token::FixedBytes(bytes) if bytes.len() == WORD_SIZE => {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(&bytes);
                Commitment::from_bytes(word)
            }
            _ => return Err(unexpected("bytes32")),
        };
        let proof = match proof {
            Token::Tuple(items) => proof_from_tokens(items)?,
            _ => return Err(unexpected("proof tuple")),
        };

        Ok(Self { commitment, proof })
    }
}
