//! Calldata for the three token contract functions the wizard uses.

use thiserror::Error;

use crate::{address::Address, units::U256};

/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// `delegates(address)`
pub const DELEGATES_SELECTOR: [u8; 4] = [0x58, 0x7c, 0xde, 0x1e];
/// `delegate(address)`
pub const DELEGATE_SELECTOR: [u8; 4] = [0x5c, 0x19, 0xa9, 0x5c];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("invalid hex in return data: {0}")]
    InvalidHex(String),
    #[error("return data too short: {0} bytes")]
    TooShort(usize),
    #[error("address word has non-zero high bytes")]
    DirtyAddress,
}

pub fn balance_of_calldata(holder: &Address) -> String {
    encode_address_call(BALANCE_OF_SELECTOR, holder)
}

pub fn delegates_calldata(holder: &Address) -> String {
    encode_address_call(DELEGATES_SELECTOR, holder)
}

pub fn delegate_calldata(delegatee: &Address) -> String {
    encode_address_call(DELEGATE_SELECTOR, delegatee)
}

fn encode_address_call(selector: [u8; 4], arg: &Address) -> String {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(arg.as_bytes());
    format!("0x{}", hex::encode(data))
}

/// Decode the first return word of an `eth_call` as a uint256.
pub fn decode_uint(return_data: &str) -> Result<U256, AbiError> {
    let word = first_word(return_data)?;
    // A 32-byte word always fits in 256 bits.
    U256::from_be_bytes(&word).map_err(|_| AbiError::TooShort(word.len()))
}

/// Decode the first return word of an `eth_call` as an address.
pub fn decode_address(return_data: &str) -> Result<Address, AbiError> {
    let word = first_word(return_data)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(AbiError::DirtyAddress);
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    Ok(Address(out))
}

fn first_word(return_data: &str) -> Result<[u8; 32], AbiError> {
    let stripped = return_data
        .strip_prefix("0x")
        .or_else(|| return_data.strip_prefix("0X"))
        .unwrap_or(return_data);
    let bytes = hex::decode(stripped).map_err(|e| AbiError::InvalidHex(e.to_string()))?;
    if bytes.len() < 32 {
        return Err(AbiError::TooShort(bytes.len()));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes[..32]);
    Ok(word)
}
