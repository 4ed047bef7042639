//! Validation and decoding of individual wire fields.
//!
//! Every function either returns the internal value or a [`CodecError`]
//! naming the offending field. Values are never truncated or wrapped.

use ethereum_types::{H160, H256, U256};
use hashdb::fea::{fea_from_concatenated_hex, FeaError};
use hashdb::{Key, F};
use zk_executor_common::{
    add_0x_if_missing, decode_hex_lenient, h256_from_be_bytes, is_0x_hex, is_hex,
    prepend_zeros, remove_0x, scalar_from_be_bytes, ADDRESS_HEX_LEN, KEY_HEX_LEN, SCALAR_BYTES,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("got {field} too long, size={size}")]
    TooLong { field: &'static str, size: usize },
    #[error("got {field} not hex: {value}")]
    NotHex { field: &'static str, value: String },
    #[error("got invalid db value for key {key}: {source}")]
    BadFieldElements {
        key: String,
        #[source]
        source: FeaError,
    },
    #[error("got chainID = 0")]
    ZeroChainId,
    #[error("found batchL2Data.size()={size} > maximum={max}")]
    BatchDataTooBig { size: usize, max: usize },
}

/// Decodes a big-endian byte scalar of at most 32 bytes.
pub fn decode_scalar(field: &'static str, bytes: &[u8]) -> Result<U256, CodecError> {
    scalar_from_be_bytes(bytes).ok_or(CodecError::TooLong {
        field,
        size: bytes.len(),
    })
}

/// Decodes the sequencer address from its hex form. An empty string is the
/// zero address.
pub fn decode_sequencer_address(coinbase: &str) -> Result<H160, CodecError> {
    let digits = remove_0x(coinbase);
    if digits.len() > ADDRESS_HEX_LEN {
        return Err(CodecError::TooLong {
            field: "sequencer address",
            size: digits.len(),
        });
    }
    if !is_hex(digits) {
        return Err(CodecError::NotHex {
            field: "sequencer address",
            value: digits.to_string(),
        });
    }
    let bytes = decode_hex_lenient(digits).map_err(|_| CodecError::NotHex {
        field: "sequencer address",
        value: digits.to_string(),
    })?;
    let mut out = [0u8; 20];
    out[20 - bytes.len()..].copy_from_slice(&bytes);
    Ok(H160(out))
}

/// Returns `from` with a `0x` prefix after checking it is a hex address.
pub fn normalize_from(from: &str) -> Result<String, CodecError> {
    let from = add_0x_if_missing(from);
    if from.len() > 2 + ADDRESS_HEX_LEN {
        return Err(CodecError::TooLong {
            field: "from",
            size: from.len(),
        });
    }
    if !is_0x_hex(&from) {
        return Err(CodecError::NotHex {
            field: "from",
            value: from,
        });
    }
    Ok(from)
}

/// Accepts payloads up to and including `max` bytes.
pub fn check_batch_data(data: &[u8], max: usize) -> Result<(), CodecError> {
    if data.len() > max {
        return Err(CodecError::BatchDataTooBig {
            size: data.len(),
            max,
        });
    }
    Ok(())
}

pub fn check_chain_id(chain_id: u64) -> Result<u64, CodecError> {
    match chain_id {
        0 => Err(CodecError::ZeroChainId),
        id => Ok(id),
    }
}

/// Canonical 64 hex character form of a database or contract key.
pub fn canonical_key_hex(field: &'static str, key: &str) -> Result<String, CodecError> {
    let key = remove_0x(key);
    if key.len() > KEY_HEX_LEN {
        return Err(CodecError::TooLong {
            field,
            size: key.len(),
        });
    }
    if !is_hex(key) {
        return Err(CodecError::NotHex {
            field,
            value: key.to_string(),
        });
    }
    Ok(prepend_zeros(key, KEY_HEX_LEN))
}

pub fn normalize_key(field: &'static str, key: &str) -> Result<Key, CodecError> {
    let canonical = canonical_key_hex(field, key)?;
    let mut out = [0u8; SCALAR_BYTES];
    hex::decode_to_slice(&canonical, &mut out).map_err(|_| CodecError::NotHex {
        field,
        value: canonical.clone(),
    })?;
    Ok(H256(out))
}

/// Splits a concatenated value into field elements, in order.
pub fn decode_db_value(key: &str, value: &str) -> Result<Vec<F>, CodecError> {
    fea_from_concatenated_hex(value).map_err(|source| CodecError::BadFieldElements {
        key: key.to_string(),
        source,
    })
}

pub fn decode_program(value: &str) -> Result<Vec<u8>, CodecError> {
    let digits = remove_0x(value);
    if !is_hex(digits) {
        return Err(CodecError::NotHex {
            field: "contracts bytecode value",
            value: digits.to_string(),
        });
    }
    decode_hex_lenient(digits).map_err(|_| CodecError::NotHex {
        field: "contracts bytecode value",
        value: digits.to_string(),
    })
}

/// Decodes a trace target hash. An empty value means no target.
pub fn decode_tx_hash(field: &'static str, bytes: &[u8]) -> Result<Option<H256>, CodecError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    h256_from_be_bytes(bytes)
        .map(Some)
        .ok_or(CodecError::TooLong {
            field,
            size: bytes.len(),
        })
}
