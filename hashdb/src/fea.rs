//! Conversions between field-element arrays and their wire encodings.

use ethereum_types::U256;
use plonky2::field::goldilocks_field::GoldilocksField;
use plonky2::field::types::{Field, Field64, PrimeField64};
use zk_executor_common::{is_hex, FE_HEX_LEN};

pub type F = GoldilocksField;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeaError {
    #[error("value is not hex: {0}")]
    NotHex(String),
    #[error("value length {0} is not a multiple of {FE_HEX_LEN}")]
    BadLength(usize),
    #[error("chunk {0} is not a canonical field element")]
    NonCanonical(String),
}

/// Decodes exactly one 16 hex character chunk into a field element.
///
/// Chunks at or above the field order are rejected rather than reduced.
pub fn fe_from_hex_chunk(chunk: &str) -> Result<F, FeaError> {
    if chunk.len() != FE_HEX_LEN {
        return Err(FeaError::BadLength(chunk.len()));
    }
    if !is_hex(chunk) {
        return Err(FeaError::NotHex(chunk.to_string()));
    }
    let raw = u64::from_str_radix(chunk, 16).map_err(|_| FeaError::NotHex(chunk.to_string()))?;
    if raw >= F::ORDER {
        return Err(FeaError::NonCanonical(chunk.to_string()));
    }
    Ok(F::from_canonical_u64(raw))
}

/// Encodes a field element as a zero-padded 16 character hex chunk.
pub fn fe_to_hex_chunk(fe: F) -> String {
    format!("{:016x}", fe.to_canonical_u64())
}

/// Splits a concatenated hex value into 16 character chunks and decodes each
/// one, keeping chunk order.
pub fn fea_from_concatenated_hex(value: &str) -> Result<Vec<F>, FeaError> {
    if !is_hex(value) {
        return Err(FeaError::NotHex(value.to_string()));
    }
    if value.len() % FE_HEX_LEN != 0 {
        return Err(FeaError::BadLength(value.len()));
    }
    // `value` is ASCII at this point, so byte offsets are char boundaries.
    (0..value.len())
        .step_by(FE_HEX_LEN)
        .map(|i| fe_from_hex_chunk(&value[i..i + FE_HEX_LEN]))
        .collect()
}

/// Inverse of [`fea_from_concatenated_hex`].
pub fn fea_to_concatenated_hex(fea: &[F]) -> String {
    fea.iter().map(|fe| fe_to_hex_chunk(*fe)).collect()
}

/// Splits a scalar into 8 32-bit limbs in little-endian order.
pub fn scalar_to_fea8(x: U256) -> [F; 8] {
    std::array::from_fn(|i| F::from_canonical_u32((x >> (32 * i)).low_u32()))
}
