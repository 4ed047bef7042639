use ethereum_types::{H256, U256};

/// Largest `batch_l2_data` payload accepted when no other limit is
/// configured, in bytes.
pub const MAX_BATCH_L2_DATA_SIZE: usize = 120_000;

/// Width of a scalar (state root, hash) on the wire, in bytes.
pub const SCALAR_BYTES: usize = 32;

/// Number of hex characters of a 20-byte address without prefix.
pub const ADDRESS_HEX_LEN: usize = 40;

/// Number of hex characters of a canonical 32-byte database key.
pub const KEY_HEX_LEN: usize = 64;

/// Number of hex characters encoding one field element in a concatenated
/// database value.
pub const FE_HEX_LEN: usize = 16;

/// Strips a leading `0x` if there is one.
pub fn remove_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Returns `s` with a leading `0x`, adding it only when missing.
pub fn add_0x_if_missing(s: &str) -> String {
    if s.starts_with("0x") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

/// Whether every character of `s` is a hex digit. The empty string is hex.
pub fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether `s` is `0x` followed by hex digits.
pub fn is_0x_hex(s: &str) -> bool {
    s.strip_prefix("0x").is_some_and(is_hex)
}

/// Left-pads `s` with `'0'` up to `len` characters. Longer strings are
/// returned unchanged.
pub fn prepend_zeros(s: &str, len: usize) -> String {
    format!("{s:0>len$}")
}

/// Decodes a hex string that may have an odd number of digits, treating it
/// as if it had one more leading zero.
pub fn decode_hex_lenient(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = remove_0x(s);
    if s.len() % 2 == 1 {
        hex::decode(format!("0{s}"))
    } else {
        hex::decode(s)
    }
}

/// Interprets up to 32 big-endian bytes as an unsigned scalar. Returns `None`
/// for longer inputs instead of truncating.
pub fn scalar_from_be_bytes(bytes: &[u8]) -> Option<U256> {
    (bytes.len() <= SCALAR_BYTES).then(|| U256::from_big_endian(bytes))
}

/// Left-pads up to 32 big-endian bytes into a `H256`.
pub fn h256_from_be_bytes(bytes: &[u8]) -> Option<H256> {
    if bytes.len() > SCALAR_BYTES {
        return None;
    }
    let mut out = [0u8; SCALAR_BYTES];
    out[SCALAR_BYTES - bytes.len()..].copy_from_slice(bytes);
    Some(H256(out))
}

/// Converts a scalar into its 32-byte big-endian form.
pub fn u256_to_h256(x: U256) -> H256 {
    let mut out = [0u8; SCALAR_BYTES];
    x.to_big_endian(&mut out);
    H256(out)
}

/// Converts a 32-byte big-endian hash into a scalar.
pub fn h256_to_u256(h: H256) -> U256 {
    U256::from_big_endian(h.as_bytes())
}

/// Encodes a scalar as a fixed 64 character hex word, as used for EVM
/// stack entries.
pub fn u256_to_hex_word(x: U256) -> String {
    hex::encode(u256_to_h256(x))
}

/// Encodes a scalar as `0x` followed by its hex digits without leading zeros.
pub fn u256_to_0x_hex(x: U256) -> String {
    format!("0x{x:x}")
}
