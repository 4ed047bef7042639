//! Decoding of `batch_l2_data`.
//!
//! A batch is a plain concatenation of transactions. Each one is the RLP
//! list that was signed (legacy, optionally EIP-155 with the chain id
//! inside the list) followed by `r` (32 bytes), `s` (32 bytes), `v` (one
//! byte, 27 or 28) and the effective gas price percentage (one byte).

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use rlp::{PayloadInfo, Rlp, RlpStream};

const SIGNATURE_LEN: usize = 65;
const TRAILER_LEN: usize = SIGNATURE_LEN + 1;

// Half the curve order. Signatures with a larger `s` are malleable (EIP-2).
const SECP256K1_N_HALF: [u8; 32] =
    hex_literal::hex!("7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxDecodeError {
    #[error("invalid rlp at offset {offset}: {source}")]
    Rlp {
        offset: usize,
        #[source]
        source: rlp::DecoderError,
    },
    #[error("transaction at offset {0} is not an rlp list")]
    NotAList(usize),
    #[error("transaction at offset {offset} has {count} fields, expected 6 or 9")]
    FieldCount { offset: usize, count: usize },
    #[error("transaction at offset {0} has malformed EIP-155 fields")]
    Eip155(usize),
    #[error("transaction at offset {offset} is truncated: {missing} bytes missing")]
    Truncated { offset: usize, missing: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    /// 27 or 28 for well-formed transactions.
    pub v: u8,
}

/// One transaction as found in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    /// `None` for pre EIP-155 transactions.
    pub chain_id: Option<u64>,
    pub signature: Signature,
    pub effective_percentage: u8,
    /// The RLP the sender signed.
    pub unsigned_rlp: Vec<u8>,
}

impl RawTransaction {
    /// Hash the sender signed.
    pub fn signing_hash(&self) -> H256 {
        keccak(&self.unsigned_rlp)
    }

    /// `v` as it appears in the network encoding of the signed transaction.
    pub fn network_v(&self) -> u64 {
        let parity = u64::from(self.signature.v.saturating_sub(27));
        match self.chain_id {
            Some(chain_id) => chain_id.saturating_mul(2).saturating_add(35 + parity),
            None => 27 + parity,
        }
    }

    /// Network encoding of the signed transaction.
    pub fn signed_rlp(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(9);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        match &self.to {
            Some(to) => s.append(to),
            None => s.append_empty_data(),
        };
        s.append(&self.value);
        s.append(&self.data);
        s.append(&self.network_v());
        s.append(&U256::from_big_endian(self.signature.r.as_bytes()));
        s.append(&U256::from_big_endian(self.signature.s.as_bytes()));
        s.out().to_vec()
    }

    pub fn hash(&self) -> H256 {
        keccak(self.signed_rlp())
    }

    /// Recovers the sender, or `None` if the signature is invalid.
    pub fn sender(&self) -> Option<Address> {
        let Signature { r, s, v } = self.signature;
        if s.as_bytes() > &SECP256K1_N_HALF[..] || !(27..=28).contains(&v) {
            return None;
        }
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(r.as_bytes());
        compact[32..].copy_from_slice(s.as_bytes());
        let recovery_id = secp256k1::ecdsa::RecoveryId::try_from(i32::from(v - 27)).ok()?;
        let signature =
            secp256k1::ecdsa::RecoverableSignature::from_compact(&compact, recovery_id).ok()?;
        let public = secp256k1::SECP256K1
            .recover_ecdsa(
                &secp256k1::Message::from_digest(self.signing_hash().to_fixed_bytes()),
                &signature,
            )
            .ok()?;
        let hash = keccak(&public.serialize_uncompressed()[1..]);
        Some(Address::from_slice(&hash[12..]))
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// `gas_price * (effective_percentage + 1) / 256`.
    pub fn effective_gas_price(&self) -> U256 {
        self.gas_price
            .saturating_mul(U256::from(u64::from(self.effective_percentage) + 1))
            / U256::from(256)
    }
}

/// Splits `data` into its transactions, in batch order.
pub fn decode_batch(data: &[u8]) -> Result<Vec<RawTransaction>, TxDecodeError> {
    let mut txs = vec![];
    let mut offset = 0;
    while offset < data.len() {
        let (tx, len) = decode_transaction(&data[offset..], offset)?;
        txs.push(tx);
        offset += len;
    }
    Ok(txs)
}

fn decode_transaction(
    bytes: &[u8],
    offset: usize,
) -> Result<(RawTransaction, usize), TxDecodeError> {
    let rlp_err = |source: rlp::DecoderError| TxDecodeError::Rlp { offset, source };

    let info = PayloadInfo::from(bytes).map_err(rlp_err)?;
    // Lengths come from the wire and may claim more than the address space.
    let Some(total) = info
        .header_len
        .checked_add(info.value_len)
        .and_then(|len| len.checked_add(TRAILER_LEN))
    else {
        return Err(TxDecodeError::Truncated {
            offset,
            missing: usize::MAX - bytes.len(),
        });
    };
    let rlp_len = total - TRAILER_LEN;
    if bytes.len() < total {
        return Err(TxDecodeError::Truncated {
            offset,
            missing: total - bytes.len(),
        });
    }
    let unsigned_rlp = &bytes[..rlp_len];
    let list = Rlp::new(unsigned_rlp);
    if !list.is_list() {
        return Err(TxDecodeError::NotAList(offset));
    }
    let count = list.item_count().map_err(rlp_err)?;
    let chain_id = match count {
        6 => None,
        9 => {
            let zero_r: U256 = list.val_at(7).map_err(rlp_err)?;
            let zero_s: U256 = list.val_at(8).map_err(rlp_err)?;
            if !zero_r.is_zero() || !zero_s.is_zero() {
                return Err(TxDecodeError::Eip155(offset));
            }
            Some(list.val_at(6).map_err(rlp_err)?)
        }
        count => return Err(TxDecodeError::FieldCount { offset, count }),
    };
    let to = list.at(3).map_err(rlp_err)?;
    let to = if to.is_empty() {
        None
    } else {
        Some(to.as_val().map_err(rlp_err)?)
    };

    let trailer = &bytes[rlp_len..total];
    let tx = RawTransaction {
        nonce: list.val_at(0).map_err(rlp_err)?,
        gas_price: list.val_at(1).map_err(rlp_err)?,
        gas_limit: list.val_at(2).map_err(rlp_err)?,
        to,
        value: list.val_at(4).map_err(rlp_err)?,
        data: list.val_at(5).map_err(rlp_err)?,
        chain_id,
        signature: Signature {
            r: H256::from_slice(&trailer[..32]),
            s: H256::from_slice(&trailer[32..64]),
            v: trailer[64],
        },
        effective_percentage: trailer[SIGNATURE_LEN],
        unsigned_rlp: unsigned_rlp.to_vec(),
    };
    Ok((tx, total))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Unsigned fields of a transaction to put in a test batch.
    #[derive(Debug, Clone)]
    pub struct TxTemplate {
        pub nonce: u64,
        pub gas_price: U256,
        pub gas_limit: u64,
        pub to: Option<Address>,
        pub value: U256,
        pub data: Vec<u8>,
        pub chain_id: Option<u64>,
    }

    impl Default for TxTemplate {
        fn default() -> Self {
            Self {
                nonce: 0,
                gas_price: U256::from(1_000_000_000u64),
                gas_limit: 21_000,
                to: Some(Address::repeat_byte(0x11)),
                value: U256::from(1_000u64),
                data: vec![],
                chain_id: Some(1001),
            }
        }
    }

    pub fn unsigned_rlp(tx: &TxTemplate) -> Vec<u8> {
        let mut s = RlpStream::new_list(if tx.chain_id.is_some() { 9 } else { 6 });
        s.append(&tx.nonce);
        s.append(&tx.gas_price);
        s.append(&tx.gas_limit);
        match &tx.to {
            Some(to) => s.append(to),
            None => s.append_empty_data(),
        };
        s.append(&tx.value);
        s.append(&tx.data);
        if let Some(chain_id) = tx.chain_id {
            s.append(&chain_id);
            s.append(&0u8);
            s.append(&0u8);
        }
        s.out().to_vec()
    }

    pub fn secret_key(seed: u8) -> secp256k1::SecretKey {
        secp256k1::SecretKey::from_slice(&[seed; 32]).unwrap()
    }

    pub fn address_of(key: &secp256k1::SecretKey) -> Address {
        let public = secp256k1::PublicKey::from_secret_key_global(key);
        Address::from_slice(&keccak(&public.serialize_uncompressed()[1..])[12..])
    }

    /// Batch encoding of `tx` signed with `key`.
    pub fn sign(tx: &TxTemplate, key: &secp256k1::SecretKey, effective_percentage: u8) -> Vec<u8> {
        let rlp = unsigned_rlp(tx);
        let message = secp256k1::Message::from_digest(keccak(&rlp).to_fixed_bytes());
        let (recovery_id, compact) = secp256k1::SECP256K1
            .sign_ecdsa_recoverable(&message, key)
            .serialize_compact();
        let mut out = rlp;
        out.extend_from_slice(&compact);
        out.push(27 + i32::from(recovery_id) as u8);
        out.push(effective_percentage);
        out
    }
}
