//! Poseidon hashing of arbitrary byte strings, in the sponge layout used for
//! contract bytecode hashing by the Hermez tooling: bytes are padded with
//! `0x01 .. 0x80` to a multiple of 56, absorbed 7 bytes per element and 8
//! elements per permutation.

use ethereum_types::{H256, U256};
use plonky2::field::types::{Field, PrimeField64};
use plonky2::hash::hash_types::HashOut;
use plonky2::hash::poseidon::{self, Poseidon};

use crate::fea::F;

const BYTES_PER_ELEMENT: usize = 7;
const BYTES_PER_BLOCK: usize = poseidon::SPONGE_RATE * BYTES_PER_ELEMENT;

pub fn hash_bytes(bytes: &[u8]) -> HashOut<F> {
    let mut padded = bytes.to_vec();
    pad_byte_vec(&mut padded);

    let mut capacity = [F::ZERO; poseidon::SPONGE_CAPACITY];
    let mut state = [F::ZERO; poseidon::SPONGE_WIDTH];
    for block in padded.chunks_exact(BYTES_PER_BLOCK) {
        for (slot, chunk) in state[..poseidon::SPONGE_RATE]
            .iter_mut()
            .zip(block.chunks_exact(BYTES_PER_ELEMENT))
        {
            let mut le = [0u8; 8];
            le[..BYTES_PER_ELEMENT].copy_from_slice(chunk);
            *slot = F::from_canonical_u64(u64::from_le_bytes(le));
        }
        state[poseidon::SPONGE_RATE..].copy_from_slice(&capacity);
        let out = F::poseidon(state);
        capacity.copy_from_slice(&out[..poseidon::SPONGE_CAPACITY]);
    }
    HashOut { elements: capacity }
}

fn pad_byte_vec(bytes: &mut Vec<u8>) {
    bytes.push(0x01);
    while bytes.len() % BYTES_PER_BLOCK != 0 {
        bytes.push(0x00);
    }
    if let Some(last) = bytes.last_mut() {
        *last |= 0x80;
    }
}

/// Reads the four elements as little-endian 64-bit limbs of a scalar and
/// returns it big-endian.
pub fn hashout_to_h256(h: HashOut<F>) -> H256 {
    let x = U256(h.elements.map(|e| e.to_canonical_u64()));
    let mut out = [0u8; 32];
    x.to_big_endian(&mut out);
    H256(out)
}
