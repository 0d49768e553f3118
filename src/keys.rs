//! Key encoding and decoding utilities
//!
//! All keys use a single-byte prefix followed by binary data.
//! This ensures deterministic, lexicographically ordered keys in RocksDB.

use crate::records::{AccountId, CellRef};

/// Encode an account key.
///
/// Format: byte 'A' (0x41) + account id (20 bytes)
/// Total length: 21 bytes
pub fn encode_account_key(id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(b'A');
    key.extend_from_slice(id);
    key
}

/// Encode a sub-account key.
///
/// Format: byte 'U' (0x55) + account id (20 bytes)
/// Total length: 21 bytes
pub fn encode_sub_account_key(id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(b'U');
    key.extend_from_slice(id);
    key
}

/// Encode a record key.
///
/// Format: byte 'R' (0x52) + account id (20 bytes) + sequence (4 bytes, big-endian)
/// Total length: 25 bytes
///
/// The sequence number is the row's position in the decoded record list;
/// replace-set semantics delete the whole prefix before re-inserting.
pub fn encode_record_key(id: &AccountId, seq: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(25);
    key.push(b'R');
    key.extend_from_slice(id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Prefix covering every record row of one account.
pub fn record_key_prefix(id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(b'R');
    key.extend_from_slice(id);
    key
}

/// Encode an outpoint-keyed entry (reverse records, DID cells).
///
/// Format: prefix byte + tx hash (32 bytes) + index (4 bytes, big-endian)
/// Total length: 37 bytes
fn encode_outpoint_key(prefix: u8, out: &CellRef) -> Vec<u8> {
    let mut key = Vec::with_capacity(37);
    key.push(prefix);
    key.extend_from_slice(out.tx_hash.as_slice());
    key.extend_from_slice(&out.index.to_be_bytes());
    key
}

/// Encode a reverse-record key. Prefix byte 'V' (0x56).
pub fn encode_reverse_key(out: &CellRef) -> Vec<u8> {
    encode_outpoint_key(b'V', out)
}

/// Encode a reverse-record address index key.
///
/// Format: byte 'X' (0x58) + algorithm id (1 byte) + address payload (variable)
///
/// The value is the 37-byte reverse-record key of the live row for that
/// address, keeping at most one live mapping per address.
pub fn encode_reverse_index_key(alg_id: u8, address: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + address.len());
    key.push(b'X');
    key.push(alg_id);
    key.extend_from_slice(address);
    key
}

/// Encode a DID cell key. Prefix byte 'D' (0x44).
pub fn encode_did_key(out: &CellRef) -> Vec<u8> {
    encode_outpoint_key(b'D', out)
}

/// Encode a sub-account parent index key.
///
/// Format: byte 'P' (0x50) + parent id (20 bytes) + child id (20 bytes)
/// Total length: 41 bytes
pub fn encode_parent_index_key(parent: &AccountId, child: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(41);
    key.push(b'P');
    key.extend_from_slice(parent);
    key.extend_from_slice(child);
    key
}

/// Prefix covering every child of one parent account.
pub fn parent_index_prefix(parent: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(b'P');
    key.extend_from_slice(parent);
    key
}

/// Extract the child account id from a parent index key.
pub fn decode_parent_index_key(key: &[u8]) -> Option<AccountId> {
    if key.len() != 41 || key[0] != b'P' {
        return None;
    }
    let mut child = [0u8; 20];
    child.copy_from_slice(&key[21..41]);
    Some(child)
}

/// Encode a block window key.
///
/// Format: byte 'B' (0x42) + block number (8 bytes, big-endian)
/// Total length: 9 bytes
pub fn encode_block_key(number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(b'B');
    key.extend_from_slice(&number.to_be_bytes());
    key
}

/// Extract the block number from a block window key.
pub fn decode_block_key(key: &[u8]) -> Option<u64> {
    if key.len() != 9 || key[0] != b'B' {
        return None;
    }
    Some(u64::from_be_bytes(key[1..9].try_into().ok()?))
}

/// Encode a meta key.
///
/// Format: byte 'M' (0x4D) + meta_id (1 byte)
/// Total length: 2 bytes
///
/// Meta IDs:
/// - 0x01: cursor (latest processed block number)
pub fn encode_meta_key(meta_id: u8) -> Vec<u8> {
    vec![b'M', meta_id]
}
