//! Chain JSON-RPC types
//!
//! Type definitions for blocks, transactions and cells returned from the
//! chain node's JSON-RPC endpoint. All numeric and byte fields arrive as
//! hex strings and are parsed into native types on deserialization.

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer};

/// Full block with header and transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    /// Block header
    pub header: Header,

    /// Transactions in block order
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Block header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    /// Block height (hex string in JSON)
    #[serde(rename = "number", deserialize_with = "deserialize_hex_u64")]
    pub number: u64,

    /// Block hash (hex string in JSON)
    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Hash of the parent block (hex string in JSON)
    #[serde(rename = "parentHash", deserialize_with = "deserialize_hex_b256")]
    pub parent_hash: B256,

    /// Block timestamp (Unix epoch seconds, hex string in JSON)
    #[serde(rename = "timestamp", deserialize_with = "deserialize_hex_u64")]
    pub timestamp: u64,
}

/// A transaction: consumed inputs, created outputs, and witnesses.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    /// Transaction hash (hex string in JSON)
    #[serde(rename = "hash", deserialize_with = "deserialize_hex_b256")]
    pub hash: B256,

    /// Consumed cells
    #[serde(default)]
    pub inputs: Vec<CellInput>,

    /// Created cells
    #[serde(default)]
    pub outputs: Vec<CellOutput>,

    /// Data payload of each created cell, index-aligned with `outputs`
    #[serde(rename = "outputsData", default, deserialize_with = "deserialize_hex_bytes_vec")]
    pub outputs_data: Vec<Vec<u8>>,

    /// Witnesses; the trailing entries carry the versioned cell payloads
    /// and the action tag
    #[serde(default, deserialize_with = "deserialize_hex_bytes_vec")]
    pub witnesses: Vec<Vec<u8>>,
}

impl Transaction {
    /// The outpoints consumed by this transaction, in input order.
    pub fn input_outpoints(&self) -> impl Iterator<Item = &OutPoint> {
        self.inputs.iter().map(|input| &input.previous_output)
    }
}

/// Transaction input referencing a live cell by outpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CellInput {
    /// The consumed cell
    #[serde(rename = "previousOutput")]
    pub previous_output: OutPoint,
}

/// Unique address of a cell: creating transaction plus output index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutPoint {
    /// Hash of the creating transaction (hex string in JSON)
    #[serde(rename = "txHash", deserialize_with = "deserialize_hex_b256")]
    pub tx_hash: B256,

    /// Output index within that transaction (hex string in JSON)
    #[serde(rename = "index", deserialize_with = "deserialize_hex_u32")]
    pub index: u32,
}

/// A created cell: capacity plus owning and typing scripts.
#[derive(Debug, Clone, Deserialize)]
pub struct CellOutput {
    /// Capacity in base units (hex string in JSON)
    #[serde(rename = "capacity", deserialize_with = "deserialize_hex_u64")]
    pub capacity: u64,

    /// Lock script (ownership)
    pub lock: Script,

    /// Type script: the on-chain contract governing the cell, if any
    #[serde(rename = "type", default)]
    pub type_script: Option<Script>,
}

/// An on-chain script reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Script {
    /// Hash identifying the script's code (hex string in JSON)
    #[serde(rename = "codeHash", deserialize_with = "deserialize_hex_b256")]
    pub code_hash: B256,

    /// How `code_hash` is matched ("data" or "type")
    #[serde(rename = "hashType", default)]
    pub hash_type: String,

    /// Script arguments (hex string in JSON)
    #[serde(rename = "args", deserialize_with = "deserialize_hex_bytes")]
    pub args: Vec<u8>,
}

// Hex deserialization helpers

/// Pad an odd-length hex string with a leading zero.
fn pad_hex_string(s: &str) -> String {
    if s.is_empty() {
        return s.to_string();
    }
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Deserialize a hex string to u64.
fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    u64::from_str_radix(s, 16).map_err(serde::de::Error::custom)
}

/// Deserialize a hex string to u32.
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    u32::from_str_radix(s, 16).map_err(serde::de::Error::custom)
}

/// Deserialize a hex string to B256.
fn deserialize_hex_b256<'de, D>(deserializer: D) -> Result<B256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
    if bytes.len() != 32 {
        return Err(serde::de::Error::custom(format!(
            "Expected 32 bytes for hash, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

/// Deserialize a hex string to bytes.
fn deserialize_hex_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode_hex_bytes(&s).map_err(serde::de::Error::custom)
}

/// Deserialize a list of hex strings to a list of byte vectors.
fn deserialize_hex_bytes_vec<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Vec::<String>::deserialize(deserializer)?;
    list.iter()
        .map(|s| decode_hex_bytes(s).map_err(serde::de::Error::custom))
        .collect()
}

fn decode_hex_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        hex::decode(pad_hex_string(s))
    }
}
