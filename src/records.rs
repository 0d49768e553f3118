//! Projection row types
//!
//! These structs represent the read model persisted by the indexer.
//! They use postcard for binary serialization, which is compact and
//! deterministic.

use crate::types::OutPoint;
use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an account: leading 20 bytes of the name hash.
pub type AccountId = [u8; 20];

/// Derive an account id from its human-readable name.
///
/// Handlers that cannot trust a decoded id (e.g. expired-account auctions)
/// recompute it from the name with this function.
pub fn account_id_from_name(name: &str) -> AccountId {
    let digest = keccak256(name.as_bytes());
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest[..20]);
    id
}

/// Hex form of an account id, `0x`-prefixed.
pub fn account_id_hex(id: &AccountId) -> String {
    format!("0x{}", hex::encode(id))
}

/// Stable reference to a cell: creating transaction hash plus index.
///
/// The storage counterpart of [`OutPoint`]; wire types deserialize from hex
/// JSON, this one round-trips through postcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub tx_hash: B256,
    pub index: u32,
}

impl CellRef {
    pub fn new(tx_hash: B256, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl From<&OutPoint> for CellRef {
    fn from(out: &OutPoint) -> Self {
        Self {
            tx_hash: out.tx_hash,
            index: out.index,
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}-{}", self.tx_hash, self.index)
    }
}

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Plain owned account
    Normal,
    /// Listed on the fixed-price market
    Selling,
    /// Listed on the expired-account auction
    Auction,
    /// Locked for a cross-chain transfer
    CrossChain,
    /// A pending transfer approval is sealed on the account
    Approval,
    /// Ownership has been upgraded to a DID cell
    Upgraded,
}

impl AccountStatus {
    /// Map the on-chain status byte to a status.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Normal),
            1 => Some(Self::Selling),
            2 => Some(Self::Auction),
            3 => Some(Self::CrossChain),
            4 => Some(Self::Approval),
            5 => Some(Self::Upgraded),
            _ => None,
        }
    }
}

/// Owner or manager address: chain coordinates plus raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Chain the address belongs to
    pub chain_type: u32,
    /// Signature algorithm id
    pub alg_id: u8,
    /// Sub-algorithm id (0 when the algorithm has no variants)
    pub sub_alg_id: u8,
    /// Raw address bytes
    pub payload: Vec<u8>,
}

impl AddressInfo {
    /// Hex form of the address payload, `0x`-prefixed.
    pub fn payload_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.payload))
    }
}

/// Account row. Used for both top-level accounts and sub-accounts;
/// sub-accounts carry `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub name: String,
    /// Successor pointer in the on-chain sorted account list
    pub next: AccountId,
    pub owner: AddressInfo,
    pub manager: AddressInfo,
    pub status: AccountStatus,
    /// Registration time, Unix epoch seconds
    pub registered_at: u64,
    /// Expiry time, Unix epoch seconds
    pub expired_at: u64,
    /// Parent account id; None for top-level accounts
    pub parent_id: Option<AccountId>,
    pub enable_sub_accounts: bool,
    /// Price in base units for renewing one sub-account year
    pub renew_sub_account_price: u64,
    /// Edit nonce of the cell
    pub nonce: u64,
    /// Cell the row was projected from
    pub outpoint: CellRef,
}

/// Resolution record attached to an account. Rows have no independent
/// lifecycle: the full set is replaced whenever the account's records change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub account_id: AccountId,
    /// Namespace, e.g. "address", "profile", "dweb"
    pub record_type: String,
    pub key: String,
    pub label: String,
    pub value: String,
    /// Time-to-live in seconds for resolvers
    pub ttl: u32,
}

/// Address-to-account reverse resolution row, keyed by outpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseRecord {
    pub outpoint: CellRef,
    pub alg_id: u8,
    /// Raw chain address bytes
    pub address: Vec<u8>,
    pub account_name: String,
}

/// Projection of an upgraded-ownership DID cell, keyed by outpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidCellInfo {
    pub outpoint: CellRef,
    pub account_id: AccountId,
    pub name: String,
    pub expired_at: u64,
    /// Lock script args of the cell (the holding address)
    pub lock_args: Vec<u8>,
    /// Content hash of the cell's record set, used to detect record changes
    pub records_hash: B256,
}

/// One row of the rolling recently-processed-block window.
///
/// The latest row is the ingestion cursor; older rows exist only for fork
/// detection and are pruned past a fixed depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub block_number: u64,
    pub block_hash: B256,
    pub parent_hash: B256,
}
