//! Witness payload codec
//!
//! Cell payloads ride in transaction witnesses using a fixed binary
//! envelope, versioned per cell kind. The envelope is:
//!
//! ```text
//! [0..4)   magic "NAME"
//! [4]      witness kind: 0 = action tag, 1 = cell payload
//! action:  [5..9) tag length (u32 LE), tag bytes
//! cell:    [5]     slot (0 new, 1 old, 2 dep)
//!          [6]     cell kind
//!          [7..11) payload version (u32 LE)
//!          [11..15) cell index (u32 LE; output index for new, input index
//!                   for old, dep index otherwise)
//!          [15..19) entity length (u32 LE), entity bytes
//! ```
//!
//! An entity is a flat field list: `[field id u16 LE][length u32 LE][bytes]`
//! repeated until the end. Readers skip unknown field ids, so new fields can
//! be added without breaking older decoders. Witnesses that do not start
//! with the magic belong to other cell types and are ignored; a witness that
//! carries the magic but fails to parse is a decode error.

use crate::errors::IndexError;
use crate::records::{AccountId, AccountStatus, AddressInfo};
use crate::types::Transaction;
use alloy_primitives::{keccak256, B256};
use anyhow::Result;

/// Leading magic of every witness this indexer understands.
pub const WITNESS_MAGIC: &[u8; 4] = b"NAME";

const KIND_ACTION: u8 = 0;
const KIND_CELL: u8 = 1;

/// Which version slot of a cell a witness describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSlot {
    /// The cell being created by this transaction
    New,
    /// The cell being consumed by this transaction
    Old,
    /// A referenced dependency cell
    Dep,
}

impl CellSlot {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Old => 1,
            Self::Dep => 2,
        }
    }

    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::New),
            1 => Some(Self::Old),
            2 => Some(Self::Dep),
            _ => None,
        }
    }
}

/// The cell families carried in witness payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Account,
    SubAccount,
    ReverseRoot,
    Did,
    Proposal,
    Config,
}

impl CellKind {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Account => 0,
            Self::SubAccount => 1,
            Self::ReverseRoot => 2,
            Self::Did => 3,
            Self::Proposal => 4,
            Self::Config => 5,
        }
    }

    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Account),
            1 => Some(Self::SubAccount),
            2 => Some(Self::ReverseRoot),
            3 => Some(Self::Did),
            4 => Some(Self::Proposal),
            5 => Some(Self::Config),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::SubAccount => "sub-account",
            Self::ReverseRoot => "reverse-root",
            Self::Did => "did",
            Self::Proposal => "proposal",
            Self::Config => "config",
        }
    }
}

/// Entity field ids.
pub mod field {
    pub const ACCOUNT_ID: u16 = 0x01;
    pub const NEXT_ACCOUNT_ID: u16 = 0x02;
    pub const NAME: u16 = 0x03;
    pub const STATUS: u16 = 0x04;
    pub const REGISTERED_AT: u16 = 0x05;
    pub const EXPIRED_AT: u16 = 0x06;
    pub const OWNER: u16 = 0x07;
    pub const MANAGER: u16 = 0x08;
    pub const RECORD: u16 = 0x09;
    pub const ENABLE_SUB_ACCOUNTS: u16 = 0x0a;
    pub const RENEW_SUB_ACCOUNT_PRICE: u16 = 0x0b;
    pub const NONCE: u16 = 0x0c;
    pub const PARENT_ACCOUNT_ID: u16 = 0x0d;
    pub const EDIT_KEY: u16 = 0x0e;

    // nested address entity
    pub const CHAIN_TYPE: u16 = 0x10;
    pub const ALG_ID: u16 = 0x11;
    pub const SUB_ALG_ID: u16 = 0x12;
    pub const PAYLOAD: u16 = 0x13;

    // nested record entity
    pub const RECORD_TYPE: u16 = 0x14;
    pub const RECORD_KEY: u16 = 0x15;
    pub const RECORD_LABEL: u16 = 0x16;
    pub const RECORD_VALUE: u16 = 0x17;
    pub const RECORD_TTL: u16 = 0x18;

    // reverse-root leaves
    pub const LEAF: u16 = 0x20;
    pub const LEAF_ACTION: u16 = 0x21;
    pub const ADDRESS: u16 = 0x22;
    pub const ACCOUNT_NAME: u16 = 0x23;

    // did cells
    pub const LOCK_ARGS: u16 = 0x28;

    // approvals
    pub const APPROVAL_ACTION: u16 = 0x30;
    pub const APPROVAL_TARGET: u16 = 0x31;
    pub const PROTECTED_UNTIL: u16 = 0x32;

    // proposals
    pub const PRE_ACCOUNT_ID: u16 = 0x38;

    // config cells
    pub const CONTRACT_NAME: u16 = 0x40;
    pub const TYPE_ID: u16 = 0x41;
    pub const VERSION_MAJOR: u16 = 0x42;
    pub const VERSION_MINOR: u16 = 0x43;
}

/// Extract the action tag from a transaction's witnesses.
///
/// Returns None when no witness carries a well-formed action envelope;
/// such transactions belong to unrelated cell types and are skipped.
pub fn action_tag(tx: &Transaction) -> Option<String> {
    tx.witnesses.iter().rev().find_map(|w| parse_action(w))
}

fn parse_action(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 9 || &bytes[0..4] != WITNESS_MAGIC || bytes[4] != KIND_ACTION {
        return None;
    }
    let len = u32::from_le_bytes(bytes[5..9].try_into().ok()?) as usize;
    if bytes.len() != 9 + len {
        return None;
    }
    String::from_utf8(bytes[9..].to_vec()).ok()
}

/// An undecoded cell payload pulled out of a witness.
#[derive(Debug, Clone)]
pub struct RawCell {
    /// Cell index: output index for the new slot, input index for old
    pub index: u32,
    /// Payload version
    pub version: u32,
    /// Entity bytes
    pub entity: Vec<u8>,
}

/// Collect every cell payload of the given kind and slot, in witness order.
pub fn raw_cells(tx: &Transaction, kind: CellKind, slot: CellSlot) -> Result<Vec<RawCell>> {
    let mut cells = Vec::new();
    for bytes in &tx.witnesses {
        if bytes.len() < 5 || &bytes[0..4] != WITNESS_MAGIC || bytes[4] != KIND_CELL {
            continue;
        }
        if bytes.len() < 19 {
            return Err(IndexError::decode("truncated cell witness envelope"));
        }
        let w_slot = CellSlot::from_u8(bytes[5])
            .ok_or_else(|| IndexError::Decode(format!("unknown cell slot {}", bytes[5])))?;
        let w_kind = CellKind::from_u8(bytes[6])
            .ok_or_else(|| IndexError::Decode(format!("unknown cell kind {}", bytes[6])))?;
        let version = u32::from_le_bytes(bytes[7..11].try_into().unwrap());
        let index = u32::from_le_bytes(bytes[11..15].try_into().unwrap());
        let len = u32::from_le_bytes(bytes[15..19].try_into().unwrap()) as usize;
        if bytes.len() != 19 + len {
            return Err(IndexError::decode("cell witness length mismatch"));
        }
        if w_kind == kind && w_slot == slot {
            cells.push(RawCell {
                index,
                version,
                entity: bytes[19..].to_vec(),
            });
        }
    }
    Ok(cells)
}

/// Reduce a cell list to the single expected element.
///
/// Zero or many is a decode-contract violation, never resolved by
/// iteration order.
fn exactly_one<T>(mut cells: Vec<T>, kind: CellKind) -> Result<T> {
    if cells.len() != 1 {
        return Err(IndexError::ExactlyOne {
            kind: kind.name(),
            found: cells.len(),
        }
        .into());
    }
    Ok(cells.remove(0))
}

/// Sequential field-list reader. Repeated fields keep their order.
pub struct EntityReader {
    fields: Vec<(u16, Vec<u8>)>,
}

impl EntityReader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut fields = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            if pos + 6 > bytes.len() {
                return Err(IndexError::decode("truncated entity field header"));
            }
            let id = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap());
            let len = u32::from_le_bytes(bytes[pos + 2..pos + 6].try_into().unwrap()) as usize;
            pos += 6;
            if pos + len > bytes.len() {
                return Err(IndexError::Decode(format!(
                    "entity field 0x{:04x} overruns payload",
                    id
                ))
                .into());
            }
            fields.push((id, bytes[pos..pos + len].to_vec()));
            pos += len;
        }
        Ok(Self { fields })
    }

    /// First occurrence of a field, if present.
    pub fn first(&self, id: u16) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(fid, _)| *fid == id)
            .map(|(_, v)| v.as_slice())
    }

    /// Every occurrence of a repeated field, in order.
    pub fn all(&self, id: u16) -> impl Iterator<Item = &[u8]> {
        self.fields
            .iter()
            .filter(move |(fid, _)| *fid == id)
            .map(|(_, v)| v.as_slice())
    }

    fn require(&self, id: u16, what: &str) -> Result<&[u8]> {
        self.first(id)
            .ok_or_else(|| IndexError::Decode(format!("missing field {}", what)).into())
    }

    fn require_str(&self, id: u16, what: &str) -> Result<String> {
        String::from_utf8(self.require(id, what)?.to_vec())
            .map_err(|_| IndexError::Decode(format!("field {} is not utf-8", what)).into())
    }

    fn opt_str(&self, id: u16, what: &str) -> Result<Option<String>> {
        match self.first(id) {
            Some(bytes) => Ok(Some(String::from_utf8(bytes.to_vec()).map_err(|_| {
                IndexError::Decode(format!("field {} is not utf-8", what))
            })?)),
            None => Ok(None),
        }
    }

    fn require_u8(&self, id: u16, what: &str) -> Result<u8> {
        let bytes = self.require(id, what)?;
        if bytes.len() != 1 {
            return Err(IndexError::Decode(format!("field {} must be 1 byte", what)).into());
        }
        Ok(bytes[0])
    }

    fn require_u32(&self, id: u16, what: &str) -> Result<u32> {
        let bytes = self.require(id, what)?;
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| IndexError::Decode(format!("field {} must be 4 bytes", what)))?;
        Ok(u32::from_le_bytes(arr))
    }

    fn require_u64(&self, id: u16, what: &str) -> Result<u64> {
        let bytes = self.require(id, what)?;
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| IndexError::Decode(format!("field {} must be 8 bytes", what)))?;
        Ok(u64::from_le_bytes(arr))
    }

    fn require_account_id(&self, id: u16, what: &str) -> Result<AccountId> {
        let bytes = self.require(id, what)?;
        bytes
            .try_into()
            .map_err(|_| IndexError::Decode(format!("field {} must be 20 bytes", what)).into())
    }

    fn require_b256(&self, id: u16, what: &str) -> Result<B256> {
        let bytes = self.require(id, what)?;
        if bytes.len() != 32 {
            return Err(IndexError::Decode(format!("field {} must be 32 bytes", what)).into());
        }
        Ok(B256::from_slice(bytes))
    }
}

/// One resolution record inside a cell payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub record_type: String,
    pub key: String,
    pub label: String,
    pub value: String,
    pub ttl: u32,
}

impl RecordEntry {
    fn decode(bytes: &[u8]) -> Result<Self> {
        let reader = EntityReader::parse(bytes)?;
        Ok(Self {
            record_type: reader.require_str(field::RECORD_TYPE, "record type")?,
            key: reader.require_str(field::RECORD_KEY, "record key")?,
            label: reader.require_str(field::RECORD_LABEL, "record label")?,
            value: reader.require_str(field::RECORD_VALUE, "record value")?,
            ttl: reader.require_u32(field::RECORD_TTL, "record ttl")?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        builder::EntityBuilder::new()
            .str_field(field::RECORD_TYPE, &self.record_type)
            .str_field(field::RECORD_KEY, &self.key)
            .str_field(field::RECORD_LABEL, &self.label)
            .str_field(field::RECORD_VALUE, &self.value)
            .u32_field(field::RECORD_TTL, self.ttl)
            .finish()
    }
}

/// Content hash over a record list, used to detect record-set changes
/// without comparing row by row.
pub fn records_hash(records: &[RecordEntry]) -> B256 {
    let mut buf = Vec::new();
    for record in records {
        let encoded = record.encode();
        buf.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        buf.extend_from_slice(&encoded);
    }
    keccak256(&buf)
}

fn decode_address(bytes: &[u8], what: &str) -> Result<AddressInfo> {
    let reader = EntityReader::parse(bytes)
        .map_err(|_| IndexError::Decode(format!("malformed {} address", what)))?;
    Ok(AddressInfo {
        chain_type: reader.require_u32(field::CHAIN_TYPE, "address chain type")?,
        alg_id: reader.require_u8(field::ALG_ID, "address algorithm id")?,
        sub_alg_id: reader.require_u8(field::SUB_ALG_ID, "address sub-algorithm id")?,
        payload: reader.require(field::PAYLOAD, "address payload")?.to_vec(),
    })
}

fn decode_records(reader: &EntityReader) -> Result<Vec<RecordEntry>> {
    reader.all(field::RECORD).map(RecordEntry::decode).collect()
}

/// A sealed transfer approval riding on an account cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalInfo {
    pub action: String,
    pub target: AddressInfo,
    pub protected_until: u64,
}

/// Decoded account or sub-account cell payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCell {
    pub index: u32,
    pub version: u32,
    pub id: AccountId,
    pub next: AccountId,
    pub name: String,
    pub status: AccountStatus,
    pub registered_at: u64,
    pub expired_at: u64,
    pub owner: AddressInfo,
    pub manager: AddressInfo,
    pub records: Vec<RecordEntry>,
    pub enable_sub_accounts: bool,
    pub renew_sub_account_price: u64,
    pub nonce: u64,
    /// Only present on sub-account cells
    pub parent_id: Option<AccountId>,
    /// Edit discriminator on sub-account edits: "owner", "manager", "records"
    pub edit_key: Option<String>,
    pub approval: Option<ApprovalInfo>,
}

impl AccountCell {
    fn decode(raw: RawCell) -> Result<Self> {
        let reader = EntityReader::parse(&raw.entity)?;
        let status_raw = reader.require_u8(field::STATUS, "account status")?;
        let status = AccountStatus::from_u8(status_raw)
            .ok_or_else(|| IndexError::Decode(format!("unknown account status {}", status_raw)))?;
        let approval = match reader.first(field::APPROVAL_TARGET) {
            Some(target) => Some(ApprovalInfo {
                action: reader.require_str(field::APPROVAL_ACTION, "approval action")?,
                target: decode_address(target, "approval target")?,
                protected_until: reader.require_u64(field::PROTECTED_UNTIL, "approval protection")?,
            }),
            None => None,
        };
        let parent_id = match reader.first(field::PARENT_ACCOUNT_ID) {
            Some(_) => Some(reader.require_account_id(field::PARENT_ACCOUNT_ID, "parent id")?),
            None => None,
        };
        Ok(Self {
            index: raw.index,
            version: raw.version,
            id: reader.require_account_id(field::ACCOUNT_ID, "account id")?,
            next: reader.require_account_id(field::NEXT_ACCOUNT_ID, "next account id")?,
            name: reader.require_str(field::NAME, "account name")?,
            status,
            registered_at: reader.require_u64(field::REGISTERED_AT, "registered at")?,
            expired_at: reader.require_u64(field::EXPIRED_AT, "expired at")?,
            owner: decode_address(reader.require(field::OWNER, "owner")?, "owner")?,
            manager: decode_address(reader.require(field::MANAGER, "manager")?, "manager")?,
            records: decode_records(&reader)?,
            enable_sub_accounts: reader.require_u8(field::ENABLE_SUB_ACCOUNTS, "sub-account flag")?
                != 0,
            renew_sub_account_price: reader
                .require_u64(field::RENEW_SUB_ACCOUNT_PRICE, "sub-account price")?,
            nonce: reader.require_u64(field::NONCE, "nonce")?,
            parent_id,
            edit_key: reader.opt_str(field::EDIT_KEY, "edit key")?,
            approval,
        })
    }

    /// Encode back into entity bytes. The decoder's inverse; fixtures and
    /// tooling build payloads through this.
    pub fn encode_entity(&self) -> Vec<u8> {
        let mut b = builder::EntityBuilder::new()
            .field(field::ACCOUNT_ID, &self.id)
            .field(field::NEXT_ACCOUNT_ID, &self.next)
            .str_field(field::NAME, &self.name)
            .u8_field(field::STATUS, status_byte(self.status))
            .u64_field(field::REGISTERED_AT, self.registered_at)
            .u64_field(field::EXPIRED_AT, self.expired_at)
            .field(field::OWNER, &builder::address_entity(&self.owner))
            .field(field::MANAGER, &builder::address_entity(&self.manager))
            .u8_field(field::ENABLE_SUB_ACCOUNTS, self.enable_sub_accounts as u8)
            .u64_field(field::RENEW_SUB_ACCOUNT_PRICE, self.renew_sub_account_price)
            .u64_field(field::NONCE, self.nonce);
        for record in &self.records {
            b = b.field(field::RECORD, &record.encode());
        }
        if let Some(parent) = &self.parent_id {
            b = b.field(field::PARENT_ACCOUNT_ID, parent);
        }
        if let Some(edit_key) = &self.edit_key {
            b = b.str_field(field::EDIT_KEY, edit_key);
        }
        if let Some(approval) = &self.approval {
            b = b
                .str_field(field::APPROVAL_ACTION, &approval.action)
                .field(
                    field::APPROVAL_TARGET,
                    &builder::address_entity(&approval.target),
                )
                .u64_field(field::PROTECTED_UNTIL, approval.protected_until);
        }
        b.finish()
    }
}

fn status_byte(status: AccountStatus) -> u8 {
    match status {
        AccountStatus::Normal => 0,
        AccountStatus::Selling => 1,
        AccountStatus::Auction => 2,
        AccountStatus::CrossChain => 3,
        AccountStatus::Approval => 4,
        AccountStatus::Upgraded => 5,
    }
}

/// What a reverse-root leaf does to its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafAction {
    Update,
    Remove,
}

/// One leaf of a batched reverse-resolution root update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseLeaf {
    pub alg_id: u8,
    pub address: Vec<u8>,
    /// Empty on removal
    pub account_name: String,
    pub action: LeafAction,
}

impl ReverseLeaf {
    fn decode(bytes: &[u8]) -> Result<Self> {
        let reader = EntityReader::parse(bytes)?;
        let action = match reader.require_u8(field::LEAF_ACTION, "leaf action")? {
            0 => LeafAction::Remove,
            1 => LeafAction::Update,
            other => {
                return Err(IndexError::Decode(format!("unknown leaf action {}", other)).into())
            }
        };
        Ok(Self {
            alg_id: reader.require_u8(field::ALG_ID, "leaf algorithm id")?,
            address: reader.require(field::ADDRESS, "leaf address")?.to_vec(),
            account_name: reader
                .opt_str(field::ACCOUNT_NAME, "leaf account name")?
                .unwrap_or_default(),
            action,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let action = match self.action {
            LeafAction::Remove => 0,
            LeafAction::Update => 1,
        };
        let mut b = builder::EntityBuilder::new()
            .u8_field(field::LEAF_ACTION, action)
            .u8_field(field::ALG_ID, self.alg_id)
            .field(field::ADDRESS, &self.address);
        if !self.account_name.is_empty() {
            b = b.str_field(field::ACCOUNT_NAME, &self.account_name);
        }
        b.finish()
    }
}

/// Decoded reverse-resolution root cell: a batch of leaf updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseRootCell {
    pub index: u32,
    pub version: u32,
    pub leaves: Vec<ReverseLeaf>,
}

impl ReverseRootCell {
    fn decode(raw: RawCell) -> Result<Self> {
        let reader = EntityReader::parse(&raw.entity)?;
        let leaves = reader
            .all(field::LEAF)
            .map(ReverseLeaf::decode)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            index: raw.index,
            version: raw.version,
            leaves,
        })
    }

    pub fn encode_entity(&self) -> Vec<u8> {
        let mut b = builder::EntityBuilder::new();
        for leaf in &self.leaves {
            b = b.field(field::LEAF, &leaf.encode());
        }
        b.finish()
    }
}

/// Decoded DID ownership cell payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidCell {
    pub index: u32,
    pub version: u32,
    pub account_id: AccountId,
    pub name: String,
    pub expired_at: u64,
    pub lock_args: Vec<u8>,
    pub records: Vec<RecordEntry>,
}

impl DidCell {
    fn decode(raw: RawCell) -> Result<Self> {
        let reader = EntityReader::parse(&raw.entity)?;
        Ok(Self {
            index: raw.index,
            version: raw.version,
            account_id: reader.require_account_id(field::ACCOUNT_ID, "did account id")?,
            name: reader.require_str(field::NAME, "did account name")?,
            expired_at: reader.require_u64(field::EXPIRED_AT, "did expired at")?,
            lock_args: reader.require(field::LOCK_ARGS, "did lock args")?.to_vec(),
            records: decode_records(&reader)?,
        })
    }

    /// Content hash of the cell's record set.
    pub fn records_hash(&self) -> B256 {
        records_hash(&self.records)
    }

    pub fn encode_entity(&self) -> Vec<u8> {
        let mut b = builder::EntityBuilder::new()
            .field(field::ACCOUNT_ID, &self.account_id)
            .str_field(field::NAME, &self.name)
            .u64_field(field::EXPIRED_AT, self.expired_at)
            .field(field::LOCK_ARGS, &self.lock_args);
        for record in &self.records {
            b = b.field(field::RECORD, &record.encode());
        }
        b.finish()
    }
}

/// Decoded proposal cell payload: the set of account ids whose record sets
/// carry over when the proposal is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalCell {
    pub index: u32,
    pub version: u32,
    pub pre_account_ids: Vec<AccountId>,
}

impl ProposalCell {
    fn decode(raw: RawCell) -> Result<Self> {
        let reader = EntityReader::parse(&raw.entity)?;
        let pre_account_ids = reader
            .all(field::PRE_ACCOUNT_ID)
            .map(|bytes| {
                bytes
                    .try_into()
                    .map_err(|_| IndexError::decode("pre-account id must be 20 bytes"))
            })
            .collect::<Result<Vec<AccountId>>>()?;
        Ok(Self {
            index: raw.index,
            version: raw.version,
            pre_account_ids,
        })
    }

    pub fn encode_entity(&self) -> Vec<u8> {
        let mut b = builder::EntityBuilder::new();
        for id in &self.pre_account_ids {
            b = b.field(field::PRE_ACCOUNT_ID, id);
        }
        b.finish()
    }
}

/// Decoded config cell payload: a contract deployment announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCell {
    pub index: u32,
    pub version: u32,
    pub contract: String,
    pub type_id: B256,
    pub major: u32,
    pub minor: u32,
}

impl ConfigCell {
    fn decode(raw: RawCell) -> Result<Self> {
        let reader = EntityReader::parse(&raw.entity)?;
        Ok(Self {
            index: raw.index,
            version: raw.version,
            contract: reader.require_str(field::CONTRACT_NAME, "contract name")?,
            type_id: reader.require_b256(field::TYPE_ID, "contract type id")?,
            major: reader.require_u32(field::VERSION_MAJOR, "contract major version")?,
            minor: reader.require_u32(field::VERSION_MINOR, "contract minor version")?,
        })
    }

    pub fn encode_entity(&self) -> Vec<u8> {
        builder::EntityBuilder::new()
            .str_field(field::CONTRACT_NAME, &self.contract)
            .field(field::TYPE_ID, self.type_id.as_slice())
            .u32_field(field::VERSION_MAJOR, self.major)
            .u32_field(field::VERSION_MINOR, self.minor)
            .finish()
    }
}

/// Decode every account cell in the given slot.
pub fn decode_account_cells(tx: &Transaction, slot: CellSlot) -> Result<Vec<AccountCell>> {
    raw_cells(tx, CellKind::Account, slot)?
        .into_iter()
        .map(AccountCell::decode)
        .collect()
}

/// Decode the single expected account cell in the given slot.
pub fn decode_account_cell(tx: &Transaction, slot: CellSlot) -> Result<AccountCell> {
    exactly_one(decode_account_cells(tx, slot)?, CellKind::Account)
}

/// Decode every sub-account cell in the given slot.
pub fn decode_sub_account_cells(tx: &Transaction, slot: CellSlot) -> Result<Vec<AccountCell>> {
    raw_cells(tx, CellKind::SubAccount, slot)?
        .into_iter()
        .map(AccountCell::decode)
        .collect()
}

/// Decode the single expected sub-account cell in the given slot.
pub fn decode_sub_account_cell(tx: &Transaction, slot: CellSlot) -> Result<AccountCell> {
    exactly_one(decode_sub_account_cells(tx, slot)?, CellKind::SubAccount)
}

/// Decode the single expected reverse-root cell (new slot).
pub fn decode_reverse_root(tx: &Transaction) -> Result<ReverseRootCell> {
    let cells = raw_cells(tx, CellKind::ReverseRoot, CellSlot::New)?
        .into_iter()
        .map(ReverseRootCell::decode)
        .collect::<Result<Vec<_>>>()?;
    exactly_one(cells, CellKind::ReverseRoot)
}

/// Decode every DID cell in the given slot.
pub fn decode_did_cells(tx: &Transaction, slot: CellSlot) -> Result<Vec<DidCell>> {
    raw_cells(tx, CellKind::Did, slot)?
        .into_iter()
        .map(DidCell::decode)
        .collect()
}

/// Decode the single expected DID cell in the given slot.
pub fn decode_did_cell(tx: &Transaction, slot: CellSlot) -> Result<DidCell> {
    exactly_one(decode_did_cells(tx, slot)?, CellKind::Did)
}

/// Decode the single expected proposal cell in the given slot.
pub fn decode_proposal_cell(tx: &Transaction, slot: CellSlot) -> Result<ProposalCell> {
    let cells = raw_cells(tx, CellKind::Proposal, slot)?
        .into_iter()
        .map(ProposalCell::decode)
        .collect::<Result<Vec<_>>>()?;
    exactly_one(cells, CellKind::Proposal)
}

/// Decode the single expected config cell (new slot).
pub fn decode_config_cell(tx: &Transaction) -> Result<ConfigCell> {
    let cells = raw_cells(tx, CellKind::Config, CellSlot::New)?
        .into_iter()
        .map(ConfigCell::decode)
        .collect::<Result<Vec<_>>>()?;
    exactly_one(cells, CellKind::Config)
}

/// Witness and entity encoders: the decoder's inverse, used by fixtures
/// and tooling that fabricate transactions.
pub mod builder {
    use super::{field, CellKind, CellSlot, KIND_ACTION, KIND_CELL, WITNESS_MAGIC};
    use crate::records::AddressInfo;

    /// Sequential field-list writer.
    pub struct EntityBuilder {
        buf: Vec<u8>,
    }

    impl EntityBuilder {
        pub fn new() -> Self {
            Self { buf: Vec::new() }
        }

        pub fn field(mut self, id: u16, bytes: &[u8]) -> Self {
            self.buf.extend_from_slice(&id.to_le_bytes());
            self.buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            self.buf.extend_from_slice(bytes);
            self
        }

        pub fn str_field(self, id: u16, value: &str) -> Self {
            self.field(id, value.as_bytes())
        }

        pub fn u8_field(self, id: u16, value: u8) -> Self {
            self.field(id, &[value])
        }

        pub fn u32_field(self, id: u16, value: u32) -> Self {
            self.field(id, &value.to_le_bytes())
        }

        pub fn u64_field(self, id: u16, value: u64) -> Self {
            self.field(id, &value.to_le_bytes())
        }

        pub fn finish(self) -> Vec<u8> {
            self.buf
        }
    }

    impl Default for EntityBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Build an action-tag witness.
    pub fn action_witness(tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + tag.len());
        buf.extend_from_slice(WITNESS_MAGIC);
        buf.push(KIND_ACTION);
        buf.extend_from_slice(&(tag.len() as u32).to_le_bytes());
        buf.extend_from_slice(tag.as_bytes());
        buf
    }

    /// Build a cell-payload witness around entity bytes.
    pub fn cell_witness(
        slot: CellSlot,
        kind: CellKind,
        version: u32,
        index: u32,
        entity: &[u8],
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(19 + entity.len());
        buf.extend_from_slice(WITNESS_MAGIC);
        buf.push(KIND_CELL);
        buf.push(slot.as_u8());
        buf.push(kind.as_u8());
        buf.extend_from_slice(&version.to_le_bytes());
        buf.extend_from_slice(&index.to_le_bytes());
        buf.extend_from_slice(&(entity.len() as u32).to_le_bytes());
        buf.extend_from_slice(entity);
        buf
    }

    /// Encode an address as a nested entity.
    pub fn address_entity(addr: &AddressInfo) -> Vec<u8> {
        EntityBuilder::new()
            .u32_field(field::CHAIN_TYPE, addr.chain_type)
            .u8_field(field::ALG_ID, addr.alg_id)
            .u8_field(field::SUB_ALG_ID, addr.sub_alg_id)
            .field(field::PAYLOAD, &addr.payload)
            .finish()
    }
}
