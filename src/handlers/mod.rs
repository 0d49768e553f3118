//! Action handlers
//!
//! One family per cell type. Each handler decodes the cell payloads it
//! needs from the transaction's witnesses and translates them into
//! idempotent storage mutations. A handler returning an error aborts the
//! whole block; returning Ok with no writes is valid (version-guarded
//! skips).

pub mod account;
pub mod did_cell;
pub mod reverse;
pub mod sub_account;

use crate::errors::IndexError;
use crate::records::{AccountId, AccountRecord, CellRef, RecordRow};
use crate::registry::ContractRegistry;
use crate::store::ProjectionStore;
use crate::types::Transaction;
use crate::witness::{AccountCell, RecordEntry};
use alloy_primitives::B256;
use anyhow::Result;

/// Everything a handler gets to see for one transaction.
pub struct HandlerContext<'a> {
    pub store: &'a dyn ProjectionStore,
    pub registry: &'a mut ContractRegistry,
    pub tx: &'a Transaction,
    pub tx_hash: B256,
    pub block_number: u64,
    /// Block timestamp, Unix epoch seconds
    pub timestamp: u64,
    /// The decoded action tag
    pub action: &'a str,
}

impl HandlerContext<'_> {
    /// Outpoint of an output cell of this transaction.
    pub fn output_ref(&self, index: u32) -> CellRef {
        CellRef::new(self.tx_hash, index)
    }

    /// Outpoint consumed by the input at the given index.
    pub fn input_ref(&self, index: u32) -> Result<CellRef> {
        self.tx
            .inputs
            .get(index as usize)
            .map(|input| CellRef::from(&input.previous_output))
            .ok_or_else(|| {
                IndexError::decode(format!("cell witness references missing input {}", index))
            })
    }
}

/// Apply an on-chain contract deployment to the version registry.
pub fn deploy(ctx: &mut HandlerContext) -> Result<()> {
    let config = crate::witness::decode_config_cell(ctx.tx)?;
    ctx.registry.apply_deployment(&config)
}

/// Project a decoded account cell into an account row.
pub(crate) fn account_row(cell: &AccountCell, outpoint: CellRef) -> AccountRecord {
    AccountRecord {
        id: cell.id,
        name: cell.name.clone(),
        next: cell.next,
        owner: cell.owner.clone(),
        manager: cell.manager.clone(),
        status: cell.status,
        registered_at: cell.registered_at,
        expired_at: cell.expired_at,
        parent_id: cell.parent_id,
        enable_sub_accounts: cell.enable_sub_accounts,
        renew_sub_account_price: cell.renew_sub_account_price,
        nonce: cell.nonce,
        outpoint,
    }
}

/// Project decoded record entries into record rows for an account.
pub(crate) fn record_rows(id: &AccountId, records: &[RecordEntry]) -> Vec<RecordRow> {
    records
        .iter()
        .map(|record| RecordRow {
            account_id: *id,
            record_type: record.record_type.clone(),
            key: record.key.clone(),
            label: record.label.clone(),
            value: record.value.clone(),
            ttl: record.ttl,
        })
        .collect()
}
