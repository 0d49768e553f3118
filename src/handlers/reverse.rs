//! Reverse-record handlers
//!
//! Maintains address-to-account reverse resolution. Single-cell
//! declarations read the account name from the cell data and the address
//! from the cell's lock args; the batched root variant applies decoded
//! leaf updates inside one storage transaction.

use super::HandlerContext;
use crate::errors::IndexError;
use crate::records::{CellRef, ReverseRecord};
use crate::registry::contracts;
use crate::store::ReverseReplace;
use crate::witness::{self, LeafAction};
use anyhow::{Context, Result};
use tracing::debug;

/// Decode the declared mapping from output 0: cell data is the UTF-8
/// account name, lock args are `[alg id][address payload]`.
fn declared_record(ctx: &HandlerContext) -> Result<ReverseRecord> {
    let output = ctx
        .tx
        .outputs
        .first()
        .ok_or_else(|| IndexError::decode("reverse declaration has no outputs"))?;
    let data = ctx
        .tx
        .outputs_data
        .first()
        .ok_or_else(|| IndexError::decode("reverse declaration has no output data"))?;
    let account_name = String::from_utf8(data.clone())
        .map_err(|_| IndexError::Decode("reverse declaration name is not utf-8".to_string()))?;
    if account_name.is_empty() {
        return Err(IndexError::decode("reverse declaration name is empty"));
    }
    let args = &output.lock.args;
    if args.len() < 2 {
        return Err(IndexError::decode("reverse declaration lock args too short"));
    }
    Ok(ReverseRecord {
        outpoint: ctx.output_ref(0),
        alg_id: args[0],
        address: args[1..].to_vec(),
        account_name,
    })
}

/// Declare a reverse record: plain insert.
pub fn declare_reverse_record(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::REVERSE) {
        debug!("Skipping {}: reverse cell not at current version", ctx.action);
        return Ok(());
    }
    let record = declared_record(ctx)?;
    debug!(
        "Declared reverse record {} -> {} at block {}",
        hex::encode(&record.address),
        record.account_name,
        ctx.block_number
    );
    ctx.store
        .put_reverse_record(&record)
        .context("Failed to project reverse declaration")
}

/// Redeclare a reverse record: insert the new row and supersede whatever
/// previously mapped the same address.
pub fn redeclare_reverse_record(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::REVERSE) {
        debug!("Skipping {}: reverse cell not at current version", ctx.action);
        return Ok(());
    }
    let record = declared_record(ctx)?;
    if let Some(previous) = ctx
        .store
        .reverse_by_address(record.alg_id, &record.address)?
    {
        if previous.outpoint != record.outpoint {
            ctx.store
                .delete_reverse_by_outpoints(std::slice::from_ref(&previous.outpoint))
                .context("Failed to supersede previous reverse record")?;
        }
    }
    ctx.store
        .put_reverse_record(&record)
        .context("Failed to project reverse redeclaration")
}

/// Retract reverse records: delete by the full set of consumed outpoints.
///
/// Not version-guarded: a retraction creates no reverse-typed output, and
/// declarations made under an older contract version still have to go.
pub fn retract_reverse_record(ctx: &mut HandlerContext) -> Result<()> {
    let outs: Vec<CellRef> = ctx.tx.input_outpoints().map(CellRef::from).collect();
    debug!(
        "Retracting {} reverse records at block {}",
        outs.len(),
        ctx.block_number
    );
    ctx.store
        .delete_reverse_by_outpoints(&outs)
        .context("Failed to retract reverse records")
}

/// Apply a batched reverse-root update: for each leaf, the live mapping for
/// the address is dropped and conditionally re-created, all in one storage
/// transaction. Leaves at most one live mapping per address.
pub fn update_reverse_record_root(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::REVERSE_ROOT) {
        debug!("Skipping {}: reverse root not at current version", ctx.action);
        return Ok(());
    }
    let root = witness::decode_reverse_root(ctx.tx)?;
    let mut entries = Vec::with_capacity(root.leaves.len());
    for (leaf_index, leaf) in root.leaves.iter().enumerate() {
        let insert = match leaf.action {
            LeafAction::Remove => None,
            LeafAction::Update => {
                if leaf.account_name.is_empty() {
                    return Err(IndexError::decode("reverse leaf update without account name"));
                }
                Some(ReverseRecord {
                    outpoint: CellRef::new(ctx.tx_hash, leaf_index as u32),
                    alg_id: leaf.alg_id,
                    address: leaf.address.clone(),
                    account_name: leaf.account_name.clone(),
                })
            }
        };
        entries.push(ReverseReplace {
            alg_id: leaf.alg_id,
            address: leaf.address.clone(),
            insert,
        });
    }
    debug!(
        "Applying reverse root with {} leaves at block {}",
        entries.len(),
        ctx.block_number
    );
    ctx.store
        .replace_reverse_set(&entries)
        .context("Failed to apply reverse root update")
}
