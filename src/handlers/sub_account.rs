//! Sub-account handlers
//!
//! Maintains parent-linked sub-account rows: batch creation, per-field
//! edits keyed by the edit-key discriminator, expiry-only renewals, and
//! grace-period-gated recycling.

use super::{account_row, record_rows, HandlerContext};
use crate::errors::IndexError;
use crate::records::AccountId;
use crate::registry::contracts;
use crate::witness::{self, CellSlot};
use anyhow::{Context, Result};
use tracing::debug;

/// Recycling is only legal once the account has been expired for this long.
/// The chain enforces the same bound, so a violation here means the decoder
/// and the deployed contract disagree.
pub const RECYCLE_GRACE_SECS: u64 = 90 * 24 * 60 * 60;

/// Parent account id carried in the sub-account contract's type-script args.
fn parent_from_type_args(ctx: &HandlerContext) -> Result<AccountId> {
    let type_id = ctx
        .registry
        .tracked(contracts::SUB_ACCOUNT)
        .map(|version| version.type_id)
        .ok_or_else(|| IndexError::decode("sub-account contract is not tracked"))?;
    let args = ctx
        .tx
        .outputs
        .iter()
        .find_map(|output| {
            output
                .type_script
                .as_ref()
                .filter(|script| script.code_hash == type_id)
                .map(|script| script.args.as_slice())
        })
        .ok_or_else(|| IndexError::decode("no sub-account contract output in transaction"))?;
    args.get(..20)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| IndexError::decode("sub-account type args shorter than an account id"))
}

/// Create a batch of sub-accounts, each stamped with the parent derived
/// from the contract's type-script args.
pub fn create_sub_accounts(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::SUB_ACCOUNT) {
        debug!("Skipping {}: sub-account cell not at current version", ctx.action);
        return Ok(());
    }
    let parent = parent_from_type_args(ctx)?;
    let cells = witness::decode_sub_account_cells(ctx.tx, CellSlot::New)?;

    let mut rows = Vec::with_capacity(cells.len());
    for cell in &cells {
        let mut sub = account_row(cell, ctx.output_ref(cell.index));
        sub.parent_id = Some(parent);
        rows.push(sub);
    }
    ctx.store
        .upsert_sub_accounts(&rows)
        .context("Failed to project sub-account batch")?;
    for cell in &cells {
        ctx.store
            .replace_records(&cell.id, &record_rows(&cell.id, &cell.records))
            .with_context(|| format!("Failed to project records of {}", cell.name))?;
    }
    debug!(
        "Created {} sub-accounts under {} at block {}",
        rows.len(),
        hex::encode(parent),
        ctx.block_number
    );
    Ok(())
}

/// Edit one field of a sub-account. The edit key routes to the narrowest
/// storage operation; an unknown key is a decode error, not a guess.
pub fn edit_sub_account(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::SUB_ACCOUNT) {
        debug!("Skipping {}: sub-account cell not at current version", ctx.action);
        return Ok(());
    }
    let cell = witness::decode_sub_account_cell(ctx.tx, CellSlot::New)?;
    let edit_key = cell
        .edit_key
        .as_deref()
        .ok_or_else(|| IndexError::decode("sub-account edit carries no edit key"))?;
    match edit_key {
        "owner" => ctx
            .store
            .update_sub_account_owner(&cell.id, &cell.owner)
            .with_context(|| format!("Failed to update owner of {}", cell.name)),
        "manager" => ctx
            .store
            .update_sub_account_manager(&cell.id, &cell.manager)
            .with_context(|| format!("Failed to update manager of {}", cell.name)),
        "records" => ctx
            .store
            .replace_records(&cell.id, &record_rows(&cell.id, &cell.records))
            .with_context(|| format!("Failed to update records of {}", cell.name)),
        other => Err(IndexError::decode(format!(
            "unknown sub-account edit key '{}'",
            other
        ))),
    }
}

/// Renew a batch of sub-accounts: expiry-only update.
pub fn renew_sub_accounts(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::SUB_ACCOUNT) {
        debug!("Skipping {}: sub-account cell not at current version", ctx.action);
        return Ok(());
    }
    for cell in witness::decode_sub_account_cells(ctx.tx, CellSlot::New)? {
        ctx.store
            .update_sub_account_expiry(&cell.id, cell.expired_at)
            .with_context(|| format!("Failed to renew {}", cell.name))?;
    }
    Ok(())
}

/// Recycle expired sub-accounts. Hard delete, gated by the 90-day grace
/// period; a premature recycle aborts the block.
///
/// Not version-guarded: the transaction only consumes cells, and rows
/// projected under an older contract version still have to go.
pub fn recycle_sub_accounts(ctx: &mut HandlerContext) -> Result<()> {
    for cell in witness::decode_sub_account_cells(ctx.tx, CellSlot::Old)? {
        let recyclable_at = cell.expired_at.saturating_add(RECYCLE_GRACE_SECS);
        if ctx.timestamp < recyclable_at {
            return Err(IndexError::RecycleBeforeGrace {
                account: cell.name.clone(),
                expired_at: cell.expired_at,
                now: ctx.timestamp,
            }
            .into());
        }
        ctx.store
            .delete_sub_account(&cell.id)
            .with_context(|| format!("Failed to recycle sub-account {}", cell.name))?;
    }
    Ok(())
}
