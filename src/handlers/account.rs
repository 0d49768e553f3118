//! Account handlers
//!
//! Maintains the account/record projection for the account-management
//! contract family. Most market and edit actions replace the whole row and
//! record set from the new account cell; the approval sub-state machine
//! touches only status and ownership fields.

use super::{account_row, record_rows, HandlerContext};
use crate::errors::IndexError;
use crate::records::{account_id_from_name, account_id_hex, AccountStatus};
use crate::registry::contracts;
use crate::witness::{self, CellSlot};
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Generic account update: decode the new account cell, replace the row and
/// its full record set.
///
/// Covers record/manager edits, renewals, transfers, the sale lifecycle,
/// offer acceptance, cross-chain lock/unlock and forced status recovery:
/// every action whose post-state is fully described by the new cell.
pub fn update_account(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::ACCOUNT) {
        debug!("Skipping {}: account cell not at current version", ctx.action);
        return Ok(());
    }
    let cell = witness::decode_account_cell(ctx.tx, CellSlot::New)?;
    let account = account_row(&cell, ctx.output_ref(cell.index));
    let records = record_rows(&account.id, &cell.records);
    ctx.store
        .upsert_account_with_records(&account, &records)
        .with_context(|| format!("Failed to project account {}", account.name))
}

/// Fallback for unmapped action tags: refresh the projection from whatever
/// new account cells the transaction carries. Zero cells is a valid no-op,
/// which keeps the indexer tolerant of forward-compatible contract actions.
pub fn refresh_account(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::ACCOUNT) {
        debug!("Skipping {}: account cell not at current version", ctx.action);
        return Ok(());
    }
    let cells = witness::decode_account_cells(ctx.tx, CellSlot::New)?;
    if cells.is_empty() {
        debug!("Action {} carries no account cell, skipping", ctx.action);
        return Ok(());
    }
    for cell in cells {
        let account = account_row(&cell, ctx.output_ref(cell.index));
        let records = record_rows(&account.id, &cell.records);
        ctx.store
            .upsert_account_with_records(&account, &records)
            .with_context(|| format!("Failed to refresh account {}", account.name))?;
    }
    Ok(())
}

/// Recycle an expired account: the cell is being destroyed, so the old
/// slot carries the payload. Removes the account, its records, and its
/// sub-accounts.
///
/// Not version-guarded: the transaction creates no account-typed output,
/// and a row projected under an older contract version still has to go.
pub fn recycle_expired_account(ctx: &mut HandlerContext) -> Result<()> {
    let cell = witness::decode_account_cell(ctx.tx, CellSlot::Old)?;
    debug!(
        "Recycling expired account {} at block {}",
        cell.name, ctx.block_number
    );
    ctx.store
        .delete_account_cascade(&cell.id)
        .with_context(|| format!("Failed to recycle account {}", cell.name))
}

/// Confirm a registration proposal: one transaction finalizes many
/// accounts. Records are written only for accounts listed in the consumed
/// proposal's pre-account map (carrying over a prior record set), or taken
/// wholesale from an attached DID cell; newly registered accounts start
/// with no records, so their sets are left untouched.
pub fn confirm_proposal(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::ACCOUNT) {
        debug!("Skipping {}: account cell not at current version", ctx.action);
        return Ok(());
    }
    let proposal = witness::decode_proposal_cell(ctx.tx, CellSlot::Old)?;
    let attached_did: HashMap<_, _> = witness::decode_did_cells(ctx.tx, CellSlot::Dep)?
        .into_iter()
        .map(|cell| (cell.account_id, cell))
        .collect();

    let cells = witness::decode_account_cells(ctx.tx, CellSlot::New)?;
    let mut items = Vec::with_capacity(cells.len());
    for cell in cells {
        let account = account_row(&cell, ctx.output_ref(cell.index));
        let records = if let Some(did) = attached_did.get(&cell.id) {
            Some(record_rows(&cell.id, &did.records))
        } else if proposal.pre_account_ids.contains(&cell.id) {
            Some(record_rows(&cell.id, &cell.records))
        } else {
            None
        };
        items.push((account, records));
    }
    debug!(
        "Confirming proposal with {} accounts at block {}",
        items.len(),
        ctx.block_number
    );
    ctx.store
        .batch_upsert_accounts(&items)
        .context("Failed to project confirmed proposal")
}

/// Bid on an expired-account auction. The account id is recomputed from the
/// decoded name rather than trusted from the payload.
pub fn bid_expired_account_auction(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::ACCOUNT) {
        debug!("Skipping {}: account cell not at current version", ctx.action);
        return Ok(());
    }
    let cell = witness::decode_account_cell(ctx.tx, CellSlot::New)?;
    let derived = account_id_from_name(&cell.name);
    if derived != cell.id {
        warn!(
            "Auction bid for {} carries id {}, derived {}; using derived",
            cell.name,
            account_id_hex(&cell.id),
            account_id_hex(&derived)
        );
    }
    let mut account = account_row(&cell, ctx.output_ref(cell.index));
    account.id = derived;
    let records = record_rows(&derived, &cell.records);
    ctx.store
        .upsert_account_with_records(&account, &records)
        .with_context(|| format!("Failed to project auctioned account {}", account.name))
}

/// Seal a transfer approval on the account: status only.
pub fn create_approval(ctx: &mut HandlerContext) -> Result<()> {
    approval_status(ctx, AccountStatus::Approval)
}

/// Push back an approval's protection window. The projected state does not
/// change beyond re-asserting the approval status.
pub fn delay_approval(ctx: &mut HandlerContext) -> Result<()> {
    approval_status(ctx, AccountStatus::Approval)
}

/// Revoke a sealed approval: back to normal, ownership untouched.
pub fn revoke_approval(ctx: &mut HandlerContext) -> Result<()> {
    approval_status(ctx, AccountStatus::Normal)
}

fn approval_status(ctx: &mut HandlerContext, status: AccountStatus) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::ACCOUNT) {
        debug!("Skipping {}: account cell not at current version", ctx.action);
        return Ok(());
    }
    let cell = witness::decode_account_cell(ctx.tx, CellSlot::New)?;
    ctx.store
        .update_account_status(&cell.id, status)
        .with_context(|| format!("Failed to update approval status of {}", cell.name))
}

/// Fulfill a sealed approval: ownership moves to the approval's target
/// lock and the account returns to normal. The approval rides on the
/// consumed cell, so the old slot carries the authoritative target.
pub fn fulfill_approval(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::ACCOUNT) {
        debug!("Skipping {}: account cell not at current version", ctx.action);
        return Ok(());
    }
    let cell = witness::decode_account_cell(ctx.tx, CellSlot::Old)?;
    let approval = cell
        .approval
        .as_ref()
        .ok_or_else(|| IndexError::decode("fulfilled account cell carries no approval"))?;
    ctx.store
        .update_account_owner(&cell.id, &approval.target)
        .with_context(|| format!("Failed to transfer ownership of {}", cell.name))?;
    ctx.store
        .update_account_manager(&cell.id, &approval.target)
        .with_context(|| format!("Failed to transfer management of {}", cell.name))?;
    ctx.store
        .update_account_status(&cell.id, AccountStatus::Normal)
        .with_context(|| format!("Failed to clear approval status of {}", cell.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AddressInfo, CellRef};
    use crate::registry::{ContractRegistry, ContractVersion};
    use crate::store::{ProjectionStore, RocksProjectionStore};
    use crate::types::{CellOutput, Script, Transaction};
    use crate::witness::{builder, AccountCell, ApprovalInfo, CellKind, RecordEntry};
    use alloy_primitives::B256;
    use tempfile::TempDir;

    const ACCOUNT_TYPE_ID: B256 = B256::repeat_byte(0x42);

    fn test_store() -> (RocksProjectionStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = RocksProjectionStore::open(tmp.path()).unwrap();
        (store, tmp)
    }

    fn test_registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.track(
            contracts::ACCOUNT,
            ContractVersion {
                type_id: ACCOUNT_TYPE_ID,
                major: 1,
                minor: 0,
            },
        );
        registry
    }

    fn test_address(byte: u8) -> AddressInfo {
        AddressInfo {
            chain_type: 1,
            alg_id: 5,
            sub_alg_id: 0,
            payload: vec![byte; 20],
        }
    }

    fn test_cell(name: &str) -> AccountCell {
        AccountCell {
            index: 0,
            version: 1,
            id: account_id_from_name(name),
            next: account_id_from_name("zzz.bit"),
            name: name.to_string(),
            status: AccountStatus::Normal,
            registered_at: 1_600_000_000,
            expired_at: 1_700_000_000,
            owner: test_address(0xaa),
            manager: test_address(0xbb),
            records: vec![RecordEntry {
                record_type: "address".to_string(),
                key: "eth".to_string(),
                label: String::new(),
                value: "0x1234".to_string(),
                ttl: 300,
            }],
            enable_sub_accounts: false,
            renew_sub_account_price: 0,
            nonce: 1,
            parent_id: None,
            edit_key: None,
            approval: None,
        }
    }

    fn typed_output(type_id: B256) -> CellOutput {
        CellOutput {
            capacity: 20_000_000_000,
            lock: Script {
                code_hash: B256::repeat_byte(0xee),
                hash_type: "type".to_string(),
                args: vec![],
            },
            type_script: Some(Script {
                code_hash: type_id,
                hash_type: "type".to_string(),
                args: vec![],
            }),
        }
    }

    fn tx_with(type_id: B256, witnesses: Vec<Vec<u8>>) -> Transaction {
        Transaction {
            hash: B256::repeat_byte(0x99),
            inputs: vec![],
            outputs: vec![typed_output(type_id)],
            outputs_data: vec![vec![]],
            witnesses,
        }
    }

    fn run<F>(store: &RocksProjectionStore, tx: &Transaction, action: &str, handler: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut HandlerContext) -> anyhow::Result<()>,
    {
        let mut registry = test_registry();
        let mut ctx = HandlerContext {
            store,
            registry: &mut registry,
            tx,
            tx_hash: tx.hash,
            block_number: 100,
            timestamp: 1_650_000_000,
            action,
        };
        handler(&mut ctx)
    }

    fn account_witness(cell: &AccountCell, slot: CellSlot) -> Vec<u8> {
        builder::cell_witness(slot, CellKind::Account, 1, cell.index, &cell.encode_entity())
    }

    #[test]
    fn test_update_account_replaces_row_and_records() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx, "transfer_account", update_account).unwrap();

        let account = store.get_account(&cell.id).unwrap().unwrap();
        assert_eq!(account.name, "alice.bit");
        assert_eq!(account.outpoint, CellRef::new(tx.hash, 0));
        assert_eq!(store.get_records(&cell.id).unwrap().len(), 1);

        // a later edit with a smaller record set leaves no leftovers
        let mut edited = cell.clone();
        edited.records.clear();
        edited.nonce = 2;
        let tx2 = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&edited, CellSlot::New)],
        );
        run(&store, &tx2, "edit_records", update_account).unwrap();
        assert!(store.get_records(&cell.id).unwrap().is_empty());
        assert_eq!(store.get_account(&cell.id).unwrap().unwrap().nonce, 2);
    }

    #[test]
    fn test_version_guard_no_op() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        // stale type id: the witness decodes fine but must never be read
        let tx = tx_with(
            B256::repeat_byte(0x43),
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx, "transfer_account", update_account).unwrap();
        assert!(store.get_account(&cell.id).unwrap().is_none());
    }

    #[test]
    fn test_refresh_account_tolerates_missing_cell() {
        let (store, _tmp) = test_store();
        let tx = tx_with(ACCOUNT_TYPE_ID, vec![builder::action_witness("some_new_action")]);
        run(&store, &tx, "some_new_action", refresh_account).unwrap();

        let cell = test_cell("alice.bit");
        let tx2 = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx2, "some_new_action", refresh_account).unwrap();
        assert!(store.get_account(&cell.id).unwrap().is_some());
    }

    #[test]
    fn test_recycle_deletes_cascade() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx, "transfer_account", update_account).unwrap();

        let recycle_tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::Old)],
        );
        run(&store, &recycle_tx, "recycle_expired_account", recycle_expired_account).unwrap();
        assert!(store.get_account(&cell.id).unwrap().is_none());
        assert!(store.get_records(&cell.id).unwrap().is_empty());
    }

    #[test]
    fn test_confirm_proposal_record_policy() {
        let (store, _tmp) = test_store();
        let renewed = test_cell("alice.bit");
        let mut fresh = test_cell("bob.bit");
        fresh.index = 1;

        let proposal = crate::witness::ProposalCell {
            index: 0,
            version: 1,
            // only the renewed account carries its records over
            pre_account_ids: vec![renewed.id],
        };

        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![
                builder::cell_witness(
                    CellSlot::Old,
                    CellKind::Proposal,
                    1,
                    0,
                    &proposal.encode_entity(),
                ),
                account_witness(&renewed, CellSlot::New),
                account_witness(&fresh, CellSlot::New),
            ],
        );
        run(&store, &tx, "confirm_proposal", confirm_proposal).unwrap();

        assert!(store.get_account(&renewed.id).unwrap().is_some());
        assert!(store.get_account(&fresh.id).unwrap().is_some());
        assert_eq!(store.get_records(&renewed.id).unwrap().len(), 1);
        // freshly registered: record set untouched (empty)
        assert!(store.get_records(&fresh.id).unwrap().is_empty());
    }

    #[test]
    fn test_confirm_proposal_prefers_attached_did_records() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        let did = crate::witness::DidCell {
            index: 0,
            version: 1,
            account_id: cell.id,
            name: cell.name.clone(),
            expired_at: cell.expired_at,
            lock_args: vec![0x05; 21],
            records: vec![
                RecordEntry {
                    record_type: "profile".to_string(),
                    key: "avatar".to_string(),
                    label: String::new(),
                    value: "ipfs://x".to_string(),
                    ttl: 300,
                },
                RecordEntry {
                    record_type: "address".to_string(),
                    key: "eth".to_string(),
                    label: String::new(),
                    value: "0x9".to_string(),
                    ttl: 300,
                },
            ],
        };
        let proposal = crate::witness::ProposalCell {
            index: 0,
            version: 1,
            pre_account_ids: vec![cell.id],
        };
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![
                builder::cell_witness(
                    CellSlot::Old,
                    CellKind::Proposal,
                    1,
                    0,
                    &proposal.encode_entity(),
                ),
                builder::cell_witness(CellSlot::Dep, CellKind::Did, 1, 0, &did.encode_entity()),
                account_witness(&cell, CellSlot::New),
            ],
        );
        run(&store, &tx, "confirm_proposal", confirm_proposal).unwrap();
        // DID record set wins over the cell's own single record
        assert_eq!(store.get_records(&cell.id).unwrap().len(), 2);
    }

    #[test]
    fn test_auction_bid_recomputes_id() {
        let (store, _tmp) = test_store();
        let mut cell = test_cell("alice.bit");
        // corrupt the carried id; the handler must not trust it
        cell.id = account_id_from_name("mallory.bit");
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx, "bid_expired_account_auction", bid_expired_account_auction).unwrap();

        let derived = account_id_from_name("alice.bit");
        assert!(store.get_account(&derived).unwrap().is_some());
        assert!(store
            .get_account(&account_id_from_name("mallory.bit"))
            .unwrap()
            .is_none());
        assert_eq!(store.get_records(&derived).unwrap().len(), 1);
    }

    #[test]
    fn test_approval_state_machine() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx, "transfer_account", update_account).unwrap();

        // create seals the approval
        let mut sealed = cell.clone();
        sealed.status = AccountStatus::Approval;
        sealed.approval = Some(ApprovalInfo {
            action: "transfer".to_string(),
            target: test_address(0xcc),
            protected_until: 1_660_000_000,
        });
        let create_tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&sealed, CellSlot::New)],
        );
        run(&store, &create_tx, "create_approval", create_approval).unwrap();
        let row = store.get_account(&cell.id).unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Approval);
        // only status moved
        assert_eq!(row.owner, cell.owner);

        // revoke returns to normal without touching ownership
        let revoke_tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&sealed, CellSlot::New)],
        );
        run(&store, &revoke_tx, "revoke_approval", revoke_approval).unwrap();
        let row = store.get_account(&cell.id).unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Normal);
        assert_eq!(row.owner, cell.owner);

        // re-create, then fulfill hands the account to the target lock
        run(&store, &create_tx, "create_approval", create_approval).unwrap();
        let fulfill_tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&sealed, CellSlot::Old)],
        );
        run(&store, &fulfill_tx, "fulfill_approval", fulfill_approval).unwrap();
        let row = store.get_account(&cell.id).unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Normal);
        assert_eq!(row.owner, test_address(0xcc));
        assert_eq!(row.manager, test_address(0xcc));
        // the rest of the row was never rewritten
        assert_eq!(row.expired_at, cell.expired_at);
    }

    #[test]
    fn test_fulfill_without_approval_is_a_decode_error() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::Old)],
        );
        let err = run(&store, &tx, "fulfill_approval", fulfill_approval).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Decode(_))
        ));
    }

    #[test]
    fn test_idempotent_replay() {
        let (store, _tmp) = test_store();
        let cell = test_cell("alice.bit");
        let tx = tx_with(
            ACCOUNT_TYPE_ID,
            vec![account_witness(&cell, CellSlot::New)],
        );
        run(&store, &tx, "transfer_account", update_account).unwrap();
        let first_row = store.get_account(&cell.id).unwrap().unwrap();
        let first_records = store.get_records(&cell.id).unwrap();

        run(&store, &tx, "transfer_account", update_account).unwrap();
        assert_eq!(store.get_account(&cell.id).unwrap().unwrap(), first_row);
        assert_eq!(store.get_records(&cell.id).unwrap(), first_records);
    }
}
