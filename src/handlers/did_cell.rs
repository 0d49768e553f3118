//! DID-cell handlers
//!
//! Maintains the upgraded-ownership projection: rows keyed by outpoint
//! that shadow an account while its ownership lives in a DID cell.
//! Record rows are rewritten only when the record-content hash of the old
//! and new cells differs.

use super::{record_rows, HandlerContext};
use crate::errors::IndexError;
use crate::records::DidCellInfo;
use crate::registry::contracts;
use crate::witness::{self, CellSlot, DidCell};
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::debug;

fn did_info(cell: &DidCell, outpoint: crate::records::CellRef) -> DidCellInfo {
    DidCellInfo {
        outpoint,
        account_id: cell.account_id,
        name: cell.name.clone(),
        expired_at: cell.expired_at,
        lock_args: cell.lock_args.clone(),
        records_hash: cell.records_hash(),
    }
}

/// Move a single DID cell from its old outpoint to its new one, rewriting
/// record rows only when the record content actually changed.
fn roll_did_cell(ctx: &mut HandlerContext) -> Result<()> {
    let old = witness::decode_did_cell(ctx.tx, CellSlot::Old)?;
    let new = witness::decode_did_cell(ctx.tx, CellSlot::New)?;
    if old.account_id != new.account_id {
        return Err(IndexError::decode("did cell pair disagrees on account id"));
    }
    let old_outpoint = ctx.input_ref(old.index)?;
    ctx.store
        .delete_did_cell(&old_outpoint)
        .with_context(|| format!("Failed to drop old did cell of {}", new.name))?;
    ctx.store
        .upsert_did_cell(&did_info(&new, ctx.output_ref(new.index)))
        .with_context(|| format!("Failed to project did cell of {}", new.name))?;
    if old.records_hash() != new.records_hash() {
        debug!("Record set of {} changed, rewriting rows", new.name);
        ctx.store
            .replace_records(&new.account_id, &record_rows(&new.account_id, &new.records))
            .with_context(|| format!("Failed to rewrite records of {}", new.name))?;
    }
    Ok(())
}

/// Edit a DID cell's data in place (new outpoint, possibly new records).
pub fn edit_did_cell(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::DID) {
        debug!("Skipping {}: did cell not at current version", ctx.action);
        return Ok(());
    }
    roll_did_cell(ctx)
}

/// Transfer a DID cell to a new holder. Same roll as an edit; the lock
/// args change, the record hash usually does not.
pub fn transfer_did_cell(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::DID) {
        debug!("Skipping {}: did cell not at current version", ctx.action);
        return Ok(());
    }
    roll_did_cell(ctx)
}

/// Recycle an expired DID cell: the projection row and the account it
/// shadowed both go away.
///
/// Not version-guarded: the transaction only consumes the cell, and rows
/// projected under an older contract version still have to go.
pub fn recycle_did_cell(ctx: &mut HandlerContext) -> Result<()> {
    let old = witness::decode_did_cell(ctx.tx, CellSlot::Old)?;
    recycle_one(ctx, &old)
}

fn recycle_one(ctx: &mut HandlerContext, old: &DidCell) -> Result<()> {
    let outpoint = ctx.input_ref(old.index)?;
    debug!(
        "Recycling did cell of {} at block {}",
        old.name, ctx.block_number
    );
    ctx.store
        .delete_did_cell(&outpoint)
        .with_context(|| format!("Failed to drop did cell of {}", old.name))?;
    ctx.store
        .delete_account_cascade(&old.account_id)
        .with_context(|| format!("Failed to drop upgraded account {}", old.name))
}

/// Batch variant: pair old and new DID cells by account id and roll each
/// pair. A new cell without an old counterpart is a fresh upgrade and is
/// projected with its records; an old cell left unpaired means the witness
/// map is inconsistent.
pub fn update_did_cell_list(ctx: &mut HandlerContext) -> Result<()> {
    if !ctx.registry.is_current_version(ctx.tx, contracts::DID) {
        debug!("Skipping {}: did cell not at current version", ctx.action);
        return Ok(());
    }
    let mut old_by_account: HashMap<_, _> = witness::decode_did_cells(ctx.tx, CellSlot::Old)?
        .into_iter()
        .map(|cell| (cell.account_id, cell))
        .collect();

    for new in witness::decode_did_cells(ctx.tx, CellSlot::New)? {
        match old_by_account.remove(&new.account_id) {
            Some(old) => {
                let old_outpoint = ctx.input_ref(old.index)?;
                ctx.store
                    .delete_did_cell(&old_outpoint)
                    .with_context(|| format!("Failed to drop old did cell of {}", new.name))?;
                ctx.store
                    .upsert_did_cell(&did_info(&new, ctx.output_ref(new.index)))
                    .with_context(|| format!("Failed to project did cell of {}", new.name))?;
                if old.records_hash() != new.records_hash() {
                    ctx.store
                        .replace_records(
                            &new.account_id,
                            &record_rows(&new.account_id, &new.records),
                        )
                        .with_context(|| format!("Failed to rewrite records of {}", new.name))?;
                }
            }
            None => {
                ctx.store
                    .upsert_did_cell(&did_info(&new, ctx.output_ref(new.index)))
                    .with_context(|| format!("Failed to project did cell of {}", new.name))?;
                ctx.store
                    .replace_records(
                        &new.account_id,
                        &record_rows(&new.account_id, &new.records),
                    )
                    .with_context(|| format!("Failed to project records of {}", new.name))?;
            }
        }
    }
    if let Some(orphan) = old_by_account.into_values().next() {
        return Err(IndexError::decode(format!(
            "did update list leaves old cell of {} unpaired",
            orphan.name
        )));
    }
    Ok(())
}

/// Batch recycle: every old DID cell in the witness map is dropped along
/// with the account it shadowed. Unguarded like the single recycle.
pub fn recycle_did_cell_list(ctx: &mut HandlerContext) -> Result<()> {
    for old in witness::decode_did_cells(ctx.tx, CellSlot::Old)? {
        recycle_one(ctx, &old)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{account_id_from_name, CellRef};
    use crate::registry::{ContractRegistry, ContractVersion};
    use crate::store::{ProjectionStore, RocksProjectionStore};
    use crate::types::{CellInput, CellOutput, OutPoint, Script, Transaction};
    use crate::witness::{builder, CellKind, RecordEntry};
    use alloy_primitives::B256;
    use tempfile::TempDir;

    const DID_TYPE_ID: B256 = B256::repeat_byte(0x51);

    fn test_store() -> (RocksProjectionStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = RocksProjectionStore::open(tmp.path()).unwrap();
        (store, tmp)
    }

    fn test_registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.track(
            contracts::DID,
            ContractVersion {
                type_id: DID_TYPE_ID,
                major: 1,
                minor: 0,
            },
        );
        registry
    }

    fn did(name: &str, index: u32, lock_byte: u8, records: Vec<RecordEntry>) -> DidCell {
        DidCell {
            index,
            version: 1,
            account_id: account_id_from_name(name),
            name: name.to_string(),
            expired_at: 1_700_000_000,
            lock_args: vec![lock_byte; 21],
            records,
        }
    }

    fn record(key: &str) -> RecordEntry {
        RecordEntry {
            record_type: "address".to_string(),
            key: key.to_string(),
            label: String::new(),
            value: format!("value-{}", key),
            ttl: 300,
        }
    }

    fn did_witness(cell: &DidCell, slot: CellSlot) -> Vec<u8> {
        builder::cell_witness(slot, CellKind::Did, 1, cell.index, &cell.encode_entity())
    }

    fn tx_with(tx_byte: u8, inputs: Vec<OutPoint>, witnesses: Vec<Vec<u8>>) -> Transaction {
        Transaction {
            hash: B256::repeat_byte(tx_byte),
            inputs: inputs
                .into_iter()
                .map(|previous_output| CellInput { previous_output })
                .collect(),
            outputs: vec![CellOutput {
                capacity: 1_000,
                lock: Script {
                    code_hash: B256::repeat_byte(0xee),
                    hash_type: "type".to_string(),
                    args: vec![],
                },
                type_script: Some(Script {
                    code_hash: DID_TYPE_ID,
                    hash_type: "type".to_string(),
                    args: vec![],
                }),
            }],
            outputs_data: vec![vec![]],
            witnesses,
        }
    }

    fn outpoint(tx_byte: u8, index: u32) -> OutPoint {
        OutPoint {
            tx_hash: B256::repeat_byte(tx_byte),
            index,
        }
    }

    fn run<F>(store: &RocksProjectionStore, tx: &Transaction, handler: F) -> anyhow::Result<()>
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
            action: "test",
        };
        handler(&mut ctx)
    }

    fn seed_did(store: &RocksProjectionStore, cell: &DidCell, outpoint: CellRef) {
        store.upsert_did_cell(&did_info(cell, outpoint)).unwrap();
    }

    #[test]
    fn test_transfer_rolls_outpoint_without_touching_records() {
        let (store, _tmp) = test_store();
        let old = did("alice.bit", 0, 0x05, vec![record("eth")]);
        seed_did(&store, &old, CellRef::new(B256::repeat_byte(0x10), 0));
        // seed the account's records as the old cell left them
        store
            .replace_records(
                &old.account_id,
                &record_rows(&old.account_id, &old.records),
            )
            .unwrap();

        // same records, new lock
        let new = did("alice.bit", 0, 0x06, vec![record("eth")]);
        let tx = tx_with(
            0x20,
            vec![outpoint(0x10, 0)],
            vec![
                did_witness(&old, CellSlot::Old),
                did_witness(&new, CellSlot::New),
            ],
        );
        run(&store, &tx, transfer_did_cell).unwrap();

        assert!(store
            .get_did_cell(&CellRef::new(B256::repeat_byte(0x10), 0))
            .unwrap()
            .is_none());
        let row = store
            .get_did_cell(&CellRef::new(B256::repeat_byte(0x20), 0))
            .unwrap()
            .unwrap();
        assert_eq!(row.lock_args, vec![0x06; 21]);
        // record rows untouched (same content hash)
        assert_eq!(store.get_records(&old.account_id).unwrap().len(), 1);
    }

    #[test]
    fn test_edit_rewrites_records_when_hash_changes() {
        let (store, _tmp) = test_store();
        let old = did("alice.bit", 0, 0x05, vec![record("eth")]);
        seed_did(&store, &old, CellRef::new(B256::repeat_byte(0x10), 0));

        let new = did("alice.bit", 0, 0x05, vec![record("eth"), record("btc")]);
        let tx = tx_with(
            0x20,
            vec![outpoint(0x10, 0)],
            vec![
                did_witness(&old, CellSlot::Old),
                did_witness(&new, CellSlot::New),
            ],
        );
        run(&store, &tx, edit_did_cell).unwrap();
        assert_eq!(store.get_records(&old.account_id).unwrap().len(), 2);
    }

    #[test]
    fn test_mismatched_pair_is_a_decode_error() {
        let (store, _tmp) = test_store();
        let old = did("alice.bit", 0, 0x05, vec![]);
        let new = did("bob.bit", 0, 0x05, vec![]);
        let tx = tx_with(
            0x20,
            vec![outpoint(0x10, 0)],
            vec![
                did_witness(&old, CellSlot::Old),
                did_witness(&new, CellSlot::New),
            ],
        );
        let err = run(&store, &tx, edit_did_cell).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Decode(_))
        ));
    }

    #[test]
    fn test_recycle_drops_cell_and_account() {
        let (store, _tmp) = test_store();
        let old = did("alice.bit", 0, 0x05, vec![record("eth")]);
        seed_did(&store, &old, CellRef::new(B256::repeat_byte(0x10), 0));
        store
            .replace_records(
                &old.account_id,
                &record_rows(&old.account_id, &old.records),
            )
            .unwrap();

        let tx = tx_with(
            0x20,
            vec![outpoint(0x10, 0)],
            vec![did_witness(&old, CellSlot::Old)],
        );
        run(&store, &tx, recycle_did_cell).unwrap();
        assert!(store
            .get_did_cell(&CellRef::new(B256::repeat_byte(0x10), 0))
            .unwrap()
            .is_none());
        assert!(store.get_records(&old.account_id).unwrap().is_empty());
    }

    #[test]
    fn test_update_list_pairs_by_account() {
        let (store, _tmp) = test_store();
        let old_a = did("alice.bit", 0, 0x05, vec![record("eth")]);
        let old_b = did("bob.bit", 1, 0x05, vec![]);
        seed_did(&store, &old_a, CellRef::new(B256::repeat_byte(0x10), 0));
        seed_did(&store, &old_b, CellRef::new(B256::repeat_byte(0x10), 1));

        let new_a = did("alice.bit", 0, 0x06, vec![record("eth"), record("btc")]);
        let new_b = did("bob.bit", 1, 0x07, vec![]);
        // a third account upgrades fresh, no old counterpart
        let new_c = did("carol.bit", 2, 0x08, vec![record("doge")]);

        let tx = tx_with(
            0x20,
            vec![outpoint(0x10, 0), outpoint(0x10, 1)],
            vec![
                did_witness(&old_a, CellSlot::Old),
                did_witness(&old_b, CellSlot::Old),
                did_witness(&new_a, CellSlot::New),
                did_witness(&new_b, CellSlot::New),
                did_witness(&new_c, CellSlot::New),
            ],
        );
        run(&store, &tx, update_did_cell_list).unwrap();

        assert_eq!(store.get_records(&new_a.account_id).unwrap().len(), 2);
        assert!(store.get_records(&new_b.account_id).unwrap().is_empty());
        assert_eq!(store.get_records(&new_c.account_id).unwrap().len(), 1);
        for (index, byte) in [(0u32, 0x06u8), (1, 0x07), (2, 0x08)] {
            let row = store
                .get_did_cell(&CellRef::new(B256::repeat_byte(0x20), index))
                .unwrap()
                .unwrap();
            assert_eq!(row.lock_args, vec![byte; 21]);
        }
    }

    #[test]
    fn test_recycle_list() {
        let (store, _tmp) = test_store();
        let old_a = did("alice.bit", 0, 0x05, vec![]);
        let old_b = did("bob.bit", 1, 0x05, vec![]);
        seed_did(&store, &old_a, CellRef::new(B256::repeat_byte(0x10), 0));
        seed_did(&store, &old_b, CellRef::new(B256::repeat_byte(0x10), 1));

        let tx = tx_with(
            0x20,
            vec![outpoint(0x10, 0), outpoint(0x10, 1)],
            vec![
                did_witness(&old_a, CellSlot::Old),
                did_witness(&old_b, CellSlot::Old),
            ],
        );
        run(&store, &tx, recycle_did_cell_list).unwrap();
        for index in 0..2u32 {
            assert!(store
                .get_did_cell(&CellRef::new(B256::repeat_byte(0x10), index))
                .unwrap()
                .is_none());
        }
    }
}
