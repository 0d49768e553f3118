//! ProjectionStore trait and RocksDB implementation
//!
//! Persists the relational read model the handlers project on-chain cells
//! into. Uses RocksDB with column families for efficient organization.
//!
//! Every operation is an upsert or a replace-set so reprocessing a block
//! after a crash between handler writes and cursor advancement converges to
//! the same projection (idempotence, not exactly-once). Multi-row operations
//! go through a single `WriteBatch`.

use crate::keys::{
    decode_block_key, decode_parent_index_key, encode_account_key, encode_block_key,
    encode_did_key, encode_meta_key, encode_parent_index_key, encode_record_key,
    encode_reverse_index_key, encode_reverse_key, encode_sub_account_key, parent_index_prefix,
    record_key_prefix,
};
use crate::records::{
    AccountId, AccountRecord, AccountStatus, AddressInfo, CellRef, CursorRecord, DidCellInfo,
    RecordRow, ReverseRecord,
};
use alloy_primitives::B256;
use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::path::Path;

/// One entry of a batched reverse-root replace: whatever currently maps
/// the address is deleted, then `insert` (if any) becomes the live row.
#[derive(Debug, Clone)]
pub struct ReverseReplace {
    pub alg_id: u8,
    pub address: Vec<u8>,
    pub insert: Option<ReverseRecord>,
}

/// Trait defining the storage port the handlers and the scheduler write
/// through. All methods must stay safe to retry.
pub trait ProjectionStore {
    // accounts

    /// Get an account row by id.
    fn get_account(&self, id: &AccountId) -> Result<Option<AccountRecord>>;

    /// Upsert an account row, leaving its records untouched.
    fn upsert_account(&self, account: &AccountRecord) -> Result<()>;

    /// Upsert an account row and replace its full record set atomically.
    fn upsert_account_with_records(
        &self,
        account: &AccountRecord,
        records: &[RecordRow],
    ) -> Result<()>;

    /// Upsert many accounts in one batch. A `Some` record list replaces
    /// that account's records; `None` leaves them untouched.
    fn batch_upsert_accounts(
        &self,
        items: &[(AccountRecord, Option<Vec<RecordRow>>)],
    ) -> Result<()>;

    /// Delete an account, its records, and its sub-accounts (with their
    /// records) in one batch.
    fn delete_account_cascade(&self, id: &AccountId) -> Result<()>;

    /// Field-scoped update: owner address. No-op when the row is absent.
    fn update_account_owner(&self, id: &AccountId, owner: &AddressInfo) -> Result<()>;

    /// Field-scoped update: manager address. No-op when the row is absent.
    fn update_account_manager(&self, id: &AccountId, manager: &AddressInfo) -> Result<()>;

    /// Field-scoped update: status. No-op when the row is absent.
    fn update_account_status(&self, id: &AccountId, status: AccountStatus) -> Result<()>;

    // records

    /// Replace the full record set of an account (top-level or sub-account).
    fn replace_records(&self, id: &AccountId, records: &[RecordRow]) -> Result<()>;

    /// Get the record set of an account, in insertion order.
    fn get_records(&self, id: &AccountId) -> Result<Vec<RecordRow>>;

    // sub-accounts

    /// Get a sub-account row by id.
    fn get_sub_account(&self, id: &AccountId) -> Result<Option<AccountRecord>>;

    /// Upsert a batch of sub-account rows, maintaining the parent index.
    fn upsert_sub_accounts(&self, subs: &[AccountRecord]) -> Result<()>;

    /// List the sub-accounts of a parent account.
    fn sub_accounts_of(&self, parent: &AccountId) -> Result<Vec<AccountRecord>>;

    /// Delete a sub-account row and its records.
    fn delete_sub_account(&self, id: &AccountId) -> Result<()>;

    /// Field-scoped update: sub-account owner. No-op when the row is absent.
    fn update_sub_account_owner(&self, id: &AccountId, owner: &AddressInfo) -> Result<()>;

    /// Field-scoped update: sub-account manager. No-op when the row is absent.
    fn update_sub_account_manager(&self, id: &AccountId, manager: &AddressInfo) -> Result<()>;

    /// Field-scoped update: sub-account expiry. No-op when the row is absent.
    fn update_sub_account_expiry(&self, id: &AccountId, expired_at: u64) -> Result<()>;

    // reverse records

    /// Insert or overwrite a reverse record, updating the address index.
    fn put_reverse_record(&self, record: &ReverseRecord) -> Result<()>;

    /// Get a reverse record by outpoint.
    fn get_reverse(&self, out: &CellRef) -> Result<Option<ReverseRecord>>;

    /// Find the live reverse record for an address, if any.
    fn reverse_by_address(&self, alg_id: u8, address: &[u8]) -> Result<Option<ReverseRecord>>;

    /// Delete reverse records by consumed outpoints. Missing rows are
    /// skipped.
    fn delete_reverse_by_outpoints(&self, outs: &[CellRef]) -> Result<()>;

    /// Apply a batched reverse-root update in one transaction: per entry,
    /// delete the live row for the address, then conditionally re-insert.
    fn replace_reverse_set(&self, entries: &[ReverseReplace]) -> Result<()>;

    // DID cells

    /// Upsert a DID cell projection keyed by outpoint.
    fn upsert_did_cell(&self, info: &DidCellInfo) -> Result<()>;

    /// Get a DID cell projection by outpoint.
    fn get_did_cell(&self, out: &CellRef) -> Result<Option<DidCellInfo>>;

    /// Delete a DID cell projection by outpoint.
    fn delete_did_cell(&self, out: &CellRef) -> Result<()>;

    // cursor / block window

    /// Record a processed block in the rolling window and advance the
    /// cursor to it.
    fn record_block(&self, cursor: &CursorRecord) -> Result<()>;

    /// The latest processed block, i.e. the ingestion cursor.
    fn latest_block(&self) -> Result<Option<CursorRecord>>;

    /// Hash of the processed block at the given height, if still in the
    /// window.
    fn block_hash_at(&self, number: u64) -> Result<Option<B256>>;

    /// Drop window rows older than the given height.
    fn prune_blocks_below(&self, number: u64) -> Result<()>;

    /// Roll the cursor back to the given height, dropping younger window
    /// rows.
    fn rollback_to(&self, number: u64) -> Result<()>;
}

const CF_ACCOUNTS: &str = "accounts";
const CF_SUB_ACCOUNTS: &str = "sub_accounts";
const CF_SUB_ACCOUNT_INDEX: &str = "sub_account_index";
const CF_RECORDS: &str = "records";
const CF_REVERSE: &str = "reverse_records";
const CF_REVERSE_INDEX: &str = "reverse_index";
const CF_DID_CELLS: &str = "did_cells";
const CF_BLOCKS: &str = "blocks";
const CF_META: &str = "meta";

const META_CURSOR: u8 = 0x01;

/// RocksDB-backed implementation of [`ProjectionStore`].
pub struct RocksProjectionStore {
    db: DB,
}

impl RocksProjectionStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all required column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let column_families = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SUB_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SUB_ACCOUNT_INDEX, Options::default()),
            ColumnFamilyDescriptor::new(CF_RECORDS, Options::default()),
            ColumnFamilyDescriptor::new(CF_REVERSE, Options::default()),
            ColumnFamilyDescriptor::new(CF_REVERSE_INDEX, Options::default()),
            ColumnFamilyDescriptor::new(CF_DID_CELLS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, column_families)
            .context("Failed to open RocksDB database")?;

        Ok(Self { db })
    }

    /// Get a column family handle by name.
    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("Column family '{}' not found", name))
    }

    fn get_row<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
        what: &str,
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self
            .db
            .get_cf(cf, key)
            .with_context(|| format!("Failed to get {}", what))?
        {
            Some(bytes) => {
                let row = postcard::from_bytes(&bytes)
                    .with_context(|| format!("Failed to deserialize {}", what))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn batch_put_row<T: serde::Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        row: &T,
        what: &str,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value =
            postcard::to_allocvec(row).with_context(|| format!("Failed to serialize {}", what))?;
        batch.put_cf(cf, key, value);
        Ok(())
    }

    /// Collect every key under a prefix in a column family.
    fn keys_with_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let iter = self.db.iterator_cf(
            cf,
            rocksdb::IteratorMode::From(prefix, rocksdb::Direction::Forward),
        );
        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item.context("Failed to read iterator")?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn batch_replace_records(
        &self,
        batch: &mut WriteBatch,
        id: &AccountId,
        records: &[RecordRow],
    ) -> Result<()> {
        let cf = self.cf(CF_RECORDS)?;
        for key in self.keys_with_prefix(CF_RECORDS, &record_key_prefix(id))? {
            batch.delete_cf(cf, key);
        }
        for (seq, record) in records.iter().enumerate() {
            self.batch_put_row(
                batch,
                CF_RECORDS,
                &encode_record_key(id, seq as u32),
                record,
                "record",
            )?;
        }
        Ok(())
    }

    fn batch_delete_reverse(&self, batch: &mut WriteBatch, out: &CellRef) -> Result<()> {
        let key = encode_reverse_key(out);
        if let Some(record) = self.get_row::<ReverseRecord>(CF_REVERSE, &key, "reverse record")? {
            let index_key = encode_reverse_index_key(record.alg_id, &record.address);
            let index_cf = self.cf(CF_REVERSE_INDEX)?;
            // only clear the index if it still points at this row
            if let Some(live) = self
                .db
                .get_cf(index_cf, &index_key)
                .context("Failed to get reverse index")?
            {
                if live.as_slice() == key.as_slice() {
                    batch.delete_cf(index_cf, index_key);
                }
            }
            batch.delete_cf(self.cf(CF_REVERSE)?, key);
        }
        Ok(())
    }

    fn batch_put_reverse(&self, batch: &mut WriteBatch, record: &ReverseRecord) -> Result<()> {
        let key = encode_reverse_key(&record.outpoint);
        self.batch_put_row(batch, CF_REVERSE, &key, record, "reverse record")?;
        let index_cf = self.cf(CF_REVERSE_INDEX)?;
        batch.put_cf(
            index_cf,
            encode_reverse_index_key(record.alg_id, &record.address),
            key,
        );
        Ok(())
    }

    fn update_account_row<F>(&self, id: &AccountId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let key = encode_account_key(id);
        if let Some(mut account) = self.get_row::<AccountRecord>(CF_ACCOUNTS, &key, "account")? {
            mutate(&mut account);
            let mut batch = WriteBatch::default();
            self.batch_put_row(&mut batch, CF_ACCOUNTS, &key, &account, "account")?;
            self.db.write(batch).context("Failed to update account")?;
        }
        Ok(())
    }

    fn update_sub_account_row<F>(&self, id: &AccountId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let key = encode_sub_account_key(id);
        if let Some(mut sub) = self.get_row::<AccountRecord>(CF_SUB_ACCOUNTS, &key, "sub-account")?
        {
            mutate(&mut sub);
            let mut batch = WriteBatch::default();
            self.batch_put_row(&mut batch, CF_SUB_ACCOUNTS, &key, &sub, "sub-account")?;
            self.db
                .write(batch)
                .context("Failed to update sub-account")?;
        }
        Ok(())
    }
}

impl ProjectionStore for RocksProjectionStore {
    fn get_account(&self, id: &AccountId) -> Result<Option<AccountRecord>> {
        self.get_row(CF_ACCOUNTS, &encode_account_key(id), "account")
    }

    fn upsert_account(&self, account: &AccountRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_row(
            &mut batch,
            CF_ACCOUNTS,
            &encode_account_key(&account.id),
            account,
            "account",
        )?;
        self.db.write(batch).context("Failed to upsert account")
    }

    fn upsert_account_with_records(
        &self,
        account: &AccountRecord,
        records: &[RecordRow],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_row(
            &mut batch,
            CF_ACCOUNTS,
            &encode_account_key(&account.id),
            account,
            "account",
        )?;
        self.batch_replace_records(&mut batch, &account.id, records)?;
        self.db
            .write(batch)
            .context("Failed to upsert account with records")
    }

    fn batch_upsert_accounts(
        &self,
        items: &[(AccountRecord, Option<Vec<RecordRow>>)],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (account, records) in items {
            self.batch_put_row(
                &mut batch,
                CF_ACCOUNTS,
                &encode_account_key(&account.id),
                account,
                "account",
            )?;
            if let Some(records) = records {
                self.batch_replace_records(&mut batch, &account.id, records)?;
            }
        }
        self.db
            .write(batch)
            .context("Failed to batch upsert accounts")
    }

    fn delete_account_cascade(&self, id: &AccountId) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_ACCOUNTS)?, encode_account_key(id));
        let records_cf = self.cf(CF_RECORDS)?;
        for key in self.keys_with_prefix(CF_RECORDS, &record_key_prefix(id))? {
            batch.delete_cf(records_cf, key);
        }
        // drop dependent sub-accounts and their records
        let index_cf = self.cf(CF_SUB_ACCOUNT_INDEX)?;
        let subs_cf = self.cf(CF_SUB_ACCOUNTS)?;
        for index_key in self.keys_with_prefix(CF_SUB_ACCOUNT_INDEX, &parent_index_prefix(id))? {
            if let Some(child) = decode_parent_index_key(&index_key) {
                batch.delete_cf(subs_cf, encode_sub_account_key(&child));
                for key in self.keys_with_prefix(CF_RECORDS, &record_key_prefix(&child))? {
                    batch.delete_cf(records_cf, key);
                }
            }
            batch.delete_cf(index_cf, index_key);
        }
        self.db
            .write(batch)
            .context("Failed to delete account cascade")
    }

    fn update_account_owner(&self, id: &AccountId, owner: &AddressInfo) -> Result<()> {
        self.update_account_row(id, |account| account.owner = owner.clone())
    }

    fn update_account_manager(&self, id: &AccountId, manager: &AddressInfo) -> Result<()> {
        self.update_account_row(id, |account| account.manager = manager.clone())
    }

    fn update_account_status(&self, id: &AccountId, status: AccountStatus) -> Result<()> {
        self.update_account_row(id, |account| account.status = status)
    }

    fn replace_records(&self, id: &AccountId, records: &[RecordRow]) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_replace_records(&mut batch, id, records)?;
        self.db.write(batch).context("Failed to replace records")
    }

    fn get_records(&self, id: &AccountId) -> Result<Vec<RecordRow>> {
        let cf = self.cf(CF_RECORDS)?;
        let prefix = record_key_prefix(id);
        let iter = self.db.iterator_cf(
            cf,
            rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );
        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.context("Failed to read iterator")?;
            if !key.starts_with(&prefix) {
                break;
            }
            let record: RecordRow =
                postcard::from_bytes(&value).context("Failed to deserialize record")?;
            records.push(record);
        }
        Ok(records)
    }

    fn get_sub_account(&self, id: &AccountId) -> Result<Option<AccountRecord>> {
        self.get_row(CF_SUB_ACCOUNTS, &encode_sub_account_key(id), "sub-account")
    }

    fn upsert_sub_accounts(&self, subs: &[AccountRecord]) -> Result<()> {
        let mut batch = WriteBatch::default();
        let index_cf = self.cf(CF_SUB_ACCOUNT_INDEX)?;
        for sub in subs {
            self.batch_put_row(
                &mut batch,
                CF_SUB_ACCOUNTS,
                &encode_sub_account_key(&sub.id),
                sub,
                "sub-account",
            )?;
            if let Some(parent) = &sub.parent_id {
                batch.put_cf(index_cf, encode_parent_index_key(parent, &sub.id), []);
            }
        }
        self.db
            .write(batch)
            .context("Failed to upsert sub-accounts")
    }

    fn sub_accounts_of(&self, parent: &AccountId) -> Result<Vec<AccountRecord>> {
        let mut subs = Vec::new();
        for index_key in
            self.keys_with_prefix(CF_SUB_ACCOUNT_INDEX, &parent_index_prefix(parent))?
        {
            if let Some(child) = decode_parent_index_key(&index_key) {
                if let Some(sub) = self.get_sub_account(&child)? {
                    subs.push(sub);
                }
            }
        }
        Ok(subs)
    }

    fn delete_sub_account(&self, id: &AccountId) -> Result<()> {
        let mut batch = WriteBatch::default();
        if let Some(sub) = self.get_sub_account(id)? {
            if let Some(parent) = &sub.parent_id {
                batch.delete_cf(
                    self.cf(CF_SUB_ACCOUNT_INDEX)?,
                    encode_parent_index_key(parent, id),
                );
            }
        }
        batch.delete_cf(self.cf(CF_SUB_ACCOUNTS)?, encode_sub_account_key(id));
        let records_cf = self.cf(CF_RECORDS)?;
        for key in self.keys_with_prefix(CF_RECORDS, &record_key_prefix(id))? {
            batch.delete_cf(records_cf, key);
        }
        self.db.write(batch).context("Failed to delete sub-account")
    }

    fn update_sub_account_owner(&self, id: &AccountId, owner: &AddressInfo) -> Result<()> {
        self.update_sub_account_row(id, |sub| sub.owner = owner.clone())
    }

    fn update_sub_account_manager(&self, id: &AccountId, manager: &AddressInfo) -> Result<()> {
        self.update_sub_account_row(id, |sub| sub.manager = manager.clone())
    }

    fn update_sub_account_expiry(&self, id: &AccountId, expired_at: u64) -> Result<()> {
        self.update_sub_account_row(id, |sub| sub.expired_at = expired_at)
    }

    fn put_reverse_record(&self, record: &ReverseRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_reverse(&mut batch, record)?;
        self.db
            .write(batch)
            .context("Failed to put reverse record")
    }

    fn get_reverse(&self, out: &CellRef) -> Result<Option<ReverseRecord>> {
        self.get_row(CF_REVERSE, &encode_reverse_key(out), "reverse record")
    }

    fn reverse_by_address(&self, alg_id: u8, address: &[u8]) -> Result<Option<ReverseRecord>> {
        let index_cf = self.cf(CF_REVERSE_INDEX)?;
        let row_key = match self
            .db
            .get_cf(index_cf, encode_reverse_index_key(alg_id, address))
            .context("Failed to get reverse index")?
        {
            Some(key) => key,
            None => return Ok(None),
        };
        self.get_row(CF_REVERSE, &row_key, "reverse record")
    }

    fn delete_reverse_by_outpoints(&self, outs: &[CellRef]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for out in outs {
            self.batch_delete_reverse(&mut batch, out)?;
        }
        self.db
            .write(batch)
            .context("Failed to delete reverse records")
    }

    fn replace_reverse_set(&self, entries: &[ReverseReplace]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for entry in entries {
            if let Some(live) = self.reverse_by_address(entry.alg_id, &entry.address)? {
                self.batch_delete_reverse(&mut batch, &live.outpoint)?;
            }
            if let Some(record) = &entry.insert {
                self.batch_put_reverse(&mut batch, record)?;
            }
        }
        self.db
            .write(batch)
            .context("Failed to replace reverse set")
    }

    fn upsert_did_cell(&self, info: &DidCellInfo) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_row(
            &mut batch,
            CF_DID_CELLS,
            &encode_did_key(&info.outpoint),
            info,
            "did cell",
        )?;
        self.db.write(batch).context("Failed to upsert did cell")
    }

    fn get_did_cell(&self, out: &CellRef) -> Result<Option<DidCellInfo>> {
        self.get_row(CF_DID_CELLS, &encode_did_key(out), "did cell")
    }

    fn delete_did_cell(&self, out: &CellRef) -> Result<()> {
        let cf = self.cf(CF_DID_CELLS)?;
        self.db
            .delete_cf(cf, encode_did_key(out))
            .context("Failed to delete did cell")
    }

    fn record_block(&self, cursor: &CursorRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_row(
            &mut batch,
            CF_BLOCKS,
            &encode_block_key(cursor.block_number),
            cursor,
            "block window row",
        )?;
        batch.put_cf(
            self.cf(CF_META)?,
            encode_meta_key(META_CURSOR),
            cursor.block_number.to_be_bytes(),
        );
        self.db.write(batch).context("Failed to record block")
    }

    fn latest_block(&self) -> Result<Option<CursorRecord>> {
        let meta_cf = self.cf(CF_META)?;
        let number = match self
            .db
            .get_cf(meta_cf, encode_meta_key(META_CURSOR))
            .context("Failed to get cursor")?
        {
            Some(bytes) => {
                if bytes.len() != 8 {
                    anyhow::bail!("Cursor must be 8 bytes (u64), got {}", bytes.len());
                }
                u64::from_be_bytes(bytes.as_slice().try_into().expect("8 bytes for u64"))
            }
            None => return Ok(None),
        };
        self.get_row(CF_BLOCKS, &encode_block_key(number), "block window row")
    }

    fn block_hash_at(&self, number: u64) -> Result<Option<B256>> {
        let row: Option<CursorRecord> =
            self.get_row(CF_BLOCKS, &encode_block_key(number), "block window row")?;
        Ok(row.map(|r| r.block_hash))
    }

    fn prune_blocks_below(&self, number: u64) -> Result<()> {
        let cf = self.cf(CF_BLOCKS)?;
        let iter = self.db.iterator_cf(cf, rocksdb::IteratorMode::Start);
        let mut batch = WriteBatch::default();
        for item in iter {
            let (key, _) = item.context("Failed to read iterator")?;
            match decode_block_key(&key) {
                Some(n) if n < number => batch.delete_cf(cf, key),
                _ => break,
            }
        }
        self.db.write(batch).context("Failed to prune block window")
    }

    fn rollback_to(&self, number: u64) -> Result<()> {
        let cf = self.cf(CF_BLOCKS)?;
        let start = encode_block_key(number.saturating_add(1));
        let iter = self.db.iterator_cf(
            cf,
            rocksdb::IteratorMode::From(&start, rocksdb::Direction::Forward),
        );
        let mut batch = WriteBatch::default();
        for item in iter {
            let (key, _) = item.context("Failed to read iterator")?;
            if decode_block_key(&key).is_none() {
                break;
            }
            batch.delete_cf(cf, key);
        }
        batch.put_cf(
            self.cf(CF_META)?,
            encode_meta_key(META_CURSOR),
            number.to_be_bytes(),
        );
        self.db.write(batch).context("Failed to roll back cursor")
    }
}
