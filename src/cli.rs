//! CLI implementation for nomenctl
//!
//! Provides a developer-friendly command-line interface for inspecting
//! the projection database. All commands output pretty JSON.

use crate::records::{
    account_id_from_name, account_id_hex, AccountId, AccountRecord, AddressInfo, CellRef,
    RecordRow,
};
use crate::store::{ProjectionStore, RocksProjectionStore};
use alloy_primitives::B256;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Projection database CLI tool
#[derive(Parser)]
#[command(name = "nomenctl")]
#[command(about = "Naming-system projection database CLI tool")]
pub struct Cli {
    /// Path to the RocksDB database directory
    #[arg(short, long, default_value = "./index_db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the ingestion cursor (latest processed block)
    Cursor,
    /// Show an account row and its records
    Account {
        /// Account name, or account id (40 hex chars, with or without 0x)
        account: String,
    },
    /// Show only the record set of an account
    Records {
        /// Account name, or account id (40 hex chars, with or without 0x)
        account: String,
    },
    /// List the sub-accounts of a parent account
    SubAccounts {
        /// Parent account name, or account id
        parent: String,
    },
    /// Show the live reverse record for an address
    Reverse {
        /// Signature algorithm id
        alg_id: u8,
        /// Address payload in hex (with or without 0x prefix)
        address: String,
    },
    /// Show a DID cell projection by outpoint
    DidCell {
        /// Transaction hash in hex (64 hex chars, with or without 0x prefix)
        tx_hash: String,
        /// Output index
        index: u32,
    },
}

/// Resolve an account argument: a 20-byte hex string is taken as an id,
/// anything else is hashed as a name.
fn parse_account(s: &str) -> Result<AccountId> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    if stripped.len() == 40 {
        if let Ok(bytes) = hex::decode(stripped) {
            return bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid account id: {}", s));
        }
    }
    Ok(account_id_from_name(s))
}

/// Parse a hex string into a 32-byte hash.
fn parse_hash(s: &str) -> Result<B256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).with_context(|| format!("Invalid hex hash: {}", s))?;
    if bytes.len() != 32 {
        anyhow::bail!("Hash must be 32 bytes (64 hex chars), got {} bytes", bytes.len());
    }
    Ok(B256::from_slice(&bytes))
}

fn address_json(address: &AddressInfo) -> Value {
    json!({
        "chain_type": address.chain_type,
        "alg_id": address.alg_id,
        "sub_alg_id": address.sub_alg_id,
        "payload": address.payload_hex(),
    })
}

fn account_json(account: &AccountRecord) -> Value {
    json!({
        "id": account_id_hex(&account.id),
        "name": account.name,
        "next": account_id_hex(&account.next),
        "owner": address_json(&account.owner),
        "manager": address_json(&account.manager),
        "status": format!("{:?}", account.status),
        "registered_at": account.registered_at,
        "expired_at": account.expired_at,
        "parent_id": account.parent_id.as_ref().map(account_id_hex),
        "enable_sub_accounts": account.enable_sub_accounts,
        "renew_sub_account_price": account.renew_sub_account_price,
        "nonce": account.nonce,
        "outpoint": account.outpoint.to_string(),
    })
}

fn record_json(record: &RecordRow) -> Value {
    json!({
        "type": record.record_type,
        "key": record.key,
        "label": record.label,
        "value": record.value,
        "ttl": record.ttl,
    })
}

/// Run the CLI command and print JSON output.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = RocksProjectionStore::open(&cli.db_path)
        .with_context(|| format!("Failed to open database at {:?}", cli.db_path))?;

    let result = match cli.command {
        Commands::Cursor => match store.latest_block()? {
            Some(cursor) => json!({
                "block_number": cursor.block_number,
                "block_hash": format!("0x{:x}", cursor.block_hash),
                "parent_hash": format!("0x{:x}", cursor.parent_hash),
            }),
            None => json!({ "block_number": null }),
        },
        Commands::Account { account } => {
            let id = parse_account(&account)?;
            // top-level first, then the sub-account table
            let row = match store.get_account(&id)? {
                Some(row) => Some(row),
                None => store.get_sub_account(&id)?,
            };
            match row {
                Some(row) => json!({
                    "account": account_json(&row),
                    "records": store.get_records(&id)?.iter().map(record_json).collect::<Vec<_>>(),
                }),
                None => json!({ "account": null }),
            }
        }
        Commands::Records { account } => {
            let id = parse_account(&account)?;
            let records = store.get_records(&id)?;
            json!({
                "account_id": account_id_hex(&id),
                "records": records.iter().map(record_json).collect::<Vec<_>>(),
            })
        }
        Commands::SubAccounts { parent } => {
            let parent_id = parse_account(&parent)?;
            let subs = store.sub_accounts_of(&parent_id)?;
            json!({
                "parent_id": account_id_hex(&parent_id),
                "count": subs.len(),
                "sub_accounts": subs.iter().map(account_json).collect::<Vec<_>>(),
            })
        }
        Commands::Reverse { alg_id, address } => {
            let stripped = address.strip_prefix("0x").unwrap_or(&address);
            let payload = hex::decode(stripped)
                .with_context(|| format!("Invalid hex address: {}", address))?;
            match store.reverse_by_address(alg_id, &payload)? {
                Some(record) => json!({
                    "alg_id": record.alg_id,
                    "address": format!("0x{}", hex::encode(&record.address)),
                    "account": record.account_name,
                    "outpoint": record.outpoint.to_string(),
                }),
                None => json!({ "account": null }),
            }
        }
        Commands::DidCell { tx_hash, index } => {
            let out = CellRef::new(parse_hash(&tx_hash)?, index);
            match store.get_did_cell(&out)? {
                Some(info) => json!({
                    "outpoint": info.outpoint.to_string(),
                    "account_id": account_id_hex(&info.account_id),
                    "name": info.name,
                    "expired_at": info.expired_at,
                    "lock_args": format!("0x{}", hex::encode(&info.lock_args)),
                    "records_hash": format!("0x{:x}", info.records_hash),
                }),
                None => json!({ "did_cell": null }),
            }
        }
    };

    // Pretty print JSON
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
