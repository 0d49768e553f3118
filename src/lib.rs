//! Nomen - chain-tailing indexer for an on-chain naming system
//!
//! This library tails a UTXO-style chain, recognizes typed naming-system
//! cells inside each transaction, decodes their witness payloads, and
//! projects them into a relational read model (accounts, records, reverse
//! resolution, sub-accounts, DID ownership cells).

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod keys;
pub mod notify;
pub mod records;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod tailer;
pub mod types;
pub mod witness;

// Handler families
pub mod handlers;

// Re-export the main types for convenience
pub use records::{
    AccountId, AccountRecord, AccountStatus, AddressInfo, CellRef, CursorRecord, DidCellInfo,
    RecordRow, ReverseRecord,
};
pub use store::{ProjectionStore, ReverseReplace, RocksProjectionStore};
pub use tailer::{Tailer, TailerConfig, TailerStatus};
