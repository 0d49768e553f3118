//! Contract version registry
//!
//! Tracks, per logical contract, the currently-deployed type identifier.
//! Handlers consult it before decoding so cells created under a stale or
//! foreign contract version never reach the read model. A deployment that
//! crosses a major version boundary is fatal: the decoders in this build
//! no longer match the chain.

use crate::errors::IndexError;
use crate::types::Transaction;
use crate::witness::ConfigCell;
use alloy_primitives::B256;
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

/// Well-known contract names.
pub mod contracts {
    pub const ACCOUNT: &str = "account-cell-type";
    pub const SUB_ACCOUNT: &str = "sub-account-cell-type";
    pub const REVERSE: &str = "reverse-record-cell-type";
    pub const REVERSE_ROOT: &str = "reverse-record-root-cell-type";
    pub const DID: &str = "did-cell-type";
    pub const PROPOSAL: &str = "proposal-cell-type";
}

/// The tracked deployment of one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractVersion {
    /// Type-script code hash of the deployed contract
    pub type_id: B256,
    pub major: u32,
    pub minor: u32,
}

/// Registry of tracked contract deployments, seeded from configuration and
/// kept current by deployment transactions.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, ContractVersion>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track (or re-track) a contract.
    pub fn track(&mut self, name: impl Into<String>, version: ContractVersion) {
        self.contracts.insert(name.into(), version);
    }

    /// The tracked deployment of a contract, if any.
    pub fn tracked(&self, name: &str) -> Option<&ContractVersion> {
        self.contracts.get(name)
    }

    /// True iff any output cell's type script matches the tracked type id
    /// for the contract. False when the contract is untracked: a cell we
    /// cannot attribute to a known deployment must not be projected.
    pub fn is_current_version(&self, tx: &Transaction, contract: &str) -> bool {
        let Some(version) = self.contracts.get(contract) else {
            return false;
        };
        tx.outputs.iter().any(|output| {
            output
                .type_script
                .as_ref()
                .map(|script| script.code_hash == version.type_id)
                .unwrap_or(false)
        })
    }

    /// Apply an on-chain contract deployment.
    ///
    /// Same-major deployments move the tracked type id and minor version
    /// forward. A different major is a fatal mismatch: this build decodes
    /// the old layout and continuing would corrupt the projection.
    pub fn apply_deployment(&mut self, config: &ConfigCell) -> Result<()> {
        match self.contracts.get_mut(&config.contract) {
            Some(current) => {
                if config.major != current.major {
                    return Err(IndexError::ContractMajorMismatch {
                        contract: config.contract.clone(),
                        onchain: config.major,
                        tracked: current.major,
                    }
                    .into());
                }
                info!(
                    "Contract {} deployed: v{}.{} -> v{}.{}, type id 0x{:x}",
                    config.contract,
                    current.major,
                    current.minor,
                    config.major,
                    config.minor,
                    config.type_id
                );
                current.type_id = config.type_id;
                current.minor = config.minor;
            }
            None => {
                info!(
                    "Tracking new contract {} v{}.{}",
                    config.contract, config.major, config.minor
                );
                self.contracts.insert(
                    config.contract.clone(),
                    ContractVersion {
                        type_id: config.type_id,
                        major: config.major,
                        minor: config.minor,
                    },
                );
            }
        }
        Ok(())
    }
}
