//! Configuration and contract seed loading
//!
//! Handles loading the contract registry seed from a file. Each line names
//! one tracked contract: `<name> <type id hex> <major>.<minor>`.

use crate::registry::{ContractRegistry, ContractVersion};
use alloy_primitives::B256;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load a contract registry seed from a file.
///
/// Each line should contain a contract name, its deployed type id (32-byte
/// hex, with or without 0x prefix) and a `major.minor` version, separated
/// by whitespace. Empty lines and lines starting with '#' are ignored.
///
/// # Example file format:
/// ```
// account-cell-type      0x1122...ff 1.4
// sub-account-cell-type  0x3344...aa 1.0
// # This is a comment
// ```
pub fn load_contracts(path: &Path) -> Result<ContractRegistry> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read contracts file: {:?}", path))?;

    let mut registry = ContractRegistry::new();
    let mut entries = 0usize;
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (name, version) = parse_contract_line(line).with_context(|| {
            format!("Invalid contract entry on line {}: {}", line_num + 1, line)
        })?;
        registry.track(name, version);
        entries += 1;
    }

    if entries == 0 {
        anyhow::bail!("Contracts file is empty (no valid entries found)");
    }

    Ok(registry)
}

fn parse_contract_line(line: &str) -> Result<(String, ContractVersion)> {
    let mut parts = line.split_whitespace();
    let name = parts.next().context("Missing contract name")?;
    let type_id = parse_type_id(parts.next().context("Missing type id")?)?;
    let version = parts.next().context("Missing version")?;
    if parts.next().is_some() {
        anyhow::bail!("Trailing fields after version");
    }

    let (major, minor) = version
        .split_once('.')
        .context("Version must be <major>.<minor>")?;
    let major: u32 = major.parse().context("Invalid major version")?;
    let minor: u32 = minor.parse().context("Invalid minor version")?;

    Ok((
        name.to_string(),
        ContractVersion {
            type_id,
            major,
            minor,
        },
    ))
}

/// Parse a type id from a hex string.
///
/// Accepts hashes with or without 0x prefix.
fn parse_type_id(s: &str) -> Result<B256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).with_context(|| format!("Invalid hex type id: {}", s))?;
    if bytes.len() != 32 {
        anyhow::bail!(
            "Type id must be 32 bytes (64 hex chars), got {} bytes",
            bytes.len()
        );
    }
    Ok(B256::from_slice(&bytes))
}
