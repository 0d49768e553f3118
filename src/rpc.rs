//! JSON-RPC client for the chain node
//!
//! Provides a typed interface to the node's JSON-RPC endpoint and the
//! `ChainClient` trait the scheduler polls through. Handles hex string
//! parsing and error handling; all failures are transient I/O errors the
//! scheduler retries.

use crate::types::{Block, Transaction};
use alloy_primitives::B256;
use anyhow::{Context, Result};
use serde_json::{json, Value};

/// The chain interface the tailing scheduler consumes.
pub trait ChainClient {
    /// Current tip height.
    fn tip_height(&self) -> impl std::future::Future<Output = Result<u64>>;

    /// Fetch a block by height.
    fn block_by_height(&self, height: u64) -> impl std::future::Future<Output = Result<Block>>;
}

/// JSON-RPC implementation of [`ChainClient`].
pub struct ChainRpcClient {
    client: reqwest::Client,
    url: String,
}

impl ChainRpcClient {
    /// Create a new RPC client.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send RPC request")?;

        let json: Value = response
            .json()
            .await
            .context("Failed to parse RPC response")?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error: {}", error);
        }

        // Extract result
        json.get("result")
            .cloned()
            .context("RPC response missing 'result' field")
    }

    /// Get the current tip block number.
    pub async fn get_tip_block_number(&self) -> Result<u64> {
        let result = self.call("get_tip_block_number", json!([])).await?;
        let number_str = result
            .as_str()
            .context("Tip block number response is not a string")?;
        let number_str = number_str.strip_prefix("0x").unwrap_or(number_str);
        if number_str.is_empty() {
            anyhow::bail!("Tip block number is empty");
        }
        u64::from_str_radix(number_str, 16).context("Failed to parse tip block number")
    }

    /// Get a block by height with full transaction details.
    pub async fn get_block_by_number(&self, height: u64) -> Result<Block> {
        let params = json!([format!("0x{:x}", height)]);
        let result = self.call("get_block_by_number", params).await?;
        if result.is_null() {
            anyhow::bail!("Block {} not found", height);
        }
        serde_json::from_value(result).context("Failed to deserialize block")
    }

    /// Get a transaction by hash.
    pub async fn get_transaction(&self, tx_hash: B256) -> Result<Transaction> {
        let params = json!([format!("0x{:x}", tx_hash)]);
        let result = self.call("get_transaction", params).await?;
        if result.is_null() {
            anyhow::bail!("Transaction 0x{:x} not found", tx_hash);
        }
        serde_json::from_value(result).context("Failed to deserialize transaction")
    }
}

impl ChainClient for ChainRpcClient {
    async fn tip_height(&self) -> Result<u64> {
        self.get_tip_block_number().await
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        self.get_block_by_number(height).await
    }
}
