//! Tailing scheduler
//!
//! The top-level control loop. Each tick compares the persisted cursor
//! against the chain tip and either catches up in sequential batches,
//! processes a single near-tip block with full fork detection, or idles.
//! Nothing advances the cursor until every handler in a block has
//! succeeded, so a crash or error replays the block against idempotent
//! storage writes.

use crate::dispatch::Dispatcher;
use crate::errors::is_fatal;
use crate::handlers::HandlerContext;
use crate::notify::{HandlerFailure, Notifier};
use crate::records::CursorRecord;
use crate::registry::ContractRegistry;
use crate::rpc::ChainClient;
use crate::store::{ProjectionStore, RocksProjectionStore};
use crate::types::Block;
use crate::witness;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// Trailing blocks behind tip treated as final
    pub confirmations: u64,
    /// Blocks per catch-up batch; also the near-tip/catch-up boundary
    pub catchup_window: u64,
    /// Sleep between ticks while there is work
    pub poll_interval: Duration,
    /// Sleep between ticks while idle at tip
    pub idle_interval: Duration,
    /// Sleep after a failed tick
    pub error_interval: Duration,
    /// Depth of the persisted block-hash window
    pub window_depth: u64,
    /// First block to process when the store has no cursor yet
    pub start_height: u64,
    /// Stop the loop on a fatal contract version mismatch instead of
    /// retrying forever
    pub stop_on_version_mismatch: bool,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            confirmations: 3,
            catchup_window: 10,
            poll_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(10),
            error_interval: Duration::from_secs(5),
            window_depth: 20,
            start_height: 0,
            stop_on_version_mismatch: true,
        }
    }
}

/// Read-only scheduler state published to the query-serving layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailerStatus {
    /// Latest processed height
    pub current_height: u64,
    /// Latest observed tip height
    pub tip_height: u64,
    /// True once the cursor is within `confirmations` of the tip
    pub at_tip: bool,
}

enum Tick {
    Advanced,
    Idle,
}

enum BlockOutcome {
    Applied,
    Forked,
}

/// The block-tailing engine.
pub struct Tailer<C: ChainClient> {
    chain: C,
    store: RocksProjectionStore,
    registry: ContractRegistry,
    dispatcher: Dispatcher,
    notifier: Notifier,
    config: TailerConfig,
    status_tx: watch::Sender<TailerStatus>,
    shutdown: watch::Receiver<bool>,
}

impl<C: ChainClient> Tailer<C> {
    pub fn new(
        chain: C,
        store: RocksProjectionStore,
        registry: ContractRegistry,
        notifier: Notifier,
        config: TailerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (status_tx, _) = watch::channel(TailerStatus::default());
        Self {
            chain,
            store,
            registry,
            dispatcher: Dispatcher::new(),
            notifier,
            config,
            status_tx,
            shutdown,
        }
    }

    /// Subscribe to the scheduler's published status.
    pub fn status(&self) -> watch::Receiver<TailerStatus> {
        self.status_tx.subscribe()
    }

    /// Run until the shutdown signal flips. Returns an error only for
    /// fatal conditions (contract major version mismatch, when configured
    /// to stop).
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting tailing scheduler");
        loop {
            if *self.shutdown.borrow() {
                info!("Shutdown signal observed, stopping scheduler");
                return Ok(());
            }

            let wait = match self.tick().await {
                Ok(Tick::Advanced) => {
                    self.notifier.record_success();
                    self.config.poll_interval
                }
                Ok(Tick::Idle) => {
                    self.notifier.record_success();
                    self.config.idle_interval
                }
                Err(err) => {
                    if is_fatal(&err) && self.config.stop_on_version_mismatch {
                        error!("Fatal contract version mismatch: {:#}", err);
                        return Err(err);
                    }
                    warn!("Tick failed, retrying from the same cursor: {:#}", err);
                    self.config.error_interval
                }
            };

            // sleep, but wake immediately on shutdown
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed, stopping scheduler");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One scheduler iteration: pick a mode and process accordingly.
    async fn tick(&mut self) -> Result<Tick> {
        let tip = self
            .chain
            .tip_height()
            .await
            .context("Failed to fetch tip height")?;
        let cursor = match self.store.latest_block()? {
            Some(row) => row.block_number,
            None => self.config.start_height.saturating_sub(1),
        };
        self.publish_status(cursor, tip);

        let confirmed = tip.saturating_sub(self.config.confirmations);
        if cursor >= confirmed {
            debug!("Idle at tip: cursor={} tip={}", cursor, tip);
            return Ok(Tick::Idle);
        }

        if confirmed - cursor > self.config.catchup_window {
            // Catch-up: the region behind `confirmations` cannot fork, so
            // skip per-block lineage checks and batch through it. Still
            // strictly in order, one block at a time.
            let from = cursor + 1;
            let to = cursor + self.config.catchup_window;
            debug!("Catch-up mode: blocks {}..={} (tip {})", from, to, tip);
            for height in from..=to {
                let block = self
                    .chain
                    .block_by_height(height)
                    .await
                    .with_context(|| format!("Failed to fetch block {}", height))?;
                self.process_block(&block, false)
                    .await
                    .with_context(|| format!("Failed to process block {}", height))?;
                self.publish_status(height, tip);
            }
        } else {
            // Near-tip: one block with full fork detection.
            let height = cursor + 1;
            let block = self
                .chain
                .block_by_height(height)
                .await
                .with_context(|| format!("Failed to fetch block {}", height))?;
            match self
                .process_block(&block, true)
                .await
                .with_context(|| format!("Failed to process block {}", height))?
            {
                BlockOutcome::Applied => self.publish_status(height, tip),
                BlockOutcome::Forked => {}
            }
        }
        Ok(Tick::Advanced)
    }

    /// Process one block: fork check, per-transaction dispatch, cursor
    /// advance, window prune. Any handler error aborts before the cursor
    /// moves.
    async fn process_block(&mut self, block: &Block, check_fork: bool) -> Result<BlockOutcome> {
        let header = &block.header;
        if check_fork && self.detect_fork(block)? {
            // single-step rollback; the next tick re-fetches the
            // replacement block at the rolled-back height
            let rollback = header.number.saturating_sub(2);
            warn!(
                "Fork detected at block {}: parent 0x{:x} does not match window, rolling back to {}",
                header.number, header.parent_hash, rollback
            );
            self.store.rollback_to(rollback)?;
            return Ok(BlockOutcome::Forked);
        }

        for tx in &block.transactions {
            // transactions without a recognizable tag belong to unrelated
            // cell types
            let Some(tag) = witness::action_tag(tx) else {
                continue;
            };
            let kind = self.dispatcher.classify(&tag);
            debug!(
                "Block {} tx 0x{:x}: action {} ({:?})",
                header.number, tx.hash, tag, kind
            );
            let mut ctx = HandlerContext {
                store: &self.store,
                registry: &mut self.registry,
                tx,
                tx_hash: tx.hash,
                block_number: header.number,
                timestamp: header.timestamp,
                action: &tag,
            };
            if let Err(err) = self.dispatcher.dispatch(kind, &mut ctx) {
                let err = err.context(format!("Handler {} failed for tx 0x{:x}", tag, tx.hash));
                self.notifier
                    .notify_failure(&HandlerFailure {
                        tx_hash: tx.hash,
                        action: tag.clone(),
                        timestamp: header.timestamp,
                        error: format!("{:#}", err),
                    })
                    .await;
                return Err(err);
            }
        }

        self.store.record_block(&CursorRecord {
            block_number: header.number,
            block_hash: header.hash,
            parent_hash: header.parent_hash,
        })?;
        self.store
            .prune_blocks_below(header.number.saturating_sub(self.config.window_depth))?;
        Ok(BlockOutcome::Applied)
    }

    /// Compare the fetched block's declared parent against the persisted
    /// hash of the previous block. An absent window row (first run, or
    /// pruned past) allows no conclusion and is treated as no fork.
    fn detect_fork(&self, block: &Block) -> Result<bool> {
        let number = block.header.number;
        if number == 0 {
            return Ok(false);
        }
        match self.store.block_hash_at(number - 1)? {
            Some(recorded) => Ok(recorded != block.header.parent_hash),
            None => Ok(false),
        }
    }

    fn publish_status(&self, current_height: u64, tip_height: u64) {
        self.status_tx.send_replace(TailerStatus {
            current_height,
            tip_height,
            at_tip: current_height >= tip_height.saturating_sub(self.config.confirmations),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::CellRef;
    use crate::registry::{contracts, ContractRegistry, ContractVersion};
    use crate::types::{CellInput, CellOutput, Header, OutPoint, Script, Transaction};
    use crate::witness::builder;
    use alloy_primitives::B256;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const REVERSE_TYPE_ID: B256 = B256::repeat_byte(0x31);
    const ACCOUNT_TYPE_ID: B256 = B256::repeat_byte(0x42);

    #[derive(Default)]
    struct MockState {
        tip: u64,
        blocks: HashMap<u64, Block>,
    }

    #[derive(Clone, Default)]
    struct MockChain(Arc<Mutex<MockState>>);

    impl MockChain {
        fn put_block(&self, block: Block) {
            let mut state = self.0.lock().unwrap();
            state.tip = state.tip.max(block.header.number);
            state.blocks.insert(block.header.number, block);
        }
    }

    impl ChainClient for MockChain {
        async fn tip_height(&self) -> Result<u64> {
            Ok(self.0.lock().unwrap().tip)
        }

        async fn block_by_height(&self, height: u64) -> Result<Block> {
            self.0
                .lock()
                .unwrap()
                .blocks
                .get(&height)
                .cloned()
                .with_context(|| format!("no block at height {}", height))
        }
    }

    fn block_hash(number: u64, fork: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&number.to_be_bytes());
        bytes[31] = fork;
        B256::from(bytes)
    }

    fn block(number: u64, fork: u8, parent_fork: u8, transactions: Vec<Transaction>) -> Block {
        Block {
            header: Header {
                number,
                hash: block_hash(number, fork),
                parent_hash: block_hash(number - 1, parent_fork),
                timestamp: 1_650_000_000 + number,
            },
            transactions,
        }
    }

    fn declare_tx(tx_byte: u8, alg_id: u8, address: &[u8], name: &str) -> Transaction {
        let mut lock_args = vec![alg_id];
        lock_args.extend_from_slice(address);
        Transaction {
            hash: B256::repeat_byte(tx_byte),
            inputs: vec![],
            outputs: vec![CellOutput {
                capacity: 1_000,
                lock: Script {
                    code_hash: B256::repeat_byte(0xee),
                    hash_type: "type".to_string(),
                    args: lock_args,
                },
                type_script: Some(Script {
                    code_hash: REVERSE_TYPE_ID,
                    hash_type: "type".to_string(),
                    args: vec![],
                }),
            }],
            outputs_data: vec![name.as_bytes().to_vec()],
            witnesses: vec![builder::action_witness("declare_reverse_record")],
        }
    }

    fn retract_tx(tx_byte: u8, consumed: OutPoint) -> Transaction {
        Transaction {
            hash: B256::repeat_byte(tx_byte),
            inputs: vec![CellInput {
                previous_output: consumed,
            }],
            outputs: vec![],
            outputs_data: vec![],
            witnesses: vec![builder::action_witness("retract_reverse_record")],
        }
    }

    fn test_registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.track(
            contracts::REVERSE,
            ContractVersion {
                type_id: REVERSE_TYPE_ID,
                major: 1,
                minor: 0,
            },
        );
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

    fn test_tailer(chain: MockChain, config: TailerConfig) -> (Tailer<MockChain>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = RocksProjectionStore::open(tmp.path()).unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let tailer = Tailer::new(
            chain,
            store,
            test_registry(),
            Notifier::disabled(),
            config,
            shutdown_rx,
        );
        (tailer, tmp)
    }

    fn near_tip_config(start_height: u64) -> TailerConfig {
        TailerConfig {
            confirmations: 0,
            catchup_window: 10,
            start_height,
            ..TailerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_declare_retract_and_fork_rollback() {
        let chain = MockChain::default();
        let address = [0xaa; 20];
        let declare = declare_tx(0x10, 3, &address, "alice.bit");

        chain.put_block(block(100, 0, 0, vec![declare.clone()]));
        let (mut tailer, _tmp) = test_tailer(chain.clone(), near_tip_config(100));

        // block 100: declaration lands
        tailer.tick().await.unwrap();
        let live = tailer.store.reverse_by_address(3, &address).unwrap().unwrap();
        assert_eq!(live.account_name, "alice.bit");
        assert_eq!(live.outpoint, CellRef::new(declare.hash, 0));
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 100);

        // block 101: retraction consumes the declared outpoint
        chain.put_block(block(
            101,
            0,
            0,
            vec![retract_tx(
                0x11,
                OutPoint {
                    tx_hash: declare.hash,
                    index: 0,
                },
            )],
        ));
        tailer.tick().await.unwrap();
        assert!(tailer.store.reverse_by_address(3, &address).unwrap().is_none());
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 101);

        // the chain replaces blocks 100 and 101 (different hashes) and
        // extends with 102
        let declare_b = declare_tx(0x20, 3, &address, "bob.bit");
        chain.put_block(block(100, 1, 0, vec![declare_b]));
        chain.put_block(block(101, 1, 1, vec![]));
        chain.put_block(block(102, 1, 1, vec![]));

        // fetching 102 exposes the mismatched parent: cursor rolls to 100
        tailer.tick().await.unwrap();
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 100);
        // fetching replacement 101 exposes the next mismatch: the cursor
        // rolls to 99, before the first block this run ever recorded, so
        // the window is empty and scheduling falls back to start_height
        tailer.tick().await.unwrap();
        assert!(tailer.store.latest_block().unwrap().is_none());
        assert!(tailer.store.block_hash_at(100).unwrap().is_none());

        // convergence: 100', 101', 102' apply in order
        for expected in [100, 101, 102] {
            tailer.tick().await.unwrap();
            assert_eq!(
                tailer.store.latest_block().unwrap().unwrap().block_number,
                expected
            );
        }
        // the new chain's declaration is live, the orphaned one is gone
        let live = tailer.store.reverse_by_address(3, &address).unwrap().unwrap();
        assert_eq!(live.account_name, "bob.bit");
        assert_eq!(
            tailer.store.block_hash_at(100).unwrap(),
            Some(block_hash(100, 1))
        );

        let status = *tailer.status().borrow();
        assert_eq!(status.current_height, 102);
        assert!(status.at_tip);
    }

    #[tokio::test]
    async fn test_replaying_a_block_is_idempotent() {
        let chain = MockChain::default();
        let address = [0xaa; 20];
        let b100 = block(100, 0, 0, vec![declare_tx(0x10, 3, &address, "alice.bit")]);
        chain.put_block(b100.clone());
        let (mut tailer, _tmp) = test_tailer(chain, near_tip_config(100));

        tailer.tick().await.unwrap();
        let first = tailer.store.reverse_by_address(3, &address).unwrap().unwrap();

        // simulate a crash after handler writes but before cursor commit:
        // the same block is processed again
        tailer.process_block(&b100, true).await.unwrap();
        let second = tailer.store.reverse_by_address(3, &address).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 100);
    }

    #[tokio::test]
    async fn test_catch_up_mode_batches_and_prunes() {
        let chain = MockChain::default();
        for n in 1..=40u64 {
            chain.put_block(block(n, 0, 0, vec![]));
        }
        let config = TailerConfig {
            confirmations: 2,
            catchup_window: 5,
            window_depth: 10,
            start_height: 1,
            ..TailerConfig::default()
        };
        let (mut tailer, _tmp) = test_tailer(chain, config);

        // far behind: one tick advances a full window
        tailer.tick().await.unwrap();
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 5);

        for _ in 0..6 {
            tailer.tick().await.unwrap();
        }
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 35);
        // window rows older than depth are pruned
        assert!(tailer.store.block_hash_at(20).unwrap().is_none());
        assert!(tailer.store.block_hash_at(30).unwrap().is_some());

        // inside the confirmation margin the scheduler idles
        for _ in 0..10 {
            tailer.tick().await.unwrap();
        }
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 38);
        let status = *tailer.status().borrow();
        assert_eq!(status.tip_height, 40);
        assert!(status.at_tip);
    }

    #[tokio::test]
    async fn test_handler_error_leaves_cursor_unchanged() {
        let chain = MockChain::default();
        chain.put_block(block(100, 0, 0, vec![]));
        // block 101 carries an account action whose witness is garbage
        let mut bad_tx = declare_tx(0x10, 3, &[0xaa; 20], "alice.bit");
        bad_tx.outputs[0].type_script.as_mut().unwrap().code_hash = ACCOUNT_TYPE_ID;
        bad_tx.witnesses = vec![builder::action_witness("recycle_expired_account")];
        chain.put_block(block(101, 0, 0, vec![bad_tx]));

        let (mut tailer, _tmp) = test_tailer(chain, near_tip_config(100));
        tailer.tick().await.unwrap();
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 100);

        // the decode failure aborts the block; the cursor must not move
        let err = tailer.tick().await.unwrap_err();
        assert!(format!("{:#}", err).contains("101"));
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 100);

        // and it keeps failing the same way on the next tick
        tailer.tick().await.unwrap_err();
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 100);
    }

    #[tokio::test]
    async fn test_fatal_version_mismatch_stops_the_loop() {
        let chain = MockChain::default();
        let config_cell = crate::witness::ConfigCell {
            index: 0,
            version: 1,
            contract: contracts::ACCOUNT.to_string(),
            type_id: B256::repeat_byte(0x43),
            major: 2,
            minor: 0,
        };
        let deploy_tx = Transaction {
            hash: B256::repeat_byte(0x10),
            inputs: vec![],
            outputs: vec![],
            outputs_data: vec![],
            witnesses: vec![
                builder::action_witness("deploy_contract"),
                builder::cell_witness(
                    crate::witness::CellSlot::New,
                    crate::witness::CellKind::Config,
                    1,
                    0,
                    &config_cell.encode_entity(),
                ),
            ],
        };
        chain.put_block(block(100, 0, 0, vec![deploy_tx]));

        let (mut tailer, _tmp) = test_tailer(chain, near_tip_config(100));
        let err = tailer.tick().await.unwrap_err();
        assert!(is_fatal(&err));
        assert!(tailer.store.latest_block().unwrap().is_none());

        // run() surfaces the fatal error instead of retrying
        let err = tailer.run().await.unwrap_err();
        assert!(is_fatal(&err));
    }

    #[tokio::test]
    async fn test_run_observes_shutdown() {
        let chain = MockChain::default();
        chain.put_block(block(100, 0, 0, vec![]));
        let tmp = TempDir::new().unwrap();
        let store = RocksProjectionStore::open(tmp.path()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tailer = Tailer::new(
            chain,
            store,
            test_registry(),
            Notifier::disabled(),
            near_tip_config(100),
            shutdown_rx,
        );
        shutdown_tx.send(true).unwrap();
        tailer.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_minor_deployment_updates_registry_and_guard() {
        let chain = MockChain::default();
        let new_type_id = B256::repeat_byte(0x32);
        let config_cell = crate::witness::ConfigCell {
            index: 0,
            version: 1,
            contract: contracts::REVERSE.to_string(),
            type_id: new_type_id,
            major: 1,
            minor: 1,
        };
        let deploy_tx = Transaction {
            hash: B256::repeat_byte(0x10),
            inputs: vec![],
            outputs: vec![],
            outputs_data: vec![],
            witnesses: vec![
                builder::action_witness("deploy_contract"),
                builder::cell_witness(
                    crate::witness::CellSlot::New,
                    crate::witness::CellKind::Config,
                    1,
                    0,
                    &config_cell.encode_entity(),
                ),
            ],
        };
        chain.put_block(block(100, 0, 0, vec![deploy_tx]));
        // a declaration still carrying the superseded type id
        let address = [0xaa; 20];
        chain.put_block(block(101, 0, 0, vec![declare_tx(0x20, 3, &address, "alice.bit")]));

        let (mut tailer, _tmp) = test_tailer(chain, near_tip_config(100));
        tailer.tick().await.unwrap();
        assert_eq!(
            tailer.registry.tracked(contracts::REVERSE).unwrap().type_id,
            new_type_id
        );

        // the stale declaration is now version-guarded into a no-op
        tailer.tick().await.unwrap();
        assert!(tailer.store.reverse_by_address(3, &address).unwrap().is_none());
        assert_eq!(tailer.store.latest_block().unwrap().unwrap().block_number, 101);
    }
}
