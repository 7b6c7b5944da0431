//! Live mining: agent-chosen parameters, a mining thread and a monitor thread.
//!
//! Rounds read the ledger tip, search without holding the lock, then record
//! the block only if the tip has not moved. The monitor never touches the
//! ledger; it works from the snapshots the mining thread sends it after every
//! round. `stop_mining` joins both threads.

use crate::agent::{Agent, TrainingReport};
use crate::block::Block;
use crate::common::{format_balance, format_duration, format_hashrate, format_large_number};
use crate::env::{Action, BLOCK_REWARD};
use crate::error::{MinerError, Result};
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::mining::{nonce_budget, CpuExecutor, MinerConfig, MinerExecutor, SearchOutcome};
use crate::target::Target;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// What happened during one live mining round
#[derive(Debug, Clone)]
pub struct MiningRound {
    pub action: Action,
    pub outcome: SearchOutcome,
    /// The block, when the search found one
    pub block: Option<Block>,
    pub snapshot: LedgerSnapshot,
}

/// Messages from the mining thread to the monitor
#[derive(Debug, Clone)]
pub enum MiningEvent {
    Trained(TrainingReport),
    Round(MiningRound),
}

/// State shared between the controller handle and its mining thread
struct MiningCore {
    config: MinerConfig,
    agent: Mutex<Agent>,
    ledger: Mutex<Ledger>,
    executor: CpuExecutor,
    target: Target,
    cancel: Arc<AtomicBool>,
}

impl MiningCore {
    fn proof_of_work(&self, block: &mut Block, intensity: f64) -> SearchOutcome {
        self.executor
            .search(block, &self.target, nonce_budget(intensity), &self.cancel)
    }

    fn mine_round(&self) -> MiningRound {
        let (index, previous_hash) = {
            let ledger = self.ledger.lock();
            (ledger.blocks_mined() + 1, ledger.tip_hash().to_string())
        };

        let action = self.agent.lock().optimize_mining_params();
        let mut block = Block::now(index, previous_hash, format!("TransactionData{index}"));
        let outcome = self.proof_of_work(&mut block, action.intensity());

        let mut ledger = self.ledger.lock();
        let block = if outcome.mined {
            let reward = BLOCK_REWARD * action.intensity();
            tracing::info!(
                index,
                hash = %block.hash(),
                nonce = block.nonce(),
                intensity = action.intensity(),
                pool = action.pool().index(),
                reward,
                "Block mined"
            );
            commit_block(&mut ledger, block, reward)
        } else {
            tracing::debug!(
                index,
                attempts = outcome.attempts,
                intensity = action.intensity(),
                "No block within budget"
            );
            None
        };

        MiningRound {
            action,
            outcome,
            block,
            snapshot: ledger.snapshot(),
        }
    }

    fn run(&self, events: Sender<MiningEvent>) {
        let report = self.agent.lock().train(self.config.train_timesteps);
        let _ = events.send(MiningEvent::Trained(report));

        while !self.cancel.load(Ordering::Relaxed) {
            let round = self.mine_round();
            let _ = events.send(MiningEvent::Round(round));
            sleep_unless_cancelled(self.config.round_interval(), &self.cancel);
        }
        tracing::debug!("Mining loop exited");
    }
}

/// Record `block` only if it still extends the ledger tip. A concurrent round
/// may have advanced the tip while this block was being searched.
fn commit_block(ledger: &mut Ledger, block: Block, reward: f64) -> Option<Block> {
    if block.previous_hash() != ledger.tip_hash() || block.index() != ledger.blocks_mined() + 1 {
        tracing::warn!(
            index = block.index(),
            hash = %block.hash(),
            "Dropping block mined on a stale tip"
        );
        return None;
    }
    ledger.record(block.clone(), reward);
    Some(block)
}

fn sleep_unless_cancelled(duration: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !cancel.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Report status from mining events until the mining thread hangs up
pub fn monitor_mining(events: Receiver<MiningEvent>, interval: Duration) {
    let ticker = crossbeam_channel::tick(interval);
    let started = Instant::now();
    let mut latest = LedgerSnapshot::default();
    let mut rounds = 0u64;
    let mut attempts = 0u64;

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(MiningEvent::Trained(report)) => {
                    tracing::info!(
                        episodes = report.episodes,
                        mean_episode_reward = report.mean_episode_reward,
                        "Agent trained, live mining started"
                    );
                }
                Ok(MiningEvent::Round(round)) => {
                    rounds += 1;
                    attempts += round.outcome.attempts;
                    latest = round.snapshot;
                }
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                let elapsed = started.elapsed();
                tracing::info!(
                    "Mining for {} | {} rounds | {} hashes ({}) | blocks: {} | balance: {}",
                    format_duration(elapsed),
                    rounds,
                    format_large_number(attempts),
                    format_hashrate(attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON)),
                    latest.blocks_mined,
                    format_balance(latest.balance),
                );
            }
        }
    }
    tracing::debug!("Monitor exited");
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns the live ledger and the agent, and drives mining sessions
pub struct Controller {
    core: Arc<MiningCore>,
    workers: Vec<Worker>,
}

impl Controller {
    pub fn new(config: MinerConfig, mut agent: Agent) -> Result<Self> {
        config.validate()?;
        let cancel = Arc::new(AtomicBool::new(false));
        agent.set_cancel_flag(cancel.clone());
        let target = Target::new(config.controller_difficulty, '0');

        Ok(Self {
            core: Arc::new(MiningCore {
                config,
                agent: Mutex::new(agent),
                ledger: Mutex::new(Ledger::new()),
                executor: CpuExecutor::new(),
                target,
                cancel,
            }),
            workers: Vec::new(),
        })
    }

    /// Bounded search at the controller's fixed difficulty
    pub fn proof_of_work(&self, block: &mut Block, intensity: f64) -> SearchOutcome {
        self.core.proof_of_work(block, intensity)
    }

    /// One live mining attempt chained to the last mined block.
    /// Returns the block when it was mined; failed attempts are dropped.
    pub fn mine_block(&self) -> Option<Block> {
        self.core.mine_round().block
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.core.ledger.lock().snapshot()
    }

    pub fn last_block(&self) -> Option<Block> {
        self.core.ledger.lock().last_block().cloned()
    }

    pub fn target(&self) -> &Target {
        &self.core.target
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Train once, then mine rounds in the background until stopped
    pub fn start_mining(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(MinerError::AlreadyRunning);
        }
        self.core.cancel.store(false, Ordering::SeqCst);

        let (tx, rx) = crossbeam_channel::unbounded();

        let core = self.core.clone();
        let mining = thread::Builder::new()
            .name("miner".into())
            .spawn(move || core.run(tx))
            .map_err(|source| MinerError::Spawn {
                name: "mining",
                source,
            })?;
        self.workers.push(Worker {
            name: "mining",
            handle: mining,
        });

        let interval = self.core.config.monitor_interval();
        match thread::Builder::new()
            .name("monitor".into())
            .spawn(move || monitor_mining(rx, interval))
        {
            Ok(monitor) => self.workers.push(Worker {
                name: "monitor",
                handle: monitor,
            }),
            Err(source) => {
                let _ = self.stop_mining();
                return Err(MinerError::Spawn {
                    name: "monitor",
                    source,
                });
            }
        }

        tracing::info!(
            difficulty = self.core.target.difficulty(),
            train_timesteps = self.core.config.train_timesteps,
            "Mining started"
        );
        Ok(())
    }

    /// Signal cancellation and join every background thread
    pub fn stop_mining(&mut self) -> Result<()> {
        if self.workers.is_empty() {
            return Ok(());
        }
        self.core.cancel.store(true, Ordering::SeqCst);

        let mut result = Ok(());
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() && result.is_ok() {
                result = Err(MinerError::ThreadPanicked(worker.name));
            }
        }
        // Threads are gone; re-arm the flag for direct mining and training
        self.core.cancel.store(false, Ordering::SeqCst);

        let snapshot = self.snapshot();
        tracing::info!(
            blocks_mined = snapshot.blocks_mined,
            balance = snapshot.balance,
            "Mining stopped"
        );
        result
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(e) = self.stop_mining() {
            tracing::error!("Error stopping mining: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GENESIS_HASH;

    fn config() -> MinerConfig {
        MinerConfig {
            controller_difficulty: 1,
            horizon: 5,
            train_timesteps: 10,
            round_interval_ms: 5,
            monitor_interval_ms: 20,
            ..MinerConfig::default().with_seed(21)
        }
    }

    fn controller() -> Controller {
        let config = config();
        let agent = Agent::from_config(&config);
        Controller::new(config, agent).unwrap()
    }

    #[test]
    fn test_proof_of_work_low_difficulty() {
        let controller = controller();
        let mut block = Block::new(1, GENESIS_HASH, "TransactionDataGenesis", "T0");
        let outcome = controller.proof_of_work(&mut block, 1.0);
        assert!(outcome.mined);
        assert!(outcome.attempts <= 1000);
        assert!(block.hash().starts_with('0'));
    }

    #[test]
    fn test_proof_of_work_zero_intensity_never_mines() {
        let controller = controller();
        let mut block = Block::new(1, GENESIS_HASH, "TransactionDataGenesis", "T0");
        let outcome = controller.proof_of_work(&mut block, 0.0);
        assert!(!outcome.mined);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(block.nonce(), 0);
    }

    #[test]
    fn test_mined_blocks_chain() {
        let controller = controller();
        let mut mined = Vec::new();
        for _ in 0..500 {
            if let Some(block) = controller.mine_block() {
                mined.push(block);
            }
            if mined.len() == 5 {
                break;
            }
        }
        assert_eq!(mined.len(), 5);
        assert_eq!(mined[0].previous_hash(), GENESIS_HASH);
        assert_eq!(mined[0].index(), 1);
        for pair in mined.windows(2) {
            assert_eq!(pair[1].previous_hash(), pair[0].hash());
            assert_eq!(pair[1].index(), pair[0].index() + 1);
        }

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.blocks_mined, 5);
        assert!(snapshot.balance > 0.0);
        assert_eq!(snapshot.last_hash.as_deref(), Some(mined[4].hash()));
        assert_eq!(controller.last_block().as_ref(), mined.last());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut controller = controller();
        controller.start_mining().unwrap();
        assert!(controller.is_running());
        assert!(matches!(
            controller.start_mining(),
            Err(MinerError::AlreadyRunning)
        ));
        controller.stop_mining().unwrap();
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_joins_and_freezes_ledger() {
        let mut controller = controller();
        controller.start_mining().unwrap();
        thread::sleep(Duration::from_millis(200));
        controller.stop_mining().unwrap();

        let frozen = controller.snapshot();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(controller.snapshot(), frozen);

        // Stopping again is a no-op
        controller.stop_mining().unwrap();
    }

    #[test]
    fn test_restart_after_stop() {
        let mut controller = controller();
        controller.start_mining().unwrap();
        controller.stop_mining().unwrap();
        controller.start_mining().unwrap();
        assert!(controller.is_running());
        controller.stop_mining().unwrap();
    }

    #[test]
    fn test_direct_mining_works_after_stop() {
        let mut controller = controller();
        controller.start_mining().unwrap();
        thread::sleep(Duration::from_millis(50));
        controller.stop_mining().unwrap();

        let mut block = Block::new(1, GENESIS_HASH, "TransactionDataGenesis", "T0");
        let outcome = controller.proof_of_work(&mut block, 1.0);
        assert!(outcome.attempts > 0);
        assert!(outcome.mined);

        let before = controller.snapshot().blocks_mined;
        let mined = (0..50).filter(|_| controller.mine_block().is_some()).count() as u64;
        assert!(mined > 0);
        assert_eq!(controller.snapshot().blocks_mined, before + mined);
    }

    #[test]
    fn test_stale_block_not_recorded() {
        let mut ledger = Ledger::new();
        let first = Block::new(1, GENESIS_HASH, "TransactionData1", "T0");
        assert!(commit_block(&mut ledger, first.clone(), 0.001).is_some());

        // Another round raced and also built on genesis
        let stale = Block::new(1, GENESIS_HASH, "TransactionData1", "T1");
        assert!(commit_block(&mut ledger, stale, 0.001).is_none());
        assert_eq!(ledger.blocks_mined(), 1);
        assert_eq!(ledger.tip_hash(), first.hash());

        let next = Block::new(2, first.hash(), "TransactionData2", "T2");
        assert!(commit_block(&mut ledger, next, 0.001).is_some());
        assert_eq!(ledger.blocks_mined(), 2);
    }

    #[test]
    fn test_stop_without_start() {
        let mut controller = controller();
        assert!(controller.stop_mining().is_ok());
    }

    #[test]
    fn test_sleep_unless_cancelled_returns_early() {
        let cancel = AtomicBool::new(true);
        let start = Instant::now();
        sleep_unless_cancelled(Duration::from_secs(5), &cancel);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_monitor_exits_when_sender_dropped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || monitor_mining(rx, Duration::from_millis(10)));
        tx.send(MiningEvent::Trained(TrainingReport {
            timesteps: 0,
            episodes: 0,
            mean_episode_reward: 0.0,
        }))
        .unwrap();
        drop(tx);
        handle.join().unwrap();
    }
}
