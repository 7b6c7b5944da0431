//! End-to-end checks through the public API

use rl_miner::mining::nonce_budget;
use rl_miner::{
    Action, Agent, Block, ChainMode, Controller, Environment, MinerConfig, MiningEnv, PoolChoice,
    GENESIS_HASH,
};
use std::thread;
use std::time::Duration;

fn fast_config() -> MinerConfig {
    MinerConfig {
        controller_difficulty: 1,
        horizon: 100,
        train_timesteps: 50,
        round_interval_ms: 1,
        monitor_interval_ms: 50,
        threads: 2,
        ..MinerConfig::default().with_seed(2024)
    }
}

#[test]
fn genesis_block_scenario() {
    let mut block = Block::new(1, "0".repeat(64), "TransactionDataGenesis", "T0");
    let initial = block.hash().to_string();
    assert_eq!(block.compute_hash(), initial);

    block.increment_nonce();
    let after_one = block.hash().to_string();
    assert_ne!(after_one, initial);

    let mut replay = Block::new(1, GENESIS_HASH, "TransactionDataGenesis", "T0");
    replay.set_nonce(1);
    assert_eq!(replay.hash(), after_one);
}

#[test]
fn episode_runs_exactly_one_horizon() {
    let mut env = MiningEnv::new(&fast_config());
    env.reset();
    let action = Action::new(0.05, PoolChoice::Pool0).unwrap();

    let dones: Vec<bool> = (0..100).map(|_| env.step(action).done).collect();
    assert!(dones[..99].iter().all(|d| !d));
    assert!(dones[99]);
}

#[test]
fn rewards_are_finite_and_bounded_work() {
    let mut env = MiningEnv::new(&fast_config());
    env.reset();
    for i in 0..=20 {
        let intensity = i as f64 / 20.0;
        let pool = PoolChoice::try_from((i % 3) as u8).unwrap();
        let step = env.step(Action::new(intensity, pool).unwrap());
        assert!(step.reward.is_finite());
        assert!(step.info.attempts <= nonce_budget(intensity));
        if !step.info.mined {
            assert!(step.reward <= 0.0);
        }
    }
}

#[test]
fn training_and_live_ledgers_are_isolated() {
    let config = fast_config().with_chain_mode(ChainMode::Strict);
    let mut agent = Agent::from_config(&config);
    agent.train(200);

    let controller = Controller::new(config, agent).unwrap();
    assert_eq!(controller.snapshot().blocks_mined, 0);

    let mut mined = 0;
    for _ in 0..200 {
        if controller.mine_block().is_some() {
            mined += 1;
        }
        if mined == 3 {
            break;
        }
    }
    assert_eq!(controller.snapshot().blocks_mined, mined);
}

#[test]
fn controller_chains_live_blocks() {
    let config = fast_config();
    let controller = Controller::new(config.clone(), Agent::from_config(&config)).unwrap();

    let mut chain: Vec<Block> = Vec::new();
    for _ in 0..1_000 {
        if let Some(block) = controller.mine_block() {
            chain.push(block);
        }
        if chain.len() == 4 {
            break;
        }
    }
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[0].previous_hash(), "0".repeat(64));
    for pair in chain.windows(2) {
        assert_eq!(pair[1].previous_hash(), pair[0].hash());
    }
}

#[test]
fn background_session_starts_and_stops() {
    let config = fast_config();
    let mut controller = Controller::new(config.clone(), Agent::from_config(&config)).unwrap();

    controller.start_mining().unwrap();
    thread::sleep(Duration::from_millis(300));
    controller.stop_mining().unwrap();
    assert!(!controller.is_running());

    let snapshot = controller.snapshot();
    if snapshot.blocks_mined > 0 {
        assert!(snapshot.balance > 0.0);
        assert!(snapshot.last_hash.is_some());
    }
}
