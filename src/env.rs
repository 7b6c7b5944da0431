//! Mining as a sequential decision process.
//!
//! [`MiningEnv`] follows the usual reset/step contract of policy-gradient
//! training loops: `reset` draws a fresh market state, `step` runs one bounded
//! proof-of-work attempt at the requested intensity and scores it.

use crate::block::Block;
use crate::error::{MinerError, Result};
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::mining::{nonce_budget, ChainMode, CpuExecutor, MinerConfig, MinerExecutor};
use crate::target::Target;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Block reward per unit of intensity, before pool fees
pub const BLOCK_REWARD: f64 = 0.001;
/// Load above which the hardware penalty kicks in
pub const HARDWARE_LOAD_THRESHOLD: f64 = 0.8;
pub const HARDWARE_PENALTY_SCALE: f64 = 0.1;
/// Difficulty every episode starts from
pub const INITIAL_DIFFICULTY: f64 = 10.0;
/// Largest per-step difficulty perturbation in either direction
pub const DIFFICULTY_DRIFT: f64 = 0.5;

/// Nominal lower bounds: energy_cost, hardware_load, difficulty, coin_price, pool_fee
pub const OBSERVATION_LOW: [f64; 5] = [0.0, 0.0, 1.0, 10_000.0, 0.0];
/// Nominal upper bounds, same order as [`OBSERVATION_LOW`]
pub const OBSERVATION_HIGH: [f64; 5] = [0.2, 1.0, 20.0, 100_000.0, 0.1];

const COIN_PRICE_RANGE: (f64, f64) = (55_000.0, 65_000.0);
const POOL_FEE_RANGE: (f64, f64) = (0.01, 0.04);

/// Market and hardware state seen by the agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub energy_cost: f64,
    pub hardware_load: f64,
    pub difficulty: f64,
    pub coin_price: f64,
    pub pool_fee: f64,
}

impl Observation {
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.energy_cost,
            self.hardware_load,
            self.difficulty,
            self.coin_price,
            self.pool_fee,
        ]
    }

    /// Draw every component except difficulty, which is supplied
    fn sample<R: Rng>(rng: &mut R, difficulty: f64) -> Self {
        Self {
            energy_cost: rng.gen_range(OBSERVATION_LOW[0]..=OBSERVATION_HIGH[0]),
            hardware_load: rng.gen_range(OBSERVATION_LOW[1]..=OBSERVATION_HIGH[1]),
            difficulty,
            coin_price: rng.gen_range(COIN_PRICE_RANGE.0..=COIN_PRICE_RANGE.1),
            pool_fee: rng.gen_range(POOL_FEE_RANGE.0..=POOL_FEE_RANGE.1),
        }
    }
}

/// Mining pool picked by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolChoice {
    Pool0,
    Pool1,
    Pool2,
}

impl PoolChoice {
    pub const ALL: [PoolChoice; 3] = [PoolChoice::Pool0, PoolChoice::Pool1, PoolChoice::Pool2];

    pub fn index(&self) -> usize {
        match self {
            PoolChoice::Pool0 => 0,
            PoolChoice::Pool1 => 1,
            PoolChoice::Pool2 => 2,
        }
    }
}

impl TryFrom<u8> for PoolChoice {
    type Error = MinerError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PoolChoice::Pool0),
            1 => Ok(PoolChoice::Pool1),
            2 => Ok(PoolChoice::Pool2),
            other => Err(MinerError::InvalidPool(other)),
        }
    }
}

/// Validated mining parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Action {
    intensity: f64,
    pool: PoolChoice,
}

impl Action {
    pub fn new(intensity: f64, pool: PoolChoice) -> Result<Self> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(MinerError::InvalidIntensity(intensity));
        }
        Ok(Self { intensity, pool })
    }

    /// Force intensity into range instead of rejecting it. NaN maps to 0.
    pub fn clamped(intensity: f64, pool: PoolChoice) -> Self {
        let intensity = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
        Self { intensity, pool }
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn pool(&self) -> PoolChoice {
        self.pool
    }
}

/// Diagnostics returned alongside each step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub balance: f64,
    pub blocks_mined: u64,
    pub mined: bool,
    pub attempts: u64,
}

/// Output of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step<Obs> {
    pub observation: Obs,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Reset/step contract consumed by the agent
pub trait Environment {
    type Action;
    type Observation;

    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Self::Observation;

    /// Apply one action and advance the episode
    fn step(&mut self, action: Self::Action) -> Step<Self::Observation>;
}

/// Reward for one attempt, scored against the state observed before it
pub fn reward(state: &Observation, intensity: f64, mined: bool, elapsed_secs: f64) -> f64 {
    let block_reward = if mined {
        BLOCK_REWARD * intensity * (1.0 - state.pool_fee)
    } else {
        0.0
    };
    let energy_penalty = state.energy_cost * intensity * elapsed_secs;
    let hardware_penalty =
        HARDWARE_PENALTY_SCALE * (state.hardware_load - HARDWARE_LOAD_THRESHOLD).max(0.0);
    block_reward * state.coin_price - energy_penalty - hardware_penalty
}

/// Simulated mining environment used for training
pub struct MiningEnv<E: MinerExecutor = CpuExecutor> {
    executor: E,
    horizon: u32,
    chain_mode: ChainMode,
    clamp_difficulty: bool,
    state: Observation,
    steps: u32,
    ledger: Ledger,
    rng: StdRng,
    cancel: Arc<AtomicBool>,
}

impl MiningEnv<CpuExecutor> {
    pub fn new(config: &MinerConfig) -> Self {
        Self::with_executor(CpuExecutor::new(), config)
    }
}

impl<E: MinerExecutor> MiningEnv<E> {
    pub fn with_executor(executor: E, config: &MinerConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = Observation::sample(&mut rng, INITIAL_DIFFICULTY);
        Self {
            executor,
            horizon: config.horizon,
            chain_mode: config.chain_mode,
            clamp_difficulty: config.clamp_difficulty,
            state,
            steps: 0,
            ledger: Ledger::new(),
            rng,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag with the nonce search
    pub fn set_cancel_flag(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = cancel;
    }

    pub fn state(&self) -> &Observation {
        &self.state
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn chain_mode(&self) -> ChainMode {
        self.chain_mode
    }

    /// Training-side bookkeeping, isolated from live mining
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    fn next_difficulty(&mut self) -> f64 {
        let delta = self.rng.gen_range(-DIFFICULTY_DRIFT..=DIFFICULTY_DRIFT);
        let next = self.state.difficulty + delta;
        if self.clamp_difficulty {
            next.clamp(OBSERVATION_LOW[2], OBSERVATION_HIGH[2])
        } else {
            next
        }
    }
}

impl<E: MinerExecutor> Environment for MiningEnv<E> {
    type Action = Action;
    type Observation = Observation;

    fn reset(&mut self) -> Observation {
        self.state = Observation::sample(&mut self.rng, INITIAL_DIFFICULTY);
        self.steps = 0;
        self.state
    }

    fn step(&mut self, action: Action) -> Step<Observation> {
        let intensity = action.intensity();
        let index = self.ledger.blocks_mined() + 1;
        let previous_hash = self.chain_mode.previous_hash(&self.ledger).to_string();
        let mut block = Block::now(index, previous_hash, format!("TransactionData{index}"));

        let target = Target::from_difficulty(self.state.difficulty);
        let outcome = self.executor.search(
            &mut block,
            &target,
            nonce_budget(intensity),
            &self.cancel,
        );

        let elapsed = outcome.elapsed.as_secs_f64();
        let reward = reward(&self.state, intensity, outcome.mined, elapsed);

        if outcome.mined {
            let credited = BLOCK_REWARD * intensity * (1.0 - self.state.pool_fee);
            tracing::info!(
                index,
                hash = %block.hash(),
                nonce = block.nonce(),
                pool = action.pool().index(),
                "Simulated block mined"
            );
            self.ledger.record(block, credited);
        }

        let difficulty = self.next_difficulty();
        self.state = Observation::sample(&mut self.rng, difficulty);
        self.steps += 1;

        Step {
            observation: self.state,
            reward,
            done: self.steps >= self.horizon,
            info: StepInfo {
                balance: self.ledger.balance(),
                blocks_mined: self.ledger.blocks_mined(),
                mined: outcome.mined,
                attempts: outcome.attempts,
            },
        }
    }
}
