//! Policy-gradient agent bound to a [`MiningEnv`].

use crate::env::{Action, Environment, MiningEnv};
use crate::error::{MinerError, Result};
use crate::mining::MinerConfig;
use crate::policy::{features, Policy, Transition};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reported after every training episode
#[derive(Debug, Clone, Copy)]
pub struct TrainingProgress {
    pub timesteps: u64,
    pub total_timesteps: u64,
    pub episodes: u64,
    pub episode_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingReport {
    pub timesteps: u64,
    pub episodes: u64,
    pub mean_episode_reward: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub episodes: usize,
    pub mean_reward: f64,
    pub blocks_mined: u64,
}

pub struct Agent {
    env: MiningEnv,
    policy: Policy,
    rng: StdRng,
    config: MinerConfig,
    cancel: Arc<AtomicBool>,
}

impl Agent {
    pub fn new(env: MiningEnv, config: &MinerConfig) -> Self {
        let rng = match config.seed {
            // Keep the policy stream distinct from the environment's
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Self {
            env,
            policy: Policy::new(),
            rng,
            config: config.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Agent with a fresh environment built from the same config
    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(MiningEnv::new(config), config)
    }

    /// Share a cancellation flag with training and the environment's search
    pub fn set_cancel_flag(&mut self, cancel: Arc<AtomicBool>) {
        self.env.set_cancel_flag(cancel.clone());
        self.cancel = cancel;
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn env(&self) -> &MiningEnv {
        &self.env
    }

    pub fn train(&mut self, total_timesteps: u64) -> TrainingReport {
        self.train_with_progress(total_timesteps, |_| {})
    }

    /// Run `total_timesteps` environment interactions, updating the policy
    /// after each episode. The last episode may be cut short.
    pub fn train_with_progress<F>(
        &mut self,
        total_timesteps: u64,
        mut on_progress: F,
    ) -> TrainingReport
    where
        F: FnMut(&TrainingProgress),
    {
        let mut timesteps = 0u64;
        let mut episodes = 0u64;
        let mut return_sum = 0.0;

        while timesteps < total_timesteps && !self.cancel.load(Ordering::Relaxed) {
            let mut obs = self.env.reset();
            let mut episode = Vec::with_capacity(self.env.horizon() as usize);

            while timesteps < total_timesteps && !self.cancel.load(Ordering::Relaxed) {
                let decision = self.policy.sample(&obs, &mut self.rng);
                let step = self.env.step(decision.action);
                episode.push(Transition {
                    features: features(&obs),
                    latent: decision.latent,
                    pool: decision.action.pool(),
                    reward: step.reward,
                });
                timesteps += 1;
                obs = step.observation;
                if step.done {
                    break;
                }
            }

            if episode.is_empty() {
                break;
            }

            let stats = self
                .policy
                .update(&episode, self.config.learning_rate, self.config.gamma);
            episodes += 1;
            return_sum += stats.episode_return;

            tracing::debug!(
                episode = episodes,
                steps = episode.len(),
                episode_return = stats.episode_return,
                grad_norm = stats.grad_norm,
                "Policy updated"
            );

            on_progress(&TrainingProgress {
                timesteps,
                total_timesteps,
                episodes,
                episode_return: stats.episode_return,
            });
        }

        let report = TrainingReport {
            timesteps,
            episodes,
            mean_episode_reward: if episodes > 0 {
                return_sum / episodes as f64
            } else {
                0.0
            },
        };
        tracing::info!(
            timesteps = report.timesteps,
            episodes = report.episodes,
            mean_episode_reward = report.mean_episode_reward,
            "Training finished"
        );
        report
    }

    /// Propose mining parameters for a freshly reset market state.
    /// Does not step the environment.
    pub fn optimize_mining_params(&mut self) -> Action {
        let obs = self.env.reset();
        if self.config.deterministic_inference {
            self.policy.mode(&obs)
        } else {
            self.policy.sample(&obs, &mut self.rng).action
        }
    }

    /// Run deterministic episodes on independent seeded environments in parallel
    pub fn evaluate(&self, episodes: usize) -> Result<EvaluationReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .build()
            .map_err(|e| MinerError::ThreadPool(e.to_string()))?;

        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        let policy = &self.policy;
        let config = &self.config;
        let cancel = &self.cancel;

        let results: Vec<(f64, u64)> = pool.install(|| {
            (0..episodes)
                .into_par_iter()
                .map(|i| {
                    let seed = base_seed.wrapping_add(i as u64);
                    let mut env = MiningEnv::new(&config.clone().with_seed(seed));
                    env.set_cancel_flag(cancel.clone());

                    let mut obs = env.reset();
                    let mut total = 0.0;
                    loop {
                        let step = env.step(policy.mode(&obs));
                        total += step.reward;
                        obs = step.observation;
                        if step.done || cancel.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                    (total, env.ledger().blocks_mined())
                })
                .collect()
        });

        let reward_sum: f64 = results.iter().map(|(r, _)| r).sum();
        Ok(EvaluationReport {
            episodes,
            mean_reward: if episodes > 0 {
                reward_sum / episodes as f64
            } else {
                0.0
            },
            blocks_mined: results.iter().map(|(_, b)| b).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MinerConfig {
        MinerConfig {
            horizon: 10,
            threads: 2,
            ..MinerConfig::default().with_seed(11)
        }
    }

    #[test]
    fn test_train_consumes_exact_timesteps() {
        let mut agent = Agent::from_config(&config());
        let mut calls = 0;
        let report = agent.train_with_progress(35, |p| {
            calls += 1;
            assert!(p.timesteps <= p.total_timesteps);
        });
        assert_eq!(report.timesteps, 35);
        // three full episodes of 10 plus a truncated one of 5
        assert_eq!(report.episodes, 4);
        assert_eq!(calls, 4);
        assert!(report.mean_episode_reward.is_finite());
    }

    #[test]
    fn test_train_zero_is_noop() {
        let mut agent = Agent::from_config(&config());
        let before = agent.policy().clone();
        let report = agent.train(0);
        assert_eq!(report.episodes, 0);
        assert_eq!(report.mean_episode_reward, 0.0);
        assert_eq!(agent.policy(), &before);
    }

    #[test]
    fn test_cancelled_training_stops() {
        let mut agent = Agent::from_config(&config());
        let cancel = Arc::new(AtomicBool::new(true));
        agent.set_cancel_flag(cancel);
        let report = agent.train(1_000);
        assert_eq!(report.timesteps, 0);
    }

    #[test]
    fn test_optimize_does_not_step() {
        let mut agent = Agent::from_config(&config());
        for _ in 0..20 {
            let action = agent.optimize_mining_params();
            assert!((0.0..=1.0).contains(&action.intensity()));
            assert_eq!(agent.env().steps(), 0);
            assert_eq!(agent.env().ledger().blocks_mined(), 0);
        }
    }

    #[test]
    fn test_deterministic_inference_repeats() {
        let config = MinerConfig {
            deterministic_inference: true,
            ..config()
        };
        let mut agent = Agent::from_config(&config);
        let a = agent.optimize_mining_params();
        let b = agent.optimize_mining_params();
        // Fresh policy ignores the state, so the mode is constant
        assert_eq!(a, b);
    }

    #[test]
    fn test_evaluate_reports_every_episode() {
        let mut agent = Agent::from_config(&config());
        agent.train(20);
        let report = agent.evaluate(4).unwrap();
        assert_eq!(report.episodes, 4);
        assert!(report.mean_reward.is_finite());

        let empty = agent.evaluate(0).unwrap();
        assert_eq!(empty.mean_reward, 0.0);
    }
}
