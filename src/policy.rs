//! Stochastic linear policy trained with REINFORCE.
//!
//! Intensity comes from a logit-logistic head: a logistic variable `u` with
//! learned location and scale, squashed through a sigmoid into `(0, 1)`.
//! Pool choice comes from a softmax head. Both heads are linear in the
//! normalized observation plus a bias feature.

use crate::env::{Action, Observation, PoolChoice, OBSERVATION_HIGH, OBSERVATION_LOW};

use rand::Rng;

/// Observation components plus bias
pub const FEATURES: usize = 6;
const POOLS: usize = 3;

const MIN_LOG_SCALE: f64 = -3.0;
const MAX_LOG_SCALE: f64 = 1.0;
const MAX_GRAD_NORM: f64 = 5.0;
const PROB_EPSILON: f64 = 1e-9;

/// Scale each observation component by its nominal range and append a bias term.
/// Components drifting outside the range are not clamped.
pub fn features(obs: &Observation) -> [f64; FEATURES] {
    let raw = obs.to_array();
    let mut x = [1.0; FEATURES];
    for (i, value) in raw.iter().enumerate() {
        x[i] = (value - OBSERVATION_LOW[i]) / (OBSERVATION_HIGH[i] - OBSERVATION_LOW[i]);
    }
    x
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(w: &[f64; FEATURES], x: &[f64; FEATURES]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

/// One sampled decision, with what the update needs to score it later
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub action: Action,
    /// Pre-sigmoid intensity sample
    pub latent: f64,
}

/// A decision paired with the features it was made on and the reward it earned
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub features: [f64; FEATURES],
    pub latent: f64,
    pub pool: PoolChoice,
    pub reward: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateStats {
    pub episode_return: f64,
    pub grad_norm: f64,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    intensity_weights: [f64; FEATURES],
    log_scale: f64,
    pool_weights: [[f64; FEATURES]; POOLS],
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    /// Starts at intensity 0.5 on average and uniform pool choice
    pub fn new() -> Self {
        Self {
            intensity_weights: [0.0; FEATURES],
            log_scale: 0.5f64.ln(),
            pool_weights: [[0.0; FEATURES]; POOLS],
        }
    }

    pub fn scale(&self) -> f64 {
        self.log_scale.exp()
    }

    /// Probability of each pool for the given features
    pub fn pool_probabilities(&self, x: &[f64; FEATURES]) -> [f64; POOLS] {
        let logits: Vec<f64> = self.pool_weights.iter().map(|w| dot(w, x)).collect();
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut probs = [0.0; POOLS];
        let mut total = 0.0;
        for (p, l) in probs.iter_mut().zip(&logits) {
            *p = (l - max).exp();
            total += *p;
        }
        for p in probs.iter_mut() {
            *p /= total;
        }
        probs
    }

    /// Sample an action from the policy
    pub fn sample<R: Rng>(&self, obs: &Observation, rng: &mut R) -> Decision {
        let x = features(obs);
        let location = dot(&self.intensity_weights, &x);
        let p: f64 = rng.r#gen::<f64>().clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
        let latent = location + self.scale() * (p / (1.0 - p)).ln();

        let probs = self.pool_probabilities(&x);
        let draw: f64 = rng.r#gen();
        let mut cumulative = 0.0;
        let mut pool = PoolChoice::Pool2;
        for (candidate, prob) in PoolChoice::ALL.iter().zip(probs) {
            cumulative += prob;
            if draw < cumulative {
                pool = *candidate;
                break;
            }
        }

        Decision {
            action: Action::clamped(sigmoid(latent), pool),
            latent,
        }
    }

    /// Most likely action: sigmoid of the location and the argmax pool
    pub fn mode(&self, obs: &Observation) -> Action {
        let x = features(obs);
        let probs = self.pool_probabilities(&x);
        let best = (0..POOLS)
            .max_by(|&a, &b| probs[a].total_cmp(&probs[b]))
            .unwrap_or(0);
        Action::clamped(
            sigmoid(dot(&self.intensity_weights, &x)),
            PoolChoice::ALL[best],
        )
    }

    /// REINFORCE step over one episode using normalized discounted returns
    pub fn update(
        &mut self,
        episode: &[Transition],
        learning_rate: f64,
        gamma: f64,
    ) -> UpdateStats {
        let episode_return: f64 = episode.iter().map(|t| t.reward).sum();
        if episode.len() < 2 {
            return UpdateStats {
                episode_return,
                grad_norm: 0.0,
                applied: false,
            };
        }

        let mut returns = vec![0.0; episode.len()];
        let mut running = 0.0;
        for (i, t) in episode.iter().enumerate().rev() {
            running = t.reward + gamma * running;
            returns[i] = running;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let std = (returns.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n).sqrt();
        for g in returns.iter_mut() {
            *g = (*g - mean) / (std + 1e-8);
        }

        let mut grad_w = [0.0; FEATURES];
        let mut grad_log_scale = 0.0;
        let mut grad_pool = [[0.0; FEATURES]; POOLS];
        let scale = self.scale();

        for (t, advantage) in episode.iter().zip(&returns) {
            let x = &t.features;
            let z = (t.latent - dot(&self.intensity_weights, x)) / scale;
            let half_tanh = (z / 2.0).tanh();

            // d/dmu log f = tanh(z/2)/s ; d/dlog_s log f = z tanh(z/2) - 1
            for (g, xi) in grad_w.iter_mut().zip(x) {
                *g += advantage * half_tanh / scale * xi;
            }
            grad_log_scale += advantage * (z * half_tanh - 1.0);

            let probs = self.pool_probabilities(x);
            let chosen = t.pool.index();
            for k in 0..POOLS {
                let indicator = if k == chosen { 1.0 } else { 0.0 };
                for (g, xi) in grad_pool[k].iter_mut().zip(x) {
                    *g += advantage * (indicator - probs[k]) * xi;
                }
            }
        }

        let mut squared = grad_log_scale.powi(2);
        for g in grad_w.iter().chain(grad_pool.iter().flatten()) {
            squared += g * g;
        }
        let grad_norm = (squared / n.powi(2)).sqrt();

        if !grad_norm.is_finite() {
            tracing::warn!(grad_norm, "Skipping policy update with non-finite gradient");
            return UpdateStats {
                episode_return,
                grad_norm,
                applied: false,
            };
        }

        let clip = if grad_norm > MAX_GRAD_NORM {
            MAX_GRAD_NORM / grad_norm
        } else {
            1.0
        };
        let step = learning_rate * clip / n;

        for (w, g) in self.intensity_weights.iter_mut().zip(grad_w) {
            *w += step * g;
        }
        self.log_scale =
            (self.log_scale + step * grad_log_scale).clamp(MIN_LOG_SCALE, MAX_LOG_SCALE);
        for (row, grads) in self.pool_weights.iter_mut().zip(grad_pool) {
            for (w, g) in row.iter_mut().zip(grads) {
                *w += step * g;
            }
        }

        UpdateStats {
            episode_return,
            grad_norm,
            applied: true,
        }
    }
}
