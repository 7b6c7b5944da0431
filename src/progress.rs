use crate::agent::TrainingProgress;
use crate::common::{format_duration, format_large_number};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

/// Progress display for offline training
pub struct ProgressDisplay {
    bar: ProgressBar,
    start_time: Instant,
}

impl ProgressDisplay {
    pub fn new(total_timesteps: u64) -> Self {
        let bar = ProgressBar::new(total_timesteps);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        bar.set_style(style);
        bar.set_message("episode 0");

        Self {
            bar,
            start_time: Instant::now(),
        }
    }

    /// A display that renders nothing, for non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            start_time: Instant::now(),
        }
    }

    pub fn update(&self, progress: &TrainingProgress) {
        self.bar.set_position(progress.timesteps);
        self.bar.set_message(format!(
            "episode {} | return {:.4}",
            format_large_number(progress.episodes),
            progress.episode_return
        ));
    }

    pub fn finish_with_summary(&self, episodes: u64, mean_reward: f64) {
        self.bar.finish_with_message(format!(
            "✅ Trained {} episodes in {} (mean return {:.4})",
            format_large_number(episodes),
            format_duration(self.start_time.elapsed()),
            mean_reward
        ));
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.bar.finish_with_message(msg.to_string());
    }
}
