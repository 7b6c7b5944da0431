use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rl_miner::common::{format_balance, format_large_number};
use rl_miner::progress::ProgressDisplay;
use rl_miner::telemetry::init_tracing;
use rl_miner::{Agent, ChainMode, Controller, MinerConfig, MinerError, Target};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Reinforcement-learning guided mining simulator
#[derive(Parser, Debug)]
#[command(name = "rl-miner")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON config file (missing fields use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Leading zeros required by live mining
    #[arg(long, global = true)]
    difficulty: Option<usize>,

    /// Environment interactions used to train the agent before mining
    #[arg(long, global = true)]
    train_timesteps: Option<u64>,

    /// Seed for reproducible runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Training chain mode: genesis or strict
    #[arg(long, global = true)]
    chain_mode: Option<ChainMode>,

    /// Number of evaluation threads (default: all cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// Pause between live mining rounds
    #[arg(long, global = true)]
    round_interval_ms: Option<u64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive start/stop/balance menu (default)
    Menu,
    /// Train the agent offline and evaluate the resulting policy
    Train {
        #[arg(long, default_value = "10000")]
        timesteps: u64,

        /// Evaluation episodes run in parallel after training
        #[arg(long, default_value = "8")]
        eval_episodes: usize,
    },
    /// Mine without the menu for a fixed time (Ctrl+C stops early)
    Run {
        #[arg(long, default_value = "30")]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = build_config(&args)?;

    match args.command.unwrap_or(Commands::Menu) {
        Commands::Menu => run_menu(config),
        Commands::Train {
            timesteps,
            eval_episodes,
        } => run_training(config, timesteps, eval_episodes),
        Commands::Run { seconds } => run_headless(config, seconds),
    }
}

fn build_config(args: &Args) -> Result<MinerConfig> {
    let mut config = match &args.config {
        Some(path) => MinerConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => MinerConfig::default(),
    };

    if let Some(difficulty) = args.difficulty {
        config.controller_difficulty = difficulty;
    }
    if let Some(timesteps) = args.train_timesteps {
        config.train_timesteps = timesteps;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(mode) = args.chain_mode {
        config.chain_mode = mode;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(interval) = args.round_interval_ms {
        config.round_interval_ms = interval;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn new_controller(config: MinerConfig) -> Result<Controller> {
    let agent = Agent::from_config(&config);
    Controller::new(config, agent).context("Failed to create controller")
}

fn print_banner(config: &MinerConfig) {
    println!("⛏️  RL Miner");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let target = Target::new(config.controller_difficulty, '0');
    println!(
        "🎯 Live difficulty: {} leading '{}' (~{} attempts avg)",
        target.difficulty(),
        target.target_char(),
        format_large_number(target.estimated_attempts())
    );
    println!("🔗 Training chain mode: {}", config.chain_mode);
    println!("🧠 Training timesteps: {}", config.train_timesteps);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn run_menu(config: MinerConfig) -> Result<()> {
    print_banner(&config);
    let mut controller = new_controller(config)?;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("{}", style("1. Start mining").cyan());
        println!("{}", style("2. Stop mining").cyan());
        println!("{}", style("3. Show balance").cyan());
        println!("{}", style("4. Exit").cyan());
        print!("Choose an option: ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read from stdin")?,
            // EOF behaves like exit
            None => break,
        };

        match line.trim() {
            "1" => match controller.start_mining() {
                Ok(()) => println!("🚀 Mining started"),
                Err(MinerError::AlreadyRunning) => println!("⚠️  Mining is already running"),
                Err(e) => return Err(e).context("Failed to start mining"),
            },
            "2" => {
                if controller.is_running() {
                    controller.stop_mining().context("Failed to stop mining")?;
                    println!("⛔ Mining stopped");
                } else {
                    println!("⚠️  Mining is not running");
                }
            }
            "3" => {
                let snapshot = controller.snapshot();
                println!("💰 Balance:       {}", format_balance(snapshot.balance));
                println!("📦 Blocks mined:  {}", snapshot.blocks_mined);
                if let Some(hash) = snapshot.last_hash {
                    println!("🔗 Last block:    {}", hash);
                }
            }
            "4" => break,
            other => println!("❓ Unknown option '{}', enter 1-4", other),
        }
    }

    controller.stop_mining().context("Failed to stop mining")?;
    println!("👋 Bye");
    Ok(())
}

fn run_training(config: MinerConfig, timesteps: u64, eval_episodes: usize) -> Result<()> {
    print_banner(&config);
    let mut agent = Agent::from_config(&config);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\n⛔ Cancelled by user");
        cancel_clone.store(true, Ordering::SeqCst);
    })
    .ok();
    agent.set_cancel_flag(cancel.clone());

    let progress = if console::user_attended() {
        ProgressDisplay::new(timesteps)
    } else {
        ProgressDisplay::hidden()
    };
    let report = agent.train_with_progress(timesteps, |p| progress.update(p));
    if cancel.load(Ordering::SeqCst) {
        progress.finish_with_message("Training cancelled");
        return Ok(());
    }
    progress.finish_with_summary(report.episodes, report.mean_episode_reward);

    let evaluation = agent
        .evaluate(eval_episodes)
        .context("Failed to evaluate policy")?;
    let sample = agent.optimize_mining_params();

    println!();
    println!("📊 Evaluation over {} episodes", evaluation.episodes);
    println!("   Mean reward:   {:.6}", evaluation.mean_reward);
    println!("   Blocks mined:  {}", evaluation.blocks_mined);
    println!(
        "🎛️  Sample parameters: intensity {:.3}, pool {}",
        sample.intensity(),
        sample.pool().index()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "training": report,
            "evaluation": evaluation,
        }))?
    );
    Ok(())
}

fn run_headless(config: MinerConfig, seconds: u64) -> Result<()> {
    print_banner(&config);
    let mut controller = new_controller(config)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        println!("\n⛔ Cancelled by user");
        interrupted_clone.store(true, Ordering::SeqCst);
    })
    .ok();

    controller.start_mining().context("Failed to start mining")?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline && !interrupted.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    controller.stop_mining().context("Failed to stop mining")?;
    println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
    Ok(())
}
