//! Joint playback - replays a joint dataset once both feet touch the ground.
//!
//! Runs against the simulated robot. The base estimator handshake uses the
//! peers listed in the config's `estimator.peers` table, so it works with
//! `fake-estimator` or a real estimator bridge.
//!
//! Usage:
//!   joint-playback --config jointControl.json [options]
//!
//! Options:
//!   --config <file>         JSON configuration (defaults if omitted)
//!   --dataset-root <dir>    Override general.dataset_root
//!   --dataset-type <name>   Override general.dataset_type
//!   --contact-after <n>     Sensor reads before the simulated feet touch down
//!   --max-duration <secs>   Stop after this long (default: Ctrl+C)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use joint_playback::estimator::TcpPeerNetwork;
use joint_playback::events::{spawn_event_logger, EventSink};
use joint_playback::handshake::StartupHandshake;
use joint_playback::module::{run, JointControlModule};
use joint_playback::sim::{SimSettings, SimulatedRobot};
use joint_playback::ModuleConfig;

/// Replay a recorded joint trajectory on contact.
#[derive(Parser)]
#[command(name = "joint-playback", version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing `txtDatasets/`.
    #[arg(long)]
    dataset_root: Option<PathBuf>,

    /// Dataset name under `txtDatasets/`.
    #[arg(long)]
    dataset_type: Option<String>,

    /// Feedback reads before the simulated feet are loaded.
    #[arg(long, default_value_t = 200)]
    contact_after: u64,

    /// Stop after this many seconds.
    #[arg(long)]
    max_duration: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("joint_playback=info".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => ModuleConfig::from_file(path)?,
        None => ModuleConfig::default(),
    };
    if let Some(root) = args.dataset_root {
        config.general.dataset_root = root;
    }
    if let Some(dataset_type) = args.dataset_type {
        config.general.dataset_type = dataset_type;
    }
    config.validate()?;

    println!();
    println!("========================================");
    println!("Joint Playback: {}", config.general.name);
    println!("========================================");
    println!("Dataset:   {}", config.dataset_path().display());
    println!("Joints:    {}", config.general.joint_count);
    println!("Period:    {:?}", config.period());
    println!("Threshold: {:.1} N", config.trigger.contact_threshold);
    println!("Estimator: {}", config.estimator.rpc_name);
    println!("========================================");
    println!();

    let (events, rx) = EventSink::channel();
    let logger = spawn_event_logger(rx)?;

    let network = TcpPeerNetwork::new(
        config.estimator.peers.clone(),
        config.connect_timeout(),
        config.reply_timeout(),
    )?;
    let handshake = StartupHandshake::new(network, config.estimator_names(), config.countdown());
    let robot = SimulatedRobot::new(SimSettings {
        joint_count: config.general.joint_count,
        contact_after_reads: Some(args.contact_after),
        ..Default::default()
    });

    let cancel = CancellationToken::new();

    if let Some(secs) = args.max_duration {
        let timer_cancel = cancel.clone();
        let limit =
            Duration::try_from_secs_f64(secs.max(0.0)).context("invalid --max-duration")?;
        std::thread::Builder::new()
            .name("playback-timer".to_string())
            .spawn(move || {
                std::thread::sleep(limit);
                timer_cancel.cancel();
            })?;
    }

    let result = JointControlModule::configure(&config, robot, handshake, events)
        .map_err(|e| anyhow::Error::from(e).context("configuration failed"))
        .and_then(|mut module| {
            // Ctrl+C ends the process outright until setup is done.
            let ctrlc_cancel = cancel.clone();
            ctrlc::set_handler(move || {
                tracing::info!("Interrupted, stopping playback");
                ctrlc_cancel.cancel();
            })?;
            run(&mut module, &cancel).map_err(anyhow::Error::from)
        });

    // Every sink is gone once the module is dropped; the logger drains and exits.
    let _ = logger.join();

    let summary = result?;
    println!(
        "\nPlayback stopped after {} cycles ({} frames streamed, {} overruns).",
        summary.cycles, summary.frames_streamed, summary.overruns
    );
    Ok(())
}
