//! Fake base estimator - stands in for the floating-base estimator over TCP.
//!
//! Serves the ports joint-playback talks to during its startup handshake:
//!
//! - RPC port: one command per line, one reply per line. Understands
//!   `startFloatingBaseFilter`, `stopFloatingBaseFilter` and `status`.
//! - State port: streams `x y z` centre-of-mass lines at 100 Hz while the
//!   filter is running.
//! - Logger port (optional): prints every line it receives, so it can be the
//!   sink for the state stream.
//!
//! Usage:
//!   fake-estimator [options]
//!
//! Options:
//!   --host <addr>          Bind address (default: 127.0.0.1)
//!   --rpc-port <port>      RPC port (default: 10001)
//!   --state-port <port>    State stream port (default: 10002)
//!   --logger-port <port>   Also run a logger sink on this port

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Fake floating-base estimator for joint-playback.
#[derive(Parser)]
#[command(name = "fake-estimator", version, about)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 10001)]
    rpc_port: u16,

    #[arg(long, default_value_t = 10002)]
    state_port: u16,

    #[arg(long)]
    logger_port: Option<u16>,
}

/// Handle a single RPC connection: one reply per command line.
async fn handle_rpc(stream: TcpStream, running: Arc<AtomicBool>) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        let reply = match command {
            "startFloatingBaseFilter" => {
                running.store(true, Ordering::Relaxed);
                tracing::info!("Floating base filter started");
                "[ok]"
            }
            "stopFloatingBaseFilter" => {
                running.store(false, Ordering::Relaxed);
                tracing::info!("Floating base filter stopped");
                "[ok]"
            }
            "status" => {
                if running.load(Ordering::Relaxed) {
                    "running"
                } else {
                    "idle"
                }
            }
            other => {
                tracing::warn!("Unknown command: {:?}", other);
                "[fail] unknown command"
            }
        };
        write.write_all(reply.as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

/// Stream a slowly swaying centre of mass while the filter runs.
async fn handle_state(
    mut stream: TcpStream,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> Result<()> {
    let start = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(10));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    continue;
                }
                let t = start.elapsed().as_secs_f64();
                let line = format!(
                    "{:.4} {:.4} {:.4}\n",
                    0.02 * (0.5 * t).sin(),
                    0.05 * (0.5 * t).cos(),
                    0.53
                );
                if stream.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn handle_logger(stream: TcpStream) -> Result<()> {
    let peer = stream.peer_addr()?;
    let mut lines = BufReader::new(stream).lines();
    let mut count = 0u64;
    while let Some(line) = lines.next_line().await? {
        count += 1;
        tracing::info!(target: "logger", "{}", line);
    }
    tracing::info!("Logger: {} closed after {} lines", peer, count);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fake_estimator=info".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();

    let rpc = TcpListener::bind((args.host.as_str(), args.rpc_port)).await?;
    let state = TcpListener::bind((args.host.as_str(), args.state_port)).await?;
    let logger = match args.logger_port {
        Some(port) => Some(TcpListener::bind((args.host.as_str(), port)).await?),
        None => None,
    };

    println!();
    println!("========================================");
    println!("Fake Base Estimator");
    println!("========================================");
    println!("RPC:    {}", rpc.local_addr()?);
    println!("State:  {}", state.local_addr()?);
    match logger {
        Some(ref l) => println!("Logger: {}", l.local_addr()?),
        None => println!("Logger: disabled"),
    }
    println!("========================================");
    println!();

    let running = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();

    if let Some(logger) = logger {
        tokio::spawn(async move {
            loop {
                match logger.accept().await {
                    Ok((stream, addr)) => {
                        tracing::info!("Logger client connected: {}", addr);
                        tokio::spawn(async move {
                            if let Err(e) = handle_logger(stream).await {
                                tracing::error!("Logger error: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("Logger accept failed: {}", e),
                }
            }
        });
    }

    let state_running = Arc::clone(&running);
    let state_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            match state.accept().await {
                Ok((stream, addr)) => {
                    tracing::info!("State subscriber connected: {}", addr);
                    let running = Arc::clone(&state_running);
                    let cancel = state_cancel.child_token();
                    tokio::spawn(async move {
                        if let Err(e) = handle_state(stream, running, cancel).await {
                            tracing::error!("State stream error: {}", e);
                        }
                        tracing::info!("State subscriber disconnected");
                    });
                }
                Err(e) => tracing::error!("State accept failed: {}", e),
            }
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                cancel.cancel();
                break;
            }
            accepted = rpc.accept() => {
                let (stream, addr) = accepted?;
                tracing::info!("RPC client connected: {}", addr);
                let running = Arc::clone(&running);
                tokio::spawn(async move {
                    if let Err(e) = handle_rpc(stream, running).await {
                        tracing::error!("RPC connection error: {}", e);
                    }
                });
            }
        }
    }

    Ok(())
}
