//! Peer estimation service transport.
//!
//! The base estimator is a separate process reached by well-known names such
//! as `/base-estimator/rpc`. [`PeerNetwork`] covers the three things the
//! startup handshake needs from it: discovery, a request/reply channel, and
//! redirecting one of its output streams into a logging sink.
//!
//! [`TcpPeerNetwork`] implements this over plain TCP. Names resolve through a
//! static registry (`name -> host:port`), and every message is one line of
//! UTF-8 text. The client keeps its own tokio runtime and exposes a blocking
//! API so it can be called from the control loop.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::time::Duration;
//! use joint_playback::estimator::{PeerNetwork, RpcChannel, TcpPeerNetwork};
//!
//! let mut peers = HashMap::new();
//! peers.insert("/base-estimator/rpc".to_string(), "127.0.0.1:10001".to_string());
//!
//! let mut network = TcpPeerNetwork::new(peers, Duration::from_secs(1), Duration::from_secs(2))?;
//! if network.exists("/base-estimator/rpc") {
//!     let mut rpc = network.open_rpc("/base-estimator/rpc")?;
//!     println!("{}", rpc.request("startFloatingBaseFilter")?);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Request/reply channel to a peer.
pub trait RpcChannel: Send {
    /// Send one command and wait for its reply.
    fn request(&mut self, command: &str) -> Result<String>;
}

/// Name-based access to peer services.
pub trait PeerNetwork: Send {
    type Rpc: RpcChannel;

    /// Check if a peer is registered under `name` and reachable.
    fn exists(&mut self, name: &str) -> bool;

    /// Open a request/reply channel to `name`.
    fn open_rpc(&mut self, name: &str) -> Result<Self::Rpc>;

    /// Forward everything the stream `from` produces into `to`, in the background.
    fn redirect(&mut self, from: &str, to: &str) -> Result<()>;
}

/// [`PeerNetwork`] over TCP with a static name registry.
pub struct TcpPeerNetwork {
    runtime: Arc<tokio::runtime::Runtime>,
    registry: HashMap<String, String>,
    connect_timeout: Duration,
    reply_timeout: Duration,
    cancel: CancellationToken,
}

impl TcpPeerNetwork {
    pub fn new(
        registry: HashMap<String, String>,
        connect_timeout: Duration,
        reply_timeout: Duration,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            registry,
            connect_timeout,
            reply_timeout,
            cancel: CancellationToken::new(),
        })
    }

    fn address(&self, name: &str) -> Result<String> {
        self.registry
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no address registered for {}", name))
    }

    fn connect(&self, name: &str) -> Result<TcpStream> {
        let addr = self.address(name)?;
        let timeout = self.connect_timeout;
        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true)?;
                    Ok(stream)
                }
                Ok(Err(e)) => Err(anyhow::anyhow!("connect to {} ({}) failed: {}", name, addr, e)),
                Err(_) => Err(anyhow::anyhow!(
                    "connect to {} ({}) timed out after {:?}",
                    name,
                    addr,
                    timeout
                )),
            }
        })
    }
}

impl PeerNetwork for TcpPeerNetwork {
    type Rpc = TcpRpcChannel;

    fn exists(&mut self, name: &str) -> bool {
        match self.connect(name) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("{} not reachable: {}", name, e);
                false
            }
        }
    }

    fn open_rpc(&mut self, name: &str) -> Result<TcpRpcChannel> {
        let stream = self.connect(name)?;
        let (read, write) = stream.into_split();
        Ok(TcpRpcChannel {
            runtime: Arc::clone(&self.runtime),
            reader: BufReader::new(read),
            writer: write,
            reply_timeout: self.reply_timeout,
        })
    }

    fn redirect(&mut self, from: &str, to: &str) -> Result<()> {
        let mut source = self.connect(from)?;
        let mut sink = self.connect(to)?;
        let cancel = self.cancel.child_token();
        let label = format!("{} -> {}", from, to);

        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = tokio::io::copy(&mut source, &mut sink) => match result {
                    Ok(n) => tracing::debug!("Stream {} ended after {} bytes", label, n),
                    Err(e) => tracing::warn!("Stream {} failed: {}", label, e),
                }
            }
        });
        Ok(())
    }
}

impl Drop for TcpPeerNetwork {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Line-based RPC client returned by [`TcpPeerNetwork::open_rpc`].
pub struct TcpRpcChannel {
    runtime: Arc<tokio::runtime::Runtime>,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    reply_timeout: Duration,
}

impl RpcChannel for TcpRpcChannel {
    fn request(&mut self, command: &str) -> Result<String> {
        let timeout = self.reply_timeout;
        let reader = &mut self.reader;
        let writer = &mut self.writer;
        self.runtime.block_on(async move {
            writer.write_all(command.as_bytes()).await?;
            writer.write_all(b"\n").await?;

            let mut line = String::new();
            let n = tokio::time::timeout(timeout, reader.read_line(&mut line))
                .await
                .map_err(|_| anyhow::anyhow!("no reply within {:?}", timeout))??;
            if n == 0 {
                anyhow::bail!("connection closed before reply");
            }
            Ok(line.trim_end().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader as StdBufReader, Write};
    use std::net::TcpListener;

    fn network(peers: &[(&str, String)]) -> TcpPeerNetwork {
        let registry = peers
            .iter()
            .map(|(name, addr)| (name.to_string(), addr.clone()))
            .collect();
        TcpPeerNetwork::new(
            registry,
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    /// Accepts connections, answers every line with `ack: <line>`.
    fn spawn_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let mut writer = stream.try_clone().unwrap();
                let reader = StdBufReader::new(stream);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    writeln!(writer, "ack: {}", line).unwrap();
                }
            }
        });
        addr
    }

    #[test]
    fn test_unregistered_name_does_not_exist() {
        let mut net = network(&[]);
        assert!(!net.exists("/base-estimator/rpc"));
        assert!(net.open_rpc("/base-estimator/rpc").is_err());
    }

    #[test]
    fn test_registered_but_down() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut net = network(&[("/base-estimator/rpc", addr)]);
        assert!(!net.exists("/base-estimator/rpc"));
    }

    #[test]
    fn test_rpc_round_trip() {
        let addr = spawn_echo_server();
        let mut net = network(&[("/base-estimator/rpc", addr)]);
        assert!(net.exists("/base-estimator/rpc"));

        let mut rpc = net.open_rpc("/base-estimator/rpc").unwrap();
        assert_eq!(
            rpc.request("startFloatingBaseFilter").unwrap(),
            "ack: startFloatingBaseFilter"
        );
        assert_eq!(rpc.request("status").unwrap(), "ack: status");
    }

    #[test]
    fn test_rpc_closed_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let mut line = String::new();
                let _ = StdBufReader::new(&stream).read_line(&mut line);
            }
        });

        let mut net = network(&[("/peer", addr)]);
        let mut rpc = net.open_rpc("/peer").unwrap();
        assert!(rpc.request("hello").is_err());
    }

    #[test]
    fn test_redirect_copies_stream_into_sink() {
        let source = TcpListener::bind("127.0.0.1:0").unwrap();
        let source_addr = source.local_addr().unwrap().to_string();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = source.accept() {
                stream.write_all(b"0.01 0.00 0.53\n0.02 0.00 0.53\n").unwrap();
            }
        });

        let sink = TcpListener::bind("127.0.0.1:0").unwrap();
        let sink_addr = sink.local_addr().unwrap().to_string();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = sink.accept() {
                for line in StdBufReader::new(stream).lines() {
                    let Ok(line) = line else { break };
                    let _ = tx.send(line);
                }
            }
        });

        let mut net = network(&[("/state:o", source_addr), ("/logger", sink_addr)]);
        net.redirect("/state:o", "/logger").unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "0.01 0.00 0.53");
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "0.02 0.00 0.53");
    }

    #[test]
    fn test_redirect_to_unknown_sink_fails() {
        let addr = spawn_echo_server();
        let mut net = network(&[("/state:o", addr)]);
        assert!(net.redirect("/state:o", "/logger").is_err());
    }
}
