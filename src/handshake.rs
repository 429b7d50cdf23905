//! One-time startup exchange run when contact is detected.
//!
//! If the base estimator is reachable, connect to it, route its centre of
//! mass stream to the logger and tell it to start the floating-base filter.
//! Whether or not it was found, finish with a visible countdown so the
//! operator knows motion is about to begin.

use std::time::Duration;

use crate::error::HandshakeError;
use crate::estimator::{PeerNetwork, RpcChannel};
use crate::events::{EventSink, PlaybackEvent};

/// Something run exactly once between contact detection and playback.
pub trait Handshake {
    fn run(&mut self, events: &EventSink) -> Result<(), HandshakeError>;
}

/// Fixed countdown of `ticks` steps, `tick` apart.
#[derive(Clone, Copy, Debug)]
pub struct Countdown {
    pub ticks: u32,
    pub tick: Duration,
}

impl Countdown {
    pub fn run(&self, events: &EventSink) {
        for i in 0..self.ticks {
            events.emit(PlaybackEvent::Countdown {
                remaining: self.ticks - i,
            });
            std::thread::sleep(self.tick);
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            ticks: 5,
            tick: Duration::from_secs(1),
        }
    }
}

/// Names and command used to start the estimator.
#[derive(Clone, Debug)]
pub struct EstimatorNames {
    pub rpc: String,
    pub state_source: String,
    pub state_sink: String,
    pub start_command: String,
}

impl Default for EstimatorNames {
    fn default() -> Self {
        Self {
            rpc: "/base-estimator/rpc".to_string(),
            state_source: "/base-estimator/center_of_mass/state:o".to_string(),
            state_sink: "/logger".to_string(),
            start_command: "startFloatingBaseFilter".to_string(),
        }
    }
}

/// Starts the base estimator if it is around, then counts down.
pub struct StartupHandshake<N: PeerNetwork> {
    network: N,
    names: EstimatorNames,
    countdown: Countdown,
    // Kept open for the rest of the session.
    rpc: Option<N::Rpc>,
}

impl<N: PeerNetwork> StartupHandshake<N> {
    pub fn new(network: N, names: EstimatorNames, countdown: Countdown) -> Self {
        Self {
            network,
            names,
            countdown,
            rpc: None,
        }
    }

    fn start_estimator(&mut self, events: &EventSink) -> Result<(), HandshakeError> {
        let names = &self.names;
        if !self.network.exists(&names.rpc) {
            events.emit(PlaybackEvent::EstimatorNotFound {
                name: names.rpc.clone(),
            });
            return Ok(());
        }

        let mut rpc = self
            .network
            .open_rpc(&names.rpc)
            .map_err(|reason| HandshakeError::Connect {
                name: names.rpc.clone(),
                reason,
            })?;
        events.emit(PlaybackEvent::EstimatorConnected {
            name: names.rpc.clone(),
        });

        self.network
            .redirect(&names.state_source, &names.state_sink)
            .map_err(|reason| HandshakeError::Redirect {
                from: names.state_source.clone(),
                to: names.state_sink.clone(),
                reason,
            })?;
        events.emit(PlaybackEvent::StreamRedirected {
            from: names.state_source.clone(),
            to: names.state_sink.clone(),
        });

        let reply = rpc
            .request(&names.start_command)
            .map_err(|reason| HandshakeError::Command {
                command: names.start_command.clone(),
                reason,
            })?;
        events.emit(PlaybackEvent::EstimatorReplied {
            command: names.start_command.clone(),
            reply,
        });

        self.rpc = Some(rpc);
        Ok(())
    }
}

impl<N: PeerNetwork> Handshake for StartupHandshake<N> {
    fn run(&mut self, events: &EventSink) -> Result<(), HandshakeError> {
        self.start_estimator(events)?;
        self.countdown.run(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
    }

    struct MockRpc {
        log: Arc<Mutex<Log>>,
        fail: bool,
    }

    impl RpcChannel for MockRpc {
        fn request(&mut self, command: &str) -> anyhow::Result<String> {
            self.log.lock().unwrap().calls.push(format!("request {}", command));
            if self.fail {
                anyhow::bail!("peer hung up");
            }
            Ok("[ok]".to_string())
        }
    }

    #[derive(Default)]
    struct MockNetwork {
        log: Arc<Mutex<Log>>,
        present: bool,
        fail_open: bool,
        fail_redirect: bool,
        fail_request: bool,
    }

    impl PeerNetwork for MockNetwork {
        type Rpc = MockRpc;

        fn exists(&mut self, name: &str) -> bool {
            self.log.lock().unwrap().calls.push(format!("exists {}", name));
            self.present
        }

        fn open_rpc(&mut self, name: &str) -> anyhow::Result<MockRpc> {
            self.log.lock().unwrap().calls.push(format!("open {}", name));
            if self.fail_open {
                anyhow::bail!("connection refused");
            }
            Ok(MockRpc {
                log: Arc::clone(&self.log),
                fail: self.fail_request,
            })
        }

        fn redirect(&mut self, from: &str, to: &str) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .calls
                .push(format!("redirect {} {}", from, to));
            if self.fail_redirect {
                anyhow::bail!("no such port");
            }
            Ok(())
        }
    }

    fn quick_countdown() -> Countdown {
        Countdown {
            ticks: 5,
            tick: Duration::ZERO,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_estimator_absent_is_skipped() {
        let network = MockNetwork::default();
        let log = Arc::clone(&network.log);
        let (sink, mut rx) = EventSink::channel();

        let mut handshake =
            StartupHandshake::new(network, EstimatorNames::default(), quick_countdown());
        handshake.run(&sink).unwrap();

        assert_eq!(log.lock().unwrap().calls, vec!["exists /base-estimator/rpc"]);
        let events = drain(&mut rx);
        assert!(matches!(events[0], PlaybackEvent::EstimatorNotFound { .. }));
        let countdown: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::Countdown { remaining } => Some(*remaining),
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_estimator_started_in_order() {
        let network = MockNetwork {
            present: true,
            ..Default::default()
        };
        let log = Arc::clone(&network.log);
        let (sink, mut rx) = EventSink::channel();

        let mut handshake =
            StartupHandshake::new(network, EstimatorNames::default(), quick_countdown());
        handshake.run(&sink).unwrap();

        assert_eq!(
            log.lock().unwrap().calls,
            vec![
                "exists /base-estimator/rpc",
                "open /base-estimator/rpc",
                "redirect /base-estimator/center_of_mass/state:o /logger",
                "request startFloatingBaseFilter",
            ]
        );
        let events = drain(&mut rx);
        assert!(events.contains(&PlaybackEvent::EstimatorReplied {
            command: "startFloatingBaseFilter".to_string(),
            reply: "[ok]".to_string(),
        }));
        assert!(handshake.rpc.is_some());
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        let network = MockNetwork {
            present: true,
            fail_open: true,
            ..Default::default()
        };
        let (sink, mut rx) = EventSink::channel();
        let mut handshake =
            StartupHandshake::new(network, EstimatorNames::default(), quick_countdown());

        let err = handshake.run(&sink).unwrap_err();
        assert!(matches!(err, HandshakeError::Connect { .. }));
        // No countdown after a failure.
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Countdown { .. })));
    }

    #[test]
    fn test_redirect_failure_is_fatal() {
        let network = MockNetwork {
            present: true,
            fail_redirect: true,
            ..Default::default()
        };
        let log = Arc::clone(&network.log);
        let mut handshake =
            StartupHandshake::new(network, EstimatorNames::default(), quick_countdown());

        let err = handshake.run(&EventSink::disabled()).unwrap_err();
        assert!(matches!(err, HandshakeError::Redirect { .. }));
        assert!(!log
            .lock()
            .unwrap()
            .calls
            .iter()
            .any(|c| c.starts_with("request")));
    }

    #[test]
    fn test_command_failure_is_fatal() {
        let network = MockNetwork {
            present: true,
            fail_request: true,
            ..Default::default()
        };
        let mut handshake =
            StartupHandshake::new(network, EstimatorNames::default(), quick_countdown());
        let err = handshake.run(&EventSink::disabled()).unwrap_err();
        assert!(matches!(err, HandshakeError::Command { .. }));
    }
}
