use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use swmlink_core::error::Result;
use swmlink_core::protocol::{PeerEvent, RawEvent};

use crate::classify::Classifier;
use crate::transport::GroupTransport;

/// Requests from senders to the loop.
#[derive(Debug)]
pub enum Command {
    Shout {
        group: String,
        body: String,
        done: oneshot::Sender<Result<()>>,
    },
    Whisper {
        peer: String,
        body: String,
        done: oneshot::Sender<Result<()>>,
    },
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

enum Step {
    Command(Option<Command>),
    Event(Option<RawEvent>),
    Idle,
}

pub struct EventLoop {
    transport: Box<dyn GroupTransport>,
    commands: mpsc::Receiver<Command>,
    classifier: Classifier,
    quantum: Duration,
    state: watch::Sender<LoopState>,
}

impl EventLoop {
    pub fn new(
        transport: Box<dyn GroupTransport>,
        commands: mpsc::Receiver<Command>,
        classifier: Classifier,
        quantum: Duration,
        state: watch::Sender<LoopState>,
    ) -> Self {
        Self {
            transport,
            commands,
            classifier,
            quantum,
            state,
        }
    }

    /// Run until terminated or the transport closes. Hands the transport back
    /// so the owner can leave the group and stop it.
    pub async fn run(self) -> Box<dyn GroupTransport> {
        let EventLoop {
            mut transport,
            mut commands,
            classifier,
            quantum,
            state,
        } = self;

        state.send_replace(LoopState::Running);
        tracing::debug!(quantum_ms = quantum.as_millis() as u64, "event loop running");

        loop {
            let step = tokio::select! {
                biased;
                cmd = commands.recv() => Step::Command(cmd),
                polled = tokio::time::timeout(quantum, transport.recv()) => match polled {
                    Ok(ev) => Step::Event(ev),
                    Err(_) => Step::Idle,
                },
            };

            match step {
                Step::Command(Some(Command::Shout { group, body, done })) => {
                    let res = transport.shout(&group, &body).await;
                    if let Err(e) = &res {
                        tracing::warn!(group = %group, error = %e, "shout failed");
                    }
                    let _ = done.send(res);
                }
                Step::Command(Some(Command::Whisper { peer, body, done })) => {
                    let res = transport.whisper(&peer, &body).await;
                    if let Err(e) = &res {
                        tracing::warn!(peer = %peer, error = %e, "whisper failed");
                    }
                    let _ = done.send(res);
                }
                Step::Command(Some(Command::Terminate)) => {
                    tracing::debug!("terminate received");
                    break;
                }
                Step::Command(None) => {
                    tracing::debug!("command channel closed");
                    break;
                }
                Step::Event(Some(raw)) => on_event(&classifier, raw),
                Step::Event(None) => {
                    tracing::warn!("transport closed");
                    break;
                }
                Step::Idle => {}
            }
        }

        state.send_replace(LoopState::Stopped);
        tracing::debug!("event loop stopped");
        transport
    }
}

fn on_event(classifier: &Classifier, raw: RawEvent) {
    match PeerEvent::decode(&raw) {
        Ok(event) => {
            let disposition = classifier.handle(event);
            tracing::trace!(?disposition, "event handled");
        }
        Err(e) => {
            tracing::warn!(kind = %raw.kind, error = %e, "malformed transport event skipped");
        }
    }
}
